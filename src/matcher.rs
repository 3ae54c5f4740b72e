//! Fuzzy skill matching.
//!
//! Scores are integers in `0..=100`. Inputs are normalized first: lower-cased,
//! non-alphanumeric characters replaced by spaces, whitespace collapsed.

use serde::{Deserialize, Serialize};
use strsim::normalized_levenshtein;

use crate::models::MatchColumns;

/// Default similarity threshold for `top_matches`.
pub const DEFAULT_MATCH_THRESHOLD: u8 = 70;

/// Scorer used for the overall `match_score` column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    /// Partial ratio over sorted tokens (default).
    #[default]
    Partial,
    /// Plain ratio over normalized text.
    Quick,
    /// Best of several scorers, weighted by length difference.
    Weighted,
    /// Ratio over sorted tokens.
    Normal,
}

/// Normalize text for comparison.
pub fn normalize(text: &str) -> String {
    text.chars()
        .flat_map(|c| {
            let keep = c.is_alphanumeric();
            c.to_lowercase().map(move |l| if keep { l } else { ' ' })
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn to_score(similarity: f64) -> u8 {
    (similarity * 100.0).round().clamp(0.0, 100.0) as u8
}

fn raw_ratio(a: &str, b: &str) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    to_score(normalized_levenshtein(a, b))
}

fn raw_partial_ratio(a: &str, b: &str) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let (short, long): (Vec<char>, Vec<char>) = if a.chars().count() <= b.chars().count() {
        (a.chars().collect(), b.chars().collect())
    } else {
        (b.chars().collect(), a.chars().collect())
    };

    let short_str: String = short.iter().collect();
    let mut best = 0.0_f64;
    for start in 0..=(long.len() - short.len()) {
        let window: String = long[start..start + short.len()].iter().collect();
        let similarity = normalized_levenshtein(&short_str, &window);
        if similarity > best {
            best = similarity;
            if best >= 1.0 {
                break;
            }
        }
    }
    to_score(best)
}

fn sort_tokens(text: &str) -> String {
    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Similarity of the two normalized strings.
pub fn ratio(a: &str, b: &str) -> u8 {
    raw_ratio(&normalize(a), &normalize(b))
}

/// Best similarity of the shorter string against any same-length window of the longer.
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    raw_partial_ratio(&normalize(a), &normalize(b))
}

/// Ratio after sorting whitespace-separated tokens.
pub fn token_sort_ratio(a: &str, b: &str) -> u8 {
    raw_ratio(&sort_tokens(&normalize(a)), &sort_tokens(&normalize(b)))
}

/// Partial ratio after sorting whitespace-separated tokens.
pub fn partial_token_sort_ratio(a: &str, b: &str) -> u8 {
    raw_partial_ratio(&sort_tokens(&normalize(a)), &sort_tokens(&normalize(b)))
}

/// Ratio of normalized strings; zero when either side is empty.
pub fn quick_ratio(a: &str, b: &str) -> u8 {
    ratio(a, b)
}

/// Best of the plain, partial and token-sorted scorers, scaled down when the
/// lengths differ a lot.
pub fn weighted_ratio(a: &str, b: &str) -> u8 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let base = raw_ratio(&a, &b) as f64;
    let (la, lb) = (a.chars().count() as f64, b.chars().count() as f64);
    let len_ratio = la.max(lb) / la.min(lb);

    let sorted_a = sort_tokens(&a);
    let sorted_b = sort_tokens(&b);

    let best = if len_ratio < 1.5 {
        base.max(raw_ratio(&sorted_a, &sorted_b) as f64 * 0.95)
    } else {
        let scale = if len_ratio < 8.0 { 0.9 } else { 0.6 };
        base.max(raw_partial_ratio(&a, &b) as f64 * scale)
            .max(raw_partial_ratio(&sorted_a, &sorted_b) as f64 * 0.95 * scale)
    };
    best.round().clamp(0.0, 100.0) as u8
}

/// Overall score between a job's skill list and the configured skills.
///
/// Returns `None` when either list is empty.
pub fn match_score(job_skills: &[String], my_skills: &[String], method: MatchMethod) -> Option<u8> {
    if job_skills.is_empty() || my_skills.is_empty() {
        return None;
    }
    let a = job_skills.join(" ");
    let b = my_skills.join(" ");
    Some(match method {
        MatchMethod::Partial => partial_token_sort_ratio(&a, &b),
        MatchMethod::Quick => quick_ratio(&a, &b),
        MatchMethod::Weighted => weighted_ratio(&a, &b),
        MatchMethod::Normal => token_sort_ratio(&a, &b),
    })
}

/// Job skills whose best match among `my_skills` scores at least `threshold`.
///
/// Returns `None` when nothing matches.
pub fn find_matches(job_skills: &[String], my_skills: &[String], threshold: u8) -> Option<Vec<String>> {
    let matches: Vec<String> = job_skills
        .iter()
        .filter(|skill| {
            my_skills
                .iter()
                .map(|mine| weighted_ratio(skill, mine))
                .max()
                .is_some_and(|best| best >= threshold)
        })
        .cloned()
        .collect();

    if matches.is_empty() {
        None
    } else {
        Some(matches)
    }
}

/// Build the match columns for a scraped job.
pub fn match_columns(
    job_skills: &[String],
    my_skills: &[String],
    method: MatchMethod,
    threshold: u8,
) -> MatchColumns {
    if job_skills.is_empty() || my_skills.is_empty() {
        return MatchColumns::default();
    }
    MatchColumns {
        match_score: match_score(job_skills, my_skills, method),
        top_matches: find_matches(job_skills, my_skills, threshold),
        match_threshold: Some(threshold),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skills(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  C++ / Python3 "), "c python3");
        assert_eq!(normalize("Amazon Web Services (AWS)"), "amazon web services aws");
        assert_eq!(normalize("---"), "");
        assert_eq!(normalize("ÖSTERREICH Ärzte"), "österreich ärzte");
    }

    #[test]
    fn test_ratio_identical_and_case() {
        assert_eq!(ratio("Python", "python"), 100);
        assert_eq!(ratio("Übersetzung", "übersetzung"), 100);
        assert_eq!(ratio("", "python"), 0);
        assert!(ratio("python", "java") < 50);
    }

    #[test]
    fn test_partial_ratio_substring() {
        assert_eq!(partial_ratio("sql", "PostgreSQL"), 100);
        assert_eq!(partial_ratio("PostgreSQL", "sql"), 100);
        assert!(partial_ratio("rust", "postgresql") < 100);
    }

    #[test]
    fn test_token_sort_ignores_order() {
        assert_eq!(token_sort_ratio("data engineer python", "Python Data Engineer"), 100);
        assert_eq!(
            partial_token_sort_ratio("engineer data", "senior data engineer"),
            100
        );
    }

    #[test]
    fn test_weighted_ratio() {
        assert_eq!(weighted_ratio("Docker", "docker"), 100);
        // Long vs short: partial score scaled by 0.9.
        assert_eq!(weighted_ratio("Python (Programming Language)", "python"), 90);
        assert!(weighted_ratio("Excel", "Apache Airflow") < 50);
    }

    #[test]
    fn test_match_score_empty_lists() {
        let mine = skills(&["python"]);
        assert_eq!(match_score(&[], &mine, MatchMethod::Partial), None);
        assert_eq!(match_score(&mine, &[], MatchMethod::Partial), None);
    }

    #[test]
    fn test_match_score_methods() {
        let job = skills(&["Python", "SQL"]);
        let mine = skills(&["sql", "python"]);
        assert_eq!(match_score(&job, &mine, MatchMethod::Normal), Some(100));
        assert_eq!(match_score(&job, &mine, MatchMethod::Partial), Some(100));
        assert!(match_score(&job, &mine, MatchMethod::Quick).unwrap() < 100);
    }

    #[test]
    fn test_find_matches_threshold() {
        let job = skills(&["Python (Programming Language)", "Docker", "Salesforce"]);
        let mine = skills(&["python", "docker", "aws"]);

        let found = find_matches(&job, &mine, 80).unwrap();
        assert!(found.contains(&"Docker".to_string()));
        assert!(found.contains(&"Python (Programming Language)".to_string()));
        assert!(!found.contains(&"Salesforce".to_string()));

        assert_eq!(find_matches(&skills(&["Salesforce"]), &mine, 80), None);
    }

    #[test]
    fn test_match_columns() {
        let mine = skills(&["python"]);
        assert_eq!(match_columns(&[], &mine, MatchMethod::Partial, 70), MatchColumns::default());

        let cols = match_columns(&skills(&["Python"]), &mine, MatchMethod::Partial, 70);
        assert_eq!(cols.match_score, Some(100));
        assert_eq!(cols.top_matches, Some(skills(&["Python"])));
        assert_eq!(cols.match_threshold, Some(70));
    }
}
