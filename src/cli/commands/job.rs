//! Stored job lookup commands.

use console::style;

use jobcrawl::config::Settings;
use jobcrawl::repository::{JobStore, SqliteJobStore};

use crate::cli::helpers::{or_dash, print_field, truncate};

fn open_store(settings: &Settings) -> anyhow::Result<SqliteJobStore> {
    let path = settings.database_path();
    if !path.exists() {
        anyhow::bail!(
            "No database at {}. Run 'jobcrawl init' first",
            path.display()
        );
    }
    Ok(SqliteJobStore::new(&path)?)
}

/// Show one stored job.
pub async fn cmd_job_show(settings: &Settings, job_id: u64, json: bool) -> anyhow::Result<()> {
    let store = open_store(settings)?;
    let Some(job) = store.get_one(job_id)? else {
        anyhow::bail!("Job {} not found", job_id);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&job)?);
        return Ok(());
    }

    println!("\n{}", style(&job.title).bold());
    println!("{}", "-".repeat(40));
    print_field("Job ID", job.job_id);
    print_field("Company", or_dash(job.company_name.as_deref()));
    print_field("Location", or_dash(job.location.as_deref()));
    print_field("Posted", or_dash(job.post_time.as_deref()));
    print_field("Posted (raw)", or_dash(job.post_time_raw.as_deref()));
    print_field("Repost", if job.is_repost { "yes" } else { "no" });
    print_field("Applicants", or_dash(job.n_applicants));
    print_field("Query", or_dash(job.original_query.as_deref()));
    print_field("Crawled", or_dash(job.crawl_time.as_deref()));
    print_field("Job link", or_dash(job.li_job_link.as_deref()));
    print_field("Apply link", or_dash(job.apply_link.as_deref()));
    if !job.skills.is_empty() {
        print_field("Skills", job.skills.join(", "));
    }
    print_field("Match score", or_dash(job.match_score));
    if let Some(ref matches) = job.top_matches {
        print_field(
            &format!("Matches (>= {})", or_dash(job.match_threshold)),
            style(matches.join(", ")).green(),
        );
    }

    Ok(())
}

/// List the most recently stored jobs.
pub async fn cmd_job_list(settings: &Settings, limit: usize) -> anyhow::Result<()> {
    let store = open_store(settings)?;
    let jobs = store.recent(limit)?;
    if jobs.is_empty() {
        println!("{} No jobs stored yet", style("!").yellow());
        return Ok(());
    }

    println!(
        "{:<12} {:>5}  {:<40} {}",
        style("JOB ID").bold(),
        style("SCORE").bold(),
        style("TITLE").bold(),
        style("COMPANY").bold()
    );
    for job in jobs {
        println!(
            "{:<12} {:>5}  {:<40} {}",
            job.job_id,
            job.match_score
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
            truncate(&job.title, 40),
            job.company_name.as_deref().unwrap_or("-")
        );
    }
    println!("\n{} jobs in database", store.count()?);
    Ok(())
}
