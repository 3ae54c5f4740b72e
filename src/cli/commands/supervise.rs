//! Supervise command.

use std::time::Duration;

use anyhow::Context;
use console::style;

use jobcrawl::config::Settings;
use jobcrawl::supervisor::{supervise, SupervisorOptions, SupervisorOutcome};

pub struct SuperviseArgs {
    pub stall_timeout: u64,
    pub max_restarts: u32,
    pub restart_delay: u64,
    /// Global flags repeated for the child.
    pub global: Vec<String>,
    pub crawl_args: Vec<String>,
}

fn child_args(args: &SuperviseArgs) -> Vec<String> {
    let mut child = args.global.clone();
    child.push("crawl".to_string());
    child.extend(args.crawl_args.iter().cloned());
    child
}

/// Run `jobcrawl crawl` under the supervisor. Returns the exit code.
pub async fn cmd_supervise(settings: &Settings, args: SuperviseArgs) -> anyhow::Result<i32> {
    let program = std::env::current_exe().context("Failed to locate the jobcrawl executable")?;

    let mut options = SupervisorOptions::new(program, &settings.state_file);
    options.args = child_args(&args);
    options.stall_timeout = Duration::from_secs(args.stall_timeout);
    options.max_restarts = args.max_restarts;
    options.restart_delay = Duration::from_secs(args.restart_delay);

    let outcome = supervise(&options).await?;
    match outcome {
        SupervisorOutcome::Completed { restarts } => println!(
            "{} Crawl complete after {} restarts",
            style("✓").green(),
            restarts
        ),
        SupervisorOutcome::Fatal { .. } => println!(
            "{} Crawl hit its attempt limit. Inspect with 'jobcrawl state show'",
            style("✗").red()
        ),
        SupervisorOutcome::GaveUp { restarts } => println!(
            "{} Gave up after {} restarts",
            style("✗").red(),
            restarts
        ),
    }
    Ok(outcome.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_args() {
        let args = SuperviseArgs {
            stall_timeout: 600,
            max_restarts: 3,
            restart_delay: 10,
            global: vec!["--config".into(), "jobcrawl.toml".into()],
            crawl_args: vec!["rust engineer".into(), "--headless".into()],
        };
        assert_eq!(
            child_args(&args),
            vec!["--config", "jobcrawl.toml", "crawl", "rust engineer", "--headless"]
        );
    }
}
