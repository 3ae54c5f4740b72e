//! Initialize command.

use console::style;

use jobcrawl::config::{Config, Settings};
use jobcrawl::repository::SqliteJobStore;

/// Create the data folders and the job database.
pub async fn cmd_init(settings: &Settings, config: &Config) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let store = SqliteJobStore::new(&settings.database_path())?;
    let jobs = store.count()?;

    println!(
        "  {} Database: {} ({} jobs)",
        style("✓").green(),
        settings.database_path().display(),
        jobs
    );
    println!("  {} Backups: {}", style("✓").green(), settings.backup_dir.display());
    println!("  {} Logs: {}", style("✓").green(), settings.log_dir.display());
    println!(
        "  {} Screenshots: {}",
        style("✓").green(),
        settings.screenshot_dir.display()
    );

    if config.source_path.is_none() {
        println!("{} No jobcrawl config file found", style("!").yellow());
        println!("  Create jobcrawl.toml with a `queries` list to get started");
    } else if settings.queries.is_empty() {
        println!("{} No queries configured", style("!").yellow());
    }
    if settings.credentials.is_none() {
        println!(
            "{} LINKEDIN_USER / LINKEDIN_PASSWORD not set; a signed-in browser profile is required",
            style("!").yellow()
        );
    }

    println!(
        "{} Initialized jobcrawl in {}",
        style("✓").green(),
        settings.data_dir.display()
    );

    Ok(())
}
