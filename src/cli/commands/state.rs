//! Crawl checkpoint commands.

use console::style;

use jobcrawl::config::Settings;
use jobcrawl::crawl::backup::{read_jobs, read_links};
use jobcrawl::scraper::jobs_csv_path;

use crate::cli::helpers::{or_dash, print_field};

/// Show the saved checkpoint and the size of the link backup.
pub async fn cmd_state_show(settings: &Settings) -> anyhow::Result<()> {
    let checkpoint = settings.checkpoint();
    let Some(state) = checkpoint.load()? else {
        println!(
            "{} No crawl in progress ({} does not exist)",
            style("○").dim(),
            checkpoint.path().display()
        );
        return Ok(());
    };

    println!("\n{}", style("Crawl State").bold());
    println!("{}", "-".repeat(40));
    print_field("Query", &state.query);
    print_field("Stage", or_dash(state.stage.map(|s| s.as_str())));
    print_field("Cursor", or_dash(state.cursor));

    let attempts = format!("{} / {}", state.attempt_count, settings.max_attempts);
    if state.attempt_count >= settings.max_attempts {
        print_field("Attempts", style(attempts).red());
    } else {
        print_field("Attempts", attempts);
    }

    let links = read_links(&settings.scraper_options().links_backup())?;
    print_field("Backed-up links", links.len());
    if settings.backup_scraped_jobs {
        let rows = read_jobs(&jobs_csv_path(&settings.output_dir))?;
        print_field("Exported jobs", rows.len());
    }
    print_field("State file", checkpoint.path().display());

    Ok(())
}

/// Delete the checkpoint and every backup file.
pub async fn cmd_state_clear(settings: &Settings, confirm: bool) -> anyhow::Result<()> {
    if !confirm {
        println!(
            "{} This will delete the crawl checkpoint and every file in {}.",
            style("!").yellow(),
            settings.backup_dir.display()
        );
        println!("  The next crawl will start from the first query.");
        println!("  Use --confirm to proceed.");
        return Ok(());
    }

    let removed = settings.checkpoint().clear_with_backups(&settings.backup_dir)?;
    println!(
        "{} Cleared crawl state ({} files removed)",
        style("✓").green(),
        removed
    );
    Ok(())
}
