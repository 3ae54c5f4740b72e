//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod crawl;
mod init;
mod job;
mod state;
mod supervise;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use jobcrawl::config::{load_settings_with_options, LoadOptions};
use jobcrawl::matcher::MatchMethod;
use jobcrawl::supervisor::{EXIT_FAILURE, EXIT_FATAL};
use jobcrawl::ScrapeError;

#[derive(Parser)]
#[command(name = "jobcrawl")]
#[command(about = "Resumable LinkedIn job-search crawler with skill matching")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Resolve relative paths from current working directory instead of config file location
    #[arg(long, global = true)]
    cwd: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data folders and the job database
    Init,

    /// Crawl job search for each query and store the results
    Crawl {
        /// Search queries (defaults to the configured list)
        queries: Vec<String>,
        /// Maximum search result offset per query
        #[arg(long)]
        max_jobs: Option<u64>,
        /// Run Chrome without a window
        #[arg(long)]
        headless: bool,
        /// Minimum score for a job skill to count as a match (0-100)
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        threshold: Option<u8>,
        /// Scoring method for the overall match score
        #[arg(long, value_enum)]
        method: Option<MatchMethod>,
    },

    /// Run `crawl` in a child process, restarting it until it finishes
    Supervise {
        /// Kill the crawl when the checkpoint has not changed for this many seconds
        #[arg(long, default_value = "600")]
        stall_timeout: u64,
        /// Give up after this many restarts
        #[arg(long, default_value = "20")]
        max_restarts: u32,
        /// Seconds to wait before restarting
        #[arg(long, default_value = "10")]
        restart_delay: u64,
        /// Arguments passed to `crawl`
        #[arg(last = true)]
        crawl_args: Vec<String>,
    },

    /// Inspect or reset the crawl checkpoint
    State {
        #[command(subcommand)]
        command: StateCommands,
    },

    /// Look up stored jobs
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
}

#[derive(Subcommand)]
enum StateCommands {
    /// Show the saved checkpoint and link backup
    Show,
    /// Delete the checkpoint and all backup files
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        confirm: bool,
    },
}

#[derive(Subcommand)]
enum JobCommands {
    /// Show one stored job
    Show {
        /// LinkedIn job id
        job_id: u64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the most recently stored jobs
    List {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

/// Exit code for an error returned by [`run`].
pub fn exit_code(err: &anyhow::Error) -> i32 {
    let fatal = err.chain().any(|cause| {
        cause
            .downcast_ref::<ScrapeError>()
            .is_some_and(ScrapeError::is_fatal)
    });
    if fatal {
        EXIT_FATAL
    } else {
        EXIT_FAILURE
    }
}

/// Parse arguments, load settings and run the command. Returns the exit code.
pub async fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse();
    let log_file = crate::init_logging(cli.verbose);

    let options = LoadOptions {
        config_path: cli.config.clone(),
        use_cwd: cli.cwd,
    };
    let (settings, config) = load_settings_with_options(options).await;

    crate::open_log_file(&log_file, &settings.log_dir);
    if let Some(ref path) = config.source_path {
        tracing::info!("Using config {}", path.display());
    }

    match cli.command {
        Commands::Init => init::cmd_init(&settings, &config).await.map(|_| 0),
        Commands::Crawl {
            queries,
            max_jobs,
            headless,
            threshold,
            method,
        } => {
            let overrides = crawl::CrawlOverrides {
                queries,
                max_jobs,
                headless,
                threshold,
                method,
            };
            crawl::cmd_crawl(settings, overrides).await.map(|_| 0)
        }
        Commands::Supervise {
            stall_timeout,
            max_restarts,
            restart_delay,
            crawl_args,
        } => {
            let mut global = Vec::new();
            if let Some(ref path) = cli.config {
                global.push("--config".to_string());
                global.push(path.to_string_lossy().into_owned());
            }
            if cli.cwd {
                global.push("--cwd".to_string());
            }
            if cli.verbose {
                global.push("--verbose".to_string());
            }
            let args = supervise::SuperviseArgs {
                stall_timeout,
                max_restarts,
                restart_delay,
                global,
                crawl_args,
            };
            supervise::cmd_supervise(&settings, args).await
        }
        Commands::State { command } => match command {
            StateCommands::Show => state::cmd_state_show(&settings).await.map(|_| 0),
            StateCommands::Clear { confirm } => {
                state::cmd_state_clear(&settings, confirm).await.map(|_| 0)
            }
        },
        Commands::Job { command } => match command {
            JobCommands::Show { job_id, json } => {
                job::cmd_job_show(&settings, job_id, json).await.map(|_| 0)
            }
            JobCommands::List { limit } => job::cmd_job_list(&settings, limit).await.map(|_| 0),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_crawl_flags() {
        let cli = Cli::parse_from([
            "jobcrawl",
            "-v",
            "crawl",
            "python data engineer",
            "--max-jobs",
            "100",
            "--headless",
            "--method",
            "weighted",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Crawl {
                queries,
                max_jobs,
                headless,
                method,
                ..
            } => {
                assert_eq!(queries, vec!["python data engineer"]);
                assert_eq!(max_jobs, Some(100));
                assert!(headless);
                assert_eq!(method, Some(MatchMethod::Weighted));
            }
            _ => panic!("expected crawl"),
        }
    }

    #[test]
    fn test_parse_supervise_trailing_args() {
        let cli = Cli::parse_from([
            "jobcrawl",
            "supervise",
            "--max-restarts",
            "3",
            "--",
            "rust engineer",
            "--headless",
        ]);
        match cli.command {
            Commands::Supervise {
                max_restarts,
                crawl_args,
                ..
            } => {
                assert_eq!(max_restarts, 3);
                assert_eq!(crawl_args, vec!["rust engineer", "--headless"]);
            }
            _ => panic!("expected supervise"),
        }
    }

    #[test]
    fn test_exit_code() {
        let fatal = anyhow::Error::new(ScrapeError::MaxAttempts {
            query: "q".into(),
            attempts: 6,
            max: 5,
        })
        .context("crawl failed");
        assert_eq!(exit_code(&fatal), EXIT_FATAL);

        let other = anyhow::Error::new(ScrapeError::Layout("x".into()));
        assert_eq!(exit_code(&other), EXIT_FAILURE);
        assert_eq!(exit_code(&anyhow::anyhow!("boom")), EXIT_FAILURE);
    }
}
