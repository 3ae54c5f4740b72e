//! jobcrawl - resumable LinkedIn job-search crawler.
//!
//! Crawls LinkedIn job search for the configured queries, matches each
//! posting's skills against your own and stores the results in SQLite.

mod cli;

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use console::style;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// `<log_dir>/jobcrawl.log`, opened once settings are loaded.
///
/// Events logged before [`LogFile::open`] only reach stderr.
#[derive(Clone, Default)]
pub struct LogFile(Arc<Mutex<Option<File>>>);

impl LogFile {
    pub fn open(&self, log_dir: &Path) -> io::Result<()> {
        std::fs::create_dir_all(log_dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_dir.join("jobcrawl.log"))?;
        if let Ok(mut slot) = self.0.lock() {
            *slot = Some(file);
        }
        Ok(())
    }
}

impl Write for LogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.0.lock() {
            Ok(mut slot) => match slot.as_mut() {
                Some(file) => file.write(buf),
                None => Ok(buf.len()),
            },
            Err(_) => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.0.lock() {
            Ok(mut slot) => slot.as_mut().map_or(Ok(()), Write::flush),
            Err(_) => Ok(()),
        }
    }
}

fn build_subscriber<W>(
    verbose: bool,
    stderr: W,
) -> (impl tracing::Subscriber + Send + Sync + 'static, LogFile)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let default_filter = if verbose {
        "jobcrawl=info"
    } else {
        "jobcrawl=warn"
    };

    let log_file = LogFile::default();
    let file_writer = log_file.clone();
    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(move || file_writer.clone()),
        );
    (subscriber, log_file)
}

/// Set up logging to stderr. The file log starts once [`LogFile::open`] is called.
fn init_logging(verbose: bool) -> LogFile {
    let (subscriber, log_file) = build_subscriber(verbose, io::stderr);
    subscriber.init();
    log_file
}

/// Start the file log, warning on stderr when the folder is unusable.
fn open_log_file(log_file: &LogFile, log_dir: &Path) {
    if let Err(e) = log_file.open(log_dir) {
        eprintln!(
            "{} Could not open log file in {}: {}",
            style("!").yellow(),
            log_dir.display(),
            e
        );
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    let code = match cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", style("✗").red(), e);
            cli::exit_code(&e)
        }
    };
    std::process::exit(code);
}
