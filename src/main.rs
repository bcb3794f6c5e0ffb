//! Backscroll main entry point
//!
//! This is the command-line interface for collecting Poe chat transcripts,
//! chat images and creator metrics.

use anyhow::{bail, Context};
use backscroll::collector::{
    ContentExtractor, ImageUrlExtractor, MessagePairExtractor, MetricsRowExtractor, RevealLoop,
    RevealSettings,
};
use backscroll::config::{load_or_default, Config};
use backscroll::driver::{ChromiumDriver, HtmlSnapshotDriver, PageDriver, RevealSelectors};
use backscroll::fetch::{AssetFetchPool, HttpFetcher};
use backscroll::output::{
    print_report, AssetDirectoryWriter, HarvestReport, TableWriter, TranscriptWriter, Writer,
};
use backscroll::record::DedupStore;
use backscroll::session::{Credentials, EmailCodeSession, NoSession, Session, StdinPrompt};
use backscroll::{CrashSafePersister, Harvest, HarvestError};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Exit status after an operator interrupt, as a shell reports SIGINT
const EXIT_INTERRUPTED: i32 = 130;

/// Backscroll: collect everything an infinite-scroll page can reveal
///
/// Backscroll drives a browser to reveal older content, deduplicates what it
/// reads, and saves the result even when the run is interrupted.
#[derive(Parser, Debug)]
#[command(name = "backscroll")]
#[command(version)]
#[command(about = "Collect chat transcripts, images and metrics from infinite-scroll pages", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults when omitted)
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    /// Account email used to log in
    #[arg(long, env = "POE_EMAIL", global = true)]
    email: Option<String>,

    /// Validate config and show what would be collected without opening a browser
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Save a chat conversation as a text transcript
    Transcript {
        /// Chat URL
        url: String,

        /// Directory the transcript is written to
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Replay saved HTML snapshots instead of opening a browser
        #[arg(long, value_name = "HTML", num_args = 1..)]
        replay: Vec<PathBuf>,
    },

    /// Download every image shown in a chat conversation
    Images {
        /// Chat URL
        url: String,

        /// Directory the images are written to
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Replay saved HTML snapshots instead of opening a browser
        #[arg(long, value_name = "HTML", num_args = 1..)]
        replay: Vec<PathBuf>,
    },

    /// Export the creator earnings table as CSV
    Metrics {
        /// CSV file to write
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Replay saved HTML snapshots instead of opening a browser
        #[arg(long, value_name = "HTML", num_args = 1..)]
        replay: Vec<PathBuf>,
    },
}

/// Everything needed to run one subcommand, independent of the driver
struct Job {
    url: String,
    selectors: RevealSelectors,
    ready: String,
    destination: PathBuf,
    writer: Box<dyn Writer>,
    replay: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;
    match (&cli.config, &config_hash) {
        (Some(path), Some(hash)) => tracing::info!(
            "Configuration loaded from {} (hash: {})",
            path.display(),
            hash
        ),
        _ => tracing::info!("Using built-in configuration"),
    }

    // Resolve what to collect and where it goes
    let dedup = Arc::new(DedupStore::new());
    let job = build_job(&cli.command, &config, &dedup)?;

    if cli.dry_run {
        handle_dry_run(&cli, &config, &job);
        return Ok(());
    }

    // Ctrl-C stops collection; whatever was collected is still saved
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("Interrupt received, saving what was collected so far (Ctrl-C again to quit)");
        signal_token.cancel();

        // A blocked code prompt cannot observe the token; a second Ctrl-C quits
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted again, exiting without saving");
            std::process::exit(EXIT_INTERRUPTED);
        }
    });

    // Live browser with login, or replayed snapshots without one
    let result = if job.replay.is_empty() {
        let email = cli
            .email
            .clone()
            .context("POE_EMAIL is not set; pass --email or set it in .env")?;
        let session = EmailCodeSession::new(
            config.session.clone(),
            Credentials::new(email),
            StdinPrompt,
        );
        let driver = ChromiumDriver::launch(&config.browser, job.selectors.clone())
            .await
            .context("Failed to start browser")?;
        dispatch(&cli.command, driver, &session, &config, &dedup, job, &cancel).await
    } else {
        tracing::info!("Replaying {} saved snapshots", job.replay.len());
        let driver = HtmlSnapshotDriver::from_files(&job.replay, job.selectors.clone())
            .context("Failed to read replay snapshots")?;
        dispatch(&cli.command, driver, &NoSession, &config, &dedup, job, &cancel).await
    };

    match result {
        Ok(report) => {
            if !cli.quiet {
                print_report(&report);
            } else if let Some(notice) = report.interrupt_notice() {
                eprintln!("{}", notice);
            }
            if report.was_interrupted() {
                std::process::exit(EXIT_INTERRUPTED);
            }
            Ok(())
        }
        Err(e) => {
            if let Some((destination, saved)) = e.saved_destination() {
                eprintln!(
                    "Saved {} records to {} before failing",
                    saved,
                    destination.display()
                );
            }
            tracing::error!("Collection failed: {}", e);
            Err(e.into())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("backscroll=info,warn"),
            1 => EnvFilter::new("backscroll=debug,info"),
            2 => EnvFilter::new("backscroll=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Resolves target, selectors and writer for a subcommand
fn build_job(command: &Command, config: &Config, dedup: &Arc<DedupStore>) -> anyhow::Result<Job> {
    let job = match command {
        Command::Transcript {
            url,
            output,
            replay,
        } => Job {
            url: url.clone(),
            selectors: RevealSelectors::infinite_scroll(
                &config.transcript.scroll_container,
                &config.transcript.trigger,
            ),
            ready: config.transcript.message_pair.clone(),
            destination: output
                .clone()
                .unwrap_or_else(|| PathBuf::from(&config.transcript.output_dir)),
            writer: Box::new(TranscriptWriter::new()),
            replay: replay.clone(),
        },
        Command::Images {
            url,
            output,
            replay,
        } => {
            let fetcher = HttpFetcher::new(&config.fetch).context("Failed to build HTTP client")?;
            let pool = AssetFetchPool::new(
                Arc::new(fetcher),
                Arc::clone(dedup),
                config.fetch.concurrency_limit,
                config.fetch.timeout(),
            );
            Job {
                url: url.clone(),
                selectors: RevealSelectors::infinite_scroll(
                    &config.images.scroll_container,
                    &config.images.trigger,
                ),
                ready: config.images.ready.clone(),
                destination: output
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(&config.images.output_dir)),
                writer: Box::new(AssetDirectoryWriter::new(pool)),
                replay: replay.clone(),
            }
        }
        Command::Metrics { output, replay } => Job {
            url: config.metrics.page_url.clone(),
            selectors: RevealSelectors::pagination(&config.metrics.next_button),
            ready: config.metrics.table.clone(),
            destination: output
                .clone()
                .unwrap_or_else(|| PathBuf::from(&config.metrics.output_file)),
            writer: Box::new(TableWriter::new()),
            replay: replay.clone(),
        },
    };

    if url::Url::parse(&job.url).is_err() {
        bail!("'{}' is not a valid URL", job.url);
    }
    Ok(job)
}

/// Picks the extractor for the subcommand and runs the harvest
async fn dispatch<D, S>(
    command: &Command,
    driver: D,
    session: &S,
    config: &Config,
    dedup: &Arc<DedupStore>,
    job: Job,
    cancel: &CancellationToken,
) -> Result<HarvestReport, HarvestError>
where
    D: PageDriver,
    S: Session<D>,
{
    match command {
        Command::Transcript { .. } => {
            let extractor = MessagePairExtractor::new(&config.transcript);
            run_job(driver, session, extractor, config, dedup, job, cancel).await
        }
        Command::Images { .. } => {
            let extractor = ImageUrlExtractor::new(&config.images);
            run_job(driver, session, extractor, config, dedup, job, cancel).await
        }
        Command::Metrics { .. } => {
            let extractor = MetricsRowExtractor::new(&config.metrics);
            run_job(driver, session, extractor, config, dedup, job, cancel).await
        }
    }
}

async fn run_job<D, S, E>(
    mut driver: D,
    session: &S,
    mut extractor: E,
    config: &Config,
    dedup: &Arc<DedupStore>,
    job: Job,
    cancel: &CancellationToken,
) -> Result<HarvestReport, HarvestError>
where
    D: PageDriver,
    S: Session<D>,
    E: ContentExtractor<D>,
{
    let reveal = RevealLoop::new(RevealSettings::from(&config.collection));
    let harvest = Harvest::new(job.url, reveal)
        .wait_for_ready(job.ready, config.browser.ready_timeout())
        .with_dedup(Arc::clone(dedup));
    let persister = CrashSafePersister::new(job.writer, job.destination);

    harvest
        .run(&mut driver, session, &mut extractor, &persister, cancel)
        .await
}

/// Handles the --dry-run mode: shows what would be collected
fn handle_dry_run(cli: &Cli, config: &Config, job: &Job) {
    println!("=== Backscroll Dry Run ===\n");

    println!("Collection:");
    println!("  Max duration: {}s", config.collection.max_duration_secs);
    println!("  Pause per step: {}ms", config.collection.pause_per_step_ms);
    println!(
        "  No-new-content limit: {}",
        config.collection.no_new_content_limit
    );

    println!("\nTarget:");
    println!("  URL: {}", job.url);
    println!("  Trigger: {}", job.selectors.trigger);
    println!("  Ready when: {}", job.ready);
    println!("  Output: {}", job.destination.display());

    if job.replay.is_empty() {
        println!("\nSession:");
        println!("  Login page: {}", config.session.login_url);
        match &cli.email {
            Some(email) => println!("  Account: {}", email),
            None => println!("  Account: (POE_EMAIL not set)"),
        }
        println!("  Headless: {}", config.browser.headless);
    } else {
        println!("\nReplay snapshots ({}):", job.replay.len());
        for path in &job.replay {
            println!("  - {}", path.display());
        }
    }

    if let Command::Images { .. } = cli.command {
        println!("\nDownloads:");
        println!("  Concurrency: {}", config.fetch.concurrency_limit);
        println!("  Timeout: {}s", config.fetch.timeout_secs);
    }

    println!("\n✓ Configuration is valid");
}
