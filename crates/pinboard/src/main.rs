//! `pinboard` - turns mail into pinboard records
//!
//! ```bash
//! # Poll the mailbox configured in ~/.config/pinboard/config.json
//! pinboard crawl
//!
//! # Poll every 30 seconds with a password from the environment
//! PINBOARD_PASSWORD=hunter2 pinboard crawl --config ./pinboard.json --interval 30
//!
//! # Inspect what was stored
//! pinboard show Pin-20250703-081500-alice-example-com.cmsg
//! pinboard image-info beachday.rgba
//! ```
//!
//! Ctrl+C stops the crawler. Messages already deleted in the current session
//! are committed with QUIT before the process exits.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use pinboard_core::{Crawler, CrawlerConfig, MailCrawler, RawImage, RecordStore};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Mail ingest for pinboard.
#[derive(Parser, Debug)]
#[command(name = "pinboard")]
#[command(about = "Turns mail into pinboard records")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the mailbox and store every message as a record
    Crawl {
        /// Configuration file (defaults to the platform config directory)
        #[arg(long, env = "PINBOARD_CONFIG")]
        config: Option<PathBuf>,

        /// Mailbox password, overriding the configuration file
        #[arg(long, env = "PINBOARD_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Seconds between the starts of two polling cycles
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Print a stored record
    Show {
        /// Record file (.cmsg)
        file: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the dimensions of a normalized image
    ImageInfo {
        /// Image file (.rgba)
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pinboard=info,pinboard_core=info,pinboard_pop3=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match Args::parse().command {
        Command::Crawl {
            config,
            password,
            interval,
        } => crawl(config, password, interval).await,
        Command::Show { file, json } => show(&file, json),
        Command::ImageInfo { file } => image_info(&file),
    }
}

async fn crawl(
    config_path: Option<PathBuf>,
    password: Option<String>,
    interval: Option<u64>,
) -> Result<()> {
    let path = config_path.unwrap_or_else(CrawlerConfig::default_path);
    let mut config = CrawlerConfig::load(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    if let Some(password) = password {
        config.password = password;
    }
    if let Some(secs) = interval {
        config.poll_interval = Duration::from_secs(secs);
    }
    config.validate().context("Invalid configuration")?;

    info!(config = ?config, "Starting pinboard crawler");

    let (tx, mut rx) = mpsc::channel(1);
    let cancel = CancellationToken::new();
    let crawler = MailCrawler::from_config(&config);
    let task = tokio::spawn(crawler.crawl(tx, cancel.clone(), config.poll_interval));

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received, stopping gracefully");
                shutdown.cancel();
            }
            Err(e) => error!(error = %e, "Cannot listen for Ctrl+C"),
        }
    });

    let mut received = 0usize;
    while let Some(record) = rx.recv().await {
        received += 1;
        info!(
            record = %record.filename(),
            sender = %record.sender_name,
            subject = %record.short_text,
            images = record.image_names.len(),
            "Received record"
        );
    }

    task.await.context("Crawler task failed")?;
    info!(received, "Crawler stopped");

    if !cancel.is_cancelled() {
        bail!("Crawler gave up, see the log for the cause");
    }
    Ok(())
}

fn show(file: &Path, json: bool) -> Result<()> {
    let record = RecordStore::new(".")
        .load(file)
        .with_context(|| format!("Failed to read record {}", file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!("Kind:    {}", record.kind.display_name());
    println!("Date:    {}", record.timestamp.to_rfc2822());
    println!("From:    {}", record.sender_name);
    println!("Subject: {}", record.short_text);
    for path in record
        .image_names
        .iter()
        .chain(&record.video_names)
        .chain(&record.audio_names)
    {
        println!("Media:   {}", path.display());
    }
    println!();
    println!("{}", record.long_text);
    Ok(())
}

fn image_info(file: &Path) -> Result<()> {
    let image = RawImage::load(file)
        .with_context(|| format!("Failed to read image {}", file.display()))?;
    println!(
        "{}: {}x{} RGBA, {} pixel bytes",
        file.display(),
        image.width,
        image.height,
        image.pixels.len()
    );
    Ok(())
}
