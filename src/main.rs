//! spshrink: shrink photo libraries on SharePoint/OneDrive.
//!
//! `resize` walks a document library through Microsoft Graph, downscales
//! images whose longer edge exceeds a bound, keeps a local copy of each
//! original and writes the result back as `*_2k`. `mbox` exports Dovecot
//! Maildirs to mbox files for migration.

#![warn(clippy::all)]

mod auth;
mod cli;
mod config;
mod graph;
mod mbox;
mod resize;
pub mod retry;
mod shutdown;
mod types;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use auth::cache::TokenCache;
use auth::endpoints::Endpoints;
use cli::Command;
use config::{MboxConfig, ResizeConfig};
use graph::GraphClient;

/// Create `<log_dir>/resize_<site>_<timestamp>.log`.
fn create_log_file(log_dir: &Path, site: &str) -> anyhow::Result<(PathBuf, File)> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let path = log_dir.join(format!("resize_{}_{}.log", site, stamp));
    let file = File::create(&path)
        .with_context(|| format!("Failed to create log file {}", path.display()))?;
    Ok((path, file))
}

/// Console logging, plus an ANSI-free copy to `log_file` when given.
fn init_logging(level: types::LogLevel, log_file: Option<File>) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()));
    let file_layer = log_file.map(|file| {
        fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(Mutex::new(file))
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();
}

async fn run_resize(config: ResizeConfig, log_path: Option<PathBuf>) -> anyhow::Result<()> {
    tracing::info!("Starting spshrink resize");
    tracing::info!("   • Site/library: {} / {}", config.site, config.library);
    tracing::info!(
        "   • Start folder: {}",
        if config.start_folder.is_empty() {
            "(root)"
        } else {
            config.start_folder.as_str()
        }
    );
    tracing::info!("   • Max edge: {}px, JPEG quality {}", config.max_edge, config.jpeg_quality);
    tracing::info!("   • Mode: {}", config.mode);
    tracing::info!("   • Cloud: {}", config.cloud.as_str());
    if config.backup.enabled {
        tracing::info!("   • Local backup: {}", config.backup.root.display());
    } else {
        tracing::info!("   • Local backup: disabled");
    }
    if config.dry_run {
        tracing::info!("   • DRY RUN: nothing will be changed remotely");
    }
    tracing::debug!(?config, "Resolved configuration");

    let http = reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .context("Failed to build HTTP client")?;
    let endpoints = Endpoints::for_cloud(config.cloud);
    let api_root = endpoints.graph_api();

    let cache = TokenCache::open(&config.token_directory, &config.tenant, &config.client_id).await?;
    tracing::debug!("Token cache: {}", cache.path().display());
    let authenticator = Arc::new(auth::Authenticator::new(
        http.clone(),
        endpoints,
        &config.tenant,
        &config.client_id,
        cache,
    ));
    let token = authenticator.acquire().await.context("Sign-in failed")?;

    let graph = GraphClient::new(http, &api_root, token, authenticator)?;
    let site_id = graph
        .resolve_site(&config.site)
        .await
        .with_context(|| format!("Failed to resolve site '{}'", config.site))?;
    let drive_id = graph
        .resolve_drive(&site_id, &config.library)
        .await
        .with_context(|| format!("Failed to resolve library '{}'", config.library))?;
    let drive = graph.into_drive(drive_id);
    let start_id = drive
        .resolve_start(&config.start_folder)
        .await
        .with_context(|| format!("Failed to resolve start folder '{}'", config.start_folder))?;
    tracing::debug!(drive = drive.drive_id(), start = %start_id, "Resolved start item");

    let shutdown_token = shutdown::install_signal_handler()?;
    let started = Instant::now();
    let report = resize::Pipeline::new(&drive, &config)
        .run(&start_id, &shutdown_token)
        .await;
    report.summary.log(started.elapsed(), log_path.as_deref());

    if let Some(e) = report.aborted {
        anyhow::bail!("Walk aborted after a listing failure: {}", e);
    }
    Ok(())
}

async fn run_mbox(config: MboxConfig) -> anyhow::Result<()> {
    tracing::debug!(?config, "Resolved configuration");
    let shutdown_token = shutdown::install_signal_handler()?;
    mbox::run(&config, shutdown_token).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    match cli.command {
        Command::Resize(args) => {
            let config = ResizeConfig::from_cli(args)?;
            let (log_path, log_file) = create_log_file(&config.log_dir, &config.safe_site_name())?;
            init_logging(cli.log_level, Some(log_file));
            run_resize(config, Some(log_path)).await
        }
        Command::Mbox(args) => {
            init_logging(cli.log_level, None);
            run_mbox(MboxConfig::from_cli(args)).await
        }
    }
}
