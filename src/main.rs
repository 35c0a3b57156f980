mod api;
mod checker;
mod classify;
mod config;
mod error;
mod probe;
mod report;
mod resolver;
mod traits;
mod types;

#[cfg(test)]
mod testutil;

use anyhow::{bail, Result};
use checker::Checker;
use clap::{Parser, Subcommand};
use config::Settings;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "distcheck")]
#[command(version, about = "Check that distfiles referenced by a package index can still be downloaded", long_about = None)]
struct Cli {
    /// Settings file (defaults to ~/.config/distcheck/config.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Root of the checkout containing packages-index/
    #[arg(long, env = "REPO_ROOT", global = true)]
    repo_root: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<f64>,

    /// How many URLs to check at once
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every distfile URL of every board-image manifest and print the results
    Check,
    /// Check the given URLs (direct or mirror://) against the mirror registry
    Url {
        /// URLs to check
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Check everything and write a status report (e.g., distcheck generate -o status.json)
    Generate {
        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Serve the latest status report over HTTP
    Serve {
        /// Bind address
        #[arg(long, env = "DISTCHECK_BIND")]
        bind: Option<String>,

        /// Port
        #[arg(short, long, env = "DISTCHECK_PORT")]
        port: Option<u16>,

        /// URL or local path of the status report to serve
        #[arg(long, env = "RESULTS_URL")]
        results_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(root) = cli.repo_root {
        settings.index.repo_root = root;
    }
    if let Some(timeout) = cli.timeout {
        settings.checker.timeout_secs = timeout;
    }
    if let Some(concurrency) = cli.concurrency {
        settings.checker.concurrency = concurrency;
    }

    init_logging(&settings.logging.level);

    match cli.command {
        Commands::Check => handle_check(&settings).await?,
        Commands::Url { urls } => handle_url(&settings, &urls).await?,
        Commands::Generate { output } => handle_generate(&settings, output).await?,
        Commands::Serve {
            bind,
            port,
            results_url,
        } => handle_serve(&settings, bind, port, results_url).await?,
    }

    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn build_checker(settings: &Settings) -> Result<Checker> {
    let registry = config::load_mirror_registry(&settings.index.mirror_config_path())?;
    if registry.is_empty() {
        warn!("No mirrors defined; every mirror:// url will be reported as unavailable");
    }

    let checker = Checker::http(
        Arc::new(registry),
        settings.checker.timeout()?,
        &settings.checker.user_agent,
    )?
    .with_concurrency(settings.checker.concurrency);
    Ok(checker)
}

// --- Handlers ---

async fn handle_check(settings: &Settings) -> Result<()> {
    let checker = build_checker(settings)?;
    let manifests =
        config::load_board_manifests(&settings.index.manifests_path(), &settings.index.repo_root)?;

    for manifest in manifests.iter().filter(|m| !m.distfiles.is_empty()) {
        println!("\n== {} ==", manifest.path.display());

        for distfile in &manifest.distfiles {
            let results = checker.check_all(&distfile.urls).await;
            for (url, result) in distfile.urls.iter().zip(results) {
                println!("-- distfile: {} --", distfile.name);
                println!("   url: {}", url);
                println!("{}", serde_json::to_string_pretty(&result?)?);
            }
        }
    }

    Ok(())
}

async fn handle_url(settings: &Settings, urls: &[String]) -> Result<()> {
    let checker = build_checker(settings)?;

    let results = checker
        .check_all(urls)
        .await
        .into_iter()
        .collect::<error::Result<Vec<_>>>()?;

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

async fn handle_generate(settings: &Settings, output: Option<PathBuf>) -> Result<()> {
    info!("Repo root: {:?}", settings.index.repo_root);

    let checker = build_checker(settings)?;
    let manifests =
        config::load_board_manifests(&settings.index.manifests_path(), &settings.index.repo_root)?;

    let report = report::generate(&checker, &manifests).await?;

    let output = output.unwrap_or_else(|| settings.report.output.clone());
    report::write_report(&report, &output).await?;

    let summary = report::Summary::of(&report);
    println!("[SUMMARY]");
    println!("  Boards: {}", summary.boards);
    println!("  URLs checked: {}", summary.urls);
    println!("  URLs available: {}", summary.available);
    println!("  Output: {}", output.display());

    Ok(())
}

async fn handle_serve(
    settings: &Settings,
    bind: Option<String>,
    port: Option<u16>,
    results_url: Option<String>,
) -> Result<()> {
    let results_url = results_url.unwrap_or_else(|| settings.server.results_url.clone());
    if settings.server.refresh_interval_secs == 0 {
        bail!("server.refresh_interval_secs must be greater than zero");
    }

    let cache = api::StatusCache::new(api::ReportSource::parse(&results_url))?;
    if !cache.refresh().await {
        warn!("Starting without a status report; will retry on the next refresh");
    }
    let refresher = cache.spawn_refresh(Duration::from_secs(settings.server.refresh_interval_secs));

    let state = api::AppState {
        cache,
        results_url: results_url.clone(),
    };
    let app = api::create_router(state).layer(TraceLayer::new_for_http());

    let bind_addr = bind.unwrap_or_else(|| settings.server.bind_address.clone());
    let port = port.unwrap_or(settings.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port).parse()?;

    info!("Listening on {}", addr);
    info!("Serving status report from {}", results_url);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    refresher.abort();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
