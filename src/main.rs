use anyhow::Context;
use clap::Parser;
use page_archiver::{ArchiveService, CaptureFormat, CaptureTask, Config};
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "page-archiver")]
#[command(about = "Queue-driven web page archival service")]
#[command(version)]
struct Cli {
    #[arg(long, help = "Configuration file path (JSON)")]
    config: Option<PathBuf>,

    #[arg(long, help = "Root directory for captured artifacts")]
    save_path: Option<PathBuf>,

    #[arg(long, help = "Chrome/Chromium executable path")]
    browser_path: Option<String>,

    #[arg(long, help = "Capture formats, comma-separated (pdf,mhtml,html)")]
    formats: Option<String>,

    #[arg(long, help = "Run the browser with a visible window")]
    headed: bool,

    #[arg(long, help = "JSON file with an array of tasks to enqueue at startup")]
    tasks: Option<PathBuf>,

    #[arg(long, help = "Enable verbose logging")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    setup_logging(args.verbose);

    info!("Starting page-archiver v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args).await?;
    let service = ArchiveService::start(config).await?;

    if let Some(tasks_path) = &args.tasks {
        let raw = tokio::fs::read(tasks_path)
            .await
            .with_context(|| format!("reading task file {}", tasks_path.display()))?;
        let tasks: Vec<CaptureTask> =
            serde_json::from_slice(&raw).context("parsing task file")?;
        info!("Enqueuing {} task(s) from {}", tasks.len(), tasks_path.display());
        for task in tasks {
            // Intake-side sanity check; the service itself accepts anything.
            if url::Url::parse(&task.url).is_err() {
                warn!("Skipping task with unparseable URL: {}", task.url);
                continue;
            }
            service.enqueue(task).await;
        }
    }

    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Received shutdown signal");

    service.shutdown().await;
    info!("page-archiver stopped");
    Ok(())
}

async fn load_config(args: &Cli) -> anyhow::Result<Config> {
    let mut config = if let Some(path) = &args.config {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&contents).context("parsing config file")?
    } else {
        Config::default()
    };

    if let Some(save_path) = &args.save_path {
        config.save_path = save_path.clone();
    }
    if let Some(browser_path) = &args.browser_path {
        config.browser_path = Some(browser_path.clone());
    }
    if let Some(formats) = &args.formats {
        config.formats = CaptureFormat::parse_list(formats)?;
    }
    if args.headed {
        config.headless = false;
    }

    config.validate()?;
    info!("Save path: {}", config.save_path.display());
    info!("Capture formats: {:?}", config.formats);
    Ok(config)
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}
