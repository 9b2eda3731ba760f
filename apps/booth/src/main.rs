use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use booth_core::{BoothOptions, PhotoBooth, SharedViewport};
use captioning::{CaptionService, HttpCaptionService, MissingCaptionService};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod session;

use config::{load_settings, Settings};

#[derive(Parser, Debug)]
#[command(name = "booth", about = "Instant photo booth with AI captions")]
struct Cli {
    /// Config file; defaults to ./booth.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Capture each image in turn and print the resulting canvas.
    Shoot {
        #[arg(required = true)]
        images: Vec<PathBuf>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Drive the canvas interactively from stdin.
    Session {
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn build_booth(
    settings: &Settings,
    viewport: Arc<SharedViewport>,
    seed: Option<u64>,
) -> Result<Arc<PhotoBooth>> {
    let captioner: Arc<dyn CaptionService> = match settings.caption_config() {
        Some(caption_config) => {
            let service = HttpCaptionService::new(caption_config)
                .context("failed to build captioning client")?;
            info!(url = %service.generate_url(), "booth: captioning enabled");
            Arc::new(service)
        }
        None => {
            warn!("no captioning api key configured; photos will stay uncaptioned");
            Arc::new(MissingCaptionService)
        }
    };

    let booth = PhotoBooth::with_options(
        captioner,
        viewport,
        BoothOptions {
            locale: settings.locale(),
            development_delay: settings.development_delay(),
            seed,
        },
    );
    info!(locale = %booth.locale(), "booth: ready");
    Ok(booth)
}

async fn shoot(booth: &Arc<PhotoBooth>, settings: &Settings, images: &[PathBuf]) -> Result<()> {
    for path in images {
        let image = session::load_image(path).await?;
        let id = session::take_when_ready(booth, image, settings.development_delay()).await?;
        info!(photo_id = %id, path = %path.display(), "shoot: captured");
    }
    booth.wait_idle().await;

    let snapshot = booth.snapshot().await;
    println!("{}", serde_json::to_string_pretty(&snapshot.summaries())?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let viewport = Arc::new(SharedViewport::new(settings.viewport()));
    info!(
        width = settings.viewport_width,
        height = settings.viewport_height,
        "booth: starting"
    );

    match cli.command {
        Command::Shoot { images, seed } => {
            let booth = build_booth(&settings, viewport, seed)?;
            shoot(&booth, &settings, &images).await
        }
        Command::Session { seed } => {
            let booth = build_booth(&settings, viewport.clone(), seed)?;
            println!("{}", session::HELP);
            session::run(booth, viewport).await
        }
    }
}
