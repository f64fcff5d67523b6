use std::path::PathBuf;

use clap::Parser;
use lumen_core::{ConfigManager, Controller};

/// Streaming controller for networked LED fixtures, speaking DDP over
/// UDP, with layered effects, playlists and calendar/solar scheduling.
#[derive(Parser, Debug)]
#[command(name = "lumen")]
#[command(about = "Lumen LED streaming controller")]
struct Args {
    /// Path to config.json (created with defaults if missing)
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Override the data directory holding entity documents
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the default frame rate
    #[arg(long)]
    fps: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = ConfigManager::new(Some(args.config));
    let mut settings = config.load()?;
    if let Some(data_dir) = args.data_dir {
        settings.data_dir = data_dir;
    }
    if let Some(fps) = args.fps {
        settings.default_fps = fps;
    }

    log::info!(
        "starting lumen: data dir {}, default {} fps, tz {}",
        settings.data_dir.display(),
        settings.default_fps,
        settings.default_timezone
    );

    let controller = Controller::new(settings)?;
    controller.start().await;

    log::info!(
        "{} fixtures, {} groups, {} virtuals loaded",
        controller.fixtures().len(),
        controller.groups().len(),
        controller.virtuals().len()
    );

    tokio::signal::ctrl_c().await?;
    log::info!("interrupt received");

    controller.shutdown().await;
    Ok(())
}
