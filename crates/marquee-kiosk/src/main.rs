//! Marquee Kiosk - Dual-Surface Video Player
//!
//! Runs the rotation controller against a collaborator-owned control server:
//! polls for PRELOAD/PLAY commands, rotates two playback surfaces, posts
//! state feedback upstream. Ships with a simulated playback engine so the
//! whole loop runs headless.

use clap::Parser;
use marquee_core::{
    engine_event_channel, feedback_channel, CommandChannel, ControlEndpoints, DisplayHost,
    PlayerConfig, RotationController, SurfaceId, VideoId,
};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

mod sim;

/// Marquee Kiosk - continuous dual-surface video display
#[derive(Parser)]
#[command(name = "marquee-kiosk")]
#[command(version)]
#[command(about = "Kiosk video player driven by a remote control server", long_about = None)]
struct Cli {
    /// Base URL of the control server (provides /poll and /feedback)
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    control_url: Url,

    /// Video to start playing before the first command arrives
    #[arg(long)]
    default_video: Option<String>,

    /// Known-embeddable video used for content substitution
    #[arg(long)]
    substitute_video: Option<String>,

    /// Give up waiting for a surface to become ready after this many ms
    #[arg(long)]
    readiness_timeout_ms: Option<u64>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Terminal-backed display host: foreground changes and notices go to the log
struct KioskHost;

impl DisplayHost for KioskHost {
    fn set_foreground(&self, surface: SurfaceId) {
        info!(surface = %surface, "surface foregrounded");
    }

    fn show_notice(&self, message: &str) {
        warn!(notice = %message, "manual-intervention notice");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(level).init();

    marquee_core::init();

    let mut config = PlayerConfig::default();
    config.default_video = cli.default_video.map(VideoId::from);
    if let Some(video) = cli.substitute_video {
        config.substitute_video = VideoId::from(video);
    }
    config.readiness_timeout_ms = cli.readiness_timeout_ms;

    let endpoints = ControlEndpoints::from_base(&cli.control_url)?;
    let (engine_tx, engine_rx) = engine_event_channel();
    let (feedback_tx, feedback_rx) = feedback_channel();

    let factory = sim::SimulatedEngineFactory::new(engine_tx);
    let host: Arc<dyn DisplayHost> = Arc::new(KioskHost);
    let controller = RotationController::new(config.clone(), &factory, host, feedback_tx);

    let channel = CommandChannel::new(&config, endpoints, controller, engine_rx, feedback_rx)?;
    channel.run().await?;

    Ok(())
}
