//! Cropcast viewer — entry point.
//!
//! ```text
//! cropcast-viewer                  Listen with defaults
//! cropcast-viewer --config <path>  Load a custom config TOML
//! cropcast-viewer --listen <addr>  Override the listen address
//! cropcast-viewer --gen-config     Write default config to stdout
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::FramedRead;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cropcast_core::error::CropError;
use cropcast_core::viewer::{ViewerCodec, ViewerMessage};

use cropcast_viewer::config::ViewerConfig;
use cropcast_viewer::surface::SurfaceState;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "cropcast-viewer", about = "Cropcast crop-stream viewer")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "cropcast-viewer.toml")]
    config: PathBuf,

    /// Listen address (overrides config). Example: 0.0.0.0:7401
    #[arg(short, long)]
    listen: Option<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ViewerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ViewerConfig::load(&cli.config);
    if let Some(addr) = cli.listen {
        config.network.listen_address = addr;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("cropcast-viewer v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Bind the listener ────────────────────────────────────

    let listener = TcpListener::bind(&config.network.listen_address).await?;
    info!("viewer listening on {}", config.network.listen_address);

    let mirror = if config.surface.mirror_file.is_empty() {
        None
    } else {
        info!("mirroring the latest frame to {}", config.surface.mirror_file);
        Some(PathBuf::from(&config.surface.mirror_file))
    };

    let running = Arc::new(AtomicBool::new(true));

    // Ctrl-C handler.
    let ctrl_running = running.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received — shutting down");
        ctrl_running.store(false, Ordering::SeqCst);
    });

    // ── 2. Accept sharers until stopped ─────────────────────────

    while running.load(Ordering::SeqCst) {
        let accept = tokio::select! {
            result = listener.accept() => result,
            _ = wait_for_stop(&running) => break,
        };

        let (stream, peer) = match accept {
            Ok(pair) => pair,
            Err(e) => {
                warn!("accept error: {e}");
                continue;
            }
        };

        info!("sharer connected from {peer}");

        let mut surface = SurfaceState::new(mirror.clone());
        if let Err(e) = serve_sharer(stream, &mut surface, &running).await {
            warn!("session with {peer} failed: {e}");
        }
        info!(
            "session with {peer} ended after {} frames; back to listening",
            surface.frames()
        );
    }

    info!("viewer stopped");
    Ok(())
}

// ── Session loop ─────────────────────────────────────────────────

/// Drive one sharer session over its framed stream.
///
/// Returns after a Bye, when the sharer hangs up, or when the viewer
/// is shutting down; protocol errors end the session early.
async fn serve_sharer(
    stream: TcpStream,
    surface: &mut SurfaceState,
    running: &Arc<AtomicBool>,
) -> Result<(), CropError> {
    let mut reader = FramedRead::new(stream, ViewerCodec::new());

    loop {
        if !running.load(Ordering::SeqCst) {
            return Ok(());
        }

        let next = tokio::select! {
            message = reader.next() => message,
            _ = wait_for_stop(running) => return Ok(()),
        };

        match next {
            Some(Ok(ViewerMessage::Hello(spec))) => surface.open(spec),
            Some(Ok(ViewerMessage::Frame(frame))) => surface.present(frame).await,
            Some(Ok(ViewerMessage::Bye)) => return Ok(()),
            Some(Err(e)) => return Err(e),
            // Sharer hung up without a Bye.
            None => return Ok(()),
        }
    }
}

/// Async helper: resolves when `running` becomes false.
async fn wait_for_stop(running: &Arc<AtomicBool>) {
    loop {
        if !running.load(Ordering::SeqCst) {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
}
