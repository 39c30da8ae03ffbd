//! Cropcast sharer — entry point.
//!
//! ```text
//! cropcast-sharer                  Run in the foreground
//! cropcast-sharer --config <path>  Load a custom config TOML
//! cropcast-sharer --viewer <addr>  Override the viewer address
//! cropcast-sharer --gen-config     Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cropcast_sharer::config::SharerConfig;
use cropcast_sharer::service::SharerService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "cropcast-sharer", about = "Cropcast screen-share crop sharer")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "cropcast-sharer.toml")]
    config: PathBuf,

    /// Viewer surface address, e.g. 127.0.0.1:7401 (overrides config).
    #[arg(short, long)]
    viewer: Option<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&SharerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config, then CLI overrides.
    let mut config = SharerConfig::load(&cli.config);
    if let Some(viewer) = cli.viewer {
        config.delivery.viewer_address = viewer;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    info!("cropcast-sharer v{}", env!("CARGO_PKG_VERSION"));
    info!("viewer address: {}", config.delivery.viewer_address);
    info!("crop: {}px at quality {}", config.crop.size, config.crop.jpeg_quality);
    info!("tick rate: {}/s", config.crop.tick_rate);
    if config.autosave.enabled {
        info!(
            "autosave: every {} ms to {}/",
            config.autosave.interval_ms, config.autosave.directory
        );
    }

    let service = SharerService::new(config);
    let stop = service.stop_handle();

    // Ctrl-C handler.
    let stop_clone = stop.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received — shutting down");
        stop_clone.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    let stats = service.run().await?;
    info!(
        "final: {} frames delivered, {} deliveries dropped, {} screenshots autosaved",
        stats.frames_sent, stats.dropped_deliveries, stats.screenshots
    );

    Ok(())
}
