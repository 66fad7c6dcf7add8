//! framestamp: live stream grabber with network-synchronized timestamps

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use framestamp::capture::FrameIngestionPipeline;
use framestamp::cli::CliArgs;
use framestamp::clock::{AuthoritativeTimeClient, SntpAuthority};
use framestamp::input::{self, ShutdownSignal};
use framestamp::pipeline::{ActivityReporter, FrameStore};
use framestamp::snapshot::{CaptureController, NoViewer, SystemViewer, Viewer};
use framestamp::{utils, Config};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Initialize error handling and logging
    color_eyre::install()?;
    let default_filter = if args.verbose {
        "framestamp=debug"
    } else {
        "framestamp=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .with_writer(utils::console_writer)
        .init();

    info!("framestamp {} launching...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;
    let quit_key = config.quit_key()?;

    info!(
        "Stream {} at {}x{}, time server {}, output {}",
        config.stream.url,
        config.stream.width,
        config.stream.height,
        config.clock.server,
        config.output.path.display()
    );

    // Without a frame source there is nothing to capture
    utils::check_decoder(&config.decoder.program)?;
    let pipeline = FrameIngestionPipeline::spawn(&config.stream, &config.decoder)?;

    let store = Arc::new(FrameStore::new());

    let mut ingest_handle = tokio::spawn(pipeline.run(Arc::clone(&store)));

    let reporter = ActivityReporter::new(
        Arc::clone(&store),
        Duration::from_millis(config.pipeline.report_interval_ms),
    );
    let _reporter_handle = tokio::spawn(reporter.run());

    // Quitting ends the process at once, even mid-capture
    let shutdown = ShutdownSignal::new();
    let (triggers, _listener) = input::spawn_listener(
        input::stdin_source(quit_key),
        quit_key,
        shutdown.clone(),
        || {
            std::process::exit(0);
        },
    )?;

    let clock = AuthoritativeTimeClient::new(
        SntpAuthority::from_config(&config.clock),
        config.clock.max_round_trip_ms,
    );
    let viewer: Box<dyn Viewer> = if config.output.open_viewer {
        Box::new(SystemViewer)
    } else {
        Box::new(NoViewer)
    };
    let controller = CaptureController::new(
        clock,
        Arc::clone(&store),
        triggers,
        shutdown,
        viewer,
        &config.output,
    );
    let (done_tx, mut controller_done) = tokio::sync::oneshot::channel();
    thread::Builder::new()
        .name("capture-controller".into())
        .spawn(move || {
            controller.run();
            let _ = done_tx.send(());
        })?;

    // Supervise: the process lives until quit or Ctrl+C, even after the stream ends
    let mut ingest_running = true;
    loop {
        tokio::select! {
            summary = &mut ingest_handle, if ingest_running => {
                ingest_running = false;
                match summary {
                    Ok(summary) => warn!(
                        "Ingestion stopped ({} frames, {} rejected); captures will use the last frame",
                        summary.frames_published, summary.frames_rejected
                    ),
                    Err(e) => error!("Ingestion task failed: {}", e),
                }
            }
            done = &mut controller_done => {
                match done {
                    Ok(()) => break,
                    Err(_) => return Err(eyre!("capture controller panicked")),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    info!("framestamp shutting down");
    Ok(())
}
