//! sentineld - waste triage daemon
//!
//! This daemon:
//! 1. Loads configuration (file named by SENTINEL_CONFIG, env overrides, CLI flags)
//! 2. Builds the configured classifier backend
//! 3. Feeds synthetic camera frames into a pipeline session
//! 4. Alerts on rejected items and logs periodic statistics

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

use trash_sentinel::{
    ingest, notify::BellNotifier, notify::LogNotifier, AcceptedCategories, BackendKind,
    BackendRegistry, BinPreset, Notifier, Pipeline, PipelineEvent, PipelineHandle,
    SentinelConfig, SourceConfig, SyntheticSource, Verdict,
};

const STATS_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Stop after this many seconds (0 runs until Ctrl-C).
    #[arg(long, default_value_t = 0)]
    seconds: u64,
    /// Frames per second from the synthetic camera.
    #[arg(long)]
    fps: Option<u32>,
    /// Classifier backend: synthetic, local or remote.
    #[arg(long)]
    backend: Option<BackendKind>,
    /// Bin to guard: yellow, purple or black.
    #[arg(long)]
    bin: Option<BinPreset>,
    /// Comma-separated accepted categories. Overrides the bin defaults.
    #[arg(long, value_delimiter = ',')]
    accepted: Option<Vec<String>>,
    /// Ring the terminal bell on rejection.
    #[arg(long)]
    bell: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = SentinelConfig::load()?;
    if let Some(fps) = args.fps {
        cfg.source.fps = fps;
    }
    if let Some(kind) = args.backend {
        cfg.backend.kind = kind;
    }
    if let Some(bin) = args.bin {
        cfg.triage.bin = bin;
    }
    if let Some(accepted) = args.accepted.clone() {
        cfg.triage.accepted = Some(accepted);
    }
    cfg.validate()?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .context("error setting Ctrl-C handler")?;
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;
    runtime.block_on(run(cfg, &args, &stop))
}

async fn run(cfg: SentinelConfig, args: &Args, stop: &AtomicBool) -> Result<()> {
    let registry = BackendRegistry::from_settings(&cfg)?;
    log::info!("registered backends: {}", registry.list().join(", "));
    let backend = registry.build_default()?;

    let accepted: AcceptedCategories = cfg.accepted();
    log::info!(
        "guarding {} bin ({}); accepted: [{}]",
        cfg.triage.bin,
        cfg.triage.bin.description(),
        accepted
    );

    let notifier: Box<dyn Notifier> = if args.bell {
        Box::new(BellNotifier::stderr())
    } else {
        Box::new(LogNotifier)
    };
    let (pipeline, handle) = Pipeline::new(backend, accepted);
    let events = handle.subscribe();
    let session = pipeline.with_notifier(notifier).spawn();
    let reporter = tokio::spawn(report(handle.clone(), events));

    let mut source = SyntheticSource::new(SourceConfig {
        width: cfg.source.width,
        height: cfg.source.height,
        target_fps: cfg.source.fps,
    })?;
    source.connect()?;

    let until = (args.seconds > 0).then(|| Instant::now() + Duration::from_secs(args.seconds));
    log::info!("sentineld running. press Ctrl-C to stop");
    let pumped = ingest::pump(&mut source, &handle, stop, until).await?;

    log::info!("shutdown requested, stopping pipeline...");
    handle.shutdown();
    session
        .await
        .map_err(|e| anyhow!("pipeline task failed: {}", e))?;
    reporter.abort();
    let snapshot = handle.snapshot();

    log::info!(
        "frames: captured={} submitted={} refused_at_inbox={} dropped(in_flight={}, cooldown={}, paused={})",
        source.stats().frames_captured,
        pumped.submitted,
        pumped.refused,
        snapshot.dropped.in_flight,
        snapshot.dropped.cooldown,
        snapshot.dropped.paused
    );
    Ok(())
}

async fn report(handle: PipelineHandle, mut events: broadcast::Receiver<PipelineEvent>) {
    let mut ticker = tokio::time::interval(STATS_INTERVAL);
    ticker.tick().await;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(PipelineEvent::Batch { active_detection: Some(active), verdict, .. }) => {
                    if verdict == Verdict::Permitted {
                        log::info!("ok: {}", active);
                    } else {
                        log::debug!("batch: {} -> {:?}", active, verdict);
                    }
                }
                Ok(PipelineEvent::Batch { failed: true, .. }) => {
                    log::debug!("classifier returned no result");
                }
                Ok(PipelineEvent::FrameResized(size)) => log::info!("frame size now {}", size),
                Ok(PipelineEvent::BackendSwapped { name, .. }) => {
                    log::info!("backend swapped to {}", name)
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    log::debug!("reporter skipped {} events", n)
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = ticker.tick() => {
                let snapshot = handle.snapshot();
                log::info!(
                    "stats: detections={} rejections={} acceptance={}% state={:?} backend={} ready={}",
                    snapshot.statistics.detection_count,
                    snapshot.statistics.rejection_count,
                    snapshot.statistics.acceptance_rate,
                    snapshot.state,
                    snapshot.backend,
                    snapshot.backend_ready
                );
            }
        }
    }
}
