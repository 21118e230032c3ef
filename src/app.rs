//! Lifecycle controller: owns startup order, the presentation loop and the
//! shutdown order.

use anyhow::{Context, Result};
use log::info;
use std::sync::Arc;

use crate::config::{self, Config};
use crate::pipeline::{VideoPipeline, VideoPipelineConfig};
use crate::render::{Canvas, DisplaySurface, PresentationLoop};
use crate::telemetry::{ListenerConfig, TelemetryListener, TelemetryStore};
use crate::utils::stop::StopSignal;
use crate::video::{DecodeSink, FrameStore};

/// Startup order: output device, pipeline definition, listener thread,
/// pipeline running. A pipeline or display failure here is fatal and the
/// presentation loop never starts; a stream gap later is not and shows up
/// only as the placeholder.
///
/// Shutdown order (interrupt or window close): stop the pipeline, then
/// disconnect the bus client if connected, then release the surface.
pub fn run(cfg: Config, stop: StopSignal) -> Result<()> {
    info!("{} v{} starting", config::app_name(), config::version());

    let surface = DisplaySurface::new(config::app_name(), cfg.width, cfg.height)
        .context("display initialization failed")?;

    let runtime = tokio::runtime::Runtime::new().context("cannot start async runtime")?;

    let telemetry = Arc::new(TelemetryStore::new());
    let frames = Arc::new(FrameStore::new());

    let mut pipeline = VideoPipeline::new(
        VideoPipelineConfig::from_config(&cfg),
        runtime.handle().clone(),
    );
    let sink = Arc::new(DecodeSink::new(frames.clone(), pipeline.health()));

    // detached: the listener outlives individual ticks and dies with the
    // process
    let listener = TelemetryListener::spawn(
        telemetry.clone(),
        ListenerConfig::from_config(&cfg),
        stop.clone(),
    );

    pipeline
        .start(sink)
        .context("video pipeline startup failed")?;

    let canvas = Canvas::new(cfg.width, cfg.height);
    let mut presentation = PresentationLoop::new(
        surface,
        canvas,
        frames,
        telemetry,
        cfg.tick_interval(),
        stop.clone(),
    );
    let result = presentation.run();

    info!("shutting down");
    pipeline.stop();
    listener.disconnect();
    // surface is released when the presentation loop drops, last

    result
}
