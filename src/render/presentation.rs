//! Fixed-cadence presentation loop.
//!
//! Runs on the main thread. Each tick snapshots the frame store and the
//! telemetry store, composes the HUD and presents it, then sleeps to the
//! next tick boundary. The loop is the only consumer of either store and
//! the only writer to the display; it never waits on a producer beyond the
//! stores' bounded lock holds.

use anyhow::Result;
use log::info;
use std::sync::Arc;
use std::time::Duration;

use super::canvas::Canvas;
use super::hud;
use super::surface::DisplaySurface;
use super::ticker::TickClock;
use crate::telemetry::TelemetryStore;
use crate::utils::stop::StopSignal;
use crate::video::FrameStore;

pub struct PresentationLoop {
    surface: DisplaySurface,
    canvas: Canvas,
    frames: Arc<FrameStore>,
    telemetry: Arc<TelemetryStore>,
    ticker: TickClock,
    stop: StopSignal,
}

impl PresentationLoop {
    pub fn new(
        surface: DisplaySurface,
        canvas: Canvas,
        frames: Arc<FrameStore>,
        telemetry: Arc<TelemetryStore>,
        tick_interval: Duration,
        stop: StopSignal,
    ) -> Self {
        PresentationLoop {
            surface,
            canvas,
            frames,
            telemetry,
            ticker: TickClock::new(tick_interval),
            stop,
        }
    }

    /// Run until the shutdown signal or until the window is closed.
    /// The signal is observed at tick boundaries only.
    pub fn run(&mut self) -> Result<()> {
        info!(
            "PresentationLoop: started ({:?} per tick)",
            self.ticker.interval()
        );

        let mut had_frame = false;
        let mut ticks = 0u64;

        while !self.stop.cancelled() && self.surface.is_open() {
            let frame = self.frames.take();

            // a gap is not an error; report only the transitions
            match (&frame, had_frame) {
                (Some(_), false) => info!("PresentationLoop: video signal up"),
                (None, true) => info!("PresentationLoop: video signal lost"),
                _ => {}
            }
            had_frame = frame.is_some();

            let snapshot = self.telemetry.snapshot();
            hud::compose(&mut self.canvas, frame.as_deref(), &snapshot);
            self.surface.present(self.canvas.data())?;

            ticks += 1;
            self.ticker.wait();
        }

        info!("PresentationLoop: finished ({} ticks)", ticks);
        Ok(())
    }
}
