//! HUD layout: the video frame (or placeholder) with the four telemetry
//! readouts on top.

use super::canvas::Canvas;
use super::font;
use crate::telemetry::{Channel, TelemetrySnapshot};
use crate::video::DecodedFrame;

/// Marker shown for a channel that has not reported yet.
pub const NOT_AVAILABLE: &str = "N/A";

const PLACEHOLDER: &str = "NO VIDEO SIGNAL";

const TEXT_SCALE: usize = 2;
const READOUT_X: usize = 5;
const READOUT_Y0: usize = 5;
const READOUT_SPACING: usize = 30;

const WHITE: (u8, u8, u8) = (255, 255, 255);

fn channel_color(channel: Channel) -> (u8, u8, u8) {
    match channel {
        Channel::Temperature => (255, 255, 0),
        Channel::Humidity => (0, 255, 255),
        Channel::Light => (255, 255, 255),
        Channel::Distance => (255, 0, 255),
    }
}

/// Compose one tick: clear, frame or placeholder, then the readouts.
pub fn compose(canvas: &mut Canvas, frame: Option<&DecodedFrame>, snapshot: &TelemetrySnapshot) {
    canvas.clear();

    match frame {
        Some(frame) => canvas.blit(frame),
        None => draw_placeholder(canvas),
    }

    for (i, channel) in Channel::ALL.iter().enumerate() {
        let value = snapshot.get(*channel).unwrap_or(NOT_AVAILABLE);
        let line = format!("{}: {} {}", channel.label(), value, channel.unit());
        font::draw_text(
            canvas,
            READOUT_X,
            READOUT_Y0 + i * READOUT_SPACING,
            &line,
            channel_color(*channel),
            TEXT_SCALE,
        );
    }
}

fn draw_placeholder(canvas: &mut Canvas) {
    let w = font::text_width(PLACEHOLDER, TEXT_SCALE);
    let h = font::text_height(TEXT_SCALE);
    let x = canvas.width().saturating_sub(w) / 2;
    let y = canvas.height().saturating_sub(h) / 2;
    font::draw_text(canvas, x, y, PLACEHOLDER, WHITE, TEXT_SCALE);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::TelemetryStore;

    fn any_pixel_set(canvas: &Canvas) -> bool {
        canvas.data().iter().any(|&b| b != 0)
    }

    fn region_has_color(canvas: &Canvas, y0: usize, y1: usize, color: (u8, u8, u8)) -> bool {
        for y in y0..y1 {
            for x in 0..canvas.width() {
                if canvas.pixel(x, y) == color {
                    return true;
                }
            }
        }
        false
    }

    #[test]
    fn no_frame_renders_centered_placeholder() {
        let mut canvas = Canvas::new(320, 240);
        compose(&mut canvas, None, &TelemetrySnapshot::default());

        // white pixels around the vertical center
        assert!(region_has_color(&canvas, 110, 130, (255, 255, 255)));
    }

    #[test]
    fn frame_is_composited_at_origin() {
        let mut canvas = Canvas::new(320, 240);
        let frame = DecodedFrame::from_rgb(
            vec![60; DecodedFrame::expected_len(320, 240)],
            320,
            240,
        )
        .unwrap();

        compose(&mut canvas, Some(&frame), &TelemetrySnapshot::default());

        // a corner away from any readout shows frame pixels
        assert_eq!(canvas.pixel(319, 239), (60, 60, 60));
    }

    #[test]
    fn readouts_render_in_channel_colors() {
        let store = TelemetryStore::new();
        store.update("temperature", "22.5".into());
        store.update("distance", "150".into());

        let mut canvas = Canvas::new(320, 240);
        compose(&mut canvas, None, &store.snapshot());

        // temperature row is yellow, distance row magenta
        assert!(region_has_color(&canvas, 5, 19, (255, 255, 0)));
        assert!(region_has_color(&canvas, 95, 109, (255, 0, 255)));
        // humidity never reported but its N/A line still renders in cyan
        assert!(region_has_color(&canvas, 35, 49, (0, 255, 255)));
    }

    #[test]
    fn unset_and_set_channels_render_differently() {
        let store = TelemetryStore::new();
        let mut before = Canvas::new(320, 240);
        compose(&mut before, None, &store.snapshot());

        store.update("temperature", "22.5".into());
        let mut after = Canvas::new(320, 240);
        compose(&mut after, None, &store.snapshot());

        assert_ne!(before.data(), after.data());
    }

    #[test]
    fn compose_always_draws_something() {
        let mut canvas = Canvas::new(320, 240);
        compose(&mut canvas, None, &TelemetrySnapshot::default());
        assert!(any_pixel_set(&canvas));
    }
}
