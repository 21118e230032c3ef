//! Decoded-frame hand-off between the decode pipeline and the
//! presentation loop.

mod frame_store;
mod sink;

pub use frame_store::FrameStore;
pub use sink::DecodeSink;

/// Pixel layout of decoded frames. The link carries exactly one format:
/// interleaved 3-channel, one byte per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
        }
    }
}

/// Fully reconstructed image buffer ready for display.
///
/// Invariant: `data.len() == width * height * 3`. Construction goes through
/// [`DecodedFrame::from_rgb`], which enforces it; frames are immutable after
/// that, so they can be shared as `Arc<DecodedFrame>` snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl DecodedFrame {
    /// Expected byte length of a frame with the given geometry.
    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * PixelFormat::Rgb24.bytes_per_pixel()
    }

    /// Build a frame from an owned RGB24 buffer. Returns None when the
    /// buffer does not match the geometry.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> Option<DecodedFrame> {
        if data.len() != Self::expected_len(width, height) {
            return None;
        }
        Some(DecodedFrame {
            data,
            width,
            height,
            format: PixelFormat::Rgb24,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_buffer_is_accepted() {
        let frame = DecodedFrame::from_rgb(vec![0u8; 4 * 2 * 3], 4, 2);
        assert!(frame.is_some());
        let frame = frame.unwrap();
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.format(), PixelFormat::Rgb24);
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        assert!(DecodedFrame::from_rgb(vec![0u8; 4 * 2 * 3 - 1], 4, 2).is_none());
        assert!(DecodedFrame::from_rgb(vec![0u8; 4 * 2 * 3 + 1], 4, 2).is_none());
    }
}
