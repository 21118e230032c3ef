use ac_ffmpeg::codec::video::frame::get_pixel_format;
use ac_ffmpeg::codec::video::scaler::VideoFrameScaler;
use ac_ffmpeg::codec::video::{VideoDecoder, VideoFrame};
use ac_ffmpeg::codec::Decoder;
use ac_ffmpeg::packet::PacketMut;
use ac_ffmpeg::time::{TimeBase, Timestamp};

/// H.264 software decoder producing packed RGB24 frames at a fixed output
/// size.
///
/// Decoded frames come out of FFmpeg in whatever planar format the stream
/// uses (normally yuv420p); a cached scaler converts and resizes them to the
/// configured RGB24 geometry, and stride padding is stripped so the output
/// buffer is exactly width × height × 3 bytes.
pub struct H264Decoder {
    decoder: VideoDecoder,
    scaler: Option<VideoFrameScaler>,
    /// Source geometry the cached scaler was built for.
    source_dims: Option<(usize, usize)>,
    target_width: usize,
    target_height: usize,
    /// Reusable output buffer to avoid a per-frame allocation.
    rgb_buffer: Vec<u8>,
    frame_count: i64,
}

unsafe impl Send for H264Decoder {}

impl H264Decoder {
    pub fn new(target_width: u32, target_height: u32) -> Result<Self, ac_ffmpeg::Error> {
        let decoder = VideoDecoder::builder("h264")?
            .time_base(TimeBase::new(1, 90_000))
            .build()?;

        Ok(H264Decoder {
            decoder,
            scaler: None,
            source_dims: None,
            target_width: target_width as usize,
            target_height: target_height as usize,
            rgb_buffer: Vec::new(),
            frame_count: 0,
        })
    }

    /// Decode one Annex B access unit. Returns the RGB24 pixels plus the
    /// output geometry, or `None` while the decoder is still buffering or
    /// when decoding fails.
    pub fn decode(&mut self, h264_data: &[u8]) -> Option<(Vec<u8>, u32, u32)> {
        let pts = self.next_pts();
        let packet = PacketMut::from(h264_data).with_pts(pts).freeze();

        if self.decoder.try_push(packet).is_err() {
            log::warn!("H264Decoder: failed to push packet {}", self.frame_count);
            return None;
        }

        match self.decoder.take() {
            Ok(Some(frame)) => self.to_rgb(frame),
            Ok(None) => None,
            Err(e) => {
                log::warn!("H264Decoder: take() error: {}", e);
                None
            }
        }
    }

    fn to_rgb(&mut self, frame: VideoFrame) -> Option<(Vec<u8>, u32, u32)> {
        let w = frame.width();
        let h = frame.height();

        if self.source_dims != Some((w, h)) {
            let scaler = VideoFrameScaler::builder()
                .source_pixel_format(frame.pixel_format())
                .source_width(w)
                .source_height(h)
                .target_pixel_format(get_pixel_format("rgb24"))
                .target_width(self.target_width)
                .target_height(self.target_height)
                .build();
            match scaler {
                Ok(s) => {
                    self.scaler = Some(s);
                    self.source_dims = Some((w, h));
                }
                Err(e) => {
                    log::warn!("H264Decoder: cannot build scaler: {}", e);
                    return None;
                }
            }
        }

        let rgb = match self.scaler.as_mut()?.scale(&frame) {
            Ok(f) => f,
            Err(e) => {
                log::warn!("H264Decoder: scale error: {}", e);
                return None;
            }
        };

        let planes = rgb.planes();
        let plane = &planes[0];
        let row_len = self.target_width * 3;
        self.rgb_buffer.resize(row_len * self.target_height, 0);
        copy_rows(
            &mut self.rgb_buffer,
            plane.data(),
            plane.line_size(),
            row_len,
            self.target_height,
        );

        Some((
            self.rgb_buffer.clone(),
            self.target_width as u32,
            self.target_height as u32,
        ))
    }

    #[inline]
    fn next_pts(&mut self) -> Timestamp {
        self.frame_count += 1;
        Timestamp::new(self.frame_count, TimeBase::new(1, 90_000))
    }
}

/// Copy rows from a stride-padded source plane into a contiguous buffer.
#[inline]
fn copy_rows(dst: &mut [u8], src: &[u8], stride: usize, row_len: usize, rows: usize) {
    // fast path: no padding
    if stride == row_len && src.len() >= row_len * rows {
        dst.copy_from_slice(&src[..row_len * rows]);
        return;
    }

    for r in 0..rows {
        let src_start = r * stride;
        let dst_start = r * row_len;
        if src_start + row_len > src.len() || dst_start + row_len > dst.len() {
            break;
        }
        dst[dst_start..dst_start + row_len].copy_from_slice(&src[src_start..src_start + row_len]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_rows_without_padding_is_verbatim() {
        let src: Vec<u8> = (0..24).collect();
        let mut dst = vec![0u8; 24];
        copy_rows(&mut dst, &src, 6, 6, 4);
        assert_eq!(dst, src);
    }

    #[test]
    fn copy_rows_strips_stride_padding() {
        // two rows of 4 payload bytes with 2 bytes padding each
        let src = vec![1, 2, 3, 4, 0xEE, 0xEE, 5, 6, 7, 8, 0xEE, 0xEE];
        let mut dst = vec![0u8; 8];
        copy_rows(&mut dst, &src, 6, 4, 2);
        assert_eq!(dst, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn copy_rows_tolerates_short_source() {
        let src = vec![9u8; 10];
        let mut dst = vec![0u8; 16];
        copy_rows(&mut dst, &src, 8, 8, 2);
        // first row copied, second skipped
        assert_eq!(&dst[..8], &[9u8; 8]);
        assert_eq!(&dst[8..], &[0u8; 8]);
    }
}
