//! Output surface: a fixed-resolution framebuffer window.
//!
//! The surface is owned exclusively by the presentation loop for the
//! process lifetime; nothing else draws. Initialization failure is fatal:
//! there is nowhere to render without it.

use anyhow::{Context, Result};
use minifb::{Window, WindowOptions};

pub struct DisplaySurface {
    window: Window,
    argb: Vec<u32>,
    width: usize,
    height: usize,
}

impl DisplaySurface {
    pub fn new(title: &str, width: u32, height: u32) -> Result<Self> {
        let (width, height) = (width as usize, height as usize);
        let mut window = Window::new(title, width, height, WindowOptions::default())
            .context("cannot open display window")?;
        // pacing is the tick clock's job
        window.limit_update_rate(None);

        Ok(DisplaySurface {
            window,
            argb: vec![0u32; width * height],
            width,
            height,
        })
    }

    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    /// Convert the finished RGB24 canvas and flip it to the screen.
    pub fn present(&mut self, rgb: &[u8]) -> Result<()> {
        for (dst, src) in self.argb.iter_mut().zip(rgb.chunks_exact(3)) {
            *dst = (src[0] as u32) << 16 | (src[1] as u32) << 8 | src[2] as u32;
        }
        self.window
            .update_with_buffer(&self.argb, self.width, self.height)
            .context("cannot present frame")
    }
}
