// SPDX-License-Identifier: GPL-3.0-only

//! Conversions from sensor buffers to displayable 8-bit images

use crate::backends::sensor::{Bgra, FrameSize};
use rayon::prelude::*;

/// The image kinds a display sink accepts
#[derive(Debug, Clone, Copy)]
pub enum DisplayImage<'a> {
    /// 8-bit, 4 channels (B, G, R, A)
    Bgra8 { size: FrameSize, pixels: &'a [Bgra] },
    /// 8-bit, single channel
    Gray8 { size: FrameSize, pixels: &'a [u8] },
}

impl DisplayImage<'_> {
    pub fn size(&self) -> FrameSize {
        match self {
            DisplayImage::Bgra8 { size, .. } | DisplayImage::Gray8 { size, .. } => *size,
        }
    }

    /// RGB of pixel `(x, y)`, clamped to the image
    pub fn rgb_at(&self, x: u32, y: u32) -> [u8; 3] {
        let size = self.size();
        if size.is_empty() {
            return [0, 0, 0];
        }
        let x = x.min(size.width - 1) as usize;
        let y = y.min(size.height - 1) as usize;
        let idx = y * size.width as usize + x;
        match self {
            DisplayImage::Bgra8 { pixels, .. } => pixels
                .get(idx)
                .map_or([0, 0, 0], |&[b, g, r, _]| [r, g, b]),
            DisplayImage::Gray8 { pixels, .. } => {
                pixels.get(idx).map_or([0, 0, 0], |&v| [v, v, v])
            }
        }
    }
}

/// Scale depth to an 8-bit intensity, near = bright
///
/// `v = 255 - d * 255 / max_mm`, rounded and saturated: 0 mm is white and
/// anything at or beyond `max_mm` is black.
pub fn depth_to_gray8(depth: &[u16], max_mm: u16) -> Vec<u8> {
    if max_mm == 0 {
        return depth.iter().map(|&d| if d == 0 { 255 } else { 0 }).collect();
    }
    let max = max_mm as f32;
    depth
        .par_iter()
        .map(|&d| (255.0 - d as f32 * 255.0 / max).round().clamp(0.0, 255.0) as u8)
        .collect()
}

/// BGRA pixels to a packed RGBA byte buffer
pub fn bgra_to_rgba(pixels: &[Bgra]) -> Vec<u8> {
    let mut out = bytemuck::cast_slice::<Bgra, u8>(pixels).to_vec();
    for px in out.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
    out
}

/// Packed RGBA bytes to BGRA pixels
pub fn rgba_to_bgra(bytes: &[u8]) -> Vec<Bgra> {
    bytes
        .chunks_exact(4)
        .map(|px| [px[2], px[1], px[0], px[3]])
        .collect()
}

/// Nearest-neighbour RGB downsample used for terminal preview
#[derive(Debug, Clone, Default)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[u8; 3]>,
}

impl Thumbnail {
    /// Largest aspect-preserving thumbnail that fits `max_width x max_height`
    pub fn sample(image: &DisplayImage<'_>, max_width: u32, max_height: u32) -> Self {
        let size = image.size();
        if size.is_empty() || max_width == 0 || max_height == 0 {
            return Self::default();
        }

        let (w, h) = (size.width as u64, size.height as u64);
        let (max_w, max_h) = (max_width as u64, max_height as u64);
        let (width, height) = if max_w * h > max_h * w {
            // Wider than the image - fit to height
            ((max_h * w / h) as u32, max_height)
        } else {
            (max_width, (max_w * h / w) as u32)
        };
        let (width, height) = (width.clamp(1, size.width), height.clamp(1, size.height));

        let x_scale = size.width as f64 / width as f64;
        let y_scale = size.height as f64 / height as f64;
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for ty in 0..height {
            let sy = (ty as f64 * y_scale) as u32;
            for tx in 0..width {
                pixels.push(image.rgb_at((tx as f64 * x_scale) as u32, sy));
            }
        }

        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn rgb_at(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        (x < self.width && y < self.height)
            .then(|| self.pixels[y as usize * self.width as usize + x as usize])
    }
}
