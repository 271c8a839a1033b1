//! Pixel buffers: per-pass accumulation, stable linear frame and display.
//!
//! All buffers are row-major, allocated once for the configured resolution
//! and cleared to black at construction.

use crate::util::{Spectrum, Vec3};

/// Row-major grid of linear RGB.
#[derive(Debug, Clone, PartialEq)]
pub struct Film {
    width: u32,
    height: u32,
    pixels: Vec<Spectrum>,
}

impl Film {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Vec3::ZERO; width as usize * height as usize],
        }
    }

    /// Film filled with one color.
    pub fn filled(width: u32, height: u32, color: Spectrum) -> Self {
        Self { width, height, pixels: vec![color; width as usize * height as usize] }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Spectrum {
        self.pixels[self.offset(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, c: Spectrum) {
        let i = self.offset(x, y);
        self.pixels[i] = c;
    }

    pub fn row(&self, y: u32) -> &[Spectrum] {
        let start = self.offset(0, y);
        &self.pixels[start..start + self.width as usize]
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [Spectrum] {
        let start = self.offset(0, y);
        let w = self.width as usize;
        &mut self.pixels[start..start + w]
    }

    pub fn pixels(&self) -> &[Spectrum] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [Spectrum] {
        &mut self.pixels
    }

    pub fn clear(&mut self) {
        self.pixels.fill(Vec3::ZERO);
    }
}

/// One integration batch: summed samples plus the per-pixel sample count.
#[derive(Debug, Clone)]
pub struct PassBuffer {
    sum: Film,
    samples: u32,
}

impl PassBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { sum: Film::new(width, height), samples: 0 }
    }

    pub fn width(&self) -> u32 {
        self.sum.width
    }

    pub fn height(&self) -> u32 {
        self.sum.height
    }

    /// Samples per pixel accumulated so far in this pass.
    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// Record one sample for a pixel. `sample_index` 0 overwrites, later indices add.
    #[inline]
    pub fn record(&mut self, sample_index: u32, x: u32, y: u32, c: Spectrum) {
        let i = self.sum.offset(x, y);
        if sample_index == 0 {
            self.sum.pixels[i] = c;
        } else {
            self.sum.pixels[i] += c;
        }
    }

    /// Mark the pass as holding `samples` per pixel.
    pub fn finish(&mut self, samples: u32) {
        self.samples = samples;
    }

    /// Summed row `y`, for interleaved merges.
    pub fn row_mut(&mut self, y: u32) -> &mut [Spectrum] {
        self.sum.row_mut(y)
    }

    pub fn row(&self, y: u32) -> &[Spectrum] {
        self.sum.row(y)
    }

    /// Per-pixel mean into `out`.
    pub fn resolve_into(&self, out: &mut Film) {
        debug_assert_eq!(out.pixels.len(), self.sum.pixels.len());
        let inv = if self.samples > 0 { 1.0 / self.samples as f32 } else { 0.0 };
        for (o, s) in out.pixels.iter_mut().zip(&self.sum.pixels) {
            *o = *s * inv;
        }
    }
}

/// Packed RGBA8 display pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayBuffer {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl DisplayBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let mut rgba = vec![0u8; width as usize * height as usize * 4];
        for px in rgba.chunks_exact_mut(4) {
            px[3] = 255;
        }
        Self { width, height, rgba }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.rgba
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.rgba
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [self.rgba[i], self.rgba[i + 1], self.rgba[i + 2], self.rgba[i + 3]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_overwrites() {
        let mut p = PassBuffer::new(2, 1);
        p.record(0, 0, 0, Vec3::splat(9.0));
        p.finish(1);
        p.record(0, 0, 0, Vec3::splat(1.0));
        p.record(1, 0, 0, Vec3::splat(3.0));
        p.finish(2);
        let mut out = Film::new(2, 1);
        p.resolve_into(&mut out);
        assert_eq!(out.get(0, 0), Vec3::splat(2.0));
    }

    #[test]
    fn test_rows_are_contiguous() {
        let mut f = Film::new(3, 2);
        f.row_mut(1)[2] = Vec3::X;
        assert_eq!(f.get(2, 1), Vec3::X);
        assert_eq!(f.pixels()[5], Vec3::X);
    }

    #[test]
    fn test_display_starts_opaque_black() {
        let d = DisplayBuffer::new(2, 2);
        assert_eq!(d.pixel(1, 1), [0, 0, 0, 255]);
        assert_eq!(d.as_bytes().len(), 16);
    }
}
