//! Separable spatial filters over the resolved pass.
//!
//! Each iteration runs a horizontal 1D pass, transposes, runs the same pass
//! over what were columns, and transposes back. Rows are filtered in
//! parallel. Edges clamp: samples past the border reuse the border pixel.

use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::film::Film;
use crate::util::{Error, Spectrum, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterKind {
    #[default]
    None,
    /// 3-tap `(0.15, 1, 0.15)`, normalized.
    LightBlur,
    /// 3-tap `(0.35, 1, 0.35)`, normalized.
    HeavyBlur,
    /// Box of arbitrary radius.
    Box,
}

impl FromStr for FilterKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "light-blur" | "light_blur" | "lightblur" => Ok(Self::LightBlur),
            "heavy-blur" | "heavy_blur" | "heavyblur" => Ok(Self::HeavyBlur),
            "box" => Ok(Self::Box),
            _ => Err(Error::UnknownFilter(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    pub kind: FilterKind,
    pub iterations: u32,
    /// Box radius; ignored by the other kinds.
    pub radius: u32,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self { kind: FilterKind::None, iterations: 1, radius: 1 }
    }
}

/// Spatial filter with reusable scratch storage.
#[derive(Debug, Clone)]
pub struct SpatialFilter {
    params: FilterParams,
    scratch: Vec<Spectrum>,
}

impl SpatialFilter {
    pub fn new(params: FilterParams) -> Self {
        Self { params, scratch: Vec::new() }
    }

    pub fn params(&self) -> &FilterParams {
        &self.params
    }

    /// Filter `film` in place.
    pub fn apply(&mut self, film: &mut Film) {
        let kernel = match self.params.kind {
            FilterKind::None => return,
            FilterKind::LightBlur => Kernel::Tap3(0.15),
            FilterKind::HeavyBlur => Kernel::Tap3(0.35),
            FilterKind::Box if self.params.radius <= 1 => Kernel::Tap3(1.0),
            FilterKind::Box => Kernel::Box(self.params.radius as usize),
        };

        let (w, h) = (film.width() as usize, film.height() as usize);
        if w == 0 || h == 0 {
            return;
        }
        self.scratch.resize(w * h, Vec3::ZERO);

        for _ in 0..self.params.iterations {
            filter_rows(film.pixels_mut(), w, kernel);
            transpose(film.pixels(), &mut self.scratch, w, h);
            filter_rows(&mut self.scratch, h, kernel);
            transpose(&self.scratch, film.pixels_mut(), h, w);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Kernel {
    /// Side weight of a normalized `(a, 1, a)` stencil.
    Tap3(f32),
    Box(usize),
}

fn filter_rows(pixels: &mut [Spectrum], width: usize, kernel: Kernel) {
    pixels.par_chunks_mut(width).for_each_init(
        || Vec::with_capacity(width),
        |line, row| {
            line.clear();
            line.extend_from_slice(row);
            match kernel {
                Kernel::Tap3(a) => tap3(line, row, a),
                Kernel::Box(r) => box_running_sum(line, row, r),
            }
        },
    );
}

#[inline]
fn tap3(src: &[Spectrum], dst: &mut [Spectrum], a: f32) {
    let n = src.len();
    let norm = 1.0 / (1.0 + 2.0 * a);
    for i in 0..n {
        let l = src[i.saturating_sub(1)];
        let r = src[(i + 1).min(n - 1)];
        dst[i] = (src[i] + (l + r) * a) * norm;
    }
}

/// Sliding window sum: add the incoming sample, drop the outgoing one.
fn box_running_sum(src: &[Spectrum], dst: &mut [Spectrum], r: usize) {
    let n = src.len() as isize;
    let r = r as isize;
    let at = |i: isize| src[i.clamp(0, n - 1) as usize];
    let norm = 1.0 / (2 * r + 1) as f32;

    let mut sum = Vec3::ZERO;
    for i in -r..=r {
        sum += at(i);
    }
    for i in 0..n {
        dst[i as usize] = sum * norm;
        sum += at(i + r + 1) - at(i - r);
    }
}

fn transpose(src: &[Spectrum], dst: &mut [Spectrum], w: usize, h: usize) {
    dst.par_chunks_mut(h).enumerate().for_each(|(x, col)| {
        for (y, d) in col.iter_mut().enumerate() {
            *d = src[y * w + x];
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse(w: u32, h: u32) -> Film {
        let mut f = Film::new(w, h);
        f.set(w / 2, h / 2, Vec3::ONE);
        f
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("heavy-blur".parse::<FilterKind>().unwrap(), FilterKind::HeavyBlur);
        assert_eq!("BOX".parse::<FilterKind>().unwrap(), FilterKind::Box);
        assert!(matches!("gauss".parse::<FilterKind>(), Err(Error::UnknownFilter(_))));
    }

    #[test]
    fn test_none_is_identity() {
        let mut f = impulse(5, 5);
        let before = f.clone();
        SpatialFilter::new(FilterParams::default()).apply(&mut f);
        assert_eq!(f, before);
    }

    #[test]
    fn test_box_flat_field() {
        for radius in [1, 2, 3, 7] {
            let c = Vec3::new(0.2, 0.5, 0.9);
            let mut f = Film::filled(13, 9, c);
            let mut filter = SpatialFilter::new(FilterParams { kind: FilterKind::Box, iterations: 2, radius });
            filter.apply(&mut f);
            for p in f.pixels() {
                assert!((*p - c).abs().max_element() < 1e-5, "radius {radius}");
            }
        }
    }

    #[test]
    fn test_blur_spreads_impulse_symmetrically() {
        let mut f = impulse(5, 5);
        SpatialFilter::new(FilterParams { kind: FilterKind::LightBlur, iterations: 1, radius: 0 }).apply(&mut f);
        let c = f.get(2, 2).x;
        assert!(c < 1.0);
        assert!((f.get(1, 2).x - f.get(3, 2).x).abs() < 1e-6);
        assert!((f.get(2, 1).x - f.get(1, 2).x).abs() < 1e-6);
        let total: f32 = f.pixels().iter().map(|p| p.x).sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_box_radius_two_window() {
        let mut f = Film::new(7, 1);
        f.set(3, 0, Vec3::splat(5.0));
        let mut filter = SpatialFilter::new(FilterParams { kind: FilterKind::Box, iterations: 1, radius: 2 });
        filter.apply(&mut f);
        for x in 1..=5 {
            assert!((f.get(x, 0).x - 1.0).abs() < 1e-5);
        }
        assert_eq!(f.get(0, 0).x, 0.0);
    }
}
