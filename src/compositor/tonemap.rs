//! Tone mapping from the linear stable frame to RGBA8.

use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::film::{DisplayBuffer, Film};
use crate::util::{Error, Mat3, Result, Spectrum, Vec3};

/// Gamma table resolution.
pub const GAMMA_TABLE_SIZE: usize = 1024;

/// Key value of the photographic operator.
const REINHARD_ALPHA: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneMapKind {
    Linear,
    Reinhard02,
}

impl ToneMapKind {
    /// Parameters with this curve's defaults.
    pub fn default_params(self) -> ToneMapParams {
        match self {
            Self::Linear => ToneMapParams::Linear { scale: 1.0, gamma: 2.2 },
            Self::Reinhard02 => ToneMapParams::Reinhard02 {
                pre_scale: 1.0,
                post_scale: 1.2,
                burn: 3.75,
                gamma: 2.2,
            },
        }
    }
}

impl FromStr for ToneMapKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "reinhard02" | "reinhard" => Ok(Self::Reinhard02),
            _ => Err(Error::UnknownToneMap(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ToneMapParams {
    Linear {
        scale: f32,
        gamma: f32,
    },
    Reinhard02 {
        pre_scale: f32,
        post_scale: f32,
        burn: f32,
        gamma: f32,
    },
}

impl Default for ToneMapParams {
    fn default() -> Self {
        ToneMapKind::Linear.default_params()
    }
}

impl ToneMapParams {
    pub fn kind(&self) -> ToneMapKind {
        match self {
            Self::Linear { .. } => ToneMapKind::Linear,
            Self::Reinhard02 { .. } => ToneMapKind::Reinhard02,
        }
    }

    pub fn gamma(&self) -> f32 {
        match *self {
            Self::Linear { gamma, .. } | Self::Reinhard02 { gamma, .. } => gamma,
        }
    }
}

/// Tone-mapping curve with its precomputed gamma table.
#[derive(Debug, Clone)]
pub struct ToneMap {
    params: ToneMapParams,
    gamma_table: Vec<u8>,
    rgb_to_xyz: Mat3,
    xyz_to_rgb: Mat3,
}

impl ToneMap {
    pub fn new(params: ToneMapParams) -> Self {
        let inv_gamma = 1.0 / params.gamma();
        let gamma_table = (0..GAMMA_TABLE_SIZE)
            .map(|i| {
                let x = i as f32 / (GAMMA_TABLE_SIZE - 1) as f32;
                (x.powf(inv_gamma) * 255.0 + 0.5) as u8
            })
            .collect();

        // linear sRGB primaries, D65 white
        let rgb_to_xyz = Mat3::from_cols(
            Vec3::new(0.412_453, 0.212_671, 0.019_334),
            Vec3::new(0.357_580, 0.715_160, 0.119_193),
            Vec3::new(0.180_423, 0.072_169, 0.950_227),
        );

        Self { params, gamma_table, rgb_to_xyz, xyz_to_rgb: rgb_to_xyz.inverse() }
    }

    pub fn params(&self) -> &ToneMapParams {
        &self.params
    }

    /// Gamma-corrected 8-bit value for a linear input (clamped to `[0, 1]`).
    #[inline]
    pub fn gamma_correct(&self, x: f32) -> u8 {
        let x = if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) };
        self.gamma_table[(x * (GAMMA_TABLE_SIZE - 1) as f32) as usize]
    }

    #[inline]
    fn encode(&self, c: Spectrum, px: &mut [u8]) {
        px[0] = self.gamma_correct(c.x);
        px[1] = self.gamma_correct(c.y);
        px[2] = self.gamma_correct(c.z);
        px[3] = 255;
    }

    /// Map `film` into `out`.
    pub fn apply(&self, film: &Film, out: &mut DisplayBuffer) {
        debug_assert_eq!(film.pixels().len() * 4, out.as_bytes().len());
        match self.params {
            ToneMapParams::Linear { scale, .. } => {
                out.as_bytes_mut()
                    .par_chunks_exact_mut(4)
                    .zip(film.pixels().par_iter())
                    .for_each(|(px, c)| self.encode(*c * scale, px));
            }
            ToneMapParams::Reinhard02 { pre_scale, post_scale, burn, .. } => {
                self.reinhard02(film, out, pre_scale, post_scale, burn)
            }
        }
    }

    fn reinhard02(&self, film: &Film, out: &mut DisplayBuffer, pre_scale: f32, post_scale: f32, burn: f32) {
        let pixels = film.pixels();
        let count = pixels.len().max(1) as f32;
        let luminance = |c: Spectrum| (self.rgb_to_xyz * (c * pre_scale)).y;

        let mut y_wa = pixels.par_iter().map(|c| luminance(*c)).sum::<f32>() / count;
        if y_wa <= 0.0 || !y_wa.is_finite() {
            y_wa = 1.0;
        }

        let y_w = pre_scale * REINHARD_ALPHA * burn;
        let inv_b2 = if y_w > 0.0 { 1.0 / (y_w * y_w) } else { 0.0 };
        let p_scale = post_scale * pre_scale * REINHARD_ALPHA / y_wa;

        out.as_bytes_mut()
            .par_chunks_exact_mut(4)
            .zip(pixels.par_iter())
            .for_each(|(px, c)| {
                let xyz = self.rgb_to_xyz * (*c * pre_scale);
                let ys = xyz.y;
                let mapped = xyz * (p_scale * (1.0 + ys * inv_b2) / (1.0 + ys));
                self.encode(self.xyz_to_rgb * mapped, px);
            });
    }
}
