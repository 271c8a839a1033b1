//! Infinite dome light.

use super::texture::{Texture, TextureHandle};
use crate::util::{spherical_uv, Spectrum, Vec2, Vec3};

/// Environment light surrounding the scene at infinity.
///
/// Radiance is `gain`, optionally modulated by an equirectangular texture
/// whose lookup is offset by `shift`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InfiniteLight {
    pub gain: Spectrum,
    pub shift: Vec2,
    pub texture: Option<TextureHandle>,
}

impl InfiniteLight {
    /// Uniform light of the given radiance.
    pub fn uniform(gain: Spectrum) -> Self {
        Self { gain, shift: Vec2::ZERO, texture: None }
    }

    /// Textured light; `texture` must be registered in the same scene.
    pub fn textured(texture: TextureHandle, gain: Spectrum, shift: Vec2) -> Self {
        Self { gain, shift, texture: Some(texture) }
    }

    /// Radiance arriving along a ray travelling in `dir`.
    ///
    /// `texture` is the resolved map for `self.texture`, if any.
    #[inline]
    pub fn radiance(&self, dir: Vec3, texture: Option<&Texture>) -> Spectrum {
        match texture {
            Some(tex) => {
                let uv = spherical_uv(dir.normalize()) + self.shift;
                self.gain * tex.lookup(uv)
            }
            None => self.gain,
        }
    }
}

impl Default for InfiniteLight {
    fn default() -> Self {
        Self::uniform(Vec3::ONE)
    }
}
