//! In-memory textures and their per-sphere instances.
//!
//! Decoding image files is left to the caller; textures arrive here as
//! linear RGB float grids.

use crate::util::{coordinate_system, luminance, spherical_uv, Error, Result, Spectrum, Vec2, Vec3};

/// Handle into the texture registry (index assigned at insertion).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u32);

impl TextureHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Linear RGB texture, row-major, wrapping in both directions.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    width: u32,
    height: u32,
    texels: Vec<Spectrum>,
}

impl Texture {
    pub fn new(width: u32, height: u32, texels: Vec<Spectrum>) -> Result<Self> {
        if width == 0 || height == 0 || texels.len() != (width as usize) * (height as usize) {
            return Err(Error::config(format!(
                "texture {}x{} expects {} texels, got {}",
                width,
                height,
                width as usize * height as usize,
                texels.len()
            )));
        }
        Ok(Self { width, height, texels })
    }

    /// 1x1 texture of a single color.
    pub fn constant(color: Spectrum) -> Self {
        Self { width: 1, height: 1, texels: vec![color] }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn texels(&self) -> &[Spectrum] {
        &self.texels
    }

    /// Texel with wrap-around addressing.
    #[inline]
    pub fn texel(&self, x: i64, y: i64) -> Spectrum {
        let x = x.rem_euclid(self.width as i64) as usize;
        let y = y.rem_euclid(self.height as i64) as usize;
        self.texels[y * self.width as usize + x]
    }

    /// Bilinear lookup at `uv` (texel centers at half-integers).
    pub fn lookup(&self, uv: Vec2) -> Spectrum {
        let s = uv.x * self.width as f32 - 0.5;
        let t = uv.y * self.height as f32 - 0.5;
        let s0 = s.floor();
        let t0 = t.floor();
        let ds = s - s0;
        let dt = t - t0;
        let (x, y) = (s0 as i64, t0 as i64);

        (1.0 - ds) * (1.0 - dt) * self.texel(x, y)
            + (1.0 - ds) * dt * self.texel(x, y + 1)
            + ds * (1.0 - dt) * self.texel(x + 1, y)
            + ds * dt * self.texel(x + 1, y + 1)
    }
}

/// Spherical color map applied to one sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureMap {
    pub texture: TextureHandle,
    pub shift: Vec2,
    pub scale: Vec2,
}

impl TextureMap {
    pub fn new(texture: TextureHandle) -> Self {
        Self { texture, shift: Vec2::ZERO, scale: Vec2::ONE }
    }

    pub fn with_shift(mut self, shift: Vec2) -> Self {
        self.shift = shift;
        self
    }

    pub fn with_scale(mut self, scale: Vec2) -> Self {
        self.scale = scale;
        self
    }

    /// Texture coordinates for a unit direction from the sphere center.
    #[inline]
    pub fn uv(&self, local_dir: Vec3) -> Vec2 {
        spherical_uv(local_dir) * self.scale + self.shift
    }

    /// Tint for the surface point in direction `local_dir` from the center.
    pub fn color(&self, texture: &Texture, local_dir: Vec3) -> Spectrum {
        texture.lookup(self.uv(local_dir))
    }
}

/// Bump map: perturbs the shading normal from texel luminance differences.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BumpMap {
    pub texture: TextureHandle,
    pub scale: f32,
}

impl BumpMap {
    pub fn new(texture: TextureHandle, scale: f32) -> Self {
        Self { texture, scale }
    }

    /// Perturbed copy of `normal` for the point at `local_dir` from the center.
    pub fn perturb(&self, texture: &Texture, local_dir: Vec3, normal: Vec3) -> Vec3 {
        let uv = spherical_uv(local_dir);
        let du = 1.0 / texture.width() as f32;
        let dv = 1.0 / texture.height() as f32;

        let b0 = luminance(texture.lookup(uv));
        let bu = luminance(texture.lookup(uv + Vec2::new(du, 0.0)));
        let bv = luminance(texture.lookup(uv + Vec2::new(0.0, dv)));

        let (t1, t2) = coordinate_system(normal);
        let bumped = normal - self.scale * ((bu - b0) * t1 + (bv - b0) * t2);
        let len2 = bumped.length_squared();
        if len2 > 0.0 && len2.is_finite() {
            bumped / len2.sqrt()
        } else {
            normal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> Texture {
        Texture::new(
            2,
            2,
            vec![Vec3::ZERO, Vec3::ONE, Vec3::ONE, Vec3::ZERO],
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_size_mismatch() {
        assert!(Texture::new(2, 2, vec![Vec3::ONE; 3]).is_err());
        assert!(Texture::new(0, 1, vec![]).is_err());
    }

    #[test]
    fn test_texel_wraps() {
        let t = checker();
        assert_eq!(t.texel(-1, 0), t.texel(1, 0));
        assert_eq!(t.texel(2, 3), t.texel(0, 1));
    }

    #[test]
    fn test_lookup_texel_center() {
        let t = checker();
        assert_eq!(t.lookup(Vec2::new(0.25, 0.25)), Vec3::ZERO);
        assert_eq!(t.lookup(Vec2::new(0.75, 0.25)), Vec3::ONE);
    }

    #[test]
    fn test_constant_lookup() {
        let c = Vec3::new(0.2, 0.4, 0.6);
        let t = Texture::constant(c);
        let v = t.lookup(Vec2::new(0.37, 0.91));
        assert!((v - c).abs().max_element() < 1e-6);
    }

    #[test]
    fn test_flat_bump_keeps_normal() {
        let t = Texture::constant(Vec3::splat(0.5));
        let bump = BumpMap::new(TextureHandle(0), 4.0);
        let n = Vec3::new(0.0, 0.6, 0.8);
        let p = bump.perturb(&t, n, n);
        assert!((p - n).length() < 1e-5);
    }

    #[test]
    fn test_bump_perturbs_unit_length() {
        let t = checker();
        let bump = BumpMap::new(TextureHandle(0), 0.5);
        let n = Vec3::new(0.3, -0.2, 0.9).normalize();
        let p = bump.perturb(&t, n, n);
        assert!((p.length() - 1.0).abs() < 1e-5);
    }
}
