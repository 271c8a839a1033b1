//! Random streams and sample warping.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use super::math::{Vec2, Vec3, PI};

/// Random stream used by every sampler. Seedable so frozen scenes reproduce exactly.
pub type SampleRng = Xoshiro256PlusPlus;

/// Create a stream from a 64-bit seed.
pub fn seeded_rng(seed: u64) -> SampleRng {
    SampleRng::seed_from_u64(seed)
}

/// Uniform float in `[0, 1)`.
#[inline]
pub fn uniform<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    rng.gen::<f32>()
}

/// Cosine-weighted direction around the local `w` axis of the basis `(u, v, w)`.
#[inline]
pub fn cosine_hemisphere(u: Vec3, v: Vec3, w: Vec3, u1: f32, u2: f32) -> Vec3 {
    let r1 = 2.0 * PI * u1;
    let r2s = u2.sqrt();
    (u * (r1.cos() * r2s) + v * (r1.sin() * r2s) + w * (1.0 - u2).max(0.0).sqrt()).normalize()
}

/// Shirley-Chiu concentric mapping of the unit square onto the unit disk.
pub fn concentric_disk(u1: f32, u2: f32) -> Vec2 {
    let sx = 2.0 * u1 - 1.0;
    let sy = 2.0 * u2 - 1.0;
    if sx == 0.0 && sy == 0.0 {
        return Vec2::ZERO;
    }
    let (r, theta) = if sx.abs() > sy.abs() {
        (sx, (PI / 4.0) * (sy / sx))
    } else {
        (sy, (PI / 2.0) - (PI / 4.0) * (sx / sy))
    };
    Vec2::new(r * theta.cos(), r * theta.sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_streams_repeat() {
        let mut a = seeded_rng(7);
        let mut b = seeded_rng(7);
        for _ in 0..32 {
            assert_eq!(uniform(&mut a), uniform(&mut b));
        }
    }

    #[test]
    fn test_cosine_hemisphere_above_plane() {
        let mut rng = seeded_rng(1);
        for _ in 0..256 {
            let d = cosine_hemisphere(Vec3::X, Vec3::Y, Vec3::Z, uniform(&mut rng), uniform(&mut rng));
            assert!(d.z >= 0.0);
            assert!((d.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_concentric_disk_inside_unit_circle() {
        let mut rng = seeded_rng(2);
        for _ in 0..256 {
            let p = concentric_disk(uniform(&mut rng), uniform(&mut rng));
            assert!(p.length() <= 1.0 + 1e-5);
        }
        assert_eq!(concentric_disk(0.5, 0.5), Vec2::ZERO);
    }
}
