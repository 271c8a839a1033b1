//! Math type re-exports and shading-space helpers.
//!
//! Re-exports the `glam` types used across the renderer and adds the few
//! spherical and basis-construction helpers the integrator relies on.

pub use glam::{Mat3, Mat4, UVec2, Vec2, Vec3, Vec4};

/// RGB radiance / reflectance triple.
pub type Spectrum = Vec3;

pub const PI: f32 = std::f32::consts::PI;
pub const INV_PI: f32 = std::f32::consts::FRAC_1_PI;
pub const INV_TWOPI: f32 = 0.5 * std::f32::consts::FRAC_1_PI;

/// Squared length below which a vector is treated as zero.
const DEGENERATE_EPSILON: f32 = 1e-12;

/// Build two unit vectors orthogonal to `v` (and to each other).
///
/// `v` is expected to be normalized. A zero-length input falls back to the
/// world X/Y axes instead of producing NaNs.
#[inline]
pub fn coordinate_system(v: Vec3) -> (Vec3, Vec3) {
    if v.length_squared() < DEGENERATE_EPSILON {
        return (Vec3::X, Vec3::Y);
    }
    let v2 = if v.x.abs() > v.y.abs() {
        let inv_len = 1.0 / (v.x * v.x + v.z * v.z).sqrt();
        Vec3::new(-v.z * inv_len, 0.0, v.x * inv_len)
    } else {
        let inv_len = 1.0 / (v.y * v.y + v.z * v.z).sqrt();
        Vec3::new(0.0, v.z * inv_len, -v.y * inv_len)
    };
    (v2, v.cross(v2))
}

/// Polar angle of a unit direction, measured from +Z.
#[inline]
pub fn spherical_theta(v: Vec3) -> f32 {
    v.z.clamp(-1.0, 1.0).acos()
}

/// Azimuth of a direction in `[0, 2π)`.
#[inline]
pub fn spherical_phi(v: Vec3) -> f32 {
    let p = v.y.atan2(v.x);
    if p < 0.0 { p + 2.0 * PI } else { p }
}

/// Map a unit direction to equirectangular `(u, v)` in `[0, 1]²`.
#[inline]
pub fn spherical_uv(dir: Vec3) -> Vec2 {
    Vec2::new(
        1.0 - spherical_phi(dir) * INV_TWOPI,
        spherical_theta(dir) * INV_PI,
    )
}

/// Rec.709 luminance of a linear RGB triple.
#[inline]
pub fn luminance(c: Spectrum) -> f32 {
    0.212671 * c.x + 0.715160 * c.y + 0.072169 * c.z
}

/// True if every channel is zero.
#[inline]
pub fn is_black(c: Spectrum) -> bool {
    c.x == 0.0 && c.y == 0.0 && c.z == 0.0
}

/// Mirror `d` about the normal `n`.
#[inline]
pub fn reflect(d: Vec3, n: Vec3) -> Vec3 {
    d - n * (2.0 * n.dot(d))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_system_orthonormal() {
        for v in [Vec3::X, Vec3::Y, Vec3::Z, Vec3::new(1.0, 2.0, -3.0).normalize()] {
            let (a, b) = coordinate_system(v);
            assert!(a.dot(v).abs() < 1e-5);
            assert!(b.dot(v).abs() < 1e-5);
            assert!(a.dot(b).abs() < 1e-5);
            assert!((a.length() - 1.0).abs() < 1e-5);
            assert!((b.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_coordinate_system_degenerate() {
        let (a, b) = coordinate_system(Vec3::ZERO);
        assert_eq!(a, Vec3::X);
        assert_eq!(b, Vec3::Y);
    }

    #[test]
    fn test_spherical_uv_range() {
        let uv = spherical_uv(Vec3::Z);
        assert!(uv.y.abs() < 1e-6);
        let uv = spherical_uv(-Vec3::Z);
        assert!((uv.y - 1.0).abs() < 1e-6);
        let uv = spherical_uv(Vec3::new(0.3, -0.4, 0.1).normalize());
        assert!((0.0..=1.0).contains(&uv.x));
    }

    #[test]
    fn test_reflect() {
        let r = reflect(Vec3::new(1.0, -1.0, 0.0), Vec3::Y);
        assert_eq!(r, Vec3::new(1.0, 1.0, 0.0));
    }
}
