//! Surface materials and BSDF importance sampling.
//!
//! The variant set is closed, so dispatch is a `match` in the hot loop.
//! Every `sample` returns the throughput multiplier the integrator applies
//! as-is; callers never divide by the reported pdf.

use crate::util::{coordinate_system, cosine_hemisphere, reflect, Spectrum, Vec3, INV_PI, PI};

/// Handle into the material registry (index assigned at insertion).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialHandle(pub(crate) u32);

impl MaterialHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Scattering model of a material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bsdf {
    /// Lambertian reflector.
    Matte { kd: Spectrum },
    /// Perfect specular reflector.
    Mirror { kr: Spectrum },
    /// Dielectric with Schlick Fresnel; `outside_ior` is the medium the normal points into.
    Glass {
        refl: Spectrum,
        refrct: Spectrum,
        outside_ior: f32,
        inside_ior: f32,
    },
    /// Glossy conductor; `exponent` is `1 / (shininess + 1)`.
    Metal { kr: Spectrum, exponent: f32 },
    /// Glossy coat over a diffuse base, mixed by Schlick reflectance.
    Alloy {
        kd: Spectrum,
        kr: Spectrum,
        exponent: f32,
        r0: f32,
    },
}

/// A material: scattering model plus emitted radiance (black unless configured).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub bsdf: Bsdf,
    pub emission: Spectrum,
}

/// Outcome of sampling a BSDF.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BsdfSample {
    /// Throughput multiplier.
    pub f: Spectrum,
    /// New ray direction.
    pub wi: Vec3,
    pub pdf: f32,
    /// Diffuse-type bounce (vs. specular/glossy).
    pub diffuse: bool,
}

impl BsdfSample {
    const DEAD: BsdfSample = BsdfSample { f: Vec3::ZERO, wi: Vec3::ZERO, pdf: 0.0, diffuse: false };

    fn specular(f: Spectrum, wi: Vec3) -> Self {
        Self { f, wi, pdf: 1.0, diffuse: false }
    }
}

fn shininess_exponent(shininess: f32) -> f32 {
    1.0 / (shininess + 1.0)
}

impl Material {
    pub fn new(bsdf: Bsdf) -> Self {
        Self { bsdf, emission: Vec3::ZERO }
    }

    pub fn matte(kd: Spectrum) -> Self {
        Self::new(Bsdf::Matte { kd })
    }

    pub fn mirror(kr: Spectrum) -> Self {
        Self::new(Bsdf::Mirror { kr })
    }

    pub fn glass(refl: Spectrum, refrct: Spectrum, outside_ior: f32, inside_ior: f32) -> Self {
        Self::new(Bsdf::Glass { refl, refrct, outside_ior, inside_ior })
    }

    pub fn metal(kr: Spectrum, shininess: f32) -> Self {
        Self::new(Bsdf::Metal { kr, exponent: shininess_exponent(shininess) })
    }

    pub fn alloy(kd: Spectrum, kr: Spectrum, shininess: f32, r0: f32) -> Self {
        Self::new(Bsdf::Alloy { kd, kr, exponent: shininess_exponent(shininess), r0 })
    }

    pub fn with_emission(mut self, emission: Spectrum) -> Self {
        self.emission = emission;
        self
    }

    /// Importance-sample an outgoing direction.
    ///
    /// `dir` is the incoming ray direction (unit), `n` the geometric outward
    /// normal and `shade_n` the shading normal already flipped to face `dir`.
    /// `u` holds three uniform numbers.
    pub fn sample(&self, dir: Vec3, n: Vec3, shade_n: Vec3, u: [f32; 3]) -> BsdfSample {
        match self.bsdf {
            Bsdf::Matte { kd } => sample_matte(kd, shade_n, u[0], u[1]),
            Bsdf::Mirror { kr } => BsdfSample::specular(kr, reflect(dir, shade_n)),
            Bsdf::Glass { refl, refrct, outside_ior, inside_ior } => {
                sample_glass(refl, refrct, outside_ior, inside_ior, dir, n, shade_n, u[2])
            }
            Bsdf::Metal { kr, exponent } => match glossy_reflection(dir, exponent, shade_n, u[0], u[1]) {
                Some(wi) => BsdfSample::specular(kr, wi),
                None => BsdfSample::DEAD,
            },
            Bsdf::Alloy { kd, kr, exponent, r0 } => sample_alloy(kd, kr, exponent, r0, dir, shade_n, u),
        }
    }
}

/// Cosine-weighted lobe. The weight keeps the cosine factor and is not
/// divided by the `1/π` pdf.
fn sample_matte(kd: Spectrum, shade_n: Vec3, u0: f32, u1: f32) -> BsdfSample {
    let (u, v) = coordinate_system(shade_n);
    let wi = cosine_hemisphere(u, v, shade_n, u0, u1);
    let dp = shade_n.dot(wi);
    if dp <= 0.0 {
        return BsdfSample::DEAD;
    }
    BsdfSample { f: kd * dp, wi, pdf: INV_PI, diffuse: true }
}

#[allow(clippy::too_many_arguments)]
fn sample_glass(
    refl: Spectrum,
    refrct: Spectrum,
    nc: f32,
    nt: f32,
    dir: Vec3,
    n: Vec3,
    shade_n: Vec3,
    u: f32,
) -> BsdfSample {
    let refl_dir = reflect(dir, shade_n);

    // entering when the ray travels against the outward geometric normal
    let into = n.dot(dir) < 0.0;
    let outward = if into { shade_n } else { -shade_n };
    let nnt = if into { nc / nt } else { nt / nc };
    let ddn = dir.dot(shade_n);
    let cos2t = 1.0 - nnt * nnt * (1.0 - ddn * ddn);

    if cos2t < 0.0 {
        return BsdfSample::specular(refl, refl_dir);
    }

    let sign = if into { 1.0 } else { -1.0 };
    let trans_dir = (dir * nnt - outward * (sign * (ddn * nnt + cos2t.sqrt()))).normalize();

    let a = nt - nc;
    let b = nt + nc;
    let r0 = a * a / (b * b);
    let c = 1.0 - if into { -ddn } else { trans_dir.dot(outward) };

    let re = r0 + (1.0 - r0) * c.powi(5);
    let tr = 1.0 - re;
    let p = 0.25 + 0.5 * re;

    if u < p {
        BsdfSample::specular(refl * (re / p), refl_dir)
    } else {
        BsdfSample::specular(refrct * (tr / (1.0 - p)), trans_dir)
    }
}

/// Cosine-power lobe around the mirror direction. `None` below the surface.
fn glossy_reflection(dir: Vec3, exponent: f32, shade_n: Vec3, u0: f32, u1: f32) -> Option<Vec3> {
    let phi = 2.0 * PI * u0;
    let cos_theta = (1.0 - u1).powf(exponent);
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();

    let w = reflect(dir, shade_n);
    let (u, v) = coordinate_system(w);
    let wi = u * (phi.cos() * sin_theta) + v * (phi.sin() * sin_theta) + w * cos_theta;

    (wi.dot(shade_n) > 0.0).then_some(wi)
}

fn sample_alloy(
    kd: Spectrum,
    kr: Spectrum,
    exponent: f32,
    r0: f32,
    dir: Vec3,
    shade_n: Vec3,
    u: [f32; 3],
) -> BsdfSample {
    let c = 1.0 + dir.dot(shade_n);
    let re = r0 + (1.0 - r0) * c.clamp(0.0, 1.0).powi(5);
    let p = 0.25 + 0.5 * re;

    if u[2] < p {
        match glossy_reflection(dir, exponent, shade_n, u[0], u[1]) {
            Some(wi) => BsdfSample::specular(kr * (re / p), wi),
            None => BsdfSample::DEAD,
        }
    } else {
        let s = sample_matte(kd, shade_n, u[0], u[1]);
        if s.pdf <= 0.0 {
            return s;
        }
        BsdfSample { f: s.f * ((1.0 - re) / (1.0 - p)), ..s }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::{seeded_rng, uniform};

    fn draws(n: usize) -> Vec<[f32; 3]> {
        let mut rng = seeded_rng(11);
        (0..n)
            .map(|_| [uniform(&mut rng), uniform(&mut rng), uniform(&mut rng)])
            .collect()
    }

    #[test]
    fn test_matte_weight_keeps_cosine() {
        let m = Material::matte(Vec3::splat(0.5));
        let n = Vec3::Z;
        for u in draws(64) {
            let s = m.sample(-Vec3::Z, n, n, u);
            assert!(s.diffuse);
            assert_eq!(s.pdf, INV_PI);
            let dp = n.dot(s.wi);
            assert!((s.f - Vec3::splat(0.5 * dp)).abs().max_element() < 1e-5);
        }
    }

    #[test]
    fn test_mirror_reflects() {
        let m = Material::mirror(Vec3::ONE);
        let d = Vec3::new(1.0, -1.0, 0.0).normalize();
        let s = m.sample(d, Vec3::Y, Vec3::Y, [0.5; 3]);
        assert!(!s.diffuse);
        assert_eq!(s.pdf, 1.0);
        assert!((s.wi - Vec3::new(1.0, 1.0, 0.0).normalize()).length() < 1e-5);
    }

    #[test]
    fn test_glass_branches() {
        let m = Material::glass(Vec3::ONE, Vec3::ONE, 1.0, 1.5);
        let d = Vec3::new(0.0, -1.0, 0.0);
        // low u: reflection, high u: refraction straight through
        let r = m.sample(d, Vec3::Y, Vec3::Y, [0.0, 0.0, 0.0]);
        assert!(r.wi.y > 0.0);
        let t = m.sample(d, Vec3::Y, Vec3::Y, [0.0, 0.0, 0.999]);
        assert!((t.wi - d).length() < 1e-5);
        assert!(!t.diffuse);
    }

    #[test]
    fn test_glass_total_internal_reflection() {
        let m = Material::glass(Vec3::ONE, Vec3::ONE, 1.0, 1.5);
        // leaving the dense medium at a grazing angle
        let d = Vec3::new(0.9, 0.1, 0.0).normalize();
        let outward_n = Vec3::Y;
        let shade_n = Vec3::NEG_Y;
        let s = m.sample(d, outward_n, shade_n, [0.0, 0.0, 0.99]);
        assert_eq!(s.f, Vec3::ONE);
        assert!(s.wi.y < 0.0);
    }

    #[test]
    fn test_metal_stays_above_surface() {
        let m = Material::metal(Vec3::ONE, 100.0);
        let d = Vec3::new(1.0, -1.0, 0.0).normalize();
        for u in draws(64) {
            let s = m.sample(d, Vec3::Y, Vec3::Y, u);
            if s.pdf > 0.0 {
                assert!(s.wi.dot(Vec3::Y) > 0.0);
                assert!(!s.diffuse);
            } else {
                assert_eq!(s.f, Vec3::ZERO);
            }
        }
    }

    #[test]
    fn test_alloy_flags_follow_branch() {
        let m = Material::alloy(Vec3::splat(0.5), Vec3::ONE, 1000.0, 0.05);
        let d = -Vec3::Z;
        let glossy = m.sample(d, Vec3::Z, Vec3::Z, [0.3, 0.3, 0.0]);
        assert!(!glossy.diffuse);
        let diffuse = m.sample(d, Vec3::Z, Vec3::Z, [0.3, 0.3, 0.99]);
        assert!(diffuse.diffuse);
        assert_eq!(diffuse.pdf, INV_PI);
    }

    #[test]
    fn test_emission_default_black() {
        assert_eq!(Material::matte(Vec3::ONE).emission, Vec3::ZERO);
        let e = Material::matte(Vec3::ONE).with_emission(Vec3::splat(3.0));
        assert_eq!(e.emission, Vec3::splat(3.0));
    }
}
