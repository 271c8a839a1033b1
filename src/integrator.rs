//! Path-tracing integrator.
//!
//! One call to [`PathIntegrator::sample_radiance`] traces one camera path.
//! Paths end on an environment miss, on a dead BSDF sample, or when a
//! bounce counter exceeds its cap. There is no probabilistic termination.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::accel::FlatBvh;
use crate::camera::Camera;
use crate::geom::Ray;
use crate::level::FrameSnapshot;
use crate::scene::SceneBindings;
use crate::util::{is_black, uniform, Spectrum, Vec2, Vec3};

/// Bounce caps and self-intersection offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorParams {
    pub max_diffuse_bounces: u32,
    /// Cap shared by specular and glossy bounces.
    pub max_specular_bounces: u32,
    /// `mint` of every secondary ray.
    pub ray_epsilon: f32,
}

impl Default for IntegratorParams {
    fn default() -> Self {
        Self {
            max_diffuse_bounces: 3,
            max_specular_bounces: 8,
            ray_epsilon: 1e-3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PathIntegrator {
    params: IntegratorParams,
}

impl PathIntegrator {
    pub fn new(params: IntegratorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &IntegratorParams {
        &self.params
    }

    /// Radiance for one jittered sample of pixel `(x, y)` of the snapshot.
    #[inline]
    pub fn sample_radiance<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        frame: &FrameSnapshot,
        x: u32,
        y: u32,
    ) -> Spectrum {
        let ray = camera_ray(rng, &frame.camera, x, y);
        self.radiance(rng, &frame.bvh, &frame.bindings, ray)
    }

    /// Radiance arriving at `ray.origin` along `-ray.direction`.
    pub fn radiance<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        bvh: &FlatBvh,
        bindings: &SceneBindings,
        mut ray: Ray,
    ) -> Spectrum {
        let mut l = Vec3::ZERO;
        let mut throughput = Vec3::ONE;
        let mut diffuse_bounces = 0u32;
        let mut specular_bounces = 0u32;

        loop {
            let Some(hit) = bvh.intersect(&mut ray) else {
                let le = bindings.light().radiance(ray.direction, bindings.light_texture());
                return l + throughput * le;
            };

            let surface = bindings.resolve(hit.primitive);
            let dir = ray.direction.normalize();
            let p = ray.at(hit.distance);
            let n = hit.sphere.normal_at(p);

            let mut shade_n = match surface.bump {
                Some((bump, tex)) => bump.perturb(tex, n, n),
                None => n,
            };
            if shade_n.dot(dir) > 0.0 {
                shade_n = -shade_n;
            }

            l += throughput * surface.material.emission;

            let u = [uniform(rng), uniform(rng), uniform(rng)];
            let s = surface.material.sample(dir, n, shade_n, u);
            if s.pdf <= 0.0 || is_black(s.f) {
                return l;
            }

            if s.diffuse {
                diffuse_bounces += 1;
                if diffuse_bounces > self.params.max_diffuse_bounces {
                    return l;
                }
            } else {
                specular_bounces += 1;
                if specular_bounces > self.params.max_specular_bounces {
                    return l;
                }
            }

            if let Some((map, tex)) = surface.texture {
                throughput *= map.color(tex, n);
            }
            throughput *= s.f;

            ray = Ray::with_bounds(p, s.wi, self.params.ray_epsilon, f32::INFINITY);
        }
    }
}

/// Camera ray through a uniformly jittered point of pixel `(x, y)`.
#[inline]
pub fn camera_ray<R: Rng + ?Sized>(rng: &mut R, camera: &Camera, x: u32, y: u32) -> Ray {
    let raster = Vec2::new(x as f32 + uniform(rng), y as f32 + uniform(rng));
    let lens = if camera.lens_radius > 0.0 {
        Vec2::new(uniform(rng), uniform(rng))
    } else {
        Vec2::ZERO
    };
    camera.generate_ray(raster, lens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accel::BvhBuilder;
    use crate::geom::Sphere;
    use crate::scene::{InfiniteLight, Material, Scene};
    use crate::util::seeded_rng;

    fn single_sphere(material: Material) -> (FlatBvh, Scene) {
        let mut scene = Scene::new();
        scene.add_material("m", material).unwrap();
        scene.add_sphere("s", Sphere::new(Vec3::ZERO, 1.0), "m").unwrap();
        let bvh = BvhBuilder::default().build(scene.spheres());
        (bvh, scene)
    }

    #[test]
    fn test_miss_returns_environment() {
        let (bvh, scene) = single_sphere(Material::matte(Vec3::splat(0.5)));
        let mut rng = seeded_rng(1);
        let ray = Ray::new(Vec3::new(0.0, 5.0, 5.0), Vec3::NEG_Z);
        let l = PathIntegrator::default().radiance(&mut rng, &bvh, scene.bindings(), ray);
        assert_eq!(l, Vec3::ONE);
    }

    #[test]
    fn test_emission_survives_bounce_cap() {
        let glow = Material::matte(Vec3::splat(0.5)).with_emission(Vec3::new(2.0, 1.0, 0.5));
        let (bvh, scene) = single_sphere(glow);
        let integrator = PathIntegrator::new(IntegratorParams {
            max_diffuse_bounces: 0,
            ..Default::default()
        });
        let mut rng = seeded_rng(2);
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
        let l = integrator.radiance(&mut rng, &bvh, scene.bindings(), ray);
        assert_eq!(l, Vec3::new(2.0, 1.0, 0.5));
    }

    #[test]
    fn test_mirror_under_uniform_light() {
        let (bvh, mut scene) = single_sphere(Material::mirror(Vec3::splat(0.5)));
        scene.set_light(InfiniteLight::uniform(Vec3::splat(2.0)));
        let mut rng = seeded_rng(3);
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
        let l = PathIntegrator::default().radiance(&mut rng, &bvh, scene.bindings(), ray);
        assert!((l - Vec3::ONE).abs().max_element() < 1e-6);
    }

    #[test]
    fn test_specular_cap_terminates_between_mirrors() {
        let mut scene = Scene::new();
        scene.add_material("m", Material::mirror(Vec3::ONE)).unwrap();
        scene.add_sphere("a", Sphere::new(Vec3::new(0.0, 0.0, -1002.0), 1000.0), "m").unwrap();
        scene.add_sphere("b", Sphere::new(Vec3::new(0.0, 0.0, 1002.0), 1000.0), "m").unwrap();
        let bvh = BvhBuilder::default().build(scene.spheres());
        let mut rng = seeded_rng(4);
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        let l = PathIntegrator::default().radiance(&mut rng, &bvh, scene.bindings(), ray);
        assert_eq!(l, Vec3::ZERO);
    }
}
