//! Sphere primitive and ray intersection.
//!
//! Spheres serve double duty: they are the only scene primitive and also the
//! bounding volume of every BVH node, so the same quadratic solver runs for
//! leaves and internal nodes alike.

use crate::util::{Vec3, PI};

/// Ray with a parametric validity interval `[mint, maxt]`.
///
/// `maxt` shrinks as closer hits are found during one traversal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub mint: f32,
    pub maxt: f32,
}

impl Ray {
    /// Ray with the interval `(0, +inf)`.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction, mint: 0.0, maxt: f32::INFINITY }
    }

    /// Ray with an explicit interval.
    pub fn with_bounds(origin: Vec3, direction: Vec3, mint: f32, maxt: f32) -> Self {
        Self { origin, direction, mint, maxt }
    }

    /// Point at parameter `t`.
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Sphere primitive (also used as a bounding volume).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub const fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Surface area.
    #[inline]
    pub fn area(&self) -> f32 {
        4.0 * PI * self.radius * self.radius
    }

    /// Enclosed volume.
    #[inline]
    pub fn volume(&self) -> f32 {
        (4.0 / 3.0) * PI * self.radius * self.radius * self.radius
    }

    /// Mass for a uniform density.
    #[inline]
    pub fn mass(&self, density: f32) -> f32 {
        self.volume() * density
    }

    /// Outward unit normal at a surface point.
    #[inline]
    pub fn normal_at(&self, p: Vec3) -> Vec3 {
        (p - self.center).normalize()
    }

    /// Non-mutating intersection test.
    ///
    /// Returns `(false, inf)` when the supporting line misses the sphere and
    /// `(true, t)` for the nearest root inside the open interval
    /// `(mint, maxt)`. When the line crosses the sphere but both roots fall
    /// outside the interval the result is `(true, inf)`: the sphere was tested
    /// and the line touches it, yet there is no valid hit distance. BVH
    /// traversal relies on that boolean to decide whether to descend.
    #[inline]
    pub fn intersect_p(&self, ray: &Ray) -> (bool, f32) {
        let op = self.center - ray.origin;
        let a = ray.direction.length_squared();
        let b = op.dot(ray.direction);
        let det = b * b - a * (op.length_squared() - self.radius * self.radius);
        if det < 0.0 {
            return (false, f32::INFINITY);
        }
        let det = det.sqrt();

        let t = (b - det) / a;
        if t > ray.mint && t < ray.maxt {
            return (true, t);
        }

        let t = (b + det) / a;
        if t > ray.mint && t < ray.maxt {
            return (true, t);
        }

        (true, f32::INFINITY)
    }

    /// Closest-hit test. Narrows `ray.maxt` on a valid hit.
    #[inline]
    pub fn intersect(&self, ray: &mut Ray) -> bool {
        let (_, t) = self.intersect_p(ray);
        if t.is_finite() {
            ray.maxt = t;
            true
        } else {
            false
        }
    }

    /// Any-hit test: true when a valid root exists inside the ray interval.
    #[inline]
    pub fn occludes(&self, ray: &Ray) -> bool {
        self.intersect_p(ray).1.is_finite()
    }

    /// True when `other` lies entirely inside this sphere (tangency included).
    #[inline]
    pub fn contains(&self, other: &Sphere) -> bool {
        self.center.distance(other.center) + other.radius <= self.radius
    }

    /// Conservative bound of two spheres.
    ///
    /// Takes the axis-aligned box around both spheres, centers the result in
    /// the box and reaches to its max corner. Not the minimal enclosing
    /// sphere, but cheap and always enclosing.
    pub fn union(&self, other: &Sphere) -> Sphere {
        let min = (self.center - Vec3::splat(self.radius))
            .min(other.center - Vec3::splat(other.radius));
        let max = (self.center + Vec3::splat(self.radius))
            .max(other.center + Vec3::splat(other.radius));
        let center = (min + max) * 0.5;
        Sphere::new(center, center.distance(max))
    }
}
