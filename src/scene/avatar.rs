//! Player avatar: a fixed set of spheres derived from the simulated body.
//!
//! The avatar is appended after the scene spheres in every accelerator
//! input, so part `k` has primitive index `scene_sphere_count + k`.

use crate::geom::Sphere;
use crate::util::{coordinate_system, Vec3};

/// Number of avatar spheres.
pub const AVATAR_SPHERES: usize = 6;

/// Avatar parts, in primitive order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarPart {
    Body = 0,
    LeftEye,
    RightEye,
    LeftPupil,
    RightPupil,
    Nose,
}

impl AvatarPart {
    pub const ALL: [AvatarPart; AVATAR_SPHERES] = [
        AvatarPart::Body,
        AvatarPart::LeftEye,
        AvatarPart::RightEye,
        AvatarPart::LeftPupil,
        AvatarPart::RightPupil,
        AvatarPart::Nose,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Avatar geometry, recomputed every frame from the body sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerAvatar {
    spheres: [Sphere; AVATAR_SPHERES],
}

impl PlayerAvatar {
    /// Avatar facing -Z with +Y up.
    pub fn new(body: Sphere) -> Self {
        let mut avatar = Self { spheres: [body; AVATAR_SPHERES] };
        avatar.update(body, Vec3::NEG_Z, Vec3::Y);
        avatar
    }

    /// Rebuild all parts from the simulated `body`, looking along `forward`.
    pub fn update(&mut self, body: Sphere, forward: Vec3, up: Vec3) {
        let forward = forward.try_normalize().unwrap_or(Vec3::NEG_Z);
        let right = match forward.cross(up).try_normalize() {
            Some(r) => r,
            None => coordinate_system(forward).0,
        };
        let up = right.cross(forward);

        let c = body.center;
        let r = body.radius;
        let eye_radius = 0.28 * r;
        let pupil_radius = 0.12 * r;

        let eye_dir = |side: f32| (forward * 0.75 + up * 0.45 + right * (0.35 * side)).normalize();
        let eye = |side: f32| Sphere::new(c + eye_dir(side) * (0.9 * r), eye_radius);
        let pupil = |side: f32| {
            Sphere::new(c + eye_dir(side) * (0.9 * r + eye_radius), pupil_radius)
        };

        self.spheres = [
            body,
            eye(-1.0),
            eye(1.0),
            pupil(-1.0),
            pupil(1.0),
            Sphere::new(c + forward * (1.05 * r), 0.18 * r),
        ];
    }

    pub fn spheres(&self) -> &[Sphere; AVATAR_SPHERES] {
        &self.spheres
    }

    pub fn part(&self, part: AvatarPart) -> Sphere {
        self.spheres[part.index()]
    }

    pub fn body(&self) -> Sphere {
        self.spheres[AvatarPart::Body.index()]
    }
}
