//! Thin-lens perspective camera with change detection.
//!
//! Public fields are edited by input/physics between frames; [`Camera::update`]
//! recomputes the raster/camera/world transforms only when they moved more
//! than a small epsilon since the last update.

use glam::Quat;

use crate::geom::Ray;
use crate::util::{concentric_disk, Mat4, Vec2, Vec3};

/// Threshold for squared distances and `1 - dot` in change detection.
const CHANGE_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
struct CameraTransforms {
    raster_to_camera: Mat4,
    camera_to_raster: Mat4,
    camera_to_world: Mat4,
    world_to_camera: Mat4,
}

/// Parameter values the transforms were last built from.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LastUsed {
    origin: Vec3,
    target: Vec3,
    up: Vec3,
    fov_deg: f32,
    clip_near: f32,
    clip_far: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub origin: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fov_deg: f32,
    pub clip_near: f32,
    pub clip_far: f32,
    /// Zero disables depth of field.
    pub lens_radius: f32,
    pub focal_distance: f32,
    width: u32,
    height: u32,
    transforms: CameraTransforms,
    last: LastUsed,
}

impl Camera {
    pub fn new(origin: Vec3, target: Vec3, up: Vec3, fov_deg: f32, width: u32, height: u32) -> Self {
        let last = LastUsed { origin, target, up, fov_deg, clip_near: 0.01, clip_far: 1.0e4 };
        let mut camera = Self {
            origin,
            target,
            up,
            fov_deg,
            clip_near: last.clip_near,
            clip_far: last.clip_far,
            lens_radius: 0.0,
            focal_distance: origin.distance(target),
            width: width.max(1),
            height: height.max(1),
            transforms: build_transforms(&last, width.max(1), height.max(1)),
            last,
        };
        camera.update();
        camera
    }

    pub fn with_lens(mut self, lens_radius: f32, focal_distance: f32) -> Self {
        self.lens_radius = lens_radius;
        self.focal_distance = focal_distance;
        self
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Change the raster size and rebuild the transforms immediately.
    pub fn set_resolution(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.transforms = build_transforms(&self.last, self.width, self.height);
    }

    /// True if the public parameters drifted from the last-used values.
    pub fn has_changed(&self) -> bool {
        let l = &self.last;
        self.origin.distance_squared(l.origin) > CHANGE_EPSILON
            || self.target.distance_squared(l.target) > CHANGE_EPSILON
            || 1.0 - self.up.normalize_or_zero().dot(l.up.normalize_or_zero()) > CHANGE_EPSILON
            || self.fov_deg != l.fov_deg
            || self.clip_near != l.clip_near
            || self.clip_far != l.clip_far
    }

    /// Recompute derived transforms if needed. Returns whether they changed.
    pub fn update(&mut self) -> bool {
        if !self.has_changed() {
            return false;
        }
        self.last = LastUsed {
            origin: self.origin,
            target: self.target,
            up: self.up,
            fov_deg: self.fov_deg,
            clip_near: self.clip_near,
            clip_far: self.clip_far,
        };
        self.transforms = build_transforms(&self.last, self.width, self.height);
        true
    }

    /// Primary ray through raster position `raster` with lens sample `lens` in `[0,1)²`.
    ///
    /// Uses the transforms of the last [`Camera::update`].
    pub fn generate_ray(&self, raster: Vec2, lens: Vec2) -> Ray {
        let t = &self.transforms;
        let p = t.raster_to_camera.project_point3(raster.extend(0.0));
        let mut origin = Vec3::ZERO;
        let mut dir = p.normalize();

        if self.lens_radius > 0.0 {
            let l = concentric_disk(lens.x, lens.y) * self.lens_radius;
            let ft = self.focal_distance / -dir.z;
            let focus = dir * ft;
            origin = Vec3::new(l.x, l.y, 0.0);
            dir = (focus - origin).normalize();
        }

        Ray::with_bounds(
            t.camera_to_world.transform_point3(origin),
            t.camera_to_world.transform_vector3(dir).normalize(),
            0.0,
            self.last.clip_far,
        )
    }

    /// Raster to camera-space projective transform (near plane at `z = -clip_near`).
    pub fn raster_to_camera(&self) -> Mat4 {
        self.transforms.raster_to_camera
    }

    pub fn camera_to_world(&self) -> Mat4 {
        self.transforms.camera_to_world
    }

    /// Raster position of a world-space point (may lie off screen).
    pub fn world_to_raster(&self, p: Vec3) -> Vec2 {
        let t = &self.transforms;
        t.camera_to_raster
            .project_point3(t.world_to_camera.transform_point3(p))
            .truncate()
    }

    /// Orbit the origin around the target by yaw/pitch radians.
    pub fn orbit(&mut self, yaw: f32, pitch: f32) {
        let offset = self.origin - self.target;
        let right = offset.cross(self.up).normalize_or_zero();
        let rot = Quat::from_axis_angle(self.up.normalize_or_zero(), yaw)
            * if right == Vec3::ZERO { Quat::IDENTITY } else { Quat::from_axis_angle(right, pitch) };
        self.origin = self.target + rot * offset;
    }

    /// Move origin and target together.
    pub fn translate(&mut self, delta: Vec3) {
        self.origin += delta;
        self.target += delta;
    }
}

fn build_transforms(p: &LastUsed, width: u32, height: u32) -> CameraTransforms {
    let (w, h) = (width as f32, height as f32);
    let perspective = Mat4::perspective_rh(p.fov_deg.to_radians(), w / h, p.clip_near, p.clip_far);
    let screen_to_raster = Mat4::from_translation(Vec3::new(0.5 * w, 0.5 * h, 0.0))
        * Mat4::from_scale(Vec3::new(0.5 * w, -0.5 * h, 1.0));
    let camera_to_raster = screen_to_raster * perspective;
    let world_to_camera = Mat4::look_at_rh(p.origin, p.target, p.up);

    CameraTransforms {
        raster_to_camera: camera_to_raster.inverse(),
        camera_to_raster,
        camera_to_world: world_to_camera.inverse(),
        world_to_camera,
    }
}
