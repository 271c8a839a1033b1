//! # spheretrace
//!
//! Real-time Monte-Carlo path tracer for dynamic scenes built entirely from
//! spheres.
//!
//! Every frame the renderer snapshots the shared [`level::Level`] under its
//! lock, rebuilds an N-ary sphere hierarchy, traces one pass of samples per
//! pixel with one of the execution strategies and composites the result
//! (spatial filter, temporal ghost blend, tone map) into an RGBA8 buffer.
//!
//! ## Modules
//!
//! - [`util`] - Errors, math re-exports, sampling helpers
//! - [`geom`] - Rays and spheres
//! - [`accel`] - Bounding-sphere hierarchy with skip-index traversal
//! - [`scene`] - Materials, textures, environment light, avatar, bindings
//! - [`camera`] - Thin-lens camera with change detection
//! - [`level`] - Lock-guarded level state shared with game logic
//! - [`integrator`] - Path integrator with bounce caps
//! - [`film`] - Linear frames, pass accumulation, display buffers
//! - [`compositor`] - Filters, ghost blend, tone mapping
//! - [`render`] - Sequential, threaded and GPU strategies
//! - [`config`] - JSON render configuration
//!
//! ## Example
//!
//! ```ignore
//! use spheretrace::prelude::*;
//!
//! let mut scene = Scene::new();
//! scene.add_material("grey", Material::matte(Vec3::splat(0.5)))?;
//! scene.add_sphere("ball", Sphere::new(Vec3::ZERO, 1.0), "grey")?;
//! let avatar = PlayerAvatar::new(Sphere::new(Vec3::new(0.0, -3.0, 0.0), 0.5));
//! let camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y, 50.0, 640, 480);
//! let level = Level::new(scene, avatar, camera);
//!
//! let mut renderer = Renderer::new(RenderConfig::default())?;
//! renderer.render_frame(&level)?;
//! let rgba = renderer.display().as_bytes();
//! ```

pub mod util;
pub mod geom;
pub mod accel;
pub mod scene;
pub mod camera;
pub mod level;
pub mod integrator;
pub mod film;
pub mod compositor;
pub mod render;
pub mod config;

pub use util::{Error, Result};
pub use render::{FrameStats, Renderer};
pub use config::{RenderConfig, RendererKind};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Error, Result, Spectrum, Vec2, Vec3};
    pub use crate::geom::{Ray, Sphere};
    pub use crate::accel::{BvhBuilder, BvhParams, FlatBvh};
    pub use crate::scene::{
        AvatarPart, BumpMap, InfiniteLight, Material, PlayerAvatar, Scene, Texture, TextureMap,
    };
    pub use crate::camera::Camera;
    pub use crate::level::Level;
    pub use crate::integrator::{IntegratorParams, PathIntegrator};
    pub use crate::compositor::{FilterKind, FilterParams, GhostParams, ToneMapParams};
    pub use crate::render::{FrameStats, Renderer};
    pub use crate::config::{RenderConfig, RendererKind};
}
