//! Scene bindings consumed by the integrator.
//!
//! - [`Scene`] - named materials, textures, spheres and pills
//! - [`SceneBindings`] - immutable per-frame view shared with samplers
//! - [`Material`] / [`Bsdf`] - closed set of scattering models
//! - [`InfiniteLight`] - the single dome light
//! - [`PlayerAvatar`] - six spheres appended after the scene spheres

mod avatar;
mod bindings;
mod light;
mod material;
mod texture;

pub use avatar::{AvatarPart, PlayerAvatar, AVATAR_SPHERES};
pub use bindings::{Registry, Scene, SceneBindings, SurfaceBinding};
pub use light::InfiniteLight;
pub use material::{Bsdf, BsdfSample, Material, MaterialHandle};
pub use texture::{BumpMap, Texture, TextureHandle, TextureMap};
