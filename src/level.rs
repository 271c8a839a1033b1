//! A playable level: scene, avatar and camera behind one coarse lock.
//!
//! The physics and input threads mutate state through [`Level::edit`] and
//! [`Level::edit_camera`]. The renderer calls [`Level::snapshot`] once per
//! frame; the lock is held only while the accelerator is rebuilt and the
//! camera and bindings are copied, never while sampling.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::accel::{BvhBuilder, FlatBvh};
use crate::camera::Camera;
use crate::geom::Sphere;
use crate::scene::{PlayerAvatar, Scene, SceneBindings};

/// Mutable level contents, reachable only under the level lock.
#[derive(Debug, Clone)]
pub struct LevelState {
    pub scene: Scene,
    pub avatar: PlayerAvatar,
    pub camera: Camera,
}

impl LevelState {
    /// Accelerator input: scene spheres followed by the avatar spheres.
    pub fn primitives(&self) -> Vec<Sphere> {
        let mut prims = Vec::with_capacity(self.scene.spheres().len() + self.avatar.spheres().len());
        prims.extend_from_slice(self.scene.spheres());
        prims.extend_from_slice(self.avatar.spheres());
        prims
    }
}

/// Immutable per-frame view shared by every sample of one frame.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub bvh: Arc<FlatBvh>,
    pub camera: Camera,
    pub bindings: Arc<SceneBindings>,
    /// Bumped by every geometry edit; equal versions mean equal geometry.
    pub geometry_version: u64,
    /// Camera transforms were recomputed for this snapshot.
    pub camera_changed: bool,
}

#[derive(Debug)]
struct Guarded {
    state: LevelState,
    geometry_version: u64,
}

#[derive(Debug)]
pub struct Level {
    inner: Mutex<Guarded>,
}

impl Level {
    pub fn new(scene: Scene, avatar: PlayerAvatar, camera: Camera) -> Self {
        Self {
            inner: Mutex::new(Guarded {
                state: LevelState { scene, avatar, camera },
                geometry_version: 0,
            }),
        }
    }

    /// Mutate geometry or bindings. Bumps the geometry version.
    pub fn edit<R>(&self, f: impl FnOnce(&mut LevelState) -> R) -> R {
        let mut guard = self.inner.lock();
        guard.geometry_version += 1;
        f(&mut guard.state)
    }

    /// Mutate the camera only; geometry version is left alone.
    pub fn edit_camera<R>(&self, f: impl FnOnce(&mut Camera) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard.state.camera)
    }

    /// Read-only access under the lock.
    pub fn read<R>(&self, f: impl FnOnce(&LevelState) -> R) -> R {
        let guard = self.inner.lock();
        f(&guard.state)
    }

    pub fn geometry_version(&self) -> u64 {
        self.inner.lock().geometry_version
    }

    /// Rebuild the accelerator and copy camera and bindings.
    pub fn snapshot(&self, builder: &BvhBuilder) -> FrameSnapshot {
        let mut guard = self.inner.lock();
        let geometry_version = guard.geometry_version;
        let state = &mut guard.state;

        let camera_changed = state.camera.update();
        let bvh = builder.build(&state.primitives());

        FrameSnapshot {
            bvh: Arc::new(bvh),
            camera: state.camera,
            bindings: Arc::clone(state.scene.bindings()),
            geometry_version,
            camera_changed,
        }
    }

    /// True once every pill has been switched off.
    pub fn is_won(&self) -> bool {
        self.read(|s| {
            let b = s.scene.bindings();
            b.pill_count() > 0 && b.pills_remaining() == 0
        })
    }
}
