//! Execution strategies and the renderer front-end.
//!
//! All strategies share the accelerator and the integrator and differ only
//! in how the pixels of a pass are distributed:
//!
//! - [`SequentialSampler`]: row-major on the calling thread
//! - [`ThreadedSampler`]: barrier-synchronized pool, interleaved rows
//! - `GpuRenderer` (feature `gpu`): WGSL kernel, device-side ghost blend
//!
//! Results are visually equivalent across strategies but not bit-identical.

mod sequential;
mod threaded;

#[cfg(feature = "gpu")]
mod gpu;

pub use sequential::SequentialSampler;
pub use threaded::ThreadedSampler;

#[cfg(feature = "gpu")]
pub use gpu::GpuRenderer;

use std::time::{Duration, Instant};

use crate::accel::BvhBuilder;
use crate::compositor::Compositor;
use crate::config::{RenderConfig, RendererKind};
use crate::film::{DisplayBuffer, Film, PassBuffer};
use crate::integrator::PathIntegrator;
use crate::level::{FrameSnapshot, Level};
use crate::util::Result;

use crate::util::Error;

/// CPU strategy filling one pass buffer from a frame snapshot.
pub trait PassSampler: Send {
    fn name(&self) -> &'static str;

    /// Integrate `samples` per pixel into `pass`; the first sample overwrites.
    fn render_pass(&mut self, frame: &FrameSnapshot, samples: u32, pass: &mut PassBuffer);
}

/// Per-frame report for throughput display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    /// Radiance samples taken this frame (pixels times samples per pass).
    pub samples: u64,
    pub elapsed: Duration,
    pub geometry_version: u64,
    pub camera_moving: bool,
}

impl FrameStats {
    pub fn samples_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.samples as f64 / secs
        } else {
            0.0
        }
    }
}

enum Backend {
    Cpu {
        sampler: Box<dyn PassSampler>,
        pass: PassBuffer,
    },
    #[cfg(feature = "gpu")]
    Gpu(Box<GpuRenderer>),
}

/// Renderer front-end: snapshot, sample, composite.
pub struct Renderer {
    config: RenderConfig,
    builder: BvhBuilder,
    backend: Backend,
    compositor: Compositor,
    frames: u64,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Result<Self> {
        config.validate()?;
        let integrator = PathIntegrator::new(config.integrator);
        let (w, h) = (config.width, config.height);

        let backend = match config.renderer {
            RendererKind::Sequential => Backend::Cpu {
                sampler: Box::new(SequentialSampler::new(integrator, config.seed)),
                pass: PassBuffer::new(w, h),
            },
            RendererKind::Threaded => Backend::Cpu {
                sampler: Box::new(ThreadedSampler::new(
                    integrator,
                    config.worker_threads(),
                    w,
                    h,
                    config.seed,
                )?),
                pass: PassBuffer::new(w, h),
            },
            #[cfg(feature = "gpu")]
            RendererKind::Gpu => Backend::Gpu(Box::new(GpuRenderer::new(&config)?)),
            #[cfg(not(feature = "gpu"))]
            RendererKind::Gpu => {
                return Err(Error::NoGpuDevice("built without the `gpu` feature".into()));
            }
        };

        let compositor = Compositor::new(w, h, config.filter, config.ghost, config.tone_map);
        tracing::info!(
            strategy = ?config.renderer,
            width = w,
            height = h,
            spp = config.samples_per_pass,
            "renderer ready"
        );

        Ok(Self {
            builder: BvhBuilder::new(config.bvh),
            config,
            backend,
            compositor,
            frames: 0,
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn strategy_name(&self) -> &'static str {
        match &self.backend {
            Backend::Cpu { sampler, .. } => sampler.name(),
            #[cfg(feature = "gpu")]
            Backend::Gpu(_) => "gpu",
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Render one frame of `level`.
    ///
    /// The level lock is held only inside [`Level::snapshot`]. The level camera
    /// must be built for the configured output resolution.
    pub fn render_frame(&mut self, level: &Level) -> Result<FrameStats> {
        let start = Instant::now();
        let frame = level.snapshot(&self.builder);
        let size = (self.config.width, self.config.height);
        if frame.camera.resolution() != size {
            let (cw, ch) = frame.camera.resolution();
            return Err(Error::config(format!(
                "camera resolution {cw}x{ch} does not match output {}x{}",
                size.0, size.1
            )));
        }
        tracing::trace!(
            nodes = frame.bvh.node_count(),
            leaves = frame.bvh.leaf_count(),
            depth = frame.bvh.depth(),
            "accelerator built"
        );

        let moving = frame.camera_changed;
        let pixels = self.config.width as u64 * self.config.height as u64;
        let spp = match &mut self.backend {
            Backend::Cpu { sampler, pass } => {
                let spp = self.config.samples_per_pass;
                sampler.render_pass(&frame, spp, pass);
                self.compositor.compose(pass, moving, Instant::now());
                spp
            }
            #[cfg(feature = "gpu")]
            Backend::Gpu(gpu) => {
                let factor = self.compositor.ghost_factor(moving, Instant::now());
                gpu.render_frame(&frame, factor, &mut self.compositor)?;
                gpu.samples_per_pass()
            }
        };

        self.frames += 1;
        let stats = FrameStats {
            samples: pixels * spp as u64,
            elapsed: start.elapsed(),
            geometry_version: frame.geometry_version,
            camera_moving: moving,
        };
        tracing::debug!(
            frame = self.frames,
            ms = stats.elapsed.as_secs_f64() * 1e3,
            moving,
            "frame done"
        );
        Ok(stats)
    }

    /// Display-ready RGBA8 pixels.
    pub fn display(&self) -> &DisplayBuffer {
        self.compositor.display()
    }

    /// Stable linear frame (before tone mapping).
    pub fn linear(&self) -> &Film {
        self.compositor.stable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::geom::Sphere;
    use crate::scene::{Material, PlayerAvatar, Scene};
    use crate::util::Vec3;

    fn level() -> Level {
        let mut scene = Scene::new();
        scene.add_material("grey", Material::matte(Vec3::splat(0.5))).unwrap();
        scene.add_sphere("ball", Sphere::new(Vec3::ZERO, 1.0), "grey").unwrap();
        let avatar = PlayerAvatar::new(Sphere::new(Vec3::new(0.0, -50.0, 0.0), 0.5));
        let camera = Camera::new(Vec3::new(0.0, 0.0, 4.0), Vec3::ZERO, Vec3::Y, 50.0, 8, 6);
        Level::new(scene, avatar, camera)
    }

    #[test]
    fn test_sequential_frame_stats() {
        let config = RenderConfig {
            width: 8,
            height: 6,
            samples_per_pass: 2,
            renderer: RendererKind::Sequential,
            ..Default::default()
        };
        let mut r = Renderer::new(config).unwrap();
        assert_eq!(r.strategy_name(), "sequential");
        let l = level();
        let stats = r.render_frame(&l).unwrap();
        assert_eq!(stats.samples, 8 * 6 * 2);
        assert!(!stats.camera_moving);
        assert_eq!(r.frames(), 1);
        assert_eq!(r.display().as_bytes().len(), 8 * 6 * 4);
        // corners see the uniform dome
        assert!((r.linear().get(0, 0) - Vec3::ONE).abs().max_element() < 0.2);
    }

    #[test]
    fn test_camera_motion_reported() {
        let config = RenderConfig {
            width: 8,
            height: 6,
            renderer: RendererKind::Threaded,
            threads: 2,
            ..Default::default()
        };
        let mut r = Renderer::new(config).unwrap();
        let l = level();
        r.render_frame(&l).unwrap();
        l.edit_camera(|c| c.orbit(0.2, 0.0));
        assert!(r.render_frame(&l).unwrap().camera_moving);
        assert!(!r.render_frame(&l).unwrap().camera_moving);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = RenderConfig { samples_per_pass: 0, ..Default::default() };
        assert!(Renderer::new(config).is_err());
    }
}
