//! Frame compositor: resolve, spatial filter, ghost blend, tone map.
//!
//! ```text
//! PassBuffer -> resolve (mean) -> SpatialFilter -> GhostBlend into stable Film -> ToneMap -> DisplayBuffer
//! ```

mod filter;
mod ghost;
mod tonemap;

pub use filter::{FilterKind, FilterParams, SpatialFilter};
pub use ghost::{GhostBlend, GhostParams};
pub use tonemap::{ToneMap, ToneMapKind, ToneMapParams, GAMMA_TABLE_SIZE};

use std::time::Instant;

use crate::film::{DisplayBuffer, Film, PassBuffer};

/// Owns the stable frame and display buffers for one renderer.
#[derive(Debug, Clone)]
pub struct Compositor {
    filter: SpatialFilter,
    ghost: GhostBlend,
    tone_map: ToneMap,
    resolved: Film,
    stable: Film,
    display: DisplayBuffer,
}

impl Compositor {
    pub fn new(
        width: u32,
        height: u32,
        filter: FilterParams,
        ghost: GhostParams,
        tone_map: ToneMapParams,
    ) -> Self {
        Self {
            filter: SpatialFilter::new(filter),
            ghost: GhostBlend::new(ghost),
            tone_map: ToneMap::new(tone_map),
            resolved: Film::new(width, height),
            stable: Film::new(width, height),
            display: DisplayBuffer::new(width, height),
        }
    }

    /// Composite one finished pass. Returns the ghost factor used.
    pub fn compose(&mut self, pass: &PassBuffer, camera_moving: bool, now: Instant) -> f32 {
        pass.resolve_into(&mut self.resolved);
        self.filter.apply(&mut self.resolved);
        let factor = self.ghost.update(camera_moving, now);
        self.ghost.blend(&mut self.stable, &self.resolved, factor);
        self.tone_map.apply(&self.stable, &mut self.display);
        factor
    }

    /// Ghost factor for a device that blends on its own.
    pub fn ghost_factor(&mut self, camera_moving: bool, now: Instant) -> f32 {
        self.ghost.update(camera_moving, now)
    }

    /// Mark the stable history as started after a device-side blend.
    #[cfg(feature = "gpu")]
    pub(crate) fn prime_ghost(&mut self) {
        self.ghost.mark_blended();
    }

    pub fn stable(&self) -> &Film {
        &self.stable
    }

    #[cfg(feature = "gpu")]
    pub(crate) fn stable_mut(&mut self) -> &mut Film {
        &mut self.stable
    }

    pub fn display(&self) -> &DisplayBuffer {
        &self.display
    }

    #[cfg(feature = "gpu")]
    pub(crate) fn display_mut(&mut self) -> &mut DisplayBuffer {
        &mut self.display
    }

    pub fn tone_map(&self) -> &ToneMap {
        &self.tone_map
    }

    pub fn reset_history(&mut self) {
        self.ghost.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Vec3;

    #[test]
    fn test_compose_flat_pass() {
        let mut c = Compositor::new(
            4,
            3,
            FilterParams { kind: FilterKind::HeavyBlur, iterations: 2, radius: 1 },
            GhostParams::default(),
            ToneMapParams::Linear { scale: 1.0, gamma: 1.0 },
        );
        let mut pass = PassBuffer::new(4, 3);
        for y in 0..3 {
            for x in 0..4 {
                pass.record(0, x, y, Vec3::splat(2.0));
                pass.record(1, x, y, Vec3::splat(0.0));
            }
        }
        pass.finish(2);
        let f = c.compose(&pass, false, Instant::now());
        assert_eq!(f, 1.0);
        assert!((c.stable().get(3, 2) - Vec3::ONE).abs().max_element() < 1e-5);
        assert_eq!(c.display().pixel(0, 0), [255, 255, 255, 255]);
    }
}
