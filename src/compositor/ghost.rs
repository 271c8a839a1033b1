//! Temporal ghosting blend.
//!
//! The stable frame is an exponential moving average of filtered passes. The
//! blend factor ramps linearly from one configured value to the other over
//! `duration_secs` after each moving/static transition of the camera.

use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::film::Film;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GhostParams {
    /// Weight of the new pass while the camera moves.
    pub factor_moving: f32,
    /// Weight of the new pass once settled.
    pub factor_static: f32,
    pub duration_secs: f32,
}

impl Default for GhostParams {
    fn default() -> Self {
        Self { factor_moving: 0.6, factor_static: 0.1, duration_secs: 0.5 }
    }
}

#[derive(Debug, Clone)]
pub struct GhostBlend {
    params: GhostParams,
    moving: bool,
    /// Time of the last static-to-moving transition.
    moving_since: Option<Instant>,
    /// Time of the last moving-to-static transition.
    static_since: Option<Instant>,
    primed: bool,
}

impl GhostBlend {
    pub fn new(params: GhostParams) -> Self {
        Self { params, moving: false, moving_since: None, static_since: None, primed: false }
    }

    pub fn params(&self) -> &GhostParams {
        &self.params
    }

    /// Forget history; the next blend replaces the stable frame.
    pub fn reset(&mut self) {
        self.primed = false;
        self.moving_since = None;
        self.static_since = None;
    }

    /// Blend factor for a frame observed at `now`. The first frame gets 1.
    pub fn update(&mut self, moving: bool, now: Instant) -> f32 {
        if moving != self.moving || (self.moving_since.is_none() && self.static_since.is_none()) {
            if moving {
                self.moving_since = Some(now);
            } else {
                self.static_since = Some(now);
            }
            self.moving = moving;
        }
        if !self.primed {
            return 1.0;
        }

        let (since, from, to) = if moving {
            (self.moving_since, self.params.factor_static, self.params.factor_moving)
        } else {
            (self.static_since, self.params.factor_moving, self.params.factor_static)
        };
        let elapsed = since.map_or(Duration::ZERO, |t| now.saturating_duration_since(t));
        let t = if self.params.duration_secs > 0.0 {
            (elapsed.as_secs_f32() / self.params.duration_secs).min(1.0)
        } else {
            1.0
        };
        from + (to - from) * t
    }

    /// Record that a blend happened elsewhere (device side).
    #[cfg(feature = "gpu")]
    pub(crate) fn mark_blended(&mut self) {
        self.primed = true;
    }

    /// `stable = (1 - factor) * stable + factor * current`.
    pub fn blend(&mut self, stable: &mut Film, current: &Film, factor: f32) {
        debug_assert_eq!(stable.pixels().len(), current.pixels().len());
        let factor = if self.primed { factor.clamp(0.0, 1.0) } else { 1.0 };
        stable
            .pixels_mut()
            .par_iter_mut()
            .zip(current.pixels().par_iter())
            .for_each(|(s, c)| *s = *s * (1.0 - factor) + *c * factor);
        self.primed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Vec3;

    fn params() -> GhostParams {
        GhostParams { factor_moving: 0.8, factor_static: 0.2, duration_secs: 1.0 }
    }

    #[test]
    fn test_first_frame_replaces() {
        let mut g = GhostBlend::new(params());
        let now = Instant::now();
        assert_eq!(g.update(false, now), 1.0);
        let mut stable = Film::filled(2, 2, Vec3::splat(7.0));
        g.blend(&mut stable, &Film::filled(2, 2, Vec3::ONE), 0.3);
        assert_eq!(stable.get(1, 1), Vec3::ONE);
    }

    #[test]
    fn test_ramp_between_factors() {
        let mut g = GhostBlend::new(params());
        let t0 = Instant::now();
        g.update(false, t0);
        let mut stable = Film::new(1, 1);
        g.blend(&mut stable, &Film::new(1, 1), 1.0);

        // start moving: ramp from static toward moving
        let f0 = g.update(true, t0 + Duration::from_millis(100));
        assert!((f0 - 0.2).abs() < 1e-5);
        let half = g.update(true, t0 + Duration::from_millis(600));
        assert!((half - 0.5).abs() < 1e-4);
        let full = g.update(true, t0 + Duration::from_secs(3));
        assert!((full - 0.8).abs() < 1e-5);

        // settle: ramp back down
        let s0 = g.update(false, t0 + Duration::from_secs(4));
        assert!((s0 - 0.8).abs() < 1e-5);
        let s1 = g.update(false, t0 + Duration::from_secs(6));
        assert!((s1 - 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_blend_is_weighted_average() {
        let mut g = GhostBlend::new(params());
        let mut stable = Film::filled(1, 1, Vec3::ZERO);
        g.blend(&mut stable, &Film::filled(1, 1, Vec3::splat(2.0)), 1.0);
        g.blend(&mut stable, &Film::filled(1, 1, Vec3::splat(4.0)), 0.25);
        assert!((stable.get(0, 0) - Vec3::splat(2.5)).abs().max_element() < 1e-6);
    }
}
