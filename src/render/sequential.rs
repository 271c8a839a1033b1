//! Single-threaded strategy.

use super::PassSampler;
use crate::film::PassBuffer;
use crate::integrator::PathIntegrator;
use crate::level::FrameSnapshot;
use crate::util::{seeded_rng, SampleRng};

/// Samples every pixel row-major on the calling thread.
pub struct SequentialSampler {
    integrator: PathIntegrator,
    rng: SampleRng,
}

impl SequentialSampler {
    pub fn new(integrator: PathIntegrator, seed: u64) -> Self {
        Self { integrator, rng: seeded_rng(seed) }
    }
}

impl PassSampler for SequentialSampler {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn render_pass(&mut self, frame: &FrameSnapshot, samples: u32, pass: &mut PassBuffer) {
        let (w, h) = (pass.width(), pass.height());
        for s in 0..samples {
            for y in 0..h {
                for x in 0..w {
                    let c = self.integrator.sample_radiance(&mut self.rng, frame, x, y);
                    pass.record(s, x, y, c);
                }
            }
        }
        pass.finish(samples);
    }
}
