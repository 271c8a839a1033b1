//! Renderer configuration, loaded from JSON.
//!
//! Every field has a default, so a config file only needs the keys it
//! changes. Unknown enum tags are rejected at load time.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::accel::BvhParams;
use crate::compositor::{FilterKind, FilterParams, GhostParams, ToneMapParams};
use crate::integrator::IntegratorParams;
use crate::util::{Error, Result};

/// Execution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    Sequential,
    #[default]
    Threaded,
    Gpu,
}

impl FromStr for RendererKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" | "seq" | "single" => Ok(Self::Sequential),
            "threaded" | "mt" | "cpu" => Ok(Self::Threaded),
            "gpu" | "device" => Ok(Self::Gpu),
            _ => Err(Error::UnknownRenderer(s.to_string())),
        }
    }
}

/// GPU strategy knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuParams {
    /// Per-device samples-per-pass overrides; only the first device is used.
    pub device_samples_per_pass: Vec<u32>,
    /// Square compute workgroup edge the kernel is compiled for.
    pub workgroup_size: u32,
}

impl Default for GpuParams {
    fn default() -> Self {
        Self { device_samples_per_pass: Vec::new(), workgroup_size: 8 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    // Output
    pub width: u32,
    pub height: u32,
    pub samples_per_pass: u32,

    // Execution
    pub renderer: RendererKind,
    /// Worker threads for the threaded strategy; 0 means hardware concurrency.
    pub threads: usize,
    pub seed: u64,

    // Compositing
    pub filter: FilterParams,
    pub ghost: GhostParams,
    pub tone_map: ToneMapParams,

    // Light transport
    pub integrator: IntegratorParams,
    pub bvh: BvhParams,

    pub gpu: GpuParams,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            samples_per_pass: 1,
            renderer: RendererKind::default(),
            threads: 0,
            seed: 0x5eed,
            filter: FilterParams { kind: FilterKind::LightBlur, iterations: 1, radius: 1 },
            ghost: GhostParams::default(),
            tone_map: ToneMapParams::default(),
            integrator: IntegratorParams::default(),
            bvh: BvhParams::default(),
            gpu: GpuParams::default(),
        }
    }
}

impl RenderConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Parse and validate a JSON config.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::config(format!("resolution {}x{} is empty", self.width, self.height)));
        }
        if self.samples_per_pass == 0 {
            return Err(Error::config("samples_per_pass must be at least 1"));
        }
        let gamma = self.tone_map.gamma();
        if !(gamma.is_finite() && gamma > 0.0) {
            return Err(Error::config(format!("gamma {gamma} must be positive")));
        }
        if self.filter.kind == FilterKind::Box && self.filter.radius == 0 {
            return Err(Error::config("box filter radius must be at least 1"));
        }
        if self.integrator.ray_epsilon.is_nan() || self.integrator.ray_epsilon < 0.0 {
            return Err(Error::config("ray_epsilon must be non-negative"));
        }
        if self.ghost.duration_secs < 0.0 {
            return Err(Error::config("ghost duration must be non-negative"));
        }
        if self.gpu.device_samples_per_pass.iter().any(|&n| n == 0) {
            return Err(Error::config("device samples_per_pass overrides must be at least 1"));
        }
        if self.gpu.workgroup_size == 0 {
            return Err(Error::config("workgroup_size must be at least 1"));
        }
        Ok(())
    }

    /// Worker count with 0 resolved to the available parallelism.
    pub fn worker_threads(&self) -> usize {
        if self.threads > 0 {
            return self.threads;
        }
        std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    }

    /// Samples per pass on the GPU device.
    pub fn device_samples_per_pass(&self) -> u32 {
        self.gpu
            .device_samples_per_pass
            .first()
            .copied()
            .unwrap_or(self.samples_per_pass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::ToneMapKind;

    #[test]
    fn test_partial_json_uses_defaults() {
        let c = RenderConfig::from_json(r#"{"width": 32, "renderer": "sequential"}"#).unwrap();
        assert_eq!(c.width, 32);
        assert_eq!(c.height, RenderConfig::default().height);
        assert_eq!(c.renderer, RendererKind::Sequential);
        assert_eq!(c.integrator, IntegratorParams::default());
    }

    #[test]
    fn test_unknown_tags_fail() {
        assert!(RenderConfig::from_json(r#"{"renderer": "cuda"}"#).is_err());
        assert!(RenderConfig::from_json(r#"{"filter": {"kind": "gauss"}}"#).is_err());
        assert!(matches!("cuda".parse::<RendererKind>(), Err(Error::UnknownRenderer(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut c = RenderConfig { width: 0, ..Default::default() };
        assert!(matches!(c.validate(), Err(Error::Config(_))));
        c.width = 8;
        c.samples_per_pass = 0;
        assert!(c.validate().is_err());
        c.samples_per_pass = 1;
        c.tone_map = ToneMapParams::Linear { scale: 1.0, gamma: 0.0 };
        assert!(c.validate().is_err());
        c.tone_map = ToneMapKind::Reinhard02.default_params();
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_device_spp_override() {
        let mut c = RenderConfig { samples_per_pass: 2, ..Default::default() };
        assert_eq!(c.device_samples_per_pass(), 2);
        c.gpu.device_samples_per_pass = vec![16, 4];
        assert_eq!(c.device_samples_per_pass(), 16);
    }

    #[test]
    fn test_worker_threads_resolves_zero() {
        let c = RenderConfig::default();
        assert!(c.worker_threads() >= 1);
        assert_eq!(RenderConfig { threads: 3, ..Default::default() }.worker_threads(), 3);
    }
}
