//! Error types for the renderer.

use thiserror::Error;

/// Main error type for spheretrace operations.
///
/// Only configuration, resource and I/O failures surface here. Numerically dead
/// light paths and degenerate geometry are handled locally and never become errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Filter type name not recognized
    #[error("Unknown filter type: {0}")]
    UnknownFilter(String),

    /// Renderer type name not recognized
    #[error("Unknown renderer type: {0}")]
    UnknownRenderer(String),

    /// Tone map type name not recognized
    #[error("Unknown tone map type: {0}")]
    UnknownToneMap(String),

    /// A scene name was registered twice
    #[error("Duplicate {kind} name: {name}")]
    DuplicateName { kind: &'static str, name: String },

    /// A scene name was referenced but never registered
    #[error("Unknown {kind} name: {name}")]
    UnknownName { kind: &'static str, name: String },

    /// No compatible GPU adapter or device
    #[error("No compatible GPU device: {0}")]
    NoGpuDevice(String),

    /// Device program failed to compile; carries the build log
    #[error("Kernel build failed:\n{log}")]
    KernelBuild { log: String },

    /// Device-side failure after setup (buffer mapping, submission)
    #[error("Device error: {0}")]
    Device(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON configuration parse error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error from a string.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a device error from a string.
    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }
}

/// Result type alias for spheretrace operations.
pub type Result<T> = std::result::Result<T, Error>;
