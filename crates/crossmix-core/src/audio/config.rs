//! Audio output configuration

use serde::{Deserialize, Serialize};

/// Requested buffer size for the output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferSize {
    /// Let the device pick (lowest-friction default)
    #[default]
    Auto,
    /// Fixed size in frames (devices may still round)
    Fixed(u32),
}

/// Output backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device name; None picks the system default
    pub device: Option<String>,
    /// Requested buffer size
    pub buffer_size: BufferSize,
}
