// ============================================================================
// ERRORS — every variant names the stage that failed
// ============================================================================

use std::fmt;

#[derive(Debug)]
pub enum EffectError {
    /// Surface, adapter, device or pipeline creation failed.  Fatal for the
    /// effect instance.
    ResourceInit(String),
    /// The source image could not be opened or decoded.  The effect keeps
    /// rendering a blank surface.
    AssetLoad(String),
    /// Construction parameters violate an `EffectConfig` invariant.
    Config(String),
    /// A frame could not be produced and the device cannot recover.
    Frame(String),
}

impl fmt::Display for EffectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectError::ResourceInit(e) => write!(f, "GPU resource init failed: {}", e),
            EffectError::AssetLoad(e) => write!(f, "Image load failed: {}", e),
            EffectError::Config(e) => write!(f, "Invalid configuration: {}", e),
            EffectError::Frame(e) => write!(f, "Frame failed: {}", e),
        }
    }
}

impl std::error::Error for EffectError {}

impl EffectError {
    /// Whether the effect instance must be torn down after this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, EffectError::AssetLoad(_))
    }
}

impl From<image::ImageError> for EffectError {
    fn from(e: image::ImageError) -> Self {
        EffectError::AssetLoad(e.to_string())
    }
}

impl From<std::io::Error> for EffectError {
    fn from(e: std::io::Error) -> Self {
        EffectError::AssetLoad(e.to_string())
    }
}

impl From<wgpu::CreateSurfaceError> for EffectError {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        EffectError::ResourceInit(format!("surface: {}", e))
    }
}

impl From<wgpu::RequestDeviceError> for EffectError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        EffectError::ResourceInit(format!("device: {}", e))
    }
}
