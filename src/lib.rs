//! Pointer-driven grid distortion of an image.
//!
//! A coarse N×N displacement field follows pointer motion, relaxes back to
//! rest every tick, and is uploaded to the GPU where a fragment shader uses
//! it to offset the image lookup.  [`effect::GridDistortion`] owns the
//! lifecycle; hosts feed it pointer, resize and frame callbacks.

pub mod logger;

pub mod app;
pub mod cli;
pub mod config;
pub mod effect;
pub mod error;
pub mod field;
pub mod frame;
pub mod gpu;
pub mod headless;
pub mod integrator;
pub mod loader;
pub mod pointer;
pub mod viewport;

pub use config::EffectConfig;
pub use effect::{DrawOutcome, GridDistortion, Lifecycle, WarpSink};
pub use error::EffectError;
