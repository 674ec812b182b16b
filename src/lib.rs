#![recursion_limit = "256"]
//! Adversarial training of a small generator/discriminator pair on synthetic
//! typographic glyphs.

#[cfg(any(feature = "ndarray", feature = "wgpu", feature = "cuda"))]
pub mod backend;
pub mod checkpoint;
pub mod data;
pub mod error;
pub mod export;
pub mod font;
pub mod metrics;
pub mod model;
pub mod sampling;
pub mod training;

pub use error::{GanError, Phase};
