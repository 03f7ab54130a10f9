//! Built-in processor kernels.

pub mod canvas;
pub mod filters;
pub mod math;
pub mod sources;

pub use canvas::Canvas;
pub use filters::{Blend, DistanceField, Invert, Passthrough};
pub use math::{Add, Luminance};
pub use sources::{GBufferSource, NoiseSource, SolidSource};
