#![doc = include_str!("../README.md")]

//! # Core Concepts
//!
//! - **`RasterImage`**: Validated, non-empty grid of 8-bit RGB pixels
//! - **`ColorExtractor`**: k-means over pixels; reports the `DominantColor` of the largest cluster
//! - **`ColorMapper`**: Normalizes a color and scales it into an `ActuationPlan`
//! - **`ActuationPlan`**: Valve open times in seconds; the motor runs for their sum
//! - **`ActuationSequence`**: The fixed red, green, blue, motor stages with inter-stage pauses
//! - **`ActuatorController`**: Owns the outputs and runs the sequence with guaranteed release
//! - **`ActuatorDriver`**: Trait to implement for your output hardware
//! - **`TimeSource`**: Trait to implement for your timing system
//! - **`ImageSource`**: Trait to implement for your image producer
//! - **`Pipeline`**: Acquire, extract, map and actuate in one call
//!
//! Colors travel as `Srgb<u8>` pixels, `DominantColor` integers, then
//! `Srgb<f64>` (0.0-1.0 range) once normalized.

// Re-export Srgb from palette for user convenience
pub use palette::Srgb;

pub mod acquisition;
pub mod actuator;
pub mod cluster;
pub mod controller;
pub mod hardware;
pub mod mapping;
pub mod pipeline;
pub mod raster;
pub mod sequence;
pub mod settings;
pub mod time;

pub use acquisition::{AcquisitionError, CameraSource, FileSource, ImageSource, MemorySource};
pub use actuator::{Actuator, ActuatorDriver, ActuatorState, CancellationToken};
pub use cluster::{
    ClusterSettings, Clustering, ColorCluster, ColorExtractor, DominantColor, ExtractError,
    extract_dominant,
};
pub use controller::{ActuationError, ActuationSettings, ActuatorController};
pub use hardware::{GpioPins, LoggingDriver, SysfsGpioDriver};
pub use mapping::{ActuationPlan, ColorMapper, MappingError, NormalizedColor, denormalize, normalize};
pub use pipeline::{Pipeline, PipelineError, RunReport};
pub use raster::{RasterError, RasterImage};
pub use sequence::{ActuationSequence, SequenceError, Stage};
pub use settings::{ConfigError, PipelineConfig};
pub use time::{SystemTimeSource, TimeSource};
