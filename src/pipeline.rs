//! End-to-end orchestration: acquire, extract, map, actuate.

use thiserror::Error;
use tracing::{error, info};

use crate::acquisition::{AcquisitionError, ImageSource};
use crate::actuator::{ActuatorDriver, CancellationToken};
use crate::cluster::{ColorExtractor, DominantColor, ExtractError};
use crate::controller::{ActuationError, ActuatorController};
use crate::mapping::{ActuationPlan, ColorMapper, MappingError, NormalizedColor};
use crate::time::TimeSource;

/// Any failure of a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("acquisition failed: {0}")]
    AcquisitionFailed(#[from] AcquisitionError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Actuation(#[from] ActuationError),
}

/// Intermediate values of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunReport {
    pub dominant: DominantColor,
    pub normalized: NormalizedColor,
    pub plan: ActuationPlan,
}

/// Drives one image through every stage and onto the actuators.
///
/// Stages run synchronously and in order; the first failure stops the run.
/// Actuation failures are only reported after the controller has forced
/// every actuator closed.
pub struct Pipeline<S: ImageSource, D: ActuatorDriver, T: TimeSource> {
    source: S,
    extractor: ColorExtractor,
    mapper: ColorMapper,
    controller: ActuatorController<D, T>,
}

impl<S: ImageSource, D: ActuatorDriver, T: TimeSource> Pipeline<S, D, T> {
    pub fn new(
        source: S,
        extractor: ColorExtractor,
        mapper: ColorMapper,
        controller: ActuatorController<D, T>,
    ) -> Self {
        Self {
            source,
            extractor,
            mapper,
            controller,
        }
    }

    /// Acquires an image and computes its plan without touching the actuators.
    pub fn plan(&mut self) -> Result<RunReport, PipelineError> {
        let image = self.source.acquire()?;
        info!(
            width = image.width(),
            height = image.height(),
            "image acquired"
        );

        let dominant = self.extractor.extract(&image)?;
        info!("Dominant Color (RGB): {}", dominant);

        let normalized = self.mapper.normalize(dominant)?;
        info!(
            "Normalized RGB: ({:.3}, {:.3}, {:.3})",
            normalized.red, normalized.green, normalized.blue
        );

        let plan = self.mapper.plan(normalized)?;
        info!("Valve times: {}", plan);

        Ok(RunReport {
            dominant,
            normalized,
            plan,
        })
    }

    /// Runs every stage, including actuation.
    pub fn run(&mut self) -> Result<RunReport, PipelineError> {
        self.run_with_cancel(&CancellationToken::new())
    }

    /// Runs every stage; `cancel` aborts the remaining actuation.
    pub fn run_with_cancel(&mut self, cancel: &CancellationToken) -> Result<RunReport, PipelineError> {
        let report = self.plan()?;

        if let Err(err) = self.controller.run_sequence(&report.plan, cancel) {
            error!(error = %err, "actuation failed; all actuators closed");
            return Err(err.into());
        }

        Ok(report)
    }

    pub fn controller(&self) -> &ActuatorController<D, T> {
        &self.controller
    }

    /// Consumes the pipeline, returning the controller for an explicit shutdown.
    pub fn into_controller(self) -> ActuatorController<D, T> {
        self.controller
    }
}
