//! The fixed four-stage actuation sequence.
//!
//! A sequence is built from an [`ActuationPlan`]: red, green and blue valves
//! each followed by the inter-stage pause, then the motor with no trailing
//! pause.

use std::time::Duration;

use heapless::Vec;
use thiserror::Error;

use crate::actuator::Actuator;
use crate::mapping::ActuationPlan;

/// Maximum number of stages in a sequence.
pub const MAX_STAGES: usize = 4;

/// Default pause after each valve stage.
pub const DEFAULT_PAUSE: Duration = Duration::from_secs(1);

/// Sequence validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SequenceError {
    /// No stages provided.
    #[error("sequence must have at least one stage")]
    EmptySequence,

    /// Sequence capacity exceeded.
    #[error("sequence capacity exceeded")]
    CapacityExceeded,

    /// A duration is negative, not finite, or too large for a timer.
    #[error("invalid duration for {actuator}: {seconds} s")]
    InvalidDuration { actuator: Actuator, seconds: f64 },

    /// Holds and pauses together exceed the largest representable duration.
    #[error("total sequence duration overflows")]
    DurationOverflow,
}

/// One actuator's open/close cycle followed by an optional pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    /// Output to open.
    pub actuator: Actuator,

    /// How long the output stays open.
    pub hold: Duration,

    /// Idle time after the output has closed.
    pub pause_after: Duration,
}

/// An ordered, validated list of stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuationSequence {
    stages: Vec<Stage, MAX_STAGES>,
}

impl ActuationSequence {
    /// Creates a new sequence builder.
    pub fn builder() -> SequenceBuilder {
        SequenceBuilder::new()
    }

    /// Builds the standard red, green, blue, motor sequence for `plan`.
    ///
    /// # Errors
    /// * `InvalidDuration` - a plan duration cannot be used as a hold time
    /// * `DurationOverflow` - the whole sequence is too long to time
    pub fn from_plan(plan: &ActuationPlan, pause: Duration) -> Result<Self, SequenceError> {
        Self::builder()
            .stage(Actuator::RedValve, seconds(Actuator::RedValve, plan.red())?, pause)?
            .stage(Actuator::GreenValve, seconds(Actuator::GreenValve, plan.green())?, pause)?
            .stage(Actuator::BlueValve, seconds(Actuator::BlueValve, plan.blue())?, pause)?
            .stage(Actuator::Motor, seconds(Actuator::Motor, plan.motor())?, Duration::ZERO)?
            .build()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Returns the number of stages in this sequence.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Wall-clock length of the whole sequence, holds and pauses included.
    pub fn total_duration(&self) -> Duration {
        self.stages.iter().fold(Duration::ZERO, |total, stage| {
            total.saturating_add(stage.hold).saturating_add(stage.pause_after)
        })
    }
}

/// Builder for constructing validated sequences.
#[derive(Debug, Default)]
pub struct SequenceBuilder {
    stages: Vec<Stage, MAX_STAGES>,
}

impl SequenceBuilder {
    /// Creates a new empty sequence builder.
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Appends a stage.
    ///
    /// # Errors
    /// `CapacityExceeded` once [`MAX_STAGES`] stages have been added.
    pub fn stage(
        mut self,
        actuator: Actuator,
        hold: Duration,
        pause_after: Duration,
    ) -> Result<Self, SequenceError> {
        self.stages
            .push(Stage {
                actuator,
                hold,
                pause_after,
            })
            .map_err(|_| SequenceError::CapacityExceeded)?;
        Ok(self)
    }

    /// Builds and validates the sequence.
    ///
    /// # Errors
    /// * `EmptySequence` - no stages were added
    /// * `DurationOverflow` - the summed holds and pauses do not fit a `Duration`
    pub fn build(self) -> Result<ActuationSequence, SequenceError> {
        if self.stages.is_empty() {
            return Err(SequenceError::EmptySequence);
        }
        self.stages
            .iter()
            .try_fold(Duration::ZERO, |total, stage| {
                total.checked_add(stage.hold)?.checked_add(stage.pause_after)
            })
            .ok_or(SequenceError::DurationOverflow)?;
        Ok(ActuationSequence {
            stages: self.stages,
        })
    }
}

fn seconds(actuator: Actuator, value: f64) -> Result<Duration, SequenceError> {
    if value < 0.0 {
        return Err(SequenceError::InvalidDuration {
            actuator,
            seconds: value,
        });
    }
    Duration::try_from_secs_f64(value).map_err(|_| SequenceError::InvalidDuration {
        actuator,
        seconds: value,
    })
}
