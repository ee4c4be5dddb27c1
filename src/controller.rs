//! Fail-safe sequencing of the valves and the mixing motor.
//!
//! Provides [`ActuatorController`], which owns the actuator hardware and runs
//! the fixed red, green, blue, motor sequence for an [`ActuationPlan`].
//!
//! Every open is scoped: an actuator is acquired for its hold time and
//! released on every exit path, including hardware faults, cancellation and
//! unwinding. When any stage fails, all four actuators are additionally
//! forced closed before the error is returned, and once more when the
//! controller is dropped.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::actuator::{Actuator, ActuatorDriver, ActuatorState, CancellationToken};
use crate::mapping::ActuationPlan;
use crate::sequence::{ActuationSequence, DEFAULT_PAUSE, SequenceError};
use crate::time::TimeSource;

/// Default granularity at which holds and pauses check for cancellation.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Errors that can occur while actuating.
#[derive(Debug, Error)]
pub enum ActuationError {
    /// The actuator is already open.
    #[error("{0} is already open")]
    ActuatorBusy(Actuator),

    /// The driver failed to switch an actuator.
    #[error("hardware fault switching {actuator} to {state}: {source}")]
    HardwareFault {
        actuator: Actuator,
        state: ActuatorState,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The plan could not be turned into a sequence.
    #[error(transparent)]
    InvalidSequence(#[from] SequenceError),

    /// The caller cancelled the sequence.
    #[error("actuation cancelled")]
    Cancelled,
}

/// Timing parameters of the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuationSettings {
    /// Idle time after each valve stage. No pause follows the motor.
    pub pause: Duration,
    /// Longest uninterrupted sleep while holding or pausing.
    pub poll_interval: Duration,
}

impl Default for ActuationSettings {
    fn default() -> Self {
        Self {
            pause: DEFAULT_PAUSE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Owns the actuators and drives them through timed stages.
///
/// Construction commands every actuator closed. The controller is single-owner:
/// all actuation is serialized through `&mut self`.
///
/// # Type Parameters
/// * `D` - Actuator hardware implementation
/// * `T` - Time source used for holds and pauses
pub struct ActuatorController<D: ActuatorDriver, T: TimeSource> {
    driver: D,
    time_source: T,
    settings: ActuationSettings,
    states: [ActuatorState; 4],
    shut_down: bool,
}

impl<D: ActuatorDriver, T: TimeSource> ActuatorController<D, T> {
    /// Creates a controller and forces every actuator closed.
    ///
    /// # Errors
    /// `HardwareFault` if any actuator could not be closed.
    pub fn new(driver: D, time_source: T, settings: ActuationSettings) -> Result<Self, ActuationError> {
        let mut controller = Self {
            driver,
            time_source,
            settings,
            states: [ActuatorState::Closed; 4],
            shut_down: false,
        };
        controller.close_all()?;
        Ok(controller)
    }

    /// Runs the full sequence for `plan`.
    pub fn run(&mut self, plan: &ActuationPlan) -> Result<(), ActuationError> {
        self.run_sequence(plan, &CancellationToken::new())
    }

    /// Runs the full sequence for `plan`, stopping early if `cancel` fires.
    ///
    /// Stages run strictly one after another: red, pause, green, pause, blue,
    /// pause, motor. On any failure every actuator is forced closed before the
    /// error is returned.
    ///
    /// # Errors
    /// * `InvalidSequence` - a plan duration is unusable
    /// * `ActuatorBusy` - an actuator was still open from a failed close
    /// * `HardwareFault` - the driver failed
    /// * `Cancelled` - `cancel` fired before or during a stage
    pub fn run_sequence(
        &mut self,
        plan: &ActuationPlan,
        cancel: &CancellationToken,
    ) -> Result<(), ActuationError> {
        let result = self.execute(plan, cancel);

        if let Err(err) = &result {
            warn!(error = %err, "actuation aborted, closing all actuators");
            if let Err(cleanup) = self.close_all() {
                error!(error = %cleanup, "failed to close every actuator after abort");
            }
        }

        result
    }

    fn execute(&mut self, plan: &ActuationPlan, cancel: &CancellationToken) -> Result<(), ActuationError> {
        let sequence = ActuationSequence::from_plan(plan, self.settings.pause)?;
        debug!(total = ?sequence.total_duration(), "starting actuation sequence");

        for stage in sequence.stages() {
            if cancel.is_cancelled() {
                return Err(ActuationError::Cancelled);
            }

            self.hold_open(stage.actuator, stage.hold, cancel)?;

            if !stage.pause_after.is_zero() {
                wait(
                    &self.time_source,
                    stage.pause_after,
                    self.settings.poll_interval,
                    cancel,
                )?;
            }
        }

        info!("actuation sequence complete");
        Ok(())
    }

    /// Opens a single actuator for `duration`, then closes it.
    ///
    /// # Errors
    /// `ActuatorBusy` if the actuator is already open, `HardwareFault` if the
    /// driver fails. The actuator is closed again in both cases where it was
    /// commanded open.
    pub fn open(&mut self, actuator: Actuator, duration: Duration) -> Result<(), ActuationError> {
        self.hold_open(actuator, duration, &CancellationToken::new())
    }

    fn hold_open(
        &mut self,
        actuator: Actuator,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), ActuationError> {
        let Self {
            driver,
            time_source,
            settings,
            states,
            ..
        } = self;

        info!("Opening {} for {:.2} seconds", actuator, duration.as_secs_f64());
        let guard = OpenGuard::acquire(driver, &mut states[actuator.index()], actuator)?;
        let held = wait(time_source, duration, settings.poll_interval, cancel);
        let released = guard.release();
        info!("Closing {}", actuator);

        match (held, released) {
            (Err(err), Err(close_err)) => {
                error!(error = %close_err, %actuator, "failed to close after interrupted hold");
                Err(err)
            }
            (Err(err), Ok(())) => Err(err),
            (Ok(()), released) => released,
        }
    }

    /// Commands every actuator closed, attempting all four even if some fail.
    ///
    /// # Errors
    /// The first `HardwareFault` encountered.
    pub fn close_all(&mut self) -> Result<(), ActuationError> {
        let mut first_error = None;

        for actuator in Actuator::ALL {
            if let Err(err) = close(&mut self.driver, &mut self.states[actuator.index()], actuator) {
                error!(error = %err, %actuator, "failed to close actuator");
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Closes every actuator and consumes the controller.
    pub fn shutdown(mut self) -> Result<(), ActuationError> {
        self.shut_down = true;
        self.close_all()
    }

    /// Last state successfully commanded for `actuator`.
    pub fn state(&self, actuator: Actuator) -> ActuatorState {
        self.states[actuator.index()]
    }

    /// Returns true if no actuator is open.
    pub fn all_closed(&self) -> bool {
        self.states.iter().all(|state| *state == ActuatorState::Closed)
    }

    pub fn settings(&self) -> &ActuationSettings {
        &self.settings
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn time_source(&self) -> &T {
        &self.time_source
    }
}

impl<D: ActuatorDriver, T: TimeSource> Drop for ActuatorController<D, T> {
    fn drop(&mut self) {
        if self.shut_down {
            return;
        }
        if let Err(err) = self.close_all() {
            error!(error = %err, "failed to close actuators on drop");
        }
    }
}

/// An actuator held open; closes it when released or dropped.
struct OpenGuard<'a, D: ActuatorDriver> {
    driver: &'a mut D,
    state: &'a mut ActuatorState,
    actuator: Actuator,
    armed: bool,
}

impl<'a, D: ActuatorDriver> OpenGuard<'a, D> {
    fn acquire(
        driver: &'a mut D,
        state: &'a mut ActuatorState,
        actuator: Actuator,
    ) -> Result<Self, ActuationError> {
        if *state == ActuatorState::Open {
            return Err(ActuationError::ActuatorBusy(actuator));
        }

        // Marked open before commanding: a failed command may still have energized it.
        *state = ActuatorState::Open;
        let guard = Self {
            driver,
            state,
            actuator,
            armed: true,
        };
        guard
            .driver
            .set_state(actuator, ActuatorState::Open)
            .map_err(|source| fault(actuator, ActuatorState::Open, source))?;
        Ok(guard)
    }

    fn release(mut self) -> Result<(), ActuationError> {
        self.armed = false;
        close(&mut *self.driver, &mut *self.state, self.actuator)
    }
}

impl<D: ActuatorDriver> Drop for OpenGuard<'_, D> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(err) = close(&mut *self.driver, &mut *self.state, self.actuator) {
            error!(error = %err, actuator = %self.actuator, "failed to release actuator");
        }
    }
}

fn close<D: ActuatorDriver>(
    driver: &mut D,
    state: &mut ActuatorState,
    actuator: Actuator,
) -> Result<(), ActuationError> {
    driver
        .set_state(actuator, ActuatorState::Closed)
        .map_err(|source| fault(actuator, ActuatorState::Closed, source))?;
    *state = ActuatorState::Closed;
    Ok(())
}

fn fault<E: std::error::Error + Send + Sync + 'static>(
    actuator: Actuator,
    state: ActuatorState,
    source: E,
) -> ActuationError {
    ActuationError::HardwareFault {
        actuator,
        state,
        source: Box::new(source),
    }
}

/// Sleeps for `duration` in slices of at most `poll`, checking `cancel` between slices.
fn wait<T: TimeSource>(
    time_source: &T,
    duration: Duration,
    poll: Duration,
    cancel: &CancellationToken,
) -> Result<(), ActuationError> {
    let start = time_source.now();
    loop {
        let elapsed = time_source.now().saturating_sub(start);
        if elapsed >= duration {
            return Ok(());
        }
        if cancel.is_cancelled() {
            return Err(ActuationError::Cancelled);
        }

        let remaining = duration - elapsed;
        let slice = if poll.is_zero() {
            remaining
        } else {
            remaining.min(poll)
        };
        time_source.sleep(slice);
    }
}
