//! Actuator identities, states and the hardware abstraction the controller drives.

use std::fmt;

/// Cooperative cancellation shared between a caller and the controller.
///
/// Cloning yields a handle to the same token. Only the synchronous
/// `cancel`/`is_cancelled` half is used, so no async runtime is needed.
pub use tokio_util::sync::CancellationToken;

/// One of the four physical outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Actuator {
    RedValve,
    GreenValve,
    BlueValve,
    Motor,
}

impl Actuator {
    /// All actuators in sequence order.
    pub const ALL: [Actuator; 4] = [
        Actuator::RedValve,
        Actuator::GreenValve,
        Actuator::BlueValve,
        Actuator::Motor,
    ];

    /// Position in [`Actuator::ALL`].
    pub const fn index(self) -> usize {
        match self {
            Actuator::RedValve => 0,
            Actuator::GreenValve => 1,
            Actuator::BlueValve => 2,
            Actuator::Motor => 3,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Actuator::RedValve => "red valve",
            Actuator::GreenValve => "green valve",
            Actuator::BlueValve => "blue valve",
            Actuator::Motor => "motor",
        }
    }
}

impl fmt::Display for Actuator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Binary output state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ActuatorState {
    Open,
    #[default]
    Closed,
}

impl fmt::Display for ActuatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorState::Open => f.write_str("OPEN"),
            ActuatorState::Closed => f.write_str("CLOSED"),
        }
    }
}

/// Trait for abstracting actuator hardware.
///
/// Implement this for your output hardware (GPIO, relay board, PLC, etc.) to
/// allow the controller to drive it. Any error returned is reported as a
/// hardware fault; the controller still attempts to close every actuator.
pub trait ActuatorDriver {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Switches `actuator` to `state`.
    fn set_state(&mut self, actuator: Actuator, state: ActuatorState) -> Result<(), Self::Error>;
}

impl<D: ActuatorDriver + ?Sized> ActuatorDriver for Box<D> {
    type Error = D::Error;

    fn set_state(&mut self, actuator: Actuator, state: ActuatorState) -> Result<(), Self::Error> {
        (**self).set_state(actuator, state)
    }
}
