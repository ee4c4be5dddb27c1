//! Shared test infrastructure for rgb-dispenser integration tests

#![allow(dead_code)] // Items used across multiple test files; Rust analyzes per-file

use std::cell::{Cell, RefCell};
use std::time::Duration;

use rgb_dispenser::{
    Actuator, ActuatorDriver, ActuatorState, CancellationToken, RasterImage, Srgb, TimeSource,
};

// ============================================================================
// Mock Time Source
// ============================================================================

/// Mock time source that only advances when slept
pub struct MockTimeSource {
    now: Cell<Duration>,
    cancel_at: RefCell<Option<(Duration, CancellationToken)>>,
}

impl MockTimeSource {
    pub fn new() -> Self {
        Self {
            now: Cell::new(Duration::ZERO),
            cancel_at: RefCell::new(None),
        }
    }

    /// Advance time by the given duration
    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }

    /// Fire `token` as soon as the clock reaches `at`
    pub fn cancel_at(&self, at: Duration, token: CancellationToken) {
        *self.cancel_at.borrow_mut() = Some((at, token));
    }
}

impl TimeSource for MockTimeSource {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
        if let Some((at, token)) = self.cancel_at.borrow().as_ref() {
            if self.now.get() >= *at {
                token.cancel();
            }
        }
    }
}

// ============================================================================
// Mock Actuator Driver
// ============================================================================

#[derive(Debug, thiserror::Error)]
#[error("injected fault on {actuator} -> {state}")]
pub struct InjectedFault {
    pub actuator: Actuator,
    pub state: ActuatorState,
}

/// One successful state change, stamped with mock time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub at: Duration,
    pub actuator: Actuator,
    pub state: ActuatorState,
}

/// Mock driver that records every successful transition and can refuse one command
pub struct MockDriver<'t> {
    clock: &'t MockTimeSource,
    transitions: RefCell<Vec<Transition>>,
    states: Cell<[ActuatorState; 4]>,
    fail_on: Cell<Option<(Actuator, ActuatorState)>>,
}

impl<'t> MockDriver<'t> {
    pub fn new(clock: &'t MockTimeSource) -> Self {
        Self {
            clock,
            transitions: RefCell::new(Vec::new()),
            states: Cell::new([ActuatorState::Closed; 4]),
            fail_on: Cell::new(None),
        }
    }

    /// Make the driver refuse `state` commands for `actuator`
    pub fn fail_on(&self, actuator: Actuator, state: ActuatorState) {
        self.fail_on.set(Some((actuator, state)));
    }

    pub fn clear_failure(&self) {
        self.fail_on.set(None);
    }

    pub fn transitions(&self) -> Vec<Transition> {
        self.transitions.borrow().clone()
    }

    pub fn state(&self, actuator: Actuator) -> ActuatorState {
        self.states.get()[actuator.index()]
    }

    pub fn all_closed(&self) -> bool {
        Actuator::ALL
            .iter()
            .all(|actuator| self.state(*actuator) == ActuatorState::Closed)
    }

    /// `(actuator, opened at, closed at)` for every completed open, in order
    pub fn open_intervals(&self) -> Vec<(Actuator, Duration, Duration)> {
        let mut intervals = Vec::new();
        let mut opened: [Option<Duration>; 4] = [None; 4];
        for transition in self.transitions.borrow().iter() {
            let slot = &mut opened[transition.actuator.index()];
            match transition.state {
                ActuatorState::Open => *slot = Some(transition.at),
                ActuatorState::Closed => {
                    if let Some(start) = slot.take() {
                        intervals.push((transition.actuator, start, transition.at));
                    }
                }
            }
        }
        intervals
    }

    /// Actuators commanded open, in order
    pub fn opened(&self) -> Vec<Actuator> {
        self.transitions
            .borrow()
            .iter()
            .filter(|t| t.state == ActuatorState::Open)
            .map(|t| t.actuator)
            .collect()
    }
}

impl ActuatorDriver for &MockDriver<'_> {
    type Error = InjectedFault;

    fn set_state(&mut self, actuator: Actuator, state: ActuatorState) -> Result<(), InjectedFault> {
        if self.fail_on.get() == Some((actuator, state)) {
            return Err(InjectedFault { actuator, state });
        }

        let mut states = self.states.get();
        states[actuator.index()] = state;
        self.states.set(states);

        self.transitions.borrow_mut().push(Transition {
            at: self.clock.now(),
            actuator,
            state,
        });
        Ok(())
    }
}

// ============================================================================
// Test Images
// ============================================================================

pub const RED: Srgb<u8> = Srgb::new(255, 0, 0);
pub const GREEN: Srgb<u8> = Srgb::new(0, 255, 0);
pub const BLUE: Srgb<u8> = Srgb::new(0, 0, 255);
pub const WHITE: Srgb<u8> = Srgb::new(255, 255, 255);

/// 10x10 image: 90 red pixels with 4 green, 3 blue and 3 white scattered through it
pub fn mostly_red_image() -> RasterImage {
    let mut pixels = vec![RED; 100];
    for (index, color) in [
        (7, GREEN),
        (18, BLUE),
        (23, WHITE),
        (35, GREEN),
        (49, BLUE),
        (52, WHITE),
        (66, GREEN),
        (71, BLUE),
        (88, WHITE),
        (94, GREEN),
    ] {
        pixels[index] = color;
    }
    RasterImage::new(10, 10, pixels).unwrap()
}

/// Compare two durations in seconds with tolerance
pub fn approx_eq(a: f64, b: f64) -> bool {
    const EPSILON: f64 = 0.01;
    (a - b).abs() < EPSILON
}
