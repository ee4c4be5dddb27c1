//! Actuator drivers for real and simulated outputs.

use std::convert::Infallible;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::actuator::{Actuator, ActuatorDriver, ActuatorState};

/// Root of the Linux sysfs GPIO interface.
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// BCM pin numbers wired to each actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GpioPins {
    pub red: u32,
    pub green: u32,
    pub blue: u32,
    pub motor: u32,
}

impl Default for GpioPins {
    fn default() -> Self {
        Self {
            red: 17,
            green: 27,
            blue: 22,
            motor: 23,
        }
    }
}

impl GpioPins {
    pub fn pin(&self, actuator: Actuator) -> u32 {
        match actuator {
            Actuator::RedValve => self.red,
            Actuator::GreenValve => self.green,
            Actuator::BlueValve => self.blue,
            Actuator::Motor => self.motor,
        }
    }
}

/// Drives output pins through `/sys/class/gpio`.
///
/// Pins are exported and configured as outputs on construction and
/// unexported again on drop. A pin is driven high to open its actuator.
#[derive(Debug)]
pub struct SysfsGpioDriver {
    root: PathBuf,
    pins: GpioPins,
    exported: Vec<u32>,
}

impl SysfsGpioDriver {
    /// Exports and configures the pins under [`SYSFS_GPIO_ROOT`].
    pub fn new(pins: GpioPins) -> io::Result<Self> {
        Self::with_root(SYSFS_GPIO_ROOT, pins)
    }

    /// Uses an alternative sysfs root.
    pub fn with_root(root: impl Into<PathBuf>, pins: GpioPins) -> io::Result<Self> {
        let mut driver = Self {
            root: root.into(),
            pins,
            exported: Vec::new(),
        };
        for actuator in Actuator::ALL {
            driver.export(pins.pin(actuator))?;
        }
        Ok(driver)
    }

    fn pin_dir(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{pin}"))
    }

    fn export(&mut self, pin: u32) -> io::Result<()> {
        let dir = self.pin_dir(pin);
        if !dir.exists() {
            fs::write(self.root.join("export"), pin.to_string())?;
            self.exported.push(pin);
            // udev needs a moment to apply permissions to the new pin directory
            thread::sleep(Duration::from_millis(100));
        }
        fs::write(dir.join("direction"), "out")?;
        fs::write(dir.join("value"), "0")?;
        debug!(pin, "configured gpio output");
        Ok(())
    }
}

impl ActuatorDriver for SysfsGpioDriver {
    type Error = io::Error;

    fn set_state(&mut self, actuator: Actuator, state: ActuatorState) -> Result<(), io::Error> {
        let value = match state {
            ActuatorState::Open => "1",
            ActuatorState::Closed => "0",
        };
        fs::write(self.pin_dir(self.pins.pin(actuator)).join("value"), value)
    }
}

impl Drop for SysfsGpioDriver {
    fn drop(&mut self) {
        for pin in std::mem::take(&mut self.exported) {
            if let Err(err) = fs::write(self.root.join("unexport"), pin.to_string()) {
                warn!(pin, error = %err, "failed to unexport gpio");
            }
        }
    }
}

/// Simulated outputs that only log transitions.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingDriver {
    states: [ActuatorState; 4],
}

impl LoggingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, actuator: Actuator) -> ActuatorState {
        self.states[actuator.index()]
    }
}

impl ActuatorDriver for LoggingDriver {
    type Error = Infallible;

    fn set_state(&mut self, actuator: Actuator, state: ActuatorState) -> Result<(), Infallible> {
        info!(%actuator, %state, "simulated output");
        self.states[actuator.index()] = state;
        Ok(())
    }
}
