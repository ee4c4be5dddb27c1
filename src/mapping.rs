//! Mapping from a dominant color to actuator open durations.

use std::fmt;

use palette::Srgb;
use thiserror::Error;

use crate::cluster::DominantColor;

/// Default time a fully saturated channel keeps its valve open, in seconds.
pub const DEFAULT_BASE_DURATION_S: f64 = 5.0;

/// A color with each channel scaled into `0.0..=1.0`.
pub type NormalizedColor = Srgb<f64>;

/// Errors raised while normalizing a color or computing a plan.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MappingError {
    /// A channel lies outside its valid range.
    #[error("{channel} channel value {value} is out of range")]
    ChannelOutOfRange { channel: &'static str, value: f64 },

    /// A valve duration exceeds the base duration or is negative.
    #[error("{channel} duration {seconds} s is outside 0..={base} s")]
    DurationOutOfRange {
        channel: &'static str,
        seconds: f64,
        base: f64,
    },

    /// The base duration is not a positive, finite number of seconds.
    #[error("invalid configuration: base duration must be positive and finite, got {0}")]
    InvalidConfiguration(f64),
}

/// Open durations, in seconds, for the three valves and the mixing motor.
///
/// Every valve duration lies in `0.0..=base`, so the motor duration, always
/// the sum of the three, never exceeds three times the base.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActuationPlan {
    red: f64,
    green: f64,
    blue: f64,
    base_duration_s: f64,
}

impl ActuationPlan {
    /// Creates a plan from valve durations in seconds.
    ///
    /// # Errors
    /// * `InvalidConfiguration` - `base_duration_s` is not positive and finite
    /// * `DurationOutOfRange` - a valve duration lies outside `0.0..=base_duration_s`
    pub fn new(red: f64, green: f64, blue: f64, base_duration_s: f64) -> Result<Self, MappingError> {
        check_base(base_duration_s)?;

        let duration = |channel: &'static str, seconds: f64| {
            if (0.0..=base_duration_s).contains(&seconds) {
                Ok(seconds)
            } else {
                Err(MappingError::DurationOutOfRange {
                    channel,
                    seconds,
                    base: base_duration_s,
                })
            }
        };

        Ok(Self {
            red: duration("red", red)?,
            green: duration("green", green)?,
            blue: duration("blue", blue)?,
            base_duration_s,
        })
    }

    pub fn red(&self) -> f64 {
        self.red
    }

    pub fn green(&self) -> f64 {
        self.green
    }

    pub fn blue(&self) -> f64 {
        self.blue
    }

    /// Mixing motor duration, `red + green + blue`.
    pub fn motor(&self) -> f64 {
        self.red + self.green + self.blue
    }

    /// Open time of a fully saturated channel.
    pub fn base_duration_s(&self) -> f64 {
        self.base_duration_s
    }
}

impl fmt::Display for ActuationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "red={:.2}s green={:.2}s blue={:.2}s motor={:.2}s",
            self.red,
            self.green,
            self.blue,
            self.motor()
        )
    }
}

/// Scales each 8-bit channel into `0.0..=1.0`.
///
/// # Errors
/// `ChannelOutOfRange` if any channel lies outside `0..=255`.
pub fn normalize(color: DominantColor) -> Result<NormalizedColor, MappingError> {
    let channel = |name: &'static str, value: i32| {
        if (0..=255).contains(&value) {
            Ok(f64::from(value) / 255.0)
        } else {
            Err(MappingError::ChannelOutOfRange {
                channel: name,
                value: f64::from(value),
            })
        }
    };

    Ok(Srgb::new(
        channel("red", color.red)?,
        channel("green", color.green)?,
        channel("blue", color.blue)?,
    ))
}

/// Inverse of [`normalize`], rounding to the nearest 8-bit value.
pub fn denormalize(color: NormalizedColor) -> DominantColor {
    let channel = |value: f64| (value * 255.0).round().clamp(0.0, 255.0) as i32;
    DominantColor::new(
        channel(color.red),
        channel(color.green),
        channel(color.blue),
    )
}

/// Multiplies every normalized channel by `base_duration_s`.
///
/// No rounding is applied.
///
/// # Errors
/// * `InvalidConfiguration` - `base_duration_s` is not positive and finite
/// * `ChannelOutOfRange` - a normalized channel lies outside `0.0..=1.0`
pub fn plan(normalized: NormalizedColor, base_duration_s: f64) -> Result<ActuationPlan, MappingError> {
    check_base(base_duration_s)?;

    let channel = |name: &'static str, value: f64| {
        if (0.0..=1.0).contains(&value) {
            Ok(value * base_duration_s)
        } else {
            Err(MappingError::ChannelOutOfRange {
                channel: name,
                value,
            })
        }
    };

    ActuationPlan::new(
        channel("red", normalized.red)?,
        channel("green", normalized.green)?,
        channel("blue", normalized.blue)?,
        base_duration_s,
    )
}

fn check_base(base_duration_s: f64) -> Result<(), MappingError> {
    if !base_duration_s.is_finite() || base_duration_s <= 0.0 {
        return Err(MappingError::InvalidConfiguration(base_duration_s));
    }
    Ok(())
}

/// Normalizes colors and turns them into plans for a fixed base duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorMapper {
    base_duration_s: f64,
}

impl ColorMapper {
    /// # Errors
    /// `InvalidConfiguration` unless `base_duration_s` is positive and finite.
    pub fn new(base_duration_s: f64) -> Result<Self, MappingError> {
        check_base(base_duration_s)?;
        Ok(Self { base_duration_s })
    }

    pub fn base_duration_s(&self) -> f64 {
        self.base_duration_s
    }

    pub fn normalize(&self, color: DominantColor) -> Result<NormalizedColor, MappingError> {
        normalize(color)
    }

    pub fn plan(&self, normalized: NormalizedColor) -> Result<ActuationPlan, MappingError> {
        plan(normalized, self.base_duration_s)
    }
}

impl Default for ColorMapper {
    fn default() -> Self {
        Self {
            base_duration_s: DEFAULT_BASE_DURATION_S,
        }
    }
}
