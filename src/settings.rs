//! Configuration surface.
//!
//! Every tunable has a working default for the stock wiring. Values can be
//! layered from a TOML file and `RGB_DISPENSER_*` environment variables, with
//! nested keys separated by a double underscore:
//!
//! ```text
//! RGB_DISPENSER_CLUSTERING__K=6
//! RGB_DISPENSER_ACTUATION__BASE_DURATION_S=2.5
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::acquisition::{DEFAULT_CAPTURE_COMMAND, DEFAULT_IMAGE_PATH};
use crate::cluster::ClusterSettings;
use crate::controller::ActuationSettings;
use crate::hardware::GpioPins;
use crate::mapping::{ColorMapper, DEFAULT_BASE_DURATION_S};

/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "RGB_DISPENSER";

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A value is outside its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub clustering: ClusterSettings,
    pub actuation: ActuationConfig,
    pub acquisition: AcquisitionConfig,
    pub gpio: GpioPins,
}

/// Actuation timing, in the units operators write them in.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ActuationConfig {
    /// Valve open time for a fully saturated channel.
    pub base_duration_s: f64,
    /// Pause after each valve stage.
    pub pause_s: f64,
    /// Cancellation check granularity during holds and pauses.
    pub poll_interval_ms: u64,
}

impl Default for ActuationConfig {
    fn default() -> Self {
        Self {
            base_duration_s: DEFAULT_BASE_DURATION_S,
            pause_s: 1.0,
            poll_interval_ms: 50,
        }
    }
}

impl ActuationConfig {
    /// Converts to controller settings.
    pub fn settings(&self) -> Result<ActuationSettings, ConfigError> {
        if self.pause_s < 0.0 {
            return Err(ConfigError::InvalidConfiguration(format!(
                "pause_s must not be negative, got {}",
                self.pause_s
            )));
        }
        let pause = Duration::try_from_secs_f64(self.pause_s).map_err(|_| {
            ConfigError::InvalidConfiguration(format!("pause_s is not usable: {}", self.pause_s))
        })?;

        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidConfiguration(
                "poll_interval_ms must be at least 1".to_string(),
            ));
        }

        Ok(ActuationSettings {
            pause,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        })
    }

    /// Mapper for the configured base duration.
    pub fn mapper(&self) -> Result<ColorMapper, ConfigError> {
        ColorMapper::new(self.base_duration_s)
            .map_err(|err| ConfigError::InvalidConfiguration(err.to_string()))
    }
}

/// Where images come from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// File the camera writes and the pipeline decodes.
    pub image_path: PathBuf,
    /// Still-capture program invoked as `<command> -o <image_path>`.
    pub capture_command: String,
    /// Downsize images whose larger side exceeds this many pixels.
    pub max_dimension: Option<u32>,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            image_path: PathBuf::from(DEFAULT_IMAGE_PATH),
            capture_command: DEFAULT_CAPTURE_COMMAND.to_string(),
            max_dimension: None,
        }
    }
}

impl PipelineConfig {
    /// Loads defaults, then `path` if given, then environment overrides.
    ///
    /// The result is not validated so that further overrides can still be
    /// applied; call [`PipelineConfig::validate`] once they are in place.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::layered(path, None)
    }

    /// `environment` replaces the process environment when given.
    fn layered(
        path: Option<&Path>,
        environment: Option<config::Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(environment),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Rejects values that would make a stage misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.clustering
            .validate()
            .map_err(|err| ConfigError::InvalidConfiguration(err.to_string()))?;
        self.actuation.mapper()?;
        self.actuation.settings()?;
        Ok(())
    }
}
