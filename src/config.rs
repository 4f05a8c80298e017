//! Screening configuration, loaded from JSON.
//!
//! ```json
//! { "object_ids": [25544, 48274], "threshold_km": 25.0, "model": "sgp4" }
//! ```
//!
//! Omitted fields take the defaults below.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::R_EARTH_MEAN;
use crate::propagator::PropagationModel;
use crate::trajectory::{SampleError, TimeGrid};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no objects to screen")]
    NoObjects,

    #[error("object {0} listed more than once")]
    DuplicateObject(u32),

    #[error("{field} must be a positive finite number, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error(transparent)]
    Grid(#[from] SampleError),
}

fn default_window_hours() -> f64 {
    6.0
}

fn default_step_seconds() -> f64 {
    60.0
}

fn default_threshold_km() -> f64 {
    50.0
}

fn default_body_radius_km() -> f64 {
    R_EARTH_MEAN
}

/// Parameters of one screening run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScreeningConfig {
    /// Catalog numbers to screen against each other.
    pub object_ids: Vec<u32>,
    #[serde(default = "default_window_hours")]
    pub window_hours: f64,
    #[serde(default = "default_step_seconds")]
    pub step_seconds: f64,
    /// Closest approaches strictly below this distance are alerts (km).
    #[serde(default = "default_threshold_km")]
    pub threshold_km: f64,
    /// Reference body radius for display (km).
    #[serde(default = "default_body_radius_km")]
    pub body_radius_km: f64,
    #[serde(default)]
    pub model: PropagationModel,
    /// Window start; the time of the run when absent.
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        ScreeningConfig {
            object_ids: Vec::new(),
            window_hours: default_window_hours(),
            step_seconds: default_step_seconds(),
            threshold_km: default_threshold_km(),
            body_radius_km: default_body_radius_km(),
            model: PropagationModel::default(),
            start: None,
        }
    }
}

impl ScreeningConfig {
    /// Config with default parameters for the given objects.
    pub fn for_objects(object_ids: impl IntoIterator<Item = u32>) -> Self {
        ScreeningConfig {
            object_ids: object_ids.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ScreeningConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.object_ids.is_empty() {
            return Err(ConfigError::NoObjects);
        }
        let mut seen = std::collections::BTreeSet::new();
        if let Some(dup) = self.object_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(ConfigError::DuplicateObject(*dup));
        }

        let positive = [
            ("window_hours", self.window_hours),
            ("step_seconds", self.step_seconds),
            ("threshold_km", self.threshold_km),
            ("body_radius_km", self.body_radius_km),
        ];
        if let Some((field, value)) = positive.iter().find(|(_, v)| !(v.is_finite() && *v > 0.0)) {
            return Err(ConfigError::NotPositive { field: *field, value: *value });
        }

        // Catches a window shorter than one step
        self.time_grid(self.start.unwrap_or(DateTime::<Utc>::UNIX_EPOCH))?;
        Ok(())
    }

    pub fn window(&self) -> TimeDelta {
        TimeDelta::milliseconds((self.window_hours * 3_600_000.0).round() as i64)
    }

    pub fn step(&self) -> TimeDelta {
        TimeDelta::milliseconds((self.step_seconds * 1000.0).round() as i64)
    }

    /// Sampling grid for a run, starting at the configured start or `now`.
    pub fn time_grid(&self, now: DateTime<Utc>) -> Result<TimeGrid, SampleError> {
        TimeGrid::new(self.start.unwrap_or(now), self.window(), self.step())
    }
}
