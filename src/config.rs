use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::global_variables::{
    DETECTOR_TIMEOUT_SECS, EMERGENCY_PROBABILITY, EMERGENCY_WINDOW_SECS, FAST_REFRESH_SECS,
    MAX_PERIOD_SECS, POLL_INTERVAL_MS, SLOW_REFRESH_SECS, STATUS_LOG_FILE,
};
use crate::models::road::RoadParams;

/// Cadences and limits of the control loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub fast_refresh_secs: f64,
    pub slow_refresh_secs: f64,
    pub emergency_window_secs: f64,
    pub emergency_probability: f64,
    pub detector_timeout_secs: f64,
    pub poll_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            fast_refresh_secs: FAST_REFRESH_SECS,
            slow_refresh_secs: SLOW_REFRESH_SECS,
            emergency_window_secs: EMERGENCY_WINDOW_SECS,
            emergency_probability: EMERGENCY_PROBABILITY,
            detector_timeout_secs: DETECTOR_TIMEOUT_SECS,
            poll_interval_ms: POLL_INTERVAL_MS,
        }
    }
}

impl TimingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let periods = [
            ("fast_refresh_secs", self.fast_refresh_secs),
            ("slow_refresh_secs", self.slow_refresh_secs),
            ("emergency_window_secs", self.emergency_window_secs),
            ("detector_timeout_secs", self.detector_timeout_secs),
        ];
        for (field, value) in periods {
            if !(value > 0.0 && value <= MAX_PERIOD_SECS) {
                return Err(ConfigError::InvalidTiming {
                    field,
                    requirement: "a positive number of seconds no larger than a day",
                    value,
                });
            }
        }
        if !(0.0..=1.0).contains(&self.emergency_probability) {
            return Err(ConfigError::InvalidTiming {
                field: "emergency_probability",
                requirement: "within 0..=1",
                value: self.emergency_probability,
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidTiming {
                field: "poll_interval_ms",
                requirement: "at least 1",
                value: 0.0,
            });
        }
        Ok(())
    }

    pub fn fast_refresh(&self) -> Duration {
        secs_to_duration(self.fast_refresh_secs)
    }

    pub fn slow_refresh(&self) -> Duration {
        secs_to_duration(self.slow_refresh_secs)
    }

    pub fn emergency_window(&self) -> Duration {
        secs_to_duration(self.emergency_window_secs)
    }

    pub fn detector_timeout(&self) -> Duration {
        secs_to_duration(self.detector_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// Saturates instead of panicking on values `validate` would reject.
fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(if secs > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}

/// Everything needed to start one intersection. Roads are listed in ring order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntersectionConfig {
    pub roads: Vec<RoadParams>,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub seed: Option<u64>,
    /// CSV road table. In-memory storage when absent.
    #[serde(default)]
    pub store_path: Option<String>,
    /// Status history CSV appended after every fast refresh.
    #[serde(default)]
    pub status_log: Option<String>,
}

impl Default for IntersectionConfig {
    fn default() -> Self {
        Self {
            roads: default_roads(),
            timing: TimingConfig::default(),
            seed: None,
            store_path: None,
            status_log: None,
        }
    }
}

impl IntersectionConfig {
    /// Falls back to the status file the report binary reads by default.
    pub fn with_default_status_log(mut self) -> Self {
        self.status_log.get_or_insert_with(|| STATUS_LOG_FILE.to_string());
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.roads.len() < 2 {
            return Err(ConfigError::TooFewRoads(self.roads.len()));
        }
        for (position, road) in self.roads.iter().enumerate() {
            road.validate(position)?;
        }
        self.timing.validate()
    }
}

/// The four-approach intersection used when no config file is given.
pub fn default_roads() -> Vec<RoadParams> {
    vec![
        RoadParams::new("Road 1", 40.0, 1000.0, 300.0, 1.0),
        RoadParams::new("Road 2", 60.0, 800.0, 300.0, 2.0),
        RoadParams::new("Road 3", 70.0, 1100.0, 300.0, 1.7),
        RoadParams::new("Road 4", 30.0, 700.0, 300.0, 1.2),
    ]
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<IntersectionConfig, ConfigError> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    IntersectionConfig::from_json_str(&json)
}
