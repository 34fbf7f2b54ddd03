use std::time::Duration;

use thiserror::Error;

use crate::models::road::RoadId;

/// Fatal at startup: the controller never runs with a bad intersection.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("an intersection needs at least 2 roads, got {0}")]
    TooFewRoads(usize),
    #[error("road at position {0} has no name")]
    MissingName(usize),
    #[error("road '{road}': {field} must be {requirement}, got {value}")]
    InvalidRoadParameter {
        road: String,
        field: &'static str,
        requirement: &'static str,
        value: f64,
    },
    #[error("timing: {field} must be {requirement}, got {value}")]
    InvalidTiming {
        field: &'static str,
        requirement: &'static str,
        value: f64,
    },
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to register roads: {0}")]
    Store(#[from] StoreError),
}

/// Road store failures. Writes that fail are retried by the controller.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("road {0} not found")]
    NotFound(RoadId),
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Any of these means "no usable frame": the road keeps its demand for this cycle.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("no usable frame from '{source_ref}': {reason}")]
    NoFrame { source_ref: String, reason: String },
    #[error("detector timed out after {0:?}")]
    Timeout(Duration),
    #[error("detector task failed: {0}")]
    TaskFailed(String),
}
