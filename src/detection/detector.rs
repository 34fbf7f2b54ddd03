use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DetectionError;
use crate::global_variables::{EMERGENCY_CLASSES, VEHICLE_CLASSES};

/// What a detector saw on one approach at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    pub vehicle_count: u32,
    pub has_emergency_vehicle: bool,
}

/// Point-in-time measurement from a data source. Calls may block; the runtime
/// runs them off the control loop and bounds them with a timeout.
pub trait Detector: Send + Sync {
    fn detect(&self, source: &str) -> Result<Measurement, DetectionError>;
}

/// Counts regular vehicles and flags emergency vehicles among detected class labels.
/// Emergency vehicles are not part of the vehicle count.
pub fn classify_detections<'a, I>(classes: I) -> Measurement
where
    I: IntoIterator<Item = &'a str>,
{
    let mut vehicle_count = 0;
    let mut has_emergency_vehicle = false;
    for class in classes {
        let class = class.trim();
        if VEHICLE_CLASSES.iter().any(|c| c.eq_ignore_ascii_case(class)) {
            vehicle_count += 1;
        } else if EMERGENCY_CLASSES.iter().any(|c| c.eq_ignore_ascii_case(class)) {
            has_emergency_vehicle = true;
        }
    }
    Measurement {
        vehicle_count,
        has_emergency_vehicle,
    }
}

#[derive(Debug, Deserialize)]
struct DetectionRow {
    class: String,
}

/// Reads the current frame's detections from a CSV file with a `class` column.
#[derive(Debug, Clone, Default)]
pub struct CsvFrameDetector {
    base_dir: Option<PathBuf>,
}

impl CsvFrameDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relative sources are resolved against `dir`.
    pub fn with_base_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            base_dir: Some(dir.as_ref().to_path_buf()),
        }
    }

    fn resolve(&self, source: &str) -> PathBuf {
        match &self.base_dir {
            Some(dir) if Path::new(source).is_relative() => dir.join(source),
            _ => PathBuf::from(source),
        }
    }
}

impl Detector for CsvFrameDetector {
    fn detect(&self, source: &str) -> Result<Measurement, DetectionError> {
        let no_frame = |reason: String| DetectionError::NoFrame {
            source_ref: source.to_string(),
            reason,
        };
        let mut rdr =
            csv::Reader::from_path(self.resolve(source)).map_err(|e| no_frame(e.to_string()))?;
        let rows = rdr
            .deserialize::<DetectionRow>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| no_frame(e.to_string()))?;
        Ok(classify_detections(rows.iter().map(|r| r.class.as_str())))
    }
}
