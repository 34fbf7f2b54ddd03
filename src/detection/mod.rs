pub mod detector;

pub use detector::{classify_detections, CsvFrameDetector, Detector, Measurement};
