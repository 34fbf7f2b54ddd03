// Refresh cadences (seconds)
pub const FAST_REFRESH_SECS: f64 = 1.0;
pub const SLOW_REFRESH_SECS: f64 = 10.0;

// Emergency window
pub const EMERGENCY_WINDOW_SECS: f64 = 5.0;
pub const EMERGENCY_PROBABILITY: f64 = 0.005;

// Detector calls and the polling loop
pub const DETECTOR_TIMEOUT_SECS: f64 = 5.0;
pub const POLL_INTERVAL_MS: u64 = 100;

// Upper bound for any configured period or timeout (seconds)
pub const MAX_PERIOD_SECS: f64 = 86_400.0;

// Vehicles cleared per hour of green is `capacity`, so per second it is capacity / 3600.
pub const SECONDS_PER_HOUR: f64 = 3600.0;

// Random factor ranges applied to clearance and arrivals
pub const CLEARANCE_FACTOR_MIN: f64 = 0.9;
pub const CLEARANCE_FACTOR_MAX: f64 = 1.1;
pub const ARRIVAL_FACTOR_MIN: f64 = 0.8;
pub const ARRIVAL_FACTOR_MAX: f64 = 1.2;

// Output files
pub const STATUS_LOG_FILE: &str = "signal_status.csv";
pub const DEMAND_CHART_FILE: &str = "road_demand_chart.png";

// Detection classes
pub const VEHICLE_CLASSES: [&str; 4] = ["bike", "car", "bus", "truck"];
pub const EMERGENCY_CLASSES: [&str; 3] = ["cops", "ambulance", "fire truck"];
