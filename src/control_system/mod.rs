pub mod road_ring;
pub mod runtime;
pub mod traffic_light_controller;

pub use road_ring::RoadRing;
pub use runtime::{run_until, RuntimeSettings};
pub use traffic_light_controller::{
    ControllerSettings, DetectionRequest, Switch, TickReport, TrafficLightController,
};
