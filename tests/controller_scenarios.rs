use adaptive_signal::config::IntersectionConfig;
use adaptive_signal::control_system::TrafficLightController;
use adaptive_signal::detection::{Detector, Measurement};
use adaptive_signal::error::DetectionError;
use adaptive_signal::models::demand::{FixedNoise, RandomNoise};
use adaptive_signal::models::road::{RoadId, RoadParams};
use adaptive_signal::storage::{MemoryRoadStore, RoadStore};
use std::time::{Duration, Instant};

fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
}

fn four_roads() -> IntersectionConfig {
    let mut config = IntersectionConfig {
        roads: vec![
            RoadParams::new("Road 1", 40.0, 100.0, 100.0, 1.0),
            RoadParams::new("Road 2", 60.0, 100.0, 100.0, 2.0),
            RoadParams::new("Road 3", 70.0, 100.0, 100.0, 1.7),
            RoadParams::new("Road 4", 30.0, 100.0, 100.0, 1.2),
        ],
        ..IntersectionConfig::default()
    };
    config.timing.fast_refresh_secs = 3_600.0;
    config.timing.slow_refresh_secs = 3_600.0;
    config
}

#[test]
fn end_to_end_rotation_then_preemption() {
    let t0 = Instant::now();
    let mut c = TrafficLightController::from_config(
        &four_roads(),
        MemoryRoadStore::new(),
        FixedNoise::nominal(),
        t0,
    )
    .unwrap();

    assert_eq!(c.active_road().name(), "Road 1");
    c.tick(t0 + secs(41.0));
    assert_eq!(c.active_road().name(), "Road 2");

    c.report_emergency(RoadId(4), t0 + secs(42.0));
    let report = c.tick(t0 + secs(42.05));
    let switch = report.preempted.expect("emergency should preempt");
    assert_eq!(switch.from, RoadId(2));
    assert_eq!(switch.to, RoadId(4));
    assert_eq!(c.active_road().name(), "Road 4");
    assert!(!c.road(RoadId(2)).unwrap().is_green());
    assert_eq!(c.ring().iter().filter(|r| r.is_green()).count(), 1);
}

#[test]
fn single_active_road_holds_under_random_load() {
    let t0 = Instant::now();
    let mut config = IntersectionConfig::default();
    // High probability so preemptions actually happen in a short run.
    config.timing.emergency_probability = 0.2;
    let mut c = TrafficLightController::from_config(
        &config,
        MemoryRoadStore::new(),
        RandomNoise::seeded(11),
        t0,
    )
    .unwrap();

    for step in 1..=3_000 {
        let now = t0 + Duration::from_millis(step * 100);
        c.tick(now);
        assert_eq!(c.ring().iter().filter(|r| r.is_green()).count(), 1);
        assert!(c.active_road().is_green());
        for road in c.ring().iter() {
            assert!(road.vehicle_count() >= 0.0);
            let expected = road.vehicle_count() / road.capacity() * road.total_time();
            assert!((road.green_time() - expected).abs() < 1e-9);
            assert_eq!(
                road.emergency_triggered_at().is_some(),
                road.has_emergency_vehicle()
            );
        }
    }
    assert!(c.stats().fast_refreshes > 100);
    assert!(c.stats().preemptions > 0);
}

#[test]
fn rotation_visits_every_road_in_order() {
    let t0 = Instant::now();
    let mut c = TrafficLightController::from_config(
        &four_roads(),
        MemoryRoadStore::new(),
        FixedNoise::nominal(),
        t0,
    )
    .unwrap();

    let mut visited = vec![c.active_id()];
    let mut now = t0;
    for _ in 0..8 {
        now += secs(c.active_road().green_time() + 0.01);
        let report = c.tick(now);
        let switch = report.rotated.expect("green time elapsed");
        assert_eq!(switch.to, c.ring().successor_of(c.road(switch.from).unwrap()).id());
        visited.push(c.active_id());
    }
    let ids: Vec<u32> = visited.iter().map(|id| id.0).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 1, 2, 3, 4, 1]);
}

struct ScriptedDetector;

impl Detector for ScriptedDetector {
    fn detect(&self, source: &str) -> Result<Measurement, DetectionError> {
        match source {
            "north.csv" => Ok(Measurement {
                vehicle_count: 7,
                has_emergency_vehicle: false,
            }),
            "south.csv" => Ok(Measurement {
                vehicle_count: 0,
                has_emergency_vehicle: true,
            }),
            other => Err(DetectionError::NoFrame {
                source_ref: other.to_string(),
                reason: "camera offline".to_string(),
            }),
        }
    }
}

#[test]
fn slow_refresh_with_inline_detector() {
    let t0 = Instant::now();
    let mut config = four_roads();
    config.timing.slow_refresh_secs = 10.0;
    config.roads[0] = config.roads[0].clone().with_file_path("north.csv");
    config.roads[2] = config.roads[2].clone().with_file_path("south.csv");
    config.roads[3] = config.roads[3].clone().with_file_path("west.csv");
    let mut c = TrafficLightController::from_config(
        &config,
        MemoryRoadStore::new(),
        FixedNoise::nominal(),
        t0,
    )
    .unwrap();

    let report = c.tick(t0 + secs(10.5));
    assert_eq!(report.detection_requests.len(), 3);
    c.measure_inline(report.detection_requests, &ScriptedDetector, t0 + secs(10.5));
    assert!(c.in_flight().is_empty());

    let north = c.road(RoadId(1)).unwrap();
    assert_eq!(north.vehicle_count(), 7.0);
    assert_eq!(c.store().get_vehicle_count(RoadId(1)).unwrap(), 7.0);

    // Camera offline: demand untouched.
    assert_eq!(c.road(RoadId(4)).unwrap().vehicle_count(), 30.0);
    assert_eq!(c.stats().measurements_skipped, 1);

    // South reported an emergency; it takes green on the next iteration.
    c.tick(t0 + secs(10.6));
    assert_eq!(c.active_id(), RoadId(3));
}
