use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::detection::detector::Measurement;
use crate::error::{ConfigError, StoreError};
use crate::global_variables::SECONDS_PER_HOUR;
use crate::models::demand::DemandNoise;
use crate::storage::road_store::{RoadRecord, RoadStore};

/// Identifier handed out by the road store when a road is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoadId(pub u32);

impl fmt::Display for RoadId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Signal shown to one approach. There is no yellow phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightState {
    Green,
    Red,
}

/// Static parameters of a road plus its initial demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadParams {
    pub name: String,
    pub vehicle_count: f64,
    pub capacity: f64,
    pub total_time: f64,
    pub rate_of_increase: f64,
    #[serde(default)]
    pub file_path: Option<String>,
}

impl RoadParams {
    pub fn new(
        name: &str,
        vehicle_count: f64,
        capacity: f64,
        total_time: f64,
        rate_of_increase: f64,
    ) -> Self {
        Self {
            name: name.to_string(),
            vehicle_count,
            capacity,
            total_time,
            rate_of_increase,
            file_path: None,
        }
    }

    pub fn with_file_path(mut self, file_path: &str) -> Self {
        self.file_path = Some(file_path.to_string());
        self
    }

    /// Rejects parameters that would make the green-time formula meaningless.
    pub fn validate(&self, position: usize) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingName(position));
        }
        let checks = [
            ("capacity", self.capacity, self.capacity > 0.0, "positive"),
            ("total_time", self.total_time, self.total_time > 0.0, "positive"),
            (
                "rate_of_increase",
                self.rate_of_increase,
                self.rate_of_increase >= 0.0,
                "non-negative",
            ),
            (
                "vehicle_count",
                self.vehicle_count,
                self.vehicle_count >= 0.0,
                "non-negative",
            ),
        ];
        for (field, value, ok, requirement) in checks {
            if !ok || !value.is_finite() {
                return Err(ConfigError::InvalidRoadParameter {
                    road: self.name.clone(),
                    field,
                    requirement,
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Adaptive green time: the share of capacity currently queued, scaled by `total_time`.
pub fn compute_green_time(vehicle_count: f64, capacity: f64, total_time: f64) -> f64 {
    vehicle_count / capacity * total_time
}

/// One step of the synthetic demand model.
///
/// While green the queue drains by `capacity / 3600` vehicles scaled by `factor`
/// (expected in 0.9..=1.1); while red it grows by `rate_of_increase` scaled by
/// `factor` (expected in 0.8..=1.2). Never returns a negative count.
pub fn apply_synthetic_demand(
    previous: f64,
    capacity: f64,
    rate_of_increase: f64,
    is_green: bool,
    factor: f64,
) -> f64 {
    let next = if is_green {
        previous - capacity / SECONDS_PER_HOUR * factor
    } else {
        previous + rate_of_increase * factor
    };
    next.max(0.0)
}

/// Returns the start of a new emergency window, if one opens on this roll.
/// An already open window is never restarted.
pub fn maybe_trigger_emergency(
    window_start: Option<Instant>,
    now: Instant,
    roll: f64,
    probability: f64,
) -> Option<Instant> {
    match window_start {
        Some(_) => None,
        None if roll < probability => Some(now),
        None => None,
    }
}

/// True once an open window has lasted strictly longer than `limit`.
pub fn maybe_clear_emergency(window_start: Option<Instant>, now: Instant, limit: Duration) -> bool {
    window_start.is_some_and(|start| now.saturating_duration_since(start) > limit)
}

/// One approach into the intersection.
#[derive(Debug, Clone)]
pub struct Road {
    id: RoadId,
    name: String,
    capacity: f64,
    total_time: f64,
    rate_of_increase: f64,
    file_path: Option<String>,
    vehicle_count: f64,
    green_time: f64,
    light: LightState,
    has_emergency_vehicle: bool,
    emergency_triggered_at: Option<Instant>,
}

impl Road {
    /// Builds a red road with its initial green time derived from `params.vehicle_count`.
    pub fn new(id: RoadId, params: &RoadParams) -> Self {
        Self {
            id,
            name: params.name.clone(),
            capacity: params.capacity,
            total_time: params.total_time,
            rate_of_increase: params.rate_of_increase,
            file_path: params.file_path.clone(),
            vehicle_count: params.vehicle_count,
            green_time: compute_green_time(params.vehicle_count, params.capacity, params.total_time),
            light: LightState::Red,
            has_emergency_vehicle: false,
            emergency_triggered_at: None,
        }
    }

    pub fn id(&self) -> RoadId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    pub fn rate_of_increase(&self) -> f64 {
        self.rate_of_increase
    }

    pub fn file_path(&self) -> Option<&str> {
        self.file_path.as_deref()
    }

    pub fn has_data_source(&self) -> bool {
        self.file_path.is_some()
    }

    pub fn vehicle_count(&self) -> f64 {
        self.vehicle_count
    }

    /// Target green duration in seconds.
    pub fn green_time(&self) -> f64 {
        self.green_time
    }

    pub fn light(&self) -> LightState {
        self.light
    }

    pub fn is_green(&self) -> bool {
        self.light == LightState::Green
    }

    pub fn has_emergency_vehicle(&self) -> bool {
        self.has_emergency_vehicle
    }

    pub fn emergency_triggered_at(&self) -> Option<Instant> {
        self.emergency_triggered_at
    }

    pub fn turn_green(&mut self) {
        self.light = LightState::Green;
    }

    pub fn turn_red(&mut self) {
        self.light = LightState::Red;
    }

    /// Replaces the demand and recomputes the green time from it.
    pub fn set_vehicle_count(&mut self, vehicle_count: f64) {
        self.vehicle_count = vehicle_count.max(0.0);
        self.refresh_green_time();
    }

    pub fn refresh_green_time(&mut self) {
        self.green_time = compute_green_time(self.vehicle_count, self.capacity, self.total_time);
    }

    /// Synthetic demand producer: arrivals while red, clearance while green.
    pub fn simulate_demand<N: DemandNoise + ?Sized>(&mut self, noise: &mut N) {
        let factor = if self.is_green() {
            noise.clearance_factor()
        } else {
            noise.arrival_factor()
        };
        let next = apply_synthetic_demand(
            self.vehicle_count,
            self.capacity,
            self.rate_of_increase,
            self.is_green(),
            factor,
        );
        self.set_vehicle_count(next);
    }

    /// Random emergency producer. Returns true when a new window opened.
    pub fn roll_emergency<N: DemandNoise + ?Sized>(
        &mut self,
        noise: &mut N,
        now: Instant,
        probability: f64,
    ) -> bool {
        if self.emergency_triggered_at.is_some() {
            return false;
        }
        match maybe_trigger_emergency(None, now, noise.emergency_roll(), probability) {
            Some(start) => {
                self.trigger_emergency(start);
                true
            }
            None => false,
        }
    }

    /// Opens an emergency window at `now` unless one is already open.
    pub fn trigger_emergency(&mut self, now: Instant) {
        self.has_emergency_vehicle = true;
        self.emergency_triggered_at.get_or_insert(now);
    }

    /// Closes the emergency window once it outlived `limit`. Returns true when cleared.
    pub fn expire_emergency(&mut self, now: Instant, limit: Duration) -> bool {
        if maybe_clear_emergency(self.emergency_triggered_at, now, limit) {
            self.has_emergency_vehicle = false;
            self.emergency_triggered_at = None;
            true
        } else {
            false
        }
    }

    /// Detector values are authoritative: both fields are overwritten as reported.
    /// A reported emergency opens a window at `now` unless one is already open,
    /// and a clear report closes it.
    pub fn apply_measurement(&mut self, measurement: &Measurement, now: Instant) {
        if measurement.has_emergency_vehicle {
            self.trigger_emergency(now);
        } else {
            self.has_emergency_vehicle = false;
            self.emergency_triggered_at = None;
        }
        self.set_vehicle_count(f64::from(measurement.vehicle_count));
    }

    pub fn to_record(&self) -> RoadRecord {
        RoadRecord {
            name: self.name.clone(),
            green_time: self.green_time,
            vehicle_count: self.vehicle_count,
            capacity: self.capacity,
            total_time: self.total_time,
            has_emergency_vehicle: self.has_emergency_vehicle,
            file_path: self.file_path.clone(),
        }
    }
}

/// Registers every road with the store, in order, and builds them with the assigned ids.
pub fn create_roads<S: RoadStore + ?Sized>(
    params: &[RoadParams],
    store: &mut S,
) -> Result<Vec<Road>, StoreError> {
    let mut roads = Vec::with_capacity(params.len());
    for p in params {
        let green_time = compute_green_time(p.vehicle_count, p.capacity, p.total_time);
        let id = store.insert(RoadRecord {
            name: p.name.clone(),
            green_time,
            vehicle_count: p.vehicle_count,
            capacity: p.capacity,
            total_time: p.total_time,
            has_emergency_vehicle: false,
            file_path: p.file_path.clone(),
        })?;
        roads.push(Road::new(id, p));
    }
    Ok(roads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::demand::FixedNoise;
    use crate::storage::road_store::MemoryRoadStore;

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "{actual} != {expected}");
    }

    fn road() -> Road {
        Road::new(RoadId(1), &RoadParams::new("Road 1", 40.0, 1000.0, 300.0, 1.0))
    }

    #[test]
    fn green_time_follows_formula() {
        assert_close(compute_green_time(40.0, 1000.0, 300.0), 12.0);
        let mut r = road();
        assert_close(r.green_time(), 12.0);
        r.set_vehicle_count(100.0);
        assert_close(r.green_time(), 30.0);
    }

    #[test]
    fn synthetic_demand_grows_while_red_and_drains_while_green() {
        assert_close(apply_synthetic_demand(10.0, 3600.0, 2.0, false, 1.2), 12.4);
        assert_close(apply_synthetic_demand(10.0, 3600.0, 2.0, true, 1.0), 9.0);
    }

    #[test]
    fn synthetic_demand_never_negative() {
        for previous in [0.0, 0.1, 0.5, 3.0] {
            for factor in [0.9, 1.0, 1.1] {
                let next = apply_synthetic_demand(previous, 36_000.0, 1.0, true, factor);
                assert!(next >= 0.0, "{previous} * {factor} gave {next}");
            }
        }
        assert_eq!(apply_synthetic_demand(0.0, 1000.0, 1.0, true, 1.1), 0.0);
    }

    #[test]
    fn trigger_respects_probability_and_open_window() {
        let now = Instant::now();
        assert_eq!(maybe_trigger_emergency(None, now, 0.001, 0.005), Some(now));
        assert_eq!(maybe_trigger_emergency(None, now, 0.5, 0.005), None);
        assert_eq!(maybe_trigger_emergency(Some(now), now, 0.0, 0.005), None);
    }

    #[test]
    fn emergency_clears_only_after_window() {
        let t0 = Instant::now();
        let limit = Duration::from_secs(5);
        let mut r = road();
        r.trigger_emergency(t0);

        assert!(!r.expire_emergency(t0 + Duration::from_secs_f64(4.99), limit));
        assert!(r.has_emergency_vehicle());
        assert_eq!(r.emergency_triggered_at(), Some(t0));

        assert!(r.expire_emergency(t0 + Duration::from_secs_f64(5.01), limit));
        assert!(!r.has_emergency_vehicle());
        assert_eq!(r.emergency_triggered_at(), None);
    }

    #[test]
    fn roll_does_not_restart_open_window() {
        let t0 = Instant::now();
        let mut r = road();
        let mut noise = FixedNoise::new(1.0, 1.0, 0.0);
        assert!(r.roll_emergency(&mut noise, t0, 0.005));
        assert!(!r.roll_emergency(&mut noise, t0 + Duration::from_secs(2), 0.005));
        assert_eq!(r.emergency_triggered_at(), Some(t0));
    }

    #[test]
    fn measurement_overwrites_demand_and_flag() {
        let t0 = Instant::now();
        let mut r = road();
        r.apply_measurement(
            &Measurement {
                vehicle_count: 250,
                has_emergency_vehicle: true,
            },
            t0,
        );
        assert_eq!(r.vehicle_count(), 250.0);
        assert_close(r.green_time(), 75.0);
        assert!(r.has_emergency_vehicle());
        assert_eq!(r.emergency_triggered_at(), Some(t0));
    }

    #[test]
    fn clear_measurement_closes_open_window() {
        let t0 = Instant::now();
        let mut r = road();
        r.trigger_emergency(t0);
        r.apply_measurement(
            &Measurement {
                vehicle_count: 3,
                has_emergency_vehicle: false,
            },
            t0 + Duration::from_secs(2),
        );
        assert!(!r.has_emergency_vehicle());
        assert_eq!(r.emergency_triggered_at(), None);

        // A later emergency starts its own window instead of reusing the old start.
        let later = t0 + Duration::from_secs(3);
        r.trigger_emergency(later);
        assert_eq!(r.emergency_triggered_at(), Some(later));
    }

    #[test]
    fn create_roads_uses_store_ids() {
        let mut store = MemoryRoadStore::new();
        let params = vec![
            RoadParams::new("A", 10.0, 100.0, 50.0, 1.0),
            RoadParams::new("B", 20.0, 100.0, 50.0, 1.0).with_file_path("b.csv"),
        ];
        let roads = create_roads(&params, &mut store).unwrap();
        assert_eq!(roads[0].id(), RoadId(1));
        assert_eq!(roads[1].id(), RoadId(2));
        assert_close(store.get_green_time(RoadId(2)).unwrap(), 10.0);
        assert_eq!(store.get_file_path(RoadId(2)).unwrap().as_deref(), Some("b.csv"));
        assert!(!roads[0].is_green());
    }

    #[test]
    fn validate_rejects_zero_capacity() {
        let p = RoadParams::new("A", 10.0, 0.0, 50.0, 1.0);
        assert!(matches!(
            p.validate(0),
            Err(ConfigError::InvalidRoadParameter { field: "capacity", .. })
        ));
        assert!(matches!(
            RoadParams::new(" ", 10.0, 1.0, 1.0, 1.0).validate(3),
            Err(ConfigError::MissingName(3))
        ));
    }
}
