use std::collections::HashSet;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::{IntersectionConfig, TimingConfig};
use crate::control_system::road_ring::RoadRing;
use crate::detection::detector::{Detector, Measurement};
use crate::error::{ConfigError, DetectionError, StoreError};
use crate::models::demand::DemandNoise;
use crate::models::road::{create_roads, Road, RoadId};
use crate::shared_data::{current_timestamp, RoadStatus, StatusSnapshot};
use crate::storage::road_store::RoadStore;

/// Timer periods and emergency parameters used by the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerSettings {
    pub fast_refresh: Duration,
    pub slow_refresh: Duration,
    pub emergency_window: Duration,
    pub emergency_probability: f64,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from(&TimingConfig::default())
    }
}

impl From<&TimingConfig> for ControllerSettings {
    fn from(timing: &TimingConfig) -> Self {
        Self {
            fast_refresh: timing.fast_refresh(),
            slow_refresh: timing.slow_refresh(),
            emergency_window: timing.emergency_window(),
            emergency_probability: timing.emergency_probability,
        }
    }
}

/// A road whose data source should be measured by the detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionRequest {
    pub road: RoadId,
    pub source: String,
}

/// A green handed from one road to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Switch {
    pub from: RoadId,
    pub to: RoadId,
}

/// What one iteration of the control loop did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub rotated: Option<Switch>,
    pub preempted: Option<Switch>,
    pub fast_refreshed: bool,
    pub detection_requests: Vec<DetectionRequest>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStats {
    pub rotations: u64,
    pub preemptions: u64,
    pub fast_refreshes: u64,
    pub slow_refreshes: u64,
    pub measurements_applied: u64,
    pub measurements_skipped: u64,
    pub failed_writes: u64,
}

/// Single-intersection signal scheduler.
///
/// Owns the ring, the active road and three timers measured against the
/// `now` passed to [`tick`](Self::tick): the phase clock, the fast refresh and
/// the slow refresh. Every road mutation happens through `&mut self`, so
/// exactly one road is green between calls.
pub struct TrafficLightController<S, N> {
    ring: RoadRing,
    store: S,
    noise: N,
    settings: ControllerSettings,
    active: usize,
    start_time: Instant,
    fast_refresh_at: Instant,
    slow_refresh_at: Instant,
    in_flight: HashSet<RoadId>,
    pending_writes: HashSet<RoadId>,
    stats: ControllerStats,
}

impl<S: RoadStore, N: DemandNoise> TrafficLightController<S, N> {
    /// Starts with the first road of the ring green and all timers at `now`.
    pub fn new(
        mut ring: RoadRing,
        store: S,
        noise: N,
        settings: ControllerSettings,
        now: Instant,
    ) -> Self {
        for index in 0..ring.len() {
            if let Some(road) = ring.get_mut(index) {
                if index == 0 {
                    road.turn_green();
                } else {
                    road.turn_red();
                }
            }
        }
        info!("Initial green light on {}", ring[0].name());
        Self {
            ring,
            store,
            noise,
            settings,
            active: 0,
            start_time: now,
            fast_refresh_at: now,
            slow_refresh_at: now,
            in_flight: HashSet::new(),
            pending_writes: HashSet::new(),
            stats: ControllerStats::default(),
        }
    }

    /// Validates `config`, registers its roads with `store` and starts the controller.
    pub fn from_config(
        config: &IntersectionConfig,
        mut store: S,
        noise: N,
        now: Instant,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let roads = create_roads(&config.roads, &mut store)?;
        let ring = RoadRing::new(roads)?;
        Ok(Self::new(
            ring,
            store,
            noise,
            ControllerSettings::from(&config.timing),
            now,
        ))
    }

    pub fn ring(&self) -> &RoadRing {
        &self.ring
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn stats(&self) -> ControllerStats {
        self.stats
    }

    pub fn active_road(&self) -> &Road {
        &self.ring[self.active]
    }

    pub fn active_id(&self) -> RoadId {
        self.active_road().id()
    }

    pub fn road(&self, id: RoadId) -> Option<&Road> {
        self.ring.by_id(id)
    }

    /// Roads whose last write to the store failed.
    pub fn pending_writes(&self) -> &HashSet<RoadId> {
        &self.pending_writes
    }

    /// Roads with a detector call dispatched and not yet applied.
    pub fn in_flight(&self) -> &HashSet<RoadId> {
        &self.in_flight
    }

    pub fn time_since_switch(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.start_time)
    }

    /// One control-loop iteration: rotation, preemption, fast refresh, slow refresh.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let rotated = self.check_rotation(now);
        let preempted = self.check_preemption(now);

        let fast_refreshed =
            now.saturating_duration_since(self.fast_refresh_at) > self.settings.fast_refresh;
        if fast_refreshed {
            self.fast_refresh(now);
            self.fast_refresh_at = now;
        }

        let mut detection_requests = Vec::new();
        if now.saturating_duration_since(self.slow_refresh_at) > self.settings.slow_refresh {
            detection_requests = self.slow_refresh();
            self.slow_refresh_at = now;
        }

        TickReport {
            rotated,
            preempted,
            fast_refreshed,
            detection_requests,
        }
    }

    /// Hands green to the next road once the active one has used its green time.
    fn check_rotation(&mut self, now: Instant) -> Option<Switch> {
        let elapsed = self.time_since_switch(now).as_secs_f64();
        if elapsed <= self.active_road().green_time() {
            return None;
        }
        let next = self.ring.successor_index(self.active);
        let switch = self.switch_to(next, now);
        info!(
            "Switching green light from {} to {}",
            self.ring.by_id(switch.from).map_or("?", Road::name),
            self.active_road().name()
        );
        self.stats.rotations += 1;
        Some(switch)
    }

    /// First emergency road in ring order takes green. If that road is already
    /// active nothing happens, even when a later road also has an emergency.
    fn check_preemption(&mut self, now: Instant) -> Option<Switch> {
        let target = self.ring.iter().position(Road::has_emergency_vehicle)?;
        if target == self.active {
            return None;
        }
        let switch = self.switch_to(target, now);
        info!(
            "Emergency vehicle detected on {}, switched green away from {}",
            self.active_road().name(),
            self.ring.by_id(switch.from).map_or("?", Road::name)
        );
        self.stats.preemptions += 1;
        Some(switch)
    }

    fn switch_to(&mut self, index: usize, now: Instant) -> Switch {
        let from = self.active_id();
        if let Some(road) = self.ring.get_mut(self.active) {
            road.turn_red();
        }
        if let Some(road) = self.ring.get_mut(index) {
            road.turn_green();
        }
        self.active = index;
        self.start_time = now;
        Switch {
            from,
            to: self.active_id(),
        }
    }

    /// Synthetic demand and random emergencies for roads without a data source.
    /// Every road then has its emergency window checked, its green time
    /// recomputed and its state written through.
    fn fast_refresh(&mut self, now: Instant) {
        let probability = self.settings.emergency_probability;
        let window = self.settings.emergency_window;
        for index in 0..self.ring.len() {
            let Some(road) = self.ring.get_mut(index) else {
                continue;
            };
            if !road.has_data_source() {
                road.simulate_demand(&mut self.noise);
                if road.roll_emergency(&mut self.noise, now, probability) {
                    info!("Emergency vehicle triggered on {} for a few seconds.", road.name());
                }
            }
            if road.expire_emergency(now, window) {
                info!(
                    "Emergency vehicle cleared from {} after {:.0} seconds.",
                    road.name(),
                    window.as_secs_f64()
                );
            }
            road.refresh_green_time();
            self.persist(index);
        }
        self.stats.fast_refreshes += 1;
    }

    /// Detection requests for every road with a data source and no call outstanding.
    fn slow_refresh(&mut self) -> Vec<DetectionRequest> {
        let mut requests = Vec::new();
        for road in self.ring.iter() {
            let Some(source) = road.file_path() else {
                continue;
            };
            if self.in_flight.contains(&road.id()) {
                debug!("Detector still busy for {}, skipping this refresh", road.name());
                continue;
            }
            requests.push(DetectionRequest {
                road: road.id(),
                source: source.to_string(),
            });
        }
        self.in_flight.extend(requests.iter().map(|r| r.road));
        self.stats.slow_refreshes += 1;
        requests
    }

    /// Applies a detector result as of `now`. Failures leave the road's demand
    /// unchanged. Returns true when the measurement was applied.
    ///
    /// The road stays in flight until [`finish_detection`](Self::finish_detection),
    /// so a timed-out call still blocks new requests until it actually returns.
    pub fn apply_measurement(
        &mut self,
        id: RoadId,
        result: Result<Measurement, DetectionError>,
        now: Instant,
    ) -> bool {
        let Some(index) = self.ring.position(id) else {
            warn!("Measurement for unknown road {}", id);
            return false;
        };
        match result {
            Ok(measurement) => {
                if let Some(road) = self.ring.get_mut(index) {
                    road.apply_measurement(&measurement, now);
                    info!(
                        "Camera update on {}: {} vehicles, emergency: {}",
                        road.name(),
                        measurement.vehicle_count,
                        measurement.has_emergency_vehicle
                    );
                }
                self.persist(index);
                self.stats.measurements_applied += 1;
                true
            }
            Err(e) => {
                warn!("No usable frame for {}: {}", self.ring[index].name(), e);
                self.stats.measurements_skipped += 1;
                false
            }
        }
    }

    /// Marks the detector call for `id` as returned; the next slow refresh may
    /// request the road again.
    pub fn finish_detection(&mut self, id: RoadId) {
        self.in_flight.remove(&id);
    }

    /// Runs detection requests on the calling thread, for hosts without an async runtime.
    pub fn measure_inline<D: Detector + ?Sized>(
        &mut self,
        requests: Vec<DetectionRequest>,
        detector: &D,
        now: Instant,
    ) {
        for request in requests {
            let result = detector.detect(&request.source);
            self.apply_measurement(request.road, result, now);
            self.finish_detection(request.road);
        }
    }

    /// Raises an emergency on `id` as of `now`; it auto-clears after the emergency window.
    pub fn report_emergency(&mut self, id: RoadId, now: Instant) -> bool {
        let Some(index) = self.ring.position(id) else {
            return false;
        };
        if let Some(road) = self.ring.get_mut(index) {
            road.trigger_emergency(now);
            info!("Emergency vehicle reported on {}", road.name());
        }
        self.persist(index);
        true
    }

    /// Rewrites every road whose previous write failed.
    pub fn retry_pending_writes(&mut self) {
        let pending: Vec<RoadId> = self.pending_writes.iter().copied().collect();
        for id in pending {
            if let Some(index) = self.ring.position(id) {
                self.persist(index);
            }
        }
    }

    fn persist(&mut self, index: usize) {
        let road = &self.ring[index];
        match write_demand(&mut self.store, road) {
            Ok(()) => {
                self.pending_writes.remove(&road.id());
            }
            Err(e) => {
                warn!("Failed to persist {}: {}", road.name(), e);
                self.pending_writes.insert(road.id());
                self.stats.failed_writes += 1;
            }
        }
    }

    pub fn snapshot(&self, now: Instant) -> StatusSnapshot {
        StatusSnapshot {
            timestamp: current_timestamp(),
            active_road: self.active_id(),
            active_name: self.active_road().name().to_string(),
            secs_since_switch: self.time_since_switch(now).as_secs_f64(),
            roads: self
                .ring
                .iter()
                .map(|road| RoadStatus {
                    id: road.id(),
                    name: road.name().to_string(),
                    light: road.light(),
                    vehicle_count: road.vehicle_count(),
                    green_time: road.green_time(),
                    has_emergency_vehicle: road.has_emergency_vehicle(),
                })
                .collect(),
        }
    }
}

fn write_demand<S: RoadStore + ?Sized>(store: &mut S, road: &Road) -> Result<(), StoreError> {
    store.update_demand(
        road.id(),
        road.vehicle_count(),
        road.green_time(),
        road.has_emergency_vehicle(),
    )
}
