use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::config::IntersectionConfig;
use crate::control_system::traffic_light_controller::{DetectionRequest, TrafficLightController};
use crate::detection::detector::{Detector, Measurement};
use crate::error::DetectionError;
use crate::models::demand::DemandNoise;
use crate::models::road::RoadId;
use crate::monitoring::traffic_monitoring_system::log_status;
use crate::storage::road_store::RoadStore;

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    pub poll_interval: Duration,
    pub detector_timeout: Duration,
    pub status_log: Option<PathBuf>,
}

impl From<&IntersectionConfig> for RuntimeSettings {
    fn from(config: &IntersectionConfig) -> Self {
        Self {
            poll_interval: config.timing.poll_interval(),
            detector_timeout: config.timing.detector_timeout(),
            status_log: config.status_log.as_ref().map(PathBuf::from),
        }
    }
}

/// Progress of one detector call, reported back to the control loop.
#[derive(Debug)]
pub enum DetectionEvent {
    /// The call outlived the timeout and is still running on the blocking pool.
    TimedOut { road: RoadId, limit: Duration },
    /// The call returned. Sent exactly once per call, including after a timeout.
    Finished {
        road: RoadId,
        result: Result<Measurement, DetectionError>,
    },
}

/// Drives `controller` until `shutdown` resolves.
///
/// Each poll applies finished detector results, then ticks the controller.
/// Detector calls run on the blocking pool, one task per request, and report
/// back over a channel that only this loop reads, so road state is never
/// touched outside it. A timed-out call counts as no usable frame; its road is
/// not measured again until the call returns, and the late result is dropped.
pub async fn run_until<S, N, F>(
    controller: &mut TrafficLightController<S, N>,
    detector: Arc<dyn Detector>,
    settings: RuntimeSettings,
    shutdown: F,
) where
    S: RoadStore,
    N: DemandNoise,
    F: Future<Output = ()>,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<DetectionEvent>();
    let mut timed_out: HashSet<RoadId> = HashSet::new();
    let mut ticker = interval(settings.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, stopping traffic light controller");
                controller.retry_pending_writes();
                break;
            }
            _ = ticker.tick() => {}
        }

        let now = Instant::now();
        while let Ok(event) = rx.try_recv() {
            match event {
                DetectionEvent::TimedOut { road, limit } => {
                    timed_out.insert(road);
                    controller.apply_measurement(road, Err(DetectionError::Timeout(limit)), now);
                }
                DetectionEvent::Finished { road, result } => {
                    if timed_out.remove(&road) {
                        debug!("Dropping late detector result for road {}", road);
                    } else {
                        controller.apply_measurement(road, result, now);
                    }
                    controller.finish_detection(road);
                }
            }
        }

        let report = controller.tick(now);

        for request in report.detection_requests {
            spawn_detection(
                request,
                Arc::clone(&detector),
                settings.detector_timeout,
                tx.clone(),
            );
        }

        if report.fast_refreshed {
            let snapshot = controller.snapshot(now);
            info!(
                "Active road: {} ({:.2} s since last switch)",
                snapshot.active_name, snapshot.secs_since_switch
            );
            for road in &snapshot.roads {
                info!(
                    "  {} - {:?}, vehicles: {:.1}, green time: {:.1} s, emergency: {}",
                    road.name,
                    road.light,
                    road.vehicle_count,
                    road.green_time,
                    road.has_emergency_vehicle
                );
            }
            if let Some(path) = &settings.status_log {
                if let Err(e) = log_status(path, &snapshot) {
                    warn!("Error logging status to {}: {}", path.display(), e);
                }
            }
        }
    }
}

/// Runs one detector call off the control loop. Reports a timeout once `limit`
/// passes, then keeps waiting so the loop learns when the call really ends.
fn spawn_detection(
    request: DetectionRequest,
    detector: Arc<dyn Detector>,
    limit: Duration,
    tx: UnboundedSender<DetectionEvent>,
) {
    tokio::spawn(async move {
        let DetectionRequest { road, source } = request;
        let mut call = tokio::task::spawn_blocking(move || detector.detect(&source));
        // Sends fail only once the loop is gone after shutdown.
        let joined = match timeout(limit, &mut call).await {
            Ok(joined) => joined,
            Err(_) => {
                let _ = tx.send(DetectionEvent::TimedOut { road, limit });
                call.await
            }
        };
        let result = joined.unwrap_or_else(|join_error| {
            Err(DetectionError::TaskFailed(join_error.to_string()))
        });
        let _ = tx.send(DetectionEvent::Finished { road, result });
    });
}
