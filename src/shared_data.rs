// src/shared_data.rs

use crate::models::road::{LightState, RoadId};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// State of one road as exposed for logging and inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadStatus {
    pub id: RoadId,
    pub name: String,
    pub light: LightState,
    pub vehicle_count: f64,
    pub green_time: f64,
    pub has_emergency_vehicle: bool,
}

/// The whole intersection at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub timestamp: u64,
    pub active_road: RoadId,
    pub active_name: String,
    pub secs_since_switch: f64,
    pub roads: Vec<RoadStatus>,
}

/// Flat CSV row: one per road per snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub timestamp: u64,
    pub road_id: u32,
    pub road_name: String,
    pub is_green: bool,
    pub vehicle_count: f64,
    pub green_time: f64,
    pub has_emergency_vehicle: bool,
}

impl StatusSnapshot {
    pub fn records(&self) -> Vec<StatusRecord> {
        self.roads
            .iter()
            .map(|road| StatusRecord {
                timestamp: self.timestamp,
                road_id: road.id.0,
                road_name: road.name.clone(),
                is_green: road.light == LightState::Green,
                vehicle_count: road.vehicle_count,
                green_time: road.green_time,
                has_emergency_vehicle: road.has_emergency_vehicle,
            })
            .collect()
    }
}
