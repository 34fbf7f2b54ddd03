use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::models::road::RoadId;
use crate::storage::road_store::{RoadRecord, RoadStore};

#[derive(Debug, Serialize, Deserialize)]
struct RoadRow {
    id: u32,
    name: String,
    green_time: f64,
    vehicle_count: f64,
    capacity: f64,
    total_time: f64,
    has_emergency_vehicle: bool,
    file_path: Option<String>,
}

impl RoadRow {
    fn new(id: RoadId, record: &RoadRecord) -> Self {
        Self {
            id: id.0,
            name: record.name.clone(),
            green_time: record.green_time,
            vehicle_count: record.vehicle_count,
            capacity: record.capacity,
            total_time: record.total_time,
            has_emergency_vehicle: record.has_emergency_vehicle,
            file_path: record.file_path.clone(),
        }
    }

    fn into_entry(self) -> (RoadId, RoadRecord) {
        (
            RoadId(self.id),
            RoadRecord {
                name: self.name,
                green_time: self.green_time,
                vehicle_count: self.vehicle_count,
                capacity: self.capacity,
                total_time: self.total_time,
                has_emergency_vehicle: self.has_emergency_vehicle,
                file_path: self.file_path,
            },
        )
    }
}

/// Road table kept in a CSV file, one row per road.
///
/// Reads are served from memory. Every write rewrites the whole table through a
/// temporary file, so a crash mid-write leaves the previous table in place.
#[derive(Debug)]
pub struct CsvRoadStore {
    path: PathBuf,
    records: BTreeMap<RoadId, RoadRecord>,
    next_id: u32,
}

impl CsvRoadStore {
    /// Opens `path`, loading any rows already there. Ids continue after the largest one found.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let mut records = BTreeMap::new();
        if path.exists() {
            let mut rdr = csv::Reader::from_path(&path)?;
            for row in rdr.deserialize::<RoadRow>() {
                let (id, record) = row?.into_entry();
                records.insert(id, record);
            }
        }
        let next_id = records.keys().map(|id| id.0).max().unwrap_or(0);
        let store = Self {
            path,
            records,
            next_id,
        };
        store.flush()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ids(&self) -> impl Iterator<Item = RoadId> + '_ {
        self.records.keys().copied()
    }

    fn flush(&self) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("csv.tmp");
        {
            let mut wtr = csv::Writer::from_path(&tmp)?;
            for (id, record) in &self.records {
                wtr.serialize(RoadRow::new(*id, record))?;
            }
            wtr.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl RoadStore for CsvRoadStore {
    fn insert(&mut self, record: RoadRecord) -> Result<RoadId, StoreError> {
        let id = RoadId(self.next_id + 1);
        self.records.insert(id, record);
        if let Err(e) = self.flush() {
            self.records.remove(&id);
            return Err(e);
        }
        self.next_id = id.0;
        Ok(id)
    }

    fn load(&self, id: RoadId) -> Result<RoadRecord, StoreError> {
        self.records.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    fn save(&mut self, id: RoadId, record: &RoadRecord) -> Result<(), StoreError> {
        let slot = self.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        *slot = record.clone();
        self.flush()
    }
}
