use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::models::road::RoadId;

/// Persisted fields of one road.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadRecord {
    pub name: String,
    pub green_time: f64,
    pub vehicle_count: f64,
    pub capacity: f64,
    pub total_time: f64,
    pub has_emergency_vehicle: bool,
    pub file_path: Option<String>,
}

/// Durable per-road field storage keyed by road id.
///
/// Implementors provide whole-record access; the per-field getters and setters
/// are built on top of it. No multi-field transaction is implied.
pub trait RoadStore {
    /// Stores a new road and returns the id assigned to it.
    fn insert(&mut self, record: RoadRecord) -> Result<RoadId, StoreError>;

    fn load(&self, id: RoadId) -> Result<RoadRecord, StoreError>;

    fn save(&mut self, id: RoadId, record: &RoadRecord) -> Result<(), StoreError>;

    fn get_name(&self, id: RoadId) -> Result<String, StoreError> {
        Ok(self.load(id)?.name)
    }

    fn get_green_time(&self, id: RoadId) -> Result<f64, StoreError> {
        Ok(self.load(id)?.green_time)
    }

    fn get_vehicle_count(&self, id: RoadId) -> Result<f64, StoreError> {
        Ok(self.load(id)?.vehicle_count)
    }

    fn get_capacity(&self, id: RoadId) -> Result<f64, StoreError> {
        Ok(self.load(id)?.capacity)
    }

    fn get_total_time(&self, id: RoadId) -> Result<f64, StoreError> {
        Ok(self.load(id)?.total_time)
    }

    fn get_has_emergency_vehicle(&self, id: RoadId) -> Result<bool, StoreError> {
        Ok(self.load(id)?.has_emergency_vehicle)
    }

    fn get_file_path(&self, id: RoadId) -> Result<Option<String>, StoreError> {
        Ok(self.load(id)?.file_path)
    }

    fn set_green_time(&mut self, id: RoadId, green_time: f64) -> Result<(), StoreError> {
        let mut record = self.load(id)?;
        record.green_time = green_time;
        self.save(id, &record)
    }

    fn set_vehicle_count(&mut self, id: RoadId, vehicle_count: f64) -> Result<(), StoreError> {
        let mut record = self.load(id)?;
        record.vehicle_count = vehicle_count;
        self.save(id, &record)
    }

    fn set_has_emergency_vehicle(&mut self, id: RoadId, value: bool) -> Result<(), StoreError> {
        let mut record = self.load(id)?;
        record.has_emergency_vehicle = value;
        self.save(id, &record)
    }

    fn set_file_path(&mut self, id: RoadId, file_path: Option<String>) -> Result<(), StoreError> {
        let mut record = self.load(id)?;
        record.file_path = file_path;
        self.save(id, &record)
    }

    /// Writes the fields a demand refresh changes in a single save.
    fn update_demand(
        &mut self,
        id: RoadId,
        vehicle_count: f64,
        green_time: f64,
        has_emergency_vehicle: bool,
    ) -> Result<(), StoreError> {
        let mut record = self.load(id)?;
        record.vehicle_count = vehicle_count;
        record.green_time = green_time;
        record.has_emergency_vehicle = has_emergency_vehicle;
        self.save(id, &record)
    }
}

/// Process-local store. Ids start at 1, like an autoincrement key.
#[derive(Debug, Default, Clone)]
pub struct MemoryRoadStore {
    records: BTreeMap<RoadId, RoadRecord>,
    next_id: u32,
}

impl MemoryRoadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RoadStore for MemoryRoadStore {
    fn insert(&mut self, record: RoadRecord) -> Result<RoadId, StoreError> {
        self.next_id += 1;
        let id = RoadId(self.next_id);
        self.records.insert(id, record);
        Ok(id)
    }

    fn load(&self, id: RoadId) -> Result<RoadRecord, StoreError> {
        self.records.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    fn save(&mut self, id: RoadId, record: &RoadRecord) -> Result<(), StoreError> {
        match self.records.get_mut(&id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> RoadRecord {
        RoadRecord {
            name: name.to_string(),
            green_time: 12.0,
            vehicle_count: 40.0,
            capacity: 1000.0,
            total_time: 300.0,
            has_emergency_vehicle: false,
            file_path: None,
        }
    }

    #[test]
    fn insert_assigns_sequential_ids() {
        let mut store = MemoryRoadStore::new();
        assert_eq!(store.insert(record("a")).unwrap(), RoadId(1));
        assert_eq!(store.insert(record("b")).unwrap(), RoadId(2));
        assert_eq!(store.get_name(RoadId(2)).unwrap(), "b");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn field_setters_touch_only_their_field() {
        let mut store = MemoryRoadStore::new();
        let id = store.insert(record("a")).unwrap();
        store.set_vehicle_count(id, 99.0).unwrap();
        store.set_has_emergency_vehicle(id, true).unwrap();
        store.set_file_path(id, Some("cam.csv".into())).unwrap();

        let loaded = store.load(id).unwrap();
        assert_eq!(loaded.vehicle_count, 99.0);
        assert_eq!(loaded.green_time, 12.0);
        assert!(loaded.has_emergency_vehicle);
        assert_eq!(loaded.file_path.as_deref(), Some("cam.csv"));
        assert_eq!(store.get_capacity(id).unwrap(), 1000.0);
        assert_eq!(store.get_total_time(id).unwrap(), 300.0);
    }

    #[test]
    fn unknown_id_is_not_found() {
        let mut store = MemoryRoadStore::new();
        assert!(matches!(
            store.set_green_time(RoadId(9), 1.0),
            Err(StoreError::NotFound(RoadId(9)))
        ));
        assert!(store.get_vehicle_count(RoadId(9)).is_err());
    }
}
