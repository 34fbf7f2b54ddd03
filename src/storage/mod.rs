pub mod csv_store;
pub mod road_store;

pub use csv_store::CsvRoadStore;
pub use road_store::{MemoryRoadStore, RoadRecord, RoadStore};
