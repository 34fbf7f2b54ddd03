pub mod config;
pub mod control_system;
pub mod detection;
pub mod error;
pub mod global_variables;
pub mod models;
pub mod monitoring;
pub mod shared_data;
pub mod storage;
