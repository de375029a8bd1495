pub mod config;
pub mod ids;
pub mod report;
pub mod storage;
pub mod store;
