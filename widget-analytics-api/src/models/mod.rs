pub mod envelope;
pub mod error;
pub mod input;
pub mod records;
