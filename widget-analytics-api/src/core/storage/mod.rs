//! Storage backends for the analytics document
//!
//! ## Available Backends
//!
//! - `file`: a single pretty-printed JSON file, replaced atomically (default)
//! - `memory`: process-local, lost on exit

mod file;
mod memory;
mod traits;

pub use file::FileDocumentStore;
pub use memory::InMemoryDocumentStore;
pub use traits::*;
