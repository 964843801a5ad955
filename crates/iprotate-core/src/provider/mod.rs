//! Built-in provider implementations
//!
//! - [`MemoryCloudProvider`]: In-memory static-IP model (testing, local dry runs)

pub mod memory;

pub use memory::{MemoryCloudProvider, Operation};
