//! Processed-message tracking
//!
//! Remembers which (message, rule) pairs have already been handled so a
//! repeated run does not apply the same rule to the same message twice.

mod file;
mod memory;
mod traits;

pub use file::JsonFileProcessedStore;
pub use memory::InMemoryProcessedStore;
pub use traits::ProcessedStore;
