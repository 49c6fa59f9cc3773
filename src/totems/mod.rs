//! 🜃 Level 2: Memory Totems
//!
//! Location keys, interaction records and the durable store that groups them.

pub mod location;
pub mod memory;
pub mod persistence;
pub mod record;
pub mod retrieval;

pub use location::LocationKey;
pub use memory::{MemoryStats, MemoryStore};
pub use record::{InteractionRecord, NewInteraction, RecordId};
