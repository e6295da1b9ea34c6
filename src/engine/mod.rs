//! Entry Engine (§4.2): fork-aware entry storage, append/sync of
//! conversation entries, and ancestry construction for the fork tree.

pub mod ancestry;
pub mod entries;
pub mod memory_items;

pub use entries::{AppendEntriesResult, EntryEngine};
