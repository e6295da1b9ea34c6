//! Background job infrastructure for the memory service core.
//!
//! Two jobs run alongside the core's request-serving operations:
//!
//! - **Vector indexing** (`vector_indexing`): claims entries pending
//!   embedding through the Task Queue Boundary and calls the Search
//!   Adapter Boundary's `upsertEmbedding` (§4.2.6, §4.8).
//! - **Spool reaper** (`spool_reaper`): a one-shot startup sweep that
//!   deletes Response Resumer spool files orphaned by a crash (§4.4.5).
//!
//! # Example
//!
//! ```toml
//! [jobs.vector_indexing]
//! enabled = true
//! interval_secs = 30
//! batch_size = 100
//! ```

mod spool_reaper;
mod vector_indexing;

pub use spool_reaper::{reap_stale_spools, ReapResult};
pub use vector_indexing::{start_vector_indexing_worker, IndexingRunResult};
