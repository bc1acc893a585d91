//! Asynchronous write replication to slaves.
//!
//! Every successful master write is re-executed on each registered slave
//! right away. A slave that fails gets a [`SyncQueueEntry`] which the periodic
//! drain retries up to `max_retries` times before marking it `failed`.
//! Settled entries are discarded once older than `cleanup_age`.
//!
//! Replication is best-effort: nothing here ever reaches the writer, and
//! there is no ordering guarantee between writes or against later reads.
//!
//! [`SyncQueueEntry`]: dbrouter_types::SyncQueueEntry

mod engine;


pub use engine::ReplicationEngine;
