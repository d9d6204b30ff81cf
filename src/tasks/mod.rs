//! Background Tasks Module
//!
//! Contains background tasks that run periodically while the cache is alive.
//!
//! # Tasks
//! - Expiry cleanup: removes expired entries from every tier in batches

mod cleanup;

pub use cleanup::spawn_cleanup_task;
