//! Lazy Writer: the background dirty-stream flush engine of a file cache
//! manager.
//!
//! Periodically scans every stream with dirty pages, decides what to flush
//! this tick, dispatches the work to a pool of worker threads, and drives
//! deferred and post-quiescence work to completion. See `SPEC_FULL.md` for the
//! full requirements this crate implements.

#[macro_use]
extern crate error_chain;

pub mod barrier;
pub mod collaborator;
pub mod config;
pub mod error;
pub mod lazy_writer;
pub mod scan;
pub mod scheduler;
pub mod state;
pub mod stream;
pub mod work_queue;
pub mod worker_pool;

pub use collaborator::{Collaborator, WriteBehindOutcome};
pub use config::LazyWriterConfig;
pub use error::{Error, ErrorKind, Result};
pub use lazy_writer::LazyWriter;
pub use stream::{StreamDescriptor, StreamFlags, StreamId};
