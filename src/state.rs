//! Shared process-wide state threaded through the scheduler, the scan, the
//! barrier, and the worker pool (Design Notes §9: "Implementations should
//! encapsulate this in a single object constructed at cache-manager start;
//! there is one per process.").

use std::sync::{Arc, Mutex};

use crate::collaborator::Collaborator;
use crate::config::LazyWriterConfig;
use crate::stream::Inventory;
use crate::work_queue::{EntryPool, WorkQueue};

pub struct SharedState {
    pub config: LazyWriterConfig,
    /// The master lock: protects the inventory, per-stream flags/counters, and
    /// the handful of global scalars listed in spec §3 that aren't owned by the
    /// work-queue lock (spec §5).
    pub inventory: Mutex<Inventory>,
    /// The work-queue lock: protects both priority lanes, the post-tick staging
    /// area, `queue_throttle`, and `active_worker_count` (spec §5).
    pub queue: WorkQueue,
    pub pool: EntryPool,
    pub collaborator: Arc<dyn Collaborator>,
}

impl SharedState {
    pub fn new(config: LazyWriterConfig, collaborator: Arc<dyn Collaborator>) -> Arc<Self> {
        let inventory = Inventory::new(config.dirty_page_target);
        let entry_pool_capacity = config.entry_pool_capacity;
        Arc::new(SharedState {
            config,
            inventory: Mutex::new(inventory),
            queue: WorkQueue::new(),
            pool: EntryPool::new(entry_pool_capacity),
            collaborator,
        })
    }
}
