//! `LazyWriter`: the single process-wide object wiring the scheduler, the
//! scan, the worker pool, and the barrier together (Design Notes §9). One
//! instance per cache manager.

use std::sync::Arc;

use crate::barrier::wait_for_current_activity;
use crate::collaborator::Collaborator;
use crate::config::LazyWriterConfig;
use crate::error::Result;
use crate::scheduler::{schedule_scan, Timer};
use crate::state::SharedState;
use crate::stream::{StreamDescriptor, StreamId};
use crate::worker_pool::WorkerPool;

/// The three entry points spec §6 exposes to the rest of the cache manager,
/// plus the inventory bookkeeping §4.5 assumes some caller performs (insertion,
/// removal, dirty-page accounting). A real cache manager owns the stream
/// descriptors and calls through these; this crate fixes only the interface.
pub struct LazyWriter {
    state: Arc<SharedState>,
    timer: Arc<Timer>,
    pool: Option<WorkerPool>,
}

impl LazyWriter {
    pub fn new(config: LazyWriterConfig, collaborator: Arc<dyn Collaborator>) -> Self {
        let state = SharedState::new(config, collaborator);
        let timer = Timer::start(Arc::clone(&state));
        let pool = WorkerPool::start(Arc::clone(&state), Arc::clone(&timer));
        LazyWriter {
            state,
            timer,
            pool: Some(pool),
        }
    }

    /// `schedule_lazy_write_scan(fast)` (spec §4.1, §6). Callers other than the
    /// scan thread itself must otherwise be holding the master lock in the
    /// original source; here the function simply takes it itself, so any
    /// caller (including the scan, propagating to itself after releasing the
    /// lock) can use this directly.
    pub fn schedule_lazy_write_scan(&self, fast: bool) {
        schedule_scan(&self.state, &self.timer, fast);
    }

    /// `wait_for_current_lazy_writer_activity` (spec §4.4, §6). Returns
    /// `InsufficientResources` if the event entry could not be allocated, else
    /// the result of the event wait.
    pub fn wait_for_current_lazy_writer_activity(&self) -> Result<()> {
        wait_for_current_activity(&self.state, &self.timer)
    }

    /// Register a new stream descriptor in the dirty-stream inventory. Not one
    /// of spec §6's three lazy-writer entry points — it stands in for the
    /// surrounding cache manager's own bookkeeping (spec §4.5), which this
    /// crate does not otherwise implement.
    pub fn insert_stream(&self, desc: StreamDescriptor) -> StreamId {
        let mut inv = self.state.inventory.lock().unwrap();
        inv.total_dirty_pages += desc.dirty_pages;
        inv.insert(desc)
    }

    /// Remove a stream from the inventory (e.g. once fully clean and closed).
    pub fn remove_stream(&self, id: StreamId) {
        let mut inv = self.state.inventory.lock().unwrap();
        let dirty = inv.get(id).dirty_pages;
        inv.total_dirty_pages = inv.total_dirty_pages.saturating_sub(dirty);
        inv.remove(id);
    }

    /// Add (or, with a negative delta expressed as `i64`, subtract) dirty pages
    /// for a stream, keeping `total_dirty_pages` consistent (spec §3:
    /// "mutated under the master lock by the collaborator and by the scan").
    pub fn adjust_dirty_pages(&self, id: StreamId, delta: i64) {
        let mut inv = self.state.inventory.lock().unwrap();
        let desc = inv.get_mut(id);
        desc.dirty_pages = (desc.dirty_pages as i64 + delta).max(0) as u64;
        if delta > 0 {
            inv.total_dirty_pages += delta as u64;
        } else {
            inv.total_dirty_pages = inv.total_dirty_pages.saturating_sub((-delta) as u64);
        }
    }

    pub fn with_stream_mut<R>(&self, id: StreamId, f: impl FnOnce(&mut StreamDescriptor) -> R) -> R {
        let mut inv = self.state.inventory.lock().unwrap();
        f(inv.get_mut(id))
    }

    /// Signal `other_work` directly (spec §3, §4.1): the hook an external
    /// caller uses to keep the scan running past a zero-dirty tick, e.g. when
    /// registering a lazy-close candidate (`open_count == 0, dirty_pages ==
    /// 0`) that the quiescence test would otherwise shadow.
    pub fn mark_other_work(&self) {
        let mut inv = self.state.inventory.lock().unwrap();
        inv.other_work = true;
        if !inv.scan_active {
            drop(inv);
            self.schedule_lazy_write_scan(true);
        }
    }

    pub fn total_dirty_pages(&self) -> u64 {
        self.state.inventory.lock().unwrap().total_dirty_pages
    }

    pub fn is_scan_active(&self) -> bool {
        self.state.inventory.lock().unwrap().scan_active
    }

    /// Stop the timer and drain the worker pool. Spec §5 notes cancellation is
    /// out of scope for the lazy writer itself ("Shutdown is a higher-layer
    /// concern"); this is purely for orderly process/test teardown.
    pub fn shutdown(mut self) {
        self.timer.stop();
        self.state.queue.shutdown();
        if let Some(pool) = self.pool.take() {
            pool.join();
        }
    }
}
