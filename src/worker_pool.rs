//! Fixed-capacity worker pool draining the two priority lanes (spec §4.3).

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, trace};

use crate::collaborator::WriteBehindOutcome;
use crate::scan::run_scan;
use crate::scheduler::Timer;
use crate::state::SharedState;
use crate::stream::StreamFlags;
use crate::work_queue::{Lane, WorkEntry, WorkKind};

pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn start(state: Arc<SharedState>, timer: Arc<Timer>) -> Self {
        let mut handles = Vec::with_capacity(state.config.worker_count);
        for i in 0..state.config.worker_count {
            let state = Arc::clone(&state);
            let timer = Arc::clone(&timer);
            let handle = thread::Builder::new()
                .name(format!("lazy-writer-worker-{}", i))
                .spawn(move || worker_thread(state, timer))
                .expect("failed to spawn lazy-writer worker thread");
            handles.push(handle);
        }
        WorkerPool { handles }
    }

    /// Wake every idle worker and wait for them to drain and exit.
    pub fn join(self) {
        for h in self.handles {
            let _ = h.join();
        }
    }
}

/// One worker's entry point (spec §4.3). Runs until the pool is shut down:
/// drains both lanes, goes idle, and blocks for more work, repeating for the
/// life of the process.
fn worker_thread(state: Arc<SharedState>, timer: Arc<Timer>) {
    loop {
        state.queue.mark_worker_active();
        drain_loop(&state, &timer);
        state.queue.mark_worker_idle();

        if !state.queue.wait_for_work() {
            debug!("lazy writer: worker {:?} shutting down", thread::current().id());
            return;
        }
    }
}

/// The inner loop of spec §4.3 steps 1-7: drains express then regular until
/// both are empty (or the head is a throttling `EventSet`), then returns so
/// the caller can idle.
fn drain_loop(state: &Arc<SharedState>, timer: &Arc<Timer>) {
    // Per-worker state carried between loop iterations: spec step 1's
    // "previous iteration set drop_throttle" and step 2's "previous iteration
    // returned CC_REQUEUE" are properties of *this* worker's last dispatch,
    // not of the shared queue.
    let mut drop_throttle = false;
    let mut pending_requeue: Option<(Lane, WorkEntry)> = None;
    let mut completed_successful_write = false;

    loop {
        if let Some((lane, entry)) = pending_requeue.take() {
            state.queue.requeue(lane, entry);
        }

        let popped = state.queue.pop_for_worker(drop_throttle);
        drop_throttle = false;

        let (lane, entry) = match popped {
            Some(v) => v,
            None => break, // both lanes empty (or throttled on an EventSet): go idle
        };

        let requeue = dispatch(
            state,
            timer,
            &entry.kind,
            &mut drop_throttle,
            &mut completed_successful_write,
        );

        if requeue {
            pending_requeue = Some((lane, entry));
        } else {
            state.pool.free(entry);
        }
    }

    // Last action: if a completed write may have unblocked a deferred writer,
    // kick a fresh scan synchronously in this thread (spec §4.3, last
    // paragraph).
    let total_dirty = state.inventory.lock().unwrap().total_dirty_pages;
    if completed_successful_write
        && state.collaborator.has_deferred_writes()
        && total_dirty >= state.config.rescan_threshold_pages
    {
        trace!("lazy writer: worker kicking synchronous rescan before idling");
        if let Err(e) = run_scan(state, timer) {
            escalate(e);
        }
    }
}

/// Dispatch one entry. Returns whether the caller should requeue it
/// (`CC_REQUEUE`).
fn dispatch(
    state: &Arc<SharedState>,
    timer: &Timer,
    kind: &WorkKind,
    drop_throttle: &mut bool,
    completed_successful_write: &mut bool,
) -> bool {
    match kind {
        WorkKind::ReadAhead(file) => {
            if let Err(e) = state.collaborator.perform_read_ahead(Arc::clone(file)) {
                if !is_expected(&e) {
                    escalate(e);
                }
            }
            false
        }
        WorkKind::WriteBehind(handle) => {
            // The allocator-privileged flag is thread-local in the original;
            // here it is simply the lifetime of this match arm, cleared on
            // every exit path (including the early returns below) by
            // construction rather than by an explicit guard object.
            let result = state.collaborator.write_behind(handle);
            match result {
                Ok(WriteBehindOutcome::Done) => {
                    unpin_stream(state, handle.id, handle.pages_to_write);
                    *completed_successful_write = true;
                    false
                }
                Ok(WriteBehindOutcome::Requeue) => true,
                Ok(WriteBehindOutcome::Failed) => {
                    unpin_stream(state, handle.id, 0);
                    *completed_successful_write = false;
                    false
                }
                Err(e) => {
                    unpin_stream(state, handle.id, 0);
                    if !is_expected(&e) {
                        escalate(e);
                    }
                    false
                }
            }
        }
        WorkKind::EventSet(event) => {
            event.set();
            *drop_throttle = true;
            false
        }
        WorkKind::LazyWriteScan => {
            if let Err(e) = run_scan(state, timer) {
                if !is_expected(&e) {
                    escalate(e);
                }
            }
            false
        }
    }
}

/// Release the pin a dispatched `WriteBehind` holds on a stream (spec §4.2
/// step 5 sets `WRITE_QUEUED` and biases `dirty_pages`; invariant 3 requires
/// it cleared once the worker or scan no longer owns the stream).
/// `pages_written` is subtracted from both the stream's and the inventory's
/// dirty-page counts; a failed or errored write subtracts nothing, since
/// those pages are still dirty.
fn unpin_stream(state: &Arc<SharedState>, id: crate::stream::StreamId, pages_written: u64) {
    let mut inv = state.inventory.lock().unwrap();
    if !inv.is_live(id) {
        return;
    }
    let desc = inv.get_mut(id);
    desc.flags.remove(StreamFlags::WRITE_QUEUED);
    desc.dirty_pages = desc.dirty_pages.saturating_sub(pages_written);
    inv.total_dirty_pages = inv.total_dirty_pages.saturating_sub(pages_written);
}

/// Spec §4.2/§7: "Known-expected statuses are swallowed; anything else is a
/// fatal bug-check." This crate classifies nothing as expected-and-swallowable
/// at the `error-chain` level beyond what collaborators already report through
/// `WriteBehindOutcome`/`Result::Ok`; any `Err` that reaches here is therefore
/// unexpected.
fn is_expected(_err: &crate::error::Error) -> bool {
    false
}

fn escalate(err: crate::error::Error) -> ! {
    error!("lazy writer: unrecoverable error, aborting: {}", err);
    std::process::abort();
}
