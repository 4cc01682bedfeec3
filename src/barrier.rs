//! `wait_for_current_activity`: a caller-visible barrier built on the post-tick
//! queue (spec §4.4).
//!
//! Correctness rests on two things documented in `scan.rs` and `work_queue.rs`:
//! the scan drains `post_tick` at the *start* of a tick and splices the frozen
//! batch into `regular`'s tail only after dispatching every `WriteBehind` for
//! that tick, and the worker pool throttles to a single active thread the
//! moment it pops an `EventSet` entry. Together those guarantee the event
//! fires strictly after every work item queued before this call completes.

use std::sync::Arc;

use crate::error::{ErrorKind, Result};
use crate::scheduler::{schedule_scan, Timer};
use crate::state::SharedState;
use crate::work_queue::{EventHandle, WorkKind};

pub fn wait_for_current_activity(state: &Arc<SharedState>, timer: &Timer) -> Result<()> {
    let event = Arc::new(EventHandle::new());
    let entry = state
        .pool
        .allocate(WorkKind::EventSet(Arc::clone(&event)))
        .map_err(|_| ErrorKind::InsufficientResources)?;

    {
        let mut inv = state.inventory.lock().unwrap();
        inv.other_work = true;
        let needs_fast_schedule = !inv.scan_active;
        // schedule_scan acquires the master lock itself, so release first.
        drop(inv);
        state.queue.post_tick(entry);
        if needs_fast_schedule {
            schedule_scan(state, timer, true);
        }
    }

    event.wait();
    Ok(())
}
