//! The lazy-writer scan: the body of one tick (spec §4.2). Run by a worker
//! thread; `scan_active` plus single-job posting guarantee it is never
//! re-entered concurrently.

use std::sync::{Arc, MutexGuard};

use log::{debug, trace};

use crate::error::Result;
use crate::scheduler::{schedule_scan, Timer};
use crate::state::SharedState;
use crate::stream::{Inventory, StreamDescriptor, StreamFlags, StreamHandle, StreamId};
use crate::work_queue::{Lane, WorkKind};

/// Runs one tick. The `Result` this returns is this crate's rendering of spec
/// §4.2/§7's "catch-all filter": errors that reach the worker pool here are
/// escalated to a process abort, never silently swallowed (see
/// `worker_pool.rs`).
pub fn run_scan(state: &Arc<SharedState>, timer: &Timer) -> Result<()> {
    // Quiescence test (spec §4.2, first paragraph): one critical section,
    // master lock held throughout, so a concurrent `adjust_dirty_pages` can't
    // raise `total_dirty_pages` between the read and the `scan_active = false`
    // write and have that write silently clobber the fresh state.
    let mut inv = state.inventory.lock().unwrap();
    if inv.total_dirty_pages == 0 && !inv.other_work {
        if !state.collaborator.has_deferred_writes() {
            inv.scan_active = false;
            debug!("lazy writer: scan quiescent, stopping");
            return Ok(());
        }
        drop(inv);
        state.collaborator.post_deferred_writes();
        schedule_scan(state, timer, false);
        debug!("lazy writer: scan quiescent but deferred writes pending, rescheduling");
        return Ok(());
    }
    drop(inv);

    // Barrier drain: freeze the set of post-tick entries that belong to this tick.
    let drained_barriers = state.queue.drain_post_tick();

    let mut inv = state.inventory.lock().unwrap();

    // Budget computation, entirely over the snapshot taken under the master lock.
    let total_dirty_pages = inv.total_dirty_pages;
    let age_target = state.config.age_target.max(1);
    let mut pages_to_write = total_dirty_pages;
    if pages_to_write > age_target {
        pages_to_write /= age_target;
    }
    let foreground_rate = (total_dirty_pages + inv.pages_written_last_time)
        .saturating_sub(inv.dirty_pages_last_scan);
    let estimated_next = total_dirty_pages
        .saturating_sub(pages_to_write)
        .saturating_add(foreground_rate);
    if estimated_next > inv.dirty_page_target {
        pages_to_write += estimated_next - inv.dirty_page_target;
    }
    inv.dirty_pages_last_scan = total_dirty_pages;
    inv.pages_written_last_time = pages_to_write;
    inv.pages_yet_to_write = pages_to_write;
    inv.other_work = false;

    trace!(
        "lazy writer: tick budget pages_to_write={} foreground_rate={}",
        pages_to_write, foreground_rate
    );

    inv = iterate_and_dispatch(state, inv, pages_to_write);

    // End of iteration: splice the frozen barrier batch into regular's tail.
    drop(inv);
    state.queue.splice_into_regular(drained_barriers);

    if state.collaborator.has_deferred_writes() {
        state.collaborator.post_deferred_writes();
    }
    schedule_scan(state, timer, false);
    Ok(())
}

fn iterate_and_dispatch<'a>(
    state: &'a Arc<SharedState>,
    mut inv: MutexGuard<'a, Inventory>,
    mut pages_to_write: u64,
) -> MutexGuard<'a, Inventory> {
    let cursor = inv.cursor_id();
    let start = inv.successor(cursor);
    if start == cursor {
        return inv; // empty inventory
    }

    let cfg = &state.config;
    let is_small_system = inv.total_dirty_pages <= cfg.small_system_threshold;

    let mut current = start;
    let mut first_visited: Option<StreamId> = None;
    let mut already_moved = false;
    let mut skipped_without_dispatch: u32 = 0;

    loop {
        if current == cursor || !inv.is_live(current) {
            break;
        }

        let next = inv.successor(current);
        let desc_flags = inv.get(current).flags;
        let mut acted = false;

        if !desc_flags.contains(StreamFlags::WRITE_QUEUED) && !desc_flags.contains(StreamFlags::IS_CURSOR)
        {
            if first_visited.is_none() {
                first_visited = Some(current);
            }

            let (eligible, pass_gate_hit) =
                is_eligible(state, current, inv.get_mut(current), pages_to_write, is_small_system);

            if eligible {
                let desc = inv.get_mut(current);
                desc.pages_to_write = desc.dirty_pages;
                let oversized = desc.dirty_pages >= 4 * cfg.max_write_behind_pages;
                if desc.flags.contains(StreamFlags::MODIFIED_WRITE_DISABLED)
                    && oversized
                    && !is_small_system
                {
                    desc.pages_to_write /= cfg.metadata_divisor.max(1);
                }

                if !already_moved {
                    let desc_pages_to_write = inv.get(current).pages_to_write;
                    if desc_pages_to_write >= pages_to_write {
                        let is_mwd = inv
                            .get(current)
                            .flags
                            .contains(StreamFlags::MODIFIED_WRITE_DISABLED);
                        let is_first_on_pass = first_visited == Some(current) && pass_gate_hit;
                        if is_mwd || is_first_on_pass {
                            inv.move_cursor_after(current);
                        } else {
                            inv.move_cursor_before(current);
                        }
                        pages_to_write = 0;
                        already_moved = true;
                    } else {
                        pages_to_write -= desc_pages_to_write;
                    }
                }

                let (new_inv, dispatched) = dispatch_stream(state, inv, current);
                inv = new_inv;
                acted = dispatched;

                if !dispatched {
                    // Allocation failed: roll back already happened inside
                    // dispatch_stream. Stop iterating this tick entirely.
                    break;
                }
            }
        }

        if acted {
            skipped_without_dispatch = 0;
        } else {
            skipped_without_dispatch += 1;
            let flags = inv.get(current).flags;
            if skipped_without_dispatch >= cfg.lock_courtesy
                && !flags.contains(StreamFlags::WRITE_QUEUED)
                && !flags.contains(StreamFlags::IS_CURSOR)
            {
                inv = lock_courtesy_yield(state, inv, current);
                skipped_without_dispatch = 0;
            }
        }

        current = next;
        if current == start {
            break;
        }
    }

    inv
}

/// Spec §4.2 step 2's eligibility predicate, plus whether the pass-count gate
/// specifically was the clause that fired (needed by the cursor-movement
/// decision in step 4).
fn is_eligible(
    state: &Arc<SharedState>,
    id: StreamId,
    desc: &mut StreamDescriptor,
    pages_to_write_budget: u64,
    is_small_system: bool,
) -> (bool, bool) {
    let cfg = &state.config;

    // Third clause: pure lazy close. Fourth clause: zero-size reclaim. Spec's
    // Open Question on precedence is resolved explicitly per the original's
    // parse: `(open_count == 0 && dirty_pages == 0) || file_size == 0`.
    if (desc.open_count == 0 && desc.dirty_pages == 0) || desc.file_size == 0 {
        return (true, false);
    }

    if desc.dirty_pages > 0 && desc.flags.contains(StreamFlags::WAITING_FOR_TEARDOWN) {
        return (true, false);
    }

    if desc.dirty_pages == 0 || pages_to_write_budget == 0 {
        return (false, false);
    }

    desc.lazy_write_pass_count = desc.lazy_write_pass_count.wrapping_add(1);
    let pass_gate = (desc.lazy_write_pass_count & cfg.pass_count_mask) == 0;
    let oversized = desc.dirty_pages >= 4 * cfg.max_write_behind_pages;
    let runs_every_tick = !desc.flags.contains(StreamFlags::MODIFIED_WRITE_DISABLED);

    let frequency_gate = pass_gate || runs_every_tick || is_small_system || oversized;
    if !frequency_gate {
        return (false, pass_gate);
    }

    let is_temp = desc.flags.contains(StreamFlags::TEMPORARY_FILE);
    let temp_gate = if !is_temp || desc.open_count == 0 {
        true
    } else {
        // Back-pressure present (can_i_write says no) means flush anyway.
        let handle = StreamHandle {
            id,
            pages_to_write: desc.dirty_pages,
        };
        !state
            .collaborator
            .can_i_write(&handle, cfg.max_write_behind_pages)
    };

    (temp_gate, pass_gate)
}

/// Spec §4.2 step 5: pin, release the master lock, allocate a job, dispatch it
/// or roll back on allocation failure. Returns the reacquired guard and
/// whether the dispatch succeeded.
fn dispatch_stream<'a>(
    state: &'a Arc<SharedState>,
    mut inv: MutexGuard<'a, Inventory>,
    id: StreamId,
) -> (MutexGuard<'a, Inventory>, bool) {
    let desc = inv.get_mut(id);
    desc.flags.insert(StreamFlags::WRITE_QUEUED);
    desc.dirty_pages += 1;
    let pages_to_write = desc.pages_to_write;
    let waiting_for_teardown = desc.flags.contains(StreamFlags::WAITING_FOR_TEARDOWN);

    drop(inv);
    let allocation = state.pool.allocate(WorkKind::WriteBehind(StreamHandle {
        id,
        pages_to_write,
    }));
    let mut inv = state.inventory.lock().unwrap();

    match allocation {
        Ok(entry) => {
            let desc = inv.get_mut(id);
            desc.dirty_pages -= 1;
            let lane = if waiting_for_teardown {
                Lane::Express
            } else {
                Lane::Regular
            };
            drop(inv);
            state.queue.post(lane, entry);
            (state.inventory.lock().unwrap(), true)
        }
        Err(_) => {
            let desc = inv.get_mut(id);
            desc.flags.remove(StreamFlags::WRITE_QUEUED);
            desc.dirty_pages -= 1;
            (inv, false)
        }
    }
}

/// Spec §4.2 step 6: pin/release/re-acquire/unpin, giving other master-lock
/// contenders a window without doing any real work.
fn lock_courtesy_yield<'a>(
    state: &'a Arc<SharedState>,
    mut inv: MutexGuard<'a, Inventory>,
    id: StreamId,
) -> MutexGuard<'a, Inventory> {
    let desc = inv.get_mut(id);
    desc.flags.insert(StreamFlags::WRITE_QUEUED);
    desc.dirty_pages += 1;
    drop(inv);

    inv = state.inventory.lock().unwrap();

    let desc = inv.get_mut(id);
    desc.flags.remove(StreamFlags::WRITE_QUEUED);
    desc.dirty_pages -= 1;
    inv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc_with(dirty_pages: u64, open_count: u32, file_size: u64) -> StreamDescriptor {
        let mut desc = StreamDescriptor::new();
        desc.dirty_pages = dirty_pages;
        desc.open_count = open_count;
        desc.file_size = file_size;
        desc
    }

    fn state_with_target(target: u64) -> Arc<SharedState> {
        use crate::collaborator::{Collaborator, WriteBehindOutcome};
        use crate::config::LazyWriterConfig;

        struct NullCollaborator;
        impl Collaborator for NullCollaborator {
            fn write_behind(&self, _stream: &StreamHandle) -> Result<WriteBehindOutcome> {
                Ok(WriteBehindOutcome::Done)
            }
            fn perform_read_ahead(&self, _file: Arc<str>) -> Result<()> {
                Ok(())
            }
            fn post_deferred_writes(&self) {}
            fn has_deferred_writes(&self) -> bool {
                false
            }
            fn can_i_write(&self, _stream: &StreamHandle, _threshold: u64) -> bool {
                true
            }
        }

        let mut cfg = LazyWriterConfig::default();
        cfg.max_write_behind_pages = target;
        SharedState::new(cfg, Arc::new(NullCollaborator))
    }

    // Open Question: cursor-movement budget arithmetic must saturate rather
    // than underflow when a single stream's own backlog exceeds the tick's
    // entire write budget.
    #[test]
    fn budget_saturates_when_stream_exceeds_budget() {
        let mut pages_to_write: u64 = 5;
        let desc_pages_to_write: u64 = 100;
        if desc_pages_to_write >= pages_to_write {
            pages_to_write = 0;
        } else {
            pages_to_write -= desc_pages_to_write;
        }
        assert_eq!(pages_to_write, 0);
    }

    #[test]
    fn eligible_lazy_close_zero_open_and_dirty() {
        let state = state_with_target(64);
        let mut desc = desc_with(0, 0, 4096);
        let (eligible, _) = is_eligible(&state, 1, &mut desc, 10, false);
        assert!(eligible);
    }

    #[test]
    fn eligible_zero_size_even_with_open_handles_and_dirty_pages() {
        let state = state_with_target(64);
        let mut desc = desc_with(50, 3, 0);
        let (eligible, _) = is_eligible(&state, 1, &mut desc, 10, false);
        assert!(eligible);
    }

    #[test]
    fn not_eligible_open_and_dirty_and_nonzero_size() {
        let state = state_with_target(64);
        let mut desc = desc_with(50, 3, 4096);
        desc.flags.remove(StreamFlags::MODIFIED_WRITE_DISABLED);
        let (eligible, _) = is_eligible(&state, 1, &mut desc, 0, false);
        assert!(!eligible);
    }

    #[test]
    fn eligible_waiting_for_teardown_regardless_of_budget() {
        let state = state_with_target(64);
        let mut desc = desc_with(10, 2, 4096);
        desc.flags.insert(StreamFlags::WAITING_FOR_TEARDOWN);
        let (eligible, _) = is_eligible(&state, 1, &mut desc, 0, false);
        assert!(eligible);
    }
}
