//! Work-queue entry pool and the express/regular/post-tick queue set (spec §3,
//! §4.3). Grounded on the teacher's `ticket_queue`/`events: SegQueue<WriterEvent>`
//! pattern in `doc_writer.rs`, but built on `Mutex<VecDeque<_>>` + `Condvar`
//! instead of a lock-free queue: §4.3 step 4 requires peeking the head and
//! conditionally popping it under a single critical section (the throttle
//! decision), which a lock-free MPMC queue cannot give atomically.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crate::error::{Result, ErrorKind};
use crate::stream::StreamHandle;

/// An event a barrier (`wait_for_current_activity`) waits on.
pub struct EventHandle {
    inner: Mutex<bool>,
    condvar: Condvar,
}

impl EventHandle {
    pub fn new() -> Self {
        EventHandle {
            inner: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    pub fn set(&self) {
        let mut signaled = self.inner.lock().unwrap();
        *signaled = true;
        self.condvar.notify_all();
    }

    pub fn wait(&self) {
        let mut signaled = self.inner.lock().unwrap();
        while !*signaled {
            signaled = self.condvar.wait(signaled).unwrap();
        }
    }
}

impl Default for EventHandle {
    fn default() -> Self {
        EventHandle::new()
    }
}

/// The tagged payload of a work-queue entry (spec §3).
pub enum WorkKind {
    ReadAhead(Arc<str>),
    WriteBehind(StreamHandle),
    EventSet(Arc<EventHandle>),
    LazyWriteScan,
}

impl WorkKind {
    fn is_event_set(&self) -> bool {
        matches!(self, WorkKind::EventSet(_))
    }
}

/// A tagged job record (spec §3). `requeue` is set by a worker that wants this
/// same entry reinserted at the tail of the queue it came from (§4.3 step 7).
pub struct WorkEntry {
    pub kind: WorkKind,
    pub(crate) requeue: bool,
}

/// Which lane an entry was drawn from / should be posted to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lane {
    Express,
    Regular,
}

/// Allocates and frees small tagged job records, with a bounded capacity so the
/// allocation-failure paths of §7 are reachable instead of theoretical (spec's
/// "work-queue entry pool", ~5% of the core).
pub struct EntryPool {
    capacity: usize,
    outstanding: AtomicUsize,
}

impl EntryPool {
    pub fn new(capacity: usize) -> Self {
        EntryPool {
            capacity,
            outstanding: AtomicUsize::new(0),
        }
    }

    pub fn allocate(&self, kind: WorkKind) -> Result<WorkEntry> {
        loop {
            let current = self.outstanding.load(Ordering::Acquire);
            if current >= self.capacity {
                return Err(ErrorKind::AllocationFailed("work-queue entry pool exhausted".into()).into());
            }
            if self
                .outstanding
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Ok(WorkEntry { kind, requeue: false });
            }
        }
    }

    pub fn free(&self, _entry: WorkEntry) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}

struct Inner {
    express: VecDeque<WorkEntry>,
    regular: VecDeque<WorkEntry>,
    post_tick: VecDeque<WorkEntry>,
    queue_throttle: bool,
    active_worker_count: u32,
}

/// Guards both priority lanes, the post-tick staging area, the throttle flag,
/// and `active_worker_count` — everything spec §5 assigns to the "work-queue
/// lock". Never held at the same time as the inventory's master lock.
pub struct WorkQueue {
    inner: Mutex<Inner>,
    condvar: Condvar,
    stopping: AtomicBool,
}

impl WorkQueue {
    pub fn new() -> Self {
        WorkQueue {
            inner: Mutex::new(Inner {
                express: VecDeque::new(),
                regular: VecDeque::new(),
                post_tick: VecDeque::new(),
                queue_throttle: false,
                active_worker_count: 0,
            }),
            condvar: Condvar::new(),
            stopping: AtomicBool::new(false),
        }
    }

    /// Wake every idle worker so it observes `stopping` and exits for good.
    /// Not part of spec §4.3 (the original has no shutdown path); purely for
    /// this crate's orderly teardown.
    pub fn shutdown(&self) {
        self.stopping.store(true, Ordering::Release);
        self.condvar.notify_all();
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// `post_work_queue`: tail-insert and, if not throttled, wake one idle worker
    /// (spec §4.3, "Worker wakeup... must tolerate racing re-entry" — `notify_one`
    /// is exactly that: harmless if no thread is waiting).
    pub fn post(&self, lane: Lane, entry: WorkEntry) {
        let mut inner = self.inner.lock().unwrap();
        match lane {
            Lane::Express => inner.express.push_back(entry),
            Lane::Regular => inner.regular.push_back(entry),
        }
        if !inner.queue_throttle {
            self.condvar.notify_one();
        }
    }

    /// Tail-insert into the post-tick staging area (spec §4.4 step 2).
    pub fn post_tick(&self, entry: WorkEntry) {
        let mut inner = self.inner.lock().unwrap();
        inner.post_tick.push_back(entry);
    }

    /// Atomically move every entry currently staged in `post_tick` out into a
    /// local list (spec §4.2 "Barrier drain"). This freezes the set of barriers
    /// that belong to *this* tick; anything posted to `post_tick` afterwards is
    /// left for the next one.
    pub fn drain_post_tick(&self) -> VecDeque<WorkEntry> {
        let mut inner = self.inner.lock().unwrap();
        std::mem::take(&mut inner.post_tick)
    }

    /// Tail-insert a previously drained batch into `regular` (spec §4.2
    /// end-of-iteration: "splice every entry of P into the tail of regular").
    pub fn splice_into_regular(&self, mut batch: VecDeque<WorkEntry>) {
        if batch.is_empty() {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        inner.regular.append(&mut batch);
        if !inner.queue_throttle {
            self.condvar.notify_one();
        }
    }

    /// One worker-loop iteration's pop (spec §4.3 steps 1-5). Blocks until an
    /// entry is available or the pool is told to stop. Returns `None` when the
    /// worker should exit its inner loop and go idle (both lanes empty).
    ///
    /// `clear_throttle_on_entry` implements step 1: "If previous iteration set
    /// `drop_throttle`, clear `queue_throttle`".
    pub fn pop_for_worker(&self, clear_throttle: bool) -> Option<(Lane, WorkEntry)> {
        let mut inner = self.inner.lock().unwrap();
        if clear_throttle {
            inner.queue_throttle = false;
        }

        let lane = Self::next_dispatchable_lane(&inner)?;

        {
            let head = match lane {
                Lane::Express => inner.express.front(),
                Lane::Regular => inner.regular.front(),
            }
            .expect("lane checked non-empty above");
            if head.kind.is_event_set() && inner.active_worker_count > 1 {
                inner.queue_throttle = true;
                return None;
            }
        }

        let entry = match lane {
            Lane::Express => inner.express.pop_front(),
            Lane::Regular => inner.regular.pop_front(),
        }
        .expect("lane checked non-empty above");
        Some((lane, entry))
    }

    /// Which lane a worker should look at next, or `None` if both are empty.
    /// Does not account for the `EventSet` throttle — callers that care (both
    /// `pop_for_worker` and `wait_for_work`) apply that check themselves,
    /// since only `pop_for_worker` may act on it (clearing/setting the flag).
    fn next_dispatchable_lane(inner: &Inner) -> Option<Lane> {
        if !inner.express.is_empty() {
            Some(Lane::Express)
        } else if !inner.regular.is_empty() {
            Some(Lane::Regular)
        } else {
            None
        }
    }

    /// True if a worker that asked right now would actually be handed an
    /// entry by `pop_for_worker` — i.e. some lane is non-empty *and* it isn't
    /// just a throttled `EventSet` sitting at the head with other workers
    /// still active. Used by `wait_for_work` so an idle worker genuinely
    /// sleeps instead of spinning on an entry it isn't allowed to pop yet.
    fn has_dispatchable_work(inner: &Inner) -> bool {
        match Self::next_dispatchable_lane(inner) {
            None => false,
            Some(lane) => {
                let head = match lane {
                    Lane::Express => inner.express.front(),
                    Lane::Regular => inner.regular.front(),
                }
                .expect("lane checked non-empty above");
                !(head.kind.is_event_set() && inner.active_worker_count > 1)
            }
        }
    }

    /// Reinsert an entry at the tail of the lane it was popped from (§4.3 step 7,
    /// `CC_REQUEUE`).
    pub fn requeue(&self, lane: Lane, mut entry: WorkEntry) {
        entry.requeue = false;
        let mut inner = self.inner.lock().unwrap();
        match lane {
            Lane::Express => inner.express.push_back(entry),
            Lane::Regular => inner.regular.push_back(entry),
        }
    }

    pub fn mark_worker_active(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.active_worker_count += 1;
    }

    pub fn mark_worker_idle(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.active_worker_count = inner.active_worker_count.saturating_sub(1);
    }

    pub fn active_worker_count(&self) -> u32 {
        self.inner.lock().unwrap().active_worker_count
    }

    /// Block until there is work a worker could actually pop, or the pool is
    /// shutting down. A lane that holds nothing but a throttled `EventSet`
    /// head does not count as work for this purpose — otherwise every worker
    /// above the one that will eventually win the race down to
    /// `active_worker_count == 1` would return immediately and busy-spin
    /// through `mark_worker_active`/`drain_loop`/`mark_worker_idle` instead of
    /// genuinely sleeping (spec §4.4/Scenario C's barrier path).
    /// Returns `false` when the caller should exit for good.
    pub fn wait_for_work(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        while !Self::has_dispatchable_work(&inner) {
            if self.is_stopping() {
                return false;
            }
            inner = self.condvar.wait(inner).unwrap();
        }
        !self.is_stopping()
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        WorkQueue::new()
    }
}
