//! Scan scheduler: timer plus one-shot dispatcher that admits exactly one scan
//! at a time (spec §4.1).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::state::SharedState;
use crate::work_queue::{Lane, WorkKind};

struct TimerInner {
    /// `None` means disarmed (waiting for an external wakeup).
    deadline: Option<Instant>,
}

/// Stands in for spec §6's "timer facility with `arm(dpc, delay)`, a DPC that
/// runs at elevated priority": a dedicated background thread that sleeps until
/// the nearest armed deadline, then runs `scan_timer_fires` itself. Real OS
/// timer callbacks don't block; this thread doesn't either, beyond posting a
/// `LazyWriteScan` job.
pub struct Timer {
    inner: Mutex<TimerInner>,
    condvar: Condvar,
    stopping: AtomicBool,
}

impl Timer {
    pub fn start(state: Arc<SharedState>) -> Arc<Self> {
        let timer = Arc::new(Timer {
            inner: Mutex::new(TimerInner { deadline: None }),
            condvar: Condvar::new(),
            stopping: AtomicBool::new(false),
        });

        let timer_loop = Arc::clone(&timer);
        thread::Builder::new()
            .name("lazy-writer-timer".into())
            .spawn(move || timer_loop.run(state))
            .expect("failed to spawn lazy-writer timer thread");

        timer
    }

    fn run(&self, state: Arc<SharedState>) {
        loop {
            if self.stopping.load(Ordering::Acquire) {
                return;
            }
            let mut guard = self.inner.lock().unwrap();
            match guard.deadline {
                None => {
                    guard = self.condvar.wait(guard).unwrap();
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        guard.deadline = None;
                        drop(guard);
                        scan_timer_fires(&state, self);
                        continue;
                    }
                    let (g, _timeout) =
                        self.condvar.wait_timeout(guard, deadline - now).unwrap();
                    guard = g;
                }
            }
            drop(guard);
        }
    }

    /// Arm the timer for `delay` from now. If a nearer deadline is already
    /// pending, it is kept (re-arming never pushes a scan further out than an
    /// already-promised one).
    fn arm(&self, delay: Duration) {
        let mut guard = self.inner.lock().unwrap();
        let requested = Instant::now() + delay;
        guard.deadline = Some(match guard.deadline {
            Some(existing) if existing < requested => existing,
            _ => requested,
        });
        self.condvar.notify_one();
    }

    pub fn stop(&self) {
        self.stopping.store(true, Ordering::Release);
        self.condvar.notify_one();
    }
}

/// `schedule_scan(fast)`: idempotent with respect to an already-armed timer in
/// the non-fast path (spec §4.1). Acquires the master lock itself so both the
/// scan thread (propagating to itself, after having released the lock) and
/// external callers can use the same entry point.
pub fn schedule_scan(state: &Arc<SharedState>, timer: &Timer, fast: bool) {
    let mut inv = state.inventory.lock().unwrap();
    if fast {
        inv.scan_active = true;
        drop(inv);
        timer.arm(state.config.no_delay);
    } else if inv.scan_active {
        drop(inv);
        timer.arm(state.config.idle_delay);
    } else {
        inv.scan_active = true;
        drop(inv);
        timer.arm(state.config.first_delay);
    }
}

/// The timer's DPC: posts exactly one `LazyWriteScan` job. If the entry pool is
/// exhausted, `scan_active` is cleared so the next external wakeup re-arms
/// (spec §4.1, §7).
pub fn scan_timer_fires(state: &Arc<SharedState>, _timer: &Timer) {
    match state.pool.allocate(WorkKind::LazyWriteScan) {
        Ok(entry) => {
            state.queue.post(Lane::Regular, entry);
        }
        Err(e) => {
            warn!("lazy writer: failed to allocate scan job, backing off: {}", e);
            state.inventory.lock().unwrap().scan_active = false;
        }
    }
    debug!("lazy writer: scan timer fired");
}
