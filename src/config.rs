use std::time::Duration;

/// Tunables for a `LazyWriter`, named after the constants fixed by spec §6.
///
/// A `LazyWriterConfig` is shared (`Arc`) by the scheduler, the scan, and the worker
/// pool; none of these components hardcode a constant the way the original source did.
#[derive(Clone, Debug)]
pub struct LazyWriterConfig {
    /// Delay used the first time a scan is armed after a period of total quiescence,
    /// giving a foreground application time to finish a save burst before we start
    /// competing for I/O.
    pub first_delay: Duration,
    /// Delay used to reschedule a scan that found nothing urgent to do but the writer
    /// is still considered active (`scan_active`).
    pub idle_delay: Duration,
    /// Zero delay used for `fast` scheduling.
    pub no_delay: Duration,
    /// Steady-state target for `total_dirty_pages`; the scan adds to its per-tick
    /// budget when the foreground dirtying rate threatens to exceed it.
    pub dirty_page_target: u64,
    /// Threshold above which a modified-write-disabled (metadata) stream is treated
    /// as an oversized backlog and force-flushed.
    pub max_write_behind_pages: u64,
    /// Below this total dirty-page count the system is considered "small"; §4.2
    /// step 2's pass gate is bypassed on small systems.
    pub small_system_threshold: u64,
    /// Mask applied to `lazy_write_pass_count`; a stream is visited on every tick
    /// where `(pass_count & mask) == 0`.
    pub pass_count_mask: u32,
    /// Number of consecutive inspected-but-not-dispatched streams after which the
    /// scan releases and re-acquires the master lock as a courtesy to contenders.
    pub lock_courtesy: u32,
    /// Divisor used to convert `total_dirty_pages` into a per-tick budget
    /// ("flush 1/N per tick").
    pub age_target: u64,
    /// Divisor applied to an oversized metadata stream's backlog so it releases in
    /// fractions rather than all at once.
    pub metadata_divisor: u64,
    /// `total_dirty_pages` threshold above which a worker that just completed a
    /// successful write kicks off a synchronous rescan on its way to idle.
    pub rescan_threshold_pages: u64,
    /// Number of worker threads in the pool.
    pub worker_count: usize,
    /// Capacity of the work-queue entry pool. Not named by spec §6's tunable list,
    /// but needed to give the "allocation failure" paths of §7 something to
    /// actually trigger in a hosted, GC-free Rust implementation.
    pub entry_pool_capacity: usize,
}

impl Default for LazyWriterConfig {
    fn default() -> Self {
        LazyWriterConfig {
            first_delay: Duration::from_secs(4),
            idle_delay: Duration::from_secs(1),
            no_delay: Duration::from_secs(0),
            dirty_page_target: 1000,
            max_write_behind_pages: 128,
            small_system_threshold: 256,
            pass_count_mask: 0xF,
            lock_courtesy: 20,
            age_target: 8,
            metadata_divisor: 8,
            rescan_threshold_pages: 20,
            worker_count: num_cpus::get().max(2),
            entry_pool_capacity: 4096,
        }
    }
}
