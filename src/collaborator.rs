//! The boundary this crate consumes from the rest of the cache manager (spec §1, §6).
//!
//! Everything in this module is a trait: read-ahead, page I/O, the deferred-write
//! list, and the write-admission predicate are all owned by the surrounding cache
//! manager. The lazy writer only ever calls through these interfaces.

use std::sync::Arc;

use crate::stream::StreamHandle;

/// Outcome of a single `write_behind` call.
///
/// `Requeue` is the Rust rendering of the source's `io_status.information ==
/// CC_REQUEUE`: the collaborator made partial progress and wants the same work entry
/// put back on the tail of the queue it came from (§4.3 step 7 / §7).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteBehindOutcome {
    /// The flush completed; no further action needed for this dispatch.
    Done,
    /// The collaborator wants this entry re-queued and re-dispatched.
    Requeue,
    /// The flush failed outright (not a requeue). Suppresses the tail-of-worker
    /// rescan described in §4.3's last paragraph.
    Failed,
}

/// The external collaborators the lazy writer drives work through.
///
/// One instance is shared (`Arc`) by the scan and every worker thread. Implementors
/// are the page-cache / memory-manager / file-system layers; this crate only fixes
/// the shapes of the calls, never their bodies.
pub trait Collaborator: Send + Sync {
    /// Flush the dirty pages attributed to `stream` (its `pages_to_write` scratch
    /// field has already been set by the scan). Runs on a worker thread with the
    /// thread's allocator-privileged flag set (§4.3 step 6, §5).
    fn write_behind(&self, stream: &StreamHandle) -> crate::error::Result<WriteBehindOutcome>;

    /// Perform read-ahead for a file that requested it. Unrelated to dirty-page
    /// accounting; dispatched from the same worker pool (§4.3 step 6).
    fn perform_read_ahead(&self, file: Arc<str>) -> crate::error::Result<()>;

    /// Nudge the collaborator's deferred-write list. Must be safe to call
    /// redundantly (§4.6).
    fn post_deferred_writes(&self);

    /// True if the deferred-write list is currently non-empty (drives the
    /// quiescence test of §4.2 and the worker-pool tail rescan of §4.3).
    fn has_deferred_writes(&self) -> bool;

    /// The write-admission predicate consulted by the temp-file gate in §4.2 step 2.
    /// Returns `false` when back-pressure is present (we could not admit a charged
    /// write right now), which is precisely the condition under which the gate
    /// says to flush anyway.
    fn can_i_write(&self, stream: &StreamHandle, threshold: u64) -> bool;
}
