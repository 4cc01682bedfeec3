//! The dirty-stream inventory: a circular doubly linked list with an embedded
//! cursor sentinel (spec §3, §4.5, Design Notes §9).
//!
//! The original source threads this list through the stream descriptors
//! themselves (intrusive `Flink`/`Blink` pointers). Design Notes §9 explicitly
//! allows "an arena-and-indices variant"; we take that option, since it gives the
//! same "cursor survives concurrent removal of its neighbors, movable without
//! allocation" property without `unsafe` pointer juggling. Slots are indices into
//! a `Vec`; a freed slot is recycled via `free_slots` the way an intrusive list
//! would recycle the descriptor itself.

use bitflags::bitflags;

bitflags! {
    /// Bit set over a stream descriptor's state (spec §3).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct StreamFlags: u32 {
        /// Set while some worker or the scan itself logically owns the stream for
        /// a flush; also a "do not reclaim" marker. Mutex-like: invariant is that
        /// at most one actor ever holds it for a given stream (spec Invariant 3).
        const WRITE_QUEUED             = 0b0000_0001;
        /// Metadata-style stream that must be flushed with exclusive access.
        const MODIFIED_WRITE_DISABLED  = 0b0000_0010;
        /// Stream is waiting for teardown; flushes for it go to the express queue.
        const WAITING_FOR_TEARDOWN     = 0b0000_0100;
        /// Marks the cursor sentinel. Never set on a real stream.
        const IS_CURSOR                = 0b0000_1000;
        /// Backed by a temporary file (affects the temp-file gate of §4.2 step 2).
        const TEMPORARY_FILE           = 0b0001_0000;
    }
}

/// One cached file stream that has ever been dirty (spec §3).
#[derive(Debug, Clone)]
pub struct StreamDescriptor {
    pub dirty_pages: u64,
    pub pages_to_write: u64,
    pub flags: StreamFlags,
    pub open_count: u32,
    pub file_size: u64,
    pub lazy_write_pass_count: u32,
}

impl StreamDescriptor {
    pub fn new() -> Self {
        StreamDescriptor {
            dirty_pages: 0,
            pages_to_write: 0,
            flags: StreamFlags::empty(),
            open_count: 1,
            file_size: 0,
            lazy_write_pass_count: 0,
        }
    }

    fn cursor() -> Self {
        StreamDescriptor {
            dirty_pages: 0,
            pages_to_write: 0,
            flags: StreamFlags::IS_CURSOR,
            open_count: 0,
            file_size: 0,
            lazy_write_pass_count: 0,
        }
    }
}

impl Default for StreamDescriptor {
    fn default() -> Self {
        StreamDescriptor::new()
    }
}

/// Opaque identity of a stream in the inventory. Stable across list splices;
/// invalidated only by `Inventory::remove`.
pub type StreamId = usize;

/// A lightweight, by-value reference to a stream handed to a `WriteBehind` job.
/// Carries the `pages_to_write` value the scan computed, since the worker thread
/// that eventually calls `Collaborator::write_behind` should not need to
/// re-acquire the master lock just to read a scratch field the scan already
/// decided (spec §3: "`pages_to_write`: ... read by the flush worker").
#[derive(Clone, Copy, Debug)]
pub struct StreamHandle {
    pub id: StreamId,
    pub pages_to_write: u64,
}

struct Node {
    desc: StreamDescriptor,
    prev: StreamId,
    next: StreamId,
    /// `false` once removed; the slot is then eligible for recycling.
    live: bool,
}

const CURSOR_ID: StreamId = 0;

/// The dirty-stream inventory: cursor-anchored circular list plus the handful of
/// global scalars the scan reads and updates under the same lock (spec §3/§5:
/// everything the *master lock* owns, i.e. not the work-queue's own scalars).
pub struct Inventory {
    nodes: Vec<Node>,
    free_slots: Vec<StreamId>,

    pub total_dirty_pages: u64,
    pub dirty_page_target: u64,
    pub pages_written_last_time: u64,
    pub dirty_pages_last_scan: u64,
    pub pages_yet_to_write: u64,
    pub scan_active: bool,
    pub other_work: bool,
}

impl Inventory {
    pub fn new(dirty_page_target: u64) -> Self {
        let cursor = Node {
            desc: StreamDescriptor::cursor(),
            prev: CURSOR_ID,
            next: CURSOR_ID,
            live: true,
        };
        Inventory {
            nodes: vec![cursor],
            free_slots: Vec::new(),
            total_dirty_pages: 0,
            dirty_page_target,
            pages_written_last_time: 0,
            dirty_pages_last_scan: 0,
            pages_yet_to_write: 0,
            scan_active: false,
            other_work: false,
        }
    }

    pub fn cursor_id(&self) -> StreamId {
        CURSOR_ID
    }

    /// Insert a stream immediately before the cursor (spec Invariant 1 governs
    /// *when* a caller should do this; the inventory itself just performs the
    /// splice).
    pub fn insert(&mut self, desc: StreamDescriptor) -> StreamId {
        let id = if let Some(slot) = self.free_slots.pop() {
            self.nodes[slot] = Node {
                desc,
                prev: CURSOR_ID,
                next: CURSOR_ID,
                live: true,
            };
            slot
        } else {
            self.nodes.push(Node {
                desc,
                prev: CURSOR_ID,
                next: CURSOR_ID,
                live: true,
            });
            self.nodes.len() - 1
        };
        self.link_before(id, CURSOR_ID);
        id
    }

    /// Remove a stream from the list. The cursor itself can never be removed
    /// (spec Invariant 2).
    pub fn remove(&mut self, id: StreamId) {
        assert_ne!(id, CURSOR_ID, "the cursor sentinel is never removed");
        if !self.nodes[id].live {
            return;
        }
        self.unlink(id);
        self.nodes[id].live = false;
        self.free_slots.push(id);
    }

    pub fn get(&self, id: StreamId) -> &StreamDescriptor {
        &self.nodes[id].desc
    }

    pub fn get_mut(&mut self, id: StreamId) -> &mut StreamDescriptor {
        &mut self.nodes[id].desc
    }

    pub fn successor(&self, id: StreamId) -> StreamId {
        self.nodes[id].next
    }

    pub fn predecessor(&self, id: StreamId) -> StreamId {
        self.nodes[id].prev
    }

    /// Splice the cursor so that it sits immediately before `id`: the next scan
    /// resumes on `id` itself. Used for the "normal large sequential writer"
    /// cursor-movement branch of §4.2 step 4.
    pub fn move_cursor_before(&mut self, id: StreamId) {
        if id == CURSOR_ID {
            return;
        }
        self.unlink(CURSOR_ID);
        self.link_before(CURSOR_ID, id);
    }

    /// Splice the cursor so that it sits immediately after `id`: the next scan
    /// resumes on `id`'s successor. Used for the "move-behind-cursor" branch.
    pub fn move_cursor_after(&mut self, id: StreamId) {
        if id == CURSOR_ID {
            return;
        }
        self.unlink(CURSOR_ID);
        // Look up the successor only after unlinking the cursor: if the cursor
        // was already sitting immediately after `id`, `id`'s successor was the
        // cursor itself until this unlink ran.
        let after = self.nodes[id].next;
        self.link_before(CURSOR_ID, after);
    }

    fn link_before(&mut self, id: StreamId, anchor: StreamId) {
        let prev = self.nodes[anchor].prev;
        self.nodes[id].prev = prev;
        self.nodes[id].next = anchor;
        self.nodes[prev].next = id;
        self.nodes[anchor].prev = id;
    }

    fn unlink(&mut self, id: StreamId) {
        let prev = self.nodes[id].prev;
        let next = self.nodes[id].next;
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
    }

    /// True if the inventory holds nothing but the cursor.
    pub fn is_empty(&self) -> bool {
        self.nodes[CURSOR_ID].next == CURSOR_ID
    }

    /// Whether `id` still refers to a node in the list. Used by the scan's
    /// traversal as the "safety stop if the start node was freed" guard (spec
    /// §4.2).
    pub fn is_live(&self, id: StreamId) -> bool {
        self.nodes.get(id).map(|n| n.live).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_survives_insert_and_remove() {
        let mut inv = Inventory::new(1000);
        let a = inv.insert(StreamDescriptor::new());
        let b = inv.insert(StreamDescriptor::new());
        assert_eq!(inv.successor(inv.cursor_id()), a);
        assert_eq!(inv.successor(a), b);
        assert_eq!(inv.successor(b), inv.cursor_id());

        inv.remove(a);
        assert_eq!(inv.successor(inv.cursor_id()), b);
        assert_eq!(inv.get(inv.cursor_id()).flags, StreamFlags::IS_CURSOR);
    }

    #[test]
    fn cursor_move_before_and_after() {
        let mut inv = Inventory::new(1000);
        let a = inv.insert(StreamDescriptor::new());
        let b = inv.insert(StreamDescriptor::new());

        inv.move_cursor_before(b);
        assert_eq!(inv.successor(inv.cursor_id()), b);
        assert_eq!(inv.predecessor(inv.cursor_id()), a);

        inv.move_cursor_after(a);
        assert_eq!(inv.predecessor(inv.cursor_id()), a);
        assert_eq!(inv.successor(inv.cursor_id()), b);
    }

    #[test]
    fn recycled_slot_relinks_cleanly() {
        let mut inv = Inventory::new(1000);
        let a = inv.insert(StreamDescriptor::new());
        inv.remove(a);
        let b = inv.insert(StreamDescriptor::new());
        assert_eq!(inv.successor(inv.cursor_id()), b);
        assert_eq!(inv.successor(b), inv.cursor_id());
    }
}
