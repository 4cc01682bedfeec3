error_chain! {
    errors {
        /// Allocating a work-queue entry (or an event for a barrier) failed.
        AllocationFailed(what: String) {
            description("work-queue entry allocation failed")
            display("work-queue entry allocation failed: {}", what)
        }
        /// Returned to a caller of `wait_for_current_lazy_writer_activity` when the
        /// barrier's event entry could not be allocated.
        InsufficientResources {
            description("insufficient resources to service request")
            display("insufficient resources to service request")
        }
        /// An exception the scan or a worker dispatch could not classify as expected.
        /// Per spec §4.2/§7 this is a bug-check: callers must abort the process rather
        /// than attempt recovery.
        Fatal(what: String) {
            description("unexpected fatal error in lazy writer")
            display("unexpected fatal error in lazy writer: {}", what)
        }
    }

    foreign_links {
        Io(::std::io::Error);
    }
}
