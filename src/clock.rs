//! Purpose: Hold the process-wide local UTC offset used by the time snippets.
//! Exports: `init_local_offset`, `local_offset`.
//! Invariants: `init_local_offset` runs before any other thread is spawned;
//! the first captured value wins.
//! Invariants: `local_offset` is UTC when no offset was captured.
use std::sync::OnceLock;

use time::UtcOffset;

static LOCAL_OFFSET: OnceLock<UtcOffset> = OnceLock::new();

/// Capture the local offset. Only reliable while the process is single-threaded.
pub fn init_local_offset() -> UtcOffset {
    *LOCAL_OFFSET.get_or_init(|| UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC))
}

pub fn local_offset() -> UtcOffset {
    LOCAL_OFFSET.get().copied().unwrap_or(UtcOffset::UTC)
}
