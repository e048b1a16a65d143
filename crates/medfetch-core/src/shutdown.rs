//! Cooperative shutdown via atomic flag.
//!
//! Export loops check the flag between records/pages and finish partition
//! writes cleanly instead of truncating files mid-line.

use std::sync::atomic::{AtomicBool, Ordering};

/// Global shutdown flag, set by the SIGINT/SIGTERM handler
pub fn shutdown_flag() -> &'static AtomicBool {
    static FLAG: AtomicBool = AtomicBool::new(false);
    &FLAG
}

/// Check if shutdown was requested
pub fn is_shutdown_requested() -> bool {
    shutdown_flag().load(Ordering::Relaxed)
}
