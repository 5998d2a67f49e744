//! Stable exit codes for the `casa` binary.

/// The session quit normally (or the command succeeded).
pub const OK: i32 = 0;
/// Invalid config, I/O failure or other error.
pub const FAILED: i32 = 1;
/// Input ended while a dialog, confirmation or unsaved work was still pending.
pub const INTERRUPTED: i32 = 2;
