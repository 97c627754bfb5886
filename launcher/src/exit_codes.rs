//! Stable exit codes for the launcher CLI.

/// Phase completed, or the test is simply not yet authorized.
pub const OK: i32 = 0;
/// Fatal failure: corrupt record, record I/O error or tester failure.
pub const FATAL: i32 = 1;
