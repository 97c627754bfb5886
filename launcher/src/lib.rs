//! CI launcher for recurring host-liveness test cycles.
//!
//! One process runs per CI tick and resumes whatever the administrative
//! record (`info.json`) says is in flight. The architecture enforces a
//! strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (record normalization,
//!   authorization, phase derivation). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (record storage, git, HTTP
//!   downloads, tester subprocess).
//!
//! Orchestration modules ([`orchestrate`], [`maintenance`]) coordinate core
//! logic with I/O to implement the three CLI phases: begin-or-continue,
//! checkpoint (save) and finalize (end).

pub mod config;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod maintenance;
pub mod orchestrate;
