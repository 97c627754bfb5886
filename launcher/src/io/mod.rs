//! Side-effecting collaborators: record storage, git, HTTP, subprocesses.

pub mod download;
pub mod git;
pub mod paths;
pub mod record_store;
pub mod tester;
