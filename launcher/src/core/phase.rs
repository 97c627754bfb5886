//! Lifecycle phase derivation.
//!
//! The launcher never stores its state machine explicitly: a process dies
//! at the end of every CI invocation, so the phase is reconstructed from
//! the record's flags and sentinels each tick. This module makes that
//! derivation a single pure function so it can be logged and tested.

use crate::core::record::{is_epoch, Record};

/// Where a managed repository currently is in its test lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No cycle in progress.
    Idle,
    /// A cycle is in progress and its current part has not checkpointed.
    PartRunning,
    /// A cycle is in progress between parts (the last part checkpointed).
    PartSuspended,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::PartRunning => "part-running",
            Phase::PartSuspended => "part-suspended",
        };
        f.write_str(name)
    }
}

/// Derive the phase from the record's flags and epoch-zero sentinels.
pub fn derive_phase(record: &Record) -> Phase {
    if !record.currently_under_test {
        return Phase::Idle;
    }
    if is_epoch(record.latest_part_finish) {
        return Phase::PartRunning;
    }
    Phase::PartSuspended
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::{epoch, Record, RepoIdentity};
    use chrono::Utc;

    fn record() -> Record {
        let identity = RepoIdentity {
            owner: "example-org".to_string(),
            name: "hosts-list".to_string(),
        };
        Record::defaulted(Utc::now(), &identity)
    }

    #[test]
    fn idle_when_not_under_test() {
        let record = record();
        assert_eq!(derive_phase(&record), Phase::Idle);
    }

    #[test]
    fn part_running_while_finish_sentinel_is_epoch() {
        let mut record = record();
        record.currently_under_test = true;
        record.latest_part_finish = epoch();
        assert_eq!(derive_phase(&record), Phase::PartRunning);
    }

    #[test]
    fn part_suspended_after_checkpoint() {
        let mut record = record();
        record.currently_under_test = true;
        record.latest_part_finish = Utc::now();
        assert_eq!(derive_phase(&record), Phase::PartSuspended);
    }
}
