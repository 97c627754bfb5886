//! The run-state machine: begin-or-continue, checkpoint, finalize.
//!
//! Each CI invocation executes exactly one of these phases and exits. The
//! machine's state lives entirely in the administrative record; every
//! mutation sequence persists the record *before* the long-running external
//! call it announces, so a kill at any point leaves a consistent, resumable
//! state on disk.

use std::collections::BTreeSet;
use std::fs;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{info, warn};

use crate::config::EnvConfig;
use crate::core::authorization::{
    is_refresh_authorized, is_test_authorized, launch_requested, next_authorized_at,
};
use crate::core::phase::derive_phase;
use crate::core::record::{epoch, to_second};
use crate::io::download::fetch_to_file;
use crate::io::git::Vcs;
use crate::io::paths::WorkspacePaths;
use crate::io::record_store::RecordStore;
use crate::io::tester::{TestRequest, Tester};
use crate::maintenance::{run_maintenance, MaintenanceContext, SyncStep};

/// Placeholder input written when neither an upstream link nor a local
/// copy of the list exists.
const EMPTY_INPUT_PLACEHOLDER: &str = "# No content yet.\n";

/// Result of a begin-or-continue invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginOutcome {
    /// Cooldown still running; nothing was mutated. A normal exit, not an
    /// error.
    NotAuthorized {
        next_authorized_at: DateTime<Utc>,
    },
    /// A part ran to completion.
    Ran {
        /// True when the cycle was finalized in the same invocation
        /// (single-shot mode, no CI credential to resume with).
        finalized: bool,
    },
}

/// Begin a new test cycle or continue an in-progress one.
pub fn begin_or_continue<V: Vcs, T: Tester>(
    config: &EnvConfig,
    paths: &WorkspacePaths,
    vcs: &V,
    tester: &T,
    steps: &[Box<dyn SyncStep>],
) -> Result<BeginOutcome> {
    let now = to_second(Utc::now());
    let identity = vcs.identity()?;
    let mut store = RecordStore::load(&paths.record_path, now, &identity)?;
    let launch = launch_override(vcs);

    info!(phase = %derive_phase(store.record()), repo = %store.record().repo, "loaded record");

    if !is_test_authorized(store.record(), now, launch) {
        let next = next_authorized_at(store.record());
        info!(
            next_authorized_at = %next.to_rfc3339_opts(SecondsFormat::Secs, true),
            "not authorized to test yet"
        );
        return Ok(BeginOutcome::NotAuthorized {
            next_authorized_at: next,
        });
    }

    // Maintenance runs before any record mutation for the new cycle, so a
    // sync failure cannot leave scheduling state inconsistent.
    run_maintenance(
        steps,
        &MaintenanceContext {
            config,
            paths,
            record: store.record(),
        },
    );

    if is_refresh_authorized(store.record(), launch) {
        refresh_input(paths, &mut store, now)?;
    }

    {
        let record = store.record_mut();
        if !record.currently_under_test {
            // Brand-new cycle: stamp the start and clear the previous
            // cycle's finish so the sentinel marks us as in progress.
            record.currently_under_test = true;
            record.start = now;
            record.finish = epoch();
            info!("starting a new test cycle");
        } else {
            info!("continuing the in-progress test cycle");
        }
        record.latest_part_start = now;
        record.latest_part_finish = epoch();
    }
    store.persist()?;

    tester.run(&TestRequest {
        workdir: paths.root.clone(),
        input_path: paths.input_path.clone(),
    })?;

    if !config.can_resume() {
        // Single-shot mode: no credential means no later invocation can
        // pick the cycle up, so never leave a dangling in-progress record.
        info!("no CI credential configured, finalizing immediately");
        finalize_record(&mut store, paths, to_second(Utc::now()))?;
        return Ok(BeginOutcome::Ran { finalized: true });
    }

    Ok(BeginOutcome::Ran { finalized: false })
}

/// Mark the running part as saved ("to be continued").
///
/// Called by the tester's own mid-run hook; only the part-finish marker
/// moves, so a kill right after still leaves a clean part boundary.
pub fn checkpoint<V: Vcs>(paths: &WorkspacePaths, vcs: &V) -> Result<()> {
    let now = to_second(Utc::now());
    let identity = vcs.identity()?;
    let mut store = RecordStore::load(&paths.record_path, now, &identity)?;

    store.record_mut().latest_part_finish = now;
    store.persist()?;
    info!(phase = %derive_phase(store.record()), "checkpointed the running part");
    Ok(())
}

/// Declare the cycle complete and publish the output artifact.
pub fn finalize<V: Vcs>(paths: &WorkspacePaths, vcs: &V) -> Result<()> {
    let now = to_second(Utc::now());
    let identity = vcs.identity()?;
    let mut store = RecordStore::load(&paths.record_path, now, &identity)?;
    finalize_record(&mut store, paths, now)
}

fn launch_override<V: Vcs>(vcs: &V) -> bool {
    match vcs.latest_commit_message() {
        Ok(message) => launch_requested(&message),
        Err(err) => {
            // Best-effort signal: a repository without history simply has
            // no override.
            warn!(error = %format!("{err:#}"), "could not read latest commit message");
            false
        }
    }
}

/// Refresh the input list per the record's `raw_link`.
///
/// `last_download` is only a download time: it moves to `now` on a real
/// network fetch and resets to epoch zero when the local copy is reused or
/// a placeholder is synthesized.
fn refresh_input(paths: &WorkspacePaths, store: &mut RecordStore, now: DateTime<Utc>) -> Result<()> {
    let raw_link = store.record().raw_link.clone();
    match raw_link {
        Some(link) => {
            info!(url = %link, "refreshing input list from upstream");
            fetch_to_file(&link, &paths.input_path)?;
            store.record_mut().last_download = now;
        }
        None if paths.input_path.exists() => {
            info!(path = %paths.input_path.display(), "no upstream link, reusing local input list");
            store.record_mut().last_download = epoch();
        }
        None => {
            info!(path = %paths.input_path.display(), "no input list found, writing placeholder");
            fs::write(&paths.input_path, EMPTY_INPUT_PLACEHOLDER)
                .with_context(|| format!("write {}", paths.input_path.display()))?;
            store.record_mut().last_download = epoch();
        }
    }
    Ok(())
}

/// Close the cycle: flip the flags, publish the artifact, clear scratch.
fn finalize_record(
    store: &mut RecordStore,
    paths: &WorkspacePaths,
    now: DateTime<Utc>,
) -> Result<()> {
    {
        let record = store.record_mut();
        record.currently_under_test = false;
        // The part and the cycle end at the same instant.
        record.latest_part_finish = now;
        record.finish = now;
    }
    store.persist()?;

    let results = fs::read_to_string(&paths.active_results_path).ok();
    let artifact = render_artifact(&store.record().repo, now, results.as_deref());
    fs::write(&paths.output_path, artifact)
        .with_context(|| format!("write {}", paths.output_path.display()))?;
    info!(path = %paths.output_path.display(), "published output artifact");

    if paths.tester_output_dir.exists() {
        fs::remove_dir_all(&paths.tester_output_dir).with_context(|| {
            format!("clear tester scratch {}", paths.tester_output_dir.display())
        })?;
    }

    info!(phase = %derive_phase(store.record()), "test cycle finalized");
    Ok(())
}

/// Render the public artifact: a fixed 4-line generated header directly
/// followed by the sorted, de-duplicated, comment-stripped result lines.
fn render_artifact(repo: &str, generated_at: DateTime<Utc>, results: Option<&str>) -> String {
    let mut artifact = format!(
        "# Generated by the host-liveness launcher.\n\
         # Managed repository: {repo}\n\
         # Hosts that were still active during the last test cycle.\n\
         # Generation Time: {}\n",
        generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );

    let lines: BTreeSet<&str> = results
        .unwrap_or_default()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect();

    for line in &lines {
        artifact.push_str(line);
        artifact.push('\n');
    }
    artifact
}
