//! Maintenance pass: idempotent synchronization of shared repository files.
//!
//! Every managed repository carries a copy of infrastructure-owned files
//! (CI workflows, tester configuration, license). The maintenance pass
//! pulls them from their upstream sources once per authorized
//! begin-or-continue invocation. Steps are independent, re-evaluate their
//! own authorization at run time, and are best-effort: a failing step is
//! logged and skipped, never aborting the cycle, because these files are
//! repository hygiene rather than prerequisites of the test itself.

use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::EnvConfig;
use crate::core::record::Record;
use crate::io::download::{fetch_text, fetch_to_file, write_if_changed};
use crate::io::paths::WorkspacePaths;

/// Upstream source of the shared CI workflow definitions.
const UPSTREAM_MAIN_WORKFLOW: &str =
    "https://raw.githubusercontent.com/dead-hosts/template/master/.github/workflows/main.yml";
const UPSTREAM_SCHEDULER_WORKFLOW: &str =
    "https://raw.githubusercontent.com/dead-hosts/template/master/.github/workflows/scheduler.yml";

/// Upstream source of the shared tester configuration.
const UPSTREAM_TESTER_CONFIG: &str =
    "https://raw.githubusercontent.com/dead-hosts/template/master/.tester/config.json";

/// Upstream source of the infrastructure license.
const UPSTREAM_LICENSE: &str =
    "https://raw.githubusercontent.com/dead-hosts/repository-structure/master/LICENSE";

/// Commit message the tester uses when it concludes a cycle on its own.
const END_COMMIT_MESSAGE: &str = "Liveness test finished";

/// Leftovers from earlier generations of the infrastructure.
const STALE_FILES: [&str; 4] = [".administrators", "update_me.py", "admin.py", ".travis.yml"];

/// Read-only view handed to each sync step.
pub struct MaintenanceContext<'a> {
    pub config: &'a EnvConfig,
    pub paths: &'a WorkspacePaths,
    pub record: &'a Record,
}

/// One independent, idempotent synchronization step.
pub trait SyncStep {
    /// Short human-readable name for logs.
    fn describe(&self) -> &'static str;
    /// Re-evaluated at run time; an unauthorized step is a silent no-op.
    fn is_authorized(&self, ctx: &MaintenanceContext<'_>) -> bool;
    /// Perform the synchronization. Must be safely repeatable.
    fn apply(&self, ctx: &MaintenanceContext<'_>) -> Result<()>;
}

/// The production step list, in execution order.
pub fn default_steps() -> Vec<Box<dyn SyncStep>> {
    vec![
        Box::new(StaleFilesCleanup),
        Box::new(WorkflowsSync),
        Box::new(TesterConfigSync),
        Box::new(LicenseSync),
    ]
}

/// Run every authorized step, logging and skipping failures.
///
/// Returns how many steps actually applied.
pub fn run_maintenance(steps: &[Box<dyn SyncStep>], ctx: &MaintenanceContext<'_>) -> usize {
    let mut applied = 0;
    for step in steps {
        if !step.is_authorized(ctx) {
            debug!(step = step.describe(), "not authorized, skipping");
            continue;
        }
        match step.apply(ctx) {
            Ok(()) => {
                info!(step = step.describe(), "applied");
                applied += 1;
            }
            Err(err) => {
                // Best-effort: repository hygiene must not block the cycle.
                warn!(step = step.describe(), error = %format!("{err:#}"), "step failed, continuing");
            }
        }
    }
    applied
}

/// Removes files earlier launcher generations managed.
struct StaleFilesCleanup;

impl SyncStep for StaleFilesCleanup {
    fn describe(&self) -> &'static str {
        "stale-files-cleanup"
    }

    fn is_authorized(&self, _ctx: &MaintenanceContext<'_>) -> bool {
        true
    }

    fn apply(&self, ctx: &MaintenanceContext<'_>) -> Result<()> {
        for name in STALE_FILES {
            let path = ctx.paths.root.join(name);
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("remove stale file {}", path.display()))?;
                debug!(path = %path.display(), "removed stale file");
            }
        }
        Ok(())
    }
}

/// Keeps the CI workflow definitions aligned with the template repository.
struct WorkflowsSync;

impl SyncStep for WorkflowsSync {
    fn describe(&self) -> &'static str {
        "workflows-sync"
    }

    fn is_authorized(&self, ctx: &MaintenanceContext<'_>) -> bool {
        // Never rewrite workflows outside CI, and never in the template
        // repository itself (marked by the example record).
        ctx.config.under_ci && !ctx.paths.example_record_path.exists()
    }

    fn apply(&self, ctx: &MaintenanceContext<'_>) -> Result<()> {
        fetch_to_file(UPSTREAM_MAIN_WORKFLOW, &ctx.paths.workflows_dir.join("main.yml"))?;
        fetch_to_file(
            UPSTREAM_SCHEDULER_WORKFLOW,
            &ctx.paths.workflows_dir.join("scheduler.yml"),
        )?;
        Ok(())
    }
}

/// Regenerates the tester configuration from the shared upstream base plus
/// the record's free-form overrides.
struct TesterConfigSync;

impl SyncStep for TesterConfigSync {
    fn describe(&self) -> &'static str {
        "tester-config-sync"
    }

    fn is_authorized(&self, ctx: &MaintenanceContext<'_>) -> bool {
        !ctx.record.own_management
    }

    fn apply(&self, ctx: &MaintenanceContext<'_>) -> Result<()> {
        let upstream: Value = serde_json::from_str(&fetch_text(UPSTREAM_TESTER_CONFIG)?)
            .context("parse upstream tester config")?;
        let merged = merged_tester_config(upstream, ctx.record)?;
        let mut buf = serde_json::to_string_pretty(&merged).context("serialize tester config")?;
        buf.push('\n');
        write_if_changed(&ctx.paths.tester_config_dir.join("config.json"), &buf)?;
        Ok(())
    }
}

/// Keeps the infrastructure license file current.
struct LicenseSync;

impl SyncStep for LicenseSync {
    fn describe(&self) -> &'static str {
        "license-sync"
    }

    fn is_authorized(&self, ctx: &MaintenanceContext<'_>) -> bool {
        ctx.config.under_ci && !ctx.paths.example_record_path.exists()
    }

    fn apply(&self, ctx: &MaintenanceContext<'_>) -> Result<()> {
        fetch_to_file(UPSTREAM_LICENSE, &ctx.paths.root.join("LICENSE"))?;
        Ok(())
    }
}

/// Merge the upstream base config with the record's overrides.
///
/// The record's `custom_tester_config` wins over the upstream base, and a
/// non-empty ping list appends its mentions to the end-of-cycle commit
/// message so the named users get notified.
fn merged_tester_config(upstream: Value, record: &Record) -> Result<Value> {
    let mut config = match upstream {
        Value::Object(map) => map,
        _ => return Err(anyhow!("upstream tester config is not an object")),
    };

    if !record.ping.is_empty() {
        config.insert(
            "end_commit_message".to_string(),
            Value::String(format!("{END_COMMIT_MESSAGE} {}", record.ping_mentions())),
        );
    }

    deep_merge(&mut config, &record.custom_tester_config);
    Ok(Value::Object(config))
}

/// Recursively merge `overrides` into `base`; scalars and arrays replace.
fn deep_merge(base: &mut Map<String, Value>, overrides: &Map<String, Value>) {
    for (key, value) in overrides {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::{Record, RepoIdentity};
    use chrono::Utc;
    use serde_json::json;

    fn record() -> Record {
        let identity = RepoIdentity {
            owner: "example-org".to_string(),
            name: "hosts-list".to_string(),
        };
        Record::defaulted(Utc::now(), &identity)
    }

    fn context<'a>(
        config: &'a EnvConfig,
        paths: &'a WorkspacePaths,
        record: &'a Record,
    ) -> MaintenanceContext<'a> {
        MaintenanceContext {
            config,
            paths,
            record,
        }
    }

    fn test_config(root: &std::path::Path) -> EnvConfig {
        EnvConfig {
            workspace_dir: root.to_path_buf(),
            under_ci: false,
            ci_token: None,
            git_name: "test-bot".to_string(),
            git_email: None,
            tester_program: "true".to_string(),
        }
    }

    struct FailingStep;
    impl SyncStep for FailingStep {
        fn describe(&self) -> &'static str {
            "failing"
        }
        fn is_authorized(&self, _ctx: &MaintenanceContext<'_>) -> bool {
            true
        }
        fn apply(&self, _ctx: &MaintenanceContext<'_>) -> Result<()> {
            Err(anyhow!("upstream unavailable"))
        }
    }

    struct CountingStep {
        authorized: bool,
        marker: std::path::PathBuf,
    }
    impl SyncStep for CountingStep {
        fn describe(&self) -> &'static str {
            "counting"
        }
        fn is_authorized(&self, _ctx: &MaintenanceContext<'_>) -> bool {
            self.authorized
        }
        fn apply(&self, _ctx: &MaintenanceContext<'_>) -> Result<()> {
            write_if_changed(&self.marker, "applied\n")?;
            Ok(())
        }
    }

    #[test]
    fn driver_continues_past_failures() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = test_config(temp.path());
        let paths = WorkspacePaths::new(temp.path());
        let record = record();

        let marker = temp.path().join("marker");
        let steps: Vec<Box<dyn SyncStep>> = vec![
            Box::new(FailingStep),
            Box::new(CountingStep {
                authorized: true,
                marker: marker.clone(),
            }),
        ];

        let applied = run_maintenance(&steps, &context(&config, &paths, &record));
        assert_eq!(applied, 1);
        assert!(marker.exists());
    }

    #[test]
    fn unauthorized_steps_are_skipped() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = test_config(temp.path());
        let paths = WorkspacePaths::new(temp.path());
        let record = record();

        let marker = temp.path().join("marker");
        let steps: Vec<Box<dyn SyncStep>> = vec![Box::new(CountingStep {
            authorized: false,
            marker: marker.clone(),
        })];

        let applied = run_maintenance(&steps, &context(&config, &paths, &record));
        assert_eq!(applied, 0);
        assert!(!marker.exists());
    }

    #[test]
    fn stale_files_cleanup_is_repeatable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = test_config(temp.path());
        let paths = WorkspacePaths::new(temp.path());
        let record = record();
        std::fs::write(temp.path().join(".administrators"), "x").expect("seed");
        std::fs::write(temp.path().join("admin.py"), "x").expect("seed");

        let ctx = context(&config, &paths, &record);
        StaleFilesCleanup.apply(&ctx).expect("first run");
        assert!(!temp.path().join(".administrators").exists());
        assert!(!temp.path().join("admin.py").exists());
        StaleFilesCleanup.apply(&ctx).expect("second run is a no-op");
    }

    #[test]
    fn workflows_sync_requires_ci_and_non_template_checkout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut config = test_config(temp.path());
        let paths = WorkspacePaths::new(temp.path());
        let record = record();

        assert!(!WorkflowsSync.is_authorized(&context(&config, &paths, &record)));

        config.under_ci = true;
        assert!(WorkflowsSync.is_authorized(&context(&config, &paths, &record)));

        std::fs::write(&paths.example_record_path, "{}").expect("seed");
        assert!(!WorkflowsSync.is_authorized(&context(&config, &paths, &record)));
    }

    #[test]
    fn tester_config_sync_respects_own_management() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = test_config(temp.path());
        let paths = WorkspacePaths::new(temp.path());

        let mut record = record();
        assert!(TesterConfigSync.is_authorized(&context(&config, &paths, &record)));
        record.own_management = true;
        assert!(!TesterConfigSync.is_authorized(&context(&config, &paths, &record)));
    }

    #[test]
    fn config_merge_applies_overrides_and_ping() {
        let mut record = record();
        record.ping = vec!["@alice".to_string(), "@bob".to_string()];
        record.custom_tester_config = json!({
            "lookup": {"timeout": 7},
            "extra": true,
        })
        .as_object()
        .expect("object")
        .clone();

        let upstream = json!({
            "lookup": {"timeout": 3, "retries": 2},
            "end_commit_message": "default",
        });

        let merged = merged_tester_config(upstream, &record).expect("merge");
        assert_eq!(merged["lookup"]["timeout"], json!(7));
        assert_eq!(merged["lookup"]["retries"], json!(2));
        assert_eq!(merged["extra"], json!(true));
        assert_eq!(
            merged["end_commit_message"],
            json!("Liveness test finished @alice @bob")
        );
    }

    #[test]
    fn config_merge_rejects_non_object_upstream() {
        assert!(merged_tester_config(json!([1, 2, 3]), &record()).is_err());
    }
}
