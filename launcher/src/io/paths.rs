//! Canonical file layout of a managed repository workspace.

use std::path::PathBuf;

/// All paths the launcher touches within a workspace root.
///
/// The file names are the on-disk contract shared with the sibling
/// repositories and the external tester; they are not configurable.
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    /// The administrative record.
    pub record_path: PathBuf,
    /// Example/template marker: its presence means this checkout is the
    /// repository template, not a managed list.
    pub example_record_path: PathBuf,
    /// Input list consumed by the external tester.
    pub input_path: PathBuf,
    /// Public output artifact.
    pub output_path: PathBuf,
    /// The tester's canonical "active" result list.
    pub active_results_path: PathBuf,
    /// Scratch directory the tester produces; cleared on finalize.
    pub tester_output_dir: PathBuf,
    /// Directory holding the generated tester configuration.
    pub tester_config_dir: PathBuf,
    /// CI workflow definitions synchronized by the maintenance pass.
    pub workflows_dir: PathBuf,
}

impl WorkspacePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let tester_output_dir = root.join("output");
        Self {
            record_path: root.join("info.json"),
            example_record_path: root.join("info.example.json"),
            input_path: root.join("origin.list"),
            output_path: root.join("clean.list"),
            active_results_path: tester_output_dir
                .join("origin.list")
                .join("domains")
                .join("ACTIVE")
                .join("list"),
            tester_config_dir: root.join(".tester"),
            workflows_dir: root.join(".github").join("workflows"),
            tester_output_dir,
            root,
        }
    }
}
