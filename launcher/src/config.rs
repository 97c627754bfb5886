//! Environment-derived launcher configuration.
//!
//! Built exactly once in `main` and passed by reference into everything
//! that needs it, so components never read the environment themselves and
//! tests can run with synthetic configurations.

use std::path::PathBuf;

/// Immutable process configuration.
///
/// The environment variable names are the hosting CI platform's contract;
/// when none of them are set the launcher behaves as a single-shot local
/// run (see [`EnvConfig::can_resume`]).
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Directory holding the managed repository checkout.
    pub workspace_dir: PathBuf,
    /// True when running under the hosting CI platform.
    pub under_ci: bool,
    /// CI credential. Its absence means there is no way to schedule a
    /// follow-up invocation, so a started cycle must finalize immediately.
    pub ci_token: Option<String>,
    /// Commit-author override (name), applied before any commit is made.
    pub git_name: String,
    /// Commit-author override (email).
    pub git_email: Option<String>,
    /// Program spawned to run the actual liveness test.
    pub tester_program: String,
}

/// Default external tester program.
pub const DEFAULT_TESTER_PROGRAM: &str = "pyfunceble";

impl EnvConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self {
            workspace_dir: std::env::var_os("GITHUB_WORKSPACE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            under_ci: std::env::var_os("GITHUB_ACTIONS").is_some(),
            ci_token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
            git_name: std::env::var("GIT_NAME").unwrap_or_else(|_| "dead-hostsbot".to_string()),
            git_email: std::env::var("GIT_EMAIL").ok().filter(|e| !e.is_empty()),
            tester_program: std::env::var("LAUNCHER_TESTER")
                .unwrap_or_else(|_| DEFAULT_TESTER_PROGRAM.to_string()),
        }
    }

    /// Whether a later CI invocation can pick up an in-progress cycle.
    pub fn can_resume(&self) -> bool {
        self.ci_token.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Synthetic configuration for orchestration tests.
    pub(crate) fn test_config(workspace: &std::path::Path, ci_token: Option<&str>) -> EnvConfig {
        EnvConfig {
            workspace_dir: workspace.to_path_buf(),
            under_ci: false,
            ci_token: ci_token.map(str::to_string),
            git_name: "test-bot".to_string(),
            git_email: None,
            tester_program: "true".to_string(),
        }
    }

    #[test]
    fn can_resume_requires_token() {
        let temp = std::env::temp_dir();
        assert!(test_config(&temp, Some("token")).can_resume());
        assert!(!test_config(&temp, None).can_resume());
    }
}
