//! Git adapter: the version-control collaborator.
//!
//! The launcher needs three things from git: the repository identity
//! (`owner/name` from the origin remote), the latest commit message (the
//! launch-override signal) and a commit-author override for commits the CI
//! job makes afterwards. We keep a small, explicit wrapper around `git`
//! subprocess calls.

use std::path::PathBuf;
use std::process::{Command, Output};

use anyhow::{anyhow, Context, Result};
use tracing::debug;

use crate::core::record::RepoIdentity;

/// Version-control signals consumed by the orchestrator.
///
/// A trait seam so orchestration tests can script the commit signal
/// without a real repository.
pub trait Vcs {
    /// `owner/name` of the origin remote.
    fn identity(&self) -> Result<RepoIdentity>;
    /// Most recent commit message (subject and body).
    fn latest_commit_message(&self) -> Result<String>;
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Set the commit author used for any commit the CI job makes after
    /// this invocation.
    pub fn configure_author(&self, name: &str, email: &str) -> Result<()> {
        debug!(name, email, "configuring commit author");
        self.run_checked(&["config", "user.name", name])?;
        self.run_checked(&["config", "user.email", email])?;
        Ok(())
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

impl Vcs for Git {
    fn identity(&self) -> Result<RepoIdentity> {
        let url = self.run_capture(&["remote", "get-url", "origin"])?;
        parse_remote_slug(&url)
    }

    fn latest_commit_message(&self) -> Result<String> {
        let message = self.run_capture(&["log", "-1", "--pretty=%B"])?;
        Ok(message.trim().to_string())
    }
}

/// Parse `owner/name` out of a remote URL (https or ssh form).
pub fn parse_remote_slug(url: &str) -> Result<RepoIdentity> {
    let trimmed = url.trim();
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);

    let rest = if let Some(index) = trimmed.find("github.com/") {
        &trimmed[index + "github.com/".len()..]
    } else if let Some((_, tail)) = trimmed.rsplit_once(':') {
        tail
    } else {
        trimmed
    };

    let (owner, name) = rest
        .split_once('/')
        .ok_or_else(|| anyhow!("unexpected remote url '{}'", url.trim()))?;
    if owner.is_empty() || name.is_empty() {
        return Err(anyhow!("unexpected remote url '{}'", url.trim()));
    }
    Ok(RepoIdentity {
        owner: owner.to_string(),
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_https_remote() {
        let identity = parse_remote_slug("https://github.com/example-org/hosts-list.git")
            .expect("parse");
        assert_eq!(identity.owner, "example-org");
        assert_eq!(identity.name, "hosts-list");
        assert_eq!(identity.slug(), "example-org/hosts-list");
    }

    #[test]
    fn parses_ssh_remote() {
        let identity =
            parse_remote_slug("git@github.com:example-org/hosts-list.git\n").expect("parse");
        assert_eq!(identity.owner, "example-org");
        assert_eq!(identity.name, "hosts-list");
    }

    #[test]
    fn parses_remote_without_suffix() {
        let identity =
            parse_remote_slug("https://github.com/example-org/hosts-list").expect("parse");
        assert_eq!(identity.name, "hosts-list");
    }

    #[test]
    fn rejects_unrecognizable_remote() {
        assert!(parse_remote_slug("not-a-remote").is_err());
        assert!(parse_remote_slug("https://github.com/only-owner").is_err());
    }
}
