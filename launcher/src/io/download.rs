//! HTTP fetch helpers and the write-if-changed primitive.
//!
//! All maintenance-pass synchronization funnels through
//! [`write_if_changed`], which is what makes a second pass with no upstream
//! changes touch nothing on disk.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

static AGENT: LazyLock<ureq::Agent> = LazyLock::new(|| {
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(10))
        .timeout(Duration::from_secs(60))
        .build()
});

/// Fetch a text resource.
pub fn fetch_text(url: &str) -> Result<String> {
    debug!(url, "fetching");
    let response = AGENT
        .get(url)
        .call()
        .with_context(|| format!("fetch {url}"))?;
    response
        .into_string()
        .with_context(|| format!("read body of {url}"))
}

/// Fetch a text resource and write it to `destination` if its content
/// changed. Returns whether the file was (re)written.
pub fn fetch_to_file(url: &str, destination: &Path) -> Result<bool> {
    let body = fetch_text(url)?;
    write_if_changed(destination, &body)
}

/// Write `contents` to `path` only when the on-disk content differs.
///
/// Creates parent directories as needed. Returns whether a write happened.
pub fn write_if_changed(path: &Path, contents: &str) -> Result<bool> {
    if let Ok(existing) = fs::read_to_string(path) {
        if existing == contents {
            debug!(path = %path.display(), "content unchanged, skipping write");
            return Ok(false);
        }
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))?;
    debug!(path = %path.display(), "wrote updated content");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_if_changed_skips_identical_content() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("file.txt");

        assert!(write_if_changed(&path, "hello\n").expect("first write"));
        assert!(!write_if_changed(&path, "hello\n").expect("second write"));
        assert!(write_if_changed(&path, "changed\n").expect("third write"));
        assert_eq!(fs::read_to_string(&path).expect("read"), "changed\n");
    }
}
