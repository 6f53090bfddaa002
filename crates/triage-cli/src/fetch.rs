//! Project checkout acquisition

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::Command;
use tracing::info;

/// Shallow-clone `url` into `dest`
pub fn clone_project(url: &str, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    info!(url, dest = %dest.display(), "Cloning project");
    let output = Command::new("git")
        .args(["clone", "--depth", "1", url])
        .arg(dest)
        .output()
        .context("failed to execute git")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git clone {url} failed: {}", stderr.trim());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nothing");
        let missing = dir.path().join("no-such-repo");
        let result = clone_project(&missing.to_string_lossy(), &dest);
        assert!(result.is_err());
    }
}
