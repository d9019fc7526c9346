//! Short identifier of the source revision being synced.

use std::path::Path;
use std::process::Command;

/// Substituted when the revision cannot be determined.
pub const UNKNOWN_REVISION: &str = "unknown";

/// Returns `git rev-parse --short HEAD` run in `dir`, or [`UNKNOWN_REVISION`]
/// when git is missing, `dir` is not a work tree, or the output is empty.
/// Never fails: provenance tagging must not abort a sync.
pub fn source_revision(dir: &Path) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .arg("rev-parse")
        .arg("--short")
        .arg("HEAD")
        .output();

    match output {
        Ok(out) if out.status.success() => {
            let rev = String::from_utf8_lossy(&out.stdout).trim().to_string();
            if rev.is_empty() {
                UNKNOWN_REVISION.to_string()
            } else {
                tracing::debug!(revision = %rev, dir = %dir.display(), "Resolved source revision");
                rev
            }
        }
        Ok(out) => {
            tracing::debug!(
                dir = %dir.display(),
                status = ?out.status,
                "git rev-parse exited with non-zero code, using sentinel revision"
            );
            UNKNOWN_REVISION.to_string()
        }
        Err(e) => {
            tracing::debug!(error = ?e, dir = %dir.display(), "Failed to launch git process, using sentinel revision");
            UNKNOWN_REVISION.to_string()
        }
    }
}
