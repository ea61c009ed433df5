//! The query script shipped with the crate and its on-disk artifact.

use std::io::{self, Write};
use std::path::Path;

use tempfile::TempPath;

/// Script body executed by the default interpreter on this platform.
#[cfg(windows)]
pub const QUERY_SCRIPT: &str = include_str!("../../scripts/query-service.ps1");
#[cfg(not(windows))]
pub const QUERY_SCRIPT: &str = include_str!("../../scripts/query-service.sh");

#[cfg(windows)]
const QUERY_SCRIPT_SUFFIX: &str = ".ps1";
#[cfg(not(windows))]
const QUERY_SCRIPT_SUFFIX: &str = ".sh";

/// Interpreter used when the config does not name one.
#[cfg(windows)]
pub const DEFAULT_INTERPRETER: &str = "powershell.exe";
#[cfg(not(windows))]
pub const DEFAULT_INTERPRETER: &str = "sh";

/// Arguments placed before the script path when the config does not set any.
#[cfg(windows)]
pub const DEFAULT_INTERPRETER_ARGS: &[&str] = &[
    "-NoProfile",
    "-NonInteractive",
    "-ExecutionPolicy",
    "Bypass",
    "-File",
];
#[cfg(not(windows))]
pub const DEFAULT_INTERPRETER_ARGS: &[&str] = &[];

/// A script body written to a temporary file.
///
/// The file is read-only for its whole life and is shared by every
/// concurrent invocation. It is removed when the artifact is dropped,
/// whatever the outcome of the processes that ran it.
#[derive(Debug)]
pub struct ScriptArtifact {
    path: TempPath,
}

impl ScriptArtifact {
    /// Writes `body` to a fresh temporary file ending in `suffix`.
    pub fn write(body: &str, suffix: &str) -> io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("svcwatch-query-")
            .suffix(suffix)
            .tempfile()?;
        file.write_all(body.as_bytes())?;
        file.flush()?;
        // Close the handle so the interpreter can open the file on Windows.
        Ok(Self {
            path: file.into_temp_path(),
        })
    }

    /// Writes the built-in query script for this platform.
    pub fn write_default() -> io::Result<Self> {
        Self::write(QUERY_SCRIPT, QUERY_SCRIPT_SUFFIX)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_written_and_removed_on_drop() {
        let artifact = ScriptArtifact::write("echo hi\n", ".sh").unwrap();
        let path = artifact.path().to_path_buf();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "echo hi\n");
        assert!(path.to_string_lossy().ends_with(".sh"));

        drop(artifact);
        assert!(!path.exists());
    }

    #[test]
    fn test_default_script_speaks_protocol() {
        let artifact = ScriptArtifact::write_default().unwrap();
        let body = std::fs::read_to_string(artifact.path()).unwrap();
        assert!(body.contains("serviceName="));
        assert!(body.contains("serviceUpTimeInSec="));
        assert!(body.contains("serviceStatus="));
        assert!(body.contains("SERVICE_DELIMITER"));
    }
}
