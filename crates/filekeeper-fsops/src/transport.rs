//! Remote copy through an external secure-copy program.
//!
//! # Design
//! - The program is spawned with a two-element argument vector; no shell is involved.
//! - Destination strings are validated at the configuration boundary, not here.
//! - Combined stderr/stdout is kept on failure for diagnostics.
//! - Per-file copies target `<remote>/<relative path>`; the parent directories
//!   must already exist on the remote host, since `scp` does not create them.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{FsOpsError, FsOpsResult};

const DEFAULT_PROGRAM: &str = "scp";

#[async_trait]
/// Copies a local file to a `[user@]host:path` destination.
pub trait RemoteTransport: Send + Sync {
    /// Copy `source` to `destination`.
    async fn copy(&self, source: &Path, destination: &str) -> FsOpsResult<()>;
}

/// Transport that shells out to `scp` (or a compatible program) without a shell.
#[derive(Debug, Clone)]
pub struct ScpTransport {
    program: PathBuf,
}

impl ScpTransport {
    /// Transport using the `scp` found on `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_program(DEFAULT_PROGRAM)
    }

    /// Transport using a specific program.
    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Program that will be spawned.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for ScpTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Remote target for `relative` beneath the `[user@]host:path` root `remote`.
///
/// A bare `host:` root resolves relative to the remote login directory.
#[must_use]
pub fn remote_target(remote: &str, relative: &str) -> String {
    let relative = relative.trim_start_matches('/');
    if remote.ends_with(':') {
        format!("{remote}{relative}")
    } else {
        format!("{}/{relative}", remote.trim_end_matches('/'))
    }
}

#[async_trait]
impl RemoteTransport for ScpTransport {
    async fn copy(&self, source: &Path, destination: &str) -> FsOpsResult<()> {
        let output = Command::new(&self.program)
            .arg(source)
            .arg(destination)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| FsOpsError::TransportSpawn {
                program: self.program.clone(),
                source: err,
            })?;

        if output.status.success() {
            return Ok(());
        }

        let mut combined = String::from_utf8_lossy(&output.stderr).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stdout));
        Err(FsOpsError::Transport {
            source_path: source.to_path_buf(),
            destination: destination.to_string(),
            status: output.status.code(),
            output: combined.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_program_is_scp() {
        assert_eq!(ScpTransport::default().program(), Path::new("scp"));
        assert_eq!(
            ScpTransport::with_program("/usr/local/bin/scp").program(),
            Path::new("/usr/local/bin/scp")
        );
    }

    #[test]
    fn remote_targets_keep_the_relative_path() {
        assert_eq!(
            remote_target("ops@vault:/srv", "app1/logs/error.log"),
            "ops@vault:/srv/app1/logs/error.log"
        );
        assert_eq!(
            remote_target("ops@vault:/srv/", "app2/logs/error.log.gz"),
            "ops@vault:/srv/app2/logs/error.log.gz"
        );
        assert_eq!(remote_target("vault:", "a.log"), "vault:a.log");
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let transport = ScpTransport::with_program("/nonexistent/filekeeper-scp");
        let outcome = transport.copy(Path::new("/tmp/a.log"), "host:/srv").await;
        assert!(matches!(outcome, Err(FsOpsError::TransportSpawn { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exit_status_is_reported() {
        let transport = ScpTransport::with_program("false");
        match transport.copy(Path::new("/tmp/a.log"), "host:/srv").await {
            Err(FsOpsError::Transport {
                status, destination, ..
            }) => {
                assert_eq!(status, Some(1));
                assert_eq!(destination, "host:/srv");
            }
            other => panic!("expected transport failure, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_exit_is_ok() -> FsOpsResult<()> {
        ScpTransport::with_program("true")
            .copy(Path::new("/tmp/a.log"), "host:/srv")
            .await
    }
}
