//! Loopback remote transport.
//!
//! `host:path` destinations are mapped to `<root>/<host>/<path>`. As with `scp`,
//! an existing directory there receives the source under its own file name;
//! any other path is written as the file itself. Unlike a real remote host,
//! missing parent directories are created.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use filekeeper_fsops::{FsOpsError, FsOpsResult, RemoteTransport};

/// One recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportCall {
    /// Local file that was pushed.
    pub source: PathBuf,
    /// Destination string as passed to the transport.
    pub destination: String,
}

/// Transport that copies into a local directory instead of a remote host.
#[derive(Debug)]
pub struct LoopbackTransport {
    root: PathBuf,
    unreachable: HashSet<String>,
    calls: Mutex<Vec<TransportCall>>,
}

impl LoopbackTransport {
    /// Loopback transport writing beneath `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            unreachable: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Make every copy to `host` fail.
    #[must_use]
    pub fn with_unreachable_host(mut self, host: impl Into<String>) -> Self {
        self.unreachable.insert(host.into());
        self
    }

    /// Calls made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Local path standing in for `destination`.
    #[must_use]
    pub fn landing_path(&self, destination: &str) -> PathBuf {
        let (host, path) = split_destination(destination);
        self.root
            .join(host)
            .join(path.trim_start_matches('/'))
    }

    fn failure(source: &Path, destination: &str, output: &str) -> FsOpsError {
        FsOpsError::Transport {
            source_path: source.to_path_buf(),
            destination: destination.to_string(),
            status: Some(1),
            output: output.to_string(),
        }
    }
}

fn split_destination(destination: &str) -> (&str, &str) {
    let (host, path) = destination.split_once(':').unwrap_or(("", destination));
    let host = host.rsplit_once('@').map_or(host, |(_, host)| host);
    (host, path)
}

#[async_trait]
impl RemoteTransport for LoopbackTransport {
    async fn copy(&self, source: &Path, destination: &str) -> FsOpsResult<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(TransportCall {
                source: source.to_path_buf(),
                destination: destination.to_string(),
            });
        }

        let (host, _) = split_destination(destination);
        if self.unreachable.contains(host) {
            return Err(Self::failure(source, destination, "connection refused"));
        }
        let mut landing = self.landing_path(destination);
        if tokio::fs::metadata(&landing)
            .await
            .is_ok_and(|meta| meta.is_dir())
        {
            let Some(name) = source.file_name() else {
                return Err(Self::failure(source, destination, "source has no file name"));
            };
            landing.push(name);
        } else if let Some(parent) = landing.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| Self::failure(source, destination, &err.to_string()))?;
        }
        tokio::fs::copy(source, &landing)
            .await
            .map_err(|err| Self::failure(source, destination, &err.to_string()))?;
        Ok(())
    }
}
