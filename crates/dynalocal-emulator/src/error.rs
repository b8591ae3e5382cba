//! ---
//! dl_section: "03-emulator"
//! dl_subsection: "module"
//! dl_type: "source"
//! dl_scope: "code"
//! dl_description: "Errors raised while launching or probing the emulator."
//! dl_version: "v0.1.0"
//! dl_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Raised when nothing accepted a connection on `host:port` before the deadline.
#[derive(Debug, Clone, Error)]
#[error("{host}:{port} was not reachable after {elapsed:?}")]
pub struct UnreachableError {
    pub host: String,
    pub port: u16,
    pub elapsed: Duration,
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("emulator installation at {} is unusable: {reason}", path.display())]
    Install { path: PathBuf, reason: String },
    #[error("failed to download emulator from {url}: {reason}")]
    Download { url: String, reason: String },
    #[error("failed to unpack {}: {reason}", archive.display())]
    Extract { archive: PathBuf, reason: String },
}
