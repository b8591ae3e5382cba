//! ---
//! dl_section: "04-setup-orchestration"
//! dl_subsection: "module"
//! dl_type: "source"
//! dl_scope: "code"
//! dl_description: "Setup error taxonomy."
//! dl_version: "v0.1.0"
//! dl_owner: "tbd"
//! ---
use dynalocal_client::ClientError;
use dynalocal_common::ConfigError;
use dynalocal_emulator::{LaunchError, UnreachableError};
use thiserror::Error;

/// A stale table could not be removed. Reported, never fatal.
#[derive(Debug, Error)]
#[error("failed to delete table `{table}`: {source}")]
pub struct DeletionError {
    /// Table that was left in place.
    pub table: String,
    /// Client failure.
    #[source]
    pub source: ClientError,
}

/// A desired table could not be created.
#[derive(Debug, Error)]
#[error("failed to create table `{table}`: {source}")]
pub struct ProvisionError {
    /// First table whose creation failed.
    pub table: String,
    /// Client failure.
    #[source]
    pub source: ClientError,
}

/// Fatal setup failures.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The database client could not be constructed from the configuration.
    #[error("unable to construct database client: {0}")]
    Client(#[source] ClientError),
    /// Something answered on the endpoint but rejected the table listing.
    #[error("endpoint is listening but unusable: {0}")]
    Probe(#[source] ClientError),
    /// The emulator could not be started.
    #[error(transparent)]
    Launch(#[from] LaunchError),
    /// The emulator never became reachable.
    #[error(transparent)]
    Unreachable(#[from] UnreachableError),
    /// A desired table could not be created.
    #[error(transparent)]
    Provision(#[from] ProvisionError),
}
