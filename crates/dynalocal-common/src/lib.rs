//! ---
//! dl_section: "01-configuration"
//! dl_subsection: "module"
//! dl_type: "source"
//! dl_scope: "code"
//! dl_description: "Shared configuration and logging primitives."
//! dl_version: "v0.1.0"
//! dl_owner: "tbd"
//! ---
//! Shared primitives for the dynalocal workspace.
//! This crate resolves the user-supplied configuration source into a
//! [`Configuration`] and wires up `tracing` for binaries and tests.

pub mod config;
pub mod logging;

pub use config::{
    ClientOverrides, ConfigDocument, ConfigError, ConfigProducer, ConfigSource, Configuration,
    InstallerConfig, TableDefinition,
};
pub use logging::{init, init_tracing, LogFormat, LoggingConfig};
