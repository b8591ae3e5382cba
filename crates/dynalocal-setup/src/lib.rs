//! ---
//! dl_section: "04-setup-orchestration"
//! dl_subsection: "module"
//! dl_type: "source"
//! dl_scope: "code"
//! dl_description: "Setup orchestration kernel and table reconciliation."
//! dl_version: "v0.1.0"
//! dl_owner: "tbd"
//! ---
//! Prepares a local DynamoDB emulator for a test run.
//!
//! [`Bootstrapper::run`] loads the configuration, reuses an emulator that is
//! already listening (or launches one), removes tables left behind by earlier
//! runs and creates the tables the suite declares. Everything the surrounding
//! test framework needs afterwards is published on the [`SetupContext`].
#![warn(missing_docs)]

mod error;
pub mod orchestrator;
pub mod provision;
pub mod reconcile;

pub use error::{DeletionError, ProvisionError, SetupError};
pub use orchestrator::{
    Bootstrapper, ReadinessPath, SetupContext, SetupPhase, SetupReport, SetupTimings,
    DEFAULT_LAUNCH_DEADLINE, DEFAULT_PROBE_DEADLINE,
};
pub use reconcile::{missing_tables, obsolete_tables};
