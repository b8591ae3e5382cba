//! ---
//! dl_section: "03-emulator"
//! dl_subsection: "module"
//! dl_type: "source"
//! dl_scope: "code"
//! dl_description: "Emulator installation, launch, and reachability probing."
//! dl_version: "v0.1.0"
//! dl_owner: "tbd"
//! ---
//! Everything needed to get a DynamoDB emulator listening on a local port:
//! locating or installing the distribution, spawning it detached, and polling
//! its TCP port until it accepts connections.

mod error;
pub mod installer;
pub mod launcher;
pub mod probe;

pub use error::{LaunchError, UnreachableError};
pub use installer::InstallerSettings;
pub use launcher::{ensure_launched, EmulatorHandle, JavaLauncher, Launcher};
pub use probe::{wait_for_reachable, PROBE_BACKOFF};
