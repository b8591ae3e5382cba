//! ---
//! dl_section: "03-emulator"
//! dl_subsection: "module"
//! dl_type: "source"
//! dl_scope: "code"
//! dl_description: "Idempotent emulator launching."
//! dl_version: "v0.1.0"
//! dl_owner: "tbd"
//! ---
use std::process::Stdio;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dynalocal_common::InstallerConfig;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::LaunchError;
use crate::installer::{ensure_installed, InstallerSettings, JAR_NAME};

const IN_MEMORY_FLAG: &str = "-inMemory";
const DB_PATH_FLAG: &str = "-dbPath";

/// Record of an emulator started by this process.
///
/// The process is detached: the handle only exists so that repeated setup
/// calls can tell an emulator was already launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmulatorHandle {
    pub port: u16,
    /// OS process id, absent for in-process emulators.
    pub pid: Option<u32>,
    pub command: String,
    pub launched_at: DateTime<Utc>,
}

impl EmulatorHandle {
    pub fn new(port: u16, pid: Option<u32>, command: impl Into<String>) -> Self {
        Self {
            port,
            pid,
            command: command.into(),
            launched_at: Utc::now(),
        }
    }
}

/// Starts an emulator bound to a port.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// One-time override of how the emulator is located or installed.
    fn configure_installer(&self, overrides: &InstallerConfig);

    /// Start the emulator and return without waiting for it to exit.
    async fn launch(&self, port: u16, options: &[String]) -> Result<EmulatorHandle, LaunchError>;
}

/// Launch through `launcher` unless `slot` already records an emulator.
///
/// Installer overrides are applied only when a launch actually happens.
pub async fn ensure_launched(
    slot: &mut Option<EmulatorHandle>,
    launcher: &dyn Launcher,
    port: u16,
    options: &[String],
    installer: Option<&InstallerConfig>,
) -> Result<EmulatorHandle, LaunchError> {
    if let Some(handle) = slot.as_ref() {
        debug!(port = handle.port, pid = ?handle.pid, "emulator already launched by this process");
        return Ok(handle.clone());
    }

    if let Some(overrides) = installer {
        launcher.configure_installer(overrides);
    }
    let handle = launcher.launch(port, options).await?;
    info!(port, pid = ?handle.pid, command = %handle.command, "emulator launched");
    *slot = Some(handle.clone());
    Ok(handle)
}

/// Runs the DynamoDB Local jar with the system JVM.
#[derive(Debug, Default)]
pub struct JavaLauncher {
    settings: Mutex<InstallerSettings>,
}

impl JavaLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: InstallerSettings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }

    pub fn settings(&self) -> InstallerSettings {
        self.settings.lock().clone()
    }

    fn command(settings: &InstallerSettings, port: u16, options: &[String]) -> (Command, Vec<String>) {
        let mut args = vec![format!(
            "-Djava.library.path={}",
            settings.lib_path().display()
        )];
        args.extend(settings.java_opts.iter().cloned());
        args.push("-jar".to_owned());
        args.push(JAR_NAME.to_owned());
        args.push("-port".to_owned());
        args.push(port.to_string());
        args.extend(options.iter().cloned());
        // Without a database path the jar writes into the install directory
        // and the next launch would start with stale tables.
        if !options.iter().any(|option| option == DB_PATH_FLAG || option == IN_MEMORY_FLAG) {
            args.push(IN_MEMORY_FLAG.to_owned());
        }

        let mut command = Command::new(&settings.java_path);
        command
            .args(&args)
            .current_dir(&settings.install_path)
            .stdin(Stdio::null())
            .kill_on_drop(false);
        if settings.verbose {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }
        (command, args)
    }
}

#[async_trait]
impl Launcher for JavaLauncher {
    fn configure_installer(&self, overrides: &InstallerConfig) {
        self.settings.lock().apply(overrides);
        debug!(settings = ?self.settings(), "installer configured");
    }

    async fn launch(&self, port: u16, options: &[String]) -> Result<EmulatorHandle, LaunchError> {
        let settings = self.settings();
        ensure_installed(&settings).await?;

        let (mut command, args) = Self::command(&settings, port, options);
        let program = settings.java_path.display().to_string();
        let child = command.spawn().map_err(|source| LaunchError::Spawn {
            program: program.clone(),
            source,
        })?;
        let pid = child.id();
        // Dropping the child leaves the process running; tokio reaps it once it exits.
        drop(child);

        Ok(EmulatorHandle::new(
            port,
            pid,
            format!("{} {}", program, args.join(" ")),
        ))
    }
}
