//! ---
//! dl_section: "04-setup-orchestration"
//! dl_subsection: "module"
//! dl_type: "source"
//! dl_scope: "code"
//! dl_description: "Setup kernel driving readiness, fallback launch, and provisioning."
//! dl_version: "v0.1.0"
//! dl_owner: "tbd"
//! ---
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dynalocal_client::{ClientError, DynamoClient, TableClient};
use dynalocal_common::{ConfigSource, Configuration};
use dynalocal_emulator::{
    ensure_launched, wait_for_reachable, EmulatorHandle, Launcher, UnreachableError,
};
use futures::future::try_join;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{DeletionError, SetupError};
use crate::provision::{create_tables, delete_tables};
use crate::reconcile::{missing_tables, obsolete_tables};

/// How long the initial reachability probe may take before falling back to a launch.
pub const DEFAULT_PROBE_DEADLINE: Duration = Duration::from_secs(5);
/// How long a freshly launched emulator may take to accept connections.
pub const DEFAULT_LAUNCH_DEADLINE: Duration = Duration::from_secs(30);

/// Steps of a single setup invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SetupPhase {
    /// Nothing has happened yet.
    Idle,
    /// Loading the configuration and constructing the client.
    Configuring,
    /// Listing tables while checking the endpoint accepts connections.
    ProbingExisting,
    /// Deleting tables that are no longer declared.
    Reconciling,
    /// Starting the emulator because no usable endpoint was found.
    Launching,
    /// Waiting for the launched emulator to accept connections.
    AwaitingReachable,
    /// Creating declared tables.
    Provisioning,
    /// The environment is ready for the test run.
    Ready,
    /// Setup aborted.
    Failed,
}

impl fmt::Display for SetupPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SetupPhase::Idle => "idle",
            SetupPhase::Configuring => "configuring",
            SetupPhase::ProbingExisting => "probing-existing",
            SetupPhase::Reconciling => "reconciling",
            SetupPhase::Launching => "launching",
            SetupPhase::AwaitingReachable => "awaiting-reachable",
            SetupPhase::Provisioning => "provisioning",
            SetupPhase::Ready => "ready",
            SetupPhase::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Whether the emulator was found running or had to be started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadinessPath {
    /// An emulator already answered on the configured endpoint.
    Reused,
    /// The emulator was launched by this setup.
    Launched,
}

/// Outcome of a successful setup.
#[derive(Debug)]
pub struct SetupReport {
    /// How readiness was reached.
    pub path: ReadinessPath,
    /// Why the existing endpoint was rejected, when a launch happened.
    pub fallback_reason: Option<String>,
    /// Tables removed because they are no longer declared.
    pub deleted: Vec<String>,
    /// Stale tables that could not be removed.
    pub deletion_failures: Vec<DeletionError>,
    /// Declared tables that already existed and were left untouched.
    pub retained: Vec<String>,
    /// Tables created by this setup.
    pub created: Vec<String>,
    /// Phases visited in order, ending with [`SetupPhase::Ready`].
    pub phases: Vec<SetupPhase>,
}

/// State shared across setup invocations within one process.
///
/// Holds the record of a launched emulator, so later setups never launch a
/// second one, and publishes the client for the test run to use.
#[derive(Debug, Default)]
pub struct SetupContext {
    emulator: Option<EmulatorHandle>,
    client: Option<Arc<DynamoClient>>,
}

impl SetupContext {
    /// Fresh context with no emulator and no published client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emulator launched by an earlier setup in this process, if any.
    pub fn emulator(&self) -> Option<&EmulatorHandle> {
        self.emulator.as_ref()
    }

    /// Client built by the most recent setup that got past configuration.
    pub fn client(&self) -> Option<Arc<DynamoClient>> {
        self.client.clone()
    }
}

/// Deadlines applied while waiting for the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupTimings {
    /// Bound on the initial reachability probe.
    pub probe_deadline: Duration,
    /// Bound on waiting for a launched emulator.
    pub launch_deadline: Duration,
}

impl Default for SetupTimings {
    fn default() -> Self {
        Self {
            probe_deadline: DEFAULT_PROBE_DEADLINE,
            launch_deadline: DEFAULT_LAUNCH_DEADLINE,
        }
    }
}

/// Drives one setup invocation from configuration to a provisioned emulator.
pub struct Bootstrapper {
    source: ConfigSource,
    launcher: Arc<dyn Launcher>,
    timings: SetupTimings,
}

impl fmt::Debug for Bootstrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bootstrapper")
            .field("source", &self.source)
            .field("timings", &self.timings)
            .finish_non_exhaustive()
    }
}

enum ProbeOutcome {
    Existing(Vec<String>),
    Fallback(String),
}

enum ProbeFailure {
    Listing(ClientError),
    Unreachable(UnreachableError),
}

#[derive(Default)]
struct Progress {
    current: Option<SetupPhase>,
    visited: Vec<SetupPhase>,
}

impl Progress {
    fn enter(&mut self, phase: SetupPhase) {
        let from = self.current.unwrap_or(SetupPhase::Idle);
        debug!(%from, to = %phase, "setup phase transition");
        self.current = Some(phase);
        self.visited.push(phase);
    }
}

impl Bootstrapper {
    /// Create a bootstrapper reading `source` and launching through `launcher`.
    pub fn new(source: ConfigSource, launcher: Arc<dyn Launcher>) -> Self {
        Self {
            source,
            launcher,
            timings: SetupTimings::default(),
        }
    }

    /// Override the probe and launch deadlines.
    pub fn with_timings(mut self, timings: SetupTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Deadlines in effect.
    pub fn timings(&self) -> SetupTimings {
        self.timings
    }

    /// Make the emulator ready and its tables match the configuration.
    ///
    /// An emulator that already answers is reused and only reconciled. When
    /// the endpoint cannot be reached at all, one is launched (at most once per
    /// context) and awaited. A listener that answers but rejects the listing
    /// fails the setup without launching anything.
    pub async fn run(&self, context: &mut SetupContext) -> Result<SetupReport, SetupError> {
        let mut progress = Progress::default();
        match self.drive(context, &mut progress).await {
            Ok(report) => Ok(report),
            Err(err) => {
                let failed_in = progress.current.unwrap_or(SetupPhase::Idle);
                progress.enter(SetupPhase::Failed);
                error!(phase = %failed_in, error = %err, "setup failed");
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        context: &mut SetupContext,
        progress: &mut Progress,
    ) -> Result<SetupReport, SetupError> {
        progress.enter(SetupPhase::Configuring);
        let config = self.source.load().await?;
        let client = Arc::new(DynamoClient::from_configuration(&config).map_err(SetupError::Client)?);
        context.client = Some(client.clone());
        debug!(
            endpoint = %client.endpoint(),
            region = client.region(),
            tables = config.tables.len(),
            "client configured"
        );

        progress.enter(SetupPhase::ProbingExisting);
        let probe = self
            .probe_existing(&config, &*client, context.emulator.is_some())
            .await?;

        let mut deleted = Vec::new();
        let mut deletion_failures = Vec::new();
        let (path, fallback_reason, existing) = match probe {
            ProbeOutcome::Existing(names) => {
                progress.enter(SetupPhase::Reconciling);
                let obsolete = obsolete_tables(&names, &config.tables);
                if !obsolete.is_empty() {
                    debug!(?obsolete, "removing tables that are no longer declared");
                }
                (deleted, deletion_failures) = delete_tables(&*client, &obsolete).await;
                (ReadinessPath::Reused, None, names)
            }
            ProbeOutcome::Fallback(reason) => {
                debug!(port = config.port, %reason, "no usable emulator, launching one");
                progress.enter(SetupPhase::Launching);
                ensure_launched(
                    &mut context.emulator,
                    self.launcher.as_ref(),
                    config.port,
                    &config.options,
                    config.installer_config.as_ref(),
                )
                .await?;

                progress.enter(SetupPhase::AwaitingReachable);
                wait_for_reachable(&config.hostname, config.port, self.timings.launch_deadline)
                    .await?;
                (ReadinessPath::Launched, Some(reason), Vec::new())
            }
        };

        progress.enter(SetupPhase::Provisioning);
        let pending = missing_tables(&existing, &config.tables);
        let retained = config
            .tables
            .iter()
            .map(|table| table.table_name.clone())
            .filter(|name| existing.contains(name))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let created = create_tables(&*client, pending).await?;

        if !config.settle_delay.is_zero() {
            debug!(delay = ?config.settle_delay, "waiting for tables to settle");
            tokio::time::sleep(config.settle_delay).await;
        }

        progress.enter(SetupPhase::Ready);
        info!(
            path = ?path,
            created = created.len(),
            deleted = deleted.len(),
            failed_deletions = deletion_failures.len(),
            "test environment ready"
        );

        Ok(SetupReport {
            path,
            fallback_reason,
            deleted,
            deletion_failures,
            retained,
            created,
            phases: std::mem::take(&mut progress.visited),
        })
    }

    async fn probe_existing(
        &self,
        config: &Configuration,
        client: &dyn TableClient,
        launched_here: bool,
    ) -> Result<ProbeOutcome, SetupError> {
        let listing = async {
            client
                .list_table_names()
                .await
                .map_err(ProbeFailure::Listing)
        };
        let reachable = async {
            if launched_here {
                // An emulator we started stays up; the listing alone decides.
                return Ok(());
            }
            wait_for_reachable(&config.hostname, config.port, self.timings.probe_deadline)
                .await
                .map_err(ProbeFailure::Unreachable)
        };

        match try_join(listing, reachable).await {
            Ok((names, ())) => {
                debug!(existing = names.len(), "emulator already running");
                Ok(ProbeOutcome::Existing(names))
            }
            Err(ProbeFailure::Unreachable(err)) => Ok(ProbeOutcome::Fallback(err.to_string())),
            Err(ProbeFailure::Listing(err)) if err.is_connectivity() => {
                Ok(ProbeOutcome::Fallback(err.to_string()))
            }
            Err(ProbeFailure::Listing(err)) => {
                warn!(error = %err, "endpoint answered but refused to list tables");
                Err(SetupError::Probe(err))
            }
        }
    }
}
