//! ---
//! dl_section: "06-control-cli"
//! dl_subsection: "binary"
//! dl_type: "source"
//! dl_scope: "code"
//! dl_description: "One-shot environment setup from the command line."
//! dl_version: "v0.1.0"
//! dl_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use dynalocal_emulator::JavaLauncher;
use dynalocal_setup::{
    Bootstrapper, ReadinessPath, SetupContext, SetupReport, SetupTimings, DEFAULT_LAUNCH_DEADLINE,
    DEFAULT_PROBE_DEADLINE,
};
use serde::Serialize;
use tracing::warn;

use crate::ConfigArgs;

#[derive(Debug, Args)]
pub struct SetupCommand {
    #[command(flatten)]
    config: ConfigArgs,

    /// How long to look for an already running emulator, in milliseconds.
    #[arg(long = "probe-timeout-ms", value_name = "MS", default_value_t = DEFAULT_PROBE_DEADLINE.as_millis() as u64)]
    probe_timeout_ms: u64,

    /// How long a launched emulator may take to accept connections, in milliseconds.
    #[arg(long = "launch-timeout-ms", value_name = "MS", default_value_t = DEFAULT_LAUNCH_DEADLINE.as_millis() as u64)]
    launch_timeout_ms: u64,

    /// Print the summary as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct Summary<'a> {
    path: ReadinessPath,
    endpoint: Option<String>,
    emulator_pid: Option<u32>,
    fallback_reason: Option<&'a str>,
    created: &'a [String],
    retained: &'a [String],
    deleted: &'a [String],
    failed_deletions: Vec<String>,
}

impl<'a> Summary<'a> {
    fn new(report: &'a SetupReport, context: &SetupContext) -> Self {
        Self {
            path: report.path,
            endpoint: context.client().map(|client| client.endpoint().to_string()),
            emulator_pid: context.emulator().and_then(|handle| handle.pid),
            fallback_reason: report.fallback_reason.as_deref(),
            created: &report.created,
            retained: &report.retained,
            deleted: &report.deleted,
            failed_deletions: report
                .deletion_failures
                .iter()
                .map(|failure| failure.to_string())
                .collect(),
        }
    }
}

impl SetupCommand {
    pub async fn execute(self) -> Result<()> {
        let timings = SetupTimings {
            probe_deadline: Duration::from_millis(self.probe_timeout_ms),
            launch_deadline: Duration::from_millis(self.launch_timeout_ms),
        };
        let bootstrapper = Bootstrapper::new(self.config.source(), Arc::new(JavaLauncher::new()))
            .with_timings(timings);
        let mut context = SetupContext::new();
        let report = bootstrapper
            .run(&mut context)
            .await
            .context("test environment setup failed")?;

        for failure in &report.deletion_failures {
            warn!(table = %failure.table, error = %failure.source, "stale table left in place");
        }

        let summary = Summary::new(&report, &context);
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("failed to render summary")?
            );
        } else {
            print_summary(&summary);
        }
        Ok(())
    }
}

fn print_summary(summary: &Summary<'_>) {
    let endpoint = summary.endpoint.as_deref().unwrap_or("-");
    match summary.path {
        ReadinessPath::Reused => println!("reused emulator at {endpoint}"),
        ReadinessPath::Launched => match summary.emulator_pid {
            Some(pid) => println!("launched emulator at {endpoint} (pid {pid})"),
            None => println!("launched emulator at {endpoint}"),
        },
    }
    let list = |names: &[String]| {
        if names.is_empty() {
            "-".to_owned()
        } else {
            names.join(", ")
        }
    };
    println!("created:  {}", list(summary.created));
    println!("retained: {}", list(summary.retained));
    println!("deleted:  {}", list(summary.deleted));
    for failure in &summary.failed_deletions {
        println!("warning:  {failure}");
    }
}
