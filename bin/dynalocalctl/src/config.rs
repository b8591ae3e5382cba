//! ---
//! dl_section: "06-control-cli"
//! dl_subsection: "binary"
//! dl_type: "source"
//! dl_scope: "code"
//! dl_description: "Resolved configuration printing."
//! dl_version: "v0.1.0"
//! dl_owner: "tbd"
//! ---
use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Args;

use crate::ConfigArgs;

#[derive(Debug, Args)]
pub struct ConfigCommand {
    #[command(flatten)]
    config: ConfigArgs,
}

impl ConfigCommand {
    pub async fn execute(self) -> Result<()> {
        let configuration = self
            .config
            .source()
            .load()
            .await
            .context("failed to resolve configuration")?;
        let mut stdout = io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, &configuration)
            .context("failed to render configuration")?;
        writeln!(stdout)?;
        Ok(())
    }
}
