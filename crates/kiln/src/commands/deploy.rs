//! Deploy command.

use anyhow::{Context, Result};

use crate::config::ConfigFile;

/// Publish the output directory. Assumes a prior `kiln build`.
pub async fn run(config: &ConfigFile, message: Option<String>) -> Result<()> {
    let mut publisher = config.publisher();
    if let Some(message) = message {
        publisher.message = message;
    }

    let output_dir = config.layout().output_dir;
    let report = publisher
        .publish(&output_dir)
        .await
        .context("Deploy failed")?;

    if report.committed {
        tracing::info!(
            "Deployed {} files to {} on {}",
            report.files,
            report.branch,
            report.remote
        );
    } else {
        tracing::info!("Nothing changed on {}", report.branch);
    }

    Ok(())
}
