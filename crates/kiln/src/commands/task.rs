//! Single task command.

use anyhow::{Context, Result};
use kiln_assets::{BuildMode, Task, TaskContext};

use crate::config::ConfigFile;

/// Run one named task outside of any pipeline.
pub async fn run(config: &ConfigFile, name: &str, dev: bool) -> Result<()> {
    let task = Task::from_name(name).with_context(|| {
        let names: Vec<&str> = Task::ALL.iter().map(Task::name).collect();
        format!("Unknown task '{}'. Available: {}", name, names.join(", "))
    })?;

    let mode = if dev {
        BuildMode::Development
    } else {
        BuildMode::Production
    };
    let ctx = TaskContext::new(config.layout(), config.asset_options(mode));

    let output = tokio::task::spawn_blocking(move || task.run(&ctx))
        .await
        .context("Task panicked")??;

    tracing::info!("{} wrote {} files", task, output.len());

    Ok(())
}
