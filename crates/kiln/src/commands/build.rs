//! Production build command.

use anyhow::{Context, Result};
use kiln_assets::{BuildMode, BuildReport, Pipeline, TaskContext};

use crate::config::ConfigFile;

/// Run a pipeline on the blocking pool.
pub async fn run_pipeline(pipeline: Pipeline, ctx: TaskContext) -> Result<BuildReport> {
    let report = tokio::task::spawn_blocking(move || pipeline.run(&ctx))
        .await
        .context("Build task panicked")??;
    Ok(report)
}

/// Run the build command.
pub async fn run(config: &ConfigFile) -> Result<()> {
    tracing::info!("Building site...");

    let mode = BuildMode::Production;
    let ctx = TaskContext::new(config.layout(), config.asset_options(mode));
    let output_dir = ctx.layout.output_dir.clone();

    let report = run_pipeline(Pipeline::for_mode(mode), ctx).await?;

    tracing::info!(
        "Built {} files with {} tasks in {}ms",
        report.files(),
        report.tasks.len(),
        report.duration_ms
    );
    tracing::info!("Output: {}", output_dir.display());

    Ok(())
}
