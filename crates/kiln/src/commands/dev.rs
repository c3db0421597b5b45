//! Development command: build, serve and watch.

use std::sync::Arc;

use anyhow::Result;
use kiln_assets::{BuildMode, Pipeline, TaskContext};
use kiln_server::{spawn_watcher, DevServer, LiveReload};

use crate::commands::build::run_pipeline;
use crate::config::ConfigFile;

/// Run the dev server.
pub async fn run(config: &ConfigFile, port: Option<u16>, open: bool) -> Result<()> {
    let mode = BuildMode::Development;
    let ctx = TaskContext::new(config.layout(), config.asset_options(mode));

    let report = run_pipeline(Pipeline::for_mode(mode), ctx.clone()).await?;
    tracing::info!("Built {} files in {}ms", report.files(), report.duration_ms);

    let mut server_config = config.server_config();
    server_config.open = server_config.open && open;
    if let Some(port) = port {
        server_config.port = port;
    }

    // The watcher and the server share this handle and nothing else.
    let hub = LiveReload::new();
    let _watcher = spawn_watcher(Arc::new(ctx), hub.clone())?;

    DevServer::new(server_config, hub).start().await?;

    Ok(())
}
