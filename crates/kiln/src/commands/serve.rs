//! Preview server command.

use anyhow::Result;
use kiln_server::{DevServer, LiveReload};

use crate::config::ConfigFile;

/// Run the serve command.
pub async fn run(config: &ConfigFile, port: Option<u16>) -> Result<()> {
    let mut server_config = config.server_config();
    if !server_config.root.exists() {
        anyhow::bail!(
            "Directory not found: {}. Run 'kiln build' first.",
            server_config.root.display()
        );
    }

    server_config.live_reload = false;
    if let Some(port) = port {
        server_config.port = port;
    }

    DevServer::new(server_config, LiveReload::new()).start().await?;

    Ok(())
}
