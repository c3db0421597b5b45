//! Watch-triggered rebuilds.

use std::sync::Arc;

use kiln_assets::{BuildError, Task, TaskContext};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::livereload::{LiveReload, ReloadMessage};
use crate::server::ServerError;
use crate::watcher::{FileWatcher, WatchEvent};

/// URL path of the compiled stylesheet, as sent in style refresh messages.
const STYLESHEET_URL: &str = "/css/style.css";

/// Re-run the task for `event` and return the message to push to browsers.
pub fn rebuild(ctx: &TaskContext, event: &WatchEvent) -> Result<ReloadMessage, BuildError> {
    let task = event.task();
    tracing::info!("{} changed, running {}", event.path().display(), task);

    task.run(ctx)?;

    Ok(match task {
        Task::Styles => ReloadMessage::Css {
            path: STYLESHEET_URL.to_string(),
        },
        _ => ReloadMessage::Reload,
    })
}

/// Handle events one at a time until the channel closes.
///
/// Each rebuild runs to completion before the next event is taken. A failed
/// rebuild is logged and sends nothing.
pub async fn handle_events(
    ctx: Arc<TaskContext>,
    hub: LiveReload,
    mut rx: mpsc::Receiver<WatchEvent>,
) {
    while let Some(event) = rx.recv().await {
        let task_ctx = Arc::clone(&ctx);
        let result = tokio::task::spawn_blocking(move || rebuild(&task_ctx, &event)).await;

        match result {
            Ok(Ok(msg)) => hub.send(msg),
            Ok(Err(e)) => tracing::error!("Rebuild failed: {}", e),
            Err(e) => tracing::error!("Rebuild task aborted: {}", e),
        }
    }
}

/// Start watching the sources of `ctx` and rebuilding on change.
///
/// The returned task owns the watcher and runs until the process exits.
pub fn spawn_watcher(ctx: Arc<TaskContext>, hub: LiveReload) -> Result<JoinHandle<()>, ServerError> {
    let (watcher, rx) =
        FileWatcher::new(&ctx.layout).map_err(|e| ServerError::WatchError(e.to_string()))?;

    tracing::info!("Watching {}", ctx.layout.source_dir.display());

    Ok(tokio::spawn(async move {
        handle_events(ctx, hub, rx).await;
        // Keep watcher alive
        drop(watcher);
    }))
}
