//! Development server with live reload for kiln sites.
//!
//! Serves the output directory, watches stylesheets and templates, rebuilds
//! them on change and tells connected browsers to refresh over a WebSocket.

pub mod livereload;
pub mod rebuild;
pub mod server;
pub mod watcher;

pub use livereload::{LiveReload, ReloadMessage};
pub use rebuild::{handle_events, rebuild, spawn_watcher};
pub use server::{DevServer, DevServerConfig, ServerError};
pub use watcher::{FileWatcher, WatchEvent};
