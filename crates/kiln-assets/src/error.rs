//! Errors raised by asset tasks and the task graph.

use std::path::{Path, PathBuf};

/// Errors that can occur during a build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Failed to read {0}")]
    ReadError(String),

    #[error("Failed to write {0}")]
    WriteError(String),

    #[error("Failed to compile stylesheet: {path}: {message}")]
    StyleError { path: String, message: String },

    #[error("Failed to render template {name}: {message}")]
    TemplateError { name: String, message: String },

    #[error("Failed to minify script: {path}: {message}")]
    ScriptError { path: String, message: String },

    #[error("Failed to process image: {path}: {message}")]
    ImageError { path: String, message: String },

    #[error("Invalid SVG: {path}: {message}")]
    SvgError { path: String, message: String },

    #[error("Output {path} written by both {first} and {second}")]
    OutputConflict {
        path: PathBuf,
        first: &'static str,
        second: &'static str,
    },

    #[error("Invalid task graph: {0}")]
    Graph(String),

    #[error("Task {task} failed: {source}")]
    TaskFailed {
        task: &'static str,
        #[source]
        source: Box<BuildError>,
    },
}

impl BuildError {
    pub(crate) fn read(path: &Path, e: impl std::fmt::Display) -> Self {
        BuildError::ReadError(format!("{}: {}", path.display(), e))
    }

    pub(crate) fn write(path: &Path, e: impl std::fmt::Display) -> Self {
        BuildError::WriteError(format!("{}: {}", path.display(), e))
    }
}
