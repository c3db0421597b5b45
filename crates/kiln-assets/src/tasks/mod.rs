//! File-transform tasks.
//!
//! Each task reads a fixed set of source files, writes a disjoint set of output
//! files and reports every path it wrote.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::BuildError;
use crate::layout::SiteLayout;

pub mod clean;
pub mod copy;
pub mod html;
pub mod images;
pub mod scripts;
pub mod styles;
pub mod svg;

pub use styles::BrowserTargets;

/// Whether the site is built for deployment or for local preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    #[default]
    Production,
    Development,
}

impl BuildMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildMode::Production => "production",
            BuildMode::Development => "development",
        }
    }
}

/// Tunables shared by the tasks.
#[derive(Debug, Clone)]
pub struct AssetOptions {
    pub mode: BuildMode,

    /// JPEG re-encode quality (1-100)
    pub jpeg_quality: u8,

    /// Browsers that vendor prefixes are generated for
    pub browsers: BrowserTargets,
}

impl Default for AssetOptions {
    fn default() -> Self {
        Self {
            mode: BuildMode::Production,
            jpeg_quality: 75,
            browsers: BrowserTargets::default(),
        }
    }
}

/// Everything a task needs to run.
#[derive(Debug, Clone, Default)]
pub struct TaskContext {
    pub layout: SiteLayout,
    pub options: AssetOptions,
}

impl TaskContext {
    pub fn new(layout: SiteLayout, options: AssetOptions) -> Self {
        Self { layout, options }
    }
}

/// Paths written by one task run.
#[derive(Debug, Clone, Default)]
pub struct TaskOutput {
    pub written: Vec<PathBuf>,
}

impl TaskOutput {
    pub fn new(written: Vec<PathBuf>) -> Self {
        Self { written }
    }

    pub fn len(&self) -> usize {
        self.written.len()
    }

    pub fn is_empty(&self) -> bool {
        self.written.is_empty()
    }
}

/// A named pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {
    Clean,
    Copy,
    OptimizeImages,
    CopyImages,
    Sprite,
    Styles,
    Html,
    Scripts,
    Svg,
    Webp,
}

impl Task {
    pub const ALL: [Task; 10] = [
        Task::Clean,
        Task::Copy,
        Task::OptimizeImages,
        Task::CopyImages,
        Task::Sprite,
        Task::Styles,
        Task::Html,
        Task::Scripts,
        Task::Svg,
        Task::Webp,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Task::Clean => "clean",
            Task::Copy => "copy",
            Task::OptimizeImages => "optimize-images",
            Task::CopyImages => "copy-images",
            Task::Sprite => "sprite",
            Task::Styles => "styles",
            Task::Html => "html",
            Task::Scripts => "scripts",
            Task::Svg => "svg",
            Task::Webp => "webp",
        }
    }

    /// Look a task up by its command-line name.
    pub fn from_name(name: &str) -> Option<Task> {
        Task::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Run the task to completion.
    pub fn run(&self, ctx: &TaskContext) -> Result<TaskOutput, BuildError> {
        let start = Instant::now();
        let layout = &ctx.layout;

        let output = match self {
            Task::Clean => clean::clean(&layout.output_dir)?,
            Task::Copy => copy::copy_static(layout)?,
            Task::OptimizeImages => images::optimize(layout, ctx.options.jpeg_quality)?,
            Task::CopyImages => images::copy(layout)?,
            Task::Sprite => svg::sprite(layout)?,
            Task::Styles => styles::compile(layout, &ctx.options.browsers)?,
            Task::Html => html::render(layout, ctx.options.mode)?,
            Task::Scripts => scripts::minify_all(layout)?,
            Task::Svg => svg::optimize_all(layout)?,
            Task::Webp => images::derive_webp(layout)?,
        };

        tracing::info!(
            "{} finished: {} files in {}ms",
            self.name(),
            output.len(),
            start.elapsed().as_millis()
        );

        Ok(output)
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Write `contents` to `path`, creating parent directories.
pub(crate) fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<(), BuildError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::write(parent, e))?;
    }
    fs::write(path, contents).map_err(|e| BuildError::write(path, e))
}

/// Copy `from` to `to`, creating parent directories.
pub(crate) fn copy_file(from: &Path, to: &Path) -> Result<(), BuildError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::write(parent, e))?;
    }
    fs::copy(from, to).map_err(|e| BuildError::write(to, e))?;
    Ok(())
}

/// Path of `path` relative to `base`, or the file name when it is not below it.
pub(crate) fn relative_to(path: &Path, base: &Path) -> PathBuf {
    path.strip_prefix(base)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.file_name().map(PathBuf::from).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_tasks_by_name() {
        for task in Task::ALL {
            assert_eq!(Task::from_name(task.name()), Some(task));
        }
        assert_eq!(Task::from_name("deploy"), None);
    }

    #[test]
    fn relative_path_falls_back_to_file_name() {
        assert_eq!(
            relative_to(Path::new("src/img/a/b.png"), Path::new("src/img")),
            PathBuf::from("a/b.png")
        );
        assert_eq!(
            relative_to(Path::new("other/b.png"), Path::new("src/img")),
            PathBuf::from("b.png")
        );
    }
}
