//! Asset tasks for kiln sites.
//!
//! Compiles stylesheets, templates, scripts and images from a source tree into
//! an output tree, wired together as an explicit task graph.

pub mod error;
pub mod layout;
pub mod pipeline;
pub mod tasks;

pub use error::BuildError;
pub use layout::SiteLayout;
pub use pipeline::{BuildReport, Pipeline};
pub use tasks::{AssetOptions, BrowserTargets, BuildMode, Task, TaskContext, TaskOutput};
