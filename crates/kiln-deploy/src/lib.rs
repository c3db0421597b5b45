//! Deployment of built kiln sites.
//!
//! Publishes the output directory as the content of a hosting branch
//! (`gh-pages` by default) of a git remote, using the `git` executable.

pub mod publish;

pub use publish::{Author, DeployError, PublishReport, Publisher};
