//! Optional `kiln.toml` configuration.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use kiln_assets::{AssetOptions, BrowserTargets, BuildMode, SiteLayout};
use kiln_deploy::{Author, Publisher};
use kiln_server::DevServerConfig;
use serde::Deserialize;

/// Configuration file structure (kiln.toml).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub images: ImageSettings,
    /// Browsers that vendor prefixes are generated for
    #[serde(default)]
    pub styles: BrowserTargets,
    #[serde(default)]
    pub deploy: DeploySettings,
}

#[derive(Debug, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "default_output")]
    pub output: String,
}

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub open: bool,
}

#[derive(Debug, Deserialize)]
pub struct ImageSettings {
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Deserialize)]
pub struct DeploySettings {
    #[serde(default = "default_remote")]
    pub remote: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_message")]
    pub message: String,
    /// Commit identity; the git configuration is used when unset
    pub user_name: Option<String>,
    pub user_email: Option<String>,
}

fn default_source() -> String {
    "source".to_string()
}
fn default_output() -> String {
    "build".to_string()
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_true() -> bool {
    true
}
fn default_jpeg_quality() -> u8 {
    75
}
fn default_remote() -> String {
    "origin".to_string()
}
fn default_branch() -> String {
    "gh-pages".to_string()
}
fn default_message() -> String {
    "Updates".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            output: default_output(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            open: default_true(),
        }
    }
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            remote: default_remote(),
            branch: default_branch(),
            message: default_message(),
            user_name: None,
            user_email: None,
        }
    }
}

impl ConfigFile {
    pub fn layout(&self) -> SiteLayout {
        SiteLayout::new(&self.paths.source, &self.paths.output)
    }

    pub fn asset_options(&self, mode: BuildMode) -> AssetOptions {
        AssetOptions {
            mode,
            jpeg_quality: self.images.jpeg_quality,
            browsers: self.styles,
        }
    }

    pub fn server_config(&self) -> DevServerConfig {
        DevServerConfig {
            root: PathBuf::from(&self.paths.output),
            port: self.server.port,
            host: self.server.host.clone(),
            open: self.server.open,
            live_reload: true,
        }
    }

    pub fn publisher(&self) -> Publisher {
        let author = match (&self.deploy.user_name, &self.deploy.user_email) {
            (Some(name), Some(email)) => Some(Author {
                name: name.clone(),
                email: email.clone(),
            }),
            _ => None,
        };

        Publisher {
            repo_dir: PathBuf::from("."),
            remote: self.deploy.remote.clone(),
            branch: self.deploy.branch.clone(),
            message: self.deploy.message.clone(),
            author,
        }
    }
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: ConfigFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());
        return Ok(config);
    }
    Ok(ConfigFile::default())
}
