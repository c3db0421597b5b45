//! Publishing the output directory to a hosting branch.

use std::fs;
use std::path::{Path, PathBuf};

use tokio::process::Command;
use walkdir::WalkDir;

/// Errors that can occur while publishing.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("Nothing to publish: {0} is missing or empty. Run 'kiln build' first.")]
    MissingOutput(String),

    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for DeployError {
    fn from(e: std::io::Error) -> Self {
        DeployError::Io(e.to_string())
    }
}

/// Commit identity used instead of the user's git configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub email: String,
}

/// Outcome of a publish.
#[derive(Debug, Clone)]
pub struct PublishReport {
    /// Files in the published tree
    pub files: usize,

    /// Whether a new commit was pushed
    pub committed: bool,

    /// Resolved remote URL
    pub remote: String,

    pub branch: String,
}

/// Publishes a directory as the whole content of one branch of a git remote.
#[derive(Debug, Clone)]
pub struct Publisher {
    /// Repository whose remotes are used to resolve `remote`
    pub repo_dir: PathBuf,

    /// Remote name or URL
    pub remote: String,

    pub branch: String,

    pub message: String,

    pub author: Option<Author>,
}

impl Default for Publisher {
    fn default() -> Self {
        Self {
            repo_dir: PathBuf::from("."),
            remote: "origin".to_string(),
            branch: "gh-pages".to_string(),
            message: "Updates".to_string(),
            author: None,
        }
    }
}

impl Publisher {
    /// Replace the content of the hosting branch with `output_dir` and push it.
    ///
    /// Fails before touching the remote when there is nothing to publish.
    pub async fn publish(&self, output_dir: &Path) -> Result<PublishReport, DeployError> {
        ensure_output(output_dir)?;

        let remote = self.resolve_remote().await?;
        let work = tempfile::Builder::new().prefix("kiln-deploy").tempdir()?;
        let work_dir = work.path();

        if self.branch_exists(&remote).await? {
            tracing::info!("Cloning {} from {}", self.branch, remote);
            let target = work_dir.to_string_lossy();
            self.git(
                &self.repo_dir,
                &["clone", "--quiet", "--depth", "1", "--branch", &self.branch, &remote, &target],
            )
            .await?;
        } else {
            tracing::info!("Creating branch {} on {}", self.branch, remote);
            let head = format!("refs/heads/{}", self.branch);
            self.git(work_dir, &["init", "--quiet"]).await?;
            self.git(work_dir, &["symbolic-ref", "HEAD", &head]).await?;
            self.git(work_dir, &["remote", "add", "origin", &remote]).await?;
        }

        clear_worktree(work_dir)?;
        let files = copy_tree(output_dir, work_dir)?;

        self.git(work_dir, &["add", "--all"]).await?;
        let status = self.git(work_dir, &["status", "--porcelain"]).await?;
        if status.trim().is_empty() {
            tracing::info!("{} is already up to date", self.branch);
            return Ok(PublishReport {
                files,
                committed: false,
                remote,
                branch: self.branch.clone(),
            });
        }

        self.git(work_dir, &["commit", "--quiet", "-m", &self.message])
            .await?;

        let refspec = format!("HEAD:refs/heads/{}", self.branch);
        self.git(work_dir, &["push", "--quiet", "origin", &refspec])
            .await?;

        tracing::info!("Published {} files to {} ({})", files, remote, self.branch);

        Ok(PublishReport {
            files,
            committed: true,
            remote,
            branch: self.branch.clone(),
        })
    }

    /// A remote name is looked up in the repository; anything path- or URL-like is used directly.
    ///
    /// Relative filesystem remotes are resolved against `repo_dir`.
    async fn resolve_remote(&self) -> Result<String, DeployError> {
        let url = if self.remote.contains('/')
            || self.remote.contains(':')
            || self.remote.contains('\\')
        {
            self.remote.clone()
        } else {
            let url = self
                .git(&self.repo_dir, &["remote", "get-url", &self.remote])
                .await?;
            url.trim().to_string()
        };

        Ok(absolute_remote(&self.repo_dir, &url))
    }

    async fn branch_exists(&self, remote: &str) -> Result<bool, DeployError> {
        let heads = self
            .git(&self.repo_dir, &["ls-remote", "--heads", remote, &self.branch])
            .await?;
        let head = format!("refs/heads/{}", self.branch);

        Ok(heads.lines().any(|line| line.ends_with(&head)))
    }

    /// Run git in `dir` and return its stdout.
    async fn git(&self, dir: &Path, args: &[&str]) -> Result<String, DeployError> {
        let mut command = Command::new("git");
        command.args(args).current_dir(dir);

        if let Some(author) = &self.author {
            command
                .env("GIT_AUTHOR_NAME", &author.name)
                .env("GIT_AUTHOR_EMAIL", &author.email)
                .env("GIT_COMMITTER_NAME", &author.name)
                .env("GIT_COMMITTER_EMAIL", &author.email);
        }

        tracing::debug!("git {}", args.join(" "));
        let output = command.output().await?;

        if !output.status.success() {
            return Err(DeployError::Git {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Make a relative filesystem remote absolute. URLs and `host:path` remotes are returned unchanged.
fn absolute_remote(repo_dir: &Path, url: &str) -> String {
    let is_url = url.contains("://");
    let is_scp = match (url.find(':'), url.find('/')) {
        // A single letter before the colon is a Windows drive
        (Some(colon), slash) => colon > 1 && slash.map_or(true, |slash| colon < slash),
        (None, _) => false,
    };
    if is_url || is_scp || Path::new(url).is_absolute() {
        return url.to_string();
    }

    let joined = repo_dir.join(url);
    joined
        .canonicalize()
        .unwrap_or(joined)
        .display()
        .to_string()
}

fn ensure_output(output_dir: &Path) -> Result<(), DeployError> {
    let has_entries = fs::read_dir(output_dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false);

    if has_entries {
        Ok(())
    } else {
        Err(DeployError::MissingOutput(output_dir.display().to_string()))
    }
}

/// Remove everything from a checkout except its `.git` directory.
fn clear_worktree(dir: &Path) -> Result<(), DeployError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name() == ".git" {
            continue;
        }
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Copy the files below `from` into `to`, returning how many were copied.
fn copy_tree(from: &Path, to: &Path) -> Result<usize, DeployError> {
    let mut files = 0;

    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry.map_err(|e| DeployError::Io(e.to_string()))?;
        let rel = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| DeployError::Io(e.to_string()))?;
        let target = to.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
            files += 1;
        }
    }

    Ok(files)
}
