//! Task graph and stage scheduler.
//!
//! A pipeline is a DAG of tasks. It is run stage by stage: every task whose
//! dependencies have completed runs concurrently with its siblings on the
//! rayon pool, and the next stage starts only when the whole stage is done.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::time::Instant;

use rayon::prelude::*;

use crate::error::BuildError;
use crate::tasks::{BuildMode, Task, TaskContext};

/// A task and the tasks that must finish before it starts.
#[derive(Debug, Clone)]
struct Node {
    task: Task,
    deps: Vec<Task>,
}

/// Result of running a pipeline.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Files written by each task, in completion order
    pub tasks: Vec<(Task, usize)>,

    /// Every written path and the task that wrote it
    pub outputs: BTreeMap<PathBuf, Task>,

    /// Total build time in milliseconds
    pub duration_ms: u64,
}

impl BuildReport {
    pub fn files(&self) -> usize {
        self.outputs.len()
    }
}

/// A directed acyclic graph of tasks.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    nodes: Vec<Node>,
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task that runs after all of `deps`.
    pub fn task(mut self, task: Task, deps: &[Task]) -> Self {
        self.nodes.push(Node {
            task,
            deps: deps.to_vec(),
        });
        self
    }

    /// One-shot production build.
    pub fn production() -> Self {
        Self::new()
            .task(Task::Clean, &[])
            .task(Task::Copy, &[Task::Clean])
            .task(Task::OptimizeImages, &[Task::Copy])
            .task(Task::Sprite, &[Task::OptimizeImages])
            .task(Task::Styles, &[Task::Sprite])
            .task(Task::Html, &[Task::Sprite])
            .task(Task::Svg, &[Task::Sprite])
            .task(Task::Scripts, &[Task::Sprite])
            .task(Task::Webp, &[Task::Sprite])
    }

    /// Build for the dev server: images are copied instead of recompressed.
    pub fn development() -> Self {
        Self::new()
            .task(Task::Clean, &[])
            .task(Task::Copy, &[Task::Clean])
            .task(Task::CopyImages, &[Task::Copy])
            .task(Task::Sprite, &[Task::CopyImages])
            .task(Task::Svg, &[Task::Sprite])
            .task(Task::Scripts, &[Task::Sprite])
            .task(Task::Html, &[Task::Sprite])
            .task(Task::Styles, &[Task::Sprite])
            .task(Task::Webp, &[Task::Sprite])
    }

    pub fn for_mode(mode: BuildMode) -> Self {
        match mode {
            BuildMode::Production => Self::production(),
            BuildMode::Development => Self::development(),
        }
    }

    /// Group tasks into stages so that every task comes after all of its dependencies.
    ///
    /// Tasks keep their declaration order inside a stage.
    pub fn stages(&self) -> Result<Vec<Vec<Task>>, BuildError> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.task) {
                return Err(BuildError::Graph(format!("task {} declared twice", node.task)));
            }
        }
        for node in &self.nodes {
            if let Some(dep) = node.deps.iter().find(|d| !seen.contains(d)) {
                return Err(BuildError::Graph(format!(
                    "task {} depends on undeclared task {}",
                    node.task, dep
                )));
            }
        }

        let mut remaining: HashMap<Task, usize> = self
            .nodes
            .iter()
            .map(|n| (n.task, n.deps.len()))
            .collect();
        let mut done: HashSet<Task> = HashSet::new();
        let mut stages = Vec::new();

        while done.len() < self.nodes.len() {
            let stage: Vec<Task> = self
                .nodes
                .iter()
                .filter(|n| !done.contains(&n.task) && remaining[&n.task] == 0)
                .map(|n| n.task)
                .collect();

            if stage.is_empty() {
                let stuck: Vec<&str> = self
                    .nodes
                    .iter()
                    .filter(|n| !done.contains(&n.task))
                    .map(|n| n.task.name())
                    .collect();
                return Err(BuildError::Graph(format!(
                    "dependency cycle among {}",
                    stuck.join(", ")
                )));
            }

            for node in &self.nodes {
                let finished = node.deps.iter().filter(|d| stage.contains(d)).count();
                if let Some(count) = remaining.get_mut(&node.task) {
                    *count -= finished;
                }
            }
            done.extend(stage.iter().copied());
            stages.push(stage);
        }

        Ok(stages)
    }

    /// Run every stage in order.
    ///
    /// A failing task does not cancel its siblings; the stage runs to
    /// completion and then the first failure is returned.
    pub fn run(&self, ctx: &TaskContext) -> Result<BuildReport, BuildError> {
        let start = Instant::now();
        let stages = self.stages()?;
        let mut report = BuildReport::default();

        for stage in stages {
            tracing::debug!(
                "Running stage: {}",
                stage.iter().map(Task::name).collect::<Vec<_>>().join(", ")
            );

            let results: Vec<_> = stage.par_iter().map(|task| (*task, task.run(ctx))).collect();

            let mut failure = None;
            for (task, result) in results {
                match result {
                    Ok(output) => {
                        report.tasks.push((task, output.len()));
                        for path in output.written {
                            if let Some(first) = report.outputs.get(&path) {
                                return Err(BuildError::OutputConflict {
                                    path,
                                    first: first.name(),
                                    second: task.name(),
                                });
                            }
                            report.outputs.insert(path, task);
                        }
                    }
                    Err(e) => {
                        tracing::error!("{} failed: {}", task, e);
                        if failure.is_none() {
                            failure = Some(BuildError::TaskFailed {
                                task: task.name(),
                                source: Box::new(e),
                            });
                        }
                    }
                }
            }

            if let Some(e) = failure {
                return Err(e);
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::SiteLayout;
    use crate::tasks::AssetOptions;
    use image::{Rgba, RgbaImage};
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;
    use walkdir::WalkDir;

    const ICON: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 8 8"><path d="M0 0h8v8H0z"/></svg>"#;

    fn write(path: &Path, contents: impl AsRef<[u8]>) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn site(mode: BuildMode) -> (tempfile::TempDir, TaskContext) {
        let temp = tempdir().unwrap();
        let layout = SiteLayout::new(temp.path().join("source"), temp.path().join("build"));
        let src = &layout.source_dir;

        write(&src.join("css/style.css"), "@import \"base.css\";\n.nav { display: flex; }\n");
        write(&src.join("css/base.css"), "body { margin: 0; }\n");
        write(
            &src.join("index.html"),
            "<html>\n<body>\n  {% include \"img/sprite.svg\" %}\n  <h1>Home</h1>\n</body>\n</html>\n",
        );
        write(&src.join("js/main.js"), "function toggle(menuState) { return !menuState; }\n");
        write(&src.join("img/logo.svg"), ICON);
        write(&src.join("img/icons/menu.svg"), ICON);
        write(&src.join("fonts/inter.woff2"), b"woff2");
        write(&src.join("favicon.ico"), b"ico");
        write(&src.join("manifest.webmanifest"), b"{}");
        RgbaImage::from_fn(8, 8, |x, y| Rgba([x as u8 * 30, y as u8 * 30, 90, 255]))
            .save(src.join("img/photo.png"))
            .unwrap();

        let options = AssetOptions {
            mode,
            ..AssetOptions::default()
        };
        (temp, TaskContext::new(layout, options))
    }

    fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let rel = e.path().strip_prefix(dir).unwrap().to_path_buf();
                (rel, fs::read(e.path()).unwrap())
            })
            .collect()
    }

    #[test]
    fn production_stages_follow_dependencies() {
        let stages = Pipeline::production().stages().unwrap();

        assert_eq!(
            stages,
            vec![
                vec![Task::Clean],
                vec![Task::Copy],
                vec![Task::OptimizeImages],
                vec![Task::Sprite],
                vec![Task::Styles, Task::Html, Task::Svg, Task::Scripts, Task::Webp],
            ]
        );
    }

    #[test]
    fn development_copies_images() {
        let stages = Pipeline::development().stages().unwrap();

        assert_eq!(stages[2], vec![Task::CopyImages]);
        assert_eq!(stages[4].len(), 5);
    }

    #[test]
    fn detects_cycles() {
        let pipeline = Pipeline::new()
            .task(Task::Clean, &[Task::Copy])
            .task(Task::Copy, &[Task::Clean]);

        assert!(matches!(pipeline.stages(), Err(BuildError::Graph(_))));
    }

    #[test]
    fn rejects_undeclared_dependencies() {
        let pipeline = Pipeline::new().task(Task::Copy, &[Task::Clean]);

        assert!(matches!(pipeline.stages(), Err(BuildError::Graph(_))));
    }

    #[test]
    fn builds_every_output() {
        let (_temp, ctx) = site(BuildMode::Production);

        let report = Pipeline::production().run(&ctx).unwrap();

        let out = &ctx.layout.output_dir;
        for rel in [
            "index.html",
            "css/style.css",
            "css/style.css.map",
            "js/main.js",
            "img/photo.png",
            "img/photo.webp",
            "img/logo.svg",
            "img/sprite.svg",
            "fonts/inter.woff2",
            "favicon.ico",
            "manifest.webmanifest",
        ] {
            assert!(out.join(rel).is_file(), "missing {}", rel);
            assert!(report.outputs.contains_key(&out.join(rel)), "unreported {}", rel);
        }

        let html = fs::read_to_string(out.join("index.html")).unwrap();
        assert!(html.contains("<symbol id=\"menu\""));
        assert!(ctx.layout.sprite_path().exists());
    }

    #[test]
    fn rebuild_over_stale_output_is_identical() {
        let (_temp, ctx) = site(BuildMode::Production);
        let out = ctx.layout.output_dir.clone();

        Pipeline::production().run(&ctx).unwrap();
        let first = snapshot(&out);

        fs::write(out.join("stale.html"), "old").unwrap();
        fs::write(out.join("css/style.css"), "stale").unwrap();
        Pipeline::production().run(&ctx).unwrap();

        assert_eq!(snapshot(&out), first);
    }

    #[test]
    fn failing_task_does_not_cancel_siblings() {
        let (_temp, ctx) = site(BuildMode::Development);
        fs::write(ctx.layout.styles_entry(), "@import \"gone.css\";").unwrap();

        let err = Pipeline::development().run(&ctx).unwrap_err();

        match err {
            BuildError::TaskFailed { task, .. } => assert_eq!(task, "styles"),
            other => panic!("expected task failure, got {:?}", other),
        }
        assert!(ctx.layout.output_dir.join("index.html").exists());
        assert!(ctx.layout.output_dir.join("js/main.js").exists());
    }

    #[test]
    fn detects_conflicting_outputs() {
        let (_temp, ctx) = site(BuildMode::Production);
        let pipeline = Pipeline::new()
            .task(Task::Clean, &[])
            .task(Task::OptimizeImages, &[Task::Clean])
            .task(Task::CopyImages, &[Task::OptimizeImages]);

        match pipeline.run(&ctx).unwrap_err() {
            BuildError::OutputConflict { first, second, .. } => {
                assert_eq!((first, second), ("optimize-images", "copy-images"));
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }
}
