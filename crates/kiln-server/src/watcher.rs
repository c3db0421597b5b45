//! File watching for stylesheets and templates.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use kiln_assets::{SiteLayout, Task};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

/// A path must be quiet this long before its change is reported.
const COALESCE_WINDOW: Duration = Duration::from_millis(100);

/// Source changes the dev server reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A stylesheet was created, modified or removed
    Stylesheet(PathBuf),

    /// A top-level template was modified
    Template(PathBuf),
}

impl WatchEvent {
    /// The task that rebuilds the affected output.
    pub fn task(&self) -> Task {
        match self {
            WatchEvent::Stylesheet(_) => Task::Styles,
            WatchEvent::Template(_) => Task::Html,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Stylesheet(path) | WatchEvent::Template(path) => path,
        }
    }
}

/// File watcher over the stylesheet directory and the template root.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Start watching the sources of `layout`.
    ///
    /// Returns the watcher and a channel to receive events. Events stop when
    /// the watcher is dropped.
    pub fn new(
        layout: &SiteLayout,
    ) -> Result<(Self, async_mpsc::Receiver<WatchEvent>), std::io::Error> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        // Watch canonical paths so event paths compare equal to the layout.
        let layout = SiteLayout::new(
            layout.source_dir.canonicalize()?,
            layout.output_dir.clone(),
        );

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(std::io::Error::other)?;

        let styles_dir = layout.styles_dir();
        if styles_dir.exists() {
            watcher
                .watch(&styles_dir, RecursiveMode::Recursive)
                .map_err(std::io::Error::other)?;
        }
        watcher
            .watch(&layout.source_dir, RecursiveMode::NonRecursive)
            .map_err(std::io::Error::other)?;

        std::thread::spawn(move || {
            let mut debouncer = Debouncer::new(COALESCE_WINDOW);

            loop {
                let received = match debouncer.next_deadline() {
                    Some(deadline) => {
                        sync_rx.recv_timeout(deadline.saturating_duration_since(Instant::now()))
                    }
                    None => sync_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
                };

                match received {
                    Ok(event) => {
                        let now = Instant::now();
                        for path in &event.paths {
                            if let Some(watch_event) = classify_event(&layout, path, &event.kind) {
                                debouncer.push(watch_event, now);
                            }
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => return,
                }

                for watch_event in debouncer.take_due(Instant::now()) {
                    if async_tx.blocking_send(watch_event).is_err() {
                        return;
                    }
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

/// Trailing-edge debounce keyed by path.
///
/// Every notification restarts the path's quiet period, so a burst of writes
/// is reported once, after the last one.
#[derive(Debug)]
struct Debouncer {
    window: Duration,
    pending: HashMap<PathBuf, (WatchEvent, Instant)>,
}

impl Debouncer {
    fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    fn push(&mut self, event: WatchEvent, now: Instant) {
        let path = event.path().to_path_buf();
        self.pending.insert(path, (event, now + self.window));
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|(_, deadline)| *deadline).min()
    }

    /// Remove and return the events whose quiet period has ended, oldest first.
    fn take_due(&mut self, now: Instant) -> Vec<WatchEvent> {
        let mut due: Vec<(Instant, PathBuf)> = self
            .pending
            .iter()
            .filter(|(_, (_, deadline))| *deadline <= now)
            .map(|(path, (_, deadline))| (*deadline, path.clone()))
            .collect();
        due.sort();

        due.into_iter()
            .filter_map(|(_, path)| self.pending.remove(&path).map(|(event, _)| event))
            .collect()
    }
}

/// Classify a notify event into a WatchEvent.
///
/// Stylesheets react to any create, modify or remove; templates only to modification.
pub fn classify_event(layout: &SiteLayout, path: &Path, kind: &EventKind) -> Option<WatchEvent> {
    if layout.is_stylesheet(path) {
        return match kind {
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
                Some(WatchEvent::Stylesheet(path.to_path_buf()))
            }
            _ => None,
        };
    }

    if layout.is_template(path) {
        return match kind {
            EventKind::Modify(_) => Some(WatchEvent::Template(path.to_path_buf())),
            _ => None,
        };
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};
    use std::fs;
    use tempfile::tempdir;

    fn layout() -> SiteLayout {
        SiteLayout::new("/site/source", "/site/build")
    }

    #[test]
    fn classifies_stylesheet_changes() {
        let path = Path::new("/site/source/css/blocks/nav.css");

        for kind in [
            EventKind::Create(CreateKind::File),
            EventKind::Modify(ModifyKind::Any),
            EventKind::Remove(RemoveKind::File),
        ] {
            assert_eq!(
                classify_event(&layout(), path, &kind),
                Some(WatchEvent::Stylesheet(path.to_path_buf()))
            );
        }
    }

    #[test]
    fn templates_only_react_to_modification() {
        let path = Path::new("/site/source/index.html");

        assert_eq!(
            classify_event(&layout(), path, &EventKind::Modify(ModifyKind::Any)),
            Some(WatchEvent::Template(path.to_path_buf()))
        );
        assert_eq!(
            classify_event(&layout(), path, &EventKind::Create(CreateKind::File)),
            None
        );
    }

    #[test]
    fn ignores_other_sources() {
        let kind = EventKind::Modify(ModifyKind::Any);

        assert_eq!(
            classify_event(&layout(), Path::new("/site/source/js/main.js"), &kind),
            None
        );
        assert_eq!(
            classify_event(&layout(), Path::new("/site/source/layouts/base.html"), &kind),
            None
        );
    }

    #[test]
    fn maps_events_to_tasks() {
        assert_eq!(WatchEvent::Stylesheet(PathBuf::new()).task(), Task::Styles);
        assert_eq!(WatchEvent::Template(PathBuf::new()).task(), Task::Html);
    }

    #[test]
    fn debounce_reports_after_last_notification() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let path = PathBuf::from("/site/source/css/style.css");
        let start = Instant::now();

        debouncer.push(WatchEvent::Stylesheet(path.clone()), start);
        debouncer.push(
            WatchEvent::Stylesheet(path.clone()),
            start + Duration::from_millis(50),
        );

        assert_eq!(
            debouncer.next_deadline(),
            Some(start + Duration::from_millis(150))
        );
        assert!(debouncer.take_due(start + Duration::from_millis(120)).is_empty());
        assert_eq!(
            debouncer.take_due(start + Duration::from_millis(150)),
            vec![WatchEvent::Stylesheet(path)]
        );
        assert_eq!(debouncer.next_deadline(), None);
    }

    #[test]
    fn debounce_keeps_paths_apart() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let start = Instant::now();
        let css = PathBuf::from("/site/source/css/style.css");
        let html = PathBuf::from("/site/source/index.html");

        debouncer.push(WatchEvent::Stylesheet(css.clone()), start);
        debouncer.push(
            WatchEvent::Template(html.clone()),
            start + Duration::from_millis(10),
        );

        assert_eq!(
            debouncer.take_due(start + Duration::from_millis(200)),
            vec![WatchEvent::Stylesheet(css), WatchEvent::Template(html)]
        );
    }

    #[tokio::test]
    async fn single_save_sends_one_event() {
        let temp = tempdir().unwrap();
        let layout = SiteLayout::new(temp.path().join("source"), temp.path().join("build"));
        fs::create_dir_all(layout.styles_dir()).unwrap();
        fs::write(layout.styles_entry(), "a {}").unwrap();

        let (watcher, mut rx) = FileWatcher::new(&layout).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(layout.styles_entry(), "a { color: red; }").unwrap();

        let first = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;
        let second = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;
        drop(watcher);

        assert!(matches!(
            first.expect("timeout waiting for file watch event"),
            Some(WatchEvent::Stylesheet(_))
        ));
        assert!(second.is_err(), "expected a single event, got {:?}", second);
    }

    #[tokio::test]
    async fn watches_stylesheet_changes() {
        let temp = tempdir().unwrap();
        let layout = SiteLayout::new(temp.path().join("source"), temp.path().join("build"));
        fs::create_dir_all(layout.styles_dir()).unwrap();

        let (watcher, mut rx) = FileWatcher::new(&layout).unwrap();

        // Give inotify time to set up
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(layout.styles_dir().join("style.css"), "a {}").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;

        drop(watcher);

        let event = event.expect("timeout waiting for file watch event");
        assert!(matches!(event, Some(WatchEvent::Stylesheet(_))));
    }
}
