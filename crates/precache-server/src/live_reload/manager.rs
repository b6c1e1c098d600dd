//! Watch, regenerate, reload.
//!
//! The watcher callback only records events into the debouncer. A single
//! processing task drains settled changes and handles each batch in turn, so
//! at most one regeneration runs at any time and a burst of saves results in
//! one regeneration followed by one reload broadcast.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use precache_manifest::{ManifestGenerator, PatternSet};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};

use super::debouncer::{ChangeDebouncer, ChangeKind};
use crate::error::ServerError;
use crate::session::SessionState;

/// How often settled changes are collected.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Message pushed to connected browsers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub(crate) enum ReloadMessage {
    /// The worker was regenerated; reload the page.
    Reload,
    /// Regeneration failed; the previous worker is still in place.
    GenerationFailed { message: String },
}

/// Owns the file watcher and the regeneration loop.
pub(crate) struct LiveReloadManager {
    root_dir: PathBuf,
    patterns: PatternSet,
    generator: Arc<ManifestGenerator>,
    broadcaster: broadcast::Sender<ReloadMessage>,
    state: watch::Sender<SessionState>,
    watcher: Option<RecommendedWatcher>,
    debounce: Duration,
}

impl LiveReloadManager {
    /// Create a manager for `generator`'s root directory.
    ///
    /// Nothing is watched until [`start`](Self::start) is called.
    pub(crate) fn new(
        patterns: PatternSet,
        generator: Arc<ManifestGenerator>,
        state: watch::Sender<SessionState>,
        debounce: Duration,
    ) -> Self {
        let (broadcaster, _) = broadcast::channel(16);
        Self {
            root_dir: generator.config().root_dir.clone(),
            patterns,
            generator,
            broadcaster,
            state,
            watcher: None,
            debounce,
        }
    }

    /// Start watching and spawn the processing tasks.
    pub(crate) fn start(&mut self) -> Result<(), ServerError> {
        let (tx, mut rx) = mpsc::channel::<Event>(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    let _ = tx.blocking_send(event);
                }
                Err(e) => tracing::warn!(error = %e, "File watcher error"),
            }
        })
        .map_err(|source| self.watch_error(source))?;

        watcher
            .watch(&self.root_dir, RecursiveMode::Recursive)
            .map_err(|source| self.watch_error(source))?;
        self.watcher = Some(watcher);

        let debouncer = Arc::new(ChangeDebouncer::new(self.debounce));

        let filter = ChangeFilter::new(
            self.root_dir.clone(),
            self.patterns.clone(),
            &self.generator.config().output_path(),
        );
        let recorder = Arc::clone(&debouncer);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                filter.record(&event, &recorder);
            }
        });

        let generator = Arc::clone(&self.generator);
        let state = self.state.clone();
        let broadcaster = self.broadcaster.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(POLL_INTERVAL);
            loop {
                interval.tick().await;
                if debouncer.is_idle() {
                    continue;
                }

                let changes = debouncer.drain_ready();
                if changes.is_empty() {
                    continue;
                }
                for change in &changes {
                    tracing::info!(path = %change.path.display(), kind = ?change.kind, "File changed");
                }
                regenerate(Arc::clone(&generator), &state, &broadcaster).await;
            }
        });

        tracing::info!(root = %self.root_dir.display(), "Watching for changes");
        Ok(())
    }

    fn watch_error(&self, source: notify::Error) -> ServerError {
        ServerError::Watch {
            path: self.root_dir.clone(),
            source,
        }
    }

    /// Get a receiver for reload messages.
    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.broadcaster.subscribe()
    }
}

/// Decides which watcher events count as changes.
struct ChangeFilter {
    root_dir: PathBuf,
    patterns: PatternSet,
    /// The worker script and its temp file, written by regeneration itself.
    ignored: [PathBuf; 2],
}

impl ChangeFilter {
    fn new(root_dir: PathBuf, patterns: PatternSet, output: &Path) -> Self {
        let mut tmp = output.as_os_str().to_owned();
        tmp.push(".tmp");
        Self {
            root_dir,
            patterns,
            ignored: [output.to_path_buf(), PathBuf::from(tmp)],
        }
    }

    fn record(&self, event: &Event, debouncer: &ChangeDebouncer) {
        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Modify(_) => ChangeKind::Modified,
            EventKind::Remove(_) => ChangeKind::Removed,
            _ => return,
        };

        for path in &event.paths {
            if self.accepts(path) {
                debouncer.record(path.clone(), kind);
                tracing::debug!(path = %path.display(), ?kind, "Recorded filesystem event");
            }
        }
    }

    fn accepts(&self, path: &Path) -> bool {
        if self.ignored.iter().any(|ignored| ignored == path) {
            return false;
        }
        path.strip_prefix(&self.root_dir)
            .is_ok_and(|relative| self.patterns.matches(relative))
    }
}

/// Run one regeneration and tell browsers about the outcome.
///
/// A failure keeps the previous worker script and is reported, never fatal.
pub(crate) async fn regenerate(
    generator: Arc<ManifestGenerator>,
    state: &watch::Sender<SessionState>,
    broadcaster: &broadcast::Sender<ReloadMessage>,
) -> ReloadMessage {
    let start = Instant::now();
    state.send_replace(SessionState::Regenerating);

    let result = tokio::task::spawn_blocking(move || generator.generate()).await;

    let message = match result {
        Ok(Ok(generation)) => {
            tracing::info!(
                resources = generation.manifest.len(),
                elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Service worker regenerated"
            );
            ReloadMessage::Reload
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Service worker regeneration failed, keeping previous output");
            ReloadMessage::GenerationFailed {
                message: e.to_string(),
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Service worker regeneration task failed");
            ReloadMessage::GenerationFailed {
                message: e.to_string(),
            }
        }
    };

    let last_error = match &message {
        ReloadMessage::Reload => None,
        ReloadMessage::GenerationFailed { message } => Some(message.clone()),
    };
    state.send_replace(SessionState::Idle { last_error });

    // No receivers just means no browser is connected
    let _ = broadcaster.send(message.clone());
    message
}

#[cfg(test)]
mod tests {
    use std::fs;

    use notify::event::{CreateKind, ModifyKind};
    use precache_manifest::GeneratorConfig;
    use pretty_assertions::assert_eq;

    use super::*;

    fn filter(root: &str, patterns: &[&str]) -> ChangeFilter {
        ChangeFilter::new(
            PathBuf::from(root),
            PatternSet::new(patterns).unwrap(),
            &PathBuf::from(root).join("sw.js"),
        )
    }

    fn generator(root: &Path, globs: &[&str]) -> Arc<ManifestGenerator> {
        let globs = globs.iter().map(|g| (*g).to_owned()).collect();
        Arc::new(ManifestGenerator::new(GeneratorConfig::new(root, globs)))
    }

    fn message_text(message: &ReloadMessage) -> &str {
        match message {
            ReloadMessage::GenerationFailed { message } => message,
            ReloadMessage::Reload => panic!("expected a failure"),
        }
    }

    #[test]
    fn test_reload_message_serialization() {
        let reload = serde_json::to_value(ReloadMessage::Reload).unwrap();
        let failed = serde_json::to_value(ReloadMessage::GenerationFailed {
            message: "boom".to_owned(),
        })
        .unwrap();

        assert_eq!(reload, serde_json::json!({ "type": "reload" }));
        assert_eq!(
            failed,
            serde_json::json!({ "type": "generation-failed", "message": "boom" })
        );
    }

    #[test]
    fn test_filter_accepts_watched_assets() {
        let filter = filter("/site", &["public/**/*.{js,html,css,png,jpg,gif}"]);

        assert!(filter.accepts(Path::new("/site/public/app.js")));
        assert!(filter.accepts(Path::new("/site/public/img/logo.png")));
        assert!(!filter.accepts(Path::new("/site/public/notes.txt")));
        assert!(!filter.accepts(Path::new("/site/src/app.js")));
        assert!(!filter.accepts(Path::new("/elsewhere/public/app.js")));
    }

    #[test]
    fn test_filter_ignores_own_output() {
        let filter = filter("/site", &["**/*.js", "**/*.tmp"]);

        assert!(!filter.accepts(Path::new("/site/sw.js")));
        assert!(!filter.accepts(Path::new("/site/sw.js.tmp")));
        assert!(filter.accepts(Path::new("/site/app.js")));
    }

    #[test]
    fn test_filter_records_only_content_events() {
        let filter = filter("/site", &["*.js"]);
        let debouncer = ChangeDebouncer::new(Duration::ZERO);

        let access = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/site/app.js"));
        filter.record(&access, &debouncer);
        assert!(debouncer.is_idle());

        let create = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/site/app.js"));
        let modify = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/site/app.js"));
        filter.record(&create, &debouncer);
        filter.record(&modify, &debouncer);

        let changes = debouncer.drain_ready();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Created);
    }

    #[tokio::test]
    async fn test_regenerate_writes_worker_and_broadcasts_reload() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("index.html"), "A").unwrap();
        let (state, mut state_rx) = watch::channel(SessionState::default());
        let (broadcaster, mut receiver) = broadcast::channel(4);

        let message = regenerate(generator(temp.path(), &["*.html"]), &state, &broadcaster).await;

        assert_eq!(message, ReloadMessage::Reload);
        assert_eq!(receiver.recv().await.unwrap(), ReloadMessage::Reload);
        assert!(state_rx.has_changed().unwrap());
        assert_eq!(*state_rx.borrow_and_update(), SessionState::default());
        assert!(temp.path().join("sw.js").exists());
    }

    #[tokio::test]
    async fn test_regenerate_failure_keeps_previous_output() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("sw.js"), "previous").unwrap();
        let (state, _state_rx) = watch::channel(SessionState::default());
        let (broadcaster, mut receiver) = broadcast::channel(4);

        let message = regenerate(generator(temp.path(), &["[broken"]), &state, &broadcaster).await;

        assert!(matches!(message, ReloadMessage::GenerationFailed { .. }));
        assert_eq!(receiver.recv().await.unwrap(), message);
        assert_eq!(
            *state.borrow(),
            SessionState::Idle {
                last_error: Some(message_text(&message).to_owned())
            }
        );
        assert_eq!(
            fs::read_to_string(temp.path().join("sw.js")).unwrap(),
            "previous"
        );
    }

    #[tokio::test]
    async fn test_regenerate_without_subscribers() {
        let temp = tempfile::tempdir().unwrap();
        let (state, _state_rx) = watch::channel(SessionState::default());
        let (broadcaster, _) = broadcast::channel(4);

        let message = regenerate(generator(temp.path(), &["*.html"]), &state, &broadcaster).await;

        assert_eq!(message, ReloadMessage::Reload);
    }

    #[tokio::test]
    async fn test_manager_subscribe_receives_broadcasts() {
        let temp = tempfile::tempdir().unwrap();
        let (state, _state_rx) = watch::channel(SessionState::default());
        let manager = LiveReloadManager::new(
            PatternSet::new(&["*.html"]).unwrap(),
            generator(temp.path(), &["*.html"]),
            state,
            Duration::from_millis(100),
        );
        let mut receiver = manager.subscribe();

        manager.broadcaster.send(ReloadMessage::Reload).unwrap();

        assert_eq!(receiver.recv().await.unwrap(), ReloadMessage::Reload);
    }
}
