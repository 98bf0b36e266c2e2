//! Scenario tests for the editor synchronizer against a recording store.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::editor::widget::{MemoryView, Position, ScrollOffset, Selection};
use crate::editor::{
    DocPhase, DocumentStore, EditorSession, LanguageRegistry, MemoryWidgetFactory, SessionOptions,
    WidgetError, DOCUMENT_URI,
};
use crate::errors::{Result, StudioError};
use crate::notify::Notifier;

#[derive(Default)]
struct RecordingStore {
    saves: Mutex<Vec<(String, String)>>,
    /// When set, every save waits for a permit before resolving
    gate: Option<Arc<Notify>>,
    fail: AtomicBool,
}

impl RecordingStore {
    fn gated() -> (Arc<Self>, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        (
            Arc::new(Self {
                gate: Some(Arc::clone(&gate)),
                ..Self::default()
            }),
            gate,
        )
    }

    fn calls(&self) -> usize {
        self.saves.lock().unwrap().len()
    }

    fn last(&self) -> Option<String> {
        self.saves.lock().unwrap().last().map(|(_, c)| c.clone())
    }
}

#[async_trait]
impl DocumentStore for RecordingStore {
    async fn save(&self, project_id: &str, content: &str) -> Result<()> {
        self.saves
            .lock()
            .unwrap()
            .push((project_id.to_string(), content.to_string()));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(StudioError::Validation("backend unavailable".into()));
        }
        Ok(())
    }
}

struct Harness {
    session: EditorSession,
    view: MemoryView,
    factory: MemoryWidgetFactory,
    notifier: Notifier,
    changes: Arc<AtomicUsize>,
}

fn harness(options: SessionOptions, store: Arc<RecordingStore>) -> Harness {
    let notifier = Notifier::new();
    let mut factory = MemoryWidgetFactory::new();
    let mut session = EditorSession::new(options, store, notifier.clone());

    let changes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&changes);
    session.on_change(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    session.mount(&mut factory, &LanguageRegistry::new()).unwrap();
    let view = factory.view(DOCUMENT_URI).unwrap();
    Harness {
        session,
        view,
        factory,
        notifier,
        changes,
    }
}

fn project_options(text: &str) -> SessionOptions {
    SessionOptions::new(text).project("p1")
}

/// Type `text` and let the session see the notification.
fn edit(h: &mut Harness, text: &str) {
    h.view.type_text(text);
    h.session.process_changes();
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

// ─────────────────────────────────────────────────────────
// External updates
// ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn own_value_is_not_reapplied() {
    let store = Arc::new(RecordingStore::default());
    let mut h = harness(project_options("fn a() {}"), Arc::clone(&store));

    edit(&mut h, "fn a() { 1 }");
    edit(&mut h, "fn a() { 12 }");
    assert_eq!(h.changes.load(Ordering::SeqCst), 2);

    assert!(!h.session.apply_external("fn a() { 12 }"));
    assert_eq!(h.view.replacements(), 0);
    assert_eq!(h.view.text(), "fn a() { 12 }");
}

#[tokio::test(start_paused = true)]
async fn external_update_is_not_echoed_or_saved() {
    let store = Arc::new(RecordingStore::default());
    let mut h = harness(project_options("old"), Arc::clone(&store));

    assert!(h.session.apply_external("remote edit"));
    assert!(!h.session.process_changes());
    assert_eq!(h.view.text(), "remote edit");
    assert_eq!(h.view.replacements(), 1);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(h.changes.load(Ordering::SeqCst), 0);
    assert_eq!(store.calls(), 0);
    assert_eq!(h.session.phase(), DocPhase::Ready);
}

#[tokio::test(start_paused = true)]
async fn external_update_drops_pending_local_autosave() {
    let store = Arc::new(RecordingStore::default());
    let mut h = harness(project_options("base"), Arc::clone(&store));

    edit(&mut h, "local draft");
    assert_eq!(h.session.phase(), DocPhase::Dirty);
    assert!(h.session.apply_external("remote version"));
    assert_eq!(h.session.phase(), DocPhase::Ready);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(store.calls(), 0);
    assert_eq!(h.view.text(), "remote version");
    assert_eq!(h.session.value(), "remote version");
}

#[tokio::test(start_paused = true)]
async fn external_update_during_save_drops_held_autosave() {
    let (store, gate) = RecordingStore::gated();
    let mut h = harness(project_options(""), Arc::clone(&store));

    edit(&mut h, "a");
    let first = h.session.save_now().unwrap();
    settle().await;
    edit(&mut h, "ab");
    tokio::time::sleep(Duration::from_millis(1100)).await;

    h.session.apply_external("remote version");
    gate.notify_one();
    first.await.unwrap();
    settle().await;

    assert_eq!(store.calls(), 1);
    assert_eq!(store.last().as_deref(), Some("a"));
    assert_eq!(h.session.phase(), DocPhase::Ready);
}

#[tokio::test(start_paused = true)]
async fn view_state_is_clamped_after_shrinking_update() {
    let store = Arc::new(RecordingStore::default());
    let mut h = harness(
        project_options("line one\nline two\nline three"),
        Arc::clone(&store),
    );
    h.view.place_cursor(Position::new(3, 10), ScrollOffset { top: 38, left: 80 });

    h.session.apply_external("x");
    h.session.flush_frame();

    assert_eq!(h.view.text(), "x");
    assert_eq!(h.view.cursor(), Position::new(1, 2));
    assert_eq!(h.view.selections(), vec![Selection::caret(Position::new(1, 2))]);
    assert_eq!(h.view.scroll(), ScrollOffset { top: 0, left: 8 });
}

#[tokio::test(start_paused = true)]
async fn view_state_survives_growing_update() {
    let store = Arc::new(RecordingStore::default());
    let mut h = harness(project_options("a\nbb"), Arc::clone(&store));
    let scroll = ScrollOffset { top: 19, left: 0 };
    h.view.place_cursor(Position::new(2, 2), scroll);

    h.session.apply_external("a\nbb\nccc");
    h.session.flush_frame();

    assert_eq!(h.view.cursor(), Position::new(2, 2));
    assert_eq!(h.view.scroll(), scroll);
}

// ─────────────────────────────────────────────────────────
// Autosave
// ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn burst_of_edits_saves_once_after_window() {
    let store = Arc::new(RecordingStore::default());
    let mut h = harness(project_options(""), Arc::clone(&store));

    for i in 1..=5 {
        edit(&mut h, &"x".repeat(i));
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    // Last edit was 200ms ago.
    assert_eq!(store.calls(), 0);
    assert_eq!(h.session.phase(), DocPhase::Dirty);

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(store.calls(), 0);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(store.calls(), 1);
    assert_eq!(store.last().as_deref(), Some("xxxxx"));
    assert_eq!(h.session.phase(), DocPhase::Ready);
    // Autosave is silent on success.
    assert!(h.notifier.titles().is_empty());
}

#[tokio::test(start_paused = true)]
async fn manual_save_cancels_pending_autosave() {
    let store = Arc::new(RecordingStore::default());
    let mut h = harness(project_options(""), Arc::clone(&store));

    edit(&mut h, "let x = 1;");
    let handle = h.session.save_now().unwrap();
    handle.await.unwrap();
    assert_eq!(h.notifier.titles(), ["Changes saved"]);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(store.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn manual_save_while_in_flight_is_ignored() {
    let (store, gate) = RecordingStore::gated();
    let mut h = harness(project_options(""), Arc::clone(&store));

    edit(&mut h, "v1");
    let first = h.session.save_now().unwrap();
    assert!(h.session.save_now().is_none());
    settle().await;
    assert!(h.session.save_now().is_none());
    assert_eq!(h.session.phase(), DocPhase::Saving);

    gate.notify_one();
    first.await.unwrap();
    assert_eq!(store.calls(), 1);
    assert_eq!(h.session.phase(), DocPhase::Ready);
}

#[tokio::test(start_paused = true)]
async fn autosave_during_save_is_held_then_issued() {
    let (store, gate) = RecordingStore::gated();
    let mut h = harness(project_options(""), Arc::clone(&store));

    edit(&mut h, "a");
    let first = h.session.save_now().unwrap();
    settle().await;

    edit(&mut h, "ab");
    assert_eq!(h.session.phase(), DocPhase::Saving);
    tokio::time::sleep(Duration::from_millis(1100)).await;
    // The autosave fired but there is still only the one call in flight.
    assert_eq!(store.calls(), 1);

    gate.notify_one();
    settle().await;
    assert_eq!(store.calls(), 2);
    gate.notify_one();
    first.await.unwrap();

    assert_eq!(store.last().as_deref(), Some("ab"));
    assert_eq!(h.session.phase(), DocPhase::Ready);
}

#[tokio::test(start_paused = true)]
async fn edit_during_save_returns_to_dirty() {
    let (store, gate) = RecordingStore::gated();
    let mut h = harness(project_options(""), Arc::clone(&store));

    edit(&mut h, "a");
    let first = h.session.save_now().unwrap();
    settle().await;
    edit(&mut h, "ab");

    gate.notify_one();
    first.await.unwrap();
    assert_eq!(h.session.phase(), DocPhase::Dirty);
}

#[tokio::test(start_paused = true)]
async fn failed_save_keeps_buffer_and_notifies() {
    let store = Arc::new(RecordingStore::default());
    store.fail.store(true, Ordering::SeqCst);
    let mut h = harness(project_options(""), Arc::clone(&store));

    edit(&mut h, "unsaved work");
    h.session.save_now().unwrap().await.unwrap();

    assert_eq!(h.view.text(), "unsaved work");
    assert_eq!(h.session.value(), "unsaved work");
    assert_eq!(h.notifier.titles(), ["Save failed"]);
    assert_eq!(h.session.phase(), DocPhase::Ready);
}

#[tokio::test(start_paused = true)]
async fn no_save_without_project_or_when_read_only() {
    let store = Arc::new(RecordingStore::default());
    let mut h = harness(SessionOptions::new(""), Arc::clone(&store));
    edit(&mut h, "scratch");
    assert_eq!(h.changes.load(Ordering::SeqCst), 1);
    assert!(h.session.save_now().is_none());

    let mut ro = harness(project_options("shared code").read_only(true), Arc::clone(&store));
    ro.view.type_text("vandalism");
    assert!(!ro.session.process_changes());
    assert!(ro.session.save_now().is_none());

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(store.calls(), 0);
}

// ─────────────────────────────────────────────────────────
// Lifecycle
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn unmounted_container_is_retried() {
    let store = Arc::new(RecordingStore::default());
    let registry = LanguageRegistry::new();
    let mut factory = MemoryWidgetFactory::unmounted();
    let mut session = EditorSession::new(project_options("seed"), store, Notifier::new());

    assert_eq!(session.mount(&mut factory, &registry), Err(WidgetError::NotReady));
    assert_eq!(session.phase(), DocPhase::Uninitialized);
    assert!(session.save_now().is_none());

    factory.set_mounted(true);
    session.mount(&mut factory, &registry).unwrap();
    assert_eq!(session.phase(), DocPhase::Ready);

    let view = factory.view(DOCUMENT_URI).unwrap();
    assert_eq!(view.text(), "seed");
    assert_eq!(view.language(), "rust");
    assert!(registry.get("rust").is_some());
}

#[tokio::test]
async fn reused_buffer_is_reseeded() {
    let store: Arc<dyn DocumentStore> = Arc::new(RecordingStore::default());
    let registry = LanguageRegistry::new();
    let mut factory = MemoryWidgetFactory::new();

    let mut first =
        EditorSession::new(project_options("first"), Arc::clone(&store), Notifier::new());
    first.mount(&mut factory, &registry).unwrap();
    let mut second = EditorSession::new(project_options("second"), store, Notifier::new());
    second.mount(&mut factory, &registry).unwrap();

    assert_eq!(factory.live_buffers(), 1);
    assert_eq!(factory.view(DOCUMENT_URI).unwrap().text(), "second");
    assert!(!second.process_changes());
}

#[tokio::test]
async fn disposing_previous_session_keeps_shared_buffer() {
    let store: Arc<dyn DocumentStore> = Arc::new(RecordingStore::default());
    let registry = LanguageRegistry::new();
    let mut factory = MemoryWidgetFactory::new();

    let mut first =
        EditorSession::new(project_options("first"), Arc::clone(&store), Notifier::new());
    first.mount(&mut factory, &registry).unwrap();
    let mut second = EditorSession::new(project_options("second"), store, Notifier::new());
    second.mount(&mut factory, &registry).unwrap();

    first.dispose();
    assert_eq!(factory.live_buffers(), 1);

    let view = factory.view(DOCUMENT_URI).unwrap();
    assert!(!view.is_disposed());
    view.type_text("second, edited");
    assert!(second.process_changes());
    assert_eq!(second.value(), "second, edited");
    assert_eq!(second.phase(), DocPhase::Dirty);

    second.dispose();
    assert_eq!(factory.live_buffers(), 0);
}

#[tokio::test(start_paused = true)]
async fn dispose_is_idempotent_and_discards_late_results() {
    let (store, gate) = RecordingStore::gated();
    let mut h = harness(project_options(""), Arc::clone(&store));

    edit(&mut h, "in flight");
    let pending = h.session.save_now().unwrap();
    settle().await;

    h.session.dispose();
    h.session.dispose();
    assert_eq!(h.session.phase(), DocPhase::Disposed);
    assert!(h.view.is_disposed());
    assert_eq!(h.factory.live_buffers(), 0);

    gate.notify_one();
    pending.await.unwrap();
    assert_eq!(h.session.phase(), DocPhase::Disposed);
    assert!(h.notifier.titles().is_empty());

    assert!(!h.session.apply_external("late"));
    assert!(h.session.save_now().is_none());
    assert_eq!(
        h.session.mount(&mut h.factory, &LanguageRegistry::new()),
        Err(WidgetError::Disposed)
    );
}

#[tokio::test(start_paused = true)]
async fn dispose_cancels_pending_autosave() {
    let store = Arc::new(RecordingStore::default());
    let mut h = harness(project_options(""), Arc::clone(&store));

    edit(&mut h, "typed then closed");
    h.session.dispose();

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(store.calls(), 0);
}
