//! Per-document synchronizer between a parent-owned text value and the
//! embedded widget's buffer.
//!
//! The parent's value is the source of truth. Local edits flow out through
//! [`EditorSession::process_changes`] (change callback, then a debounced
//! save); external updates flow in through [`EditorSession::apply_external`]
//! with the cursor, selections and scroll offset restored on the next
//! [`EditorSession::flush_frame`].
//!
//! Saves never overlap: at most one persistence call is in flight per
//! document. A debounced save that fires during an in-flight save is held
//! and issued once that save resolves; a manual save during one is ignored.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::debounce::Debouncer;
use super::language::{LanguageProfile, LanguageRegistry, RUST_LANGUAGE_ID};
use super::widget::{
    ContentChange, EditorWidget, Position, ScrollOffset, Selection, WidgetError, WidgetFactory,
    WidgetOptions,
};
use crate::errors::Result;
use crate::notify::Notifier;

/// Virtual identity of the single editable document.
pub const DOCUMENT_URI: &str = "file:///main.rs";
pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_millis(1000);

/// Where a session persists its buffer.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    async fn save(&self, project_id: &str, content: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DocPhase {
    Uninitialized,
    Ready,
    Dirty,
    Saving,
    Disposed,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub initial_text: String,
    pub project_id: Option<String>,
    pub read_only: bool,
    pub autosave_delay: Duration,
}

impl SessionOptions {
    pub fn new(initial_text: impl Into<String>) -> Self {
        Self {
            initial_text: initial_text.into(),
            project_id: None,
            read_only: false,
            autosave_delay: DEFAULT_AUTOSAVE_DELAY,
        }
    }

    pub fn project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn autosave_delay(mut self, delay: Duration) -> Self {
        self.autosave_delay = delay;
        self
    }
}

/// View state captured before an external replacement.
#[derive(Debug, Clone)]
struct ViewState {
    cursor: Position,
    selections: Vec<Selection>,
    scroll: ScrollOffset,
}

#[derive(Debug)]
struct DocState {
    phase: DocPhase,
    in_flight: bool,
    edited_during_save: bool,
    /// Latest content from a debounced save that fired while in flight
    held: Option<String>,
}

struct Shared {
    store: Arc<dyn DocumentStore>,
    notifier: Notifier,
    state: Mutex<DocState>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, DocState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Entry point of a debounced save.
    async fn fire_debounced(self: Arc<Self>, project_id: String, content: String) {
        {
            let mut st = self.state();
            if st.phase == DocPhase::Disposed {
                return;
            }
            if st.in_flight {
                debug!("Save in flight for {project_id}, holding autosave");
                // The held content covers every edit made so far.
                st.edited_during_save = false;
                st.held = Some(content);
                return;
            }
            st.in_flight = true;
            st.phase = DocPhase::Saving;
        }
        self.persist(project_id, content, false).await;
    }

    /// Issue saves until nothing is held. The caller has set `in_flight`.
    async fn persist(self: Arc<Self>, project_id: String, mut content: String, mut manual: bool) {
        loop {
            let result = self.store.save(&project_id, &content).await;

            let mut st = self.state();
            if st.phase == DocPhase::Disposed {
                // Nobody is listening any more.
                st.in_flight = false;
                return;
            }
            match result {
                Ok(()) => {
                    debug!("Saved {} bytes to {project_id}", content.len());
                    if manual {
                        self.notifier
                            .success("Changes saved", "Your code has been saved successfully");
                    }
                }
                Err(e) => {
                    warn!("Saving {project_id} failed: {e}");
                    self.notifier
                        .error("Save failed", "Failed to save your changes. Please try again.");
                }
            }

            match st.held.take() {
                Some(next) => {
                    content = next;
                    manual = false;
                }
                None => {
                    st.in_flight = false;
                    st.phase = if std::mem::take(&mut st.edited_during_save) {
                        DocPhase::Dirty
                    } else {
                        DocPhase::Ready
                    };
                    return;
                }
            }
        }
    }
}

type ChangeCallback = Box<dyn FnMut(&str) + Send>;

pub struct EditorSession {
    options: SessionOptions,
    widget: Option<Box<dyn EditorWidget>>,
    changes: Option<UnboundedReceiver<ContentChange>>,
    /// Last value this session emitted or accepted
    last_value: String,
    pending_restore: Option<ViewState>,
    debouncer: Debouncer,
    on_change: Option<ChangeCallback>,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("project_id", &self.options.project_id)
            .field("phase", &self.phase())
            .field("mounted", &self.widget.is_some())
            .finish()
    }
}

impl EditorSession {
    pub fn new(options: SessionOptions, store: Arc<dyn DocumentStore>, notifier: Notifier) -> Self {
        Self {
            last_value: options.initial_text.clone(),
            debouncer: Debouncer::new(options.autosave_delay),
            options,
            widget: None,
            changes: None,
            pending_restore: None,
            on_change: None,
            shared: Arc::new(Shared {
                store,
                notifier,
                state: Mutex::new(DocState {
                    phase: DocPhase::Uninitialized,
                    in_flight: false,
                    edited_during_save: false,
                    held: None,
                }),
            }),
        }
    }

    /// Called with the new buffer text after every propagated local edit.
    pub fn on_change<F>(&mut self, callback: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.on_change = Some(Box::new(callback));
    }

    pub fn phase(&self) -> DocPhase {
        self.shared.state().phase
    }

    pub fn project_id(&self) -> Option<&str> {
        self.options.project_id.as_deref()
    }

    pub fn is_mounted(&self) -> bool {
        self.widget.is_some()
    }

    /// The last value emitted to the parent or accepted from it.
    pub fn value(&self) -> &str {
        &self.last_value
    }

    /// Create the widget. `WidgetError::NotReady` leaves the session
    /// uninitialized so the caller can retry on the next mount.
    pub fn mount(
        &mut self,
        factory: &mut dyn WidgetFactory,
        languages: &LanguageRegistry,
    ) -> std::result::Result<(), WidgetError> {
        match self.phase() {
            DocPhase::Disposed => return Err(WidgetError::Disposed),
            DocPhase::Uninitialized => {}
            _ => return Ok(()),
        }

        languages.register_once(RUST_LANGUAGE_ID, LanguageProfile::stylus);

        let (tx, rx) = mpsc::unbounded_channel();
        let mut widget = factory.create(
            &WidgetOptions {
                uri: DOCUMENT_URI.to_string(),
                language: RUST_LANGUAGE_ID,
                initial_text: self.last_value.clone(),
                read_only: self.options.read_only,
            },
            tx,
        )?;

        // A reused buffer may still hold another document's text.
        if widget.text() != self.last_value {
            widget.replace_all(&self.last_value);
        }
        self.changes = Some(rx);
        self.widget = Some(widget);
        self.drain_changes();

        self.shared.state().phase = DocPhase::Ready;
        debug!("Editor mounted for {:?}", self.options.project_id);
        Ok(())
    }

    fn drain_changes(&mut self) -> bool {
        let mut any = false;
        if let Some(rx) = self.changes.as_mut() {
            while rx.try_recv().is_ok() {
                any = true;
            }
        }
        any
    }

    /// Handle pending change notifications from the widget. Returns whether
    /// a new value was propagated to the parent.
    pub fn process_changes(&mut self) -> bool {
        if !self.drain_changes() {
            return false;
        }
        let Some(text) = self.widget.as_ref().map(|w| w.text()) else {
            return false;
        };
        if text == self.last_value {
            return false;
        }

        self.last_value = text.clone();
        if let Some(cb) = self.on_change.as_mut() {
            cb(&text);
        }

        {
            let mut st = self.shared.state();
            match st.phase {
                DocPhase::Saving => st.edited_during_save = true,
                DocPhase::Ready | DocPhase::Dirty => st.phase = DocPhase::Dirty,
                DocPhase::Uninitialized | DocPhase::Disposed => {}
            }
        }

        if self.options.read_only {
            return true;
        }
        if let Some(project_id) = self.options.project_id.clone() {
            let shared = Arc::clone(&self.shared);
            self.debouncer.schedule(shared.fire_debounced(project_id, text));
        }
        true
    }

    /// Replace the buffer with a value that changed outside the editor.
    /// Returns whether the buffer was touched.
    pub fn apply_external(&mut self, new_text: &str) -> bool {
        if new_text == self.last_value || self.phase() == DocPhase::Disposed {
            return false;
        }
        let Some(widget) = self.widget.as_mut() else {
            // Not mounted yet: the next mount seeds from this value.
            self.last_value = new_text.to_string();
            return false;
        };

        let view = ViewState {
            cursor: widget.cursor(),
            selections: widget.selections(),
            scroll: widget.scroll(),
        };

        widget.replace_all(new_text);
        // The replacement's own notifications never reach the parent. Any
        // that arrive later find the buffer equal to `last_value`.
        self.drain_changes();
        self.last_value = new_text.to_string();

        // Pending local saves predate the external value and must not
        // overwrite it.
        self.debouncer.cancel();
        {
            let mut st = self.shared.state();
            st.held = None;
            match st.phase {
                DocPhase::Dirty => st.phase = DocPhase::Ready,
                DocPhase::Saving => st.edited_during_save = false,
                _ => {}
            }
        }

        self.pending_restore = Some(view);
        true
    }

    /// Restore the view state captured by the last external update,
    /// clamped to the new buffer.
    pub fn flush_frame(&mut self) {
        let (Some(view), Some(widget)) = (self.pending_restore.take(), self.widget.as_mut()) else {
            return;
        };
        let clamp = |p: Position| clamp_position(&**widget, p);
        let cursor = clamp(view.cursor);
        let selections: Vec<Selection> = view
            .selections
            .iter()
            .map(|s| Selection {
                anchor: clamp(s.anchor),
                active: clamp(s.active),
            })
            .collect();
        let limits = widget.scroll_limits();

        widget.set_cursor(cursor);
        if !selections.is_empty() {
            widget.set_selections(&selections);
        }
        widget.set_scroll(ScrollOffset {
            top: view.scroll.top.min(limits.top),
            left: view.scroll.left.min(limits.left),
        });
    }

    /// Persist the current buffer now, cancelling any pending autosave.
    /// Returns `None` when the request is ignored: not mounted, no project,
    /// read-only, or a save already in flight.
    pub fn save_now(&mut self) -> Option<JoinHandle<()>> {
        let project_id = self.options.project_id.clone()?;
        if self.options.read_only {
            return None;
        }
        let content = self.widget.as_ref()?.text();

        {
            let mut st = self.shared.state();
            if st.in_flight || st.phase == DocPhase::Disposed {
                debug!("Manual save ignored for {project_id}");
                return None;
            }
            st.in_flight = true;
            st.phase = DocPhase::Saving;
        }
        self.debouncer.cancel();
        info!("Manual save of {project_id}");

        let shared = Arc::clone(&self.shared);
        Some(tokio::spawn(shared.persist(project_id, content, true)))
    }

    /// Tear down the subscription, timer and widget. Idempotent.
    pub fn dispose(&mut self) {
        {
            let mut st = self.shared.state();
            if st.phase == DocPhase::Disposed {
                return;
            }
            st.phase = DocPhase::Disposed;
            st.held = None;
        }
        self.debouncer.cancel();
        self.changes = None;
        self.pending_restore = None;
        if let Some(mut widget) = self.widget.take() {
            widget.dispose();
        }
        debug!("Editor disposed for {:?}", self.options.project_id);
    }
}

impl Drop for EditorSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn clamp_position(widget: &dyn EditorWidget, p: Position) -> Position {
    let line = p.line.clamp(1, widget.line_count().max(1));
    let column = p.column.clamp(1, widget.line_length(line) + 1);
    Position { line, column }
}
