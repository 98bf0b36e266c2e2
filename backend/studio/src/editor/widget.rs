//! The embedded text-editing widget, seen from the synchronizer.
//!
//! [`EditorWidget`] is the surface the session drives; [`WidgetFactory`]
//! creates widgets over buffers keyed by a virtual document URI, reusing a
//! live buffer when one exists. [`MemoryWidgetFactory`] is a headless
//! implementation with a [`MemoryView`] driver standing in for the user.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

/// Pixels per line used for scroll limits.
pub const LINE_HEIGHT: u32 = 19;
/// Average glyph width used for horizontal scroll limits.
pub const CHAR_WIDTH: u32 = 8;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WidgetError {
    #[error("editor container is not mounted yet")]
    NotReady,
    #[error("editor session has been disposed")]
    Disposed,
}

/// 1-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub const START: Position = Position { line: 1, column: 1 };

    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::START
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Position,
    pub active: Position,
}

impl Selection {
    pub fn caret(at: Position) -> Self {
        Self {
            anchor: at,
            active: at,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollOffset {
    pub top: u32,
    pub left: u32,
}

/// Content-changed notification emitted by a widget's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentChange {
    pub version: u64,
}

#[derive(Debug, Clone)]
pub struct WidgetOptions {
    pub uri: String,
    pub language: &'static str,
    pub initial_text: String,
    pub read_only: bool,
}

pub trait EditorWidget: Send {
    fn text(&self) -> String;

    /// Replace the whole buffer as a single edit operation.
    fn replace_all(&mut self, text: &str);

    fn cursor(&self) -> Position;
    fn set_cursor(&mut self, position: Position);
    fn selections(&self) -> Vec<Selection>;
    fn set_selections(&mut self, selections: &[Selection]);
    fn scroll(&self) -> ScrollOffset;
    fn set_scroll(&mut self, offset: ScrollOffset);

    /// Always at least 1.
    fn line_count(&self) -> usize;
    /// Length in characters of the 1-based `line`, 0 when out of range.
    fn line_length(&self, line: usize) -> usize;
    fn scroll_limits(&self) -> ScrollOffset;

    /// Release the widget and its buffer. Further calls are no-ops.
    fn dispose(&mut self);
}

pub trait WidgetFactory {
    /// Create a widget over the buffer for `options.uri`. Change
    /// notifications for that buffer are sent on `changes` until the widget
    /// is disposed.
    fn create(
        &mut self,
        options: &WidgetOptions,
        changes: UnboundedSender<ContentChange>,
    ) -> Result<Box<dyn EditorWidget>, WidgetError>;
}

// ─────────────────────────────────────────────────────────
// Headless implementation
// ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Model {
    text: String,
    version: u64,
    listener: Option<UnboundedSender<ContentChange>>,
    language: &'static str,
    read_only: bool,
    cursor: Position,
    selections: Vec<Selection>,
    scroll: ScrollOffset,
    /// Full-buffer replacements applied by the synchronizer
    replacements: usize,
    /// Generation of the widget currently attached to the buffer
    owner: u64,
    disposed: bool,
}

impl Model {
    fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.version += 1;
        if let Some(tx) = &self.listener {
            // A closed receiver means the session stopped listening.
            let _ = tx.send(ContentChange {
                version: self.version,
            });
        }
    }

    fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.split('\n')
    }
}

type SharedModel = Arc<Mutex<Model>>;
type Registry = Arc<Mutex<HashMap<String, SharedModel>>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Creates [`MemoryWidget`]s; buffers live in the factory until the widget
/// over them is disposed.
#[derive(Debug, Clone)]
pub struct MemoryWidgetFactory {
    mounted: bool,
    models: Registry,
}

impl Default for MemoryWidgetFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryWidgetFactory {
    pub fn new() -> Self {
        Self {
            mounted: true,
            models: Arc::default(),
        }
    }

    /// A factory whose container is not in the page yet.
    pub fn unmounted() -> Self {
        Self {
            mounted: false,
            ..Self::new()
        }
    }

    pub fn set_mounted(&mut self, mounted: bool) {
        self.mounted = mounted;
    }

    /// User-side access to the live buffer for `uri`.
    pub fn view(&self, uri: &str) -> Option<MemoryView> {
        lock(&self.models).get(uri).map(|model| MemoryView {
            model: Arc::clone(model),
        })
    }

    pub fn live_buffers(&self) -> usize {
        lock(&self.models).len()
    }
}

impl WidgetFactory for MemoryWidgetFactory {
    fn create(
        &mut self,
        options: &WidgetOptions,
        changes: UnboundedSender<ContentChange>,
    ) -> Result<Box<dyn EditorWidget>, WidgetError> {
        if !self.mounted {
            return Err(WidgetError::NotReady);
        }
        let model = {
            let mut models = lock(&self.models);
            Arc::clone(models.entry(options.uri.clone()).or_insert_with(|| {
                Arc::new(Mutex::new(Model {
                    text: options.initial_text.clone(),
                    language: options.language,
                    ..Model::default()
                }))
            }))
        };
        let generation = {
            let mut m = lock(&model);
            m.listener = Some(changes);
            m.read_only = options.read_only;
            m.owner += 1;
            m.owner
        };
        Ok(Box::new(MemoryWidget {
            uri: options.uri.clone(),
            model,
            registry: Arc::clone(&self.models),
            generation,
            released: false,
        }))
    }
}

#[derive(Debug)]
pub struct MemoryWidget {
    uri: String,
    model: SharedModel,
    registry: Registry,
    generation: u64,
    released: bool,
}

impl EditorWidget for MemoryWidget {
    fn text(&self) -> String {
        lock(&self.model).text.clone()
    }

    fn replace_all(&mut self, text: &str) {
        let mut m = lock(&self.model);
        if m.disposed {
            return;
        }
        m.replacements += 1;
        m.set_text(text);
    }

    fn cursor(&self) -> Position {
        lock(&self.model).cursor
    }

    fn set_cursor(&mut self, position: Position) {
        lock(&self.model).cursor = position;
    }

    fn selections(&self) -> Vec<Selection> {
        lock(&self.model).selections.clone()
    }

    fn set_selections(&mut self, selections: &[Selection]) {
        lock(&self.model).selections = selections.to_vec();
    }

    fn scroll(&self) -> ScrollOffset {
        lock(&self.model).scroll
    }

    fn set_scroll(&mut self, offset: ScrollOffset) {
        lock(&self.model).scroll = offset;
    }

    fn line_count(&self) -> usize {
        lock(&self.model).lines().count()
    }

    fn line_length(&self, line: usize) -> usize {
        let m = lock(&self.model);
        line.checked_sub(1)
            .and_then(|idx| m.lines().nth(idx))
            .map(|l| l.chars().count())
            .unwrap_or(0)
    }

    fn scroll_limits(&self) -> ScrollOffset {
        let m = lock(&self.model);
        let lines = m.lines().count() as u32;
        let widest = m.lines().map(|l| l.chars().count()).max().unwrap_or(0) as u32;
        ScrollOffset {
            top: lines.saturating_sub(1) * LINE_HEIGHT,
            left: widest * CHAR_WIDTH,
        }
    }

    fn dispose(&mut self) {
        if std::mem::replace(&mut self.released, true) {
            return;
        }
        let mut m = lock(&self.model);
        if m.disposed || m.owner != self.generation {
            // A newer widget has taken the buffer over; leave it alone.
            return;
        }
        m.disposed = true;
        m.listener = None;
        drop(m);
        lock(&self.registry).remove(&self.uri);
    }
}

/// Drives a headless buffer the way a user at the keyboard would.
#[derive(Debug, Clone)]
pub struct MemoryView {
    model: SharedModel,
}

impl MemoryView {
    /// Replace the buffer as if typed; emits a change notification.
    pub fn type_text(&self, text: &str) {
        let mut m = lock(&self.model);
        if !m.disposed && !m.read_only {
            m.set_text(text);
        }
    }

    pub fn text(&self) -> String {
        lock(&self.model).text.clone()
    }

    pub fn language(&self) -> &'static str {
        lock(&self.model).language
    }

    pub fn place_cursor(&self, position: Position, scroll: ScrollOffset) {
        let mut m = lock(&self.model);
        m.cursor = position;
        m.selections = vec![Selection::caret(position)];
        m.scroll = scroll;
    }

    pub fn cursor(&self) -> Position {
        lock(&self.model).cursor
    }

    pub fn selections(&self) -> Vec<Selection> {
        lock(&self.model).selections.clone()
    }

    pub fn scroll(&self) -> ScrollOffset {
        lock(&self.model).scroll
    }

    /// Number of full-buffer replacements the synchronizer has applied.
    pub fn replacements(&self) -> usize {
        lock(&self.model).replacements
    }

    pub fn is_disposed(&self) -> bool {
        lock(&self.model).disposed
    }
}
