//! Editor state synchronization.

pub mod debounce;
pub mod language;
pub mod sync;
pub mod widget;

pub use language::{LanguageProfile, LanguageRegistry};
pub use sync::{DocPhase, DocumentStore, EditorSession, SessionOptions, DOCUMENT_URI};
pub use widget::{EditorWidget, MemoryWidgetFactory, WidgetError, WidgetFactory};
