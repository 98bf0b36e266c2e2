//! Transient toast notifications with TTL and de-duplication.
//!
//! The queue is shared between the editor sessions and the workflows, so it
//! lives behind a [`Notifier`] handle that can be cloned into spawned tasks.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

const DEFAULT_TTL: Duration = Duration::from_secs(5);
const DEDUPE_WINDOW: Duration = Duration::from_millis(500);
const MAX_TOASTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Info,
    Success,
    /// Rendered with the destructive style.
    Error,
}

pub type ToastId = u64;

#[derive(Debug, Clone)]
pub struct Toast {
    pub id: ToastId,
    pub kind: ToastKind,
    pub title: String,
    pub body: Option<String>,
    pub ttl: Duration,
    pub created: Instant,
}

/// Rendering-friendly view of a toast.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToastView {
    pub id: ToastId,
    pub kind: ToastKind,
    pub title: String,
    pub body: Option<String>,
    /// 1.0 when just created, 0.0 when expired
    pub progress: f32,
}

#[derive(Debug)]
struct ToastQueue {
    queue: VecDeque<Toast>,
    next_id: ToastId,
}

impl ToastQueue {
    fn push(
        &mut self,
        kind: ToastKind,
        title: String,
        body: Option<String>,
        now: Instant,
    ) -> ToastId {
        if let Some(existing) = self.queue.iter_mut().find(|t| {
            t.kind == kind
                && t.title == title
                && t.body == body
                && now.duration_since(t.created) <= DEDUPE_WINDOW
        }) {
            existing.created = now;
            return existing.id;
        }

        let id = self.next_id;
        self.next_id += 1;
        if self.queue.len() == MAX_TOASTS {
            self.queue.pop_front();
        }
        self.queue.push_back(Toast {
            id,
            kind,
            title,
            body,
            ttl: DEFAULT_TTL,
            created: now,
        });
        id
    }
}

/// Cloneable handle onto the shared toast queue.
#[derive(Debug, Clone)]
pub struct Notifier {
    inner: Arc<Mutex<ToastQueue>>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ToastQueue {
                queue: VecDeque::new(),
                next_id: 1,
            })),
        }
    }

    /// Push a toast, folding it into an identical one pushed within the
    /// de-duplication window.
    pub fn push<S, B>(&self, kind: ToastKind, title: S, body: B) -> ToastId
    where
        S: Into<String>,
        B: Into<Option<String>>,
    {
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        queue.push(kind, title.into(), body.into(), Instant::now())
    }

    pub fn success(&self, title: &str, body: &str) -> ToastId {
        self.push(ToastKind::Success, title, Some(body.to_string()))
    }

    pub fn error(&self, title: &str, body: impl Into<String>) -> ToastId {
        self.push(ToastKind::Error, title, Some(body.into()))
    }

    pub fn dismiss(&self, id: ToastId) {
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        queue.queue.retain(|t| t.id != id);
    }

    /// Toasts still within their TTL; expired entries are dropped.
    pub fn visible(&self) -> Vec<ToastView> {
        let now = Instant::now();
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        queue.queue.retain(|t| now.duration_since(t.created) < t.ttl);
        queue
            .queue
            .iter()
            .map(|t| ToastView {
                id: t.id,
                kind: t.kind,
                title: t.title.clone(),
                body: t.body.clone(),
                progress: 1.0
                    - (now.duration_since(t.created).as_secs_f32() / t.ttl.as_secs_f32()),
            })
            .collect()
    }

    /// Titles of visible toasts, oldest first.
    pub fn titles(&self) -> Vec<String> {
        self.visible().into_iter().map(|t| t.title).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn identical_toasts_fold_within_window() {
        let notifier = Notifier::new();
        let a = notifier.error("Save failed", "disk full");
        let b = notifier.error("Save failed", "disk full");
        assert_eq!(a, b);
        assert_eq!(notifier.visible().len(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        let c = notifier.error("Save failed", "disk full");
        assert_ne!(a, c);
        assert_eq!(notifier.visible().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn toasts_expire_after_ttl() {
        let notifier = Notifier::new();
        notifier.success("Changes saved", "Your code has been saved successfully");
        tokio::time::advance(DEFAULT_TTL).await;
        assert!(notifier.visible().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn queue_is_bounded() {
        let notifier = Notifier::new();
        for i in 0..(MAX_TOASTS + 2) {
            notifier.push(ToastKind::Info, format!("toast {i}"), None);
        }
        let titles = notifier.titles();
        assert_eq!(titles.len(), MAX_TOASTS);
        assert_eq!(titles[0], "toast 2");
    }
}
