//! Request-scoped renderer state.
//!
//! Handlers register inline language labels and inline settings while they
//! render a page. The SSR middleware forwards both to the rendering service,
//! and the page-cache hooks persist them next to a cached page so that a cache
//! hit carries the same data as a fresh render.
//!
//! The server creates one [`RenderContext`] per request and hands a clone to
//! the [`Request`](crate::Request). Clones share state, so a middleware that
//! keeps a clone sees what the handler registered downstream. Nothing here is
//! global: two concurrent requests never observe each other's labels.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};

/// Inline language labels: label key → localized string.
pub type Labels = BTreeMap<String, String>;

/// Inline settings: arbitrary nested JSON keyed by namespace.
pub type Settings = Map<String, Value>;

#[derive(Debug, Default)]
struct RenderState {
    labels: Labels,
    settings: Settings,
    page_type: u64,
}

/// Shared handle to the renderer state of one request.
#[derive(Clone, Debug, Default)]
pub struct RenderContext {
    inner: Arc<Mutex<RenderState>>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context for a request routed to `page_type`.
    pub fn with_page_type(page_type: u64) -> Self {
        let ctx = Self::new();
        ctx.set_page_type(page_type);
        ctx
    }

    // A handler that panicked mid-render leaves plain data behind, nothing
    // half-updated that could break an invariant, so poisoning is ignored.
    fn state(&self) -> MutexGuard<'_, RenderState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn page_type(&self) -> u64 {
        self.state().page_type
    }

    pub fn set_page_type(&self, page_type: u64) {
        self.state().page_type = page_type;
    }

    pub fn add_label(&self, key: impl Into<String>, value: impl Into<String>) {
        self.state().labels.insert(key.into(), value.into());
    }

    pub fn add_labels<K, V>(&self, labels: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut state = self.state();
        for (k, v) in labels {
            state.labels.insert(k.into(), v.into());
        }
    }

    /// Snapshot of the labels registered so far.
    pub fn labels(&self) -> Labels {
        self.state().labels.clone()
    }

    /// Replaces all labels, e.g. when restoring a cached page.
    pub fn set_labels(&self, labels: Labels) {
        self.state().labels = labels;
    }

    /// Merges `value` into the settings under `namespace`.
    ///
    /// Objects merge key by key, arrays append, anything else replaces the
    /// previous value. Registering `xhrCache` twice therefore yields one
    /// array holding both entries.
    pub fn add_inline_setting(&self, namespace: &str, value: Value) {
        let mut state = self.state();
        match state.settings.get_mut(namespace) {
            Some(existing) => merge_recursive(existing, value),
            None => {
                state.settings.insert(namespace.to_owned(), value);
            }
        }
    }

    /// Snapshot of the settings registered so far.
    pub fn settings(&self) -> Settings {
        self.state().settings.clone()
    }

    /// Replaces all settings, e.g. when restoring a cached page.
    pub fn set_settings(&self, settings: Settings) {
        self.state().settings = settings;
    }
}

fn merge_recursive(target: &mut Value, value: Value) {
    match (target, value) {
        (Value::Object(target), Value::Object(source)) => {
            for (k, v) in source {
                match target.get_mut(&k) {
                    Some(existing) => merge_recursive(existing, v),
                    None => {
                        target.insert(k, v);
                    }
                }
            }
        }
        (Value::Array(target), Value::Array(source)) => target.extend(source),
        (target, value) => *target = value,
    }
}
