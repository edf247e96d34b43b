//! Page-cache hooks for renderer state.
//!
//! A cached page is served without running its handlers, so the labels and
//! settings those handlers registered would be missing on a cache hit. The
//! augmenter stores both next to the cached content and puts them back into
//! the [`RenderContext`] when the page is loaded from cache.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::context::{Labels, RenderContext};

/// Sidecar key holding the inline language labels.
pub const LABELS_KEY: &str = "inlineLanguageLabels";
/// Sidecar key holding the inline settings.
pub const SETTINGS_KEY: &str = "inlineSettings";

/// State keys used by [`MetaDataState`].
pub const LABELS_STATE_KEY: &str = "PageRenderer::$inlineLanguageLabels";
pub const SETTINGS_STATE_KEY: &str = "PageRenderer::$inlineSettings";

/// A page as it sits in the page cache.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CachedPageRecord {
    pub content: String,
    /// Extra data stored alongside the content.
    pub sidecar: Map<String, Value>,
}

impl CachedPageRecord {
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), sidecar: Map::new() }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PageCacheStateAugmenter;

impl PageCacheStateAugmenter {
    pub fn on_cache_write(&self, ctx: &RenderContext, record: &mut CachedPageRecord) {
        record.sidecar.insert(LABELS_KEY.to_owned(), labels_value(ctx.labels()));
        record.sidecar.insert(SETTINGS_KEY.to_owned(), Value::Object(ctx.settings()));
    }

    /// Restores labels and settings. A key that is missing or holds something
    /// other than an object restores as empty.
    pub fn on_cache_read(&self, record: &CachedPageRecord, ctx: &RenderContext) {
        ctx.set_labels(decode(LABELS_KEY, record.sidecar.get(LABELS_KEY)));
        ctx.set_settings(decode(SETTINGS_KEY, record.sidecar.get(SETTINGS_KEY)));
    }
}

/// Renderer state as seen by a cache that snapshots named properties.
///
/// `get_state` adds two entries to whatever the cache already collected;
/// `update_state` applies the entries it knows and ignores the rest.
#[derive(Clone, Debug)]
pub struct MetaDataState {
    ctx: RenderContext,
}

impl MetaDataState {
    pub fn new(ctx: RenderContext) -> Self {
        Self { ctx }
    }

    pub fn get_state(&self, mut state: Map<String, Value>) -> Map<String, Value> {
        state.insert(LABELS_STATE_KEY.to_owned(), labels_value(self.ctx.labels()));
        state.insert(SETTINGS_STATE_KEY.to_owned(), Value::Object(self.ctx.settings()));
        state
    }

    pub fn update_state(&self, state: &Map<String, Value>) {
        for (name, value) in state {
            match name.as_str() {
                LABELS_STATE_KEY => self.ctx.set_labels(decode(name, Some(value))),
                SETTINGS_STATE_KEY => self.ctx.set_settings(decode(name, Some(value))),
                _ => {}
            }
        }
    }
}

fn labels_value(labels: Labels) -> Value {
    Value::Object(labels.into_iter().map(|(k, v)| (k, Value::String(v))).collect())
}

fn decode<T: DeserializeOwned + Default>(key: &str, value: Option<&Value>) -> T {
    let Some(value) = value else {
        return T::default();
    };
    serde_json::from_value(value.clone()).unwrap_or_else(|e| {
        debug!(key, error = %e, "ignoring malformed cached renderer state");
        T::default()
    })
}
