//! Request and response metadata.
//!
//! Metadata is the extension point middlewares and callers use to pass hints
//! through a call without widening the core value types. Arbitrary data lives
//! in a typed [`Extensions`] map keyed by `TypeId` — one unforgeable key per
//! concern, so unrelated middlewares cannot collide the way string keys can.

use crate::response::ResponseKind;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Progress of an upload or download, best-effort.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressInfo {
    /// Bytes transferred so far.
    pub loaded: u64,
    /// Total bytes, when the transport knows it.
    pub total: Option<u64>,
    /// Transfer direction.
    pub direction: ProgressDirection,
}

impl ProgressInfo {
    /// Returns the completed fraction in `[0, 1]`, when the total is known.
    #[must_use]
    pub fn fraction(&self) -> Option<f64> {
        self.total
            .filter(|total| *total > 0)
            .map(|total| self.loaded as f64 / total as f64)
    }
}

/// Transfer direction of a [`ProgressInfo`] sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressDirection {
    /// Request body upload.
    Upload,
    /// Response body download.
    Download,
}

/// Callback invoked with transfer progress samples.
pub type ProgressCallback = Arc<dyn Fn(&ProgressInfo) + Send + Sync>;

/// Typed extension map keyed by `TypeId`.
///
/// Values are stored behind `Arc` so the map is cheap to clone along with the
/// immutable request value that carries it.
#[derive(Clone, Default)]
pub struct Extensions {
    entries: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Extensions {
    /// Creates an empty extension map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a typed value, replacing any previous value of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) {
        self.entries.insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Retrieves a typed value.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref())
    }

    /// Removes a typed value, returning whether one was present.
    pub fn remove<T: Send + Sync + 'static>(&mut self) -> bool {
        self.entries.remove(&TypeId::of::<T>()).is_some()
    }

    /// Checks whether a value of the given type exists.
    #[must_use]
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// Returns the number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no values are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overlays `other` on top of this map, entry by entry.
    pub fn extend_from(&mut self, other: &Extensions) {
        for (key, value) in &other.entries {
            self.entries.insert(*key, value.clone());
        }
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// Metadata attached to a request.
#[derive(Clone, Default)]
pub struct RequestMeta {
    /// Explicit response-kind override for the decoder.
    pub response_kind: Option<ResponseKind>,
    /// Arbitrary tags (trace hints, cache keys, ...).
    pub tags: Vec<String>,
    /// Best-effort upload progress callback.
    pub on_upload_progress: Option<ProgressCallback>,
    /// Best-effort download progress callback.
    pub on_download_progress: Option<ProgressCallback>,
    extensions: Extensions,
}

impl RequestMeta {
    /// Creates empty request metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the typed extension map.
    #[must_use]
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Returns the typed extension map mutably.
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Merges per-call overrides over these defaults, shallow override-wins.
    #[must_use]
    pub fn merged_with(&self, overrides: &RequestMeta) -> RequestMeta {
        let mut extensions = self.extensions.clone();
        extensions.extend_from(&overrides.extensions);
        RequestMeta {
            response_kind: overrides.response_kind.or(self.response_kind),
            tags: if overrides.tags.is_empty() {
                self.tags.clone()
            } else {
                overrides.tags.clone()
            },
            on_upload_progress: overrides
                .on_upload_progress
                .clone()
                .or_else(|| self.on_upload_progress.clone()),
            on_download_progress: overrides
                .on_download_progress
                .clone()
                .or_else(|| self.on_download_progress.clone()),
            extensions,
        }
    }
}

impl fmt::Debug for RequestMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestMeta")
            .field("response_kind", &self.response_kind)
            .field("tags", &self.tags)
            .field("on_upload_progress", &self.on_upload_progress.is_some())
            .field("on_download_progress", &self.on_download_progress.is_some())
            .field("extensions", &self.extensions)
            .finish()
    }
}

/// Metadata attached to a response, an extension point for middlewares
/// (e.g. a cache middleware marking a hit).
#[derive(Debug, Clone, Default)]
pub struct ResponseMeta {
    extensions: Extensions,
}

impl ResponseMeta {
    /// Creates empty response metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the typed extension map.
    #[must_use]
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Returns the typed extension map mutably.
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}
