//! Per-call context.
//!
//! One [`Context`] exists per logical call. It is mutable only by the
//! orchestrator and middlewares for that call's lifetime and is never reused
//! or pooled. The [`Bag`] inside it is the typed side channel middlewares use
//! to coordinate without widening the fixed field set.

use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Unique identifier for one logical call (UUID v7, time-ordered).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallId(Uuid);

impl CallId {
    /// Generates a fresh call id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Marker stored in the [`Bag`] immediately before a timeout-triggered abort.
///
/// The write happens before the cancellation fires, which is what lets the
/// error mapper tell a timeout apart from a user-initiated cancel even though
/// both travel over the same token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedOut;

/// Typed per-call key/value store shared between the orchestrator, the
/// middlewares and the timeout watcher.
///
/// Keys are `TypeId`s — distinct unforgeable keys, one per concern — so
/// unrelated middlewares cannot collide. Values are cloned out on read since
/// the map lives behind a lock.
#[derive(Clone, Default)]
pub struct Bag {
    entries: Arc<Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>>,
}

impl Bag {
    /// Creates an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a typed value, replacing any previous value of the same type.
    pub fn insert<T: Send + Sync + 'static>(&self, value: T) {
        self.entries
            .lock()
            .insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a copy of a typed value.
    #[must_use]
    pub fn get<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        self.entries
            .lock()
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }

    /// Removes and returns a typed value.
    pub fn remove<T: Send + Sync + 'static>(&self) -> Option<T> {
        self.entries
            .lock()
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast().ok())
            .map(|boxed| *boxed)
    }

    /// Checks whether a value of the given type exists.
    #[must_use]
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.entries.lock().contains_key(&TypeId::of::<T>())
    }

    /// Returns the number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` when no values are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl fmt::Debug for Bag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bag").field("len", &self.len()).finish()
    }
}

/// Context for one logical call.
#[derive(Debug)]
pub struct Context {
    id: CallId,
    attempt: u32,
    started_at: Instant,
    cancellation: CancellationToken,
    bag: Bag,
}

impl Context {
    /// Creates a context with the merged cancellation token for this call.
    #[must_use]
    pub fn new(cancellation: CancellationToken) -> Self {
        Self {
            id: CallId::new(),
            attempt: 0,
            started_at: Instant::now(),
            cancellation,
            bag: Bag::new(),
        }
    }

    /// Returns the call id.
    #[must_use]
    pub fn id(&self) -> CallId {
        self.id
    }

    /// Returns the current attempt number (0 for the first attempt).
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Updates the attempt counter.
    ///
    /// Called by retry logic before each attempt so every later-dispatched
    /// middleware, the transport and event listeners observe the current
    /// number.
    pub fn set_attempt(&mut self, attempt: u32) {
        self.attempt = attempt;
    }

    /// Returns when the call started.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the elapsed time since the call started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Returns the merged cancellation token for this call.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns the cross-middleware coordination bag.
    #[must_use]
    pub fn bag(&self) -> &Bag {
        &self.bag
    }
}
