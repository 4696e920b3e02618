//! Lifecycle events.
//!
//! The client emits one `request:start` per call, followed by exactly one of
//! `request:end`, `request:error` or `request:abort`. Payloads are borrowed,
//! so observers read but never mutate call state.
//!
//! The bus is deliberately best-effort: a listener that panics is isolated
//! and logged, and the call outcome is unaffected. Observer failures must
//! never become caller failures.

use crate::context::Context;
use crate::error::Error;
use crate::request::Request;
use crate::response::Response;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// The four lifecycle event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Emitted before the pipeline dispatches.
    Start,
    /// Emitted on success.
    End,
    /// Emitted on failure, after error classification.
    Error,
    /// Emitted instead of `Error` when the merged signal was aborted.
    Abort,
}

impl EventKind {
    /// Returns the event name on the wire-facing form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "request:start",
            Self::End => "request:end",
            Self::Error => "request:error",
            Self::Abort => "request:abort",
        }
    }
}

/// A lifecycle event payload, borrowed for the duration of the emit.
#[derive(Debug)]
pub enum RequestEvent<'a> {
    /// The call is about to dispatch into the pipeline.
    Start {
        /// The resolved request.
        request: &'a Request,
        /// The per-call context.
        context: &'a Context,
    },
    /// The call succeeded.
    End {
        /// The resolved request.
        request: &'a Request,
        /// The decoded response.
        response: &'a Response,
        /// The per-call context.
        context: &'a Context,
        /// Wall-clock time spent on the call.
        elapsed: Duration,
        /// The final attempt number.
        attempt: u32,
    },
    /// The call failed with a classified error.
    Error {
        /// The resolved request.
        request: &'a Request,
        /// The classified error.
        error: &'a Error,
        /// The per-call context.
        context: &'a Context,
        /// Wall-clock time spent on the call.
        elapsed: Duration,
        /// The final attempt number.
        attempt: u32,
    },
    /// The merged cancellation signal aborted the call.
    Abort {
        /// The resolved request.
        request: &'a Request,
        /// The per-call context.
        context: &'a Context,
        /// Wall-clock time spent on the call.
        elapsed: Duration,
        /// The final attempt number.
        attempt: u32,
    },
}

impl RequestEvent<'_> {
    /// Returns the kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Start { .. } => EventKind::Start,
            Self::End { .. } => EventKind::End,
            Self::Error { .. } => EventKind::Error,
            Self::Abort { .. } => EventKind::Abort,
        }
    }
}

type Listener = Arc<dyn for<'a> Fn(&RequestEvent<'a>) + Send + Sync>;

/// Handle for unsubscribing a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Synchronous fan-out event bus with per-listener isolation.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, EventKind, Listener)>>,
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a listener to one event kind.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: for<'a> Fn(&RequestEvent<'a>) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, kind, Arc::new(listener)));
        id
    }

    /// Unsubscribes a listener. Returns `false` for an unknown id.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Emits an event to every matching listener, in subscription order.
    ///
    /// Listener panics are caught per listener and logged; the remaining
    /// listeners still run and the caller is unaffected.
    pub fn emit(&self, event: &RequestEvent<'_>) {
        let kind = event.kind();
        let matching: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .filter(|(_, listener_kind, _)| *listener_kind == kind)
            .map(|(_, _, listener)| listener.clone())
            .collect();

        for listener in matching {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::warn!(event = kind.as_str(), "event listener panicked");
            }
        }
    }

    /// Returns the number of subscribed listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
