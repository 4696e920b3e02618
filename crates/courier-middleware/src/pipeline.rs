//! Middleware pipeline.
//!
//! The pipeline owns an ordered list of middlewares and dispatches a request
//! through them in onion order around a terminal handler. The client clones
//! the pipeline per call, so the dispatch sequence of an in-flight call is
//! stable even while middlewares are being registered concurrently.

use crate::middleware::{Middleware, Next, StageGuard, Terminal};
use courier_core::{Context, Request, Response, Result};
use std::sync::Arc;

/// An ordered, cheaply clonable list of middlewares.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware stage.
    pub fn push<M: Middleware>(&mut self, middleware: M) {
        self.stages.push(Arc::new(middleware));
    }

    /// Appends an already-shared middleware stage.
    pub fn push_arc(&mut self, middleware: Arc<dyn Middleware>) {
        self.stages.push(middleware);
    }

    /// Returns the stage names in registration order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` when no middleware is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Dispatches one request through the chain around `terminal`.
    ///
    /// Before-code runs in registration order, after-code in reverse, and the
    /// terminal handler exactly once per (re-)dispatch.
    pub async fn dispatch(
        &self,
        request: Request,
        ctx: &mut Context,
        terminal: &dyn Terminal,
    ) -> Result<Response> {
        let guard = StageGuard::new();
        let next = Next::new(&self.stages, terminal, &guard);
        next.run(request, ctx).await
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}
