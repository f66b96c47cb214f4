//! The dispatch pipeline.
//!
//! Every dispatched value passes through the middleware chain in order. The
//! built-in thunk stage comes first; caller middleware follows, and the root
//! reducer sits at the end. A middleware may pass the value on with `next`,
//! replace it, drop it, or start over from the top with `api.dispatch`.

use tracing::{debug, info, trace, warn, Level};

use crate::action::{Dispatch, Dispatched};
use crate::error::StoreError;
use crate::store::{Dispatcher, Store};

pub trait Middleware: Send + Sync {
    fn handle(&self, api: &Dispatcher, action: Dispatch, next: Next<'_>) -> Result<Dispatched, StoreError>;
}

/// The rest of the chain after the current middleware.
pub struct Next<'a> {
    store: &'a Store,
    index: usize,
}

impl<'a> Next<'a> {
    pub(crate) fn new(store: &'a Store, index: usize) -> Self {
        Self { store, index }
    }

    pub fn run(self, action: Dispatch) -> Result<Dispatched, StoreError> {
        self.store.run_from(self.index, action)
    }
}

/// Runs thunks instead of passing them to the reducers.
pub struct ThunkMiddleware;

impl Middleware for ThunkMiddleware {
    fn handle(&self, api: &Dispatcher, action: Dispatch, next: Next<'_>) -> Result<Dispatched, StoreError> {
        match action {
            Dispatch::Thunk(thunk) => {
                trace!(thunk = thunk.label(), "Starting thunk");
                Ok(Dispatched::Thunk(thunk.start(api.clone())))
            }
            action => next.run(action),
        }
    }
}

/// Logs every dispatched action and thunk through `tracing`.
pub struct LoggingMiddleware {
    level: Level,
}

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self { level: Level::DEBUG }
    }

    pub fn with_level(level: Level) -> Self {
        Self { level }
    }
}

impl Default for LoggingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for LoggingMiddleware {
    fn handle(&self, _api: &Dispatcher, action: Dispatch, next: Next<'_>) -> Result<Dispatched, StoreError> {
        let name = action.name().to_string();
        let is_thunk = matches!(action, Dispatch::Thunk(_));
        let result = next.run(action);
        let outcome = match &result {
            Ok(Dispatched::Applied) => "applied",
            Ok(Dispatched::Dropped) => "dropped",
            Ok(Dispatched::Thunk(handle)) if handle.is_pending() => "pending",
            Ok(Dispatched::Thunk(_)) => "finished",
            Err(_) => "failed",
        };
        if matches!(result, Ok(Dispatched::Dropped)) {
            warn!(action = %name, "Dispatch dropped by middleware");
        } else if self.level == Level::INFO {
            info!(action = %name, thunk = is_thunk, outcome, "Dispatch");
        } else if self.level == Level::TRACE {
            trace!(action = %name, thunk = is_thunk, outcome, "Dispatch");
        } else {
            debug!(action = %name, thunk = is_thunk, outcome, "Dispatch");
        }
        result
    }
}
