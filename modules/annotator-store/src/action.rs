//! Actions, thunks and the values `dispatch` accepts and returns.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::task::noop_waker_ref;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::error::StoreError;
use crate::reducer::ReducerMap;
use crate::store::Dispatcher;

/// A tagged record: `{ "kind": ..., ...payload }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub kind: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Action {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Map::new(),
        }
    }

    /// Build an action from anything that serializes to a record (or to
    /// `null`, for actions without a payload).
    pub fn with_payload(kind: impl Into<String>, payload: impl Serialize) -> Result<Self, StoreError> {
        let kind = kind.into();
        let payload = match serde_json::to_value(payload) {
            Ok(Value::Object(map)) => map,
            Ok(Value::Null) => Map::new(),
            Ok(other) => {
                return Err(StoreError::InvalidPayload {
                    kind,
                    reason: format!("expected a record, got {other}"),
                })
            }
            Err(e) => {
                return Err(StoreError::InvalidPayload {
                    kind,
                    reason: e.to_string(),
                })
            }
        };
        if payload.contains_key("kind") {
            return Err(StoreError::InvalidPayload {
                kind,
                reason: "payload may not contain a 'kind' field".into(),
            });
        }
        Ok(Self { kind, payload })
    }

    /// Convert a serde-tagged enum (`#[serde(tag = "kind")]`) into an action.
    pub fn from_typed<T: Serialize>(action: &T) -> Result<Self, StoreError> {
        let value = serde_json::to_value(action).map_err(|e| StoreError::InvalidPayload {
            kind: "<typed>".into(),
            reason: e.to_string(),
        })?;
        serde_json::from_value(value).map_err(|e| StoreError::InvalidPayload {
            kind: "<typed>".into(),
            reason: e.to_string(),
        })
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.payload.get(field)
    }

    /// Decode the payload fields into a typed struct.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(Value::Object(self.payload.clone())).map_err(|e| {
            StoreError::InvalidPayload {
                kind: self.kind.clone(),
                reason: e.to_string(),
            }
        })
    }
}

/// Build `{ kind, ...payload }` for a kind declared in `reducers`.
///
/// Debug builds assert that some reducer in `reducers` handles `kind`.
/// Release builds only construct the action.
pub fn make_action(
    reducers: &ReducerMap,
    kind: &str,
    payload: impl Serialize,
) -> Result<Action, StoreError> {
    debug_assert!(reducers.contains(kind), "no reducer handles '{kind}'");
    Action::with_payload(kind, payload)
}

// ---------------------------------------------------------------------------
// Thunks
// ---------------------------------------------------------------------------

pub type ThunkFuture = BoxFuture<'static, anyhow::Result<()>>;

type ThunkTask = Box<dyn FnOnce(Dispatcher) -> ThunkFuture + Send>;

/// A dispatchable task. Runs with a [`Dispatcher`] instead of reaching the
/// reducers, and may dispatch any number of actions, before or after awaiting.
pub struct Thunk {
    label: String,
    task: ThunkTask,
}

impl Thunk {
    pub fn new<F, Fut>(label: impl Into<String>, task: F) -> Self
    where
        F: FnOnce(Dispatcher) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            label: label.into(),
            task: Box::new(move |dispatcher| task(dispatcher).boxed()),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Start the task and drive it up to its first suspension point.
    ///
    /// On a tokio runtime the rest of the task is spawned, so it finishes
    /// whether or not the handle is awaited. Without one the caller has to
    /// drive the returned handle.
    pub(crate) fn start(self, dispatcher: Dispatcher) -> ThunkHandle {
        let mut future = (self.task)(dispatcher);
        let mut cx = Context::from_waker(noop_waker_ref());
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(result) => ThunkHandle::Ready(Some(result)),
            Poll::Pending => match Handle::try_current() {
                Ok(runtime) => {
                    trace!(thunk = %self.label, "Spawning suspended thunk");
                    ThunkHandle::Spawned(runtime.spawn(future))
                }
                Err(_) => ThunkHandle::Pending(future),
            },
        }
    }
}

impl fmt::Debug for Thunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thunk").field("label", &self.label).finish()
    }
}

/// The remainder of a started thunk.
///
/// Awaiting it yields the thunk's result. A `Spawned` thunk keeps running on
/// the runtime when the handle is dropped; a `Pending` one (dispatched with no
/// runtime) is abandoned.
#[must_use = "a thunk dispatched outside a tokio runtime is abandoned when its handle is dropped"]
pub enum ThunkHandle {
    Ready(Option<anyhow::Result<()>>),
    Spawned(JoinHandle<anyhow::Result<()>>),
    Pending(ThunkFuture),
}

impl ThunkHandle {
    pub fn is_pending(&self) -> bool {
        match self {
            ThunkHandle::Ready(_) => false,
            ThunkHandle::Spawned(task) => !task.is_finished(),
            ThunkHandle::Pending(_) => true,
        }
    }
}

impl Future for ThunkHandle {
    type Output = anyhow::Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.get_mut() {
            ThunkHandle::Ready(result) => {
                Poll::Ready(result.take().unwrap_or_else(|| Ok(())))
            }
            ThunkHandle::Spawned(task) => match Pin::new(task).poll(cx) {
                Poll::Ready(Ok(result)) => Poll::Ready(result),
                Poll::Ready(Err(e)) => Poll::Ready(Err(anyhow::Error::new(e))),
                Poll::Pending => Poll::Pending,
            },
            ThunkHandle::Pending(future) => future.as_mut().poll(cx),
        }
    }
}

impl fmt::Debug for ThunkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThunkHandle::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            ThunkHandle::Spawned(_) => f.write_str("Spawned"),
            ThunkHandle::Pending(_) => f.write_str("Pending"),
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch input / output
// ---------------------------------------------------------------------------

/// Everything `dispatch` accepts.
#[derive(Debug)]
pub enum Dispatch {
    Action(Action),
    Thunk(Thunk),
}

impl Dispatch {
    /// Action kind, or the thunk's label.
    pub fn name(&self) -> &str {
        match self {
            Dispatch::Action(action) => &action.kind,
            Dispatch::Thunk(thunk) => thunk.label(),
        }
    }
}

impl From<Action> for Dispatch {
    fn from(action: Action) -> Self {
        Dispatch::Action(action)
    }
}

impl From<Thunk> for Dispatch {
    fn from(thunk: Thunk) -> Self {
        Dispatch::Thunk(thunk)
    }
}

/// What happened to a dispatched value.
#[derive(Debug)]
pub enum Dispatched {
    /// The action went through the root reducer.
    Applied,
    /// A middleware swallowed the action.
    Dropped,
    /// A thunk was started.
    Thunk(ThunkHandle),
}

impl Dispatched {
    pub fn is_pending(&self) -> bool {
        matches!(self, Dispatched::Thunk(handle) if handle.is_pending())
    }

    /// Wait for a thunk to finish. Plain actions are already settled.
    pub async fn settled(self) -> anyhow::Result<()> {
        match self {
            Dispatched::Thunk(handle) => handle.await,
            Dispatched::Applied | Dispatched::Dropped => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Method arguments
// ---------------------------------------------------------------------------

/// Positional arguments to a store method, decoded on demand.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    method: &'a str,
    values: &'a [Value],
}

impl<'a> Args<'a> {
    pub fn new(method: &'a str, values: &'a [Value]) -> Self {
        Self { method, values }
    }

    pub fn method(&self) -> &str {
        self.method
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn raw(&self, index: usize) -> Option<&'a Value> {
        self.values.get(index)
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    /// Decode a required argument.
    pub fn get<T: DeserializeOwned>(&self, index: usize) -> Result<T, StoreError> {
        let value = self.raw(index).ok_or_else(|| self.bad(index, "missing".into()))?;
        serde_json::from_value(value.clone()).map_err(|e| self.bad(index, e.to_string()))
    }

    /// Decode an optional argument; absent and `null` both give `None`.
    pub fn opt<T: DeserializeOwned>(&self, index: usize) -> Result<Option<T>, StoreError> {
        match self.raw(index) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| self.bad(index, e.to_string())),
        }
    }

    fn bad(&self, index: usize, reason: String) -> StoreError {
        StoreError::BadArgument {
            method: self.method.to_string(),
            index,
            reason,
        }
    }
}
