//! Reducer maps and the reducers compiled from them.
//!
//! A module declares one function per action kind. Every action is broadcast
//! to every module, so a kind without an entry is the common case and leaves
//! the slice untouched.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::action::Action;
use crate::error::StoreError;
use crate::state::{merge_patch, RootState, NULL};

/// `(sub_state, action) -> patch`. The patch must be a JSON object.
pub type ReducerFn = Arc<dyn Fn(&Value, &Action) -> anyhow::Result<Value> + Send + Sync>;

/// Map of action kind to reducer function.
#[derive(Clone, Default)]
pub struct ReducerMap {
    reducers: BTreeMap<String, ReducerFn>,
}

impl ReducerMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(mut self, kind: impl Into<String>, reducer: F) -> Self
    where
        F: Fn(&Value, &Action) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.insert(kind, reducer);
        self
    }

    /// Like [`on`](Self::on), with the action payload decoded into `P`.
    pub fn on_payload<P, F>(self, kind: impl Into<String>, reducer: F) -> Self
    where
        P: DeserializeOwned + 'static,
        F: Fn(&Value, P) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.on(kind, move |state, action| {
            let payload = action.payload_as::<P>()?;
            reducer(state, payload)
        })
    }

    pub fn insert<F>(&mut self, kind: impl Into<String>, reducer: F)
    where
        F: Fn(&Value, &Action) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.reducers.insert(kind.into(), Arc::new(reducer));
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.reducers.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.reducers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.reducers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reducers.is_empty()
    }

    fn get(&self, kind: &str) -> Option<&ReducerFn> {
        self.reducers.get(kind)
    }
}

impl fmt::Debug for ReducerMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.reducers.keys()).finish()
    }
}

/// Compile a module's reducer map into the reducer for its namespace.
pub fn create_reducer(namespace: impl Into<String>, reducers: ReducerMap, strict: bool) -> SliceReducer {
    SliceReducer {
        namespace: namespace.into(),
        reducers,
        strict,
    }
}

/// Reducer for one namespace.
#[derive(Debug, Clone)]
pub struct SliceReducer {
    namespace: String,
    reducers: ReducerMap,
    strict: bool,
}

impl SliceReducer {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Next sub-state, or `None` when no reducer handles `action.kind`.
    pub fn reduce(&self, state: &Value, action: &Action) -> Result<Option<Value>, StoreError> {
        let reducer = match self.reducers.get(&action.kind) {
            Some(reducer) => reducer,
            None => return Ok(None),
        };

        let patch = self.patch(reducer, state, action)?;
        if self.strict {
            let again = self.patch(reducer, state, action)?;
            if again != patch {
                return Err(StoreError::NondeterministicReducer {
                    namespace: self.namespace.clone(),
                    kind: action.kind.clone(),
                });
            }
        }

        match patch {
            Value::Object(fields) => Ok(Some(merge_patch(state, fields))),
            _ => Err(StoreError::InvalidPatch {
                namespace: self.namespace.clone(),
                kind: action.kind.clone(),
            }),
        }
    }

    fn patch(&self, reducer: &ReducerFn, state: &Value, action: &Action) -> Result<Value, StoreError> {
        reducer(state, action).map_err(|source| StoreError::Reducer {
            namespace: self.namespace.clone(),
            kind: action.kind.clone(),
            source,
        })
    }
}

/// Applies every namespace reducer to its own slice.
#[derive(Debug, Clone)]
pub struct RootReducer {
    slices: Vec<SliceReducer>,
    strict: bool,
}

/// Result of one root reduction.
#[derive(Debug)]
pub struct Reduction {
    pub state: RootState,
    /// Namespaces whose reducer handled the action.
    pub touched: Vec<String>,
}

impl RootReducer {
    pub fn new(slices: Vec<SliceReducer>, strict: bool) -> Self {
        Self { slices, strict }
    }

    /// Produce the next root state. All-or-nothing: any reducer error leaves
    /// `state` as the current state.
    pub fn reduce(&self, state: &RootState, action: &Action) -> Result<Reduction, StoreError> {
        let mut next = state.thaw();
        let mut touched = Vec::new();

        for slice in &self.slices {
            let current = state.get(slice.namespace()).unwrap_or(&NULL);
            if let Some(updated) = slice.reduce(current, action)? {
                next.insert(slice.namespace(), updated)?;
                touched.push(slice.namespace().to_string());
            }
        }

        if self.strict {
            next.seal();
        }
        Ok(Reduction {
            state: next,
            touched,
        })
    }
}
