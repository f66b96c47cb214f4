//! Root state: one immutable slice per module namespace.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use crate::error::StoreError;

/// Fields to overlay onto a module's sub-state.
pub type Patch = Map<String, Value>;

pub(crate) static NULL: Value = Value::Null;

/// The store's root state, keyed by namespace.
///
/// Slices are reference-counted so a new root state shares every slice the
/// last action did not touch. Snapshots handed out by the store are behind an
/// `Arc` and cannot be written through:
///
/// ```compile_fail
/// use annotator_store::Store;
///
/// fn clobber(store: &Store) {
///     let state = store.get_state();
///     state.insert("session", serde_json::json!({})).unwrap();
/// }
/// ```
///
/// In strict mode published snapshots are also sealed, so a clone of one keeps
/// rejecting writes until it is explicitly [thawed](RootState::thaw).
#[derive(Debug, Clone, Default)]
pub struct RootState {
    slices: BTreeMap<String, Arc<Value>>,
    sealed: bool,
}

impl RootState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow a module's sub-state.
    pub fn get(&self, namespace: &str) -> Option<&Value> {
        self.slices.get(namespace).map(Arc::as_ref)
    }

    /// Shared handle to a module's sub-state. Untouched slices keep the same
    /// allocation across dispatches.
    pub fn slice(&self, namespace: &str) -> Option<Arc<Value>> {
        self.slices.get(namespace).cloned()
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.slices.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Replace a namespace's sub-state. Fails on a sealed state.
    pub fn insert(
        &mut self,
        namespace: impl Into<String>,
        value: impl Into<Arc<Value>>,
    ) -> Result<Option<Arc<Value>>, StoreError> {
        let namespace = namespace.into();
        if self.sealed {
            return Err(StoreError::Frozen(namespace));
        }
        Ok(self.slices.insert(namespace, value.into()))
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// A writable copy. Slices stay shared until replaced.
    pub fn thaw(&self) -> Self {
        Self {
            slices: self.slices.clone(),
            sealed: false,
        }
    }

    /// Deep copy as a plain JSON object.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.slices
                .iter()
                .map(|(ns, slice)| (ns.clone(), Value::clone(slice)))
                .collect(),
        )
    }
}

impl PartialEq for RootState {
    /// Value equality of the slices. Sealing is not part of the value.
    fn eq(&self, other: &Self) -> bool {
        self.slices == other.slices
    }
}

impl Serialize for RootState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.slices.len()))?;
        for (ns, slice) in &self.slices {
            map.serialize_entry(ns, slice.as_ref())?;
        }
        map.end()
    }
}

/// Shallow merge: `{ ...state, ...patch }`. Never mutates `state`.
pub fn merge_patch(state: &Value, patch: Patch) -> Value {
    let mut next = state.as_object().cloned().unwrap_or_default();
    next.extend(patch);
    Value::Object(next)
}
