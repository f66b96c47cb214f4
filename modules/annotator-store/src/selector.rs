//! Selector maps and selector binding.
//!
//! Selectors take the state explicitly. Binding closes over a state accessor
//! so callers only pass the remaining arguments, and every call reads the
//! state current at call time.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::action::Args;
use crate::error::StoreError;
use crate::state::{RootState, NULL};

/// `(sub_state, args) -> value`.
pub type SelectorFn = Arc<dyn Fn(&Value, &Args<'_>) -> anyhow::Result<Value> + Send + Sync>;

/// `(root_state, args) -> value`, for queries spanning namespaces.
pub type RootSelectorFn = Arc<dyn Fn(&RootState, &Args<'_>) -> anyhow::Result<Value> + Send + Sync>;

/// Returns the store's current root state.
pub type StateAccessor = Arc<dyn Fn() -> Arc<RootState> + Send + Sync>;

/// Map of selector name to selector function over state `S`.
pub struct SelectorMap<S: ?Sized> {
    selectors: BTreeMap<String, Arc<dyn Fn(&S, &Args<'_>) -> anyhow::Result<Value> + Send + Sync>>,
}

/// Selectors over a module's own slice.
pub type SliceSelectors = SelectorMap<Value>;

/// Selectors over the whole root state.
pub type RootSelectors = SelectorMap<RootState>;

impl<S: ?Sized + 'static> SelectorMap<S> {
    pub fn new() -> Self {
        Self {
            selectors: BTreeMap::new(),
        }
    }

    pub fn on<F, R>(mut self, name: impl Into<String>, selector: F) -> Self
    where
        F: Fn(&S, &Args<'_>) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Serialize + 'static,
    {
        self.insert(name, selector);
        self
    }

    pub fn insert<F, R>(&mut self, name: impl Into<String>, selector: F)
    where
        F: Fn(&S, &Args<'_>) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Serialize + 'static,
    {
        let select: Arc<dyn Fn(&S, &Args<'_>) -> anyhow::Result<Value> + Send + Sync> =
            Arc::new(move |state: &S, args: &Args<'_>| {
                Ok(serde_json::to_value(selector(state, args)?)?)
            });
        self.selectors.insert(name.into(), select);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.selectors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }
}

impl<S: ?Sized + 'static> Default for SelectorMap<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ?Sized> Clone for SelectorMap<S> {
    fn clone(&self) -> Self {
        Self {
            selectors: self.selectors.clone(),
        }
    }
}

impl<S: ?Sized> fmt::Debug for SelectorMap<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.selectors.keys()).finish()
    }
}

#[derive(Clone)]
enum Scope {
    Slice {
        namespace: String,
        select: SelectorFn,
    },
    Root {
        select: RootSelectorFn,
    },
}

/// A selector with its state argument supplied by an accessor.
#[derive(Clone)]
pub struct BoundSelector {
    name: String,
    scope: Scope,
    state: StateAccessor,
}

impl BoundSelector {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace the selector reads, or `None` for a root selector.
    pub fn namespace(&self) -> Option<&str> {
        match &self.scope {
            Scope::Slice { namespace, .. } => Some(namespace),
            Scope::Root { .. } => None,
        }
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, StoreError> {
        let root = (self.state)();
        let args = Args::new(&self.name, args);
        let result = match &self.scope {
            Scope::Slice { namespace, select } => {
                select(root.get(namespace).unwrap_or(&NULL), &args)
            }
            Scope::Root { select } => select(&*root, &args),
        };
        result.map_err(|source| StoreError::Selector {
            name: self.name.clone(),
            source,
        })
    }
}

impl fmt::Debug for BoundSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundSelector")
            .field("name", &self.name)
            .field("namespace", &self.namespace())
            .finish()
    }
}

/// Bind a module's selectors to the `namespace` slice of the accessor's state.
pub fn bind_selectors(
    selectors: &SliceSelectors,
    namespace: &str,
    state: &StateAccessor,
) -> Vec<BoundSelector> {
    selectors
        .selectors
        .iter()
        .map(|(name, select)| BoundSelector {
            name: name.clone(),
            scope: Scope::Slice {
                namespace: namespace.to_string(),
                select: select.clone(),
            },
            state: state.clone(),
        })
        .collect()
}

/// Bind root selectors to the accessor's whole state.
pub fn bind_root_selectors(selectors: &RootSelectors, state: &StateAccessor) -> Vec<BoundSelector> {
    selectors
        .selectors
        .iter()
        .map(|(name, select)| BoundSelector {
            name: name.clone(),
            scope: Scope::Root {
                select: select.clone(),
            },
            state: state.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::RwLock;

    fn cell(initial: Value) -> (Arc<RwLock<Arc<RootState>>>, StateAccessor) {
        let mut root = RootState::new();
        root.insert("widgets", initial).unwrap();
        let cell = Arc::new(RwLock::new(Arc::new(root)));
        let reader = cell.clone();
        let accessor: StateAccessor = Arc::new(move || reader.read().unwrap().clone());
        (cell, accessor)
    }

    fn set(cell: &RwLock<Arc<RootState>>, value: Value) {
        let mut root = cell.read().unwrap().thaw();
        root.insert("widgets", value).unwrap();
        *cell.write().unwrap() = Arc::new(root);
    }

    #[test]
    fn bound_selectors_read_live_state() {
        let (cell, accessor) = cell(json!({"x": 1}));
        let selectors = SliceSelectors::new().on("x", |state, _| Ok(state["x"].clone()));
        let bound = bind_selectors(&selectors, "widgets", &accessor);
        let x = &bound[0];

        assert_eq!(x.call(&[]).unwrap(), json!(1));
        set(&cell, json!({"x": 2}));
        assert_eq!(x.call(&[]).unwrap(), json!(2));
    }

    #[test]
    fn selector_arguments_follow_state() {
        let (_cell, accessor) = cell(json!({"items": {"w1": {"name": "Widget"}}}));
        let selectors = SliceSelectors::new().on("getWidget", |state, args| {
            let id: String = args.get(0)?;
            Ok(state["items"].get(&id).cloned())
        });
        let bound = bind_selectors(&selectors, "widgets", &accessor);

        assert_eq!(bound[0].call(&[json!("w1")]).unwrap(), json!({"name": "Widget"}));
        assert_eq!(bound[0].call(&[json!("nope")]).unwrap(), Value::Null);

        let err = bound[0].call(&[]).unwrap_err();
        assert!(matches!(err, StoreError::Selector { name, .. } if name == "getWidget"));
    }

    #[test]
    fn root_selectors_see_every_namespace() {
        let (_cell, accessor) = cell(json!({"x": 1}));
        let selectors =
            RootSelectors::new().on("namespaces", |root, _| Ok(root.namespaces().map(str::to_string).collect::<Vec<_>>()));
        let bound = bind_root_selectors(&selectors, &accessor);

        assert_eq!(bound[0].namespace(), None);
        assert_eq!(bound[0].call(&[]).unwrap(), json!(["widgets"]));
    }
}
