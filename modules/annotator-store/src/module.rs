//! Store modules: the unit of composition.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::action::{Action, Args, Dispatch};
use crate::reducer::ReducerMap;
use crate::selector::{RootSelectors, SliceSelectors};
use crate::state::RootState;

/// `(args) -> action or thunk`.
pub type ActionCreatorFn = Arc<dyn Fn(&Args<'_>) -> anyhow::Result<Dispatch> + Send + Sync>;

/// Map of action creator name to action creator.
#[derive(Clone, Default)]
pub struct ActionCreators {
    creators: BTreeMap<String, ActionCreatorFn>,
}

impl ActionCreators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F, D>(mut self, name: impl Into<String>, creator: F) -> Self
    where
        F: Fn(&Args<'_>) -> anyhow::Result<D> + Send + Sync + 'static,
        D: Into<Dispatch> + 'static,
    {
        self.insert(name, creator);
        self
    }

    pub fn insert<F, D>(&mut self, name: impl Into<String>, creator: F)
    where
        F: Fn(&Args<'_>) -> anyhow::Result<D> + Send + Sync + 'static,
        D: Into<Dispatch> + 'static,
    {
        let create: ActionCreatorFn = Arc::new(move |args: &Args<'_>| -> anyhow::Result<Dispatch> {
            creator(args).map(Into::into)
        });
        self.creators.insert(name.into(), create);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.creators.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.creators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.creators.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &ActionCreatorFn)> {
        self.creators.iter()
    }
}

impl fmt::Debug for ActionCreators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.creators.keys()).finish()
    }
}

/// Builds a module's sub-state from the store's init args.
pub type InitialStateFn = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// A fixed initial state, or a factory receiving the `init_args` passed to
/// the store.
#[derive(Clone)]
pub enum InitialState {
    Value(Value),
    Factory(InitialStateFn),
}

impl InitialState {
    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        InitialState::Factory(Arc::new(factory))
    }

    pub fn build(&self, init_args: &[Value]) -> Value {
        match self {
            InitialState::Value(value) => value.clone(),
            InitialState::Factory(factory) => factory(init_args),
        }
    }
}

impl From<Value> for InitialState {
    fn from(value: Value) -> Self {
        InitialState::Value(value)
    }
}

impl fmt::Debug for InitialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitialState::Value(value) => f.debug_tuple("Value").field(value).finish(),
            InitialState::Factory(_) => f.write_str("Factory"),
        }
    }
}

/// Everything but the initial state, as passed to [`create_store_module`].
#[derive(Debug, Clone, Default)]
pub struct ModuleConfig {
    pub namespace: String,
    pub reducers: ReducerMap,
    pub action_creators: ActionCreators,
    pub selectors: SliceSelectors,
    pub root_selectors: Option<RootSelectors>,
}

/// A namespace's initial state, reducers, action creators and selectors.
#[derive(Debug, Clone)]
pub struct StoreModule {
    pub(crate) namespace: String,
    pub(crate) initial_state: InitialState,
    pub(crate) reducers: ReducerMap,
    pub(crate) action_creators: ActionCreators,
    pub(crate) selectors: SliceSelectors,
    pub(crate) root_selectors: Option<RootSelectors>,
}

/// Create a module that can be passed to [`create_store`](crate::create_store).
pub fn create_store_module(initial_state: impl Into<InitialState>, config: ModuleConfig) -> StoreModule {
    StoreModule {
        namespace: config.namespace,
        initial_state: initial_state.into(),
        reducers: config.reducers,
        action_creators: config.action_creators,
        selectors: config.selectors,
        root_selectors: config.root_selectors,
    }
}

impl StoreModule {
    pub fn builder(namespace: impl Into<String>) -> StoreModuleBuilder {
        StoreModuleBuilder {
            namespace: namespace.into(),
            initial_state: InitialState::Value(Value::Object(Default::default())),
            reducers: ReducerMap::new(),
            action_creators: ActionCreators::new(),
            selectors: SliceSelectors::new(),
            root_selectors: None,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn reducers(&self) -> &ReducerMap {
        &self.reducers
    }

    /// Every method name the module adds to the store.
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.action_creators.names().collect();
        names.extend(self.selectors.names());
        if let Some(root) = &self.root_selectors {
            names.extend(root.names());
        }
        names
    }
}

pub struct StoreModuleBuilder {
    namespace: String,
    initial_state: InitialState,
    reducers: ReducerMap,
    action_creators: ActionCreators,
    selectors: SliceSelectors,
    root_selectors: Option<RootSelectors>,
}

impl StoreModuleBuilder {
    pub fn initial_state(mut self, state: impl Into<InitialState>) -> Self {
        self.initial_state = state.into();
        self
    }

    pub fn reducer<F>(mut self, kind: impl Into<String>, reducer: F) -> Self
    where
        F: Fn(&Value, &Action) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.reducers.insert(kind, reducer);
        self
    }

    pub fn reducer_with<P, F>(mut self, kind: impl Into<String>, reducer: F) -> Self
    where
        P: DeserializeOwned + 'static,
        F: Fn(&Value, P) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.reducers = self.reducers.on_payload(kind, reducer);
        self
    }

    pub fn action<F, D>(mut self, name: impl Into<String>, creator: F) -> Self
    where
        F: Fn(&Args<'_>) -> anyhow::Result<D> + Send + Sync + 'static,
        D: Into<Dispatch> + 'static,
    {
        self.action_creators.insert(name, creator);
        self
    }

    pub fn selector<F, R>(mut self, name: impl Into<String>, selector: F) -> Self
    where
        F: Fn(&Value, &Args<'_>) -> anyhow::Result<R> + Send + Sync + 'static,
        R: serde::Serialize + 'static,
    {
        self.selectors.insert(name, selector);
        self
    }

    pub fn root_selector<F, R>(mut self, name: impl Into<String>, selector: F) -> Self
    where
        F: Fn(&RootState, &Args<'_>) -> anyhow::Result<R> + Send + Sync + 'static,
        R: serde::Serialize + 'static,
    {
        self.root_selectors
            .get_or_insert_with(RootSelectors::new)
            .insert(name, selector);
        self
    }

    pub fn build(self) -> StoreModule {
        create_store_module(
            self.initial_state,
            ModuleConfig {
                namespace: self.namespace,
                reducers: self.reducers,
                action_creators: self.action_creators,
                selectors: self.selectors,
                root_selectors: self.root_selectors,
            },
        )
    }
}
