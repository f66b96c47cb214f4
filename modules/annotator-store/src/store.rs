//! The store: composed modules behind one dispatch pipeline and one flat
//! method surface.

use std::cell::Cell;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::action::{Action, Args, Dispatch, Dispatched};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::middleware::{LoggingMiddleware, Middleware, Next, ThunkMiddleware};
use crate::module::{ActionCreatorFn, StoreModule};
use crate::reducer::{create_reducer, Reduction, RootReducer};
use crate::selector::{bind_root_selectors, bind_selectors, BoundSelector, StateAccessor};
use crate::state::RootState;

type Listener = Arc<dyn Fn(&RootState) + Send + Sync>;

/// A Redux-style container composed from [`StoreModule`]s.
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    state: RwLock<Arc<RootState>>,
    writer: Mutex<()>,
    reducer: RootReducer,
    middleware: Vec<Arc<dyn Middleware>>,
    actions: BTreeMap<String, ActionCreatorFn>,
    selectors: BTreeMap<String, BoundSelector>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener: AtomicU64,
    outbox: Mutex<Outbox>,
    config: StoreConfig,
}

/// Published states waiting to be delivered to listeners, in publish order.
#[derive(Default)]
struct Outbox {
    queue: VecDeque<Arc<RootState>>,
    draining: bool,
}

/// Create a store from a set of modules.
///
/// Each module's initial state is built from `init_args` and placed under its
/// namespace. Every action creator becomes a method that dispatches its
/// result, and every selector a method that reads the current state. Method
/// names must be unique across all modules.
pub fn create_store(
    modules: Vec<StoreModule>,
    init_args: &[Value],
    middleware: Vec<Arc<dyn Middleware>>,
    config: StoreConfig,
) -> Result<Store, StoreError> {
    let mut namespaces = HashSet::new();
    for module in &modules {
        if !namespaces.insert(module.namespace.as_str()) {
            return Err(StoreError::DuplicateNamespace(module.namespace.clone()));
        }
    }

    let mut initial = RootState::new();
    for module in &modules {
        let state = module.initial_state.build(init_args);
        if !state.is_object() {
            return Err(StoreError::InvalidInitialState(module.namespace.clone()));
        }
        initial.insert(module.namespace.clone(), state)?;
    }
    if config.strict {
        initial.seal();
    }

    let reducer = RootReducer::new(
        modules
            .iter()
            .map(|m| create_reducer(m.namespace.clone(), m.reducers.clone(), config.strict))
            .collect(),
        config.strict,
    );

    let mut methods = HashSet::new();
    let mut actions = BTreeMap::new();
    for module in &modules {
        for (name, create) in module.action_creators.iter() {
            assign_once(&mut methods, name)?;
            actions.insert(name.clone(), create.clone());
        }
    }
    for module in &modules {
        for name in module.selectors.names() {
            assign_once(&mut methods, name)?;
        }
        if let Some(root) = &module.root_selectors {
            for name in root.names() {
                assign_once(&mut methods, name)?;
            }
        }
    }

    let mut chain: Vec<Arc<dyn Middleware>> = Vec::with_capacity(middleware.len() + 2);
    if config.log_actions {
        chain.push(Arc::new(LoggingMiddleware::new()));
    }
    chain.push(Arc::new(ThunkMiddleware));
    chain.extend(middleware);

    let inner = Arc::new_cyclic(|weak: &Weak<StoreInner>| {
        let weak = weak.clone();
        let accessor: StateAccessor = Arc::new(move || {
            weak.upgrade()
                .map(|inner| inner.snapshot())
                .unwrap_or_default()
        });

        let mut selectors = BTreeMap::new();
        for module in &modules {
            for bound in bind_selectors(&module.selectors, &module.namespace, &accessor) {
                selectors.insert(bound.name().to_string(), bound);
            }
            if let Some(root) = &module.root_selectors {
                for bound in bind_root_selectors(root, &accessor) {
                    selectors.insert(bound.name().to_string(), bound);
                }
            }
        }

        StoreInner {
            state: RwLock::new(Arc::new(initial)),
            writer: Mutex::new(()),
            reducer,
            middleware: chain,
            actions,
            selectors,
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            outbox: Mutex::new(Outbox::default()),
            config,
        }
    });

    info!(
        modules = modules.len(),
        actions = inner.actions.len(),
        selectors = inner.selectors.len(),
        strict = config.strict,
        "Store created"
    );

    Ok(Store { inner })
}

fn assign_once(methods: &mut HashSet<String>, name: &str) -> Result<(), StoreError> {
    if !methods.insert(name.to_string()) {
        return Err(StoreError::DuplicateMethod(name.to_string()));
    }
    Ok(())
}

impl Store {
    pub fn builder() -> StoreBuilder {
        StoreBuilder::default()
    }

    /// Send an action or thunk through the middleware chain.
    pub fn dispatch(&self, action: impl Into<Dispatch>) -> Result<Dispatched, StoreError> {
        self.run_from(0, action.into())
    }

    /// The current root state. Snapshots never change after they are handed
    /// out; dispatch replaces the store's snapshot instead.
    pub fn get_state(&self) -> Arc<RootState> {
        self.inner.snapshot()
    }

    /// Call `listener` with the new state after every applied action.
    ///
    /// Listeners see states in the order they were published, one at a time,
    /// even when several threads dispatch. A dispatch that lands while another
    /// thread is delivering returns before its own state has been delivered.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&RootState) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.listeners).push((id, Arc::new(listener)));
        Subscription {
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    /// Invoke an action method: build its action (or thunk) and dispatch it.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Dispatched, StoreError> {
        self.action(name)?.call(args)
    }

    /// Invoke a selector method against the current state.
    pub fn select(&self, name: &str, args: &[Value]) -> Result<Value, StoreError> {
        self.selector(name)?.call(args)
    }

    /// [`select`](Self::select), decoded into `T`.
    pub fn select_as<T: DeserializeOwned>(&self, name: &str, args: &[Value]) -> Result<T, StoreError> {
        let value = self.select(name, args)?;
        serde_json::from_value(value).map_err(|e| StoreError::Selector {
            name: name.to_string(),
            source: e.into(),
        })
    }

    /// A reusable handle to an action method.
    pub fn action(&self, name: &str) -> Result<BoundAction, StoreError> {
        let create = self
            .inner
            .actions
            .get(name)
            .ok_or_else(|| StoreError::UnknownMethod(name.to_string()))?;
        Ok(BoundAction {
            name: name.to_string(),
            create: create.clone(),
            store: self.clone(),
        })
    }

    /// A reusable handle to a selector method. It reads the live state on
    /// every call, not the state at the time it was obtained.
    pub fn selector(&self, name: &str) -> Result<BoundSelector, StoreError> {
        self.inner
            .selectors
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownMethod(name.to_string()))
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.inner.actions.keys().map(String::as_str)
    }

    pub fn selector_names(&self) -> impl Iterator<Item = &str> {
        self.inner.selectors.keys().map(String::as_str)
    }

    pub fn config(&self) -> StoreConfig {
        self.inner.config
    }

    pub(crate) fn run_from(&self, index: usize, action: Dispatch) -> Result<Dispatched, StoreError> {
        match self.inner.middleware.get(index) {
            Some(middleware) => {
                let api = Dispatcher {
                    store: self.clone(),
                };
                middleware.handle(&api, action, Next::new(self, index + 1))
            }
            None => match action {
                Dispatch::Action(action) => self.apply(action),
                Dispatch::Thunk(thunk) => Err(StoreError::UnhandledThunk(thunk.label().to_string())),
            },
        }
    }

    /// Run the root reducer and publish the next state. One transition per
    /// call; nothing is published if any reducer fails.
    fn apply(&self, action: Action) -> Result<Dispatched, StoreError> {
        let scope = ReducerScope::enter()?;
        let writer = lock(&self.inner.writer);

        let current = self.get_state();
        let Reduction { state, touched } = self.inner.reducer.reduce(&current, &action)?;
        let next = Arc::new(state);
        *self
            .inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner) = next.clone();
        // Queued under the writer lock so delivery order matches publish order.
        lock(&self.inner.outbox).queue.push_back(next);

        drop(writer);
        drop(scope);

        debug!(kind = %action.kind, touched = ?touched, "Action applied");
        self.notify();
        Ok(Dispatched::Applied)
    }

    /// Deliver queued states to listeners. Only one thread drains at a time;
    /// states published meanwhile (including by listeners that dispatch) are
    /// delivered by the draining thread, after the ones queued before them.
    fn notify(&self) {
        {
            let mut outbox = lock(&self.inner.outbox);
            if outbox.draining {
                return;
            }
            outbox.draining = true;
        }
        let _drain = DrainGuard(&self.inner.outbox);

        loop {
            let state = {
                let mut outbox = lock(&self.inner.outbox);
                match outbox.queue.pop_front() {
                    Some(state) => state,
                    None => {
                        outbox.draining = false;
                        return;
                    }
                }
            };
            let listeners: Vec<Listener> = lock(&self.inner.listeners)
                .iter()
                .map(|(_, listener)| listener.clone())
                .collect();
            for listener in listeners {
                listener(&state);
            }
        }
    }
}

/// Releases the drain if a listener panics.
struct DrainGuard<'a>(&'a Mutex<Outbox>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            lock(self.0).draining = false;
        }
    }
}

impl StoreInner {
    fn snapshot(&self) -> Arc<RootState> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("namespaces", &self.get_state().namespaces().collect::<Vec<_>>())
            .field("actions", &self.action_names().collect::<Vec<_>>())
            .field("selectors", &self.selector_names().collect::<Vec<_>>())
            .field("config", &self.inner.config)
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

thread_local! {
    static IN_REDUCER: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as running reducers.
struct ReducerScope;

impl ReducerScope {
    fn enter() -> Result<Self, StoreError> {
        if IN_REDUCER.with(|flag| flag.replace(true)) {
            return Err(StoreError::ReentrantDispatch);
        }
        Ok(ReducerScope)
    }
}

impl Drop for ReducerScope {
    fn drop(&mut self) {
        IN_REDUCER.with(|flag| flag.set(false));
    }
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// What thunks and middleware get to talk to the store.
#[derive(Clone)]
pub struct Dispatcher {
    store: Store,
}

impl Dispatcher {
    /// Dispatch from the top of the middleware chain.
    pub fn dispatch(&self, action: impl Into<Dispatch>) -> Result<Dispatched, StoreError> {
        self.store.dispatch(action)
    }

    pub fn get_state(&self) -> Arc<RootState> {
        self.store.get_state()
    }

    pub fn select(&self, name: &str, args: &[Value]) -> Result<Value, StoreError> {
        self.store.select(name, args)
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Result<Dispatched, StoreError> {
        self.store.call(name, args)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Dispatcher").field(&self.store).finish()
    }
}

/// An action creator bound to a store's dispatch.
#[derive(Clone)]
pub struct BoundAction {
    name: String,
    create: ActionCreatorFn,
    store: Store,
}

impl BoundAction {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Result<Dispatched, StoreError> {
        let action = (self.create)(&Args::new(&self.name, args)).map_err(|source| {
            StoreError::ActionCreator {
                name: self.name.clone(),
                source,
            }
        })?;
        self.store.dispatch(action)
    }
}

impl fmt::Debug for BoundAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundAction").field("name", &self.name).finish()
    }
}

/// Handle returned by [`Store::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    store: Weak<StoreInner>,
}

impl Subscription {
    /// Stop receiving updates. Returns `false` if the store is gone or the
    /// listener was already removed.
    pub fn unsubscribe(self) -> bool {
        let Some(inner) = self.store.upgrade() else {
            return false;
        };
        let mut listeners = lock(&inner.listeners);
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != self.id);
        listeners.len() != before
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Collects the arguments to [`create_store`].
#[derive(Default)]
pub struct StoreBuilder {
    modules: Vec<StoreModule>,
    init_args: Vec<Value>,
    middleware: Vec<Arc<dyn Middleware>>,
    config: StoreConfig,
}

impl StoreBuilder {
    pub fn module(mut self, module: StoreModule) -> Self {
        self.modules.push(module);
        self
    }

    pub fn modules(mut self, modules: impl IntoIterator<Item = StoreModule>) -> Self {
        self.modules.extend(modules);
        self
    }

    pub fn init_args(mut self, args: Vec<Value>) -> Self {
        self.init_args = args;
        self
    }

    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Store, StoreError> {
        create_store(self.modules, &self.init_args, self.middleware, self.config)
    }
}
