//! Modular application state container.
//!
//! Independently written *store modules* each own one namespace of the root
//! state. [`create_store`] composes them into a single [`Store`]: one root
//! reducer, one dispatch pipeline (with thunk support), and one flat surface
//! of named action and selector methods.
//!
//! Consumers call `store.call("addWidget", ..)` and
//! `store.select("getWidget", ..)` rather than touching `dispatch` and
//! `get_state` directly, which keeps the state layout private to each module.

pub mod action;
pub mod config;
pub mod error;
pub mod middleware;
pub mod module;
pub mod reducer;
pub mod selector;
pub mod state;
pub mod store;

pub use action::{make_action, Action, Args, Dispatch, Dispatched, Thunk, ThunkHandle};
pub use config::StoreConfig;
pub use error::StoreError;
pub use middleware::{LoggingMiddleware, Middleware, Next, ThunkMiddleware};
pub use module::{create_store_module, ActionCreators, InitialState, ModuleConfig, StoreModule};
pub use reducer::{create_reducer, ReducerMap, RootReducer, SliceReducer};
pub use selector::{bind_root_selectors, bind_selectors, BoundSelector, RootSelectors, SliceSelectors};
pub use state::{merge_patch, Patch, RootState};
pub use store::{create_store, BoundAction, Dispatcher, Store, StoreBuilder, Subscription};
