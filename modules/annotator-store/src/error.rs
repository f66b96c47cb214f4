use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Duplicate namespace '{0}' in store modules")]
    DuplicateNamespace(String),

    #[error("Cannot add duplicate '{0}' method to store")]
    DuplicateMethod(String),

    #[error("Initial state for '{0}' must be a JSON object")]
    InvalidInitialState(String),

    #[error("No store method named '{0}'")]
    UnknownMethod(String),

    #[error("Invalid payload for '{kind}': {reason}")]
    InvalidPayload { kind: String, reason: String },

    #[error("Bad argument {index} to '{method}': {reason}")]
    BadArgument {
        method: String,
        index: usize,
        reason: String,
    },

    #[error("Reducer '{namespace}/{kind}' failed: {source}")]
    Reducer {
        namespace: String,
        kind: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Reducer '{namespace}/{kind}' must return a JSON object patch")]
    InvalidPatch { namespace: String, kind: String },

    #[error("Reducer '{namespace}/{kind}' returned different patches for the same input")]
    NondeterministicReducer { namespace: String, kind: String },

    #[error("Selector '{name}' failed: {source}")]
    Selector {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Action creator '{name}' failed: {source}")]
    ActionCreator {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Cannot write '{0}' to frozen state")]
    Frozen(String),

    #[error("Reducers may not dispatch actions")]
    ReentrantDispatch,

    #[error("Thunk '{0}' reached the reducer without being run")]
    UnhandledThunk(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
