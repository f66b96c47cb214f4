//! Store composition and dispatch tests.
//! No async runtime needed: plain actions apply synchronously.

use std::sync::{Arc, Barrier, Mutex, OnceLock};
use std::thread;
use std::time::Duration;

use annotator_store::{
    create_store, create_store_module, Action, ActionCreators, Dispatched, InitialState,
    ModuleConfig, ReducerMap, RootState, SliceSelectors, Store, StoreConfig, StoreError,
    StoreModule,
};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Test modules
// ---------------------------------------------------------------------------

fn counter_module() -> StoreModule {
    StoreModule::builder("counter")
        .initial_state(json!({"a": 1, "b": 2, "x": 1}))
        .reducer("setA", |_, action| Ok(json!({"a": action.get("a").cloned()})))
        .reducer("setX", |_, action| Ok(json!({"x": action.get("x").cloned()})))
        .action("setA", |args| Ok(Action::new("setA").with("a", args.get::<i64>(0)?)))
        .action("setX", |args| Ok(Action::new("setX").with("x", args.get::<i64>(0)?)))
        .selector("a", |state, _| Ok(state["a"].clone()))
        .selector("x", |state, _| Ok(state["x"].clone()))
        .build()
}

fn widgets_module() -> StoreModule {
    let reducers = ReducerMap::new().on("ADD_WIDGET", |state, action| {
        let widget = action.get("widget").cloned().unwrap_or(Value::Null);
        let id = widget["id"].as_str().unwrap_or_default().to_string();
        let mut items = state["items"].as_object().cloned().unwrap_or_default();
        items.insert(id, widget);
        Ok(json!({"items": items}))
    });

    create_store_module(
        json!({"items": {}}),
        ModuleConfig {
            namespace: "widgets".into(),
            reducers,
            action_creators: ActionCreators::new().on("addWidget", |args| {
                Ok(Action::new("ADD_WIDGET").with("widget", args.get::<Value>(0)?))
            }),
            selectors: SliceSelectors::new()
                .on("getWidget", |state, args| {
                    let id: String = args.get(0)?;
                    Ok(state["items"].get(&id).cloned())
                })
                .on("widgetCount", |state, _| {
                    Ok(state["items"].as_object().map_or(0, |items| items.len()))
                }),
            root_selectors: None,
        },
    )
}

fn store() -> Store {
    create_store(
        vec![counter_module(), widgets_module()],
        &[],
        vec![],
        StoreConfig::strict(),
    )
    .unwrap()
}

// =========================================================================
// Composition
// =========================================================================

#[test]
fn initial_state_is_keyed_by_namespace() {
    let store = store();
    let state = store.get_state();

    assert_eq!(state.namespaces().collect::<Vec<_>>(), vec!["counter", "widgets"]);
    assert_eq!(state.get("counter"), Some(&json!({"a": 1, "b": 2, "x": 1})));
    assert_eq!(state.get("widgets"), Some(&json!({"items": {}})));
}

#[test]
fn init_args_reach_every_factory() {
    let session = StoreModule::builder("session")
        .initial_state(InitialState::factory(|args| json!({"authority": args[0].clone()})))
        .build();
    let settings = StoreModule::builder("settings")
        .initial_state(InitialState::factory(|args| json!({"debug": args[1].clone()})))
        .build();

    let store = Store::builder()
        .modules([session, settings])
        .init_args(vec![json!("hypothes.is"), json!(true)])
        .build()
        .unwrap();

    let state = store.get_state();
    assert_eq!(state.get("session"), Some(&json!({"authority": "hypothes.is"})));
    assert_eq!(state.get("settings"), Some(&json!({"debug": true})));
}

#[test]
fn every_method_lands_on_the_store() {
    let store = store();
    let actions: Vec<_> = store.action_names().collect();
    let selectors: Vec<_> = store.selector_names().collect();

    assert_eq!(actions, vec!["addWidget", "setA", "setX"]);
    assert_eq!(selectors, vec!["a", "getWidget", "widgetCount", "x"]);
}

#[test]
fn duplicate_selector_names_are_rejected() {
    let first = StoreModule::builder("first")
        .selector("getWidget", |_, _| Ok(1))
        .build();
    let second = StoreModule::builder("second")
        .selector("getWidget", |_, _| Ok(2))
        .build();

    let err = create_store(vec![first, second], &[], vec![], StoreConfig::strict()).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateMethod(name) if name == "getWidget"));
}

#[test]
fn duplicate_names_are_rejected_in_production_too() {
    let first = StoreModule::builder("first")
        .action("reset", |_| Ok(Action::new("RESET")))
        .build();
    let second = StoreModule::builder("second")
        .root_selector("reset", |_, _| Ok(Value::Null))
        .build();

    let err =
        create_store(vec![first, second], &[], vec![], StoreConfig::production()).unwrap_err();
    assert_eq!(err.to_string(), "Cannot add duplicate 'reset' method to store");
}

#[test]
fn duplicate_namespaces_are_rejected() {
    let err = create_store(
        vec![counter_module(), counter_module()],
        &[],
        vec![],
        StoreConfig::strict(),
    )
    .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateNamespace(ns) if ns == "counter"));
}

#[test]
fn non_object_initial_state_is_rejected() {
    let module = StoreModule::builder("broken").initial_state(json!(42)).build();
    let err = create_store(vec![module], &[], vec![], StoreConfig::strict()).unwrap_err();
    assert!(matches!(err, StoreError::InvalidInitialState(ns) if ns == "broken"));
}

// =========================================================================
// Dispatch
// =========================================================================

#[test]
fn partial_update_merges_into_sub_state() {
    let store = store();
    store.dispatch(Action::new("setA").with("a", 9)).unwrap();

    assert_eq!(
        store.get_state().get("counter"),
        Some(&json!({"a": 9, "b": 2, "x": 1}))
    );
}

#[test]
fn actions_only_touch_their_own_namespace() {
    let store = store();
    let before = store.get_state();

    store.call("setA", &[json!(5)]).unwrap();

    let after = store.get_state();
    assert_eq!(after.get("widgets"), before.get("widgets"));
    assert!(Arc::ptr_eq(
        &after.slice("widgets").unwrap(),
        &before.slice("widgets").unwrap()
    ));
    assert_ne!(after.get("counter"), before.get("counter"));
}

#[test]
fn unknown_kind_is_a_no_op() {
    let store = store();
    let before = store.get_state();

    let outcome = store.dispatch(Action::new("nonexistent")).unwrap();
    assert!(matches!(outcome, Dispatched::Applied));
    assert_eq!(*store.get_state(), *before);
}

#[test]
fn repeated_no_op_matches_single_no_op() {
    let once = store();
    let twice = store();

    once.dispatch(Action::new("nonexistent")).unwrap();
    twice.dispatch(Action::new("nonexistent")).unwrap();
    twice.dispatch(Action::new("nonexistent")).unwrap();

    assert_eq!(once.get_state().to_value(), twice.get_state().to_value());
}

#[test]
fn failing_reducer_publishes_nothing() {
    let module = StoreModule::builder("fragile")
        .initial_state(json!({"n": 0}))
        .reducer("BUMP", |state, _| Ok(json!({"n": state["n"].as_i64().unwrap_or(0) + 1})))
        .build();
    let failing = StoreModule::builder("failing")
        .reducer("BUMP", |_, _| Err(anyhow::anyhow!("refusing")))
        .build();
    let store = create_store(vec![module, failing], &[], vec![], StoreConfig::strict()).unwrap();

    let err = store.dispatch(Action::new("BUMP")).unwrap_err();
    assert!(matches!(err, StoreError::Reducer { namespace, .. } if namespace == "failing"));
    assert_eq!(store.get_state().get("fragile"), Some(&json!({"n": 0})));
}

#[test]
fn reducers_cannot_dispatch() {
    let slot: Arc<OnceLock<Store>> = Arc::new(OnceLock::new());
    let inner = slot.clone();
    let module = StoreModule::builder("loopy")
        .reducer("PING", move |_, _| {
            if let Some(store) = inner.get() {
                store.dispatch(Action::new("PONG"))?;
            }
            Ok(json!({}))
        })
        .build();
    let store = create_store(vec![module], &[], vec![], StoreConfig::production()).unwrap();
    slot.set(store.clone()).unwrap();

    let err = store.dispatch(Action::new("PING")).unwrap_err();
    let source = match err {
        StoreError::Reducer { source, .. } => source,
        other => panic!("expected reducer error, got {other:?}"),
    };
    assert!(matches!(
        source.downcast_ref::<StoreError>(),
        Some(StoreError::ReentrantDispatch)
    ));

    // The store is still usable afterwards.
    store.dispatch(Action::new("PONG")).unwrap();
}

// =========================================================================
// Selector and action methods
// =========================================================================

#[test]
fn bound_selectors_stay_live() {
    let store = store();
    let x = store.selector("x").unwrap();
    assert_eq!(x.call(&[]).unwrap(), json!(1));

    store.call("setX", &[json!(2)]).unwrap();
    assert_eq!(x.call(&[]).unwrap(), json!(2));
}

#[test]
fn action_methods_dispatch_their_result() {
    let store = store();
    let add = store.action("addWidget").unwrap();

    add.call(&[json!({"id": "w1", "name": "Sprocket"})]).unwrap();
    add.call(&[json!({"id": "w2", "name": "Gear"})]).unwrap();

    assert_eq!(store.select_as::<usize>("widgetCount", &[]).unwrap(), 2);
    assert_eq!(
        store.select("getWidget", &[json!("w2")]).unwrap(),
        json!({"id": "w2", "name": "Gear"})
    );
}

#[test]
fn action_creator_errors_name_the_method() {
    let store = store();
    let err = store.call("setA", &[json!("not a number")]).unwrap_err();
    assert!(matches!(err, StoreError::ActionCreator { name, .. } if name == "setA"));
    assert_eq!(store.get_state().get("counter").unwrap()["a"], json!(1));
}

#[test]
fn unknown_methods_are_reported() {
    let store = store();
    assert!(matches!(store.call("launch", &[]), Err(StoreError::UnknownMethod(_))));
    assert!(matches!(store.select("setA", &[]), Err(StoreError::UnknownMethod(_))));
}

#[test]
fn root_selectors_read_across_namespaces() {
    let summary = StoreModule::builder("summary")
        .root_selector("totals", |root: &RootState, _| {
            let a = root.get("counter").map_or(0, |c| c["a"].as_i64().unwrap_or(0));
            let widgets = root
                .get("widgets")
                .and_then(|w| w["items"].as_object())
                .map_or(0, |items| items.len());
            Ok(json!({"a": a, "widgets": widgets}))
        })
        .build();
    let store = create_store(
        vec![counter_module(), widgets_module(), summary],
        &[],
        vec![],
        StoreConfig::strict(),
    )
    .unwrap();

    store.call("setA", &[json!(4)]).unwrap();
    store.call("addWidget", &[json!({"id": "w1"})]).unwrap();

    assert_eq!(store.select("totals", &[]).unwrap(), json!({"a": 4, "widgets": 1}));
}

// =========================================================================
// Immutability
// =========================================================================

#[test]
fn strict_snapshots_are_frozen() {
    let store = store();
    let snapshot = store.get_state();
    assert!(snapshot.is_sealed());

    let mut copy = RootState::clone(&snapshot);
    let err = copy.insert("counter", json!({"a": 100})).unwrap_err();
    assert!(matches!(err, StoreError::Frozen(ns) if ns == "counter"));

    store.dispatch(Action::new("setA").with("a", 3)).unwrap();
    assert!(store.get_state().is_sealed());
    assert_eq!(snapshot.get("counter").unwrap()["a"], json!(1));
}

#[test]
fn production_snapshots_are_not_sealed() {
    let store = create_store(
        vec![counter_module()],
        &[],
        vec![],
        StoreConfig::production(),
    )
    .unwrap();

    let mut copy = RootState::clone(&store.get_state());
    assert!(!copy.is_sealed());
    copy.insert("counter", json!({"a": 100})).unwrap();

    // The store's own state is unaffected by writes to a copy.
    assert_eq!(store.get_state().get("counter").unwrap()["a"], json!(1));
}

// =========================================================================
// Subscriptions
// =========================================================================

#[test]
fn listeners_see_each_applied_state_until_unsubscribed() {
    let store = store();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let subscription = store.subscribe(move |state| {
        sink.lock().unwrap().push(state.get("counter").unwrap()["a"].clone());
    });

    store.call("setA", &[json!(2)]).unwrap();
    store.call("setA", &[json!(3)]).unwrap();
    assert!(subscription.unsubscribe());
    store.call("setA", &[json!(4)]).unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![json!(2), json!(3)]);
}

#[test]
fn listeners_see_states_in_publish_order_across_threads() {
    let store = store();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let in_listener = Arc::new(Barrier::new(2));

    let sink = seen.clone();
    let gate = in_listener.clone();
    let _subscription = store.subscribe(move |state| {
        let a = state.get("counter").unwrap()["a"].clone();
        if a == json!(1) {
            // Hold the first delivery open while the other thread dispatches.
            gate.wait();
            thread::sleep(Duration::from_millis(200));
        }
        sink.lock().unwrap().push(a);
    });

    let first = {
        let store = store.clone();
        thread::spawn(move || {
            store.call("setA", &[json!(1)]).unwrap();
        })
    };
    in_listener.wait();
    store.call("setA", &[json!(2)]).unwrap();
    first.join().unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![json!(1), json!(2)]);
    assert_eq!(store.get_state().get("counter").unwrap()["a"], json!(2));
}

#[test]
fn listeners_may_dispatch() {
    let store = store();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = seen.clone();
    let follower = store.clone();
    let _subscription = store.subscribe(move |state| {
        let a = state.get("counter").unwrap()["a"].as_i64().unwrap();
        sink.lock().unwrap().push(a);
        if a < 3 {
            follower.call("setA", &[json!(a + 1)]).unwrap();
        }
    });

    store.call("setA", &[json!(1)]).unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
}
