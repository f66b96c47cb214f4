//! Which sidebar panel (help, share, login prompt, ...) is open. At most one
//! panel is open at a time.

use annotator_store::{Action, StoreModule};
use serde_json::{json, Value};

pub const NAMESPACE: &str = "sidebarPanels";

fn open(name: &str) -> Value {
    json!({"activePanelName": name})
}

fn close() -> Value {
    json!({"activePanelName": null})
}

fn active(state: &Value) -> Option<&str> {
    state["activePanelName"].as_str()
}

pub fn module() -> StoreModule {
    StoreModule::builder(NAMESPACE)
        .initial_state(json!({"activePanelName": null}))
        .reducer("OPEN_SIDEBAR_PANEL", |_, action| {
            Ok(open(action.get("panelName").and_then(Value::as_str).unwrap_or_default()))
        })
        .reducer("CLOSE_SIDEBAR_PANEL", |state, action| {
            // Closing a panel that isn't open leaves the open one alone.
            let name = action.get("panelName").and_then(Value::as_str);
            if name.is_some() && active(state) == name {
                Ok(close())
            } else {
                Ok(json!({}))
            }
        })
        .reducer("TOGGLE_SIDEBAR_PANEL", |state, action| {
            let name = action.get("panelName").and_then(Value::as_str).unwrap_or_default();
            let should_open = match action.get("panelState").and_then(Value::as_bool) {
                Some(forced) => forced,
                None => active(state) != Some(name),
            };
            if should_open {
                Ok(open(name))
            } else if active(state) == Some(name) {
                Ok(close())
            } else {
                Ok(json!({}))
            }
        })
        .action("openSidebarPanel", |args| {
            Ok(Action::new("OPEN_SIDEBAR_PANEL").with("panelName", args.get::<String>(0)?))
        })
        .action("closeSidebarPanel", |args| {
            Ok(Action::new("CLOSE_SIDEBAR_PANEL").with("panelName", args.get::<String>(0)?))
        })
        .action("toggleSidebarPanel", |args| {
            let mut action =
                Action::new("TOGGLE_SIDEBAR_PANEL").with("panelName", args.get::<String>(0)?);
            if let Some(forced) = args.opt::<bool>(1)? {
                action = action.with("panelState", forced);
            }
            Ok(action)
        })
        .selector("isSidebarPanelOpen", |state, args| {
            let name: String = args.get(0)?;
            Ok(active(state) == Some(name.as_str()))
        })
        .selector("activePanelName", |state, _| Ok(state["activePanelName"].clone()))
        .build()
}
