//! The annotation sidebar's store, composed from the modules below.
//!
//! [`SidebarStore`] wraps the composed [`Store`] with typed methods, so the
//! app never spells a method name or builds a `Value` argument list itself.

pub mod annotations;
pub mod drafts;
pub mod session;
pub mod sidebar_panels;

use std::sync::Arc;

use annotator_store::{Dispatched, Store, StoreConfig, StoreError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

pub use drafts::Draft;
pub use session::{AuthState, Profile, ProfileService, StaticProfileService, UserInfo};

/// Settings the sidebar is started with. Passed to every module's initial
/// state factory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidebarSettings {
    pub authority: String,
}

impl Default for SidebarSettings {
    fn default() -> Self {
        Self {
            authority: "hypothes.is".into(),
        }
    }
}

pub fn create_sidebar_store(
    settings: &SidebarSettings,
    config: StoreConfig,
    profiles: Arc<dyn ProfileService>,
) -> Result<SidebarStore, StoreError> {
    let settings = to_arg(settings)?;
    let store = Store::builder()
        .module(session::module(profiles))
        .module(sidebar_panels::module())
        .module(annotations::module())
        .module(drafts::module())
        .init_args(vec![settings])
        .config(config)
        .build()?;
    Ok(SidebarStore { store })
}

fn to_arg(value: impl Serialize) -> Result<Value, StoreError> {
    Ok(serde_json::to_value(value).map_err(anyhow::Error::from)?)
}

/// The sidebar store's method surface.
#[derive(Debug, Clone)]
pub struct SidebarStore {
    store: Store,
}

impl SidebarStore {
    /// The untyped store underneath, for `subscribe` and `get_state`.
    pub fn store(&self) -> &Store {
        &self.store
    }

    fn select<T: DeserializeOwned>(&self, name: &str, args: &[Value]) -> Result<T, StoreError> {
        self.store.select_as(name, args)
    }

    // --- session ---

    /// Starts the profile fetch. Await [`Dispatched::settled`] to wait for it.
    pub fn fetch_profile(&self) -> Result<Dispatched, StoreError> {
        self.store.call("fetchProfile", &[])
    }

    pub fn update_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        self.store.call("updateProfile", &[to_arg(profile)?])?;
        Ok(())
    }

    pub fn profile(&self) -> Result<Profile, StoreError> {
        self.select("profile", &[])
    }

    pub fn has_fetched_profile(&self) -> Result<bool, StoreError> {
        self.select("hasFetchedProfile", &[])
    }

    pub fn is_logged_in(&self) -> Result<bool, StoreError> {
        self.select("isLoggedIn", &[])
    }

    pub fn default_authority(&self) -> Result<Option<String>, StoreError> {
        self.select("defaultAuthority", &[])
    }

    /// What the top bar shows, or `None` until the profile has been fetched.
    pub fn auth_state(&self) -> Result<Option<AuthState>, StoreError> {
        if !self.has_fetched_profile()? {
            return Ok(None);
        }
        self.select("authState", &[]).map(Some)
    }

    // --- sidebar panels ---

    pub fn open_sidebar_panel(&self, name: &str) -> Result<(), StoreError> {
        self.store.call("openSidebarPanel", &[json!(name)])?;
        Ok(())
    }

    pub fn close_sidebar_panel(&self, name: &str) -> Result<(), StoreError> {
        self.store.call("closeSidebarPanel", &[json!(name)])?;
        Ok(())
    }

    /// Flip a panel, or force it open or closed with `open`.
    pub fn toggle_sidebar_panel(&self, name: &str, open: Option<bool>) -> Result<(), StoreError> {
        self.store.call("toggleSidebarPanel", &[json!(name), json!(open)])?;
        Ok(())
    }

    pub fn is_sidebar_panel_open(&self, name: &str) -> Result<bool, StoreError> {
        self.select("isSidebarPanelOpen", &[json!(name)])
    }

    pub fn active_panel_name(&self) -> Result<Option<String>, StoreError> {
        self.select("activePanelName", &[])
    }

    // --- annotations ---

    pub fn add_annotations(&self, annotations: &[Value]) -> Result<(), StoreError> {
        self.store.call("addAnnotations", &[json!(annotations)])?;
        Ok(())
    }

    pub fn remove_annotations(&self, annotations: &[Value]) -> Result<(), StoreError> {
        self.store.call("removeAnnotations", &[json!(annotations)])?;
        Ok(())
    }

    pub fn clear_annotations(&self) -> Result<(), StoreError> {
        self.store.call("clearAnnotations", &[])?;
        Ok(())
    }

    pub fn all_annotations(&self) -> Result<Vec<Value>, StoreError> {
        self.select("allAnnotations", &[])
    }

    pub fn annotation_count(&self) -> Result<usize, StoreError> {
        self.select("annotationCount", &[])
    }

    pub fn find_annotation_by_id(&self, id: &str) -> Result<Option<Value>, StoreError> {
        self.select("findAnnotationByID", &[json!(id)])
    }

    pub fn find_annotation_by_tag(&self, tag: &str) -> Result<Option<Value>, StoreError> {
        self.select("findAnnotationByTag", &[json!(tag)])
    }

    /// Annotations that have never been saved.
    pub fn new_annotations(&self) -> Result<Vec<Value>, StoreError> {
        self.select("newAnnotations", &[])
    }

    // --- drafts ---

    /// `changes` holds any of `text`, `tags` and `isPrivate`.
    pub fn create_draft(&self, annotation: &Value, changes: Value) -> Result<(), StoreError> {
        self.store.call("createDraft", &[annotation.clone(), changes])?;
        Ok(())
    }

    pub fn remove_draft(&self, annotation: &Value) -> Result<(), StoreError> {
        self.store.call("removeDraft", &[annotation.clone()])?;
        Ok(())
    }

    pub fn discard_all_drafts(&self) -> Result<(), StoreError> {
        self.store.call("discardAllDrafts", &[])?;
        Ok(())
    }

    pub fn delete_new_and_empty_drafts(&self) -> Result<(), StoreError> {
        self.store.call("deleteNewAndEmptyDrafts", &[])?;
        Ok(())
    }

    pub fn count_drafts(&self) -> Result<usize, StoreError> {
        self.select("countDrafts", &[])
    }

    pub fn get_draft(&self, annotation: &Value) -> Result<Option<Draft>, StoreError> {
        self.select("getDraft", &[annotation.clone()])
    }

    pub fn get_draft_if_not_empty(&self, annotation: &Value) -> Result<Option<Draft>, StoreError> {
        self.select("getDraftIfNotEmpty", &[annotation.clone()])
    }

    /// Annotations with a draft that were never saved.
    pub fn unsaved_annotations(&self) -> Result<Vec<Value>, StoreError> {
        self.select("unsavedAnnotations", &[])
    }

    // --- app flows ---

    /// The message shown before logging out with unsaved drafts, if any.
    pub fn logout_prompt(&self) -> Result<Option<String>, StoreError> {
        Ok(match self.count_drafts()? {
            0 => None,
            1 => Some(
                "You have an unsaved annotation.\nDo you really want to discard this draft?".into(),
            ),
            n => Some(format!(
                "You have {n} unsaved annotations.\nDo you really want to discard these drafts?"
            )),
        })
    }

    /// Drop everything the user hadn't saved and forget their profile.
    ///
    /// Callers should confirm with [`logout_prompt`](Self::logout_prompt) first.
    pub fn logout(&self) -> Result<(), StoreError> {
        let unsaved = self.unsaved_annotations()?;

        self.remove_annotations(&unsaved)?;
        self.discard_all_drafts()?;
        self.close_sidebar_panel("loginPrompt")?;
        self.update_profile(&Profile::default())?;

        info!(discarded = unsaved.len(), "Logged out");
        Ok(())
    }
}
