//! The logged-in user's profile.

use std::sync::Arc;

use annotator_store::{Action, InitialState, StoreModule, Thunk};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

pub const NAMESPACE: &str = "session";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// `acct:<username>@<authority>`, or `None` when logged out.
    pub userid: Option<String>,
    #[serde(default)]
    pub user_info: Option<UserInfo>,
    #[serde(default)]
    pub preferences: serde_json::Map<String, Value>,
}

/// Where the profile comes from.
#[async_trait]
pub trait ProfileService: Send + Sync {
    async fn fetch_profile(&self) -> anyhow::Result<Profile>;
}

#[async_trait]
impl<P: ProfileService + ?Sized> ProfileService for Arc<P> {
    async fn fetch_profile(&self) -> anyhow::Result<Profile> {
        (**self).fetch_profile().await
    }
}

/// Always returns the same profile. For the demo and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticProfileService {
    profile: Profile,
}

impl StaticProfileService {
    pub fn new(profile: Profile) -> Self {
        Self { profile }
    }

    pub fn logged_in(username: &str, authority: &str) -> Self {
        Self::new(Profile {
            userid: Some(format!("acct:{username}@{authority}")),
            ..Profile::default()
        })
    }
}

#[async_trait]
impl ProfileService for StaticProfileService {
    async fn fetch_profile(&self) -> anyhow::Result<Profile> {
        Ok(self.profile.clone())
    }
}

/// Username and authority from an `acct:` user id.
pub fn parse_account_id(userid: &str) -> Option<(&str, &str)> {
    let account = userid.strip_prefix("acct:")?;
    let (username, authority) = account.split_once('@')?;
    if username.is_empty() || authority.is_empty() {
        return None;
    }
    Some((username, authority))
}

/// What the top bar shows for the current profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum AuthState {
    LoggedIn {
        #[serde(rename = "displayName")]
        display_name: String,
        userid: String,
        username: String,
    },
    LoggedOut,
}

impl AuthState {
    pub fn from_profile(profile: &Profile) -> Self {
        let Some(userid) = profile.userid.as_deref() else {
            return AuthState::LoggedOut;
        };
        let Some((username, _)) = parse_account_id(userid) else {
            return AuthState::LoggedOut;
        };
        let display_name = profile
            .user_info
            .as_ref()
            .and_then(|info| info.display_name.clone())
            .unwrap_or_else(|| username.to_string());
        AuthState::LoggedIn {
            display_name,
            userid: userid.to_string(),
            username: username.to_string(),
        }
    }
}

fn profile_of(state: &Value) -> anyhow::Result<Profile> {
    Ok(serde_json::from_value(state["profile"].clone())?)
}

/// The session module. `init_args[0].authority` is the default authority.
pub fn module(profiles: Arc<dyn ProfileService>) -> StoreModule {
    StoreModule::builder(NAMESPACE)
        .initial_state(InitialState::factory(|args| {
            let authority = args
                .first()
                .and_then(|settings| settings.get("authority"))
                .cloned()
                .unwrap_or(Value::Null);
            json!({
                "profile": Profile::default(),
                "hasFetchedProfile": false,
                "defaultAuthority": authority,
            })
        }))
        .reducer_with("UPDATE_PROFILE", |_, update: UpdateProfile| {
            Ok(json!({"profile": update.profile, "hasFetchedProfile": true}))
        })
        .action("updateProfile", |args| {
            let profile: Profile = args.get(0)?;
            Ok(Action::with_payload("UPDATE_PROFILE", UpdateProfile { profile })?)
        })
        .action("fetchProfile", move |_| {
            let profiles = profiles.clone();
            Ok(Thunk::new("fetchProfile", move |api| async move {
                let profile = match profiles.fetch_profile().await {
                    Ok(profile) => profile,
                    Err(e) => {
                        warn!(error = %e, "Failed to fetch profile");
                        return Err(e);
                    }
                };
                info!(userid = ?profile.userid, "Profile fetched");
                api.dispatch(Action::with_payload("UPDATE_PROFILE", UpdateProfile { profile })?)?;
                anyhow::Ok(())
            }))
        })
        .selector("profile", |state, _| Ok(state["profile"].clone()))
        .selector("hasFetchedProfile", |state, _| {
            Ok(state["hasFetchedProfile"].as_bool().unwrap_or(false))
        })
        .selector("isLoggedIn", |state, _| Ok(profile_of(state)?.userid.is_some()))
        .selector("authState", |state, _| Ok(AuthState::from_profile(&profile_of(state)?)))
        .selector("defaultAuthority", |state, _| Ok(state["defaultAuthority"].clone()))
        .build()
}

#[derive(Debug, Serialize, Deserialize)]
struct UpdateProfile {
    profile: Profile,
}
