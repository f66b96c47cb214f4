use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use annotator_sidebar::{create_sidebar_store, SidebarSettings, StaticProfileService};
use annotator_store::StoreConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("annotator=info".parse()?))
        .init();

    let config = StoreConfig::from_env();
    info!(strict = config.strict, log_actions = config.log_actions, "Sidebar demo starting...");

    let settings = SidebarSettings::default();
    let profiles = Arc::new(StaticProfileService::logged_in("jane", &settings.authority));
    let sidebar = create_sidebar_store(&settings, config, profiles)?;

    sidebar.fetch_profile()?.settled().await?;
    println!("Auth state: {:?}", sidebar.auth_state()?);

    sidebar.open_sidebar_panel("help")?;
    sidebar.add_annotations(&[
        json!({"id": "a1", "text": "Saved annotation"}),
        json!({"text": "Half-written reply"}),
    ])?;
    if let Some(unsaved) = sidebar.new_annotations()?.first() {
        sidebar.create_draft(unsaved, json!({"text": "Half-written reply"}))?;
    }

    println!("Annotations: {}", sidebar.annotation_count()?);
    println!("Drafts: {}", sidebar.count_drafts()?);
    println!("Open panel: {:?}", sidebar.active_panel_name()?);

    if let Some(prompt) = sidebar.logout_prompt()? {
        println!("\n{prompt}\n(discarding)");
    }
    sidebar.logout()?;

    println!("Annotations after logout: {}", sidebar.annotation_count()?);
    println!("Drafts after logout: {}", sidebar.count_drafts()?);
    println!("Logged in: {}", sidebar.is_logged_in()?);

    Ok(())
}
