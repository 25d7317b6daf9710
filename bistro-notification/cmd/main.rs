use std::env;

use anyhow::Context;
use bistro_core::SessionIdentity;
use bistro_core::tracing::init_tracing;
use bistro_notification::service::NotificationServiceApp;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = bistro_core::load_config(None);
    init_tracing("bistro-notification", Some(&app_config.logging));

    let user_id = env::var("BISTRO_USER_ID").context("BISTRO_USER_ID is required")?;
    let role = env::var("BISTRO_ROLE").unwrap_or_else(|_| "ADMIN".to_string());
    let mut identity = SessionIdentity::new(user_id, &role);
    if let Ok(token) = env::var("BISTRO_ACCESS_TOKEN") {
        identity = identity.with_token(token);
    }

    let app = NotificationServiceApp::new(&app_config, identity)?;
    info!(backend = %app_config.backend.base_url, "Starting bistro-notification sync");

    let snapshot = app.run().await?;
    println!("{}", serde_json::to_string_pretty(&snapshot.stats)?);

    app.shutdown().await;
    Ok(())
}
