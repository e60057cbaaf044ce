//! mongo_admin server
//!
//! Serves the admin REST API (login/session + user/role management).
//!
//! Usage:
//!   BIND_ADDR=0.0.0.0:3000 cargo run --bin mongo_admin
//!   # Then log in with the CLI or curl (see mongo-admin-cli --help)

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use mongo_admin::config::Settings;
use mongo_admin::connection::MongoConnector;
use mongo_admin::rest::create_router;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    // JSON lines for log shippers, human-readable otherwise
    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    init_tracing();

    tracing::info!("🚀 mongo_admin starting...");
    tracing::info!(
        bind = %settings.bind_addr,
        roles_db = %settings.roles_database,
        secure_cookies = settings.secure_cookies(),
        "🌐 REST (Axum) configured"
    );

    let listener = TcpListener::bind(settings.bind_addr).await?;
    let app = create_router(Arc::new(MongoConnector), settings);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down...");
        })
        .await?;

    Ok(())
}
