use anyhow::{Context, Result};
use project_dashboard::api::{self, AppState};
use project_dashboard::config::Config;
use project_dashboard::dashboard::Dashboard;
use project_dashboard::session::SessionSigner;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config = Config::from_env().context("Failed to read configuration")?;

    let mut dashboard =
        Dashboard::with_default_accounts(config.bcrypt_cost).context("Failed to create default accounts")?;
    if config.seed_demo {
        dashboard
            .seed_sample_projects()
            .context("Failed to seed sample projects")?;
    }

    if config.session_secret.is_none() {
        warn!("DASHBOARD_SESSION_SECRET not set; tokens will not survive a restart");
    }
    let signer = SessionSigner::new(config.secret_or_ephemeral(), config.session_ttl());

    let app = api::router(Arc::new(AppState::new(dashboard, signer)));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "project dashboard listening");
    info!("POST /login, GET /dashboard, POST /projects, PUT /projects/:id/members, POST /users ...");

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
