use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use forum::config::{Cli, Config};
use forum::db::models::Role;
use forum::db::users;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;
    tracing::info!("Database: {}", config.db_path().display());

    let state = forum::app_state(config.clone())?;

    // One-shot admin promotion
    if let Some(email) = cli.make_admin.as_deref() {
        let conn = state.db.get()?;
        users::set_role(&conn, email, Role::Admin)?;
        tracing::info!("Granted admin role to {}", email);
        return Ok(());
    }

    let app = forum::routes::router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
