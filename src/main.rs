use actix_web::{App, HttpServer};
use anyhow::Context;
use csrf_demo::{routes, Gate, GateConfig, ServerConfig, SqliteStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;

    let store = SqliteStore::connect(&config.database_url, config.max_connections)
        .await
        .with_context(|| format!("opening {}", config.database_url))?;
    store.migrate().await?;

    // Drawn once; every worker shares the same pair.
    let gate = Gate::from_entropy(GateConfig::default(), store)?;

    info!(bind = %config.bind, "Serving CSRF demo at http://{}/example/frontend-insecure", config.bind);

    HttpServer::new(move || App::new().configure(routes::configure(gate.clone())))
        .bind(config.bind)?
        .run()
        .await?;

    Ok(())
}
