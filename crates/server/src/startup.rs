use std::{env, net::SocketAddr, sync::Arc};

use axum::Router;
use common::utils::logging::init_logging_default;
use dotenvy::dotenv;
use migration::MigratorTrait;
use tower_http::cors::CorsLayer;
use tracing::info;

use service::payments::gateway::GatewayClient;
use service::payments::repo::seaorm::SeaOrmRecordStore;
use service::payments::ReconciliationDispatcher;
use service::storage::{local::LocalObjectStore, ObjectStore};

use crate::routes::{self, auth};

/// Initialize logging via shared common utils
fn init_logging() {
    init_logging_default();
}

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// Load config, tolerating a missing config.toml (env vars fill the gaps)
fn load_config() -> configs::AppConfig {
    match configs::AppConfig::load_and_validate() {
        Ok(cfg) => cfg,
        Err(_) => {
            let mut cfg = configs::AppConfig::default();
            cfg.database.normalize_from_env();
            cfg.auth.normalize_from_env();
            cfg.gateway.normalize_from_env();
            cfg
        }
    }
}

/// Load host/port from configs or env vars, with sensible fallbacks
fn load_bind_addr(cfg: &configs::AppConfig) -> anyhow::Result<SocketAddr> {
    let host = env::var("SERVER_HOST").unwrap_or_else(|_| cfg.server.host.clone());
    let port = env::var("SERVER_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(cfg.server.port);
    Ok(format!("{}:{}", host, port).parse()?)
}

/// Public entry: build the app and run the HTTP server
pub async fn run() -> anyhow::Result<()> {
    dotenv().ok();
    init_logging();

    let cfg = load_config();
    common::env::ensure_env(&cfg.uploads.dir).await?;

    // DB connection + schema
    let db = models::db::connect().await?;
    migration::Migrator::up(&db, None).await?;

    // JWT secret
    let jwt_secret = if cfg.auth.jwt_secret.trim().is_empty() {
        env::var("JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".to_string())
    } else {
        cfg.auth.jwt_secret.clone()
    };

    let gateway = Arc::new(GatewayClient::new(cfg.gateway.clone()));
    let dispatcher = Arc::new(ReconciliationDispatcher::new(Arc::new(SeaOrmRecordStore {
        db: db.clone(),
    })));
    let storage: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(&cfg.uploads.dir));

    let state = auth::ServerState {
        db,
        auth: auth::ServerAuthConfig { jwt_secret, token_ttl_hours: cfg.auth.token_ttl_hours },
        gateway,
        dispatcher,
        storage,
        uploads: cfg.uploads.clone(),
    };

    // Build router
    let app: Router = routes::build_router(build_cors(), state);

    // Bind and serve
    let addr = load_bind_addr(&cfg)?;
    info!(%addr, "starting server crate");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
