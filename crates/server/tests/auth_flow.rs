use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use migration::MigratorTrait;
use serde_json::json;
use tower::Service;
use uuid::Uuid;

use server::routes::{self, auth};
use service::payments::gateway::GatewayClient;
use service::payments::repo::seaorm::SeaOrmRecordStore;
use service::payments::ReconciliationDispatcher;
use service::storage::{local::LocalObjectStore, ObjectStore};

fn cors() -> tower_http::cors::CorsLayer { tower_http::cors::CorsLayer::very_permissive() }

async fn build_app() -> anyhow::Result<Option<Router>> {
    if std::env::var("DATABASE_URL").is_err() {
        return Ok(None);
    }
    let db = models::db::connect().await?;
    migration::Migrator::up(&db, None).await?;

    let storage: Arc<dyn ObjectStore> =
        Arc::new(LocalObjectStore::new(std::env::temp_dir().join("school_api_test_uploads")));
    let state = auth::ServerState {
        db: db.clone(),
        auth: auth::ServerAuthConfig { jwt_secret: "test-secret".into(), token_ttl_hours: 12 },
        gateway: Arc::new(GatewayClient::new(configs::GatewayConfig::default())),
        dispatcher: Arc::new(ReconciliationDispatcher::new(Arc::new(SeaOrmRecordStore { db }))),
        storage,
        uploads: configs::UploadConfig::default(),
    };
    Ok(Some(routes::build_router(cors(), state)))
}

#[tokio::test]
async fn test_register_and_login_flow() -> anyhow::Result<()> {
    let Some(app) = build_app().await? else { return Ok(()) };

    let email = format!("user_{}@example.com", Uuid::new_v4());
    let name = "Tester";
    let password = "S3curePass!";

    // Register
    let req = Request::builder()
        .method("POST")
        .uri("/auth/register")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&json!({
            "first_name": name, "last_name": "Flow", "email": email, "password": password
        }))?))?;
    let resp = app.clone().call(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    // Login
    let req = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&json!({
            "email": email, "password": password
        }))?))?;
    let resp = app.clone().call(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    // Must set cookie
    let cookie = resp.headers().get("set-cookie");
    assert!(cookie.is_some());
    Ok(())
}

#[tokio::test]
async fn test_login_wrong_password() -> anyhow::Result<()> {
    let Some(app) = build_app().await? else { return Ok(()) };

    let email = format!("user_{}@example.com", Uuid::new_v4());

    let req = Request::builder().method("POST").uri("/auth/register").header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&json!({
            "first_name": "A", "last_name": "B", "email": email, "password": "StrongPass123"
        }))?))?;
    let _ = app.clone().call(req).await?;

    let req = Request::builder().method("POST").uri("/auth/login").header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&json!({
            "email": email, "password": "wrong-pass"
        }))?))?;
    let resp = app.clone().call(req).await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_register_short_password_rejected() -> anyhow::Result<()> {
    let Some(app) = build_app().await? else { return Ok(()) };

    let req = Request::builder().method("POST").uri("/auth/register").header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&json!({
            "first_name": "A", "last_name": "B", "email": "a@b.com", "password": "short"
        }))?))?;
    let resp = app.clone().call(req).await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_protected_route_requires_token() -> anyhow::Result<()> {
    let Some(app) = build_app().await? else { return Ok(()) };

    let req = Request::builder().method("GET").uri("/auth/me").body(Body::empty())?;
    let resp = app.clone().call(req).await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = Request::builder()
        .method("GET")
        .uri("/auth/me")
        .header("authorization", "Bearer not-a-token")
        .body(Body::empty())?;
    let resp = app.clone().call(req).await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}
