use std::sync::Arc;

use async_trait::async_trait;
use axum::{Router, routing::get};
use http::{HeaderMap, HeaderValue, header::SET_COOKIE};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sitewise_passkey::{PasskeyConfig, PasskeyService, StorageConfig, spawn_challenge_sweeper};
use sitewise_passkey_axum::{SessionBridge, SessionGrant, SessionUser, passkey_router};

const DEV_USER_HEADER: &str = "x-dev-user";
const DEV_COOKIE: &str = "dev_user";

/// Development-only bridge: the user is whoever the `x-dev-user` header or the
/// `dev_user` cookie names. Never deploy this.
struct DevSessionBridge;

fn dev_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == DEV_COOKIE)
        .map(|(_, value)| value.to_string())
}

#[async_trait]
impl SessionBridge for DevSessionBridge {
    async fn current_user(&self, headers: &HeaderMap) -> Option<SessionUser> {
        let email = headers
            .get(DEV_USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| dev_cookie(headers))
            .filter(|v| !v.trim().is_empty())?;

        Some(SessionUser {
            id: email.to_lowercase(),
            name: email.clone(),
            display_name: email,
        })
    }

    async fn user_id_by_email(&self, email: &str) -> Option<String> {
        Some(email.to_lowercase())
    }

    async fn issue_session(&self, user_id: &str) -> Result<SessionGrant, String> {
        let mut headers = HeaderMap::new();
        let cookie = HeaderValue::from_str(&format!(
            "{DEV_COOKIE}={user_id}; Path=/; HttpOnly; SameSite=Lax"
        ))
        .map_err(|e| e.to_string())?;
        headers.insert(SET_COOKIE, cookie);

        Ok(SessionGrant {
            headers,
            body: json!({"userId": user_id}),
        })
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "sitewise_passkey=debug,sitewise_passkey_axum=debug,{}=debug,info",
                    env!("CARGO_CRATE_NAME")
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = PasskeyConfig::from_env()?;
    let storage = StorageConfig::from_env()?;
    let service = Arc::new(PasskeyService::init(config, &storage).await?);
    let _sweeper = spawn_challenge_sweeper(service.clone());

    let app = Router::new()
        .route("/", get(|| async { "sitewise passkey demo" }))
        .nest(
            "/api/passkey",
            passkey_router(service, Arc::new(DevSessionBridge)),
        );

    let addr = std::env::var("DEMO_LISTEN_ADDR").unwrap_or_else(|_| "127.0.0.1:3001".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Starting server on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
