use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    routing::{get, patch, post},
};
use http::{HeaderMap, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use sitewise_passkey::{
    AuthenticationFinishRequest, ClientCeremonyFailure, PasskeyError, PasskeyService,
    RegistrationFinishRequest, RegistrationUser, report_client_failure,
};

use crate::bridge::SessionBridge;
use crate::client_ip::client_ip;
use crate::error::{ErrorResponse, IntoResponseError};
use crate::session::{AuthUser, PasskeyState};

/// Routes for both ceremonies, credential management and client failure reports.
///
/// Mount it under the application's passkey prefix, e.g. `/api/passkey`:
/// - `POST /register/start`, `POST /register/finish` (signed in)
/// - `POST /authenticate/start`, `POST /authenticate/finish` (guests only)
/// - `GET /list`, `PATCH /{credential_id}`, `DELETE /{credential_id}` (signed in)
/// - `POST /client-error`
pub fn passkey_router(service: Arc<PasskeyService>, sessions: Arc<dyn SessionBridge>) -> Router {
    Router::new()
        .route("/register/start", post(start_registration))
        .route("/register/finish", post(finish_registration))
        .route("/authenticate/start", post(start_authentication))
        .route("/authenticate/finish", post(finish_authentication))
        .route("/list", get(list_passkeys))
        .route(
            "/{credential_id}",
            patch(rename_passkey).delete(delete_passkey),
        )
        .route("/client-error", post(client_error))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(PasskeyState { service, sessions })
}

fn guest_only(user: Option<AuthUser>) -> Result<(), ErrorResponse> {
    match user {
        Some(_) => Err(ErrorResponse::new(
            StatusCode::BAD_REQUEST,
            "Already signed in",
        )),
        None => Ok(()),
    }
}

async fn start_registration(
    State(state): State<PasskeyState>,
    AuthUser(user): AuthUser,
    headers: HeaderMap,
) -> Result<Json<Value>, ErrorResponse> {
    let ip = client_ip(&headers);
    let registration_user = RegistrationUser {
        id: user.id,
        name: user.name,
        display_name: user.display_name,
    };

    let options = state
        .service
        .start_registration(&registration_user, ip.as_deref())
        .await
        .into_response_error()?;

    Ok(Json(json!({"success": true, "options": options})))
}

async fn finish_registration(
    State(state): State<PasskeyState>,
    AuthUser(user): AuthUser,
    headers: HeaderMap,
    Json(request): Json<RegistrationFinishRequest>,
) -> Result<Json<Value>, ErrorResponse> {
    let ip = client_ip(&headers);
    let credential = state
        .service
        .finish_registration(&user.id, request, ip.as_deref())
        .await
        .into_response_error()?;

    Ok(Json(json!({
        "success": true,
        "credential": {
            "id": credential.credential_id,
            "deviceName": credential.device_name,
            "createdAt": credential.created_at,
        }
    })))
}

#[derive(Deserialize, Debug, Default)]
struct AuthenticationStartRequest {
    #[serde(default)]
    email: Option<String>,
}

async fn start_authentication(
    State(state): State<PasskeyState>,
    user: Option<AuthUser>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ErrorResponse> {
    guest_only(user)?;
    let ip = client_ip(&headers);

    // An empty body starts a discoverable-credential ceremony.
    let request: AuthenticationStartRequest = if body.iter().all(u8::is_ascii_whitespace) {
        AuthenticationStartRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| PasskeyError::InvalidRequest(format!("Invalid body: {e}")))
            .into_response_error()?
    };

    // Unknown emails fall back to the discoverable flow so the response does
    // not reveal whether an account exists.
    let user_id = match request.email.as_deref().map(str::trim) {
        Some(email) if !email.is_empty() => state.sessions.user_id_by_email(email).await,
        _ => None,
    };

    let options = state
        .service
        .start_authentication(user_id.as_deref(), ip.as_deref())
        .await
        .into_response_error()?;

    Ok(Json(json!({"success": true, "options": options})))
}

async fn finish_authentication(
    State(state): State<PasskeyState>,
    user: Option<AuthUser>,
    headers: HeaderMap,
    Json(request): Json<AuthenticationFinishRequest>,
) -> Result<(HeaderMap, Json<Value>), ErrorResponse> {
    guest_only(user)?;
    let ip = client_ip(&headers);

    let outcome = state
        .service
        .finish_authentication(request, ip.as_deref())
        .await
        .into_response_error()?;

    let grant = state
        .sessions
        .issue_session(&outcome.user_id)
        .await
        .map_err(|e| {
            tracing::error!(user_id = %outcome.user_id, "Failed to issue session: {}", e);
            ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        })?;

    Ok((
        grant.headers,
        Json(json!({"success": true, "session": grant.body})),
    ))
}

async fn list_passkeys(
    State(state): State<PasskeyState>,
    AuthUser(user): AuthUser,
) -> Json<Value> {
    let passkeys = state.service.list_credentials(&user.id).await;
    Json(json!({"success": true, "passkeys": passkeys}))
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RenameRequest {
    device_name: String,
}

async fn rename_passkey(
    State(state): State<PasskeyState>,
    AuthUser(user): AuthUser,
    Path(credential_id): Path<String>,
    Json(request): Json<RenameRequest>,
) -> Result<Json<Value>, ErrorResponse> {
    let passkey = state
        .service
        .rename_credential(&user.id, &credential_id, &request.device_name)
        .await
        .into_response_error()?;

    Ok(Json(json!({"success": true, "passkey": passkey})))
}

async fn delete_passkey(
    State(state): State<PasskeyState>,
    AuthUser(user): AuthUser,
    Path(credential_id): Path<String>,
) -> Result<Json<Value>, ErrorResponse> {
    state
        .service
        .delete_credential(&user.id, &credential_id)
        .await
        .into_response_error()?;

    Ok(Json(json!({
        "success": true,
        "message": "Passkey deleted successfully"
    })))
}

async fn client_error(headers: HeaderMap, Json(failure): Json<ClientCeremonyFailure>) -> StatusCode {
    report_client_failure(&failure, client_ip(&headers).as_deref());
    StatusCode::NO_CONTENT
}
