use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use http::{StatusCode, request::Parts};

use sitewise_passkey::PasskeyService;

use crate::bridge::{SessionBridge, SessionUser};
use crate::error::ErrorResponse;

/// Router state shared by all passkey handlers.
#[derive(Clone)]
pub struct PasskeyState {
    pub service: Arc<PasskeyService>,
    pub sessions: Arc<dyn SessionBridge>,
}

/// The signed-in user, resolved through the [`SessionBridge`].
///
/// As a required extractor it rejects guests with 401. As `Option<AuthUser>`
/// it never rejects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub SessionUser);

impl FromRequestParts<PasskeyState> for AuthUser {
    type Rejection = ErrorResponse;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &PasskeyState,
    ) -> Result<Self, Self::Rejection> {
        match state.sessions.current_user(&parts.headers).await {
            Some(user) => Ok(AuthUser(user)),
            None => {
                tracing::debug!("Unauthorized");
                Err(ErrorResponse::new(
                    StatusCode::UNAUTHORIZED,
                    "Authentication required",
                ))
            }
        }
    }
}

impl OptionalFromRequestParts<PasskeyState> for AuthUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &PasskeyState,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(state
            .sessions
            .current_user(&parts.headers)
            .await
            .map(AuthUser))
    }
}
