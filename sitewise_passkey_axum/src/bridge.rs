use async_trait::async_trait;
use http::HeaderMap;
use serde_json::Value;

/// The signed-in user as the host application knows them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub id: String,
    /// Account name shown by the authenticator, usually the email
    pub name: String,
    pub display_name: String,
}

/// What the host application hands back after a successful passkey sign-in.
#[derive(Debug, Clone, Default)]
pub struct SessionGrant {
    /// Added to the response, e.g. `Set-Cookie`
    pub headers: HeaderMap,
    /// Returned to the client under `"session"`, e.g. a token and user record
    pub body: Value,
}

/// Connects the passkey routes to the application's users and sessions.
///
/// The passkey crate never creates users or sessions itself.
#[async_trait]
pub trait SessionBridge: Send + Sync + 'static {
    /// The user behind the request, or `None` for guests.
    async fn current_user(&self, headers: &HeaderMap) -> Option<SessionUser>;

    /// Resolves an email entered on the sign-in form.
    async fn user_id_by_email(&self, email: &str) -> Option<String>;

    /// Creates a session for a user who just proved possession of a passkey.
    async fn issue_session(&self, user_id: &str) -> Result<SessionGrant, String>;
}
