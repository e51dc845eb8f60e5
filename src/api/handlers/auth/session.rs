//! Session issuance and the cookie/bearer read side.
//!
//! Successful flows issue a signed token with the user id, email, and role
//! names as claims. The token travels both as an `HttpOnly` cookie and in the
//! response body; verification accepts either the cookie or a bearer header.

use anyhow::{Context, Result, anyhow};
use axum::{
    Json,
    extract::Extension,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{AUTHORIZATION, SET_COOKIE},
    },
    response::{IntoResponse, Response},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::AuthError;
use super::state::{AuthConfig, AuthState};
use super::store::User;
use super::types::{SessionInfoResponse, SessionResponse, UserSummary};
use super::utils::now_unix_seconds;

pub(crate) const SESSION_COOKIE_NAME: &str = "talentgate_session";

/// Claims carried by the signed session token.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub email: String,
    pub roles: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies session tokens with a shared secret.
pub struct SessionSigner {
    secret: SecretString,
}

impl SessionSigner {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Sign session claims for a user.
    ///
    /// # Errors
    /// Returns an error if encoding fails.
    pub fn sign(&self, user: &User, ttl_seconds: i64) -> Result<String> {
        let now = now_unix_seconds();
        let claims = SessionClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            roles: user.role_names(),
            iat: now,
            exp: now.saturating_add(ttl_seconds),
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.expose_secret().as_bytes()),
        )
        .context("failed to sign session token")
    }

    /// Verify a session token; expired or tampered tokens return `None`.
    #[must_use]
    pub fn verify(&self, token: &str) -> Option<SessionClaims> {
        jsonwebtoken::decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(self.secret.expose_secret().as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .ok()
    }
}

/// Build the `Set-Cookie` value for a session token.
///
/// `SameSite=None` (and therefore `Secure`) only when the frontend is served
/// from another origin; same-origin deployments keep `Lax`.
pub(super) fn session_cookie(config: &AuthConfig, token: &str) -> Result<HeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let same_site = if config.cookie_cross_site() {
        "None"
    } else {
        "Lax"
    };
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite={same_site}; Max-Age={ttl_seconds}"
    );
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|err| anyhow!("invalid session cookie value: {err}"))
}

fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue> {
    let same_site = if config.cookie_cross_site() {
        "None"
    } else {
        "Lax"
    };
    let mut cookie =
        format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite={same_site}; Max-Age=0");
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|err| anyhow!("invalid session cookie value: {err}"))
}

/// Sign a session for the user, record the login, and build the response.
pub(super) async fn issue_session(
    state: &AuthState,
    user: &User,
    is_new_user: Option<bool>,
) -> Result<Response, AuthError> {
    let token = state
        .signer()
        .sign(user, state.config().session_ttl_seconds())?;
    state.users().record_login(user.id).await?;

    let cookie = session_cookie(state.config(), &token)?;
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);

    let body = SessionResponse {
        token,
        user: UserSummary::from(user),
        is_new_user,
    };
    Ok((StatusCode::OK, headers, Json(body)).into_response())
}

/// Pull the session token from a bearer header or the session cookie.
pub(super) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Session is active", body = SessionInfoResponse),
        (status = 204, description = "No active session")
    ),
    tag = "auth"
)]
pub async fn session(headers: HeaderMap, state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    // Missing cookies are treated as "no session" to avoid leaking auth state.
    let Some(token) = extract_session_token(&headers) else {
        return StatusCode::NO_CONTENT.into_response();
    };
    match state.signer().verify(&token) {
        Some(claims) => {
            let response = SessionInfoResponse {
                user_id: claims.sub,
                email: claims.email,
                roles: claims.roles,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn logout(state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    // Tokens are stateless, so logout is just clearing the cookie.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

#[cfg(test)]
mod tests {
    use super::super::store::{Role, RoleAssignment};
    use super::*;
    use uuid::Uuid;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
            first_name: Some("Alice".to_string()),
            last_name: Some("Doe".to_string()),
            password_hash: Some("digest".to_string()),
            email_verified: true,
            is_active: true,
            roles: vec![RoleAssignment {
                role: Role::User,
                permission_level: None,
            }],
        }
    }

    #[test]
    fn sign_and_verify_round_trip() -> Result<()> {
        let signer = SessionSigner::new(SecretString::from("secret".to_string()));
        let user = sample_user();
        let token = signer.sign(&user, 3600)?;
        let claims = signer.verify(&token).context("expected valid claims")?;
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.roles, vec!["user".to_string()]);
        Ok(())
    }

    #[test]
    fn verify_rejects_wrong_secret() -> Result<()> {
        let signer = SessionSigner::new(SecretString::from("secret".to_string()));
        let other = SessionSigner::new(SecretString::from("other".to_string()));
        let token = signer.sign(&sample_user(), 3600)?;
        assert!(other.verify(&token).is_none());
        Ok(())
    }

    #[test]
    fn same_origin_cookie_is_lax() -> Result<()> {
        let config = AuthConfig::new("http://localhost:3000".to_string());
        let cookie = session_cookie(&config, "token")?;
        let value = cookie.to_str()?;
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("Path=/"));
        assert!(!value.contains("Secure"));
        Ok(())
    }

    #[test]
    fn cross_site_cookie_is_none_and_secure() -> Result<()> {
        let config =
            AuthConfig::new("http://localhost:3000".to_string()).with_cookie_cross_site(true);
        let cookie = session_cookie(&config, "token")?;
        let value = cookie.to_str()?;
        assert!(value.contains("SameSite=None"));
        assert!(value.contains("Secure"));
        Ok(())
    }

    #[test]
    fn production_cookie_is_secure() -> Result<()> {
        let config = AuthConfig::new("https://talentgate.dev".to_string());
        let cookie = session_cookie(&config, "token")?;
        assert!(cookie.to_str()?.contains("Secure"));
        Ok(())
    }

    #[test]
    fn extract_token_prefers_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("talentgate_session=def"),
        );
        assert_eq!(extract_session_token(&headers), Some("abc".to_string()));
    }

    #[test]
    fn extract_token_reads_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("other=1; talentgate_session=def"),
        );
        assert_eq!(extract_session_token(&headers), Some("def".to_string()));
    }

    #[test]
    fn extract_token_none_when_missing() {
        assert_eq!(extract_session_token(&HeaderMap::new()), None);
    }
}
