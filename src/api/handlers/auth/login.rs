//! Password login endpoint.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::warn;

use super::error::AuthError;
use super::session::issue_session;
use super::state::AuthState;
use super::store::User;
use super::types::LoginRequest;
use super::utils::{extract_client_ip, normalize_email};

/// Ordered credential checks for a password login.
///
/// Lookup failure and password mismatch collapse into the same
/// `InvalidCredentials`; the verified-vs-not distinction is deliberately
/// disclosed because it is actionable for the user.
pub(super) async fn login_flow(state: &AuthState, request: LoginRequest) -> Result<User, AuthError> {
    let email = normalize_email(&request.email);

    let user = state
        .users()
        .find_by_email(&email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if !user.is_active {
        return Err(AuthError::AccountDeactivated);
    }
    let Some(digest) = user.password_hash.as_deref() else {
        return Err(AuthError::NoLocalCredentials);
    };
    if !state.hasher().verify(&request.password, digest) {
        return Err(AuthError::InvalidCredentials);
    }
    if !user.email_verified {
        return Err(AuthError::EmailNotVerified);
    }

    Ok(user)
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated; session cookie set", body = super::types::SessionResponse),
        (status = 401, description = "Invalid email or password", body = super::error::ErrorResponse),
        (status = 403, description = "Deactivated account or unverified email", body = super::error::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match login_flow(&state, request).await {
        Ok(user) => match issue_session(&state, &user, None).await {
            Ok(response) => response,
            Err(err) => err.into_response(),
        },
        Err(err) => {
            // Failed attempts are logged with the client IP for abuse review.
            warn!(
                client_ip = extract_client_ip(&headers).as_deref().unwrap_or("unknown"),
                "login failed: {}",
                err.kind()
            );
            err.into_response()
        }
    }
}
