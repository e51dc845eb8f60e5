//! Google sign-in and account-link endpoints.
//!
//! Sign-in delegates to the identity linker; a collision with an existing
//! password account surfaces as HTTP 409 carrying the link token and the
//! provider-supplied profile fields, and the client then drives the
//! confirm/complete sub-protocol.

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use std::sync::Arc;

use super::linker::{ProviderSignIn, complete_link, confirm_link, sign_in_with_provider};
use super::session::issue_session;
use super::state::AuthState;
use super::types::{
    GoogleSignInRequest, LinkCompleteRequest, LinkConfirmRequest, LinkConfirmResponse,
    LinkRequiredResponse,
};

#[utoipa::path(
    post,
    path = "/v1/auth/google",
    request_body = GoogleSignInRequest,
    responses(
        (status = 200, description = "Authenticated; session cookie set", body = super::types::SessionResponse),
        (status = 401, description = "Provider rejected the access token", body = super::error::ErrorResponse),
        (status = 409, description = "Email belongs to a password account; linking required", body = LinkRequiredResponse)
    ),
    tag = "auth"
)]
pub async fn google_sign_in(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<GoogleSignInRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match sign_in_with_provider(&state, request.access_token.trim()).await {
        Ok(ProviderSignIn::Session { user, is_new_user }) => {
            match issue_session(&state, &user, Some(is_new_user)).await {
                Ok(response) => response,
                Err(err) => err.into_response(),
            }
        }
        Ok(ProviderSignIn::LinkRequired(challenge)) => (
            StatusCode::CONFLICT,
            Json(LinkRequiredResponse {
                error: "link_required".to_string(),
                message: "An account with this email already exists; confirm your password to link it"
                    .to_string(),
                link_token: challenge.token,
                email: challenge.email,
                display_name: challenge.display_name,
                provider_account_id: challenge.provider_account_id,
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/google/link/confirm",
    request_body = LinkConfirmRequest,
    responses(
        (status = 200, description = "Password confirmed; redo the OAuth handshake and complete", body = LinkConfirmResponse),
        (status = 401, description = "Invalid token or password", body = super::error::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn google_link_confirm(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<LinkConfirmRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match confirm_link(&state, request.token.trim(), &request.password).await {
        Ok(email) => (
            StatusCode::OK,
            Json(LinkConfirmResponse {
                message: "Password confirmed; sign in with Google again to finish linking"
                    .to_string(),
                email,
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/google/link/complete",
    request_body = LinkCompleteRequest,
    responses(
        (status = 200, description = "Accounts linked; session cookie set", body = super::types::SessionResponse),
        (status = 409, description = "Already linked or provider identity taken", body = super::error::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn google_link_complete(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<LinkCompleteRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match complete_link(&state, request.access_token.trim()).await {
        Ok(user) => match issue_session(&state, &user, None).await {
            Ok(response) => response,
            Err(err) => err.into_response(),
        },
        Err(err) => err.into_response(),
    }
}
