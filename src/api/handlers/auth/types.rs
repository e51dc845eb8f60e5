//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::store::User;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Public view of an account, returned by flows that disclose one.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email_verified: bool,
    pub is_active: bool,
    pub roles: Vec<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email_verified: user.email_verified,
            is_active: user.is_active,
            roles: user.role_names(),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterResponse {
    pub message: String,
    pub user: UserSummary,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Successful authentication: the signed token is returned in the body as
/// well as the cookie for clients that cannot rely on cookies.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    pub token: String,
    pub user: UserSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_new_user: Option<bool>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionInfoResponse {
    pub user_id: String,
    pub email: String,
    pub roles: Vec<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyEmailResponse {
    pub message: String,
    pub status_updated: bool,
}

/// Shared request shape for flows keyed by a bare email address.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct EmailRequest {
    pub email: String,
}

/// Accepted-shaped response used by enumeration-safe flows; identical whether
/// or not an account exists behind the address.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AcceptedResponse {
    pub message: String,
    pub cooldown_seconds: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SetPasswordRequest {
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct InviteRequest {
    pub email: String,
    pub role: String,
    pub permission_level: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct InviteResponse {
    pub message: String,
    pub user: UserSummary,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct InvitationStatusResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AcceptInvitationRequest {
    pub token: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct GoogleSignInRequest {
    pub access_token: String,
}

/// 409 payload when a Google sign-in collides with an existing password
/// account; carries what the client needs to drive the confirm/complete
/// sub-protocol.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LinkRequiredResponse {
    pub error: String,
    pub message: String,
    pub link_token: String,
    pub email: String,
    pub display_name: String,
    pub provider_account_id: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LinkConfirmRequest {
    pub token: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LinkConfirmResponse {
    pub message: String,
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LinkCompleteRequest {
    pub access_token: String,
}
