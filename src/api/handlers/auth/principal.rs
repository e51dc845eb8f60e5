//! Authenticated principal extraction and the capability check seam.
//!
//! Flows take the principal as an explicit argument derived from the request
//! headers; nothing reads ambient request state. Authorization is a single
//! yes/no capability check so role layout stays out of the flow logic.

use axum::http::HeaderMap;

use super::error::AuthError;
use super::session::extract_session_token;
use super::state::AuthState;
use super::store::Role;

/// Authenticated user context derived from the session token.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: uuid::Uuid,
    pub email: String,
    pub roles: Vec<Role>,
}

/// Resolve the session token into a principal, or fail with `Unauthorized`.
///
/// # Errors
/// Returns `AuthError::Unauthorized` when the token is missing or invalid.
pub fn require_auth(headers: &HeaderMap, state: &AuthState) -> Result<Principal, AuthError> {
    let token = extract_session_token(headers).ok_or(AuthError::Unauthorized)?;
    let claims = state
        .signer()
        .verify(&token)
        .ok_or(AuthError::Unauthorized)?;
    let user_id = uuid::Uuid::parse_str(&claims.sub).map_err(|_| AuthError::Unauthorized)?;
    Ok(Principal {
        user_id,
        email: claims.email,
        roles: claims.roles.iter().filter_map(|r| Role::parse(r)).collect(),
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    ManageInvitations,
}

pub trait Authorizer: Send + Sync {
    fn can(&self, principal: &Principal, capability: Capability) -> bool;
}

/// Default authorizer: capabilities map directly onto role variants.
#[derive(Clone, Copy, Debug, Default)]
pub struct RoleAuthorizer;

impl Authorizer for RoleAuthorizer {
    fn can(&self, principal: &Principal, capability: Capability) -> bool {
        match capability {
            Capability::ManageInvitations => principal.roles.contains(&Role::Admin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn principal_with(roles: Vec<Role>) -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            email: "admin@example.com".to_string(),
            roles,
        }
    }

    #[test]
    fn admin_can_manage_invitations() {
        let authorizer = RoleAuthorizer;
        assert!(authorizer.can(
            &principal_with(vec![Role::Admin]),
            Capability::ManageInvitations
        ));
    }

    #[test]
    fn staff_and_user_cannot_manage_invitations() {
        let authorizer = RoleAuthorizer;
        assert!(!authorizer.can(
            &principal_with(vec![Role::Staff]),
            Capability::ManageInvitations
        ));
        assert!(!authorizer.can(
            &principal_with(vec![Role::User]),
            Capability::ManageInvitations
        ));
    }
}
