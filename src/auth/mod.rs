//! Session authentication and role authorization.
//!
//! One capability core ([`Authorizer`]: token verification plus role
//! membership) backs two guards:
//!
//! * the edge guard ([`edge`]), which gates page navigation by the `token`
//!   cookie and answers with redirects;
//! * the API guard ([`authenticate`] + [`check_role`]), which resolves the
//!   caller from a bearer token and answers with JSON errors.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use uuid::Uuid;

use crate::{
    error::{ApiError, AuthFailure},
    repository::{Repository, RepositoryState},
};

pub mod credentials;
pub mod edge;
pub mod password;
pub mod policy;
pub mod role;
pub mod token;

pub use role::{Role, normalize_role, role_permitted};
pub use token::{Claims, TokenCodec, TokenError};

/// Authorizer
///
/// The capability check shared by both guards.
#[derive(Clone)]
pub struct Authorizer {
    tokens: TokenCodec,
}

impl Authorizer {
    pub fn new(tokens: TokenCodec) -> Self {
        Self { tokens }
    }

    pub fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }

    /// Verifies a raw token. Every decode failure becomes `INVALID_TOKEN`.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        self.tokens.verify(token).map_err(|e| {
            tracing::debug!(error = %e, "session token rejected");
            ApiError::Unauthorized(AuthFailure::InvalidToken)
        })
    }

    /// Role membership. `None` means the resource admits any role.
    pub fn permits<R: AsRef<str>>(&self, role: &str, allowed: Option<&[R]>) -> bool {
        match allowed {
            None => true,
            Some(allowed) => role_permitted(role, allowed),
        }
    }
}

/// AuthUser
///
/// The caller resolved from a verified bearer token. Rebuilt from the
/// repository on every request and never cached.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    /// Role as stored; compare only through [`check_role`] or [`role_permitted`].
    pub role: String,
    pub business_name: Option<String>,
    pub business_description: Option<String>,
}

impl AuthUser {
    pub fn has_role(&self, role: Role) -> bool {
        role_permitted(&self.role, &[role])
    }
}

/// authenticate
///
/// Resolves the caller behind an `Authorization: Bearer <token>` header.
///
/// * no header, another scheme, or an empty token: `NO_TOKEN`
/// * bad signature, expired, malformed: `INVALID_TOKEN`
/// * subject missing from the repository: `USER_NOT_FOUND`
/// * repository failure: `Internal`
pub async fn authenticate(
    headers: &HeaderMap,
    repo: &dyn Repository,
    authorizer: &Authorizer,
) -> Result<AuthUser, ApiError> {
    let token = credentials::token_from_bearer(headers)
        .ok_or(ApiError::Unauthorized(AuthFailure::NoToken))?;

    let claims = authorizer.verify(token)?;

    let user = repo
        .get_user(claims.sub)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = %claims.sub, "caller lookup failed");
            ApiError::Internal
        })?
        .ok_or_else(|| {
            tracing::debug!(user_id = %claims.sub, "token subject no longer exists");
            ApiError::Unauthorized(AuthFailure::UserNotFound)
        })?;

    Ok(AuthUser {
        id: user.id,
        email: user.email,
        name: user.name,
        role: user.role,
        business_name: user.business_name,
        business_description: user.business_description,
    })
}

/// check_role
///
/// Pure role gate. Both the caller's role and every allowed role are
/// normalized before the membership test.
pub fn check_role<R: AsRef<str>>(caller: Option<&AuthUser>, allowed: &[R]) -> Result<(), ApiError> {
    let caller = caller.ok_or(ApiError::Unauthorized(AuthFailure::NoCaller))?;

    if role_permitted(&caller.role, allowed) {
        Ok(())
    } else {
        tracing::debug!(user_id = %caller.id, role = %caller.role, "role not permitted");
        Err(ApiError::Forbidden)
    }
}

/// ensure_owner
///
/// Record-level check run by handlers after `check_role` and before any
/// mutation.
pub fn ensure_owner(caller: &AuthUser, owner_id: Uuid) -> Result<(), ApiError> {
    if caller.id == owner_id {
        Ok(())
    } else {
        tracing::warn!(user_id = %caller.id, owner_id = %owner_id, "ownership check failed");
        Err(ApiError::NotOwner)
    }
}

/// Lets handlers take `AuthUser` as an argument; runs [`authenticate`].
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    Authorizer: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let authorizer = Authorizer::from_ref(state);

        authenticate(&parts.headers, repo.as_ref(), &authorizer).await
    }
}
