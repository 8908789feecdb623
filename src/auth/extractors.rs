use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use tracing::warn;

use crate::{auth::jwt::JwtKeys, error::ApiError, state::AppState, users::repo::User};

pub const ADMIN_ROLE: &str = "admin";

/// An authenticated caller: the stored user plus the role carried by the
/// token. The role is the issuance-time snapshot, not re-read from the store.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user: User,
    pub role: String,
}

impl Identity {
    /// Roles are free-form strings compared case-sensitively.
    pub fn require_role(&self, role: &str) -> Result<(), ApiError> {
        if self.role == role {
            Ok(())
        } else {
            warn!(user_id = %self.user.user_id, have = %self.role, want = %role, "role check failed");
            Err(ApiError::Forbidden)
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .ok_or(ApiError::Unauthorized)
}

/// Extractor that resolves the bearer token to an [`Identity`]. Every failure
/// (missing header, bad signature, expired token, deleted subject) is the
/// same outward 401; the distinction only reaches the logs.
#[derive(Debug)]
pub struct AuthUser(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|e| {
            warn!(error = %e, "token rejected");
            ApiError::Unauthorized
        })?;

        // The subject may have been deleted after the token was issued.
        let user = User::find_by_email(&state.db, &claims.sub)
            .await
            .map_err(ApiError::Store)?
            .ok_or_else(|| {
                warn!(subject = %claims.sub, "token subject no longer exists");
                ApiError::Unauthorized
            })?;

        Ok(AuthUser(Identity {
            user,
            role: claims.role,
        }))
    }
}

/// Extractor for admin-only routes: authenticates, then fails closed unless
/// the token role is exactly "admin".
#[derive(Debug)]
pub struct AdminUser(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(identity) = AuthUser::from_request_parts(parts, state).await?;
        identity.require_role(ADMIN_ROLE)?;
        Ok(AdminUser(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn headers_with(auth: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = auth {
            headers.insert(header::AUTHORIZATION, value.parse().unwrap());
        }
        headers
    }

    fn identity(role: &str) -> Identity {
        let now = OffsetDateTime::now_utc();
        Identity {
            user: User {
                user_id: Uuid::new_v4(),
                username: "a@x.com".into(),
                email: "a@x.com".into(),
                phone: None,
                address: None,
                created_at: now,
                updated_at: now,
            },
            role: role.into(),
        }
    }

    #[test]
    fn bearer_token_parses_scheme() {
        let headers = headers_with(Some("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn bearer_token_rejects_missing_header() {
        let headers = headers_with(None);
        let err = bearer_token(&headers).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn bearer_token_rejects_other_schemes() {
        let headers = headers_with(Some("Basic dXNlcjpwdw=="));
        let err = bearer_token(&headers).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn require_role_accepts_exact_match() {
        assert!(identity("admin").require_role(ADMIN_ROLE).is_ok());
    }

    #[test]
    fn require_role_is_case_sensitive_and_fails_closed() {
        let err = identity("Admin").require_role(ADMIN_ROLE).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        let err = identity("user").require_role(ADMIN_ROLE).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }
}
