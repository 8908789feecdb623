use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        extractors::AdminUser,
        jwt::JwtKeys,
        password::{hash_password, verify_password},
    },
    error::ApiError,
    state::AppState,
    users::{
        dto::{LoginRequest, RegisterRequest, TokenResponse, UserListResponse, UserResponse},
        repo::{User, UserCredentials},
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/users", get(list_users))
        .route("/users/:user_id", delete(delete_user))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::Validation("Password too short".into()));
    }
    if payload.role.trim().is_empty() {
        warn!("missing role");
        return Err(ApiError::Validation("Role is required".into()));
    }

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict);
    }

    // Argon2 is deliberately slow; keep it off the async workers.
    let password = payload.password.clone();
    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!(e)))??;

    let user = User::create_with_credentials(
        &state.db,
        &payload.email,
        payload.phone.as_deref(),
        payload.address.as_deref(),
        &hash,
        payload.role.trim(),
    )
    .await
    .map_err(|e| {
        // Two concurrent registrations can pass the pre-check; the unique
        // index settles the race.
        if is_unique_violation(&e) {
            warn!(email = %payload.email, "email already registered (insert race)");
            ApiError::Conflict
        } else {
            error!(error = %e, "create user failed");
            ApiError::Store(e)
        }
    })?;

    info!(user_id = %user.user_id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }

    // Unknown email, wrong password and mismatched role all collapse into
    // the same 401 so nothing can be learned from which check failed.
    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| {
            warn!(email = %payload.email, "login unknown email");
            ApiError::Unauthorized
        })?;

    let creds = UserCredentials::for_user(&state.db, user.user_id)
        .await?
        .ok_or_else(|| {
            warn!(user_id = %user.user_id, "user has no credentials");
            ApiError::Unauthorized
        })?;

    let password = payload.password.clone();
    let stored_hash = creds.password_hash.clone();
    let ok = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!(e)))?
        .unwrap_or_else(|e| {
            // A stored hash that fails to parse is a server-side data
            // problem; surface the uniform 401 regardless.
            error!(error = %e, user_id = %user.user_id, "stored hash unreadable");
            false
        });

    if !ok {
        warn!(email = %payload.email, user_id = %user.user_id, "login invalid password");
        return Err(ApiError::Unauthorized);
    }

    if let Some(requested) = payload.role.as_deref() {
        if requested != creds.role {
            warn!(user_id = %user.user_id, requested = %requested, "login role mismatch");
            return Err(ApiError::Unauthorized);
        }
    }

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign(&user.email, &creds.role).map_err(|e| {
        error!(error = %e, "jwt sign failed");
        ApiError::Internal(e)
    })?;

    info!(user_id = %user.user_id, email = %user.email, "user logged in");
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
        role: creds.role,
        username: user.email,
        user_id: user.user_id,
    }))
}

#[instrument(skip(state, _admin))]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<UserListResponse>>, ApiError> {
    let users = User::list_with_roles(&state.db).await?;
    Ok(Json(users.into_iter().map(UserListResponse::from).collect()))
}

#[instrument(skip(state, admin))]
pub async fn delete_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let target = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    let existed = User::delete(&state.db, target.user_id).await?;
    if !existed {
        // Raced with another delete.
        return Err(ApiError::NotFound("User"));
    }
    info!(user_id = %target.user_id, email = %target.email, deleted_by = %admin.0.user.user_id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@sub.example.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@x.com"));
        assert!(!is_valid_email("@x.com"));
    }
}
