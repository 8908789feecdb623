use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::repo::{User, UserWithRole};

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub role: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Request body for login. The role is optional; when present it must match
/// the stored role for the login to succeed.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub role: Option<String>,
}

/// Public user fields returned after registration.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email,
            phone: user.phone,
            address: user.address,
            created_at: user.created_at,
        }
    }
}

/// Response returned after a successful login.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub role: String,
    pub username: String,
    pub user_id: Uuid,
}

/// One row of the admin user listing.
#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub user_id: Uuid,
    pub email: String,
    pub phone: Option<String>,
    pub role: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<UserWithRole> for UserListResponse {
    fn from(row: UserWithRole) -> Self {
        Self {
            user_id: row.user_id,
            email: row.email,
            phone: row.phone,
            role: row.role,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_response_serializes_public_fields() {
        let response = UserResponse {
            user_id: Uuid::new_v4(),
            email: "test@example.com".to_string(),
            phone: None,
            address: None,
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(json.contains("user_id"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn token_response_uses_bearer_type() {
        let response = TokenResponse {
            access_token: "abc".into(),
            token_type: "bearer",
            role: "user".into(),
            username: "test@example.com".into(),
            user_id: Uuid::new_v4(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains(r#""token_type":"bearer""#));
    }
}
