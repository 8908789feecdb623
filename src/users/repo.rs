use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// User profile row.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Credential row, one-to-one with a user. Cascade-deleted with its owner.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub cred_id: i32,
    pub user_id: Uuid,
    pub password_hash: String,
    pub role: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Profile joined with its credential role, for the admin listing.
#[derive(Debug, Clone, FromRow)]
pub struct UserWithRole {
    pub user_id: Uuid,
    pub email: String,
    pub phone: Option<String>,
    pub role: String,
    pub created_at: OffsetDateTime,
}

const USER_COLUMNS: &str = "user_id, username, email, phone, address, created_at, updated_at";

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, user_id: Uuid) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(db)
        .await
    }

    /// Create a user and its credential in one transaction. If the credential
    /// insert fails the user insert rolls back too, so no orphan users.
    /// The username mirrors the email, as the schema requires one.
    pub async fn create_with_credentials(
        db: &PgPool,
        email: &str,
        phone: Option<&str>,
        address: Option<&str>,
        password_hash: &str,
        role: &str,
    ) -> sqlx::Result<User> {
        let mut tx = db.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, phone, address)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(email)
        .bind(phone)
        .bind(address)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO user_credentials (user_id, password_hash, role)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user.user_id)
        .bind(password_hash)
        .bind(role)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(user)
    }

    pub async fn list_with_roles(db: &PgPool) -> sqlx::Result<Vec<UserWithRole>> {
        sqlx::query_as::<_, UserWithRole>(
            r#"
            SELECT u.user_id, u.email, u.phone, c.role, u.created_at
            FROM users u
            JOIN user_credentials c ON c.user_id = u.user_id
            ORDER BY u.created_at
            "#,
        )
        .fetch_all(db)
        .await
    }

    /// Delete a user; the credential row goes with it via the cascade.
    /// Returns whether a row actually existed.
    pub async fn delete(db: &PgPool, user_id: Uuid) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl UserCredentials {
    pub async fn for_user(db: &PgPool, user_id: Uuid) -> sqlx::Result<Option<UserCredentials>> {
        sqlx::query_as::<_, UserCredentials>(
            r#"
            SELECT cred_id, user_id, password_hash, role, created_at, updated_at
            FROM user_credentials
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(db)
        .await
    }
}

// Store-backed tests; run with `cargo test -- --ignored` against a
// disposable database.
#[cfg(test)]
mod db_tests {
    use super::*;
    use crate::state::AppState;

    fn unique_email() -> String {
        format!("{}@example.com", Uuid::new_v4())
    }

    #[tokio::test]
    #[ignore = "needs PostgreSQL at DATABASE_URL"]
    async fn duplicate_email_is_a_unique_violation_and_leaves_one_row() {
        let state = AppState::for_tests().await;
        let email = unique_email();

        let user = User::create_with_credentials(&state.db, &email, None, None, "hash-1", "user")
            .await
            .expect("first insert");
        let err =
            User::create_with_credentials(&state.db, &email, Some("123"), None, "hash-2", "user")
                .await
                .unwrap_err();
        assert!(matches!(&err, sqlx::Error::Database(db) if db.is_unique_violation()));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = $1")
            .bind(&email)
            .fetch_one(&state.db)
            .await
            .expect("count");
        assert_eq!(count, 1);

        let creds = UserCredentials::for_user(&state.db, user.user_id)
            .await
            .expect("lookup")
            .expect("credential present");
        assert_eq!(creds.password_hash, "hash-1");
    }

    #[tokio::test]
    #[ignore = "needs PostgreSQL at DATABASE_URL"]
    async fn failed_credential_insert_rolls_back_the_user() {
        let state = AppState::for_tests().await;
        let email = unique_email();

        // role is VARCHAR(50); an oversized one fails the second insert.
        let oversized_role = "r".repeat(60);
        let err =
            User::create_with_credentials(&state.db, &email, None, None, "hash", &oversized_role)
                .await
                .unwrap_err();
        assert!(matches!(err, sqlx::Error::Database(_)));

        assert!(User::find_by_email(&state.db, &email)
            .await
            .expect("lookup")
            .is_none());
    }

    #[tokio::test]
    #[ignore = "needs PostgreSQL at DATABASE_URL"]
    async fn delete_cascades_credentials() {
        let state = AppState::for_tests().await;
        let email = unique_email();

        let user = User::create_with_credentials(&state.db, &email, None, None, "hash", "user")
            .await
            .expect("insert");
        assert!(User::find_by_id(&state.db, user.user_id)
            .await
            .expect("lookup")
            .is_some());

        assert!(User::delete(&state.db, user.user_id).await.expect("delete"));

        assert!(UserCredentials::for_user(&state.db, user.user_id)
            .await
            .expect("lookup")
            .is_none());
        assert!(User::find_by_email(&state.db, &email)
            .await
            .expect("lookup")
            .is_none());
        // Deleting again reports that nothing existed.
        assert!(!User::delete(&state.db, user.user_id).await.expect("delete"));
    }
}
