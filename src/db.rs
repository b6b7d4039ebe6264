use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use time::OffsetDateTime;

use crate::auth::{
    repo::{CredentialStore, StoreError, StoreResult},
    repo_types::{
        NewOtp, NewRefreshToken, NewUser, Otp, OtpPurpose, OtpRow, RefreshToken,
        RefreshTokenRow, User, UserRow,
    },
};

const USER_COLUMNS: &str = "id, full_name, email, password_hash, role, is_verified, is_blocked, \
                            avatar_url, address, created_at, updated_at";

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(database_url)
        .await
        .context("connect to database")
}

/// `CredentialStore` over the `users`, `otps` and `refresh_tokens` tables.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn to_user(row: UserRow) -> StoreResult<User> {
    User::try_from(row).map_err(|e| StoreError::Backend(anyhow::anyhow!(e)))
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        row.map(to_user).transpose()
    }

    async fn find_user_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        row.map(to_user).transpose()
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL ORDER BY id"
        ))
        .fetch_all(&self.db)
        .await
        .context("list users")?;
        rows.into_iter().map(to_user).collect()
    }

    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let result = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (full_name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.full_name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.role.as_str())
        .fetch_one(&self.db)
        .await;
        match result {
            Ok(row) => to_user(row),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Conflict("users.email")),
            Err(e) => Err(anyhow::Error::new(e).context("create user").into()),
        }
    }

    async fn save_user(&self, user: &User) -> StoreResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
               SET full_name = $2, email = $3, password_hash = $4, role = $5,
                   is_verified = $6, is_blocked = $7, avatar_url = $8, address = $9,
                   updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.is_verified)
        .bind(user.is_blocked)
        .bind(&user.avatar_url)
        .bind(&user.address)
        .fetch_one(&self.db)
        .await
        .context("save user")?;
        to_user(row)
    }

    async fn soft_delete_user(&self, id: i64) -> StoreResult<bool> {
        let done = sqlx::query(
            "UPDATE users SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.db)
        .await
        .context("soft delete user")?;
        Ok(done.rows_affected() > 0)
    }

    async fn create_otp(&self, new: NewOtp) -> StoreResult<Otp> {
        let row = sqlx::query_as::<_, OtpRow>(
            r#"
            INSERT INTO otps (user_id, otp_code, purpose, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, otp_code, purpose, expires_at, is_used
            "#,
        )
        .bind(new.user_id)
        .bind(&new.code)
        .bind(new.purpose.as_str())
        .bind(new.expires_at)
        .fetch_one(&self.db)
        .await
        .context("create otp")?;
        Otp::try_from(row).map_err(|e| StoreError::Backend(anyhow::anyhow!(e)))
    }

    async fn find_unused_otp(
        &self,
        user_id: i64,
        code: &str,
        purpose: OtpPurpose,
    ) -> StoreResult<Option<Otp>> {
        let row = sqlx::query_as::<_, OtpRow>(
            r#"
            SELECT id, user_id, otp_code, purpose, expires_at, is_used
              FROM otps
             WHERE user_id = $1 AND otp_code = $2 AND purpose = $3 AND is_used = FALSE
             ORDER BY id DESC
             LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(code)
        .bind(purpose.as_str())
        .fetch_optional(&self.db)
        .await
        .context("find otp")?;
        row.map(|r| Otp::try_from(r).map_err(|e| StoreError::Backend(anyhow::anyhow!(e))))
            .transpose()
    }

    async fn consume_otp(&self, id: i64) -> StoreResult<bool> {
        let done = sqlx::query("UPDATE otps SET is_used = TRUE WHERE id = $1 AND is_used = FALSE")
            .bind(id)
            .execute(&self.db)
            .await
            .context("consume otp")?;
        Ok(done.rows_affected() == 1)
    }

    async fn delete_unused_otps(&self, user_id: i64, purpose: OtpPurpose) -> StoreResult<u64> {
        let done = sqlx::query(
            "DELETE FROM otps WHERE user_id = $1 AND purpose = $2 AND is_used = FALSE",
        )
        .bind(user_id)
        .bind(purpose.as_str())
        .execute(&self.db)
        .await
        .context("delete unused otps")?;
        Ok(done.rows_affected())
    }

    async fn create_refresh_token(&self, new: NewRefreshToken) -> StoreResult<RefreshToken> {
        let result = sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, token_hash, expires_at
            "#,
        )
        .bind(new.user_id)
        .bind(&new.token_hash)
        .bind(new.expires_at)
        .fetch_one(&self.db)
        .await;
        match result {
            Ok(row) => Ok(row.into()),
            Err(e) if is_unique_violation(&e) => {
                Err(StoreError::Conflict("refresh_tokens.token_hash"))
            }
            Err(e) => Err(anyhow::Error::new(e).context("create refresh token").into()),
        }
    }

    async fn find_refresh_token(&self, token_hash: &[u8]) -> StoreResult<Option<RefreshToken>> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            "SELECT id, user_id, token_hash, expires_at FROM refresh_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.db)
        .await
        .context("find refresh token")?;
        Ok(row.map(Into::into))
    }

    async fn find_active_refresh_token(
        &self,
        user_id: i64,
        now: OffsetDateTime,
    ) -> StoreResult<Option<RefreshToken>> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            SELECT id, user_id, token_hash, expires_at
              FROM refresh_tokens
             WHERE user_id = $1 AND expires_at >= $2
             ORDER BY expires_at DESC
             LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(now)
        .fetch_optional(&self.db)
        .await
        .context("find active refresh token")?;
        Ok(row.map(Into::into))
    }

    async fn delete_refresh_token(&self, token_hash: &[u8]) -> StoreResult<u64> {
        let done = sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.db)
            .await
            .context("delete refresh token")?;
        Ok(done.rows_affected())
    }

    async fn delete_expired_refresh_tokens(&self, now: OffsetDateTime) -> StoreResult<u64> {
        let done = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(&self.db)
            .await
            .context("sweep expired refresh tokens")?;
        Ok(done.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
        assert!(!is_unique_violation(&sqlx::Error::PoolTimedOut));
    }
}
