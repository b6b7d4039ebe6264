use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::auth::repo_types::{
    NewOtp, NewRefreshToken, NewUser, Otp, OtpPurpose, RefreshToken, User,
};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write (email, refresh token hash).
    #[error("unique constraint violated: {0}")]
    Conflict(&'static str),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence seam for users, OTPs and refresh tokens.
///
/// Soft-deleted users are invisible to every user lookup. Uniqueness of email
/// and of refresh-token hashes is enforced here, not by callers. Refresh
/// tokens are addressed by hash only.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_id(&self, id: i64) -> StoreResult<Option<User>>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    /// Persists every mutable field of `user`; returns the stored row.
    async fn save_user(&self, user: &User) -> StoreResult<User>;
    /// Marks the user deleted. Returns false when no live user had that id.
    async fn soft_delete_user(&self, id: i64) -> StoreResult<bool>;

    async fn create_otp(&self, otp: NewOtp) -> StoreResult<Otp>;
    /// Unconsumed OTP matching the exact code, regardless of expiry.
    async fn find_unused_otp(
        &self,
        user_id: i64,
        code: &str,
        purpose: OtpPurpose,
    ) -> StoreResult<Option<Otp>>;
    /// Marks the code used if nobody has yet. Returns false when it was
    /// already consumed or deleted, so only one caller can ever win.
    async fn consume_otp(&self, id: i64) -> StoreResult<bool>;
    async fn delete_unused_otps(&self, user_id: i64, purpose: OtpPurpose) -> StoreResult<u64>;

    async fn create_refresh_token(&self, token: NewRefreshToken) -> StoreResult<RefreshToken>;
    async fn find_refresh_token(&self, token_hash: &[u8]) -> StoreResult<Option<RefreshToken>>;
    /// Latest-expiring token for the user with `expires_at >= now`.
    async fn find_active_refresh_token(
        &self,
        user_id: i64,
        now: OffsetDateTime,
    ) -> StoreResult<Option<RefreshToken>>;
    async fn delete_refresh_token(&self, token_hash: &[u8]) -> StoreResult<u64>;
    /// Removes rows with `expires_at < now`.
    async fn delete_expired_refresh_tokens(&self, now: OffsetDateTime) -> StoreResult<u64>;
}
