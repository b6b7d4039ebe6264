use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::auth::{
    repo::{CredentialStore, StoreError, StoreResult},
    repo_types::{NewOtp, NewRefreshToken, NewUser, Otp, OtpPurpose, RefreshToken, User},
};

#[derive(Debug, Clone)]
struct UserSlot {
    user: User,
    deleted_at: Option<OffsetDateTime>,
}

#[derive(Debug, Default)]
struct Tables {
    users: Vec<UserSlot>,
    otps: Vec<Otp>,
    refresh_tokens: Vec<RefreshToken>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn live_user(&self, pred: impl Fn(&User) -> bool) -> Option<User> {
        self.users
            .iter()
            .find(|s| s.deleted_at.is_none() && pred(&s.user))
            .map(|s| s.user.clone())
    }
}

/// In-process `CredentialStore` with the same uniqueness rules as the
/// Postgres schema. Backs `AppState::fake()` and the tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// All OTP rows for a user, consumed or not.
    pub fn otps_for(&self, user_id: i64) -> Vec<Otp> {
        self.tables()
            .otps
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn refresh_tokens_for(&self, user_id: i64) -> Vec<RefreshToken> {
        self.tables()
            .refresh_tokens
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.tables().live_user(|u| u.email == email))
    }

    async fn find_user_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.tables().live_user(|u| u.id == id))
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self
            .tables()
            .users
            .iter()
            .filter(|s| s.deleted_at.is_none())
            .map(|s| s.user.clone())
            .collect())
    }

    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let mut t = self.tables();
        // Soft-deleted rows keep their email, as the unique index does.
        if t.users.iter().any(|s| s.user.email == new.email) {
            return Err(StoreError::Conflict("users.email"));
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: t.next_id(),
            full_name: new.full_name,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            is_verified: false,
            is_blocked: false,
            avatar_url: None,
            address: String::new(),
            created_at: now,
            updated_at: now,
        };
        t.users.push(UserSlot {
            user: user.clone(),
            deleted_at: None,
        });
        Ok(user)
    }

    async fn save_user(&self, user: &User) -> StoreResult<User> {
        let mut t = self.tables();
        let slot = t
            .users
            .iter_mut()
            .find(|s| s.user.id == user.id && s.deleted_at.is_none())
            .ok_or_else(|| StoreError::Backend(anyhow::anyhow!("user {} not found", user.id)))?;
        slot.user = User {
            updated_at: OffsetDateTime::now_utc(),
            created_at: slot.user.created_at,
            ..user.clone()
        };
        Ok(slot.user.clone())
    }

    async fn soft_delete_user(&self, id: i64) -> StoreResult<bool> {
        let mut t = self.tables();
        match t
            .users
            .iter_mut()
            .find(|s| s.user.id == id && s.deleted_at.is_none())
        {
            Some(slot) => {
                slot.deleted_at = Some(OffsetDateTime::now_utc());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn create_otp(&self, new: NewOtp) -> StoreResult<Otp> {
        let mut t = self.tables();
        let otp = Otp {
            id: t.next_id(),
            user_id: new.user_id,
            code: new.code,
            purpose: new.purpose,
            expires_at: new.expires_at,
            is_used: false,
        };
        t.otps.push(otp.clone());
        Ok(otp)
    }

    async fn find_unused_otp(
        &self,
        user_id: i64,
        code: &str,
        purpose: OtpPurpose,
    ) -> StoreResult<Option<Otp>> {
        Ok(self
            .tables()
            .otps
            .iter()
            .find(|o| o.user_id == user_id && o.code == code && o.purpose == purpose && !o.is_used)
            .cloned())
    }

    async fn consume_otp(&self, id: i64) -> StoreResult<bool> {
        let mut t = self.tables();
        match t.otps.iter_mut().find(|o| o.id == id && !o.is_used) {
            Some(row) => {
                row.is_used = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_unused_otps(&self, user_id: i64, purpose: OtpPurpose) -> StoreResult<u64> {
        let mut t = self.tables();
        let before = t.otps.len();
        t.otps
            .retain(|o| !(o.user_id == user_id && o.purpose == purpose && !o.is_used));
        Ok((before - t.otps.len()) as u64)
    }

    async fn create_refresh_token(&self, new: NewRefreshToken) -> StoreResult<RefreshToken> {
        let mut t = self.tables();
        if t.refresh_tokens.iter().any(|r| r.token_hash == new.token_hash) {
            return Err(StoreError::Conflict("refresh_tokens.token_hash"));
        }
        let row = RefreshToken {
            id: t.next_id(),
            user_id: new.user_id,
            token_hash: new.token_hash,
            expires_at: new.expires_at,
        };
        t.refresh_tokens.push(row.clone());
        Ok(row)
    }

    async fn find_refresh_token(&self, token_hash: &[u8]) -> StoreResult<Option<RefreshToken>> {
        Ok(self
            .tables()
            .refresh_tokens
            .iter()
            .find(|r| r.token_hash == token_hash)
            .cloned())
    }

    async fn find_active_refresh_token(
        &self,
        user_id: i64,
        now: OffsetDateTime,
    ) -> StoreResult<Option<RefreshToken>> {
        Ok(self
            .tables()
            .refresh_tokens
            .iter()
            .filter(|r| r.user_id == user_id && r.expires_at >= now)
            .max_by_key(|r| r.expires_at)
            .cloned())
    }

    async fn delete_refresh_token(&self, token_hash: &[u8]) -> StoreResult<u64> {
        let mut t = self.tables();
        let before = t.refresh_tokens.len();
        t.refresh_tokens.retain(|r| r.token_hash != token_hash);
        Ok((before - t.refresh_tokens.len()) as u64)
    }

    async fn delete_expired_refresh_tokens(&self, now: OffsetDateTime) -> StoreResult<u64> {
        let mut t = self.tables();
        let before = t.refresh_tokens.len();
        t.refresh_tokens.retain(|r| r.expires_at >= now);
        Ok((before - t.refresh_tokens.len()) as u64)
    }
}
