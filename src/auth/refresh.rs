use std::sync::Arc;

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::Duration;
use tracing::debug;

use crate::{
    auth::{
        repo::{CredentialStore, StoreError},
        repo_types::{NewRefreshToken, RefreshToken},
    },
    clock::Clock,
};

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("refresh token not found")]
    NotFound,

    #[error("refresh token expired")]
    Expired,

    #[error("no valid refresh token")]
    NoValidToken,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Long-lived opaque tokens. Only their SHA-256 reaches the credential store;
/// the raw value exists in the caller's hands alone.
///
/// Tokens are never rotated on use and a user may hold several at once. A
/// token is live while `now <= expires_at`.
#[derive(Clone)]
pub struct RefreshTokenManager {
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl RefreshTokenManager {
    pub fn new(store: Arc<dyn CredentialStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { store, clock, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn issue(&self, user_id: i64) -> Result<String, RefreshError> {
        let token = generate_token();
        self.store
            .create_refresh_token(NewRefreshToken {
                user_id,
                token_hash: hash_token(&token),
                expires_at: self.clock.now() + self.ttl,
            })
            .await?;
        debug!(user_id, "refresh token issued");
        Ok(token)
    }

    /// Expired rows are reported, not deleted; `sweep_expired` removes them.
    pub async fn validate(&self, token: &str) -> Result<RefreshToken, RefreshError> {
        let record = self
            .store
            .find_refresh_token(&hash_token(token))
            .await?
            .ok_or(RefreshError::NotFound)?;
        if self.clock.now() > record.expires_at {
            return Err(RefreshError::Expired);
        }
        Ok(record)
    }

    /// Deleting a token that does not exist is not an error.
    pub async fn revoke(&self, token: &str) -> Result<(), RefreshError> {
        let removed = self.store.delete_refresh_token(&hash_token(token)).await?;
        debug!(removed, "refresh token revoked");
        Ok(())
    }

    /// The returned record is live at the current instant; callers need not
    /// validate it again.
    pub async fn lookup_active_by_user(&self, user_id: i64) -> Result<RefreshToken, RefreshError> {
        self.store
            .find_active_refresh_token(user_id, self.clock.now())
            .await?
            .ok_or(RefreshError::NoValidToken)
    }

    pub async fn sweep_expired(&self) -> Result<u64, RefreshError> {
        let removed = self
            .store
            .delete_expired_refresh_tokens(self.clock.now())
            .await?;
        if removed > 0 {
            debug!(removed, "expired refresh tokens swept");
        }
        Ok(removed)
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

/// Lookup key for a presented token.
pub fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}
