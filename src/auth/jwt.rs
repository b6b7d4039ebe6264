use std::sync::Arc;

use jsonwebtoken::{
    decode, encode, errors::ErrorKind as JwtErrorKind, Algorithm, DecodingKey, EncodingKey,
    Header, Validation,
};
use serde::{Deserialize, Serialize};
use time::Duration;
use tracing::debug;

use crate::{auth::repo_types::Role, clock::Clock, config::JwtConfig};

/// Access-token payload. Field names are shared with existing clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub role: Role,
    pub exp: i64, // unix seconds
    #[serde(default)]
    pub iat: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidToken {
    /// Not a JWT, or the claims do not have the expected shape.
    Malformed,
    /// Signature does not match the server key or algorithm.
    BadSignature,
}

/// Result of checking an access token.
///
/// `Expired` carries claims whose signature did verify, so the caller knows
/// who the token belongs to and can try a silent refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    Valid(Claims),
    Expired(Claims),
    Invalid(InvalidToken),
}

/// HS256 signing and verification keys with the access-token lifetime.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl JwtKeys {
    pub fn new(secret: &[u8], access_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl,
            clock,
        }
    }

    pub fn from_config(cfg: &JwtConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            cfg.secret.as_bytes(),
            Duration::minutes(cfg.ttl_minutes),
            clock,
        )
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn sign_access(&self, user_id: i64, role: Role) -> anyhow::Result<String> {
        let now = self.clock.now();
        let claims = Claims {
            user_id,
            role,
            iat: now.unix_timestamp(),
            exp: (now + self.access_ttl).unix_timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(user_id, %role, "access token signed");
        Ok(token)
    }

    /// Two-phase check: read the claims, then verify the signature, then
    /// compare `exp` with the injected clock.
    pub fn verify(&self, token: &str) -> TokenStatus {
        let mut unverified = base_validation();
        unverified.insecure_disable_signature_validation();
        let claims = match decode::<Claims>(token, &DecodingKey::from_secret(&[]), &unverified) {
            Ok(data) => data.claims,
            Err(_) => return TokenStatus::Invalid(InvalidToken::Malformed),
        };

        if let Err(e) = decode::<Claims>(token, &self.decoding, &base_validation()) {
            return TokenStatus::Invalid(match e.kind() {
                JwtErrorKind::InvalidSignature | JwtErrorKind::InvalidAlgorithm => {
                    InvalidToken::BadSignature
                }
                _ => InvalidToken::Malformed,
            });
        }

        if self.clock.now().unix_timestamp() > claims.exp {
            debug!(user_id = claims.user_id, "access token expired");
            return TokenStatus::Expired(claims);
        }
        TokenStatus::Valid(claims)
    }
}

/// HS256 only; expiry is checked against our own clock, not by the library.
fn base_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.leeway = 0;
    validation.required_spec_claims.clear();
    validation.required_spec_claims.insert("exp".to_string());
    validation
}
