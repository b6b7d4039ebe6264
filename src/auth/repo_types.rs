use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// What an OTP was issued for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    Signup,
    ResetPassword,
    Generic,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::Signup => "signup",
            OtpPurpose::ResetPassword => "reset_password",
            OtpPurpose::Generic => "generic",
        }
    }
}

impl fmt::Display for OtpPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OtpPurpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "signup" => Ok(OtpPurpose::Signup),
            "reset_password" => Ok(OtpPurpose::ResetPassword),
            "generic" => Ok(OtpPurpose::Generic),
            other => Err(format!("unknown otp purpose: {other}")),
        }
    }
}

/// User record.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, never exposed in JSON
    pub role: Role,
    pub is_verified: bool,
    pub is_blocked: bool,
    pub avatar_url: Option<String>,
    pub address: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Fields supplied when a user row is created.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Otp {
    pub id: i64,
    pub user_id: i64,
    pub code: String,
    pub purpose: OtpPurpose,
    pub expires_at: OffsetDateTime,
    pub is_used: bool,
}

#[derive(Debug, Clone)]
pub struct NewOtp {
    pub user_id: i64,
    pub code: String,
    pub purpose: OtpPurpose,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    pub id: i64,
    pub user_id: i64,
    /// SHA-256 of the issued value; the value itself is never stored.
    pub token_hash: Vec<u8>,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub user_id: i64,
    pub token_hash: Vec<u8>,
    pub expires_at: OffsetDateTime,
}

// ---- Raw rows as they come out of Postgres ----

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub is_verified: bool,
    pub is_blocked: bool,
    pub avatar_url: Option<String>,
    pub address: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = String;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            full_name: r.full_name,
            email: r.email,
            password_hash: r.password_hash,
            role: r.role.parse()?,
            is_verified: r.is_verified,
            is_blocked: r.is_blocked,
            avatar_url: r.avatar_url,
            address: r.address,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct OtpRow {
    pub id: i64,
    pub user_id: i64,
    pub otp_code: String,
    pub purpose: String,
    pub expires_at: OffsetDateTime,
    pub is_used: bool,
}

impl TryFrom<OtpRow> for Otp {
    type Error = String;

    fn try_from(r: OtpRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            code: r.otp_code,
            purpose: r.purpose.parse()?,
            expires_at: r.expires_at,
            is_used: r.is_used,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct RefreshTokenRow {
    pub id: i64,
    pub user_id: i64,
    pub token_hash: Vec<u8>,
    pub expires_at: OffsetDateTime,
}

impl From<RefreshTokenRow> for RefreshToken {
    fn from(r: RefreshTokenRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            token_hash: r.token_hash,
            expires_at: r.expires_at,
        }
    }
}
