use std::sync::Arc;

use rand::{rngs::OsRng, Rng};
use thiserror::Error;
use time::Duration;
use tracing::{debug, info};

use crate::{
    auth::{
        repo::{CredentialStore, StoreError},
        repo_types::{NewOtp, Otp, OtpPurpose, User},
    },
    clock::Clock,
    notify::{self, Delivery, EmailMessage, Notifier},
};

pub const OTP_DIGITS: usize = 6;

#[derive(Debug, Error)]
pub enum OtpError {
    #[error("user not found")]
    UnknownUser,

    /// No unconsumed row carries this exact code for the user and purpose.
    #[error("invalid otp")]
    NotFound,

    #[error("otp expired")]
    Expired,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A freshly persisted code and what happened when we tried to mail it.
#[derive(Debug, Clone)]
pub struct IssuedOtp {
    pub code: String,
    pub delivery: Delivery,
}

/// Per (user, purpose): none -> issued -> consumed | expired.
#[derive(Clone)]
pub struct OtpManager {
    store: Arc<dyn CredentialStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl OtpManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            ttl,
        }
    }

    /// Replaces any unconsumed code for (user, purpose) and mails the new one.
    ///
    /// The delete and insert are separate statements; two concurrent calls can
    /// leave two live rows for the same pair.
    pub async fn issue(&self, user: &User, purpose: OtpPurpose) -> Result<IssuedOtp, OtpError> {
        let dropped = self.store.delete_unused_otps(user.id, purpose).await?;
        if dropped > 0 {
            debug!(user_id = user.id, %purpose, dropped, "invalidated previous otps");
        }

        let code = generate_code();
        let expires_at = self.clock.now() + self.ttl;
        self.store
            .create_otp(NewOtp {
                user_id: user.id,
                code: code.clone(),
                purpose,
                expires_at,
            })
            .await?;
        info!(user_id = user.id, %purpose, "otp issued");

        let message = EmailMessage {
            to: user.email.clone(),
            subject: "Your OTP Code".into(),
            body: format!(
                "Your OTP code is: {code}\nIt expires in {} minutes.",
                self.ttl.whole_minutes()
            ),
        };
        let delivery = notify::deliver(self.notifier.as_ref(), &message).await;
        Ok(IssuedOtp { code, delivery })
    }

    /// Finds the live row for `code` without consuming it.
    pub async fn check(
        &self,
        user_id: i64,
        code: &str,
        purpose: OtpPurpose,
    ) -> Result<Otp, OtpError> {
        let otp = self
            .store
            .find_unused_otp(user_id, code, purpose)
            .await?
            .ok_or(OtpError::NotFound)?;
        if self.clock.now() > otp.expires_at {
            return Err(OtpError::Expired);
        }
        Ok(otp)
    }

    /// Claims the code. A caller that loses the race to another consumer
    /// gets `NotFound`, same as for a code that was never issued.
    pub async fn consume(&self, otp: &Otp) -> Result<(), OtpError> {
        if !self.store.consume_otp(otp.id).await? {
            debug!(otp_id = otp.id, "otp already consumed");
            return Err(OtpError::NotFound);
        }
        Ok(())
    }

    /// Checks and consumes a code. A `Signup` code also marks the user verified.
    pub async fn verify(
        &self,
        email: &str,
        code: &str,
        purpose: OtpPurpose,
    ) -> Result<User, OtpError> {
        let mut user = self
            .store
            .find_user_by_email(email)
            .await?
            .ok_or(OtpError::UnknownUser)?;
        let otp = self.check(user.id, code, purpose).await?;
        self.consume(&otp).await?;

        if purpose == OtpPurpose::Signup && !user.is_verified {
            user.is_verified = true;
            user = self.store.save_user(&user).await?;
            info!(user_id = user.id, "email verified");
        }
        Ok(user)
    }
}

/// Uniform 6-digit code from the OS CSPRNG. `gen_range` rejects out-of-zone
/// samples, so there is no modulo bias.
pub fn generate_code() -> String {
    let n: u32 = OsRng.gen_range(0..1_000_000);
    format!("{n:0width$}", width = OTP_DIGITS)
}

pub fn is_well_formed(code: &str) -> bool {
    code.len() == OTP_DIGITS && code.bytes().all(|b| b.is_ascii_digit())
}
