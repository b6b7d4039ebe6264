use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use time::Duration;
use tracing::{info, warn};

use crate::{
    auth::{
        jwt::{Claims, InvalidToken, JwtKeys, TokenStatus},
        otp::{self, OtpManager},
        password::PasswordHasher,
        refresh::{RefreshError, RefreshTokenManager},
        repo::CredentialStore,
        repo_types::{NewUser, OtpPurpose, Role, User},
    },
    clock::Clock,
    config::AppConfig,
    error::{AuthError, AuthResult},
    notify::{Delivery, Notifier},
};

pub const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trims, lower-cases and validates an address.
pub fn normalize_email(raw: &str) -> AuthResult<String> {
    let email = raw.trim().to_lowercase();
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AuthError::validation("invalid email"));
    }
    Ok(email)
}

fn check_password(password: &str) -> AuthResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn check_otp_format(code: &str) -> AuthResult<()> {
    if !otp::is_well_formed(code.trim()) {
        return Err(AuthError::validation("otp must be 6 digits"));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct SignupInput {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct SignupOutcome {
    pub user: User,
    /// Whether the verification email went out. Failure is not an error.
    pub delivery: Delivery,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

/// Identity attached to a request that passed the role gate.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub user_id: i64,
    pub role: Role,
    /// Set when the presented access token had expired and a new one was
    /// minted from the user's active refresh token.
    pub refreshed_token: Option<String>,
}

/// Orchestrates signup, verification, login, password reset, refresh and
/// logout over the store, hasher, OTP, JWT and refresh-token components.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    otp: OtpManager,
    jwt: JwtKeys,
    refresh: RefreshTokenManager,
}

impl AuthService {
    pub fn new(
        cfg: &AppConfig,
        store: Arc<dyn CredentialStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let hasher = PasswordHasher::from_config(&cfg.hashing)?;
        let otp = OtpManager::new(
            store.clone(),
            notifier,
            clock.clone(),
            Duration::minutes(cfg.otp.ttl_minutes),
        );
        let jwt = JwtKeys::from_config(&cfg.jwt, clock.clone());
        let refresh = RefreshTokenManager::new(
            store.clone(),
            clock,
            Duration::minutes(cfg.jwt.refresh_ttl_minutes),
        );
        Ok(Self {
            store,
            hasher,
            otp,
            jwt,
            refresh,
        })
    }

    pub fn access_ttl(&self) -> Duration {
        self.jwt.access_ttl()
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh.ttl()
    }

    async fn user_by_email(&self, email: &str) -> AuthResult<User> {
        self.store
            .find_user_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn signup(&self, input: SignupInput) -> AuthResult<SignupOutcome> {
        let full_name = input.full_name.trim().to_string();
        if full_name.is_empty() {
            return Err(AuthError::validation("full_name is required"));
        }
        let email = normalize_email(&input.email)?;
        check_password(&input.password)?;

        if self.store.find_user_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(AuthError::EmailTaken);
        }

        let password_hash = self.hasher.hash(&input.password)?;
        // A concurrent signup can still win between the check and the insert;
        // the unique index turns that into EmailTaken.
        let user = self
            .store
            .create_user(NewUser {
                full_name,
                email,
                password_hash,
                role: Role::User,
            })
            .await?;
        info!(user_id = user.id, email = %user.email, "user registered");

        let issued = self.otp.issue(&user, OtpPurpose::Signup).await?;
        Ok(SignupOutcome {
            user,
            delivery: issued.delivery,
        })
    }

    pub async fn verify_otp(
        &self,
        email: &str,
        code: &str,
        purpose: OtpPurpose,
    ) -> AuthResult<User> {
        let email = normalize_email(email)?;
        check_otp_format(code)?;
        let user = self.otp.verify(&email, code.trim(), purpose).await?;
        info!(user_id = user.id, %purpose, "otp verified");
        Ok(user)
    }

    pub async fn send_otp(&self, email: &str) -> AuthResult<Delivery> {
        self.issue_for_email(email, OtpPurpose::Generic).await
    }

    /// Issues a fresh signup code; the previous one stops working.
    pub async fn resend_otp(&self, email: &str) -> AuthResult<Delivery> {
        self.issue_for_email(email, OtpPurpose::Signup).await
    }

    pub async fn forgot_password(&self, email: &str) -> AuthResult<Delivery> {
        self.issue_for_email(email, OtpPurpose::ResetPassword).await
    }

    async fn issue_for_email(&self, email: &str, purpose: OtpPurpose) -> AuthResult<Delivery> {
        let email = normalize_email(email)?;
        let user = self.user_by_email(&email).await?;
        let issued = self.otp.issue(&user, purpose).await?;
        Ok(issued.delivery)
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthResult<LoginOutcome> {
        if let Err(e) = self.refresh.sweep_expired().await {
            warn!(error = %e, "refresh token sweep failed; continuing");
        }

        let email = normalize_email(email)?;
        let user = match self.store.find_user_by_email(&email).await? {
            Some(u) => u,
            None => {
                warn!(email = %email, "login unknown email");
                return Err(AuthError::UserNotFound);
            }
        };

        if !self.hasher.verify(password, &user.password_hash) {
            warn!(email = %email, user_id = user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_verified {
            warn!(user_id = user.id, "login before email verification");
            return Err(AuthError::NotVerified);
        }
        if user.is_blocked {
            warn!(user_id = user.id, "login of blocked account");
            return Err(AuthError::Blocked);
        }

        let access_token = self.jwt.sign_access(user.id, user.role)?;
        let refresh_token = self.refresh.issue(user.id).await.map_err(refresh_internal)?;
        info!(user_id = user.id, email = %user.email, "user logged in");
        Ok(LoginOutcome {
            user,
            access_token,
            refresh_token,
        })
    }

    /// The code is claimed before the new hash is written, so concurrent
    /// resets with one code change the password at most once.
    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> AuthResult<()> {
        let email = normalize_email(email)?;
        check_otp_format(code)?;
        check_password(new_password)?;

        let mut user = self.user_by_email(&email).await?;
        let otp = self
            .otp
            .check(user.id, code.trim(), OtpPurpose::ResetPassword)
            .await?;
        self.otp.consume(&otp).await?;

        user.password_hash = self.hasher.hash(new_password)?;
        let user = self.store.save_user(&user).await?;
        info!(user_id = user.id, "password reset");
        Ok(())
    }

    /// Mints a new access token. The refresh token itself is left in place.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<String> {
        let record = self.refresh.validate(refresh_token).await.map_err(|e| {
            warn!(error = %e, "refresh rejected");
            relogin(e)
        })?;
        let user = self
            .store
            .find_user_by_id(record.user_id)
            .await?
            .ok_or(AuthError::Unauthorized("please login again"))?;
        let token = self.jwt.sign_access(user.id, user.role)?;
        info!(user_id = user.id, "access token refreshed");
        Ok(token)
    }

    pub async fn logout(&self, refresh_token: &str) -> AuthResult<()> {
        self.refresh.revoke(refresh_token).await.map_err(refresh_internal)?;
        info!("logged out");
        Ok(())
    }

    /// Gate for role-scoped routes.
    ///
    /// An expired but correctly signed token is replaced from the user's
    /// active refresh token; the role is the one carried by the expired token.
    pub async fn authorize(&self, token: Option<&str>, required: Role) -> AuthResult<Authenticated> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::Unauthorized("missing access token"))?;

        let (claims, refreshed_token) = match self.jwt.verify(token) {
            TokenStatus::Valid(claims) => (claims, None),
            TokenStatus::Expired(claims) => {
                let fresh = self.silent_refresh(&claims).await?;
                (claims, Some(fresh))
            }
            TokenStatus::Invalid(InvalidToken::Malformed) => {
                warn!("malformed access token");
                return Err(AuthError::Unauthorized("invalid token"));
            }
            TokenStatus::Invalid(InvalidToken::BadSignature) => {
                warn!("access token signature mismatch");
                return Err(AuthError::Unauthorized("invalid token"));
            }
        };

        if claims.role != required {
            warn!(user_id = claims.user_id, role = %claims.role, required = %required, "role mismatch");
            return Err(AuthError::Forbidden("insufficient role"));
        }

        Ok(Authenticated {
            user_id: claims.user_id,
            role: claims.role,
            refreshed_token,
        })
    }

    /// Needs a live session and a user that still exists.
    async fn silent_refresh(&self, claims: &Claims) -> AuthResult<String> {
        self.refresh
            .lookup_active_by_user(claims.user_id)
            .await
            .map_err(|e| {
                warn!(user_id = claims.user_id, error = %e, "silent refresh failed");
                relogin(e)
            })?;
        if self.store.find_user_by_id(claims.user_id).await?.is_none() {
            warn!(user_id = claims.user_id, "silent refresh for a missing user");
            return Err(AuthError::Unauthorized("please login again"));
        }
        let token = self.jwt.sign_access(claims.user_id, claims.role)?;
        info!(user_id = claims.user_id, "access token silently refreshed");
        Ok(token)
    }
}

fn relogin(e: RefreshError) -> AuthError {
    match e {
        RefreshError::Store(e) => e.into(),
        _ => AuthError::Unauthorized("please login again"),
    }
}

fn refresh_internal(e: RefreshError) -> AuthError {
    match e {
        RefreshError::Store(e) => e.into(),
        other => AuthError::Internal(other.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{memory::MemoryStore, otp::tests::RecordingNotifier},
        clock::ManualClock,
        error::ErrorKind,
    };

    struct Fixture {
        auth: AuthService,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        notifier: Arc<RecordingNotifier>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::starting_now());
        let notifier = Arc::new(RecordingNotifier::default());
        let auth = AuthService::new(
            &AppConfig::for_tests(),
            store.clone(),
            notifier.clone(),
            clock.clone(),
        )
        .expect("auth service");
        Fixture {
            auth,
            store,
            clock,
            notifier,
        }
    }

    impl Fixture {
        fn last_code(&self) -> String {
            let sent = self.notifier.sent.lock().unwrap();
            let body = &sent.last().expect("an email was sent").body;
            body.split_whitespace()
                .find(|w| otp::is_well_formed(w))
                .expect("code in body")
                .to_string()
        }

        async fn verified_user(&self, email: &str, password: &str) -> User {
            self.auth
                .signup(SignupInput {
                    full_name: "Ada".into(),
                    email: email.into(),
                    password: password.into(),
                })
                .await
                .unwrap();
            let code = self.last_code();
            self.auth
                .verify_otp(email, &code, OtpPurpose::Signup)
                .await
                .unwrap()
        }

        async fn make_admin(&self, mut user: User) -> User {
            user.role = Role::Admin;
            self.store.save_user(&user).await.unwrap()
        }
    }

    fn wrong(code: &str) -> String {
        let n: u32 = code.parse().unwrap();
        format!("{:06}", (n + 1) % 1_000_000)
    }

    #[tokio::test]
    async fn signup_verify_login_logout_scenario() {
        let f = fixture();
        let outcome = f
            .auth
            .signup(SignupInput {
                full_name: "A".into(),
                email: "a@x.com".into(),
                password: "secret1".into(),
            })
            .await
            .unwrap();
        assert!(!outcome.user.is_verified);
        assert_eq!(outcome.user.role, Role::User);
        assert!(outcome.delivery.is_sent());

        let code = f.last_code();
        let err = f
            .auth
            .verify_otp("a@x.com", &wrong(&code), OtpPurpose::Signup)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidOtp));

        let user = f
            .auth
            .verify_otp("a@x.com", &code, OtpPurpose::Signup)
            .await
            .unwrap();
        assert!(user.is_verified);

        let login = f.auth.login("a@x.com", "secret1").await.unwrap();
        assert!(!login.access_token.is_empty());
        assert!(!login.refresh_token.is_empty());

        f.auth.refresh(&login.refresh_token).await.unwrap();
        f.auth.logout(&login.refresh_token).await.unwrap();
        let err = f.auth.refresh(&login.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized(_)));
        f.auth.logout(&login.refresh_token).await.expect("idempotent");
    }

    #[tokio::test]
    async fn signup_normalizes_and_rejects_duplicates() {
        let f = fixture();
        let input = SignupInput {
            full_name: "A".into(),
            email: "  A@X.com ".into(),
            password: "secret1".into(),
        };
        let outcome = f.auth.signup(input.clone()).await.unwrap();
        assert_eq!(outcome.user.email, "a@x.com");

        let err = f.auth.signup(input).await.unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn signup_validates_input() {
        let f = fixture();
        let base = SignupInput {
            full_name: "A".into(),
            email: "a@x.com".into(),
            password: "secret1".into(),
        };
        for bad in [
            SignupInput { email: "nope".into(), ..base.clone() },
            SignupInput { password: "12345".into(), ..base.clone() },
            SignupInput { full_name: "  ".into(), ..base.clone() },
        ] {
            let err = f.auth.signup(bad).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    #[tokio::test]
    async fn signup_succeeds_when_email_delivery_fails() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        let auth = AuthService::new(
            &AppConfig::for_tests(),
            store,
            notifier,
            Arc::new(ManualClock::starting_now()),
        )
        .unwrap();
        let outcome = auth
            .signup(SignupInput {
                full_name: "A".into(),
                email: "a@x.com".into(),
                password: "secret1".into(),
            })
            .await
            .unwrap();
        assert!(matches!(outcome.delivery, Delivery::Failed(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_signups_have_one_winner() {
        let f = fixture();
        let auth = Arc::new(f.auth);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let auth = auth.clone();
                tokio::spawn(async move {
                    auth.signup(SignupInput {
                        full_name: "A".into(),
                        email: "race@x.com".into(),
                        password: "secret1".into(),
                    })
                    .await
                })
            })
            .collect();

        let mut ok = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(e) => assert_eq!(e.kind(), ErrorKind::Conflict),
            }
        }
        assert_eq!(ok, 1);
    }

    #[tokio::test]
    async fn login_failures_are_distinguished() {
        let f = fixture();
        f.verified_user("a@x.com", "secret1").await;

        let err = f.auth.login("ghost@x.com", "secret1").await.unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));

        let err = f.auth.login("a@x.com", "wrong-password").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        f.auth
            .signup(SignupInput {
                full_name: "B".into(),
                email: "b@x.com".into(),
                password: "secret1".into(),
            })
            .await
            .unwrap();
        let err = f.auth.login("b@x.com", "secret1").await.unwrap_err();
        assert!(matches!(err, AuthError::NotVerified));
    }

    #[tokio::test]
    async fn blocked_and_deleted_users_cannot_login() {
        let f = fixture();
        let mut user = f.verified_user("a@x.com", "secret1").await;
        user.is_blocked = true;
        let user = f.store.save_user(&user).await.unwrap();
        let err = f.auth.login("a@x.com", "secret1").await.unwrap_err();
        assert!(matches!(err, AuthError::Blocked));

        f.store.soft_delete_user(user.id).await.unwrap();
        let err = f.auth.login("a@x.com", "secret1").await.unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
    }

    #[tokio::test]
    async fn login_sweeps_expired_refresh_tokens() {
        let f = fixture();
        let user = f.verified_user("a@x.com", "secret1").await;
        f.auth.login("a@x.com", "secret1").await.unwrap();
        f.clock.advance(Duration::days(8));

        f.auth.login("a@x.com", "secret1").await.unwrap();
        let rows = f.store.refresh_tokens_for(user.id);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].expires_at > f.clock.now());
    }

    #[tokio::test]
    async fn password_reset_flow() {
        let f = fixture();
        f.verified_user("a@x.com", "secret1").await;

        f.auth.forgot_password("a@x.com").await.unwrap();
        let code = f.last_code();

        let err = f
            .auth
            .reset_password("a@x.com", &wrong(&code), "newpass1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidOtp));

        f.auth
            .reset_password("a@x.com", &code, "newpass1")
            .await
            .unwrap();
        assert!(matches!(
            f.auth.login("a@x.com", "secret1").await.unwrap_err(),
            AuthError::InvalidCredentials
        ));
        f.auth.login("a@x.com", "newpass1").await.unwrap();

        let err = f
            .auth
            .reset_password("a@x.com", &code, "another1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidOtp));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn one_reset_code_resets_the_password_once() {
        let f = fixture();
        f.verified_user("a@x.com", "secret1").await;
        f.auth.forgot_password("a@x.com").await.unwrap();
        let code = f.last_code();

        let auth = Arc::new(f.auth);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let auth = auth.clone();
                let code = code.clone();
                tokio::spawn(async move {
                    let password = format!("newpass{i}");
                    auth.reset_password("a@x.com", &code, &password)
                        .await
                        .map(|_| password)
                })
            })
            .collect();

        let mut winners = Vec::new();
        for h in handles {
            match h.await.unwrap() {
                Ok(password) => winners.push(password),
                Err(e) => assert!(matches!(e, AuthError::InvalidOtp), "{e}"),
            }
        }
        assert_eq!(winners.len(), 1);
        auth.login("a@x.com", &winners[0]).await.unwrap();
    }

    #[tokio::test]
    async fn reset_code_expires() {
        let f = fixture();
        f.verified_user("a@x.com", "secret1").await;
        f.auth.forgot_password("a@x.com").await.unwrap();
        let code = f.last_code();
        f.clock.advance(Duration::minutes(10) + Duration::seconds(1));
        let err = f
            .auth
            .reset_password("a@x.com", &code, "newpass1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::OtpExpired));
    }

    #[tokio::test]
    async fn forgot_password_for_unknown_email_is_not_found() {
        let f = fixture();
        let err = f.auth.forgot_password("ghost@x.com").await.unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
    }

    #[tokio::test]
    async fn resend_replaces_the_signup_code() {
        let f = fixture();
        f.auth
            .signup(SignupInput {
                full_name: "A".into(),
                email: "a@x.com".into(),
                password: "secret1".into(),
            })
            .await
            .unwrap();
        let first = f.last_code();
        f.auth.resend_otp("a@x.com").await.unwrap();
        let second = f.last_code();
        if first != second {
            let err = f
                .auth
                .verify_otp("a@x.com", &first, OtpPurpose::Signup)
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::InvalidOtp));
        }
        f.auth
            .verify_otp("a@x.com", &second, OtpPurpose::Signup)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn malformed_otp_is_a_validation_error() {
        let f = fixture();
        let err = f
            .auth
            .verify_otp("a@x.com", "12ab56", OtpPurpose::Signup)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[tokio::test]
    async fn authorize_checks_presence_and_role() {
        let f = fixture();
        let user = f.verified_user("a@x.com", "secret1").await;
        let login = f.auth.login("a@x.com", "secret1").await.unwrap();

        let err = f.auth.authorize(None, Role::User).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let ok = f
            .auth
            .authorize(Some(&login.access_token), Role::User)
            .await
            .unwrap();
        assert_eq!(ok.user_id, user.id);
        assert!(ok.refreshed_token.is_none());

        let err = f
            .auth
            .authorize(Some(&login.access_token), Role::Admin)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = f
            .auth
            .authorize(Some("garbage"), Role::User)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn expired_access_token_is_silently_refreshed() {
        let f = fixture();
        let user = f.verified_user("a@x.com", "secret1").await;
        f.make_admin(user).await;
        let login = f.auth.login("a@x.com", "secret1").await.unwrap();

        f.clock.advance(Duration::minutes(31));
        let ok = f
            .auth
            .authorize(Some(&login.access_token), Role::Admin)
            .await
            .unwrap();
        assert_eq!(ok.role, Role::Admin);
        let fresh = ok.refreshed_token.expect("new token");
        let again = f.auth.authorize(Some(&fresh), Role::Admin).await.unwrap();
        assert!(again.refreshed_token.is_none());
    }

    #[tokio::test]
    async fn deleted_user_is_not_silently_refreshed() {
        let f = fixture();
        let user = f.verified_user("a@x.com", "secret1").await;
        let login = f.auth.login("a@x.com", "secret1").await.unwrap();
        f.store.soft_delete_user(user.id).await.unwrap();

        f.clock.advance(Duration::minutes(31));
        let err = f
            .auth
            .authorize(Some(&login.access_token), Role::User)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(f.store.refresh_tokens_for(user.id).len(), 1);
    }

    #[tokio::test]
    async fn expired_access_token_without_session_is_rejected() {
        let f = fixture();
        f.verified_user("a@x.com", "secret1").await;
        let login = f.auth.login("a@x.com", "secret1").await.unwrap();
        f.auth.logout(&login.refresh_token).await.unwrap();

        f.clock.advance(Duration::minutes(31));
        let err = f
            .auth
            .authorize(Some(&login.access_token), Role::User)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn access_token_outlives_logout() {
        let f = fixture();
        f.verified_user("a@x.com", "secret1").await;
        let login = f.auth.login("a@x.com", "secret1").await.unwrap();
        f.auth.logout(&login.refresh_token).await.unwrap();
        f.auth
            .authorize(Some(&login.access_token), Role::User)
            .await
            .expect("access tokens are not revocable");
    }
}
