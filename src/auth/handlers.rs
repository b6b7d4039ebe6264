use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        cookies::{self, ACCESS_COOKIE, REFRESH_COOKIE},
        dto::{
            EmailRequest, LoginRequest, LoginResponse, MessageResponse, OtpSentResponse,
            PublicUser, RefreshRequest, RefreshResponse, ResetPasswordRequest, SignupRequest,
            VerifyOtpRequest,
        },
        repo_types::OtpPurpose,
        services::SignupInput,
    },
    error::{AuthError, AuthResult},
    notify::Delivery,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/send-otp", post(send_otp))
        .route("/auth/verify-otp", post(verify_otp))
        .route("/auth/resend-otp", post(resend_otp))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

fn cookie_headers<I>(cookies: I) -> AuthResult<HeaderMap>
where
    I: IntoIterator<Item = Result<HeaderValue, axum::http::header::InvalidHeaderValue>>,
{
    let mut headers = HeaderMap::new();
    for cookie in cookies {
        let value = cookie.map_err(|e| AuthError::Internal(e.into()))?;
        headers.append(SET_COOKIE, value);
    }
    Ok(headers)
}

fn otp_sent(message: &str, delivery: Delivery) -> Json<OtpSentResponse> {
    Json(OtpSentResponse {
        message: message.into(),
        email_sent: delivery.is_sent(),
    })
}

/// Body token first, then the `refresh_token` cookie.
fn presented_refresh_token(headers: &HeaderMap, body: Option<Json<RefreshRequest>>) -> Option<String> {
    body.and_then(|Json(b)| b.refresh_token)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| cookies::cookie_value(headers, REFRESH_COOKIE))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> AuthResult<impl IntoResponse> {
    let outcome = state
        .auth
        .signup(SignupInput {
            full_name: payload.full_name,
            email: payload.email,
            password: payload.password,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        otp_sent(
            "Signup successful. Please verify your email using OTP.",
            outcome.delivery,
        ),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AuthResult<impl IntoResponse> {
    let outcome = state.auth.login(&payload.email, &payload.password).await?;
    let secure = state.config.cookies.secure;
    let headers = cookie_headers([
        cookies::set_cookie(
            ACCESS_COOKIE,
            &outcome.access_token,
            state.auth.access_ttl(),
            secure,
        ),
        cookies::set_cookie(
            REFRESH_COOKIE,
            &outcome.refresh_token,
            state.auth.refresh_ttl(),
            secure,
        ),
    ])?;
    Ok((
        headers,
        Json(LoginResponse {
            access_token: outcome.access_token,
            refresh_token: outcome.refresh_token,
            user: PublicUser::from(outcome.user),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn send_otp(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> AuthResult<Json<OtpSentResponse>> {
    let delivery = state.auth.send_otp(&payload.email).await?;
    Ok(otp_sent("OTP sent successfully", delivery))
}

#[instrument(skip(state, payload))]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyOtpRequest>,
) -> AuthResult<Json<MessageResponse>> {
    let purpose = payload.purpose.unwrap_or(OtpPurpose::Signup);
    state
        .auth
        .verify_otp(&payload.email, &payload.otp, purpose)
        .await?;
    let message = match purpose {
        OtpPurpose::Signup => "Email verified successfully",
        _ => "OTP verified successfully",
    };
    Ok(Json(MessageResponse::new(message)))
}

#[instrument(skip(state, payload))]
pub async fn resend_otp(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> AuthResult<Json<OtpSentResponse>> {
    let delivery = state.auth.resend_otp(&payload.email).await?;
    Ok(otp_sent("OTP resent successfully", delivery))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> AuthResult<Json<OtpSentResponse>> {
    let delivery = state.auth.forgot_password(&payload.email).await?;
    Ok(otp_sent("OTP sent to your email", delivery))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> AuthResult<Json<MessageResponse>> {
    state
        .auth
        .reset_password(&payload.email, &payload.otp, &payload.new_password)
        .await?;
    Ok(Json(MessageResponse::new("Password reset successful")))
}

#[instrument(skip(state, headers, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Option<Json<RefreshRequest>>,
) -> AuthResult<impl IntoResponse> {
    let token = presented_refresh_token(&headers, payload)
        .ok_or(AuthError::Unauthorized("missing refresh token"))?;
    let access_token = state.auth.refresh(&token).await?;
    let cookie = cookie_headers([cookies::set_cookie(
        ACCESS_COOKIE,
        &access_token,
        state.auth.access_ttl(),
        state.config.cookies.secure,
    )])?;
    Ok((cookie, Json(RefreshResponse { access_token })))
}

/// Revokes the presented refresh token, if any, and always clears both cookies.
#[instrument(skip(state, headers, payload))]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Option<Json<RefreshRequest>>,
) -> AuthResult<impl IntoResponse> {
    match presented_refresh_token(&headers, payload) {
        Some(token) => state.auth.logout(&token).await?,
        None => info!("logout without a refresh token"),
    }
    let secure = state.config.cookies.secure;
    let cleared = cookie_headers([
        cookies::clear_cookie(ACCESS_COOKIE, secure),
        cookies::clear_cookie(REFRESH_COOKIE, secure),
    ])?;
    Ok((cleared, Json(MessageResponse::new("Logged out successfully"))))
}
