// Auth Handlers - signup, login, sessions and account tokens

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::accounts::{ActivityCounts, NewAccount, PublicUser, User};
use crate::error::AppResult;
use crate::extractors::{CurrentUser, Payload};
use crate::notify::NoticeKind;
use crate::routes::ApiResponse;
use crate::state::AppState;

// -- Request/Response types --

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub user: PublicUser,
    pub token: String,
}

#[derive(Serialize)]
pub struct MeResponse {
    pub user: PublicUser,
    pub stats: ActivityCounts,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/auth/verify-email/request", post(request_verification))
        .route("/auth/verify-email", post(verify_email))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
}

fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Sends a fresh verification token; failures are logged only.
async fn send_verification(state: &AppState, user: &User) {
    match state.accounts.issue_email_verification_token(&user.id).await {
        Ok((user, token)) => {
            state
                .notifier
                .deliver(NoticeKind::EmailVerification, &user, &token)
                .await
        }
        Err(e) => tracing::warn!(user_id = %user.id, error = %e, "Could not issue verification token"),
    }
}

// -- Handlers --

/// POST /api/auth/signup
async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Payload(account): Payload<NewAccount>,
) -> AppResult<impl IntoResponse> {
    let user = state.accounts.signup(account).await?;
    send_verification(&state, &user).await;

    let token = state
        .accounts
        .issue_session(&user.id, user_agent(&headers))
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(
            SessionResponse {
                user: PublicUser::from_user(&user, true),
                token,
            },
            "Account created successfully",
        ),
    ))
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Payload(req): Payload<LoginRequest>,
) -> AppResult<ApiResponse<SessionResponse>> {
    let user = state.accounts.authenticate(&req.email, &req.password).await?;
    let token = state
        .accounts
        .issue_session(&user.id, user_agent(&headers))
        .await?;

    Ok(ApiResponse::with_message(
        SessionResponse {
            user: PublicUser::from_user(&user, true),
            token,
        },
        "Login successful",
    ))
}

/// POST /api/auth/logout
async fn logout(
    State(state): State<AppState>,
    current: CurrentUser,
) -> AppResult<ApiResponse<()>> {
    state.accounts.revoke_session(&current.token).await?;
    Ok(ApiResponse::message("Logged out"))
}

/// GET /api/auth/me
async fn me(
    State(state): State<AppState>,
    current: CurrentUser,
) -> AppResult<ApiResponse<MeResponse>> {
    let user = state.accounts.touch_activity(&current.user.id).await?;
    let stats = state.accounts.counts(&user.id).await?;
    Ok(ApiResponse::ok(MeResponse {
        user: PublicUser::from_user(&user, true),
        stats,
    }))
}

/// POST /api/auth/verify-email/request
async fn request_verification(
    State(state): State<AppState>,
    current: CurrentUser,
) -> AppResult<ApiResponse<()>> {
    let (user, token) = state
        .accounts
        .issue_email_verification_token(&current.user.id)
        .await?;
    state
        .notifier
        .deliver(NoticeKind::EmailVerification, &user, &token)
        .await;
    Ok(ApiResponse::message("Verification email sent"))
}

/// POST /api/auth/verify-email
async fn verify_email(
    State(state): State<AppState>,
    Payload(req): Payload<TokenRequest>,
) -> AppResult<ApiResponse<PublicUser>> {
    let user = state.accounts.verify_email(&req.token).await?;
    Ok(ApiResponse::with_message(
        PublicUser::from_user(&user, true),
        "Email verified",
    ))
}

/// POST /api/auth/forgot-password
/// Same answer whether or not the email is registered.
async fn forgot_password(
    State(state): State<AppState>,
    Payload(req): Payload<ForgotPasswordRequest>,
) -> AppResult<ApiResponse<()>> {
    if let Some((user, token)) = state.accounts.issue_password_reset_token(&req.email).await? {
        state
            .notifier
            .deliver(NoticeKind::PasswordReset, &user, &token)
            .await;
    }
    Ok(ApiResponse::message(
        "If that email is registered, a reset link has been sent",
    ))
}

/// POST /api/auth/reset-password
async fn reset_password(
    State(state): State<AppState>,
    Payload(req): Payload<ResetPasswordRequest>,
) -> AppResult<ApiResponse<()>> {
    state
        .accounts
        .reset_password(&req.token, &req.password)
        .await?;
    Ok(ApiResponse::message("Password has been reset"))
}
