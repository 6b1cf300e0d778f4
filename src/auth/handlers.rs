use axum::{
    extract::{FromRef, State},
    routing::{get, post, put},
    Router,
};
use axum_extra::extract::{CookieJar, PrivateCookieJar};
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        claims::Role,
        cookies,
        dto::{
            LoginRequest, LoginResponse, MessageResponse, RequestOtpRequest, ResetPasswordRequest,
            SessionView,
        },
        jwt::JwtKeys,
        otp::generate_code,
        password::{hash_secret, verify_secret},
        repo::{self, OtpClaim, StaffAccount},
        session::Session,
        validate,
    },
    error::{ApiError, ApiResult},
    extract::Json,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/login", post(admin_login))
        .route("/dietician/login", post(dietician_login))
        .route("/admin/requestOtp", post(admin_request_otp))
        .route("/dietician/requestOtp", post(dietician_request_otp))
        .route("/admin/resetPassword", put(admin_reset_password))
        .route("/dietician/resetPassword", put(dietician_reset_password))
        .route("/auth/logout", post(logout))
        .route("/auth/session", get(session))
}

type LoginReply = (CookieJar, PrivateCookieJar, Json<LoginResponse>);

async fn admin_login(
    state: State<AppState>,
    jar: CookieJar,
    private: PrivateCookieJar,
    payload: Json<LoginRequest>,
) -> ApiResult<LoginReply> {
    login(Role::Admin, state, jar, private, payload).await
}

async fn dietician_login(
    state: State<AppState>,
    jar: CookieJar,
    private: PrivateCookieJar,
    payload: Json<LoginRequest>,
) -> ApiResult<LoginReply> {
    login(Role::Dietician, state, jar, private, payload).await
}

#[instrument(skip(state, jar, private, payload))]
async fn login(
    role: Role,
    State(state): State<AppState>,
    jar: CookieJar,
    private: PrivateCookieJar,
    Json(mut payload): Json<LoginRequest>,
) -> ApiResult<LoginReply> {
    payload.email = payload.email.trim().to_lowercase();
    validate::email(&payload.email)?;
    validate::password(&payload.password)?;

    let account = match StaffAccount::find_by_email(&state.db, role, &payload.email).await? {
        Some(a) => a,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::Unauthorized("Invalid credentials".into()));
        }
    };

    if !verify_secret(&payload.password, &account.password_hash)? {
        warn!(email = %payload.email, staff_id = account.id, "login invalid password");
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(account.id, role)?;
    let (jar, private) = cookies::set_session(
        jar,
        private,
        &account,
        role,
        &token,
        cookies::max_age_for(keys.ttl),
        state.config.cookie_domain.as_deref(),
    );

    info!(staff_id = account.id, email = %account.email, "staff logged in");
    Ok((
        jar,
        private,
        Json(LoginResponse {
            access_token: token,
            role,
            id: account.id,
            name: account.name,
            username: account.username,
            phone: account.phone,
            email: account.email,
            logo: account.avatar,
            company: account.company,
        }),
    ))
}

async fn admin_request_otp(
    state: State<AppState>,
    payload: Json<RequestOtpRequest>,
) -> ApiResult<Json<MessageResponse>> {
    request_otp(Role::Admin, state, payload).await
}

async fn dietician_request_otp(
    state: State<AppState>,
    payload: Json<RequestOtpRequest>,
) -> ApiResult<Json<MessageResponse>> {
    request_otp(Role::Dietician, state, payload).await
}

#[instrument(skip(state, payload))]
async fn request_otp(
    role: Role,
    State(state): State<AppState>,
    Json(payload): Json<RequestOtpRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let phone = payload.phone.trim();
    validate::phone(phone)?;

    let account = StaffAccount::find_by_phone(&state.db, role, &validate::phone_variants(phone))
        .await?
        .ok_or_else(|| ApiError::not_found("No account found for this phone number"))?;

    let code = generate_code();
    let expires_at = OffsetDateTime::now_utc() + Duration::minutes(state.config.otp.ttl_minutes);
    repo::upsert_otp(&state.db, role, &account.phone, &hash_secret(&code)?, expires_at).await?;
    state.otp_sender.send(&account.phone, &code).await?;

    info!(staff_id = account.id, "password reset otp issued");
    Ok(Json(MessageResponse::new("OTP sent successfully")))
}

async fn admin_reset_password(
    state: State<AppState>,
    payload: Json<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    reset_password(Role::Admin, state, payload).await
}

async fn dietician_reset_password(
    state: State<AppState>,
    payload: Json<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    reset_password(Role::Dietician, state, payload).await
}

#[instrument(skip(state, payload))]
async fn reset_password(
    role: Role,
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let phone = payload.phone.trim();
    if phone.is_empty() || payload.otp.is_empty() || payload.password.is_empty() {
        return Err(ApiError::validation(
            "Phone number, OTP, and new password are required",
        ));
    }
    validate::phone(phone)?;
    validate::otp(&payload.otp)?;
    validate::password(&payload.password)?;

    let account = StaffAccount::find_by_phone(&state.db, role, &validate::phone_variants(phone))
        .await?
        .ok_or_else(|| ApiError::not_found("No account found for this phone number"))?;

    let now = OffsetDateTime::now_utc();
    let otp_hash = match repo::claim_otp_attempt(
        &state.db,
        role,
        &account.phone,
        now,
        state.config.otp.max_attempts,
    )
    .await?
    {
        OtpClaim::Claimed { otp_hash } => otp_hash,
        OtpClaim::Exhausted => {
            warn!(staff_id = account.id, "otp attempts exhausted");
            return Err(ApiError::TooManyAttempts(
                "Too many attempts, request a new OTP".into(),
            ));
        }
        OtpClaim::Missing => {
            return Err(ApiError::validation("OTP expired or invalid, request a new one"))
        }
    };

    if !verify_secret(&payload.otp, &otp_hash)? {
        warn!(staff_id = account.id, "wrong otp");
        return Err(ApiError::validation("Invalid OTP"));
    }

    let hash = hash_secret(&payload.password)?;
    let mut tx = state.db.begin().await?;
    if !repo::redeem_otp_tx(&mut tx, role, &account.phone, &otp_hash).await? {
        warn!(staff_id = account.id, "otp redeemed concurrently");
        return Err(ApiError::validation("OTP expired or invalid, request a new one"));
    }
    StaffAccount::update_password_tx(&mut tx, role, account.id, &hash).await?;
    tx.commit().await?;

    info!(staff_id = account.id, "password reset");
    Ok(Json(MessageResponse::new("Password reset successfully")))
}

#[instrument(skip_all)]
async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    private: PrivateCookieJar,
) -> (CookieJar, PrivateCookieJar, Json<MessageResponse>) {
    let (jar, private) =
        cookies::clear_session(jar, private, state.config.cookie_domain.as_deref());
    (jar, private, Json(MessageResponse::new("Logged out successfully")))
}

/// Decrypts the role cookie and cross-checks it against the token.
#[instrument(skip(state, private))]
async fn session(
    State(state): State<AppState>,
    session: Session,
    private: PrivateCookieJar,
) -> ApiResult<Json<SessionView>> {
    let cookie_role = cookies::role_from(&private)
        .ok_or_else(|| ApiError::Unauthorized("Session cookie missing or invalid".into()))?;
    if cookie_role != session.role {
        warn!(staff_id = session.id, "role cookie does not match token");
        return Err(ApiError::Unauthorized("Session cookie missing or invalid".into()));
    }

    let account = StaffAccount::find_by_id(&state.db, session.role, session.id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".into()))?;

    Ok(Json(SessionView {
        id: account.id,
        role: session.role,
        name: account.name,
        email: account.email,
        logo: account.avatar,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use tower::ServiceExt;

    async fn call(method: Method, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let app = auth_routes().with_state(AppState::fake());
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
    }

    #[tokio::test]
    async fn reset_rejects_short_otp_before_touching_the_database() {
        let (status, body) = call(
            Method::PUT,
            "/dietician/resetPassword",
            serde_json::json!({"phone": "9876543210", "otp": "12345", "password": "secret1"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "OTP must be exactly 6 digits");
    }

    #[tokio::test]
    async fn reset_rejects_non_numeric_otp() {
        let (status, body) = call(
            Method::PUT,
            "/admin/resetPassword",
            serde_json::json!({"phone": "9876543210", "otp": "12ab56", "password": "secret1"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "OTP must contain only numbers");
    }

    #[tokio::test]
    async fn reset_rejects_short_password() {
        let (status, body) = call(
            Method::PUT,
            "/admin/resetPassword",
            serde_json::json!({"phone": "9876543210", "otp": "123456", "password": "short"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Password must be at least 6 characters long");
    }

    #[tokio::test]
    async fn reset_requires_all_fields() {
        let (status, body) = call(
            Method::PUT,
            "/admin/resetPassword",
            serde_json::json!({"phone": "9876543210"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Phone number, OTP, and new password are required");
    }

    #[tokio::test]
    async fn request_otp_validates_phone() {
        let (status, body) = call(
            Method::POST,
            "/admin/requestOtp",
            serde_json::json!({"phone": "12345"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Phone number must be between 10-13 digits");
    }

    #[tokio::test]
    async fn login_validates_email_first() {
        let (status, body) = call(
            Method::POST,
            "/dietician/login",
            serde_json::json!({"email": "not-an-email", "password": "secret1"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Please enter a valid email address");
    }

    #[tokio::test]
    async fn session_requires_a_token() {
        let app = auth_routes().with_state(AppState::fake());
        let req = Request::builder()
            .uri("/auth/session")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn session_rejects_missing_role_cookie() {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state).sign(3, Role::Admin).unwrap();
        let app = auth_routes().with_state(state);
        let req = Request::builder()
            .uri("/auth/session")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::COOKIE, "role=not-encrypted-admin")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_expires_cookies() {
        let app = auth_routes().with_state(AppState::fake());
        let req = Request::builder()
            .method(Method::POST)
            .uri("/auth/logout")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let set_cookies: Vec<_> = resp
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        assert!(set_cookies.iter().any(|c| c.starts_with("access_token=") && c.contains("Max-Age=0")));
        assert!(set_cookies.iter().any(|c| c.starts_with("role=")));
    }
}
