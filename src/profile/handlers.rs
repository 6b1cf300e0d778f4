use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, put},
    Router,
};
use serde::Serialize;
use tracing::{info, instrument};

use crate::{
    auth::{claims::Role, repo::StaffAccount, validate, Session},
    error::{is_unique_violation, ApiError, ApiResult},
    extract::{Json, Multipart},
    images::services::{check_image, remove_image, upload_image, MultipartForm},
    state::AppState,
};

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/me", get(admin_me))
        .route("/dietician/me", get(dietician_me))
        .route("/admin/profile", put(update_admin_profile))
        .route("/dietician/profile", put(update_dietician_profile))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024))
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub message: String,
    pub profile: StaffAccount,
}

fn require_role(session: &Session, role: Role) -> ApiResult<()> {
    if session.role == role {
        Ok(())
    } else {
        Err(ApiError::forbidden())
    }
}

async fn admin_me(state: State<AppState>, session: Session) -> ApiResult<Json<StaffAccount>> {
    me(Role::Admin, state, session).await
}

async fn dietician_me(state: State<AppState>, session: Session) -> ApiResult<Json<StaffAccount>> {
    me(Role::Dietician, state, session).await
}

#[instrument(skip(state))]
async fn me(
    role: Role,
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<Json<StaffAccount>> {
    require_role(&session, role)?;
    StaffAccount::find_by_id(&state.db, role, session.id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Profile not found"))
}

async fn update_admin_profile(
    state: State<AppState>,
    session: Session,
    mp: Multipart,
) -> ApiResult<Json<ProfileResponse>> {
    update_profile(Role::Admin, state, session, mp).await
}

async fn update_dietician_profile(
    state: State<AppState>,
    session: Session,
    mp: Multipart,
) -> ApiResult<Json<ProfileResponse>> {
    update_profile(Role::Dietician, state, session, mp).await
}

/// Optional `name`, `phone` and `image` parts; at least one must be present.
#[instrument(skip(state, mp))]
async fn update_profile(
    role: Role,
    State(state): State<AppState>,
    session: Session,
    mp: Multipart,
) -> ApiResult<Json<ProfileResponse>> {
    require_role(&session, role)?;

    let mut form = MultipartForm::read(mp).await?;
    let name = form.text("name").map(str::to_string);
    let phone = match form.text("phone") {
        Some(p) if role == Role::Dietician => Some(validate::indian_mobile(p)?),
        Some(p) => {
            validate::phone(p)?;
            Some(p.to_string())
        }
        None => None,
    };
    let image = form.take_file("image");
    if name.is_none() && phone.is_none() && image.is_none() {
        return Err(ApiError::validation("Please update at least one field"));
    }
    if let Some(img) = &image {
        check_image(img, state.config.storage.max_image_bytes)?;
    }

    let current = StaffAccount::find_by_id(&state.db, role, session.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;

    let image_url = match image {
        Some(img) => Some(upload_image(&state, "profiles", img).await?),
        None => None,
    };

    let updated = StaffAccount::update_profile(
        &state.db,
        role,
        session.id,
        name.as_deref(),
        phone.as_deref(),
        image_url.as_deref(),
    )
    .await;
    let profile = match updated {
        Ok(Some(p)) => p,
        Ok(None) => return Err(ApiError::not_found("Profile not found")),
        Err(e) => {
            if let Some(url) = &image_url {
                remove_image(&state, url).await;
            }
            if is_unique_violation(&e) {
                return Err(ApiError::Conflict("This phone number is already in use".into()));
            }
            return Err(e.into());
        }
    };

    // the replaced picture is no longer referenced
    if image_url.is_some() {
        if let Some(old) = &current.avatar {
            remove_image(&state, old).await;
        }
    }

    info!(staff_id = session.id, %role, "profile updated");
    Ok(Json(ProfileResponse {
        message: "Profile updated successfully".into(),
        profile,
    }))
}
