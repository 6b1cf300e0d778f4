use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    routing::{delete, get, post},
    Router,
};
use serde::Serialize;
use tracing::{info, instrument};

use super::repo::Banner;
use crate::{
    auth::{MessageResponse, Session},
    error::{ApiError, ApiResult},
    extract::{Json, Multipart, Path},
    images::services::{check_image, remove_image, upload_image, MultipartForm},
    state::AppState,
};

pub fn banner_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/admin/addBanner",
            post(add_banner).layer(DefaultBodyLimit::max(20 * 1024 * 1024)),
        )
        .route("/banners", get(list_banners))
        .route("/admin/banner/:id", delete(delete_banner))
}

#[derive(Debug, Serialize)]
pub struct BannersResponse {
    pub banners: Vec<Banner>,
}

#[instrument(skip(state, mp))]
pub async fn add_banner(
    State(state): State<AppState>,
    session: Session,
    mp: Multipart,
) -> ApiResult<(StatusCode, Json<Banner>)> {
    session.require_admin()?;

    let mut form = MultipartForm::read(mp).await?;
    let name = form
        .text("name")
        .map(str::to_string)
        .ok_or_else(|| ApiError::validation("Please set the name"))?;
    let image = form
        .take_file("image")
        .ok_or_else(|| ApiError::validation("Please select an image"))?;
    check_image(&image, state.config.storage.max_image_bytes)?;

    let url = upload_image(&state, "banners", image).await?;
    let banner = match Banner::create(&state.db, &name, &url).await {
        Ok(b) => b,
        Err(e) => {
            remove_image(&state, &url).await;
            return Err(e.into());
        }
    };

    info!(banner_id = banner.id, "banner added");
    Ok((StatusCode::CREATED, Json(banner)))
}

#[instrument(skip(state))]
pub async fn list_banners(
    State(state): State<AppState>,
    _session: Session,
) -> ApiResult<Json<BannersResponse>> {
    let banners = Banner::list(&state.db).await?;
    Ok(Json(BannersResponse { banners }))
}

#[instrument(skip(state))]
pub async fn delete_banner(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    session.require_admin()?;
    let removed = Banner::delete(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Banner not found"))?;
    remove_image(&state, &removed.img_url).await;
    info!(banner_id = id, "banner deleted");
    Ok(Json(MessageResponse::new("Banner deleted successfully")))
}
