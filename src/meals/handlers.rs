use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{delete, get, post},
    Router,
};
use tracing::{info, instrument};

use super::dto::MealsResponse;
use super::repo::{Meal, NewMeal};
use crate::{
    auth::{MessageResponse, Session},
    error::{is_foreign_key_violation, ApiError, ApiResult},
    extract::{Json, Multipart, Path},
    images::services::{check_image, remove_image, upload_image, MultipartForm},
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/getallmeal", get(list_meals))
        .route("/meal/:id", get(get_meal))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/meal", post(create_meal))
        .route("/deletemealbyid/:id", delete(delete_meal))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

#[instrument(skip(state))]
pub async fn list_meals(
    State(state): State<AppState>,
    _session: Session,
) -> ApiResult<Json<MealsResponse>> {
    let meals = Meal::list(&state.db).await?;
    Ok(Json(MealsResponse { meals }))
}

#[instrument(skip(state))]
pub async fn get_meal(
    State(state): State<AppState>,
    _session: Session,
    Path(id): Path<i64>,
) -> ApiResult<Json<Meal>> {
    Meal::find(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Meal not found"))
}

/// POST /meal (multipart): text fields plus a required `image` part.
#[instrument(skip(state, mp), fields(staff_id = session.id))]
pub async fn create_meal(
    State(state): State<AppState>,
    session: Session,
    mp: Multipart,
) -> ApiResult<(StatusCode, HeaderMap, Json<Meal>)> {
    let mut form = MultipartForm::read(mp).await?;
    let new_meal = NewMeal::from_form(&form)?;
    let image = form
        .take_file("image")
        .ok_or_else(|| ApiError::validation("Missing some values"))?;
    check_image(&image, state.config.storage.max_image_bytes)?;

    let url = upload_image(&state, "meals", image).await?;
    let meal = match Meal::create(&state.db, &new_meal, &url).await {
        Ok(m) => m,
        Err(e) => {
            remove_image(&state, &url).await;
            return Err(e.into());
        }
    };

    let mut headers = HeaderMap::new();
    if let Ok(loc) = HeaderValue::from_str(&format!("/api/v1/meal/{}", meal.id)) {
        headers.insert(header::LOCATION, loc);
    }
    info!(meal_id = meal.id, "meal created");
    Ok((StatusCode::CREATED, headers, Json(meal)))
}

#[instrument(skip(state))]
pub async fn delete_meal(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    session.require_admin()?;

    let deleted = match Meal::delete(&state.db, id).await {
        Ok(d) => d,
        Err(e) if is_foreign_key_violation(&e) => {
            return Err(ApiError::Conflict(
                "Meal is assigned to users, unassign it first".into(),
            ))
        }
        Err(e) => return Err(e.into()),
    };
    let img_url = deleted.ok_or_else(|| ApiError::not_found("Meal not found"))?;
    if let Some(url) = img_url {
        remove_image(&state, &url).await;
    }

    info!(meal_id = id, "meal deleted");
    Ok(Json(MessageResponse::new("Meal deleted successfully")))
}
