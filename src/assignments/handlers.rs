use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use super::{
    dto::{AssignRequest, StatsResponse, UnassignRequest, UserMealsQuery, UserMealsResponse},
    grouping::group_by_slot,
    query::{Links, PageInfo, StatsFilterState, StatsQuery},
    removal::remove_by_key,
    repo::{Assignment, MealStats},
};
use crate::{
    auth::Session,
    error::{is_unique_violation, ApiError, ApiResult},
    extract::{Json, Query},
    meals::repo::Meal,
    state::AppState,
    users::repo::User,
};

pub fn assignment_routes() -> Router<AppState> {
    Router::new()
        .route("/assignmeal", post(assign_meal))
        .route("/unassignmeal", put(unassign_meal))
        .route("/getusermeals", get(user_meals))
        .route("/all-meal-stats", get(meal_stats))
}

/// Loads the user and checks the caller may manage them.
async fn user_in_scope(state: &AppState, session: &Session, user_id: i64) -> ApiResult<User> {
    let user = User::find(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    if let Some(own) = session.dietician_scope() {
        if user.dietician_id != Some(own) {
            warn!(staff_id = session.id, user_id, "user is not a client of this dietician");
            return Err(ApiError::forbidden());
        }
    }
    Ok(user)
}

#[instrument(skip(state, payload), fields(staff_id = session.id))]
pub async fn assign_meal(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<AssignRequest>,
) -> ApiResult<(StatusCode, Json<Assignment>)> {
    let (key, quantity) = payload.validate()?;

    Meal::find(&state.db, key.meal_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Selected meal not found"))?;
    user_in_scope(&state, &session, key.user_id).await?;

    let created = match Assignment::insert(&state.db, &key, quantity).await {
        Ok(a) => a,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::Conflict(
                "This meal is already assigned for that date and time".into(),
            ))
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = key.user_id, meal_id = key.meal_id, date = %key.date, meal_time = %key.meal_time, "meal assigned");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Removes one assignment and answers with the user's remaining board.
#[instrument(skip(state, payload), fields(staff_id = session.id))]
pub async fn unassign_meal(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<UnassignRequest>,
) -> ApiResult<Json<UserMealsResponse>> {
    let key = payload.into_key()?;

    let _guard = state.unassigning.try_acquire(key.clone()).ok_or_else(|| {
        ApiError::Conflict("This meal is already being removed, please wait".into())
    })?;

    user_in_scope(&state, &session, key.user_id).await?;
    let loaded = Assignment::for_user(&state.db, key.user_id).await?;

    if !Assignment::delete(&state.db, &key).await? {
        return Err(ApiError::not_found("Assigned meal not found"));
    }

    let data = remove_by_key(loaded, &key);
    let grouped = group_by_slot(&data);
    info!(user_id = key.user_id, meal_id = key.meal_id, date = %key.date, meal_time = %key.meal_time, "meal unassigned");
    Ok(Json(UserMealsResponse { data, grouped }))
}

#[instrument(skip(state))]
pub async fn user_meals(
    State(state): State<AppState>,
    session: Session,
    Query(q): Query<UserMealsQuery>,
) -> ApiResult<Json<UserMealsResponse>> {
    let user_id = q.user_id()?;
    user_in_scope(&state, &session, user_id).await?;

    let data = Assignment::for_user(&state.db, user_id).await?;
    let grouped = group_by_slot(&data);
    Ok(Json(UserMealsResponse { data, grouped }))
}

/// Paginated, filtered assignment list with counts over the whole filtered set.
#[instrument(skip(state))]
pub async fn meal_stats(
    State(state): State<AppState>,
    session: Session,
    Query(q): Query<StatsQuery>,
) -> ApiResult<Json<StatsResponse>> {
    let mut filters = StatsFilterState::from_query(q)?;
    if let Some(own) = session.dietician_scope() {
        filters.restrict_to_dietician(own);
    }

    let today = OffsetDateTime::now_utc().date();
    let (data, total) = Assignment::page(&state.db, &filters, today).await?;
    let stats = MealStats::compute(&state.db, &filters, today).await?;

    let pagination = PageInfo::new(filters.page(), filters.per_page(), total);
    let links = Links::new(&filters, &pagination);
    Ok(Json(StatsResponse {
        data,
        stats,
        pagination,
        links,
    }))
}
