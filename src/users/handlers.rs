use axum::{extract::State, routing::get, Router};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::repo::{User, UserFilter};
use crate::{
    auth::Session,
    error::{ApiError, ApiResult},
    extract::{Json, Query},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/getallusers", get(list_users))
        .route("/getnewusers", get(new_users))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsersQuery {
    pub search: Option<String>,
    pub gender: Option<String>,
    pub subscription: Option<String>,
    pub from_zoho: Option<String>,
}

impl UsersQuery {
    pub fn into_filter(self) -> ApiResult<UserFilter> {
        let from_zoho = match trimmed(self.from_zoho).map(|s| s.to_lowercase()).as_deref() {
            None | Some("all") => None,
            Some("true") | Some("yes") | Some("1") => Some(true),
            Some("false") | Some("no") | Some("0") => Some(false),
            Some(_) => return Err(ApiError::validation("fromZoho must be true or false")),
        };
        Ok(UserFilter {
            search: trimmed(self.search),
            gender: trimmed(self.gender).filter(|g| !g.eq_ignore_ascii_case("all")),
            subscription: trimmed(self.subscription).filter(|s| !s.eq_ignore_ascii_case("all")),
            from_zoho,
        })
    }
}

fn trimmed(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<User>,
}

/// Admins see everyone, dieticians only their own clients.
#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    session: Session,
    Query(q): Query<UsersQuery>,
) -> ApiResult<Json<UsersResponse>> {
    let filter = q.into_filter()?;
    let users = User::search(&state.db, session.dietician_scope(), &filter).await?;
    Ok(Json(UsersResponse { users }))
}

/// Users nobody looks after yet.
#[instrument(skip(state))]
pub async fn new_users(
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<Json<UsersResponse>> {
    session.require_admin()?;
    let users = User::without_dietician(&state.db).await?;
    Ok(Json(UsersResponse { users }))
}
