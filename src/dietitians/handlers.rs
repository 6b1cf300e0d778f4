use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::{
        AssignClientsRequest, AssignClientsResponse, ClientList, ClientsQuery, ClientsResponse,
        DieticianOptionsResponse, DieticiansResponse, NewDietician, RegisterResponse, UpdateDietician, UpdateResponse,
    },
    repo::Dietician,
};
use crate::{
    auth::{password::hash_secret, MessageResponse, Session},
    error::{is_unique_violation, ApiError, ApiResult},
    extract::{Json, Multipart, Path, Query},
    images::services::{check_image, remove_image, upload_image, MultipartForm},
    state::AppState,
    users::repo::User,
};

pub fn dietician_routes() -> Router<AppState> {
    Router::new()
        .route("/dietician/getall", get(list_dieticians))
        .route("/dietician/me/:id", get(get_dietician))
        .route(
            "/dietician/register",
            post(register_dietician).layer(DefaultBodyLimit::max(20 * 1024 * 1024)),
        )
        .route("/updatedietbyid/:id", put(update_dietician))
        .route("/deletedietbyid/:id", delete(delete_dietician))
        .route("/assignmanyclients", post(assign_clients))
        .route("/getclients", get(list_clients))
        .route("/getdiet", get(dietician_options))
}

#[instrument(skip(state))]
pub async fn list_dieticians(
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<Json<DieticiansResponse>> {
    session.require_admin()?;
    let dietician = Dietician::list(&state.db).await?;
    Ok(Json(DieticiansResponse { dietician }))
}

/// Feeds the dietician filter of the stats view.
#[instrument(skip(state))]
pub async fn dietician_options(
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<Json<DieticianOptionsResponse>> {
    let dieticians = Dietician::options(&state.db, session.dietician_scope()).await?;
    Ok(Json(DieticianOptionsResponse { dieticians }))
}

#[instrument(skip(state))]
pub async fn get_dietician(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> ApiResult<Json<Dietician>> {
    session.require_self_or_admin(id)?;
    Dietician::find(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Dietician not found"))
}

/// Creates the account, then the chat identity. A chat failure leaves the
/// account in place and is reported as a warning.
#[instrument(skip(state, mp), fields(staff_id = session.id))]
pub async fn register_dietician(
    State(state): State<AppState>,
    session: Session,
    mp: Multipart,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    session.require_admin()?;

    let mut form = MultipartForm::read(mp).await?;
    let new = NewDietician::from_form(&form)?;
    let image = form.take_file("profileImage");
    if let Some(img) = &image {
        check_image(img, state.config.storage.max_image_bytes)?;
    }

    let password_hash = hash_secret(&new.password)?;
    let image_url = match image {
        Some(img) => Some(upload_image(&state, "dieticians", img).await?),
        None => None,
    };

    let dietician = match Dietician::create(&state.db, &new, &password_hash, image_url.as_deref()).await {
        Ok(d) => d,
        Err(e) => {
            if let Some(url) = &image_url {
                remove_image(&state, url).await;
            }
            if is_unique_violation(&e) {
                return Err(ApiError::Conflict(
                    "A dietician with this email, username or phone already exists".into(),
                ));
            }
            return Err(e.into());
        }
    };
    info!(dietician_id = dietician.id, "dietician registered");

    let warning = match state
        .chat
        .create_user(&dietician.id.to_string(), &dietician.username)
        .await
    {
        Ok(()) => None,
        Err(e) => {
            warn!(error = ?e, dietician_id = dietician.id, "chat user provisioning failed");
            Some("Dietician registered but failed to create chat user".to_string())
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Dietician registered successfully".into(),
            dietician,
            warning,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_dietician(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateDietician>,
) -> ApiResult<Json<UpdateResponse>> {
    session.require_admin()?;
    let update = payload.validated()?;

    let dietician = match Dietician::update(&state.db, id, &update).await {
        Ok(Some(d)) => d,
        Ok(None) => return Err(ApiError::not_found("Dietician not found")),
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::Conflict(
                "Another dietician already uses this email or phone".into(),
            ))
        }
        Err(e) => return Err(e.into()),
    };

    info!(dietician_id = id, "dietician updated");
    Ok(Json(UpdateResponse {
        message: "Dietician updated successfully".into(),
        dietician,
    }))
}

#[instrument(skip(state))]
pub async fn delete_dietician(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    session.require_admin()?;
    let removed = Dietician::delete(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Dietician not found"))?;
    if let Some(url) = &removed.profile_image {
        remove_image(&state, url).await;
    }
    info!(dietician_id = id, "dietician deleted");
    Ok(Json(MessageResponse::new("Dietician deleted successfully")))
}

#[instrument(skip(state, payload))]
pub async fn assign_clients(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<AssignClientsRequest>,
) -> ApiResult<Json<AssignClientsResponse>> {
    session.require_admin()?;
    if payload.user_ids.is_empty() {
        return Err(ApiError::validation("Please select at least one client"));
    }
    let dietician_id = payload
        .dietician_id
        .ok_or_else(|| ApiError::validation("Please select a dietician"))?;
    if !Dietician::exists(&state.db, dietician_id).await? {
        return Err(ApiError::not_found("Dietician not found"));
    }

    let updated = User::assign_to_dietician(&state.db, &payload.user_ids, dietician_id).await?;
    info!(dietician_id, updated, "clients assigned");
    Ok(Json(AssignClientsResponse {
        message: "Clients assigned successfully".into(),
        updated,
    }))
}

/// A dietician without `dieticianId` gets its own clients.
#[instrument(skip(state))]
pub async fn list_clients(
    State(state): State<AppState>,
    session: Session,
    Query(q): Query<ClientsQuery>,
) -> ApiResult<Json<ClientsResponse>> {
    let dietician_id = q
        .dietician_id
        .or(session.dietician_scope())
        .ok_or_else(|| ApiError::validation("dieticianId is required"))?;
    session.require_self_or_admin(dietician_id)?;

    let user = User::clients_of(&state.db, dietician_id).await?;
    Ok(Json(ClientsResponse {
        clients: ClientList { user },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{claims::Role, jwt::JwtKeys};
    use axum::{
        body::{to_bytes, Body},
        extract::FromRef,
        http::{header, Method, Request},
    };
    use tower::ServiceExt;

    async fn call(
        role: Role,
        staff_id: i64,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state).sign(staff_id, role).unwrap();
        let app = dietician_routes().with_state(state);
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"));
        let body = match body {
            Some(json) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let resp = app.oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
    }

    #[tokio::test]
    async fn listing_is_admin_only() {
        let (status, _) = call(Role::Dietician, 3, Method::GET, "/dietician/getall", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn dietician_cannot_read_another_dietician() {
        let (status, _) = call(Role::Dietician, 3, Method::GET, "/dietician/me/4", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = call(Role::Dietician, 3, Method::GET, "/getclients?dieticianId=4", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn assign_clients_needs_a_selection() {
        let (status, body) = call(
            Role::Admin,
            1,
            Method::POST,
            "/assignmanyclients",
            Some(serde_json::json!({"userIds": [], "dieticianId": 2})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Please select at least one client");
    }

    #[tokio::test]
    async fn update_needs_a_field() {
        let (status, body) = call(
            Role::Admin,
            1,
            Method::PUT,
            "/updatedietbyid/2",
            Some(serde_json::json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Please update at least one field");
    }

    #[tokio::test]
    async fn admin_clients_listing_needs_an_id() {
        let (status, body) = call(Role::Admin, 1, Method::GET, "/getclients", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "dieticianId is required");
    }

    #[tokio::test]
    async fn dietician_picker_needs_a_session() {
        let resp = dietician_routes()
            .with_state(AppState::fake())
            .oneshot(Request::builder().uri("/getdiet").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["message"].is_string());
    }

    #[test]
    fn dietician_picker_body_uses_plural_key() {
        let body = DieticianOptionsResponse {
            dieticians: vec![crate::dietitians::repo::DieticianOption {
                id: 3,
                name: "Asha Rao".into(),
            }],
        };
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            serde_json::json!({"dieticians": [{"id": 3, "name": "Asha Rao"}]})
        );
    }
}
