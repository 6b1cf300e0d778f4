use crate::state::AppState;
use axum::Router;

pub mod claims;
pub mod cookies;
mod dto;
pub mod handlers;
pub mod jwt;
pub mod otp;
pub mod password;
pub mod repo;
pub mod session;
pub mod validate;

pub use dto::MessageResponse;
pub use session::Session;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
