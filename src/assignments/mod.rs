mod dto;
pub mod grouping;
pub mod handlers;
pub mod query;
pub mod removal;
pub mod repo;

use crate::state::AppState;
use axum::Router;
use time::Date;

use grouping::normalize_label;
use repo::Assignment;

/// Identity of one assignment row. `meal_time` is always the normalized slot key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssignmentKey {
    pub user_id: i64,
    pub meal_id: i64,
    pub date: Date,
    pub meal_time: String,
}

impl AssignmentKey {
    pub fn new(user_id: i64, meal_id: i64, date: Date, meal_time: &str) -> Self {
        Self {
            user_id,
            meal_id,
            date,
            meal_time: normalize_label(meal_time),
        }
    }

    pub fn matches(&self, rec: &Assignment) -> bool {
        rec.user_id == self.user_id
            && rec.meal_id == self.meal_id
            && rec.date == self.date
            && normalize_label(&rec.meal_time) == self.meal_time
    }
}

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::assignment_routes())
}
