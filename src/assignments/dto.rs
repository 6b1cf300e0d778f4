use serde::{Deserialize, Deserializer, Serialize};
use time::{macros::format_description, Date};

use super::{
    grouping::{MealBoard, MealSlot},
    query::{Links, PageInfo},
    repo::{Assignment, MealStats},
    AssignmentKey,
};
use crate::error::{ApiError, ApiResult};

const MISSING_KEY: &str = "Missing values please try again or refresh the page";

/// Body of `POST /assignmeal`. Ids may arrive as numbers or numeric strings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssignRequest {
    #[serde(deserialize_with = "loose_int")]
    pub user_id: Option<i64>,
    #[serde(deserialize_with = "loose_int")]
    pub meal_id: Option<i64>,
    pub date: Option<String>,
    pub meal_time: Option<String>,
    #[serde(deserialize_with = "loose_int")]
    pub quantity: Option<i64>,
}

impl AssignRequest {
    pub fn validate(self) -> ApiResult<(AssignmentKey, i32)> {
        let (Some(user_id), Some(meal_id), Some(date), Some(meal_time), Some(quantity)) = (
            self.user_id,
            self.meal_id,
            non_blank(self.date),
            non_blank(self.meal_time),
            self.quantity,
        ) else {
            return Err(ApiError::validation("Please fill in all required fields"));
        };

        let slot = MealSlot::parse(&meal_time)
            .ok_or_else(|| ApiError::validation("Please select a valid meal time"))?;
        let quantity = i32::try_from(quantity)
            .ok()
            .filter(|q| *q >= 1)
            .ok_or_else(|| ApiError::validation("Quantity must be at least 1"))?;
        let date = parse_date(&date)?;

        Ok((AssignmentKey::new(user_id, meal_id, date, slot.key()), quantity))
    }
}

/// Body of `PUT /unassignmeal`: the four fields of the row to remove.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UnassignRequest {
    #[serde(deserialize_with = "loose_int")]
    pub user_id: Option<i64>,
    #[serde(deserialize_with = "loose_int")]
    pub meal_id: Option<i64>,
    pub date: Option<String>,
    pub meal_time: Option<String>,
}

impl UnassignRequest {
    pub fn into_key(self) -> ApiResult<AssignmentKey> {
        let (Some(user_id), Some(meal_id), Some(date), Some(meal_time)) = (
            self.user_id,
            self.meal_id,
            non_blank(self.date),
            non_blank(self.meal_time),
        ) else {
            return Err(ApiError::validation(MISSING_KEY));
        };
        Ok(AssignmentKey::new(user_id, meal_id, parse_date(&date)?, &meal_time))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserMealsQuery {
    pub user_id: Option<String>,
}

impl UserMealsQuery {
    pub fn user_id(&self) -> ApiResult<i64> {
        self.user_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::validation("userId is required"))?
            .parse()
            .map_err(|_| ApiError::validation("userId must be a number"))
    }
}

#[derive(Debug, Serialize)]
pub struct UserMealsResponse {
    pub data: Vec<Assignment>,
    pub grouped: MealBoard,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub data: Vec<Assignment>,
    pub stats: MealStats,
    pub pagination: PageInfo,
    pub links: Links,
}

/// `2024-01-31`, or the date part of an ISO timestamp.
fn parse_date(raw: &str) -> ApiResult<Date> {
    let day = raw.trim().get(..10).unwrap_or(raw);
    Date::parse(day, format_description!("[year]-[month]-[day]"))
        .map_err(|_| ApiError::validation("Please select a valid date"))
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn loose_int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        N(i64),
        S(String),
    }
    Ok(match Option::<Raw>::deserialize(d)? {
        Some(Raw::N(n)) => Some(n),
        Some(Raw::S(s)) => s.trim().parse().ok(),
        None => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::date;

    #[test]
    fn unassign_needs_all_four_fields() {
        for body in [
            json!({}),
            json!({"userId": 1, "mealId": 5, "date": "2024-01-01"}),
            json!({"userId": 1, "mealId": 5, "date": "", "mealTime": "Lunch"}),
            json!({"userId": "", "mealId": 5, "date": "2024-01-01", "mealTime": "Lunch"}),
            json!({"userId": 1, "mealId": 5, "date": "2024-01-01", "mealTime": "   "}),
        ] {
            let req: UnassignRequest = serde_json::from_value(body).unwrap();
            assert_eq!(req.into_key().unwrap_err().to_string(), MISSING_KEY);
        }
    }

    #[test]
    fn unassign_key_is_normalized() {
        let req: UnassignRequest = serde_json::from_value(json!({
            "userId": "1", "mealId": 5, "date": "2024-01-01T00:00:00.000Z", "mealTime": "Evening  snacks"
        }))
        .unwrap();
        let key = req.into_key().unwrap();
        assert_eq!(key, AssignmentKey::new(1, 5, date!(2024 - 01 - 01), "EVENING_SNACKS"));
    }

    #[test]
    fn assign_validation() {
        let ok: AssignRequest = serde_json::from_value(json!({
            "userId": 2, "mealId": 9, "date": "2024-02-03", "mealTime": "bed time", "quantity": 2
        }))
        .unwrap();
        let (key, qty) = ok.validate().unwrap();
        assert_eq!(key.meal_time, "BED_TIME");
        assert_eq!(qty, 2);

        let missing: AssignRequest =
            serde_json::from_value(json!({"userId": 2, "mealId": 9, "date": "2024-02-03"})).unwrap();
        assert_eq!(
            missing.validate().unwrap_err().to_string(),
            "Please fill in all required fields"
        );

        let bad_slot: AssignRequest = serde_json::from_value(json!({
            "userId": 2, "mealId": 9, "date": "2024-02-03", "mealTime": "brunch", "quantity": 1
        }))
        .unwrap();
        assert_eq!(
            bad_slot.validate().unwrap_err().to_string(),
            "Please select a valid meal time"
        );

        let zero: AssignRequest = serde_json::from_value(json!({
            "userId": 2, "mealId": 9, "date": "2024-02-03", "mealTime": "Lunch", "quantity": 0
        }))
        .unwrap();
        assert_eq!(zero.validate().unwrap_err().to_string(), "Quantity must be at least 1");
    }

    #[test]
    fn user_meals_query_requires_numeric_id() {
        assert!(UserMealsQuery { user_id: None }.user_id().is_err());
        assert!(UserMealsQuery { user_id: Some("x".into()) }.user_id().is_err());
        assert_eq!(UserMealsQuery { user_id: Some(" 12 ".into()) }.user_id().unwrap(), 12);
    }
}
