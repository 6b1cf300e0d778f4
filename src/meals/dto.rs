use serde::Serialize;

use super::repo::{Meal, NewMeal, Nutrition};
use crate::error::{ApiError, ApiResult};
use crate::images::services::MultipartForm;

#[derive(Debug, Serialize)]
pub struct MealsResponse {
    pub meals: Vec<Meal>,
}

impl NewMeal {
    /// Reads the text parts of the create-meal form. The image is checked separately.
    pub fn from_form(form: &MultipartForm) -> ApiResult<NewMeal> {
        let (Some(name), Some(description), Some(category), Some(calories)) = (
            form.text("mealName"),
            form.text("description"),
            form.text("category"),
            form.text("calories"),
        ) else {
            return Err(ApiError::validation("Missing some values"));
        };

        let calories = calories
            .parse::<i32>()
            .ok()
            .filter(|c| *c >= 0)
            .ok_or_else(|| ApiError::validation("Calories must be a whole number"))?;

        let ingredients = json_list::<String>(form, "ingredients")?
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let steps = json_list::<String>(form, "steps")?
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let nutritions = json_list::<Nutrition>(form, "nutritions")?
            .into_iter()
            .filter(|n| !n.kind.trim().is_empty())
            .collect();

        Ok(NewMeal {
            name: name.to_string(),
            description: description.to_string(),
            category: category.to_string(),
            calories,
            nutritions,
            ingredients,
            steps,
        })
    }
}

fn json_list<T: serde::de::DeserializeOwned>(form: &MultipartForm, name: &str) -> ApiResult<Vec<T>> {
    match form.text(name) {
        None => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|_| ApiError::validation(format!("{name} must be a JSON array"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Vec<(&'static str, &'static str)> {
        vec![
            ("mealName", "Poha"),
            ("description", "Flattened rice"),
            ("category", "Breakfast"),
            ("calories", "250"),
        ]
    }

    #[test]
    fn parses_lists_and_drops_blank_entries() {
        let mut fields = base();
        fields.push(("ingredients", r#"["poha", " ", "peanuts"]"#));
        fields.push(("steps", r#"["rinse", "cook"]"#));
        fields.push(("nutritions", r#"[{"type":"protein","value":"6"},{"type":"","value":""}]"#));
        let meal = NewMeal::from_form(&MultipartForm::from_parts(&fields)).unwrap();
        assert_eq!(meal.name, "Poha");
        assert_eq!(meal.calories, 250);
        assert_eq!(meal.ingredients, vec!["poha", "peanuts"]);
        assert_eq!(meal.steps.len(), 2);
        assert_eq!(meal.nutritions.len(), 1);
        assert_eq!(meal.nutritions[0].kind, "protein");
    }

    #[test]
    fn missing_required_field() {
        let fields: Vec<_> = base().into_iter().filter(|(k, _)| *k != "category").collect();
        let err = NewMeal::from_form(&MultipartForm::from_parts(&fields)).unwrap_err();
        assert_eq!(err.to_string(), "Missing some values");
    }

    #[test]
    fn bad_calories_and_bad_json() {
        let mut fields = base();
        fields[3] = ("calories", "lots");
        assert!(NewMeal::from_form(&MultipartForm::from_parts(&fields)).is_err());

        let mut fields = base();
        fields.push(("steps", "rinse, cook"));
        let err = NewMeal::from_form(&MultipartForm::from_parts(&fields)).unwrap_err();
        assert_eq!(err.to_string(), "steps must be a JSON array");
    }
}
