use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{types::Json, FromRow, PgPool};
use time::OffsetDateTime;

/// One `{type, value}` line of a meal's nutrition breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nutrition {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub category: String,
    pub calories: i32,
    pub nutritions: Json<Vec<Nutrition>>,
    pub ingredients: Json<Vec<String>>,
    pub steps: Json<Vec<String>>,
    pub img_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMeal {
    pub name: String,
    pub description: String,
    pub category: String,
    pub calories: i32,
    pub nutritions: Vec<Nutrition>,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
}

const MEAL_COLUMNS: &str = "id, name, description, category, calories, nutritions, ingredients, steps, img_url, created_at";

impl Meal {
    pub async fn create(db: &PgPool, m: &NewMeal, img_url: &str) -> anyhow::Result<Meal> {
        let sql = format!(
            r#"INSERT INTO meals (name, description, category, calories, nutritions, ingredients, steps, img_url)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING {MEAL_COLUMNS}"#
        );
        sqlx::query_as::<_, Meal>(&sql)
            .bind(&m.name)
            .bind(&m.description)
            .bind(&m.category)
            .bind(m.calories)
            .bind(Json(&m.nutritions))
            .bind(Json(&m.ingredients))
            .bind(Json(&m.steps))
            .bind(img_url)
            .fetch_one(db)
            .await
            .context("insert meal")
    }

    pub async fn list(db: &PgPool) -> anyhow::Result<Vec<Meal>> {
        let sql = format!("SELECT {MEAL_COLUMNS} FROM meals ORDER BY created_at DESC, id DESC");
        sqlx::query_as::<_, Meal>(&sql)
            .fetch_all(db)
            .await
            .context("list meals")
    }

    pub async fn find(db: &PgPool, id: i64) -> anyhow::Result<Option<Meal>> {
        let sql = format!("SELECT {MEAL_COLUMNS} FROM meals WHERE id = $1");
        sqlx::query_as::<_, Meal>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await
            .context("get meal")
    }

    /// Returns the deleted row's image URL, `None` if no such meal.
    pub async fn delete(db: &PgPool, id: i64) -> anyhow::Result<Option<Option<String>>> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("DELETE FROM meals WHERE id = $1 RETURNING img_url")
                .bind(id)
                .fetch_optional(db)
                .await
                .context("delete meal")?;
        Ok(row.map(|(url,)| url))
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        S(String),
        N(serde_json::Number),
    }
    Ok(match Raw::deserialize(d)? {
        Raw::S(s) => s,
        Raw::N(n) => n.to_string(),
    })
}
