use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    pub id: i64,
    pub name: String,
    pub img_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Banner {
    pub async fn create(db: &PgPool, name: &str, img_url: &str) -> anyhow::Result<Banner> {
        sqlx::query_as::<_, Banner>(
            "INSERT INTO banners (name, img_url) VALUES ($1, $2) RETURNING id, name, img_url, created_at",
        )
        .bind(name)
        .bind(img_url)
        .fetch_one(db)
        .await
        .context("insert banner")
    }

    pub async fn list(db: &PgPool) -> anyhow::Result<Vec<Banner>> {
        sqlx::query_as::<_, Banner>(
            "SELECT id, name, img_url, created_at FROM banners ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(db)
        .await
        .context("list banners")
    }

    pub async fn delete(db: &PgPool, id: i64) -> anyhow::Result<Option<Banner>> {
        sqlx::query_as::<_, Banner>(
            "DELETE FROM banners WHERE id = $1 RETURNING id, name, img_url, created_at",
        )
        .bind(id)
        .fetch_optional(db)
        .await
        .context("delete banner")
    }
}
