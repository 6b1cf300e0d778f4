use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;

use super::dto::{NewDietician, UpdateDietician};

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Dietician {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub qualification: String,
    pub address: String,
    pub aadhar: String,
    pub pan: String,
    pub phone: String,
    pub email: String,
    pub work_exp: String,
    pub certificate: String,
    pub other_doc: String,
    pub profile_image: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Entry of the dietician picker shown above the stats table.
#[derive(Debug, Clone, Serialize, FromRow, PartialEq, Eq)]
pub struct DieticianOption {
    pub id: i64,
    pub name: String,
}

fn options_query(scope: Option<i64>) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT id, name FROM dieticians WHERE TRUE");
    if let Some(own) = scope {
        qb.push(" AND id = ").push_bind(own);
    }
    qb.push(" ORDER BY name, id");
    qb
}

const DIETICIAN_COLUMNS: &str = "id, username, name, qualification, address, aadhar, pan, \
     phone, email, work_exp, certificate, other_doc, profile_image, created_at";

impl Dietician {
    pub async fn list(db: &PgPool) -> anyhow::Result<Vec<Dietician>> {
        let sql = format!("SELECT {DIETICIAN_COLUMNS} FROM dieticians ORDER BY created_at DESC, id DESC");
        sqlx::query_as::<_, Dietician>(&sql)
            .fetch_all(db)
            .await
            .context("list dieticians")
    }

    pub async fn find(db: &PgPool, id: i64) -> anyhow::Result<Option<Dietician>> {
        let sql = format!("SELECT {DIETICIAN_COLUMNS} FROM dieticians WHERE id = $1");
        sqlx::query_as::<_, Dietician>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await
            .context("find dietician")
    }

    pub async fn create(
        db: &PgPool,
        d: &NewDietician,
        password_hash: &str,
        profile_image: Option<&str>,
    ) -> anyhow::Result<Dietician> {
        let sql = format!(
            r#"INSERT INTO dieticians (username, password_hash, name, qualification, address,
                                      aadhar, pan, phone, email, work_exp, certificate,
                                      other_doc, profile_image)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
               RETURNING {DIETICIAN_COLUMNS}"#
        );
        sqlx::query_as::<_, Dietician>(&sql)
            .bind(&d.username)
            .bind(password_hash)
            .bind(&d.name)
            .bind(&d.qualification)
            .bind(&d.address)
            .bind(&d.aadhar)
            .bind(&d.pan)
            .bind(&d.phone)
            .bind(&d.email)
            .bind(&d.work_exp)
            .bind(&d.certificate)
            .bind(&d.other_doc)
            .bind(profile_image)
            .fetch_one(db)
            .await
            .context("insert dietician")
    }

    /// Only the fields present in `u` change.
    pub async fn update(
        db: &PgPool,
        id: i64,
        u: &UpdateDietician,
    ) -> anyhow::Result<Option<Dietician>> {
        let sql = format!(
            r#"UPDATE dieticians
                  SET name = COALESCE($2, name),
                      qualification = COALESCE($3, qualification),
                      address = COALESCE($4, address),
                      aadhar = COALESCE($5, aadhar),
                      pan = COALESCE($6, pan),
                      phone = COALESCE($7, phone),
                      email = COALESCE($8, email),
                      work_exp = COALESCE($9, work_exp),
                      certificate = COALESCE($10, certificate),
                      other_doc = COALESCE($11, other_doc)
                WHERE id = $1
            RETURNING {DIETICIAN_COLUMNS}"#
        );
        sqlx::query_as::<_, Dietician>(&sql)
            .bind(id)
            .bind(&u.name)
            .bind(&u.qualification)
            .bind(&u.address)
            .bind(&u.aadhar)
            .bind(&u.pan)
            .bind(&u.phone)
            .bind(&u.email)
            .bind(&u.work_exp)
            .bind(&u.certificate)
            .bind(&u.other_doc)
            .fetch_optional(db)
            .await
            .context("update dietician")
    }

    /// Detaches the dietician's clients and deletes the row in one transaction.
    /// Returns the removed record, `None` if there was nothing to delete.
    pub async fn delete(db: &PgPool, id: i64) -> anyhow::Result<Option<Dietician>> {
        let mut tx = db.begin().await.context("begin delete dietician")?;
        sqlx::query("UPDATE users SET dietician_id = NULL WHERE dietician_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("detach dietician clients")?;
        let sql = format!("DELETE FROM dieticians WHERE id = $1 RETURNING {DIETICIAN_COLUMNS}");
        let removed = sqlx::query_as::<_, Dietician>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .context("delete dietician")?;
        tx.commit().await.context("commit delete dietician")?;
        Ok(removed)
    }

    /// Everyone for admins; just the caller for a dietician.
    pub async fn options(db: &PgPool, scope: Option<i64>) -> anyhow::Result<Vec<DieticianOption>> {
        options_query(scope)
            .build_query_as::<DieticianOption>()
            .fetch_all(db)
            .await
            .context("list dietician options")
    }

    pub async fn exists(db: &PgPool, id: i64) -> anyhow::Result<bool> {
        let (found,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM dieticians WHERE id = $1)")
            .bind(id)
            .fetch_one(db)
            .await
            .context("dietician exists")?;
        Ok(found)
    }
}
