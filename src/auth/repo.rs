use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;

use super::claims::Role;

/// Login-relevant view over the `admins` and `dieticians` tables.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StaffAccount {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub name: String,
    pub phone: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // argon2, never leaves the service
    pub avatar: Option<String>,
    pub company: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

fn select_staff(role: Role) -> &'static str {
    match role {
        Role::Admin => {
            r#"SELECT id, email, username, name, phone, password_hash,
                      logo AS avatar, company, created_at
                 FROM admins"#
        }
        Role::Dietician => {
            r#"SELECT id, email, username, name, phone, password_hash,
                      profile_image AS avatar, NULL::text AS company, created_at
                 FROM dieticians"#
        }
    }
}

fn staff_table(role: Role) -> &'static str {
    match role {
        Role::Admin => "admins",
        Role::Dietician => "dieticians",
    }
}

impl StaffAccount {
    pub async fn find_by_email(db: &PgPool, role: Role, email: &str) -> anyhow::Result<Option<Self>> {
        let sql = format!("{} WHERE lower(email) = $1", select_staff(role));
        sqlx::query_as::<_, StaffAccount>(&sql)
            .bind(email)
            .fetch_optional(db)
            .await
            .context("find staff by email")
    }

    /// Matches any of the given spellings of the phone number.
    pub async fn find_by_phone(
        db: &PgPool,
        role: Role,
        phones: &[String],
    ) -> anyhow::Result<Option<Self>> {
        let sql = format!(
            "{} WHERE phone = ANY($1) ORDER BY id LIMIT 1",
            select_staff(role)
        );
        sqlx::query_as::<_, StaffAccount>(&sql)
            .bind(phones)
            .fetch_optional(db)
            .await
            .context("find staff by phone")
    }

    pub async fn find_by_id(db: &PgPool, role: Role, id: i64) -> anyhow::Result<Option<Self>> {
        let sql = format!("{} WHERE id = $1", select_staff(role));
        sqlx::query_as::<_, StaffAccount>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await
            .context("find staff by id")
    }

    /// Self-service profile edit. `None` keeps the stored value.
    pub async fn update_profile(
        db: &PgPool,
        role: Role,
        id: i64,
        name: Option<&str>,
        phone: Option<&str>,
        avatar: Option<&str>,
    ) -> anyhow::Result<Option<Self>> {
        let avatar_col = match role {
            Role::Admin => "logo",
            Role::Dietician => "profile_image",
        };
        let sql = format!(
            "UPDATE {table} SET name = COALESCE($2, name), phone = COALESCE($3, phone), \
             {avatar_col} = COALESCE($4, {avatar_col}) WHERE id = $1",
            table = staff_table(role),
        );
        let res = sqlx::query(&sql)
            .bind(id)
            .bind(name)
            .bind(phone)
            .bind(avatar)
            .execute(db)
            .await
            .context("update staff profile")?;
        if res.rows_affected() == 0 {
            return Ok(None);
        }
        Self::find_by_id(db, role, id).await
    }

    pub async fn update_password_tx(
        tx: &mut Transaction<'_, Postgres>,
        role: Role,
        id: i64,
        password_hash: &str,
    ) -> anyhow::Result<()> {
        let sql = format!(
            "UPDATE {} SET password_hash = $1 WHERE id = $2",
            staff_table(role)
        );
        sqlx::query(&sql)
            .bind(password_hash)
            .bind(id)
            .execute(&mut **tx)
            .await
            .context("update staff password")?;
        Ok(())
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct OtpRow {
    pub expires_at: OffsetDateTime,
    pub attempts: i32,
}

/// Stores a fresh OTP for `(role, phone)`, replacing any earlier one.
pub async fn upsert_otp(
    db: &PgPool,
    role: Role,
    phone: &str,
    otp_hash: &str,
    expires_at: OffsetDateTime,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO password_reset_otps (role, phone, otp_hash, expires_at, attempts)
        VALUES ($1, $2, $3, $4, 0)
        ON CONFLICT (role, phone)
        DO UPDATE SET otp_hash = EXCLUDED.otp_hash,
                      expires_at = EXCLUDED.expires_at,
                      attempts = 0
        "#,
    )
    .bind(role.as_str())
    .bind(phone)
    .bind(otp_hash)
    .bind(expires_at)
    .execute(db)
    .await
    .context("upsert otp")?;
    Ok(())
}

async fn find_otp(db: &PgPool, role: Role, phone: &str) -> anyhow::Result<Option<OtpRow>> {
    sqlx::query_as::<_, OtpRow>(
        r#"
        SELECT expires_at, attempts
          FROM password_reset_otps
         WHERE role = $1 AND phone = $2
        "#,
    )
    .bind(role.as_str())
    .bind(phone)
    .fetch_optional(db)
    .await
    .context("find otp")
}

/// Outcome of spending one verification attempt on a stored OTP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpClaim {
    /// The attempt was counted; compare the candidate against this hash.
    Claimed { otp_hash: String },
    Exhausted,
    /// No code on file, or it has expired.
    Missing,
}

impl OtpClaim {
    /// Explains why the counting UPDATE matched nothing.
    fn unclaimed(row: Option<OtpRow>, now: OffsetDateTime, max_attempts: i32) -> Self {
        match row {
            Some(r) if r.expires_at > now && r.attempts >= max_attempts => OtpClaim::Exhausted,
            _ => OtpClaim::Missing,
        }
    }
}

const CLAIM_OTP_ATTEMPT: &str = r#"
    UPDATE password_reset_otps
       SET attempts = attempts + 1
     WHERE role = $1 AND phone = $2 AND expires_at > $3 AND attempts < $4
 RETURNING otp_hash
"#;

/// Counts an attempt before the code is checked, in a single statement, so
/// concurrent guesses cannot all slip under the limit.
pub async fn claim_otp_attempt(
    db: &PgPool,
    role: Role,
    phone: &str,
    now: OffsetDateTime,
    max_attempts: i32,
) -> anyhow::Result<OtpClaim> {
    let claimed: Option<(String,)> = sqlx::query_as(CLAIM_OTP_ATTEMPT)
        .bind(role.as_str())
        .bind(phone)
        .bind(now)
        .bind(max_attempts)
        .fetch_optional(db)
        .await
        .context("claim otp attempt")?;
    if let Some((otp_hash,)) = claimed {
        return Ok(OtpClaim::Claimed { otp_hash });
    }
    let row = find_otp(db, role, phone).await?;
    Ok(OtpClaim::unclaimed(row, now, max_attempts))
}

/// Consumes exactly the code that was verified. `false` means another request
/// redeemed or replaced it first.
pub async fn redeem_otp_tx(
    tx: &mut Transaction<'_, Postgres>,
    role: Role,
    phone: &str,
    otp_hash: &str,
) -> anyhow::Result<bool> {
    let removed = sqlx::query_scalar::<_, String>(
        "DELETE FROM password_reset_otps WHERE role = $1 AND phone = $2 AND otp_hash = $3 RETURNING phone",
    )
    .bind(role.as_str())
    .bind(phone)
    .bind(otp_hash)
    .fetch_optional(&mut **tx)
    .await
    .context("redeem otp")?;
    Ok(removed.is_some())
}
