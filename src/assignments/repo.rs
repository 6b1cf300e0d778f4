use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::{Date, OffsetDateTime};

use super::{query::StatsFilterState, AssignmentKey};

/// One assigned meal with the meal and user details the dashboard shows next to it.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub user_id: i64,
    pub meal_id: i64,
    pub date: Date,
    pub meal_time: String,
    pub quantity: i32,
    pub finished: bool,
    pub comment: Option<String>,
    pub rating: Option<i16>,
    pub meal_name: String,
    pub meal_image: Option<String>,
    pub calories: i32,
    pub category: String,
    pub user_name: String,
    pub dietician_id: Option<i64>,
    pub dietician_name: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MealStats {
    pub total_meals: i64,
    pub finished_meals: i64,
    pub not_finished_meals: i64,
}

const SELECT_ASSIGNMENT: &str = r#"
    SELECT a.user_id, a.meal_id, a.date, a.meal_time, a.quantity, a.finished,
           a.comment, a.rating, m.name AS meal_name, m.img_url AS meal_image,
           m.calories, m.category, u.name AS user_name, u.dietician_id,
           d.name AS dietician_name, a.created_at
"#;

const FROM_ASSIGNMENTS: &str = r#"
      FROM meal_assignments a
      JOIN meals m ON m.id = a.meal_id
      JOIN users u ON u.id = a.user_id
      LEFT JOIN dieticians d ON d.id = u.dietician_id
     WHERE TRUE
"#;

const ORDER_ASSIGNMENTS: &str = r#"
     ORDER BY a.date DESC, u.name, a.user_id,
              array_position(ARRAY['EARLY_MORNING','AFTER_30_MINUTES','BREAKFAST','MID_MEAL',
                                   'LUNCH','EVENING_SNACKS','LATE_EVENING','DINNER','BED_TIME'],
                             a.meal_time),
              m.name
"#;

/// Appends the WHERE conditions for `filters`. The status condition is left
/// out for the aggregate counts.
fn push_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    filters: &StatsFilterState,
    today: Date,
    with_status: bool,
) {
    if let Some(id) = filters.user_id() {
        qb.push(" AND a.user_id = ").push_bind(id);
    }
    if let Some(id) = filters.dietician_id() {
        qb.push(" AND u.dietician_id = ").push_bind(id);
    }
    if let Some((from, to)) = filters.date_range().bounds(today) {
        qb.push(" AND a.date BETWEEN ")
            .push_bind(from)
            .push(" AND ")
            .push_bind(to);
    }
    if with_status {
        if let Some(status) = filters.status() {
            qb.push(" AND a.finished = ").push_bind(status.finished());
        }
    }
}

impl Assignment {
    pub fn key(&self) -> AssignmentKey {
        AssignmentKey::new(self.user_id, self.meal_id, self.date, &self.meal_time)
    }

    pub async fn insert(
        db: &PgPool,
        key: &AssignmentKey,
        quantity: i32,
    ) -> anyhow::Result<Assignment> {
        sqlx::query(
            r#"INSERT INTO meal_assignments (user_id, meal_id, date, meal_time, quantity)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(key.user_id)
        .bind(key.meal_id)
        .bind(key.date)
        .bind(&key.meal_time)
        .bind(quantity)
        .execute(db)
        .await
        .context("insert meal assignment")?;

        Self::find(db, key)
            .await?
            .context("assignment vanished right after insert")
    }

    pub async fn find(db: &PgPool, key: &AssignmentKey) -> anyhow::Result<Option<Assignment>> {
        let sql = format!(
            "{SELECT_ASSIGNMENT} {FROM_ASSIGNMENTS}
               AND a.user_id = $1 AND a.meal_id = $2 AND a.date = $3 AND a.meal_time = $4"
        );
        sqlx::query_as::<_, Assignment>(&sql)
            .bind(key.user_id)
            .bind(key.meal_id)
            .bind(key.date)
            .bind(&key.meal_time)
            .fetch_optional(db)
            .await
            .context("find meal assignment")
    }

    pub async fn for_user(db: &PgPool, user_id: i64) -> anyhow::Result<Vec<Assignment>> {
        let sql = format!("{SELECT_ASSIGNMENT} {FROM_ASSIGNMENTS} AND a.user_id = $1 {ORDER_ASSIGNMENTS}");
        sqlx::query_as::<_, Assignment>(&sql)
            .bind(user_id)
            .fetch_all(db)
            .await
            .context("list user assignments")
    }

    /// Deletes the one row matching all four key fields; false if there was none.
    pub async fn delete(db: &PgPool, key: &AssignmentKey) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"DELETE FROM meal_assignments
                WHERE user_id = $1 AND meal_id = $2 AND date = $3
                  AND upper(regexp_replace(btrim(meal_time), '\s+', '_', 'g')) = $4"#,
        )
        .bind(key.user_id)
        .bind(key.meal_id)
        .bind(key.date)
        .bind(&key.meal_time)
        .execute(db)
        .await
        .context("delete meal assignment")?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn page(
        db: &PgPool,
        filters: &StatsFilterState,
        today: Date,
    ) -> anyhow::Result<(Vec<Assignment>, i64)> {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_ASSIGNMENT);
        qb.push(FROM_ASSIGNMENTS);
        push_filters(&mut qb, filters, today, true);
        qb.push(ORDER_ASSIGNMENTS);
        qb.push(" LIMIT ")
            .push_bind(i64::from(filters.per_page()))
            .push(" OFFSET ")
            .push_bind(filters.offset());
        let rows = qb
            .build_query_as::<Assignment>()
            .fetch_all(db)
            .await
            .context("page meal assignments")?;

        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        qb.push(FROM_ASSIGNMENTS);
        push_filters(&mut qb, filters, today, true);
        let (total,) = qb
            .build_query_as::<(i64,)>()
            .fetch_one(db)
            .await
            .context("count meal assignments")?;

        Ok((rows, total))
    }
}

impl MealStats {
    pub async fn compute(
        db: &PgPool,
        filters: &StatsFilterState,
        today: Date,
    ) -> anyhow::Result<MealStats> {
        let mut qb = QueryBuilder::<Postgres>::new(
            r#"SELECT COUNT(*) AS total_meals,
                      COUNT(*) FILTER (WHERE a.finished) AS finished_meals,
                      COUNT(*) FILTER (WHERE NOT a.finished) AS not_finished_meals"#,
        );
        qb.push(FROM_ASSIGNMENTS);
        push_filters(&mut qb, filters, today, false);
        qb.build_query_as::<MealStats>()
            .fetch_one(db)
            .await
            .context("meal assignment stats")
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::assignments::query::{DateRange, StatusFilter};
    use sqlx::Execute;
    use time::macros::{date, datetime, format_description};

    pub fn sample(user_id: i64, meal_id: i64, date: &str, meal_time: &str) -> Assignment {
        Assignment {
            user_id,
            meal_id,
            date: Date::parse(date, format_description!("[year]-[month]-[day]")).unwrap(),
            meal_time: meal_time.to_string(),
            quantity: 1,
            finished: false,
            comment: None,
            rating: None,
            meal_name: format!("meal {meal_id}"),
            meal_image: None,
            calories: 100,
            category: "Veg".into(),
            user_name: format!("user {user_id}"),
            dietician_id: None,
            dietician_name: None,
            created_at: datetime!(2024-01-01 0:00 UTC),
        }
    }

    fn where_clause(filters: &StatsFilterState, with_status: bool) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1");
        qb.push(FROM_ASSIGNMENTS);
        push_filters(&mut qb, filters, date!(2024 - 05 - 20), with_status);
        let query = qb.build();
        let sql = query.sql();
        sql[sql.find("WHERE TRUE").unwrap()..]
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn no_filters_means_no_conditions() {
        assert_eq!(where_clause(&StatsFilterState::default(), true), "WHERE TRUE");
    }

    #[test]
    fn filters_become_bound_conditions() {
        let mut f = StatsFilterState::default();
        f.set_user(Some(3));
        f.set_dietician(Some(8));
        f.set_date_range(DateRange::Week);
        f.set_status(Some(StatusFilter::Finished));
        assert_eq!(
            where_clause(&f, true),
            "WHERE TRUE AND a.user_id = $1 AND u.dietician_id = $2 AND a.date BETWEEN $3 AND $4 AND a.finished = $5"
        );
        // stats ignore the status filter
        assert_eq!(
            where_clause(&f, false),
            "WHERE TRUE AND a.user_id = $1 AND u.dietician_id = $2 AND a.date BETWEEN $3 AND $4"
        );
    }

    #[test]
    fn serializes_camel_case_with_plain_date() {
        let json = serde_json::to_value(sample(1, 5, "2024-01-02", "LUNCH")).unwrap();
        assert_eq!(json["userId"], 1);
        assert_eq!(json["mealTime"], "LUNCH");
        assert_eq!(json["date"], "2024-01-02");
        assert_eq!(sample(1, 5, "2024-01-02", "lunch").key().meal_time, "LUNCH");
    }
}
