use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;

/// An end user of the mobile app. Created elsewhere; this service only reads
/// them and moves them between dieticians.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub goal: Option<String>,
    pub subscription: Option<String>,
    pub dietician_id: Option<i64>,
    pub from_zoho: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Narrowing applied by `GET /getallusers`. Empty means everyone in scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub search: Option<String>,
    pub gender: Option<String>,
    pub subscription: Option<String>,
    pub from_zoho: Option<bool>,
}

const SELECT_USER: &str = r#"
    SELECT id, name, email, phone, gender, goal, subscription, dietician_id,
           from_zoho, created_at
      FROM users
     WHERE TRUE
"#;

/// `%term%` for ILIKE with the wildcard characters of `term` escaped.
pub fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, scope: Option<i64>, f: &UserFilter) {
    if let Some(dietician_id) = scope {
        qb.push(" AND dietician_id = ").push_bind(dietician_id);
    }
    if let Some(term) = &f.search {
        let pattern = like_pattern(term);
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR goal ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(gender) = &f.gender {
        qb.push(" AND lower(gender) = lower(")
            .push_bind(gender.clone())
            .push(")");
    }
    if let Some(sub) = &f.subscription {
        qb.push(" AND lower(subscription) = lower(")
            .push_bind(sub.clone())
            .push(")");
    }
    if let Some(flag) = f.from_zoho {
        qb.push(" AND from_zoho = ").push_bind(flag);
    }
}

impl User {
    pub async fn find(db: &PgPool, id: i64) -> anyhow::Result<Option<User>> {
        let sql = format!("{SELECT_USER} AND id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await
            .context("find user")
    }

    /// `scope` confines the search to one dietician's clients.
    pub async fn search(
        db: &PgPool,
        scope: Option<i64>,
        filter: &UserFilter,
    ) -> anyhow::Result<Vec<User>> {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_USER);
        push_filter(&mut qb, scope, filter);
        qb.push(" ORDER BY created_at DESC, id DESC");
        qb.build_query_as::<User>()
            .fetch_all(db)
            .await
            .context("search users")
    }

    pub async fn without_dietician(db: &PgPool) -> anyhow::Result<Vec<User>> {
        let sql = format!("{SELECT_USER} AND dietician_id IS NULL ORDER BY created_at DESC, id DESC");
        sqlx::query_as::<_, User>(&sql)
            .fetch_all(db)
            .await
            .context("list users without dietician")
    }

    pub async fn clients_of(db: &PgPool, dietician_id: i64) -> anyhow::Result<Vec<User>> {
        let sql = format!("{SELECT_USER} AND dietician_id = $1 ORDER BY name, id");
        sqlx::query_as::<_, User>(&sql)
            .bind(dietician_id)
            .fetch_all(db)
            .await
            .context("list dietician clients")
    }

    /// Moves the given users to `dietician_id`; returns how many rows changed.
    pub async fn assign_to_dietician(
        db: &PgPool,
        user_ids: &[i64],
        dietician_id: i64,
    ) -> anyhow::Result<u64> {
        let res = sqlx::query("UPDATE users SET dietician_id = $1 WHERE id = ANY($2)")
            .bind(dietician_id)
            .bind(user_ids)
            .execute(db)
            .await
            .context("assign users to dietician")?;
        Ok(res.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Execute;

    fn where_clause(scope: Option<i64>, f: &UserFilter) -> String {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_USER);
        push_filter(&mut qb, scope, f);
        let query = qb.build();
        let sql = query.sql();
        sql[sql.find("WHERE TRUE").unwrap()..]
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("ann"), "%ann%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn empty_filter_admin_scope_has_no_conditions() {
        assert_eq!(where_clause(None, &UserFilter::default()), "WHERE TRUE");
    }

    #[test]
    fn dietician_scope_and_filters() {
        let f = UserFilter {
            search: Some("weight".into()),
            gender: Some("Female".into()),
            subscription: None,
            from_zoho: Some(true),
        };
        assert_eq!(
            where_clause(Some(4), &f),
            "WHERE TRUE AND dietician_id = $1 AND (name ILIKE $2 OR email ILIKE $3 OR goal ILIKE $4) \
             AND lower(gender) = lower($5) AND from_zoho = $6"
        );
    }
}
