use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, types::Json};
use uuid::Uuid;

use super::{Collection, DocumentStore, StoreError, StoreResult};
use crate::query::{Condition, FieldKind, Filter, Scalar, SortKey};

/// PostgresStore
///
/// Stores every collection as a `(id UUID PRIMARY KEY, doc JSONB)` table.
/// Filters and sort keys are rendered against `doc #>> path` with a cast per
/// field kind, always through `QueryBuilder::push_bind`; only table names and
/// fixed SQL fragments are pushed as text.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Unique-index violations become `Conflict`; the index name identifies the
/// field.
fn map_write_error(collection: Collection, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let field = db.constraint().and_then(|name| {
                collection
                    .unique_keys()
                    .iter()
                    .find(|key| key.index == name)
                    .map(|key| key.field)
            });
            return StoreError::Conflict {
                collection,
                field: field.unwrap_or("id"),
            };
        }
    }
    StoreError::Database(err)
}

fn path_segments(field: &str) -> Vec<String> {
    field.split('.').map(str::to_string).collect()
}

/// Pushes the typed extraction of `field` from the document.
fn push_field(builder: &mut QueryBuilder<'_, Postgres>, field: &str, kind: FieldKind) {
    builder.push("(doc #>> ");
    builder.push_bind(path_segments(field));
    builder.push(")");
    match kind {
        FieldKind::Text => builder.push(" COLLATE \"C\""),
        FieldKind::Number => builder.push("::double precision"),
        FieldKind::Bool => builder.push("::boolean"),
        FieldKind::Date => builder.push("::timestamptz"),
    };
}

fn push_scalar(builder: &mut QueryBuilder<'_, Postgres>, value: &Scalar) {
    match value {
        Scalar::Text(s) => builder.push_bind(s.clone()),
        Scalar::Number(n) => builder.push_bind(*n),
        Scalar::Bool(b) => builder.push_bind(*b),
        Scalar::Date(d) => builder.push_bind(*d),
    };
}

/// `%`, `_` and `\` in user input match literally.
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_condition(builder: &mut QueryBuilder<'_, Postgres>, condition: &Condition) {
    match condition {
        Condition::Compare { field, op, value } => {
            builder.push("(");
            push_field(builder, field, value.kind());
            builder.push(" ");
            builder.push(op.sql());
            builder.push(" ");
            push_scalar(builder, value);
            builder.push(")");
        }
        Condition::In { field, values } => {
            if values.is_empty() {
                builder.push("FALSE");
                return;
            }
            builder.push("(");
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    builder.push(" OR ");
                }
                push_field(builder, field, value.kind());
                builder.push(" = ");
                push_scalar(builder, value);
            }
            builder.push(")");
        }
        Condition::Contains { field, needle } => {
            builder.push("((doc #>> ");
            builder.push_bind(path_segments(field));
            builder.push(") ILIKE ");
            builder.push_bind(like_pattern(needle));
            builder.push(")");
        }
    }
}

fn push_where(builder: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    builder.push(" WHERE TRUE");
    for condition in &filter.all {
        builder.push(" AND ");
        push_condition(builder, condition);
    }
    if !filter.any.is_empty() {
        builder.push(" AND (");
        for (i, condition) in filter.any.iter().enumerate() {
            if i > 0 {
                builder.push(" OR ");
            }
            push_condition(builder, condition);
        }
        builder.push(")");
    }
}

fn push_order(builder: &mut QueryBuilder<'_, Postgres>, sort: &[SortKey]) {
    builder.push(" ORDER BY ");
    for key in sort {
        push_field(builder, &key.field, key.kind);
        if key.descending {
            builder.push(" DESC NULLS LAST, ");
        } else {
            builder.push(" ASC NULLS FIRST, ");
        }
    }
    builder.push("id ASC");
}

/// Everything up to the bound `id` of the counter update.
fn increment_query(collection: Collection, field: &str, by: i64) -> QueryBuilder<'static, Postgres> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE ");
    builder.push(collection.table());
    builder.push(" SET doc = jsonb_set(doc, ");
    builder.push_bind(vec![field.to_string()]);
    builder.push(", to_jsonb(COALESCE((doc ->> ");
    builder.push_bind(field.to_string());
    builder.push(")::bigint, 0) + ");
    builder.push_bind(by);
    builder.push(")) WHERE id = ");
    builder
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn insert(&self, collection: Collection, id: Uuid, doc: Value) -> StoreResult<()> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("INSERT INTO ");
        builder.push(collection.table());
        builder.push(" (id, doc) VALUES (");
        builder.push_bind(id);
        builder.push(", ");
        builder.push_bind(Json(doc));
        builder.push(")");

        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(collection, e))?;
        Ok(())
    }

    async fn replace(&self, collection: Collection, id: Uuid, doc: Value) -> StoreResult<bool> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE ");
        builder.push(collection.table());
        builder.push(" SET doc = ");
        builder.push_bind(Json(doc));
        builder.push(" WHERE id = ");
        builder.push_bind(id);

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(collection, e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, collection: Collection, id: Uuid) -> StoreResult<Option<Value>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT doc FROM ");
        builder.push(collection.table());
        builder.push(" WHERE id = ");
        builder.push_bind(id);

        let row = builder.build().fetch_optional(&self.pool).await?;
        Ok(row.map(|r| r.try_get::<Value, _>("doc")).transpose()?)
    }

    /// `UPDATE <table> SET doc = jsonb_set(doc, path, to_jsonb(COALESCE(..., 0) + by))`,
    /// a single statement so the row is never rewritten from a stale copy.
    async fn increment(
        &self,
        collection: Collection,
        id: Uuid,
        field: &str,
        by: i64,
    ) -> StoreResult<Option<Value>> {
        let mut builder = increment_query(collection, field, by);
        builder.push_bind(id);
        builder.push(" RETURNING doc");

        let row = builder.build().fetch_optional(&self.pool).await?;
        Ok(row.map(|r| r.try_get::<Value, _>("doc")).transpose()?)
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> StoreResult<Option<Value>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("DELETE FROM ");
        builder.push(collection.table());
        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(" RETURNING doc");

        let row = builder.build().fetch_optional(&self.pool).await?;
        Ok(row.map(|r| r.try_get::<Value, _>("doc")).transpose()?)
    }

    /// find
    ///
    /// `SELECT doc FROM <table> WHERE ... ORDER BY ..., id ASC OFFSET $n LIMIT $m`.
    /// Ascending keys place missing values first, descending keys last, the
    /// same ordering the memory store produces.
    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        sort: &[SortKey],
        skip: u64,
        limit: Option<u64>,
    ) -> StoreResult<Vec<Value>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT doc FROM ");
        builder.push(collection.table());
        push_where(&mut builder, filter);
        push_order(&mut builder, sort);
        if skip > 0 {
            builder.push(" OFFSET ");
            builder.push_bind(to_i64(skip));
        }
        if let Some(limit) = limit {
            builder.push(" LIMIT ");
            builder.push_bind(to_i64(limit));
        }

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|r| r.try_get::<Value, _>("doc").map_err(StoreError::from))
            .collect()
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) AS total FROM ");
        builder.push(collection.table());
        push_where(&mut builder, filter);

        let row = builder.build().fetch_one(&self.pool).await?;
        let total: i64 = row.try_get("total")?;
        Ok(u64::try_from(total).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::CompareOp;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn where_clause_binds_every_operand() {
        let filter = Filter::new()
            .compare("age", CompareOp::Gte, 16u32)
            .eq("status", "published")
            .any_contains(&["title", "content"], "derby");
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT doc FROM players");
        push_where(&mut builder, &filter);
        let sql = builder.sql();

        assert_eq!(
            sql,
            "SELECT doc FROM players WHERE TRUE \
             AND ((doc #>> $1)::double precision >= $2) \
             AND ((doc #>> $3) COLLATE \"C\" = $4) \
             AND (((doc #>> $5) ILIKE $6) OR ((doc #>> $7) ILIKE $8))"
        );
    }

    #[test]
    fn increment_is_one_statement() {
        let builder = increment_query(Collection::Articles, "views", 1);
        assert_eq!(
            builder.sql(),
            "UPDATE articles SET doc = jsonb_set(doc, $1, \
             to_jsonb(COALESCE((doc ->> $2)::bigint, 0) + $3)) WHERE id = "
        );
    }

    #[test]
    fn order_clause_ends_with_id_tiebreak() {
        let sort = vec![SortKey {
            field: "createdAt".into(),
            kind: FieldKind::Date,
            descending: true,
        }];
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("");
        push_order(&mut builder, &sort);

        assert_eq!(
            builder.sql(),
            " ORDER BY (doc #>> $1)::timestamptz DESC NULLS LAST, id ASC"
        );
    }
}
