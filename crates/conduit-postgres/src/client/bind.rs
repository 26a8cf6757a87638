//! Positional parameter binding for raw SQL.

use conduit_core::datasource::{Row, SqlParam};
use diesel::pg::Pg;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::sql_types::{BigInt, Bool, Double, Jsonb, Nullable, Text};
use diesel::QueryableByName;
use serde_json::Value;

/// Raw SQL statement with its parameters bound.
pub(crate) type BoundQuery<'a> = BoxedSqlQuery<'a, Pg, SqlQuery>;

/// Column alias carrying each result row as a JSON object.
const ROW_COLUMN: &str = "conduit_row";

/// A result row serialized by Postgres as `jsonb`.
#[derive(Debug, QueryableByName)]
pub(crate) struct JsonRow {
    #[diesel(sql_type = Jsonb)]
    conduit_row: Value,
}

impl JsonRow {
    /// Returns the row's columns, or an empty row for non-object values.
    pub(crate) fn into_row(self) -> Row {
        match self.conduit_row {
            Value::Object(row) => row,
            _ => Row::new(),
        }
    }
}

/// Wraps `sql` so that every result row comes back as a single `jsonb` column.
///
/// Works for `SELECT` statements and for data-modifying statements with a
/// `RETURNING` clause.
pub(crate) fn rows_as_json(sql: &str) -> String {
    let sql = sql.trim().trim_end_matches(';').trim_end();
    format!("WITH q AS ({sql}) SELECT to_jsonb(q) AS {ROW_COLUMN} FROM q")
}

/// Binds `params` to `sql` in order, as `$1`, `$2`, ...
pub(crate) fn bind_params<'a>(sql: impl Into<String>, params: &[SqlParam]) -> BoundQuery<'a> {
    params
        .iter()
        .fold(diesel::sql_query(sql).into_boxed(), |query, param| {
            match param.clone() {
                SqlParam::Null => query.bind::<Nullable<Text>, _>(None::<String>),
                SqlParam::Bool(value) => query.bind::<Bool, _>(value),
                SqlParam::Int(value) => query.bind::<BigInt, _>(value),
                SqlParam::Float(value) => query.bind::<Double, _>(value),
                SqlParam::Text(value) => query.bind::<Text, _>(value),
                SqlParam::Json(value) => query.bind::<Jsonb, _>(value),
            }
        })
}

#[cfg(test)]
mod tests {
    use diesel::debug_query;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_rows_as_json_strips_terminator() {
        assert_eq!(
            rows_as_json("  SELECT id FROM users; "),
            "WITH q AS (SELECT id FROM users) SELECT to_jsonb(q) AS conduit_row FROM q"
        );
    }

    #[test]
    fn test_bind_params_keeps_order() {
        let query = bind_params(
            "SELECT * FROM users WHERE id = $1 AND email = $2",
            &[SqlParam::Int(7), SqlParam::Text("a@b.c".into())],
        );
        let rendered = debug_query::<Pg, _>(&query).to_string();

        assert!(rendered.starts_with("SELECT * FROM users WHERE id = $1 AND email = $2"));
        let id = rendered.find("7").unwrap();
        let email = rendered.find("a@b.c").unwrap();
        assert!(id < email);
    }

    #[test]
    fn test_non_object_rows_are_empty() {
        let row = JsonRow {
            conduit_row: json!([1, 2]),
        };
        assert!(row.into_row().is_empty());

        let row = JsonRow {
            conduit_row: json!({"id": 1}),
        };
        assert_eq!(row.into_row().get("id"), Some(&json!(1)));
    }
}
