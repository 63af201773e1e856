// conmon-core/src/domain/query/sql.rs

use serde::Serialize;
use serde_json::Value;
use sqlparser::ast::Ident;

use super::{Condition, Filter, Operation, Query, QueryBackend, SortOrder};
use crate::domain::error::DomainError;

/// Parameterized statement: values never end up inside `sql`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Renders queries as Postgres statements with `$n` placeholders.
/// Every mutation ends with `RETURNING *` so the caller learns the row state.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// `schema.table` -> `"schema"."table"`
    pub fn quote_table(name: &str) -> String {
        name.split('.')
            .map(Self::quote_ident)
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn quote_ident(name: &str) -> String {
        Ident::with_quote('"', name).to_string()
    }

    fn where_clause(conditions: &[Condition], params: &mut Vec<Value>) -> String {
        if conditions.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = conditions
            .iter()
            .map(|c| {
                let column = Self::quote_ident(&c.column);
                match &c.filter {
                    Filter::IsNull => format!("{} IS NULL", column),
                    Filter::Eq(value) => {
                        params.push(value.clone());
                        format!("{} = ${}", column, params.len())
                    }
                    Filter::OneOf(values) if values.is_empty() => "FALSE".to_string(),
                    Filter::OneOf(values) => {
                        let placeholders: Vec<String> = values
                            .iter()
                            .map(|v| {
                                params.push(v.clone());
                                format!("${}", params.len())
                            })
                            .collect();
                        format!("{} IN ({})", column, placeholders.join(", "))
                    }
                }
            })
            .collect();
        format!(" WHERE {}", parts.join(" AND "))
    }
}

impl QueryBackend for PostgresDialect {
    type Unit = SqlStatement;

    fn select(&self, query: &Query) -> Result<SqlStatement, DomainError> {
        query.validate(Operation::Select)?;
        let projection = if query.columns().is_empty() {
            "*".to_string()
        } else {
            query
                .columns()
                .iter()
                .map(|c| Self::quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut params = Vec::new();
        let mut sql = format!(
            "SELECT {} FROM {}",
            projection,
            Self::quote_table(query.table_name())
        );
        sql.push_str(&Self::where_clause(query.conditions(), &mut params));
        if let Some(order) = query.ordering() {
            let direction = match order.order {
                SortOrder::Asc => "ASC",
                SortOrder::Desc => "DESC",
            };
            sql.push_str(&format!(
                " ORDER BY {} {}",
                Self::quote_ident(&order.column),
                direction
            ));
        }
        Ok(SqlStatement { sql, params })
    }

    fn insert(&self, query: &Query) -> Result<SqlStatement, DomainError> {
        query.validate(Operation::Insert)?;
        let table = Self::quote_table(query.table_name());
        let values = query.update_values();
        if values.is_empty() {
            return Ok(SqlStatement {
                sql: format!("INSERT INTO {} DEFAULT VALUES RETURNING *", table),
                params: Vec::new(),
            });
        }

        let columns: Vec<String> = values.keys().map(|k| Self::quote_ident(k)).collect();
        let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("${}", i)).collect();
        Ok(SqlStatement {
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
                table,
                columns.join(", "),
                placeholders.join(", ")
            ),
            params: values.values().cloned().collect(),
        })
    }

    fn update(&self, query: &Query) -> Result<SqlStatement, DomainError> {
        query.validate(Operation::Update)?;
        let mut params = Vec::new();
        let assignments: Vec<String> = query
            .update_values()
            .iter()
            .map(|(column, value)| {
                params.push(value.clone());
                format!("{} = ${}", Self::quote_ident(column), params.len())
            })
            .collect();

        let mut sql = format!(
            "UPDATE {} SET {}",
            Self::quote_table(query.table_name()),
            assignments.join(", ")
        );
        sql.push_str(&Self::where_clause(query.conditions(), &mut params));
        sql.push_str(" RETURNING *");
        Ok(SqlStatement { sql, params })
    }

    fn delete(&self, query: &Query) -> Result<SqlStatement, DomainError> {
        query.validate(Operation::Delete)?;
        let mut params = Vec::new();
        let mut sql = format!("DELETE FROM {}", Self::quote_table(query.table_name()));
        sql.push_str(&Self::where_clause(query.conditions(), &mut params));
        sql.push_str(" RETURNING *");
        Ok(SqlStatement { sql, params })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_all_columns() {
        let stmt = PostgresDialect.select(&Query::table("checks")).unwrap();
        insta::assert_snapshot!(stmt.sql, @r#"SELECT * FROM "checks""#);
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_select_with_filters_and_order() {
        let query = Query::table("public.checks")
            .select_columns(["id", "name"])
            .filter("status", json!(["active", "pending"]))
            .filter("is_deleted", json!(false))
            .filter("deleted_at", Value::Null)
            .order_by("id", SortOrder::Desc);

        let stmt = PostgresDialect.select(&query).unwrap();
        insta::assert_snapshot!(stmt.sql, @r#"SELECT "id", "name" FROM "public"."checks" WHERE "status" IN ($1, $2) AND "is_deleted" = $3 AND "deleted_at" IS NULL ORDER BY "id" DESC"#);
        assert_eq!(stmt.params, vec![json!("active"), json!("pending"), json!(false)]);
    }

    #[test]
    fn test_empty_set_matches_nothing() {
        let query = Query::table("checks").filter("id", json!([]));
        let stmt = PostgresDialect.select(&query).unwrap();
        insta::assert_snapshot!(stmt.sql, @r#"SELECT * FROM "checks" WHERE FALSE"#);
    }

    #[test]
    fn test_insert_is_deterministic_and_returning() {
        let query = Query::table("con_mon_results")
            .set("customer_id", "cust-1")
            .set("check_id", 42)
            .set("success_resources", json!(["a", "b"]));

        let stmt = PostgresDialect.insert(&query).unwrap();
        insta::assert_snapshot!(stmt.sql, @r#"INSERT INTO "con_mon_results" ("customer_id", "check_id", "success_resources") VALUES ($1, $2, $3) RETURNING *"#);
        assert_eq!(stmt.params[2], json!(["a", "b"]));
    }

    #[test]
    fn test_insert_defaults() {
        let stmt = PostgresDialect.insert(&Query::table("checks")).unwrap();
        insta::assert_snapshot!(stmt.sql, @r#"INSERT INTO "checks" DEFAULT VALUES RETURNING *"#);
    }

    #[test]
    fn test_update_numbers_params_after_assignments() {
        let query = Query::table("checks")
            .set("name", "renamed")
            .filter("id", 3);
        let stmt = PostgresDialect.update(&query).unwrap();
        insta::assert_snapshot!(stmt.sql, @r#"UPDATE "checks" SET "name" = $1 WHERE "id" = $2 RETURNING *"#);
        assert_eq!(stmt.params, vec![json!("renamed"), json!(3)]);
    }

    #[test]
    fn test_update_requires_values() {
        let query = Query::table("checks").filter("id", 3);
        assert!(matches!(
            PostgresDialect.update(&query),
            Err(DomainError::MissingUpdateValues { .. })
        ));
    }

    #[test]
    fn test_delete_requires_where() {
        assert!(matches!(
            PostgresDialect.delete(&Query::table("checks")),
            Err(DomainError::MissingWhereClause { .. })
        ));

        let stmt = PostgresDialect
            .delete(&Query::table("checks").filter("id", 1))
            .unwrap();
        insta::assert_snapshot!(stmt.sql, @r#"DELETE FROM "checks" WHERE "id" = $1 RETURNING *"#);
    }

    #[test]
    fn test_identifiers_are_quoted_not_interpolated() {
        let query = Query::table("checks").filter("name\"; DROP TABLE checks; --", "x");
        let stmt = PostgresDialect.select(&query).unwrap();
        assert!(stmt.sql.contains(r#""name""; DROP TABLE checks; --" = $1"#));
        assert_eq!(stmt.params, vec![json!("x")]);
    }
}
