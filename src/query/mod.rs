//! Parameterized SQL fragment building for list endpoints.
//!
//! List handlers translate their typed query parameters into a WHERE clause,
//! an ORDER BY clause validated against a per-resource column allow-list, and
//! a config-capped LIMIT/OFFSET. All values travel as `$n` bind parameters.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::postgres::PgArguments;
use sqlx::query::{Query, QueryAs};
use sqlx::{FromRow, Postgres};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Invalid column name: {0}")]
    InvalidColumn(String),

    #[error("Cannot order by: {0}")]
    InvalidOrder(String),

    #[error("Invalid limit: {0}")]
    InvalidLimit(i64),

    #[error("Invalid offset: {0}")]
    InvalidOffset(i64),
}

/// A typed bind parameter. Values keep their native Postgres type so uuid,
/// date and numeric comparisons never go through text casts.
#[derive(Debug, Clone)]
pub enum SqlParam {
    Text(String),
    Uuid(Uuid),
    Int(i64),
    Bool(bool),
    Date(NaiveDate),
    Decimal(Decimal),
}

pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Accumulates WHERE conditions joined with AND, numbering `$n` placeholders
/// as parameters are added.
pub struct WhereBuilder {
    clauses: Vec<String>,
    params: Vec<SqlParam>,
}

impl WhereBuilder {
    /// Starts with the soft-delete guard; every normal read wants it.
    pub fn new() -> Self {
        Self {
            clauses: vec!["\"deleted_at\" IS NULL".to_string()],
            params: vec![],
        }
    }

    /// For tables without a deleted_at column (e.g. notifications).
    pub fn without_delete_guard() -> Self {
        Self { clauses: vec![], params: vec![] }
    }

    fn placeholder(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }

    fn push_clause(&mut self, column: &str, op: &str, param: SqlParam) -> &mut Self {
        debug_assert!(is_valid_identifier(column), "bad column: {}", column);
        let ph = self.placeholder(param);
        self.clauses.push(format!("\"{}\" {} {}", column, op, ph));
        self
    }

    pub fn eq_uuid(&mut self, column: &str, value: Uuid) -> &mut Self {
        self.push_clause(column, "=", SqlParam::Uuid(value))
    }

    pub fn maybe_eq_uuid(&mut self, column: &str, value: Option<Uuid>) -> &mut Self {
        if let Some(v) = value {
            self.eq_uuid(column, v);
        }
        self
    }

    pub fn eq_text(&mut self, column: &str, value: impl Into<String>) -> &mut Self {
        self.push_clause(column, "=", SqlParam::Text(value.into()))
    }

    pub fn maybe_eq_text(&mut self, column: &str, value: Option<&str>) -> &mut Self {
        if let Some(v) = value {
            self.eq_text(column, v);
        }
        self
    }

    pub fn eq_bool(&mut self, column: &str, value: bool) -> &mut Self {
        self.push_clause(column, "=", SqlParam::Bool(value))
    }

    pub fn maybe_date_from(&mut self, column: &str, value: Option<NaiveDate>) -> &mut Self {
        if let Some(v) = value {
            self.push_clause(column, ">=", SqlParam::Date(v));
        }
        self
    }

    pub fn maybe_date_to(&mut self, column: &str, value: Option<NaiveDate>) -> &mut Self {
        if let Some(v) = value {
            self.push_clause(column, "<=", SqlParam::Date(v));
        }
        self
    }

    /// Case-insensitive substring search over several columns; the term is
    /// bound once and the placeholder reused per column.
    pub fn search(&mut self, columns: &[&str], term: &str) -> &mut Self {
        if term.is_empty() {
            return self;
        }
        let ph = self.placeholder(SqlParam::Text(format!("%{}%", term)));
        let parts: Vec<String> = columns
            .iter()
            .map(|c| {
                debug_assert!(is_valid_identifier(c), "bad column: {}", c);
                format!("\"{}\" ILIKE {}", c, ph)
            })
            .collect();
        self.clauses.push(format!("({})", parts.join(" OR ")));
        self
    }

    pub fn in_uuids(&mut self, column: &str, ids: &[Uuid]) -> &mut Self {
        debug_assert!(is_valid_identifier(column), "bad column: {}", column);
        if ids.is_empty() {
            self.clauses.push("1=0".to_string());
            return self;
        }
        let placeholders: Vec<String> = ids
            .iter()
            .map(|id| self.placeholder(SqlParam::Uuid(*id)))
            .collect();
        self.clauses
            .push(format!("\"{}\" IN ({})", column, placeholders.join(", ")));
        self
    }

    /// Restrict a user FK column to members of one department.
    pub fn department_members(&mut self, user_column: &str, department_id: Uuid) -> &mut Self {
        debug_assert!(is_valid_identifier(user_column), "bad column: {}", user_column);
        let ph = self.placeholder(SqlParam::Uuid(department_id));
        self.clauses.push(format!(
            "\"{}\" IN (SELECT id FROM users WHERE department_id = {} AND deleted_at IS NULL)",
            user_column, ph
        ));
        self
    }

    /// Escape hatch for conditions with no parameters (e.g. `read = false`).
    pub fn raw(&mut self, clause: &str) -> &mut Self {
        self.clauses.push(clause.to_string());
        self
    }

    /// The WHERE body (no leading keyword); `1=1` when empty.
    pub fn sql(&self) -> String {
        if self.clauses.is_empty() {
            "1=1".to_string()
        } else {
            self.clauses.join(" AND ")
        }
    }

    pub fn params(&self) -> &[SqlParam] {
        &self.params
    }
}

impl Default for WhereBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse an order spec like `"work_date desc, created_at"` against the
/// resource's sortable-column allow-list. The default spec goes through the
/// same parser.
pub fn order_clause(
    spec: Option<&str>,
    allowed: &[&str],
    default: &str,
) -> Result<String, QueryError> {
    let spec = match spec {
        Some(s) if !s.trim().is_empty() => s,
        _ => default,
    };

    let mut parts = Vec::new();
    for token in spec.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let mut it = token.split_whitespace();
        let column = it.next().unwrap_or_default();
        if !allowed.contains(&column) {
            return Err(QueryError::InvalidOrder(column.to_string()));
        }
        let direction = match it.next() {
            None => "ASC",
            Some(d) if d.eq_ignore_ascii_case("asc") => "ASC",
            Some(d) if d.eq_ignore_ascii_case("desc") => "DESC",
            Some(d) => return Err(QueryError::InvalidOrder(d.to_string())),
        };
        parts.push(format!("\"{}\" {}", column, direction));
    }

    if parts.is_empty() {
        return Err(QueryError::InvalidOrder(spec.to_string()));
    }
    Ok(format!("ORDER BY {}", parts.join(", ")))
}

/// LIMIT/OFFSET with config-enforced caps
#[derive(Debug, Clone, Copy, Default)]
pub struct Pagination {
    limit: Option<i64>,
    offset: Option<i64>,
}

impl Pagination {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Result<Self, QueryError> {
        if let Some(l) = limit {
            if l < 0 {
                return Err(QueryError::InvalidLimit(l));
            }
        }
        if let Some(o) = offset {
            if o < 0 {
                return Err(QueryError::InvalidOffset(o));
            }
        }
        Ok(Self { limit, offset })
    }

    pub fn sql(&self) -> String {
        let cfg = &crate::config::config().api;
        let requested = self.limit.unwrap_or(cfg.default_page_size);
        let limit = if requested > cfg.max_page_size {
            tracing::debug!("limit {} exceeds max {}, capping", requested, cfg.max_page_size);
            cfg.max_page_size
        } else {
            requested
        };
        format!("LIMIT {} OFFSET {}", limit, self.offset.unwrap_or(0))
    }
}

/// Bind accumulated parameters onto a `query_as` statement
pub fn bind_params_as<'q, O>(
    mut q: QueryAs<'q, Postgres, O, PgArguments>,
    params: &[SqlParam],
) -> QueryAs<'q, Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, sqlx::postgres::PgRow>,
{
    for p in params {
        q = match p {
            SqlParam::Text(v) => q.bind(v.clone()),
            SqlParam::Uuid(v) => q.bind(*v),
            SqlParam::Int(v) => q.bind(*v),
            SqlParam::Bool(v) => q.bind(*v),
            SqlParam::Date(v) => q.bind(*v),
            SqlParam::Decimal(v) => q.bind(*v),
        };
    }
    q
}

/// Bind accumulated parameters onto a plain statement
pub fn bind_params<'q>(
    mut q: Query<'q, Postgres, PgArguments>,
    params: &[SqlParam],
) -> Query<'q, Postgres, PgArguments> {
    for p in params {
        q = match p {
            SqlParam::Text(v) => q.bind(v.clone()),
            SqlParam::Uuid(v) => q.bind(*v),
            SqlParam::Int(v) => q.bind(*v),
            SqlParam::Bool(v) => q.bind(*v),
            SqlParam::Date(v) => q.bind(*v),
            SqlParam::Decimal(v) => q.bind(*v),
        };
    }
    q
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_soft_delete_guard() {
        let wb = WhereBuilder::new();
        assert_eq!(wb.sql(), "\"deleted_at\" IS NULL");
        assert!(wb.params().is_empty());
    }

    #[test]
    fn numbers_placeholders_in_order() {
        let mut wb = WhereBuilder::new();
        let user = Uuid::new_v4();
        wb.eq_uuid("user_id", user)
            .eq_text("status", "submitted")
            .maybe_date_from("work_date", Some(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
        assert_eq!(
            wb.sql(),
            "\"deleted_at\" IS NULL AND \"user_id\" = $1 AND \"status\" = $2 AND \"work_date\" >= $3"
        );
        assert_eq!(wb.params().len(), 3);
    }

    #[test]
    fn skips_absent_optional_filters() {
        let mut wb = WhereBuilder::new();
        wb.maybe_eq_uuid("user_id", None)
            .maybe_eq_text("status", None)
            .maybe_date_to("work_date", None);
        assert_eq!(wb.sql(), "\"deleted_at\" IS NULL");
        assert!(wb.params().is_empty());
    }

    #[test]
    fn search_binds_term_once() {
        let mut wb = WhereBuilder::without_delete_guard();
        wb.search(&["first_name", "last_name", "email"], "smith");
        assert_eq!(
            wb.sql(),
            "(\"first_name\" ILIKE $1 OR \"last_name\" ILIKE $1 OR \"email\" ILIKE $1)"
        );
        assert_eq!(wb.params().len(), 1);
        match &wb.params()[0] {
            SqlParam::Text(t) => assert_eq!(t, "%smith%"),
            other => panic!("expected text param, got {:?}", other),
        }
    }

    #[test]
    fn empty_id_list_matches_nothing() {
        let mut wb = WhereBuilder::without_delete_guard();
        wb.in_uuids("id", &[]);
        assert_eq!(wb.sql(), "1=0");
    }

    #[test]
    fn department_scope_uses_subselect() {
        let mut wb = WhereBuilder::new();
        wb.department_members("user_id", Uuid::new_v4());
        assert!(wb.sql().contains("IN (SELECT id FROM users WHERE department_id = $1"));
    }

    #[test]
    fn order_clause_respects_allow_list() {
        let allowed = &["work_date", "created_at"];
        assert_eq!(
            order_clause(Some("work_date desc"), allowed, "created_at").unwrap(),
            "ORDER BY \"work_date\" DESC"
        );
        assert_eq!(
            order_clause(None, allowed, "created_at desc").unwrap(),
            "ORDER BY \"created_at\" DESC"
        );
        assert!(order_clause(Some("password_hash"), allowed, "created_at").is_err());
        assert!(order_clause(Some("work_date sideways"), allowed, "created_at").is_err());
    }

    #[test]
    fn order_clause_handles_multiple_columns() {
        let allowed = &["status", "due_date"];
        assert_eq!(
            order_clause(Some("status, due_date desc"), allowed, "due_date").unwrap(),
            "ORDER BY \"status\" ASC, \"due_date\" DESC"
        );
    }

    #[test]
    fn pagination_rejects_negative_values() {
        assert!(Pagination::new(Some(-1), None).is_err());
        assert!(Pagination::new(None, Some(-5)).is_err());
    }

    #[test]
    fn pagination_caps_at_config_max() {
        // Development defaults: default 50, max 500
        let page = Pagination::new(Some(10_000), Some(20)).unwrap();
        assert_eq!(page.sql(), "LIMIT 500 OFFSET 20");
        let page = Pagination::new(None, None).unwrap();
        assert_eq!(page.sql(), "LIMIT 50 OFFSET 0");
    }

    #[test]
    fn identifier_validation() {
        assert!(is_valid_identifier("work_date"));
        assert!(is_valid_identifier("_hidden"));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier("drop table"));
        assert!(!is_valid_identifier(""));
    }
}
