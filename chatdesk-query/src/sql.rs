//! Structured queries and their PostgreSQL rendering.
//!
//! Repositories build these values; a `Store` either renders them to
//! parameterized SQL (`$1`, `$2`, ...) or evaluates them directly. The only
//! interpolated text is a `QualifiedTable` and `&'static` column names.
//!
//! Aliases are fixed: `p` is the primary table, `r` the joined related row,
//! `x` the row probed by `EXISTS`, `j` the scan inside the lateral join.

use crate::schema::QualifiedTable;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::fmt;

pub const PRIMARY: &str = "p";
pub const RELATED: &str = "r";
pub const PROBE: &str = "x";
const LATERAL: &str = "j";

// ============================================================================
// SQL PARAMETER TYPE
// ============================================================================

/// Type-erased bound parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// String value
    String(String),
    /// Optional string value
    OptString(Option<String>),
    /// Integer value (int4 columns such as `unread_count`)
    Int(i32),
    /// Long integer value (int8 columns, LIMIT and OFFSET)
    Long(i64),
    /// Boolean value
    Bool(bool),
    /// Timestamp with time zone
    Timestamp(DateTime<Utc>),
    /// Text array, used with `= ANY(...)`
    StringArray(Vec<String>),
}

impl SqlParam {
    /// JSON form of the value, as `to_jsonb` would render it.
    pub fn to_json(&self) -> JsonValue {
        match self {
            SqlParam::String(v) => JsonValue::String(v.clone()),
            SqlParam::OptString(v) => v
                .as_ref()
                .map(|s| JsonValue::String(s.clone()))
                .unwrap_or(JsonValue::Null),
            SqlParam::Int(v) => JsonValue::from(*v),
            SqlParam::Long(v) => JsonValue::from(*v),
            SqlParam::Bool(v) => JsonValue::Bool(*v),
            SqlParam::Timestamp(v) => JsonValue::String(v.to_rfc3339()),
            SqlParam::StringArray(v) => {
                JsonValue::Array(v.iter().cloned().map(JsonValue::String).collect())
            }
        }
    }
}

// ============================================================================
// BUILDING BLOCKS
// ============================================================================

/// Column qualified by one of the fixed aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub alias: &'static str,
    pub column: &'static str,
}

impl ColumnRef {
    pub const fn new(alias: &'static str, column: &'static str) -> Self {
        Self { alias, column }
    }

    pub const fn primary(column: &'static str) -> Self {
        Self::new(PRIMARY, column)
    }

    pub const fn related(column: &'static str) -> Self {
        Self::new(RELATED, column)
    }

    pub const fn probe(column: &'static str) -> Self {
        Self::new(PROBE, column)
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.\"{}\"", self.alias, self.column)
    }
}

/// Sort direction. Anything that is not `asc` sorts descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// Only a case-insensitive `asc` yields ascending order.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(raw) if raw.eq_ignore_ascii_case("asc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// One ORDER BY term. Always rendered `NULLS LAST`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub column: ColumnRef,
    pub direction: SortDirection,
}

/// Correlated probe of a related table, rendered as `EXISTS (SELECT 1 ...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Probe {
    pub table: QualifiedTable,
    /// `(probe column, primary column)` pairs that must be equal.
    pub keys: &'static [(&'static str, &'static str)],
    pub predicates: Vec<Predicate>,
}

/// A WHERE clause term.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(ColumnRef, SqlParam),
    Gt(ColumnRef, SqlParam),
    IsNull(ColumnRef),
    IsNotNull(ColumnRef),
    /// POSIX regular expression match (`~`).
    Regex(ColumnRef, SqlParam),
    /// Case-insensitive LIKE; the pattern is already escaped.
    ILike(ColumnRef, SqlParam),
    /// Membership in a bound text array (`= ANY($n)`).
    AnyOf(ColumnRef, SqlParam),
    Or(Vec<Predicate>),
    Exists { probe: Probe, negated: bool },
}

/// Left join to at most one related row per primary row.
///
/// Rendered as `LEFT JOIN LATERAL (... LIMIT 1) r ON TRUE`, so the data query
/// can never return more rows than the primary table holds.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedJoin {
    pub table: QualifiedTable,
    /// `(related column, primary column)` pairs that must be equal.
    pub keys: &'static [(&'static str, &'static str)],
    /// Column ordering candidate rows when more than one matches.
    pub identity: &'static str,
    /// `(output name, related column)` pairs added to each row.
    pub columns: &'static [(&'static str, &'static str)],
    /// Output name of the presence flag.
    pub presence: &'static str,
}

// ============================================================================
// STATEMENTS
// ============================================================================

/// Rendered SQL plus its parameters in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

/// Data query. Each row is returned as one JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub from: QualifiedTable,
    pub join: Option<RelatedJoin>,
    pub predicates: Vec<Predicate>,
    pub order: Vec<OrderBy>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Count over the primary table alone. There is no join here, so related
/// filters must already be expressed as `Predicate::Exists`.
#[derive(Debug, Clone, PartialEq)]
pub struct CountQuery {
    pub from: QualifiedTable,
    pub predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub into: QualifiedTable,
    pub values: Vec<(&'static str, SqlParam)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table: QualifiedTable,
    pub assignments: Vec<(&'static str, SqlParam)>,
    pub predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub from: QualifiedTable,
    pub predicates: Vec<Predicate>,
}

// ============================================================================
// RENDERING
// ============================================================================

#[derive(Default)]
struct SqlWriter {
    sql: String,
    params: Vec<SqlParam>,
}

impl SqlWriter {
    fn push(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    fn bind(&mut self, param: &SqlParam) -> String {
        self.params.push(param.clone());
        format!("${}", self.params.len())
    }

    fn predicate(&mut self, predicate: &Predicate) -> String {
        match predicate {
            Predicate::Eq(column, value) => format!("{} = {}", column, self.bind(value)),
            Predicate::Gt(column, value) => format!("{} > {}", column, self.bind(value)),
            Predicate::IsNull(column) => format!("{} IS NULL", column),
            Predicate::IsNotNull(column) => format!("{} IS NOT NULL", column),
            Predicate::Regex(column, value) => format!("{} ~ {}", column, self.bind(value)),
            Predicate::ILike(column, value) => {
                format!("{} ILIKE {}", column, self.bind(value))
            }
            Predicate::AnyOf(column, value) => format!("{} = ANY({})", column, self.bind(value)),
            Predicate::Or(terms) => {
                if terms.is_empty() {
                    return "FALSE".to_string();
                }
                let parts: Vec<String> = terms.iter().map(|t| self.predicate(t)).collect();
                format!("({})", parts.join(" OR "))
            }
            Predicate::Exists { probe, negated } => {
                let mut terms: Vec<String> = probe
                    .keys
                    .iter()
                    .map(|&(inner, outer)| {
                        format!(
                            "{} = {}",
                            ColumnRef::new(PROBE, inner),
                            ColumnRef::new(PRIMARY, outer)
                        )
                    })
                    .collect();
                for p in &probe.predicates {
                    terms.push(self.predicate(p));
                }
                format!(
                    "{}EXISTS (SELECT 1 FROM {} {} WHERE {})",
                    if *negated { "NOT " } else { "" },
                    probe.table,
                    PROBE,
                    terms.join(" AND ")
                )
            }
        }
    }

    fn where_clause(&mut self, predicates: &[Predicate]) {
        if predicates.is_empty() {
            return;
        }
        let parts: Vec<String> = predicates.iter().map(|p| self.predicate(p)).collect();
        self.push(" WHERE ");
        self.push(&parts.join(" AND "));
    }

    fn finish(self) -> Rendered {
        Rendered {
            sql: self.sql,
            params: self.params,
        }
    }
}

impl RelatedJoin {
    fn projection(&self) -> String {
        let mut args: Vec<String> = self
            .columns
            .iter()
            .map(|&(name, column)| format!("'{}', {}", name, ColumnRef::related(column)))
            .collect();
        if let Some(&(key, _)) = self.keys.first() {
            args.push(format!(
                "'{}', {} IS NOT NULL",
                self.presence,
                ColumnRef::related(key)
            ));
        }
        format!("to_jsonb({}) || jsonb_build_object({})", PRIMARY, args.join(", "))
    }

    fn lateral(&self) -> String {
        let keys: Vec<String> = self
            .keys
            .iter()
            .map(|&(inner, outer)| {
                format!(
                    "{} = {}",
                    ColumnRef::new(LATERAL, inner),
                    ColumnRef::primary(outer)
                )
            })
            .collect();
        format!(
            " LEFT JOIN LATERAL (SELECT * FROM {} {} WHERE {} ORDER BY {} LIMIT 1) {} ON TRUE",
            self.table,
            LATERAL,
            keys.join(" AND "),
            ColumnRef::new(LATERAL, self.identity),
            RELATED
        )
    }
}

impl SelectQuery {
    pub fn render(&self) -> Rendered {
        let mut w = SqlWriter::default();
        let projection = match &self.join {
            Some(join) => join.projection(),
            None => format!("to_jsonb({})", PRIMARY),
        };
        w.push(&format!("SELECT {} AS data FROM {} {}", projection, self.from, PRIMARY));
        if let Some(join) = &self.join {
            w.push(&join.lateral());
        }
        w.where_clause(&self.predicates);
        if !self.order.is_empty() {
            let terms: Vec<String> = self
                .order
                .iter()
                .map(|o| format!("{} {} NULLS LAST", o.column, o.direction.as_sql()))
                .collect();
            w.push(" ORDER BY ");
            w.push(&terms.join(", "));
        }
        if let Some(limit) = self.limit {
            let placeholder = w.bind(&SqlParam::Long(limit));
            w.push(&format!(" LIMIT {}", placeholder));
        }
        if let Some(offset) = self.offset {
            let placeholder = w.bind(&SqlParam::Long(offset));
            w.push(&format!(" OFFSET {}", placeholder));
        }
        w.finish()
    }
}

impl CountQuery {
    pub fn render(&self) -> Rendered {
        let mut w = SqlWriter::default();
        w.push(&format!("SELECT COUNT(*) FROM {} {}", self.from, PRIMARY));
        w.where_clause(&self.predicates);
        w.finish()
    }
}

impl InsertStatement {
    pub fn render(&self) -> Rendered {
        let mut w = SqlWriter::default();
        let columns: Vec<String> = self
            .values
            .iter()
            .map(|(column, _)| format!("\"{}\"", column))
            .collect();
        let placeholders: Vec<String> = self.values.iter().map(|(_, v)| w.bind(v)).collect();
        w.push(&format!(
            "INSERT INTO {} AS {} ({}) VALUES ({}) RETURNING to_jsonb({}) AS data",
            self.into,
            PRIMARY,
            columns.join(", "),
            placeholders.join(", "),
            PRIMARY
        ));
        w.finish()
    }
}

impl UpdateStatement {
    pub fn render(&self) -> Rendered {
        let mut w = SqlWriter::default();
        let assignments: Vec<String> = self
            .assignments
            .iter()
            .map(|(column, value)| format!("\"{}\" = {}", column, w.bind(value)))
            .collect();
        w.push(&format!(
            "UPDATE {} AS {} SET {}",
            self.table,
            PRIMARY,
            assignments.join(", ")
        ));
        w.where_clause(&self.predicates);
        w.finish()
    }
}

impl DeleteStatement {
    pub fn render(&self) -> Rendered {
        let mut w = SqlWriter::default();
        w.push(&format!("DELETE FROM {} AS {}", self.from, PRIMARY));
        w.where_clause(&self.predicates);
        w.finish()
    }
}
