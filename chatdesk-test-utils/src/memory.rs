//! In-memory `Store`.
//!
//! Interprets the structured query types directly against JSON rows, with
//! the same semantics the PostgreSQL backend gets from the rendered SQL:
//! NULL never compares equal, ordering puts NULLs last, the enrichment join
//! picks at most one related row, and `EXISTS` probes correlate on keys.
//!
//! Every call is recorded with its rendered SQL so tests can assert which
//! round trips happened and in what order.

use async_trait::async_trait;
use chatdesk_core::StoreError;
use chatdesk_query::sql::{PRIMARY, PROBE, RELATED};
use chatdesk_query::{
    ColumnRef, CountQuery, DeleteStatement, InsertStatement, OrderBy, Predicate, QualifiedTable,
    RelatedJoin, SelectQuery, SortDirection, SqlParam, Store, StoreResult, Table, TenantSchema,
    UpdateStatement,
};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

// ============================================================================
// CALL LOG
// ============================================================================

/// Kind of store round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Count,
    Fetch,
    Insert,
    Update,
    Delete,
}

/// One recorded round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreCall {
    pub kind: CallKind,
    pub sql: String,
    pub params: Vec<SqlParam>,
}

// ============================================================================
// MEMORY STORE
// ============================================================================

/// Rows of every seeded tenant table, keyed by qualified table.
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<HashMap<QualifiedTable, Vec<JsonValue>>>,
    /// `(table, column)` pairs that reject duplicate inserts.
    unique: Vec<(Table, &'static str)>,
    next_id: AtomicI64,
    calls: Mutex<Vec<StoreCall>>,
    failures: Mutex<HashMap<CallKind, StoreError>>,
    latency: Option<Duration>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            unique: vec![(Table::Agents, "agent_id"), (Table::Contacts, "id")],
            next_id: AtomicI64::new(1),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            latency: None,
        }
    }
}

static NULL: JsonValue = JsonValue::Null;

fn poisoned() -> StoreError {
    StoreError::Unavailable {
        reason: "memory store lock poisoned".to_string(),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` before it touches any row.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Add one serialized entity to a tenant table. A missing `id` gets the
    /// next serial value, as a `bigserial` column would.
    pub fn seed<T: Serialize>(&self, schema: &TenantSchema, table: Table, row: &T) {
        let value = match serde_json::to_value(row) {
            Ok(value) => value,
            Err(e) => panic!("seed row does not serialize: {e}"),
        };
        self.seed_json(schema, table, value);
    }

    pub fn seed_json(&self, schema: &TenantSchema, table: Table, mut row: JsonValue) {
        self.assign_id(&mut row);
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        tables.entry(schema.table(table)).or_default().push(row);
    }

    /// Current rows of a table, in insertion order.
    pub fn rows(&self, schema: &TenantSchema, table: Table) -> Vec<JsonValue> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        tables.get(&schema.table(table)).cloned().unwrap_or_default()
    }

    /// Every round trip so far.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Kinds of every round trip so far.
    pub fn call_kinds(&self) -> Vec<CallKind> {
        self.calls().into_iter().map(|c| c.kind).collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Make every call of `kind` fail with `error` until cleared.
    pub fn fail(&self, kind: CallKind, error: StoreError) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(kind, error);
    }

    pub fn clear_failures(&self) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    fn assign_id(&self, row: &mut JsonValue) {
        if let JsonValue::Object(map) = row {
            if map.get("id").map_or(true, JsonValue::is_null) {
                let id = self.next_id.fetch_add(1, AtomicOrdering::SeqCst);
                map.insert("id".to_string(), JsonValue::from(id));
            }
        }
    }

    async fn enter(&self, kind: CallKind, sql: String, params: Vec<SqlParam>) -> StoreResult<()> {
        self.calls
            .lock()
            .map_err(|_| poisoned())?
            .push(StoreCall { kind, sql, params });
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let failures = self.failures.lock().map_err(|_| poisoned())?;
        match failures.get(&kind) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn table_rows(&self, table: &QualifiedTable) -> StoreResult<Vec<JsonValue>> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(tables.get(table).cloned().unwrap_or_default())
    }
}

// ============================================================================
// EVALUATION
// ============================================================================

/// Rows visible to a predicate under each alias.
#[derive(Clone, Copy)]
struct Scope<'a> {
    primary: &'a JsonValue,
    related: Option<&'a JsonValue>,
    probe: Option<&'a JsonValue>,
}

impl<'a> Scope<'a> {
    fn primary(row: &'a JsonValue) -> Self {
        Self {
            primary: row,
            related: None,
            probe: None,
        }
    }

    fn get(&self, column: &ColumnRef) -> &'a JsonValue {
        let row = match column.alias {
            PRIMARY => Some(self.primary),
            RELATED => self.related,
            PROBE => self.probe,
            _ => None,
        };
        row.and_then(|r| r.get(column.column))
            .unwrap_or(&NULL)
    }
}

/// SQL comparison: `None` when either side is NULL or the types differ.
fn compare(a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (JsonValue::String(x), JsonValue::String(y)) => Some(x.cmp(y)),
        (JsonValue::Bool(x), JsonValue::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn sql_eq(a: &JsonValue, b: &JsonValue) -> bool {
    compare(a, b) == Some(Ordering::Equal)
}

/// Translate an escaped LIKE pattern into an anchored, case-insensitive regex.
fn like_regex(pattern: &str) -> StoreResult<Regex> {
    let mut out = String::from("(?is)^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push_str(&regex::escape(&next.to_string()));
                }
            }
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    Regex::new(&out).map_err(|e| StoreError::Execution {
        reason: format!("invalid LIKE pattern: {e}"),
    })
}

fn text_param(param: &SqlParam) -> StoreResult<&str> {
    match param {
        SqlParam::String(s) => Ok(s),
        other => Err(StoreError::Execution {
            reason: format!("expected text parameter, got {other:?}"),
        }),
    }
}

fn keys_match(
    keys: &[(&str, &str)],
    related: &JsonValue,
    primary: &JsonValue,
) -> bool {
    keys.iter().all(|&(inner, outer)| {
        let a = related.get(inner).unwrap_or(&NULL);
        let b = primary.get(outer).unwrap_or(&NULL);
        sql_eq(a, b)
    })
}

impl MemoryStore {
    fn eval(&self, predicate: &Predicate, scope: Scope<'_>) -> StoreResult<bool> {
        Ok(match predicate {
            Predicate::Eq(column, value) => sql_eq(scope.get(column), &value.to_json()),
            Predicate::Gt(column, value) => {
                compare(scope.get(column), &value.to_json()) == Some(Ordering::Greater)
            }
            Predicate::IsNull(column) => scope.get(column).is_null(),
            Predicate::IsNotNull(column) => !scope.get(column).is_null(),
            Predicate::Regex(column, value) => {
                let re = Regex::new(text_param(value)?).map_err(|e| StoreError::Execution {
                    reason: format!("invalid regular expression: {e}"),
                })?;
                scope.get(column).as_str().is_some_and(|s| re.is_match(s))
            }
            Predicate::ILike(column, value) => {
                let re = like_regex(text_param(value)?)?;
                scope.get(column).as_str().is_some_and(|s| re.is_match(s))
            }
            Predicate::AnyOf(column, value) => match value {
                SqlParam::StringArray(options) => scope
                    .get(column)
                    .as_str()
                    .is_some_and(|s| options.iter().any(|o| o == s)),
                other => {
                    return Err(StoreError::Execution {
                        reason: format!("ANY expects an array parameter, got {other:?}"),
                    })
                }
            },
            Predicate::Or(terms) => {
                for term in terms {
                    if self.eval(term, scope)? {
                        return Ok(true);
                    }
                }
                false
            }
            Predicate::Exists { probe, negated } => {
                let mut found = false;
                for row in self.table_rows(&probe.table)? {
                    if !keys_match(probe.keys, &row, scope.primary) {
                        continue;
                    }
                    let inner = Scope {
                        probe: Some(&row),
                        ..scope
                    };
                    if self.all(&probe.predicates, inner)? {
                        found = true;
                        break;
                    }
                }
                found != *negated
            }
        })
    }

    fn all(&self, predicates: &[Predicate], scope: Scope<'_>) -> StoreResult<bool> {
        for predicate in predicates {
            if !self.eval(predicate, scope)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn filter(
        &self,
        table: &QualifiedTable,
        predicates: &[Predicate],
    ) -> StoreResult<Vec<JsonValue>> {
        let mut out = Vec::new();
        for row in self.table_rows(table)? {
            if self.all(predicates, Scope::primary(&row))? {
                out.push(row);
            }
        }
        Ok(out)
    }

    /// Lowest-identity related row whose keys all match.
    fn lateral(&self, join: &RelatedJoin, primary: &JsonValue) -> StoreResult<Option<JsonValue>> {
        let mut candidates: Vec<JsonValue> = self
            .table_rows(&join.table)?
            .into_iter()
            .filter(|row| keys_match(join.keys, row, primary))
            .collect();
        candidates.sort_by(|a, b| {
            let left = a.get(join.identity).unwrap_or(&NULL);
            let right = b.get(join.identity).unwrap_or(&NULL);
            nulls_last(left, right, SortDirection::Asc)
        });
        Ok(candidates.into_iter().next())
    }
}

fn nulls_last(a: &JsonValue, b: &JsonValue, direction: SortDirection) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ord = compare(a, b).unwrap_or(Ordering::Equal);
            match direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        }
    }
}

fn order_rows(rows: &mut [(JsonValue, Option<JsonValue>)], order: &[OrderBy]) {
    rows.sort_by(|(pa, ra), (pb, rb)| {
        let left = Scope {
            primary: pa,
            related: ra.as_ref(),
            probe: None,
        };
        let right = Scope {
            primary: pb,
            related: rb.as_ref(),
            probe: None,
        };
        order
            .iter()
            .map(|o| nulls_last(left.get(&o.column), right.get(&o.column), o.direction))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

fn project(primary: JsonValue, related: Option<&JsonValue>, join: &RelatedJoin) -> JsonValue {
    let mut map = match primary {
        JsonValue::Object(map) => map,
        _ => Map::new(),
    };
    for &(name, column) in join.columns {
        let value = related
            .and_then(|r| r.get(column))
            .cloned()
            .unwrap_or(JsonValue::Null);
        map.insert(name.to_string(), value);
    }
    let present = match (related, join.keys.first()) {
        (Some(row), Some(&(key, _))) => row.get(key).is_some_and(|v| !v.is_null()),
        _ => false,
    };
    map.insert(join.presence.to_string(), JsonValue::Bool(present));
    JsonValue::Object(map)
}

fn to_usize(value: i64) -> usize {
    usize::try_from(value.max(0)).unwrap_or(usize::MAX)
}

// ============================================================================
// STORE IMPLEMENTATION
// ============================================================================

#[async_trait]
impl Store for MemoryStore {
    async fn count(&self, query: &CountQuery) -> StoreResult<i64> {
        let rendered = query.render();
        self.enter(CallKind::Count, rendered.sql, rendered.params)
            .await?;
        let rows = self.filter(&query.from, &query.predicates)?;
        Ok(rows.len() as i64)
    }

    async fn fetch(&self, query: &SelectQuery) -> StoreResult<Vec<JsonValue>> {
        let rendered = query.render();
        self.enter(CallKind::Fetch, rendered.sql, rendered.params)
            .await?;

        let mut rows = Vec::new();
        for primary in self.table_rows(&query.from)? {
            let related = match &query.join {
                Some(join) => self.lateral(join, &primary)?,
                None => None,
            };
            let scope = Scope {
                primary: &primary,
                related: related.as_ref(),
                probe: None,
            };
            if self.all(&query.predicates, scope)? {
                rows.push((primary, related));
            }
        }
        order_rows(&mut rows, &query.order);

        let offset = query.offset.map_or(0, to_usize);
        let limit = query.limit.map_or(usize::MAX, to_usize);
        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(primary, related)| match &query.join {
                Some(join) => project(primary, related.as_ref(), join),
                None => primary,
            })
            .collect())
    }

    async fn insert(&self, statement: &InsertStatement) -> StoreResult<JsonValue> {
        let rendered = statement.render();
        self.enter(CallKind::Insert, rendered.sql, rendered.params)
            .await?;

        let mut map = Map::new();
        for (column, value) in &statement.values {
            map.insert(column.to_string(), value.to_json());
        }
        let mut row = JsonValue::Object(map);
        self.assign_id(&mut row);

        let table = statement.into.table();
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        let rows = tables.entry(statement.into.clone()).or_default();
        for &(unique_table, column) in &self.unique {
            if unique_table != table {
                continue;
            }
            let value = row.get(column).unwrap_or(&NULL);
            if rows
                .iter()
                .any(|existing| sql_eq(existing.get(column).unwrap_or(&NULL), value))
            {
                return Err(StoreError::Constraint {
                    constraint: format!("{}_{}_key", table.name(), column),
                    reason: format!("duplicate key value for {column}"),
                });
            }
        }
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, statement: &UpdateStatement) -> StoreResult<u64> {
        let rendered = statement.render();
        self.enter(CallKind::Update, rendered.sql, rendered.params)
            .await?;

        let matched: Vec<bool> = {
            let rows = self.table_rows(&statement.table)?;
            let mut flags = Vec::with_capacity(rows.len());
            for row in &rows {
                flags.push(self.all(&statement.predicates, Scope::primary(row))?);
            }
            flags
        };

        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        let Some(rows) = tables.get_mut(&statement.table) else {
            return Ok(0);
        };
        let mut updated = 0;
        for (row, hit) in rows.iter_mut().zip(matched) {
            if !hit {
                continue;
            }
            if let JsonValue::Object(map) = row {
                for (column, value) in &statement.assignments {
                    map.insert(column.to_string(), value.to_json());
                }
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn delete(&self, statement: &DeleteStatement) -> StoreResult<u64> {
        let rendered = statement.render();
        self.enter(CallKind::Delete, rendered.sql, rendered.params)
            .await?;

        let matched: Vec<bool> = {
            let rows = self.table_rows(&statement.from)?;
            let mut flags = Vec::with_capacity(rows.len());
            for row in &rows {
                flags.push(self.all(&statement.predicates, Scope::primary(row))?);
            }
            flags
        };

        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        let Some(rows) = tables.get_mut(&statement.from) else {
            return Ok(0);
        };
        let before = rows.len();
        let mut hits = matched.into_iter();
        rows.retain(|_| !hits.next().unwrap_or(false));
        Ok((before - rows.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatdesk_core::{QueryConfig, TenantId};
    use serde_json::json;

    fn schema() -> TenantSchema {
        let tenant = TenantId::parse("acme").unwrap();
        TenantSchema::resolve(&QueryConfig::default(), &tenant).unwrap()
    }

    #[test]
    fn test_like_regex_honors_escapes() {
        let re = like_regex("%50\\%%").unwrap();
        assert!(re.is_match("get 50% off"));
        assert!(!re.is_match("get 500 off"));
        let re = like_regex("%a\\_b%").unwrap();
        assert!(re.is_match("A_B"));
        assert!(!re.is_match("axb"));
    }

    #[test]
    fn test_null_never_equal() {
        assert!(!sql_eq(&json!(null), &json!(null)));
        assert!(sql_eq(&json!(3), &json!(3.0)));
    }

    #[test]
    fn test_nulls_sort_last_both_directions() {
        let mut values = vec![json!(null), json!(1), json!(3)];
        values.sort_by(|a, b| nulls_last(a, b, SortDirection::Desc));
        assert_eq!(values, vec![json!(3), json!(1), json!(null)]);
        values.sort_by(|a, b| nulls_last(a, b, SortDirection::Asc));
        assert_eq!(values, vec![json!(1), json!(3), json!(null)]);
    }

    #[tokio::test]
    async fn test_seed_assigns_serial_ids() {
        let store = MemoryStore::new();
        let schema = schema();
        store.seed_json(&schema, Table::Chats, json!({"chat_id": "a"}));
        store.seed_json(&schema, Table::Chats, json!({"chat_id": "b"}));
        let rows = store.rows(&schema, Table::Chats);
        assert_eq!(rows[0]["id"], json!(1));
        assert_eq!(rows[1]["id"], json!(2));
    }

    #[tokio::test]
    async fn test_injected_failure_is_recorded_and_returned() {
        let store = MemoryStore::new();
        let schema = schema();
        store.fail(CallKind::Count, StoreError::PoolExhausted);
        let query = CountQuery {
            from: schema.chats(),
            predicates: vec![],
        };
        let result = store.count(&query).await;
        assert_eq!(result, Err(StoreError::PoolExhausted));
        assert_eq!(store.call_kinds(), vec![CallKind::Count]);
        assert!(store.calls()[0].sql.starts_with("SELECT COUNT(*)"));
    }
}
