// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! SQLite-backed record store that answers paginated list queries locally.
//!
//! Each record is a JSON document kept per api name. Filters use the same
//! language the REST backend takes: `{"contains": s}`, `{"in": [...]}`,
//! `{"gte"|"gt"|"lte"|"lt": n}`, or a bare value for exact match.

use anyhow::{Context, Result, anyhow, bail};
use procon_app::{EntityId, ListParams, Page, PaginatedFetch, Record, SortKey};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde_json::Value;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

pub const APP_NAME: &str = "procon";
pub const MAX_PAGE_SIZE: usize = 500;

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[(
    "records",
    &["api", "id", "body", "created_at", "updated_at"],
)];

struct RequiredIndex {
    name: &'static str,
    create_sql: &'static str,
}

const REQUIRED_INDEXES: &[RequiredIndex] = &[RequiredIndex {
    name: "idx_records_api_updated",
    create_sql: "CREATE INDEX IF NOT EXISTS idx_records_api_updated ON records (api, updated_at)",
}];

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        } else {
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
        }
        ensure_required_indexes(&self.conn)?;
        Ok(())
    }

    /// Inserts or replaces a record. A record without an id gets the next
    /// free one for its api.
    pub fn upsert(&self, api: &str, record: &Record) -> Result<EntityId> {
        validate_api(api)?;
        let id = match record.get("id") {
            Some(raw) => EntityId::from_value(raw)
                .ok_or_else(|| anyhow!("record id {raw} for {api} is not an integer"))?,
            None => self.next_id(api)?,
        };
        let mut body = record.clone();
        body.insert("id".to_owned(), id.to_value());
        let body = Value::Object(body).to_string();
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO records (api, id, body, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?4)
                ON CONFLICT (api, id) DO UPDATE
                  SET body = excluded.body, updated_at = excluded.updated_at
                ",
                params![api, id.get(), body, now],
            )
            .with_context(|| format!("save {api} record {id}"))?;
        Ok(id)
    }

    pub fn upsert_many(&self, api: &str, records: &[Record]) -> Result<Vec<EntityId>> {
        let tx = self
            .conn
            .unchecked_transaction()
            .with_context(|| format!("begin import of {api} records"))?;
        let ids = records
            .iter()
            .map(|record| self.upsert(api, record))
            .collect::<Result<Vec<_>>>()?;
        tx.commit()
            .with_context(|| format!("commit import of {api} records"))?;
        Ok(ids)
    }

    pub fn get(&self, api: &str, id: EntityId) -> Result<Option<Record>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM records WHERE api = ? AND id = ?",
                params![api, id.get()],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("load {api} record {id}"))?;
        body.map(|body| decode_body(api, &body)).transpose()
    }

    pub fn delete(&self, api: &str, id: EntityId) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "DELETE FROM records WHERE api = ? AND id = ?",
                params![api, id.get()],
            )
            .with_context(|| format!("delete {api} record {id}"))?;
        if changed == 0 {
            bail!("{api} record {id} not found");
        }
        Ok(())
    }

    pub fn apis(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT api FROM records ORDER BY api ASC")
            .context("prepare api list")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("list apis")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect apis")
    }

    pub fn count(&self, api: &str) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM records WHERE api = ?",
                params![api],
                |row| row.get(0),
            )
            .with_context(|| format!("count {api} records"))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// One page of `api` records matching `filter`, ordered by `sort` and
    /// then by id.
    pub fn list(
        &self,
        api: &str,
        filter: &Record,
        sort: &[SortKey],
        limit: usize,
        skip: usize,
    ) -> Result<Page> {
        validate_api(api)?;
        let (clause, mut binds) = where_clause(filter)?;
        let mut where_sql = String::from("api = ?");
        if !clause.is_empty() {
            where_sql.push_str(" AND ");
            where_sql.push_str(&clause.join(" AND "));
        }
        let mut all_binds = vec![SqlValue::Text(api.to_owned())];
        all_binds.append(&mut binds);

        let count: i64 = self
            .conn
            .query_row(
                &format!("SELECT COUNT(*) FROM records WHERE {where_sql}"),
                params_from_iter(all_binds.iter()),
                |row| row.get(0),
            )
            .with_context(|| format!("count {api} records"))?;

        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let sql = format!(
            "SELECT body FROM records WHERE {where_sql} ORDER BY {} LIMIT {limit} OFFSET {skip}",
            order_clause(sort)?
        );
        debug!(api, %sql, "list records");
        let mut stmt = self
            .conn
            .prepare(&sql)
            .with_context(|| format!("prepare {api} list query"))?;
        let bodies = stmt
            .query_map(params_from_iter(all_binds.iter()), |row| {
                row.get::<_, String>(0)
            })
            .with_context(|| format!("query {api} records"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("scan {api} records"))?;

        let data = bodies
            .iter()
            .map(|body| decode_body(api, body))
            .collect::<Result<Vec<_>>>()?;
        Ok(Page {
            data,
            count: u64::try_from(count).unwrap_or(0),
        })
    }

    fn next_id(&self, api: &str) -> Result<EntityId> {
        let max: Option<i64> = self
            .conn
            .query_row(
                "SELECT MAX(id) FROM records WHERE api = ?",
                params![api],
                |row| row.get(0),
            )
            .with_context(|| format!("find next {api} id"))?;
        Ok(EntityId::new(max.unwrap_or(0) + 1))
    }
}

impl PaginatedFetch for Store {
    fn fetch_page(&mut self, page_id: &str, api: &str, params: &ListParams) -> Result<Page> {
        debug!(page_id, api, skip = params.skip, limit = params.limit, "local fetch");
        let filter = params
            .filter()
            .with_context(|| format!("decode queryInput for {api}"))?;
        let sort = params
            .sort_keys()
            .with_context(|| format!("decode sort for {api}"))?;
        self.list(api, &filter, &sort, params.limit, params.skip)
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("PROCON_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set PROCON_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("procon.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

/// Field paths are spliced into JSON paths, so only plain identifiers
/// separated by dots are accepted.
pub fn validate_field_path(field: &str) -> Result<()> {
    let valid = !field.is_empty()
        && field.split('.').all(|segment| {
            let mut chars = segment.chars();
            matches!(chars.next(), Some(first) if first.is_ascii_alphabetic() || first == '_')
                && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        });
    if !valid {
        bail!("invalid field name {field:?}; use letters, digits, '_' and '.'");
    }
    Ok(())
}

fn validate_api(api: &str) -> Result<()> {
    if api.trim().is_empty() {
        bail!("api name must not be empty");
    }
    Ok(())
}

fn column_expr(field: &str) -> Result<String> {
    validate_field_path(field)?;
    if field == "id" {
        return Ok("id".to_owned());
    }
    Ok(format!("json_extract(body, '$.{field}')"))
}

fn where_clause(filter: &Record) -> Result<(Vec<String>, Vec<SqlValue>)> {
    let mut clauses = Vec::new();
    let mut binds = Vec::new();
    for (field, condition) in filter {
        let column = column_expr(field)?;
        match condition {
            Value::Null => {}
            Value::Object(operators) => {
                for (operator, operand) in operators {
                    match operator.as_str() {
                        "contains" => {
                            let needle = operand
                                .as_str()
                                .map(str::to_owned)
                                .unwrap_or_else(|| operand.to_string());
                            clauses.push(format!("{column} LIKE ? ESCAPE '\\'"));
                            binds.push(SqlValue::Text(format!("%{}%", escape_like(&needle))));
                        }
                        "in" => {
                            let Value::Array(items) = operand else {
                                bail!("filter {field}.in must be an array");
                            };
                            if items.is_empty() {
                                clauses.push("0".to_owned());
                                continue;
                            }
                            let placeholders = vec!["?"; items.len()].join(", ");
                            clauses.push(format!("{column} IN ({placeholders})"));
                            for item in items {
                                binds.push(scalar(field, item)?);
                            }
                        }
                        "gte" | "gt" | "lte" | "lt" => {
                            let symbol = match operator.as_str() {
                                "gte" => ">=",
                                "gt" => ">",
                                "lte" => "<=",
                                _ => "<",
                            };
                            clauses.push(format!("{column} {symbol} ?"));
                            binds.push(scalar(field, operand)?);
                        }
                        other => bail!("unsupported filter operator {other:?} on {field}"),
                    }
                }
            }
            other => {
                clauses.push(format!("{column} = ?"));
                binds.push(scalar(field, other)?);
            }
        }
    }
    Ok((clauses, binds))
}

fn order_clause(sort: &[SortKey]) -> Result<String> {
    let mut parts = Vec::with_capacity(sort.len() + 1);
    let mut seen = BTreeSet::new();
    for key in sort {
        if !seen.insert(key.field.as_str()) {
            continue;
        }
        let direction = key.order.as_backend().to_ascii_uppercase();
        parts.push(format!("{} {direction}", column_expr(&key.field)?));
    }
    if !seen.contains("id") {
        parts.push("id ASC".to_owned());
    }
    Ok(parts.join(", "))
}

fn scalar(field: &str, value: &Value) -> Result<SqlValue> {
    Ok(match value {
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => SqlValue::Integer(integer),
            None => SqlValue::Real(
                number
                    .as_f64()
                    .ok_or_else(|| anyhow!("filter value for {field} is out of range"))?,
            ),
        },
        Value::String(text) => SqlValue::Text(text.clone()),
        Value::Null => SqlValue::Null,
        Value::Array(_) | Value::Object(_) => {
            bail!("filter value for {field} must be a scalar, got {value}")
        }
    })
}

fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn decode_body(api: &str, body: &str) -> Result<Record> {
    match serde_json::from_str::<Value>(body)
        .with_context(|| format!("decode stored {api} record"))?
    {
        Value::Object(record) => Ok(record),
        other => bail!("stored {api} record is not an object: {other}"),
    }
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "
            SELECT COUNT(*)
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ",
            [],
            |row| row.get(0),
        )
        .context("count user tables")?;
    Ok(count > 0)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required_columns) in REQUIRED_SCHEMA {
        let columns = table_columns(conn, table)?;
        if columns.is_empty() {
            bail!(
                "database is missing required table `{table}`; point storage.db_path at a procon database"
            );
        }
        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();
        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}; recreate the database",
                missing.join(", ")
            );
        }
    }
    Ok(())
}

fn ensure_required_indexes(conn: &Connection) -> Result<()> {
    for index in REQUIRED_INDEXES {
        conn.execute_batch(index.create_sql)
            .with_context(|| format!("ensure required index `{}`", index.name))?;
    }
    Ok(())
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;
    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("format current timestamp")
}
