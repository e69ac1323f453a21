//! In-Memory Relational Store
//!
//! Wraps an in-memory SQLite database holding exactly one table, `data`,
//! rebuilt from the current Dataset on every load. Generated SQL originates
//! from a language model and is untrusted text, so by default only statements
//! that parse as a single SELECT are allowed through; the guard can be
//! disabled to restore the original trust-everything behavior.

use crate::dataset::{Dataset, Value};
use crate::error::{QueryBotError, Result};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use sqlparser::ast::Statement;
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use tracing::{info, warn};

/// The single table every query runs against.
pub const TABLE_NAME: &str = "data";

/// Ephemeral single-table SQLite store.
pub struct Store {
    conn: Connection,
    read_only: bool,
}

impl Store {
    /// Open a fresh in-memory database with the SELECT-only guard enabled.
    pub fn open() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| QueryBotError::Query(format!("Failed to open in-memory store: {}", e)))?;
        Ok(Self {
            conn,
            read_only: true,
        })
    }

    /// Disable the SELECT-only guard. Any statement the engine accepts will
    /// run, including data-modifying ones. Known weakness, kept for parity.
    pub fn allow_writes(mut self) -> Self {
        warn!("SELECT-only guard disabled; generated SQL is fully trusted");
        self.read_only = false;
        self
    }

    /// Load a Dataset into the `data` table, replacing any prior contents.
    /// Column affinity is inferred per column; mixed-type columns fall back
    /// to TEXT cell by cell.
    pub fn load(&self, dataset: &Dataset) -> Result<()> {
        if dataset.columns.is_empty() {
            return Err(QueryBotError::Query(
                "Cannot load a dataset with no columns".to_string(),
            ));
        }
        self.conn
            .execute_batch(&format!("DROP TABLE IF EXISTS \"{}\";", TABLE_NAME))
            .map_err(|e| QueryBotError::Query(format!("Failed to reset store: {}", e)))?;

        let decls: Vec<String> = dataset
            .columns
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let affinity = infer_affinity(&dataset.column_values(idx));
                format!("\"{}\" {}", escape_ident(name), affinity)
            })
            .collect();
        let ddl = format!("CREATE TABLE \"{}\" ({})", TABLE_NAME, decls.join(", "));
        self.conn
            .execute(&ddl, [])
            .map_err(|e| QueryBotError::Query(format!("Failed to create table: {}", e)))?;

        let placeholders: Vec<String> = (1..=dataset.columns.len())
            .map(|i| format!("?{}", i))
            .collect();
        let insert = format!(
            "INSERT INTO \"{}\" VALUES ({})",
            TABLE_NAME,
            placeholders.join(", ")
        );
        let mut stmt = self
            .conn
            .prepare(&insert)
            .map_err(|e| QueryBotError::Query(format!("Failed to prepare insert: {}", e)))?;
        for row in &dataset.rows {
            let params: Vec<rusqlite::types::Value> =
                row.iter().map(value_to_sql).collect();
            stmt.execute(rusqlite::params_from_iter(params))
                .map_err(|e| QueryBotError::Query(format!("Failed to insert row: {}", e)))?;
        }

        info!(
            rows = dataset.row_count(),
            columns = dataset.column_count(),
            "loaded dataset into store"
        );
        Ok(())
    }

    /// Execute SQL text against the store and return a Dataset-shaped result.
    pub fn query(&self, sql: &str) -> Result<Dataset> {
        if self.read_only {
            check_select_only(sql)?;
        }
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| QueryBotError::Query(format!("{}", e)))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let column_count = columns.len();

        let mut rows = Vec::new();
        let mut raw_rows = stmt
            .query([])
            .map_err(|e| QueryBotError::Query(format!("{}", e)))?;
        while let Some(raw) = raw_rows
            .next()
            .map_err(|e| QueryBotError::Query(format!("{}", e)))?
        {
            let mut row = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                let value = raw
                    .get_ref(idx)
                    .map_err(|e| QueryBotError::Query(format!("{}", e)))?;
                row.push(sql_to_value(value));
            }
            rows.push(row);
        }

        Dataset::new(columns, rows)
    }
}

/// Reject anything that is not exactly one SELECT statement.
fn check_select_only(sql: &str) -> Result<()> {
    let statements = Parser::parse_sql(&SQLiteDialect {}, sql)
        .map_err(|e| QueryBotError::Query(format!("Failed to parse generated SQL: {}", e)))?;
    if statements.len() != 1 {
        return Err(QueryBotError::Query(format!(
            "Expected a single statement, got {}",
            statements.len()
        )));
    }
    match &statements[0] {
        Statement::Query(_) => Ok(()),
        other => Err(QueryBotError::Query(format!(
            "Only SELECT statements are allowed, got: {}",
            statement_kind(other)
        ))),
    }
}

fn statement_kind(statement: &Statement) -> &'static str {
    match statement {
        Statement::Insert { .. } => "INSERT",
        Statement::Update { .. } => "UPDATE",
        Statement::Delete { .. } => "DELETE",
        Statement::Drop { .. } => "DROP",
        Statement::CreateTable { .. } => "CREATE TABLE",
        Statement::AlterTable { .. } => "ALTER TABLE",
        _ => "non-SELECT statement",
    }
}

/// SQLite column affinity for a column's observed values.
fn infer_affinity(values: &[Value]) -> &'static str {
    let mut saw_int = false;
    let mut saw_float = false;
    for value in values {
        match value {
            Value::Null => {}
            Value::Int(_) => saw_int = true,
            Value::Float(_) => saw_float = true,
            Value::Text(_) => return "TEXT",
        }
    }
    if saw_float {
        "REAL"
    } else if saw_int {
        "INTEGER"
    } else {
        "TEXT"
    }
}

fn escape_ident(name: &str) -> String {
    name.replace('"', "\"\"")
}

fn value_to_sql(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Int(v) => rusqlite::types::Value::Integer(*v),
        Value::Float(v) => rusqlite::types::Value::Real(*v),
        Value::Text(s) => rusqlite::types::Value::Text(s.clone()),
    }
}

fn sql_to_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int(v),
        ValueRef::Real(v) => Value::Float(v),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).to_string()),
        ValueRef::Blob(bytes) => Value::Text(String::from_utf8_lossy(bytes).to_string()),
    }
}
