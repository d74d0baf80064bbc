//! Read-only schema introspection over a configured relational store.
//!
//! Supports SQLite and PostgreSQL through the sqlx `Any` driver; the dialect
//! is chosen from the connection-string scheme. Connections are opened
//! lazily so a configured-but-unreachable database surfaces as a tool error,
//! not a startup failure.

use serde_json::json;
use sqlx::any::AnyPoolOptions;
use sqlx::{AnyPool, Row};
use tracing::debug;

use crate::error::{CmdsageError, Result};

/// SQL dialect derived from the connection string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    fn from_url(url: &str) -> Result<Self> {
        if url.starts_with("sqlite:") {
            Ok(Self::Sqlite)
        } else if url.starts_with("postgres:") || url.starts_with("postgresql:") {
            Ok(Self::Postgres)
        } else {
            Err(CmdsageError::Configuration(format!(
                "unsupported connection string scheme in '{url}'"
            )))
        }
    }
}

/// Handle to the introspection target shared by the SQL tools.
#[derive(Debug)]
pub struct Database {
    pool: AnyPool,
    dialect: Dialect,
}

impl Database {
    /// Parse the connection string and set up a lazy pool.
    pub fn connect_lazy(url: &str) -> Result<Self> {
        sqlx::any::install_default_drivers();
        let dialect = Dialect::from_url(url)?;
        let pool = AnyPoolOptions::new()
            .max_connections(2)
            .connect_lazy(url)?;
        debug!(?dialect, "configured schema introspection target");
        Ok(Self { pool, dialect })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// List user-defined tables.
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let sql = match self.dialect {
            Dialect::Sqlite => {
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
            }
            Dialect::Postgres => {
                "SELECT tablename FROM pg_catalog.pg_tables \
                 WHERE schemaname = 'public' ORDER BY tablename"
            }
        };
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter().map(|row| Ok(row.try_get(0)?)).collect()
    }

    /// Column and index metadata for one table.
    ///
    /// Shape: `{ columns: [{name, type, nullable, default, primary_key,
    /// foreign_key}], indexes: [{name, column_names, unique}] }`.
    pub async fn table_schema(&self, table: &str) -> Result<serde_json::Value> {
        check_identifier(table)?;
        match self.dialect {
            Dialect::Sqlite => self.sqlite_schema(table).await,
            Dialect::Postgres => self.postgres_schema(table).await,
        }
    }

    async fn sqlite_schema(&self, table: &str) -> Result<serde_json::Value> {
        // PRAGMA does not take bind parameters; `table` was identifier-checked.
        let column_rows = sqlx::query(&format!("PRAGMA table_info(\"{table}\")"))
            .fetch_all(&self.pool)
            .await?;
        if column_rows.is_empty() {
            return Err(CmdsageError::tool(
                "get_table_schema",
                format!("no such table: {table}"),
            ));
        }

        let fk_rows = sqlx::query(&format!("PRAGMA foreign_key_list(\"{table}\")"))
            .fetch_all(&self.pool)
            .await?;
        let mut foreign_keys = std::collections::HashMap::new();
        for row in &fk_rows {
            let from: String = row.try_get("from")?;
            let referred_table: String = row.try_get("table")?;
            let to: Option<String> = row.try_get("to")?;
            let target = match to {
                Some(col) => format!("{referred_table}.{col}"),
                None => referred_table,
            };
            foreign_keys.insert(from, target);
        }

        let mut columns = Vec::new();
        for row in &column_rows {
            let name: String = row.try_get("name")?;
            let type_name: String = row.try_get("type")?;
            let notnull: i64 = row.try_get("notnull")?;
            let default: Option<String> = row.try_get("dflt_value")?;
            let pk: i64 = row.try_get("pk")?;
            columns.push(json!({
                "name": name,
                "type": type_name,
                "nullable": notnull == 0,
                "default": default,
                "primary_key": pk > 0,
                "foreign_key": foreign_keys.get(&name),
            }));
        }

        let mut indexes = Vec::new();
        let index_rows = sqlx::query(&format!("PRAGMA index_list(\"{table}\")"))
            .fetch_all(&self.pool)
            .await?;
        for row in &index_rows {
            let index_name: String = row.try_get("name")?;
            check_identifier(&index_name)?;
            let unique: i64 = row.try_get("unique")?;
            let member_rows = sqlx::query(&format!("PRAGMA index_info(\"{index_name}\")"))
                .fetch_all(&self.pool)
                .await?;
            let column_names: Vec<String> = member_rows
                .iter()
                .filter_map(|m| m.try_get::<Option<String>, _>("name").ok().flatten())
                .collect();
            indexes.push(json!({
                "name": index_name,
                "column_names": column_names,
                "unique": unique != 0,
            }));
        }

        Ok(json!({ "columns": columns, "indexes": indexes }))
    }

    async fn postgres_schema(&self, table: &str) -> Result<serde_json::Value> {
        let column_rows = sqlx::query(
            "SELECT column_name, data_type, is_nullable, column_default \
             FROM information_schema.columns \
             WHERE table_schema = 'public' AND table_name = $1 \
             ORDER BY ordinal_position",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;
        if column_rows.is_empty() {
            return Err(CmdsageError::tool(
                "get_table_schema",
                format!("no such table: {table}"),
            ));
        }

        let pk_rows = sqlx::query(
            "SELECT a.attname FROM pg_index ix \
             JOIN pg_class t ON t.oid = ix.indrelid \
             JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey) \
             WHERE t.relname = $1 AND ix.indisprimary",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;
        let primary_keys: std::collections::HashSet<String> = pk_rows
            .iter()
            .filter_map(|row| row.try_get(0).ok())
            .collect();

        let fk_rows = sqlx::query(
            "SELECT kcu.column_name, ccu.table_name AS referred_table, \
                    ccu.column_name AS referred_column \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu \
               ON tc.constraint_name = kcu.constraint_name \
             JOIN information_schema.constraint_column_usage ccu \
               ON tc.constraint_name = ccu.constraint_name \
             WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_name = $1",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;
        let mut foreign_keys = std::collections::HashMap::new();
        for row in &fk_rows {
            let column: String = row.try_get("column_name")?;
            let referred_table: String = row.try_get("referred_table")?;
            let referred_column: String = row.try_get("referred_column")?;
            foreign_keys.insert(column, format!("{referred_table}.{referred_column}"));
        }

        let mut columns = Vec::new();
        for row in &column_rows {
            let name: String = row.try_get("column_name")?;
            let type_name: String = row.try_get("data_type")?;
            let is_nullable: String = row.try_get("is_nullable")?;
            let default: Option<String> = row.try_get("column_default")?;
            columns.push(json!({
                "name": name,
                "type": type_name,
                "nullable": is_nullable == "YES",
                "default": default,
                "primary_key": primary_keys.contains(&name),
                "foreign_key": foreign_keys.get(&name),
            }));
        }

        let index_rows = sqlx::query(
            "SELECT i.relname AS index_name, a.attname AS column_name, \
                    ix.indisunique AS is_unique \
             FROM pg_class t \
             JOIN pg_index ix ON t.oid = ix.indrelid \
             JOIN pg_class i ON i.oid = ix.indexrelid \
             JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey) \
             WHERE t.relname = $1 \
             ORDER BY i.relname",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;
        let mut indexes: Vec<(String, Vec<String>, bool)> = Vec::new();
        for row in &index_rows {
            let index_name: String = row.try_get("index_name")?;
            let column: String = row.try_get("column_name")?;
            let unique: bool = row.try_get("is_unique")?;
            match indexes.iter_mut().find(|(name, _, _)| *name == index_name) {
                Some((_, columns, _)) => columns.push(column),
                None => indexes.push((index_name, vec![column], unique)),
            }
        }
        let indexes: Vec<serde_json::Value> = indexes
            .into_iter()
            .map(|(name, column_names, unique)| {
                json!({ "name": name, "column_names": column_names, "unique": unique })
            })
            .collect();

        Ok(json!({ "columns": columns, "indexes": indexes }))
    }
}

/// Reject anything that cannot be interpolated as a bare identifier.
fn check_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(CmdsageError::InvalidArgument(format!(
            "'{name}' is not a valid identifier"
        )))
    }
}
