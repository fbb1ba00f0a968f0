#![allow(dead_code)]

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use schemer::config::Config;
use schemer::database::{Database, Row, SqlValue};
use schemer::error::{MigrateError, Result};
use schemer::history::{
    CREATE_HISTORY_TABLE_SQL, DELETE_HISTORY_SQL, HISTORY_TABLE, INSERT_HISTORY_SQL,
    SELECT_HISTORY_SQL,
};

#[derive(Debug, Clone, Default)]
struct State {
    tables: BTreeSet<String>,
    history: Option<Vec<(String, NaiveDateTime)>>,
}

/// In-memory session with transactional DDL.
///
/// `begin` snapshots tables and history, `rollback` restores the snapshot.
/// Only the statements the migrator issues are understood.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    state: State,
    snapshot: Option<State>,
    fail_on_ddl: Option<usize>,
    ddl_count: usize,
    /// Every successful CREATE/DROP of a user table, in order.
    pub statements: Vec<String>,
    /// Foreign key check toggles, in order.
    pub foreign_key_checks: Vec<bool>,
    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the `n`th CREATE/DROP statement (1-based).
    pub fn fail_on_ddl(mut self, n: usize) -> Self {
        self.fail_on_ddl = Some(n);
        self
    }

    pub fn with_table(mut self, table: &str) -> Self {
        self.state.tables.insert(table.to_string());
        self
    }

    /// Creates the history table holding `records`.
    pub fn with_history(mut self, records: &[(&str, NaiveDateTime)]) -> Self {
        self.state.history = Some(
            records
                .iter()
                .map(|(name, at)| (name.to_string(), *at))
                .collect(),
        );
        self
    }

    pub fn tables(&self) -> Vec<String> {
        self.state.tables.iter().cloned().collect()
    }

    pub fn has_history_table(&self) -> bool {
        self.state.history.is_some()
    }

    pub fn history(&self) -> Vec<String> {
        self.history_records()
            .into_iter()
            .map(|(name, _)| name)
            .collect()
    }

    pub fn history_records(&self) -> Vec<(String, NaiveDateTime)> {
        self.state.history.clone().unwrap_or_default()
    }

    fn count_ddl(&mut self, sql: &str) -> Result<()> {
        self.ddl_count += 1;
        if self.fail_on_ddl == Some(self.ddl_count) {
            return Err(MigrateError::InvalidState(format!("injected failure: {sql}")));
        }
        Ok(())
    }

    fn history_mut(&mut self) -> Result<&mut Vec<(String, NaiveDateTime)>> {
        self.state
            .history
            .as_mut()
            .ok_or_else(|| MigrateError::InvalidState("history table missing".into()))
    }
}

fn table_after(sql: &str, keyword: &str) -> Option<String> {
    sql.strip_prefix(keyword)?
        .split(|c: char| c == ' ' || c == '(')
        .next()
        .map(str::to_string)
}

impl Database for MemoryDatabase {
    async fn begin(&mut self) -> Result<()> {
        if self.snapshot.is_some() {
            return Err(MigrateError::InvalidState("nested transaction".into()));
        }
        self.snapshot = Some(self.state.clone());
        self.begins += 1;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.snapshot
            .take()
            .ok_or_else(|| MigrateError::InvalidState("no transaction".into()))?;
        self.commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.state = self
            .snapshot
            .take()
            .ok_or_else(|| MigrateError::InvalidState("no transaction".into()))?;
        self.rollbacks += 1;
        Ok(())
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        if sql == CREATE_HISTORY_TABLE_SQL {
            if self.state.history.is_some() {
                return Err(MigrateError::InvalidState("history table exists".into()));
            }
            self.state.history = Some(Vec::new());
            return Ok(0);
        }

        if sql == INSERT_HISTORY_SQL {
            let record = match params {
                [SqlValue::Text(name), SqlValue::Timestamp(at)] => (name.clone(), *at),
                other => {
                    return Err(MigrateError::InvalidState(format!(
                        "bad history params: {other:?}"
                    )))
                }
            };
            self.history_mut()?.push(record);
            return Ok(1);
        }

        if sql == DELETE_HISTORY_SQL {
            let Some(SqlValue::Text(name)) = params.first() else {
                return Err(MigrateError::InvalidState("bad delete params".into()));
            };
            let name = name.clone();
            let history = self.history_mut()?;
            let before = history.len();
            history.retain(|(migration, _)| *migration != name);
            return Ok((before - history.len()) as u64);
        }

        if let Some(table) = table_after(sql, "CREATE TABLE ") {
            self.count_ddl(sql)?;
            if !self.state.tables.insert(table.clone()) {
                return Err(MigrateError::InvalidState(format!("{table} exists")));
            }
            self.statements.push(sql.to_string());
            return Ok(0);
        }

        if let Some(table) = table_after(sql, "DROP TABLE ") {
            self.count_ddl(sql)?;
            if !self.state.tables.remove(&table) {
                return Err(MigrateError::InvalidState(format!("{table} missing")));
            }
            self.statements.push(sql.to_string());
            return Ok(0);
        }

        Err(MigrateError::InvalidState(format!("unsupported: {sql}")))
    }

    async fn query(&mut self, sql: &str, _params: &[SqlValue]) -> Result<Vec<Row>> {
        if sql != SELECT_HISTORY_SQL {
            return Err(MigrateError::InvalidState(format!("unsupported: {sql}")));
        }
        let history = self.history_mut()?;
        Ok(history
            .iter()
            .map(|(name, at)| vec![SqlValue::Text(name.clone()), SqlValue::Timestamp(*at)])
            .collect())
    }

    async fn set_foreign_key_checks(&mut self, enabled: bool) -> Result<()> {
        self.foreign_key_checks.push(enabled);
        Ok(())
    }

    async fn table_exists(&mut self, table: &str) -> Result<bool> {
        if table == HISTORY_TABLE {
            return Ok(self.state.history.is_some());
        }
        Ok(self.state.tables.contains(table))
    }
}

/// `2024-01-01 hh:mm:00`.
pub fn at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

/// Configuration rooted at `root` with `models/` and `migrations/`.
pub fn config(root: &Path) -> Config {
    config_with(root, &[])
}

pub fn config_with(root: &Path, extra: &[(&str, &str)]) -> Config {
    let mut settings = vec![
        ("root".to_string(), root.display().to_string()),
        ("src".to_string(), "models".to_string()),
        ("location".to_string(), "migrations".to_string()),
        ("namespace".to_string(), "App.Models".to_string()),
    ];
    settings.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    Config::from_settings(settings).unwrap()
}

/// Writes a create-table migration with a single primary `id` column.
pub fn write_create(dir: &Path, filename: &str, table: &str) {
    fs::create_dir_all(dir).unwrap();
    let content = format!(
        r#"{{"table": "{table}", "action": "create", "columns": [
            {{"name": "id", "type": "int", "length": null, "primary": true,
              "unsigned": false, "foreign": false, "null": false}}
        ]}}"#
    );
    fs::write(dir.join(filename), content).unwrap();
}
