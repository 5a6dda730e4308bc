// Copyright 2023 Remi Bernotavicius

use crate::config::{ClientConfig, IsolationLevel, OmitConfig, TransactionOptions};
use crate::database::models::{
    known_models, Category, Ingredient, IngredientCategory, Recipe, UnitOfMeasure, UnitQuantity,
    User,
};
use crate::database::{self, Connection, Pool};
use crate::error::{initialization, unknown, Error, ErrorCode, Result};
use crate::logging::{LogEvent, LogLevel, QueryLog};
use crate::model::Model;
use crate::query::statement::Statement;
use crate::query::Value;
use crate::repository::Repository;
use diesel::connection::SimpleConnection as _;
use diesel::deserialize::{self, FromSql};
use diesel::row::{Field as _, NamedRow, Row};
use diesel::sql_types::Text;
use diesel::sqlite::Sqlite;
use diesel::{Connection as _, QueryableByName};
use serde::Serialize;
use std::cell::RefCell;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Something statements can run on: the pooled [`Client`] or a [`Transaction`].
pub trait Executor: Sized {
    fn with_connection<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T>;

    fn query_log(&self) -> &QueryLog;

    fn omit_rules(&self) -> &OmitConfig;

    fn repository<M: Model>(&self) -> Repository<'_, M, Self> {
        Repository::new(self)
    }

    fn categories(&self) -> Repository<'_, Category, Self> {
        self.repository()
    }

    fn ingredient_categories(&self) -> Repository<'_, IngredientCategory, Self> {
        self.repository()
    }

    fn units_of_measure(&self) -> Repository<'_, UnitOfMeasure, Self> {
        self.repository()
    }

    fn ingredients(&self) -> Repository<'_, Ingredient, Self> {
        self.repository()
    }

    fn recipes(&self) -> Repository<'_, Recipe, Self> {
        self.repository()
    }

    fn unit_quantities(&self) -> Repository<'_, UnitQuantity, Self> {
        self.repository()
    }

    fn users(&self) -> Repository<'_, User, Self> {
        self.repository()
    }

    /// Runs parametrized SQL which doesn't return rows. `?` placeholders take `params` in order.
    fn execute_raw(&self, sql: &str, params: Vec<Value>) -> Result<usize> {
        let statement = Statement::with_params(sql, params);
        self.with_connection(|conn| statement.execute(conn, self.query_log()))
    }

    /// Runs a parametrized query, returning its rows untyped.
    fn query_raw(&self, sql: &str, params: Vec<Value>) -> Result<Vec<RawRow>> {
        self.query_raw_as(sql, params)
    }

    /// Runs a parametrized query, mapping its rows by column name.
    fn query_raw_as<T>(&self, sql: &str, params: Vec<Value>) -> Result<Vec<T>>
    where
        T: QueryableByName<Sqlite> + 'static,
    {
        let statement = Statement::with_params(sql, params);
        self.with_connection(|conn| statement.load::<T>(conn, self.query_log()))
    }
}

/// A row of a raw query. Values are kept as SQLite's text rendering of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    columns: Vec<(String, Option<String>)>,
}

impl RawRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, value)| value.as_deref())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.columns
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl QueryableByName<Sqlite> for RawRow {
    fn build<'a>(row: &impl NamedRow<'a, Sqlite>) -> deserialize::Result<Self> {
        let mut columns = Vec::with_capacity(row.field_count());
        for i in 0..row.field_count() {
            let Some(field) = Row::get(row, i) else {
                continue;
            };
            let name = field.field_name().unwrap_or_default().to_owned();
            let value = match field.value() {
                Some(raw) => Some(<String as FromSql<Text, Sqlite>>::from_sql(raw)?),
                None => None,
            };
            columns.push((name, value));
        }
        Ok(Self { columns })
    }
}

impl Serialize for RawRow {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap as _;

        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

pub type BatchOperation<'a, T> = Box<dyn FnOnce(&Transaction<'_>) -> Result<T> + 'a>;

/// The entry point: a pool of connections to one database, with migrations applied.
#[derive(Debug, Clone)]
pub struct Client {
    pool: Pool,
    config: Arc<ClientConfig>,
    log: QueryLog,
}

impl Client {
    pub fn connect(config: ClientConfig) -> Result<Self> {
        config.omit.check(&known_models())?;
        let url = config.database_url()?;
        let log = QueryLog::new(&config.log);
        let pool = database::build_pool(
            &url,
            config.pool_size,
            config.connect_timeout(),
            config.transaction_options.max_wait(),
        )?;
        let mut conn = pool
            .get()
            .map_err(|e| initialization!("failed to connect to {url}: {e}"))?;
        database::run_migrations(&mut conn)?;
        log.info(format_args!("connected to {url}"));
        Ok(Self {
            pool,
            config: Arc::new(config),
            log,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Subscribes to events of `level`. See [`QueryLog::on`].
    pub fn on(&self, level: LogLevel, listener: impl Fn(&LogEvent) + Send + Sync + 'static) {
        self.log.on(level, listener)
    }

    /// Renders `error` in the configured error format.
    pub fn render_error(&self, error: &Error) -> String {
        error.render(self.config.error_format)
    }

    /// Runs `f` in a transaction with the configured options. The transaction commits when `f`
    /// returns `Ok` and rolls back otherwise.
    pub fn transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        self.transaction_with(self.config.transaction_options, f)
    }

    pub fn transaction_with<T>(
        &self,
        options: TransactionOptions,
        f: impl FnOnce(&Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut pooled = self.pool.get_timeout(options.max_wait())?;
        let conn: &mut Connection = &mut pooled;
        let timeout = options.timeout();
        let deadline = Instant::now() + timeout;
        let run = |conn: &mut Connection| -> Result<T> {
            let tx = Transaction {
                conn: RefCell::new(conn),
                log: &self.log,
                omit: &self.config.omit,
                deadline,
                timeout,
            };
            let value = f(&tx)?;
            tx.check_deadline()?;
            Ok(value)
        };

        let result = match options.isolation_level {
            // Takes the write lock up front, so no other writer can interleave.
            Some(IsolationLevel::Serializable) => conn.immediate_transaction(run),
            Some(IsolationLevel::ReadUncommitted) => {
                conn.batch_execute("PRAGMA read_uncommitted = 1")?;
                let result = conn.transaction(run);
                conn.batch_execute("PRAGMA read_uncommitted = 0")?;
                result
            }
            _ => conn.transaction(run),
        };
        if let Err(e) = &result {
            self.log.warn(format_args!("transaction rolled back: {e}"));
        }
        result
    }

    /// Runs independent operations in one transaction: either all of them apply or none does.
    pub fn batch<T>(&self, operations: Vec<BatchOperation<'_, T>>) -> Result<Vec<T>> {
        self.transaction(|tx| operations.into_iter().map(|op| op(tx)).collect())
    }
}

impl Executor for Client {
    fn with_connection<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.pool.get()?;
        f(&mut conn)
    }

    fn query_log(&self) -> &QueryLog {
        &self.log
    }

    fn omit_rules(&self) -> &OmitConfig {
        &self.config.omit
    }
}

/// A scoped handle on an open transaction. Everything run through it shares one connection.
pub struct Transaction<'c> {
    conn: RefCell<&'c mut Connection>,
    log: &'c QueryLog,
    omit: &'c OmitConfig,
    deadline: Instant,
    timeout: Duration,
}

impl Transaction<'_> {
    fn check_deadline(&self) -> Result<()> {
        if Instant::now() > self.deadline {
            return Err(Error::known(
                ErrorCode::TransactionExpired,
                format!(
                    "Transaction already closed: it ran longer than its timeout of {}ms",
                    self.timeout.as_millis()
                ),
                None,
            ));
        }
        Ok(())
    }
}

impl Executor for Transaction<'_> {
    fn with_connection<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        self.check_deadline()?;
        let mut conn = self
            .conn
            .try_borrow_mut()
            .map_err(|_| unknown!("the transaction connection is already in use"))?;
        f(&mut conn)
    }

    fn query_log(&self) -> &QueryLog {
        self.log
    }

    fn omit_rules(&self) -> &OmitConfig {
        self.omit
    }
}
