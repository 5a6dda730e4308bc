// Copyright 2023 Remi Bernotavicius

use crate::error::{initialization, Result};
use diesel::connection::SimpleConnection as _;
use diesel::r2d2::{ConnectionManager, CustomizeConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::time::Duration;

pub mod functions;
pub mod models;
pub mod schema;

pub type Connection = diesel::sqlite::SqliteConnection;
pub type Pool = diesel::r2d2::Pool<ConnectionManager<Connection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Settings applied to every connection as it leaves the pool.
#[derive(Debug, Clone, Copy)]
struct ConnectionOptions {
    busy_timeout: Duration,
}

impl CustomizeConnection<Connection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), diesel::r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA busy_timeout = {}; PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;",
            self.busy_timeout.as_millis()
        ))
        .and_then(|()| functions::register(conn))
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

fn is_in_memory(url: &str) -> bool {
    url == ":memory:" || url.contains("mode=memory")
}

pub fn build_pool(
    url: &str,
    max_size: u32,
    connect_timeout: Duration,
    busy_timeout: Duration,
) -> Result<Pool> {
    // Every in-memory connection is its own database.
    let max_size = if is_in_memory(url) { 1 } else { max_size.max(1) };
    log::debug!("opening {url} with a pool of {max_size} connections");
    Pool::builder()
        .max_size(max_size)
        .connection_timeout(connect_timeout)
        .connection_customizer(Box::new(ConnectionOptions { busy_timeout }))
        .build(ConnectionManager::new(url))
        .map_err(|e| initialization!("failed to open database {url}: {e}"))
}

pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| initialization!("failed to apply migrations: {e}"))?;
    for version in applied {
        log::info!("applied migration {version}");
    }
    Ok(())
}

#[test]
fn migrations() {
    use diesel::Connection as _;

    let mut conn = Connection::establish(":memory:").unwrap();
    run_migrations(&mut conn).unwrap();
    conn.revert_all_migrations(MIGRATIONS).unwrap();
    run_migrations(&mut conn).unwrap();
    assert!(!conn.has_pending_migration(MIGRATIONS).unwrap());
}

#[test]
fn pool_connections_enforce_foreign_keys() {
    use diesel::RunQueryDsl as _;

    let dir = tempfile::tempdir().unwrap();
    let url = dir.path().join("pool.sqlite").display().to_string();
    let pool = build_pool(
        &url,
        2,
        Duration::from_secs(5),
        Duration::from_millis(100),
    )
    .unwrap();
    let mut conn = pool.get().unwrap();
    run_migrations(&mut conn).unwrap();

    let result = diesel::sql_query(
        "INSERT INTO ingredients (name, ingredient_category_id) VALUES ('flour', 42)",
    )
    .execute(&mut *conn);
    assert!(result.is_err());
}
