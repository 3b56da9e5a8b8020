use anyhow::{Context, Result};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use super::setup::init_schema;

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;
pub type DbConn = r2d2::PooledConnection<SqliteConnectionManager>;

pub fn create_pool(database_path: &str) -> Result<DbPool> {
    let manager = build_manager(SqliteConnectionManager::file(database_path));
    build_pool(manager, 4)
}

/// Single-connection pool over a private in-memory database with the schema in place.
/// Each in-memory connection is its own database, so the pool must never grow.
pub fn create_memory_pool() -> Result<DbPool> {
    let manager = build_manager(SqliteConnectionManager::memory());
    let pool = build_pool(manager, 1)?;
    init_schema(&*get_connection(&pool)?)?;
    Ok(pool)
}

fn build_manager(manager: SqliteConnectionManager) -> SqliteConnectionManager {
    manager.with_init(|conn| {
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
    })
}

fn build_pool(manager: SqliteConnectionManager, max_size: u32) -> Result<DbPool> {
    r2d2::Pool::builder()
        .max_size(max_size)
        .build(manager)
        .context("Failed to create database connection pool")
}

pub fn get_connection(pool: &DbPool) -> Result<DbConn> {
    pool.get()
        .context("Failed to get database connection from pool")
}

/// Runs `work` inside a savepoint so a multi-row mutation lands completely or
/// not at all. Nests inside an open transaction and works without one.
pub fn atomically<T>(
    conn: &Connection,
    name: &str,
    work: impl FnOnce(&Connection) -> Result<T>,
) -> Result<T> {
    conn.execute_batch(&format!("SAVEPOINT {name}"))
        .with_context(|| format!("Failed to open savepoint {name}"))?;

    match work(conn) {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE {name}"))
                .with_context(|| format!("Failed to release savepoint {name}"))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = conn.execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}")) {
                log::error!("Failed to roll back savepoint {name}: {rollback}");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_pool_comes_with_schema() {
        let pool = create_memory_pool().unwrap();
        let conn = get_connection(&pool).unwrap();
        let players: i64 = conn
            .query_row("SELECT COUNT(*) FROM players", [], |row| row.get(0))
            .unwrap();
        assert_eq!(players, 0);
    }

    #[test]
    fn failed_work_rolls_back_savepoint() {
        let pool = create_memory_pool().unwrap();
        let conn = get_connection(&pool).unwrap();
        let outcome: Result<()> = atomically(&conn, "insert_state", |conn| {
            conn.execute("INSERT INTO bot_state (key, value) VALUES ('k', 'v')", [])?;
            anyhow::bail!("stop")
        });
        assert!(outcome.is_err());
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM bot_state", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 0);
    }
}
