//! Sessions and transactions.
//!
//! The store allows many concurrent readers but only one writer at a
//! time, and a writer excludes every reader while it runs. That's
//! `tokio::sync::RwLock<()>` used purely as a gate: `ReadTransaction`
//! holds a read guard, `WriteTransaction` holds a write guard, and
//! whether a call site can mutate the catalog is a property of which
//! type it was handed, checked by the compiler instead of an assertion
//! at runtime.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Executor as _, SqliteConnection, SqlitePool};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, OwnedSemaphorePermit, RwLock, Semaphore};
use tracing::warn;

use super::error::{Error, Result};
use super::schema;

/// Anything a finder can run read queries against: both transaction
/// kinds implement this.
pub trait Executor {
    fn connection(&mut self) -> &mut SqliteConnection;
}

/// Marker for transactions that may also mutate the catalog. Only
/// `WriteTransaction` implements it, so a function that takes
/// `impl WriteCapable` cannot be called with a `ReadTransaction`.
pub trait WriteCapable: Executor {}

/// Owns the `SqlitePool` and the single-writer gate. Cloned cheaply
/// (it's two `Arc`s and a `sqlx::Pool`, itself `Arc`-backed).
#[derive(Clone)]
pub struct SessionPool {
    pool: SqlitePool,
    writer_lock: Arc<RwLock<()>>,
    permits: Arc<Semaphore>,
    borrow_timeout: Duration,
}

impl SessionPool {
    pub async fn connect(database_path: &Path, max_sessions: usize) -> Result<Self> {
        if let Some(parent) = database_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Corruption(e.to_string()))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_sessions as u32)
            .connect_with(options)
            .await
            .map_err(Error::from_sqlx)?;

        let mut conn = pool.acquire().await.map_err(Error::from_sqlx)?;
        schema::ensure_schema(&mut conn).await?;
        drop(conn);

        Ok(Self {
            pool,
            writer_lock: Arc::new(RwLock::new(())),
            permits: Arc::new(Semaphore::new(max_sessions)),
            borrow_timeout: Duration::from_secs(10),
        })
    }

    #[cfg(test)]
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(Error::from_sqlx)?;
        let mut conn = pool.acquire().await.map_err(Error::from_sqlx)?;
        schema::ensure_schema(&mut conn).await?;
        drop(conn);
        Ok(Self {
            pool,
            writer_lock: Arc::new(RwLock::new(())),
            permits: Arc::new(Semaphore::new(1)),
            borrow_timeout: Duration::from_secs(10),
        })
    }

    /// Borrows a session, timing out as `Error::LockTimeout` if none
    /// frees up — the pool holds only a fixed number of connections.
    pub async fn session(&self) -> Result<Session> {
        let permit = tokio::time::timeout(self.borrow_timeout, self.permits.clone().acquire_owned())
            .await
            .map_err(|_| Error::LockTimeout)?
            .expect("semaphore is never closed while the pool is alive");

        Ok(Session {
            pool: self.pool.clone(),
            writer_lock: self.writer_lock.clone(),
            _permit: permit,
        })
    }
}

/// A borrowed handle that can start transactions. Dropping it returns
/// the slot to the pool.
pub struct Session {
    pool: SqlitePool,
    writer_lock: Arc<RwLock<()>>,
    _permit: OwnedSemaphorePermit,
}

impl Session {
    /// Starts a read transaction. Any number of these may be open at
    /// once, concurrent with each other but never with a write.
    pub async fn read(&self) -> Result<ReadTransaction> {
        let guard = self.writer_lock.clone().read_owned().await;
        let mut conn = self.pool.acquire().await.map_err(Error::from_sqlx)?;
        conn.execute("BEGIN DEFERRED").await.map_err(Error::from_sqlx)?;
        Ok(ReadTransaction {
            conn,
            _guard: guard,
            finished: false,
        })
    }

    /// Starts a write transaction, excluding every reader and every
    /// other writer until it's committed or rolled back.
    pub async fn write(&self) -> Result<WriteTransaction> {
        let guard = self.writer_lock.clone().write_owned().await;
        let mut conn = self.pool.acquire().await.map_err(Error::from_sqlx)?;
        conn.execute("BEGIN IMMEDIATE").await.map_err(Error::from_sqlx)?;
        Ok(WriteTransaction {
            conn,
            _guard: guard,
            finished: false,
        })
    }
}

pub struct ReadTransaction {
    conn: sqlx::pool::PoolConnection<sqlx::Sqlite>,
    _guard: OwnedRwLockReadGuard<()>,
    finished: bool,
}

impl ReadTransaction {
    /// Ends the transaction. Read transactions never roll back
    /// meaningfully (they don't write), but `COMMIT` still releases the
    /// read snapshot cleanly.
    pub async fn finish(mut self) -> Result<()> {
        self.conn.execute("COMMIT").await.map_err(Error::from_sqlx)?;
        self.finished = true;
        Ok(())
    }
}

impl Executor for ReadTransaction {
    fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }
}

impl Drop for ReadTransaction {
    fn drop(&mut self) {
        if !self.finished {
            warn!("ReadTransaction dropped without finish()");
        }
    }
}

pub struct WriteTransaction {
    conn: sqlx::pool::PoolConnection<sqlx::Sqlite>,
    _guard: OwnedRwLockWriteGuard<()>,
    finished: bool,
}

impl WriteTransaction {
    pub async fn commit(mut self) -> Result<()> {
        self.conn.execute("COMMIT").await.map_err(Error::from_sqlx)?;
        self.finished = true;
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<()> {
        self.conn.execute("ROLLBACK").await.map_err(Error::from_sqlx)?;
        self.finished = true;
        Ok(())
    }
}

impl Executor for WriteTransaction {
    fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }
}

impl WriteCapable for WriteTransaction {}

impl Drop for WriteTransaction {
    fn drop(&mut self) {
        if !self.finished {
            warn!("WriteTransaction dropped without commit()/rollback(), changes will not persist");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_transactions_run_concurrently() {
        let pool = SessionPool::connect_in_memory().await.unwrap();
        let session = pool.session().await.unwrap();
        let a = session.read().await.unwrap();
        let b = session.read().await.unwrap();
        a.finish().await.unwrap();
        b.finish().await.unwrap();
    }

    #[tokio::test]
    async fn write_transaction_commits() {
        let pool = SessionPool::connect_in_memory().await.unwrap();
        let session = pool.session().await.unwrap();
        let mut tx = session.write().await.unwrap();
        sqlx::query("INSERT INTO artist (name, sort_name) VALUES ('A', 'A')")
            .execute(tx.connection())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut read = session.read().await.unwrap();
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM artist")
            .fetch_one(read.connection())
            .await
            .unwrap();
        assert_eq!(row.0, 1);
        read.finish().await.unwrap();
    }
}
