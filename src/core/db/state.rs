use sqlx::{
    Sqlite,
    pool::PoolConnection,
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
};

use std::{
    ops::{Deref, DerefMut},
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::StoreError;

pub(super) struct StoreState {
    database: PathBuf,
    pool: SqlitePool,
}

impl std::fmt::Debug for StoreState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreState")
            .field("database", &self.database)
            .finish()
    }
}

impl StoreState {
    /// Open the database read-only. The file is owned by the administration
    /// side, so it is never created or migrated here.
    pub(super) async fn open<P: AsRef<Path>>(database: P) -> Result<Self, StoreError> {
        let database = database.as_ref().to_path_buf();

        let connect_opts = SqliteConnectOptions::new()
            .filename(&database)
            .create_if_missing(false)
            .read_only(true)
            .busy_timeout(Duration::from_secs(5));

        // Connections are opened lazily on first lookup, so a missing file
        // surfaces as a lookup failure rather than at startup.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(60))
            .connect_lazy_with(connect_opts);

        Ok(Self { database, pool })
    }

    /// Check that the database can be reached at all
    pub(super) async fn ping(&self) -> Result<(), StoreError> {
        self.conn().await.map(|_| ())
    }

    pub(super) async fn conn(&self) -> Result<DbConnGuard, StoreError> {
        let conn = self.pool.acquire().await.map_err(|source| StoreError::Open {
            path: self.database.clone(),
            source,
        })?;
        Ok(DbConnGuard { conn })
    }

    pub(super) async fn close(&self) {
        self.pool.close().await;
    }
}

pub struct DbConnGuard {
    conn: PoolConnection<Sqlite>,
}

impl Deref for DbConnGuard {
    type Target = PoolConnection<Sqlite>;
    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl DerefMut for DbConnGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}
