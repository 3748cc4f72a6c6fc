use crate::config::DatabaseTarget;
use anyhow::Result;
use libsql::{Builder, Connection, Database as LibsqlDatabase};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

const SYSTEM_MIGRATIONS: &[(&str, &str)] =
    &[("system/000_migrations_table.sql", include_str!("migrations/system/000_migrations_table.sql"))];

const MIGRATIONS: &[(&str, &str)] = &[("001_schema.sql", include_str!("migrations/001_schema.sql"))];

/// Process-wide database handle. Built once at startup; every request opens
/// its own connection through [`Database::session`].
pub struct Database {
    db: LibsqlDatabase,
    tx_lock: Arc<Mutex<()>>,
}

/// A connection scoped to one request. Write transactions on any session of
/// the same [`Database`] take turns through the shared `tx_lock`.
pub struct Session {
    conn: Connection,
    tx_lock: Arc<Mutex<()>>,
}

impl Session {
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn tx_lock(&self) -> &Mutex<()> {
        &self.tx_lock
    }
}

impl Database {
    pub async fn new(target: DatabaseTarget) -> Result<Self> {
        match target {
            DatabaseTarget::Local(path) => Self::open_local(&path).await,
            DatabaseTarget::Remote { url, auth_token } => {
                tracing::info!(url = %url, "[db] connecting to remote database");
                let db = Builder::new_remote(url, auth_token).build().await?;
                Self::setup(db, false).await
            }
        }
    }

    pub async fn open_local(path: &Path) -> Result<Self> {
        tracing::info!(path = ?path, "[db] opening local database");
        let db = Builder::new_local(path).build().await?;
        Self::setup(db, true).await
    }

    async fn setup(db: LibsqlDatabase, local: bool) -> Result<Self> {
        let conn = db.connect()?;
        conn.query("SELECT 1", ()).await?;

        if local {
            // readers keep going while a writer holds the lock
            conn.query("PRAGMA journal_mode = WAL", ()).await?;
        }

        for (filename, sql) in SYSTEM_MIGRATIONS {
            Self::run_migration(&conn, filename, sql).await?;
        }

        for (filename, sql) in MIGRATIONS {
            Self::run_migration(&conn, filename, sql).await?;
        }

        Ok(Database {
            db,
            tx_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Opens a connection scoped to the caller. Dropping it releases it.
    pub fn session(&self) -> Result<Session> {
        Ok(Session {
            conn: self.db.connect()?,
            tx_lock: self.tx_lock.clone(),
        })
    }

    async fn is_migration_applied(conn: &Connection, name: &str) -> Result<bool> {
        let query = "SELECT 1 FROM _migrations WHERE name = ?";
        match conn.query(query, libsql::params![name]).await {
            Ok(mut rows) => Ok(rows.next().await?.is_some()),
            Err(e) => {
                if e.to_string().contains("no such table") {
                    Ok(false)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn record_migration(conn: &Connection, name: &str) -> Result<()> {
        let query = r#"
            INSERT INTO _migrations (name, applied_at)
            VALUES (?, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        "#;
        conn.execute(query, libsql::params![name]).await?;
        Ok(())
    }

    async fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
        if Self::is_migration_applied(conn, name).await? {
            tracing::debug!("migration {} already applied, skipping", name);
            return Ok(());
        }

        tracing::info!("applying migration: {}", name);
        conn.execute_batch(sql)
            .await
            .map_err(|e| anyhow::anyhow!("failed to execute migration {name}: {e}"))?;

        Self::record_migration(conn, name).await?;
        Ok(())
    }
}
