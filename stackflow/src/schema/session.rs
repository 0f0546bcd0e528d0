//! Database sessions used for schema application.

use super::table::Dialect;
use crate::errors::{Result, StackflowError};
use crate::secrets::RdsSecret;
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlSslMode};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::Connection;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Connect timeout for the managed database.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// A single open database connection.
///
/// `close` consumes the underlying connection; later calls fail.
#[async_trait]
pub trait SchemaSession: Send {
    /// SQL flavour of the connection.
    fn dialect(&self) -> Dialect;

    /// Returns true if the table exists in the session's database.
    async fn table_exists(&mut self, table: &str) -> Result<bool>;

    /// Executes one statement.
    async fn execute(&mut self, sql: &str) -> Result<()>;

    /// Closes the connection. Closing twice is a no-op.
    async fn close(&mut self) -> Result<()>;
}

/// Opens sessions from database credentials.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Connects using the secret's endpoint and credentials.
    async fn connect(&self, secret: &RdsSecret) -> Result<Box<dyn SchemaSession>>;
}

fn closed() -> StackflowError {
    StackflowError::Database("session already closed".to_string())
}

/// TLS connection to a MySQL-compatible cluster.
#[derive(Debug)]
pub struct MySqlSession {
    conn: Option<MySqlConnection>,
}

#[async_trait]
impl SchemaSession for MySqlSession {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn table_exists(&mut self, table: &str) -> Result<bool> {
        let conn = self.conn.as_mut().ok_or_else(closed)?;
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_name = ?",
        )
        .bind(table)
        .fetch_one(&mut *conn)
        .await?;
        Ok(count > 0)
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        let conn = self.conn.as_mut().ok_or_else(closed)?;
        sqlx::query(sql).execute(&mut *conn).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().await?;
            debug!("Closed database connection");
        }
        Ok(())
    }
}

/// Connects to the cluster named in the secret with TLS required.
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    timeout: Duration,
}

impl Default for MySqlConnector {
    fn default() -> Self {
        Self {
            timeout: CONNECT_TIMEOUT,
        }
    }
}

impl MySqlConnector {
    /// Creates a connector with the default timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the connect timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl SessionConnector for MySqlConnector {
    async fn connect(&self, secret: &RdsSecret) -> Result<Box<dyn SchemaSession>> {
        let options = MySqlConnectOptions::new()
            .host(&secret.host)
            .port(secret.port)
            .username(&secret.username)
            .password(&secret.password)
            .database(&secret.dbname)
            .ssl_mode(MySqlSslMode::Required);

        let conn = tokio::time::timeout(self.timeout, MySqlConnection::connect_with(&options))
            .await
            .map_err(|_| StackflowError::ConnectTimeout {
                host: secret.host.clone(),
                port: secret.port,
                seconds: self.timeout.as_secs(),
            })??;

        info!(host = %secret.host, database = %secret.dbname, "Connected to database");
        Ok(Box::new(MySqlSession { conn: Some(conn) }))
    }
}

/// Connection to an embedded SQLite database.
#[derive(Debug)]
pub struct SqliteSession {
    conn: Option<SqliteConnection>,
}

impl SqliteSession {
    /// Opens a database URL such as `sqlite::memory:` or `sqlite:///tmp/x.db`.
    pub async fn open(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let conn = SqliteConnection::connect_with(&options).await?;
        Ok(Self { conn: Some(conn) })
    }
}

#[async_trait]
impl SchemaSession for SqliteSession {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn table_exists(&mut self, table: &str) -> Result<bool> {
        let conn = self.conn.as_mut().ok_or_else(closed)?;
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(table)
                .fetch_one(&mut *conn)
                .await?;
        Ok(count > 0)
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        let conn = self.conn.as_mut().ok_or_else(closed)?;
        sqlx::query(sql).execute(&mut *conn).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().await?;
        }
        Ok(())
    }
}

/// Ignores the secret and opens a fixed SQLite URL.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    url: String,
}

impl SqliteConnector {
    /// Creates a connector for the given database URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl SessionConnector for SqliteConnector {
    async fn connect(&self, _secret: &RdsSecret) -> Result<Box<dyn SchemaSession>> {
        Ok(Box::new(SqliteSession::open(&self.url).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_session_roundtrip() {
        let mut session = SqliteSession::open("sqlite::memory:").await.unwrap();

        assert!(!session.table_exists("t").await.unwrap());
        session.execute("CREATE TABLE t (id INTEGER)").await.unwrap();
        assert!(session.table_exists("t").await.unwrap());

        session.close().await.unwrap();
        session.close().await.unwrap();
        assert!(session.execute("SELECT 1").await.is_err());
    }

    #[test]
    fn test_mysql_connector_timeout() {
        let connector = MySqlConnector::new();
        assert_eq!(connector.timeout, Duration::from_secs(30));
        let connector = connector.with_timeout(Duration::from_secs(5));
        assert_eq!(connector.timeout, Duration::from_secs(5));
    }
}
