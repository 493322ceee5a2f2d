//! Database Engine Traits and Core Types
//!
//! This module defines the storage abstractions the client book runs on.
//! Each engine (`PostgreSQL`, `SQLite`) implements `DatabaseEngine`, which opens a
//! `Session`: one connection holding one open transaction.
//!
//! # Scoped Sessions
//! A session lives for exactly one public operation. It is opened, used, and then
//! committed or rolled back; dropping it closes the connection, which discards any
//! transaction still open.
//!
//! # Engine Isolation
//! Each engine implementation is completely independent.
//! No shared SQL helpers or cross-engine abstractions beyond the traits below.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::Result;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

/// Supported database engine types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// `PostgreSQL` database
    Postgres,
    /// `SQLite` database
    SQLite,
}

impl DatabaseType {
    /// Get the engine name as a string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::SQLite => "sqlite",
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Connection configuration for database engines
///
/// This struct contains all parameters needed to establish a database connection.
/// Fields are engine-specific (e.g., `file` only applies to `SQLite`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database engine type
    pub engine: DatabaseType,

    /// Hostname (for postgres, defaults to localhost)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Port number (for postgres, defaults to 5432)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Username (for postgres)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Password (for postgres)
    /// WARNING: Sensitive data, do not log or include in error messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Database name (for postgres)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// Database file path (for sqlite)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl ConnectionConfig {
    /// Create a new `PostgreSQL` connection config
    #[must_use]
    pub const fn postgres(
        host: String,
        port: u16,
        user: String,
        password: String,
        database: String,
    ) -> Self {
        Self {
            engine: DatabaseType::Postgres,
            host: Some(host),
            port: Some(port),
            user: Some(user),
            password: Some(password),
            database: Some(database),
            file: None,
        }
    }

    /// Create a new `SQLite` connection config
    #[must_use]
    pub const fn sqlite(file: PathBuf) -> Self {
        Self {
            engine: DatabaseType::SQLite,
            host: None,
            port: None,
            user: None,
            password: None,
            database: None,
            file: Some(file),
        }
    }

    /// Name of the target database, for log lines (never includes credentials)
    #[must_use]
    pub fn display_name(&self) -> String {
        match self.engine {
            DatabaseType::Postgres => {
                self.database.clone().unwrap_or_else(|| "unknown".to_string())
            }
            DatabaseType::SQLite => self
                .file
                .as_ref()
                .map_or_else(|| "unknown".to_string(), |f| f.display().to_string()),
        }
    }
}

/// Connection information returned after successful connection validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Database server version string
    pub database_version: String,

    /// Server information (implementation-specific)
    pub server_info: String,

    /// Name of the connected database
    pub connected_database: String,

    /// Connected user name
    pub user: String,
}

/// The two tables of the client book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Client,
    Phone,
}

impl Table {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Phone => "phone",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Updatable column of the `client` table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientField {
    Name,
    Surname,
    Mail,
}

impl ClientField {
    /// Column name; the only identifier ever formatted into SQL
    #[must_use]
    pub const fn column(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Surname => "surname",
            Self::Mail => "mail",
        }
    }
}

/// Lookup key used to find a client id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientLookup<'a> {
    Mail(&'a str),
    Number(&'a str),
    Name { name: &'a str, surname: &'a str },
}

impl fmt::Display for ClientLookup<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mail(mail) => write!(f, "mail '{mail}'"),
            Self::Number(number) => write!(f, "phone number '{number}'"),
            Self::Name { name, surname } => write!(f, "name '{surname} {name}'"),
        }
    }
}

/// One row of `client LEFT JOIN phone`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRow {
    pub client_id: i64,
    pub name: String,
    pub surname: String,
    pub mail: String,
    /// `None` when the client has no phone rows
    pub number: Option<String>,
}

/// Database engine trait
///
/// Engines are stateless; every call takes the connection config as input.
#[allow(async_fn_in_trait)]
pub trait DatabaseEngine {
    /// Open connection with a running transaction
    type Session: Session;

    /// Engine type handled by this implementation
    const TYPE: DatabaseType;

    /// Validate connection and return connection information
    ///
    /// Opens a connection, reads server metadata, and closes it again.
    /// No persistent connection is maintained.
    async fn validate_connection(config: &ConnectionConfig) -> Result<ConnectionInfo>;

    /// Open a connection and begin a transaction
    async fn open(config: &ConnectionConfig) -> Result<Self::Session>;
}

/// Statements available inside one transaction
///
/// Mutating statements that can hit a uniqueness constraint only undo themselves on
/// failure; the surrounding transaction stays usable.
#[allow(async_fn_in_trait)]
pub trait Session: Sized {
    /// Create `client` and `phone` if they do not exist
    async fn create_tables(&mut self) -> Result<()>;

    /// Drop a table; `false` when it did not exist
    async fn drop_table(&mut self, table: Table) -> Result<bool>;

    /// Insert a client and return its generated id
    async fn insert_client(&mut self, name: &str, surname: &str, mail: &str) -> Result<i64>;

    /// Id of the first client (lowest id) matching the lookup
    async fn find_client_id(&mut self, lookup: &ClientLookup<'_>) -> Result<Option<i64>>;

    /// Joined client/phone rows of one client, phones in insertion order
    async fn client_rows(&mut self, client_id: i64) -> Result<Vec<ClientRow>>;

    /// Insert a phone row for a client
    async fn insert_phone(&mut self, client_id: i64, number: &str) -> Result<()>;

    /// Id of the phone row of `client_id` holding exactly `number`
    async fn find_phone(&mut self, client_id: i64, number: &str) -> Result<Option<i64>>;

    /// Replace the number of a phone row
    async fn update_phone(&mut self, phone_id: i64, number: &str) -> Result<()>;

    /// Set one column of a client row; `false` when no row was updated
    async fn update_client(&mut self, client_id: i64, field: ClientField, value: &str)
        -> Result<bool>;

    /// Delete every phone of a client, returning the removed numbers
    async fn delete_client_phones(&mut self, client_id: i64) -> Result<Vec<String>>;

    /// Delete the phone row holding `number`; `false` when none matched
    async fn delete_phone(&mut self, number: &str) -> Result<bool>;

    /// Delete a client row; `false` when none matched
    async fn delete_client(&mut self, client_id: i64) -> Result<bool>;

    /// Commit the transaction and close the connection
    async fn commit(self) -> Result<()>;

    /// Roll back the transaction and close the connection
    async fn rollback(self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_type_serialization() {
        assert_eq!(serde_json::to_string(&DatabaseType::Postgres).unwrap(), r#""postgres""#);
        assert_eq!(serde_json::to_string(&DatabaseType::SQLite).unwrap(), r#""sqlite""#);
    }

    #[test]
    fn test_connection_config_constructors() {
        let pg_config = ConnectionConfig::postgres(
            "localhost".to_string(),
            5432,
            "user".to_string(),
            "pass".to_string(),
            "pypost".to_string(),
        );
        assert_eq!(pg_config.engine, DatabaseType::Postgres);
        assert_eq!(pg_config.port, Some(5432));
        assert_eq!(pg_config.display_name(), "pypost");

        let sqlite_config = ConnectionConfig::sqlite(PathBuf::from("/tmp/clients.db"));
        assert_eq!(sqlite_config.engine, DatabaseType::SQLite);
        assert_eq!(sqlite_config.display_name(), "/tmp/clients.db");
    }

    #[test]
    fn test_lookup_display() {
        assert_eq!(ClientLookup::Mail("x@test").to_string(), "mail 'x@test'");
        assert_eq!(ClientLookup::Number("9991234567").to_string(), "phone number '9991234567'");
        assert_eq!(
            ClientLookup::Name { name: "Ivan", surname: "Petrov" }.to_string(),
            "name 'Petrov Ivan'"
        );
    }

    #[test]
    fn test_client_field_columns() {
        assert_eq!(ClientField::Name.column(), "name");
        assert_eq!(ClientField::Surname.column(), "surname");
        assert_eq!(ClientField::Mail.column(), "mail");
    }
}
