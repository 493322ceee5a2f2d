//! `SQLite` Database Engine Implementation
//!
//! This module implements `DatabaseEngine` and `Session` for `SQLite` databases.
//!
//! # Features
//! - File-based connections (`/path/to/clients.db`)
//! - In-memory connections (`:memory:`) for connection validation
//! - Schema mirroring the `PostgreSQL` one, with CHECK constraints for the
//!   `VARCHAR` lengths `SQLite` does not enforce
//!
//! # Implementation Notes
//! - Uses `rusqlite` (synchronous driver, no async needed)
//! - `AUTOINCREMENT` keys, so client ids are never reused
//! - Foreign keys are switched on per connection
//! - A failed statement only rolls back itself under `SQLite`'s default ABORT
//!   conflict resolution, so no savepoints are needed around unique inserts

use rusqlite::{ffi, params, Connection, OpenFlags, OptionalExtension};
use std::time::Duration;

use crate::engine::{
    ClientField, ClientLookup, ClientRow, ConnectionConfig, ConnectionInfo, DatabaseEngine,
    DatabaseType, Session, Table,
};
use crate::error::{ClientbookError, Result};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS client (
        client_id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL CHECK (length(name) <= 30),
        surname TEXT NOT NULL CHECK (length(surname) <= 30),
        mail TEXT NOT NULL UNIQUE CHECK (length(mail) <= 30)
    );
    CREATE TABLE IF NOT EXISTS phone (
        phone_id INTEGER PRIMARY KEY AUTOINCREMENT,
        client_id INTEGER REFERENCES client(client_id),
        number TEXT UNIQUE CHECK (length(number) = 10)
    );";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// `SQLite` database engine implementation
pub struct SqliteEngine;

impl DatabaseEngine for SqliteEngine {
    type Session = SqliteSession;

    const TYPE: DatabaseType = DatabaseType::SQLite;

    async fn validate_connection(config: &ConnectionConfig) -> Result<ConnectionInfo> {
        let path = file_path(config)?;
        let conn = open_connection(&path)?;

        let version: String =
            conn.query_row("SELECT sqlite_version()", [], |row| row.get(0)).map_err(|e| {
                ClientbookError::connection_failed(format!("Failed to query SQLite version: {e}"))
            })?;

        Ok(ConnectionInfo {
            database_version: version.clone(),
            server_info: format!("SQLite {version}"),
            connected_database: path,
            user: "N/A".to_string(), // SQLite has no user concept
        })
    }

    async fn open(config: &ConnectionConfig) -> Result<SqliteSession> {
        let path = file_path(config)?;
        let conn = open_connection(&path)?;

        conn.busy_timeout(BUSY_TIMEOUT).map_err(|e| {
            ClientbookError::engine_error("sqlite", format!("Failed to set timeout: {e}"))
        })?;
        conn.execute_batch("PRAGMA foreign_keys = ON; BEGIN;").map_err(|e| {
            ClientbookError::engine_error("sqlite", format!("Failed to begin transaction: {e}"))
        })?;

        Ok(SqliteSession { conn })
    }
}

/// Validate the config targets `SQLite` and extract its file path
fn file_path(config: &ConnectionConfig) -> Result<String> {
    if config.engine != DatabaseType::SQLite {
        return Err(ClientbookError::invalid_input(format!(
            "Expected SQLite engine, got {}",
            config.engine
        )));
    }

    let file_path = config
        .file
        .as_ref()
        .ok_or_else(|| ClientbookError::invalid_input("SQLite requires 'file' parameter"))?;

    file_path.to_str().map(ToString::to_string).ok_or_else(|| {
        ClientbookError::invalid_input("SQLite file path contains invalid UTF-8 characters")
    })
}

/// Open a read-write `SQLite` connection, creating the file if needed
fn open_connection(path: &str) -> Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;

    Connection::open_with_flags(path, flags).map_err(|e| {
        ClientbookError::connection_failed(format!("Failed to open SQLite database: {e}"))
    })
}

/// Map a failed statement to a client book error
///
/// `field`/`value` name the column a uniqueness violation refers to.
fn classify(err: rusqlite::Error, field: &str, value: &str) -> ClientbookError {
    if let rusqlite::Error::SqliteFailure(failure, _) = &err {
        match failure.extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE => return ClientbookError::duplicate(field, value),
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                return ClientbookError::client_not_found(format!(
                    "phone '{value}' references a missing client"
                ))
            }
            ffi::SQLITE_CONSTRAINT_CHECK | ffi::SQLITE_CONSTRAINT_NOTNULL => {
                return ClientbookError::invalid_input(format!("{field} '{value}' rejected: {err}"))
            }
            _ => {}
        }
    }
    engine_error(err)
}

fn engine_error(err: rusqlite::Error) -> ClientbookError {
    ClientbookError::engine_error("sqlite", err.to_string())
}

/// One `SQLite` connection with an open transaction
pub struct SqliteSession {
    conn: Connection,
}

impl Session for SqliteSession {
    async fn create_tables(&mut self) -> Result<()> {
        self.conn.execute_batch(SCHEMA).map_err(engine_error)
    }

    async fn drop_table(&mut self, table: Table) -> Result<bool> {
        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table.as_str()],
                |_| Ok(()),
            )
            .optional()
            .map_err(engine_error)?
            .is_some();

        if !exists {
            return Ok(false);
        }

        self.conn.execute_batch(&format!("DROP TABLE {table}")).map_err(engine_error)?;
        Ok(true)
    }

    async fn insert_client(&mut self, name: &str, surname: &str, mail: &str) -> Result<i64> {
        self.conn
            .query_row(
                "INSERT INTO client (name, surname, mail) VALUES (?1, ?2, ?3)
                 RETURNING client_id",
                params![name, surname, mail],
                |row| row.get(0),
            )
            .map_err(|e| classify(e, "mail", mail))
    }

    async fn find_client_id(&mut self, lookup: &ClientLookup<'_>) -> Result<Option<i64>> {
        let result = match *lookup {
            ClientLookup::Mail(mail) => self.conn.query_row(
                "SELECT client_id FROM client WHERE mail = ?1 ORDER BY client_id LIMIT 1",
                [mail],
                |row| row.get(0),
            ),
            ClientLookup::Number(number) => self.conn.query_row(
                "SELECT c.client_id FROM client AS c
                 JOIN phone AS p ON c.client_id = p.client_id
                 WHERE p.number = ?1
                 ORDER BY c.client_id LIMIT 1",
                [number],
                |row| row.get(0),
            ),
            ClientLookup::Name { name, surname } => self.conn.query_row(
                "SELECT client_id FROM client WHERE name = ?1 AND surname = ?2
                 ORDER BY client_id LIMIT 1",
                [name, surname],
                |row| row.get(0),
            ),
        };

        result.optional().map_err(engine_error)
    }

    async fn client_rows(&mut self, client_id: i64) -> Result<Vec<ClientRow>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT c.client_id, c.name, c.surname, c.mail, p.number
                 FROM client AS c
                 LEFT JOIN phone AS p ON c.client_id = p.client_id
                 WHERE c.client_id = ?1
                 ORDER BY p.phone_id",
            )
            .map_err(engine_error)?;

        let rows = stmt
            .query_map([client_id], |row| {
                Ok(ClientRow {
                    client_id: row.get(0)?,
                    name: row.get(1)?,
                    surname: row.get(2)?,
                    mail: row.get(3)?,
                    number: row.get(4)?,
                })
            })
            .map_err(engine_error)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(engine_error)?;

        Ok(rows)
    }

    async fn insert_phone(&mut self, client_id: i64, number: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO phone (client_id, number) VALUES (?1, ?2)",
                params![client_id, number],
            )
            .map(|_| ())
            .map_err(|e| classify(e, "number", number))
    }

    async fn find_phone(&mut self, client_id: i64, number: &str) -> Result<Option<i64>> {
        self.conn
            .query_row(
                "SELECT phone_id FROM phone WHERE client_id = ?1 AND number = ?2",
                params![client_id, number],
                |row| row.get(0),
            )
            .optional()
            .map_err(engine_error)
    }

    async fn update_phone(&mut self, phone_id: i64, number: &str) -> Result<()> {
        self.conn
            .execute("UPDATE phone SET number = ?1 WHERE phone_id = ?2", params![number, phone_id])
            .map(|_| ())
            .map_err(|e| classify(e, "number", number))
    }

    async fn update_client(
        &mut self,
        client_id: i64,
        field: ClientField,
        value: &str,
    ) -> Result<bool> {
        let sql = format!("UPDATE client SET {} = ?1 WHERE client_id = ?2", field.column());
        self.conn
            .execute(&sql, params![value, client_id])
            .map(|changed| changed > 0)
            .map_err(|e| classify(e, field.column(), value))
    }

    async fn delete_client_phones(&mut self, client_id: i64) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("DELETE FROM phone WHERE client_id = ?1 RETURNING number")
            .map_err(engine_error)?;

        let removed = stmt
            .query_map([client_id], |row| row.get(0))
            .map_err(engine_error)?
            .collect::<std::result::Result<Vec<String>, _>>()
            .map_err(engine_error)?;

        Ok(removed)
    }

    async fn delete_phone(&mut self, number: &str) -> Result<bool> {
        self.conn
            .execute("DELETE FROM phone WHERE number = ?1", [number])
            .map(|changed| changed > 0)
            .map_err(engine_error)
    }

    async fn delete_client(&mut self, client_id: i64) -> Result<bool> {
        self.conn
            .execute("DELETE FROM client WHERE client_id = ?1", [client_id])
            .map(|changed| changed > 0)
            .map_err(engine_error)
    }

    async fn commit(self) -> Result<()> {
        self.conn.execute_batch("COMMIT").map_err(engine_error)
    }

    async fn rollback(self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK").map_err(engine_error)
    }
}
