//! `PostgreSQL` Database Engine Implementation
//!
//! This module implements `DatabaseEngine` and `Session` for `PostgreSQL` databases.
//!
//! # Features
//! - Client-server connections via TCP
//! - `SERIAL` keys, `VARCHAR(30)` text columns, fixed-length phone numbers
//!
//! # Implementation Notes
//! - Uses `tokio-postgres` (async driver, requires tokio runtime)
//! - Transactions are driven with plain `BEGIN`/`COMMIT`/`ROLLBACK` so the session
//!   can own its `Client`
//! - A failed statement aborts a `PostgreSQL` transaction, so every statement that
//!   can violate a constraint runs under `SAVEPOINT step`
//! - Key columns are `INTEGER`; ids cross the wire as `i32`

use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, Config, NoTls};

use crate::engine::{
    ClientField, ClientLookup, ClientRow, ConnectionConfig, ConnectionInfo, DatabaseEngine,
    DatabaseType, Session, Table,
};
use crate::error::{ClientbookError, Result};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS client (
        client_id SERIAL PRIMARY KEY,
        name VARCHAR(30) NOT NULL,
        surname VARCHAR(30) NOT NULL,
        mail VARCHAR(30) NOT NULL UNIQUE
    );
    CREATE TABLE IF NOT EXISTS phone (
        phone_id SERIAL PRIMARY KEY,
        client_id INTEGER REFERENCES client(client_id),
        number VARCHAR(10) UNIQUE CHECK (char_length(number) = 10)
    );";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5432;

/// `PostgreSQL` database engine implementation
pub struct PostgresEngine;

impl DatabaseEngine for PostgresEngine {
    type Session = PostgresSession;

    const TYPE: DatabaseType = DatabaseType::Postgres;

    async fn validate_connection(config: &ConnectionConfig) -> Result<ConnectionInfo> {
        let client = connect(config).await?;

        let version_row = client.query_one("SELECT version()", &[]).await.map_err(|e| {
            ClientbookError::connection_failed(format!("Failed to query PostgreSQL version: {e}"))
        })?;
        let version_string: String = version_row.get(0);

        // "PostgreSQL 15.3 on x86_64..." -> "15.3"
        let database_version =
            version_string.split_whitespace().nth(1).unwrap_or("unknown").to_string();

        let row = client.query_one("SELECT current_database(), current_user", &[]).await.map_err(
            |e| ClientbookError::connection_failed(format!("Failed to query connection info: {e}")),
        )?;

        Ok(ConnectionInfo {
            database_version,
            server_info: version_string,
            connected_database: row.get(0),
            user: row.get(1),
        })
    }

    async fn open(config: &ConnectionConfig) -> Result<PostgresSession> {
        let client = connect(config).await?;
        client.batch_execute("BEGIN").await.map_err(engine_error)?;
        Ok(PostgresSession { client })
    }
}

/// Build `PostgreSQL` connection config from `ConnectionConfig`
fn build_pg_config(config: &ConnectionConfig) -> Result<Config> {
    if config.engine != DatabaseType::Postgres {
        return Err(ClientbookError::invalid_input(format!(
            "Expected PostgreSQL engine, got {}",
            config.engine
        )));
    }

    let user = config
        .user
        .as_ref()
        .ok_or_else(|| ClientbookError::invalid_input("PostgreSQL requires 'user' parameter"))?;

    let password = config.password.as_ref().ok_or_else(|| {
        ClientbookError::invalid_input("PostgreSQL requires 'password' parameter")
    })?;

    let database = config.database.as_ref().ok_or_else(|| {
        ClientbookError::invalid_input("PostgreSQL requires 'database' parameter")
    })?;

    let mut pg_config = Config::new();
    pg_config
        .host(config.host.as_deref().unwrap_or(DEFAULT_HOST))
        .port(config.port.unwrap_or(DEFAULT_PORT))
        .user(user)
        .password(password)
        .dbname(database);

    Ok(pg_config)
}

/// Connect and spawn the connection driver task
async fn connect(config: &ConnectionConfig) -> Result<Client> {
    let pg_config = build_pg_config(config)?;

    let (client, connection) = pg_config.connect(NoTls).await.map_err(|e| {
        ClientbookError::connection_failed(format!("Failed to connect to PostgreSQL: {e}"))
    })?;

    // Connection errors are not logged to prevent credential leakage
    tokio::spawn(async move {
        let _ = connection.await;
    });

    Ok(client)
}

fn engine_error(err: tokio_postgres::Error) -> ClientbookError {
    ClientbookError::engine_error("postgres", err.to_string())
}

/// Map a failed statement to a client book error
fn classify(err: tokio_postgres::Error, field: &str, value: &str) -> ClientbookError {
    match err.code() {
        Some(code) if *code == SqlState::UNIQUE_VIOLATION => {
            ClientbookError::duplicate(field, value)
        }
        Some(code) if *code == SqlState::FOREIGN_KEY_VIOLATION => {
            let detail = format!("phone '{value}' references a missing client");
            ClientbookError::client_not_found(detail)
        }
        Some(code)
            if *code == SqlState::CHECK_VIOLATION
                || *code == SqlState::STRING_DATA_RIGHT_TRUNCATION
                || *code == SqlState::NOT_NULL_VIOLATION =>
        {
            ClientbookError::invalid_input(format!("{field} '{value}' rejected: {err}"))
        }
        _ => engine_error(err),
    }
}

/// Convert a key to the `INTEGER` wire type; out-of-range ids cannot exist
fn pg_id(id: i64) -> Result<i32> {
    i32::try_from(id)
        .map_err(|_| ClientbookError::client_not_found(format!("id {id} is out of range")))
}

/// One `PostgreSQL` connection with an open transaction
pub struct PostgresSession {
    client: Client,
}

impl PostgresSession {
    async fn savepoint(&self) -> Result<()> {
        self.client.batch_execute("SAVEPOINT step").await.map_err(engine_error)
    }

    /// Release the savepoint after success, roll back to it after failure
    async fn settle(&self, succeeded: bool) -> Result<()> {
        let sql = if succeeded {
            "RELEASE SAVEPOINT step"
        } else {
            "ROLLBACK TO SAVEPOINT step; RELEASE SAVEPOINT step"
        };
        self.client.batch_execute(sql).await.map_err(engine_error)
    }
}

impl Session for PostgresSession {
    async fn create_tables(&mut self) -> Result<()> {
        self.client.batch_execute(SCHEMA).await.map_err(engine_error)
    }

    async fn drop_table(&mut self, table: Table) -> Result<bool> {
        let row = self
            .client
            .query_one(
                "SELECT EXISTS (
                    SELECT 1 FROM information_schema.tables
                    WHERE table_schema = current_schema() AND table_name = $1
                )",
                &[&table.as_str()],
            )
            .await
            .map_err(engine_error)?;

        if !row.get::<_, bool>(0) {
            return Ok(false);
        }

        self.client.batch_execute(&format!("DROP TABLE {table}")).await.map_err(engine_error)?;
        Ok(true)
    }

    async fn insert_client(&mut self, name: &str, surname: &str, mail: &str) -> Result<i64> {
        self.savepoint().await?;
        let result = self
            .client
            .query_one(
                "INSERT INTO client (name, surname, mail) VALUES ($1, $2, $3)
                 RETURNING client_id",
                &[&name, &surname, &mail],
            )
            .await;
        self.settle(result.is_ok()).await?;

        let row = result.map_err(|e| classify(e, "mail", mail))?;
        Ok(i64::from(row.get::<_, i32>(0)))
    }

    async fn find_client_id(&mut self, lookup: &ClientLookup<'_>) -> Result<Option<i64>> {
        let result = match *lookup {
            ClientLookup::Mail(mail) => {
                self.client
                    .query_opt(
                        "SELECT client_id FROM client WHERE mail = $1
                         ORDER BY client_id LIMIT 1",
                        &[&mail],
                    )
                    .await
            }
            ClientLookup::Number(number) => {
                self.client
                    .query_opt(
                        "SELECT c.client_id FROM client AS c
                         JOIN phone AS p ON c.client_id = p.client_id
                         WHERE p.number = $1
                         ORDER BY c.client_id LIMIT 1",
                        &[&number],
                    )
                    .await
            }
            ClientLookup::Name { name, surname } => {
                self.client
                    .query_opt(
                        "SELECT client_id FROM client WHERE name = $1 AND surname = $2
                         ORDER BY client_id LIMIT 1",
                        &[&name, &surname],
                    )
                    .await
            }
        };

        let row = result.map_err(engine_error)?;
        Ok(row.map(|r| i64::from(r.get::<_, i32>(0))))
    }

    async fn client_rows(&mut self, client_id: i64) -> Result<Vec<ClientRow>> {
        let id = pg_id(client_id)?;
        let rows = self
            .client
            .query(
                "SELECT c.client_id, c.name, c.surname, c.mail, p.number
                 FROM client AS c
                 LEFT JOIN phone AS p ON c.client_id = p.client_id
                 WHERE c.client_id = $1
                 ORDER BY p.phone_id",
                &[&id],
            )
            .await
            .map_err(engine_error)?;

        Ok(rows
            .iter()
            .map(|row| ClientRow {
                client_id: i64::from(row.get::<_, i32>(0)),
                name: row.get(1),
                surname: row.get(2),
                mail: row.get(3),
                number: row.get(4),
            })
            .collect())
    }

    async fn insert_phone(&mut self, client_id: i64, number: &str) -> Result<()> {
        let id = pg_id(client_id)?;
        self.savepoint().await?;
        let result = self
            .client
            .execute("INSERT INTO phone (client_id, number) VALUES ($1, $2)", &[&id, &number])
            .await;
        self.settle(result.is_ok()).await?;

        result.map(|_| ()).map_err(|e| classify(e, "number", number))
    }

    async fn find_phone(&mut self, client_id: i64, number: &str) -> Result<Option<i64>> {
        let id = pg_id(client_id)?;
        let row = self
            .client
            .query_opt(
                "SELECT phone_id FROM phone WHERE client_id = $1 AND number = $2",
                &[&id, &number],
            )
            .await
            .map_err(engine_error)?;

        Ok(row.map(|r| i64::from(r.get::<_, i32>(0))))
    }

    async fn update_phone(&mut self, phone_id: i64, number: &str) -> Result<()> {
        let id = pg_id(phone_id)?;
        self.savepoint().await?;
        let result = self
            .client
            .execute("UPDATE phone SET number = $1 WHERE phone_id = $2", &[&number, &id])
            .await;
        self.settle(result.is_ok()).await?;

        result.map(|_| ()).map_err(|e| classify(e, "number", number))
    }

    async fn update_client(
        &mut self,
        client_id: i64,
        field: ClientField,
        value: &str,
    ) -> Result<bool> {
        let id = pg_id(client_id)?;
        let sql = format!("UPDATE client SET {} = $1 WHERE client_id = $2", field.column());

        self.savepoint().await?;
        let result = self.client.execute(&sql, &[&value, &id]).await;
        self.settle(result.is_ok()).await?;

        result.map(|changed| changed > 0).map_err(|e| classify(e, field.column(), value))
    }

    async fn delete_client_phones(&mut self, client_id: i64) -> Result<Vec<String>> {
        let id = pg_id(client_id)?;
        let rows = self
            .client
            .query("DELETE FROM phone WHERE client_id = $1 RETURNING number", &[&id])
            .await
            .map_err(engine_error)?;

        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    async fn delete_phone(&mut self, number: &str) -> Result<bool> {
        self.client
            .execute("DELETE FROM phone WHERE number = $1", &[&number])
            .await
            .map(|changed| changed > 0)
            .map_err(engine_error)
    }

    async fn delete_client(&mut self, client_id: i64) -> Result<bool> {
        let id = pg_id(client_id)?;
        self.client
            .execute("DELETE FROM client WHERE client_id = $1", &[&id])
            .await
            .map(|changed| changed > 0)
            .map_err(engine_error)
    }

    async fn commit(self) -> Result<()> {
        self.client.batch_execute("COMMIT").await.map_err(engine_error)
    }

    async fn rollback(self) -> Result<()> {
        self.client.batch_execute("ROLLBACK").await.map_err(engine_error)
    }
}
