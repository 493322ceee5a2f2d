//! Clientbook - client directory over a relational database
//!
//! Clientbook keeps clients (name, surname, unique mail) and their phone numbers
//! (unique, canonical 10 digits) in two tables, `client` and `phone`, on
//! `PostgreSQL` or `SQLite`.
//!
//! # Core Behavior
//! - Partial identification: any of `client_id`, `mail`, `number`, or
//!   `name` + `surname` names a client
//! - Phone numbers are normalized to their last 10 characters
//! - Every public operation runs in its own transaction
//! - Per-item failures (duplicate or short number, duplicate mail) are reported and
//!   skipped, never fatal
//!
//! # Module Organization
//! - [`error`] - Error types and codes
//! - [`descriptor`] - Client descriptor (partial identifying and replacement data)
//! - [`phone`] - Phone number normalization
//! - [`engine`] - Database engine traits and implementations
//! - [`resolver`] - Descriptor to `client_id` resolution
//! - [`assembler`] - Joined rows to client view
//! - [`book`] - The create/read/update/delete operations
//! - [`config`] - Named connection registry
//! - [`logging`] - Log sink setup
//! - [`output`] - JSON output envelopes

pub mod assembler;
pub mod book;
pub mod config;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod logging;
pub mod output;
pub mod phone;
pub mod resolver;

pub use assembler::ClientView;
pub use book::{
    AddClientReport, AddPhoneReport, ChangeClientReport, DeleteClientReport, DeletePhoneReport,
    PhoneTarget, Phonebook, SkippedField,
};
pub use config::{
    list_connections, resolve_connection, save_connection, ConfigLocation, ConnectionRegistry,
    StoredConnection,
};
pub use descriptor::{ClientDescriptor, Numbers, PhoneValue};
pub use engine::{ConnectionConfig, ConnectionInfo, DatabaseEngine, DatabaseType, Table};
pub use error::{ClientbookError, Result};
pub use output::{ErrorEnvelope, ErrorInfo, Metadata, SuccessEnvelope};

#[cfg(feature = "postgres")]
pub use engine::postgres::PostgresEngine;
#[cfg(feature = "sqlite")]
pub use engine::sqlite::SqliteEngine;
