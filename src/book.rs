//! Client book operations.
//!
//! `Phonebook` exposes the create/read/update/delete operations over the `client` and
//! `phone` tables. Every public call is a single resolve-then-act transaction:
//!
//! 1. open a session (connection + `BEGIN`)
//! 2. resolve the target client when the call needs one
//! 3. run the statements
//! 4. commit on success, roll back on error; the connection closes either way
//!
//! Failures local to one item of a batch (a short or duplicate phone number, a
//! duplicate mail on update) are logged, reported in the returned report, and do
//! not stop the remaining items.

use serde::Serialize;
use std::future::Future;
use std::marker::PhantomData;
use tracing::instrument::WithSubscriber;
use tracing::{debug, info, info_span, warn, Dispatch, Instrument};

use crate::assembler::{assemble, ClientView};
use crate::descriptor::{ClientDescriptor, Numbers, PhoneValue};
use crate::engine::{ClientField, ConnectionConfig, DatabaseEngine, Session, Table};
use crate::error::{ClientbookError, Result};
use crate::phone::{normalize, normalize_batch};
use crate::resolver::resolve;

/// Result of `add_client`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddClientReport {
    pub client_id: i64,
    /// Present when the descriptor also carried phone numbers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phones: Option<AddPhoneReport>,
}

/// Result of `add_phone`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AddPhoneReport {
    pub client_id: i64,
    /// Canonical numbers stored
    pub added: Vec<String>,
    /// Candidates rejected by normalization, as given
    pub invalid: Vec<String>,
    /// Canonical numbers already owned by some client
    pub duplicates: Vec<String>,
}

/// A `new_*` value that could not be applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedField {
    pub field: String,
    pub code: String,
    pub message: String,
}

/// Result of `change_client`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeClientReport {
    pub client_id: i64,
    /// Fields updated, in application order
    pub updated: Vec<String>,
    pub skipped: Vec<SkippedField>,
}

impl ChangeClientReport {
    fn skip(&mut self, field: &str, err: &ClientbookError) {
        warn!(field, code = err.error_code(), "Field not updated: {err}");
        self.skipped.push(SkippedField {
            field: field.to_string(),
            code: err.error_code().to_string(),
            message: err.message(),
        });
    }
}

/// Result of `delete_phone`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletePhoneReport {
    pub removed: Vec<String>,
    pub not_found: Vec<String>,
}

/// Result of `delete_client`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteClientReport {
    pub client_id: i64,
    /// Phone numbers removed along with the client
    pub removed_numbers: Vec<String>,
}

/// Which phone rows `delete_phone` removes
#[derive(Debug, Clone, Copy)]
pub enum PhoneTarget<'a> {
    /// Every phone of this client
    AllOf(i64),
    /// The rows holding each of the descriptor's `number` values
    Listed(&'a ClientDescriptor),
}

/// Title-case the way names are stored: first letter of every word upper-case,
/// the rest lower-case; any non-letter starts a new word.
#[must_use]
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

/// Errors that only skip one field of an update
fn is_field_level(err: &ClientbookError) -> bool {
    matches!(
        err,
        ClientbookError::UniqueConstraintViolation { .. }
            | ClientbookError::InvalidInput(_)
            | ClientbookError::InvalidPhoneFormat(_)
            | ClientbookError::ClientNotFound(_)
    )
}

/// Names of the required create fields that are absent
fn missing_required(descriptor: &ClientDescriptor) -> Vec<&'static str> {
    [
        ("name", descriptor.name().is_none()),
        ("surname", descriptor.surname().is_none()),
        ("mail", descriptor.mail().is_none()),
    ]
    .into_iter()
    .filter_map(|(field, missing)| missing.then_some(field))
    .collect()
}

/// Commit on success, roll back on failure; the session is consumed either way
async fn finish<S: Session, T>(session: S, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            session.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = session.rollback().await {
                warn!("Rollback failed: {rollback_err}");
            }
            Err(err)
        }
    }
}

/// Client book over one database engine
pub struct Phonebook<E: DatabaseEngine> {
    config: ConnectionConfig,
    logger: Dispatch,
    _engine: PhantomData<E>,
}

impl<E: DatabaseEngine> Phonebook<E> {
    /// Create a book without touching the database.
    ///
    /// Logs go to the subscriber that is current at this point.
    #[must_use]
    pub fn new(config: ConnectionConfig) -> Self {
        let logger = tracing::dispatcher::get_default(Dispatch::clone);
        Self { config, logger, _engine: PhantomData }
    }

    /// Create a book after checking the database is reachable.
    ///
    /// A `ConnectionFailed` error here is meant to end the process.
    pub async fn connect(config: ConnectionConfig) -> Result<Self> {
        let book = Self::new(config);
        let database = book.config.display_name();
        book.run("connect", async {
            E::validate_connection(&book.config).await?;
            info!("Connected to database '{database}'");
            Ok(())
        })
        .await?;
        Ok(book)
    }

    /// Send this book's logs to `logger` instead
    #[must_use]
    pub fn with_logger(mut self, logger: Dispatch) -> Self {
        self.logger = logger;
        self
    }

    /// Run one operation under the injected logger, inside its span
    async fn run<T, F>(&self, op: &'static str, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let span = tracing::dispatcher::with_default(&self.logger, || {
            info_span!("clientbook", engine = E::TYPE.as_str(), op)
        });

        async move {
            let result = work.await;
            if let Err(err) = &result {
                warn!(code = err.error_code(), "{op} failed: {err}");
            }
            result
        }
        .instrument(span)
        .with_subscriber(self.logger.clone())
        .await
    }

    /// Create the `client` and `phone` tables if they are missing
    pub async fn create_tables(&self) -> Result<()> {
        self.run("create_tables", async {
            info!("Creating tables 'client' and 'phone'");
            let mut session = E::open(&self.config).await?;
            let outcome = session.create_tables().await;
            finish(session, outcome).await?;
            info!("Tables 'client' and 'phone' created");
            Ok(())
        })
        .await
    }

    /// Drop `phone` then `client`, returning the tables that existed
    pub async fn drop_tables(&self) -> Result<Vec<Table>> {
        self.run("drop_tables", async {
            info!("Dropping tables 'phone' and 'client'");
            let mut session = E::open(&self.config).await?;
            let outcome = drop_tables_in(&mut session).await;
            finish(session, outcome).await
        })
        .await
    }

    /// Insert a client, then its phone numbers if the descriptor has any.
    ///
    /// Requires `name`, `surname` and `mail`; `name` and `surname` are title-cased.
    pub async fn add_client(&self, descriptor: &ClientDescriptor) -> Result<AddClientReport> {
        self.run("add_client", async {
            info!(?descriptor, "Adding client");
            let missing = missing_required(descriptor);
            if !missing.is_empty() {
                return Err(ClientbookError::missing_field(missing.join(", ")));
            }

            let mut session = E::open(&self.config).await?;
            let outcome = add_client_in(&mut session, descriptor).await;
            finish(session, outcome).await
        })
        .await
    }

    /// Add the descriptor's `new_number` values to a client.
    ///
    /// The client is resolved from the descriptor unless `known_client_id` is given.
    pub async fn add_phone(
        &self,
        descriptor: &ClientDescriptor,
        known_client_id: Option<i64>,
    ) -> Result<AddPhoneReport> {
        self.run("add_phone", async {
            info!(?descriptor, "Adding phone numbers");
            let numbers = descriptor
                .new_numbers()
                .ok_or_else(|| ClientbookError::missing_field("new_number"))?;

            let mut session = E::open(&self.config).await?;
            let outcome = async {
                let client_id = match known_client_id {
                    Some(client_id) => client_id,
                    None => resolve(&mut session, descriptor).await?,
                };
                add_phones_in(&mut session, client_id, numbers).await
            }
            .await;
            finish(session, outcome).await
        })
        .await
    }

    /// Apply every `new_*` value of the descriptor to the resolved client.
    ///
    /// `new_number` replaces the client's phone holding the first `number` value and
    /// is ignored when there is no `number`.
    pub async fn change_client(&self, descriptor: &ClientDescriptor) -> Result<ChangeClientReport> {
        self.run("change_client", async {
            info!(?descriptor, "Changing client");
            let mut session = E::open(&self.config).await?;
            let outcome = change_client_in(&mut session, descriptor).await;
            finish(session, outcome).await
        })
        .await
    }

    /// Delete phone rows, either all of a client's or the listed numbers
    pub async fn delete_phone(&self, target: PhoneTarget<'_>) -> Result<DeletePhoneReport> {
        self.run("delete_phone", async {
            let mut session = E::open(&self.config).await?;
            let outcome = match target {
                PhoneTarget::AllOf(client_id) => {
                    info!(client_id, "Deleting all phone numbers of client");
                    delete_all_phones_in(&mut session, client_id).await.map(|removed| {
                        DeletePhoneReport { removed, not_found: Vec::new() }
                    })
                }
                PhoneTarget::Listed(descriptor) => {
                    info!(?descriptor, "Deleting phone numbers");
                    delete_listed_phones_in(&mut session, descriptor).await
                }
            };
            finish(session, outcome).await
        })
        .await
    }

    /// Delete a client together with all of its phone numbers
    pub async fn delete_client(&self, descriptor: &ClientDescriptor) -> Result<DeleteClientReport> {
        self.run("delete_client", async {
            info!(?descriptor, "Deleting client");
            let mut session = E::open(&self.config).await?;
            let outcome = delete_client_in(&mut session, descriptor).await;
            finish(session, outcome).await
        })
        .await
    }

    /// Find a client and all of its phone numbers
    pub async fn find_client(&self, descriptor: &ClientDescriptor) -> Result<ClientView> {
        self.run("find_client", async {
            info!(?descriptor, "Finding client");
            let mut session = E::open(&self.config).await?;
            let outcome = find_client_in(&mut session, descriptor).await;
            finish(session, outcome).await
        })
        .await
    }
}

async fn drop_tables_in<S: Session>(session: &mut S) -> Result<Vec<Table>> {
    let mut dropped = Vec::new();
    for table in [Table::Phone, Table::Client] {
        if session.drop_table(table).await? {
            info!("Table '{table}' dropped");
            dropped.push(table);
        } else {
            warn!("Table '{table}' does not exist");
        }
    }
    Ok(dropped)
}

async fn add_client_in<S: Session>(
    session: &mut S,
    descriptor: &ClientDescriptor,
) -> Result<AddClientReport> {
    // Presence checked by the caller
    let name = title_case(descriptor.name().unwrap_or_default());
    let surname = title_case(descriptor.surname().unwrap_or_default());
    let mail = descriptor.mail().unwrap_or_default();

    let client_id = session.insert_client(&name, &surname, mail).await?;
    info!(client_id, "Client {surname} {name} added");

    let phones = match descriptor.numbers() {
        Some(numbers) => Some(add_phones_in(session, client_id, numbers).await?),
        None => None,
    };

    Ok(AddClientReport { client_id, phones })
}

async fn add_phones_in<S: Session>(
    session: &mut S,
    client_id: i64,
    numbers: &Numbers,
) -> Result<AddPhoneReport> {
    let batch = normalize_batch(numbers);
    if !batch.rejected.is_empty() {
        warn!("Invalid phone number(s) skipped: {}", batch.rejected.join(", "));
    }

    let mut report = AddPhoneReport { client_id, invalid: batch.rejected, ..Default::default() };
    for number in batch.accepted {
        match session.insert_phone(client_id, &number).await {
            Ok(()) => report.added.push(number),
            Err(ClientbookError::UniqueConstraintViolation { .. }) => {
                warn!("Phone number {number} already exists");
                report.duplicates.push(number);
            }
            Err(err) => return Err(err),
        }
    }

    if !report.added.is_empty() {
        info!(client_id, "Phone number(s) {} added", report.added.join(", "));
    }
    Ok(report)
}

async fn change_client_in<S: Session>(
    session: &mut S,
    descriptor: &ClientDescriptor,
) -> Result<ChangeClientReport> {
    let client_id = resolve(session, descriptor).await?;
    let mut report = ChangeClientReport { client_id, ..Default::default() };

    let client_updates = [
        (ClientField::Name, descriptor.new_name().map(title_case)),
        (ClientField::Surname, descriptor.new_surname().map(title_case)),
        (ClientField::Mail, descriptor.new_mail().map(ToString::to_string)),
    ];
    for (field, value) in client_updates {
        let Some(value) = value else { continue };
        match session.update_client(client_id, field, &value).await {
            Ok(true) => report.updated.push(field.column().to_string()),
            Ok(false) => report.skip(
                field.column(),
                &ClientbookError::client_not_found(format!("no client with id {client_id}")),
            ),
            Err(err) if is_field_level(&err) => report.skip(field.column(), &err),
            Err(err) => return Err(err),
        }
    }

    if let Some(new_number) = descriptor.new_numbers().and_then(Numbers::first) {
        match descriptor.numbers().and_then(Numbers::first) {
            None => debug!("new_number ignored: no number names the phone to replace"),
            Some(target) => {
                match change_number_in(session, client_id, &target.to_string(), new_number).await {
                    Ok(()) => report.updated.push("number".to_string()),
                    Err(err) if is_field_level(&err) => report.skip("number", &err),
                    Err(err) => return Err(err),
                }
            }
        }
    }

    if report.updated.is_empty() {
        warn!(client_id, "Nothing changed for client");
    } else {
        info!(client_id, "Client updated: {}", report.updated.join(", "));
    }
    Ok(report)
}

async fn change_number_in<S: Session>(
    session: &mut S,
    client_id: i64,
    target: &str,
    new_number: &PhoneValue,
) -> Result<()> {
    let new_number = normalize(new_number)?;
    let phone_id = session.find_phone(client_id, target).await?.ok_or_else(|| {
        ClientbookError::client_not_found(format!(
            "client {client_id} has no phone number '{target}'"
        ))
    })?;
    session.update_phone(phone_id, &new_number).await?;
    info!(client_id, "Phone number {target} replaced by {new_number}");
    Ok(())
}

async fn delete_all_phones_in<S: Session>(session: &mut S, client_id: i64) -> Result<Vec<String>> {
    let removed = session.delete_client_phones(client_id).await?;
    if removed.is_empty() {
        info!(client_id, "No phone numbers found for client");
    } else {
        info!(client_id, "Phone number(s) {} deleted", removed.join(", "));
    }
    Ok(removed)
}

async fn delete_listed_phones_in<S: Session>(
    session: &mut S,
    descriptor: &ClientDescriptor,
) -> Result<DeletePhoneReport> {
    let numbers = descriptor.numbers().ok_or_else(|| ClientbookError::missing_field("number"))?;

    let mut report = DeletePhoneReport::default();
    for value in numbers {
        let number = value.to_string();
        if session.delete_phone(&number).await? {
            report.removed.push(number);
        } else {
            report.not_found.push(number);
        }
    }

    if !report.removed.is_empty() {
        info!("Phone number(s) {} deleted", report.removed.join(", "));
    }
    if !report.not_found.is_empty() {
        warn!("Phone number(s) {} not found", report.not_found.join(", "));
    }
    Ok(report)
}

async fn delete_client_in<S: Session>(
    session: &mut S,
    descriptor: &ClientDescriptor,
) -> Result<DeleteClientReport> {
    let client_id = resolve(session, descriptor).await?;
    let removed_numbers = delete_all_phones_in(session, client_id).await?;

    if !session.delete_client(client_id).await? {
        return Err(ClientbookError::client_not_found(format!("no client with id {client_id}")));
    }
    info!(client_id, "Client deleted");

    Ok(DeleteClientReport { client_id, removed_numbers })
}

async fn find_client_in<S: Session>(
    session: &mut S,
    descriptor: &ClientDescriptor,
) -> Result<ClientView> {
    let client_id = resolve(session, descriptor).await?;
    let rows = session.client_rows(client_id).await?;
    let view = assemble(rows).ok_or_else(|| {
        ClientbookError::client_not_found(format!("no client with id {client_id}"))
    })?;
    info!(?view, "Client found");
    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("ivan"), "Ivan");
        assert_eq!(title_case("PETROV"), "Petrov");
        assert_eq!(title_case("anna-maria"), "Anna-Maria");
        assert_eq!(title_case("o'neil"), "O'Neil");
        assert_eq!(title_case("иван"), "Иван");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_missing_required_lists_all_absent_fields() {
        let descriptor = ClientDescriptor::new().with_name("ivan");
        assert_eq!(missing_required(&descriptor), vec!["surname", "mail"]);

        let complete =
            ClientDescriptor::by_mail("x@test").with_name("ivan").with_surname("petrov");
        assert!(missing_required(&complete).is_empty());
    }

    #[test]
    fn test_field_level_errors() {
        assert!(is_field_level(&ClientbookError::duplicate("mail", "x@test")));
        assert!(is_field_level(&ClientbookError::invalid_phone("12")));
        assert!(!is_field_level(&ClientbookError::engine_error("sqlite", "disk I/O error")));
        assert!(!is_field_level(&ClientbookError::connection_failed("refused")));
    }

    #[test]
    fn test_report_serialization() {
        let report = AddClientReport { client_id: 1, phones: None };
        assert_eq!(serde_json::to_string(&report).unwrap(), r#"{"client_id":1}"#);
    }
}
