//! Edge Case Testing
//!
//! Boundary conditions of the client book:
//! - Empty strings and empty lists treated as absent
//! - Formatted and over-long phone numbers
//! - Exact-text number lookups
//! - Column length limits
//! - Unicode names
//! - Log routing through an injected dispatcher

#![cfg(feature = "sqlite")]

use clientbook::{ClientDescriptor, ConnectionConfig, Numbers, Phonebook, SqliteEngine};
use pretty_assertions::assert_eq;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

// ============================================================================
// Test Helpers
// ============================================================================

fn temp_db_path() -> PathBuf {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let path =
        std::env::temp_dir().join(format!("clientbook_edge_{}_{id}.db", std::process::id()));
    let _ = std::fs::remove_file(&path);
    path
}

async fn fresh_book() -> (Phonebook<SqliteEngine>, PathBuf) {
    let path = temp_db_path();
    let book = Phonebook::<SqliteEngine>::new(ConnectionConfig::sqlite(path.clone()));
    book.create_tables().await.expect("Failed to create tables");
    (book, path)
}

fn cleanup(path: &Path) {
    let _ = std::fs::remove_file(path);
}

/// Log sink shared between the test and the subscriber
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ============================================================================
// Absent values
// ============================================================================

#[tokio::test]
async fn test_empty_number_list_adds_no_phones() {
    let (book, path) = fresh_book().await;

    let descriptor = ClientDescriptor::by_mail("x@test")
        .with_name("ivan")
        .with_surname("petrov")
        .with_number(Numbers::Many(Vec::new()));
    let report = book.add_client(&descriptor).await.unwrap();
    assert_eq!(report.phones, None);

    cleanup(&path);
}

#[tokio::test]
async fn test_empty_new_values_are_ignored() {
    let (book, path) = fresh_book().await;

    let client_id = book
        .add_client(&ClientDescriptor::by_mail("x@test").with_name("ivan").with_surname("petrov"))
        .await
        .unwrap()
        .client_id;

    let report = book
        .change_client(&ClientDescriptor::by_id(client_id).with_new_name("").with_new_mail(""))
        .await
        .unwrap();
    assert!(report.updated.is_empty());

    let view = book.find_client(&ClientDescriptor::by_id(client_id)).await.unwrap();
    assert_eq!(view.name, "Ivan");
    assert_eq!(view.mail, "x@test");

    cleanup(&path);
}

#[tokio::test]
async fn test_delete_listed_without_number() {
    let (book, path) = fresh_book().await;

    let descriptor = ClientDescriptor::by_mail("x@test");
    let err = book.delete_phone(clientbook::PhoneTarget::Listed(&descriptor)).await.unwrap_err();
    assert_eq!(err.error_code(), "MISSING_REQUIRED_FIELD");

    cleanup(&path);
}

// ============================================================================
// Phone numbers
// ============================================================================

#[tokio::test]
async fn test_formatted_numbers_keep_last_ten_characters() {
    let (book, path) = fresh_book().await;

    let report = book
        .add_client(
            &ClientDescriptor::by_mail("x@test")
                .with_name("ivan")
                .with_surname("petrov")
                .with_number(vec!["+7 9991234567", "89998887766"]),
        )
        .await
        .unwrap();

    let phones = report.phones.unwrap();
    assert_eq!(phones.added, vec!["9991234567".to_string(), "9998887766".to_string()]);

    cleanup(&path);
}

#[tokio::test]
async fn test_separators_in_last_ten_characters_rejected() {
    let (book, path) = fresh_book().await;

    let report = book
        .add_client(
            &ClientDescriptor::by_mail("x@test")
                .with_name("ivan")
                .with_surname("petrov")
                .with_number(vec!["999-123-45-67", "8 (999) 888-77-66", "+7 9991234567"]),
        )
        .await
        .unwrap();

    let phones = report.phones.unwrap();
    assert_eq!(
        phones.invalid,
        vec!["999-123-45-67".to_string(), "8 (999) 888-77-66".to_string()]
    );
    assert_eq!(phones.added, vec!["9991234567".to_string()]);

    cleanup(&path);
}

#[tokio::test]
async fn test_number_lookup_uses_exact_text() {
    let (book, path) = fresh_book().await;

    book.add_client(
        &ClientDescriptor::by_mail("x@test")
            .with_name("ivan")
            .with_surname("petrov")
            .with_number("+79991234567"),
    )
    .await
    .unwrap();

    let err = book
        .find_client(&ClientDescriptor::new().with_number("+79991234567"))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "CLIENT_NOT_FOUND");

    let view =
        book.find_client(&ClientDescriptor::new().with_number(9_991_234_567_u64)).await.unwrap();
    assert_eq!(view.numbers, vec!["9991234567".to_string()]);

    cleanup(&path);
}

#[tokio::test]
async fn test_same_number_twice_in_one_batch() {
    let (book, path) = fresh_book().await;

    let report = book
        .add_client(
            &ClientDescriptor::by_mail("x@test")
                .with_name("ivan")
                .with_surname("petrov")
                .with_number(vec!["9991234567", "79991234567"]),
        )
        .await
        .unwrap();

    let phones = report.phones.unwrap();
    assert_eq!(phones.added, vec!["9991234567".to_string()]);
    assert_eq!(phones.duplicates, vec!["9991234567".to_string()]);

    cleanup(&path);
}

#[tokio::test]
async fn test_short_replacement_number_is_skipped() {
    let (book, path) = fresh_book().await;

    book.add_client(
        &ClientDescriptor::by_mail("x@test")
            .with_name("ivan")
            .with_surname("petrov")
            .with_number(9_991_234_567_u64),
    )
    .await
    .unwrap();

    let report = book
        .change_client(
            &ClientDescriptor::new().with_number(9_991_234_567_u64).with_new_number(555_u64),
        )
        .await
        .unwrap();
    assert_eq!(report.skipped[0].field, "number");
    assert_eq!(report.skipped[0].code, "INVALID_PHONE_FORMAT");

    cleanup(&path);
}

// ============================================================================
// Names
// ============================================================================

#[tokio::test]
async fn test_unicode_names_title_cased() {
    let (book, path) = fresh_book().await;

    let client_id = book
        .add_client(
            &ClientDescriptor::by_mail("ivan@test").with_name("иван").with_surname("ПЕТРОВ"),
        )
        .await
        .unwrap()
        .client_id;

    let view = book.find_client(&ClientDescriptor::by_id(client_id)).await.unwrap();
    assert_eq!(view.name, "Иван");
    assert_eq!(view.surname, "Петров");

    cleanup(&path);
}

#[tokio::test]
async fn test_over_long_new_surname_is_skipped() {
    let (book, path) = fresh_book().await;

    let client_id = book
        .add_client(&ClientDescriptor::by_mail("x@test").with_name("ivan").with_surname("petrov"))
        .await
        .unwrap()
        .client_id;

    let report = book
        .change_client(
            &ClientDescriptor::by_id(client_id)
                .with_new_name("petr")
                .with_new_surname("x".repeat(31)),
        )
        .await
        .unwrap();
    assert_eq!(report.updated, vec!["name".to_string()]);
    assert_eq!(report.skipped[0].code, "INVALID_INPUT");

    cleanup(&path);
}

// ============================================================================
// Logging
// ============================================================================

#[tokio::test]
async fn test_injected_logger_receives_events() {
    let logs = CapturedLogs::default();
    let sink = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(move || sink.clone())
        .finish();

    let path = temp_db_path();
    let book = Phonebook::<SqliteEngine>::new(ConnectionConfig::sqlite(path.clone()))
        .with_logger(tracing::Dispatch::new(subscriber));
    book.create_tables().await.unwrap();
    let _ = book.find_client(&ClientDescriptor::by_mail("nobody@test")).await;

    let text = logs.text();
    assert!(text.contains("Tables 'client' and 'phone' created"));
    assert!(text.contains("No client found by mail 'nobody@test'"));
    assert!(text.contains("op=\"find_client\""));
    assert!(text.contains("CLIENT_NOT_FOUND"));

    cleanup(&path);
}
