use std::fs;

use exercise_protocol::check::{check_document, check_file, Classified, Direction};
use exercise_protocol::Error;
use tempfile::TempDir;

#[test]
fn check_file_reports_each_array_entry() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("guest.json");
    fs::write(
        &path,
        r#"[
            { "message": "height-changed", "data": 300 },
            { "message": "current-state", "data": null, "valid": false },
            { "message": "height-changed", "data": "tall" }
        ]"#,
    )
    .unwrap();

    let report = check_file(&path, Direction::FromIframe).unwrap();
    assert_eq!(report.entries.len(), 3);
    assert_eq!(report.invalid_count(), 1);
    assert!(!report.is_valid());
    assert!(report.entries[2].outcome.is_err());
}

#[test]
fn single_message_document_is_one_entry() {
    let report = check_document(
        r#"{ "message": "upload-result", "success": true, "url": "https://x/y" }"#,
        Direction::ToIframe,
    )
    .unwrap();
    assert!(report.is_valid());
    assert_eq!(report.entries[0].index, 0);
    assert_eq!(
        report.entries[0].outcome.as_ref().unwrap().label(),
        "to-iframe upload-result"
    );
}

#[test]
fn direction_is_enforced() {
    let report = check_document(
        r#"{ "message": "set-language", "data": "en" }"#,
        Direction::FromIframe,
    )
    .unwrap();
    assert!(!report.is_valid());
}

#[test]
fn auto_accepts_window_literals() {
    let report = check_document(r#"["ready", "communication-port"]"#, Direction::Auto).unwrap();
    assert!(report.is_valid());
    assert_eq!(report.entries[0].outcome, Ok(Classified::Ready));
    assert_eq!(report.entries[1].outcome, Ok(Classified::CommunicationPort));
}

#[test]
fn invalid_json_and_missing_files_are_errors() {
    assert!(matches!(
        check_document("{ not json", Direction::Auto),
        Err(Error::Json(_))
    ));

    let temp = TempDir::new().unwrap();
    assert!(matches!(
        check_file(temp.path().join("missing.json"), Direction::Auto),
        Err(Error::Io(_))
    ));
}
