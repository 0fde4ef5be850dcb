use std::fs;

use chrono::{DateTime, Utc};
use notifly::email::normalize;

fn load(name: &str) -> Vec<u8> {
    fs::read(format!("data_test/{}", name))
        .unwrap_or_else(|e| panic!("Failed to read test email file data_test/{}: {}", name, e))
}

fn utc(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
}

#[test]
fn test_single_part_venue_change() {
    let message = normalize(&load("venue_change.eml")).expect("Failed to normalize email");

    assert_eq!(message.subject, "Class venue change: 9am today");
    assert_eq!(message.sender, "Academic Office <academics@campus.edu>");
    assert_eq!(message.body.trim(), "Class moved to room A-203 at 9:00 AM today.");
    assert_eq!(message.received_at, Some(utc("2025-09-01T01:00:00Z")));
}

#[test]
fn test_multipart_flattens_plain_text_parts() {
    let message = normalize(&load("registration_deadline.eml")).expect("Failed to normalize email");

    assert_eq!(message.subject, "Registration deadline tomorrow 6 PM");
    assert_eq!(message.received_at, Some(utc("2025-09-02T10:00:00Z")));

    // Plain parts in order, decoded from their declared charset
    let first = message.body.find("Complete registration by 6 PM tomorrow. Caf\u{e9} counter closes early.");
    let second = message.body.find("Late fees apply after the deadline.");
    assert!(first.is_some(), "body was {:?}", message.body);
    assert!(second.is_some(), "body was {:?}", message.body);
    assert!(first < second);

    // No html alternative, no attachment
    assert!(!message.body.contains("<html>"));
    assert!(!message.body.contains("Fee schedule"));
}

#[test]
fn test_encoded_subject_without_date() {
    let message = normalize(&load("promo_no_date.eml")).expect("Failed to normalize email");

    assert_eq!(message.subject, "50% off hoodies \u{2013} this week only");
    assert_eq!(message.sender, "Campus Store <offers@campusstore.com>");
    assert_eq!(message.received_at, None);
    assert!(message.body.contains("half price"));
}

#[test]
fn test_normalization_is_pure() {
    let raw = load("art_exhibition.eml");
    assert_eq!(normalize(&raw).unwrap(), normalize(&raw).unwrap());
}

#[test]
fn test_undecodable_bytes_never_reach_the_record() {
    let message = normalize(&load("undecodable_parts.eml")).expect("Failed to normalize email");

    // Bad header bytes are dropped, the rest of the subject is kept
    assert!(!message.subject.contains('\u{fffd}'), "subject was {:?}", message.subject);
    assert!(message.subject.starts_with("Water supply"));
    assert!(message.subject.ends_with("notice"));

    // The part in an unknown charset contributes nothing, the next one is intact
    assert!(!message.body.contains('\u{fffd}'), "body was {:?}", message.body);
    assert!(!message.body.contains("water cut"));
    assert_eq!(message.body.trim(), "Water supply resumes at 5 PM.");
    assert_eq!(message.received_at, Some(utc("2025-09-04T07:45:00Z")));
}
