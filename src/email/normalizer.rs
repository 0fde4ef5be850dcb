use chrono::{DateTime, Utc};
use log::debug;
use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders, PartType};

use crate::email::CanonicalMessage;
use crate::error::NormalizeError;

/// Parse raw RFC 5322 bytes and normalize them.
///
/// Only a message that cannot be parsed at all is an error; undecodable
/// parts contribute empty text.
pub fn normalize(raw: &[u8]) -> Result<CanonicalMessage, NormalizeError> {
    if raw.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(NormalizeError::Empty);
    }

    let parsed = MessageParser::default()
        .parse(raw)
        .ok_or(NormalizeError::Unparsable)?;

    Ok(normalize_parsed(&parsed))
}

/// Normalize an already parsed message. Pure, never fails.
pub fn normalize_parsed(message: &Message<'_>) -> CanonicalMessage {
    CanonicalMessage {
        subject: clean_subject(message.subject().unwrap_or_default()),
        sender: extract_sender(message),
        body: extract_body(message),
        received_at: extract_date(message),
    }
}

/// Replacement characters left by lossy header decoding are dropped
fn clean_subject(subject: &str) -> String {
    subject
        .chars()
        .filter(|&c| c != char::REPLACEMENT_CHARACTER)
        .collect::<String>()
        .trim()
        .to_string()
}

fn extract_sender(message: &Message<'_>) -> String {
    let formatted = message
        .from()
        .and_then(|addrs| addrs.first())
        .and_then(|addr| match (&addr.name, &addr.address) {
            (Some(name), Some(email)) => Some(format!("{} <{}>", name, email)),
            (None, Some(email)) => Some(email.to_string()),
            _ => None,
        });

    formatted
        .or_else(|| message.header_raw("From").map(|raw| raw.trim().to_string()))
        .unwrap_or_default()
}

fn extract_body(message: &Message<'_>) -> String {
    let is_multipart = message
        .parts
        .first()
        .map(|root| matches!(root.body, PartType::Multipart(_)))
        .unwrap_or(false);

    if !is_multipart {
        return message.parts.first().map(decode_part).unwrap_or_default();
    }

    let mut body = String::new();
    for (index, part) in message.parts.iter().enumerate() {
        if !is_plain_text(part) || is_attachment(part) {
            continue;
        }
        let text = decode_part(part);
        debug!("Part {} contributes {} chars of plain text", index, text.len());
        body.push_str(&text);
    }
    body
}

fn is_plain_text(part: &MessagePart<'_>) -> bool {
    if matches!(part.body, PartType::Multipart(_) | PartType::Message(_)) {
        return false;
    }
    match part.content_type() {
        Some(ct) => {
            ct.ctype().eq_ignore_ascii_case("text")
                && ct.subtype().map_or(true, |sub| sub.eq_ignore_ascii_case("plain"))
        }
        // No Content-Type defaults to text/plain
        None => true,
    }
}

fn is_attachment(part: &MessagePart<'_>) -> bool {
    part.content_disposition()
        .map(|cd| cd.ctype().eq_ignore_ascii_case("attachment"))
        .unwrap_or(false)
}

/// Text of a single part. The parser has already applied the declared
/// charset; a part it flagged as undecodable, or whose decoding was lossy,
/// yields an empty string.
fn decode_part(part: &MessagePart<'_>) -> String {
    if part.is_encoding_problem {
        debug!("Encoding problem in part, substituting empty text");
        return String::new();
    }

    let text = part_text(part);
    if text.contains(char::REPLACEMENT_CHARACTER) {
        debug!("Undecodable bytes in part, substituting empty text");
        return String::new();
    }
    text
}

fn part_text(part: &MessagePart<'_>) -> String {
    match &part.body {
        PartType::Text(text) | PartType::Html(text) => text.to_string(),
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => {
            match std::str::from_utf8(bytes) {
                Ok(text) => text.to_string(),
                Err(e) => {
                    debug!("Undecodable binary text part ({}), substituting empty text", e);
                    String::new()
                }
            }
        }
        PartType::Message(_) | PartType::Multipart(_) => String::new(),
    }
}

fn extract_date(message: &Message<'_>) -> Option<DateTime<Utc>> {
    // Parsed header, only when every field is in range
    if let Some(date) = message.date().filter(|date| date.is_valid()) {
        if let Some(parsed) = DateTime::from_timestamp(date.to_timestamp(), 0) {
            return Some(parsed);
        }
    }

    // Fallback: parse the raw header as RFC 2822
    message
        .header_raw("Date")
        .and_then(|raw| DateTime::parse_from_rfc2822(raw.trim()).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_part_message() {
        let raw = b"From: Exam Cell <exams@campus.edu>\r\n\
Subject: Exam rescheduled to Monday 2 PM\r\n\
Date: Tue, 02 Sep 2025 08:15:00 +0000\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
The exam is now on Monday at 2 PM.\r\n";

        let message = normalize(raw).unwrap();
        assert_eq!(message.subject, "Exam rescheduled to Monday 2 PM");
        assert_eq!(message.sender, "Exam Cell <exams@campus.edu>");
        assert!(message.body.starts_with("The exam is now on Monday at 2 PM."));
        assert_eq!(
            message.received_at,
            DateTime::parse_from_rfc3339("2025-09-02T08:15:00Z").ok().map(|d| d.with_timezone(&Utc))
        );
    }

    #[test]
    fn missing_date_is_absent() {
        let raw = b"From: a@b.org\r\nSubject: Hello\r\n\r\nBody\r\n";
        let message = normalize(raw).unwrap();
        assert_eq!(message.received_at, None);
    }

    #[test]
    fn garbage_date_is_absent() {
        let raw = b"From: a@b.org\r\nSubject: Hello\r\nDate: sometime next week\r\n\r\nBody\r\n";
        let message = normalize(raw).unwrap();
        assert_eq!(message.received_at, None);
    }

    #[test]
    fn out_of_range_date_is_absent() {
        let raw = b"From: a@b.org\r\nSubject: Hello\r\nDate: Mon, 99 Sep 2025 99:99:99 +0000\r\n\r\nBody\r\n";
        let message = normalize(raw).unwrap();
        assert_eq!(message.received_at, None);
    }

    #[test]
    fn undecodable_subject_bytes_are_dropped() {
        let raw = b"From: a@b.org\r\nSubject: Bad \xff\xfe bytes\r\n\r\nBody\r\n";
        let message = normalize(raw).unwrap();
        assert!(!message.subject.contains(char::REPLACEMENT_CHARACTER));
        assert!(message.subject.starts_with("Bad "));
        assert!(message.subject.ends_with(" bytes"));
    }

    #[test]
    fn undecodable_single_part_is_empty() {
        let raw = b"From: a@b.org\r\nSubject: Hi\r\nContent-Type: text/plain; charset=utf-8\r\n\r\nhello \xff\xfe world\r\n";
        let message = normalize(raw).unwrap();
        assert_eq!(message.body, "");
    }

    #[test]
    fn encoded_subject_is_decoded() {
        let raw = b"From: a@b.org\r\nSubject: =?UTF-8?B?Q2Fmw6kgbWVldGluZw==?=\r\n\r\nBody\r\n";
        let message = normalize(raw).unwrap();
        assert_eq!(message.subject, "Caf\u{e9} meeting");
    }

    #[test]
    fn multipart_concatenates_plain_parts_only() {
        let raw = b"From: a@b.org\r\n\
Subject: Parts\r\n\
Content-Type: multipart/mixed; boundary=\"XX\"\r\n\
\r\n\
--XX\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
first\r\n\
--XX\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>html</p>\r\n\
--XX\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
Content-Disposition: attachment; filename=\"notes.txt\"\r\n\
\r\n\
attached\r\n\
--XX\r\n\
Content-Type: text/plain; charset=iso-8859-1\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
second =E9t=E9\r\n\
--XX--\r\n";

        let message = normalize(raw).unwrap();
        assert!(message.body.contains("first"));
        assert!(message.body.contains("second \u{e9}t\u{e9}"));
        assert!(!message.body.contains("html"));
        assert!(!message.body.contains("attached"));
        assert!(message.body.find("first") < message.body.find("second"));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(normalize(b"  \r\n"), Err(NormalizeError::Empty)));
    }
}
