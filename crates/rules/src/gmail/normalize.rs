//! Gmail API response normalization
//!
//! Converts Gmail API messages to the records rules are evaluated against.

use anyhow::{Context, Result};
use base64::prelude::*;
use chrono::{DateTime, TimeZone, Utc};

use super::api::{GmailMessage, MessagePart, MessagePayload};
use crate::models::{EmailAddress, MessageRecord};

/// Normalize a Gmail API message to a [`MessageRecord`]
///
/// The received timestamp comes from `internalDate`, falling back to the
/// `Date` header. When neither parses it is left unset, which date
/// conditions report as an evaluation error for this message only.
pub fn normalize_message(gmail_msg: GmailMessage) -> Result<MessageRecord> {
    let payload = gmail_msg
        .payload
        .as_ref()
        .with_context(|| format!("Message {} has no payload", gmail_msg.id))?;

    let from = extract_header(payload, "From")
        .map(|s| EmailAddress::parse(&s))
        .unwrap_or_else(|| EmailAddress::new(""));

    let to = extract_header(payload, "To")
        .map(|s| EmailAddress::parse_list(&s))
        .unwrap_or_default();

    let subject = extract_header(payload, "Subject").unwrap_or_default();

    let received_at = gmail_msg
        .internal_date
        .as_deref()
        .and_then(parse_internal_date)
        .or_else(|| extract_header(payload, "Date").and_then(|d| parse_date_header(&d)));

    let body = extract_plain_text_body(payload)
        .unwrap_or_else(|| decode_html_entities(&gmail_msg.snippet));

    let thread_id = gmail_msg
        .thread_id
        .clone()
        .unwrap_or_else(|| gmail_msg.id.clone());

    Ok(MessageRecord::builder(gmail_msg.id)
        .thread_id(thread_id)
        .from(from)
        .to(to)
        .subject(subject)
        .body(body)
        .label_ids(gmail_msg.label_ids.unwrap_or_default())
        .maybe_received_at(received_at)
        .build())
}

/// Extract a header value by name
fn extract_header(payload: &MessagePayload, name: &str) -> Option<String> {
    payload.headers.as_ref()?.iter().find_map(|h| {
        if h.name.eq_ignore_ascii_case(name) {
            Some(h.value.clone())
        } else {
            None
        }
    })
}

fn parse_internal_date(raw: &str) -> Option<DateTime<Utc>> {
    let millis: i64 = raw.trim().parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

fn parse_date_header(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Extract plain text body from message payload
fn extract_plain_text_body(payload: &MessagePayload) -> Option<String> {
    if let Some(body) = &payload.body
        && let Some(data) = &body.data
        && payload
            .mime_type
            .as_ref()
            .is_some_and(|m| m.starts_with("text/plain"))
    {
        return decode_base64_body(data);
    }

    payload.parts.as_deref().and_then(find_plain_text_in_parts)
}

/// Recursively search message parts for text/plain content
fn find_plain_text_in_parts(parts: &[MessagePart]) -> Option<String> {
    for part in parts {
        if part
            .mime_type
            .as_ref()
            .is_some_and(|m| m.starts_with("text/plain"))
            && let Some(body) = &part.body
            && let Some(data) = &body.data
            && let Some(text) = decode_base64_body(data)
        {
            return Some(text);
        }

        if let Some(nested) = &part.parts
            && let Some(text) = find_plain_text_in_parts(nested)
        {
            return Some(text);
        }
    }

    None
}

/// Decode base64-encoded body data
///
/// Gmail uses URL-safe base64 but padding varies.
fn decode_base64_body(data: &str) -> Option<String> {
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE};

    let decoders: &[&base64::engine::GeneralPurpose] =
        &[&BASE64_URL_SAFE_NO_PAD, &URL_SAFE, &STANDARD, &STANDARD_NO_PAD];

    decoders
        .iter()
        .find_map(|decoder| decoder.decode(data).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok())
}

fn decode_html_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}
