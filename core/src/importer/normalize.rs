use url::Url;

use crate::error::RecordError;
use crate::fingerprint::{fingerprint, MMS_MARKER};
use crate::models::MessageKind;
use crate::reader::{RawElement, RawMms, RawRecord};

/// Box code the platform uses for messages sent from this phone.
const SENT_BOX: &str = "2";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderSeed {
    pub phone_number: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAttachment {
    pub locator: String,
    pub content_type: Option<String>,
}

/// Canonical message shape, before identity resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedMessage {
    pub fingerprint: String,
    pub thread_id: i64,
    pub sender: Option<SenderSeed>,
    pub kind: MessageKind,
    pub timestamp: i64,
    pub body: String,
    pub is_from_me: bool,
    pub status: Option<String>,
    pub read: bool,
    pub date_sent: i64,
    pub date_received: i64,
    pub subject: Option<String>,
    pub attachments: Vec<PendingAttachment>,
}

pub fn normalize(record: &RawRecord) -> Result<NormalizedMessage, RecordError> {
    match record {
        RawRecord::Sms(sms) => normalize_sms(sms),
        RawRecord::Mms(mms) => normalize_mms(mms),
    }
}

fn normalize_sms(sms: &RawElement) -> Result<NormalizedMessage, RecordError> {
    let address = sms
        .get("address")
        .ok_or(RecordError::MissingAttribute("address"))?;
    let date_raw = sms.get("date").unwrap_or("0");
    let timestamp = parse_millis("date", date_raw)?;
    let body = sms.get("body").unwrap_or_default();
    Ok(NormalizedMessage {
        fingerprint: fingerprint(date_raw, address, body),
        thread_id: thread_id(sms),
        sender: Some(SenderSeed {
            phone_number: address.to_string(),
            name: sms.get("contact_name").map(str::to_string),
        }),
        kind: MessageKind::Sms,
        timestamp,
        body: body.to_string(),
        is_from_me: sms.get("type") == Some(SENT_BOX),
        status: sms.get("status").map(str::to_string),
        read: read_flag(sms),
        date_sent: optional_millis(sms, "date_sent")?,
        date_received: timestamp,
        subject: sms.get("subject").map(str::to_string),
        attachments: Vec::new(),
    })
}

fn normalize_mms(mms: &RawMms) -> Result<NormalizedMessage, RecordError> {
    let attrs = &mms.attrs;
    let date_raw = attrs.get("date").unwrap_or("0");
    let timestamp = parse_millis("date", date_raw)?;
    let text = attrs.get("text").unwrap_or_default();
    let attachments = mms
        .parts
        .iter()
        .filter_map(|part| {
            let locator = part.get("data")?;
            if !is_remote_locator(locator) {
                return None;
            }
            Some(PendingAttachment {
                locator: locator.to_string(),
                content_type: part.get("ct").map(str::to_string),
            })
        })
        .collect();
    Ok(NormalizedMessage {
        fingerprint: fingerprint(date_raw, MMS_MARKER, text),
        thread_id: thread_id(attrs),
        sender: None,
        kind: MessageKind::Mms,
        timestamp,
        body: text.to_string(),
        is_from_me: attrs.get("msg_box") == Some(SENT_BOX),
        status: None,
        read: read_flag(attrs),
        date_sent: optional_millis(attrs, "date_sent")?,
        date_received: timestamp,
        subject: attrs.get("sub").map(str::to_string),
        attachments,
    })
}

/// Unparseable or missing thread ids land in the shared thread 0.
fn thread_id(element: &RawElement) -> i64 {
    element
        .get("thread_id")
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(0)
}

fn read_flag(element: &RawElement) -> bool {
    element.get("read").unwrap_or("1") == "1"
}

fn parse_millis(field: &'static str, raw: &str) -> Result<i64, RecordError> {
    raw.trim().parse().map_err(|_| RecordError::InvalidNumber {
        field,
        value: raw.to_string(),
    })
}

fn optional_millis(element: &RawElement, field: &'static str) -> Result<i64, RecordError> {
    match element.get(field) {
        Some(raw) => parse_millis(field, raw),
        None => Ok(0),
    }
}

pub fn is_remote_locator(locator: &str) -> bool {
    Url::parse(locator)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}
