//! Pull-based reader for SMS backup exports.
//!
//! Only the element currently being decoded is held in memory; the event
//! buffer is cleared after every event.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

const SMS_TAG: &[u8] = b"sms";
const MMS_TAG: &[u8] = b"mms";
const PART_TAG: &[u8] = b"part";

/// Attributes of one element, unescaped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawElement {
    attrs: HashMap<String, String>,
}

impl RawElement {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        RawElement {
            attrs: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMms {
    pub attrs: RawElement,
    pub parts: Vec<RawElement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawRecord {
    Sms(RawElement),
    Mms(RawMms),
}

impl RawRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            RawRecord::Sms(_) => "sms",
            RawRecord::Mms(_) => "mms",
        }
    }
}

#[derive(Debug)]
pub enum ReadError {
    /// One element could not be decoded; the stream continues after it.
    Malformed { position: u64, reason: String },
    /// The parser cannot continue past this point; the stream ends here.
    Syntax { position: u64, source: quick_xml::Error },
}

impl ReadError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReadError::Syntax { .. })
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::Malformed { position, reason } => {
                write!(f, "malformed element at byte {}: {}", position, reason)
            }
            ReadError::Syntax { position, source } => {
                write!(f, "xml syntax error at byte {}: {}", position, source)
            }
        }
    }
}

impl std::error::Error for ReadError {}

struct PendingMms {
    attrs: Result<RawElement, String>,
    parts: Vec<RawElement>,
    part_error: Option<String>,
}

/// Lazy sequence of the `sms`/`mms` records of one export file.
pub struct ExportReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    pending_mms: Option<PendingMms>,
    done: bool,
}

impl ExportReader<BufReader<File>> {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path)?;
        Ok(ExportReader::new(BufReader::new(file)))
    }
}

impl<R: BufRead> ExportReader<R> {
    pub fn new(source: R) -> Self {
        ExportReader {
            reader: Reader::from_reader(source),
            buf: Vec::with_capacity(1024),
            pending_mms: None,
            done: false,
        }
    }
}

fn finish_mms(pending: PendingMms, position: u64) -> Result<RawRecord, ReadError> {
    let attrs = pending
        .attrs
        .map_err(|reason| ReadError::Malformed { position, reason })?;
    if let Some(reason) = pending.part_error {
        return Err(ReadError::Malformed {
            position,
            reason: format!("mms part: {}", reason),
        });
    }
    Ok(RawRecord::Mms(RawMms {
        attrs,
        parts: pending.parts,
    }))
}

impl<R: BufRead> Iterator for ExportReader<R> {
    type Item = Result<RawRecord, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                // Stray or mismatched end tags: the parser has already consumed
                // the tag, so reading resumes at the next element.
                Err(quick_xml::Error::IllFormed(cause)) => {
                    let position = self.reader.error_position();
                    let reason = match self.pending_mms.take() {
                        Some(_) => format!("mms structure: {}", cause),
                        None => cause.to_string(),
                    };
                    return Some(Err(ReadError::Malformed { position, reason }));
                }
                Err(source) => {
                    self.done = true;
                    let position = self.reader.error_position();
                    return Some(Err(ReadError::Syntax { position, source }));
                }
            };
            match event {
                Event::Start(e) | Event::Empty(e) if self.pending_mms.is_some() => {
                    if e.name().as_ref() == PART_TAG {
                        let part = collect_attributes(&e);
                        if let Some(pending) = self.pending_mms.as_mut() {
                            match part {
                                Ok(part) => pending.parts.push(part),
                                Err(reason) => {
                                    pending.part_error.get_or_insert(reason);
                                }
                            }
                        }
                    }
                }
                Event::Start(e) if e.name().as_ref() == MMS_TAG => {
                    self.pending_mms = Some(PendingMms {
                        attrs: collect_attributes(&e),
                        parts: Vec::new(),
                        part_error: None,
                    });
                }
                Event::Empty(e) if e.name().as_ref() == MMS_TAG => {
                    let pending = PendingMms {
                        attrs: collect_attributes(&e),
                        parts: Vec::new(),
                        part_error: None,
                    };
                    let position = self.reader.buffer_position();
                    return Some(finish_mms(pending, position));
                }
                Event::Start(e) | Event::Empty(e) if e.name().as_ref() == SMS_TAG => {
                    let position = self.reader.buffer_position();
                    return Some(
                        collect_attributes(&e)
                            .map(RawRecord::Sms)
                            .map_err(|reason| ReadError::Malformed { position, reason }),
                    );
                }
                Event::End(e) if e.name().as_ref() == MMS_TAG => {
                    if let Some(pending) = self.pending_mms.take() {
                        let position = self.reader.buffer_position();
                        return Some(finish_mms(pending, position));
                    }
                }
                Event::Eof => {
                    self.done = true;
                    if self.pending_mms.take().is_some() {
                        let position = self.reader.buffer_position();
                        return Some(Err(ReadError::Malformed {
                            position,
                            reason: "unterminated mms element".to_string(),
                        }));
                    }
                    return None;
                }
                _ => {}
            }
        }
    }
}

fn collect_attributes(element: &BytesStart<'_>) -> Result<RawElement, String> {
    let mut attrs = HashMap::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| e.to_string())?.into_owned();
        attrs.insert(key, value);
    }
    Ok(RawElement { attrs })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(xml: &str) -> Vec<Result<RawRecord, ReadError>> {
        ExportReader::new(xml.as_bytes()).collect()
    }

    #[test]
    fn yields_sms_and_mms_in_document_order() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <smses count="2">
              <sms address="+15551230000" date="1000" body="hi &amp; bye" type="1" />
              <mms date="2000" msg_box="2" text="pic">
                <parts>
                  <part ct="image/jpeg" data="https://example.com/a.jpg" />
                  <part ct="text/plain" text="caption" />
                </parts>
                <addrs><addr address="+15551230000" type="137" /></addrs>
              </mms>
            </smses>"#;
        let records: Vec<RawRecord> = read_all(xml).into_iter().map(|r| r.expect("record")).collect();
        assert_eq!(records.len(), 2);
        match &records[0] {
            RawRecord::Sms(sms) => assert_eq!(sms.get("body"), Some("hi & bye")),
            other => panic!("unexpected {:?}", other),
        }
        match &records[1] {
            RawRecord::Mms(mms) => {
                assert_eq!(mms.attrs.get("text"), Some("pic"));
                assert_eq!(mms.parts.len(), 2);
                assert_eq!(mms.parts[0].get("ct"), Some("image/jpeg"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn ignores_unrelated_elements() {
        let xml = r#"<root><call number="1" /><sms address="1" date="1" /></root>"#;
        let records = read_all(xml);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].as_ref().expect("sms").kind(), "sms");
    }

    #[test]
    fn malformed_element_is_skipped_not_fatal() {
        let xml = r#"<smses>
            <sms address="1" date="1" body="a" />
            <sms address="2" address="3" date="2" />
            <sms address="4" date="3" body="c" />
        </smses>"#;
        let records = read_all(xml);
        assert_eq!(records.len(), 3);
        assert!(records[0].is_ok());
        let err = records[1].as_ref().expect_err("duplicate attribute");
        assert!(!err.is_fatal());
        assert!(records[2].is_ok());
    }

    #[test]
    fn bad_part_fails_only_its_mms() {
        let xml = r#"<smses>
            <mms date="1" msg_box="1"><parts><part ct="a" ct="b" /></parts></mms>
            <sms address="4" date="3" />
        </smses>"#;
        let records = read_all(xml);
        assert_eq!(records.len(), 2);
        assert!(records[0].is_err());
        assert!(records[1].is_ok());
    }

    #[test]
    fn stray_end_tag_is_skipped() {
        let xml = r#"<smses><sms address="1" date="1" /></sms><sms address="2" date="2" /><sms address="3" date="3" /></smses>"#;
        let records = read_all(xml);
        let ok: Vec<_> = records.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(ok.len(), 3);
        assert!(records.iter().filter_map(|r| r.as_ref().err()).all(|e| !e.is_fatal()));
        assert!(records.iter().any(|r| r.is_err()));
    }

    #[test]
    fn broken_mms_structure_drops_only_that_mms() {
        let xml = r#"<smses>
            <mms date="1" msg_box="1"><parts><part ct="a" /></mms>
            <sms address="4" date="3" />
        </smses>"#;
        let records = read_all(xml);
        assert!(!records.iter().any(|r| matches!(r, Ok(RawRecord::Mms(_)))));
        assert!(records.iter().any(|r| matches!(r, Ok(RawRecord::Sms(_)))));
        assert!(records.iter().filter_map(|r| r.as_ref().err()).all(|e| !e.is_fatal()));
    }

    #[test]
    fn unclosed_tag_at_eof_ends_the_stream() {
        let xml = r#"<smses><sms address="1" date="1" /><sms address="2" "#;
        let records = read_all(xml);
        assert!(records[0].is_ok());
        let last = records.last().expect("error");
        assert!(last.as_ref().expect_err("syntax").is_fatal());
        assert_eq!(records.iter().filter(|r| r.is_ok()).count(), 1);
    }
}
