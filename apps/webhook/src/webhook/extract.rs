//! Typed extraction of candidate fields from the RChilli payload variants.
//!
//! Shapes seen in the wild:
//! - flat: `{FirstName, LastName, Email, PhoneNumber, ResumeFileName}`
//! - `{RChilliEmailInfo: {FirstName, LastName, EmailAddress: [..], PhoneNumber: [..]}}`
//! - `{ResumeParserData: {Name: {..}, Email: [..], PhoneNumber: [..], Address: [..]}}`
//! - `{ResumeInbox: {Base64Data, EmailId, FileName, ..}}`
//!
//! Every field defaults independently; only a missing or mistyped section is an error.

use std::str::FromStr;

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::errors::AppError;
use crate::models::candidate::{CandidateRecord, UNKNOWN_EMAIL, UNKNOWN_NAME, UNKNOWN_PHONE};
use crate::webhook::archive::{decode_attachment, ArchiveError, DecodedAttachment};

const RCHILLI_EMAIL_INFO: &str = "RChilliEmailInfo";
const RESUME_PARSER_DATA: &str = "ResumeParserData";
const RESUME_INBOX: &str = "ResumeInbox";
const FLAT_KEYS: &[&str] = &[
    "FirstName",
    "LastName",
    "Email",
    "EmailAddress",
    "PhoneNumber",
    "ResumeFileName",
];

/// Which payload shape the webhook expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// Detect the shape from the keys present.
    Auto,
    Flat,
    RChilliEmailInfo,
    ResumeParserData,
    ResumeInbox,
}

impl FromStr for Envelope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Envelope::Auto),
            "flat" => Ok(Envelope::Flat),
            "rchilli_email_info" | "rchilliemailinfo" => Ok(Envelope::RChilliEmailInfo),
            "resume_parser_data" | "resumeparserdata" => Ok(Envelope::ResumeParserData),
            "resume_inbox" | "resumeinbox" => Ok(Envelope::ResumeInbox),
            other => Err(format!(
                "unknown envelope '{other}' (expected auto|flat|rchilli_email_info|resume_parser_data|resume_inbox)"
            )),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("payload must be a JSON object")]
    NotAnObject,

    #[error("payload is missing the required '{0}' section")]
    MissingSection(&'static str),

    #[error(
        "payload has none of the recognised sections (flat candidate fields, RChilliEmailInfo, ResumeParserData, ResumeInbox)"
    )]
    NoKnownSection,

    #[error("section '{section}' is malformed: {source}")]
    InvalidSection {
        section: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

impl From<ExtractError> for AppError {
    fn from(e: ExtractError) -> Self {
        AppError::Validation(e.to_string())
    }
}

/// A contact value that may arrive as a string, a number, an object, or a list of those.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContactField {
    Many(Vec<ContactEntry>),
    One(ContactEntry),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContactEntry {
    Text(String),
    Number(serde_json::Number),
    Object(ContactObject),
    /// Booleans, nulls and nested lists carry no contact value.
    Other(IgnoredAny),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ContactObject {
    #[serde(deserialize_with = "lenient_text")]
    email_address: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    formatted_number: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    number: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    formatted_address: Option<String>,
}

impl ContactField {
    /// First non-empty value in the field.
    fn first(&self) -> Option<String> {
        let entries = match self {
            ContactField::Many(entries) => entries.as_slice(),
            ContactField::One(entry) => std::slice::from_ref(entry),
        };
        entries.iter().find_map(ContactEntry::value)
    }
}

impl ContactEntry {
    fn value(&self) -> Option<String> {
        match self {
            ContactEntry::Text(s) => non_empty(Some(s.clone())),
            ContactEntry::Number(n) => Some(n.to_string()),
            ContactEntry::Object(o) => non_empty(o.email_address.clone())
                .or_else(|| non_empty(o.formatted_number.clone()))
                .or_else(|| non_empty(o.number.clone()))
                .or_else(|| non_empty(o.formatted_address.clone())),
            ContactEntry::Other(_) => None,
        }
    }
}

fn first_of(field: &Option<ContactField>) -> Option<String> {
    field.as_ref().and_then(ContactField::first)
}

/// Field set shared by the flat shape, `RChilliEmailInfo` and the `ResumeInbox` envelope.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ContactFields {
    #[serde(deserialize_with = "lenient_text")]
    first_name: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    last_name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    email: Option<ContactField>,
    #[serde(deserialize_with = "lenient")]
    email_address: Option<ContactField>,
    #[serde(deserialize_with = "lenient")]
    email_id: Option<ContactField>,
    #[serde(deserialize_with = "lenient")]
    phone_number: Option<ContactField>,
    #[serde(deserialize_with = "lenient")]
    mobile: Option<ContactField>,
    #[serde(deserialize_with = "lenient")]
    address: Option<ContactField>,
    #[serde(deserialize_with = "lenient_text")]
    resume_file_name: Option<String>,
}

impl ContactFields {
    fn to_record(&self) -> CandidateRecord {
        build_record(RecordParts {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: first_of(&self.email)
                .or_else(|| first_of(&self.email_address))
                .or_else(|| first_of(&self.email_id)),
            phone: first_of(&self.phone_number).or_else(|| first_of(&self.mobile)),
            address: first_of(&self.address),
            resume_url: self.resume_file_name.clone(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ParsedResume {
    #[serde(deserialize_with = "lenient")]
    name: Option<ParsedName>,
    #[serde(deserialize_with = "lenient")]
    email: Option<ContactField>,
    #[serde(deserialize_with = "lenient")]
    phone_number: Option<ContactField>,
    #[serde(deserialize_with = "lenient")]
    address: Option<ContactField>,
    #[serde(deserialize_with = "lenient_text")]
    resume_file_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ParsedName {
    #[serde(deserialize_with = "lenient_text")]
    first_name: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    last_name: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    formatted_name: Option<String>,
}

impl ParsedResume {
    fn to_record(&self) -> CandidateRecord {
        let name = self.name.as_ref();
        let mut first_name = name.and_then(|n| non_empty(n.first_name.clone()));
        let mut last_name = name.and_then(|n| non_empty(n.last_name.clone()));

        // Fall back to splitting "Jane van Doe" into "Jane" / "van Doe".
        if first_name.is_none() && last_name.is_none() {
            if let Some(formatted) = name.and_then(|n| non_empty(n.formatted_name.clone())) {
                let mut parts = formatted.splitn(2, char::is_whitespace);
                first_name = parts.next().map(str::to_string);
                last_name = non_empty(parts.next().map(str::to_string));
            }
        }

        build_record(RecordParts {
            first_name,
            last_name,
            email: first_of(&self.email),
            phone: first_of(&self.phone_number),
            address: first_of(&self.address),
            resume_url: self.resume_file_name.clone(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ResumeInbox {
    #[serde(deserialize_with = "lenient_text")]
    base64_data: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    file_name: Option<String>,
    #[serde(flatten)]
    fields: ContactFields,
}

struct RecordParts {
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    resume_url: Option<String>,
}

fn build_record(parts: RecordParts) -> CandidateRecord {
    CandidateRecord {
        first_name: non_empty(parts.first_name).unwrap_or_else(|| UNKNOWN_NAME.to_string()),
        last_name: non_empty(parts.last_name).unwrap_or_else(|| UNKNOWN_NAME.to_string()),
        email: non_empty(parts.email).unwrap_or_else(|| UNKNOWN_EMAIL.to_string()),
        phone: non_empty(parts.phone).unwrap_or_else(|| UNKNOWN_PHONE.to_string()),
        address: non_empty(parts.address),
        resume_url: non_empty(parts.resume_url),
        resume: None,
    }
}

/// Strings pass through and numbers are rendered; any other JSON type reads as absent.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// A field that does not match its expected shape reads as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Extracts a `CandidateRecord` from an inbound payload.
///
/// With `Envelope::Auto` the first present section wins, in the order
/// `ResumeInbox`, `ResumeParserData`, `RChilliEmailInfo`, flat. With a fixed
/// envelope, the named section must be present. `max_entry_bytes` caps each
/// inflated archive entry.
pub fn extract_candidate(
    payload: &Value,
    envelope: Envelope,
    decode_attachments: bool,
    max_entry_bytes: u64,
) -> Result<CandidateRecord, ExtractError> {
    if !payload.is_object() {
        return Err(ExtractError::NotAnObject);
    }

    let resolved = match envelope {
        Envelope::Auto => detect_envelope(payload).ok_or(ExtractError::NoKnownSection)?,
        fixed => fixed,
    };
    debug!("Extracting candidate using {:?} envelope", resolved);

    match resolved {
        Envelope::Flat => {
            if envelope == Envelope::Flat && !has_flat_keys(payload) {
                return Err(ExtractError::NoKnownSection);
            }
            let fields: ContactFields = parse_section(payload, "flat")?;
            Ok(fields.to_record())
        }
        Envelope::RChilliEmailInfo => {
            let fields: ContactFields =
                parse_section(section(payload, RCHILLI_EMAIL_INFO)?, RCHILLI_EMAIL_INFO)?;
            Ok(fields.to_record())
        }
        Envelope::ResumeParserData => {
            let resume: ParsedResume =
                parse_section(section(payload, RESUME_PARSER_DATA)?, RESUME_PARSER_DATA)?;
            Ok(resume.to_record())
        }
        Envelope::ResumeInbox => {
            let inbox: ResumeInbox = parse_section(section(payload, RESUME_INBOX)?, RESUME_INBOX)?;
            extract_from_inbox(inbox, decode_attachments, max_entry_bytes)
        }
        Envelope::Auto => Err(ExtractError::NoKnownSection),
    }
}

fn extract_from_inbox(
    inbox: ResumeInbox,
    decode_attachments: bool,
    max_entry_bytes: u64,
) -> Result<CandidateRecord, ExtractError> {
    let mut envelope_record = inbox.fields.to_record();
    if envelope_record.resume_url.is_none() {
        envelope_record.resume_url = non_empty(inbox.file_name.clone());
    }

    let encoded = match non_empty(inbox.base64_data) {
        Some(encoded) if decode_attachments => encoded,
        _ => return Ok(envelope_record),
    };

    match decode_attachment(&encoded, inbox.file_name.as_deref(), max_entry_bytes)? {
        DecodedAttachment::Archive {
            resume_json,
            document,
        } => {
            // Nested archives are not decoded.
            let mut record =
                extract_candidate(&resume_json, Envelope::Auto, false, max_entry_bytes)?;
            if !record.has_email() && envelope_record.has_email() {
                record.email = envelope_record.email;
            }
            if record.resume_url.is_none() {
                record.resume_url = envelope_record.resume_url;
            }
            record.resume = document;
            Ok(record)
        }
        DecodedAttachment::Document(document) => {
            envelope_record.resume = Some(document);
            Ok(envelope_record)
        }
    }
}

fn detect_envelope(payload: &Value) -> Option<Envelope> {
    if present(payload, RESUME_INBOX) {
        Some(Envelope::ResumeInbox)
    } else if present(payload, RESUME_PARSER_DATA) {
        Some(Envelope::ResumeParserData)
    } else if present(payload, RCHILLI_EMAIL_INFO) {
        Some(Envelope::RChilliEmailInfo)
    } else if has_flat_keys(payload) {
        Some(Envelope::Flat)
    } else {
        None
    }
}

fn present(payload: &Value, key: &str) -> bool {
    payload.get(key).is_some_and(|v| !v.is_null())
}

fn has_flat_keys(payload: &Value) -> bool {
    FLAT_KEYS.iter().any(|key| present(payload, key))
}

fn section<'a>(payload: &'a Value, key: &'static str) -> Result<&'a Value, ExtractError> {
    payload
        .get(key)
        .filter(|v| !v.is_null())
        .ok_or(ExtractError::MissingSection(key))
}

fn parse_section<T: DeserializeOwned>(
    value: &Value,
    section: &'static str,
) -> Result<T, ExtractError> {
    T::deserialize(value).map_err(|source| ExtractError::InvalidSection { section, source })
}
