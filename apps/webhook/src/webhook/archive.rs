//! Decoding of the `ResumeInbox.Base64Data` attachment.
//!
//! RChilli sends either a ZIP holding the parsed résumé JSON (and usually the
//! original document), or the document itself. A bare `.docx` is also a ZIP
//! and is told apart by its `word/document.xml` part.
//!
//! Every entry is inflated through a byte cap, so a small compressed body
//! cannot expand past `max_entry_bytes` in memory.

use std::io::{Cursor, Read};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::models::candidate::ResumeAttachment;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const PDF_MAGIC: &[u8] = b"%PDF";
const DOCUMENT_EXTENSIONS: &[&str] = &[".pdf", ".doc", ".docx"];
const WORD_DOCUMENT_PART: &str = "word/document.xml";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Base64Data is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Base64Data is neither a ZIP archive nor a PDF document")]
    UnknownFormat,

    #[error("ZIP archive could not be read: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("ZIP entry could not be read: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP archive contains no JSON resume entry")]
    NoJsonEntry,

    #[error("ZIP entry '{name}' is larger than {limit} bytes once inflated")]
    TooLarge { name: String, limit: u64 },

    #[error("ZIP entry '{name}' is not valid JSON: {source}")]
    InvalidJson {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug)]
pub enum DecodedAttachment {
    /// A ZIP with parsed résumé data and, optionally, the source document.
    Archive {
        resume_json: Value,
        document: Option<ResumeAttachment>,
    },
    /// A bare résumé document with no parsed data.
    Document(ResumeAttachment),
}

pub fn decode_attachment(
    encoded: &str,
    file_name: Option<&str>,
    max_entry_bytes: u64,
) -> Result<DecodedAttachment, ArchiveError> {
    let bytes = decode_base64(encoded)?;

    if bytes.starts_with(ZIP_MAGIC) {
        read_archive(bytes, file_name, max_entry_bytes)
    } else if bytes.starts_with(PDF_MAGIC) {
        Ok(bare_document(bytes, file_name, "resume.pdf"))
    } else {
        Err(ArchiveError::UnknownFormat)
    }
}

fn bare_document(bytes: Vec<u8>, file_name: Option<&str>, fallback: &str) -> DecodedAttachment {
    let name = file_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or(fallback);
    DecodedAttachment::Document(ResumeAttachment::new(name, bytes))
}

/// Standard alphabet. Tolerates embedded whitespace and a `data:` URL prefix.
fn decode_base64(encoded: &str) -> Result<Vec<u8>, ArchiveError> {
    let data = match encoded.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => encoded,
    };
    let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(STANDARD.decode(compact)?)
}

fn read_archive(
    bytes: Vec<u8>,
    file_name: Option<&str>,
    max_entry_bytes: u64,
) -> Result<DecodedAttachment, ArchiveError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;

    if archive.index_for_name(WORD_DOCUMENT_PART).is_some() {
        debug!("ZIP is a Word document, forwarding it as the resume");
        let name = file_name.filter(|n| n.to_ascii_lowercase().ends_with(".docx"));
        let bytes = archive.into_inner().into_inner();
        return Ok(bare_document(bytes, name, "resume.docx"));
    }

    let mut resume_json = None;
    let mut document = None;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let lower = name.to_ascii_lowercase();
        let wants_json = resume_json.is_none() && lower.ends_with(".json");
        let wants_document =
            document.is_none() && DOCUMENT_EXTENSIONS.iter().any(|ext| lower.ends_with(ext));

        if (wants_json || wants_document) && entry.size() > max_entry_bytes {
            return Err(ArchiveError::TooLarge {
                name,
                limit: max_entry_bytes,
            });
        }

        if wants_json {
            let raw = read_entry(&mut entry, &name, max_entry_bytes)?;
            let parsed = serde_json::from_slice::<Value>(&raw)
                .map_err(|source| ArchiveError::InvalidJson {
                    name: name.clone(),
                    source,
                })?;
            debug!("Using ZIP entry {} as resume data", name);
            resume_json = Some(parsed);
        } else if wants_document {
            let raw = read_entry(&mut entry, &name, max_entry_bytes)?;
            let base_name = name.rsplit('/').next().unwrap_or(&name).to_string();
            document = Some(ResumeAttachment::new(base_name, raw));
        }
    }

    let resume_json = resume_json.ok_or(ArchiveError::NoJsonEntry)?;
    Ok(DecodedAttachment::Archive {
        resume_json,
        document,
    })
}

/// Inflates one entry, refusing anything past `limit` whatever size its header declares.
fn read_entry(entry: &mut impl Read, name: &str, limit: u64) -> Result<Vec<u8>, ArchiveError> {
    let mut raw = Vec::new();
    entry.by_ref().take(limit + 1).read_to_end(&mut raw)?;
    if raw.len() as u64 > limit {
        return Err(ArchiveError::TooLarge {
            name: name.to_string(),
            limit,
        });
    }
    Ok(raw)
}
