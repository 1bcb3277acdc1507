use bytes::Bytes;

pub const UNKNOWN_NAME: &str = "Unknown";
pub const UNKNOWN_EMAIL: &str = "unknown@example.com";
pub const UNKNOWN_PHONE: &str = "N/A";

/// Candidate fields extracted from one inbound RChilli payload.
///
/// Absent fields carry the sentinels above. The sentinels are forwarded to
/// Vincere as-is but never used to look up an existing candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRecord {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
    /// File name or URL RChilli reported for the résumé.
    pub resume_url: Option<String>,
    pub resume: Option<ResumeAttachment>,
}

impl Default for CandidateRecord {
    fn default() -> Self {
        Self {
            first_name: UNKNOWN_NAME.to_string(),
            last_name: UNKNOWN_NAME.to_string(),
            email: UNKNOWN_EMAIL.to_string(),
            phone: UNKNOWN_PHONE.to_string(),
            address: None,
            resume_url: None,
            resume: None,
        }
    }
}

impl CandidateRecord {
    pub fn has_email(&self) -> bool {
        is_real_value(&self.email, UNKNOWN_EMAIL)
    }

    pub fn has_phone(&self) -> bool {
        is_real_value(&self.phone, UNKNOWN_PHONE)
    }

    /// Key used to find an existing candidate. Email wins over phone.
    pub fn lookup_key(&self) -> Option<LookupKey> {
        if self.has_email() {
            Some(LookupKey::Email(self.email.trim().to_string()))
        } else if self.has_phone() {
            Some(LookupKey::Phone(self.phone.trim().to_string()))
        } else {
            None
        }
    }
}

fn is_real_value(value: &str, sentinel: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !value.eq_ignore_ascii_case(sentinel)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupKey {
    Email(String),
    Phone(String),
}

impl LookupKey {
    /// Filter expression understood by the Vincere candidate search.
    pub fn filter_expression(&self) -> String {
        match self {
            LookupKey::Email(email) => format!("email:\"{email}\""),
            LookupKey::Phone(phone) => format!("phone:\"{phone}\""),
        }
    }
}

/// A résumé document to upload alongside the candidate.
#[derive(Clone, PartialEq)]
pub struct ResumeAttachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl ResumeAttachment {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        let content_type = content_type_for(&file_name).to_string();
        Self {
            file_name,
            content_type,
            bytes: bytes.into(),
        }
    }
}

// Résumés can be megabytes; keep them out of Debug output.
impl std::fmt::Debug for ResumeAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumeAttachment")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

pub fn content_type_for(file_name: &str) -> &'static str {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".pdf") {
        "application/pdf"
    } else if lower.ends_with(".docx") {
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    } else if lower.ends_with(".doc") {
        "application/msword"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_key_prefers_email() {
        let record = CandidateRecord {
            email: "jane@x.com".to_string(),
            phone: "+44 20 7946 0000".to_string(),
            ..Default::default()
        };
        assert_eq!(
            record.lookup_key(),
            Some(LookupKey::Email("jane@x.com".to_string()))
        );
    }

    #[test]
    fn test_lookup_key_falls_back_to_phone() {
        let record = CandidateRecord {
            phone: "555-0100".to_string(),
            ..Default::default()
        };
        assert_eq!(
            record.lookup_key(),
            Some(LookupKey::Phone("555-0100".to_string()))
        );
    }

    #[test]
    fn test_sentinels_are_not_lookup_keys() {
        let record = CandidateRecord::default();
        assert!(!record.has_email());
        assert!(!record.has_phone());
        assert_eq!(record.lookup_key(), None);
    }

    #[test]
    fn test_filter_expression_quotes_value() {
        let key = LookupKey::Email("jane@x.com".to_string());
        assert_eq!(key.filter_expression(), "email:\"jane@x.com\"");
    }

    #[test]
    fn test_attachment_content_type_from_extension() {
        assert_eq!(ResumeAttachment::new("cv.PDF", vec![1]).content_type, "application/pdf");
        assert_eq!(ResumeAttachment::new("cv.doc", vec![1]).content_type, "application/msword");
        assert_eq!(
            ResumeAttachment::new("cv", vec![1]).content_type,
            "application/octet-stream"
        );
    }
}
