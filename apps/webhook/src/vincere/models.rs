use serde::{Deserialize, Serialize};

use crate::models::candidate::CandidateRecord;
use crate::models::excerpt;

/// Candidate body for create and update calls.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidatePayload {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub mobile: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cv_file_url: Option<String>,
}

impl From<&CandidateRecord> for CandidatePayload {
    fn from(record: &CandidateRecord) -> Self {
        Self {
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            email: record.email.clone(),
            mobile: record.phone.clone(),
            address: record.address.clone(),
            cv_file_url: record.resume_url.clone(),
        }
    }
}

/// Vincere candidate id. The API returns numbers; some tenants return strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawId")]
pub struct CandidateId(pub String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

impl From<RawId> for CandidateId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Number(n) => CandidateId(n.to_string()),
            RawId::Text(s) => CandidateId(s),
        }
    }
}

impl std::fmt::Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExistingCandidate {
    pub id: CandidateId,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    List(Vec<ExistingCandidate>),
    Paged { items: Vec<ExistingCandidate> },
    Wrapped { result: PagedItems },
}

#[derive(Deserialize)]
struct PagedItems {
    #[serde(default)]
    items: Vec<ExistingCandidate>,
}

/// Accepts a bare array, `{items: [...]}` or `{result: {items: [...]}}`.
pub fn parse_search_results(body: &str) -> Result<Vec<ExistingCandidate>, serde_json::Error> {
    let parsed: SearchResponse = serde_json::from_str(body)?;
    Ok(match parsed {
        SearchResponse::List(items) | SearchResponse::Paged { items } => items,
        SearchResponse::Wrapped { result } => result.items,
    })
}

#[derive(Debug, Deserialize)]
pub struct CreatedCandidate {
    pub id: Option<CandidateId>,
}

/// Status and body of a non-success downstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResult {
    pub status_code: u16,
    pub body: String,
}

impl UpstreamResult {
    pub fn body_excerpt(&self) -> String {
        excerpt(&self.body, 512)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_uses_camel_case_and_skips_missing() {
        let record = CandidateRecord {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: "jane@x.com".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(CandidatePayload::from(&record)).unwrap();
        assert_eq!(json["firstName"], "Jane");
        assert_eq!(json["mobile"], "N/A");
        assert!(json.get("address").is_none());
        assert!(json.get("cvFileUrl").is_none());
    }

    #[test]
    fn test_candidate_id_accepts_number_or_string() {
        let numeric: CreatedCandidate = serde_json::from_str(r#"{"id": 42}"#).unwrap();
        assert_eq!(numeric.id, Some(CandidateId("42".to_string())));
        let text: CreatedCandidate = serde_json::from_str(r#"{"id": "c-9"}"#).unwrap();
        assert_eq!(text.id, Some(CandidateId("c-9".to_string())));
    }

    #[test]
    fn test_search_results_shapes() {
        assert_eq!(parse_search_results(r#"[{"id": 1}]"#).unwrap().len(), 1);
        assert_eq!(
            parse_search_results(r#"{"items": [{"id": 1}, {"id": 2}]}"#).unwrap().len(),
            2
        );
        let wrapped =
            parse_search_results(r#"{"result": {"items": [{"id": 7, "email": "a@b.c"}]}}"#)
                .unwrap();
        assert_eq!(wrapped[0].id.0, "7");
        assert_eq!(wrapped[0].email.as_deref(), Some("a@b.c"));
    }

    #[test]
    fn test_search_results_reject_garbage() {
        assert!(parse_search_results(r#"{"unexpected": true}"#).is_err());
    }
}
