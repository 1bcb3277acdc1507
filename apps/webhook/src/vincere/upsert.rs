//! Candidate upsert: locate by email/phone, then update or create, then
//! upload the résumé if there is one.
//!
//! The three calls are independent. A failed upload does not undo the
//! create/update; it is logged and reported in `UpsertOutcome`.

use serde::Serialize;
use tracing::{info, warn};

use crate::models::candidate::CandidateRecord;
use crate::vincere::auth::AccessToken;
use crate::vincere::models::{CandidateId, CandidatePayload};
use crate::vincere::{CandidateApi, UpstreamError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertAction {
    Created,
    Updated,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpsertOutcome {
    pub candidate_id: CandidateId,
    pub action: UpsertAction,
    /// `None` when the payload carried no résumé document.
    pub resume_uploaded: Option<bool>,
}

pub async fn upsert_candidate(
    api: &dyn CandidateApi,
    token: &AccessToken,
    record: &CandidateRecord,
) -> Result<UpsertOutcome, UpstreamError> {
    let payload = CandidatePayload::from(record);

    let existing = match record.lookup_key() {
        Some(key) => api.find_candidate(token, &key).await?,
        None => {
            info!("Candidate has no usable email or phone; skipping lookup");
            None
        }
    };

    let (candidate_id, action) = match existing {
        Some(found) => {
            info!(
                "Updating existing Vincere candidate {} ({})",
                found.id,
                found.email.as_deref().unwrap_or("no email on record")
            );
            api.update_candidate(token, &found.id, &payload).await?;
            (found.id, UpsertAction::Updated)
        }
        None => {
            let id = api.create_candidate(token, &payload).await?;
            info!("Created Vincere candidate {}", id);
            (id, UpsertAction::Created)
        }
    };

    let resume_uploaded = match &record.resume {
        Some(resume) => match api.upload_resume(token, &candidate_id, resume).await {
            Ok(()) => {
                info!(
                    "Uploaded résumé {} for candidate {}",
                    resume.file_name, candidate_id
                );
                Some(true)
            }
            Err(e) => {
                warn!("Résumé upload failed for candidate {candidate_id}: {e}");
                Some(false)
            }
        },
        None => None,
    };

    Ok(UpsertOutcome {
        candidate_id,
        action,
        resume_uploaded,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::models::candidate::{LookupKey, ResumeAttachment};
    use crate::vincere::models::{ExistingCandidate, UpstreamResult};

    /// Records every call; behaviour is controlled by the fields.
    #[derive(Default)]
    struct FakeVincere {
        existing: Option<&'static str>,
        fail_upload: bool,
        fail_create: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeVincere {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    fn status_error(operation: &'static str, status_code: u16) -> UpstreamError {
        UpstreamError::Status {
            operation,
            result: UpstreamResult {
                status_code,
                body: "boom".to_string(),
            },
        }
    }

    #[async_trait]
    impl CandidateApi for FakeVincere {
        async fn find_candidate(
            &self,
            _token: &AccessToken,
            key: &LookupKey,
        ) -> Result<Option<ExistingCandidate>, UpstreamError> {
            self.record(format!("find {}", key.filter_expression()));
            Ok(self.existing.map(|id| ExistingCandidate {
                id: CandidateId(id.to_string()),
                email: None,
            }))
        }

        async fn create_candidate(
            &self,
            _token: &AccessToken,
            candidate: &CandidatePayload,
        ) -> Result<CandidateId, UpstreamError> {
            self.record(format!("create {}", candidate.email));
            if self.fail_create {
                return Err(status_error("candidate create", 422));
            }
            Ok(CandidateId("new-1".to_string()))
        }

        async fn update_candidate(
            &self,
            _token: &AccessToken,
            id: &CandidateId,
            _candidate: &CandidatePayload,
        ) -> Result<(), UpstreamError> {
            self.record(format!("update {id}"));
            Ok(())
        }

        async fn upload_resume(
            &self,
            _token: &AccessToken,
            id: &CandidateId,
            resume: &ResumeAttachment,
        ) -> Result<(), UpstreamError> {
            self.record(format!("upload {id} {}", resume.file_name));
            if self.fail_upload {
                return Err(status_error("resume upload", 500));
            }
            Ok(())
        }
    }

    fn token() -> AccessToken {
        AccessToken {
            value: "tok".to_string(),
            obtained_at: Utc::now(),
        }
    }

    fn jane() -> CandidateRecord {
        CandidateRecord {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: "jane@x.com".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_locator_miss_creates() {
        let api = FakeVincere::default();
        let outcome = upsert_candidate(&api, &token(), &jane()).await.unwrap();

        assert_eq!(outcome.action, UpsertAction::Created);
        assert_eq!(outcome.candidate_id.0, "new-1");
        assert_eq!(outcome.resume_uploaded, None);
        assert_eq!(
            api.calls(),
            vec!["find email:\"jane@x.com\"", "create jane@x.com"]
        );
    }

    #[tokio::test]
    async fn test_locator_match_updates() {
        let api = FakeVincere {
            existing: Some("42"),
            ..Default::default()
        };
        let outcome = upsert_candidate(&api, &token(), &jane()).await.unwrap();

        assert_eq!(outcome.action, UpsertAction::Updated);
        assert_eq!(outcome.candidate_id.0, "42");
        assert_eq!(api.calls(), vec!["find email:\"jane@x.com\"", "update 42"]);
    }

    #[tokio::test]
    async fn test_no_lookup_key_skips_search() {
        let api = FakeVincere::default();
        let record = CandidateRecord::default();
        upsert_candidate(&api, &token(), &record).await.unwrap();

        assert_eq!(api.calls(), vec!["create unknown@example.com"]);
    }

    #[tokio::test]
    async fn test_resume_uploaded_against_resolved_id() {
        let api = FakeVincere {
            existing: Some("42"),
            ..Default::default()
        };
        let record = CandidateRecord {
            resume: Some(ResumeAttachment::new("jane.pdf", b"%PDF".to_vec())),
            ..jane()
        };
        let outcome = upsert_candidate(&api, &token(), &record).await.unwrap();

        assert_eq!(outcome.resume_uploaded, Some(true));
        assert_eq!(api.calls().last().unwrap(), "upload 42 jane.pdf");
    }

    #[tokio::test]
    async fn test_failed_upload_keeps_create() {
        let api = FakeVincere {
            fail_upload: true,
            ..Default::default()
        };
        let record = CandidateRecord {
            resume: Some(ResumeAttachment::new("jane.pdf", b"%PDF".to_vec())),
            ..jane()
        };
        let outcome = upsert_candidate(&api, &token(), &record).await.unwrap();

        assert_eq!(outcome.action, UpsertAction::Created);
        assert_eq!(outcome.resume_uploaded, Some(false));
    }

    #[tokio::test]
    async fn test_create_failure_propagates_and_skips_upload() {
        let api = FakeVincere {
            fail_create: true,
            ..Default::default()
        };
        let record = CandidateRecord {
            resume: Some(ResumeAttachment::new("jane.pdf", b"%PDF".to_vec())),
            ..jane()
        };
        let err = upsert_candidate(&api, &token(), &record).await.unwrap_err();

        assert_eq!(err.status_code(), Some(422));
        assert!(!api.calls().iter().any(|c| c.starts_with("upload")));
    }
}
