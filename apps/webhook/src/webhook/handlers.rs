//! Axum route handlers for the RChilli webhook.

use axum::{
    extract::{FromRequest, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::WebhookMode;
use crate::errors::AppError;
use crate::models::excerpt;
use crate::state::AppState;
use crate::vincere::upsert::{upsert_candidate, UpsertAction, UpsertOutcome};
use crate::webhook::body::{content_type, read_payload};
use crate::webhook::extract::extract_candidate;

/// POST /
///
/// Always answers with JSON. Validation failures are 400; Vincere failures are
/// 400/500 unless `ack_upstream_failures` turns them into a 200
/// `{status: "accepted", warning}` acknowledgement.
pub async fn handle_webhook(State(state): State<AppState>, request: Request) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!("webhook", %request_id);

    async move {
        info!("Incoming webhook, Content-Type: {:?}", content_type(&request));

        if state.config.mode == WebhookMode::Safe {
            return acknowledge_safe_mode(request).await;
        }

        match forward_candidate(&state, request).await {
            Ok(outcome) => success_response(outcome),
            Err(err) if err.is_downstream() && state.config.ack_upstream_failures => {
                warn!("Acknowledging webhook despite downstream failure: {err}");
                let body = json!({"status": "accepted", "warning": err.to_string()});
                (StatusCode::OK, Json(body)).into_response()
            }
            Err(err) => err.into_response(),
        }
    }
    .instrument(span)
    .await
}

async fn forward_candidate(state: &AppState, request: Request) -> Result<UpsertOutcome, AppError> {
    let inbound = read_payload(request).await?;

    let mut record = extract_candidate(
        &inbound.payload,
        state.config.envelope,
        state.config.decode_attachments,
        state.config.max_body_bytes as u64,
    )?;
    if record.resume.is_none() {
        record.resume = inbound.attachment;
    }
    info!(
        "Candidate extracted: {} {} <{}>",
        record.first_name, record.last_name, record.email
    );

    let token = state.tokens.fetch().await?;
    debug!("Using access token obtained at {}", token.obtained_at);
    let outcome = upsert_candidate(state.vincere.as_ref(), &token, &record).await?;
    Ok(outcome)
}

#[derive(Serialize)]
struct UpsertResponse {
    status: &'static str,
    #[serde(flatten)]
    outcome: UpsertOutcome,
}

fn success_response(outcome: UpsertOutcome) -> Response {
    let (status, message) = match outcome.action {
        UpsertAction::Created => (StatusCode::CREATED, "Candidate sent to Vincere"),
        UpsertAction::Updated => (StatusCode::OK, "Candidate updated in Vincere"),
    };
    let body = UpsertResponse {
        status: message,
        outcome,
    };
    (status, Json(body)).into_response()
}

/// Logs whatever arrived and returns 200 so the sender stops retrying.
async fn acknowledge_safe_mode(request: Request) -> Response {
    match Bytes::from_request(request, &()).await {
        Ok(body) => {
            let text = String::from_utf8_lossy(&body);
            info!("Safe mode payload ({} bytes): {}", body.len(), excerpt(&text, 4096));
            (
                StatusCode::OK,
                Json(json!({"status": "Payload received in safe mode"})),
            )
                .into_response()
        }
        Err(e) => {
            warn!("Safe mode could not read body: {}", e.body_text());
            (
                StatusCode::OK,
                Json(json!({"error": "Unexpected failure", "message": e.body_text()})),
            )
                .into_response()
        }
    }
}
