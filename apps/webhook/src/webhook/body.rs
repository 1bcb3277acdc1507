//! Content-type dispatch and decoding of the inbound webhook body.

use axum::{
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Form,
};
use bytes::Bytes;
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::AppError;
use crate::models::candidate::ResumeAttachment;
use crate::models::excerpt;

/// Content types the webhook accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Json,
    Multipart,
    UrlEncoded,
}

impl BodyKind {
    /// Matches on the media type only; parameters such as `charset` are ignored.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "application/json" => Some(BodyKind::Json),
            "multipart/form-data" => Some(BodyKind::Multipart),
            "application/x-www-form-urlencoded" => Some(BodyKind::UrlEncoded),
            _ => None,
        }
    }
}

/// Decoded inbound body: the JSON payload plus a file part, if one was uploaded.
#[derive(Debug)]
pub struct InboundPayload {
    pub payload: Value,
    pub attachment: Option<ResumeAttachment>,
}

pub fn content_type(request: &Request) -> &str {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

pub async fn read_payload(request: Request) -> Result<InboundPayload, AppError> {
    let declared = content_type(&request).to_string();
    let kind = BodyKind::from_content_type(&declared).ok_or_else(|| {
        AppError::Validation(if declared.is_empty() {
            "Unsupported content type: no Content-Type header".to_string()
        } else {
            format!("Unsupported content type '{declared}'")
        })
    })?;
    debug!("Decoding webhook body as {:?}", kind);

    match kind {
        BodyKind::Json => read_json(request).await,
        BodyKind::Multipart => read_multipart(request).await,
        BodyKind::UrlEncoded => read_urlencoded(request).await,
    }
}

async fn read_json(request: Request) -> Result<InboundPayload, AppError> {
    let body = Bytes::from_request(request, &())
        .await
        .map_err(|e| AppError::Validation(format!("Could not read request body: {}", e.body_text())))?;
    debug!("JSON payload: {}", excerpt(&String::from_utf8_lossy(&body), 512));

    let payload = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Malformed JSON body: {e}")))?;
    Ok(InboundPayload {
        payload,
        attachment: None,
    })
}

async fn read_multipart(request: Request) -> Result<InboundPayload, AppError> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {}", e.body_text())))?;

    let mut fields = Map::new();
    let mut attachment = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let data = field.bytes().await.map_err(|e| {
                    AppError::Validation(format!("Could not read file part '{name}': {e}"))
                })?;
                // Only the first uploaded file is kept as the résumé.
                if attachment.is_none() && !data.is_empty() {
                    attachment = Some(ResumeAttachment::new(file_name, data));
                }
            }
            None => {
                let text = field.text().await.map_err(|e| {
                    AppError::Validation(format!("Could not read form field '{name}': {e}"))
                })?;
                fields.insert(name, form_value(text));
            }
        }
    }

    debug!("Multipart fields: {:?}", fields.keys().collect::<Vec<_>>());
    Ok(InboundPayload {
        payload: Value::Object(fields),
        attachment,
    })
}

async fn read_urlencoded(request: Request) -> Result<InboundPayload, AppError> {
    let Form(pairs) = Form::<Vec<(String, String)>>::from_request(request, &())
        .await
        .map_err(|e| AppError::Validation(format!("Malformed form body: {}", e.body_text())))?;

    let fields: Map<String, Value> = pairs
        .into_iter()
        .map(|(name, text)| (name, form_value(text)))
        .collect();
    debug!("Form fields: {:?}", fields.keys().collect::<Vec<_>>());
    Ok(InboundPayload {
        payload: Value::Object(fields),
        attachment: None,
    })
}

/// Form fields are strings, but RChilli sometimes posts a whole section as JSON text.
fn form_value(text: String) -> Value {
    let trimmed = text.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(parsed) = serde_json::from_str::<Value>(&text) {
            return parsed;
        }
    }
    Value::String(text)
}
