//! JSON request/response boundary between an edit relay and the patch engine.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::app::patch::PatchEngine;
use crate::domain::errors::PatchError;
use crate::domain::model::PatchOutcome;

/// Incoming `{editId, newValue}` request. Both fields are required; they are
/// optional here so a missing field can be reported as a client error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchRequest {
    #[serde(default)]
    pub edit_id: Option<String>,
    #[serde(default)]
    pub new_value: Option<String>,
}

impl PatchRequest {
    pub fn new(edit_id: impl Into<String>, new_value: impl Into<String>) -> Self {
        Self {
            edit_id: Some(edit_id.into()),
            new_value: Some(new_value.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatchResponse {
    Success {
        success: bool,
        #[serde(rename = "filePath")]
        file_path: String,
        #[serde(rename = "newContent")]
        new_content: String,
    },
    Failure {
        error: String,
    },
}

impl From<PatchOutcome> for PatchResponse {
    fn from(outcome: PatchOutcome) -> Self {
        PatchResponse::Success {
            success: true,
            file_path: outcome.file_path,
            new_content: outcome.new_content,
        }
    }
}

/// HTTP-equivalent class of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Ok,
    BadRequest,
    Forbidden,
    NotFound,
    Conflict,
    Internal,
}

impl StatusClass {
    pub fn http_status(self) -> u16 {
        match self {
            StatusClass::Ok => 200,
            StatusClass::BadRequest => 400,
            StatusClass::Forbidden => 403,
            StatusClass::NotFound => 404,
            StatusClass::Conflict => 409,
            StatusClass::Internal => 500,
        }
    }
}

impl From<&PatchError> for StatusClass {
    fn from(err: &PatchError) -> Self {
        match err {
            PatchError::InvalidIdentifier(_) => StatusClass::BadRequest,
            PatchError::AccessDenied { .. } => StatusClass::Forbidden,
            PatchError::NotFound { .. } | PatchError::TargetNotFound { .. } => {
                StatusClass::NotFound
            }
            PatchError::NotMutable { .. } => StatusClass::Conflict,
            PatchError::ParseFailure { .. } | PatchError::InternalFailure { .. } => {
                StatusClass::Internal
            }
        }
    }
}

/// One line of the `serve` protocol: the response plus its status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayReply {
    pub status: u16,
    #[serde(flatten)]
    pub body: PatchResponse,
}

impl RelayReply {
    fn new(class: StatusClass, body: PatchResponse) -> Self {
        Self {
            status: class.http_status(),
            body,
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusClass::BadRequest,
            PatchResponse::Failure {
                error: message.into(),
            },
        )
    }
}

/// Validate and run one request.
pub fn handle(engine: &PatchEngine, request: PatchRequest) -> RelayReply {
    let (Some(edit_id), Some(new_value)) = (request.edit_id, request.new_value) else {
        return RelayReply::bad_request("editId and newValue are required");
    };

    match engine.apply_patch(&edit_id, &new_value) {
        Ok(outcome) => RelayReply::new(StatusClass::Ok, outcome.into()),
        Err(err) => {
            tracing::warn!(edit_id = %edit_id, kind = err.kind(), error = %err, "patch rejected");
            RelayReply::new(
                StatusClass::from(&err),
                PatchResponse::Failure {
                    error: format!("{}: {err}", err.kind()),
                },
            )
        }
    }
}

/// Decode one JSON request and run it.
pub fn handle_json(engine: &PatchEngine, raw: &str) -> RelayReply {
    match serde_json::from_str::<PatchRequest>(raw) {
        Ok(request) => handle(engine, request),
        Err(err) => RelayReply::bad_request(format!("malformed request: {err}")),
    }
}

/// Serve newline-delimited JSON requests until `reader` is exhausted.
/// Returns the number of requests answered.
pub fn serve<R: BufRead, W: Write>(engine: &PatchEngine, reader: R, mut writer: W) -> Result<usize> {
    let mut answered = 0;
    for line in reader.lines() {
        let line = line.context("failed to read request")?;
        if line.trim().is_empty() {
            continue;
        }
        let reply = handle_json(engine, &line);
        let encoded = serde_json::to_string(&reply).context("failed to encode reply")?;
        writeln!(writer, "{encoded}").context("failed to write reply")?;
        writer.flush().context("failed to flush reply")?;
        answered += 1;
    }
    Ok(answered)
}
