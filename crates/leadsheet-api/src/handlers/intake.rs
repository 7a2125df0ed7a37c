//! Lead intake handler.
//!
//! Accepts a JSON body, appends it to the bound table and answers with the
//! fixed acknowledgment. Every failure is turned into a JSON error response
//! here; nothing is retried.

use axum::{
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use leadsheet_core::{Acknowledgment, LeadsheetError};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::AppState;

/// Error response with code and message.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error details including code and message
    pub error: ErrorDetail,
}

/// Detailed error information.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Error code (E1001-E3001)
    pub code: String,
    /// Human-readable error description
    pub message: String,
}

/// Appends one lead to the table.
///
/// An empty body is accepted as `{}`.
///
/// # Errors
///
/// Returns appropriate HTTP status codes:
/// - 413: Body larger than the configured limit
/// - 500: Body is malformed JSON or `null`, or the store failed
#[instrument(name = "intake_lead", skip(state, body))]
pub async fn intake_lead(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            warn!(limit = state.max_body_bytes, "Payload exceeds size limit");
            return error_response(&LeadsheetError::PayloadTooLarge {
                limit_bytes: state.max_body_bytes,
            });
        },
        Err(rejection) => {
            warn!(error = %rejection, "Failed to read request body");
            return error_response(&LeadsheetError::parse(rejection.body_text()));
        },
    };

    match state.intake.ingest_body(&body).await {
        Ok(outcome) => {
            info!(
                table = %outcome.table,
                header_written = outcome.header_written,
                content_length = body.len(),
                "Lead appended"
            );
            (StatusCode::OK, Json(Acknowledgment::ok())).into_response()
        },
        Err(e @ LeadsheetError::Parse { .. }) => {
            warn!(error = %e, content_length = body.len(), "Rejected unparseable lead body");
            error_response(&e)
        },
        Err(e) => {
            let kind = match &e {
                LeadsheetError::Store(store_error) => store_error.kind(),
                _ => "other",
            };
            error!(error = %e, kind, backend = state.store().backend_name(), "Lead intake failed");
            error_response(&e)
        },
    }
}

/// Maps an intake error onto its HTTP status.
///
/// Anything that is not a size violation is reported as a server fault.
pub fn status_for(error: &LeadsheetError) -> StatusCode {
    match error {
        LeadsheetError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        LeadsheetError::Parse { .. } | LeadsheetError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        },
    }
}

/// Creates a standardized error response.
fn error_response(error: &LeadsheetError) -> Response {
    let error_response = ErrorResponse {
        error: ErrorDetail { code: error.code().to_string(), message: error.to_string() },
    };

    (status_for(error), Json(error_response)).into_response()
}

#[cfg(test)]
mod tests {
    use leadsheet_core::StoreError;

    use super::*;

    #[test]
    fn error_statuses() {
        assert_eq!(
            status_for(&LeadsheetError::PayloadTooLarge { limit_bytes: 1 }),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(status_for(&LeadsheetError::parse("bad")), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            status_for(&LeadsheetError::Store(StoreError::PermissionDenied("no".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_body_shape() {
        let error = LeadsheetError::PayloadTooLarge { limit_bytes: 1024 };
        let body = ErrorResponse {
            error: ErrorDetail { code: error.code().to_string(), message: error.to_string() },
        };

        insta::assert_json_snapshot!(body, @r###"
        {
          "error": {
            "code": "E1002",
            "message": "[E1002] Payload too large: body exceeds 1024 byte limit"
          }
        }
        "###);
        assert_eq!(error_response(&error).status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
