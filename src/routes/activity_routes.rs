//! Activity ingestion route
//!
//! POST /v1/user/{id}/activity/ — validates the payload against the
//! per-kind rules, then stores the record and bumps the participant's
//! counter. Authentication and ownership have already been checked by the
//! participant dispatcher.

use hyper::{body::Incoming, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use crate::activity::{self, ActivityPayload};
use crate::routes::{error_response, json_response, parse_json_body, BoxBody};
use crate::server::AppState;

#[derive(Debug, Serialize)]
struct RecordedActivity {
    uuid: String,
    url: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    element: Option<String>,
}

pub(crate) async fn handle_record_activity(
    req: Request<Incoming>,
    state: Arc<AppState>,
    subject_id: &str,
) -> Response<BoxBody> {
    let payload: ActivityPayload = match parse_json_body(req).await {
        Ok(p) => p,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid JSON body: {}", e),
                None,
            )
        }
    };

    let activity = match activity::validate(payload) {
        Ok(a) => a,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, &e.to_string(), Some("INVALID_ACTIVITY"))
        }
    };

    match state.store.record_activity(subject_id, &activity).await {
        Ok(()) => json_response(
            StatusCode::OK,
            &RecordedActivity {
                uuid: subject_id.to_string(),
                url: activity.url,
                kind: activity.kind,
                element: activity.element,
            },
        ),
        Err(e) => {
            error!("activity insert failed: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            )
        }
    }
}
