//! Experiment bucket route
//!
//! GET /v1/user/{id}/experiment/ — returns the participant's assignments
//! with both experiment names and group labels hashed, so the extension can
//! branch on buckets without learning the experiment vocabulary.

use hyper::{Response, StatusCode};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

use crate::experiments::hashed_view;
use crate::routes::{error_response, json_response, BoxBody};
use crate::server::AppState;

#[derive(Debug, Serialize)]
struct ExperimentsResponse {
    uuid: String,
    experiments: HashMap<String, String>,
}

pub(crate) async fn handle_list_experiments(
    state: Arc<AppState>,
    subject_id: &str,
) -> Response<BoxBody> {
    match state.store.find_by_subject(subject_id).await {
        Ok(Some(participant)) => json_response(
            StatusCode::OK,
            &ExperimentsResponse {
                uuid: participant.subject_id,
                experiments: hashed_view(&participant.experiments),
            },
        ),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Participant not found", None),
        Err(e) => {
            error!("experiment lookup failed: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            )
        }
    }
}
