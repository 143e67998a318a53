//! Participant resource routes
//!
//! Every /v1/user/{id}/... request passes through the gateway before it
//! touches the store: bearer credential validation, then the ownership
//! guard against the id named in the path. Only the authenticated subject
//! id flows onward; the token itself is opaque to these handlers.

use hyper::{body::Incoming, Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

use crate::auth::extract_bearer_token;
use crate::db::schemas::ParticipantDoc;
use crate::db::ProfileUpdate;
use crate::routes::{
    activity_routes, denial_response, error_response, experiment_routes, get_auth_header,
    json_response, not_found, parse_json_body, BoxBody,
};
use crate::server::AppState;

/// Profile body returned to the extension; the email never leaves the server
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub uuid: String,
    pub nickname: String,
    pub motto: String,
    pub activity: HashMap<String, i64>,
    pub start_date: i64,
}

impl From<ParticipantDoc> for ProfileResponse {
    fn from(p: ParticipantDoc) -> Self {
        Self {
            uuid: p.subject_id,
            nickname: p.nickname,
            motto: p.motto,
            activity: p.activity,
            start_date: p.start_date,
        }
    }
}

/// Writable profile fields; anything else in the body is ignored
#[derive(Debug, Deserialize)]
struct ProfileUpdateRequest {
    #[serde(default)]
    nickname: Option<String>,
    #[serde(default)]
    motto: Option<String>,
}

/// Dispatch /v1/user/{owner_id}[/activity|/experiment] requests
pub async fn handle_participant_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();

    // Expected shape: v1 / user / {owner_id} [/ activity | experiment]
    if !(3..=4).contains(&segments.len()) || segments[0] != "v1" || segments[1] != "user" {
        return not_found(&path);
    }
    let owner_id = segments[2].clone();

    let auth_header = get_auth_header(&req);
    let token = extract_bearer_token(auth_header.as_deref());
    let subject_id = match state.gateway.authorize_request(token, &owner_id) {
        Ok(subject_id) => subject_id,
        Err(denial) => return denial_response(&denial),
    };

    let tail = segments.get(3).map(|s| s.as_str());
    match (method, tail) {
        (Method::GET, None) => get_profile(state, &subject_id).await,
        (Method::PUT, None) => update_profile(req, state, &subject_id).await,
        (Method::POST, Some("activity")) => {
            activity_routes::handle_record_activity(req, state, &subject_id).await
        }
        (Method::GET, Some("experiment")) => {
            experiment_routes::handle_list_experiments(state, &subject_id).await
        }
        _ => not_found(&path),
    }
}

/// GET /v1/user/{id}/
async fn get_profile(state: Arc<AppState>, subject_id: &str) -> Response<BoxBody> {
    match state.store.find_by_subject(subject_id).await {
        Ok(Some(participant)) => {
            json_response(StatusCode::OK, &ProfileResponse::from(participant))
        }
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Participant not found", None),
        Err(e) => {
            error!("profile lookup failed: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            )
        }
    }
}

/// PUT /v1/user/{id}/
async fn update_profile(
    req: Request<Incoming>,
    state: Arc<AppState>,
    subject_id: &str,
) -> Response<BoxBody> {
    let body: ProfileUpdateRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid JSON body: {}", e),
                None,
            )
        }
    };

    let update = ProfileUpdate {
        nickname: body.nickname,
        motto: body.motto,
    };

    match state.store.update_profile(subject_id, update).await {
        Ok(Some(participant)) => {
            json_response(StatusCode::OK, &ProfileResponse::from(participant))
        }
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Participant not found", None),
        Err(e) => {
            error!("profile update failed: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            )
        }
    }
}
