//! Credential issuance route
//!
//! GET /v1/auth/?email=&external_id=&token=
//!
//! Resolves the supplied credentials to a participant (creating one on
//! first sight of a new email) and returns a signed session token with its
//! absolute expiration. Absent credential fields and present-but-unusable
//! credentials fail differently: 400 for the former, 401 for the latter.

use hyper::{body::Incoming, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::IssueCredentials;
use crate::routes::{denial_response, error_response, json_response, BoxBody};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
struct IssueQuery {
    email: Option<String>,
    external_id: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct IssueResponse {
    subject_id: String,
    access_token: String,
    expiration: i64,
}

/// GET /v1/auth/
pub async fn handle_issue(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let query = req.uri().query().unwrap_or("");
    let query: IssueQuery = match serde_urlencoded::from_str(query) {
        Ok(q) => q,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid query string: {}", e),
                None,
            )
        }
    };

    let credentials = IssueCredentials {
        email: query.email,
        external_id: query.external_id,
        external_token: query.token,
    };

    match state.gateway.issue(&credentials).await {
        Ok(session) => json_response(
            StatusCode::OK,
            &IssueResponse {
                subject_id: session.subject_id,
                access_token: session.access_token,
                expiration: session.expiration,
            },
        ),
        Err(denial) => denial_response(&denial),
    }
}
