//! HTTP routes for waymark

pub mod activity_routes;
pub mod auth_routes;
pub mod experiment_routes;
pub mod health;
pub mod participant_routes;

pub use auth_routes::handle_issue;
pub use health::{health_check, version_info};
pub use participant_routes::handle_participant_request;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::auth::GatewayDenial;
use crate::types::WaymarkError;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Error body returned for every non-2xx response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

// =============================================================================
// Response Helpers
// =============================================================================

pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .body(full_body(json))
        .unwrap()
}

pub(crate) fn error_response(
    status: StatusCode,
    message: &str,
    code: Option<&str>,
) -> Response<BoxBody> {
    json_response(
        status,
        &ErrorResponse {
            error: message.to_string(),
            code: code.map(String::from),
        },
    )
}

pub(crate) fn not_found(path: &str) -> Response<BoxBody> {
    error_response(
        StatusCode::NOT_FOUND,
        &format!("No route for {}", path),
        None,
    )
}

/// Map a gateway denial to its HTTP response
///
/// Validator rejection reasons stay in the logs; 401 and 403 bodies are
/// deliberately generic so callers cannot distinguish malformed from
/// expired from bad-signature, or nonexistent from foreign resources.
pub(crate) fn denial_response(denial: &GatewayDenial) -> Response<BoxBody> {
    match denial {
        GatewayDenial::BadRequest => {
            error_response(StatusCode::BAD_REQUEST, "Missing credentials", None)
        }
        GatewayDenial::Unauthorized { .. } => {
            error_response(StatusCode::UNAUTHORIZED, "Not authorized", None)
        }
        GatewayDenial::Forbidden => error_response(StatusCode::FORBIDDEN, "Forbidden", None),
        GatewayDenial::Dependency(e) => {
            error!("dependency failure: {}", e);
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Service unavailable",
                Some("DEPENDENCY_FAILURE"),
            )
        }
    }
}

pub(crate) fn cors_preflight() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .header("Access-Control-Max-Age", "86400")
        .body(empty_body())
        .unwrap()
}

pub(crate) fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub(crate) fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

pub(crate) async fn parse_json_body<T: for<'de> Deserialize<'de>>(
    req: Request<hyper::body::Incoming>,
) -> Result<T, WaymarkError> {
    let body = req
        .collect()
        .await
        .map_err(|e| WaymarkError::Http(format!("Failed to read body: {}", e)))?;

    let bytes = body.to_bytes();
    if bytes.len() > 10240 {
        return Err(WaymarkError::Http("Request body too large".into()));
    }

    serde_json::from_slice(&bytes).map_err(|e| WaymarkError::Http(format!("Invalid JSON: {}", e)))
}

pub(crate) fn get_auth_header(req: &Request<hyper::body::Incoming>) -> Option<String> {
    req.headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}
