//! Liveness and version endpoints

use hyper::{Response, StatusCode};
use serde_json::json;

use crate::routes::{json_response, BoxBody};

/// GET /health
pub fn health_check() -> Response<BoxBody> {
    json_response(StatusCode::OK, &json!({ "status": "ok" }))
}

/// GET /version
pub fn version_info() -> Response<BoxBody> {
    json_response(
        StatusCode::OK,
        &json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        }),
    )
}
