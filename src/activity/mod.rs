//! Activity ingestion rules
//!
//! Each activity kind has its own required fields. Every activity needs an
//! absolute http(s) url and a supported kind; click activities also need
//! the clicked element. Validation runs before anything touches the store.

use serde::Deserialize;
use thiserror::Error;

/// A page was visited
pub const KIND_PAGE_VISIT: &str = "page_visit";
/// An element on a page (or in the extension popup) was clicked
pub const KIND_ELEMENT_CLICK: &str = "element_click";

/// Kinds the service accepts
pub const SUPPORTED_KINDS: [&str; 2] = [KIND_PAGE_VISIT, KIND_ELEMENT_CLICK];

/// Raw activity payload as posted by the extension
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityPayload {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub element: Option<String>,
}

/// A validated activity ready for ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivity {
    pub url: String,
    pub kind: String,
    pub element: Option<String>,
}

/// Why an activity payload was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActivityError {
    #[error("activity requires both url and type")]
    MissingField,

    #[error("activity url must be an absolute http(s) url")]
    InvalidUrl,

    #[error("unsupported activity type: {0}")]
    UnsupportedKind(String),

    #[error("activity type {0} requires a non-empty element")]
    MissingElement(String),
}

/// Validate a raw payload against the per-kind rules
pub fn validate(payload: ActivityPayload) -> Result<NewActivity, ActivityError> {
    let url = payload.url.filter(|u| !u.trim().is_empty());
    let kind = payload.kind.filter(|k| !k.trim().is_empty());

    let (url, kind) = match (url, kind) {
        (Some(url), Some(kind)) => (url, kind),
        _ => return Err(ActivityError::MissingField),
    };

    if !is_http_url(&url) {
        return Err(ActivityError::InvalidUrl);
    }

    if !SUPPORTED_KINDS.contains(&kind.as_str()) {
        return Err(ActivityError::UnsupportedKind(kind));
    }

    let element = payload.element.filter(|e| !e.trim().is_empty());
    if kind == KIND_ELEMENT_CLICK && element.is_none() {
        return Err(ActivityError::MissingElement(kind));
    }

    Ok(NewActivity { url, kind, element })
}

/// Absolute http(s) url with a non-empty host
fn is_http_url(url: &str) -> bool {
    let rest = match url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
    {
        Some(rest) => rest,
        None => return false,
    };

    let host = rest.split('/').next().unwrap_or("");
    !host.is_empty()
}
