//! HTTP server for waymark

pub mod http;

pub use http::{run, AppState};
