//! Authentication and authorization for waymark
//!
//! Provides:
//! - Session token issuance and validation (signed JWT, injected clock)
//! - Ordered identity-resolution strategies for the issuance endpoint
//! - The per-request ownership guard
//! - The gateway that composes the above for route handlers

pub mod clock;
pub mod gateway;
pub mod guard;
pub mod identity;
pub mod jwt;

pub use clock::{Clock, SharedClock, SystemClock};
pub use gateway::{AuthGateway, GatewayDenial, IssueCredentials, IssuedSession, Resolution};
pub use guard::{authorize, AccessDecision};
pub use identity::{normalize_email, IdentityStrategy, STRATEGY_ORDER};
pub use jwt::{
    extract_bearer_token, AuthOutcome, Claims, IssuedToken, RejectReason, TokenIssuer,
    TokenValidator,
};
