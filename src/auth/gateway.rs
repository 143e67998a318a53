//! Authentication gateway
//!
//! Orchestrates identity resolution, token issuance, token validation, and
//! the ownership guard for the two request shapes the service supports:
//! credential issuance and authenticated resource access. Route handlers
//! call the gateway as an ordinary injected value; there is no middleware
//! interception.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::auth::clock::SharedClock;
use crate::auth::guard::{authorize, AccessDecision};
use crate::auth::identity::{normalize_email, IdentityStrategy, STRATEGY_ORDER};
use crate::auth::jwt::{AuthOutcome, IssuedToken, RejectReason, TokenIssuer, TokenValidator};
use crate::db::IdentityStore;

/// Credential fields supplied to the issuance endpoint
///
/// `None` means the field was absent from the request; `Some("")` means it
/// was present but empty. The distinction matters: a request with no
/// credential fields at all is a bad request, while present-but-unusable
/// credentials are an authentication failure.
#[derive(Debug, Default, Clone)]
pub struct IssueCredentials {
    pub email: Option<String>,
    pub external_id: Option<String>,
    pub external_token: Option<String>,
}

impl IssueCredentials {
    pub fn from_email(email: &str) -> Self {
        Self {
            email: Some(email.to_string()),
            ..Self::default()
        }
    }

    fn all_absent(&self) -> bool {
        self.email.is_none() && self.external_id.is_none() && self.external_token.is_none()
    }
}

/// A successfully issued session
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub subject_id: String,
    pub access_token: String,
    pub expiration: i64,
}

/// Which strategy resolved an identity, and to what
#[derive(Debug, Clone)]
pub struct Resolution {
    pub strategy: IdentityStrategy,
    pub subject_id: String,
}

/// Why the gateway refused a request
///
/// The validator's rejection reason is carried for diagnostics but is not
/// part of the display message; callers collapse it to a generic 401 body.
#[derive(Debug, Error)]
pub enum GatewayDenial {
    /// No credential fields supplied at all
    #[error("no credentials supplied")]
    BadRequest,

    /// Credentials present but not valid or current
    #[error("credentials did not resolve to a valid session")]
    Unauthorized { reason: Option<RejectReason> },

    /// Valid session acting outside its own identity
    #[error("session subject does not own the requested resource")]
    Forbidden,

    /// Identity store or signing failure, surfaced as an opaque 5xx
    #[error("dependency failure: {0}")]
    Dependency(String),
}

/// The authentication gateway
///
/// Holds the identity store, the token issuer/validator pair, and the clock.
/// Issuer and validator are pure; the store is the only I/O dependency.
pub struct AuthGateway {
    identities: Arc<dyn IdentityStore>,
    issuer: TokenIssuer,
    validator: TokenValidator,
    clock: SharedClock,
}

impl AuthGateway {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        issuer: TokenIssuer,
        validator: TokenValidator,
        clock: SharedClock,
    ) -> Self {
        Self {
            identities,
            issuer,
            validator,
            clock,
        }
    }

    /// Resolve supplied credentials to a participant, trying each strategy
    /// in precedence order
    ///
    /// Only the email strategy is live. External-id and external-token are
    /// stubs that resolve nothing until a provider verifier is integrated.
    pub async fn resolve_identity(
        &self,
        credentials: &IssueCredentials,
    ) -> Result<Option<Resolution>, GatewayDenial> {
        for strategy in STRATEGY_ORDER {
            let resolved = match strategy {
                IdentityStrategy::Email => {
                    match credentials.email.as_deref().and_then(normalize_email) {
                        Some(email) => {
                            let subject_id =
                                self.identities.find_or_create(&email).await.map_err(|e| {
                                    warn!("identity store failure: {e}");
                                    GatewayDenial::Dependency(e.to_string())
                                })?;
                            Some(subject_id)
                        }
                        None => None,
                    }
                }
                IdentityStrategy::ExternalId | IdentityStrategy::ExternalToken => {
                    // No provider verifier integrated yet.
                    None
                }
            };

            if let Some(subject_id) = resolved {
                debug!(%strategy, %subject_id, "identity resolved");
                return Ok(Some(Resolution {
                    strategy,
                    subject_id,
                }));
            }
        }

        Ok(None)
    }

    /// Handle a credential issuance request
    ///
    /// All fields absent is a bad request. Present-but-unresolvable
    /// credentials (an empty email, an unverifiable provider id) are
    /// unauthorized. On success the participant is found or created and a
    /// fresh token is signed.
    pub async fn issue(
        &self,
        credentials: &IssueCredentials,
    ) -> Result<IssuedSession, GatewayDenial> {
        if credentials.all_absent() {
            return Err(GatewayDenial::BadRequest);
        }

        let resolution = match self.resolve_identity(credentials).await? {
            Some(r) => r,
            None => {
                warn!("issuance refused: no identity strategy resolved");
                return Err(GatewayDenial::Unauthorized { reason: None });
            }
        };

        let now = self.clock.now();
        let IssuedToken { token, expires_at } = self
            .issuer
            .issue(&resolution.subject_id, now)
            .map_err(|e| GatewayDenial::Dependency(e.to_string()))?;

        info!(
            subject_id = %resolution.subject_id,
            strategy = %resolution.strategy,
            expires_at,
            "session issued"
        );

        Ok(IssuedSession {
            subject_id: resolution.subject_id,
            access_token: token,
            expiration: expires_at,
        })
    }

    /// Handle the auth step of an authenticated resource request
    ///
    /// Validates the bearer credential, then matches the session subject
    /// against the owner id named in the request path. Returns the subject
    /// id to hand to the downstream resource handler.
    pub fn authorize_request(
        &self,
        raw_credential: Option<&str>,
        requested_owner_id: &str,
    ) -> Result<String, GatewayDenial> {
        match self.validator.validate(raw_credential, self.clock.now()) {
            AuthOutcome::Rejected(reason) => {
                warn!(?reason, "credential rejected");
                Err(GatewayDenial::Unauthorized {
                    reason: Some(reason),
                })
            }
            AuthOutcome::Authenticated { subject_id } => {
                match authorize(&subject_id, requested_owner_id) {
                    AccessDecision::Allow => Ok(subject_id),
                    AccessDecision::Deny => {
                        warn!(
                            %subject_id,
                            owner_id = %requested_owner_id,
                            "session subject does not own requested resource"
                        );
                        Err(GatewayDenial::Forbidden)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::test_support::FixedClock;
    use crate::db::MemoryParticipantStore;

    const SECRET: &str = "gateway-test-secret";
    const NOW: i64 = 1_700_000_000;
    const TTL: u64 = 3600;

    struct Harness {
        gateway: AuthGateway,
        store: Arc<MemoryParticipantStore>,
        clock: Arc<FixedClock>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryParticipantStore::new());
        let clock = Arc::new(FixedClock::at(NOW));
        let gateway = AuthGateway::new(
            Arc::clone(&store) as Arc<dyn IdentityStore>,
            TokenIssuer::new(SECRET, TTL),
            TokenValidator::new(SECRET),
            Arc::clone(&clock) as SharedClock,
        );
        Harness {
            gateway,
            store,
            clock,
        }
    }

    #[tokio::test]
    async fn test_all_fields_absent_is_bad_request() {
        let h = harness();
        let denial = h.gateway.issue(&IssueCredentials::default()).await.unwrap_err();
        assert!(matches!(denial, GatewayDenial::BadRequest));
    }

    #[tokio::test]
    async fn test_empty_credentials_are_unauthorized() {
        let h = harness();
        let credentials = IssueCredentials {
            email: Some(String::new()),
            external_id: Some(String::new()),
            external_token: Some(String::new()),
        };
        let denial = h.gateway.issue(&credentials).await.unwrap_err();
        assert!(matches!(denial, GatewayDenial::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_external_id_alone_is_unauthorized() {
        // Provider strategies are stubs until a verifier is integrated.
        let h = harness();
        let credentials = IssueCredentials {
            external_id: Some("provider-12345".into()),
            ..IssueCredentials::default()
        };
        let denial = h.gateway.issue(&credentials).await.unwrap_err();
        assert!(matches!(denial, GatewayDenial::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_issue_resolves_via_email_strategy() {
        let h = harness();
        let resolution = h
            .gateway
            .resolve_identity(&IssueCredentials::from_email("tester@waymark.dev"))
            .await
            .unwrap()
            .expect("email should resolve");
        assert_eq!(resolution.strategy, IdentityStrategy::Email);
        assert!(!resolution.subject_id.is_empty());
    }

    #[tokio::test]
    async fn test_issuance_is_idempotent_and_case_insensitive() {
        let h = harness();
        let first = h
            .gateway
            .issue(&IssueCredentials::from_email("Tester@Waymark.dev"))
            .await
            .unwrap();
        let second = h
            .gateway
            .issue(&IssueCredentials::from_email("tester@waymark.dev"))
            .await
            .unwrap();
        let third = h
            .gateway
            .issue(&IssueCredentials::from_email("TESTER@WAYMARK.DEV"))
            .await
            .unwrap();

        assert_eq!(first.subject_id, second.subject_id);
        assert_eq!(second.subject_id, third.subject_id);
        assert_eq!(h.store.participant_count(), 1);
    }

    #[tokio::test]
    async fn test_issued_session_expiration() {
        let h = harness();
        let session = h
            .gateway
            .issue(&IssueCredentials::from_email("a@x.org"))
            .await
            .unwrap();
        assert_eq!(session.expiration, NOW + TTL as i64);
    }

    #[tokio::test]
    async fn test_session_authorizes_own_resource() {
        let h = harness();
        let session = h
            .gateway
            .issue(&IssueCredentials::from_email("a@x.org"))
            .await
            .unwrap();

        let subject = h
            .gateway
            .authorize_request(Some(&session.access_token), &session.subject_id)
            .unwrap();
        assert_eq!(subject, session.subject_id);
    }

    #[tokio::test]
    async fn test_foreign_resource_is_forbidden() {
        let h = harness();
        let session_a = h
            .gateway
            .issue(&IssueCredentials::from_email("a@x.org"))
            .await
            .unwrap();
        let session_b = h
            .gateway
            .issue(&IssueCredentials::from_email("b@x.org"))
            .await
            .unwrap();
        assert_ne!(session_a.subject_id, session_b.subject_id);

        let denial = h
            .gateway
            .authorize_request(Some(&session_a.access_token), &session_b.subject_id)
            .unwrap_err();
        assert!(matches!(denial, GatewayDenial::Forbidden));
    }

    #[tokio::test]
    async fn test_unknown_owner_is_forbidden() {
        // Nonexistent and foreign owners are indistinguishable to callers.
        let h = harness();
        let session = h
            .gateway
            .issue(&IssueCredentials::from_email("a@x.org"))
            .await
            .unwrap();

        let denial = h
            .gateway
            .authorize_request(Some(&session.access_token), "SOME_BROKEN_ID")
            .unwrap_err();
        assert!(matches!(denial, GatewayDenial::Forbidden));
    }

    #[tokio::test]
    async fn test_expired_session_is_unauthorized() {
        let h = harness();
        let session = h
            .gateway
            .issue(&IssueCredentials::from_email("a@x.org"))
            .await
            .unwrap();

        h.clock.advance(TTL as i64);
        let denial = h
            .gateway
            .authorize_request(Some(&session.access_token), &session.subject_id)
            .unwrap_err();
        assert!(matches!(
            denial,
            GatewayDenial::Unauthorized {
                reason: Some(RejectReason::Expired)
            }
        ));
    }

    #[tokio::test]
    async fn test_malformed_credential_is_unauthorized() {
        let h = harness();
        let session = h
            .gateway
            .issue(&IssueCredentials::from_email("a@x.org"))
            .await
            .unwrap();

        let denial = h
            .gateway
            .authorize_request(Some("not-a-real-token"), &session.subject_id)
            .unwrap_err();
        assert!(matches!(
            denial,
            GatewayDenial::Unauthorized {
                reason: Some(RejectReason::MalformedCredential)
            }
        ));
    }

    #[tokio::test]
    async fn test_missing_credential_is_unauthorized() {
        let h = harness();
        let denial = h.gateway.authorize_request(None, "anyone").unwrap_err();
        assert!(matches!(
            denial,
            GatewayDenial::Unauthorized {
                reason: Some(RejectReason::MissingCredential)
            }
        ));
    }
}
