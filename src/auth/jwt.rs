//! Session token issuance and validation
//!
//! Tokens are standard JWTs signed HS256 with a server-held secret. Claims
//! carry the participant subject id plus issued-at and expiry instants in
//! whole seconds. Expiry is checked against an injected timestamp rather
//! than the library's wall clock, so the boundary is exact and testable: a
//! token checked at its `exp` instant is already expired.

use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::types::{Result, WaymarkError};

/// Claims embedded in a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Participant subject id the token was issued for
    pub sub: String,
    /// Issued-at, UTC epoch seconds
    pub iat: i64,
    /// Expiry, UTC epoch seconds (`iat` + configured TTL)
    pub exp: i64,
}

/// A freshly issued token with its absolute expiry
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
}

/// Why a credential was rejected (internal diagnostics only, never echoed
/// verbatim to the caller)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    MissingCredential,
    MalformedCredential,
    InvalidSignature,
    Expired,
}

/// Outcome of validating a raw credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated { subject_id: String },
    Rejected(RejectReason),
}

/// Signs session tokens for resolved participants
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    ttl_seconds: i64,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_seconds: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            ttl_seconds: ttl_seconds as i64,
        }
    }

    /// Issue a token for `subject_id` at instant `now`
    ///
    /// Takes a resolved subject id, never a raw email. Nothing is persisted;
    /// the returned expiry is `now + ttl` in whole seconds.
    pub fn issue(&self, subject_id: &str, now: i64) -> Result<IssuedToken> {
        let claims = Claims {
            sub: subject_id.to_string(),
            iat: now,
            exp: now + self.ttl_seconds,
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| WaymarkError::Auth(format!("Failed to sign token: {e}")))?;

        Ok(IssuedToken {
            token,
            expires_at: claims.exp,
        })
    }
}

/// Verifies raw session credentials
pub struct TokenValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is compared against the injected clock in validate(), not
        // the library wall clock.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Validate a raw credential at instant `now`
    ///
    /// Checks run in order and short-circuit: missing, malformed, bad
    /// signature, expired. `now >= exp` counts as expired.
    pub fn validate(&self, raw: Option<&str>, now: i64) -> AuthOutcome {
        let raw = match raw {
            Some(t) if !t.trim().is_empty() => t,
            _ => return AuthOutcome::Rejected(RejectReason::MissingCredential),
        };

        let data = match decode::<Claims>(raw, &self.decoding_key, &self.validation) {
            Ok(d) => d,
            Err(e) => {
                let reason = match e.kind() {
                    ErrorKind::InvalidSignature => RejectReason::InvalidSignature,
                    _ => RejectReason::MalformedCredential,
                };
                return AuthOutcome::Rejected(reason);
            }
        };

        if now >= data.claims.exp {
            return AuthOutcome::Rejected(RejectReason::Expired);
        }

        AuthOutcome::Authenticated {
            subject_id: data.claims.sub,
        }
    }
}

/// Extract the bearer token from an Authorization header value
pub fn extract_bearer_token(header: Option<&str>) -> Option<&str> {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";
    const NOW: i64 = 1_700_000_000;
    const TTL: u64 = 3600;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(SECRET, TTL)
    }

    fn validator() -> TokenValidator {
        TokenValidator::new(SECRET)
    }

    #[test]
    fn test_issue_and_validate() {
        let issued = issuer().issue("subject-1", NOW).unwrap();
        assert_eq!(issued.expires_at, NOW + TTL as i64);

        match validator().validate(Some(&issued.token), NOW) {
            AuthOutcome::Authenticated { subject_id } => assert_eq!(subject_id, "subject-1"),
            other => panic!("expected authenticated, got {:?}", other),
        }
    }

    #[test]
    fn test_token_is_three_url_safe_segments() {
        let issued = issuer().issue("subject-1", NOW).unwrap();
        let segments: Vec<&str> = issued.token.split('.').collect();
        assert_eq!(segments.len(), 3);
        for segment in segments {
            assert!(!segment.is_empty());
            assert!(segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }
    }

    #[test]
    fn test_missing_credential() {
        assert_eq!(
            validator().validate(None, NOW),
            AuthOutcome::Rejected(RejectReason::MissingCredential)
        );
        assert_eq!(
            validator().validate(Some(""), NOW),
            AuthOutcome::Rejected(RejectReason::MissingCredential)
        );
    }

    #[test]
    fn test_malformed_credential() {
        assert_eq!(
            validator().validate(Some("not-a-token"), NOW),
            AuthOutcome::Rejected(RejectReason::MalformedCredential)
        );
        assert_eq!(
            validator().validate(Some("only.two"), NOW),
            AuthOutcome::Rejected(RejectReason::MalformedCredential)
        );
    }

    #[test]
    fn test_tampered_payload_fails_signature() {
        let issued = issuer().issue("subject-1", NOW).unwrap();
        let mut parts: Vec<String> = issued.token.split('.').map(String::from).collect();

        // Flip one character of the payload segment, keeping it base64url.
        let mut payload: Vec<u8> = parts[1].clone().into_bytes();
        payload[0] = if payload[0] == b'A' { b'B' } else { b'A' };
        parts[1] = String::from_utf8(payload).unwrap();

        let tampered = parts.join(".");
        let outcome = validator().validate(Some(&tampered), NOW);
        assert!(matches!(
            outcome,
            AuthOutcome::Rejected(RejectReason::InvalidSignature)
                | AuthOutcome::Rejected(RejectReason::MalformedCredential)
        ));
        assert!(!matches!(outcome, AuthOutcome::Authenticated { .. }));
    }

    #[test]
    fn test_wrong_secret_fails_signature() {
        let issued = issuer().issue("subject-1", NOW).unwrap();
        let other = TokenValidator::new("a-different-secret");
        assert_eq!(
            other.validate(Some(&issued.token), NOW),
            AuthOutcome::Rejected(RejectReason::InvalidSignature)
        );
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let issued = issuer().issue("subject-1", NOW).unwrap();
        let validator = validator();

        // Last valid instant
        assert!(matches!(
            validator.validate(Some(&issued.token), issued.expires_at - 1),
            AuthOutcome::Authenticated { .. }
        ));
        // At exactly exp the token is already expired
        assert_eq!(
            validator.validate(Some(&issued.token), issued.expires_at),
            AuthOutcome::Rejected(RejectReason::Expired)
        );
        assert_eq!(
            validator.validate(Some(&issued.token), issued.expires_at + 1),
            AuthOutcome::Rejected(RejectReason::Expired)
        );
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token(Some("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(extract_bearer_token(Some("Bearer ")), None);
        assert_eq!(extract_bearer_token(Some("Basic abc")), None);
        assert_eq!(extract_bearer_token(None), None);
    }
}
