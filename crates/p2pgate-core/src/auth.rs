//! Access-token verification for the relay endpoint.
//!
//! Verification is a capability handed to the gateway, not a hard-wired
//! constant: [`StaticToken`] enforces a configured secret in constant time,
//! while [`AllowAll`] is the explicit development default that admits every
//! request (the server logs loudly when it is installed).

use subtle::ConstantTimeEq;

use crate::error::{GateError, GateResult};

/// Decides whether a presented access token may open a relay session.
pub trait AccessVerifier: Send + Sync {
    fn verify(&self, token: &str) -> GateResult<()>;
}

/// Accepts every token, including an empty one.
///
/// Development/test default only — installing it disables authorization for
/// the whole endpoint.
#[derive(Debug, Default)]
pub struct AllowAll;

impl AccessVerifier for AllowAll {
    fn verify(&self, _token: &str) -> GateResult<()> {
        Ok(())
    }
}

/// Verifies tokens against a single configured secret.
#[derive(Debug)]
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl AccessVerifier for StaticToken {
    fn verify(&self, token: &str) -> GateResult<()> {
        // ct_eq is constant-time in content; only a length mismatch is observable.
        if bool::from(token.as_bytes().ct_eq(self.token.as_bytes())) {
            Ok(())
        } else {
            Err(GateError::AccessDenied("invalid access token".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_all_accepts_anything() {
        assert!(AllowAll.verify("").is_ok());
        assert!(AllowAll.verify("whatever").is_ok());
    }

    #[test]
    fn static_token_accepts_match() {
        let verifier = StaticToken::new("s3cret");
        assert!(verifier.verify("s3cret").is_ok());
    }

    #[test]
    fn static_token_rejects_mismatch() {
        let verifier = StaticToken::new("s3cret");
        assert!(matches!(
            verifier.verify("guess"),
            Err(GateError::AccessDenied(_))
        ));
        assert!(verifier.verify("").is_err());
    }
}
