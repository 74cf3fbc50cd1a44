//! Token mint/parse/validate/revoke, the admission middleware, and the
//! admin-only role gate.

pub mod error;
pub mod jwt;
pub mod login;
pub mod middleware;
pub mod revocation;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Map;
use uuid::Uuid;

use pixie_core::config::{Config, SigningScheme};
use pixie_rate_limit::GlobalRateLimiter;

pub use error::SecurityError;
pub use jwt::{CUSTOM_CLAIM_FULL_NAME, CUSTOM_CLAIM_ROLE, CUSTOM_CLAIM_USERNAME};
pub use middleware::{extract_token, Identity};
pub use revocation::{start_sweeper, RevocationSet, SweeperHandle};

/// The identity carried through request context once admission succeeds.
pub type Custom = Map<String, serde_json::Value>;

/// Bundles the token issuer, the revocation set, and the rate limiter behind
/// the single `validateToken`/`generateToken`/`revokeToken` surface the rest
/// of the system depends on. Threaded through constructors as an explicit
/// `Arc<AuthCore>`, never a process global.
pub struct AuthCore {
    issuer: jwt::JwtIssuer,
    revocation: RevocationSet,
    rate_limiter: GlobalRateLimiter,
}

impl AuthCore {
    pub fn new(scheme: &SigningScheme, token_lifetime: Duration) -> Result<Self, SecurityError> {
        Ok(Self {
            issuer: jwt::JwtIssuer::from_scheme(scheme, token_lifetime)?,
            revocation: RevocationSet::new(),
            rate_limiter: GlobalRateLimiter::default_auth_admitter(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, SecurityError> {
        Self::new(&config.signing_scheme, config.token_lifetime)
    }

    pub fn generate_token(&self, subject: Uuid, custom: Custom) -> Result<String, SecurityError> {
        self.issuer.generate_token(subject, custom)
    }

    /// `validateToken`: rate-limit admission, revocation lookup, signature
    /// verification, `exp` strictly future, `sub` present and non-empty — in
    /// that order.
    pub fn validate_token(&self, token: &str) -> Result<Identity, SecurityError> {
        if !self.rate_limiter.try_acquire() {
            return Err(SecurityError::RateLimited);
        }
        if self.revocation.is_revoked(token) {
            return Err(SecurityError::Revoked);
        }
        let (subject, custom) = self.issuer.verify(token)?;
        Ok(Identity { subject, custom })
    }

    pub fn revoke_token(&self, token: &str) {
        self.revocation.revoke(token);
    }

    pub fn start_revocation_sweeper(self: &Arc<Self>) -> SweeperHandle {
        start_sweeper(self.revocation.clone())
    }
}
