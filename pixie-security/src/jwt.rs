use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pixie_core::config::SigningScheme;

use crate::error::SecurityError;

pub const CUSTOM_CLAIM_ROLE: &str = "role";
pub const CUSTOM_CLAIM_USERNAME: &str = "username";
pub const CUSTOM_CLAIM_FULL_NAME: &str = "full_name";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenClaims {
    sub: String,
    iat: i64,
    exp: i64,
    #[serde(default)]
    custom: serde_json::Map<String, serde_json::Value>,
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs() as i64
}

/// Mints and validates tokens for exactly one configured signing scheme.
/// There is no runtime dual-validation between HMAC and RSA — the scheme is
/// a boot-time choice (see `Config::signing_scheme`).
pub struct JwtIssuer {
    algorithm: Algorithm,
    encoding_key: Option<EncodingKey>,
    decoding_key: DecodingKey,
    lifetime: Duration,
}

impl JwtIssuer {
    pub fn from_scheme(scheme: &SigningScheme, lifetime: Duration) -> Result<Self, SecurityError> {
        match scheme {
            SigningScheme::Hmac { secret } => Ok(Self {
                algorithm: Algorithm::HS256,
                encoding_key: Some(EncodingKey::from_secret(secret.as_bytes())),
                decoding_key: DecodingKey::from_secret(secret.as_bytes()),
                lifetime,
            }),
            SigningScheme::Rsa {
                public_key_path,
                private_key_path,
            } => {
                let public_pem = std::fs::read(public_key_path)
                    .map_err(|e| SecurityError::Invalid(format!("reading RSA public key: {e}")))?;
                let decoding_key = DecodingKey::from_rsa_pem(&public_pem)
                    .map_err(|e| SecurityError::Invalid(format!("parsing RSA public key: {e}")))?;

                let encoding_key = match private_key_path {
                    Some(path) => {
                        let private_pem = std::fs::read(path)
                            .map_err(|e| SecurityError::Invalid(format!("reading RSA private key: {e}")))?;
                        Some(
                            EncodingKey::from_rsa_pem(&private_pem)
                                .map_err(|e| SecurityError::Invalid(format!("parsing RSA private key: {e}")))?,
                        )
                    }
                    None => None,
                };

                Ok(Self {
                    algorithm: Algorithm::RS256,
                    encoding_key,
                    decoding_key,
                    lifetime,
                })
            }
        }
    }

    /// `generateToken(subject, custom)`: sets `iat=now`, `exp=now+lifetime`.
    pub fn generate_token(
        &self,
        subject: Uuid,
        custom: serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, SecurityError> {
        let encoding_key = self
            .encoding_key
            .as_ref()
            .ok_or_else(|| SecurityError::Invalid("no private key configured for signing".into()))?;

        let iat = now_secs();
        let claims = TokenClaims {
            sub: subject.to_string(),
            iat,
            exp: iat + self.lifetime.as_secs() as i64,
            custom,
        };
        encode(&Header::new(self.algorithm), &claims, encoding_key)
            .map_err(|e| SecurityError::Invalid(e.to_string()))
    }

    /// Verify signature and standard claims only — does not consult the
    /// revocation set or rate limiter. Callers use [`crate::AuthCore`]'s
    /// `validate_token` for the full admission pipeline.
    pub fn verify(&self, token: &str) -> Result<(Uuid, serde_json::Map<String, serde_json::Value>), SecurityError> {
        let header = decode_header(token).map_err(|e| SecurityError::Invalid(e.to_string()))?;
        if header.alg != self.algorithm {
            return Err(SecurityError::Invalid(format!(
                "signing method mismatch: expected {:?}, got {:?}",
                self.algorithm, header.alg
            )));
        }

        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims.clear();

        let data = decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| SecurityError::Invalid(e.to_string()))?;

        if data.claims.exp <= now_secs() {
            return Err(SecurityError::Expired);
        }
        if data.claims.sub.trim().is_empty() {
            return Err(SecurityError::Invalid("empty subject".into()));
        }
        let subject = Uuid::parse_str(&data.claims.sub)
            .map_err(|e| SecurityError::Invalid(format!("subject is not a uuid: {e}")))?;

        Ok((subject, data.claims.custom))
    }

    /// Best-effort extraction of the `exp` claim without verifying the
    /// signature — used only by `revokeToken`, which must blacklist a token
    /// string even if it turns out to be malformed.
    pub fn peek_expiry_unverified(token: &str) -> Option<chrono::DateTime<chrono::Utc>> {
        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims.clear();
        let dummy_key = DecodingKey::from_secret(&[]);
        let data = decode::<TokenClaims>(token, &dummy_key, &validation).ok()?;
        chrono::DateTime::from_timestamp(data.claims.exp, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> JwtIssuer {
        JwtIssuer::from_scheme(
            &SigningScheme::Hmac {
                secret: "test-secret".into(),
            },
            Duration::from_secs(3600),
        )
        .unwrap()
    }

    #[test]
    fn round_trips_subject_and_custom_claims() {
        let issuer = issuer();
        let subject = Uuid::new_v4();
        let mut custom = serde_json::Map::new();
        custom.insert(CUSTOM_CLAIM_ROLE.into(), "admin".into());

        let token = issuer.generate_token(subject, custom.clone()).unwrap();
        let (sub, claims) = issuer.verify(&token).unwrap();
        assert_eq!(sub, subject);
        assert_eq!(claims, custom);
    }

    #[test]
    fn rejects_token_signed_with_different_secret() {
        let issuer = issuer();
        let other = JwtIssuer::from_scheme(
            &SigningScheme::Hmac {
                secret: "other-secret".into(),
            },
            Duration::from_secs(3600),
        )
        .unwrap();
        let token = other.generate_token(Uuid::new_v4(), serde_json::Map::new()).unwrap();
        assert!(matches!(issuer.verify(&token), Err(SecurityError::Invalid(_))));
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = JwtIssuer::from_scheme(
            &SigningScheme::Hmac {
                secret: "test-secret".into(),
            },
            Duration::from_secs(0),
        )
        .unwrap();
        let token = issuer.generate_token(Uuid::new_v4(), serde_json::Map::new()).unwrap();
        std::thread::sleep(Duration::from_millis(1100));
        assert_eq!(issuer.verify(&token), Err(SecurityError::Expired));
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let issuer = issuer();
        let token = issuer.generate_token(Uuid::new_v4(), serde_json::Map::new()).unwrap();
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(issuer.verify(&tampered).is_err());
    }
}
