//! Short-lived HS256 credentials shared between the gateway and the engine.
//!
//! A fresh token is minted for every outbound call and never stored. The same
//! secret verifies inbound bearer tokens on `/convert`.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::constants::MAX_TOKEN_LIFETIME_SECS;
use crate::error::AppError;

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Mints and verifies credentials with one shared secret.
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    subject: String,
    lifetime_secs: i64,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("subject", &self.subject)
            .field("lifetime_secs", &self.lifetime_secs)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// `lifetime_secs` is clamped to `1..=3600`.
    pub fn new(secret: &str, subject: impl Into<String>, lifetime_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            subject: subject.into(),
            lifetime_secs: lifetime_secs.clamp(1, MAX_TOKEN_LIFETIME_SECS),
        }
    }

    /// Mint a token for the configured subject.
    pub fn mint(&self) -> Result<String, AppError> {
        self.mint_for(&self.subject)
    }

    pub fn mint_for(&self, subject: &str) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now,
            exp: now + self.lifetime_secs,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign credential: {}", e)))
    }

    /// Verify signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::Unauthorized("token has expired".to_string())
                }
                _ => AppError::Unauthorized("invalid token".to_string()),
            }
        })?;

        Ok(token_data.claims)
    }
}
