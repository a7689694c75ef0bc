use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::models::auth::{Audience, Claims};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Bad signature, malformed structure or missing claims.
    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("failed to encode token: {0}")]
    Encoding(String),
}

/// Signs and verifies access tokens with a process-wide HMAC secret.
///
/// Expiry is not checked here: an expired but well-formed token
/// decodes successfully so the policy layer can tell it apart from a forged one.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_audience(&[Audience::Web.as_str(), Audience::Mobile.as_str()]);
        // `exp` may be fractional; its presence is enforced by `Claims` deserialization.
        validation.set_required_spec_claims(&["sub", "aud"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn mint(
        &self,
        subject: &str,
        audience: Audience,
        issued_at: DateTime<Utc>,
        expiry_window: Duration,
    ) -> Result<String, TokenError> {
        let iat = truncate_to_millis(issued_at);
        let exp = iat
            .checked_add_signed(expiry_window)
            .ok_or_else(|| TokenError::Encoding("expiry out of range".into()))?;
        let claims = Claims {
            sub: subject.to_string(),
            aud: audience,
            iat,
            exp,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::Invalid(e.to_string()))
    }
}

/// Token timestamps carry millisecond precision.
pub fn truncate_to_millis(instant: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(instant.timestamp_millis()).unwrap_or(instant)
}
