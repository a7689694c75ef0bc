use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::{
    config::TokenSettings,
    models::auth::{Audience, Claims, CredentialSnapshot},
    services::{
        client::ClientKind,
        token::{truncate_to_millis, TokenCodec, TokenError},
    },
};

/// Why a token is not (or no longer) acceptable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenRejection {
    #[error(transparent)]
    Invalid(#[from] TokenError),

    #[error("token expired")]
    Expired,

    #[error("token predates the last credential change")]
    RevokedByCredentialChange,

    #[error("token subject does not match the user")]
    SubjectMismatch,
}

/// Issues, validates and refreshes access tokens.
///
/// Stateless: validity is computed from the decoded claims, the caller's
/// notion of "now" and the subject's current credential snapshot. A token is
/// valid while `now < exp` and `iat` is not earlier than the last credential
/// change. Both claims carry millisecond precision and are compared as such.
#[derive(Clone)]
pub struct TokenPolicy {
    codec: TokenCodec,
    web_expiry: Duration,
    mobile_expiry: Duration,
}

impl TokenPolicy {
    pub fn new(settings: TokenSettings) -> Self {
        Self {
            codec: TokenCodec::new(&settings.secret),
            web_expiry: settings.web_expiry,
            mobile_expiry: settings.mobile_expiry,
        }
    }

    /// Only phones are issued long-lived mobile tokens; tablets and
    /// browsers share the web audience.
    pub fn audience_for(&self, client: ClientKind) -> Audience {
        if client.is_mobile() {
            Audience::Mobile
        } else {
            Audience::Web
        }
    }

    pub fn window(&self, audience: Audience) -> Duration {
        match audience {
            Audience::Web => self.web_expiry,
            Audience::Mobile => self.mobile_expiry,
        }
    }

    /// Window length in seconds, as reported to clients in `expires_in`.
    pub fn expires_in(&self, audience: Audience) -> i64 {
        self.window(audience).num_seconds()
    }

    pub fn generate_token(
        &self,
        username: &str,
        client: ClientKind,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let audience = self.audience_for(client);
        self.codec.mint(username, audience, now, self.window(audience))
    }

    /// Full verdict on a token for the given subject snapshot.
    pub fn check(
        &self,
        token: &str,
        snapshot: &CredentialSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Claims, TokenRejection> {
        let claims = self.codec.decode(token)?;

        if claims.sub != snapshot.username {
            return Err(TokenRejection::SubjectMismatch);
        }
        if now >= claims.exp {
            return Err(TokenRejection::Expired);
        }
        if claims.iat < snapshot.last_credential_change_at {
            return Err(TokenRejection::RevokedByCredentialChange);
        }
        Ok(claims)
    }

    pub fn validate_token(
        &self,
        token: &str,
        snapshot: &CredentialSnapshot,
        now: DateTime<Utc>,
    ) -> bool {
        match self.check(token, snapshot, now) {
            Ok(_) => true,
            Err(reason) => {
                tracing::debug!(username = %snapshot.username, %reason, "Token rejected");
                false
            }
        }
    }

    /// Reissues a still-live token with `iat = now`, keeping subject and
    /// audience. Returns `None` for undecodable or expired tokens, when the
    /// current client would be issued a different audience, and when `now`
    /// is not later than the token's `iat` (the result would be identical).
    pub fn refresh_token(
        &self,
        token: &str,
        client: ClientKind,
        now: DateTime<Utc>,
    ) -> Option<String> {
        let claims = match self.codec.decode(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "Refusing to refresh undecodable token");
                return None;
            }
        };

        if now >= claims.exp {
            tracing::debug!(username = %claims.sub, "Refusing to refresh expired token");
            return None;
        }
        if truncate_to_millis(now) <= claims.iat {
            tracing::debug!(username = %claims.sub, "Refusing to refresh token issued at or after now");
            return None;
        }

        let audience = self.audience_for(client);
        if audience != claims.aud {
            tracing::debug!(
                username = %claims.sub,
                token_audience = %claims.aud,
                client_audience = %audience,
                "Refusing to refresh token for a different audience"
            );
            return None;
        }

        match self.codec.mint(&claims.sub, claims.aud, now, self.window(claims.aud)) {
            Ok(refreshed) => Some(refreshed),
            Err(e) => {
                tracing::error!(username = %claims.sub, error = %e, "Failed to mint refreshed token");
                None
            }
        }
    }

    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        self.codec.decode(token)
    }

    pub fn get_username_from_token(&self, token: &str) -> Result<String, TokenError> {
        self.codec.decode(token).map(|c| c.sub)
    }

    pub fn get_issued_at_date_from_token(&self, token: &str) -> Result<DateTime<Utc>, TokenError> {
        self.codec.decode(token).map(|c| c.iat)
    }

    pub fn get_audience_from_token(&self, token: &str) -> Result<Audience, TokenError> {
        self.codec.decode(token).map(|c| c.aud)
    }
}
