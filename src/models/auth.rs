use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserRole;

/// Channel a token was issued for; selects its expiry window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    Web,
    Mobile,
}

impl Audience {
    pub fn as_str(&self) -> &'static str {
        match self {
            Audience::Web => "web",
            Audience::Mobile => "mobile",
        }
    }
}

impl std::fmt::Display for Audience {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims embedded in the JWT access token. `iat` and `exp` are NumericDates
/// with millisecond precision (fractional seconds on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // username
    pub aud: Audience,
    #[serde(with = "numeric_date")]
    pub iat: DateTime<Utc>,
    #[serde(with = "numeric_date")]
    pub exp: DateTime<Utc>,
}

mod numeric_date {
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = value.timestamp_millis();
        if millis % 1000 == 0 {
            serializer.serialize_i64(millis / 1000)
        } else {
            serializer.serialize_f64(millis as f64 / 1000.0)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() {
            return Err(D::Error::custom("NumericDate must be finite"));
        }
        DateTime::from_timestamp_millis((secs * 1000.0).round() as i64)
            .ok_or_else(|| D::Error::custom("NumericDate out of range"))
    }
}

/// Minimal per-user state needed to decide whether a token was revoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSnapshot {
    pub username: String,
    pub last_credential_change_at: DateTime<Utc>,
}

/// Body returned by login and refresh. Both fields are null when a refresh
/// is refused.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTokenState {
    pub access_token: Option<String>,
    pub expires_in: Option<i64>,
}

impl UserTokenState {
    pub fn issued(access_token: String, expires_in: i64) -> Self {
        Self {
            access_token: Some(access_token),
            expires_in: Some(expires_in),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Principal resolved from a validated bearer token, available via Axum extractors
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub username: String,
    pub roles: Vec<UserRole>,
    pub audience: Audience,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&UserRole::Admin)
    }
}
