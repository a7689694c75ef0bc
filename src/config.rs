use std::env;

use chrono::Duration;

/// bcrypt work factor used when `BCRYPT_COST` is unset.
pub const DEFAULT_BCRYPT_COST: u32 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Lifetime of tokens issued to the web audience (browsers, tablets).
    pub jwt_expiry_seconds: u64,
    /// Lifetime of tokens issued to the mobile audience.
    pub jwt_mobile_expiry_seconds: u64,
    pub bcrypt_cost: u32,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| {
            var(key).ok_or_else(|| anyhow::anyhow!("Missing required env var: {}", key))
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            jwt_expiry_seconds: var("JWT_EXPIRY_SECONDS")
                .unwrap_or_else(|| "600".into())
                .parse()?,
            jwt_mobile_expiry_seconds: var("JWT_MOBILE_EXPIRY_SECONDS")
                .unwrap_or_else(|| "1800".into())
                .parse()?,
            bcrypt_cost: var("BCRYPT_COST")
                .map(|v| v.parse::<u32>())
                .transpose()?
                .unwrap_or(DEFAULT_BCRYPT_COST),
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: var("PORT").unwrap_or_else(|| "8080".into()).parse()?,
        })
    }

    /// Signing secret and expiry windows, fixed for the life of the process.
    pub fn token_settings(&self) -> anyhow::Result<TokenSettings> {
        TokenSettings::new(
            self.jwt_secret.clone(),
            self.jwt_expiry_seconds,
            self.jwt_mobile_expiry_seconds,
        )
    }
}

/// Immutable token configuration handed to the codec and policy engine at
/// construction.
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub secret: String,
    pub web_expiry: Duration,
    pub mobile_expiry: Duration,
}

impl TokenSettings {
    pub fn new(secret: String, web_secs: u64, mobile_secs: u64) -> anyhow::Result<Self> {
        if secret.is_empty() {
            anyhow::bail!("JWT secret must not be empty");
        }
        if web_secs == 0 || mobile_secs == 0 {
            anyhow::bail!("Token expiry windows must be greater than zero");
        }
        if mobile_secs < web_secs {
            tracing::warn!(
                web_secs,
                mobile_secs,
                "Mobile token window is shorter than the web window"
            );
        }
        Ok(Self {
            secret,
            web_expiry: window(web_secs)?,
            mobile_expiry: window(mobile_secs)?,
        })
    }
}

fn window(secs: u64) -> anyhow::Result<Duration> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| anyhow::anyhow!("Token expiry window of {secs}s is out of range"))
}
