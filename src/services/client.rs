use std::sync::Arc;

use axum::http::{header, HeaderMap};

/// Kind of device making the request. Produced once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    Normal,
    Mobile,
    Tablet,
}

impl ClientKind {
    /// Phones only; tablets are not mobile clients.
    pub fn is_mobile(&self) -> bool {
        matches!(self, ClientKind::Mobile)
    }
}

impl std::str::FromStr for ClientKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" | "web" => Ok(ClientKind::Normal),
            "mobile" => Ok(ClientKind::Mobile),
            "tablet" => Ok(ClientKind::Tablet),
            other => Err(anyhow::anyhow!("Unknown client kind: {other}")),
        }
    }
}

pub trait ClientClassifier: Send + Sync {
    fn classify(&self, headers: &HeaderMap) -> ClientKind;
}

const TABLET_KEYWORDS: &[&str] = &["ipad", "tablet", "kindle", "silk", "playbook"];

const MOBILE_KEYWORDS: &[&str] = &[
    "mobile",
    "iphone",
    "ipod",
    "android",
    "blackberry",
    "opera mini",
    "windows phone",
    "iemobile",
];

/// Keyword-based classification of the `User-Agent` header.
#[derive(Debug, Default, Clone, Copy)]
pub struct UserAgentClassifier;

impl UserAgentClassifier {
    pub fn classify_user_agent(user_agent: &str) -> ClientKind {
        let ua = user_agent.to_ascii_lowercase();

        // Android tablets omit "mobile" from their user agent.
        let android_tablet = ua.contains("android") && !ua.contains("mobile");
        if android_tablet || TABLET_KEYWORDS.iter().any(|k| ua.contains(k)) {
            return ClientKind::Tablet;
        }
        if MOBILE_KEYWORDS.iter().any(|k| ua.contains(k)) {
            return ClientKind::Mobile;
        }
        ClientKind::Normal
    }
}

impl ClientClassifier for UserAgentClassifier {
    fn classify(&self, headers: &HeaderMap) -> ClientKind {
        headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(Self::classify_user_agent)
            .unwrap_or(ClientKind::Normal)
    }
}

pub const CLIENT_KIND_HEADER: &str = "X-Client-Kind";

/// Honors a self-declared `X-Client-Kind` header, deferring to `fallback`
/// when it is absent or unrecognised.
#[derive(Clone)]
pub struct HeaderClientClassifier {
    fallback: Arc<dyn ClientClassifier>,
}

impl HeaderClientClassifier {
    pub fn new(fallback: Arc<dyn ClientClassifier>) -> Self {
        Self { fallback }
    }
}

impl Default for HeaderClientClassifier {
    fn default() -> Self {
        Self::new(Arc::new(UserAgentClassifier))
    }
}

impl ClientClassifier for HeaderClientClassifier {
    fn classify(&self, headers: &HeaderMap) -> ClientKind {
        headers
            .get(CLIENT_KIND_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| self.fallback.classify(headers))
    }
}
