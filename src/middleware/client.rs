use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{services::client::ClientKind, AppState};

/// Client kind of the current request, as decided by the configured classifier.
#[derive(Debug, Clone, Copy)]
pub struct CurrentClient(pub ClientKind);

impl FromRequestParts<AppState> for CurrentClient {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(CurrentClient(state.classifier.classify(&parts.headers)))
    }
}
