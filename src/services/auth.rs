use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use thiserror::Error;

use crate::{
    db::UserRepository,
    models::{
        auth::{AuthenticatedUser, UserTokenState},
        user::User,
    },
    services::{
        client::ClientKind,
        clock::Clock,
        credentials::CredentialGate,
        password::PasswordEncoder,
        token::TokenError,
        token_policy::{TokenPolicy, TokenRejection},
    },
};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    ExpiredToken,

    #[error("Token revoked by a credential change")]
    RevokedByCredentialChange,

    #[error("Bad credentials")]
    BadCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("Account disabled")]
    AccountDisabled,

    #[error("Access denied")]
    Forbidden,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidToken
            | AuthError::ExpiredToken
            | AuthError::RevokedByCredentialChange
            | AuthError::BadCredentials
            | AuthError::AccountDisabled => StatusCode::UNAUTHORIZED,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TokenRejection> for AuthError {
    fn from(rejection: TokenRejection) -> Self {
        match rejection {
            TokenRejection::Invalid(_) | TokenRejection::SubjectMismatch => AuthError::InvalidToken,
            TokenRejection::Expired => AuthError::ExpiredToken,
            TokenRejection::RevokedByCredentialChange => AuthError::RevokedByCredentialChange,
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Invalid(_) => AuthError::InvalidToken,
            TokenError::Encoding(msg) => AuthError::Internal(anyhow::anyhow!(msg)),
        }
    }
}

/// Checks a username/password pair.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, username: &str, password: &str) -> Result<User, AuthError>;
}

/// Password authentication against the user store.
pub struct RepositoryAuthenticator {
    users: Arc<dyn UserRepository>,
    encoder: Arc<dyn PasswordEncoder>,
}

impl RepositoryAuthenticator {
    pub fn new(users: Arc<dyn UserRepository>, encoder: Arc<dyn PasswordEncoder>) -> Self {
        Self { users, encoder }
    }
}

#[async_trait]
impl Authenticator for RepositoryAuthenticator {
    async fn authenticate(&self, username: &str, password: &str) -> Result<User, AuthError> {
        // Unknown users and wrong passwords are indistinguishable to the caller.
        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(AuthError::BadCredentials)?;

        if !self.encoder.verify(password, &user.password_hash) {
            return Err(AuthError::BadCredentials);
        }
        if !user.enabled {
            return Err(AuthError::AccountDisabled);
        }
        Ok(user)
    }
}

/// Token lifecycle on top of the user store: login, refresh, per-request
/// authentication and password change.
pub struct AuthService {
    policy: TokenPolicy,
    clock: Arc<dyn Clock>,
    gate: Arc<dyn CredentialGate>,
    users: Arc<dyn UserRepository>,
    encoder: Arc<dyn PasswordEncoder>,
    authenticator: Option<Arc<dyn Authenticator>>,
}

impl AuthService {
    pub fn new(
        policy: TokenPolicy,
        clock: Arc<dyn Clock>,
        gate: Arc<dyn CredentialGate>,
        users: Arc<dyn UserRepository>,
        encoder: Arc<dyn PasswordEncoder>,
        authenticator: Option<Arc<dyn Authenticator>>,
    ) -> Self {
        Self {
            policy,
            clock,
            gate,
            users,
            encoder,
            authenticator,
        }
    }

    pub fn policy(&self) -> &TokenPolicy {
        &self.policy
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
        client: ClientKind,
    ) -> Result<UserTokenState, AuthError> {
        let authenticator = self
            .authenticator
            .as_ref()
            .ok_or_else(|| AuthError::Internal(anyhow::anyhow!("No authenticator configured")))?;

        let user = authenticator.authenticate(username, password).await?;

        let audience = self.policy.audience_for(client);
        let token = self
            .policy
            .generate_token(&user.username, client, self.clock.now())?;

        tracing::info!(username = %user.username, %audience, "User logged in");
        Ok(UserTokenState::issued(token, self.policy.expires_in(audience)))
    }

    /// Never fails: every refusal (missing, invalid, expired, revoked, unknown
    /// subject) yields an empty token state.
    pub async fn refresh(&self, token: Option<&str>, client: ClientKind) -> UserTokenState {
        let Some(token) = token else {
            return UserTokenState::empty();
        };

        let claims = match self.policy.decode(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "Refresh refused: undecodable token");
                return UserTokenState::empty();
            }
        };

        let snapshot = match self.gate.lookup(&claims.sub).await {
            Ok(snapshot) => snapshot,
            Err(AuthError::UserNotFound) => {
                tracing::debug!(username = %claims.sub, "Refresh refused: unknown subject");
                return UserTokenState::empty();
            }
            Err(e) => {
                tracing::error!(username = %claims.sub, error = %e, "Credential lookup failed");
                return UserTokenState::empty();
            }
        };

        let now = self.clock.now();
        if !self.policy.validate_token(token, &snapshot, now) {
            return UserTokenState::empty();
        }

        match self.policy.refresh_token(token, client, now) {
            Some(refreshed) => {
                tracing::debug!(username = %claims.sub, audience = %claims.aud, "Token refreshed");
                UserTokenState::issued(refreshed, self.policy.expires_in(claims.aud))
            }
            None => UserTokenState::empty(),
        }
    }

    /// Resolves the principal behind a bearer token. The credential snapshot
    /// is re-read on every call.
    pub async fn authenticate_request(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let username = self.policy.get_username_from_token(token)?;
        let snapshot = self.gate.lookup(&username).await?;

        let claims = self
            .policy
            .check(token, &snapshot, self.clock.now())
            .map_err(|reason| {
                tracing::debug!(%username, %reason, "Bearer token rejected");
                AuthError::from(reason)
            })?;

        let user = self
            .users
            .find_by_username(&claims.sub)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if !user.enabled {
            return Err(AuthError::AccountDisabled);
        }

        Ok(AuthenticatedUser {
            user_id: user.id,
            username: user.username,
            roles: user.roles,
            audience: claims.aud,
        })
    }

    /// Re-authenticates `principal` with `old_password` and stores the new
    /// hash, revoking every token issued before now. A no-op when no
    /// authenticator is configured.
    pub async fn change_password(
        &self,
        principal: &AuthenticatedUser,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let Some(authenticator) = self.authenticator.as_ref() else {
            tracing::warn!(
                username = %principal.username,
                "No authenticator configured, password change skipped"
            );
            return Ok(());
        };

        tracing::debug!(username = %principal.username, "Re-authenticating user for password change");
        let user = authenticator
            .authenticate(&principal.username, old_password)
            .await?;

        let hash = self.encoder.encode(new_password)?;
        self.users
            .update_password(user.id, &hash, self.clock.now())
            .await?;

        tracing::info!(username = %user.username, "Password changed");
        Ok(())
    }
}
