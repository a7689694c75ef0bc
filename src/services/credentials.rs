use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    db::UserRepository,
    models::{auth::CredentialSnapshot, user::User},
    services::auth::AuthError,
};

/// Supplies the credential facts token validation depends on.
#[async_trait]
pub trait CredentialGate: Send + Sync {
    async fn lookup(&self, username: &str) -> Result<CredentialSnapshot, AuthError>;
}

impl From<&User> for CredentialSnapshot {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            last_credential_change_at: user.last_password_reset_at,
        }
    }
}

/// Reads snapshots straight from the user store on every call, so a password
/// change is visible to the very next request.
#[derive(Clone)]
pub struct UserCredentialGate {
    users: Arc<dyn UserRepository>,
}

impl UserCredentialGate {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl CredentialGate for UserCredentialGate {
    async fn lookup(&self, username: &str) -> Result<CredentialSnapshot, AuthError> {
        self.users
            .find_by_username(username)
            .await?
            .map(|user| CredentialSnapshot::from(&user))
            .ok_or(AuthError::UserNotFound)
    }
}
