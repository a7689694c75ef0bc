use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::UserRepository;
use crate::models::user::{NewUser, User};

/// Process-local user store, for tests and database-less development.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<BTreeMap<i64, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_enabled(&self, id: i64, enabled: bool) -> anyhow::Result<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("User {id} not found"))?;
        user.enabled = enabled;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_all(&self) -> anyhow::Result<Vec<User>> {
        Ok(self.users.read().await.values().cloned().collect())
    }

    async fn update_password(
        &self,
        id: i64,
        password_hash: &str,
        changed_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("User {id} not found"))?;
        user.password_hash = password_hash.to_string();
        user.last_password_reset_at = changed_at;
        Ok(())
    }

    async fn insert(&self, user: NewUser) -> anyhow::Result<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.username == user.username) {
            anyhow::bail!("Username already taken: {}", user.username);
        }

        let id = users.keys().next_back().map_or(1, |last| last + 1);
        let stored = User {
            id,
            username: user.username,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            phone: user.phone,
            enabled: true,
            last_password_reset_at: user.created_at,
            roles: user.roles,
        };
        users.insert(id, stored.clone());
        Ok(stored)
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserRole;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.into(),
            password_hash: "hash".into(),
            first_name: None,
            last_name: None,
            email: None,
            phone: None,
            roles: vec![UserRole::User],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_assigns_sequential_ids() {
        let repo = InMemoryUserRepository::new();
        let a = repo.insert(new_user("alice")).await.unwrap();
        let b = repo.insert(new_user("bob")).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert!(repo.insert(new_user("alice")).await.is_err());
        assert_eq!(repo.find_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn update_password_stamps_change_time() {
        let repo = InMemoryUserRepository::new();
        let user = repo.insert(new_user("alice")).await.unwrap();
        let changed_at = user.last_password_reset_at + chrono::Duration::minutes(5);

        repo.update_password(user.id, "new-hash", changed_at).await.unwrap();

        let stored = repo.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "new-hash");
        assert_eq!(stored.last_password_reset_at, changed_at);
        assert!(repo.update_password(99, "x", changed_at).await.is_err());
    }
}
