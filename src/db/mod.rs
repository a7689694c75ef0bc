pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::models::user::{NewUser, User};

pub use memory::InMemoryUserRepository;
pub use postgres::PgUserRepository;

/// Storage of user records. Implementations must not cache: every call
/// reflects the current stored state.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>>;

    async fn find_all(&self) -> anyhow::Result<Vec<User>>;

    /// Stores a new password hash and stamps the credential change time.
    async fn update_password(
        &self,
        id: i64,
        password_hash: &str,
        changed_at: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    async fn insert(&self, user: NewUser) -> anyhow::Result<User>;

    /// Cheap round trip used by the health check.
    async fn ping(&self) -> anyhow::Result<()>;
}

pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Run the migrations embedded from ./migrations/
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
