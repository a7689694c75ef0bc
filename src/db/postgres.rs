use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::UserRepository;
use crate::models::user::{NewUser, User, UserRole};

const SELECT_USERS: &str = "SELECT u.id, u.username, u.password_hash, u.first_name, u.last_name,
        u.email, u.phone, u.enabled, u.last_password_reset_at,
        COALESCE(array_agg(r.role::TEXT) FILTER (WHERE r.role IS NOT NULL), '{}') AS roles
     FROM users u
     LEFT JOIN user_roles r ON r.user_id = u.id";

/// DB row struct; roles are aggregated as TEXT[] and parsed afterwards.
#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password_hash: String,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    enabled: bool,
    last_password_reset_at: DateTime<Utc>,
    roles: Vec<String>,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let roles = row
            .roles
            .iter()
            .map(|r| r.parse())
            .collect::<anyhow::Result<Vec<UserRole>>>()?;
        Ok(User {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            enabled: row.enabled,
            last_password_reset_at: row.last_password_reset_at,
            roles,
        })
    }
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!(
            "{SELECT_USERS} WHERE u.username = $1 GROUP BY u.id"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!("{SELECT_USERS} WHERE u.id = $1 GROUP BY u.id"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_all(&self) -> anyhow::Result<Vec<User>> {
        sqlx::query_as::<_, UserRow>(&format!("{SELECT_USERS} GROUP BY u.id ORDER BY u.id"))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    async fn update_password(
        &self,
        id: i64,
        password_hash: &str,
        changed_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $1, last_password_reset_at = $2 WHERE id = $3",
        )
        .bind(password_hash)
        .bind(changed_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("User {id} not found");
        }
        Ok(())
    }

    async fn insert(&self, user: NewUser) -> anyhow::Result<User> {
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (username, password_hash, first_name, last_name, email, phone,
                                enabled, last_password_reset_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7, $7)
             RETURNING id",
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(user.created_at)
        .fetch_one(&mut *tx)
        .await?;

        for role in &user.roles {
            sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
                .bind(id)
                .bind(role.to_string())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(User {
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
        })
    }

    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
