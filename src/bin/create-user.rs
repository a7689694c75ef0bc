/// Create a user account directly in the database.
///
/// Usage: create-user --username NAME --password PASS [--admin]
///   DATABASE_URL must be set (a .env file is honored).

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;

use tokengate_api::{
    config::DEFAULT_BCRYPT_COST,
    db::{self, PgUserRepository, UserRepository},
    models::user::{NewUser, UserRole},
    services::password::{BcryptPasswordEncoder, PasswordEncoder},
};

#[derive(Parser)]
#[command(name = "create-user", about = "Create a tokengate user account")]
struct Args {
    #[arg(long)]
    username: String,

    #[arg(long)]
    password: String,

    #[arg(long)]
    first_name: Option<String>,

    #[arg(long)]
    last_name: Option<String>,

    #[arg(long)]
    email: Option<String>,

    #[arg(long)]
    phone: Option<String>,

    /// Grant ROLE_ADMIN in addition to ROLE_USER
    #[arg(long)]
    admin: bool,

    /// bcrypt work factor
    #[arg(long, default_value_t = DEFAULT_BCRYPT_COST)]
    cost: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL required")?;
    let pool = db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;
    db::run_migrations(&pool).await?;

    let repo = PgUserRepository::new(pool);
    if repo.find_by_username(&args.username).await?.is_some() {
        anyhow::bail!("User '{}' already exists", args.username);
    }

    let mut roles = vec![UserRole::User];
    if args.admin {
        roles.push(UserRole::Admin);
    }

    let password_hash = BcryptPasswordEncoder::new(args.cost).encode(&args.password)?;
    let user = repo
        .insert(NewUser {
            username: args.username,
            password_hash,
            first_name: args.first_name,
            last_name: args.last_name,
            email: args.email,
            phone: args.phone,
            roles,
            created_at: Utc::now(),
        })
        .await?;

    tracing::info!(id = user.id, username = %user.username, roles = ?user.roles, "User created");
    Ok(())
}
