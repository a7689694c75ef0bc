use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tokengate_api::{
    config::Config,
    db::{self, PgUserRepository, UserRepository},
    router,
    services::{
        auth::{AuthService, Authenticator, RepositoryAuthenticator},
        client::UserAgentClassifier,
        clock::SystemClock,
        credentials::UserCredentialGate,
        password::{BcryptPasswordEncoder, PasswordEncoder},
        token_policy::TokenPolicy,
    },
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let policy = TokenPolicy::new(config.token_settings()?);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database connected and migrations applied");

    let users: Arc<dyn UserRepository> = Arc::new(PgUserRepository::new(pool));
    let encoder: Arc<dyn PasswordEncoder> = Arc::new(BcryptPasswordEncoder::new(config.bcrypt_cost));
    let authenticator: Arc<dyn Authenticator> =
        Arc::new(RepositoryAuthenticator::new(users.clone(), encoder.clone()));

    let auth = AuthService::new(
        policy,
        Arc::new(SystemClock),
        Arc::new(UserCredentialGate::new(users.clone())),
        users.clone(),
        encoder,
        Some(authenticator),
    );

    let state = AppState {
        auth: Arc::new(auth),
        users,
        classifier: Arc::new(UserAgentClassifier),
    };

    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("tokengate API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
