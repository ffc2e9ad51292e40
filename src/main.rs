use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use web_users::{
    PgUserStore, UserRepository, config::Config, database::run_migrations,
    infrastructure::AesTokenCipher,
};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    // 设置数据库连接池
    let pool = config
        .connect()
        .await
        .expect("Failed to connect to Postgres");

    run_migrations(&pool).await.expect("Failed to run migrations");
    tracing::info!("Database schema is up to date");

    let cipher =
        AesTokenCipher::new(&config.refresh_token_key).expect("Failed to create token cipher");
    let store = PgUserStore::new(pool, Arc::new(cipher));

    let users = store.get_users().await.expect("Failed to load users");
    let activated = users.iter().filter(|u| u.activated).count();
    tracing::info!(
        "Found {} users ({} activated, {} pending activation)",
        users.len(),
        activated,
        users.len() - activated
    );
}
