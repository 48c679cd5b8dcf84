use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use std::env;

pub async fn init_db(database_url: &str) -> MySqlPool {
    let max_connections = env::var("DB_MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10);

    MySqlPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .expect("Failed to connect to database")
}
