use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
    pub log_dir: String,

    // Username lookup warmup: how far back "recently active" reaches and
    // how many rows go into the filter per batch.
    pub warmup_recent_days: u32,
    pub warmup_batch_size: usize,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            server_addr: env::var("SERVER_ADDR").expect("SERVER_ADDR must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            // 15 min access, 7 day refresh
            access_token_ttl: env_or("ACCESS_TOKEN_TTL", 900),
            refresh_token_ttl: env_or("REFRESH_TOKEN_TTL", 604_800),

            rate_login_per_min: env_or("RATE_LOGIN_PER_MIN", 60),
            rate_register_per_min: env_or("RATE_REGISTER_PER_MIN", 30),
            rate_refresh_per_min: env_or("RATE_REFRESH_PER_MIN", 30),
            rate_protected_per_min: env_or("RATE_PROTECTED_PER_MIN", 1000),

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string()),
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),

            warmup_recent_days: env_or("WARMUP_RECENT_DAYS", 30),
            warmup_batch_size: env_or("WARMUP_BATCH_SIZE", 250),
        }
    }
}
