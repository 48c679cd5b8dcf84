//! Layered username availability check for registration.
//!
//! Tier 1 is a cuckoo filter (fast definite "never seen"), tier 2 a moka
//! cache of names known to be taken, tier 3 the database. Both in-memory
//! tiers are warmed at startup and kept in sync on every insert.

use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::RwLock;
use std::time::Duration;

const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

static USERNAME_FILTER: Lazy<RwLock<CuckooFilter<String>>> =
    Lazy::new(|| RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)));

/// Names known to be taken. Value is always true; absence means unknown.
static TAKEN_CACHE: Lazy<Cache<String, bool>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(500_000)
        .time_to_live(Duration::from_secs(86400))
        .build()
});

#[inline]
fn normalize(username: &str) -> String {
    username.to_lowercase()
}

/// Records a freshly registered username in both tiers.
pub async fn mark_taken(username: &str) {
    let username = normalize(username);
    USERNAME_FILTER
        .write()
        .expect("username filter poisoned")
        .add(&username);
    TAKEN_CACHE.insert(username, true).await;
}

/// true  => username AVAILABLE
/// false => username TAKEN
pub async fn is_available(username: &str, pool: &MySqlPool) -> bool {
    let username = normalize(username);

    // 1) cuckoo filter: a miss is a definite "never registered"
    let might_exist = USERNAME_FILTER
        .read()
        .expect("username filter poisoned")
        .contains(&username);
    if !might_exist {
        return true;
    }

    // 2) moka cache: a hit is a definite "taken"
    if TAKEN_CACHE.get(&username).await.unwrap_or(false) {
        return false;
    }

    // 3) database fallback; fail-safe towards "taken"
    let exists =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE username = ? LIMIT 1)")
            .bind(&username)
            .fetch_one(pool)
            .await
            .unwrap_or(true);

    if exists {
        TAKEN_CACHE.insert(username, true).await;
    }
    !exists
}

/// Streams every username into the filter, and the recently active ones
/// (last `recent_days`) into the taken-cache, in `batch_size` chunks.
pub async fn warmup(pool: &MySqlPool, recent_days: u32, batch_size: usize) -> Result<()> {
    // two passes keep the query plans trivial: the filter gets everyone,
    // the cache only the recently active ones
    let mut all = sqlx::query_as::<_, (String,)>("SELECT username FROM users").fetch(pool);
    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = all.next().await {
        let (username,) = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;
        batch.push(normalize(&username));
        total += 1;

        if batch.len() == batch_size {
            insert_filter_batch(&batch);
            batch.clear();
        }
    }
    if !batch.is_empty() {
        insert_filter_batch(&batch);
    }
    log::info!("Username filter warmup complete: {} users", total);

    let mut recent = sqlx::query_as::<_, (String,)>(
        r#"
        SELECT username
        FROM users
        WHERE last_login_at >= NOW() - INTERVAL ? DAY
        ORDER BY last_login_at DESC
        "#,
    )
    .bind(recent_days)
    .fetch(pool);

    let mut cached = 0usize;
    while let Some(row) = recent.next().await {
        let (username,) = row?;
        TAKEN_CACHE.insert(normalize(&username), true).await;
        cached += 1;
    }
    log::info!(
        "Username cache warmup complete: {} recent users (last {} days)",
        cached,
        recent_days
    );

    Ok(())
}

fn insert_filter_batch(usernames: &[String]) {
    let mut filter = USERNAME_FILTER.write().expect("username filter poisoned");
    for username in usernames {
        filter.add(username);
    }
}
