// SPDX-License-Identifier: GPL-3.0-or-later
pub mod lyrics_cache;

use anyhow::Result;
use redis::aio::ConnectionManager;
use reqwest::Client;
use tracing::info;

pub use lyrics_cache::{LyricsCacheError, LyricsCacheRepository, RedisLyricsCacheRepository};

pub fn http_client() -> Client {
    Client::builder()
        .pool_max_idle_per_host(8)
        .build()
        .expect("http client")
}

/// Connect to Redis and wrap the connection in a `ConnectionManager` so
/// every store built on top of it (queue, progress, lyrics cache) can clone
/// a cheap handle instead of fighting over a single connection.
pub async fn init_redis(url: &str) -> Result<ConnectionManager> {
    info!(target: "infrastructure", "connecting to redis");
    let client = redis::Client::open(url)?;
    let manager = ConnectionManager::new(client).await?;
    info!(target: "infrastructure", "redis connection established");
    Ok(manager)
}
