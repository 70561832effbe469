// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::Path;

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub namespace: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            namespace: "analysis".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5150,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub poll_interval_secs: f64,
    pub stop_timeout_secs: f64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 1.0,
            stop_timeout_secs: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JanitorConfig {
    pub interval_secs: u64,
    pub cache_max_age_days: i64,
    pub job_ttl_secs: i64,
    pub progress_max_age_hours: i64,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            cache_max_age_days: 30,
            job_ttl_secs: 86_400,
            progress_max_age_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub window_size_secs: u64,
    pub max_requests: u32,
    pub threshold: f64,
    pub token_bucket_capacity: u32,
    pub token_bucket_refill_rate: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_size_secs: 60,
            max_requests: 60,
            threshold: 0.8,
            token_bucket_capacity: 10,
            token_bucket_refill_rate: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_secs: f64,
    pub max_delay_secs: f64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_secs: 2.0,
            max_delay_secs: 60.0,
            jitter_factor: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LyricsCacheConfig {
    pub default_ttl_secs: u64,
    pub negative_ttl_secs: u64,
    pub error_ttl_secs: u64,
}

impl Default for LyricsCacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 604_800,
            negative_ttl_secs: 86_400,
            error_ttl_secs: 43_200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeniusConfig {
    pub access_token: Option<String>,
    pub timeout_secs: u64,
    pub sleep_time_secs: f64,
    pub retries: u32,
}

impl Default for GeniusConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            timeout_secs: 15,
            sleep_time_secs: 0.1,
            retries: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LyricsConfig {
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub cache: LyricsCacheConfig,
    pub genius: GeniusConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub redis: RedisConfig,
    pub http: HttpConfig,
    pub telemetry: TelemetryConfig,
    pub worker: WorkerConfig,
    pub janitor: JanitorConfig,
    pub lyrics: LyricsConfig,
}

/// Load configuration from defaults, optional TOML file, and environment overrides (prefix: CADENCE_).
pub fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(path) = config_path {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("CADENCE_").split("__"));

    let config: AppConfig = figment.extract()?;
    info!(target: "config", "configuration loaded");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = AppConfig::default();
        assert_eq!(config.http.port, 5150);
        assert_eq!(config.worker.poll_interval_secs, 1.0);
        assert_eq!(config.janitor.interval_secs, 3600);
        assert_eq!(config.lyrics.rate_limit.max_requests, 60);
        assert_eq!(config.lyrics.retry.max_retries, 5);
        assert_eq!(config.lyrics.cache.default_ttl_secs, 604_800);
    }

    #[test]
    fn load_without_file_uses_defaults() {
        let config = load(None).expect("defaults always load");
        assert_eq!(config.redis.namespace, "analysis");
    }

    #[test]
    fn env_override_applies() {
        std::env::set_var("CADENCE_HTTP__PORT", "9090");
        let config = load(None).expect("config loads with env override");
        assert_eq!(config.http.port, 9090);
        std::env::remove_var("CADENCE_HTTP__PORT");
    }
}
