use std::sync::Arc;
use std::time::Duration;

use schoolhub_cache::{CacheConfig, RedisCache};
use schoolhub_config::{
    CorsConfig, EmailConfig, JwtConfig, KeyedLimiter, RateLimitConfig, SecurityConfig,
    StorageConfig, prune_limiter,
};
use schoolhub_core::file_storage::{FileStorage, LocalFileStorage};
use schoolhub_db::{PgPool, init_db_pool};
use tracing::{debug, info, warn};

use crate::modules::notifications::hub::NotificationHub;

#[derive(Clone)]
pub struct RateLimiters {
    pub general: Arc<KeyedLimiter>,
    pub auth: Arc<KeyedLimiter>,
}

impl RateLimiters {
    /// Periodically forgets clients whose buckets have refilled.
    pub fn spawn_cleanup(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let limiters = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                prune_limiter(&limiters.general);
                prune_limiter(&limiters.auth);
                debug!(
                    general = limiters.general.len(),
                    auth = limiters.auth.len(),
                    "Rate limiter state pruned"
                );
            }
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub jwt_config: JwtConfig,
    pub email_config: EmailConfig,
    pub cors_config: CorsConfig,
    pub security_config: SecurityConfig,
    pub rate_limit_config: RateLimitConfig,
    pub rate_limiters: RateLimiters,
    pub cache: Option<RedisCache>,
    pub storage: Arc<dyn FileStorage>,
    pub hub: NotificationHub,
}

impl AppState {
    /// Everything except the database and cache comes from the environment.
    pub fn build(db: PgPool, cache: Option<RedisCache>) -> Self {
        let rate_limit_config = RateLimitConfig::from_env();
        let storage_config = StorageConfig::from_env();

        Self {
            db,
            jwt_config: JwtConfig::from_env(),
            email_config: EmailConfig::from_env(),
            cors_config: CorsConfig::from_env(),
            security_config: SecurityConfig::from_env(),
            rate_limiters: RateLimiters {
                general: rate_limit_config.general_limiter(),
                auth: rate_limit_config.auth_limiter(),
            },
            rate_limit_config,
            cache,
            storage: Arc::new(LocalFileStorage::with_max_size(
                storage_config.upload_dir,
                storage_config.base_url,
                storage_config.max_upload_bytes,
            )),
            hub: NotificationHub::new(),
        }
    }

    pub fn cache(&self) -> Option<&RedisCache> {
        self.cache.as_ref()
    }
}

async fn init_cache() -> Option<RedisCache> {
    let config = CacheConfig::from_env();
    if !config.enabled {
        info!("Cache disabled");
        return None;
    }

    match RedisCache::connect(&config).await {
        Ok(cache) => {
            info!(prefix = %config.key_prefix, "Redis cache connected");
            Some(cache)
        }
        Err(e) => {
            warn!(error = %e, "Redis unavailable, continuing without cache");
            None
        }
    }
}

pub async fn init_app_state() -> AppState {
    let db = init_db_pool().await;
    let cache = init_cache().await;
    AppState::build(db, cache)
}
