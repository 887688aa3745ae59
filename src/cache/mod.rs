use std::sync::Arc;
use tracing::info;

use crate::redis_client::RedisClient;
use crate::store::CatalogStore;

pub mod movies;

pub const MOVIES_KEY: &str = "movies";
pub const MOVIES_TTL_SECS: u64 = 3600;

/// Read-through кеш каталога фильмов поверх любого `CatalogStore`.
#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
    catalog: Arc<dyn CatalogStore>,
}

impl CacheService {
    pub fn new(redis: RedisClient, catalog: Arc<dyn CatalogStore>) -> Self {
        Self { redis, catalog }
    }

    // Прогрев кеша при старте
    pub async fn warmup_cache(&self) {
        info!("Starting cache warmup...");

        match self.load_and_cache_movies().await {
            Ok(movies) => info!("Loaded {} movies", movies.len()),
            Err(e) => tracing::warn!("Cache warmup skipped: {}", e),
        }

        info!("Cache warmup done");
    }
}
