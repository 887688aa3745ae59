use futures::future::BoxFuture;
use futures::FutureExt;
use redis::AsyncCommands;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::{CacheService, MOVIES_KEY, MOVIES_TTL_SECS};
use crate::models::{Movie, MovieInput};
use crate::store::{CatalogStore, StoreResult};

impl CacheService {
    // Получить фильмы: сначала кеш, потом хранилище
    pub async fn get_movies(&self) -> StoreResult<Vec<Movie>> {
        match self.get_movies_from_cache().await {
            Ok(Some(movies)) => {
                debug!("Movies served from cache");
                return Ok(movies);
            }
            Ok(None) => {}
            Err(e) => warn!("Movie cache read failed: {}", e),
        }

        self.load_and_cache_movies().await
    }

    pub(crate) async fn load_and_cache_movies(&self) -> StoreResult<Vec<Movie>> {
        let movies = self.catalog.list_movies().await?;
        if let Err(e) = self.save_movies_to_cache(&movies).await {
            warn!("Movie cache write failed: {}", e);
        }
        Ok(movies)
    }

    // Инвалидировать кеш фильмов
    pub async fn invalidate_movies(&self) {
        let mut conn = self.redis.conn.clone();
        let result: Result<i64, _> = conn.del(MOVIES_KEY).await;
        match result {
            Ok(_) => info!("Invalidated movies cache"),
            Err(e) => warn!("Failed to invalidate movies cache: {}", e),
        }
    }

    // === Работа с кешем ===
    async fn get_movies_from_cache(&self) -> Result<Option<Vec<Movie>>, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let data: Option<String> = conn.get(MOVIES_KEY).await?;
        let Some(data) = data else {
            return Ok(None);
        };
        let movies: Vec<Movie> = serde_json::from_str(&data).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Parse error"))
        })?;
        Ok(Some(movies))
    }

    async fn save_movies_to_cache(&self, movies: &[Movie]) -> Result<(), redis::RedisError> {
        let data = serde_json::to_string(movies).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error"))
        })?;
        let mut conn = self.redis.conn.clone();
        conn.set_ex(MOVIES_KEY, data, MOVIES_TTL_SECS).await
    }
}

// Записи идут в хранилище, после успешной записи кеш сбрасывается
impl CatalogStore for CacheService {
    fn list_movies(&self) -> BoxFuture<'_, StoreResult<Vec<Movie>>> {
        self.get_movies().boxed()
    }

    fn create_movie(&self, input: MovieInput) -> BoxFuture<'_, StoreResult<Movie>> {
        async move {
            let movie = self.catalog.create_movie(input).await?;
            self.invalidate_movies().await;
            Ok(movie)
        }
        .boxed()
    }

    fn update_movie(&self, id: Uuid, input: MovieInput) -> BoxFuture<'_, StoreResult<Movie>> {
        async move {
            let movie = self.catalog.update_movie(id, input).await?;
            self.invalidate_movies().await;
            Ok(movie)
        }
        .boxed()
    }

    fn delete_movie(&self, id: Uuid) -> BoxFuture<'_, StoreResult<()>> {
        async move {
            self.catalog.delete_movie(id).await?;
            self.invalidate_movies().await;
            Ok(())
        }
        .boxed()
    }
}
