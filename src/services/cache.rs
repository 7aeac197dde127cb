use crate::models::CourseId;
use crate::services::store::{CourseCatalog, StoreError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur with cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Cache miss: {0}")]
    CacheMiss(String),
}

/// Multi-tier cache manager
///
/// L1 is an in-process moka cache. L2 is Redis, shared across instances,
/// and optional: without it the manager runs as a pure L1 cache.
pub struct CacheManager {
    redis: Option<Arc<tokio::sync::Mutex<ConnectionManager>>>,
    l1_cache: moka::future::Cache<String, Vec<u8>>,
    ttl_secs: u64,
}

impl CacheManager {
    /// Create a cache manager backed by Redis
    pub async fn new(redis_url: &str, l1_size: u64, ttl_secs: u64) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let redis = redis::aio::ConnectionManager::new(client).await?;

        Ok(Self {
            redis: Some(Arc::new(tokio::sync::Mutex::new(redis))),
            l1_cache: Self::build_l1(l1_size, ttl_secs),
            ttl_secs,
        })
    }

    /// Create an L1-only cache manager
    pub fn in_memory(l1_size: u64, ttl_secs: u64) -> Self {
        Self {
            redis: None,
            l1_cache: Self::build_l1(l1_size, ttl_secs),
            ttl_secs,
        }
    }

    fn build_l1(l1_size: u64, ttl_secs: u64) -> moka::future::Cache<String, Vec<u8>> {
        moka::future::CacheBuilder::new(l1_size)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build()
    }

    pub fn has_l2(&self) -> bool {
        self.redis.is_some()
    }

    /// Get a value from cache (L1 first, then L2)
    pub async fn get<T>(&self, key: &str) -> Result<T, CacheError>
    where
        T: for<'de> Deserialize<'de>,
    {
        if let Some(bytes) = self.l1_cache.get(key).await {
            tracing::trace!("L1 cache hit: {}", key);
            return Ok(serde_json::from_slice(&bytes)?);
        }

        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            let value: Option<String> = redis::cmd("GET")
                .arg(key)
                .query_async(&mut *conn)
                .await?;
            drop(conn);

            if let Some(json) = value {
                tracing::trace!("L2 cache hit: {}", key);

                // Populate L1 cache
                self.l1_cache.insert(key.to_string(), json.as_bytes().to_vec()).await;

                return Ok(serde_json::from_str(&json)?);
            }
        }

        tracing::trace!("Cache miss: {}", key);
        Err(CacheError::CacheMiss(key.to_string()))
    }

    /// Set a value in every configured tier
    pub async fn set<T>(&self, key: &str, value: &T) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        let json = serde_json::to_string(value)?;

        self.l1_cache.insert(key.to_string(), json.as_bytes().to_vec()).await;

        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            redis::cmd("SETEX")
                .arg(key)
                .arg(self.ttl_secs)
                .arg(json)
                .query_async::<()>(&mut *conn)
                .await?;
        }

        tracing::trace!("Cache set: {}", key);
        Ok(())
    }

    /// Delete a value from both cache tiers
    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.l1_cache.invalidate(key).await;
        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            redis::cmd("DEL")
                .arg(key)
                .query_async::<()>(&mut *conn)
                .await?;
        }
        Ok(())
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            l1_size: self.l1_cache.entry_count(),
            l2_enabled: self.has_l2(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub l1_size: u64,
    pub l2_enabled: bool,
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Build a cache key for a course display name
    pub fn course_name(course_id: CourseId) -> String {
        format!("course_name:{}", course_id)
    }
}

/// Read-through cache in front of a course catalog
///
/// Only found names are cached. Cache failures are logged and fall through
/// to the wrapped catalog.
pub struct CachedCatalog {
    inner: Arc<dyn CourseCatalog>,
    cache: Arc<CacheManager>,
}

impl CachedCatalog {
    pub fn new(inner: Arc<dyn CourseCatalog>, cache: Arc<CacheManager>) -> Self {
        Self { inner, cache }
    }

    async fn cached_name(&self, course_id: CourseId) -> Option<String> {
        match self.cache.get::<String>(&CacheKey::course_name(course_id)).await {
            Ok(name) => Some(name),
            Err(CacheError::CacheMiss(_)) => None,
            Err(e) => {
                tracing::warn!("Course name cache read failed for {}: {}", course_id, e);
                None
            }
        }
    }

    async fn remember(&self, course_id: CourseId, name: &str) {
        if let Err(e) = self.cache.set(&CacheKey::course_name(course_id), &name).await {
            tracing::warn!("Course name cache write failed for {}: {}", course_id, e);
        }
    }
}

#[async_trait]
impl CourseCatalog for CachedCatalog {
    async fn get_course_display_name(&self, course_id: CourseId) -> Result<Option<String>, StoreError> {
        if let Some(name) = self.cached_name(course_id).await {
            return Ok(Some(name));
        }

        let name = self.inner.get_course_display_name(course_id).await?;
        if let Some(name) = &name {
            self.remember(course_id, name).await;
        }
        Ok(name)
    }

    async fn get_course_display_names(
        &self,
        course_ids: &[CourseId],
    ) -> Result<HashMap<CourseId, String>, StoreError> {
        let mut names = HashMap::with_capacity(course_ids.len());
        let mut misses = Vec::new();

        for &course_id in course_ids {
            match self.cached_name(course_id).await {
                Some(name) => {
                    names.insert(course_id, name);
                }
                None => misses.push(course_id),
            }
        }

        if !misses.is_empty() {
            match self.inner.get_course_display_names(&misses).await {
                Ok(fetched) => {
                    for (course_id, name) in fetched {
                        self.remember(course_id, &name).await;
                        names.insert(course_id, name);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Course catalog lookup failed for {} uncached courses, returning cached names only: {}",
                        misses.len(),
                        e
                    );
                }
            }
        }

        Ok(names)
    }
}
