//! Read-side interfaces the ranker consumes, plus the write side used by seeding.

use crate::models::{CandidateQuery, Course, CourseId, NewCourse, UserId, UserProfile};
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur when reading or writing profile and course data
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Read-only access to student profiles and their enrollments
///
/// Profiles are always returned with `courses` populated; implementations
/// load enrollments explicitly rather than on attribute access.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch one profile, `Ok(None)` if the user does not exist
    async fn get_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, StoreError>;

    /// List candidates matching the query, in ascending user ID order,
    /// at most `query.limit` of them
    async fn list_candidates(&self, query: &CandidateQuery) -> Result<Vec<UserProfile>, StoreError>;

    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }
}

/// Read-only course display name lookup
#[async_trait]
pub trait CourseCatalog: Send + Sync {
    async fn get_course_display_name(&self, course_id: CourseId) -> Result<Option<String>, StoreError>;

    /// Batched lookup. IDs with no catalog entry are absent from the map.
    ///
    /// A failed lookup only drops that ID's name.
    async fn get_course_display_names(
        &self,
        course_ids: &[CourseId],
    ) -> Result<HashMap<CourseId, String>, StoreError> {
        let mut names = HashMap::with_capacity(course_ids.len());
        for &course_id in course_ids {
            match self.get_course_display_name(course_id).await {
                Ok(Some(name)) => {
                    names.insert(course_id, name);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Course name lookup failed for {}, omitting it: {}", course_id, e);
                }
            }
        }
        Ok(names)
    }
}

/// Write operations needed by demo-data initialization
#[async_trait]
pub trait SeedStore: Send + Sync {
    async fn count_demo_users(&self) -> Result<usize, StoreError>;

    /// Insert or update courses keyed by course number, returning them with IDs
    async fn upsert_courses(&self, courses: &[NewCourse]) -> Result<Vec<Course>, StoreError>;

    /// Insert a demo user with its enrollments. The profile's `user_id` is ignored.
    async fn insert_demo_user(&self, profile: &UserProfile) -> Result<UserId, StoreError>;
}
