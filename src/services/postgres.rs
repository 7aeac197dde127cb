use crate::models::{CandidateQuery, Course, CourseId, NewCourse, StudyStyle, TierFilter, UserId, UserProfile};
use crate::services::store::{CourseCatalog, ProfileStore, SeedStore, StoreError};
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Row};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

const PROFILE_COLUMNS: &str =
    "id, name, campus_id, major_id, study_style, dining_hall_id, study_location_id, gpa";

/// PostgreSQL-backed profile store and course catalog
///
/// Candidate listing runs its profile and enrollment reads inside one
/// REPEATABLE READ transaction so a ranking never sees torn enrollment data.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store from a connection string and run migrations
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a new store from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, StoreError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }

    /// Wrap an existing pool. Migrations are not run.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load enrollments for a batch of users in one query
    async fn load_enrollments(
        conn: &mut PgConnection,
        user_ids: &[i64],
    ) -> Result<HashMap<i64, BTreeSet<CourseId>>, StoreError> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT user_id, course_id
            FROM enrollments
            WHERE user_id = ANY($1)
            "#,
        )
        .bind(user_ids)
        .fetch_all(&mut *conn)
        .await?;

        let mut enrollments: HashMap<i64, BTreeSet<CourseId>> = HashMap::new();
        for row in rows {
            let user_id: i64 = row.try_get("user_id")?;
            let course_id: i64 = row.try_get("course_id")?;
            enrollments.entry(user_id).or_default().insert(CourseId(course_id));
        }

        Ok(enrollments)
    }

    async fn fetch_profiles_with_courses(
        conn: &mut PgConnection,
        rows: Vec<PgRow>,
    ) -> Result<Vec<UserProfile>, StoreError> {
        let mut profiles = rows.iter().map(profile_from_row).collect::<Result<Vec<_>, _>>()?;
        let ids: Vec<i64> = profiles.iter().map(|p| p.user_id.0).collect();
        let mut enrollments = Self::load_enrollments(conn, &ids).await?;

        for profile in &mut profiles {
            profile.courses = enrollments.remove(&profile.user_id.0).unwrap_or_default();
        }

        Ok(profiles)
    }
}

fn profile_from_row(row: &PgRow) -> Result<UserProfile, StoreError> {
    let style: Option<String> = row.try_get("study_style")?;
    let study_style = match style {
        Some(raw) => Some(
            StudyStyle::parse(&raw)
                .ok_or_else(|| StoreError::InvalidData(format!("Unknown study style: {}", raw)))?,
        ),
        None => None,
    };

    Ok(UserProfile {
        user_id: UserId(row.try_get("id")?),
        name: row.try_get("name")?,
        campus_id: row.try_get("campus_id")?,
        major_id: row.try_get("major_id")?,
        study_style,
        dining_hall_id: row.try_get("dining_hall_id")?,
        study_location_id: row.try_get("study_location_id")?,
        gpa: row.try_get("gpa")?,
        courses: BTreeSet::new(),
    })
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn get_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;

        let query = format!("SELECT {} FROM users WHERE id = $1", PROFILE_COLUMNS);
        let row = sqlx::query(&query)
            .bind(user_id.0)
            .fetch_optional(&mut *tx)
            .await?;

        let profile = match row {
            Some(row) => Self::fetch_profiles_with_courses(&mut *tx, vec![row]).await?.pop(),
            None => None,
        };
        tx.commit().await?;

        Ok(profile)
    }

    async fn list_candidates(&self, query: &CandidateQuery) -> Result<Vec<UserProfile>, StoreError> {
        let (style, major) = match query.filter {
            TierFilter::SameStudyStyle(style) => (Some(style.as_str()), None),
            TierFilter::SameMajor(major) => (None, Some(major)),
            TierFilter::AnyOnCampus => (None, None),
        };
        let excluded: Vec<i64> = query.exclude_user_ids.iter().map(|id| id.0).collect();

        let sql = format!(
            r#"
            SELECT {}
            FROM users
            WHERE ($1::BIGINT IS NULL OR campus_id = $1)
              AND NOT (id = ANY($2))
              AND ($3::TEXT IS NULL OR study_style = $3)
              AND ($4::BIGINT IS NULL OR major_id = $4)
            ORDER BY id
            LIMIT $5
            "#,
            PROFILE_COLUMNS
        );

        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;

        let rows = sqlx::query(&sql)
            .bind(query.campus_id)
            .bind(&excluded)
            .bind(style)
            .bind(major)
            .bind(query.limit as i64)
            .fetch_all(&mut *tx)
            .await?;

        let profiles = Self::fetch_profiles_with_courses(&mut *tx, rows).await?;
        tx.commit().await?;

        tracing::debug!(
            "Listed {} candidates for {:?} on campus {:?}",
            profiles.len(),
            query.filter,
            query.campus_id
        );

        Ok(profiles)
    }

    /// Health check for the database connection
    async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

#[async_trait]
impl CourseCatalog for PgStore {
    async fn get_course_display_name(&self, course_id: CourseId) -> Result<Option<String>, StoreError> {
        let name = sqlx::query_scalar::<_, String>("SELECT course_name FROM courses WHERE id = $1")
            .bind(course_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(name)
    }

    async fn get_course_display_names(
        &self,
        course_ids: &[CourseId],
    ) -> Result<HashMap<CourseId, String>, StoreError> {
        if course_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let ids: Vec<i64> = course_ids.iter().map(|id| id.0).collect();
        let rows = sqlx::query("SELECT id, course_name FROM courses WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<(CourseId, String), StoreError> {
                Ok((CourseId(row.try_get("id")?), row.try_get("course_name")?))
            })
            .collect()
    }
}

#[async_trait]
impl SeedStore for PgStore {
    async fn count_demo_users(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_demo_user")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as usize)
    }

    /// Uses INSERT ... ON CONFLICT so re-importing a course updates it in place
    async fn upsert_courses(&self, courses: &[NewCourse]) -> Result<Vec<Course>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut stored = Vec::with_capacity(courses.len());

        for course in courses {
            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO courses (course_number, course_name, subject, credits)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (course_number)
                DO UPDATE SET
                    course_name = EXCLUDED.course_name,
                    subject = EXCLUDED.subject,
                    credits = EXCLUDED.credits
                RETURNING id
                "#,
            )
            .bind(&course.course_number)
            .bind(&course.course_name)
            .bind(&course.subject)
            .bind(course.credits)
            .fetch_one(&mut *tx)
            .await?;

            stored.push(course.clone().into_course(CourseId(id)));
        }

        tx.commit().await?;
        tracing::debug!("Upserted {} courses", stored.len());

        Ok(stored)
    }

    async fn insert_demo_user(&self, profile: &UserProfile) -> Result<UserId, StoreError> {
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO users
                (name, campus_id, major_id, study_style, dining_hall_id, study_location_id, gpa, is_demo_user)
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE)
            RETURNING id
            "#,
        )
        .bind(&profile.name)
        .bind(profile.campus_id)
        .bind(profile.major_id)
        .bind(profile.study_style.map(|s| s.as_str()))
        .bind(profile.dining_hall_id)
        .bind(profile.study_location_id)
        .bind(profile.gpa)
        .fetch_one(&mut *tx)
        .await?;

        let course_ids: Vec<i64> = profile.courses.iter().map(|c| c.0).collect();
        sqlx::query(
            r#"
            INSERT INTO enrollments (user_id, course_id)
            SELECT $1, course_id FROM UNNEST($2::BIGINT[]) AS t(course_id)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(id)
        .bind(&course_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(UserId(id))
    }
}
