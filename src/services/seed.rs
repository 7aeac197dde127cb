//! Explicit, idempotent demo-data initialization.
//!
//! Called once at process start, never from request handling.

use crate::models::{NewCourse, StudyStyle, UserId, UserProfile};
use crate::services::store::{SeedStore, StoreError};
use rand::seq::SliceRandom;
use rand::Rng;

const DEMO_NAMES: [&str; 10] = [
    "Alex Chen",
    "Sarah Johnson",
    "Michael Rodriguez",
    "Emily Davis",
    "James Wilson",
    "Jessica Garcia",
    "David Kim",
    "Amanda Miller",
    "Ryan Thompson",
    "Lauren Brown",
];

/// Shape of the generated demo population
#[derive(Debug, Clone)]
pub struct SeedPlan {
    pub demo_users: usize,
    pub campus_ids: Vec<i64>,
    pub major_ids: Vec<i64>,
    pub dining_hall_ids: Vec<i64>,
    pub study_location_ids: Vec<i64>,
    pub min_courses: usize,
    pub max_courses: usize,
}

impl Default for SeedPlan {
    fn default() -> Self {
        Self {
            demo_users: 20,
            campus_ids: vec![1],
            major_ids: (1..=8).collect(),
            dining_hall_ids: (1..=5).collect(),
            study_location_ids: (1..=6).collect(),
            min_courses: 3,
            max_courses: 5,
        }
    }
}

/// What a seeding run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub courses: usize,
    pub users_created: Vec<UserId>,
    pub skipped: bool,
}

/// Seed courses and demo users unless the demo population already exists
///
/// Running it again once `plan.demo_users` demo users exist is a no-op.
/// A partial earlier run is topped up to the target count.
pub async fn seed_demo_data<S, R>(
    store: &S,
    courses: &[NewCourse],
    plan: &SeedPlan,
    rng: &mut R,
) -> Result<SeedReport, StoreError>
where
    S: SeedStore + ?Sized,
    R: Rng + Send,
{
    let existing = store.count_demo_users().await?;
    if existing >= plan.demo_users {
        tracing::info!("Demo data already present ({} users), skipping seed", existing);
        return Ok(SeedReport {
            courses: 0,
            users_created: Vec::new(),
            skipped: true,
        });
    }

    let stored_courses = store.upsert_courses(courses).await?;
    let course_ids: Vec<_> = stored_courses.iter().map(|c| c.course_id).collect();

    let mut users_created = Vec::with_capacity(plan.demo_users - existing);
    for index in existing..plan.demo_users {
        let profile = demo_profile(index, &course_ids, plan, rng);
        users_created.push(store.insert_demo_user(&profile).await?);
    }

    tracing::info!(
        "Seeded {} courses and {} demo users",
        stored_courses.len(),
        users_created.len()
    );

    Ok(SeedReport {
        courses: stored_courses.len(),
        users_created,
        skipped: false,
    })
}

fn demo_profile<R: Rng + ?Sized>(
    index: usize,
    course_ids: &[crate::models::CourseId],
    plan: &SeedPlan,
    rng: &mut R,
) -> UserProfile {
    let name = DEMO_NAMES.choose(rng).copied().unwrap_or("Demo Student");
    let mut profile = UserProfile::new(UserId(0), format!("{} #{}", name, index + 1));

    profile.campus_id = plan.campus_ids.choose(rng).copied();
    profile.major_id = plan.major_ids.choose(rng).copied();
    profile.study_style = StudyStyle::ALL.choose(rng).copied();
    profile.dining_hall_id = plan.dining_hall_ids.choose(rng).copied();
    profile.study_location_id = plan.study_location_ids.choose(rng).copied();
    profile.gpa = Some((rng.gen_range(2.5f32..=4.0) * 100.0).round() / 100.0);

    let low = plan.min_courses.min(plan.max_courses);
    let count = rng.gen_range(low..=plan.max_courses).min(course_ids.len());
    profile.courses = course_ids.choose_multiple(rng, count).copied().collect();

    profile
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory::InMemoryStore;
    use crate::services::purdue::fallback_courses;
    use crate::services::store::ProfileStore;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let store = InMemoryStore::new();
        let plan = SeedPlan::default();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let first = seed_demo_data(&store, &fallback_courses(), &plan, &mut rng).await.unwrap();
        assert!(!first.skipped);
        assert_eq!(first.users_created.len(), 20);
        assert_eq!(first.courses, 8);

        let second = seed_demo_data(&store, &fallback_courses(), &plan, &mut rng).await.unwrap();
        assert!(second.skipped);
        assert_eq!(store.profile_count(), 20);
        assert_eq!(store.course_count(), 8);
    }

    #[tokio::test]
    async fn test_seed_tops_up_partial_population() {
        let store = InMemoryStore::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let small = SeedPlan { demo_users: 5, ..SeedPlan::default() };
        seed_demo_data(&store, &fallback_courses(), &small, &mut rng).await.unwrap();

        let report = seed_demo_data(&store, &fallback_courses(), &SeedPlan::default(), &mut rng)
            .await
            .unwrap();
        assert_eq!(report.users_created.len(), 15);
        assert_eq!(store.profile_count(), 20);
    }

    #[tokio::test]
    async fn test_demo_profiles_are_complete() {
        let store = InMemoryStore::new();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let report = seed_demo_data(&store, &fallback_courses(), &SeedPlan::default(), &mut rng)
            .await
            .unwrap();

        for id in report.users_created {
            let profile = store.get_profile(id).await.unwrap().unwrap();
            assert_eq!(profile.campus_id, Some(1));
            assert!(profile.study_style.is_some());
            assert!((3..=5).contains(&profile.courses.len()));
            let gpa = profile.gpa.unwrap();
            assert!((2.5..=4.0).contains(&gpa));
        }
    }
}
