use crate::core::filters::matches_candidate_query;
use crate::models::{CandidateQuery, Course, CourseId, NewCourse, UserId, UserProfile};
use crate::services::store::{CourseCatalog, ProfileStore, SeedStore, StoreError};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct StoreState {
    profiles: BTreeMap<UserId, UserProfile>,
    courses: BTreeMap<CourseId, Course>,
    demo_users: BTreeSet<UserId>,
}

/// In-process profile store and course catalog
///
/// Every read takes one read lock, so a single call never observes a
/// half-applied write.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned lock still holds consistent maps; writers never leave partial state
    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert or replace a profile
    pub fn insert_profile(&self, profile: UserProfile) {
        self.write().profiles.insert(profile.user_id, profile);
    }

    /// Insert or replace a course
    pub fn insert_course(&self, course: Course) {
        self.write().courses.insert(course.course_id, course);
    }

    pub fn with_profiles(self, profiles: impl IntoIterator<Item = UserProfile>) -> Self {
        for profile in profiles {
            self.insert_profile(profile);
        }
        self
    }

    pub fn with_courses(self, courses: impl IntoIterator<Item = Course>) -> Self {
        for course in courses {
            self.insert_course(course);
        }
        self
    }

    pub fn profile_count(&self) -> usize {
        self.read().profiles.len()
    }

    pub fn course_count(&self) -> usize {
        self.read().courses.len()
    }
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn get_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.read().profiles.get(&user_id).cloned())
    }

    async fn list_candidates(&self, query: &CandidateQuery) -> Result<Vec<UserProfile>, StoreError> {
        let state = self.read();
        let candidates = state
            .profiles
            .values()
            .filter(|profile| matches_candidate_query(profile, query))
            .take(query.limit)
            .cloned()
            .collect();
        Ok(candidates)
    }
}

#[async_trait]
impl CourseCatalog for InMemoryStore {
    async fn get_course_display_name(&self, course_id: CourseId) -> Result<Option<String>, StoreError> {
        Ok(self.read().courses.get(&course_id).map(|c| c.course_name.clone()))
    }

    async fn get_course_display_names(
        &self,
        course_ids: &[CourseId],
    ) -> Result<HashMap<CourseId, String>, StoreError> {
        let state = self.read();
        Ok(course_ids
            .iter()
            .filter_map(|id| state.courses.get(id).map(|c| (*id, c.course_name.clone())))
            .collect())
    }
}

#[async_trait]
impl SeedStore for InMemoryStore {
    async fn count_demo_users(&self) -> Result<usize, StoreError> {
        Ok(self.read().demo_users.len())
    }

    async fn upsert_courses(&self, courses: &[NewCourse]) -> Result<Vec<Course>, StoreError> {
        let mut state = self.write();
        let mut next_id = state.courses.keys().next_back().map_or(1, |id| id.0 + 1);
        let mut stored = Vec::with_capacity(courses.len());

        for course in courses {
            let existing = state
                .courses
                .values()
                .find(|c| c.course_number == course.course_number)
                .map(|c| c.course_id);

            let course_id = existing.unwrap_or_else(|| {
                let id = CourseId(next_id);
                next_id += 1;
                id
            });

            let record = course.clone().into_course(course_id);
            state.courses.insert(course_id, record.clone());
            stored.push(record);
        }

        Ok(stored)
    }

    async fn insert_demo_user(&self, profile: &UserProfile) -> Result<UserId, StoreError> {
        let mut state = self.write();
        if let Some(unknown) = profile.courses.iter().find(|id| !state.courses.contains_key(*id)) {
            return Err(StoreError::InvalidData(format!("Unknown course {}", unknown)));
        }

        let user_id = UserId(state.profiles.keys().next_back().map_or(1, |id| id.0 + 1));
        let mut record = profile.clone();
        record.user_id = user_id;
        state.profiles.insert(user_id, record);
        state.demo_users.insert(user_id);

        Ok(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StudyStyle, TierFilter};

    fn create_test_profile(id: i64, campus: i64, style: StudyStyle) -> UserProfile {
        let mut profile = UserProfile::new(UserId(id), format!("Student {}", id));
        profile.campus_id = Some(campus);
        profile.study_style = Some(style);
        profile
    }

    fn new_course(number: &str, name: &str) -> NewCourse {
        NewCourse {
            course_number: number.to_string(),
            course_name: name.to_string(),
            subject: "CS".to_string(),
            credits: 3,
        }
    }

    #[tokio::test]
    async fn test_list_candidates_filters_and_limits() {
        let store = InMemoryStore::new().with_profiles(vec![
            create_test_profile(1, 1, StudyStyle::Quiet),
            create_test_profile(2, 1, StudyStyle::Quiet),
            create_test_profile(3, 1, StudyStyle::Group),
            create_test_profile(4, 2, StudyStyle::Quiet),
            create_test_profile(5, 1, StudyStyle::Quiet),
        ]);

        let query = CandidateQuery {
            campus_id: Some(1),
            filter: TierFilter::SameStudyStyle(StudyStyle::Quiet),
            exclude_user_ids: vec![UserId(1)],
            limit: 10,
        };
        let ids: Vec<UserId> = store
            .list_candidates(&query)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.user_id)
            .collect();
        assert_eq!(ids, vec![UserId(2), UserId(5)]);

        let query = CandidateQuery { limit: 1, ..query };
        assert_eq!(store.list_candidates(&query).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_profile() {
        let store = InMemoryStore::new();
        assert!(store.get_profile(UserId(42)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_courses_keyed_by_number() {
        let store = InMemoryStore::new();

        let first = store
            .upsert_courses(&[new_course("CS180", "Problem Solving"), new_course("CS251", "Data Structures")])
            .await
            .unwrap();
        let second = store
            .upsert_courses(&[new_course("CS180", "Problem Solving And OOP")])
            .await
            .unwrap();

        assert_eq!(store.course_count(), 2);
        assert_eq!(first[0].course_id, second[0].course_id);
        assert_eq!(
            store.get_course_display_name(first[0].course_id).await.unwrap().as_deref(),
            Some("Problem Solving And OOP")
        );
    }

    #[tokio::test]
    async fn test_batched_names_skip_unknown() {
        let store = InMemoryStore::new();
        let courses = store.upsert_courses(&[new_course("MA161", "Calculus I")]).await.unwrap();

        let names = store
            .get_course_display_names(&[courses[0].course_id, CourseId(999)])
            .await
            .unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names[&courses[0].course_id], "Calculus I");
    }

    #[tokio::test]
    async fn test_demo_user_rejects_unknown_course() {
        let store = InMemoryStore::new();
        let mut profile = create_test_profile(0, 1, StudyStyle::Quiet);
        profile.courses.insert(CourseId(77));

        assert!(matches!(
            store.insert_demo_user(&profile).await,
            Err(StoreError::InvalidData(_))
        ));
        assert_eq!(store.count_demo_users().await.unwrap(), 0);
    }
}
