use crate::core::{
    filters::{bonus_flags, major_filter, primary_filter, BonusFlags},
    overlap::{common_courses, resolve_display_names},
    scoring::{calculate_primary_score, sample_backup_score},
};
use crate::models::{
    CandidateQuery, CourseId, MatchResult, MatchTier, RankingPolicy, TierFilter, UserId, UserProfile,
};
use crate::services::{CourseCatalog, ProfileStore};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Overlap label for major-tier matches that share no course
pub const MAJOR_PLACEHOLDER: &str = "Similar interests";
/// Overlap label for campus-tier matches that share no course
pub const CAMPUS_PLACEHOLDER: &str = "Same campus";

/// A candidate picked by one of the tiers, before names are resolved
#[derive(Debug)]
struct Selection {
    candidate: UserProfile,
    common: Vec<CourseId>,
    score: f64,
    flags: BonusFlags,
    tier: MatchTier,
}

/// Study-match ranker - implements the tiered acquisition pipeline
///
/// # Pipeline Stages
/// 1. Primary: same campus and study style, scored by course overlap plus bonuses
/// 2. Major backup: same campus and major, sampled score
/// 3. Campus backup: anyone else on campus, sampled score
/// 4. Merge, stable sort by score, truncate
///
/// Never fails: store errors are logged and the affected tier yields nothing.
#[derive(Clone)]
pub struct Matcher {
    profiles: Arc<dyn ProfileStore>,
    catalog: Arc<dyn CourseCatalog>,
    policy: RankingPolicy,
    random_seed: Option<u64>,
}

impl Matcher {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        catalog: Arc<dyn CourseCatalog>,
        policy: RankingPolicy,
    ) -> Self {
        Self {
            profiles,
            catalog,
            policy,
            random_seed: None,
        }
    }

    pub fn with_default_policy(profiles: Arc<dyn ProfileStore>, catalog: Arc<dyn CourseCatalog>) -> Self {
        Self::new(profiles, catalog, RankingPolicy::default())
    }

    /// Seed every ranking's backup-score generator with a fixed value
    pub fn with_random_seed(mut self, seed: Option<u64>) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn policy(&self) -> &RankingPolicy {
        &self.policy
    }

    /// Rank study buddies for a user
    ///
    /// Uses a fresh generator per call: seeded from the configured seed when
    /// present (so repeated calls agree), from OS entropy otherwise.
    pub async fn rank_matches(&self, requester_id: UserId) -> Vec<MatchResult> {
        let mut rng = match self.random_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        self.rank_matches_with_rng(requester_id, &mut rng).await
    }

    /// Rank study buddies for a user with an explicit random source
    ///
    /// # Returns
    /// At most `policy.result_limit` matches, compatibility descending, ties in
    /// selection order. Empty when the requester does not exist.
    pub async fn rank_matches_with_rng<R: Rng>(&self, requester_id: UserId, rng: &mut R) -> Vec<MatchResult> {
        let requester = match self.profiles.get_profile(requester_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                tracing::debug!("No profile for requester {}, returning no matches", requester_id);
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!("Failed to load requester {}, returning no matches: {}", requester_id, e);
                return Vec::new();
            }
        };

        let mut selections: Vec<Selection> = Vec::new();
        let mut selected_ids: HashSet<UserId> = HashSet::new();

        // Stage 1: primary candidates
        if let Some(filter) = primary_filter(&requester) {
            let candidates = self
                .fetch_tier(&requester, filter, self.policy.primary_limit, &selected_ids)
                .await;

            for candidate in candidates {
                let common = common_courses(&requester.courses, &candidate.courses);
                if common.is_empty() {
                    continue;
                }

                let flags = bonus_flags(&requester, &candidate);
                let score = calculate_primary_score(
                    common.len(),
                    requester.courses.len(),
                    &flags,
                    &self.policy.bonuses,
                );

                selected_ids.insert(candidate.user_id);
                selections.push(Selection {
                    candidate,
                    common,
                    score,
                    flags,
                    tier: MatchTier::Primary,
                });
            }
        }

        // Stage 2: backup by major
        if selections.len() < self.policy.major_threshold {
            let limit = self.policy.major_target.saturating_sub(selections.len());
            if let Some(filter) = major_filter(&requester).filter(|_| limit > 0) {
                let candidates = self.fetch_tier(&requester, filter, limit, &selected_ids).await;

                for candidate in candidates {
                    let common = common_courses(&requester.courses, &candidate.courses);
                    let flags = BonusFlags {
                        same_major: true,
                        ..bonus_flags(&requester, &candidate)
                    };
                    let score = sample_backup_score(rng, self.policy.major_score_range);

                    selected_ids.insert(candidate.user_id);
                    selections.push(Selection {
                        candidate,
                        common,
                        score,
                        flags,
                        tier: MatchTier::Major,
                    });
                }
            }
        }

        // Stage 3: backup by campus
        if selections.len() < self.policy.campus_threshold {
            let limit = self.policy.campus_target.saturating_sub(selections.len());
            if limit > 0 {
                let candidates = self
                    .fetch_tier(&requester, TierFilter::AnyOnCampus, limit, &selected_ids)
                    .await;

                for candidate in candidates {
                    let common = common_courses(&requester.courses, &candidate.courses);
                    let flags = bonus_flags(&requester, &candidate);
                    let score = sample_backup_score(rng, self.policy.campus_score_range);

                    selected_ids.insert(candidate.user_id);
                    selections.push(Selection {
                        candidate,
                        common,
                        score,
                        flags,
                        tier: MatchTier::Campus,
                    });
                }
            }
        }

        // Stage 4: merge, sort, truncate
        let names = self.resolve_names(&selections).await;
        let mut matches: Vec<MatchResult> = selections
            .into_iter()
            .map(|selection| self.to_match_result(selection, &names))
            .collect();

        // sort_by is stable, so equal scores keep selection order
        matches.sort_by(|a, b| {
            b.compatibility
                .partial_cmp(&a.compatibility)
                .unwrap_or(Ordering::Equal)
        });
        matches.truncate(self.policy.result_limit);

        tracing::debug!("Ranked {} matches for requester {}", matches.len(), requester_id);

        matches
    }

    /// Query one tier, dropping the requester, prior selections and any
    /// duplicate the store hands back
    async fn fetch_tier(
        &self,
        requester: &UserProfile,
        filter: TierFilter,
        limit: usize,
        selected_ids: &HashSet<UserId>,
    ) -> Vec<UserProfile> {
        let mut exclude_user_ids = Vec::with_capacity(selected_ids.len() + 1);
        exclude_user_ids.push(requester.user_id);
        exclude_user_ids.extend(selected_ids.iter().copied());
        exclude_user_ids.sort();

        let query = CandidateQuery {
            campus_id: requester.campus_id,
            filter,
            exclude_user_ids,
            limit,
        };

        let candidates = match self.profiles.list_candidates(&query).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(
                    "Failed to list {:?} candidates for {}, skipping tier: {}",
                    filter,
                    requester.user_id,
                    e
                );
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|c| !query.exclude_user_ids.contains(&c.user_id) && seen.insert(c.user_id))
            .take(limit)
            .collect()
    }

    /// One batched catalog lookup for every shared course across all selections
    async fn resolve_names(&self, selections: &[Selection]) -> HashMap<CourseId, String> {
        let mut course_ids: Vec<CourseId> = selections
            .iter()
            .flat_map(|s| s.common.iter().copied())
            .collect();
        course_ids.sort();
        course_ids.dedup();

        if course_ids.is_empty() {
            return HashMap::new();
        }

        match self.catalog.get_course_display_names(&course_ids).await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!("Course catalog lookup failed, omitting course names: {}", e);
                HashMap::new()
            }
        }
    }

    fn to_match_result(&self, selection: Selection, names: &HashMap<CourseId, String>) -> MatchResult {
        let mut common_courses =
            resolve_display_names(&selection.common, names, self.policy.max_common_courses);

        if common_courses.is_empty() {
            match selection.tier {
                MatchTier::Primary => {}
                MatchTier::Major => common_courses.push(MAJOR_PLACEHOLDER.to_string()),
                MatchTier::Campus => common_courses.push(CAMPUS_PLACEHOLDER.to_string()),
            }
        }

        MatchResult {
            candidate: selection.candidate,
            common_courses,
            compatibility: selection.score,
            same_major: selection.flags.same_major,
            same_dining: selection.flags.same_dining,
            same_study_location: selection.flags.same_study_location,
            tier: selection.tier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Course, StudyStyle};
    use crate::services::memory::InMemoryStore;
    use crate::services::StoreError;
    use async_trait::async_trait;

    fn create_student(id: i64, style: StudyStyle, major: i64, courses: &[i64]) -> UserProfile {
        let mut profile = UserProfile::new(UserId(id), format!("Student {}", id));
        profile.campus_id = Some(1);
        profile.major_id = Some(major);
        profile.study_style = Some(style);
        profile.courses = courses.iter().map(|&c| CourseId(c)).collect();
        profile
    }

    fn create_course(id: i64, name: &str) -> Course {
        Course {
            course_id: CourseId(id),
            course_number: format!("C{}", id),
            course_name: name.to_string(),
            subject: "CS".to_string(),
            credits: 3,
        }
    }

    fn matcher_for(store: InMemoryStore) -> Matcher {
        let store = Arc::new(store);
        Matcher::with_default_policy(store.clone(), store).with_random_seed(Some(42))
    }

    /// Store whose candidate listing always fails
    struct BrokenCandidates(InMemoryStore);

    #[async_trait]
    impl ProfileStore for BrokenCandidates {
        async fn get_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, StoreError> {
            self.0.get_profile(user_id).await
        }

        async fn list_candidates(&self, _query: &CandidateQuery) -> Result<Vec<UserProfile>, StoreError> {
            Err(StoreError::NotFound("candidates".to_string()))
        }
    }

    /// Store that records each candidate query's filter, limit and result size
    struct RecordingStore {
        inner: InMemoryStore,
        queries: std::sync::Mutex<Vec<(TierFilter, usize, usize)>>,
    }

    impl RecordingStore {
        fn new(inner: InMemoryStore) -> Self {
            Self {
                inner,
                queries: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn queries(&self) -> Vec<(TierFilter, usize, usize)> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProfileStore for RecordingStore {
        async fn get_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, StoreError> {
            self.inner.get_profile(user_id).await
        }

        async fn list_candidates(&self, query: &CandidateQuery) -> Result<Vec<UserProfile>, StoreError> {
            let candidates = self.inner.list_candidates(query).await?;
            self.queries
                .lock()
                .unwrap()
                .push((query.filter, query.limit, candidates.len()));
            Ok(candidates)
        }
    }

    async fn rank_recorded(students: Vec<UserProfile>) -> (Vec<MatchResult>, Vec<(TierFilter, usize, usize)>) {
        let inner = InMemoryStore::new().with_profiles(students);
        let store = Arc::new(RecordingStore::new(inner));
        let catalog = Arc::new(InMemoryStore::new());
        let matches = Matcher::with_default_policy(store.clone(), catalog)
            .with_random_seed(Some(42))
            .rank_matches(UserId(1))
            .await;
        (matches, store.queries())
    }

    #[tokio::test]
    async fn test_eight_primary_matches_skip_major_tier() {
        let mut students = vec![create_student(1, StudyStyle::Quiet, 10, &[101])];
        students.extend((2..=10).map(|id| create_student(id, StudyStyle::Quiet, 20, &[101])));
        students.extend((11..=15).map(|id| create_student(id, StudyStyle::Group, 10, &[])));

        let (matches, queries) = rank_recorded(students).await;

        assert_eq!(queries, vec![(TierFilter::SameStudyStyle(StudyStyle::Quiet), 15, 9)]);
        assert_eq!(matches.len(), 8);
        assert!(matches.iter().all(|m| m.tier == MatchTier::Primary));
    }

    #[tokio::test]
    async fn test_major_tier_capped_and_campus_tier_skipped() {
        let mut students = vec![create_student(1, StudyStyle::Quiet, 10, &[101])];
        // Four primary matches with a different major
        students.extend((2..=5).map(|id| create_student(id, StudyStyle::Quiet, 20, &[101])));
        // Ten major-mates, only 12 - 4 = 8 may be taken
        students.extend((6..=15).map(|id| create_student(id, StudyStyle::Group, 10, &[])));
        // Campus-only students that must never be reached
        students.extend((16..=25).map(|id| create_student(id, StudyStyle::Group, 30, &[])));

        let (matches, queries) = rank_recorded(students).await;

        assert_eq!(
            queries,
            vec![
                (TierFilter::SameStudyStyle(StudyStyle::Quiet), 15, 4),
                (TierFilter::SameMajor(10), 8, 8),
            ]
        );
        assert_eq!(matches.len(), 8);
        assert!(matches.iter().all(|m| m.tier != MatchTier::Campus));
        assert!(matches.iter().all(|m| m.candidate.user_id.0 <= 15));
    }

    #[tokio::test]
    async fn test_six_matches_skip_campus_tier() {
        let mut students = vec![create_student(1, StudyStyle::Quiet, 10, &[101])];
        students.extend((2..=5).map(|id| create_student(id, StudyStyle::Quiet, 20, &[101])));
        students.extend((6..=7).map(|id| create_student(id, StudyStyle::Group, 10, &[])));
        students.extend((8..=20).map(|id| create_student(id, StudyStyle::Group, 30, &[])));

        let (matches, queries) = rank_recorded(students).await;

        assert_eq!(queries.len(), 2);
        assert_eq!(queries[1], (TierFilter::SameMajor(10), 8, 2));
        assert_eq!(matches.len(), 6);
        assert!(matches.iter().all(|m| m.tier != MatchTier::Campus));
    }

    #[tokio::test]
    async fn test_campus_tier_capped_at_target_minus_count() {
        let mut students = vec![create_student(1, StudyStyle::Quiet, 10, &[101])];
        // No one shares the style; two major-mates
        students.extend((2..=3).map(|id| create_student(id, StudyStyle::Group, 10, &[])));
        students.extend((4..=18).map(|id| create_student(id, StudyStyle::Discussion, 30, &[101])));

        let (matches, queries) = rank_recorded(students).await;

        assert_eq!(
            queries,
            vec![
                (TierFilter::SameStudyStyle(StudyStyle::Quiet), 15, 0),
                (TierFilter::SameMajor(10), 12, 2),
                (TierFilter::AnyOnCampus, 8, 8),
            ]
        );
        // Ten selected, truncated to the result limit
        assert_eq!(matches.len(), 8);
        let ids: HashSet<_> = matches.iter().map(|m| m.candidate.user_id).collect();
        assert_eq!(ids.len(), 8);
    }

    #[tokio::test]
    async fn test_primary_tier_scores_overlap() {
        let store = InMemoryStore::new()
            .with_courses(vec![create_course(101, "Calculus I"), create_course(102, "Mechanics")])
            .with_profiles(vec![
                create_student(1, StudyStyle::Quiet, 10, &[101, 102]),
                create_student(2, StudyStyle::Quiet, 20, &[101]),
            ]);

        let matches = matcher_for(store).rank_matches(UserId(1)).await;

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].tier, MatchTier::Primary);
        assert_eq!(matches[0].compatibility, 50.0);
        assert_eq!(matches[0].common_courses, vec!["Calculus I"]);
        assert!(!matches[0].same_major);
    }

    #[tokio::test]
    async fn test_primary_skips_empty_overlap() {
        let store = InMemoryStore::new().with_profiles(vec![
            create_student(1, StudyStyle::Quiet, 10, &[101]),
            create_student(2, StudyStyle::Quiet, 20, &[999]),
        ]);

        // Different major and no shared course: only the campus tier can pick it up
        let matches = matcher_for(store).rank_matches(UserId(1)).await;

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].tier, MatchTier::Campus);
        assert_eq!(matches[0].common_courses, vec![CAMPUS_PLACEHOLDER]);
    }

    #[tokio::test]
    async fn test_major_tier_forces_flag_and_placeholder() {
        let store = InMemoryStore::new().with_profiles(vec![
            create_student(1, StudyStyle::Quiet, 10, &[101]),
            create_student(2, StudyStyle::Group, 10, &[]),
        ]);

        let matches = matcher_for(store).rank_matches(UserId(1)).await;

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].tier, MatchTier::Major);
        assert!(matches[0].same_major);
        assert_eq!(matches[0].common_courses, vec![MAJOR_PLACEHOLDER]);
        assert!((65.0..=85.0).contains(&matches[0].compatibility));
    }

    #[tokio::test]
    async fn test_primary_match_not_repeated_in_backup_tiers() {
        let store = InMemoryStore::new()
            .with_courses(vec![create_course(101, "Calculus I")])
            .with_profiles(vec![
                create_student(1, StudyStyle::Quiet, 10, &[101]),
                create_student(2, StudyStyle::Quiet, 10, &[101]),
            ]);

        let matches = matcher_for(store).rank_matches(UserId(1)).await;

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].tier, MatchTier::Primary);
        // 100 overlap + 20 major, clamped
        assert_eq!(matches[0].compatibility, 100.0);
    }

    #[tokio::test]
    async fn test_unknown_requester_yields_empty() {
        let store = InMemoryStore::new().with_profiles(vec![create_student(2, StudyStyle::Quiet, 10, &[1])]);
        assert!(matcher_for(store).rank_matches(UserId(99)).await.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_degrades_to_empty() {
        let inner = InMemoryStore::new().with_profiles(vec![
            create_student(1, StudyStyle::Quiet, 10, &[101]),
            create_student(2, StudyStyle::Quiet, 10, &[101]),
        ]);
        let catalog = Arc::new(InMemoryStore::new());
        let matcher = Matcher::with_default_policy(Arc::new(BrokenCandidates(inner)), catalog);

        assert!(matcher.rank_matches(UserId(1)).await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_catalog_entry_omitted() {
        let store = InMemoryStore::new()
            .with_courses(vec![create_course(101, "Calculus I")])
            .with_profiles(vec![
                create_student(1, StudyStyle::Quiet, 10, &[101, 102]),
                create_student(2, StudyStyle::Quiet, 20, &[101, 102]),
            ]);

        let matches = matcher_for(store).rank_matches(UserId(1)).await;

        assert_eq!(matches[0].compatibility, 100.0);
        assert_eq!(matches[0].common_courses, vec!["Calculus I"]);
    }

    #[tokio::test]
    async fn test_ties_keep_selection_order() {
        let store = InMemoryStore::new().with_profiles(vec![
            create_student(1, StudyStyle::Quiet, 10, &[101, 102]),
            create_student(5, StudyStyle::Quiet, 20, &[102]),
            create_student(3, StudyStyle::Quiet, 20, &[101]),
            create_student(4, StudyStyle::Quiet, 20, &[101]),
        ]);

        let matches = matcher_for(store).rank_matches(UserId(1)).await;
        let ids: Vec<i64> = matches.iter().map(|m| m.candidate.user_id.0).collect();

        assert_eq!(ids, vec![3, 4, 5]);
    }
}
