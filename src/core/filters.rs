use crate::models::{CampusId, CandidateQuery, TierFilter, UserProfile};

/// Which bonus conditions hold between a requester and a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BonusFlags {
    pub same_major: bool,
    pub same_dining: bool,
    pub same_study_location: bool,
}

/// Two attributes are "the same" only when both are known and equal
#[inline]
pub fn same_attribute<T: PartialEq>(a: Option<T>, b: Option<T>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

/// Compute the bonus flags from real attribute equality
#[inline]
pub fn bonus_flags(requester: &UserProfile, candidate: &UserProfile) -> BonusFlags {
    BonusFlags {
        same_major: same_attribute(requester.major_id, candidate.major_id),
        same_dining: same_attribute(requester.dining_hall_id, candidate.dining_hall_id),
        same_study_location: same_attribute(requester.study_location_id, candidate.study_location_id),
    }
}

/// Campus scoping: with no campus on the requester, everyone is in scope
#[inline]
pub fn is_on_campus(profile: &UserProfile, campus_id: Option<CampusId>) -> bool {
    match campus_id {
        Some(campus) => profile.campus_id == Some(campus),
        None => true,
    }
}

/// Check a profile against a tier predicate
#[inline]
pub fn matches_tier_filter(profile: &UserProfile, filter: &TierFilter) -> bool {
    match *filter {
        TierFilter::SameStudyStyle(style) => profile.study_style == Some(style),
        TierFilter::SameMajor(major) => profile.major_id == Some(major),
        TierFilter::AnyOnCampus => true,
    }
}

/// Check if a profile satisfies every constraint of a candidate query
#[inline]
pub fn matches_candidate_query(profile: &UserProfile, query: &CandidateQuery) -> bool {
    if query.exclude_user_ids.contains(&profile.user_id) {
        return false;
    }

    is_on_campus(profile, query.campus_id) && matches_tier_filter(profile, &query.filter)
}

/// Tier-1 predicate; `None` when the requester has no study style to share
pub fn primary_filter(requester: &UserProfile) -> Option<TierFilter> {
    requester.study_style.map(TierFilter::SameStudyStyle)
}

/// Tier-2 predicate; `None` when the requester has no major
pub fn major_filter(requester: &UserProfile) -> Option<TierFilter> {
    requester.major_id.map(TierFilter::SameMajor)
}
