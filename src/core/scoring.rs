use crate::core::{filters::BonusFlags, overlap::overlap_ratio};
use crate::models::BonusWeights;
use rand::Rng;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// Calculate the primary compatibility score (0-100)
///
/// Scoring formula:
/// score = clamp(
///     shared_courses / max(requester_courses, 1) * 100
///     + same_major_bonus            # +20 by default
///     + same_dining_bonus           # +10 by default
///     + same_study_location_bonus   # +15 by default
/// , 0, 100)
pub fn calculate_primary_score(
    common_count: usize,
    requester_course_count: usize,
    flags: &BonusFlags,
    bonuses: &BonusWeights,
) -> f64 {
    let mut score = overlap_ratio(common_count, requester_course_count) * 100.0;

    if flags.same_major {
        score += bonuses.same_major;
    }
    if flags.same_dining {
        score += bonuses.same_dining;
    }
    if flags.same_study_location {
        score += bonuses.same_study_location;
    }

    clamp_score(score)
}

/// Draw a backup-tier score uniformly from an inclusive integer range
///
/// A reversed range is treated as if its bounds were swapped.
pub fn sample_backup_score<R: Rng + ?Sized>(rng: &mut R, range: (u32, u32)) -> f64 {
    let (low, high) = if range.0 <= range.1 { range } else { (range.1, range.0) };
    clamp_score(rng.gen_range(low..=high) as f64)
}

#[inline]
pub fn clamp_score(score: f64) -> f64 {
    score.clamp(MIN_SCORE, MAX_SCORE)
}
