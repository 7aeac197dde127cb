// Core algorithm exports
pub mod filters;
pub mod matcher;
pub mod overlap;
pub mod scoring;

pub use filters::{bonus_flags, matches_candidate_query, matches_tier_filter, BonusFlags};
pub use matcher::{Matcher, CAMPUS_PLACEHOLDER, MAJOR_PLACEHOLDER};
pub use overlap::{common_courses, overlap_ratio, resolve_display_names};
pub use scoring::{calculate_primary_score, sample_backup_score};
