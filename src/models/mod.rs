// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    BonusWeights, CampusId, CandidateQuery, Course, CourseId, DiningHallId, MajorId, MatchResult,
    MatchTier, NewCourse, RankingPolicy, StudyLocationId, StudyStyle, TierFilter, UserId, UserProfile,
};
pub use requests::FindMatchesRequest;
pub use responses::{ErrorResponse, FindMatchesResponse, HealthResponse, ProfileCourse, ProfileResponse};
