use serde::{Deserialize, Serialize};
use crate::models::domain::{MatchResult, UserProfile};

/// Response for find matches endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindMatchesResponse {
    pub matches: Vec<MatchResult>,
    #[serde(rename = "totalResults")]
    pub total_results: usize,
}

/// Course as shown on a profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileCourse {
    #[serde(rename = "courseId")]
    pub course_id: i64,
    #[serde(rename = "courseName")]
    pub course_name: String,
}

/// Response for the profile endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub profile: UserProfile,
    pub courses: Vec<ProfileCourse>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
