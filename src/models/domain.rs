use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Opaque user identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque course identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseId(pub i64);

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type CampusId = i64;
pub type MajorId = i64;
pub type DiningHallId = i64;
pub type StudyLocationId = i64;

/// How a student prefers to study
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudyStyle {
    Quiet,
    Discussion,
    #[serde(alias = "collaborative")]
    Group,
}

impl StudyStyle {
    pub const ALL: [StudyStyle; 3] = [StudyStyle::Quiet, StudyStyle::Discussion, StudyStyle::Group];

    pub fn as_str(&self) -> &'static str {
        match self {
            StudyStyle::Quiet => "quiet",
            StudyStyle::Discussion => "discussion",
            StudyStyle::Group => "group",
        }
    }

    /// Parse a stored style, accepting the legacy `collaborative` spelling
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "quiet" => Some(StudyStyle::Quiet),
            "discussion" => Some(StudyStyle::Discussion),
            "group" | "collaborative" => Some(StudyStyle::Group),
            _ => None,
        }
    }
}

/// Student profile as read by the ranker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    pub name: String,
    #[serde(rename = "campusId", default)]
    pub campus_id: Option<CampusId>,
    #[serde(rename = "majorId", default)]
    pub major_id: Option<MajorId>,
    #[serde(rename = "studyStyle", default)]
    pub study_style: Option<StudyStyle>,
    #[serde(rename = "diningHallId", default)]
    pub dining_hall_id: Option<DiningHallId>,
    #[serde(rename = "studyLocationId", default)]
    pub study_location_id: Option<StudyLocationId>,
    #[serde(default)]
    pub gpa: Option<f32>,
    /// Enrolled courses. Ordered so overlap iteration is deterministic.
    #[serde(default)]
    pub courses: BTreeSet<CourseId>,
}

impl UserProfile {
    /// Bare profile with only identity and name set
    pub fn new(user_id: UserId, name: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            campus_id: None,
            major_id: None,
            study_style: None,
            dining_hall_id: None,
            study_location_id: None,
            gpa: None,
            courses: BTreeSet::new(),
        }
    }
}

/// Catalog course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    #[serde(rename = "courseId")]
    pub course_id: CourseId,
    #[serde(rename = "courseNumber")]
    pub course_number: String,
    #[serde(rename = "courseName")]
    pub course_name: String,
    pub subject: String,
    #[serde(default = "default_credits")]
    pub credits: i32,
}

fn default_credits() -> i32 { 3 }

/// Course not yet assigned an ID by a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCourse {
    #[serde(rename = "courseNumber")]
    pub course_number: String,
    #[serde(rename = "courseName")]
    pub course_name: String,
    pub subject: String,
    #[serde(default = "default_credits")]
    pub credits: i32,
}

impl NewCourse {
    pub fn into_course(self, course_id: CourseId) -> Course {
        Course {
            course_id,
            course_number: self.course_number,
            course_name: self.course_name,
            subject: self.subject,
            credits: self.credits,
        }
    }
}

/// Which acquisition tier produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTier {
    Primary,
    Major,
    Campus,
}

/// One ranked study-buddy candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub candidate: UserProfile,
    #[serde(rename = "commonCourses")]
    pub common_courses: Vec<String>,
    pub compatibility: f64,
    #[serde(rename = "sameMajor")]
    pub same_major: bool,
    #[serde(rename = "sameDining")]
    pub same_dining: bool,
    #[serde(rename = "sameStudyLocation")]
    pub same_study_location: bool,
    pub tier: MatchTier,
}

/// Candidate predicate applied on top of campus scoping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierFilter {
    SameStudyStyle(StudyStyle),
    SameMajor(MajorId),
    AnyOnCampus,
}

/// Candidate query parameters
#[derive(Debug, Clone)]
pub struct CandidateQuery {
    /// `None` disables campus scoping
    pub campus_id: Option<CampusId>,
    pub filter: TierFilter,
    pub exclude_user_ids: Vec<UserId>,
    pub limit: usize,
}

/// Flat bonuses added to the primary overlap score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BonusWeights {
    pub same_major: f64,
    pub same_dining: f64,
    pub same_study_location: f64,
}

impl Default for BonusWeights {
    fn default() -> Self {
        Self {
            same_major: 20.0,
            same_dining: 10.0,
            same_study_location: 15.0,
        }
    }
}

/// Limits and ranges governing the tiered acquisition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingPolicy {
    pub bonuses: BonusWeights,
    pub primary_limit: usize,
    /// Major tier runs while fewer than this many matches exist
    pub major_threshold: usize,
    pub major_target: usize,
    /// Campus tier runs while fewer than this many matches exist
    pub campus_threshold: usize,
    pub campus_target: usize,
    pub result_limit: usize,
    pub max_common_courses: usize,
    pub major_score_range: (u32, u32),
    pub campus_score_range: (u32, u32),
}

impl Default for RankingPolicy {
    fn default() -> Self {
        Self {
            bonuses: BonusWeights::default(),
            primary_limit: 15,
            major_threshold: 8,
            major_target: 12,
            campus_threshold: 6,
            campus_target: 10,
            result_limit: 8,
            max_common_courses: 3,
            major_score_range: (65, 85),
            campus_score_range: (45, 75),
        }
    }
}
