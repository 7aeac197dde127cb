use crate::models::NewCourse;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Longest course title kept from the feed
pub const MAX_TITLE_LEN: usize = 200;

/// Errors that can occur when importing the course catalog
#[derive(Debug, Error)]
pub enum CatalogImportError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Failed to read course file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Client for the Purdue.io OData course feed
pub struct PurdueCatalogClient {
    base_url: String,
    client: Client,
}

impl PurdueCatalogClient {
    pub fn new(base_url: String, timeout_secs: u64) -> Result<Self, CatalogImportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self { base_url, client })
    }

    /// Fetch up to `limit` courses, optionally restricted to one subject abbreviation
    pub async fn fetch_courses(
        &self,
        limit: usize,
        subject: Option<&str>,
    ) -> Result<Vec<NewCourse>, CatalogImportError> {
        let mut url = format!(
            "{}/Courses?$expand=Subject&$top={}",
            self.base_url.trim_end_matches('/'),
            limit
        );
        if let Some(subject) = subject {
            let filter = format!("Subject/Abbreviation eq '{}'", subject.replace('\'', "''"));
            url.push_str("&$filter=");
            url.push_str(&urlencoding::encode(&filter));
        }

        tracing::debug!("Fetching courses from: {}", url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(CatalogImportError::ApiError(format!(
                "Failed to fetch courses: {}",
                response.status()
            )));
        }

        let json: Value = response.json().await?;
        let courses = parse_course_feed(&json, limit)?;

        tracing::info!("Fetched {} courses from catalog feed", courses.len());
        Ok(courses)
    }
}

/// Parse an OData course feed document (`{"value": [...]}`)
///
/// Entries without a usable number, duplicates and `UNKNOWN` numbers are
/// skipped. Titles are truncated to [`MAX_TITLE_LEN`] characters.
pub fn parse_course_feed(json: &Value, limit: usize) -> Result<Vec<NewCourse>, CatalogImportError> {
    let entries = json
        .get("value")
        .and_then(|v| v.as_array())
        .ok_or_else(|| CatalogImportError::InvalidResponse("Missing value array".into()))?;

    let mut seen = HashSet::new();
    let mut courses = Vec::new();

    for entry in entries.iter().take(limit) {
        let number = entry
            .get("Number")
            .and_then(|n| n.as_str())
            .unwrap_or("UNKNOWN")
            .trim();
        if number == "UNKNOWN" || number.is_empty() || !seen.insert(number.to_string()) {
            continue;
        }

        let title = entry
            .get("Title")
            .and_then(|t| t.as_str())
            .unwrap_or("Unknown Course");
        let subject = entry
            .get("Subject")
            .and_then(|s| s.get("Abbreviation"))
            .and_then(|a| a.as_str())
            .unwrap_or("UNK");
        let credits = entry
            .get("CreditHours")
            .and_then(|c| c.as_f64())
            .filter(|c| *c >= 1.0)
            .map(|c| c as i32)
            .unwrap_or(3);

        courses.push(NewCourse {
            course_number: number.to_string(),
            course_name: title.chars().take(MAX_TITLE_LEN).collect(),
            subject: subject.to_string(),
            credits,
        });
    }

    Ok(courses)
}

/// Load a course feed previously saved to disk
pub fn load_course_file<P: AsRef<Path>>(path: P, limit: usize) -> Result<Vec<NewCourse>, CatalogImportError> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    let json: Value = serde_json::from_str(&raw)
        .map_err(|e| CatalogImportError::InvalidResponse(format!("Failed to parse course file: {}", e)))?;
    parse_course_feed(&json, limit)
}

/// Core courses always present in the catalog
pub fn fallback_courses() -> Vec<NewCourse> {
    [
        ("CS180", "Problem Solving And Object-Oriented Programming", "CS"),
        ("CS240", "Programming in C", "CS"),
        ("CS251", "Data Structures and Algorithms", "CS"),
        ("MA161", "Plane Analytic Geometry And Calculus I", "MA"),
        ("PHYS172", "Modern Mechanics", "PHYS"),
        ("CHEM115", "General Chemistry", "CHEM"),
        ("ENGL106", "First-Year Composition", "ENGL"),
        ("ECON251", "Microeconomics", "ECON"),
    ]
    .into_iter()
    .map(|(number, name, subject)| NewCourse {
        course_number: number.to_string(),
        course_name: name.to_string(),
        subject: subject.to_string(),
        credits: 3,
    })
    .collect()
}

/// Append every fallback course whose number was not imported
pub fn with_fallback_courses(mut courses: Vec<NewCourse>) -> Vec<NewCourse> {
    let present: HashSet<String> = courses.iter().map(|c| c.course_number.clone()).collect();
    courses.extend(
        fallback_courses()
            .into_iter()
            .filter(|c| !present.contains(&c.course_number)),
    );
    courses
}
