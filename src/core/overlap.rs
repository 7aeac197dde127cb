use crate::models::CourseId;
use std::collections::{BTreeSet, HashMap};

/// Courses both students are enrolled in, in ascending course ID order
#[inline]
pub fn common_courses(requester: &BTreeSet<CourseId>, candidate: &BTreeSet<CourseId>) -> Vec<CourseId> {
    requester.intersection(candidate).copied().collect()
}

/// Share of the requester's courses that the candidate also takes (0-1)
///
/// The denominator is the requester's own course count, so the measure is
/// asymmetric: A's ratio for B can differ from B's ratio for A.
#[inline]
pub fn overlap_ratio(common_count: usize, requester_course_count: usize) -> f64 {
    common_count as f64 / requester_course_count.max(1) as f64
}

/// Resolve display names for shared courses
///
/// Course IDs without a catalog entry are skipped. At most `max` names are returned.
pub fn resolve_display_names(
    common: &[CourseId],
    names: &HashMap<CourseId, String>,
    max: usize,
) -> Vec<String> {
    common
        .iter()
        .filter_map(|id| names.get(id).cloned())
        .take(max)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[i64]) -> BTreeSet<CourseId> {
        ids.iter().map(|&id| CourseId(id)).collect()
    }

    #[test]
    fn test_common_courses_sorted() {
        let common = common_courses(&set(&[5, 1, 9, 3]), &set(&[9, 3, 4]));
        assert_eq!(common, vec![CourseId(3), CourseId(9)]);
    }

    #[test]
    fn test_common_courses_empty() {
        assert!(common_courses(&set(&[]), &set(&[1, 2])).is_empty());
        assert!(common_courses(&set(&[1]), &set(&[2])).is_empty());
    }

    #[test]
    fn test_overlap_ratio() {
        assert_eq!(overlap_ratio(1, 2), 0.5);
        assert_eq!(overlap_ratio(3, 3), 1.0);
        // No courses never divides by zero
        assert_eq!(overlap_ratio(0, 0), 0.0);
    }

    #[test]
    fn test_missing_catalog_entry_is_skipped() {
        let mut names = HashMap::new();
        names.insert(CourseId(1), "Calculus I".to_string());
        names.insert(CourseId(3), "Modern Mechanics".to_string());

        let resolved = resolve_display_names(&[CourseId(1), CourseId(2), CourseId(3)], &names, 3);
        assert_eq!(resolved, vec!["Calculus I", "Modern Mechanics"]);
    }

    #[test]
    fn test_display_names_bounded() {
        let names: HashMap<CourseId, String> =
            (1..=5).map(|i| (CourseId(i), format!("Course {}", i))).collect();
        let common: Vec<CourseId> = (1..=5).map(CourseId).collect();

        let resolved = resolve_display_names(&common, &names, 3);
        assert_eq!(resolved, vec!["Course 1", "Course 2", "Course 3"]);
    }
}
