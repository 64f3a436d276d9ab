//! Data models for the participation checker.
//!
//! Wire records mirror the Canvas REST payloads. Every field is optional at
//! this boundary; the normalizer decides how absent values are rendered.
//! `StudentRecord` is the canonical, typed row the rest of the pipeline uses.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Rendered in place of a missing last-activity timestamp.
pub const NEVER: &str = "Nunca";

/// Display format for timestamps in reports.
pub const TIMESTAMP_DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Canvas user embedded in an enrollment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct User {
    pub id: Option<u64>,
    /// "Family names, Given names".
    pub sortable_name: Option<String>,
    /// Institutional identifier (RUT with check digit, without separator).
    pub sis_user_id: Option<String>,
    pub login_id: Option<String>,
}

/// A student's membership in one course.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Enrollment {
    #[serde(default)]
    pub user: User,
    pub user_id: Option<u64>,
    pub created_at: Option<String>,
    pub last_activity_at: Option<String>,
    /// Seconds.
    pub total_activity_time: Option<u64>,
}

/// A gradable task within a course.
#[derive(Debug, Clone, Deserialize)]
pub struct Assignment {
    pub id: Option<u64>,
    pub name: Option<String>,
}

/// A student's delivery record for one assignment.
#[derive(Debug, Clone, Deserialize)]
pub struct Submission {
    pub user_id: Option<u64>,
    pub workflow_state: Option<String>,
    /// Canvas sends grades as strings ("8.5", "complete") or numbers.
    pub grade: Option<Value>,
}

/// Course metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct Course {
    pub name: Option<String>,
    pub account_id: Option<u64>,
}

/// Sub-account (program) owning a course.
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub name: Option<String>,
}

/// Canonical per-course, per-student row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentRecord {
    /// Join key for delivery flags. Never exported.
    #[serde(skip)]
    pub internal_id: Option<u64>,
    pub given_names: String,
    pub family_names: String,
    pub national_id: Option<String>,
    pub email: Option<String>,
    pub enrolled_at: Option<NaiveDateTime>,
    pub last_activity_at: Option<NaiveDateTime>,
    pub has_participated: bool,
    pub total_activity_duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_name: Option<String>,
}

impl StudentRecord {
    /// Enrollment timestamp as shown in reports, or empty.
    pub fn display_enrolled_at(&self) -> String {
        self.enrolled_at
            .map(|ts| ts.format(TIMESTAMP_DISPLAY_FORMAT).to_string())
            .unwrap_or_default()
    }

    /// Last activity as shown in reports; absence renders as [`NEVER`].
    ///
    /// A present-but-unparseable wire value still counts as participation,
    /// so it renders as empty rather than as the sentinel.
    pub fn display_last_activity(&self) -> String {
        match self.last_activity_at {
            Some(ts) => ts.format(TIMESTAMP_DISPLAY_FORMAT).to_string(),
            None if self.has_participated => String::new(),
            None => NEVER.to_string(),
        }
    }
}

/// Metadata about one generated report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Canvas API root the data came from.
    pub base_url: String,
    pub generated_at: DateTime<Utc>,
    /// Course ids as requested.
    pub requested_courses: Vec<String>,
    pub courses_reported: usize,
    pub courses_skipped: usize,
    /// Retrieval and aggregation time in seconds.
    pub duration_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record() -> StudentRecord {
        StudentRecord {
            internal_id: Some(7),
            given_names: "Ana".to_string(),
            family_names: "Soto".to_string(),
            national_id: None,
            email: None,
            enrolled_at: None,
            last_activity_at: None,
            has_participated: false,
            total_activity_duration: None,
            course_name: None,
            program_name: None,
        }
    }

    #[test]
    fn test_enrollment_tolerates_missing_fields() {
        let enrollment: Enrollment = serde_json::from_str(r#"{"created_at": null}"#).unwrap();
        assert!(enrollment.user.sortable_name.is_none());
        assert!(enrollment.last_activity_at.is_none());
    }

    #[test]
    fn test_unread_wire_fields_are_ignored() {
        let course: Course =
            serde_json::from_str(r#"{"id": 5, "name": "Cálculo I", "account_id": 77}"#).unwrap();
        assert_eq!(course.name.as_deref(), Some("Cálculo I"));
        assert_eq!(course.account_id, Some(77));

        let account: Account = serde_json::from_str(r#"{"id": 77, "name": "Diplomado"}"#).unwrap();
        assert_eq!(account.name.as_deref(), Some("Diplomado"));

        let enrollment: Enrollment = serde_json::from_str(
            r#"{"user": {"id": 1, "name": "Ana Soto", "sortable_name": "Soto, Ana"}}"#,
        )
        .unwrap();
        assert_eq!(enrollment.user.id, Some(1));
        assert_eq!(enrollment.user.sortable_name.as_deref(), Some("Soto, Ana"));
    }

    #[test]
    fn test_submission_null_grade_is_absent() {
        let submission: Submission =
            serde_json::from_str(r#"{"user_id": 1, "workflow_state": "graded", "grade": null}"#)
                .unwrap();
        assert!(submission.grade.is_none());
    }

    #[test]
    fn test_last_activity_never_sentinel() {
        let mut rec = record();
        assert_eq!(rec.display_last_activity(), NEVER);

        rec.has_participated = true;
        rec.last_activity_at = NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(10, 0, 0));
        assert_eq!(rec.display_last_activity(), "2024-03-01 10:00:00");
    }

    #[test]
    fn test_internal_id_not_serialized() {
        let json = serde_json::to_string(&record()).unwrap();
        assert!(!json.contains("internal_id"));
        assert!(json.contains("\"given_names\":\"Ana\""));
    }
}
