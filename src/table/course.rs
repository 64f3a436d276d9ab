//! Per-course table construction.
//!
//! Students are joined to assignment delivery flags through the Canvas user
//! id, which never leaves this module's output as a visible column.

use crate::models::{Account, Assignment, Course, Enrollment, StudentRecord, Submission};
use crate::normalize::{fold, normalize_enrollment};
use crate::table::merge::{MinimalRow, MinimalTable};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

/// Marker excluded from delivery columns unless configured otherwise.
pub const DEFAULT_EXCLUDE_MARKERS: &[&str] = &["autoevaluacion"];

/// One delivery column of a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentColumn {
    pub id: u64,
    pub name: String,
}

/// A student with one delivery flag per course assignment column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentRow {
    #[serde(flatten)]
    pub record: StudentRecord,
    pub delivered: Vec<bool>,
}

/// Participants versus non-participants of one course.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParticipationCounts {
    pub participants: usize,
    pub non_participants: usize,
}

/// All students of one course with their delivery flags.
#[derive(Debug, Clone, Serialize)]
pub struct CourseTable {
    pub course_id: String,
    pub course_name: String,
    pub account_id: Option<u64>,
    pub account_name: String,
    pub assignments: Vec<AssignmentColumn>,
    pub rows: Vec<StudentRow>,
}

impl CourseTable {
    pub fn participation(&self) -> ParticipationCounts {
        let participants = self
            .rows
            .iter()
            .filter(|row| row.record.has_participated)
            .count();
        ParticipationCounts {
            participants,
            non_participants: self.rows.len() - participants,
        }
    }

    /// Identity columns plus delivery flags, for the cross-course summary.
    pub fn minimal(&self) -> MinimalTable {
        MinimalTable {
            course_name: self.course_name.clone(),
            columns: self.assignments.iter().map(|a| a.name.clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| MinimalRow {
                    given_names: row.record.given_names.clone(),
                    family_names: row.record.family_names.clone(),
                    values: row.delivered.clone(),
                })
                .collect(),
        }
    }
}

/// An assignment together with its fetched submissions.
///
/// A failed submissions fetch is represented by an empty list, which makes
/// every flag of the column "not delivered".
#[derive(Debug, Clone)]
pub struct AssignmentSubmissions {
    pub column: AssignmentColumn,
    pub submissions: Vec<Submission>,
}

/// Whether an assignment name carries one of the exclusion markers.
///
/// Comparison is accent- and case-insensitive.
pub fn is_excluded_assignment(name: &str, markers: &[String]) -> bool {
    let folded = fold(name);
    markers
        .iter()
        .any(|marker| folded.contains(fold(marker).as_str()))
}

/// Keep assignments with an id that are not excluded by name.
pub fn filter_assignments(assignments: &[Assignment], markers: &[String]) -> Vec<AssignmentColumn> {
    assignments
        .iter()
        .filter_map(|assignment| {
            let id = assignment.id?;
            let name = assignment.name.clone().unwrap_or_default();
            if is_excluded_assignment(&name, markers) {
                None
            } else {
                Some(AssignmentColumn { id, name })
            }
        })
        .collect()
}

/// Delivery rule for one submission.
///
/// Only `submitted` and `graded` states count. A numeric grade must be
/// positive; an absent or non-numeric grade counts as delivered.
pub fn is_delivered(submission: &Submission) -> bool {
    let state_ok = matches!(
        submission.workflow_state.as_deref(),
        Some("submitted") | Some("graded")
    );
    if !state_ok {
        return false;
    }

    match submission.grade.as_ref().map(numeric_grade) {
        None => true,
        Some(Some(value)) => value > 0.0,
        Some(None) => true,
    }
}

fn numeric_grade(grade: &Value) -> Option<f64> {
    match grade {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// User ids with at least one delivered submission.
pub fn delivered_set(submissions: &[Submission]) -> HashSet<u64> {
    submissions
        .iter()
        .filter(|s| is_delivered(s))
        .filter_map(|s| s.user_id)
        .collect()
}

/// Build the table for one course.
pub fn build_course_table(
    course_id: &str,
    course: &Course,
    account: &Account,
    enrollments: &[Enrollment],
    assignments: Vec<AssignmentSubmissions>,
) -> CourseTable {
    let delivered: Vec<HashSet<u64>> = assignments
        .iter()
        .map(|a| delivered_set(&a.submissions))
        .collect();

    let rows = enrollments
        .iter()
        .map(|enrollment| {
            let record = normalize_enrollment(enrollment, Some(course), Some(account));
            let flags = delivered
                .iter()
                .map(|set| record.internal_id.is_some_and(|id| set.contains(&id)))
                .collect();
            StudentRow {
                record,
                delivered: flags,
            }
        })
        .collect();

    CourseTable {
        course_id: course_id.to_string(),
        course_name: course.name.clone().unwrap_or_default(),
        account_id: course.account_id,
        account_name: account.name.clone().unwrap_or_default(),
        assignments: assignments.into_iter().map(|a| a.column).collect(),
        rows,
    }
}
