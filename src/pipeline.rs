//! The aggregation run.
//!
//! Courses are fetched and built independently, with bounded concurrency,
//! and collected back in request order. A failing course is recorded as
//! skipped and never aborts the others.

use crate::api::CanvasClient;
use crate::error::{AggregateError, CourseError};
use crate::table::{
    build_course_table, filter_assignments, merge_courses, AssignmentSubmissions, CourseTable,
    SummaryTable, DEFAULT_EXCLUDE_MARKERS,
};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use serde::Serialize;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What to aggregate.
#[derive(Debug, Clone)]
pub struct AggregationRequest {
    pub course_ids: Vec<String>,
    /// Add one delivery column per qualifying assignment.
    pub include_assignments: bool,
    /// Build the summary even for a single course.
    pub summary: bool,
    /// Maximum in-flight courses, and in-flight submission fetches per course.
    pub concurrency: usize,
    /// Assignment-name markers excluded from delivery columns.
    pub exclude_markers: Vec<String>,
}

impl Default for AggregationRequest {
    fn default() -> Self {
        Self {
            course_ids: Vec::new(),
            include_assignments: false,
            summary: false,
            concurrency: 4,
            exclude_markers: DEFAULT_EXCLUDE_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

/// A requested course that produced no table.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedCourse {
    pub course_id: String,
    pub reason: String,
}

/// Everything one run produced. Held by the caller; nothing is cached.
#[derive(Debug)]
pub struct AggregationResult {
    pub courses: Vec<CourseTable>,
    pub skipped: Vec<SkippedCourse>,
    pub summary: Option<SummaryTable>,
    pub elapsed: Duration,
}

/// Canvas course ids are plain digit strings.
pub fn is_valid_course_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_digit())
}

/// Runs one aggregation against a Canvas client.
pub struct Aggregator<'a> {
    client: &'a CanvasClient,
    request: &'a AggregationRequest,
    progress: Option<ProgressBar>,
}

impl<'a> Aggregator<'a> {
    pub fn new(client: &'a CanvasClient, request: &'a AggregationRequest) -> Self {
        Self {
            client,
            request,
            progress: None,
        }
    }

    /// Tick the given bar once per finished course.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub async fn run(&self) -> Result<AggregationResult, AggregateError> {
        let start = Instant::now();

        if self.request.course_ids.is_empty() {
            return Err(AggregateError::NoCourseIds);
        }

        let mut skipped = Vec::new();
        let mut valid = Vec::new();
        let mut seen = HashSet::new();
        for raw in &self.request.course_ids {
            let id = raw.trim().to_string();
            if !is_valid_course_id(&id) {
                warn!("Skipping invalid course id {:?}", raw);
                skipped.push(SkippedCourse {
                    course_id: raw.clone(),
                    reason: "invalid course id".to_string(),
                });
            } else if seen.insert(id.clone()) {
                valid.push(id);
            } else {
                debug!("Ignoring repeated course id {}", id);
            }
        }

        if valid.is_empty() {
            return Err(AggregateError::NoCourseIds);
        }

        if let Some(ref pb) = self.progress {
            pb.set_length(valid.len() as u64);
        }

        let concurrency = self.request.concurrency.max(1);
        let outcomes: Vec<(String, Result<CourseTable, CourseError>)> = stream::iter(valid)
            .map(|course_id| async move {
                let outcome = self.course(&course_id).await;
                if let Some(ref pb) = self.progress {
                    pb.inc(1);
                }
                (course_id, outcome)
            })
            .buffered(concurrency)
            .collect()
            .await;

        let mut courses = Vec::new();
        for (course_id, outcome) in outcomes {
            match outcome {
                Ok(table) => {
                    info!(
                        "Course {} ({}): {} students, {} assignment columns",
                        course_id,
                        table.course_name,
                        table.rows.len(),
                        table.assignments.len()
                    );
                    courses.push(table);
                }
                Err(e) => {
                    warn!("Skipping course {}: {}", course_id, e);
                    skipped.push(SkippedCourse {
                        course_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if courses.is_empty() {
            return Err(AggregateError::NoValidCourses);
        }

        let summary = if self.request.summary || courses.len() > 1 {
            let minimal: Vec<_> = courses.iter().map(CourseTable::minimal).collect();
            let summary = merge_courses(&minimal);
            info!(
                "Summary: {} students across {} courses, {} assignment columns",
                summary.rows.len(),
                courses.len(),
                summary.columns.len()
            );
            Some(summary)
        } else {
            None
        };

        Ok(AggregationResult {
            courses,
            skipped,
            summary,
            elapsed: start.elapsed(),
        })
    }

    async fn course(&self, course_id: &str) -> Result<CourseTable, CourseError> {
        let course = self
            .client
            .course(course_id)
            .await
            .map_err(|source| CourseError::MissingIdentity {
                course_id: course_id.to_string(),
                what: "course",
                source,
            })?;

        let account_id = course.account_id.ok_or_else(|| CourseError::MissingAccount {
            course_id: course_id.to_string(),
        })?;

        let account = self
            .client
            .account(account_id)
            .await
            .map_err(|source| CourseError::MissingIdentity {
                course_id: course_id.to_string(),
                what: "account",
                source,
            })?;

        let enrollments = self.client.enrollments(course_id).await;
        if enrollments.records.is_empty() {
            return Err(CourseError::NoEnrollments {
                course_id: course_id.to_string(),
            });
        }
        if !enrollments.is_complete() {
            warn!(
                "Course {}: using the {} enrollments retrieved before the failure",
                course_id,
                enrollments.records.len()
            );
        }

        let assignments = if self.request.include_assignments {
            self.assignments(course_id).await
        } else {
            Vec::new()
        };

        Ok(build_course_table(
            course_id,
            &course,
            &account,
            &enrollments.records,
            assignments,
        ))
    }

    async fn assignments(&self, course_id: &str) -> Vec<AssignmentSubmissions> {
        let listed = self.client.assignments(course_id).await;
        if let Some(ref failure) = listed.failure {
            warn!(
                "Course {}: assignment list unavailable, no delivery columns ({})",
                course_id, failure
            );
            return Vec::new();
        }

        let columns = filter_assignments(&listed.records, &self.request.exclude_markers);
        debug!(
            "Course {}: {} of {} assignments kept",
            course_id,
            columns.len(),
            listed.records.len()
        );

        stream::iter(columns)
            .map(|column| async move {
                let paged = self.client.submissions(course_id, column.id).await;
                let submissions = match paged.failure {
                    None => paged.records,
                    Some(failure) => {
                        warn!(
                            "Course {}: {} unavailable, column {:?} left undelivered",
                            course_id,
                            failure.resource(),
                            column.name
                        );
                        Vec::new()
                    }
                };
                AssignmentSubmissions {
                    column,
                    submissions,
                }
            })
            .buffered(self.request.concurrency.max(1))
            .collect()
            .await
    }
}
