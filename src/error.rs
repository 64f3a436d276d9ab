//! Error taxonomy for the aggregation pipeline.
//!
//! Fetch failures are contained at the smallest enclosing scope: a failed
//! submissions fetch empties one assignment column, a failed course or
//! account lookup skips one course, and only a run with no usable course at
//! all is an error for the caller.

use thiserror::Error;

/// A Canvas resource could not be (fully) retrieved.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{resource}: HTTP {status}: {body}")]
    Status {
        resource: String,
        status: u16,
        body: String,
    },

    #[error("{resource}: request failed: {source}")]
    Transport {
        resource: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{resource}: could not decode response: {message}")]
    Decode { resource: String, message: String },
}

impl FetchError {
    /// The resource label the failure refers to.
    pub fn resource(&self) -> &str {
        match self {
            FetchError::Status { resource, .. }
            | FetchError::Transport { resource, .. }
            | FetchError::Decode { resource, .. } => resource,
        }
    }
}

/// Why a single course was left out of the report.
#[derive(Debug, Error)]
pub enum CourseError {
    #[error("course {course_id}: missing {what} information ({source})")]
    MissingIdentity {
        course_id: String,
        what: &'static str,
        #[source]
        source: FetchError,
    },

    #[error("course {course_id}: course record has no account")]
    MissingAccount { course_id: String },

    #[error("course {course_id}: no student enrollments available")]
    NoEnrollments { course_id: String },
}

/// Whole-run failures.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("no valid course ids were given")]
    NoCourseIds,

    #[error("no valid course ids: none of the requested courses produced data")]
    NoValidCourses,
}
