//! Table construction: per-course tables and the cross-course summary.

pub mod course;
pub mod merge;

pub use course::{
    build_course_table, filter_assignments, AssignmentSubmissions, CourseTable,
    DEFAULT_EXCLUDE_MARKERS,
};
pub use merge::{merge_courses, SummaryTable, IDENTITY_HEADERS};
