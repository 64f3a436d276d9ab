//! Record normalization.
//!
//! Pure conversions from raw Canvas records to [`StudentRecord`]s, plus the
//! text folding shared by the assignment filter and the summary sort.

use crate::models::{Account, Course, Enrollment, StudentRecord};
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Canvas wire format for timestamps.
pub const WIRE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Split "Family names, Given names" on the first comma.
///
/// Returns `(given_names, family_names)`, both trimmed. Without a comma the
/// whole string is taken as family names and given names are empty.
pub fn split_sortable_name(sortable_name: &str) -> (String, String) {
    match sortable_name.split_once(',') {
        Some((family, given)) => (given.trim().to_string(), family.trim().to_string()),
        None => {
            debug!("Sortable name without separator: {:?}", sortable_name);
            (String::new(), sortable_name.trim().to_string())
        }
    }
}

/// Insert a `-` before the check digit: `123456789` becomes `12345678-9`.
///
/// Identifiers of one character or less are dropped.
pub fn format_national_id(raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    let mut chars = raw.chars();
    let check = chars.next_back()?;
    let body = chars.as_str();
    if body.is_empty() {
        return None;
    }
    Some(format!("{}-{}", body, check))
}

/// Parse a Canvas timestamp. Absent stays absent; unparseable becomes absent.
pub fn parse_timestamp(raw: Option<&str>) -> Option<NaiveDateTime> {
    let raw = raw?;
    NaiveDateTime::parse_from_str(raw, WIRE_TIMESTAMP_FORMAT)
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|ts| ts.with_timezone(&Utc).naive_utc())
        })
        .or_else(|| {
            debug!("Unparseable timestamp: {:?}", raw);
            None
        })
}

/// Format a seconds count as `HH:MM:SS`. Hours do not wrap.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Lower-case and strip diacritics (NFKD, combining marks removed).
pub fn fold(text: &str) -> String {
    text.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Convert one enrollment into a [`StudentRecord`].
pub fn normalize_enrollment(
    enrollment: &Enrollment,
    course: Option<&Course>,
    account: Option<&Account>,
) -> StudentRecord {
    let user = &enrollment.user;
    let (given_names, family_names) = user
        .sortable_name
        .as_deref()
        .map(split_sortable_name)
        .unwrap_or_default();

    StudentRecord {
        internal_id: user.id.or(enrollment.user_id),
        given_names,
        family_names,
        national_id: format_national_id(user.sis_user_id.as_deref()),
        email: user.login_id.clone(),
        enrolled_at: parse_timestamp(enrollment.created_at.as_deref()),
        last_activity_at: parse_timestamp(enrollment.last_activity_at.as_deref()),
        has_participated: enrollment.last_activity_at.is_some(),
        total_activity_duration: enrollment.total_activity_time.map(format_duration),
        course_name: course.and_then(|c| c.name.clone()),
        program_name: account.and_then(|a| a.name.clone()),
    }
}
