//! Cross-course merging.
//!
//! Per-course minimal tables are outer-joined on the (given names, family
//! names) pair. Every assignment column keeps a course-scoped key, so two
//! courses with equally named assignments still produce two columns; the bare
//! name is only used as the exported header.
//!
//! Two different students with identical names in different courses end up
//! in the same row. There is no identifier shared across courses to tell
//! them apart.

use crate::normalize::fold;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Headers of the identity columns that precede every assignment column.
pub const IDENTITY_HEADERS: [&str; 2] = ["Nombres", "Apellidos"];

/// A row of a per-course minimal table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinimalRow {
    pub given_names: String,
    pub family_names: String,
    pub values: Vec<bool>,
}

/// Identity columns plus one delivery flag per assignment of one course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinimalTable {
    pub course_name: String,
    pub columns: Vec<String>,
    pub rows: Vec<MinimalRow>,
}

/// Course-scoped identity of a summary column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ColumnKey {
    /// Position of the course in the merge input.
    pub course: usize,
    /// Position of the assignment within that course.
    pub assignment: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryColumn {
    pub key: ColumnKey,
    pub course_name: String,
    pub header: String,
}

/// Inclusive range of summary column indices owned by one course.
///
/// Indices count the identity columns, so the first course starts at 2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInterval {
    pub course_name: String,
    pub first: usize,
    pub last: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub given_names: String,
    pub family_names: String,
    /// `None` where the student is not enrolled in the column's course.
    pub values: Vec<Option<bool>>,
}

/// The merged cross-course view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummaryTable {
    pub columns: Vec<SummaryColumn>,
    pub rows: Vec<SummaryRow>,
    pub intervals: Vec<ColumnInterval>,
}

impl SummaryTable {
    /// Exported headers: identity columns, then bare assignment names.
    pub fn headers(&self) -> Vec<&str> {
        IDENTITY_HEADERS
            .iter()
            .copied()
            .chain(self.columns.iter().map(|c| c.header.as_str()))
            .collect()
    }
}

/// Outer-join course tables in input order.
pub fn merge_courses(tables: &[MinimalTable]) -> SummaryTable {
    let mut columns: Vec<SummaryColumn> = Vec::new();
    let mut intervals = Vec::new();
    let mut rows: Vec<SummaryRow> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for (course, table) in tables.iter().enumerate() {
        let offset = columns.len();
        let width = table.columns.len();

        if width > 0 {
            let first = IDENTITY_HEADERS.len() + offset;
            intervals.push(ColumnInterval {
                course_name: table.course_name.clone(),
                first,
                last: first + width - 1,
            });
        }

        columns.extend(table.columns.iter().enumerate().map(|(assignment, header)| {
            SummaryColumn {
                key: ColumnKey { course, assignment },
                course_name: table.course_name.clone(),
                header: header.clone(),
            }
        }));

        let total = columns.len();
        for row in rows.iter_mut() {
            row.values.resize(total, None);
        }

        let mut seen = HashSet::new();
        for row in &table.rows {
            let key = (row.given_names.clone(), row.family_names.clone());
            if !seen.insert(key.clone()) {
                debug!(
                    "Duplicate student {:?} in course {}; keeping first occurrence",
                    key, table.course_name
                );
                continue;
            }

            let slot = match index.get(&key) {
                Some(&slot) => slot,
                None => {
                    rows.push(SummaryRow {
                        given_names: row.given_names.clone(),
                        family_names: row.family_names.clone(),
                        values: vec![None; total],
                    });
                    index.insert(key, rows.len() - 1);
                    rows.len() - 1
                }
            };

            for (position, value) in row.values.iter().take(width).enumerate() {
                rows[slot].values[offset + position] = Some(*value);
            }
        }
    }

    rows.retain(|row| !row.given_names.is_empty() && !row.family_names.is_empty());
    rows.sort_by_cached_key(|row| {
        (
            fold(&row.family_names),
            fold(&row.given_names),
            row.family_names.clone(),
            row.given_names.clone(),
        )
    });

    SummaryTable {
        columns,
        rows,
        intervals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn row(given: &str, family: &str, values: &[bool]) -> MinimalRow {
        MinimalRow {
            given_names: given.to_string(),
            family_names: family.to_string(),
            values: values.to_vec(),
        }
    }

    fn table(name: &str, columns: &[&str], rows: Vec<MinimalRow>) -> MinimalTable {
        MinimalTable {
            course_name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    /// (given, family, course, header) -> value, independent of ordering.
    fn cells(summary: &SummaryTable) -> BTreeMap<(String, String, String, String), Option<bool>> {
        let mut out = BTreeMap::new();
        for r in &summary.rows {
            for (c, column) in summary.columns.iter().enumerate() {
                out.insert(
                    (
                        r.given_names.clone(),
                        r.family_names.clone(),
                        column.course_name.clone(),
                        column.header.clone(),
                    ),
                    r.values[c],
                );
            }
        }
        out
    }

    #[test]
    fn test_interval_for_single_assignment_course() {
        let a = table("A", &["Tarea1"], vec![row("Ana", "Soto", &[true])]);
        let b = table("B", &[], vec![row("Luis", "Rojas", &[])]);

        let summary = merge_courses(&[a, b]);

        assert_eq!(
            summary.intervals,
            vec![ColumnInterval {
                course_name: "A".to_string(),
                first: 2,
                last: 2
            }]
        );
        assert_eq!(summary.headers(), vec!["Nombres", "Apellidos", "Tarea1"]);
    }

    #[test]
    fn test_shared_student_occupies_one_row() {
        let a = table(
            "A",
            &["Tarea1"],
            vec![row("Ana", "Soto", &[true]), row("Luis", "Rojas", &[false])],
        );
        let b = table("B", &["Foro"], vec![row("Ana", "Soto", &[false])]);

        let summary = merge_courses(&[a, b]);

        assert_eq!(summary.rows.len(), 2);
        let ana = summary
            .rows
            .iter()
            .find(|r| r.given_names == "Ana")
            .unwrap();
        assert_eq!(ana.values, vec![Some(true), Some(false)]);

        let luis = summary
            .rows
            .iter()
            .find(|r| r.given_names == "Luis")
            .unwrap();
        assert_eq!(luis.values, vec![Some(false), None]);

        assert_eq!(
            summary.intervals,
            vec![
                ColumnInterval {
                    course_name: "A".to_string(),
                    first: 2,
                    last: 2
                },
                ColumnInterval {
                    course_name: "B".to_string(),
                    first: 3,
                    last: 3
                },
            ]
        );
    }

    #[test]
    fn test_same_named_assignments_stay_distinct() {
        let a = table("A", &["Tarea1"], vec![row("Ana", "Soto", &[true])]);
        let b = table("B", &["Tarea1"], vec![row("Ana", "Soto", &[false])]);

        let summary = merge_courses(&[a, b]);

        assert_eq!(summary.columns.len(), 2);
        assert_eq!(summary.headers(), vec!["Nombres", "Apellidos", "Tarea1", "Tarea1"]);
        assert_eq!(summary.columns[0].key, ColumnKey { course: 0, assignment: 0 });
        assert_eq!(summary.columns[1].key, ColumnKey { course: 1, assignment: 0 });
        assert_eq!(summary.rows[0].values, vec![Some(true), Some(false)]);
    }

    #[test]
    fn test_incomplete_names_dropped_and_duplicates_folded() {
        let a = table(
            "A",
            &["T"],
            vec![
                row("", "Solo", &[true]),
                row("Eva", "", &[true]),
                row("Ana", "Soto", &[true]),
                row("Ana", "Soto", &[false]),
            ],
        );

        let summary = merge_courses(&[a]);

        assert_eq!(summary.rows.len(), 1);
        assert_eq!(summary.rows[0].values, vec![Some(true)]);
    }

    #[test]
    fn test_sorted_by_family_then_given_ignoring_accents() {
        let a = table(
            "A",
            &[],
            vec![
                row("Zoe", "Bravo", &[]),
                row("Ana", "Órdenes", &[]),
                row("Beto", "Álvarez", &[]),
                row("Andrés", "Bravo", &[]),
                row("Carla", "alvear", &[]),
            ],
        );

        let summary = merge_courses(&[a]);
        let order: Vec<_> = summary
            .rows
            .iter()
            .map(|r| format!("{} {}", r.family_names, r.given_names))
            .collect();

        assert_eq!(
            order,
            vec![
                "Álvarez Beto",
                "alvear Carla",
                "Bravo Andrés",
                "Bravo Zoe",
                "Órdenes Ana"
            ]
        );
    }

    #[test]
    fn test_merge_content_is_order_independent() {
        let a = table(
            "A",
            &["Tarea1", "Tarea2"],
            vec![
                row("Ana", "Soto", &[true, false]),
                row("Luis", "Rojas", &[false, false]),
            ],
        );
        let b = table(
            "B",
            &["Foro"],
            vec![row("Eva", "Vera", &[true]), row("Ana", "Soto", &[true])],
        );

        let ab = merge_courses(&[a.clone(), b.clone()]);
        let ba = merge_courses(&[b, a]);

        assert_eq!(cells(&ab), cells(&ba));
        assert_eq!(ab.rows.len(), ba.rows.len());
        // Row order depends only on the names.
        let names = |s: &SummaryTable| {
            s.rows
                .iter()
                .map(|r| r.family_names.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(&ab), names(&ba));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let tables = vec![
            table("A", &["T1"], vec![row("Ana", "Soto", &[true])]),
            table("B", &["T2"], vec![row("Luis", "Rojas", &[false])]),
        ];
        assert_eq!(merge_courses(&tables), merge_courses(&tables));
    }

    #[test]
    fn test_empty_input() {
        let summary = merge_courses(&[]);
        assert!(summary.rows.is_empty());
        assert!(summary.intervals.is_empty());
        assert_eq!(summary.headers(), vec!["Nombres", "Apellidos"]);
    }
}
