//! Pairwise comparison of two source tables.
//!
//! Only two kinds of disagreement count: a message missing from one side, and
//! differing CRC extras.  Differing maximum lengths are logged at `debug` and
//! otherwise ignored, since generators tally array-bearing messages
//! differently.

use std::collections::BTreeSet;

use tracing::debug;

use crate::domain::{Discrepancy, DiscrepancyKind, SourceTable};

/// Compares two tables and returns their discrepancies in ascending id order.
///
/// If either table is absent the pair is not comparable and the result is
/// empty.
///
/// # Examples
///
/// ```rust
/// use navlink_crc_check::application::compare;
/// use navlink_crc_check::domain::{MessageDescriptor, SourceTable};
///
/// let mut a = SourceTable::new();
/// a.insert(25002, MessageDescriptor { id: 25002, name: "CHECK_IN".into(), integrity_code: 153, length: 12 });
/// let b = SourceTable::new();
///
/// let found = compare("runtime", Some(&a), "router", Some(&b));
/// assert_eq!(found[0].detail, "Missing in router");
/// ```
pub fn compare(
    name_a: &str,
    table_a: Option<&SourceTable>,
    name_b: &str,
    table_b: Option<&SourceTable>,
) -> Vec<Discrepancy> {
    let (Some(a), Some(b)) = (table_a, table_b) else {
        return Vec::new();
    };

    let ids: BTreeSet<u32> = a.keys().chain(b.keys()).copied().collect();
    let mut out = Vec::new();

    for id in ids {
        match (a.get(&id), b.get(&id)) {
            (Some(da), None) => out.push(Discrepancy {
                id,
                name: da.name.clone(),
                kind: DiscrepancyKind::MissingInB,
                detail: format!("Missing in {name_b}"),
            }),
            (None, Some(db)) => out.push(Discrepancy {
                id,
                name: db.name.clone(),
                kind: DiscrepancyKind::MissingInA,
                detail: format!("Missing in {name_a}"),
            }),
            (Some(da), Some(db)) => {
                if da.integrity_code != db.integrity_code {
                    out.push(Discrepancy {
                        id,
                        name: da.name.clone(),
                        kind: DiscrepancyKind::IntegrityMismatch {
                            a: da.integrity_code,
                            b: db.integrity_code,
                        },
                        detail: format!(
                            "CRC mismatch: {name_a}={} vs {name_b}={}",
                            da.integrity_code, db.integrity_code
                        ),
                    });
                }
                if da.length != db.length {
                    debug!(
                        id,
                        name = %da.name,
                        "length differs: {name_a}={} vs {name_b}={} (not an error)",
                        da.length,
                        db.length
                    );
                }
            }
            (None, None) => {}
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageDescriptor;

    fn desc(id: u32, name: &str, crc: u8, len: usize) -> MessageDescriptor {
        MessageDescriptor {
            id,
            name: name.to_string(),
            integrity_code: crc,
            length: len,
        }
    }

    fn table(entries: &[MessageDescriptor]) -> SourceTable {
        entries.iter().map(|d| (d.id, d.clone())).collect()
    }

    #[test]
    fn test_identical_tables_have_no_discrepancies() {
        let t = table(&[desc(25002, "CHECK_IN", 153, 12), desc(25003, "CHECK_OUT", 153, 24)]);
        assert!(compare("a", Some(&t), "b", Some(&t)).is_empty());
    }

    #[test]
    fn test_length_difference_alone_is_not_a_discrepancy() {
        // Arrange
        let a = table(&[desc(25104, "AVAILABLE_TASK_REQUEST", 232, 133)]);
        let b = table(&[desc(25104, "AVAILABLE_TASK_REQUEST", 232, 30)]);

        // Act
        let found = compare("a", Some(&a), "b", Some(&b));

        // Assert
        assert!(found.is_empty());
    }

    #[test]
    fn test_crc_mismatch_reports_both_values() {
        // Arrange
        let a = table(&[desc(25002, "CHECK_IN", 153, 12)]);
        let b = table(&[desc(25002, "CHECK_IN", 154, 12)]);

        // Act
        let found = compare("runtime", Some(&a), "router", Some(&b));

        // Assert
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, DiscrepancyKind::IntegrityMismatch { a: 153, b: 154 });
        assert_eq!(found[0].detail, "CRC mismatch: runtime=153 vs router=154");
    }

    #[test]
    fn test_missing_entries_use_the_present_side_name() {
        // Arrange
        let a = table(&[desc(25002, "CHECK_IN", 153, 12)]);
        let b = table(&[desc(25300, "SEARCH_STATUS", 107, 18)]);

        // Act
        let found = compare("ardupilot", Some(&a), "router", Some(&b));

        // Assert – ascending id order
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, 25002);
        assert_eq!(found[0].name, "CHECK_IN");
        assert_eq!(found[0].kind, DiscrepancyKind::MissingInB);
        assert_eq!(found[0].detail, "Missing in router");
        assert_eq!(found[1].id, 25300);
        assert_eq!(found[1].name, "SEARCH_STATUS");
        assert_eq!(found[1].kind, DiscrepancyKind::MissingInA);
        assert_eq!(found[1].detail, "Missing in ardupilot");
    }

    #[test]
    fn test_absent_table_skips_the_pair() {
        let a = table(&[desc(25002, "CHECK_IN", 153, 12)]);
        assert!(compare("a", Some(&a), "b", None).is_empty());
        assert!(compare("a", None, "b", Some(&a)).is_empty());
    }
}
