//! Property tests for the pairwise comparator.

use navlink_crc_check::application::compare;
use navlink_crc_check::domain::{DiscrepancyKind, MessageDescriptor, SourceTable};
use proptest::prelude::*;

const IDS: [u32; 6] = [25002, 25003, 25004, 25104, 25200, 25300];

/// A table over a subset of [`IDS`] with arbitrary CRCs and lengths.
fn arb_table() -> impl Strategy<Value = SourceTable> {
    prop::collection::vec((any::<bool>(), any::<u8>(), 1usize..256), IDS.len()).prop_map(|slots| {
        IDS.iter()
            .zip(slots)
            .filter(|(_, (present, _, _))| *present)
            .map(|(&id, (_, crc, len))| {
                (
                    id,
                    MessageDescriptor {
                        id,
                        name: format!("MSG_{id}"),
                        integrity_code: crc,
                        length: len,
                    },
                )
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_table_agrees_with_itself(t in arb_table()) {
        prop_assert!(compare("a", Some(&t), "b", Some(&t)).is_empty());
    }

    #[test]
    fn prop_swapping_sides_mirrors_the_result(a in arb_table(), b in arb_table()) {
        let forward = compare("a", Some(&a), "b", Some(&b));
        let backward = compare("b", Some(&b), "a", Some(&a));

        prop_assert_eq!(forward.len(), backward.len());
        for (f, r) in forward.iter().zip(&backward) {
            prop_assert_eq!(f.id, r.id);
            let mirrored = match f.kind {
                DiscrepancyKind::MissingInA => DiscrepancyKind::MissingInB,
                DiscrepancyKind::MissingInB => DiscrepancyKind::MissingInA,
                DiscrepancyKind::IntegrityMismatch { a, b } => {
                    DiscrepancyKind::IntegrityMismatch { a: b, b: a }
                }
            };
            prop_assert_eq!(&r.kind, &mirrored);
        }
    }

    #[test]
    fn prop_results_are_in_ascending_id_order(a in arb_table(), b in arb_table()) {
        let found = compare("a", Some(&a), "b", Some(&b));
        prop_assert!(found.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn prop_length_only_changes_are_ignored(t in arb_table(), bump in 1usize..64) {
        let stretched: SourceTable = t
            .iter()
            .map(|(&id, d)| (id, MessageDescriptor { length: d.length + bump, ..d.clone() }))
            .collect();

        prop_assert!(compare("a", Some(&t), "b", Some(&stretched)).is_empty());
    }

    #[test]
    fn prop_every_id_in_either_table_is_accounted_for(a in arb_table(), b in arb_table()) {
        let found = compare("a", Some(&a), "b", Some(&b));
        for d in &found {
            prop_assert!(a.contains_key(&d.id) || b.contains_key(&d.id));
        }
        let only_one_side = a.keys().filter(|id| !b.contains_key(id)).count()
            + b.keys().filter(|id| !a.contains_key(id)).count();
        let missing = found
            .iter()
            .filter(|d| !matches!(d.kind, DiscrepancyKind::IntegrityMismatch { .. }))
            .count();
        prop_assert_eq!(missing, only_one_side);
    }
}
