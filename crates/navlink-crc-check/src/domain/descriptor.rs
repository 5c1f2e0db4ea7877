//! Extracted message descriptors and the discrepancies found between them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// What one source says about one catalog message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDescriptor {
    pub id: u32,
    pub name: String,
    /// The CRC extra byte.
    pub integrity_code: u8,
    /// Maximum serialized payload length as the source tallies it.
    pub length: usize,
}

/// Descriptors from one source keyed by message id.
///
/// A `BTreeMap` so that every walk over a table visits ids in ascending order.
pub type SourceTable = BTreeMap<u32, MessageDescriptor>;

/// The kind of disagreement between two sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscrepancyKind {
    /// Present in source B only.
    MissingInA,
    /// Present in source A only.
    MissingInB,
    /// Present in both with different CRC extras.
    IntegrityMismatch { a: u8, b: u8 },
}

/// One reportable disagreement for one message id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub id: u32,
    pub name: String,
    pub kind: DiscrepancyKind,
    /// Human-readable description naming the sources involved.
    pub detail: String,
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (ID {}): {}", self.name, self.id, self.detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discrepancy_display_names_message_and_id() {
        let d = Discrepancy {
            id: 25002,
            name: "CHECK_IN".to_string(),
            kind: DiscrepancyKind::MissingInB,
            detail: "Missing in router".to_string(),
        };
        assert_eq!(d.to_string(), "CHECK_IN (ID 25002): Missing in router");
    }
}
