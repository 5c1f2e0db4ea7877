//! One observed delivery of the message under test.

use std::collections::BTreeMap;
use std::fmt;

use navlink_core::FieldValue;
use serde::Serialize;

/// A target-type message seen by one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceivedRecord {
    /// Identity of the session that received it.
    pub receiver_identity: u8,
    /// System id from the frame header.
    pub sender_identity: u8,
    pub type_name: String,
    pub field_values: BTreeMap<String, FieldValue>,
}

impl fmt::Display for ReceivedRecord {
    /// `Vehicle 251 <- SYS 252: CHECK_IN {"boot_id":123,...}`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = serde_json::to_string(&self.field_values).map_err(|_| fmt::Error)?;
        write!(
            f,
            "Vehicle {} <- SYS {}: {} {fields}",
            self.receiver_identity, self.sender_identity, self.type_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_both_ends_and_renders_fields_as_json() {
        // Arrange
        let record = ReceivedRecord {
            receiver_identity: 251,
            sender_identity: 252,
            type_name: "CHECK_IN".to_string(),
            field_values: [
                ("boot_id".to_string(), FieldValue::Int(123)),
                ("ttl_ms".to_string(), FieldValue::Int(5000)),
            ]
            .into_iter()
            .collect(),
        };

        // Act
        let text = record.to_string();

        // Assert
        assert_eq!(
            text,
            r#"Vehicle 251 <- SYS 252: CHECK_IN {"boot_id":123,"ttl_ms":5000}"#
        );
    }
}
