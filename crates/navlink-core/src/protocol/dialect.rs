//! Built-in navlink dialect: typed message definitions indexed by message id.
//!
//! Every message the tooling can build, decode, or compare is described by a
//! [`MessageDef`]: its id, name, declared CRC extra, and fields in declaration
//! order.  The [`Dialect`] is an explicit table over those definitions,
//! assembled once at startup and validated against the [`Catalog`] so that a
//! catalog entry without a definition is caught before any traffic flows.
//!
//! # Wire order and CRC extra (for beginners)
//!
//! MAVLink does not send fields in the order they are declared.  The
//! generator sorts them by element size, largest first (a stable sort, so
//! equal-sized fields keep their declared order), which keeps every field
//! naturally aligned.  The *CRC extra* is a one-byte fingerprint of the
//! message name plus that ordered list of `type name` pairs.  Two builds that
//! disagree about a field's type, name, or array length get different CRC
//! extras, and the receiver silently drops frames whose checksum was seeded
//! with the wrong one.  That is exactly the drift the consistency checker
//! looks for.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Catalog;
use crate::protocol::crc::X25Crc;

/// Message id of the standard HEARTBEAT message.
pub const HEARTBEAT_ID: u32 = 0;

/// Name of the standard HEARTBEAT message.
pub const HEARTBEAT_NAME: &str = "HEARTBEAT";

/// Errors found while validating a dialect against a catalog.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DialectError {
    /// A catalog entry has no definition in the dialect.
    #[error("catalog message {name} (id {id}) has no dialect definition")]
    MissingDefinition { name: String, id: u32 },

    /// A definition's name disagrees with the catalog's name for the same id.
    #[error("dialect names id {id} {dialect}, catalog names it {catalog}")]
    NameMismatch {
        id: u32,
        dialect: String,
        catalog: String,
    },

    /// The declared CRC extra does not match the one derived from the fields.
    #[error("{name}: declared CRC extra {declared} but field signature gives {computed}")]
    CrcDrift {
        name: String,
        declared: u8,
        computed: u8,
    },
}

// ── Field types ───────────────────────────────────────────────────────────────

/// Primitive element type of a message field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
    Char,
}

impl FieldType {
    /// Size of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            FieldType::U8 | FieldType::I8 | FieldType::Char => 1,
            FieldType::U16 | FieldType::I16 => 2,
            FieldType::U32 | FieldType::I32 | FieldType::F32 => 4,
            FieldType::U64 | FieldType::I64 | FieldType::F64 => 8,
        }
    }

    /// C type name as it appears in message definitions and CRC signatures.
    pub fn c_name(self) -> &'static str {
        match self {
            FieldType::U8 => "uint8_t",
            FieldType::I8 => "int8_t",
            FieldType::U16 => "uint16_t",
            FieldType::I16 => "int16_t",
            FieldType::U32 => "uint32_t",
            FieldType::I32 => "int32_t",
            FieldType::U64 => "uint64_t",
            FieldType::I64 => "int64_t",
            FieldType::F32 => "float",
            FieldType::F64 => "double",
            FieldType::Char => "char",
        }
    }

    /// Parses a C type name.  `uint8_t_mavlink_version` is accepted as `uint8_t`.
    pub fn from_c_name(name: &str) -> Option<Self> {
        let ty = match name {
            "uint8_t" | "uint8_t_mavlink_version" => FieldType::U8,
            "int8_t" => FieldType::I8,
            "uint16_t" => FieldType::U16,
            "int16_t" => FieldType::I16,
            "uint32_t" => FieldType::U32,
            "int32_t" => FieldType::I32,
            "uint64_t" => FieldType::U64,
            "int64_t" => FieldType::I64,
            "float" => FieldType::F32,
            "double" => FieldType::F64,
            "char" => FieldType::Char,
            _ => return None,
        };
        Some(ty)
    }

    /// Struct-style format code (little-endian, standard sizes).
    pub fn format_code(self) -> char {
        match self {
            FieldType::U8 => 'B',
            FieldType::I8 => 'b',
            FieldType::U16 => 'H',
            FieldType::I16 => 'h',
            FieldType::U32 => 'I',
            FieldType::I32 => 'i',
            FieldType::U64 => 'Q',
            FieldType::I64 => 'q',
            FieldType::F32 => 'f',
            FieldType::F64 => 'd',
            FieldType::Char => 'c',
        }
    }

    /// Returns `true` for the floating-point types.
    pub fn is_float(self) -> bool {
        matches!(self, FieldType::F32 | FieldType::F64)
    }

    /// Inclusive integer range representable by this type, for integer types.
    ///
    /// `u64` is capped at `i64::MAX` because values are carried as `i64`.
    pub fn int_range(self) -> Option<(i64, i64)> {
        let range = match self {
            FieldType::U8 => (0, u8::MAX as i64),
            FieldType::I8 => (i8::MIN as i64, i8::MAX as i64),
            FieldType::U16 => (0, u16::MAX as i64),
            FieldType::I16 => (i16::MIN as i64, i16::MAX as i64),
            FieldType::U32 => (0, u32::MAX as i64),
            FieldType::I32 => (i32::MIN as i64, i32::MAX as i64),
            FieldType::U64 => (0, i64::MAX),
            FieldType::I64 => (i64::MIN, i64::MAX),
            FieldType::F32 | FieldType::F64 | FieldType::Char => return None,
        };
        Some(range)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.c_name())
    }
}

// ── Field and message definitions ─────────────────────────────────────────────

/// One field of a message definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name, also the constructor parameter name.
    pub name: &'static str,
    /// Element type.
    pub ty: FieldType,
    /// Array length, or 0 for a scalar field.
    pub array_len: u8,
}

impl FieldDef {
    /// A scalar field.
    pub const fn scalar(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            array_len: 0,
        }
    }

    /// A fixed-length array field.
    pub const fn array(name: &'static str, ty: FieldType, len: u8) -> Self {
        Self {
            name,
            ty,
            array_len: len,
        }
    }

    /// Returns `true` for array fields (including `char[N]` strings).
    pub fn is_array(&self) -> bool {
        self.array_len > 0
    }

    /// Total size of the field on the wire.
    pub fn wire_size(&self) -> usize {
        self.ty.size() * (self.array_len.max(1) as usize)
    }

    /// Type string in the `basetype[count]` convention, e.g. `uint16_t[8]`.
    pub fn type_string(&self) -> String {
        if self.is_array() {
            format!("{}[{}]", self.ty.c_name(), self.array_len)
        } else {
            self.ty.c_name().to_string()
        }
    }
}

/// A complete message definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageDef {
    /// Numeric message id.
    pub id: u32,
    /// Upper-case message name.
    pub name: &'static str,
    /// CRC extra declared by the generator.
    pub crc_extra: u8,
    /// Fields in declaration order.
    pub fields: &'static [FieldDef],
}

impl MessageDef {
    /// Indices into [`fields`](Self::fields) in wire order: stable sort by
    /// element size, largest first.
    pub fn wire_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.fields.len()).collect();
        order.sort_by_key(|&i| Reverse(self.fields[i].ty.size()));
        order
    }

    /// Fields in wire order.
    pub fn wire_fields(&self) -> Vec<&'static FieldDef> {
        let fields: &'static [FieldDef] = self.fields;
        self.wire_order().into_iter().map(|i| &fields[i]).collect()
    }

    /// Maximum (untruncated) payload length in bytes.
    pub fn max_payload_len(&self) -> usize {
        self.fields.iter().map(FieldDef::wire_size).sum()
    }

    /// Struct-style format string of the wire layout, e.g. `<IIHH`.
    ///
    /// Arrays are written with a count prefix; `char[N]` becomes `Ns`.
    pub fn native_format(&self) -> String {
        let mut fmt = String::from("<");
        for field in self.wire_fields() {
            if field.is_array() {
                fmt.push_str(&field.array_len.to_string());
                fmt.push(if field.ty == FieldType::Char {
                    's'
                } else {
                    field.ty.format_code()
                });
            } else {
                fmt.push(field.ty.format_code());
            }
        }
        fmt
    }

    /// Field type strings in wire order, e.g. `["uint32_t", "float[8]"]`.
    pub fn field_types(&self) -> Vec<String> {
        self.wire_fields().iter().map(|f| f.type_string()).collect()
    }

    /// Constructor parameter names in declaration order.
    pub fn parameter_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        let fields: &'static [FieldDef] = self.fields;
        fields.iter().find(|f| f.name == name)
    }

    /// Derives the CRC extra from the name and wire-ordered field signature.
    pub fn compute_crc_extra(&self) -> u8 {
        let mut crc = X25Crc::new();
        crc.accumulate_str(self.name);
        crc.accumulate_str(" ");
        for field in self.wire_fields() {
            crc.accumulate_str(field.ty.c_name());
            crc.accumulate_str(" ");
            crc.accumulate_str(field.name);
            crc.accumulate_str(" ");
            if field.is_array() {
                crc.accumulate_byte(field.array_len);
            }
        }
        crc.fold_to_byte()
    }
}

// ── Built-in definitions ──────────────────────────────────────────────────────

use FieldType::{F32, U16, U32, U8};

/// HEARTBEAT (0): liveness signal.
pub static HEARTBEAT: MessageDef = MessageDef {
    id: HEARTBEAT_ID,
    name: HEARTBEAT_NAME,
    crc_extra: 50,
    fields: &[
        FieldDef::scalar("type", U8),
        FieldDef::scalar("autopilot", U8),
        FieldDef::scalar("base_mode", U8),
        FieldDef::scalar("custom_mode", U32),
        FieldDef::scalar("system_status", U8),
        FieldDef::scalar("mavlink_version", U8),
    ],
};

/// Every navlink message opens with this envelope.
macro_rules! envelope {
    ($($rest:expr),* $(,)?) => {
        &[
            FieldDef::scalar("boot_id", U32),
            FieldDef::scalar("msg_seq", U16),
            FieldDef::scalar("time_ms", U32),
            FieldDef::scalar("ttl_ms", U16),
            $($rest),*
        ]
    };
}

/// Array capacity of the task-list messages.
pub const TASK_LIST_LEN: u8 = 8;

/// The navlink messages, in id order.
pub static NAVLINK_MESSAGES: &[MessageDef] = &[
    MessageDef {
        id: 25002,
        name: "CHECK_IN",
        crc_extra: 153,
        fields: envelope!(),
    },
    MessageDef {
        id: 25003,
        name: "CHECK_OUT",
        crc_extra: 153,
        fields: envelope!(
            FieldDef::scalar("lat", F32),
            FieldDef::scalar("lng", F32),
            FieldDef::scalar("alt", F32),
        ),
    },
    MessageDef {
        id: 25004,
        name: "SWARM_HEARTBEAT",
        crc_extra: 96,
        fields: envelope!(FieldDef::scalar("state", U8)),
    },
    MessageDef {
        id: 25104,
        name: "AVAILABLE_TASK_REQUEST",
        crc_extra: 232,
        fields: envelope!(
            FieldDef::scalar("count", U8),
            FieldDef::array("task_id", U16, TASK_LIST_LEN),
            FieldDef::array("task_type", U8, TASK_LIST_LEN),
            FieldDef::array("lat", F32, TASK_LIST_LEN),
            FieldDef::array("lng", F32, TASK_LIST_LEN),
            FieldDef::array("alt", F32, TASK_LIST_LEN),
        ),
    },
    MessageDef {
        id: 25105,
        name: "AVAILABLE_TASK_RESPONSE",
        crc_extra: 24,
        fields: envelope!(
            FieldDef::scalar("target_system", U8),
            FieldDef::scalar("count", U8),
            FieldDef::array("task_id", U16, TASK_LIST_LEN),
            FieldDef::array("time", U32, TASK_LIST_LEN),
        ),
    },
    MessageDef {
        id: 25106,
        name: "TASK_ASSIGN_REQUEST",
        crc_extra: 150,
        fields: envelope!(
            FieldDef::scalar("target_system", U8),
            FieldDef::scalar("task_id", U16),
            FieldDef::scalar("task_type", U8),
            FieldDef::scalar("lat", F32),
            FieldDef::scalar("lng", F32),
            FieldDef::scalar("alt", F32),
        ),
    },
    MessageDef {
        id: 25107,
        name: "TASK_ASSIGN_RESPONSE",
        crc_extra: 72,
        fields: envelope!(
            FieldDef::scalar("target_system", U8),
            FieldDef::scalar("task_id", U16),
            FieldDef::scalar("accepted", U8),
        ),
    },
    MessageDef {
        id: 25108,
        name: "TASK_CONFIRM_REQUEST",
        crc_extra: 168,
        fields: envelope!(
            FieldDef::scalar("task_id", U16),
            FieldDef::scalar("task_type", U8),
            FieldDef::scalar("lat", F32),
            FieldDef::scalar("lng", F32),
            FieldDef::scalar("alt", F32),
        ),
    },
    MessageDef {
        id: 25109,
        name: "TASK_CONFIRM_RESPONSE",
        crc_extra: 189,
        fields: envelope!(
            FieldDef::scalar("target_system", U8),
            FieldDef::scalar("task_id", U16),
            FieldDef::scalar("confirmed", U8),
        ),
    },
    MessageDef {
        id: 25200,
        name: "SLOT_HEARTBEAT",
        crc_extra: 209,
        fields: envelope!(
            FieldDef::scalar("slot_id", U8),
            FieldDef::scalar("state", U8),
        ),
    },
    MessageDef {
        id: 25201,
        name: "SLOT_CLAIM",
        crc_extra: 175,
        fields: envelope!(
            FieldDef::scalar("slot_id", U8),
            FieldDef::scalar("priority", U8),
        ),
    },
    MessageDef {
        id: 25202,
        name: "VOTE_PHASE",
        crc_extra: 89,
        fields: envelope!(
            FieldDef::scalar("phase", U8),
            FieldDef::scalar("round_id", U16),
            FieldDef::scalar("proposal_id", U16),
            FieldDef::scalar("vote", U8),
        ),
    },
    MessageDef {
        id: 25300,
        name: "SEARCH_STATUS",
        crc_extra: 107,
        fields: envelope!(
            FieldDef::scalar("area_id", U16),
            FieldDef::scalar("status", U8),
            FieldDef::scalar("coverage_pct", U8),
            FieldDef::scalar("detections", U16),
        ),
    },
];

// ── Dialect table ─────────────────────────────────────────────────────────────

/// Message definitions indexed by id.
#[derive(Debug, Clone)]
pub struct Dialect {
    messages: BTreeMap<u32, &'static MessageDef>,
}

impl Dialect {
    /// Builds a dialect from an explicit set of definitions.
    pub fn from_defs<I>(defs: I) -> Self
    where
        I: IntoIterator<Item = &'static MessageDef>,
    {
        Self {
            messages: defs.into_iter().map(|d| (d.id, d)).collect(),
        }
    }

    /// HEARTBEAT plus every navlink message.
    pub fn navlink() -> Self {
        Self::from_defs(std::iter::once(&HEARTBEAT).chain(NAVLINK_MESSAGES.iter()))
    }

    /// Looks up a definition by id.
    pub fn get(&self, id: u32) -> Option<&'static MessageDef> {
        self.messages.get(&id).copied()
    }

    /// Looks up a definition by exact name.
    pub fn by_name(&self, name: &str) -> Option<&'static MessageDef> {
        self.messages.values().copied().find(|d| d.name == name)
    }

    /// All definitions in id order.
    pub fn iter(&self) -> impl Iterator<Item = &'static MessageDef> + '_ {
        self.messages.values().copied()
    }

    /// Number of definitions.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if the dialect has no definitions.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Confirms every catalog entry has a matching definition whose declared
    /// CRC extra agrees with its field signature.
    ///
    /// # Errors
    ///
    /// Returns the first [`DialectError`] found, checking entries in id order.
    pub fn validate(&self, catalog: &Catalog) -> Result<(), DialectError> {
        for entry in catalog.all() {
            let def = self
                .get(entry.id)
                .ok_or_else(|| DialectError::MissingDefinition {
                    name: entry.name.clone(),
                    id: entry.id,
                })?;
            if def.name != entry.name {
                return Err(DialectError::NameMismatch {
                    id: entry.id,
                    dialect: def.name.to_string(),
                    catalog: entry.name.clone(),
                });
            }
        }
        for def in self.iter() {
            let computed = def.compute_crc_extra();
            if computed != def.crc_extra {
                return Err(DialectError::CrcDrift {
                    name: def.name.to_string(),
                    declared: def.crc_extra,
                    computed,
                });
            }
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogEntry;

    #[test]
    fn test_navlink_dialect_validates_against_navlink_catalog() {
        let dialect = Dialect::navlink();
        assert_eq!(dialect.validate(&Catalog::navlink()), Ok(()));
    }

    #[test]
    fn test_heartbeat_crc_extra_matches_standard_value() {
        assert_eq!(HEARTBEAT.compute_crc_extra(), 50);
        assert_eq!(HEARTBEAT.max_payload_len(), 9);
    }

    #[test]
    fn test_check_in_wire_order_puts_u32_fields_first() {
        // Arrange
        let def = Dialect::navlink().get(25002).unwrap();

        // Act
        let names: Vec<&str> = def.wire_fields().iter().map(|f| f.name).collect();

        // Assert – stable sort keeps declared order among equal sizes
        assert_eq!(names, vec!["boot_id", "time_ms", "msg_seq", "ttl_ms"]);
    }

    #[test]
    fn test_check_in_native_format_and_length() {
        let def = Dialect::navlink().get(25002).unwrap();
        assert_eq!(def.native_format(), "<IIHH");
        assert_eq!(def.max_payload_len(), 12);
    }

    #[test]
    fn test_available_task_request_layout() {
        let def = Dialect::navlink().by_name("AVAILABLE_TASK_REQUEST").unwrap();
        assert_eq!(def.native_format(), "<II8f8f8fHH8HB8B");
        assert_eq!(def.max_payload_len(), 133);
        assert_eq!(
            def.field_types(),
            vec![
                "uint32_t",
                "uint32_t",
                "float[8]",
                "float[8]",
                "float[8]",
                "uint16_t",
                "uint16_t",
                "uint16_t[8]",
                "uint8_t",
                "uint8_t[8]",
            ]
        );
    }

    #[test]
    fn test_parameter_names_follow_declaration_order() {
        let def = Dialect::navlink().by_name("CHECK_OUT").unwrap();
        assert_eq!(
            def.parameter_names(),
            vec!["boot_id", "msg_seq", "time_ms", "ttl_ms", "lat", "lng", "alt"]
        );
    }

    #[test]
    fn test_validate_reports_missing_definition() {
        // Arrange – a dialect with only HEARTBEAT
        let dialect = Dialect::from_defs([&HEARTBEAT]);
        let catalog = Catalog::new(vec![CatalogEntry::new("CHECK_IN", 25002)]).unwrap();

        // Act
        let result = dialect.validate(&catalog);

        // Assert
        assert_eq!(
            result,
            Err(DialectError::MissingDefinition {
                name: "CHECK_IN".to_string(),
                id: 25002
            })
        );
    }

    static DRIFTED: MessageDef = MessageDef {
        id: 25002,
        name: "CHECK_IN",
        crc_extra: 154,
        fields: envelope!(),
    };

    #[test]
    fn test_validate_reports_crc_drift() {
        let dialect = Dialect::from_defs([&DRIFTED]);
        let catalog = Catalog::new(vec![CatalogEntry::new("CHECK_IN", 25002)]).unwrap();

        let result = dialect.validate(&catalog);

        assert_eq!(
            result,
            Err(DialectError::CrcDrift {
                name: "CHECK_IN".to_string(),
                declared: 154,
                computed: 153
            })
        );
    }

    #[test]
    fn test_from_c_name_round_trips_every_type() {
        for ty in [
            FieldType::U8,
            FieldType::I8,
            FieldType::U16,
            FieldType::I16,
            FieldType::U32,
            FieldType::I32,
            FieldType::U64,
            FieldType::I64,
            FieldType::F32,
            FieldType::F64,
            FieldType::Char,
        ] {
            assert_eq!(FieldType::from_c_name(ty.c_name()), Some(ty));
        }
        assert_eq!(FieldType::from_c_name("uint8_t_mavlink_version"), Some(FieldType::U8));
        assert_eq!(FieldType::from_c_name("bool"), None);
    }
}
