//! Runtime-registry extraction.
//!
//! A protocol runtime exposes one class per message with its declared CRC
//! extra and either a struct-style native format string or a list of C field
//! types.  [`ProtocolRegistry`] abstracts over where that registry comes from:
//!
//! - the built-in [`Dialect`] compiled into this tool;
//! - a [`RegistryDump`] exported from a foreign runtime as JSON:
//!
//! ```json
//! {"messages": [
//!   {"id": 25002, "name": "CHECK_IN", "crc_extra": 153,
//!    "native_format": "<IIHH",
//!    "fieldtypes": ["uint32_t", "uint32_t", "uint16_t", "uint16_t"]}
//! ]}
//! ```
//!
//! Classes are looked up by message id.  A catalog message the registry lacks
//! is logged as a warning and left out of the table.

use std::path::{Path, PathBuf};

use navlink_core::protocol::FieldType;
use navlink_core::{Catalog, Dialect};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::application::ArtifactExtractor;
use crate::domain::{MessageDescriptor, SourceTable, SourceUnavailable};

/// Size assumed for a field type the size table does not know.
pub const UNKNOWN_FIELD_SIZE: usize = 4;

/// One message class as a runtime registry describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryClass {
    pub id: u32,
    pub name: String,
    pub crc_extra: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_format: Option<String>,
    #[serde(default, rename = "fieldtypes")]
    pub field_types: Vec<String>,
}

impl RegistryClass {
    /// Maximum payload length: from the native format when it parses to a
    /// non-zero size, otherwise from the field types.
    pub fn max_length(&self) -> usize {
        self.native_format
            .as_deref()
            .and_then(length_from_native_format)
            .filter(|&len| len > 0)
            .unwrap_or_else(|| length_from_field_types(&self.field_types))
    }
}

/// A source of message classes indexed by id.
pub trait ProtocolRegistry {
    /// The class registered for `id`, if any.
    fn class_for(&self, id: u32) -> Option<RegistryClass>;
}

impl ProtocolRegistry for Dialect {
    fn class_for(&self, id: u32) -> Option<RegistryClass> {
        self.get(id).map(|def| RegistryClass {
            id: def.id,
            name: def.name.to_string(),
            crc_extra: def.crc_extra,
            native_format: Some(def.native_format()),
            field_types: def.field_types(),
        })
    }
}

/// A registry exported from a foreign runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryDump {
    pub messages: Vec<RegistryClass>,
}

impl RegistryDump {
    /// Reads and parses a dump file.
    ///
    /// # Errors
    ///
    /// Returns [`SourceUnavailable`] if the file is missing, unreadable, or not
    /// a valid dump.
    pub fn load(path: &Path) -> Result<Self, SourceUnavailable> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SourceUnavailable::Missing {
                    path: path.to_path_buf(),
                }
            } else {
                SourceUnavailable::Io {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        serde_json::from_str(&content).map_err(|source| SourceUnavailable::InvalidDump {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl ProtocolRegistry for RegistryDump {
    fn class_for(&self, id: u32) -> Option<RegistryClass> {
        self.messages.iter().find(|c| c.id == id).cloned()
    }
}

/// Builds a [`SourceTable`] for the catalog from any registry.
///
/// # Errors
///
/// Returns [`SourceUnavailable::NoCatalogEntries`] if the registry has none of
/// the catalog messages.
pub fn extract_from_registry(
    registry: &dyn ProtocolRegistry,
    catalog: &Catalog,
    location: &str,
) -> Result<SourceTable, SourceUnavailable> {
    let mut table = SourceTable::new();
    for entry in catalog.all() {
        let Some(class) = registry.class_for(entry.id) else {
            warn!("{} not found in runtime registry", entry.name);
            continue;
        };
        if class.name != entry.name {
            warn!(
                id = entry.id,
                "runtime registry names id {} {}, catalog says {}", entry.id, class.name, entry.name
            );
            continue;
        }
        let length = class.max_length();
        debug!(name = %entry.name, crc = class.crc_extra, length, "registry class");
        table.insert(
            entry.id,
            MessageDescriptor {
                id: entry.id,
                name: entry.name.clone(),
                integrity_code: class.crc_extra,
                length,
            },
        );
    }
    if table.is_empty() {
        return Err(SourceUnavailable::NoCatalogEntries {
            location: location.to_string(),
        });
    }
    Ok(table)
}

// ── Extractor ─────────────────────────────────────────────────────────────────

/// Where the runtime registry comes from.
#[derive(Debug, Clone)]
pub enum RegistrySource {
    Builtin(Dialect),
    Dump(PathBuf),
}

/// The runtime-registry extraction strategy.
#[derive(Debug, Clone)]
pub struct RegistryExtractor {
    name: String,
    source: RegistrySource,
}

impl RegistryExtractor {
    /// Reads the built-in dialect.
    pub fn builtin(dialect: Dialect) -> Self {
        Self {
            name: "runtime".to_string(),
            source: RegistrySource::Builtin(dialect),
        }
    }

    /// Reads an exported registry dump.
    pub fn dump(path: impl Into<PathBuf>) -> Self {
        Self {
            name: "runtime".to_string(),
            source: RegistrySource::Dump(path.into()),
        }
    }
}

impl ArtifactExtractor for RegistryExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn location(&self) -> String {
        match &self.source {
            RegistrySource::Builtin(_) => "built-in dialect".to_string(),
            RegistrySource::Dump(path) => path.display().to_string(),
        }
    }

    fn extract(&self, catalog: &Catalog) -> Result<SourceTable, SourceUnavailable> {
        let location = self.location();
        match &self.source {
            RegistrySource::Builtin(dialect) => extract_from_registry(dialect, catalog, &location),
            RegistrySource::Dump(path) => {
                let dump = RegistryDump::load(path)?;
                extract_from_registry(&dump, catalog, &location)
            }
        }
    }
}

// ── Length tallies ────────────────────────────────────────────────────────────

/// Byte size of a struct-style format string with standard sizes.
///
/// A leading byte-order mark (`<`, `>`, `!`, `=`) is accepted.  `s` and `Z`
/// count one byte per repetition.  Returns `None` for an unknown code, a
/// dangling repeat count, or native-alignment mode (`@`).
pub fn length_from_native_format(format: &str) -> Option<usize> {
    let body = match format.chars().next() {
        Some('<' | '>' | '!' | '=') => &format[1..],
        Some('@') => return None,
        _ => format,
    };

    let mut total = 0usize;
    let mut count: Option<usize> = None;
    for c in body.chars() {
        if let Some(digit) = c.to_digit(10) {
            count = Some(count.unwrap_or(0).checked_mul(10)?.checked_add(digit as usize)?);
            continue;
        }
        if c.is_whitespace() {
            continue;
        }
        let size: usize = match c {
            'x' | 'c' | 'b' | 'B' | '?' | 's' | 'Z' | 'p' => 1,
            'h' | 'H' | 'e' => 2,
            'i' | 'I' | 'l' | 'L' | 'f' => 4,
            'q' | 'Q' | 'd' => 8,
            _ => return None,
        };
        let repeated = size.checked_mul(count.take().unwrap_or(1))?;
        total = total.checked_add(repeated)?;
    }
    if count.is_some() {
        return None;
    }
    Some(total)
}

/// Byte size of a C field-type list such as `["uint32_t", "float[8]"]`.
///
/// Unknown base types count [`UNKNOWN_FIELD_SIZE`] bytes per element; a
/// malformed array count is treated as one element.  The tally saturates at
/// `usize::MAX` instead of overflowing.
pub fn length_from_field_types(types: &[String]) -> usize {
    types
        .iter()
        .fold(0usize, |total, t| total.saturating_add(field_type_size(t)))
}

fn field_type_size(ty: &str) -> usize {
    let (base, count) = match ty.split_once('[') {
        Some((base, rest)) => {
            let count = rest.trim_end_matches(']').trim().parse::<usize>().unwrap_or(1);
            (base.trim(), count)
        }
        None => (ty.trim(), 1),
    };
    let size = FieldType::from_c_name(base).map_or(UNKNOWN_FIELD_SIZE, FieldType::size);
    size.saturating_mul(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use navlink_core::CatalogEntry;
    use std::io::Write;

    #[test]
    fn test_native_format_lengths() {
        assert_eq!(length_from_native_format("<IIHH"), Some(12));
        assert_eq!(length_from_native_format("<II8f8f8fHH8HB8B"), Some(133));
        assert_eq!(length_from_native_format("IIHH"), Some(12));
        assert_eq!(length_from_native_format("<4sZ"), Some(5));
    }

    #[test]
    fn test_native_format_rejects_unknown_code_and_dangling_count() {
        assert_eq!(length_from_native_format("<IY"), None);
        assert_eq!(length_from_native_format("<I8"), None);
        assert_eq!(length_from_native_format("@II"), None);
    }

    #[test]
    fn test_native_format_overflow_is_rejected() {
        assert_eq!(length_from_native_format("<9999999999999999999Q"), None);
        assert_eq!(
            length_from_native_format(&format!("<{}BI", usize::MAX)),
            None
        );
    }

    #[test]
    fn test_field_types_overflow_saturates() {
        // Arrange
        let huge = vec![format!("uint64_t[{}]", usize::MAX / 2)];
        let two_huge = vec![
            format!("uint64_t[{}]", usize::MAX / 4),
            format!("uint8_t[{}]", usize::MAX),
        ];

        // Act / Assert
        assert_eq!(length_from_field_types(&huge), usize::MAX);
        assert_eq!(length_from_field_types(&two_huge), usize::MAX);
    }

    #[test]
    fn test_oversized_format_falls_back_to_field_types() {
        // Arrange
        let class = RegistryClass {
            id: 25002,
            name: "CHECK_IN".to_string(),
            crc_extra: 153,
            native_format: Some("<9999999999999999999Q".to_string()),
            field_types: vec!["uint32_t".to_string(), "uint16_t".to_string()],
        };

        // Act / Assert
        assert_eq!(class.max_length(), 6);
    }

    #[test]
    fn test_field_types_length_with_arrays_and_unknown_types() {
        // Arrange
        let types: Vec<String> = ["uint32_t", "float[8]", "uint8_t_mavlink_version", "mystery_t"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        // Act
        let len = length_from_field_types(&types);

        // Assert – 4 + 32 + 1 + 4
        assert_eq!(len, 41);
    }

    #[test]
    fn test_max_length_falls_back_when_format_is_empty() {
        let class = RegistryClass {
            id: 25002,
            name: "CHECK_IN".to_string(),
            crc_extra: 153,
            native_format: Some("<".to_string()),
            field_types: vec!["uint32_t".to_string(), "uint16_t".to_string()],
        };
        assert_eq!(class.max_length(), 6);
    }

    #[test]
    fn test_builtin_registry_covers_catalog() {
        // Arrange
        let catalog = Catalog::navlink();
        let extractor = RegistryExtractor::builtin(Dialect::navlink());

        // Act
        let table = extractor.extract(&catalog).unwrap();

        // Assert
        assert_eq!(table.len(), catalog.len());
        assert_eq!(table[&25002].integrity_code, 153);
        assert_eq!(table[&25002].length, 12);
        assert_eq!(table[&25104].length, 133);
        assert_eq!(table[&25300].integrity_code, 107);
    }

    #[test]
    fn test_builtin_registry_length_matches_field_type_tally() {
        let catalog = Catalog::navlink();
        let dialect = Dialect::navlink();
        for entry in catalog.all() {
            let class = dialect.class_for(entry.id).unwrap();
            assert_eq!(
                length_from_field_types(&class.field_types),
                class.max_length(),
                "{}",
                entry.name
            );
        }
    }

    #[test]
    fn test_registry_missing_class_is_skipped() {
        // Arrange – catalog with one entry the dialect does not define
        let catalog = Catalog::new(vec![
            CatalogEntry::new("CHECK_IN", 25002),
            CatalogEntry::new("NOT_DEFINED", 29999),
        ])
        .unwrap();

        // Act
        let table = extract_from_registry(&Dialect::navlink(), &catalog, "test").unwrap();

        // Assert
        assert_eq!(table.keys().copied().collect::<Vec<_>>(), vec![25002]);
    }

    #[test]
    fn test_registry_dump_is_read_and_filtered() {
        // Arrange
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"messages":[
                {{"id":25002,"name":"CHECK_IN","crc_extra":100,"fieldtypes":["uint32_t","uint32_t","uint16_t","uint16_t"]}},
                {{"id":0,"name":"HEARTBEAT","crc_extra":50,"native_format":"<IBBBBB","fieldtypes":[]}}
            ]}}"#
        )
        .unwrap();
        let extractor = RegistryExtractor::dump(file.path());

        // Act
        let table = extractor.extract(&Catalog::navlink()).unwrap();

        // Assert
        assert_eq!(table.len(), 1);
        assert_eq!(
            table[&25002],
            MessageDescriptor {
                id: 25002,
                name: "CHECK_IN".to_string(),
                integrity_code: 100,
                length: 12
            }
        );
    }

    #[test]
    fn test_missing_dump_is_unavailable() {
        let extractor = RegistryExtractor::dump("/nonexistent/registry.json");
        let result = extractor.extract(&Catalog::navlink());
        assert!(matches!(result, Err(SourceUnavailable::Missing { .. })));
    }

    #[test]
    fn test_malformed_dump_is_unavailable() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();

        let result = RegistryExtractor::dump(file.path()).extract(&Catalog::navlink());

        assert!(matches!(result, Err(SourceUnavailable::InvalidDump { .. })));
    }
}
