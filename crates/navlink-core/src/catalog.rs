//! The navlink message catalog.
//!
//! The catalog is the single source of truth for which custom messages exist
//! and which numeric identifier each one carries.  Both the consistency
//! checker and the conformance harness receive a [`Catalog`] value built once
//! in `main`; nothing reads a global table.
//!
//! Renaming or renumbering a message here changes what the extractors look for
//! and which message the harness builds, with no other code to touch.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a catalog is assembled from entries.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// Two entries share the same name.
    #[error("duplicate catalog name: {0}")]
    DuplicateName(String),

    /// Two entries share the same numeric identifier.
    #[error("duplicate catalog id {id} ({first} and {second})")]
    DuplicateId {
        id: u32,
        first: String,
        second: String,
    },
}

/// One custom message type: its logical name and wire identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Upper-case message name, e.g. `CHECK_IN`.
    pub name: String,
    /// Numeric message id carried in the frame header.
    pub id: u32,
}

impl CatalogEntry {
    /// Creates an entry.
    pub fn new(name: impl Into<String>, id: u32) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }
}

/// The navlink messages shipped with this build, in id order.
const NAVLINK_ENTRIES: &[(&str, u32)] = &[
    ("CHECK_IN", 25002),
    ("CHECK_OUT", 25003),
    ("SWARM_HEARTBEAT", 25004),
    ("AVAILABLE_TASK_REQUEST", 25104),
    ("AVAILABLE_TASK_RESPONSE", 25105),
    ("TASK_ASSIGN_REQUEST", 25106),
    ("TASK_ASSIGN_RESPONSE", 25107),
    ("TASK_CONFIRM_REQUEST", 25108),
    ("TASK_CONFIRM_RESPONSE", 25109),
    ("SLOT_HEARTBEAT", 25200),
    ("SLOT_CLAIM", 25201),
    ("VOTE_PHASE", 25202),
    ("SEARCH_STATUS", 25300),
];

/// An immutable set of [`CatalogEntry`] values with unique names and ids.
///
/// Entries are kept sorted by id so that every iteration over the catalog is
/// deterministic.
///
/// # Examples
///
/// ```rust
/// use navlink_core::Catalog;
///
/// let catalog = Catalog::navlink();
/// assert_eq!(catalog.lookup("CHECK_IN"), Some(25002));
/// assert_eq!(catalog.name_of(25300), Some("SEARCH_STATUS"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Builds a catalog from arbitrary entries.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if two entries share a name or an id.
    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self, CatalogError> {
        let mut entries = entries;
        entries.sort_by_key(|e| e.id);

        for pair in entries.windows(2) {
            if pair[0].id == pair[1].id {
                return Err(CatalogError::DuplicateId {
                    id: pair[0].id,
                    first: pair[0].name.clone(),
                    second: pair[1].name.clone(),
                });
            }
        }
        for (i, entry) in entries.iter().enumerate() {
            if entries[..i].iter().any(|e| e.name == entry.name) {
                return Err(CatalogError::DuplicateName(entry.name.clone()));
            }
        }

        Ok(Self { entries })
    }

    /// The fixed navlink catalog.
    pub fn navlink() -> Self {
        Self {
            entries: NAVLINK_ENTRIES
                .iter()
                .map(|(name, id)| CatalogEntry::new(*name, *id))
                .collect(),
        }
    }

    /// Returns the id registered for `name`, if any.
    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.id)
    }

    /// Returns the name registered for `id`, if any.
    pub fn name_of(&self, id: u32) -> Option<&str> {
        self.entries
            .binary_search_by_key(&id, |e| e.id)
            .ok()
            .map(|i| self.entries[i].name.as_str())
    }

    /// Returns `true` if `id` belongs to the catalog.
    pub fn contains(&self, id: u32) -> bool {
        self.name_of(id).is_some()
    }

    /// All entries, sorted by id.
    pub fn all(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the catalog has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
