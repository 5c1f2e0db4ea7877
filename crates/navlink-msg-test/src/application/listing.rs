//! `--list`: the navlink catalog as the dialect sees it.

use std::fmt::Write as _;

use navlink_core::{Catalog, Dialect};

/// One catalog entry, with its parameters if the dialect defines it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedMessage {
    pub name: String,
    pub id: u32,
    pub parameters: Option<Vec<&'static str>>,
}

/// Catalog entries in ascending id order.
pub fn list_messages(catalog: &Catalog, dialect: &Dialect) -> Vec<ListedMessage> {
    let mut listed: Vec<ListedMessage> = catalog
        .all()
        .iter()
        .map(|entry| ListedMessage {
            name: entry.name.clone(),
            id: entry.id,
            parameters: dialect.get(entry.id).map(|def| def.parameter_names()),
        })
        .collect();
    listed.sort_by_key(|m| m.id);
    listed
}

pub fn render_listing(messages: &[ListedMessage]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Available navlink messages:");
    let _ = writeln!(out, "{}", "-".repeat(60));
    for message in messages {
        match &message.parameters {
            Some(params) => {
                let _ = writeln!(out, "  {} (ID: {})", message.name, message.id);
                let _ = writeln!(out, "    Parameters: {}", params.join(", "));
            }
            None => {
                let _ = writeln!(
                    out,
                    "  {} (ID: {}) - NOT AVAILABLE IN DIALECT",
                    message.name, message.id
                );
            }
        }
    }
    out
}
