//! `key=value` parameter parsing for the command line.
//!
//! Values are typed by sniffing their text, in this order:
//!
//! | Text                                  | Value              |
//! |---------------------------------------|--------------------|
//! | contains `.`                          | float (else text)  |
//! | all digits, or `-` then all digits    | integer (else text)|
//! | `true` / `false`, any case            | boolean            |
//! | anything else                         | text               |
//!
//! The message builder then coerces each sniffed value to its field type.

use std::collections::BTreeMap;

use navlink_core::FieldValue;
use tracing::debug;

/// Types one raw value by the sniffing rule above.
pub fn sniff_value(raw: &str) -> FieldValue {
    if raw.contains('.') {
        return raw
            .parse::<f64>()
            .map_or_else(|_| FieldValue::Text(raw.to_string()), FieldValue::Float);
    }
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return raw
            .parse::<i64>()
            .map_or_else(|_| FieldValue::Text(raw.to_string()), FieldValue::Int);
    }
    match raw.to_ascii_lowercase().as_str() {
        "true" => FieldValue::Bool(true),
        "false" => FieldValue::Bool(false),
        _ => FieldValue::Text(raw.to_string()),
    }
}

/// Parses `key=value` arguments; entries without `=` are skipped.
///
/// Only the first `=` splits, so values may contain `=`.  A repeated key
/// keeps the last value.
///
/// # Examples
///
/// ```rust
/// use navlink_core::FieldValue;
/// use navlink_msg_test::domain::parse_params;
///
/// let params = parse_params(["boot_id=123", "lat=40.31", "verbose"]);
/// assert_eq!(params["boot_id"], FieldValue::Int(123));
/// assert_eq!(params["lat"], FieldValue::Float(40.31));
/// assert_eq!(params.len(), 2);
/// ```
pub fn parse_params<I, S>(args: I) -> BTreeMap<String, FieldValue>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut params = BTreeMap::new();
    for arg in args {
        let arg = arg.as_ref();
        let Some((key, value)) = arg.split_once('=') else {
            debug!(arg, "ignoring parameter without '='");
            continue;
        };
        params.insert(key.to_string(), sniff_value(value));
    }
    params
}
