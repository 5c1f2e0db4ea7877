//! Typed message values built from, and decoded into, dialect definitions.
//!
//! A [`Message`] pairs a `&'static` [`MessageDef`] with one [`FieldValue`] per
//! field, stored in declaration order.  Values are normalised on the way in
//! so that a message built from user parameters compares equal to the same
//! message decoded from the wire:
//!
//! - integers are range-checked against the field type;
//! - `float` fields are narrowed to `f32` precision;
//! - booleans become 0/1;
//! - arrays are padded with zeros to their full length;
//! - `char[N]` fields hold text up to `N` bytes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::codec::ProtocolError;
use crate::protocol::dialect::{FieldDef, FieldType, MessageDef, HEARTBEAT};

/// `MAV_TYPE_GCS`: the harness identifies as a ground station.
pub const MAV_TYPE_GCS: i64 = 6;
/// `MAV_AUTOPILOT_INVALID`: not a flight controller.
pub const MAV_AUTOPILOT_INVALID: i64 = 8;
/// `MAV_STATE_ACTIVE`.
pub const MAV_STATE_ACTIVE: i64 = 4;
/// Protocol version byte carried in every HEARTBEAT.
pub const MAVLINK_VERSION: i64 = 3;

/// Errors raised while building a [`Message`] from named parameters.
///
/// Every variant carries the expected parameter names so that the caller can
/// show them to the user.
#[derive(Debug, Error, PartialEq)]
pub enum BuildError {
    #[error(
        "{message}: missing parameter(s) {}; expected: {}",
        .missing.join(", "),
        .expected.join(", ")
    )]
    MissingParameters {
        message: String,
        missing: Vec<String>,
        expected: Vec<String>,
    },

    #[error(
        "{message}: unexpected parameter(s) {}; expected: {}",
        .unknown.join(", "),
        .expected.join(", ")
    )]
    UnknownParameters {
        message: String,
        unknown: Vec<String>,
        expected: Vec<String>,
    },

    #[error("{message}.{field}: {reason}; expected: {}", .expected.join(", "))]
    InvalidValue {
        message: String,
        field: String,
        reason: String,
        expected: Vec<String>,
    },
}

impl BuildError {
    /// Constructor parameter names of the message being built.
    pub fn expected(&self) -> &[String] {
        match self {
            BuildError::MissingParameters { expected, .. }
            | BuildError::UnknownParameters { expected, .. }
            | BuildError::InvalidValue { expected, .. } => expected,
        }
    }
}

// ── Field values ──────────────────────────────────────────────────────────────

/// One field value.
///
/// Serialises untagged, so a field map renders as plain JSON
/// (`{"boot_id":123,"lat":47.5}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
}

impl FieldValue {
    /// Integer view of scalar integer and boolean values.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            FieldValue::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Float view of scalar numeric values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Text view.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            FieldValue::Int(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::Bool(_) => "boolean",
            FieldValue::Text(_) => "text",
            FieldValue::IntArray(_) => "integer array",
            FieldValue::FloatArray(_) => "float array",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Bool(v) => write!(f, "{v}"),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::IntArray(v) => write!(f, "{v:?}"),
            FieldValue::FloatArray(v) => write!(f, "{v:?}"),
        }
    }
}

// ── Message ───────────────────────────────────────────────────────────────────

/// A message instance: a definition plus one value per field.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    def: &'static MessageDef,
    /// Declaration order, parallel to `def.fields`.
    values: Vec<FieldValue>,
}

impl Message {
    /// Builds a message from named parameters.
    ///
    /// Every field must be supplied exactly once; values are coerced to the
    /// field types as described in the module docs.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] for unknown names, missing names, or values that
    /// cannot be represented by the field type.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::collections::BTreeMap;
    /// use navlink_core::protocol::{Dialect, FieldValue, Message};
    ///
    /// let dialect = Dialect::navlink();
    /// let def = dialect.by_name("CHECK_IN").unwrap();
    /// let params: BTreeMap<String, FieldValue> = [
    ///     ("boot_id", 123), ("msg_seq", 1), ("time_ms", 1000), ("ttl_ms", 5000),
    /// ]
    /// .into_iter()
    /// .map(|(k, v)| (k.to_string(), FieldValue::Int(v)))
    /// .collect();
    ///
    /// let msg = Message::build(def, &params).unwrap();
    /// assert_eq!(msg.get("ttl_ms"), Some(&FieldValue::Int(5000)));
    /// ```
    pub fn build(
        def: &'static MessageDef,
        params: &BTreeMap<String, FieldValue>,
    ) -> Result<Self, BuildError> {
        let expected: Vec<String> = def.parameter_names().iter().map(|s| s.to_string()).collect();

        let unknown: Vec<String> = params
            .keys()
            .filter(|k| def.field(k).is_none())
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(BuildError::UnknownParameters {
                message: def.name.to_string(),
                unknown,
                expected,
            });
        }

        let missing: Vec<String> = def
            .fields
            .iter()
            .filter(|f| !params.contains_key(f.name))
            .map(|f| f.name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(BuildError::MissingParameters {
                message: def.name.to_string(),
                missing,
                expected,
            });
        }

        let mut values = Vec::with_capacity(def.fields.len());
        for field in def.fields {
            let raw = params.get(field.name).ok_or_else(|| BuildError::MissingParameters {
                message: def.name.to_string(),
                missing: vec![field.name.to_string()],
                expected: expected.clone(),
            })?;
            let value = coerce(field, raw).map_err(|reason| BuildError::InvalidValue {
                message: def.name.to_string(),
                field: field.name.to_string(),
                reason,
                expected: expected.clone(),
            })?;
            values.push(value);
        }

        Ok(Self { def, values })
    }

    /// The HEARTBEAT a ground-station session emits.
    pub fn heartbeat() -> Self {
        Self {
            def: &HEARTBEAT,
            values: vec![
                FieldValue::Int(MAV_TYPE_GCS),
                FieldValue::Int(MAV_AUTOPILOT_INVALID),
                FieldValue::Int(0),
                FieldValue::Int(0),
                FieldValue::Int(MAV_STATE_ACTIVE),
                FieldValue::Int(MAVLINK_VERSION),
            ],
        }
    }

    /// Decodes a (possibly truncated) payload.
    ///
    /// Missing trailing bytes are treated as zeros, as the v2 framing strips
    /// them on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedPayload`] if the payload is longer
    /// than the definition allows.
    pub fn decode(def: &'static MessageDef, payload: &[u8]) -> Result<Self, ProtocolError> {
        let max = def.max_payload_len();
        if payload.len() > max {
            return Err(ProtocolError::MalformedPayload(format!(
                "{}: payload of {} bytes exceeds maximum {max}",
                def.name,
                payload.len()
            )));
        }
        let mut full = payload.to_vec();
        full.resize(max, 0);

        let mut values = vec![FieldValue::Int(0); def.fields.len()];
        let mut offset = 0;
        for index in def.wire_order() {
            let field = &def.fields[index];
            let size = field.wire_size();
            values[index] = read_field(field, &full[offset..offset + size]);
            offset += size;
        }

        Ok(Self { def, values })
    }

    /// Serialises the payload in wire order at full (untruncated) length.
    pub fn encode_payload(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.def.max_payload_len());
        for index in self.def.wire_order() {
            write_field(&mut buf, &self.def.fields[index], &self.values[index]);
        }
        buf
    }

    /// The message definition.
    pub fn def(&self) -> &'static MessageDef {
        self.def
    }

    /// Numeric message id.
    pub fn id(&self) -> u32 {
        self.def.id
    }

    /// Message type name, e.g. `CHECK_IN`.
    pub fn type_name(&self) -> &'static str {
        self.def.name
    }

    /// Value of the named field.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.def
            .fields
            .iter()
            .position(|f| f.name == name)
            .map(|i| &self.values[i])
    }

    /// Field values keyed by name.
    pub fn fields(&self) -> BTreeMap<String, FieldValue> {
        self.def
            .fields
            .iter()
            .zip(&self.values)
            .map(|(f, v)| (f.name.to_string(), v.clone()))
            .collect()
    }
}

// ── Coercion ──────────────────────────────────────────────────────────────────

fn coerce(field: &FieldDef, value: &FieldValue) -> Result<FieldValue, String> {
    if field.ty == FieldType::Char {
        coerce_text(field.array_len.max(1) as usize, value)
    } else if field.is_array() {
        coerce_array(field, value)
    } else {
        coerce_scalar(field.ty, value)
    }
}

fn coerce_scalar(ty: FieldType, value: &FieldValue) -> Result<FieldValue, String> {
    match (ty.int_range(), value) {
        (Some((lo, hi)), FieldValue::Int(v)) => {
            if *v < lo || *v > hi {
                Err(format!("{v} is out of range for {ty} ({lo}..={hi})"))
            } else {
                Ok(FieldValue::Int(*v))
            }
        }
        (Some(_), FieldValue::Bool(b)) => Ok(FieldValue::Int(i64::from(*b))),
        (None, FieldValue::Float(v)) => Ok(FieldValue::Float(narrow(ty, *v))),
        (None, FieldValue::Int(v)) => Ok(FieldValue::Float(narrow(ty, *v as f64))),
        _ => Err(format!("expected a {ty} value, got {}", value.kind())),
    }
}

fn coerce_text(capacity: usize, value: &FieldValue) -> Result<FieldValue, String> {
    let text = match value {
        FieldValue::Text(s) => s.clone(),
        FieldValue::Int(_) | FieldValue::Float(_) | FieldValue::Bool(_) => value.to_string(),
        _ => return Err(format!("expected text, got {}", value.kind())),
    };
    if text.len() > capacity {
        return Err(format!(
            "text of {} bytes exceeds capacity of {capacity}",
            text.len()
        ));
    }
    Ok(FieldValue::Text(text))
}

fn coerce_array(field: &FieldDef, value: &FieldValue) -> Result<FieldValue, String> {
    let len = field.array_len as usize;
    let items: Vec<FieldValue> = match value {
        FieldValue::IntArray(v) => v.iter().copied().map(FieldValue::Int).collect(),
        FieldValue::FloatArray(v) => v.iter().copied().map(FieldValue::Float).collect(),
        FieldValue::Text(s) => s
            .split(',')
            .map(|part| parse_element(part.trim()))
            .collect::<Result<_, _>>()?,
        FieldValue::Int(_) | FieldValue::Float(_) | FieldValue::Bool(_) => vec![value.clone()],
    };
    if items.len() > len {
        return Err(format!(
            "{} elements exceed array length {len}",
            items.len()
        ));
    }
    let coerced = items
        .iter()
        .map(|item| coerce_scalar(field.ty, item))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(pack_array(field.ty, &coerced, len))
}

fn parse_element(part: &str) -> Result<FieldValue, String> {
    part.parse::<i64>()
        .map(FieldValue::Int)
        .or_else(|_| part.parse::<f64>().map(FieldValue::Float))
        .map_err(|_| format!("'{part}' is not a number"))
}

fn pack_array(ty: FieldType, items: &[FieldValue], len: usize) -> FieldValue {
    if ty.is_float() {
        let mut out: Vec<f64> = items.iter().filter_map(FieldValue::as_f64).collect();
        out.resize(len, 0.0);
        FieldValue::FloatArray(out)
    } else {
        let mut out: Vec<i64> = items.iter().filter_map(FieldValue::as_i64).collect();
        out.resize(len, 0);
        FieldValue::IntArray(out)
    }
}

fn narrow(ty: FieldType, v: f64) -> f64 {
    if ty == FieldType::F32 {
        v as f32 as f64
    } else {
        v
    }
}

// ── Wire encoding ─────────────────────────────────────────────────────────────

fn write_field(buf: &mut Vec<u8>, field: &FieldDef, value: &FieldValue) {
    match value {
        FieldValue::Text(s) => {
            let mut bytes = s.as_bytes().to_vec();
            bytes.resize(field.wire_size(), 0);
            buf.extend_from_slice(&bytes);
        }
        FieldValue::IntArray(items) => {
            for v in items {
                write_int(buf, field.ty, *v);
            }
        }
        FieldValue::FloatArray(items) => {
            for v in items {
                write_float(buf, field.ty, *v);
            }
        }
        FieldValue::Int(v) => write_int(buf, field.ty, *v),
        FieldValue::Bool(b) => write_int(buf, field.ty, i64::from(*b)),
        FieldValue::Float(v) => write_float(buf, field.ty, *v),
    }
}

fn write_int(buf: &mut Vec<u8>, ty: FieldType, v: i64) {
    match ty {
        FieldType::U8 | FieldType::Char => buf.push(v as u8),
        FieldType::I8 => buf.push(v as i8 as u8),
        FieldType::U16 => buf.extend_from_slice(&(v as u16).to_le_bytes()),
        FieldType::I16 => buf.extend_from_slice(&(v as i16).to_le_bytes()),
        FieldType::U32 => buf.extend_from_slice(&(v as u32).to_le_bytes()),
        FieldType::I32 => buf.extend_from_slice(&(v as i32).to_le_bytes()),
        FieldType::U64 => buf.extend_from_slice(&(v as u64).to_le_bytes()),
        FieldType::I64 => buf.extend_from_slice(&v.to_le_bytes()),
        FieldType::F32 | FieldType::F64 => write_float(buf, ty, v as f64),
    }
}

fn write_float(buf: &mut Vec<u8>, ty: FieldType, v: f64) {
    match ty {
        FieldType::F32 => buf.extend_from_slice(&(v as f32).to_le_bytes()),
        FieldType::F64 => buf.extend_from_slice(&v.to_le_bytes()),
        _ => write_int(buf, ty, v as i64),
    }
}

// ── Wire decoding ─────────────────────────────────────────────────────────────

fn read_field(field: &FieldDef, bytes: &[u8]) -> FieldValue {
    if field.ty == FieldType::Char {
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        return FieldValue::Text(String::from_utf8_lossy(&bytes[..end]).into_owned());
    }
    if !field.is_array() {
        return read_scalar(field.ty, bytes);
    }
    let items: Vec<FieldValue> = bytes
        .chunks_exact(field.ty.size())
        .map(|chunk| read_scalar(field.ty, chunk))
        .collect();
    pack_array(field.ty, &items, field.array_len as usize)
}

fn read_scalar(ty: FieldType, bytes: &[u8]) -> FieldValue {
    match ty {
        FieldType::U8 | FieldType::Char => FieldValue::Int(i64::from(bytes[0])),
        FieldType::I8 => FieldValue::Int(i64::from(bytes[0] as i8)),
        FieldType::U16 => FieldValue::Int(i64::from(u16::from_le_bytes(le(bytes)))),
        FieldType::I16 => FieldValue::Int(i64::from(i16::from_le_bytes(le(bytes)))),
        FieldType::U32 => FieldValue::Int(i64::from(u32::from_le_bytes(le(bytes)))),
        FieldType::I32 => FieldValue::Int(i64::from(i32::from_le_bytes(le(bytes)))),
        FieldType::U64 => FieldValue::Int(u64::from_le_bytes(le(bytes)) as i64),
        FieldType::I64 => FieldValue::Int(i64::from_le_bytes(le(bytes))),
        FieldType::F32 => FieldValue::Float(f64::from(f32::from_le_bytes(le(bytes)))),
        FieldType::F64 => FieldValue::Float(f64::from_le_bytes(le(bytes))),
    }
}

/// Copies the first `N` bytes into an array; callers slice by field size.
fn le<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
