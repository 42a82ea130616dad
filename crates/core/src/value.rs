// SPDX-License-Identifier: MIT

//! The typed scalar carrier (§6 "Value encoding").

use serde::{Deserialize, Serialize};

/// A typed value attached to a data tree leaf / leaf-list entry, or a marker
/// for container/list instances which carry no scalar payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Value {
    Container,
    List,
    String(String),
    Binary(Vec<u8>),
    Enum(String),
    Bits(Vec<String>),
    Bool(bool),
    Empty,
    IdentityRef(String),
    InstanceId(String),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    /// An integer mantissa plus an implicit per-schema `fraction-digits` scale.
    Decimal64 { mantissa: i64, scale: u8 },
}

impl Value {
    /// The `type` discriminant name as it appears on the wire (§6).
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Container => "CONTAINER",
            Value::List => "LIST",
            Value::String(_) => "STRING",
            Value::Binary(_) => "BINARY",
            Value::Enum(_) => "ENUM",
            Value::Bits(_) => "BITS",
            Value::Bool(_) => "BOOL",
            Value::Empty => "EMPTY",
            Value::IdentityRef(_) => "IDENTITYREF",
            Value::InstanceId(_) => "INSTANCE_ID",
            Value::Int8(_) => "INT8",
            Value::Int16(_) => "INT16",
            Value::Int32(_) => "INT32",
            Value::Int64(_) => "INT64",
            Value::Uint8(_) => "UINT8",
            Value::Uint16(_) => "UINT16",
            Value::Uint32(_) => "UINT32",
            Value::Uint64(_) => "UINT64",
            Value::Decimal64 { .. } => "DECIMAL64",
        }
    }

    /// Render the decimal64 value as `{mantissa} / 10^{scale}`, for display only.
    pub fn decimal64_as_f64(mantissa: i64, scale: u8) -> f64 {
        mantissa as f64 / 10f64.powi(scale as i32)
    }

    /// Parse a string into a value of the given schema-derived kind. Used by
    /// `set_item` when the wire carries a string representation (e.g. from a
    /// CLI) that must be coerced to the node's declared type.
    pub fn parse_as(kind_name: &str, raw: &str, scale: u8) -> Result<Value, String> {
        Ok(match kind_name {
            "STRING" => Value::String(raw.to_string()),
            "BOOL" => Value::Bool(raw.parse().map_err(|_| format!("invalid bool: {raw}"))?),
            "EMPTY" => Value::Empty,
            "ENUM" => Value::Enum(raw.to_string()),
            "IDENTITYREF" => Value::IdentityRef(raw.to_string()),
            "INSTANCE_ID" => Value::InstanceId(raw.to_string()),
            "INT8" => Value::Int8(raw.parse().map_err(|_| format!("invalid int8: {raw}"))?),
            "INT16" => Value::Int16(raw.parse().map_err(|_| format!("invalid int16: {raw}"))?),
            "INT32" => Value::Int32(raw.parse().map_err(|_| format!("invalid int32: {raw}"))?),
            "INT64" => Value::Int64(raw.parse().map_err(|_| format!("invalid int64: {raw}"))?),
            "UINT8" => Value::Uint8(raw.parse().map_err(|_| format!("invalid uint8: {raw}"))?),
            "UINT16" => Value::Uint16(raw.parse().map_err(|_| format!("invalid uint16: {raw}"))?),
            "UINT32" => Value::Uint32(raw.parse().map_err(|_| format!("invalid uint32: {raw}"))?),
            "UINT64" => Value::Uint64(raw.parse().map_err(|_| format!("invalid uint64: {raw}"))?),
            "DECIMAL64" => {
                let parsed: f64 = raw.parse().map_err(|_| format!("invalid decimal64: {raw}"))?;
                let mantissa = (parsed * 10f64.powi(scale as i32)).round() as i64;
                Value::Decimal64 { mantissa, scale }
            }
            other => return Err(format!("unsupported value kind: {other}")),
        })
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Container | Value::List => write!(f, ""),
            Value::String(s) | Value::Enum(s) | Value::IdentityRef(s) | Value::InstanceId(s) => {
                write!(f, "{s}")
            }
            Value::Binary(b) => write!(f, "{}", b.iter().map(|b| format!("{b:02x}")).collect::<String>()),
            Value::Bits(bits) => write!(f, "{}", bits.join(" ")),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Empty => write!(f, ""),
            Value::Int8(v) => write!(f, "{v}"),
            Value::Int16(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Uint8(v) => write!(f, "{v}"),
            Value::Uint16(v) => write!(f, "{v}"),
            Value::Uint32(v) => write!(f, "{v}"),
            Value::Uint64(v) => write!(f, "{v}"),
            Value::Decimal64 { mantissa, scale } => write!(f, "{}", Value::decimal64_as_f64(*mantissa, *scale)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal64_round_trips_through_string() {
        let v = Value::parse_as("DECIMAL64", "48.1486", 4).unwrap();
        assert_eq!(v, Value::Decimal64 { mantissa: 481486, scale: 4 });
        assert_eq!(v.to_string(), "48.1486");
    }

    #[test]
    fn kind_name_matches_wire_discriminant() {
        assert_eq!(Value::String("x".into()).kind_name(), "STRING");
        assert_eq!(Value::Uint32(1).kind_name(), "UINT32");
    }
}
