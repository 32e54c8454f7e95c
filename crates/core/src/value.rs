//! Value types and value codecs
//!
//! This module defines:
//! - Value: the field/key value model exchanged with entities
//! - ValueCodec: per-type serializer used for key components and column payloads
//!
//! ## Type Rules
//!
//! - No implicit coercions: a `Long` codec rejects an `Int` value
//! - `Null` is absence; codecs never serialize it
//! - Double uses IEEE-754 equality: `NaN != NaN`, `-0.0 == 0.0`

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Value of one mapped field or one key component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// Absent value
    Null,
    /// Boolean
    Bool(bool),
    /// 32-bit signed integer
    Int(i32),
    /// 64-bit signed integer (also the counter representation)
    Long(i64),
    /// 64-bit floating point (IEEE-754)
    Double(f64),
    /// UTF-8 text
    Text(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// UUID
    Uuid(Uuid),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Uuid(a), Value::Uuid(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Long(_) => "Long",
            Value::Double(_) => "Double",
            Value::Text(_) => "Text",
            Value::Bytes(_) => "Bytes",
            Value::Uuid(_) => "Uuid",
        }
    }

    /// Check if this is a null value
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get as i64 if this is a Long
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as &str if this is Text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{:?}", v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Uuid(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Serializer for one value type
///
/// Each key component and each mapped column declares one codec at
/// metadata-build time. Every byte form sorts as unsigned bytes in the
/// same order as its values, so composite names compare without knowing
/// their component types:
///
/// - Bool: one byte, 0x00 or 0x01
/// - Int / Long: big-endian, fixed width, sign bit flipped
/// - Double: big-endian IEEE-754 bits; sign bit flipped for non-negative
///   values, all bits inverted for negative ones
/// - Text: UTF-8 bytes
/// - Bytes: verbatim
/// - Uuid: 16 raw bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueCodec {
    /// Boolean codec
    Bool,
    /// 32-bit integer codec
    Int,
    /// 64-bit integer codec
    Long,
    /// 64-bit float codec
    Double,
    /// UTF-8 text codec
    Text,
    /// Raw bytes codec
    Bytes,
    /// UUID codec
    Uuid,
}

impl ValueCodec {
    /// Codec name, as used in logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            ValueCodec::Bool => "Bool",
            ValueCodec::Int => "Int",
            ValueCodec::Long => "Long",
            ValueCodec::Double => "Double",
            ValueCodec::Text => "Text",
            ValueCodec::Bytes => "Bytes",
            ValueCodec::Uuid => "Uuid",
        }
    }

    /// Serialize a non-null value of this codec's type
    pub fn serialize(&self, value: &Value) -> Result<Vec<u8>> {
        match (self, value) {
            (ValueCodec::Bool, Value::Bool(v)) => Ok(vec![u8::from(*v)]),
            (ValueCodec::Int, Value::Int(v)) => {
                let mut buf = vec![0u8; 4];
                BigEndian::write_u32(&mut buf, (*v as u32) ^ INT_SIGN);
                Ok(buf)
            }
            (ValueCodec::Long, Value::Long(v)) => {
                let mut buf = vec![0u8; 8];
                BigEndian::write_u64(&mut buf, (*v as u64) ^ LONG_SIGN);
                Ok(buf)
            }
            (ValueCodec::Double, Value::Double(v)) => {
                let mut buf = vec![0u8; 8];
                BigEndian::write_u64(&mut buf, double_to_ordered(*v));
                Ok(buf)
            }
            (ValueCodec::Text, Value::Text(v)) => Ok(v.as_bytes().to_vec()),
            (ValueCodec::Bytes, Value::Bytes(v)) => Ok(v.clone()),
            (ValueCodec::Uuid, Value::Uuid(v)) => Ok(v.as_bytes().to_vec()),
            (codec, value) => Err(Error::serialization(format!(
                "{} codec cannot serialize a {} value",
                codec.name(),
                value.type_name()
            ))),
        }
    }

    /// Deserialize bytes produced by [`ValueCodec::serialize`]
    pub fn deserialize(&self, bytes: &[u8]) -> Result<Value> {
        let expect_len = |len: usize| -> Result<()> {
            if bytes.len() == len {
                Ok(())
            } else {
                Err(Error::serialization(format!(
                    "{} codec expects {} bytes, got {}",
                    self.name(),
                    len,
                    bytes.len()
                )))
            }
        };

        match self {
            ValueCodec::Bool => {
                expect_len(1)?;
                match bytes[0] {
                    0 => Ok(Value::Bool(false)),
                    1 => Ok(Value::Bool(true)),
                    other => Err(Error::serialization(format!(
                        "invalid boolean byte 0x{:02x}",
                        other
                    ))),
                }
            }
            ValueCodec::Int => {
                expect_len(4)?;
                Ok(Value::Int((BigEndian::read_u32(bytes) ^ INT_SIGN) as i32))
            }
            ValueCodec::Long => {
                expect_len(8)?;
                Ok(Value::Long((BigEndian::read_u64(bytes) ^ LONG_SIGN) as i64))
            }
            ValueCodec::Double => {
                expect_len(8)?;
                Ok(Value::Double(double_from_ordered(BigEndian::read_u64(bytes))))
            }
            ValueCodec::Text => String::from_utf8(bytes.to_vec())
                .map(Value::Text)
                .map_err(|e| Error::serialization(format!("invalid UTF-8 text: {}", e))),
            ValueCodec::Bytes => Ok(Value::Bytes(bytes.to_vec())),
            ValueCodec::Uuid => Uuid::from_slice(bytes)
                .map(Value::Uuid)
                .map_err(|e| Error::serialization(format!("invalid uuid: {}", e))),
        }
    }
}

const INT_SIGN: u32 = 1 << 31;
const LONG_SIGN: u64 = 1 << 63;

fn double_to_ordered(v: f64) -> u64 {
    let bits = v.to_bits();
    if bits & LONG_SIGN == 0 {
        bits ^ LONG_SIGN
    } else {
        !bits
    }
}

fn double_from_ordered(bits: u64) -> f64 {
    if bits & LONG_SIGN != 0 {
        f64::from_bits(bits ^ LONG_SIGN)
    } else {
        f64::from_bits(!bits)
    }
}
