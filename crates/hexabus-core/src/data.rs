//! Typed endpoint values
//!
//! Every endpoint on a device carries one value of a fixed [`DataKind`]. On
//! the wire a value is its endpoint id, a one-byte kind code and a
//! kind-specific number of bytes.

use crate::registry::Coded;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of the fixed text field
pub const TEXT_LEN: usize = 128;

/// Value kind codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum DataKind {
    Unknown = 0,
    Bool = 1,
    UInt8 = 2,
    UInt32 = 3,
    DateTime = 4,
    Float = 5,
    Text = 6,
    Timestamp = 7,
}

impl DataKind {
    /// All value kinds, in wire-code order
    pub const ALL: [DataKind; 8] = [
        DataKind::Unknown,
        DataKind::Bool,
        DataKind::UInt8,
        DataKind::UInt32,
        DataKind::DateTime,
        DataKind::Float,
        DataKind::Text,
        DataKind::Timestamp,
    ];

    /// Number of value bytes following the kind code
    pub const fn width(self) -> usize {
        match self {
            DataKind::Unknown => 0,
            DataKind::Bool | DataKind::UInt8 => 1,
            DataKind::UInt32 | DataKind::Float => 4,
            DataKind::DateTime | DataKind::Timestamp => 8,
            DataKind::Text => TEXT_LEN,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            DataKind::Unknown => "unknown",
            DataKind::Bool => "bool",
            DataKind::UInt8 => "uint8",
            DataKind::UInt32 => "uint32",
            DataKind::DateTime => "datetime",
            DataKind::Float => "float",
            DataKind::Text => "text",
            DataKind::Timestamp => "timestamp",
        }
    }
}

impl Coded for DataKind {
    fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Calendar components as sent by the device clock.
///
/// The fields are kept exactly as they appear on the wire; no time zone or
/// calendar normalisation is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DateTime {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub day: u8,
    /// 1-based month
    pub month: u8,
    pub year: u16,
    /// 0 = Sunday
    pub weekday: u8,
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02} (weekday {})",
            self.year, self.month, self.day, self.hour, self.minute, self.second, self.weekday
        )
    }
}

/// An endpoint value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Value {
    Unknown,
    Bool(bool),
    UInt8(u8),
    UInt32(u32),
    DateTime(DateTime),
    Float(f32),
    Text(String),
    Timestamp(i64),
}

impl Value {
    pub fn kind(&self) -> DataKind {
        match self {
            Value::Unknown => DataKind::Unknown,
            Value::Bool(_) => DataKind::Bool,
            Value::UInt8(_) => DataKind::UInt8,
            Value::UInt32(_) => DataKind::UInt32,
            Value::DateTime(_) => DataKind::DateTime,
            Value::Float(_) => DataKind::Float,
            Value::Text(_) => DataKind::Text,
            Value::Timestamp(_) => DataKind::Timestamp,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view of the unsigned kinds
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::UInt8(v) => Some(*v as u32),
            Value::UInt32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unknown => f.write_str("-"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::UInt8(v) => write!(f, "{}", v),
            Value::UInt32(v) => write!(f, "{}", v),
            Value::DateTime(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{:?}", v),
            Value::Timestamp(v) => write!(f, "{}", v),
        }
    }
}

/// A value bound to an endpoint id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Data {
    pub eid: u8,
    pub value: Value,
}

impl Data {
    pub fn new(eid: u8, value: Value) -> Self {
        Self { eid, value }
    }

    pub fn bool(eid: u8, value: bool) -> Self {
        Self::new(eid, Value::Bool(value))
    }

    pub fn uint8(eid: u8, value: u8) -> Self {
        Self::new(eid, Value::UInt8(value))
    }

    pub fn uint32(eid: u8, value: u32) -> Self {
        Self::new(eid, Value::UInt32(value))
    }

    pub fn float(eid: u8, value: f32) -> Self {
        Self::new(eid, Value::Float(value))
    }

    pub fn timestamp(eid: u8, value: i64) -> Self {
        Self::new(eid, Value::Timestamp(value))
    }

    pub fn datetime(eid: u8, value: DateTime) -> Self {
        Self::new(eid, Value::DateTime(value))
    }

    /// Text value, checked to fit the fixed ASCII field
    pub fn text(eid: u8, value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        check_text(&value)?;
        Ok(Self::new(eid, Value::Text(value)))
    }

    pub fn kind(&self) -> DataKind {
        self.value.kind()
    }
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [eid={}, value={}]", self.kind(), self.eid, self.value)
    }
}

/// Validate a string against the text field constraints
pub(crate) fn check_text(text: &str) -> Result<()> {
    if !text.is_ascii() {
        return Err(Error::NonAsciiText(text.to_string()));
    }
    if text.len() > TEXT_LEN {
        return Err(Error::TextTooLong {
            len: text.len(),
            max: TEXT_LEN,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widths() {
        assert_eq!(DataKind::Unknown.width(), 0);
        assert_eq!(DataKind::Bool.width(), 1);
        assert_eq!(DataKind::UInt32.width(), 4);
        assert_eq!(DataKind::Text.width(), 128);
        assert_eq!(DataKind::Timestamp.width(), 8);
    }

    #[test]
    fn test_codes_follow_declaration_order() {
        for (ix, kind) in DataKind::ALL.iter().enumerate() {
            assert_eq!(kind.code() as usize, ix);
        }
    }

    #[test]
    fn test_equality_is_eid_and_value() {
        assert_eq!(Data::uint32(3, 10), Data::uint32(3, 10));
        assert_ne!(Data::uint32(3, 10), Data::uint32(4, 10));
        assert_ne!(Data::uint32(3, 10), Data::uint8(3, 10));
    }

    #[test]
    fn test_text_validation() {
        assert!(Data::text(1, "Hexabus Socket").is_ok());
        assert!(matches!(
            Data::text(1, "Grüße"),
            Err(Error::NonAsciiText(_))
        ));
        assert!(matches!(
            Data::text(1, "x".repeat(129)),
            Err(Error::TextTooLong { len: 129, max: 128 })
        ));
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::UInt8(7).as_u32(), Some(7));
        assert_eq!(Value::Text("a".into()).as_str(), Some("a"));
        assert_eq!(Value::Float(1.5).as_bool(), None);
    }
}
