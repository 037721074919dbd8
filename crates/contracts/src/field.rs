//! FieldValue - scalar payload of a message field
//!
//! Every concrete input type is narrowed into one of five kinds by
//! [`IntoFieldValue`]. Absent values (`None`, JSON `null`) and values with no
//! scalar meaning (JSON arrays/objects) yield `None` and are not stored.

use serde::{Serialize, Serializer};
use std::fmt;

/// Canonical field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Any signed integer width
    Int(i64),
    /// Any unsigned integer width
    UInt(u64),
    /// Any float width
    Float(f64),
    Bool(bool),
    /// Strings and byte sequences
    Str(String),
}

impl FieldValue {
    /// Short kind name (used in logs and error messages)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::Str(_) => "string",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Numeric view of the value; booleans and strings have none
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::UInt(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Bool(_) | Self::Str(_) => None,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Self::Str(_))
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v:?}"),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Int(v) => serializer.serialize_i64(*v),
            Self::UInt(v) => serializer.serialize_u64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::Str(v) => serializer.serialize_str(v),
        }
    }
}

/// Type normalization into [`FieldValue`]
///
/// Returns `None` for values that must be dropped from the field map.
pub trait IntoFieldValue {
    fn into_field_value(self) -> Option<FieldValue>;
}

macro_rules! impl_into_field_value {
    ($variant:ident as $target:ty: $($t:ty),+) => {
        $(
            impl IntoFieldValue for $t {
                #[inline]
                fn into_field_value(self) -> Option<FieldValue> {
                    Some(FieldValue::$variant(self as $target))
                }
            }

            impl IntoFieldValue for &$t {
                #[inline]
                fn into_field_value(self) -> Option<FieldValue> {
                    Some(FieldValue::$variant(*self as $target))
                }
            }
        )+
    };
}

impl_into_field_value!(Int as i64: i8, i16, i32, i64, isize);
impl_into_field_value!(UInt as u64: u8, u16, u32, u64, usize);
impl_into_field_value!(Float as f64: f32, f64);

impl IntoFieldValue for bool {
    fn into_field_value(self) -> Option<FieldValue> {
        Some(FieldValue::Bool(self))
    }
}

impl IntoFieldValue for &bool {
    fn into_field_value(self) -> Option<FieldValue> {
        Some(FieldValue::Bool(*self))
    }
}

impl IntoFieldValue for String {
    fn into_field_value(self) -> Option<FieldValue> {
        Some(FieldValue::Str(self))
    }
}

impl IntoFieldValue for &String {
    fn into_field_value(self) -> Option<FieldValue> {
        Some(FieldValue::Str(self.clone()))
    }
}

impl IntoFieldValue for &str {
    fn into_field_value(self) -> Option<FieldValue> {
        Some(FieldValue::Str(self.to_owned()))
    }
}

impl IntoFieldValue for Vec<u8> {
    fn into_field_value(self) -> Option<FieldValue> {
        let text = match String::from_utf8(self) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };
        Some(FieldValue::Str(text))
    }
}

impl IntoFieldValue for &Vec<u8> {
    fn into_field_value(self) -> Option<FieldValue> {
        self.as_slice().into_field_value()
    }
}

impl IntoFieldValue for &[u8] {
    fn into_field_value(self) -> Option<FieldValue> {
        Some(FieldValue::Str(String::from_utf8_lossy(self).into_owned()))
    }
}

impl IntoFieldValue for FieldValue {
    fn into_field_value(self) -> Option<FieldValue> {
        Some(self)
    }
}

impl IntoFieldValue for &FieldValue {
    fn into_field_value(self) -> Option<FieldValue> {
        Some(self.clone())
    }
}

impl<T: IntoFieldValue> IntoFieldValue for Option<T> {
    fn into_field_value(self) -> Option<FieldValue> {
        self.and_then(IntoFieldValue::into_field_value)
    }
}

impl IntoFieldValue for serde_json::Value {
    fn into_field_value(self) -> Option<FieldValue> {
        (&self).into_field_value()
    }
}

impl IntoFieldValue for &serde_json::Value {
    fn into_field_value(self) -> Option<FieldValue> {
        use serde_json::Value;

        match self {
            Value::Bool(b) => Some(FieldValue::Bool(*b)),
            Value::String(s) => Some(FieldValue::Str(s.clone())),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(FieldValue::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Some(FieldValue::UInt(u))
                } else {
                    n.as_f64().map(FieldValue::Float)
                }
            }
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_signed_widths_become_int() {
        assert_eq!(i8::MIN.into_field_value(), Some(FieldValue::Int(-128)));
        assert_eq!(i16::MIN.into_field_value(), Some(FieldValue::Int(-32768)));
        assert_eq!((-7i32).into_field_value(), Some(FieldValue::Int(-7)));
        assert_eq!(i64::MAX.into_field_value(), Some(FieldValue::Int(i64::MAX)));
        assert_eq!((-3isize).into_field_value(), Some(FieldValue::Int(-3)));
    }

    #[test]
    fn test_unsigned_widths_become_uint() {
        assert_eq!(u8::MAX.into_field_value(), Some(FieldValue::UInt(255)));
        assert_eq!(u16::MAX.into_field_value(), Some(FieldValue::UInt(65535)));
        assert_eq!(7u32.into_field_value(), Some(FieldValue::UInt(7)));
        assert_eq!(u64::MAX.into_field_value(), Some(FieldValue::UInt(u64::MAX)));
        assert_eq!(9usize.into_field_value(), Some(FieldValue::UInt(9)));
    }

    #[test]
    fn test_float_widths_become_float() {
        assert_eq!(0.5f32.into_field_value(), Some(FieldValue::Float(0.5)));
        assert_eq!(0.75f64.into_field_value(), Some(FieldValue::Float(0.75)));
    }

    #[test]
    fn test_bool_string_and_bytes() {
        assert_eq!(true.into_field_value(), Some(FieldValue::Bool(true)));
        assert_eq!(
            "idle".into_field_value(),
            Some(FieldValue::Str("idle".to_string()))
        );
        assert_eq!(
            String::from("busy").into_field_value(),
            Some(FieldValue::Str("busy".to_string()))
        );
        assert_eq!(
            b"raw".to_vec().into_field_value(),
            Some(FieldValue::Str("raw".to_string()))
        );
        assert_eq!(
            (&b"raw"[..]).into_field_value(),
            Some(FieldValue::Str("raw".to_string()))
        );
    }

    #[test]
    fn test_references_normalize_like_values() {
        let a = 4u16;
        let b = -4i8;
        let c = 1.5f32;
        let d = false;
        let e = String::from("x");
        let f = vec![b'y'];
        assert_eq!((&a).into_field_value(), Some(FieldValue::UInt(4)));
        assert_eq!((&b).into_field_value(), Some(FieldValue::Int(-4)));
        assert_eq!((&c).into_field_value(), Some(FieldValue::Float(1.5)));
        assert_eq!((&d).into_field_value(), Some(FieldValue::Bool(false)));
        assert_eq!((&e).into_field_value(), Some(FieldValue::Str("x".into())));
        assert_eq!((&f).into_field_value(), Some(FieldValue::Str("y".into())));
    }

    #[test]
    fn test_none_is_dropped() {
        assert_eq!(None::<i32>.into_field_value(), None);
        assert_eq!(None::<u8>.into_field_value(), None);
        assert_eq!(None::<f32>.into_field_value(), None);
        assert_eq!(None::<bool>.into_field_value(), None);
        assert_eq!(None::<String>.into_field_value(), None);
        assert_eq!(None::<Vec<u8>>.into_field_value(), None);
        assert_eq!(Some(3i16).into_field_value(), Some(FieldValue::Int(3)));
        assert_eq!(Some(3u16).into_field_value(), Some(FieldValue::UInt(3)));
    }

    #[test]
    fn test_json_values() {
        assert_eq!(json!(5).into_field_value(), Some(FieldValue::Int(5)));
        assert_eq!(json!(-5).into_field_value(), Some(FieldValue::Int(-5)));
        assert_eq!(
            json!(u64::MAX).into_field_value(),
            Some(FieldValue::UInt(u64::MAX))
        );
        assert_eq!(json!(2.5).into_field_value(), Some(FieldValue::Float(2.5)));
        assert_eq!(json!(true).into_field_value(), Some(FieldValue::Bool(true)));
        assert_eq!(
            json!("s").into_field_value(),
            Some(FieldValue::Str("s".into()))
        );
        assert_eq!(json!(null).into_field_value(), None);
        assert_eq!(json!([1, 2]).into_field_value(), None);
        assert_eq!(json!({"a": 1}).into_field_value(), None);
    }

    #[test]
    fn test_serialize_keeps_kind() {
        assert_eq!(serde_json::to_string(&FieldValue::Int(-1)).unwrap(), "-1");
        assert_eq!(serde_json::to_string(&FieldValue::UInt(1)).unwrap(), "1");
        assert_eq!(serde_json::to_string(&FieldValue::Float(1.0)).unwrap(), "1.0");
        assert_eq!(
            serde_json::to_string(&FieldValue::Str("a".into())).unwrap(),
            "\"a\""
        );
    }
}
