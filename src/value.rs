//! Runtime values for the schema interpreter (codec representation).

use crate::ast::BaseType;
use std::collections::HashMap;

/// A single decoded value (field or record).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Float(f32),
    Double(f64),
    /// Opaque payload, typically produced by an external hook.
    Bytes(Vec<u8>),
    Record(HashMap<String, Value>),
    Array(Vec<Value>),
}

impl Value {
    /// Build the scalar of type `base` from the low bits of `raw`.
    pub fn from_bits(base: BaseType, raw: u64) -> Value {
        match base {
            BaseType::U8 => Value::U8(raw as u8),
            BaseType::U16 => Value::U16(raw as u16),
            BaseType::U32 => Value::U32(raw as u32),
            BaseType::U64 => Value::U64(raw),
            BaseType::I8 => Value::I8(raw as u8 as i8),
            BaseType::I16 => Value::I16(raw as u16 as i16),
            BaseType::I32 => Value::I32(raw as u32 as i32),
            BaseType::I64 => Value::I64(raw as i64),
            BaseType::F32 => Value::Float(f32::from_bits(raw as u32)),
            BaseType::F64 => Value::Double(f64::from_bits(raw)),
        }
    }

    /// Bit pattern of a scalar. Signed values are sign-extended, so the low
    /// bytes are the two's-complement pattern at any width.
    pub fn to_bits(&self) -> Option<u64> {
        match self {
            Value::U8(x) => Some(u64::from(*x)),
            Value::U16(x) => Some(u64::from(*x)),
            Value::U32(x) => Some(u64::from(*x)),
            Value::U64(x) => Some(*x),
            Value::I8(x) => Some(*x as i64 as u64),
            Value::I16(x) => Some(*x as i64 as u64),
            Value::I32(x) => Some(*x as i64 as u64),
            Value::I64(x) => Some(*x as u64),
            Value::Float(x) => Some(u64::from(x.to_bits())),
            Value::Double(x) => Some(x.to_bits()),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U8(x) => Some(*x as u64),
            Value::U16(x) => Some(*x as u64),
            Value::U32(x) => Some(*x as u64),
            Value::U64(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I8(x) => Some(*x as i64),
            Value::I16(x) => Some(*x as i64),
            Value::I32(x) => Some(*x as i64),
            Value::I64(x) => Some(*x),
            Value::U8(x) => Some(*x as i64),
            Value::U16(x) => Some(*x as i64),
            Value::U32(x) => Some(*x as i64),
            Value::U64(x) => i64::try_from(*x).ok(),
            _ => None,
        }
    }

    /// Non-negative integer value, as used for array counts.
    pub fn as_count(&self) -> Option<u64> {
        self.as_u64()
            .or_else(|| self.as_i64().and_then(|i| u64::try_from(i).ok()))
    }

    pub fn as_record(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Record(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_record_mut(&mut self) -> Option<&mut HashMap<String, Value>> {
        match self {
            Value::Record(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(x) => Some(*x),
            Value::Float(x) => Some(f64::from(*x)),
            _ => None,
        }
    }

    /// Look up a field of a record value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.as_record().and_then(|m| m.get(field))
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(m: HashMap<String, Value>) -> Self {
        Value::Record(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_bits_sign_extend() {
        assert_eq!(Value::I8(-1).to_bits(), Some(u64::MAX));
        assert_eq!(Value::from_bits(BaseType::I16, 0xFFFF_8000), Value::I16(i16::MIN));
        assert_eq!(Value::from_bits(BaseType::U8, 0x1FF), Value::U8(0xFF));
    }

    #[test]
    fn counts_reject_negative() {
        assert_eq!(Value::I16(4).as_count(), Some(4));
        assert_eq!(Value::I16(-4).as_count(), None);
        assert_eq!(Value::Float(4.0).as_count(), None);
    }
}
