use std::fmt;
use std::str::FromStr;

use crate::{ScanError, ScanResult};

/// Fixed-width value that can be decoded from little-endian target memory.
pub trait Primitive: Sized + Copy {
    const SIZE: usize;

    /// Decodes exactly [`Self::SIZE`] bytes; `None` when `bytes` has another length.
    fn from_le_slice(bytes: &[u8]) -> Option<Self>;
}

macro_rules! impl_primitive_int {
    ($($t:ty),* $(,)?) => {
        $(
            impl Primitive for $t {
                const SIZE: usize = std::mem::size_of::<$t>();

                fn from_le_slice(bytes: &[u8]) -> Option<Self> {
                    bytemuck::try_pod_read_unaligned::<$t>(bytes).ok().map(<$t>::from_le)
                }
            }
        )*
    };
}

impl_primitive_int!(i8, u8, i16, u16, i32, u32, i64, u64, isize, usize);

impl Primitive for f32 {
    const SIZE: usize = 4;

    fn from_le_slice(bytes: &[u8]) -> Option<Self> {
        u32::from_le_slice(bytes).map(f32::from_bits)
    }
}

impl Primitive for f64 {
    const SIZE: usize = 8;

    fn from_le_slice(bytes: &[u8]) -> Option<Self> {
        u64::from_le_slice(bytes).map(f64::from_bits)
    }
}

impl Primitive for bool {
    const SIZE: usize = 1;

    fn from_le_slice(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [b] => Some(*b != 0),
            _ => None,
        }
    }
}

/// Name-addressable catalogue of the primitive kinds a scanner can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    ISize,
    USize,
    F32,
    F64,
}

impl ValueKind {
    pub const ALL: [ValueKind; 13] = [
        ValueKind::Bool,
        ValueKind::I8,
        ValueKind::U8,
        ValueKind::I16,
        ValueKind::U16,
        ValueKind::I32,
        ValueKind::U32,
        ValueKind::I64,
        ValueKind::U64,
        ValueKind::ISize,
        ValueKind::USize,
        ValueKind::F32,
        ValueKind::F64,
    ];

    pub fn size(self) -> usize {
        match self {
            ValueKind::Bool => bool::SIZE,
            ValueKind::I8 => i8::SIZE,
            ValueKind::U8 => u8::SIZE,
            ValueKind::I16 => i16::SIZE,
            ValueKind::U16 => u16::SIZE,
            ValueKind::I32 => i32::SIZE,
            ValueKind::U32 => u32::SIZE,
            ValueKind::I64 => i64::SIZE,
            ValueKind::U64 => u64::SIZE,
            ValueKind::ISize => isize::SIZE,
            ValueKind::USize => usize::SIZE,
            ValueKind::F32 => f32::SIZE,
            ValueKind::F64 => f64::SIZE,
        }
    }

    /// Decodes `bytes` as this kind. `bytes.len()` must equal [`ValueKind::size`].
    pub fn decode(self, bytes: &[u8]) -> Option<Value> {
        Some(match self {
            ValueKind::Bool => Value::Bool(bool::from_le_slice(bytes)?),
            ValueKind::I8 => Value::I8(i8::from_le_slice(bytes)?),
            ValueKind::U8 => Value::U8(u8::from_le_slice(bytes)?),
            ValueKind::I16 => Value::I16(i16::from_le_slice(bytes)?),
            ValueKind::U16 => Value::U16(u16::from_le_slice(bytes)?),
            ValueKind::I32 => Value::I32(i32::from_le_slice(bytes)?),
            ValueKind::U32 => Value::U32(u32::from_le_slice(bytes)?),
            ValueKind::I64 => Value::I64(i64::from_le_slice(bytes)?),
            ValueKind::U64 => Value::U64(u64::from_le_slice(bytes)?),
            ValueKind::ISize => Value::ISize(isize::from_le_slice(bytes)?),
            ValueKind::USize => Value::USize(usize::from_le_slice(bytes)?),
            ValueKind::F32 => Value::F32(f32::from_le_slice(bytes)?),
            ValueKind::F64 => Value::F64(f64::from_le_slice(bytes)?),
        })
    }
}

impl FromStr for ValueKind {
    type Err = ScanError;

    /// Accepts the short C-style names (`int`, `ull`, `sizet`, ...) as well as Rust type names.
    /// `long`/`ulong` are 32-bit, as on Windows.
    fn from_str(s: &str) -> ScanResult<Self> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "bool" => ValueKind::Bool,
            "byte" | "sbyte" | "i8" => ValueKind::I8,
            "ubyte" | "u8" => ValueKind::U8,
            "short" | "i16" => ValueKind::I16,
            "ushort" | "u16" => ValueKind::U16,
            "int" | "long" | "i32" => ValueKind::I32,
            "uint" | "ulong" | "u32" => ValueKind::U32,
            "ll" | "i64" => ValueKind::I64,
            "ull" | "u64" => ValueKind::U64,
            "ssizet" | "isize" => ValueKind::ISize,
            "sizet" | "usize" => ValueKind::USize,
            "float" | "f32" => ValueKind::F32,
            "double" | "f64" => ValueKind::F64,
            other => {
                return Err(ScanError::invalid_argument(format!(
                    "unknown value kind \"{other}\""
                )));
            }
        })
    }
}

/// A decoded primitive value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    ISize(isize),
    USize(usize),
    F32(f32),
    F64(f64),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::I8(_) => ValueKind::I8,
            Value::U8(_) => ValueKind::U8,
            Value::I16(_) => ValueKind::I16,
            Value::U16(_) => ValueKind::U16,
            Value::I32(_) => ValueKind::I32,
            Value::U32(_) => ValueKind::U32,
            Value::I64(_) => ValueKind::I64,
            Value::U64(_) => ValueKind::U64,
            Value::ISize(_) => ValueKind::ISize,
            Value::USize(_) => ValueKind::USize,
            Value::F32(_) => ValueKind::F32,
            Value::F64(_) => ValueKind::F64,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::I8(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v}"),
            Value::I16(v) => write!(f, "{v}"),
            Value::U16(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::U32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::ISize(v) => write!(f, "{v}"),
            Value::USize(v) => write!(f, "{v}"),
            Value::F32(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_decode_little_endian() {
        assert_eq!(u16::from_le_slice(&[0x34, 0x12]), Some(0x1234));
        assert_eq!(i16::from_le_slice(&[0xFE, 0xFF]), Some(-2));
        assert_eq!(u32::from_le_slice(&[0x78, 0x56, 0x34, 0x12]), Some(0x1234_5678));
        assert_eq!(i64::from_le_slice(&(-5i64).to_le_bytes()), Some(-5));
        assert_eq!(i8::from_le_slice(&[0x80]), Some(-128));
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert_eq!(u32::from_le_slice(&[1, 2, 3]), None);
        assert_eq!(bool::from_le_slice(&[]), None);
        assert_eq!(f64::from_le_slice(&[0; 4]), None);
    }

    #[test]
    fn floats_decode_ieee754() {
        assert_eq!(f32::from_le_slice(&1.5f32.to_le_bytes()), Some(1.5));
        assert_eq!(f64::from_le_slice(&(-0.25f64).to_le_bytes()), Some(-0.25));
    }

    #[test]
    fn bool_is_any_nonzero_byte() {
        assert_eq!(bool::from_le_slice(&[0]), Some(false));
        assert_eq!(bool::from_le_slice(&[1]), Some(true));
        assert_eq!(bool::from_le_slice(&[0x7F]), Some(true));
    }

    #[test]
    fn kind_names_resolve() {
        assert_eq!("int".parse::<ValueKind>().unwrap(), ValueKind::I32);
        assert_eq!("ULONG".parse::<ValueKind>().unwrap(), ValueKind::U32);
        assert_eq!("ull".parse::<ValueKind>().unwrap(), ValueKind::U64);
        assert_eq!("sizet".parse::<ValueKind>().unwrap(), ValueKind::USize);
        assert!("quad".parse::<ValueKind>().unwrap_err().is_invalid_argument());
    }

    #[test]
    fn kinds_decode_their_own_width() {
        for kind in ValueKind::ALL {
            let bytes = vec![0u8; kind.size()];
            let value = kind.decode(&bytes).unwrap();
            assert_eq!(value.kind(), kind);
            assert!(kind.decode(&vec![0u8; kind.size() + 1]).is_none());
        }
        assert_eq!(ValueKind::USize.size(), std::mem::size_of::<usize>());
    }
}
