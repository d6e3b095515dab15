//! Byte-layout engine: maps (base type, byte-order class, direction) to the
//! exact per-byte shift program used by both the emitter and the interpreter.
//!
//! Significance is counted in bytes from the least significant end; a wire
//! byte with significance `s` carries bits `8*s .. 8*s+7` of the value.

use crate::ast::BaseType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrderClass {
    NativeBigEndian,
    NativeLittleEndian,
    /// 16-bit words least significant first, each word big-endian (`CDAB`).
    SwappedBigEndian,
    /// 16-bit words most significant first, each word little-endian (`BADC`).
    SwappedLittleEndian,
}

impl ByteOrderClass {
    pub const ALL: [ByteOrderClass; 4] = [
        ByteOrderClass::NativeBigEndian,
        ByteOrderClass::NativeLittleEndian,
        ByteOrderClass::SwappedBigEndian,
        ByteOrderClass::SwappedLittleEndian,
    ];

    /// Whether this class is defined for a `width`-byte value.
    pub fn supports(self, width: usize) -> bool {
        match self {
            ByteOrderClass::NativeBigEndian | ByteOrderClass::NativeLittleEndian => {
                matches!(width, 2 | 4 | 8)
            }
            ByteOrderClass::SwappedBigEndian | ByteOrderClass::SwappedLittleEndian => {
                matches!(width, 4 | 8)
            }
        }
    }

    /// Significance of the value byte carried at `wire_index`.
    pub fn significance(self, width: usize, wire_index: usize) -> usize {
        let words = width / 2;
        match self {
            ByteOrderClass::NativeBigEndian => width - 1 - wire_index,
            ByteOrderClass::NativeLittleEndian => wire_index,
            ByteOrderClass::SwappedBigEndian => 2 * (wire_index / 2) + (1 - wire_index % 2),
            ByteOrderClass::SwappedLittleEndian => 2 * (words - 1 - wire_index / 2) + wire_index % 2,
        }
    }

    /// The `byte_order` list a schema writes for this class.
    pub fn permutation(self, width: usize) -> Vec<usize> {
        (0..width).map(|i| self.significance(width, i)).collect()
    }

    /// Class whose permutation equals `order`, if any. Native classes win for
    /// widths where a swapped class would coincide with them.
    pub fn classify(order: &[usize]) -> Option<ByteOrderClass> {
        let width = order.len();
        Self::ALL
            .into_iter()
            .find(|class| class.supports(width) && class.permutation(width) == order)
    }

    pub fn name(self) -> &'static str {
        match self {
            ByteOrderClass::NativeBigEndian => "native big-endian",
            ByteOrderClass::NativeLittleEndian => "native little-endian",
            ByteOrderClass::SwappedBigEndian => "swapped big-endian",
            ByteOrderClass::SwappedLittleEndian => "swapped little-endian",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Decode,
    Encode,
}

/// Bit-identical reinterpretation applied around the integer shifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reinterpret {
    None,
    F32,
    F64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteOp {
    pub wire_index: usize,
    /// Left shift (decode) or right shift (encode) in bits.
    pub shift: u32,
}

/// Ordered transcription program for one scalar.
///
/// Decode ops are ordered most significant first, so the emitted expression
/// reads like the value; encode ops are ordered by wire index, so they map
/// one-to-one onto the output array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BytePlan {
    pub base: BaseType,
    pub order: Option<ByteOrderClass>,
    pub direction: Direction,
    pub reinterpret: Reinterpret,
    pub ops: Vec<ByteOp>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("{order} is not defined for {base} ({width} bytes)")]
    Unsupported {
        base: BaseType,
        order: &'static str,
        width: usize,
    },
}

/// Build the byte program for `base` in `direction`. A multi-byte type with no
/// declared order is big-endian; a single byte never carries an order.
pub fn plan(
    base: BaseType,
    order: Option<ByteOrderClass>,
    direction: Direction,
) -> Result<BytePlan, LayoutError> {
    let width = base.width();
    let order = match (width, order) {
        (1, None) => None,
        (1, Some(o)) => {
            return Err(LayoutError::Unsupported {
                base,
                order: o.name(),
                width,
            })
        }
        (_, None) => Some(ByteOrderClass::NativeBigEndian),
        (_, Some(o)) if !o.supports(width) => {
            return Err(LayoutError::Unsupported {
                base,
                order: o.name(),
                width,
            })
        }
        (_, Some(o)) => Some(o),
    };
    let mut ops: Vec<ByteOp> = (0..width)
        .map(|i| ByteOp {
            wire_index: i,
            shift: 8 * order.map_or(0, |o| o.significance(width, i)) as u32,
        })
        .collect();
    if direction == Direction::Decode {
        ops.sort_by(|a, b| b.shift.cmp(&a.shift));
    }
    let reinterpret = match base {
        BaseType::F32 => Reinterpret::F32,
        BaseType::F64 => Reinterpret::F64,
        _ => Reinterpret::None,
    };
    Ok(BytePlan {
        base,
        order,
        direction,
        reinterpret,
        ops,
    })
}

impl BytePlan {
    pub fn width(&self) -> usize {
        self.base.width()
    }

    /// Raw (unsigned, zero-extended) bit pattern from `bytes`; `bytes` must hold
    /// at least `width()` bytes.
    pub fn assemble(&self, bytes: &[u8]) -> u64 {
        self.ops
            .iter()
            .fold(0u64, |acc, op| acc | (u64::from(bytes[op.wire_index]) << op.shift))
    }

    /// Write the low `width()` bytes of `raw` into `out` in wire order.
    pub fn scatter(&self, raw: u64, out: &mut [u8]) {
        for op in &self.ops {
            out[op.wire_index] = ((raw >> op.shift) & 0xFF) as u8;
        }
    }
}
