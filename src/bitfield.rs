//! Mask/shift planning for bit-fields packed into an integer container.

use crate::ast::BaseType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("start_bit {start_bit} + length {length} does not fit {container_bits} bits")]
pub struct BitRangeError {
    pub container_bits: u32,
    pub start_bit: u32,
    pub length: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitFieldPlan {
    pub container_bits: u32,
    pub start_bit: u32,
    pub length: u32,
    /// `(1 << length) - 1`, saturated for a full 64-bit field.
    pub mask: u64,
    pub get_shift: u32,
    pub set_shift: u32,
}

impl BitFieldPlan {
    pub fn new(container_bits: u32, start_bit: u32, length: u32) -> Result<Self, BitRangeError> {
        let err = BitRangeError {
            container_bits,
            start_bit,
            length,
        };
        if length == 0 || start_bit.checked_add(length).map_or(true, |end| end > container_bits) {
            return Err(err);
        }
        let mask = if length >= 64 { u64::MAX } else { (1u64 << length) - 1 };
        Ok(BitFieldPlan {
            container_bits,
            start_bit,
            length,
            mask,
            get_shift: start_bit,
            set_shift: start_bit,
        })
    }

    /// Extract the field from the container's raw bits.
    pub fn get(&self, container: u64) -> u64 {
        (container >> self.get_shift) & self.mask
    }

    /// Replace the field's bits in `container`; bits of `value` above
    /// `length` are dropped.
    pub fn set(&self, container: u64, value: u64) -> u64 {
        (container & !self.placed_mask()) | ((value & self.mask) << self.set_shift)
    }

    /// Mask in container position.
    pub fn placed_mask(&self) -> u64 {
        self.mask << self.set_shift
    }

    /// Smallest unsigned type that holds the field.
    pub fn value_type(&self) -> BaseType {
        BaseType::unsigned_for_bits(self.length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_in_u8() {
        let p = BitFieldPlan::new(8, 2, 3).unwrap();
        let c = p.set(0, 7);
        assert_eq!(c, 0b0001_1100);
        assert_eq!(p.get(c), 7);
        let c = p.set(c, 9);
        assert_eq!(p.get(c), 1);
        assert_eq!(c, 0b0000_0100);
    }

    #[test]
    fn neighbours_untouched() {
        let p = BitFieldPlan::new(16, 4, 4).unwrap();
        let c = p.set(0xFFFF, 0);
        assert_eq!(c, 0xFF0F);
        assert_eq!(p.set(c, 0xA), 0xFFAF);
    }

    #[test]
    fn full_width_fields() {
        let p = BitFieldPlan::new(64, 0, 64).unwrap();
        assert_eq!(p.mask, u64::MAX);
        assert_eq!(p.get(0x8000_0000_0000_0001), 0x8000_0000_0000_0001);
        assert_eq!(p.value_type(), BaseType::U64);
        let top = BitFieldPlan::new(32, 31, 1).unwrap();
        assert_eq!(top.set(0, 1), 0x8000_0000);
        assert_eq!(top.value_type(), BaseType::U8);
    }

    #[test]
    fn range_checked() {
        assert!(BitFieldPlan::new(8, 6, 3).is_err());
        assert!(BitFieldPlan::new(8, 0, 0).is_err());
        assert!(BitFieldPlan::new(32, u32::MAX, 2).is_err());
        assert!(BitFieldPlan::new(8, 5, 3).is_ok());
    }
}
