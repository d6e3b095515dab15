// File generated by wiregen from wire.pdl.
// Do not edit by hand.

use wiregen::runtime::{decode_scoped, describe_array, DescribeSink, Dispose, ExternalField, ReadBuf, Record, WireError, WriteBuf};
use crate::externals::ThreeBlob;

/// `be32`: u32, native big-endian.
pub type Be32 = u32;
/// `le32`: u32, native little-endian.
pub type Le32 = u32;
/// `sbe32`: u32, swapped big-endian.
pub type Sbe32 = u32;
/// `sle32`: u32, swapped little-endian.
pub type Sle32 = u32;
/// `cdab`: f32, swapped big-endian.
pub type Cdab = f32;
/// `le64`: f64, native little-endian.
pub type Le64 = f64;

/// Message-type tags, numbered from 1 in definition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MessageType {
    Orders = 1,
    Floats = 2,
    Bits = 3,
    Four = 4,
    Three = 5,
}

impl MessageType {
    pub fn ordinal(self) -> u32 {
        self as u32
    }

    pub fn from_ordinal(n: u32) -> Option<Self> {
        match n {
            1 => Some(MessageType::Orders),
            2 => Some(MessageType::Floats),
            3 => Some(MessageType::Bits),
            4 => Some(MessageType::Four),
            5 => Some(MessageType::Three),
            _ => None,
        }
    }
}

/// `orders`, message type 1.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Orders {
    pub be: u32,
    pub le: u32,
    pub sbe: u32,
    pub sle: u32,
}

impl Orders {
    pub const MESSAGE_TYPE: MessageType = MessageType::Orders;
}

impl Record for Orders {
    fn decode(buf: &mut ReadBuf<'_>) -> Result<Self, WireError> {
        decode_scoped(|out: &mut Self| {
            {
                let b = buf.get_array::<4>()?;
                out.be = (u32::from(b[0]) << 24) | (u32::from(b[1]) << 16) | (u32::from(b[2]) << 8) | u32::from(b[3]);
            }
            {
                let b = buf.get_array::<4>()?;
                out.le = (u32::from(b[3]) << 24) | (u32::from(b[2]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[0]);
            }
            {
                let b = buf.get_array::<4>()?;
                out.sbe = (u32::from(b[2]) << 24) | (u32::from(b[3]) << 16) | (u32::from(b[0]) << 8) | u32::from(b[1]);
            }
            {
                let b = buf.get_array::<4>()?;
                out.sle = (u32::from(b[1]) << 24) | (u32::from(b[0]) << 16) | (u32::from(b[3]) << 8) | u32::from(b[2]);
            }
            Ok(())
        })
    }

    fn encode(&self, buf: &mut WriteBuf<'_>) -> Result<(), WireError> {
        {
            let v = self.be;
            buf.set_array(&[(v >> 24) as u8, (v >> 16) as u8, (v >> 8) as u8, v as u8])?;
        }
        {
            let v = self.le;
            buf.set_array(&[v as u8, (v >> 8) as u8, (v >> 16) as u8, (v >> 24) as u8])?;
        }
        {
            let v = self.sbe;
            buf.set_array(&[(v >> 8) as u8, v as u8, (v >> 24) as u8, (v >> 16) as u8])?;
        }
        {
            let v = self.sle;
            buf.set_array(&[(v >> 16) as u8, (v >> 24) as u8, v as u8, (v >> 8) as u8])?;
        }
        Ok(())
    }

    fn describe(&self, sink: &mut dyn DescribeSink) {
        sink.line(format_args!("be: 0x{:08X}", self.be));
        sink.line(format_args!("le: 0x{:08X}", self.le));
        sink.line(format_args!("sbe: 0x{:08X}", self.sbe));
        sink.line(format_args!("sle: 0x{:08X}", self.sle));
    }
}

impl Dispose for Orders {
    fn dispose(&mut self) {}
}

/// `floats`, message type 2.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Floats {
    pub f: f32,
    pub d: f64,
}

impl Floats {
    pub const MESSAGE_TYPE: MessageType = MessageType::Floats;
}

impl Record for Floats {
    fn decode(buf: &mut ReadBuf<'_>) -> Result<Self, WireError> {
        decode_scoped(|out: &mut Self| {
            {
                let b = buf.get_array::<4>()?;
                out.f = f32::from_bits((u32::from(b[2]) << 24) | (u32::from(b[3]) << 16) | (u32::from(b[0]) << 8) | u32::from(b[1]));
            }
            {
                let b = buf.get_array::<8>()?;
                out.d = f64::from_bits((u64::from(b[7]) << 56) | (u64::from(b[6]) << 48) | (u64::from(b[5]) << 40) | (u64::from(b[4]) << 32) | (u64::from(b[3]) << 24) | (u64::from(b[2]) << 16) | (u64::from(b[1]) << 8) | u64::from(b[0]));
            }
            Ok(())
        })
    }

    fn encode(&self, buf: &mut WriteBuf<'_>) -> Result<(), WireError> {
        {
            let v = self.f.to_bits();
            buf.set_array(&[(v >> 8) as u8, v as u8, (v >> 24) as u8, (v >> 16) as u8])?;
        }
        {
            let v = self.d.to_bits();
            buf.set_array(&[v as u8, (v >> 8) as u8, (v >> 16) as u8, (v >> 24) as u8, (v >> 32) as u8, (v >> 40) as u8, (v >> 48) as u8, (v >> 56) as u8])?;
        }
        Ok(())
    }

    fn describe(&self, sink: &mut dyn DescribeSink) {
        sink.line(format_args!("f: {:.6}", self.f));
        sink.line(format_args!("d: {:.6}", self.d));
    }
}

impl Dispose for Floats {
    fn dispose(&mut self) {}
}

/// `bits`, message type 3.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Bits {
    pub flags: u8,
}

impl Bits {
    pub const MESSAGE_TYPE: MessageType = MessageType::Bits;

    /// Bits 2..5 of `flags`.
    pub fn mode(&self) -> u8 {
        (self.flags >> 2) & 0x7
    }

    /// Store the low 3 bits of `value` in `flags`.
    pub fn set_mode(&mut self, value: u8) {
        let mut raw = self.flags;
        raw &= !0x1C;
        raw |= (value & 0x7) << 2;
        self.flags = raw;
    }
}

impl Record for Bits {
    fn decode(buf: &mut ReadBuf<'_>) -> Result<Self, WireError> {
        decode_scoped(|out: &mut Self| {
            out.flags = buf.get_u8()?;
            Ok(())
        })
    }

    fn encode(&self, buf: &mut WriteBuf<'_>) -> Result<(), WireError> {
        buf.set_u8(self.flags)?;
        Ok(())
    }

    fn describe(&self, sink: &mut dyn DescribeSink) {
        sink.line(format_args!("flags: 0x{:02X}", self.flags));
        sink.line(format_args!("mode: 0x{:X}", self.mode()));
    }
}

impl Dispose for Bits {
    fn dispose(&mut self) {}
}

/// `four`, message type 4.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Four {
    pub a: Vec<u8>,
    pub b: u8,
}

impl Four {
    pub const MESSAGE_TYPE: MessageType = MessageType::Four;
}

impl Record for Four {
    fn decode(buf: &mut ReadBuf<'_>) -> Result<Self, WireError> {
        decode_scoped(|out: &mut Self| {
            {
                let n: usize = 4;
                let bytes = buf.take(n)?;
                out.a.try_reserve_exact(n).map_err(|_| WireError::AllocationFailure)?;
                out.a.extend_from_slice(bytes);
            }
            out.b = buf.get_u8()?;
            Ok(())
        })
    }

    fn encode(&self, buf: &mut WriteBuf<'_>) -> Result<(), WireError> {
        {
            let n: usize = 4;
            let items = self.a.get(..n).ok_or(WireError::OutOfBounds)?;
            buf.put_slice(items)?;
        }
        buf.set_u8(self.b)?;
        Ok(())
    }

    fn describe(&self, sink: &mut dyn DescribeSink) {
        describe_array(sink, "a", &self.a, 16, |e| format!("0x{:02X}", e));
        sink.line(format_args!("b: 0x{:02X}", self.b));
    }
}

impl Dispose for Four {
    fn dispose(&mut self) {
        self.a.dispose();
    }
}

/// `three`, message type 5.
#[derive(Debug, Default)]
pub struct Three {
    pub blob: ThreeBlob,
    pub word: u32,
    pub tail: u8,
}

impl Three {
    pub const MESSAGE_TYPE: MessageType = MessageType::Three;
}

const _: fn() = || {
    fn assert_external<R, T: ExternalField<R>>() {}
    assert_external::<Three, ThreeBlob>();
};

impl Record for Three {
    fn decode(buf: &mut ReadBuf<'_>) -> Result<Self, WireError> {
        decode_scoped(|out: &mut Self| {
            out.blob = <ThreeBlob as ExternalField<Self>>::decode(&*out, buf)?;
            {
                let b = buf.get_array::<4>()?;
                out.word = (u32::from(b[0]) << 24) | (u32::from(b[1]) << 16) | (u32::from(b[2]) << 8) | u32::from(b[3]);
            }
            out.tail = buf.get_u8()?;
            Ok(())
        })
    }

    fn encode(&self, buf: &mut WriteBuf<'_>) -> Result<(), WireError> {
        <ThreeBlob as ExternalField<Self>>::encode(&self.blob, self, buf)?;
        {
            let v = self.word;
            buf.set_array(&[(v >> 24) as u8, (v >> 16) as u8, (v >> 8) as u8, v as u8])?;
        }
        buf.set_u8(self.tail)?;
        Ok(())
    }

    fn describe(&self, sink: &mut dyn DescribeSink) {
        <ThreeBlob as ExternalField<Self>>::describe(&self.blob, "blob", sink);
        sink.line(format_args!("word: 0x{:08X}", self.word));
        sink.line(format_args!("tail: 0x{:02X}", self.tail));
    }
}

impl Dispose for Three {
    fn dispose(&mut self) {
        Dispose::dispose(&mut self.blob);
    }
}
