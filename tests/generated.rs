//! Generated Rust compiled into the test: `generated/wire.rs` must be what
//! the emitter produces for `generated/wire.pdl`, and must behave on the wire.

use std::cell::Cell;

use wiregen::runtime::{Dispose, LineSink, Record};
use wiregen::{compile, EmitOptions, WireError};

#[allow(dead_code)]
mod wire {
    include!("generated/wire.rs");
}

use wire::{Bits, Floats, Four, MessageType, Orders, Three};

thread_local! {
    static DISPOSED: Cell<usize> = Cell::new(0);
}

fn disposed() -> usize {
    DISPOSED.with(Cell::get)
}

mod externals {
    use super::DISPOSED;
    use crate::wire::Three;
    use wiregen::runtime::{DescribeSink, Dispose, ExternalField, ReadBuf, WireError, WriteBuf};

    /// Length-prefixed byte string.
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct ThreeBlob(pub Vec<u8>);

    impl ExternalField<Three> for ThreeBlob {
        fn decode(_parent: &Three, buf: &mut ReadBuf<'_>) -> Result<Self, WireError> {
            let n = buf.get_u8()?;
            Ok(ThreeBlob(buf.take(usize::from(n))?.to_vec()))
        }

        fn encode(&self, _parent: &Three, buf: &mut WriteBuf<'_>) -> Result<(), WireError> {
            buf.set_u8(u8::try_from(self.0.len()).map_err(|_| WireError::OutOfBounds)?)?;
            buf.put_slice(&self.0)
        }

        fn describe(&self, name: &str, sink: &mut dyn DescribeSink) {
            sink.line(format_args!("{}: {} bytes", name, self.0.len()));
        }
    }

    impl Dispose for ThreeBlob {
        fn dispose(&mut self) {
            if !self.0.is_empty() {
                DISPOSED.with(|d| d.set(d.get() + 1));
            }
            self.0 = Vec::new();
        }
    }
}

use externals::ThreeBlob;

#[test]
fn test_committed_output_matches_emitter() {
    let rust = compile(include_str!("generated/wire.pdl"), "wire.pdl", &EmitOptions::default()).expect("compile");
    assert_eq!(
        rust,
        include_str!("generated/wire.rs"),
        "tests/generated/wire.rs is stale; regenerate it from wire.pdl"
    );
}

#[test]
fn test_message_types() {
    assert_eq!(Orders::MESSAGE_TYPE.ordinal(), 1);
    assert_eq!(Three::MESSAGE_TYPE, MessageType::Three);
    assert_eq!(MessageType::from_ordinal(5), Some(MessageType::Three));
    assert_eq!(MessageType::from_ordinal(0), None);
    assert_eq!(MessageType::from_ordinal(6), None);
}

#[test]
fn test_u32_byte_orders() {
    let v = 0x1234_5678;
    let value = Orders {
        be: v,
        le: v,
        sbe: v,
        sle: v,
    };
    let mut out = [0u8; 16];
    assert_eq!(value.encode_into(&mut out), Ok(16));
    assert_eq!(
        out,
        [
            0x12, 0x34, 0x56, 0x78, // be
            0x78, 0x56, 0x34, 0x12, // le
            0x56, 0x78, 0x12, 0x34, // sbe
            0x34, 0x12, 0x78, 0x56, // sle
        ]
    );
    assert_eq!(Orders::decode_from(&out), Ok((value, 16)));

    let mut short = [0u8; 15];
    assert_eq!(Orders::default().encode_into(&mut short), Err(WireError::OutOfBounds));
    assert_eq!(Orders::decode_from(&out[..15]), Err(WireError::OutOfBounds));
}

#[test]
fn test_float_bit_patterns_survive() {
    let mut out = [0u8; 12];
    let one = Floats { f: 1.0, d: 1.0 };
    assert_eq!(one.encode_into(&mut out), Ok(12));
    assert_eq!(out, [0x00, 0x00, 0x3F, 0x80, 0, 0, 0, 0, 0, 0, 0xF0, 0x3F]);

    for (f, d) in [
        (f32::from_bits(0x7FC0_1234), f64::from_bits(0x7FF8_0000_0000_BEEF)),
        (-0.0, 0.0),
        (0.0, -0.0),
        (f32::INFINITY, f64::NEG_INFINITY),
    ] {
        let value = Floats { f, d };
        value.encode_into(&mut out).expect("encode");
        let (back, used) = Floats::decode_from(&out).expect("decode");
        assert_eq!(used, 12);
        assert_eq!(back.f.to_bits(), f.to_bits());
        assert_eq!(back.d.to_bits(), d.to_bits());
    }
}

#[test]
fn test_bit_field_accessors() {
    let mut value = Bits::default();
    value.set_mode(7);
    assert_eq!(value.flags, 0b0001_1100);
    assert_eq!(value.mode(), 7);
    value.set_mode(9);
    assert_eq!(value.mode(), 1);

    let mut value = Bits { flags: 0xFF };
    value.set_mode(0);
    assert_eq!(value.flags, 0b1110_0011);

    let (decoded, used) = Bits::decode_from(&[0x1C, 0xAA]).expect("decode");
    assert_eq!(used, 1);
    assert_eq!(decoded.mode(), 7);

    let mut sink = LineSink::new();
    decoded.describe(&mut sink);
    assert_eq!(sink.lines, ["flags: 0x1C", "mode: 0x7"]);
}

#[test]
fn test_fixed_array_consumes_exactly_its_length() {
    let (value, used) = Four::decode_from(&[1, 2, 3, 4, 5, 6]).expect("decode");
    assert_eq!(used, 5);
    assert_eq!(
        value,
        Four {
            a: vec![1, 2, 3, 4],
            b: 5
        }
    );
    assert_eq!(Four::decode_from(&[1, 2, 3]), Err(WireError::OutOfBounds));

    let mut out = [0u8; 5];
    assert_eq!(value.encode_into(&mut out), Ok(5));
    assert_eq!(out, [1, 2, 3, 4, 5]);
    let short = Four { a: vec![1, 2], b: 0 };
    assert_eq!(short.encode_into(&mut out), Err(WireError::OutOfBounds));
}

#[test]
fn test_external_round_trip_and_dispose() {
    let bytes = [0x02, 0xDE, 0xAD, 0xCA, 0xFE, 0xF0, 0x0D, 0x09];
    let (mut value, used) = Three::decode_from(&bytes).expect("decode");
    assert_eq!(used, 8);
    assert_eq!(value.blob, ThreeBlob(vec![0xDE, 0xAD]));
    assert_eq!(value.word, 0xCAFE_F00D);
    assert_eq!(value.tail, 9);

    let mut out = [0u8; 8];
    assert_eq!(value.encode_into(&mut out), Ok(8));
    assert_eq!(out, bytes);

    let mut sink = LineSink::new();
    value.describe(&mut sink);
    assert_eq!(sink.lines, ["blob: 2 bytes", "word: 0xCAFEF00D", "tail: 0x09"]);

    assert_eq!(disposed(), 0);
    value.dispose();
    assert_eq!(disposed(), 1);
    assert!(value.blob.0.is_empty());
    value.dispose();
    assert_eq!(disposed(), 1);
}

#[test]
fn test_failure_in_second_field_disposes_the_first() {
    // The blob decodes; `word` runs out of input; `tail` is never reached.
    let r = Three::decode_from(&[0x01, 0xAA, 0x00, 0x01]);
    assert_eq!(r.err(), Some(WireError::OutOfBounds));
    assert_eq!(disposed(), 1);

    // Failing inside the blob itself leaves nothing to release.
    let r = Three::decode_from(&[0x05, 0xAA]);
    assert_eq!(r.err(), Some(WireError::OutOfBounds));
    assert_eq!(disposed(), 1);
}
