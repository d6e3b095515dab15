//! Benchmark: schema compilation (parse, resolve, emit) on the bundled Modbus
//! schema, and interpreter decode/encode of a read-holding-registers response.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::collections::HashMap;
use wiregen::{check, compile, Codec, EmitOptions, ExternalHook, Hooks, Value, WireError};
use wiregen::runtime::{ReadBuf, WriteBuf};

const MODBUS: &str = include_str!("../schemas/modbus.pdl");

/// Opaque length-prefixed payload for the schema's one external field.
struct Blob;

impl ExternalHook for Blob {
    fn decode(&self, _: &HashMap<String, Value>, buf: &mut ReadBuf<'_>) -> Result<Value, WireError> {
        let n = buf.get_u8()?;
        Ok(Value::Bytes(buf.take(usize::from(n))?.to_vec()))
    }

    fn encode(&self, value: &Value, _: &HashMap<String, Value>, buf: &mut WriteBuf<'_>) -> Result<(), WireError> {
        match value {
            Value::Bytes(b) => {
                buf.set_u8(u8::try_from(b.len()).map_err(|_| WireError::OutOfBounds)?)?;
                buf.put_slice(b)
            }
            _ => Err(WireError::NullReference),
        }
    }
}

/// MBAP header plus a response carrying `regs` registers.
fn holding_regs_resp(regs: u8) -> Vec<u8> {
    let mut adu = vec![0x00, 0x01, 0x00, 0x00, 0x00, 3 + 2 * regs, 0x11, 0x03, regs];
    for i in 0..regs {
        adu.extend_from_slice(&[i, 0xA5]);
    }
    adu
}

fn bench_compile(c: &mut Criterion) {
    let opts = EmitOptions::default();
    c.bench_function("parse_resolve_modbus", |b| {
        b.iter(|| check(black_box(MODBUS)).map(|s| s.records.len()))
    });
    c.bench_function("compile_modbus", |b| {
        b.iter(|| compile(black_box(MODBUS), "modbus.pdl", &opts).map(|s| s.len()))
    });
}

fn bench_codec(c: &mut Criterion) {
    let mut hooks: Hooks = HashMap::new();
    hooks.insert(("meter_block".to_string(), "vendor_blob".to_string()), Box::new(Blob));
    let schema = match check(MODBUS) {
        Ok(s) => s,
        Err(e) => panic!("modbus.pdl: {}", e),
    };
    let codec = match Codec::new(schema, hooks) {
        Ok(c) => c,
        Err(e) => panic!("hooks: {}", e),
    };
    let adu = holding_regs_resp(125);

    c.bench_function("decode_holding_regs_125", |b| {
        b.iter(|| codec.decode("read_holding_regs_resp", black_box(&adu)).map(|(_, n)| n))
    });

    let value = match codec.decode("read_holding_regs_resp", &adu) {
        Ok((v, _)) => v,
        Err(e) => panic!("decode: {}", e),
    };
    c.bench_function("decode_encode_holding_regs_125", |b| {
        let mut out = vec![0u8; adu.len()];
        b.iter(|| codec.encode("read_holding_regs_resp", black_box(&value), &mut out))
    });
}

criterion_group!(benches, bench_compile, bench_codec);
criterion_main!(benches);
