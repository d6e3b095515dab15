//! Interpreter fuzz target: decode arbitrary bytes as each message of the
//! bundled Modbus schema and re-encode whatever decodes.
//! Build with: cargo fuzz run codec_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;
#[cfg(fuzzing)]
use std::collections::HashMap;
#[cfg(fuzzing)]
use wiregen::runtime::{ReadBuf, WriteBuf};
#[cfg(fuzzing)]
use wiregen::{Codec, ExternalHook, Hooks, Value, WireError};

#[cfg(fuzzing)]
struct Rest;

#[cfg(fuzzing)]
impl ExternalHook for Rest {
    fn decode(&self, _: &HashMap<String, Value>, buf: &mut ReadBuf<'_>) -> Result<Value, WireError> {
        let n = buf.remaining_len();
        Ok(Value::Bytes(buf.take(n)?.to_vec()))
    }

    fn encode(&self, value: &Value, _: &HashMap<String, Value>, buf: &mut WriteBuf<'_>) -> Result<(), WireError> {
        match value {
            Value::Bytes(b) => buf.put_slice(b),
            _ => Err(WireError::NullReference),
        }
    }
}

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let Ok(schema) = wiregen::check(include_str!("../../schemas/modbus.pdl")) else {
        return;
    };
    let mut hooks: Hooks = HashMap::new();
    hooks.insert(("meter_block".to_string(), "vendor_blob".to_string()), Box::new(Rest));
    let Ok(codec) = Codec::new(schema, hooks) else {
        return;
    };
    let names: Vec<String> = codec.schema().records.iter().map(|r| r.name.clone()).collect();
    for name in &names {
        if let Ok((mut value, used)) = codec.decode(name, data) {
            let encoded = codec.encode_to_vec(name, &value);
            assert_eq!(encoded.as_deref(), Ok(&data[..used]), "{} does not round-trip", name);
            let _ = codec.dispose(name, &mut value);
        }
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run codec_fuzz");
}
