//! Describe formatting: per-type scalar formats shared by generated code and
//! the interpreter, and the interpreter's value describer.

use crate::ast::BaseType;
use crate::codec::Codec;
use crate::registry::{ArrayCount, BitFieldView, Element, Primitive, RecordField, RecordId};
use crate::runtime::{describe_array, DescribeSink};
use crate::value::Value;
use crate::visit::{walk_record, FieldVisitor};
use std::collections::HashMap;
use std::convert::Infallible;

/// Format string for one scalar of `base`: integers as uppercase hex padded
/// to their byte width, floats with six decimals.
pub fn scalar_format(base: BaseType) -> &'static str {
    match base.width() {
        _ if base.is_float() => "{:.6}",
        1 => "0x{:02X}",
        2 => "0x{:04X}",
        4 => "0x{:08X}",
        _ => "0x{:016X}",
    }
}

/// Render a scalar value the way [`scalar_format`] would for its type.
pub fn format_scalar(v: &Value) -> String {
    match v {
        Value::U8(x) => format!("0x{:02X}", x),
        Value::I8(x) => format!("0x{:02X}", x),
        Value::U16(x) => format!("0x{:04X}", x),
        Value::I16(x) => format!("0x{:04X}", x),
        Value::U32(x) => format!("0x{:08X}", x),
        Value::I32(x) => format!("0x{:08X}", x),
        Value::U64(x) => format!("0x{:016X}", x),
        Value::I64(x) => format!("0x{:016X}", x),
        Value::Float(x) => format!("{:.6}", x),
        Value::Double(x) => format!("{:.6}", x),
        Value::Bytes(b) => b.iter().map(|x| format!("{:02X}", x)).collect::<Vec<_>>().join(" "),
        _ => format!("{:?}", v),
    }
}

/// Describe a record value through `sink`, recursing into nested records and
/// delegating externally-owned fields to their hooks.
pub(crate) fn describe_record(codec: &Codec, id: RecordId, value: &Value, sink: &mut dyn DescribeSink) {
    let Some(fields) = value.as_record() else {
        sink.line(format_args!("{}", format_scalar(value)));
        return;
    };
    let mut describer = ValueDescriber {
        codec,
        id,
        fields,
        sink,
    };
    walk_record(codec.schema().record(id), &mut describer).unwrap_or_else(|e| match e {});
}

struct ValueDescriber<'a> {
    codec: &'a Codec,
    id: RecordId,
    fields: &'a HashMap<String, Value>,
    sink: &'a mut dyn DescribeSink,
}

impl FieldVisitor for ValueDescriber<'_> {
    type Error = Infallible;

    fn scalar(&mut self, _: usize, field: &RecordField, _: Primitive) -> Result<(), Infallible> {
        if let Some(v) = self.fields.get(&field.name) {
            self.sink.line(format_args!("{}: {}", field.name, format_scalar(v)));
        }
        Ok(())
    }

    fn record(&mut self, _: usize, field: &RecordField, id: RecordId) -> Result<(), Infallible> {
        if let Some(v) = self.fields.get(&field.name) {
            self.sink.enter(&field.name);
            describe_record(self.codec, id, v, &mut *self.sink);
            self.sink.leave();
        }
        Ok(())
    }

    fn array(&mut self, _: usize, field: &RecordField, element: Element, _: ArrayCount) -> Result<(), Infallible> {
        let Some(items) = self.fields.get(&field.name).and_then(Value::as_array) else {
            return Ok(());
        };
        match element {
            Element::Scalar(_) => describe_array(
                &mut *self.sink,
                &field.name,
                items,
                self.codec.describe_chunk(),
                format_scalar,
            ),
            Element::Record(id) => {
                for (i, item) in items.iter().enumerate() {
                    self.sink.enter(&format!("{}[{}]", field.name, i));
                    describe_record(self.codec, id, item, &mut *self.sink);
                    self.sink.leave();
                }
            }
        }
        Ok(())
    }

    fn external(&mut self, index: usize, field: &RecordField, _: &str) -> Result<(), Infallible> {
        if let (Some(v), Some(hook)) = (self.fields.get(&field.name), self.codec.hook(self.id, index)) {
            hook.describe(&field.name, v, &mut *self.sink);
        }
        Ok(())
    }

    fn bit_field(&mut self, _: usize, field: &RecordField, view: &BitFieldView) -> Result<(), Infallible> {
        let record = self.codec.schema().record(self.id);
        let container = &record.fields[view.container].name;
        if let Some(raw) = self.fields.get(container).and_then(Value::to_bits) {
            self.sink.line(format_args!("{}: 0x{:X}", field.name, view.plan.get(raw)));
        }
        Ok(())
    }
}
