//! Per-field dispatch over a resolved record.
//!
//! The emitter's decode/encode/dispose/describe generators and the
//! interpreter's describer all walk records through this one trait, so each
//! field kind is matched in exactly one place.

use crate::registry::{ArrayCount, BitFieldView, Element, FieldKind, Primitive, Record, RecordField, RecordId};

pub trait FieldVisitor {
    type Error;

    fn scalar(&mut self, index: usize, field: &RecordField, primitive: Primitive) -> Result<(), Self::Error>;

    fn record(&mut self, index: usize, field: &RecordField, id: RecordId) -> Result<(), Self::Error>;

    fn array(
        &mut self,
        index: usize,
        field: &RecordField,
        element: Element,
        count: ArrayCount,
    ) -> Result<(), Self::Error>;

    fn external(&mut self, index: usize, field: &RecordField, target: &str) -> Result<(), Self::Error>;

    /// Bit-fields occupy no wire bytes; most passes skip them.
    fn bit_field(&mut self, _index: usize, _field: &RecordField, _view: &BitFieldView) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Visit `record`'s fields in declared (wire) order, stopping at the first error.
pub fn walk_record<V: FieldVisitor + ?Sized>(record: &Record, visitor: &mut V) -> Result<(), V::Error> {
    for (index, field) in record.fields.iter().enumerate() {
        match &field.kind {
            FieldKind::Scalar(p) => visitor.scalar(index, field, *p)?,
            FieldKind::Record(id) => visitor.record(index, field, *id)?,
            FieldKind::Array { element, count } => visitor.array(index, field, *element, *count)?,
            FieldKind::External { target } => visitor.external(index, field, target)?,
            FieldKind::BitField(view) => visitor.bit_field(index, field, view)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::registry::ResolvedSchema;

    #[derive(Default)]
    struct Names(Vec<String>);

    impl FieldVisitor for Names {
        type Error = String;

        fn scalar(&mut self, _: usize, f: &RecordField, _: Primitive) -> Result<(), String> {
            self.0.push(format!("s:{}", f.name));
            Ok(())
        }
        fn record(&mut self, _: usize, f: &RecordField, _: RecordId) -> Result<(), String> {
            self.0.push(format!("r:{}", f.name));
            Ok(())
        }
        fn array(&mut self, _: usize, f: &RecordField, _: Element, _: ArrayCount) -> Result<(), String> {
            Err(format!("stop at {}", f.name))
        }
        fn external(&mut self, _: usize, f: &RecordField, _: &str) -> Result<(), String> {
            self.0.push(format!("x:{}", f.name));
            Ok(())
        }
    }

    #[test]
    fn walks_in_order_and_stops_on_error() {
        let schema = parse(
            "def m = { type: message, fields: [ a: u8, b: { type: bit_field, source: { container: a, start_bit: 0, length: 1 } }, p: *u8, c: u8[2], d: u8 ] }",
        )
        .unwrap();
        let resolved = ResolvedSchema::resolve(&schema).unwrap();
        let mut v = Names::default();
        let err = walk_record(&resolved.records[0], &mut v).unwrap_err();
        assert_eq!(err, "stop at c");
        assert_eq!(v.0, ["s:a", "x:p"]);
    }
}
