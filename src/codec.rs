//! Schema interpreter: encode/decode [`Value`] trees straight from a
//! [`ResolvedSchema`], with the same wire semantics as generated code.
//!
//! Useful for tests, tooling and schemas that change at run time. Fields are
//! transcribed in declared order; bit-fields are views and never appear in
//! decoded values; externally-owned fields go through registered
//! [`ExternalHook`]s.

use crate::describe::describe_record;
use crate::layout::{self, BytePlan, Direction};
use crate::registry::{ArrayCount, Element, FieldKind, Primitive, RecordField, RecordId, ResolvedSchema};
use crate::runtime::{DescribeSink, ReadBuf, WireError, WriteBuf};
use crate::value::Value;
use std::collections::HashMap;
use tracing::trace;

/// Interpreter counterpart of [`crate::runtime::ExternalField`].
pub trait ExternalHook {
    /// Decode the field; `parent` holds the fields decoded before it.
    fn decode(&self, parent: &HashMap<String, Value>, buf: &mut ReadBuf<'_>) -> Result<Value, WireError>;

    fn encode(&self, value: &Value, parent: &HashMap<String, Value>, buf: &mut WriteBuf<'_>) -> Result<(), WireError>;

    fn dispose(&self, _value: &mut Value) {}

    fn describe(&self, name: &str, value: &Value, sink: &mut dyn DescribeSink) {
        sink.line(format_args!("{}: {:?}", name, value));
    }
}

/// Hooks keyed by `(record, field)`.
pub type Hooks = HashMap<(String, String), Box<dyn ExternalHook>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HookError {
    #[error("no hook registered for externally-owned field `{record}.{field}`")]
    Missing { record: String, field: String },
    #[error("hook registered for `{record}.{field}`, which is not an externally-owned field")]
    Unknown { record: String, field: String },
}

pub struct Codec {
    schema: ResolvedSchema,
    hooks: HashMap<(RecordId, usize), Box<dyn ExternalHook>>,
    plans: HashMap<Primitive, (BytePlan, BytePlan)>,
    describe_chunk: usize,
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codec")
            .field("records", &self.schema.records.len())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl Codec {
    /// Bind `hooks` to the schema's externally-owned fields. Every such field
    /// needs exactly one hook and every hook must name one.
    pub fn new(schema: ResolvedSchema, mut hooks: Hooks) -> Result<Self, HookError> {
        let mut bound = HashMap::new();
        for (id, record) in schema.records.iter().enumerate() {
            for (index, field) in record.fields.iter().enumerate() {
                if !matches!(field.kind, FieldKind::External { .. }) {
                    continue;
                }
                let key = (record.name.clone(), field.name.clone());
                let hook = hooks.remove(&key).ok_or_else(|| HookError::Missing {
                    record: key.0.clone(),
                    field: key.1.clone(),
                })?;
                bound.insert((RecordId(id), index), hook);
            }
        }
        if let Some((record, field)) = hooks.into_keys().min() {
            return Err(HookError::Unknown { record, field });
        }

        let mut plans = HashMap::new();
        for record in &schema.records {
            for field in &record.fields {
                let p = match field.kind {
                    FieldKind::Scalar(p)
                    | FieldKind::Array {
                        element: Element::Scalar(p),
                        ..
                    } => p,
                    _ => continue,
                };
                if plans.contains_key(&p) {
                    continue;
                }
                if let (Ok(dec), Ok(enc)) = (
                    layout::plan(p.base, p.order, Direction::Decode),
                    layout::plan(p.base, p.order, Direction::Encode),
                ) {
                    plans.insert(p, (dec, enc));
                }
            }
        }

        Ok(Codec {
            schema,
            hooks: bound,
            plans,
            describe_chunk: 16,
        })
    }

    /// Elements per line when describing primitive arrays.
    pub fn with_describe_chunk(mut self, chunk: usize) -> Self {
        self.describe_chunk = chunk.max(1);
        self
    }

    pub fn schema(&self) -> &ResolvedSchema {
        &self.schema
    }

    pub(crate) fn describe_chunk(&self) -> usize {
        self.describe_chunk
    }

    pub(crate) fn hook(&self, id: RecordId, index: usize) -> Option<&dyn ExternalHook> {
        self.hooks.get(&(id, index)).map(|h| &**h)
    }

    fn id(&self, record: &str) -> Result<RecordId, WireError> {
        self.schema.record_id(record).ok_or(WireError::NullReference)
    }

    // ==================== Decode ====================

    /// Decode one `record` from the front of `bytes`; returns the value and
    /// the number of bytes consumed.
    pub fn decode(&self, record: &str, bytes: &[u8]) -> Result<(Value, usize), WireError> {
        let id = self.id(record)?;
        let mut buf = ReadBuf::new(bytes);
        let value = self.decode_record(id, &mut buf)?;
        Ok((value, buf.position()))
    }

    fn decode_record(&self, id: RecordId, buf: &mut ReadBuf<'_>) -> Result<Value, WireError> {
        let record = self.schema.record(id);
        let mut fields = HashMap::with_capacity(record.fields.len());
        for (index, field) in record.fields.iter().enumerate() {
            match self.decode_field(id, index, field, &fields, buf) {
                Ok(Some(v)) => {
                    fields.insert(field.name.clone(), v);
                }
                Ok(None) => {}
                Err(e) => {
                    trace!(record = %record.name, field = %field.name, error = %e, "decode failed");
                    let mut partial = Value::Record(fields);
                    self.dispose_record(id, &mut partial);
                    return Err(e);
                }
            }
        }
        Ok(Value::Record(fields))
    }

    fn decode_field(
        &self,
        id: RecordId,
        index: usize,
        field: &RecordField,
        fields: &HashMap<String, Value>,
        buf: &mut ReadBuf<'_>,
    ) -> Result<Option<Value>, WireError> {
        let value = match &field.kind {
            FieldKind::Scalar(p) => self.decode_scalar(*p, buf)?,
            FieldKind::Record(child) => self.decode_record(*child, buf)?,
            FieldKind::Array { element, count } => {
                let n = self.count(id, *count, fields)?;
                let n = usize::try_from(n).map_err(|_| WireError::OutOfBounds)?;
                if let Element::Scalar(p) = element {
                    buf.ensure(n.checked_mul(p.base.width()).ok_or(WireError::OutOfBounds)?)?;
                }
                // A record element can be zero bytes wide, so its count is not
                // checked up front; cap the reservation at the input left.
                let reserve = match element {
                    Element::Scalar(_) => n,
                    Element::Record(_) => n.min(buf.remaining_len()),
                };
                let mut items = Vec::new();
                items
                    .try_reserve_exact(reserve)
                    .map_err(|_| WireError::AllocationFailure)?;
                for _ in 0..n {
                    let item = match element {
                        Element::Scalar(p) => self.decode_scalar(*p, buf),
                        Element::Record(child) => self.decode_record(*child, buf),
                    };
                    match item {
                        Ok(v) => items.push(v),
                        Err(e) => {
                            self.dispose_field(&field.kind, id, index, &mut Value::Array(items));
                            return Err(e);
                        }
                    }
                }
                Value::Array(items)
            }
            FieldKind::External { .. } => {
                let hook = self.hook(id, index).ok_or(WireError::NullReference)?;
                hook.decode(fields, buf)?
            }
            FieldKind::BitField(_) => return Ok(None),
        };
        Ok(Some(value))
    }

    fn decode_scalar(&self, p: Primitive, buf: &mut ReadBuf<'_>) -> Result<Value, WireError> {
        let (plan, _) = self.plans.get(&p).ok_or(WireError::NullReference)?;
        let bytes = buf.take(plan.width())?;
        Ok(Value::from_bits(p.base, plan.assemble(bytes)))
    }

    fn count(&self, id: RecordId, count: ArrayCount, fields: &HashMap<String, Value>) -> Result<u64, WireError> {
        match count {
            ArrayCount::Fixed(n) => Ok(n),
            ArrayCount::Field(i) => {
                let name = &self.schema.record(id).fields[i].name;
                match fields.get(name) {
                    Some(v) => v.as_count().ok_or(WireError::OutOfBounds),
                    None => Ok(0),
                }
            }
        }
    }

    // ==================== Encode ====================

    /// Encode `value` as `record` into `out`; returns the bytes written. On
    /// failure, bytes of fields already written stay in `out`.
    pub fn encode(&self, record: &str, value: &Value, out: &mut [u8]) -> Result<usize, WireError> {
        let id = self.id(record)?;
        let mut buf = WriteBuf::new(out);
        self.encode_record(id, value, &mut buf)?;
        Ok(buf.position())
    }

    /// Encode into a fresh vector, growing the scratch space while the
    /// encoder runs out of room.
    pub fn encode_to_vec(&self, record: &str, value: &Value) -> Result<Vec<u8>, WireError> {
        let id = self.id(record)?;
        let mut size = 256;
        loop {
            let mut out = vec![0u8; size];
            let mut buf = WriteBuf::new(&mut out);
            match self.encode_record(id, value, &mut buf) {
                Ok(()) => {
                    let n = buf.position();
                    out.truncate(n);
                    return Ok(out);
                }
                Err(WireError::OutOfBounds) if buf.exhausted() && size < 1 << 30 => size *= 4,
                Err(e) => return Err(e),
            }
        }
    }

    fn encode_record(&self, id: RecordId, value: &Value, buf: &mut WriteBuf<'_>) -> Result<(), WireError> {
        let empty = HashMap::new();
        let fields = match value {
            Value::Record(m) => m,
            _ => return Err(WireError::NullReference),
        };
        let record = self.schema.record(id);
        for (index, field) in record.fields.iter().enumerate() {
            let v = fields.get(&field.name);
            match &field.kind {
                FieldKind::Scalar(p) => self.encode_scalar(*p, v, buf)?,
                FieldKind::Record(child) => match v {
                    Some(v) => self.encode_record(*child, v, buf)?,
                    None => self.encode_record(*child, &Value::Record(empty.clone()), buf)?,
                },
                FieldKind::Array { element, count } => {
                    let n = usize::try_from(self.count(id, *count, fields)?).map_err(|_| WireError::OutOfBounds)?;
                    let items = v.and_then(Value::as_array).unwrap_or(&[]);
                    let items = items.get(..n).ok_or(WireError::OutOfBounds)?;
                    for item in items {
                        match element {
                            Element::Scalar(p) => self.encode_scalar(*p, Some(item), buf)?,
                            Element::Record(child) => self.encode_record(*child, item, buf)?,
                        }
                    }
                }
                FieldKind::External { .. } => {
                    let hook = self.hook(id, index).ok_or(WireError::NullReference)?;
                    hook.encode(v.ok_or(WireError::NullReference)?, fields, buf)?;
                }
                FieldKind::BitField(_) => {}
            }
        }
        Ok(())
    }

    fn encode_scalar(&self, p: Primitive, v: Option<&Value>, buf: &mut WriteBuf<'_>) -> Result<(), WireError> {
        let (_, plan) = self.plans.get(&p).ok_or(WireError::NullReference)?;
        let raw = match v {
            None => 0,
            Some(v) => scalar_bits(p, v).ok_or(WireError::NullReference)?,
        };
        let mut bytes = [0u8; 8];
        let width = plan.width();
        plan.scatter(raw, &mut bytes[..width]);
        buf.put_slice(&bytes[..width])
    }

    // ==================== Dispose ====================

    /// Release everything `value` owns, calling external hooks' `dispose`,
    /// and leave it an empty record.
    pub fn dispose(&self, record: &str, value: &mut Value) -> Result<(), WireError> {
        let id = self.id(record)?;
        self.dispose_record(id, value);
        Ok(())
    }

    fn dispose_record(&self, id: RecordId, value: &mut Value) {
        let Some(fields) = value.as_record_mut() else {
            return;
        };
        let record = self.schema.record(id);
        for (index, field) in record.fields.iter().enumerate() {
            if let Some(v) = fields.get_mut(&field.name) {
                self.dispose_field(&field.kind, id, index, v);
            }
        }
        fields.clear();
    }

    fn dispose_field(&self, kind: &FieldKind, id: RecordId, index: usize, value: &mut Value) {
        match kind {
            FieldKind::Record(child) => self.dispose_record(*child, value),
            FieldKind::Array { element, .. } => {
                if let Value::Array(items) = value {
                    if let Element::Record(child) = element {
                        for item in items.iter_mut() {
                            self.dispose_record(*child, item);
                        }
                    }
                    *items = Vec::new();
                }
            }
            FieldKind::External { .. } => {
                if let Some(hook) = self.hook(id, index) {
                    hook.dispose(value);
                }
            }
            FieldKind::Scalar(_) | FieldKind::BitField(_) => {}
        }
    }

    // ==================== Describe / bit-fields ====================

    pub fn describe(&self, record: &str, value: &Value, sink: &mut dyn DescribeSink) -> Result<(), WireError> {
        let id = self.id(record)?;
        describe_record(self, id, value, sink);
        Ok(())
    }

    /// Read bit-field `field` of a `record` value from its container.
    pub fn bit_field(&self, record: &str, field: &str, value: &Value) -> Result<u64, WireError> {
        let (container, view) = self.bit_field_view(record, field)?;
        let raw = value.get(container).and_then(Value::to_bits).unwrap_or(0);
        Ok(view.plan.get(raw))
    }

    /// Write bit-field `field` into its container; the container is created
    /// as zero if absent. Bits of `bits` above the field length are dropped.
    pub fn set_bit_field(&self, record: &str, field: &str, value: &mut Value, bits: u64) -> Result<(), WireError> {
        let (container, view) = self.bit_field_view(record, field)?;
        let id = self.id(record)?;
        let base = match self.schema.record(id).fields[view.container].kind {
            FieldKind::Scalar(p) => p.base,
            _ => return Err(WireError::NullReference),
        };
        let fields = value.as_record_mut().ok_or(WireError::NullReference)?;
        let raw = fields.get(container).and_then(Value::to_bits).unwrap_or(0);
        fields.insert(container.to_string(), Value::from_bits(base, view.plan.set(raw, bits)));
        Ok(())
    }

    fn bit_field_view(&self, record: &str, field: &str) -> Result<(&str, crate::registry::BitFieldView), WireError> {
        let r = self.schema.get_record(record).ok_or(WireError::NullReference)?;
        match r.field(field) {
            Some((_, RecordField {
                kind: FieldKind::BitField(view),
                ..
            })) => Ok((r.fields[view.container].name.as_str(), *view)),
            _ => Err(WireError::NullReference),
        }
    }
}

/// Wire bit pattern of `v` for a field of type `p`. Integers keep their bit
/// pattern; numbers given for float fields convert numerically.
fn scalar_bits(p: Primitive, v: &Value) -> Option<u64> {
    use crate::ast::BaseType;
    match (p.base, v) {
        (BaseType::F32, Value::Float(x)) => Some(u64::from(x.to_bits())),
        (BaseType::F32, Value::Double(x)) => Some(u64::from((*x as f32).to_bits())),
        (BaseType::F64, Value::Double(x)) => Some(x.to_bits()),
        (BaseType::F64, Value::Float(x)) => Some(f64::from(*x).to_bits()),
        (BaseType::F32, other) => other.as_i64().map(|i| u64::from((i as f32).to_bits())),
        (BaseType::F64, other) => other.as_i64().map(|i| (i as f64).to_bits()),
        (_, other) => other.to_bits(),
    }
}
