//! Name resolution and validation: turns a parsed [`Schema`] into a
//! [`ResolvedSchema`] whose records reference each other by [`RecordId`] and
//! whose fields carry everything code generation needs (byte order, bit-field
//! plan, array count source).

use crate::ast::{
    self, ArrayLen, BaseType, BitFieldSpec, Cardinality, DefKind, Definition, Literal,
    MessageSpec, PrimitiveSpec, Schema, TypeSpec,
};
use crate::bitfield::BitFieldPlan;
use crate::error::SemanticError;
use crate::layout::ByteOrderClass;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// Index into [`ResolvedSchema::records`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub usize);

/// A scalar wire type: base type plus byte order (`None` only for one-byte types).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Primitive {
    pub base: BaseType,
    pub order: Option<ByteOrderClass>,
}

impl Primitive {
    /// The base type as written bare in a schema: big-endian when multi-byte.
    pub fn builtin(base: BaseType) -> Self {
        let order = if base.width() == 1 {
            None
        } else {
            Some(ByteOrderClass::NativeBigEndian)
        };
        Primitive { base, order }
    }
}

/// Named primitive definition (`def u16_le = { type: u16, byte_order: [0, 1] }`).
#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    pub name: String,
    pub primitive: Primitive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub name: String,
    pub primitive: Primitive,
    pub value: Literal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: String,
    pub fields: Vec<RecordField>,
    /// Message-type ordinal; `None` for records hoisted from inline messages.
    pub ordinal: Option<u32>,
    /// No externally-owned field is reachable by value.
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordField {
    pub name: String,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Scalar(Primitive),
    Record(RecordId),
    Array { element: Element, count: ArrayCount },
    /// Delegated to application code; `target` is the schema type it documents.
    External { target: String },
    /// View over bits of another field; occupies no wire bytes.
    BitField(BitFieldView),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitFieldView {
    /// Index of the container field in the same record.
    pub container: usize,
    pub plan: BitFieldPlan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    Scalar(Primitive),
    Record(RecordId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayCount {
    Fixed(u64),
    /// Index of an earlier integer field holding the count.
    Field(usize),
}

impl Record {
    pub fn field(&self, name: &str) -> Option<(usize, &RecordField)> {
        self.fields.iter().enumerate().find(|(_, f)| f.name == name)
    }

    /// Records contained by value (directly or as array elements).
    pub fn children(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.fields.iter().filter_map(|f| match f.kind {
            FieldKind::Record(id) => Some(id),
            FieldKind::Array {
                element: Element::Record(id),
                ..
            } => Some(id),
            _ => None,
        })
    }

    pub fn externals(&self) -> impl Iterator<Item = &RecordField> + '_ {
        self.fields
            .iter()
            .filter(|f| matches!(f.kind, FieldKind::External { .. }))
    }
}

/// Checked, indexed schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSchema {
    pub aliases: Vec<Alias>,
    pub constants: Vec<Constant>,
    /// Top-level messages in definition order, each followed by the records
    /// hoisted from its inline messages.
    pub records: Vec<Record>,
    names: HashMap<String, RecordId>,
}

impl ResolvedSchema {
    pub fn resolve(schema: &Schema) -> Result<Self, SemanticError> {
        let mut defs: HashMap<&str, &Definition> = HashMap::new();
        for def in &schema.definitions {
            if BaseType::from_name(&def.name).is_some()
                || defs.insert(def.name.as_str(), def).is_some()
            {
                return Err(SemanticError::DuplicateDefinition {
                    name: def.name.clone(),
                });
            }
        }

        let mut pending = Vec::new();
        let mut ordinal = 0u32;
        for (index, def) in schema.definitions.iter().enumerate() {
            if let DefKind::Message(spec) = &def.kind {
                ordinal += 1;
                hoist(def.name.clone(), spec, Some(ordinal), index, &mut pending);
            }
        }
        let mut names = HashMap::new();
        for (i, p) in pending.iter().enumerate() {
            let clashes = p.ordinal.is_none()
                && (defs.contains_key(p.name.as_str()) || BaseType::from_name(&p.name).is_some());
            if clashes || names.insert(p.name.clone(), RecordId(i)).is_some() {
                return Err(SemanticError::DuplicateDefinition {
                    name: p.name.clone(),
                });
            }
        }

        let resolver = Resolver {
            defs,
            record_ids: &names,
        };
        let mut aliases = Vec::new();
        let mut constants = Vec::new();
        let mut records = Vec::with_capacity(pending.len());
        let mut next = 0;
        for (index, def) in schema.definitions.iter().enumerate() {
            match &def.kind {
                DefKind::Primitive(spec) => aliases.push(Alias {
                    name: def.name.clone(),
                    primitive: resolver.primitive(&def.name, spec)?,
                }),
                DefKind::Constant(spec) => constants.push(resolver.constant(&def.name, spec)?),
                // Bit-field definitions are templates; checked where a record uses them.
                DefKind::BitField(_) => {}
                DefKind::Message(_) => {
                    while next < pending.len() && pending[next].def_index == index {
                        records.push(resolver.record(&pending[next])?);
                        next += 1;
                    }
                }
            }
            debug!(name = %def.name, line = def.line, "resolved definition");
        }

        if let Some(cycle) = find_cycle(&records) {
            return Err(SemanticError::SelfReferentialRecord { cycle });
        }
        let closed = closed_records(&records);
        for (record, closed) in records.iter_mut().zip(closed) {
            record.closed = closed;
        }

        Ok(ResolvedSchema {
            aliases,
            constants,
            records,
            names,
        })
    }

    pub fn record(&self, id: RecordId) -> &Record {
        &self.records[id.0]
    }

    pub fn record_id(&self, name: &str) -> Option<RecordId> {
        self.names.get(name).copied()
    }

    pub fn get_record(&self, name: &str) -> Option<&Record> {
        self.record_id(name).map(|id| self.record(id))
    }

    /// Top-level messages, in ordinal order.
    pub fn messages(&self) -> impl Iterator<Item = (u32, &Record)> {
        self.records
            .iter()
            .filter_map(|r| r.ordinal.map(|o| (o, r)))
    }

    /// Every externally-owned field as `(record, field)`.
    pub fn externals(&self) -> impl Iterator<Item = (&Record, &RecordField)> {
        self.records
            .iter()
            .flat_map(|r| r.externals().map(move |f| (r, f)))
    }
}

struct Pending<'a> {
    name: String,
    spec: &'a MessageSpec,
    ordinal: Option<u32>,
    def_index: usize,
}

fn hoist<'a>(
    name: String,
    spec: &'a MessageSpec,
    ordinal: Option<u32>,
    def_index: usize,
    out: &mut Vec<Pending<'a>>,
) {
    let inline: Vec<(String, &'a MessageSpec)> = spec
        .fields
        .iter()
        .filter_map(|f| match &f.type_spec {
            TypeSpec::Message(m) => Some((format!("{}_{}", name, f.name), m)),
            _ => None,
        })
        .collect();
    out.push(Pending {
        name,
        spec,
        ordinal,
        def_index,
    });
    for (child, m) in inline {
        hoist(child, m, None, def_index, out);
    }
}

enum Named<'a> {
    Builtin(BaseType),
    Def(&'a Definition),
}

struct Resolver<'a> {
    defs: HashMap<&'a str, &'a Definition>,
    record_ids: &'a HashMap<String, RecordId>,
}

impl<'a> Resolver<'a> {
    fn lookup(&self, name: &str) -> Option<Named<'a>> {
        if let Some(base) = BaseType::from_name(name) {
            return Some(Named::Builtin(base));
        }
        self.defs.get(name).map(|d| Named::Def(*d))
    }

    fn primitive(&self, name: &str, spec: &PrimitiveSpec) -> Result<Primitive, SemanticError> {
        let base = spec.base_type;
        let width = base.width();
        let Some(order) = &spec.byte_order else {
            return Ok(Primitive::builtin(base));
        };
        let invalid = || SemanticError::InvalidByteOrder {
            name: name.to_string(),
            order: order.clone(),
            width,
        };
        if order.len() != width {
            return Err(invalid());
        }
        if width == 1 {
            return match order.as_slice() {
                [0] => Ok(Primitive { base, order: None }),
                _ => Err(invalid()),
            };
        }
        let class = ByteOrderClass::classify(order).ok_or_else(invalid)?;
        Ok(Primitive {
            base,
            order: Some(class),
        })
    }

    fn constant(&self, name: &str, spec: &ast::ConstantSpec) -> Result<Constant, SemanticError> {
        let primitive = match self.lookup(&spec.type_ref) {
            None => {
                return Err(SemanticError::UnknownType {
                    name: spec.type_ref.clone(),
                    referenced_by: name.to_string(),
                })
            }
            Some(Named::Builtin(base)) => Primitive::builtin(base),
            Some(Named::Def(def)) => match &def.kind {
                DefKind::Primitive(ps) => self.primitive(&def.name, ps)?,
                _ => {
                    return Err(SemanticError::InvalidConstant {
                        name: name.to_string(),
                        reason: format!("type `{}` is not a primitive", spec.type_ref),
                    })
                }
            },
        };
        check_literal(primitive.base, &spec.value).map_err(|reason| {
            SemanticError::InvalidConstant {
                name: name.to_string(),
                reason,
            }
        })?;
        Ok(Constant {
            name: name.to_string(),
            primitive,
            value: spec.value.clone(),
        })
    }

    fn record(&self, p: &Pending<'_>) -> Result<Record, SemanticError> {
        let mut seen = HashSet::new();
        for f in &p.spec.fields {
            if !seen.insert(f.name.as_str()) {
                return Err(SemanticError::DuplicateField {
                    record: p.name.clone(),
                    field: f.name.clone(),
                });
            }
        }
        let mut fields: Vec<RecordField> = Vec::with_capacity(p.spec.fields.len());
        for (index, f) in p.spec.fields.iter().enumerate() {
            let kind = self.field_kind(&p.name, p.spec, index, &fields)?;
            trace!(record = %p.name, field = %f.name, ?kind, "resolved field");
            fields.push(RecordField {
                name: f.name.clone(),
                kind,
            });
        }
        Ok(Record {
            name: p.name.clone(),
            fields,
            ordinal: p.ordinal,
            closed: true,
        })
    }

    fn field_kind(
        &self,
        record: &str,
        spec: &MessageSpec,
        index: usize,
        before: &[RecordField],
    ) -> Result<FieldKind, SemanticError> {
        let field = &spec.fields[index];
        let unknown = |name: &str| SemanticError::UnknownType {
            name: name.to_string(),
            referenced_by: format!("{}.{}", record, field.name),
        };
        let invalid = |reason: String| SemanticError::InvalidFieldType {
            record: record.to_string(),
            field: field.name.clone(),
            reason,
        };
        match (&field.cardinality, &field.type_spec) {
            (Cardinality::Scalar, TypeSpec::Ref(name)) => match self.lookup(name) {
                None => Err(unknown(name)),
                Some(Named::Builtin(base)) => Ok(FieldKind::Scalar(Primitive::builtin(base))),
                Some(Named::Def(def)) => match &def.kind {
                    DefKind::Primitive(ps) => Ok(FieldKind::Scalar(self.primitive(&def.name, ps)?)),
                    DefKind::Message(_) => self
                        .record_ids
                        .get(name.as_str())
                        .map(|id| FieldKind::Record(*id))
                        .ok_or_else(|| unknown(name)),
                    DefKind::BitField(bf) => Ok(FieldKind::BitField(self.bit_field(record, spec, field, bf)?)),
                    DefKind::Constant(_) => Err(invalid(format!(
                        "`{}` is a constant, not a wire type",
                        name
                    ))),
                },
            },
            (Cardinality::Scalar, TypeSpec::BitField(bf)) => {
                Ok(FieldKind::BitField(self.bit_field(record, spec, field, bf)?))
            }
            (Cardinality::Scalar, TypeSpec::Message(_)) => {
                let hoisted = format!("{}_{}", record, field.name);
                self.record_ids
                    .get(&hoisted)
                    .map(|id| FieldKind::Record(*id))
                    .ok_or_else(|| unknown(&hoisted))
            }
            (Cardinality::FixedArray(len), TypeSpec::Ref(name)) => {
                let element = match self.lookup(name) {
                    None => return Err(unknown(name)),
                    Some(Named::Builtin(base)) => Element::Scalar(Primitive::builtin(base)),
                    Some(Named::Def(def)) => match &def.kind {
                        DefKind::Primitive(ps) => Element::Scalar(self.primitive(&def.name, ps)?),
                        DefKind::Message(_) => match self.record_ids.get(name.as_str()) {
                            Some(id) => Element::Record(*id),
                            None => return Err(unknown(name)),
                        },
                        _ => {
                            return Err(invalid(format!(
                                "array element `{}` must be a primitive or message",
                                name
                            )))
                        }
                    },
                };
                let count = match len {
                    ArrayLen::Constant(n) => ArrayCount::Fixed(*n),
                    ArrayLen::FieldRef(size) => {
                        let found = before
                            .iter()
                            .enumerate()
                            .find(|(_, f)| f.name == *size)
                            .map(|(i, f)| (i, &f.kind));
                        match found {
                            Some((i, FieldKind::Scalar(p))) if p.base.is_integer() => ArrayCount::Field(i),
                            _ => {
                                return Err(SemanticError::InvalidArraySize {
                                    record: record.to_string(),
                                    field: field.name.clone(),
                                    size: size.clone(),
                                })
                            }
                        }
                    }
                };
                Ok(FieldKind::Array { element, count })
            }
            (Cardinality::ExternallyOwned, TypeSpec::Ref(name)) => match self.lookup(name) {
                None => Err(unknown(name)),
                Some(Named::Def(def)) if matches!(def.kind, DefKind::Constant(_) | DefKind::BitField(_)) => {
                    Err(invalid(format!("`{}` cannot be externally owned", name)))
                }
                Some(_) => Ok(FieldKind::External {
                    target: name.clone(),
                }),
            },
            _ => Err(invalid("unsupported field form".to_string())),
        }
    }

    fn bit_field(
        &self,
        record: &str,
        spec: &MessageSpec,
        field: &ast::Field,
        bf: &BitFieldSpec,
    ) -> Result<BitFieldView, SemanticError> {
        let bad_container = || SemanticError::InvalidBitFieldContainer {
            record: record.to_string(),
            field: field.name.clone(),
            container: bf.container.clone(),
        };
        let container = spec
            .fields
            .iter()
            .position(|f| f.name == bf.container)
            .ok_or_else(bad_container)?;
        let target = &spec.fields[container];
        let base = match (&target.cardinality, &target.type_spec) {
            (Cardinality::Scalar, TypeSpec::Ref(name)) => match self.lookup(name) {
                Some(Named::Builtin(base)) => base,
                Some(Named::Def(Definition {
                    kind: DefKind::Primitive(ps),
                    ..
                })) => ps.base_type,
                _ => return Err(bad_container()),
            },
            _ => return Err(bad_container()),
        };
        if !base.is_integer() {
            return Err(bad_container());
        }
        let plan = BitFieldPlan::new(base.bits(), bf.start_bit, bf.length).map_err(|e| {
            SemanticError::InvalidBitFieldRange {
                record: record.to_string(),
                field: field.name.clone(),
                start_bit: e.start_bit,
                length: e.length,
                width: e.container_bits,
            }
        })?;
        Ok(BitFieldView { container, plan })
    }
}

fn check_literal(base: BaseType, value: &Literal) -> Result<(), String> {
    if base.is_float() {
        let v = value
            .as_f64()
            .ok_or_else(|| format!("boolean literal for {}", base))?;
        if !v.is_finite() {
            return Err(format!("{} is not a finite {}", v, base));
        }
        if base == BaseType::F32 && v.abs() > f64::from(f32::MAX) {
            return Err(format!("{} does not fit f32", v));
        }
        return Ok(());
    }
    let bits = base.bits();
    let fits = match value {
        Literal::Float(f) => return Err(format!("floating-point literal {} for {}", f, base)),
        Literal::Bool(_) => true,
        Literal::Hex(h) => bits == 64 || h >> bits == 0,
        Literal::Int(i) => {
            let i = *i;
            if base.is_signed() {
                let max = (1i128 << (bits - 1)) - 1;
                (-max - 1..=max).contains(&i)
            } else {
                (0..=(1i128 << bits) - 1).contains(&i)
            }
        }
    };
    if fits {
        Ok(())
    } else {
        Err(format!("value does not fit {}", base))
    }
}

/// First by-value containment cycle, as record names with the repeated
/// record at both ends.
fn find_cycle(records: &[Record]) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Active,
        Done,
    }

    fn visit(
        records: &[Record],
        id: usize,
        marks: &mut [Mark],
        stack: &mut Vec<usize>,
    ) -> Option<Vec<String>> {
        marks[id] = Mark::Active;
        stack.push(id);
        for child in records[id].children() {
            match marks[child.0] {
                Mark::Active => {
                    let start = stack.iter().position(|&s| s == child.0)?;
                    let mut cycle: Vec<String> =
                        stack[start..].iter().map(|&i| records[i].name.clone()).collect();
                    cycle.push(records[child.0].name.clone());
                    return Some(cycle);
                }
                Mark::New => {
                    if let Some(cycle) = visit(records, child.0, marks, stack) {
                        return Some(cycle);
                    }
                }
                Mark::Done => {}
            }
        }
        stack.pop();
        marks[id] = Mark::Done;
        None
    }

    let mut marks = vec![Mark::New; records.len()];
    let mut stack = Vec::new();
    for id in 0..records.len() {
        if marks[id] == Mark::New {
            if let Some(cycle) = visit(records, id, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
    }
    None
}

/// Per record: no externally-owned field reachable by value. Requires an
/// acyclic record graph.
fn closed_records(records: &[Record]) -> Vec<bool> {
    fn closed(records: &[Record], id: usize, memo: &mut [Option<bool>]) -> bool {
        if let Some(c) = memo[id] {
            return c;
        }
        let mut result = records[id].externals().next().is_none();
        for child in records[id].children() {
            result &= closed(records, child.0, memo);
        }
        memo[id] = Some(result);
        result
    }

    let mut memo = vec![None; records.len()];
    (0..records.len())
        .map(|id| closed(records, id, &mut memo))
        .collect()
}
