//! Abstract Syntax Tree for wire schemas.
//!
//! The tree is exactly what the parser saw: names are not resolved here. See
//! [`crate::registry::ResolvedSchema`] for the checked, indexed form.

/// A parsed schema file: `def` statements in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub definitions: Vec<Definition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub name: String,
    pub kind: DefKind,
    /// 1-based source line of the `def` keyword.
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DefKind {
    Primitive(PrimitiveSpec),
    Message(MessageSpec),
    Constant(ConstantSpec),
    BitField(BitFieldSpec),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveSpec {
    pub base_type: BaseType,
    /// Significance (0 = least significant byte) of each wire byte, if declared.
    pub byte_order: Option<Vec<usize>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageSpec {
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstantSpec {
    pub type_ref: String,
    pub value: Literal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BitFieldSpec {
    pub container: String,
    pub start_bit: u32,
    pub length: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub type_spec: TypeSpec,
    pub cardinality: Cardinality,
}

/// What a field is made of. Arrays and externally-owned fields only ever carry
/// a [`TypeSpec::Ref`]; the grammar has no inline form for them.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpec {
    Ref(String),
    BitField(BitFieldSpec),
    Message(MessageSpec),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cardinality {
    Scalar,
    FixedArray(ArrayLen),
    ExternallyOwned,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrayLen {
    Constant(u64),
    /// Count taken from a previously decoded field of the same record.
    FieldRef(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl BaseType {
    pub const ALL: [BaseType; 10] = [
        BaseType::U8,
        BaseType::U16,
        BaseType::U32,
        BaseType::U64,
        BaseType::I8,
        BaseType::I16,
        BaseType::I32,
        BaseType::I64,
        BaseType::F32,
        BaseType::F64,
    ];

    pub fn from_name(s: &str) -> Option<Self> {
        Some(match s {
            "u8" => BaseType::U8,
            "u16" => BaseType::U16,
            "u32" => BaseType::U32,
            "u64" => BaseType::U64,
            "i8" => BaseType::I8,
            "i16" => BaseType::I16,
            "i32" => BaseType::I32,
            "i64" => BaseType::I64,
            "f32" => BaseType::F32,
            "f64" => BaseType::F64,
            _ => return None,
        })
    }

    /// Schema spelling, which is also the Rust type name.
    pub fn name(self) -> &'static str {
        match self {
            BaseType::U8 => "u8",
            BaseType::U16 => "u16",
            BaseType::U32 => "u32",
            BaseType::U64 => "u64",
            BaseType::I8 => "i8",
            BaseType::I16 => "i16",
            BaseType::I32 => "i32",
            BaseType::I64 => "i64",
            BaseType::F32 => "f32",
            BaseType::F64 => "f64",
        }
    }

    pub fn width(self) -> usize {
        match self {
            BaseType::U8 | BaseType::I8 => 1,
            BaseType::U16 | BaseType::I16 => 2,
            BaseType::U32 | BaseType::I32 | BaseType::F32 => 4,
            BaseType::U64 | BaseType::I64 | BaseType::F64 => 8,
        }
    }

    pub fn bits(self) -> u32 {
        self.width() as u32 * 8
    }

    pub fn is_signed(self) -> bool {
        matches!(self, BaseType::I8 | BaseType::I16 | BaseType::I32 | BaseType::I64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, BaseType::F32 | BaseType::F64)
    }

    pub fn is_integer(self) -> bool {
        !self.is_float()
    }

    /// Unsigned type of the same width: the carrier for shifts and masks.
    pub fn unsigned(self) -> BaseType {
        match self.width() {
            1 => BaseType::U8,
            2 => BaseType::U16,
            4 => BaseType::U32,
            _ => BaseType::U64,
        }
    }

    /// Smallest unsigned type holding `bits` bits (bits <= 64).
    pub fn unsigned_for_bits(bits: u32) -> BaseType {
        match bits {
            0..=8 => BaseType::U8,
            9..=16 => BaseType::U16,
            17..=32 => BaseType::U32,
            _ => BaseType::U64,
        }
    }
}

impl std::fmt::Display for BaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Decimal; wide enough for every `i64` and `u64` value.
    Int(i128),
    Hex(u64),
    Float(f64),
    Bool(bool),
}

impl Literal {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Literal::Int(i) => (*i).try_into().ok(),
            Literal::Hex(h) => Some(*h),
            Literal::Bool(b) => Some(u64::from(*b)),
            Literal::Float(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Literal::Int(i) => (*i).try_into().ok(),
            Literal::Hex(h) => (*h).try_into().ok(),
            Literal::Bool(b) => Some(i64::from(*b)),
            Literal::Float(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Float(f) => Some(*f),
            Literal::Int(i) => Some(*i as f64),
            Literal::Hex(h) => Some(*h as f64),
            Literal::Bool(_) => None,
        }
    }
}

impl Schema {
    pub fn get(&self, name: &str) -> Option<&Definition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    /// Top-level message definitions in source order.
    pub fn messages(&self) -> impl Iterator<Item = (&str, &MessageSpec)> {
        self.definitions.iter().filter_map(|d| match &d.kind {
            DefKind::Message(m) => Some((d.name.as_str(), m)),
            _ => None,
        })
    }
}
