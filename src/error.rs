//! Compile-time errors: syntax (parser) and semantic (registry).
//!
//! Runtime errors of generated code live in [`crate::runtime::WireError`].

/// Malformed schema text. Always fatal for the file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{line}:{column}: {message}")]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl SyntaxError {
    pub(crate) fn at(pos: (usize, usize), message: impl Into<String>) -> Self {
        SyntaxError {
            line: pos.0,
            column: pos.1,
            message: message.into(),
        }
    }
}

/// Well-formed schema that does not describe a valid wire layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SemanticError {
    #[error("unknown type `{name}` referenced by `{referenced_by}`")]
    UnknownType { name: String, referenced_by: String },
    #[error("`{name}` is defined more than once")]
    DuplicateDefinition { name: String },
    #[error("field `{field}` appears more than once in `{record}`")]
    DuplicateField { record: String, field: String },
    #[error(
        "bit-field `{record}.{field}`: start_bit {start_bit} + length {length} does not fit a {width}-bit container"
    )]
    InvalidBitFieldRange {
        record: String,
        field: String,
        start_bit: u32,
        length: u32,
        width: u32,
    },
    #[error("bit-field `{record}.{field}`: container `{container}` is not an integer field of the record")]
    InvalidBitFieldContainer {
        record: String,
        field: String,
        container: String,
    },
    #[error("record contains itself by value: {}", cycle.join(" -> "))]
    SelfReferentialRecord { cycle: Vec<String> },
    #[error("`{name}`: byte order {order:?} is not a supported {width}-byte ordering")]
    InvalidByteOrder {
        name: String,
        order: Vec<usize>,
        width: usize,
    },
    #[error("array `{record}.{field}`: size `{size}` must name an earlier integer field")]
    InvalidArraySize {
        record: String,
        field: String,
        size: String,
    },
    #[error("constant `{name}`: {reason}")]
    InvalidConstant { name: String, reason: String },
    #[error("field `{record}.{field}`: {reason}")]
    InvalidFieldType {
        record: String,
        field: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("syntax error at {0}")]
    Syntax(#[from] SyntaxError),
    #[error("{0}")]
    Semantic(#[from] SemanticError),
    #[error("emit: {0}")]
    Emit(#[from] crate::emit::EmitError),
}
