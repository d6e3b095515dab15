//! # wiregen: schema compiler for binary wire formats
//!
//! Reads `def NAME = { ... }` schemas describing primitive scalars with an
//! explicit byte order, fixed and field-sized arrays, bit-fields packed in a
//! container field, constants and nested message records, and emits Rust code
//! that decodes and encodes them bit-exactly.
//!
//! ## Pipeline
//!
//! - [`parser`]: PEST grammar to [`ast::Schema`] ([`SyntaxError`] with line/column)
//! - [`registry`]: name resolution and checks to [`ResolvedSchema`] ([`SemanticError`])
//! - [`layout`] / [`bitfield`]: per-scalar byte programs and bit-field masks
//! - [`emit`]: Rust source per schema, linking against [`runtime`]
//! - [`codec`]: the same wire semantics interpreted over [`Value`] trees
//!
//! ## Example schema
//!
//! ```text
//! def u16_be  = { type: u16, byte_order: [1, 0] }
//! def f32_cdab = { type: f32, byte_order: [1, 0, 3, 2] }
//! def header = {
//!     type: message,
//!     fields: [
//!         flags: u8,
//!         mode: { type: bit_field, source: { container: flags, start_bit: 2, length: 3 } },
//!         count: u16_be,
//!         values: f32_cdab[count],
//!     ]
//! }
//! ```
//!
//! ## Usage
//!
//! ```
//! let src = "def ping = { type: message, fields: [ seq: u16 ] }";
//! let rust = wiregen::compile(src, "ping.pdl", &wiregen::EmitOptions::default()).unwrap();
//! assert!(rust.contains("pub struct Ping"));
//! ```

pub mod ast;
pub mod bitfield;
pub mod codec;
pub mod config;
pub mod describe;
pub mod emit;
pub mod error;
pub mod layout;
pub mod parser;
pub mod registry;
pub mod runtime;
pub mod value;
pub mod visit;

pub use ast::Schema;
pub use codec::{Codec, ExternalHook, HookError, Hooks};
pub use config::{ConfigFile, EmitOptions};
pub use emit::EmitError;
pub use error::{CompileError, SemanticError, SyntaxError};
pub use parser::parse;
pub use registry::ResolvedSchema;
pub use runtime::{ErrorCode, WireError};
pub use value::Value;

/// Parse and resolve `source`.
pub fn check(source: &str) -> Result<ResolvedSchema, CompileError> {
    let schema = parse(source)?;
    Ok(ResolvedSchema::resolve(&schema)?)
}

/// Compile `source` to Rust. Nothing is produced unless the whole schema
/// parses and resolves.
pub fn compile(source: &str, source_name: &str, opts: &EmitOptions) -> Result<String, CompileError> {
    let resolved = check(source)?;
    Ok(emit::emit(&resolved, source_name, opts)?)
}
