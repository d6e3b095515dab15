//! Rust code emitter.
//!
//! Produces one self-contained module per schema: type aliases, constants,
//! the `MessageType` enumeration and, per record, a struct with `Record` and
//! `Dispose` impls linking against [`crate::runtime`].

mod names;
mod record;

pub use names::{const_name, external_type, field_name, type_name};

use crate::ast::{BaseType, Literal};
use crate::config::EmitOptions;
use crate::layout::LayoutError;
use crate::registry::{Element, FieldKind, ResolvedSchema};
use record::RecordCtx;
use std::collections::HashMap;
use tracing::debug;

/// Type names the generated module already uses.
const RESERVED_TYPES: &[&str] = &[
    "DescribeSink",
    "Dispose",
    "ExternalField",
    "MessageType",
    "Option",
    "ReadBuf",
    "Record",
    "Result",
    "Vec",
    "WireError",
    "WriteBuf",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmitError {
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("`{name}` becomes Rust type `{rust}`, which generated code already uses")]
    ReservedName { name: String, rust: String },
    #[error("`{name}` and `{other}` both become Rust type `{rust}`")]
    NameClash {
        name: String,
        other: String,
        rust: String,
    },
}

/// Indented line buffer.
#[derive(Debug, Default)]
pub(crate) struct Code {
    text: String,
    depth: usize,
}

impl Code {
    fn nested(depth: usize) -> Self {
        Code {
            text: String::new(),
            depth,
        }
    }

    fn depth(&self) -> usize {
        self.depth
    }

    fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn line(&mut self, s: impl AsRef<str>) {
        for l in s.as_ref().lines() {
            if !l.is_empty() {
                self.text.push_str(&"    ".repeat(self.depth));
                self.text.push_str(l);
            }
            self.text.push('\n');
        }
    }

    fn blank(&mut self) {
        self.text.push('\n');
    }

    fn open(&mut self, s: impl AsRef<str>) {
        self.line(s);
        self.depth += 1;
    }

    fn close(&mut self, s: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.line(s);
    }

    fn append(&mut self, other: Code) {
        self.text.push_str(&other.text);
    }
}

fn indent(s: &str, level: usize) -> String {
    let prefix = "    ".repeat(level);
    s.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", prefix, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Emit the Rust module for `schema`. `source_name` only appears in the
/// header comment.
pub fn emit(schema: &ResolvedSchema, source_name: &str, opts: &EmitOptions) -> Result<String, EmitError> {
    check_type_names(schema)?;
    let mut code = Code::default();
    emit_imports(schema, opts, &mut code);
    emit_aliases(schema, &mut code);
    emit_constants(schema, &mut code);
    emit_message_type(schema, &mut code);
    for record in &schema.records {
        let ctx = RecordCtx {
            schema,
            record,
            opts,
        };
        record::emit_record(&ctx, &mut code)?;
        debug!(record = %record.name, fields = record.fields.len(), "emitted record");
    }
    let body = code.text.trim_end();

    let mut out = String::new();
    out.push_str(&format!(
        "// File generated by wiregen from {}.\n// Do not edit by hand.\n\n",
        source_name
    ));
    match &opts.namespace {
        Some(ns) => {
            out.push_str(&format!("pub mod {} {{\n", field_name(ns)));
            out.push_str(&indent(body, 1));
            out.push_str("\n}\n");
        }
        None => {
            out.push_str(body);
            out.push('\n');
        }
    }
    Ok(out)
}

/// Every alias, record and external type must map to a distinct Rust name
/// that does not shadow anything the generated code refers to.
fn check_type_names(schema: &ResolvedSchema) -> Result<(), EmitError> {
    let named = schema
        .aliases
        .iter()
        .map(|a| &a.name)
        .chain(schema.records.iter().map(|r| &r.name))
        .map(|n| (n.clone(), type_name(n)));
    let externals = schema
        .externals()
        .map(|(r, f)| (format!("{}.{}", r.name, f.name), external_type(&r.name, &f.name)));
    let mut seen: HashMap<String, String> = HashMap::new();
    for (name, rust) in named.chain(externals) {
        if RESERVED_TYPES.contains(&rust.as_str()) {
            return Err(EmitError::ReservedName { name, rust });
        }
        if let Some(other) = seen.insert(rust.clone(), name.clone()) {
            return Err(EmitError::NameClash { name, other, rust });
        }
    }
    Ok(())
}

fn emit_imports(schema: &ResolvedSchema, opts: &EmitOptions, code: &mut Code) {
    if schema.records.is_empty() {
        return;
    }
    let fields = || schema.records.iter().flat_map(|r| r.fields.iter());
    let mut items = vec!["DescribeSink", "Dispose", "ReadBuf", "Record", "WireError", "WriteBuf"];
    if schema
        .records
        .iter()
        .any(|r| r.fields.iter().any(|f| !matches!(f.kind, FieldKind::BitField(_))))
    {
        items.push("decode_scoped");
    }
    if fields().any(|f| {
        matches!(
            f.kind,
            FieldKind::Array {
                element: Element::Scalar(_),
                ..
            }
        )
    }) {
        items.push("describe_array");
    }
    let externals: Vec<String> = schema
        .externals()
        .map(|(r, f)| external_type(&r.name, &f.name))
        .collect();
    if !externals.is_empty() {
        items.push("ExternalField");
    }
    items.sort_by_key(|s| s.to_lowercase());
    code.line(format!("use {}::{{{}}};", opts.runtime_path, items.join(", ")));
    match externals.as_slice() {
        [] => {}
        [one] => code.line(format!("use {}::{};", opts.externals_path, one)),
        many => code.line(format!("use {}::{{{}}};", opts.externals_path, many.join(", "))),
    }
    code.blank();
}

fn emit_aliases(schema: &ResolvedSchema, code: &mut Code) {
    for alias in &schema.aliases {
        let p = alias.primitive;
        match p.order {
            Some(order) => code.line(format!("/// `{}`: {}, {}.", alias.name, p.base, order.name())),
            None => code.line(format!("/// `{}`: {}.", alias.name, p.base)),
        }
        code.line(format!("pub type {} = {};", type_name(&alias.name), p.base));
    }
    if !schema.aliases.is_empty() {
        code.blank();
    }
}

fn emit_constants(schema: &ResolvedSchema, code: &mut Code) {
    for c in &schema.constants {
        let base = c.primitive.base;
        code.line(format!(
            "pub const {}: {} = {};",
            const_name(&c.name),
            base,
            literal(base, &c.value)
        ));
    }
    if !schema.constants.is_empty() {
        code.blank();
    }
}

/// Rust literal for a range-checked constant of type `base`.
fn literal(base: BaseType, value: &Literal) -> String {
    if base.is_float() {
        let v = value.as_f64().unwrap_or_default();
        return format!("{:?}", v);
    }
    match value {
        Literal::Int(i) => i.to_string(),
        Literal::Bool(b) => u8::from(*b).to_string(),
        Literal::Hex(h) => {
            let fits_signed = !base.is_signed() || *h >> (base.bits() - 1) == 0;
            if fits_signed {
                format!("{:#X}", h)
            } else {
                format!("{:#X}_{} as {}", h, base.unsigned(), base)
            }
        }
        Literal::Float(f) => format!("{:?}", f),
    }
}

fn emit_message_type(schema: &ResolvedSchema, code: &mut Code) {
    let messages: Vec<(u32, String)> = schema
        .messages()
        .map(|(n, r)| (n, type_name(&r.name)))
        .collect();
    if messages.is_empty() {
        return;
    }
    code.line("/// Message-type tags, numbered from 1 in definition order.");
    code.line("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]");
    code.line("#[repr(u32)]");
    code.open("pub enum MessageType {");
    for (n, name) in &messages {
        code.line(format!("{} = {},", name, n));
    }
    code.close("}");
    code.blank();
    code.open("impl MessageType {");
    code.open("pub fn ordinal(self) -> u32 {");
    code.line("self as u32");
    code.close("}");
    code.blank();
    code.open("pub fn from_ordinal(n: u32) -> Option<Self> {");
    code.open("match n {");
    for (n, name) in &messages {
        code.line(format!("{} => Some(MessageType::{}),", n, name));
    }
    code.line("_ => None,");
    code.close("}");
    code.close("}");
    code.close("}");
    code.blank();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_stay_in_type() {
        assert_eq!(literal(BaseType::U8, &Literal::Hex(0x1F)), "0x1F");
        assert_eq!(literal(BaseType::I16, &Literal::Hex(0xFFFF)), "0xFFFF_u16 as i16");
        assert_eq!(literal(BaseType::I16, &Literal::Hex(0x7FFF)), "0x7FFF");
        assert_eq!(literal(BaseType::I8, &Literal::Int(-5)), "-5");
        assert_eq!(literal(BaseType::U8, &Literal::Bool(true)), "1");
        assert_eq!(literal(BaseType::F32, &Literal::Int(3)), "3.0");
        assert_eq!(literal(BaseType::F64, &Literal::Float(0.25)), "0.25");
    }

    #[test]
    fn indent_skips_blank_lines() {
        assert_eq!(indent("a\n\nb", 1), "    a\n\n    b");
    }
}
