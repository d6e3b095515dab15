//! Per-record emission: struct, accessors, `Record` and `Dispose` impls.
//!
//! Each generated function is produced by its own [`FieldVisitor`], so the
//! field-kind dispatch lives in [`walk_record`] and nowhere else.

use super::{names, Code};
use crate::ast::BaseType;
use crate::config::EmitOptions;
use crate::describe::scalar_format;
use crate::layout::{self, Direction, LayoutError};
use crate::registry::{
    ArrayCount, BitFieldView, Element, FieldKind, Primitive, Record, RecordField, RecordId,
    ResolvedSchema,
};
use crate::visit::{walk_record, FieldVisitor};
use tracing::trace;

pub(super) struct RecordCtx<'a> {
    pub schema: &'a ResolvedSchema,
    pub record: &'a Record,
    pub opts: &'a EmitOptions,
}

impl RecordCtx<'_> {
    fn type_name(&self) -> String {
        names::type_name(&self.record.name)
    }

    fn ident(&self, index: usize) -> String {
        names::field_name(&self.record.fields[index].name)
    }

    fn record_type(&self, id: RecordId) -> String {
        names::type_name(&self.schema.record(id).name)
    }

    fn external_type(&self, field: &RecordField) -> String {
        names::external_type(&self.record.name, &field.name)
    }

    fn rust_type(&self, field: &RecordField) -> Option<String> {
        Some(match &field.kind {
            FieldKind::Scalar(p) => p.base.name().to_string(),
            FieldKind::Record(id) => self.record_type(*id),
            FieldKind::Array {
                element: Element::Scalar(p),
                ..
            } => format!("Vec<{}>", p.base),
            FieldKind::Array {
                element: Element::Record(id),
                ..
            } => format!("Vec<{}>", self.record_type(*id)),
            FieldKind::External { .. } => self.external_type(field),
            FieldKind::BitField(_) => return None,
        })
    }

    fn has_wire_fields(&self) -> bool {
        self.record
            .fields
            .iter()
            .any(|f| !matches!(f.kind, FieldKind::BitField(_)))
    }

    /// `let n = ...;` for an array count read from `owner` (`out` or `self`).
    fn count_decl(&self, count: ArrayCount, owner: &str) -> String {
        match count {
            ArrayCount::Fixed(n) if n <= u64::from(u32::MAX) => format!("let n: usize = {};", n),
            ArrayCount::Fixed(n) => format!(
                "let n = usize::try_from({}_u64).map_err(|_| WireError::OutOfBounds)?;",
                n
            ),
            ArrayCount::Field(i) => {
                let small = matches!(
                    self.record.fields[i].kind,
                    FieldKind::Scalar(Primitive {
                        base: BaseType::U8 | BaseType::U16,
                        ..
                    })
                );
                if small {
                    format!("let n = usize::from({}.{});", owner, self.ident(i))
                } else {
                    format!(
                        "let n = usize::try_from({}.{}).map_err(|_| WireError::OutOfBounds)?;",
                        owner,
                        self.ident(i)
                    )
                }
            }
        }
    }
}

// ==================== Byte expressions ====================

/// Expression rebuilding a `p` from the byte array `b`.
fn assemble_expr(p: Primitive, b: &str) -> Result<String, LayoutError> {
    let plan = layout::plan(p.base, p.order, Direction::Decode)?;
    let carrier = p.base.unsigned();
    let raw = plan
        .ops
        .iter()
        .map(|op| {
            if op.shift == 0 {
                format!("{}::from({}[{}])", carrier, b, op.wire_index)
            } else {
                format!("({}::from({}[{}]) << {})", carrier, b, op.wire_index, op.shift)
            }
        })
        .collect::<Vec<_>>()
        .join(" | ");
    Ok(match p.base {
        BaseType::F32 => format!("f32::from_bits({})", raw),
        BaseType::F64 => format!("f64::from_bits({})", raw),
        base if base.is_signed() => format!("({}) as {}", raw, base),
        _ => raw,
    })
}

/// Unsigned bit pattern of the `p`-typed place `v`.
fn raw_expr(p: Primitive, v: &str) -> String {
    match p.base {
        base if base.is_float() => format!("{}.to_bits()", v),
        base if base.is_signed() => format!("{} as {}", v, base.unsigned()),
        _ => v.to_string(),
    }
}

/// Byte array literal transcribing the unsigned value `v` in wire order.
fn scatter_expr(p: Primitive, v: &str) -> Result<String, LayoutError> {
    let plan = layout::plan(p.base, p.order, Direction::Encode)?;
    let bytes = plan
        .ops
        .iter()
        .map(|op| {
            if op.shift == 0 {
                format!("{} as u8", v)
            } else {
                format!("({} >> {}) as u8", v, op.shift)
            }
        })
        .collect::<Vec<_>>();
    Ok(format!("[{}]", bytes.join(", ")))
}

// ==================== Struct and accessors ====================

pub(super) fn emit_record(ctx: &RecordCtx<'_>, code: &mut Code) -> Result<(), LayoutError> {
    let name = ctx.type_name();
    match ctx.record.ordinal {
        Some(n) => code.line(format!("/// `{}`, message type {}.", ctx.record.name, n)),
        None => code.line(format!("/// `{}`.", ctx.record.name)),
    }
    if ctx.record.closed {
        code.line("#[derive(Debug, Default, Clone, PartialEq)]");
    } else {
        code.line("#[derive(Debug, Default)]");
    }
    code.open(format!("pub struct {} {{", name));
    for (index, field) in ctx.record.fields.iter().enumerate() {
        if let Some(ty) = ctx.rust_type(field) {
            code.line(format!("pub {}: {},", ctx.ident(index), ty));
        }
    }
    code.close("}");
    code.blank();

    emit_inherent(ctx, code);
    emit_external_asserts(ctx, code);
    emit_record_impl(ctx, code)?;
    emit_dispose_impl(ctx, code)
}

fn emit_inherent(ctx: &RecordCtx<'_>, code: &mut Code) {
    let views: Vec<(usize, &BitFieldView)> = ctx
        .record
        .fields
        .iter()
        .enumerate()
        .filter_map(|(i, f)| match &f.kind {
            FieldKind::BitField(view) => Some((i, view)),
            _ => None,
        })
        .collect();
    if ctx.record.ordinal.is_none() && views.is_empty() {
        return;
    }
    code.open(format!("impl {} {{", ctx.type_name()));
    let mut first = true;
    if ctx.record.ordinal.is_some() {
        code.line(format!(
            "pub const MESSAGE_TYPE: MessageType = MessageType::{};",
            ctx.type_name()
        ));
        first = false;
    }
    for (index, view) in views {
        if !first {
            code.blank();
        }
        first = false;
        emit_bit_field_accessors(ctx, code, index, view);
    }
    code.close("}");
    code.blank();
}

fn emit_bit_field_accessors(ctx: &RecordCtx<'_>, code: &mut Code, index: usize, view: &BitFieldView) {
    let FieldKind::Scalar(container) = ctx.record.fields[view.container].kind else {
        return;
    };
    let plan = &view.plan;
    let base = container.base;
    let carrier = base.unsigned();
    let value_type = plan.value_type();
    let field = &ctx.record.fields[index].name;
    let getter = ctx.ident(index);
    let place = format!("self.{}", ctx.ident(view.container));
    let raw = if base.is_signed() {
        format!("({} as {})", place, carrier)
    } else {
        place.clone()
    };
    let mask = format!("{:#X}", plan.mask);
    trace!(record = %ctx.record.name, field = %field, ?plan, "bit-field accessors");

    code.line(format!(
        "/// Bits {}..{} of `{}`.",
        plan.start_bit,
        plan.start_bit + plan.length,
        ctx.record.fields[view.container].name
    ));
    code.open(format!("pub fn {}(&self) -> {} {{", getter, value_type));
    let shifted = if plan.get_shift == 0 {
        format!("{} & {}", raw, mask)
    } else {
        format!("({} >> {}) & {}", raw, plan.get_shift, mask)
    };
    if value_type == carrier {
        code.line(shifted);
    } else {
        code.line(format!("({}) as {}", shifted, value_type));
    }
    code.close("}");
    code.blank();

    code.line(format!(
        "/// Store the low {} bits of `value` in `{}`.",
        plan.length, ctx.record.fields[view.container].name
    ));
    code.open(format!(
        "pub fn {}(&mut self, value: {}) {{",
        names::setter_name(field),
        value_type
    ));
    if base.is_signed() {
        code.line(format!("let mut raw = {} as {};", place, carrier));
    } else {
        code.line(format!("let mut raw = {};", place));
    }
    code.line(format!("raw &= !{:#X};", plan.placed_mask()));
    let widened = if value_type == carrier {
        "value".to_string()
    } else {
        format!("{}::from(value)", carrier)
    };
    if plan.set_shift == 0 {
        code.line(format!("raw |= {} & {};", widened, mask));
    } else {
        code.line(format!("raw |= ({} & {}) << {};", widened, mask, plan.set_shift));
    }
    if base.is_signed() {
        code.line(format!("{} = raw as {};", place, base));
    } else {
        code.line(format!("{} = raw;", place));
    }
    code.close("}");
}

fn emit_external_asserts(ctx: &RecordCtx<'_>, code: &mut Code) {
    let externals: Vec<&RecordField> = ctx.record.externals().collect();
    if externals.is_empty() {
        return;
    }
    code.open("const _: fn() = || {");
    code.line("fn assert_external<R, T: ExternalField<R>>() {}");
    for field in externals {
        code.line(format!(
            "assert_external::<{}, {}>();",
            ctx.type_name(),
            ctx.external_type(field)
        ));
    }
    code.close("};");
    code.blank();
}

fn emit_record_impl(ctx: &RecordCtx<'_>, code: &mut Code) -> Result<(), LayoutError> {
    let wire = ctx.has_wire_fields();
    let buf = if wire { "buf" } else { "_buf" };
    code.open(format!("impl Record for {} {{", ctx.type_name()));

    code.open(format!(
        "fn decode({}: &mut ReadBuf<'_>) -> Result<Self, WireError> {{",
        buf
    ));
    if wire {
        code.open("decode_scoped(|out: &mut Self| {");
        let mut gen = DecodeGen {
            ctx,
            code: Code::nested(code.depth()),
        };
        walk_record(ctx.record, &mut gen)?;
        code.append(gen.code);
        code.line("Ok(())");
        code.close("})");
    } else {
        code.line("Ok(Self::default())");
    }
    code.close("}");
    code.blank();

    code.open(format!(
        "fn encode(&self, {}: &mut WriteBuf<'_>) -> Result<(), WireError> {{",
        buf
    ));
    let mut gen = EncodeGen {
        ctx,
        code: Code::nested(code.depth()),
    };
    walk_record(ctx.record, &mut gen)?;
    code.append(gen.code);
    code.line("Ok(())");
    code.close("}");
    code.blank();

    let sink = if ctx.record.fields.is_empty() { "_sink" } else { "sink" };
    code.open(format!("fn describe(&self, {}: &mut dyn DescribeSink) {{", sink));
    let mut gen = DescribeGen {
        ctx,
        code: Code::nested(code.depth()),
    };
    walk_record(ctx.record, &mut gen)?;
    code.append(gen.code);
    code.close("}");

    code.close("}");
    code.blank();
    Ok(())
}

fn emit_dispose_impl(ctx: &RecordCtx<'_>, code: &mut Code) -> Result<(), LayoutError> {
    let mut gen = DisposeGen {
        ctx,
        code: Code::nested(code.depth() + 2),
    };
    walk_record(ctx.record, &mut gen)?;
    code.open(format!("impl Dispose for {} {{", ctx.type_name()));
    if gen.code.is_empty() {
        code.line("fn dispose(&mut self) {}");
    } else {
        code.open("fn dispose(&mut self) {");
        code.append(gen.code);
        code.close("}");
    }
    code.close("}");
    code.blank();
    Ok(())
}

// ==================== Generators ====================

struct DecodeGen<'a> {
    ctx: &'a RecordCtx<'a>,
    code: Code,
}

impl FieldVisitor for DecodeGen<'_> {
    type Error = LayoutError;

    fn scalar(&mut self, index: usize, _: &RecordField, p: Primitive) -> Result<(), LayoutError> {
        let x = self.ctx.ident(index);
        let width = p.base.width();
        if width == 1 {
            let cast = if p.base.is_signed() { " as i8" } else { "" };
            self.code.line(format!("out.{} = buf.get_u8()?{};", x, cast));
            return Ok(());
        }
        self.code.open("{");
        self.code.line(format!("let b = buf.get_array::<{}>()?;", width));
        self.code.line(format!("out.{} = {};", x, assemble_expr(p, "b")?));
        self.code.close("}");
        Ok(())
    }

    fn record(&mut self, index: usize, _: &RecordField, id: RecordId) -> Result<(), LayoutError> {
        self.code.line(format!(
            "out.{} = {}::decode(buf)?;",
            self.ctx.ident(index),
            self.ctx.record_type(id)
        ));
        Ok(())
    }

    fn array(&mut self, index: usize, _: &RecordField, element: Element, count: ArrayCount) -> Result<(), LayoutError> {
        let x = self.ctx.ident(index);
        let reserve = format!(
            "out.{}.try_reserve_exact(n).map_err(|_| WireError::AllocationFailure)?;",
            x
        );
        self.code.open("{");
        self.code.line(self.ctx.count_decl(count, "out"));
        match element {
            Element::Scalar(p) if p.base == BaseType::U8 => {
                self.code.line("let bytes = buf.take(n)?;");
                self.code.line(reserve);
                self.code.line(format!("out.{}.extend_from_slice(bytes);", x));
            }
            Element::Scalar(p) => {
                let width = p.base.width();
                if width == 1 {
                    self.code.line("buf.ensure(n)?;");
                } else {
                    self.code.line(format!(
                        "buf.ensure(n.checked_mul({}).ok_or(WireError::OutOfBounds)?)?;",
                        width
                    ));
                }
                self.code.line(reserve);
                self.code.open("for _ in 0..n {");
                if width == 1 {
                    self.code.line(format!("out.{}.push(buf.get_u8()? as i8);", x));
                } else {
                    self.code.line(format!("let b = buf.get_array::<{}>()?;", width));
                    self.code.line(format!("out.{}.push({});", x, assemble_expr(p, "b")?));
                }
                self.code.close("}");
            }
            Element::Record(id) => {
                self.code.line(format!(
                    "out.{}.try_reserve_exact(n.min(buf.remaining_len())).map_err(|_| WireError::AllocationFailure)?;",
                    x
                ));
                self.code.open("for _ in 0..n {");
                self.code.line(format!(
                    "out.{}.push({}::decode(buf)?);",
                    x,
                    self.ctx.record_type(id)
                ));
                self.code.close("}");
            }
        }
        self.code.close("}");
        Ok(())
    }

    fn external(&mut self, index: usize, field: &RecordField, _: &str) -> Result<(), LayoutError> {
        self.code.line(format!(
            "out.{} = <{} as ExternalField<Self>>::decode(&*out, buf)?;",
            self.ctx.ident(index),
            self.ctx.external_type(field)
        ));
        Ok(())
    }
}

struct EncodeGen<'a> {
    ctx: &'a RecordCtx<'a>,
    code: Code,
}

impl FieldVisitor for EncodeGen<'_> {
    type Error = LayoutError;

    fn scalar(&mut self, index: usize, _: &RecordField, p: Primitive) -> Result<(), LayoutError> {
        let place = format!("self.{}", self.ctx.ident(index));
        if p.base.width() == 1 {
            self.code.line(format!("buf.set_u8({})?;", raw_expr(p, &place)));
            return Ok(());
        }
        self.code.open("{");
        self.code.line(format!("let v = {};", raw_expr(p, &place)));
        self.code.line(format!("buf.set_array(&{})?;", scatter_expr(p, "v")?));
        self.code.close("}");
        Ok(())
    }

    fn record(&mut self, index: usize, _: &RecordField, _: RecordId) -> Result<(), LayoutError> {
        self.code.line(format!("self.{}.encode(buf)?;", self.ctx.ident(index)));
        Ok(())
    }

    fn array(&mut self, index: usize, _: &RecordField, element: Element, count: ArrayCount) -> Result<(), LayoutError> {
        self.code.open("{");
        self.code.line(self.ctx.count_decl(count, "self"));
        self.code.line(format!(
            "let items = self.{}.get(..n).ok_or(WireError::OutOfBounds)?;",
            self.ctx.ident(index)
        ));
        match element {
            Element::Scalar(p) if p.base == BaseType::U8 => {
                self.code.line("buf.put_slice(items)?;");
            }
            Element::Scalar(p) => {
                self.code.open("for &item in items {");
                if p.base.width() == 1 {
                    self.code.line(format!("buf.set_u8({})?;", raw_expr(p, "item")));
                } else {
                    self.code.line(format!("let v = {};", raw_expr(p, "item")));
                    self.code.line(format!("buf.set_array(&{})?;", scatter_expr(p, "v")?));
                }
                self.code.close("}");
            }
            Element::Record(_) => {
                self.code.open("for item in items {");
                self.code.line("item.encode(buf)?;");
                self.code.close("}");
            }
        }
        self.code.close("}");
        Ok(())
    }

    fn external(&mut self, index: usize, field: &RecordField, _: &str) -> Result<(), LayoutError> {
        self.code.line(format!(
            "<{} as ExternalField<Self>>::encode(&self.{}, self, buf)?;",
            self.ctx.external_type(field),
            self.ctx.ident(index)
        ));
        Ok(())
    }
}

struct DisposeGen<'a> {
    ctx: &'a RecordCtx<'a>,
    code: Code,
}

impl FieldVisitor for DisposeGen<'_> {
    type Error = LayoutError;

    fn scalar(&mut self, _: usize, _: &RecordField, _: Primitive) -> Result<(), LayoutError> {
        Ok(())
    }

    fn record(&mut self, index: usize, _: &RecordField, _: RecordId) -> Result<(), LayoutError> {
        self.code.line(format!("self.{}.dispose();", self.ctx.ident(index)));
        Ok(())
    }

    fn array(&mut self, index: usize, _: &RecordField, _: Element, _: ArrayCount) -> Result<(), LayoutError> {
        self.code.line(format!("self.{}.dispose();", self.ctx.ident(index)));
        Ok(())
    }

    fn external(&mut self, index: usize, _: &RecordField, _: &str) -> Result<(), LayoutError> {
        self.code.line(format!("Dispose::dispose(&mut self.{});", self.ctx.ident(index)));
        Ok(())
    }
}

struct DescribeGen<'a> {
    ctx: &'a RecordCtx<'a>,
    code: Code,
}

impl FieldVisitor for DescribeGen<'_> {
    type Error = LayoutError;

    fn scalar(&mut self, index: usize, field: &RecordField, p: Primitive) -> Result<(), LayoutError> {
        self.code.line(format!(
            "sink.line(format_args!(\"{}: {}\", self.{}));",
            field.name,
            scalar_format(p.base),
            self.ctx.ident(index)
        ));
        Ok(())
    }

    fn record(&mut self, index: usize, field: &RecordField, _: RecordId) -> Result<(), LayoutError> {
        self.code.line(format!("sink.enter(\"{}\");", field.name));
        self.code.line(format!("self.{}.describe(sink);", self.ctx.ident(index)));
        self.code.line("sink.leave();");
        Ok(())
    }

    fn array(&mut self, index: usize, field: &RecordField, element: Element, _: ArrayCount) -> Result<(), LayoutError> {
        let x = self.ctx.ident(index);
        match element {
            Element::Scalar(p) => self.code.line(format!(
                "describe_array(sink, \"{}\", &self.{}, {}, |e| format!(\"{}\", e));",
                field.name,
                x,
                self.ctx.opts.describe_chunk,
                scalar_format(p.base)
            )),
            Element::Record(_) => {
                self.code.open(format!("for (i, item) in self.{}.iter().enumerate() {{", x));
                self.code.line(format!("sink.enter(&format!(\"{}[{{}}]\", i));", field.name));
                self.code.line("item.describe(sink);");
                self.code.line("sink.leave();");
                self.code.close("}");
            }
        }
        Ok(())
    }

    fn external(&mut self, index: usize, field: &RecordField, _: &str) -> Result<(), LayoutError> {
        self.code.line(format!(
            "<{} as ExternalField<Self>>::describe(&self.{}, \"{}\", sink);",
            self.ctx.external_type(field),
            self.ctx.ident(index),
            field.name
        ));
        Ok(())
    }

    fn bit_field(&mut self, index: usize, field: &RecordField, _: &BitFieldView) -> Result<(), LayoutError> {
        self.code.line(format!(
            "sink.line(format_args!(\"{}: 0x{{:X}}\", self.{}()));",
            field.name,
            self.ctx.ident(index)
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ByteOrderClass;

    fn prim(base: BaseType, order: ByteOrderClass) -> Primitive {
        Primitive {
            base,
            order: Some(order),
        }
    }

    #[test]
    fn assemble_big_endian_u16() {
        let e = assemble_expr(prim(BaseType::U16, ByteOrderClass::NativeBigEndian), "b").unwrap();
        assert_eq!(e, "(u16::from(b[0]) << 8) | u16::from(b[1])");
    }

    #[test]
    fn assemble_swapped_float() {
        let e = assemble_expr(prim(BaseType::F32, ByteOrderClass::SwappedBigEndian), "b").unwrap();
        assert_eq!(
            e,
            "f32::from_bits((u32::from(b[2]) << 24) | (u32::from(b[3]) << 16) | (u32::from(b[0]) << 8) | u32::from(b[1]))"
        );
    }

    #[test]
    fn scatter_little_endian_signed() {
        let p = prim(BaseType::I32, ByteOrderClass::NativeLittleEndian);
        assert_eq!(raw_expr(p, "self.x"), "self.x as u32");
        assert_eq!(
            scatter_expr(p, "v").unwrap(),
            "[v as u8, (v >> 8) as u8, (v >> 16) as u8, (v >> 24) as u8]"
        );
    }
}
