//! Parse schema source into AST using PEST.

use crate::ast::*;
use crate::error::SyntaxError;
use pest::error::LineColLocation;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct SchemaParser;

type Pair<'i> = pest::iterators::Pair<'i, Rule>;

/// Parse schema source into AST. Any input outside the grammar is an error;
/// there is no partial result.
pub fn parse(source: &str) -> Result<Schema, SyntaxError> {
    let mut pairs = SchemaParser::parse(Rule::schema, source).map_err(syntax_error)?;
    let pair = pairs
        .next()
        .ok_or_else(|| SyntaxError::at((1, 1), "empty parse"))?;
    build_schema(pair)
}

fn syntax_error(e: pest::error::Error<Rule>) -> SyntaxError {
    let pos = match e.line_col {
        LineColLocation::Pos(p) => p,
        LineColLocation::Span(start, _) => start,
    };
    SyntaxError::at(pos, e.variant.message())
}

fn missing(pair: &Pair<'_>, what: &str) -> SyntaxError {
    SyntaxError::at(pair.line_col(), format!("{}: missing {}", rule_name(pair.as_rule()), what))
}

fn rule_name(rule: Rule) -> &'static str {
    match rule {
        Rule::definition => "definition",
        Rule::primitive_spec => "primitive",
        Rule::constant_spec => "constant",
        Rule::message_spec => "message",
        Rule::field => "field",
        Rule::bit_field_spec | Rule::bit_field_source => "bit_field",
        Rule::array_type => "array",
        _ => "schema",
    }
}

fn build_schema(pair: Pair<'_>) -> Result<Schema, SyntaxError> {
    let mut definitions = Vec::new();
    for inner in pair.into_inner() {
        if inner.as_rule() == Rule::definition {
            definitions.push(build_definition(inner)?);
        }
    }
    Ok(Schema { definitions })
}

fn build_definition(pair: Pair<'_>) -> Result<Definition, SyntaxError> {
    let line = pair.line_col().0;
    let err = missing(&pair, "type");
    let mut name = None;
    let mut kind = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = Some(inner.as_str().to_string()),
            Rule::primitive_spec => kind = Some(DefKind::Primitive(build_primitive(inner)?)),
            Rule::constant_spec => kind = Some(DefKind::Constant(build_constant(inner)?)),
            Rule::message_spec => kind = Some(DefKind::Message(build_message(inner)?)),
            Rule::bit_field_spec => kind = Some(DefKind::BitField(build_bit_field(inner)?)),
            _ => {}
        }
    }
    match (name, kind) {
        (Some(name), Some(kind)) => Ok(Definition { name, kind, line }),
        _ => Err(err),
    }
}

// ==================== Primitive / constant ====================

fn build_primitive(pair: Pair<'_>) -> Result<PrimitiveSpec, SyntaxError> {
    let err = missing(&pair, "base type");
    let mut base_type = None;
    let mut byte_order = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::base_type => base_type = BaseType::from_name(inner.as_str()),
            Rule::byte_order_attr => {
                let order = inner
                    .into_inner()
                    .map(|n| parse_num(&n).map(|v| v as usize))
                    .collect::<Result<Vec<_>, _>>()?;
                byte_order = Some(order);
            }
            _ => {}
        }
    }
    Ok(PrimitiveSpec {
        base_type: base_type.ok_or(err)?,
        byte_order,
    })
}

fn build_constant(pair: Pair<'_>) -> Result<ConstantSpec, SyntaxError> {
    let err = missing(&pair, "type or value");
    let mut type_ref = None;
    let mut value = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => type_ref = Some(inner.as_str().to_string()),
            Rule::literal => value = Some(parse_literal(inner)?),
            _ => {}
        }
    }
    match (type_ref, value) {
        (Some(type_ref), Some(value)) => Ok(ConstantSpec { type_ref, value }),
        _ => Err(err),
    }
}

// ==================== Message ====================

fn build_message(pair: Pair<'_>) -> Result<MessageSpec, SyntaxError> {
    let mut fields = Vec::new();
    for inner in pair.into_inner() {
        if inner.as_rule() == Rule::fields_attr {
            for f in inner.into_inner() {
                if f.as_rule() == Rule::field {
                    fields.push(build_field(f)?);
                }
            }
        }
    }
    Ok(MessageSpec { fields })
}

fn build_field(pair: Pair<'_>) -> Result<Field, SyntaxError> {
    let err = missing(&pair, "name or type");
    let mut it = pair.into_inner();
    let name = it.next().ok_or_else(|| err.clone())?.as_str().to_string();
    let field_type = it.next().ok_or_else(|| err.clone())?;
    let inner = field_type.into_inner().next().ok_or(err)?;
    let (type_spec, cardinality) = match inner.as_rule() {
        Rule::ident => (TypeSpec::Ref(inner.as_str().to_string()), Cardinality::Scalar),
        Rule::external_type => {
            let target = inner
                .clone()
                .into_inner()
                .next()
                .ok_or_else(|| missing(&inner, "target type"))?;
            (TypeSpec::Ref(target.as_str().to_string()), Cardinality::ExternallyOwned)
        }
        Rule::array_type => {
            let e = missing(&inner, "element type or size");
            let mut parts = inner.into_inner();
            let element = parts.next().ok_or_else(|| e.clone())?.as_str().to_string();
            let size = parts.next().and_then(|p| p.into_inner().next()).ok_or(e)?;
            let len = match size.as_rule() {
                Rule::num => ArrayLen::Constant(parse_num(&size)?),
                _ => ArrayLen::FieldRef(size.as_str().to_string()),
            };
            (TypeSpec::Ref(element), Cardinality::FixedArray(len))
        }
        Rule::bit_field_spec => (TypeSpec::BitField(build_bit_field(inner)?), Cardinality::Scalar),
        Rule::message_spec => (TypeSpec::Message(build_message(inner)?), Cardinality::Scalar),
        other => {
            return Err(SyntaxError::at(
                inner.line_col(),
                format!("unexpected field type {:?}", other),
            ))
        }
    };
    Ok(Field {
        name,
        type_spec,
        cardinality,
    })
}

// ==================== Bit-field ====================

fn build_bit_field(pair: Pair<'_>) -> Result<BitFieldSpec, SyntaxError> {
    let err = missing(&pair, "source");
    let source = pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::bit_field_source)
        .ok_or_else(|| err.clone())?;
    let mut it = source.into_inner();
    let container = it.next().ok_or_else(|| err.clone())?.as_str().to_string();
    let start = it.next().ok_or_else(|| err.clone())?;
    let length = it.next().ok_or(err)?;
    Ok(BitFieldSpec {
        container,
        start_bit: parse_u32(&start)?,
        length: parse_u32(&length)?,
    })
}

// ==================== Tokens ====================

fn parse_num(pair: &Pair<'_>) -> Result<u64, SyntaxError> {
    pair.as_str()
        .parse()
        .map_err(|_| SyntaxError::at(pair.line_col(), format!("number out of range: {}", pair.as_str())))
}

fn parse_u32(pair: &Pair<'_>) -> Result<u32, SyntaxError> {
    let n = parse_num(pair)?;
    u32::try_from(n)
        .map_err(|_| SyntaxError::at(pair.line_col(), format!("number out of range: {}", n)))
}

fn parse_literal(pair: Pair<'_>) -> Result<Literal, SyntaxError> {
    let inner = pair
        .clone()
        .into_inner()
        .next()
        .ok_or_else(|| SyntaxError::at(pair.line_col(), "empty literal"))?;
    let s = inner.as_str();
    let bad = || SyntaxError::at(inner.line_col(), format!("invalid literal: {}", s));
    match inner.as_rule() {
        Rule::float => s.parse().map(Literal::Float).map_err(|_| bad()),
        Rule::hex => u64::from_str_radix(&s[2..], 16)
            .map(Literal::Hex)
            .map_err(|_| bad()),
        Rule::int => s.parse().map(Literal::Int).map_err(|_| bad()),
        Rule::boolean => Ok(Literal::Bool(s == "true")),
        _ => Err(bad()),
    }
}
