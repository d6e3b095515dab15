//! Schema names to Rust identifiers.

use heck::{ToShoutySnakeCase, ToSnakeCase, ToUpperCamelCase};

const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do", "dyn",
    "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in", "let",
    "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref", "return",
    "static", "struct", "trait", "true", "try", "type", "typeof", "unsafe", "unsized", "use",
    "virtual", "where", "while", "yield",
];

/// Keywords that cannot be raw identifiers.
const RESERVED: &[&str] = &["crate", "self", "Self", "super", "_"];

fn escape(name: String) -> String {
    if name.is_empty() {
        "unnamed".to_string()
    } else if RESERVED.contains(&name.as_str()) {
        format!("{}_", name)
    } else if KEYWORDS.contains(&name.as_str()) {
        format!("r#{}", name)
    } else {
        name
    }
}

/// Struct, enum variant and alias names.
pub fn type_name(name: &str) -> String {
    escape(name.to_upper_camel_case())
}

/// Struct fields, accessors and module names.
pub fn field_name(name: &str) -> String {
    escape(name.to_snake_case())
}

pub fn setter_name(name: &str) -> String {
    format!("set_{}", name.to_snake_case())
}

pub fn const_name(name: &str) -> String {
    escape(name.to_shouty_snake_case())
}

/// Application type backing an externally-owned field.
pub fn external_type(record: &str, field: &str) -> String {
    type_name(&format!("{}_{}", record, field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cases_and_escapes() {
        assert_eq!(type_name("read_coils_req"), "ReadCoilsReq");
        assert_eq!(type_name("self"), "Self_");
        assert_eq!(field_name("startAddr"), "start_addr");
        assert_eq!(field_name("type"), "r#type");
        assert_eq!(field_name("self"), "self_");
        assert_eq!(setter_name("type"), "set_type");
        assert_eq!(const_name("readCoils"), "READ_COILS");
        assert_eq!(external_type("frame", "payload"), "FramePayload");
    }
}
