//! Text plumbing shared by the graph emitter and the range table compiler.
//!
//! Generated members are dropped into a C# class body, so everything starts at
//! the member indent (two levels) and statements sit one level deeper.
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

pub const GENERATED_HEADER: &str =
    "// Generated code. Do not modify. See the associated PDFFonts projects.";

pub const MEMBER_INDENT: usize = 8;
pub const STATEMENT_INDENT: usize = MEMBER_INDENT + 4;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"));

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Append-only source buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeWriter {
    buf: String,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: &str) {
        self.buf.push_str(text);
    }

    pub fn indent(&mut self, spaces: usize) {
        self.buf.extend(std::iter::repeat_n(' ', spaces));
    }

    /// Writes `spaces` of indentation, the formatted text and a newline.
    pub fn line(&mut self, spaces: usize, args: fmt::Arguments<'_>) {
        self.indent(spaces);
        self.fmt(args);
        self.buf.push('\n');
    }

    pub fn blank(&mut self) {
        self.buf.push('\n');
    }

    pub fn fmt(&mut self, args: fmt::Arguments<'_>) {
        // formatting into a String only fails if a Display impl does
        let _ = fmt::Write::write_fmt(&mut self.buf, args);
    }

    pub fn append(&mut self, other: CodeWriter) {
        self.buf.push_str(&other.buf);
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

pub fn is_identifier(text: &str) -> bool {
    IDENTIFIER.is_match(text)
}

/// `FontDescriptor` → `fontDescriptor`. Only the first character changes.
pub fn lower_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_first_only_touches_the_first_letter() {
        assert_eq!(lower_first("FontDescriptor"), "fontDescriptor");
        assert_eq!(lower_first("CIDSystemInfo"), "cIDSystemInfo");
        assert_eq!(lower_first("font"), "font");
        assert_eq!(lower_first(""), "");
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("fontFile2"));
        assert!(is_identifier("_w"));
        assert!(!is_identifier("2fonts"));
        assert!(!is_identifier("font-file"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn line_indents_and_terminates() {
        let mut w = CodeWriter::new();
        w.line(4, format_args!("var {} = {};", "x", 1));
        w.blank();
        assert_eq!(w.into_string(), "    var x = 1;\n\n");
    }
}
