//! Codepoint range → glyph index tables and the matching `EncodeText` routine.
//!
//! The generated decoder tests the ranges in the order they were added and
//! takes the first match. Ranges are expected to be disjoint; overlaps are not
//! detected and resolve to the earliest range.
use log::debug;
use thiserror::Error;

use crate::writer::{self, CodeWriter, MEMBER_INDENT, STATEMENT_INDENT};

const LOOP_INDENT: usize = STATEMENT_INDENT + 4;
const BRANCH_INDENT: usize = LOOP_INDENT + 4;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Contiguous codepoints with one glyph id per codepoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphRange {
    pub first: u32,
    pub last: u32,
    /// Indexed by `codepoint - first`.
    pub glyph_ids: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("Character U+{codepoint:04X} at position {position} is not part of the font {font}")]
    UnmappedCharacter {
        codepoint: u32,
        position: usize,
        font: String,
    },
}

/// In-process counterpart of the generated `EncodeText<label>` routine.
#[derive(Debug, Clone, Copy)]
pub struct RangeTable<'a> {
    font_label: &'a str,
    ranges: &'a [GlyphRange],
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl GlyphRange {
    /// Expects `first <= last` and exactly one glyph per codepoint.
    pub fn new(first: u32, last: u32, glyph_ids: Vec<u16>) -> Self {
        let len = last.checked_sub(first).map(|span| u64::from(span) + 1);
        debug_assert_eq!(
            len,
            Some(glyph_ids.len() as u64),
            "U+{first:04X}..U+{last:04X} needs one glyph per codepoint"
        );
        Self { first, last, glyph_ids }
    }

    pub fn contains(&self, codepoint: u32) -> bool {
        self.first <= codepoint && codepoint <= self.last
    }

    pub fn glyph_for(&self, codepoint: u32) -> Option<u16> {
        if !self.contains(codepoint) {
            return None;
        }
        self.glyph_ids.get((codepoint - self.first) as usize).copied()
    }

    pub fn table_name(&self, font_label: &str) -> String {
        format!("GlyphIndexes{}_{:04x}_{:04x}", font_label, self.first, self.last)
    }
}

impl<'a> RangeTable<'a> {
    pub fn new(font_label: &'a str, ranges: &'a [GlyphRange]) -> Self {
        Self { font_label, ranges }
    }

    /// First range containing `codepoint` wins.
    pub fn lookup(&self, codepoint: u32) -> Option<u16> {
        self.ranges
            .iter()
            .find(|range| range.contains(codepoint))
            .and_then(|range| range.glyph_for(codepoint))
    }

    /// Two big-endian bytes per UTF-16 code unit, as the generated C# walks
    /// `string` chars. Surrogates never match a range. Nothing is returned for
    /// a text containing an unmapped unit.
    pub fn encode_text(&self, text: &str) -> Result<Vec<u8>, EncodeError> {
        let mut bytes = Vec::with_capacity(text.len() * 2);
        for (position, unit) in text.encode_utf16().enumerate() {
            let codepoint = u32::from(unit);
            let glyph = self.lookup(codepoint).ok_or_else(|| EncodeError::UnmappedCharacter {
                codepoint,
                position,
                font: self.font_label.to_string(),
            })?;
            bytes.extend_from_slice(&glyph.to_be_bytes());
        }
        Ok(bytes)
    }
}

/// One `char[]` lookup table per range.
pub fn emit_tables(ranges: &[GlyphRange], font_label: &str) -> String {
    let mut out = CodeWriter::new();
    out.line(MEMBER_INDENT, format_args!("{}", writer::GENERATED_HEADER));
    for range in ranges {
        out.indent(MEMBER_INDENT);
        out.fmt(format_args!(
            "internal static readonly char[] {} = new char[] {{ ",
            range.table_name(font_label)
        ));
        for glyph in &range.glyph_ids {
            out.fmt(format_args!("'\\x{glyph:04X}', "));
        }
        out.push("};\n");
    }
    out.blank();
    debug!("emitted {} glyph tables for {font_label}", ranges.len());
    out.into_string()
}

/// `EncodeText<label>(string text)`: range cascade, table lookup, and a
/// terminal `ArgumentException` for characters outside every range.
pub fn emit_decoder(ranges: &[GlyphRange], font_label: &str) -> String {
    let mut out = CodeWriter::new();
    out.line(MEMBER_INDENT, format_args!("{}", writer::GENERATED_HEADER));
    out.line(
        MEMBER_INDENT,
        format_args!("internal static byte[] EncodeText{font_label}(string text)"),
    );
    out.line(MEMBER_INDENT, format_args!("{{"));
    out.line(STATEMENT_INDENT, format_args!("var bytes = new byte[text.Length * 2];"));
    out.line(STATEMENT_INDENT, format_args!("for (var i = 0; i < text.Length; i++)"));
    out.line(STATEMENT_INDENT, format_args!("{{"));
    out.line(LOOP_INDENT, format_args!("var ch = text[i];"));
    out.line(LOOP_INDENT, format_args!("char[] glyphIndexArray;"));
    out.line(LOOP_INDENT, format_args!("int glyphIndex;"));

    for (index, range) in ranges.iter().enumerate() {
        out.line(
            LOOP_INDENT,
            format_args!(
                "{}if (ch >= 0x{:04x} && ch <= 0x{:04x})",
                if index > 0 { "else " } else { "" },
                range.first,
                range.last
            ),
        );
        out.line(LOOP_INDENT, format_args!("{{"));
        out.line(
            BRANCH_INDENT,
            format_args!("glyphIndexArray = {};", range.table_name(font_label)),
        );
        out.line(BRANCH_INDENT, format_args!("glyphIndex = ch - 0x{:04x};", range.first));
        out.line(LOOP_INDENT, format_args!("}}"));
    }

    let throw = format!(
        "throw new ArgumentException($\"Character U+{{(int)ch:X4}} is not part of the font {font_label} (text: \\\"{{text}}\\\")\");"
    );
    if ranges.is_empty() {
        out.line(LOOP_INDENT, format_args!("{throw}"));
    } else {
        out.line(LOOP_INDENT, format_args!("else"));
        out.line(LOOP_INDENT, format_args!("{{"));
        out.line(BRANCH_INDENT, format_args!("{throw}"));
        out.line(LOOP_INDENT, format_args!("}}"));
    }

    out.line(LOOP_INDENT, format_args!("bytes[i * 2] = (byte)(glyphIndexArray[glyphIndex] >> 8);"));
    out.line(LOOP_INDENT, format_args!("bytes[i * 2 + 1] = (byte)glyphIndexArray[glyphIndex];"));
    out.line(STATEMENT_INDENT, format_args!("}}"));
    out.line(STATEMENT_INDENT, format_args!("return bytes;"));
    out.line(MEMBER_INDENT, format_args!("}}"));
    out.blank();
    out.blank();
    out.into_string()
}

// ------------------------------- Tests ------------------------------------ //
