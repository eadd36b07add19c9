//! Per-font driver: collects codepoint ranges, subsets the font and compiles
//! both the object graph factory and the text encoder.
use log::{debug, info};
use thiserror::Error;

use crate::emitter::{self, EmitError, EmittedGraph, Sidecar};
use crate::font::{FontError, FontService};
use crate::range_table::{self, GlyphRange, RangeTable};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Conditions under which a font cannot use the 1 glyph / 2 byte encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubsetError {
    #[error("invalid character range U+{first:04X}..U+{last:04X}")]
    InvalidRange { first: u32, last: u32 },

    #[error("Unsupported range U+{first:04X}..U+{last:04X}: the encoder works on UTF-16 code units up to U+FFFF")]
    OutsideBasicPlane { first: u32, last: u32 },

    #[error("character U+{codepoint:04X} is not mapped by the font")]
    UnmappedCodepoint { codepoint: u32 },

    #[error("Unsupported font: it requires {count} glyphs for character U+{codepoint:04X}")]
    MultipleGlyphs { codepoint: u32, count: usize },

    #[error("Unsupported font: glyph {glyph} is encoded into {width} bytes (character U+{codepoint:04X})")]
    GlyphEncodingWidth { codepoint: u32, glyph: u32, width: usize },

    #[error("Unsupported font: glyph {glyph} does not fit into 16 bits (character U+{codepoint:04X})")]
    GlyphOutOfRange { codepoint: u32, glyph: u32 },
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Font(#[from] FontError),
    #[error(transparent)]
    Emit(#[from] EmitError),
}

/// Everything generated for one font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFont {
    pub label: String,
    pub source: String,
    pub sidecars: Vec<Sidecar>,
}

pub struct Subsetter<F> {
    font: F,
    ranges: Vec<GlyphRange>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl<F: FontService> Subsetter<F> {
    pub fn new(font: F) -> Self {
        Self { font, ranges: Vec::new() }
    }

    pub fn font(&self) -> &F {
        &self.font
    }

    /// Ranges in the order they were added.
    pub fn ranges(&self) -> &[GlyphRange] {
        &self.ranges
    }

    /// Maps `first..=last` through the font and appends the result as a new
    /// range. Nothing is appended if any codepoint fails.
    pub fn add_characters(&mut self, first: u32, last: u32) -> Result<(), SubsetError> {
        if first > last {
            return Err(SubsetError::InvalidRange { first, last });
        }
        if last > u32::from(u16::MAX) {
            return Err(SubsetError::OutsideBasicPlane { first, last });
        }

        let mut glyph_ids = Vec::with_capacity((last - first) as usize + 1);
        for codepoint in first..=last {
            let glyph = self
                .font
                .glyph_id(codepoint)
                .ok_or(SubsetError::UnmappedCodepoint { codepoint })?;

            let substituted = self.font.substitute(&[glyph]);
            let &[glyph] = substituted.as_slice() else {
                return Err(SubsetError::MultipleGlyphs {
                    codepoint,
                    count: substituted.len(),
                });
            };

            let width = self.font.encode_glyph_id(glyph).len();
            if width != 2 {
                return Err(SubsetError::GlyphEncodingWidth { codepoint, glyph, width });
            }
            let id = u16::try_from(glyph)
                .map_err(|_| SubsetError::GlyphOutOfRange { codepoint, glyph })?;

            self.font.add_to_subset(glyph, codepoint);
            glyph_ids.push(id);
        }

        debug!("added U+{first:04X}..U+{last:04X} ({} glyphs)", glyph_ids.len());
        self.ranges.push(GlyphRange::new(first, last, glyph_ids));
        Ok(())
    }

    /// Subsets the font and compiles its object graph into `Create<label>`.
    pub fn emit_font_program(&mut self, font_label: &str) -> Result<EmittedGraph, CompileError> {
        self.font.subset()?;
        Ok(emitter::emit_graph(self.font.object_graph(), font_label)?)
    }

    /// Lookup tables followed by `EncodeText<label>`.
    pub fn emit_encoder(&self, font_label: &str) -> String {
        let mut source = range_table::emit_tables(&self.ranges, font_label);
        source.push_str(&range_table::emit_decoder(&self.ranges, font_label));
        source
    }

    pub fn range_table<'a>(&'a self, font_label: &'a str) -> RangeTable<'a> {
        RangeTable::new(font_label, &self.ranges)
    }

    pub fn compile(&mut self, font_label: &str) -> Result<CompiledFont, CompileError> {
        let graph = self.emit_font_program(font_label)?;
        let mut source = graph.source;
        source.push_str(&self.emit_encoder(font_label));
        info!(
            "compiled {font_label}: {} ranges, {} sidecars",
            self.ranges.len(),
            graph.sidecars.len()
        );
        Ok(CompiledFont {
            label: font_label.to_string(),
            source,
            sidecars: graph.sidecars,
        })
    }
}

// ------------------------------- Tests ------------------------------------ //
