//! The font toolchain as seen by the compiler.
//!
//! Parsing, cmap lookup, glyph substitution and subsetting live outside this
//! crate. Implementations only have to honor the contracts below.
use thiserror::Error;

use crate::node::Dictionary;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FontError {
    #[error("subsetting {font} failed: {reason}")]
    Subset { font: String, reason: String },
}

pub trait FontService {
    /// cmap lookup; `None` if the codepoint is not mapped.
    fn glyph_id(&self, codepoint: u32) -> Option<u32>;

    /// Applies the font's GSUB features to a glyph run.
    fn substitute(&self, glyphs: &[u32]) -> Vec<u32>;

    /// Bytes the glyph is written as in a content stream.
    fn encode_glyph_id(&self, glyph: u32) -> Vec<u8>;

    fn add_to_subset(&mut self, glyph: u32, codepoint: u32);

    /// Reduces the font to the glyphs added so far. Called before
    /// [`FontService::object_graph`] is read.
    fn subset(&mut self) -> Result<(), FontError>;

    /// Root dictionary of the (subsetted) font.
    fn object_graph(&self) -> &Dictionary;
}
