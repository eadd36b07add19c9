//! Compiles embedded PDF fonts into drop-in C# source.
//!
//! Per font, [`subsetter::Subsetter`] collects codepoint ranges through a
//! [`font::FontService`], then emits a `Create<label>` factory rebuilding the
//! font's object graph ([`emitter`]) followed by glyph tables and an
//! `EncodeText<label>` routine ([`range_table`]).
pub mod node;
pub mod writer;
pub mod emitter;
pub mod range_table;
pub mod font;
pub mod subsetter;
pub mod manifest;
pub mod path_de;
pub mod jq_exec;
pub mod cli;
