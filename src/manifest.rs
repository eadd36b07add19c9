//! JSON font manifests.
//!
//! The external font toolchain hands over each font as one JSON document: the
//! cmap, single-glyph substitutions, the CID encoding width, the character
//! ranges to embed and the subsetted PDF object graph. [`ManifestFont`] serves
//! that document through [`FontService`].
//!
//! Graph conventions:
//! - object → dictionary (key order preserved)
//! - object with `$stream` → stream; payload from `$data` (byte array) or
//!   `$file` (path relative to the manifest)
//! - `"/Name"` → name, any other string → string
//! - integer → integer, other numbers → float
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::font::{FontError, FontService};
use crate::node::{Dictionary, Node};
use crate::path_de::{self, PathError};
use crate::writer;

const STREAM_KEY: &str = "$stream";
const DATA_KEY: &str = "$data";
const FILE_KEY: &str = "$file";

static CODEPOINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:U\+|0x)([0-9A-Fa-f]{1,6})$").expect("static regex"));

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Json(#[from] PathError),
    #[error("font label `{0}` is not a valid identifier")]
    InvalidLabel(String),
    #[error("graph node at {pointer}: {message}")]
    Graph { pointer: String, message: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub label: String,
    /// Bytes per glyph in the font's CID encoding.
    #[serde(default = "default_encoding_width")]
    pub encoding_width: usize,
    pub cmap: IndexMap<Codepoint, u32>,
    /// glyph → replacement glyphs
    #[serde(default)]
    pub substitutions: IndexMap<u32, Vec<u32>>,
    #[serde(default)]
    pub ranges: Vec<CharacterRange>,
    pub graph: Map<String, Value>,
}

/// Accepts `65`, `"65"`, `"U+0041"` and `"0x41"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "CodepointRepr")]
pub struct Codepoint(pub u32);

#[derive(Deserialize)]
#[serde(untagged)]
enum CodepointRepr {
    Number(u32),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CharacterRange {
    pub first: Codepoint,
    pub last: Codepoint,
}

#[derive(Debug, Clone)]
pub struct ManifestFont {
    label: String,
    encoding_width: usize,
    cmap: IndexMap<Codepoint, u32>,
    substitutions: IndexMap<u32, Vec<u32>>,
    ranges: Vec<CharacterRange>,
    graph: Dictionary,
    selected_glyphs: BTreeSet<u32>,
    selected_codepoints: BTreeSet<u32>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

fn default_encoding_width() -> usize {
    2
}

impl TryFrom<CodepointRepr> for Codepoint {
    type Error = String;

    fn try_from(repr: CodepointRepr) -> Result<Self, Self::Error> {
        let value = match repr {
            CodepointRepr::Number(value) => value,
            CodepointRepr::Text(text) => parse_codepoint(&text)
                .ok_or_else(|| format!("invalid codepoint `{text}`, expected U+XXXX"))?,
        };
        match char::from_u32(value) {
            Some(_) => Ok(Codepoint(value)),
            None => Err(format!("U+{value:04X} is not a Unicode scalar value")),
        }
    }
}

impl ManifestFont {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let source = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest = path_de::from_str_with_path::<Manifest>(&source)?;
        Self::from_manifest(manifest, path.parent().unwrap_or(Path::new(".")))
    }

    /// `base_dir` resolves `$file` payloads.
    pub fn from_value(value: Value, base_dir: &Path) -> Result<Self, ManifestError> {
        let manifest = path_de::from_value_with_path::<Manifest>(value)?;
        Self::from_manifest(manifest, base_dir)
    }

    pub fn from_manifest(manifest: Manifest, base_dir: &Path) -> Result<Self, ManifestError> {
        if !writer::is_identifier(&manifest.label) {
            return Err(ManifestError::InvalidLabel(manifest.label));
        }
        let graph = lower_dictionary(manifest.graph, base_dir, "/graph")?;
        debug!(
            "loaded manifest {} ({} cmap entries, {} ranges)",
            manifest.label,
            manifest.cmap.len(),
            manifest.ranges.len()
        );
        Ok(Self {
            label: manifest.label,
            encoding_width: manifest.encoding_width,
            cmap: manifest.cmap,
            substitutions: manifest.substitutions,
            ranges: manifest.ranges,
            graph,
            selected_glyphs: BTreeSet::new(),
            selected_codepoints: BTreeSet::new(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Character ranges the manifest asks to embed, in order.
    pub fn ranges(&self) -> &[CharacterRange] {
        &self.ranges
    }

    pub fn selected_glyphs(&self) -> &BTreeSet<u32> {
        &self.selected_glyphs
    }
}

impl FontService for ManifestFont {
    fn glyph_id(&self, codepoint: u32) -> Option<u32> {
        self.cmap.get(&Codepoint(codepoint)).copied()
    }

    fn substitute(&self, glyphs: &[u32]) -> Vec<u32> {
        glyphs
            .iter()
            .flat_map(|glyph| match self.substitutions.get(glyph) {
                Some(replacement) => replacement.clone(),
                None => vec![*glyph],
            })
            .collect()
    }

    fn encode_glyph_id(&self, glyph: u32) -> Vec<u8> {
        let bytes = glyph.to_be_bytes();
        if self.encoding_width <= bytes.len() {
            bytes[bytes.len() - self.encoding_width..].to_vec()
        } else {
            let mut out = vec![0; self.encoding_width - bytes.len()];
            out.extend_from_slice(&bytes);
            out
        }
    }

    fn add_to_subset(&mut self, glyph: u32, codepoint: u32) {
        self.selected_glyphs.insert(glyph);
        self.selected_codepoints.insert(codepoint);
    }

    fn subset(&mut self) -> Result<(), FontError> {
        // the graph in the manifest was subsetted by the toolchain already
        info!(
            "subset {}: {} glyphs for {} codepoints",
            self.label,
            self.selected_glyphs.len(),
            self.selected_codepoints.len()
        );
        Ok(())
    }

    fn object_graph(&self) -> &Dictionary {
        &self.graph
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn parse_codepoint(text: &str) -> Option<u32> {
    match CODEPOINT.captures(text) {
        Some(caps) => u32::from_str_radix(&caps[1], 16).ok(),
        None => text.parse().ok(),
    }
}

fn graph_error(pointer: &str, message: impl Into<String>) -> ManifestError {
    ManifestError::Graph {
        pointer: pointer.to_string(),
        message: message.into(),
    }
}

/// RFC 6901 escaping for error locations.
fn pointer_segment(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

fn lower_dictionary(map: Map<String, Value>, base_dir: &Path, pointer: &str) -> Result<Dictionary, ManifestError> {
    map.into_iter()
        .map(|(key, value)| {
            let child = format!("{pointer}/{}", pointer_segment(&key));
            let node = lower_value(value, base_dir, &child)?;
            Ok::<_, ManifestError>((key, node))
        })
        .collect()
}

fn lower_value(value: Value, base_dir: &Path, pointer: &str) -> Result<Node, ManifestError> {
    let node = match value {
        Value::Null => Node::Null,
        Value::Bool(value) => Node::Boolean(value),
        Value::Number(number) => match number.as_i64() {
            Some(value) => Node::Integer(value),
            None => {
                let value = number
                    .as_f64()
                    .ok_or_else(|| graph_error(pointer, format!("number {number} out of range")))?;
                Node::float(value as f32)
            }
        },
        Value::String(text) => match text.strip_prefix('/') {
            Some(name) => Node::name(name),
            None => Node::string(text),
        },
        Value::Array(items) => Node::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(index, item)| lower_value(item, base_dir, &format!("{pointer}/{index}")))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Object(map) if map.contains_key(STREAM_KEY) => {
            lower_stream(map, base_dir, pointer)?
        }
        Value::Object(map) => Node::Dictionary(lower_dictionary(map, base_dir, pointer)?),
    };
    Ok(node)
}

fn lower_stream(mut map: Map<String, Value>, base_dir: &Path, pointer: &str) -> Result<Node, ManifestError> {
    let dict = match map.remove(STREAM_KEY) {
        Some(Value::Object(dict)) => lower_dictionary(dict, base_dir, &format!("{pointer}/{STREAM_KEY}"))?,
        _ => return Err(graph_error(pointer, "`$stream` must be an object")),
    };

    let data = match (map.remove(DATA_KEY), map.remove(FILE_KEY)) {
        (Some(data), None) => lower_bytes(data, &format!("{pointer}/{DATA_KEY}"))?,
        (None, Some(Value::String(file))) => {
            let path = base_dir.join(file);
            std::fs::read(&path).map_err(|source| ManifestError::Io { path, source })?
        }
        (None, Some(_)) => return Err(graph_error(pointer, "`$file` must be a path")),
        (None, None) => Vec::new(),
        (Some(_), Some(_)) => return Err(graph_error(pointer, "`$data` and `$file` are exclusive")),
    };

    if let Some(key) = map.keys().next() {
        return Err(graph_error(pointer, format!("unexpected key `{key}` next to `$stream`")));
    }
    Ok(Node::stream(dict, data))
}

fn lower_bytes(value: Value, pointer: &str) -> Result<Vec<u8>, ManifestError> {
    let Value::Array(items) = value else {
        return Err(graph_error(pointer, "expected an array of bytes"));
    };
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.as_u64()
                .and_then(|byte| u8::try_from(byte).ok())
                .ok_or_else(|| graph_error(&format!("{pointer}/{index}"), format!("{item} is not a byte")))
        })
        .collect()
}

// ------------------------------- Tests ------------------------------------ //
