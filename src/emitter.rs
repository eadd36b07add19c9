//! Object graph → C# factory compiler.
//!
//! The graph is walked depth first. Every dictionary and stream becomes a
//! local binding (`var fontDescriptor = new GeneralDict(...)`) and is
//! referenced at its use site through `document.CreateReference(binding)`.
//!
//! A declaration can start in the middle of another declaration's entry list,
//! so each one is recorded in its own frame. When the declaration is complete
//! the frame is appended to the output and the reference expression goes into
//! the frame underneath. Declarations therefore always precede their first use
//! without a separate ordering pass.
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, trace, warn};
use thiserror::Error;

use crate::node::{Dictionary, Node, Stream};
use crate::writer::{self, CodeWriter, MEMBER_INDENT, STATEMENT_INDENT};

/// Stream payloads at or above this size are written to a sidecar file.
pub const INLINE_PAYLOAD_LIMIT: usize = 256;

/// Property name the root dictionary is visited with; also the returned binding.
pub const ROOT_PROPERTY: &str = "font";

const ENTRY_INDENT: usize = STATEMENT_INDENT + 4;
const ARRAY_ITEM_INDENT: usize = ENTRY_INDENT + 4;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitError {
    /// Booleans and nulls never occur in an embedded font; hitting one means
    /// the graph did not come from the font pipeline.
    #[error("unsupported {kind} node under `{property}`")]
    UnsupportedNode { kind: &'static str, property: String },

    #[error("property `{property}` does not yield a valid binding name")]
    InvalidBinding { property: String },
}

/// Raw stream payload spilled next to the generated source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sidecar {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmittedGraph {
    pub source: String,
    /// In traversal order.
    pub sidecars: Vec<Sidecar>,
}

#[derive(Debug, Default)]
struct Frame {
    binding: String,
    text: CodeWriter,
}

pub struct GraphEmitter<'a> {
    font_label: &'a str,
    out: CodeWriter,
    current: Frame,
    suspended: Vec<Frame>,
    sidecars: Vec<Sidecar>,
    declared: HashSet<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Sidecar {
    /// Writes the payload into `dir`, replacing any file with the same name.
    pub fn write_to(&self, dir: &Path) -> io::Result<PathBuf> {
        let path = dir.join(&self.name);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

impl<'a> GraphEmitter<'a> {
    pub fn new(font_label: &'a str) -> Self {
        Self {
            font_label,
            out: CodeWriter::new(),
            current: Frame::default(),
            suspended: Vec::new(),
            sidecars: Vec::new(),
            declared: HashSet::new(),
        }
    }

    /// Compiles `root` into a `Create<label>(Document document)` factory.
    pub fn emit(mut self, root: &Dictionary) -> Result<EmittedGraph, EmitError> {
        self.out.line(MEMBER_INDENT, format_args!("{}", writer::GENERATED_HEADER));
        self.out.line(
            MEMBER_INDENT,
            format_args!("internal static GeneralDict Create{}(Document document)", self.font_label),
        );
        self.out.line(MEMBER_INDENT, format_args!("{{"));

        // the initial frame only ever receives the root's reference expression
        let root_binding = self.visit_dictionary(root, ROOT_PROPERTY)?;

        self.out.line(STATEMENT_INDENT, format_args!("return {root_binding};"));
        self.out.line(MEMBER_INDENT, format_args!("}}"));
        self.out.blank();

        debug!(
            "emitted factory for {} ({} declarations, {} sidecars)",
            self.font_label,
            self.declared.len(),
            self.sidecars.len()
        );
        Ok(EmittedGraph {
            source: self.out.into_string(),
            sidecars: self.sidecars,
        })
    }

    fn visit(&mut self, node: &Node, property: &str, nesting: usize) -> Result<(), EmitError> {
        match node {
            Node::Dictionary(dict) => self.visit_dictionary(dict, property).map(|_| ()),
            Node::Stream(stream) => self.visit_stream(stream, property).map(|_| ()),
            Node::Array(items) => self.visit_array(items, property, nesting),
            Node::Float(value) => {
                self.current.text.fmt(format_args!("{:.6}f", value.0));
                Ok(())
            }
            Node::Integer(value) => {
                self.current.text.fmt(format_args!("{value}"));
                Ok(())
            }
            Node::Name(name) => {
                self.current.text.fmt(format_args!("new Name(\"{name}\")"));
                Ok(())
            }
            Node::String(text) => {
                // emitted verbatim: quotes and control characters are not escaped
                self.current.text.fmt(format_args!("\"{text}\""));
                Ok(())
            }
            Node::Boolean(_) | Node::Null => Err(EmitError::UnsupportedNode {
                kind: node.kind(),
                property: property.to_string(),
            }),
        }
    }

    fn visit_dictionary(&mut self, dict: &Dictionary, property: &str) -> Result<String, EmitError> {
        let binding = self.begin_frame(property)?;

        let text = &mut self.current.text;
        text.line(
            STATEMENT_INDENT,
            format_args!("var {binding} = new GeneralDict(new Dictionary<string, object>"),
        );
        text.line(STATEMENT_INDENT, format_args!("{{"));
        self.write_entries(dict)?;
        self.current.text.line(STATEMENT_INDENT, format_args!("}});"));
        self.current.text.blank();

        self.end_frame();
        self.current
            .text
            .fmt(format_args!("document.CreateReference({binding})"));
        Ok(binding)
    }

    fn visit_stream(&mut self, stream: &Stream, property: &str) -> Result<String, EmitError> {
        let binding = self.begin_frame(property)?;

        let text = &mut self.current.text;
        text.line(
            STATEMENT_INDENT,
            format_args!("var {binding} = new StreamData(new Dictionary<string, object>"),
        );
        text.line(STATEMENT_INDENT, format_args!("{{"));
        self.write_entries(&stream.dict)?;
        self.current.text.indent(STATEMENT_INDENT);
        self.current.text.push("}, ");

        if stream.data.len() < INLINE_PAYLOAD_LIMIT {
            let text = &mut self.current.text;
            text.push("new byte[] { ");
            for byte in &stream.data {
                text.fmt(format_args!("0x{byte:02X}, "));
            }
            text.push("}");
        } else {
            // named after the property the stream hangs off, not the binding
            let name = format!("{}-{}.bin", self.font_label, property);
            debug!("spilling {} byte payload of `{binding}` to {name}", stream.data.len());
            self.current.text.fmt(format_args!("\"{name}\""));
            self.sidecars.push(Sidecar {
                name,
                bytes: stream.data.clone(),
            });
        }
        self.current.text.push(");\n\n\n");

        self.end_frame();
        self.current
            .text
            .fmt(format_args!("document.CreateReference({binding})"));
        Ok(binding)
    }

    fn visit_array(&mut self, items: &[Node], property: &str, nesting: usize) -> Result<(), EmitError> {
        // nested arrays only ever hold integers (widths, bounding boxes)
        let top_level = nesting == 0;
        self.current
            .text
            .push(if top_level { "new object[] {\n" } else { "new int[] { " });

        for item in items {
            if top_level {
                self.current.text.indent(ARRAY_ITEM_INDENT);
            }
            self.visit(item, property, nesting + 1)?;
            self.current.text.push(if top_level { ",\n" } else { ", " });
        }

        if top_level {
            self.current.text.indent(ENTRY_INDENT);
        }
        self.current.text.push("}");
        Ok(())
    }

    fn write_entries(&mut self, dict: &Dictionary) -> Result<(), EmitError> {
        for (key, value) in dict {
            self.current.text.indent(ENTRY_INDENT);
            self.current.text.fmt(format_args!("{{ \"{key}\", "));
            self.visit(value, key, 0)?;
            self.current.text.push(" },\n");
        }
        Ok(())
    }

    fn begin_frame(&mut self, property: &str) -> Result<String, EmitError> {
        let binding = writer::lower_first(property);
        if !writer::is_identifier(&binding) {
            return Err(EmitError::InvalidBinding {
                property: property.to_string(),
            });
        }
        if !self.declared.insert(binding.clone()) {
            warn!(
                "binding `{binding}` is declared more than once in Create{}",
                self.font_label
            );
        }

        trace!("begin frame `{binding}` (depth {})", self.suspended.len() + 1);
        let frame = Frame {
            binding: binding.clone(),
            text: CodeWriter::new(),
        };
        let parent = std::mem::replace(&mut self.current, frame);
        self.suspended.push(parent);
        Ok(binding)
    }

    fn end_frame(&mut self) {
        let parent = self.suspended.pop().unwrap_or_default();
        let done = std::mem::replace(&mut self.current, parent);
        trace!("flush frame `{}` (depth {})", done.binding, self.suspended.len());
        self.out.append(done.text);
    }
}

/// Convenience wrapper around [`GraphEmitter`].
pub fn emit_graph(root: &Dictionary, font_label: &str) -> Result<EmittedGraph, EmitError> {
    GraphEmitter::new(font_label).emit(root)
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(entries: Vec<(&str, Node)>) -> Dictionary {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    /// Every `var x =` must appear before the first `CreateReference(x)`.
    fn assert_declared_before_use(source: &str) {
        let mut checked = 0;
        for (offset, _) in source.match_indices("document.CreateReference(") {
            let rest = &source[offset + "document.CreateReference(".len()..];
            let binding = &rest[..rest.find(')').unwrap()];
            let declared_at = source
                .find(&format!("var {binding} = "))
                .unwrap_or_else(|| panic!("`{binding}` is never declared"));
            assert!(declared_at < offset, "`{binding}` used before its declaration");
            checked += 1;
        }
        assert!(checked > 0);
    }

    fn type0_font() -> Dictionary {
        let descriptor = dict(vec![
            ("Type", Node::name("FontDescriptor")),
            ("FontName", Node::name("AAAAAA+LiberationSans-Bold")),
            ("Flags", Node::Integer(32)),
            ("FontFile2", Node::stream(dict(vec![("Length1", Node::Integer(3))]), vec![1, 2, 3])),
        ]);
        let cid_font = dict(vec![
            ("Type", Node::name("Font")),
            ("Subtype", Node::name("CIDFontType2")),
            (
                "CIDSystemInfo",
                Node::Dictionary(dict(vec![
                    ("Registry", Node::string("Adobe")),
                    ("Ordering", Node::string("Identity")),
                    ("Supplement", Node::Integer(0)),
                ])),
            ),
            ("FontDescriptor", Node::Dictionary(descriptor)),
            ("W", Node::Array(vec![Node::Integer(3), Node::Array(vec![Node::Integer(278)])])),
        ]);
        dict(vec![
            ("Type", Node::name("Font")),
            ("Subtype", Node::name("Type0")),
            ("DescendantFonts", Node::Array(vec![Node::Dictionary(cid_font)])),
            ("ToUnicode", Node::stream(Dictionary::new(), vec![0xAB; 300])),
        ])
    }

    #[test]
    fn empty_root_is_a_complete_factory() {
        let out = emit_graph(&Dictionary::new(), "Empty").unwrap();
        let expected = concat!(
            "        // Generated code. Do not modify. See the associated PDFFonts projects.\n",
            "        internal static GeneralDict CreateEmpty(Document document)\n",
            "        {\n",
            "            var font = new GeneralDict(new Dictionary<string, object>\n",
            "            {\n",
            "            });\n",
            "\n",
            "            return font;\n",
            "        }\n",
            "\n",
        );
        assert_eq!(out.source, expected);
        assert!(out.sidecars.is_empty());
    }

    #[test]
    fn nested_dictionary_is_declared_first() {
        let root = dict(vec![
            ("Type", Node::name("Font")),
            ("FontDescriptor", Node::Dictionary(dict(vec![("Flags", Node::Integer(32))]))),
        ]);
        let out = emit_graph(&root, "Demo").unwrap();
        let expected = concat!(
            "        // Generated code. Do not modify. See the associated PDFFonts projects.\n",
            "        internal static GeneralDict CreateDemo(Document document)\n",
            "        {\n",
            "            var fontDescriptor = new GeneralDict(new Dictionary<string, object>\n",
            "            {\n",
            "                { \"Flags\", 32 },\n",
            "            });\n",
            "\n",
            "            var font = new GeneralDict(new Dictionary<string, object>\n",
            "            {\n",
            "                { \"Type\", new Name(\"Font\") },\n",
            "                { \"FontDescriptor\", document.CreateReference(fontDescriptor) },\n",
            "            });\n",
            "\n",
            "            return font;\n",
            "        }\n",
            "\n",
        );
        assert_eq!(out.source, expected);
    }

    #[test]
    fn declarations_precede_use_at_any_depth() {
        let out = emit_graph(&type0_font(), "LiberationSansBold").unwrap();
        assert_declared_before_use(&out.source);

        // innermost first, root last
        let order = ["cIDSystemInfo", "fontFile2", "fontDescriptor", "descendantFonts", "toUnicode", "font"]
            .map(|b| out.source.find(&format!("var {b} = ")).unwrap());
        assert!(order.windows(2).all(|w| w[0] < w[1]), "{order:?}");
    }

    #[test]
    fn emission_is_deterministic() {
        let root = type0_font();
        let a = emit_graph(&root, "LiberationSansBold").unwrap();
        let b = emit_graph(&root, "LiberationSansBold").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn payload_threshold_boundary() {
        let small = (0..255u32).map(|i| i as u8).collect::<Vec<_>>();
        let large = (0..256u32).map(|i| (i * 7) as u8).collect::<Vec<_>>();
        let root = dict(vec![
            ("Small", Node::stream(Dictionary::new(), small.clone())),
            ("Large", Node::stream(Dictionary::new(), large.clone())),
        ]);
        let out = emit_graph(&root, "Font").unwrap();

        // 255 bytes inline
        let start = out.source.find("}, new byte[] { ").unwrap() + "}, new byte[] { ".len();
        let end = start + out.source[start..].find('}').unwrap();
        let inlined = out.source[start..end]
            .split(", ")
            .filter(|s| !s.trim().is_empty())
            .map(|s| u8::from_str_radix(s.trim_start_matches("0x"), 16).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(inlined, small);

        // 256 bytes spilled
        assert_eq!(out.sidecars.len(), 1);
        assert_eq!(out.sidecars[0].name, "Font-Large.bin");
        assert_eq!(out.sidecars[0].bytes, large);
        assert!(out.source.contains("            }, \"Font-Large.bin\");\n\n\n"));
    }

    #[test]
    fn array_width_switches_with_nesting() {
        let root = dict(vec![(
            "W",
            Node::Array(vec![
                Node::Integer(1),
                Node::Array(vec![Node::Integer(2), Node::Integer(3)]),
                Node::Integer(4),
            ]),
        )]);
        let out = emit_graph(&root, "Font").unwrap();
        let expected = concat!(
            "                { \"W\", new object[] {\n",
            "                    1,\n",
            "                    new int[] { 2, 3, },\n",
            "                    4,\n",
            "                } },\n",
        );
        assert!(out.source.contains(expected), "{}", out.source);
    }

    #[test]
    fn dictionary_inside_array_gets_its_own_declaration() {
        let root = type0_font();
        let out = emit_graph(&root, "F").unwrap();
        assert!(out.source.contains(concat!(
            "                { \"DescendantFonts\", new object[] {\n",
            "                    document.CreateReference(descendantFonts),\n",
            "                } },\n",
        )));
        // the CID font's own entries are back at depth zero
        assert!(out.source.contains("                { \"W\", new object[] {\n"));
    }

    #[test]
    fn scalar_literals() {
        let root = dict(vec![
            ("Ascent", Node::float(905.0)),
            ("ItalicAngle", Node::float(-12.5)),
            ("StemV", Node::Integer(80)),
            ("BaseFont", Node::name("LiberationSans")),
            ("Registry", Node::string("Adobe")),
        ]);
        let out = emit_graph(&root, "F").unwrap();
        assert!(out.source.contains("{ \"Ascent\", 905.000000f },"));
        assert!(out.source.contains("{ \"ItalicAngle\", -12.500000f },"));
        assert!(out.source.contains("{ \"StemV\", 80 },"));
        assert!(out.source.contains("{ \"BaseFont\", new Name(\"LiberationSans\") },"));
        assert!(out.source.contains("{ \"Registry\", \"Adobe\" },"));
    }

    #[test]
    fn small_stream_layout() {
        let root = dict(vec![(
            "CIDToGIDMap",
            Node::stream(dict(vec![("Length", Node::Integer(2))]), vec![0x00, 0xFE]),
        )]);
        let out = emit_graph(&root, "F").unwrap();
        assert!(out.source.contains(concat!(
            "            var cIDToGIDMap = new StreamData(new Dictionary<string, object>\n",
            "            {\n",
            "                { \"Length\", 2 },\n",
            "            }, new byte[] { 0x00, 0xFE, });\n",
            "\n",
            "\n",
        )));
    }

    #[test]
    fn booleans_and_nulls_abort() {
        let root = dict(vec![("Flag", Node::Boolean(true))]);
        assert_eq!(
            emit_graph(&root, "F"),
            Err(EmitError::UnsupportedNode { kind: "boolean", property: "Flag".into() })
        );
        let nested = dict(vec![("Inner", Node::Dictionary(dict(vec![("Gap", Node::Null)])))]);
        assert!(matches!(
            emit_graph(&nested, "F"),
            Err(EmitError::UnsupportedNode { kind: "null", .. })
        ));
    }

    #[test]
    fn property_must_yield_identifier() {
        let root = dict(vec![("1st", Node::Dictionary(Dictionary::new()))]);
        assert_eq!(
            emit_graph(&root, "F"),
            Err(EmitError::InvalidBinding { property: "1st".into() })
        );
    }

    #[test]
    fn sidecar_overwrites_existing_file() {
        let dir = std::env::temp_dir().join(format!("cos-codegen-sidecar-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let first = Sidecar { name: "F-FontFile2.bin".into(), bytes: vec![1; 300] };
        let second = Sidecar { name: "F-FontFile2.bin".into(), bytes: vec![2; 260] };
        first.write_to(&dir).unwrap();
        let path = second.write_to(&dir).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![2; 260]);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
