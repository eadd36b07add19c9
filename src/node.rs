// Read-only object graph consumed by the emitter. No serde_json::Value here.

use indexmap::IndexMap;
use ordered_float::OrderedFloat;

/// Entries keep insertion order; it decides declaration order in the
/// generated factory.
pub type Dictionary = IndexMap<String, Node>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Dictionary(Dictionary),
    Array(Vec<Node>),
    Stream(Stream),
    Float(OrderedFloat<f32>),
    Integer(i64),
    Name(String),
    String(String),
    // present in the document model, never produced for embedded fonts
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stream {
    pub dict: Dictionary,
    pub data: Vec<u8>,
}

impl Node {
    pub fn name(name: impl Into<String>) -> Self {
        Node::Name(name.into())
    }
    pub fn string(text: impl Into<String>) -> Self {
        Node::String(text.into())
    }
    pub fn float(value: f32) -> Self {
        Node::Float(OrderedFloat(value))
    }
    pub fn stream(dict: Dictionary, data: Vec<u8>) -> Self {
        Node::Stream(Stream { dict, data })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Node::Dictionary(_) => "dictionary",
            Node::Array(_) => "array",
            Node::Stream(_) => "stream",
            Node::Float(_) => "float",
            Node::Integer(_) => "integer",
            Node::Name(_) => "name",
            Node::String(_) => "string",
            Node::Boolean(_) => "boolean",
            Node::Null => "null",
        }
    }
}

// ------------------------------- Tests ------------------------------------ //
