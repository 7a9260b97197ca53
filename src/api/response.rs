//! The Subsonic response tree and its dual XML/JSON serializers. A
//! `Node` is built once per request and walked twice if both
//! serializers are ever compared in tests, but in practice only one is
//! rendered per request based on `f=json`.
//!
//! Attributes are kept in a `BTreeMap` rather than insertion order:
//! Subsonic clients expect attributes in alphabetical order for both
//! XML and JSON, and a sorted map gives us that for free instead of
//! hand-sorting at render time.

use std::collections::BTreeMap;

use bumpalo::collections::String as BumpString;

use super::context::Arena;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}
impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Int(n as i64)
    }
}
impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(n as i64)
    }
}
impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

enum Child {
    Single(String, Node),
    Array(String, Vec<Node>),
    PrimitiveArray(String, Vec<Value>),
}

/// A node in the response tree: an attribute map, an optional primitive
/// value, and any number of singular/array children.
pub struct Node {
    attrs: BTreeMap<String, Value>,
    value: Option<Value>,
    children: Vec<Child>,
}

impl Node {
    pub fn new() -> Self {
        Self {
            attrs: BTreeMap::new(),
            value: None,
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }

    pub fn with_opt_attr(self, key: &str, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(v) => self.with_attr(key, v),
            None => self,
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_child(mut self, key: &str, node: Node) -> Self {
        self.children.push(Child::Single(key.to_string(), node));
        self
    }

    pub fn with_children(mut self, key: &str, nodes: Vec<Node>) -> Self {
        self.children.push(Child::Array(key.to_string(), nodes));
        self
    }

    pub fn with_primitive_children(mut self, key: &str, values: Vec<Value>) -> Self {
        self.children.push(Child::PrimitiveArray(key.to_string(), values));
        self
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

/// A complete Subsonic envelope: the root node plus the status it was
/// built with. `status`/`version`/`type`/`serverVersion`/`openSubsonic`
/// are root attributes like any other, but are always present on every
/// response.
pub struct Response {
    root: Node,
}

impl Response {
    fn envelope(status: &str, server_version: &str, protocol_version: &str, open_subsonic: bool) -> Node {
        let mut root = Node::new()
            .with_attr("status", status)
            .with_attr("version", protocol_version)
            .with_attr("type", "lms")
            .with_attr("serverVersion", server_version);
        if open_subsonic {
            root = root.with_attr("openSubsonic", true);
        }
        root
    }

    pub fn ok(server_version: &str, protocol_version: &str, open_subsonic: bool) -> Self {
        Self {
            root: Self::envelope("ok", server_version, protocol_version, open_subsonic),
        }
    }

    pub fn failed(server_version: &str, protocol_version: &str, open_subsonic: bool, code: u32, message: &str) -> Self {
        let root = Self::envelope("failed", server_version, protocol_version, open_subsonic).with_child(
            "error",
            Node::new().with_attr("code", code as i64).with_attr("message", message),
        );
        Self { root }
    }

    pub fn with_root(mut self, f: impl FnOnce(Node) -> Node) -> Self {
        self.root = f(self.root);
        self
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.root.attrs.get("status"), Some(Value::String(s)) if s == "ok")
    }
}

/// Renders a response as `subsonic-response` JSON. Uses the task-local
/// response arena only to grow intermediate buffers during the walk;
/// the final string returned is a plain owned `String` the framework
/// sends as the HTTP body.
pub fn to_json(response: &Response) -> String {
    let value = node_to_json(&response.root);
    let mut object = serde_json::Map::new();
    object.insert("subsonic-response".to_string(), value);
    serde_json::Value::Object(object).to_string()
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(n) => serde_json::Value::Number((*n).into()),
        Value::Float(f) => {
            if f.is_finite() {
                serde_json::Number::from_f64(*f).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null)
            } else {
                serde_json::Value::Null
            }
        }
    }
}

fn node_to_json(node: &Node) -> serde_json::Value {
    let mut object = serde_json::Map::new();
    for (key, value) in &node.attrs {
        object.insert(key.clone(), value_to_json(value));
    }
    if let Some(value) = &node.value {
        object.insert("value".to_string(), value_to_json(value));
    }
    for child in &node.children {
        match child {
            Child::Single(key, node) => {
                object.insert(key.clone(), node_to_json(node));
            }
            Child::Array(key, nodes) => {
                object.insert(key.clone(), serde_json::Value::Array(nodes.iter().map(node_to_json).collect()));
            }
            Child::PrimitiveArray(key, values) => {
                object.insert(key.clone(), serde_json::Value::Array(values.iter().map(value_to_json).collect()));
            }
        }
    }
    serde_json::Value::Object(object)
}

/// Renders a response as XML with the declaration and default
/// `xmlns="http://subsonic.org/restapi"` Subsonic clients expect.
pub fn to_xml(response: &Response, arena: &Arena) -> String {
    arena.with_scratch_buffer(|buf| {
        buf.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        write_element(buf, "subsonic-response", &response.root, true);
    })
}

fn write_element(buf: &mut BumpString, tag: &str, node: &Node, is_root: bool) {
    buf.push('<');
    buf.push_str(tag);
    for (key, value) in &node.attrs {
        buf.push(' ');
        buf.push_str(key);
        buf.push_str("=\"");
        buf.push_str(&xml_escape(&value_to_text(value)));
        buf.push('"');
    }
    if is_root {
        buf.push_str(" xmlns=\"http://subsonic.org/restapi\"");
    }

    let has_content = node.value.is_some() || !node.children.is_empty();
    if !has_content {
        buf.push_str("/>");
        return;
    }
    buf.push('>');
    if let Some(value) = &node.value {
        buf.push_str(&xml_escape(&value_to_text(value)));
    }
    for child in &node.children {
        match child {
            Child::Single(key, node) => write_element(buf, key, node, false),
            Child::Array(key, nodes) => {
                for node in nodes {
                    write_element(buf, key, node, false);
                }
            }
            Child::PrimitiveArray(key, values) => {
                for value in values {
                    buf.push('<');
                    buf.push_str(key);
                    buf.push('>');
                    buf.push_str(&xml_escape(&value_to_text(value)));
                    buf.push_str("</");
                    buf.push_str(key);
                    buf.push('>');
                }
            }
        }
    }
    buf.push_str("</");
    buf.push_str(tag);
    buf.push('>');
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => {
            if f.is_finite() {
                f.to_string()
            } else {
                String::new()
            }
        }
    }
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ok_json_matches_fixture() {
        let response = Response::ok("v3.72.0", "1.16.0", true);
        assert_eq!(
            to_json(&response),
            r#"{"subsonic-response":{"openSubsonic":true,"serverVersion":"v3.72.0","status":"ok","type":"lms","version":"1.16.0"}}"#
        );
    }

    #[test]
    fn empty_ok_xml_matches_fixture() {
        let response = Response::ok("v3.72.0", "1.16.0", true);
        let arena = Arena::new();
        let xml = to_xml(&response, &arena);
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <subsonic-response openSubsonic=\"true\" serverVersion=\"v3.72.0\" status=\"ok\" type=\"lms\" \
             version=\"1.16.0\" xmlns=\"http://subsonic.org/restapi\"/>"
        );
    }

    #[test]
    fn failed_response_nests_an_error_child() {
        let response = Response::failed("v3.72.0", "1.16.0", false, 70, "not found");
        let json = to_json(&response);
        assert!(json.contains("\"error\":{\"code\":70,\"message\":\"not found\"}"));
        assert!(json.contains("\"status\":\"failed\""));
    }

    #[test]
    fn nan_float_serializes_to_json_null() {
        let node = Node::new().with_attr("replayGain", f64::NAN);
        let value = node_to_json(&node);
        assert_eq!(value["replayGain"], serde_json::Value::Null);
    }

    #[test]
    fn xml_attribute_values_are_escaped() {
        let node = Node::new().with_attr("name", "Rock & Roll <3>");
        let bump = bumpalo::Bump::new();
        let mut buf = BumpString::new_in(&bump);
        write_element(&mut buf, "genre", &node, false);
        assert_eq!(buf.as_str(), "<genre name=\"Rock &amp; Roll &lt;3&gt;\"/>");
    }

    #[test]
    fn array_children_render_as_repeated_siblings() {
        let node = Node::new().with_children(
            "child",
            vec![Node::new().with_attr("id", 1i64), Node::new().with_attr("id", 2i64)],
        );
        let bump = bumpalo::Bump::new();
        let mut buf = BumpString::new_in(&bump);
        write_element(&mut buf, "root", &node, false);
        assert_eq!(buf.as_str(), "<root><child id=\"1\"/><child id=\"2\"/></root>");
    }
}
