//! A small statically-typed JSON tree and a JSONPath-subset interpreter.
//!
//! Template path descriptors (`"choices[0].message.content"`) are the only
//! place this crate touches dynamically-shaped JSON; everything else reads
//! and writes through [`Node`] so a path descriptor typo fails at template
//! validation time rather than deep inside translation.

use serde_json::Value;

/// A JSON value as a tagged-variant tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<Node>),
    Object(Vec<(String, Node)>),
}

impl Node {
    /// An empty object, the starting point for building a request body.
    pub fn empty_object() -> Self {
        Node::Object(Vec::new())
    }

    fn as_object_mut(&mut self) -> Option<&mut Vec<(String, Node)>> {
        match self {
            Node::Object(entries) => Some(entries),
            _ => None,
        }
    }

    fn as_array_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Converts to a `serde_json::Value`.
    pub fn to_value(&self) -> Value {
        match self {
            Node::Null => Value::Null,
            Node::Bool(b) => Value::Bool(*b),
            Node::Number(n) => Value::Number(n.clone()),
            Node::String(s) => Value::String(s.clone()),
            Node::Array(items) => Value::Array(items.iter().map(Node::to_value).collect()),
            Node::Object(entries) => {
                Value::Object(entries.iter().map(|(k, v)| (k.clone(), v.to_value())).collect())
            }
        }
    }

    /// Builds a `Node` tree from a `serde_json::Value`.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(*b),
            Value::Number(n) => Node::Number(n.clone()),
            Value::String(s) => Node::String(s.clone()),
            Value::Array(items) => Node::Array(items.iter().map(Node::from_value).collect()),
            Value::Object(map) => {
                Node::Object(map.iter().map(|(k, v)| (k.clone(), Node::from_value(v))).collect())
            }
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Node::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Node]> {
        match self {
            Node::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::String(s.to_string())
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::String(s)
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Self {
        Node::Bool(b)
    }
}

impl From<f32> for Node {
    fn from(n: f32) -> Self {
        serde_json::Number::from_f64(n as f64).map(Node::Number).unwrap_or(Node::Null)
    }
}

impl From<u32> for Node {
    fn from(n: u32) -> Self {
        Node::Number(serde_json::Number::from(n))
    }
}

/// One step of a parsed path: a named field, or a `[i]` array index.
#[derive(Debug, Clone)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Splits `"choices[0].message.content"` into `[Key("choices"), Index(0),
/// Key("message"), Key("content")]`. Dotted names and bracketed indices may
/// be chained freely; indices are not required to follow a key.
fn parse(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();

    for dotted in path.split('.') {
        let mut rest = dotted;

        loop {
            match rest.find('[') {
                None => {
                    if !rest.is_empty() {
                        segments.push(Segment::Key(rest.to_string()));
                    }
                    break;
                }
                Some(bracket_start) => {
                    if bracket_start > 0 {
                        segments.push(Segment::Key(rest[..bracket_start].to_string()));
                    }

                    let Some(bracket_end) = rest[bracket_start..].find(']') else {
                        // Unterminated bracket: treat the remainder as a literal key.
                        segments.push(Segment::Key(rest[bracket_start..].to_string()));
                        break;
                    };
                    let bracket_end = bracket_start + bracket_end;

                    if let Ok(index) = rest[bracket_start + 1..bracket_end].parse::<usize>() {
                        segments.push(Segment::Index(index));
                    }

                    rest = &rest[bracket_end + 1..];
                }
            }
        }
    }

    segments
}

/// Reads the value at `path` within `root`, or `None` if any intermediate
/// segment is missing or of the wrong shape.
pub fn get<'a>(root: &'a Node, path: &str) -> Option<&'a Node> {
    let segments = parse(path);
    let mut current = root;

    for segment in &segments {
        current = match (current, segment) {
            (Node::Object(entries), Segment::Key(key)) => {
                &entries.iter().find(|(k, _)| k == key)?.1
            }
            (Node::Array(items), Segment::Index(index)) => items.get(*index)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Writes `value` at `path` within `root`, creating intermediate objects (and
/// array slots, backfilled with `Null`) as needed.
pub fn set(root: &mut Node, path: &str, value: Node) {
    let segments = parse(path);
    set_segments(root, &segments, value);
}

fn set_segments(node: &mut Node, segments: &[Segment], value: Node) {
    let Some((head, tail)) = segments.split_first() else {
        *node = value;
        return;
    };

    match head {
        Segment::Key(key) => {
            if node.as_object_mut().is_none() {
                *node = Node::empty_object();
            }
            let entries = node.as_object_mut().expect("just normalized to an object");

            match entries.iter_mut().find(|(k, _)| k == key) {
                Some((_, child)) => set_segments(child, tail, value),
                None => {
                    let mut child = Node::Null;
                    set_segments(&mut child, tail, value);
                    entries.push((key.clone(), child));
                }
            }
        }
        Segment::Index(index) => {
            if node.as_array_mut().is_none() {
                *node = Node::Array(Vec::new());
            }
            let items = node.as_array_mut().expect("just normalized to an array");

            while items.len() <= *index {
                items.push(Node::Null);
            }

            set_segments(&mut items[*index], tail, value);
        }
    }
}

/// Whether `path` resolves to something other than the documented "absent"
/// sentinel: template validation treats a `null` literal path descriptor as
/// "omit this field" (spec's edge policy), represented here as an empty
/// string rather than `Option::None` so templates can express it in JSON.
pub fn is_present(path: Option<&str>) -> bool {
    matches!(path, Some(p) if !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_through_value() {
        let value = json!({"a": {"b": [1, 2, {"c": "x"}]}});
        let node = Node::from_value(&value);
        assert_eq!(node.to_value(), value);
    }

    #[test]
    fn get_reads_dotted_and_indexed_path() {
        let node = Node::from_value(&json!({"choices": [{"message": {"content": "hi"}}]}));
        let value = get(&node, "choices[0].message.content").unwrap();
        assert_eq!(value.as_str(), Some("hi"));
    }

    #[test]
    fn get_returns_none_for_missing_path() {
        let node = Node::from_value(&json!({"a": 1}));
        assert!(get(&node, "a.b.c").is_none());
        assert!(get(&node, "missing[0]").is_none());
    }

    #[test]
    fn set_creates_intermediate_objects_and_arrays() {
        let mut node = Node::empty_object();
        set(&mut node, "messages[1].role", Node::from("assistant"));

        let value = node.to_value();
        assert_eq!(value["messages"][0], Value::Null);
        assert_eq!(value["messages"][1]["role"], json!("assistant"));
    }

    #[test]
    fn set_overwrites_existing_key() {
        let mut node = Node::from_value(&json!({"model": "old"}));
        set(&mut node, "model", Node::from("new"));
        assert_eq!(node.to_value(), json!({"model": "new"}));
    }
}
