//! XML response bodies converted to the same structured-value shape JSON
//! responses produce.
//!
//! The conversion mirrors the org.json `XML.toJSONObject` family: elements
//! become objects keyed by tag name, repeated sibling tags collapse into
//! arrays, attributes become fields, and text-only content is coerced to
//! bool/number when it parses as one. An element holding both attributes
//! and text keeps the text under `"content"`.

use std::io::Cursor;

use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Value};

use crate::error::{NodeError, NodeResult};

/// Parse an XML document into a `Value`. The result is an object with one
/// key: the root element's name.
pub fn xml_to_value(input: &str) -> NodeResult<Value> {
    let mut reader = Reader::from_reader(Cursor::new(input.as_bytes()));
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    // Stack of open elements: (tag name, child fields, accumulated text).
    let mut stack: Vec<(String, Map<String, Value>, String)> = Vec::new();
    let mut root = Map::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let mut fields = Map::new();
                for attr in e.attributes() {
                    let attr = attr.map_err(|e| {
                        NodeError::SerializationError(format!("invalid XML attribute: {e}"))
                    })?;
                    let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                    let value = attr.unescape_value().map_err(NodeError::from)?.to_string();
                    fields.insert(key, coerce_text(&value));
                }
                stack.push((name, fields, String::new()));
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let mut fields = Map::new();
                for attr in e.attributes() {
                    let attr = attr.map_err(|e| {
                        NodeError::SerializationError(format!("invalid XML attribute: {e}"))
                    })?;
                    let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                    let value = attr.unescape_value().map_err(NodeError::from)?.to_string();
                    fields.insert(key, coerce_text(&value));
                }
                let value = if fields.is_empty() {
                    Value::String(String::new())
                } else {
                    Value::Object(fields)
                };
                insert_child(parent_fields(&mut stack, &mut root), name, value);
            }
            Ok(Event::Text(e)) => {
                if let Some((_, _, text)) = stack.last_mut() {
                    text.push_str(&e.unescape().map_err(NodeError::from)?);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some((_, _, text)) = stack.last_mut() {
                    text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::End(_)) => {
                let (name, mut fields, text) = stack
                    .pop()
                    .ok_or_else(|| NodeError::SerializationError("unbalanced XML".to_string()))?;
                let value = if fields.is_empty() {
                    coerce_text(&text)
                } else {
                    if !text.is_empty() {
                        fields.insert("content".to_string(), coerce_text(&text));
                    }
                    Value::Object(fields)
                };
                insert_child(parent_fields(&mut stack, &mut root), name, value);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(NodeError::SerializationError(format!("XML parse: {e}"))),
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(NodeError::SerializationError(
            "unterminated XML document".to_string(),
        ));
    }

    Ok(Value::Object(root))
}

fn parent_fields<'a>(
    stack: &'a mut [(String, Map<String, Value>, String)],
    root: &'a mut Map<String, Value>,
) -> &'a mut Map<String, Value> {
    match stack.last_mut() {
        Some((_, fields, _)) => fields,
        None => root,
    }
}

/// Repeated sibling tags collapse into an array.
fn insert_child(fields: &mut Map<String, Value>, name: String, value: Value) {
    match fields.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            fields.insert(name, value);
        }
    }
}

/// Element text coerces to bool or number when it parses as one, matching
/// org.json's `stringToValue`.
fn coerce_text(text: &str) -> Value {
    match text {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = text.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Ok(f) = text.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(text.to_string())
}
