//! `parse_json`/`to_json` (§6 "Observability", §10.6).
//!
//! Builds on `serde_json::Value` for the parse/format side rather than
//! hand-rolling a JSON grammar; the engine-side tree is assembled with the
//! same object/array primitives the interpreter itself uses for array and
//! object literals.

use crate::engine::Engine;
use crate::object::{ObjectKind, PropAttrs};
use crate::value::Value;

/// `parse_json(engine, src, &result)`. Recursively converts a
/// `serde_json::Value` into engine `Value`s; objects become plain objects
/// with insertion-order-preserved properties (`serde_json`'s
/// `preserve_order` feature, matching its own `IndexMap`-backed map).
pub(crate) fn parse_json(engine: &mut Engine, src: &str) -> Result<Value, String> {
    let parsed: serde_json::Value = serde_json::from_str(src).map_err(|e| e.to_string())?;
    Ok(build(engine, &parsed))
}

fn build(engine: &mut Engine, v: &serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::null(),
        serde_json::Value::Bool(b) => Value::boolean(*b),
        serde_json::Value::Number(n) => Value::number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => intern(engine, s),
        serde_json::Value::Array(items) => {
            let elements: Vec<Value> = items.iter().map(|item| build(engine, item)).collect();
            engine
                .new_array(elements)
                .expect("array arena exhaustion is handled by collect_garbage before this point")
        }
        serde_json::Value::Object(map) => {
            let obj = engine.create_object();
            let obj_id = obj.as_object_id().expect("create_object always returns an object value");
            for (key, val) in map {
                let key_value = intern(engine, key);
                let val_value = build(engine, val);
                crate::object::define_property(&mut engine.heap, obj_id, key_value, val_value, PropAttrs::empty())
                    .expect("property arena exhaustion is handled by collect_garbage before this point");
            }
            obj
        }
    }
}

fn intern(engine: &mut Engine, s: &str) -> Value {
    match Value::string_inline(s) {
        Some(v) => v,
        None => Value::string_heap(engine.heap.alloc_string_heap(s)),
    }
}

/// `to_json(engine, v)`: the reverse direction, walking an engine `Value`
/// into a `serde_json::Value` and serializing it. Functions and foreign
/// pointers have no JSON representation and are rejected, matching
/// `JSON.stringify`'s own refusal on non-serializable types.
pub(crate) fn to_json(engine: &Engine, v: Value) -> Result<String, String> {
    let json = to_serde(engine, v)?;
    serde_json::to_string(&json).map_err(|e| e.to_string())
}

fn to_serde(engine: &Engine, v: Value) -> Result<serde_json::Value, String> {
    if v.is_undefined() {
        return Ok(serde_json::Value::Null);
    }
    if v.is_null() {
        return Ok(serde_json::Value::Null);
    }
    if v.is_boolean() {
        return Ok(serde_json::Value::Bool(v.is_true()));
    }
    if v.is_number() {
        let n = v.to_number_bits();
        return Ok(serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number));
    }
    if v.is_string() {
        return Ok(serde_json::Value::String(engine.heap.string_bytes(v).to_owned()));
    }
    if let Some(id) = v.as_object_id() {
        let cell = engine.heap.object(id);
        return match &cell.kind {
            ObjectKind::Array(elements) => {
                let mut items = Vec::with_capacity(elements.len());
                for &el in elements {
                    items.push(to_serde(engine, el)?);
                }
                Ok(serde_json::Value::Array(items))
            }
            ObjectKind::Plain => {
                let mut map = serde_json::Map::new();
                let mut cur = cell.first_prop;
                let mut entries = Vec::new();
                while let Some(pid) = cur {
                    let prop = engine.heap.property(pid);
                    if !prop.attrs.contains(PropAttrs::DONT_ENUM) && !prop.attrs.contains(PropAttrs::HIDDEN) {
                        entries.push((engine.heap.string_bytes(prop.name).to_owned(), prop.value));
                    }
                    cur = prop.next;
                }
                // Properties are chained most-recently-defined-first; reverse to
                // restore the original definition order before serializing.
                for (key, value) in entries.into_iter().rev() {
                    map.insert(key, to_serde(engine, value)?);
                }
                Ok(serde_json::Value::Object(map))
            }
            ObjectKind::Activation { .. } => Err("cannot serialize an activation record".into()),
            ObjectKind::RegExp { .. } => Err("cannot serialize a regular expression".into()),
        };
    }
    if v.is_function() || v.is_cfunction() {
        return Err("cannot serialize a function".into());
    }
    if v.is_foreign() {
        return Err("cannot serialize a foreign pointer".into());
    }
    Err("value has no JSON representation".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;

    #[test]
    fn parse_json_builds_nested_structure() {
        let mut engine = Engine::create();
        let v = parse_json(&mut engine, r#"{"a":[1,2,3],"b":"hi"}"#).unwrap();
        let a = engine.get(v, "a");
        assert!(engine.is_array(a));
        assert_eq!(engine.array_length(a), 3);
        assert_eq!(engine.to_string_lossy(engine.get(v, "b")), "hi");
    }

    #[test]
    fn to_json_round_trips_through_parse() {
        let mut engine = Engine::create();
        let v = parse_json(&mut engine, r#"{"x":1,"y":[true,null]}"#).unwrap();
        let out = to_json(&engine, v).unwrap();
        let reparsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(reparsed["x"], 1);
        assert_eq!(reparsed["y"][0], true);
    }
}
