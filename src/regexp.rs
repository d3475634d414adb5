//! Regular expression literals (§1 Non-goals: no execution engine).
//!
//! A regexp value carries its pattern and flag string verbatim so `typeof`,
//! `.source`, `.flags`, and the AST dump round-trip correctly; nothing here
//! compiles the pattern or performs matching, following the teacher's own
//! separation of literal storage from its `regex`/`fancy-regex` execution
//! layer (dropped — see `DESIGN.md`).

use crate::engine::Engine;
use crate::object::ObjectCell;
use crate::value::Value;

/// `create_regexp(pattern, flags)`.
pub(crate) fn create(engine: &mut Engine, pattern: &str, flags: &str) -> Value {
    let cell = ObjectCell::regexp(Value::null(), pattern.to_owned(), flags.to_owned());
    let id = engine
        .heap
        .alloc_object(cell)
        .expect("object arena exhaustion is handled by collect_garbage before this point");
    Value::object(id)
}

/// The pattern string of a regexp value, if `v` is one.
pub(crate) fn source(engine: &Engine, v: Value) -> Option<&str> {
    let id = v.as_object_id()?;
    match &engine.heap.object(id).kind {
        crate::object::ObjectKind::RegExp { pattern, .. } => Some(pattern.as_str()),
        _ => None,
    }
}

/// The flag string of a regexp value, if `v` is one.
pub(crate) fn flags(engine: &Engine, v: Value) -> Option<&str> {
    let id = v.as_object_id()?;
    match &engine.heap.object(id).kind {
        crate::object::ObjectKind::RegExp { flags, .. } => Some(flags.as_str()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_regexp_preserves_pattern_and_flags() {
        let mut engine = Engine::create();
        let v = create(&mut engine, "a+b*", "gi");
        assert_eq!(source(&engine, v), Some("a+b*"));
        assert_eq!(flags(&engine, v), Some("gi"));
        assert!(engine.is_regexp(v));
    }
}
