//! Scope chain construction and variable resolution (§4.1 "Scoping").
//!
//! Scopes are plain objects linked by `ObjectKind::Activation::parent`; the
//! chain terminates at the global object, which is an ordinary `Plain`
//! object with no parent. Variable lookup walks this chain (not the
//! prototype chain, which only matters for member access).

use crate::heap::{Heap, ObjectId, OutOfMemory};
use crate::object::{self, ObjectCell, ObjectKind, PropAttrs};
use crate::value::Value;

/// Allocates the global object: a `Plain` cell with `Value::null()` as its
/// prototype, i.e. the root of every prototype chain in the engine.
pub(crate) fn create_global(heap: &mut Heap) -> Result<ObjectId, OutOfMemory> {
    heap.alloc_object(ObjectCell::plain(Value::null()))
}

/// Allocates a fresh activation record for a call, linking it to `parent`
/// (the callee's closed-over scope, *not* the caller's scope — script
/// functions are lexically, not dynamically, scoped).
pub(crate) fn create_activation(
    heap: &mut Heap,
    parent: Option<ObjectId>,
    this_value: Value,
) -> Result<ObjectId, OutOfMemory> {
    heap.alloc_object(ObjectCell::activation(Value::null(), parent, this_value))
}

/// Declares `name` as a variable in `scope` with an initial value of
/// `undefined` if it does not already exist (`var` hoisting, §4.1
/// "Declarations"). Re-declaring an existing binding is a no-op, matching
/// `var`'s redeclaration tolerance.
pub(crate) fn declare_var(heap: &mut Heap, scope: ObjectId, name: &str) -> Result<(), OutOfMemory> {
    if object::get_own(heap, scope, name).is_some() {
        return Ok(());
    }
    let name_value = intern_name(heap, name);
    object::define_property(heap, scope, name_value, Value::undefined(), PropAttrs::DONT_DELETE)?;
    Ok(())
}

/// Finds the scope in the chain starting at `scope` that already owns
/// `name`, for `typeof`/assignment/read. Returns `None` for an unresolved
/// identifier (`ReferenceError` territory).
pub(crate) fn resolve(heap: &Heap, scope: ObjectId, name: &str) -> Option<ObjectId> {
    let mut current = scope;
    loop {
        if object::get_own(heap, current, name).is_some() {
            return Some(current);
        }
        match &heap.object(current).kind {
            ObjectKind::Activation { parent: Some(parent), .. } => current = *parent,
            _ => return None,
        }
    }
}

/// Assigns `value` to `name`, creating an implicit global binding if no
/// enclosing scope already owns it (non-strict assignment semantics, §4.1
/// "Assignment to an undeclared identifier").
pub(crate) fn assign(
    heap: &mut Heap,
    scope: ObjectId,
    global: ObjectId,
    name: &str,
    value: Value,
) -> Result<(), OutOfMemory> {
    let target = resolve(heap, scope, name).unwrap_or(global);
    let name_value = intern_name(heap, name);
    object::set_own_property(heap, target, name_value, value)
}

fn intern_name(heap: &mut Heap, name: &str) -> Value {
    match Value::string_inline(name) {
        Some(v) => v,
        None => Value::string_heap(heap.alloc_string_heap(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_then_resolve_finds_the_declaring_scope() {
        let mut heap = Heap::new(crate::heap::HeapCapacities::default());
        let global = create_global(&mut heap).unwrap();
        let activation = create_activation(&mut heap, Some(global), Value::undefined()).unwrap();
        declare_var(&mut heap, activation, "x").unwrap();
        assert_eq!(resolve(&heap, activation, "x"), Some(activation));
        assert_eq!(resolve(&heap, activation, "y"), None);
    }

    #[test]
    fn assign_to_undeclared_name_creates_global_binding() {
        let mut heap = Heap::new(crate::heap::HeapCapacities::default());
        let global = create_global(&mut heap).unwrap();
        let activation = create_activation(&mut heap, Some(global), Value::undefined()).unwrap();
        assign(&mut heap, activation, global, "g", Value::number(42.0)).unwrap();
        assert_eq!(resolve(&heap, activation, "g"), Some(global));
    }
}
