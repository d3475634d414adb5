//! Object cells and property cells (§4.1 "Objects", §4.1 "Properties").
//!
//! Properties are a singly-linked chain of [`PropertyCell`]s rather than a
//! hash map, per the data model: insertion order is preserved for free and
//! lookup is O(chain length), matching the teacher's `namespace.rs` choice to
//! keep scope records as linked frames instead of a `HashMap` per frame.

use bitflags::bitflags;

use crate::heap::{FunctionId, ObjectId, PropertyId};
use crate::value::Value;

bitflags! {
    /// Property attribute flags, matching the ECMA-262 descriptor bits plus
    /// the engine-internal `HIDDEN` flag used for non-enumerable machinery
    /// properties (e.g. `arguments.callee`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PropAttrs: u8 {
        const READ_ONLY   = 0b0000_0001;
        const DONT_ENUM   = 0b0000_0010;
        const DONT_DELETE = 0b0000_0100;
        const HIDDEN      = 0b0000_1000;
        const GETTER      = 0b0001_0000;
        const SETTER      = 0b0010_0000;
    }
}

impl Default for PropAttrs {
    fn default() -> Self {
        PropAttrs::empty()
    }
}

/// One property slot in an object's property chain.
#[derive(Debug)]
pub(crate) struct PropertyCell {
    /// Always a string `Value` (inline, heap, or foreign).
    pub(crate) name: Value,
    pub(crate) attrs: PropAttrs,
    pub(crate) value: Value,
    pub(crate) next: Option<PropertyId>,
}

impl PropertyCell {
    pub(crate) fn is_accessor(&self) -> bool {
        self.attrs.intersects(PropAttrs::GETTER | PropAttrs::SETTER)
    }
}

/// What distinguishes an object cell beyond "a prototype plus properties"
/// (§4.1 "Object kinds").
#[derive(Debug)]
pub(crate) enum ObjectKind {
    /// A plain object: properties are the whole story.
    Plain,
    /// A dense array. Elements are stored out-of-line from the property
    /// chain so indexed access stays O(1); the `length` property is kept in
    /// sync by the interpreter on every mutating array operation.
    Array(Vec<Value>),
    /// A function activation record: the running scope chain frame.
    Activation {
        parent: Option<ObjectId>,
        this_value: Value,
        /// Lazily created `arguments` object, if the function body refers to it.
        arguments: Option<ObjectId>,
    },
    /// An opaque, unexecuted regular expression literal (§1 Non-goals: no
    /// execution engine). Held only so `typeof`, `.source`, `.flags` work and
    /// round-trip through the AST dump.
    RegExp { pattern: String, flags: String },
}

/// A heap-allocated JS object (§4.1 "Objects").
#[derive(Debug)]
pub(crate) struct ObjectCell {
    /// `Value::null()` for the root prototype, otherwise another object.
    pub(crate) prototype: Value,
    pub(crate) first_prop: Option<PropertyId>,
    pub(crate) kind: ObjectKind,
    /// Set when this object is a function's `.prototype` or wraps a function
    /// value directly (`Function` objects carry their `FunctionId` here so
    /// `typeof`/call dispatch doesn't need a second lookup).
    pub(crate) as_function: Option<FunctionId>,
}

impl ObjectCell {
    pub(crate) fn plain(prototype: Value) -> Self {
        Self { prototype, first_prop: None, kind: ObjectKind::Plain, as_function: None }
    }

    pub(crate) fn array(prototype: Value, elements: Vec<Value>) -> Self {
        Self { prototype, first_prop: None, kind: ObjectKind::Array(elements), as_function: None }
    }

    pub(crate) fn activation(prototype: Value, parent: Option<ObjectId>, this_value: Value) -> Self {
        Self {
            prototype,
            first_prop: None,
            kind: ObjectKind::Activation { parent, this_value, arguments: None },
            as_function: None,
        }
    }

    pub(crate) fn regexp(prototype: Value, pattern: String, flags: String) -> Self {
        Self { prototype, first_prop: None, kind: ObjectKind::RegExp { pattern, flags }, as_function: None }
    }

    pub(crate) fn is_array(&self) -> bool {
        matches!(self.kind, ObjectKind::Array(_))
    }

    /// Walks this object's own property chain looking for `name`, comparing by
    /// the string heap's byte contents rather than `Value` bit-equality, since
    /// the same string may be represented inline in one place and on the heap
    /// in another.
    pub(crate) fn find_own_property(
        &self,
        properties: &crate::heap::Heap,
        name: &str,
    ) -> Option<PropertyId> {
        let mut cur = self.first_prop;
        while let Some(id) = cur {
            let cell = properties.property(id);
            if properties.string_bytes(cell.name) == name {
                return Some(id);
            }
            cur = cell.next;
        }
        None
    }
}

/// Looks up `name` as an own (non-inherited) property of `obj`.
pub(crate) fn get_own(heap: &crate::heap::Heap, obj: ObjectId, name: &str) -> Option<PropertyId> {
    heap.object(obj).find_own_property(heap, name)
}

/// Creates a new property cell and prepends it to `obj`'s property chain.
/// Enumeration order is therefore most-recently-defined-first; nothing in
/// the supported operation set depends on insertion order being preserved.
pub(crate) fn define_property(
    heap: &mut crate::heap::Heap,
    obj: ObjectId,
    name: Value,
    value: Value,
    attrs: PropAttrs,
) -> Result<PropertyId, crate::heap::OutOfMemory> {
    let old_first = heap.object(obj).first_prop;
    let pid = heap.alloc_property(PropertyCell { name, attrs, value, next: old_first })?;
    heap.object_mut(obj).first_prop = Some(pid);
    Ok(pid)
}

/// Looks up `name` on `obj` itself, then walks the prototype chain.
pub(crate) fn get_property(heap: &crate::heap::Heap, obj: ObjectId, name: &str) -> Option<Value> {
    let mut current = obj;
    loop {
        let cell = heap.object(current);
        if let Some(pid) = cell.find_own_property(heap, name) {
            return Some(heap.property(pid).value);
        }
        match cell.prototype.as_object_id() {
            Some(next) => current = next,
            None => return None,
        }
    }
}

/// Updates `name` if it already exists as an own property (short-circuiting
/// silently on `READ_ONLY`, matching non-strict-mode assignment semantics),
/// otherwise defines a fresh own property with default attributes.
pub(crate) fn set_own_property(
    heap: &mut crate::heap::Heap,
    obj: ObjectId,
    name: Value,
    value: Value,
) -> Result<(), crate::heap::OutOfMemory> {
    let name_str = heap.string_bytes(name).to_owned();
    if let Some(pid) = heap.object(obj).find_own_property(heap, &name_str) {
        let cell = heap.property_mut(pid);
        if !cell.attrs.contains(PropAttrs::READ_ONLY) {
            cell.value = value;
        }
        return Ok(());
    }
    define_property(heap, obj, name, value, PropAttrs::empty())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attrs_roundtrip_through_bits() {
        let attrs = PropAttrs::READ_ONLY | PropAttrs::DONT_ENUM;
        assert!(attrs.contains(PropAttrs::READ_ONLY));
        assert!(!attrs.contains(PropAttrs::DONT_DELETE));
    }

    #[test]
    fn accessor_detection() {
        let mut attrs = PropAttrs::empty();
        assert!(!PropertyCell { name: Value::undefined(), attrs, value: Value::undefined(), next: None }.is_accessor());
        attrs |= PropAttrs::GETTER;
        assert!(PropertyCell { name: Value::undefined(), attrs, value: Value::undefined(), next: None }.is_accessor());
    }
}
