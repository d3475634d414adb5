//! Primitive type coercion and equality (§4.1 "Coercion rules", §8
//! "Testable properties" — the `==`/`===`/`+` scenarios).
//!
//! Deliberately stops at primitives: converting an *object* to a primitive
//! via a user-overridable `valueOf`/`toString` dispatch would require the
//! same call machinery as the excluded standard library, so object-to-string
//! here is a fixed, non-overridable rendering (see `DESIGN.md`).

use crate::heap::Heap;
use crate::object::ObjectKind;
use crate::value::Value;

/// ECMAScript `ToBoolean` (§9.2 of the grammar this engine's operators
/// follow): every value is truthy except `undefined`, `null`, `false`, `0`,
/// `NaN`, and the empty string.
pub(crate) fn to_boolean(heap: &Heap, v: Value) -> bool {
    if v.is_undefined() || v.is_null() {
        return false;
    }
    if v.is_boolean() {
        return v.is_true();
    }
    if v.is_number() {
        let n = v.to_number_bits();
        return n != 0.0 && !n.is_nan();
    }
    if v.is_string() {
        return !heap.string_bytes(v).is_empty();
    }
    true // objects and functions are always truthy
}

/// ECMAScript `ToNumber` on primitives. Objects coerce to `NaN` here rather
/// than attempting `valueOf` (see module docs).
pub(crate) fn to_number(heap: &Heap, v: Value) -> f64 {
    if v.is_number() {
        return v.to_number_bits();
    }
    if v.is_undefined() {
        return f64::NAN;
    }
    if v.is_null() {
        return 0.0;
    }
    if v.is_boolean() {
        return if v.is_true() { 1.0 } else { 0.0 };
    }
    if v.is_string() {
        let s = heap.string_bytes(v).trim();
        return if s.is_empty() { 0.0 } else { s.parse::<f64>().unwrap_or(f64::NAN) };
    }
    f64::NAN
}

/// Renders `v` as a `String`, matching ECMAScript `ToString` for
/// primitives, arrays (`join(",")`), and a fixed tag for plain objects and
/// functions.
pub(crate) fn to_string_value(heap: &Heap, v: Value) -> String {
    if v.is_undefined() {
        return "undefined".to_owned();
    }
    if v.is_null() {
        return "null".to_owned();
    }
    if v.is_boolean() {
        return v.is_true().to_string();
    }
    if v.is_number() {
        return number_to_string(v.to_number_bits());
    }
    if v.is_string() {
        return heap.string_bytes(v).to_owned();
    }
    if v.is_function() || v.is_cfunction() {
        return "function () { [native code] }".to_owned();
    }
    if let Some(id) = v.as_object_id() {
        let cell = heap.object(id);
        if let ObjectKind::Array(elements) = &cell.kind {
            return elements
                .iter()
                .map(|el| if el.is_undefined() || el.is_null() { String::new() } else { to_string_value(heap, *el) })
                .collect::<Vec<_>>()
                .join(",");
        }
        return "[object Object]".to_owned();
    }
    String::new()
}

/// Formats a number the way script source and `join`/`+` renderings expect:
/// integral doubles print without a trailing `.0`, matching JS's `Number#toString`.
pub(crate) fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_owned();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity".to_owned() } else { "-Infinity".to_owned() };
    }
    if n == 0.0 {
        return "0".to_owned();
    }
    if n.fract() == 0.0 && n.abs() < 1e21 {
        return format!("{n:.0}");
    }
    let mut buf = ryu::Buffer::new();
    buf.format(n).trim_end_matches('.').to_owned()
}

/// `===`: no coercion, and NaN-boxed bit patterns compare equal only when
/// both sides have the same tag and (for numbers) the same numeric value
/// (so `+0 === -0` holds while `NaN === NaN` does not).
pub(crate) fn strict_equals(heap: &Heap, a: Value, b: Value) -> bool {
    if a.is_number() && b.is_number() {
        return a.to_number_bits() == b.to_number_bits();
    }
    if a.is_string() && b.is_string() {
        return heap.string_bytes(a) == heap.string_bytes(b);
    }
    a == b
}

/// `==`: applies the standard abstract-equality coercions for the
/// pairings §8's scenarios exercise (number/string, boolean/other, null/undefined).
pub(crate) fn loose_equals(heap: &Heap, a: Value, b: Value) -> bool {
    if (a.is_undefined() || a.is_null()) && (b.is_undefined() || b.is_null()) {
        return true;
    }
    if a.is_number() && b.is_string() {
        return a.to_number_bits() == to_number(heap, b);
    }
    if a.is_string() && b.is_number() {
        return to_number(heap, a) == b.to_number_bits();
    }
    if a.is_boolean() {
        return loose_equals(heap, Value::number(to_number(heap, a)), b);
    }
    if b.is_boolean() {
        return loose_equals(heap, a, Value::number(to_number(heap, b)));
    }
    strict_equals(heap, a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::HeapCapacities;

    #[test]
    fn number_to_string_drops_trailing_zero() {
        assert_eq!(number_to_string(3.0), "3");
        assert_eq!(number_to_string(3.5), "3.5");
        assert_eq!(number_to_string(f64::NAN), "NaN");
    }

    #[test]
    fn loose_equals_coerces_string_to_number() {
        let heap = Heap::new(HeapCapacities::default());
        assert!(loose_equals(&heap, Value::number(1.0), Value::string_inline("1").unwrap()));
        assert!(!strict_equals(&heap, Value::number(1.0), Value::string_inline("1").unwrap()));
    }

    #[test]
    fn to_boolean_matches_ecmascript_falsy_set() {
        let heap = Heap::new(HeapCapacities::default());
        assert!(!to_boolean(&heap, Value::number(0.0)));
        assert!(!to_boolean(&heap, Value::number(f64::NAN)));
        assert!(!to_boolean(&heap, Value::undefined()));
        assert!(to_boolean(&heap, Value::number(1.0)));
    }
}
