//! The tagged 64-bit value representation ("v-word") shared by every other subsystem.
//!
//! Every script-visible value is a single [`Value`], a newtype over `u64` using
//! NaN-boxing: any bit pattern that is not a legal `f64` (i.e. falls in the IEEE-754
//! NaN range) is reinterpreted as a tagged immediate or heap reference instead of a
//! number. Numbers therefore cost nothing to decode — the bits *are* the double.
//!
//! ```text
//!  63           52 51 50     45 44                                      0
//! [ sign | exponent ][g][ tag ][ ------------------- payload ------------------- ]
//! ```
//!
//! A value is a number unless its exponent bits are all set (the NaN range) *and*
//! it isn't the one canonical NaN bit pattern reserved for the script `NaN` value.
//! All other NaN-shaped patterns are tagged: bit 50 is a fixed guard bit that is
//! always set on a tagged value and always clear on the canonical NaN (which has
//! bit 51, not bit 50, set), so no tag/payload combination can ever collide with
//! it. Below the guard sits a 5-bit tag and a 45-bit payload — comfortably large
//! enough to index any of the engine's arenas or inline a short string.

use std::fmt;

use crate::heap::{FunctionId, ObjectId};
use crate::strings::{ForeignStringId, StringHeapOffset};

/// Quiet-NaN exponent pattern: bits 52..=62 all set.
const EXPONENT_MASK: u64 = 0x7FF0_0000_0000_0000;
/// The single NaN bit pattern that round-trips as the JavaScript number `NaN`.
///
/// Every other `f64` NaN payload produced by host arithmetic is canonicalized to
/// this pattern by [`Value::number`]; every NaN-shaped bit pattern that is *not*
/// this one is a tagged non-number value.
const CANONICAL_NAN: u64 = 0x7FF8_0000_0000_0000;

const TAG_SHIFT: u32 = 45;
const TAG_BITS: u64 = 0x1F;
const PAYLOAD_MASK: u64 = (1 << TAG_SHIFT) - 1;
/// Guard bit forced on in every tagged value. `CANONICAL_NAN` has bit 51 set and
/// bit 50 clear, so fixing bit 50 high (disjoint from both the tag window below it
/// and the exponent bits above it) guarantees no tag/payload combination, including
/// an all-zero tag and payload, can ever equal the canonical NaN pattern.
const TAG_GUARD_BIT: u64 = 1 << 50;

/// Fixed high bits shared by every tagged (non-number) value: the exponent-all-ones
/// pattern plus the guard bit.
const TAG_BASE: u64 = EXPONENT_MASK | TAG_GUARD_BIT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Tag {
    Undefined = 0,
    Null = 1,
    True = 2,
    False = 3,
    Object = 4,
    /// A heap-allocated function record (§4 "Function record") — either a script
    /// function or a host callback that was wrapped via `create_function` /
    /// `create_constructor` and so carries an arity and a constructor prototype.
    Function = 5,
    /// A bare host function pointer (`create_cfunction`): no heap allocation, no
    /// arity metadata, just the pointer bits, matching the source's narrower
    /// `v7_cfunction_t` family which needs no engine handle to create or inspect.
    CFunctionPtr = 6,
    StringInline = 7,
    StringHeap = 8,
    StringForeign = 9,
    Foreign = 10,
}

impl Tag {
    const fn from_bits(bits: u64) -> Option<Self> {
        Some(match (bits >> TAG_SHIFT) & TAG_BITS {
            0 => Self::Undefined,
            1 => Self::Null,
            2 => Self::True,
            3 => Self::False,
            4 => Self::Object,
            5 => Self::Function,
            6 => Self::CFunctionPtr,
            7 => Self::StringInline,
            8 => Self::StringHeap,
            9 => Self::StringForeign,
            10 => Self::Foreign,
            _ => return None,
        })
    }
}

/// The single 64-bit encoding of every script value.
///
/// `Value` is `Copy` and has no destructor: heap-referencing variants are plain
/// indices, so dropping a `Value` never frees anything. Reachability is instead
/// decided wholesale by [`crate::heap::Heap::collect_garbage`] tracing from the
/// root set.
#[derive(Clone, Copy)]
pub struct Value(u64);

impl Value {
    #[inline]
    fn tagged(tag: Tag, payload: u64) -> Self {
        debug_assert!(payload <= PAYLOAD_MASK, "payload does not fit in 45 bits");
        Self(TAG_BASE | ((tag as u64) << TAG_SHIFT) | (payload & PAYLOAD_MASK))
    }

    #[inline]
    fn tag(self) -> Option<Tag> {
        if self.is_number() { None } else { Tag::from_bits(self.0) }
    }

    #[inline]
    fn payload(self) -> u64 {
        self.0 & PAYLOAD_MASK
    }

    // --- encode_* ---------------------------------------------------------

    /// Encodes an `f64`. Any NaN payload is canonicalized to the engine's single
    /// reserved NaN bit pattern, per the round-trip invariant in §4.1.
    #[must_use]
    pub fn number(n: f64) -> Self {
        if n.is_nan() { Self(CANONICAL_NAN) } else { Self(n.to_bits()) }
    }

    #[must_use]
    pub const fn undefined() -> Self {
        Self::tagged(Tag::Undefined, 0)
    }

    #[must_use]
    pub const fn null() -> Self {
        Self::tagged(Tag::Null, 0)
    }

    #[must_use]
    pub const fn boolean(b: bool) -> Self {
        if b { Self::tagged(Tag::True, 0) } else { Self::tagged(Tag::False, 0) }
    }

    #[must_use]
    pub(crate) fn object(id: ObjectId) -> Self {
        Self::tagged(Tag::Object, id.index() as u64)
    }

    #[must_use]
    pub(crate) fn function(id: FunctionId) -> Self {
        Self::tagged(Tag::Function, id.index() as u64)
    }

    /// Encodes a bare host function pointer, already reinterpreted as its
    /// address. The typed `fn(...)` <-> `u64` conversion lives in `engine.rs`,
    /// next to the `CFunctionPtr` type alias, to keep this module type-agnostic.
    #[must_use]
    pub(crate) fn cfunction_ptr_bits(bits: u64) -> Self {
        Self::tagged(Tag::CFunctionPtr, bits)
    }

    #[must_use]
    pub(crate) fn string_heap(offset: StringHeapOffset) -> Self {
        Self::tagged(Tag::StringHeap, offset.raw())
    }

    #[must_use]
    pub(crate) fn string_foreign(id: ForeignStringId) -> Self {
        Self::tagged(Tag::StringForeign, id.index() as u64)
    }

    #[must_use]
    pub(crate) fn foreign(id: ForeignPtrId) -> Self {
        Self::tagged(Tag::Foreign, id.index() as u64)
    }

    /// Inlines a short string (at most [`INLINE_STRING_MAX`] bytes) directly into
    /// the payload. Returns `None` if `s` is too long to inline.
    #[must_use]
    pub fn string_inline(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() > INLINE_STRING_MAX {
            return None;
        }
        let mut buf = [0u8; INLINE_STRING_MAX];
        buf[..bytes.len()].copy_from_slice(bytes);
        // Layout: payload bits 40..=42 = length, bits 0..=39 = up to 5 bytes.
        let mut payload = (bytes.len() as u64) << 40;
        for (i, &b) in buf.iter().enumerate() {
            payload |= u64::from(b) << (i * 8);
        }
        Some(Self::tagged(Tag::StringInline, payload))
    }

    // --- is_* ---------------------------------------------------------------

    #[inline]
    #[must_use]
    pub fn is_number(self) -> bool {
        (self.0 & EXPONENT_MASK) != EXPONENT_MASK || self.0 == CANONICAL_NAN
    }

    #[inline]
    #[must_use]
    pub fn is_undefined(self) -> bool {
        self.tag() == Some(Tag::Undefined)
    }

    #[inline]
    #[must_use]
    pub fn is_null(self) -> bool {
        self.tag() == Some(Tag::Null)
    }

    #[inline]
    #[must_use]
    pub fn is_boolean(self) -> bool {
        matches!(self.tag(), Some(Tag::True | Tag::False))
    }

    #[inline]
    #[must_use]
    pub fn is_true(self) -> bool {
        self.tag() == Some(Tag::True)
    }

    #[inline]
    #[must_use]
    pub fn is_object(self) -> bool {
        self.tag() == Some(Tag::Object)
    }

    #[inline]
    #[must_use]
    pub fn is_function(self) -> bool {
        self.tag() == Some(Tag::Function)
    }

    #[inline]
    #[must_use]
    pub fn is_cfunction(self) -> bool {
        self.tag() == Some(Tag::CFunctionPtr)
    }

    #[inline]
    #[must_use]
    pub fn is_string(self) -> bool {
        matches!(self.tag(), Some(Tag::StringInline | Tag::StringHeap | Tag::StringForeign))
    }

    #[inline]
    #[must_use]
    pub fn is_foreign(self) -> bool {
        self.tag() == Some(Tag::Foreign)
    }

    // --- to_* (infallible given the matching is_*) ---------------------------

    /// # Panics
    /// Panics if `!self.is_number()` — callers must check first, exactly as the
    /// `decode_*` family requires in §4.1.
    #[must_use]
    pub fn to_number_bits(self) -> f64 {
        assert!(self.is_number(), "Value::to_number_bits called on a non-number");
        f64::from_bits(self.0)
    }

    #[must_use]
    pub(crate) fn as_object_id(self) -> Option<ObjectId> {
        (self.tag() == Some(Tag::Object)).then(|| ObjectId::from_index(self.payload() as usize))
    }

    #[must_use]
    pub(crate) fn as_function_id(self) -> Option<FunctionId> {
        (self.tag() == Some(Tag::Function)).then(|| FunctionId::from_index(self.payload() as usize))
    }

    #[must_use]
    pub(crate) fn as_cfunction_ptr_bits(self) -> Option<u64> {
        (self.tag() == Some(Tag::CFunctionPtr)).then_some(self.payload())
    }

    #[must_use]
    pub(crate) fn as_foreign_id(self) -> Option<ForeignPtrId> {
        (self.tag() == Some(Tag::Foreign)).then(|| ForeignPtrId::from_index(self.payload() as usize))
    }

    /// Describes where this string's bytes live. Used by [`crate::heap::Heap`] to
    /// fetch the actual text.
    pub(crate) fn string_repr(self) -> Option<StringRepr> {
        match self.tag()? {
            Tag::StringInline => {
                let payload = self.payload();
                let len = ((payload >> 40) & 0x7) as usize;
                let mut buf = [0u8; INLINE_STRING_MAX];
                for (i, b) in buf.iter_mut().enumerate() {
                    *b = ((payload >> (i * 8)) & 0xFF) as u8;
                }
                Some(StringRepr::Inline(len, buf))
            }
            Tag::StringHeap => Some(StringRepr::Heap(StringHeapOffset::from_raw(self.payload()))),
            Tag::StringForeign => Some(StringRepr::Foreign(ForeignStringId::from_index(self.payload() as usize))),
            _ => None,
        }
    }

    pub(crate) fn raw_bits(self) -> u64 {
        self.0
    }
}

/// Maximum length (in bytes) of a string inlined directly into a v-word's payload.
///
/// Spec §9 Open Questions: any value ≤ 7 is compatible with the encoding; this
/// engine keeps the spec's documented default of 5.
pub const INLINE_STRING_MAX: usize = 5;

/// Where a string `Value`'s bytes physically live.
pub(crate) enum StringRepr {
    Inline(usize, [u8; INLINE_STRING_MAX]),
    Heap(StringHeapOffset),
    Foreign(ForeignStringId),
}

/// Opaque host pointer handle (the `void*` payload of `create_foreign`).
///
/// Stored in a small side table rather than packed directly into the payload: an
/// index is always 48-bit safe, whereas a raw pointer is only guaranteed to fit
/// the payload on the 48-bit virtual address spaces common to today's 64-bit
/// targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ForeignPtrId(u32);

impl ForeignPtrId {
    pub(crate) fn from_index(i: usize) -> Self {
        Self(u32::try_from(i).expect("foreign pointer table overflow"))
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_number() {
            write!(f, "Value::Number({})", self.to_number_bits())
        } else {
            write!(f, "Value(tag={:?}, payload={:#x})", self.tag(), self.payload())
        }
    }
}

// Bit-exact equality, as required by the round-trip invariant (§8): two values are
// `==` iff their v-word encodings are identical, never by JS `===` rules (see
// `crate::coerce::strict_equals` for that).
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for Value {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_round_trips_bit_exact() {
        for bits in [0.0_f64, -0.0, 1.0, -1.5, f64::INFINITY, f64::NEG_INFINITY, std::f64::consts::PI] {
            let v = Value::number(bits);
            assert!(v.is_number());
            assert_eq!(v.to_number_bits().to_bits(), bits.to_bits());
        }
    }

    #[test]
    fn nan_canonicalizes_to_single_pattern() {
        let a = Value::number(f64::NAN);
        let b = Value::number(-f64::NAN);
        assert!(a.is_number() && b.is_number());
        assert_eq!(a.raw_bits(), b.raw_bits());
        assert!(a.to_number_bits().is_nan());
    }

    #[test]
    fn exactly_one_predicate_holds_per_variant() {
        let values = [Value::undefined(), Value::null(), Value::boolean(true), Value::boolean(false), Value::number(42.0), Value::string_inline("hi").unwrap()];
        for v in values {
            let flags = [v.is_undefined(), v.is_null(), v.is_boolean(), v.is_number(), v.is_string()];
            assert_eq!(flags.iter().filter(|b| **b).count(), 1, "{v:?}");
        }
    }

    #[test]
    fn inline_string_round_trip() {
        let v = Value::string_inline("abc").unwrap();
        assert!(v.is_string());
        match v.string_repr().unwrap() {
            StringRepr::Inline(len, buf) => {
                assert_eq!(len, 3);
                assert_eq!(&buf[..len], b"abc");
            }
            _ => panic!("expected inline string"),
        }
        assert!(Value::string_inline("toolongforinline").is_none());
    }

    #[test]
    fn object_id_round_trip() {
        let id = ObjectId::from_index(1234);
        let v = Value::object(id);
        assert!(v.is_object());
        assert_eq!(v.as_object_id(), Some(id));
        assert!(!v.is_number());
        assert!(!v.is_string());
    }

    #[test]
    fn function_id_round_trip() {
        let id = FunctionId::from_index(7);
        let v = Value::function(id);
        assert!(v.is_function());
        assert_eq!(v.as_function_id(), Some(id));
    }

    #[test]
    fn undefined_is_not_confused_with_nan() {
        let u = Value::undefined();
        assert!(u.is_undefined());
        assert!(!u.is_number());
        assert_ne!(u.raw_bits(), Value::number(f64::NAN).raw_bits());
    }

    #[test]
    fn tag_window_does_not_overlap_the_guard_bit() {
        // Every tag must round-trip through encode/decode exactly: the window
        // `from_bits` reads has to be the same one `tagged` wrote.
        assert_eq!(Value::undefined().tag(), Some(Tag::Undefined));
        assert_eq!(Value::null().tag(), Some(Tag::Null));
        assert_eq!(Value::boolean(true).tag(), Some(Tag::True));
        assert_eq!(Value::boolean(false).tag(), Some(Tag::False));
        assert_eq!(Value::object(ObjectId::from_index(0)).tag(), Some(Tag::Object));
        assert_eq!(Value::function(FunctionId::from_index(0)).tag(), Some(Tag::Function));
    }
}
