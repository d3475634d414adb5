//! The string heap: a contiguous, bump-allocated, GC-compacted byte region.
//!
//! Strings above [`crate::value::INLINE_STRING_MAX`] bytes live here as
//! length-prefixed UTF-8. There is no per-string free; reclamation only happens
//! via [`StringHeap::compact`], which rewrites the whole region in reachability
//! order and returns a rewrite table the caller uses to fix up every live
//! `Value` that pointed at the old offsets (§4.2 "Compact strings").

use std::collections::HashMap;

/// Offset of a string's length prefix within the string heap's byte buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct StringHeapOffset(u64);

impl StringHeapOffset {
    pub(crate) fn raw(self) -> u64 {
        self.0
    }

    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

/// Handle for a string whose bytes are borrowed from the host (`copy_flag == 0`
/// in `create_string`). The engine never copies or relocates these bytes; it is
/// the host's responsibility to keep them alive for the `Value`'s lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ForeignStringId(u32);

impl ForeignStringId {
    pub(crate) fn from_index(i: usize) -> Self {
        Self(u32::try_from(i).expect("foreign string table overflow"))
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A length-prefixed UTF-8 byte buffer with a bump pointer.
///
/// Layout at each live offset: a little-endian `u32` length, followed by that
/// many UTF-8 bytes. Allocation only ever appends; the buffer shrinks only via
/// [`Self::compact`].
#[derive(Debug, Default)]
pub(crate) struct StringHeap {
    buf: Vec<u8>,
    /// Bytes used before the high-water mark that triggers a GC (§4.2 "Triggering").
    high_water_mark: usize,
}

impl StringHeap {
    pub(crate) fn new(high_water_mark: usize) -> Self {
        Self { buf: Vec::new(), high_water_mark }
    }

    pub(crate) fn reserved(&self) -> usize {
        self.buf.capacity()
    }

    pub(crate) fn used(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn over_high_water_mark(&self) -> bool {
        self.buf.len() > self.high_water_mark
    }

    /// Appends `s` to the heap and returns its offset.
    pub(crate) fn append(&mut self, s: &str) -> StringHeapOffset {
        let offset = self.buf.len() as u64;
        let bytes = s.as_bytes();
        self.buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        self.buf.extend_from_slice(bytes);
        StringHeapOffset(offset)
    }

    /// Reads the string stored at `offset`. Panics on a corrupt offset — callers
    /// only ever pass offsets produced by [`Self::append`] or rewritten by
    /// [`Self::compact`].
    pub(crate) fn get(&self, offset: StringHeapOffset) -> &str {
        let at = offset.0 as usize;
        let len = u32::from_le_bytes(self.buf[at..at + 4].try_into().unwrap()) as usize;
        std::str::from_utf8(&self.buf[at + 4..at + 4 + len]).expect("string heap entry is not valid UTF-8")
    }

    /// Rewrites the heap into a fresh buffer containing only the offsets in
    /// `live`, in the order given, and returns the old→new offset map so the
    /// caller can rewrite every `Value` and root that referenced the old layout.
    ///
    /// Mirrors the teacher's [`crate::heap::Heap::collect_garbage`] reachable-set
    /// sweep, but for the separately-managed byte arena instead of cell slots.
    pub(crate) fn compact(&mut self, live: &[StringHeapOffset]) -> HashMap<StringHeapOffset, StringHeapOffset> {
        let mut fresh = Vec::with_capacity(self.buf.len());
        let mut rewrite = HashMap::with_capacity(live.len());
        for &old in live {
            if rewrite.contains_key(&old) {
                continue; // dedup: several Values may share one heap string
            }
            let new_offset = fresh.len() as u64;
            let at = old.0 as usize;
            let len = u32::from_le_bytes(self.buf[at..at + 4].try_into().unwrap()) as usize;
            fresh.extend_from_slice(&self.buf[at..at + 4 + len]);
            rewrite.insert(old, StringHeapOffset(new_offset));
        }
        self.buf = fresh;
        rewrite
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_get_round_trips() {
        let mut heap = StringHeap::new(1024);
        let a = heap.append("hello");
        let b = heap.append("world, a longer one");
        assert_eq!(heap.get(a), "hello");
        assert_eq!(heap.get(b), "world, a longer one");
    }

    #[test]
    fn compact_drops_unreferenced_and_rewrites_live() {
        let mut heap = StringHeap::new(1024);
        let dead = heap.append("garbage");
        let live = heap.append("keep me");
        let _ = dead;
        let rewrite = heap.compact(&[live]);
        let new_offset = rewrite[&live];
        assert_eq!(heap.get(new_offset), "keep me");
        assert_eq!(heap.used(), 4 + "keep me".len());
    }
}
