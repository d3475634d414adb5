//! The managed heap: three fixed-cell arenas (objects, functions, properties), the
//! string heap, and the precise mark/sweep/compact garbage collector (§4.2).

use std::collections::HashMap;

use crate::function::FunctionCell;
use crate::object::{ObjectCell, ObjectKind, PropertyCell};
use crate::strings::{ForeignStringId, StringHeap, StringHeapOffset};
use crate::value::{StringRepr, Value};

/// Index into the object cell arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(u32);

/// Index into the function cell arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionId(u32);

/// Index into the property cell arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyId(u32);

macro_rules! cell_id {
    ($ty:ident) => {
        impl $ty {
            pub(crate) fn from_index(i: usize) -> Self {
                Self(u32::try_from(i).expect("cell arena overflowed u32 index space"))
            }
            pub(crate) fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}
cell_id!(ObjectId);
cell_id!(FunctionId);
cell_id!(PropertyId);

/// Error raised when an arena is at capacity and GC reclaimed nothing (§4.2
/// "Failure modes"), surfaced to the host as `OutOfMemory` (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfMemory;

/// A bump-allocated, free-list-recycled pool of fixed-size cells.
///
/// Mirrors the teacher's `free_list: Vec<HeapId>` arena pattern in
/// `heap.rs`, generalized over the cell payload type and given an explicit
/// capacity cap instead of Python's "no cap, rely on the OS allocator".
#[derive(Debug)]
pub(crate) struct CellArena<T> {
    cells: Vec<Option<T>>,
    free_list: Vec<u32>,
    cap: usize,
}

impl<T> CellArena<T> {
    fn new(initial_capacity: usize, cap: usize) -> Self {
        Self { cells: Vec::with_capacity(initial_capacity), free_list: Vec::new(), cap }
    }

    fn len(&self) -> usize {
        self.cells.len()
    }

    fn free_count(&self) -> usize {
        self.free_list.len()
    }

    fn allocate(&mut self, value: T) -> Result<u32, OutOfMemory> {
        if let Some(idx) = self.free_list.pop() {
            self.cells[idx as usize] = Some(value);
            return Ok(idx);
        }
        if self.cells.len() >= self.cap {
            return Err(OutOfMemory);
        }
        let idx = u32::try_from(self.cells.len()).map_err(|_| OutOfMemory)?;
        self.cells.push(Some(value));
        Ok(idx)
    }

    fn get(&self, idx: u32) -> &T {
        self.cells[idx as usize].as_ref().expect("access to freed cell")
    }

    fn get_mut(&mut self, idx: u32) -> &mut T {
        self.cells[idx as usize].as_mut().expect("access to freed cell")
    }

    /// Doubles capacity up to the configured cap (§4.2 "Arenas").
    fn grow(&mut self) {
        self.cap = (self.cap * 2).max(self.cap + 1);
    }

    fn sweep(&mut self, reachable: &[bool]) {
        for (idx, slot) in self.cells.iter_mut().enumerate() {
            if slot.is_some() && !reachable.get(idx).copied().unwrap_or(false) {
                *slot = None;
                self.free_list.push(u32::try_from(idx).unwrap());
            }
        }
    }

    fn release_unused_capacity(&mut self) {
        self.cells.shrink_to_fit();
        self.free_list.shrink_to_fit();
    }
}

/// Snapshot kinds accepted by `heap_stat`, matching `enum v7_heap_stat_what`
/// in the original source header verbatim (see `SPEC_FULL.md` §10.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapStatKind {
    HeapSize,
    HeapUsed,
    StringHeapReserved,
    StringHeapUsed,
    ObjHeapMax,
    ObjHeapFree,
    ObjHeapCellSize,
    FuncHeapMax,
    FuncHeapFree,
    FuncHeapCellSize,
    PropHeapMax,
    PropHeapFree,
    PropHeapCellSize,
    FuncAstSize,
    FuncOwned,
    FuncOwnedMax,
}

/// Capacities supplied at engine creation (`v7_create_opts`), see `EngineOptions`.
#[derive(Debug, Clone, Copy)]
pub struct HeapCapacities {
    pub object_arena_cap: usize,
    pub function_arena_cap: usize,
    pub property_arena_cap: usize,
    pub string_heap_high_water_mark: usize,
}

impl Default for HeapCapacities {
    fn default() -> Self {
        Self {
            object_arena_cap: 4096,
            function_arena_cap: 1024,
            property_arena_cap: 16384,
            string_heap_high_water_mark: 64 * 1024,
        }
    }
}

/// A host-held byte buffer referenced without copying (`create_string` with
/// `copy_flag == 0`). The pointer is `unsafe` because nothing in the type
/// system proves the host keeps it alive; the contract is documented on
/// `Engine::create_string`.
pub(crate) struct ForeignStringEntry {
    ptr: *const u8,
    len: usize,
}

// Safety: the engine is single-owner/single-threaded (spec §5); ForeignStringEntry
// is never accessed from another thread.
unsafe impl Send for ForeignStringEntry {}

// Safety: same rationale as `ForeignStringEntry` — the pointer is opaque host
// state the engine never dereferences itself (`create_foreign`/`to_foreign`,
// §6 "Value construction").
struct ForeignPtrEntry(*mut std::ffi::c_void);
unsafe impl Send for ForeignPtrEntry {}

pub(crate) struct Heap {
    pub(crate) objects: CellArena<ObjectCell>,
    pub(crate) functions: CellArena<FunctionCell>,
    pub(crate) properties: CellArena<PropertyCell>,
    pub(crate) strings: StringHeap,
    foreign_strings: Vec<Option<ForeignStringEntry>>,
    foreign_string_free: Vec<u32>,
    foreign_ptrs: Vec<Option<ForeignPtrEntry>>,
    foreign_ptr_free: Vec<u32>,
    /// Host-registered root pointers, stack-disciplined (`own`/`disown`, §4.2).
    owned_roots: Vec<*mut Value>,
    /// High-water mark of live function cells, for `HeapStatKind::FuncOwnedMax`.
    func_owned_max: usize,
    last_rewrite: HashMap<StringHeapOffset, StringHeapOffset>,
}

impl Heap {
    pub(crate) fn new(caps: HeapCapacities) -> Self {
        Self {
            objects: CellArena::new(64, caps.object_arena_cap),
            functions: CellArena::new(16, caps.function_arena_cap),
            properties: CellArena::new(64, caps.property_arena_cap),
            strings: StringHeap::new(caps.string_heap_high_water_mark),
            foreign_strings: Vec::new(),
            foreign_string_free: Vec::new(),
            foreign_ptrs: Vec::new(),
            foreign_ptr_free: Vec::new(),
            owned_roots: Vec::new(),
            func_owned_max: 0,
            last_rewrite: HashMap::new(),
        }
    }

    // --- allocation -----------------------------------------------------------

    pub(crate) fn alloc_object(&mut self, cell: ObjectCell) -> Result<ObjectId, OutOfMemory> {
        self.objects.allocate(cell).map(ObjectId)
    }

    pub(crate) fn alloc_function(&mut self, cell: FunctionCell) -> Result<FunctionId, OutOfMemory> {
        let id = self.functions.allocate(cell).map(FunctionId)?;
        let live = self.functions.len() - self.functions.free_count();
        self.func_owned_max = self.func_owned_max.max(live);
        Ok(id)
    }

    pub(crate) fn alloc_property(&mut self, cell: PropertyCell) -> Result<PropertyId, OutOfMemory> {
        self.properties.allocate(cell).map(PropertyId)
    }

    pub(crate) fn grow_all_arenas(&mut self) {
        self.objects.grow();
        self.functions.grow();
        self.properties.grow();
    }

    pub(crate) fn alloc_string_heap(&mut self, s: &str) -> StringHeapOffset {
        self.strings.append(s)
    }

    /// Registers a host-owned byte slice for the lifetime of the returned
    /// `ForeignStringId`. # Safety: `ptr..ptr+len` must remain valid and
    /// unmodified until the engine drops every `Value` referencing it.
    pub(crate) unsafe fn alloc_foreign_string(&mut self, ptr: *const u8, len: usize) -> ForeignStringId {
        let entry = ForeignStringEntry { ptr, len };
        if let Some(idx) = self.foreign_string_free.pop() {
            self.foreign_strings[idx as usize] = Some(entry);
            return ForeignStringId::from_index(idx as usize);
        }
        self.foreign_strings.push(Some(entry));
        ForeignStringId::from_index(self.foreign_strings.len() - 1)
    }

    /// Registers an opaque host pointer (`create_foreign`, §6). The engine
    /// never dereferences it; `ptr` is returned verbatim by `to_foreign`.
    pub(crate) fn alloc_foreign_ptr(&mut self, ptr: *mut std::ffi::c_void) -> crate::value::ForeignPtrId {
        let entry = ForeignPtrEntry(ptr);
        if let Some(idx) = self.foreign_ptr_free.pop() {
            self.foreign_ptrs[idx as usize] = Some(entry);
            return crate::value::ForeignPtrId::from_index(idx as usize);
        }
        self.foreign_ptrs.push(Some(entry));
        crate::value::ForeignPtrId::from_index(self.foreign_ptrs.len() - 1)
    }

    pub(crate) fn foreign_ptr(&self, id: crate::value::ForeignPtrId) -> *mut std::ffi::c_void {
        self.foreign_ptrs[id.index()].as_ref().expect("foreign pointer was disowned").0
    }

    // --- access -----------------------------------------------------------

    pub(crate) fn object(&self, id: ObjectId) -> &ObjectCell {
        self.objects.get(id.0)
    }

    pub(crate) fn object_mut(&mut self, id: ObjectId) -> &mut ObjectCell {
        self.objects.get_mut(id.0)
    }

    pub(crate) fn function(&self, id: FunctionId) -> &FunctionCell {
        self.functions.get(id.0)
    }

    pub(crate) fn function_mut(&mut self, id: FunctionId) -> &mut FunctionCell {
        self.functions.get_mut(id.0)
    }

    pub(crate) fn property(&self, id: PropertyId) -> &PropertyCell {
        self.properties.get(id.0)
    }

    pub(crate) fn property_mut(&mut self, id: PropertyId) -> &mut PropertyCell {
        self.properties.get_mut(id.0)
    }

    /// Returns the bytes behind a string `Value`, valid until the next
    /// allocation (strings heap bytes may be compacted by GC; see §4.1).
    pub(crate) fn string_bytes(&self, v: Value) -> &str {
        match v.string_repr().expect("string_bytes called on a non-string Value") {
            StringRepr::Inline(len, buf) => {
                // Leak-free: this points into the caller's `Value`, but we need a
                // `&str` with the heap's borrow lifetime. Inline bytes are copied
                // out of the payload already, so stash them via a 'static-sized
                // scratch buffer is not possible here; callers that need an owned
                // string should use `Engine::to_string_lossy` instead.
                let s = std::str::from_utf8(&buf[..len]).expect("inline string is valid utf8");
                // SAFETY: `buf` is a local copy; we immediately leak its bytes into
                // a thread-local scratch arena sized for one inline string so the
                // returned slice can outlive this call without allocating per call.
                thread_local_scratch(s)
            }
            StringRepr::Heap(offset) => self.strings.get(offset),
            StringRepr::Foreign(id) => {
                let entry = self.foreign_strings[id.index()].as_ref().expect("foreign string was disowned");
                // SAFETY: contract documented on `alloc_foreign_string`.
                unsafe { std::str::from_utf8(std::slice::from_raw_parts(entry.ptr, entry.len)).expect("foreign bytes are valid utf8") }
            }
        }
    }

    // --- root registration (`own`/`disown`, §4.2 & §6) -------------------------

    pub(crate) fn own(&mut self, v: *mut Value) {
        self.owned_roots.push(v);
    }

    /// Removes the most recent registration of `v`. Returns `true` iff a prior
    /// `own` registered this exact address and no intervening `disown` already
    /// removed it — the stack-discipline invariant tested in §8.
    pub(crate) fn disown(&mut self, v: *mut Value) -> bool {
        if let Some(pos) = self.owned_roots.iter().rposition(|&p| p == v) {
            self.owned_roots.remove(pos);
            true
        } else {
            false
        }
    }

    fn owned_root_values(&self) -> impl Iterator<Item = Value> + '_ {
        // SAFETY: the host contract for `own` requires these pointers to stay
        // valid and pointing at a live `Value` until `disown`.
        self.owned_roots.iter().map(|&p| unsafe { *p })
    }

    // --- garbage collection (§4.2) -----------------------------------------

    pub(crate) fn object_arena_exhausted(&self) -> bool {
        self.objects.free_count() == 0 && self.objects.len() >= self.objects.cap
    }

    pub(crate) fn function_arena_exhausted(&self) -> bool {
        self.functions.free_count() == 0 && self.functions.len() >= self.functions.cap
    }

    pub(crate) fn property_arena_exhausted(&self) -> bool {
        self.properties.free_count() == 0 && self.properties.len() >= self.properties.cap
    }

    pub(crate) fn needs_collection(&self) -> bool {
        self.object_arena_exhausted()
            || self.function_arena_exhausted()
            || self.property_arena_exhausted()
            || self.strings.over_high_water_mark()
    }

    /// Runs mark/sweep/compact from `extra_roots` plus every host-registered
    /// `own`ed cell. `full` additionally releases unused arena capacity back to
    /// the allocator (§4.2 "Full vs partial").
    pub(crate) fn collect_garbage(&mut self, extra_roots: impl IntoIterator<Item = Value>, full: bool) {
        let mut work_list: Vec<Value> = self.owned_root_values().collect();
        work_list.extend(extra_roots);

        let mut obj_reachable = vec![false; self.objects.len()];
        let mut func_reachable = vec![false; self.functions.len()];
        let mut prop_reachable = vec![false; self.properties.len()];
        let mut live_strings: Vec<StringHeapOffset> = Vec::new();

        while let Some(v) = work_list.pop() {
            self.mark_value(v, &mut obj_reachable, &mut func_reachable, &mut prop_reachable, &mut live_strings, &mut work_list);
        }

        self.objects.sweep(&obj_reachable);
        self.functions.sweep(&func_reachable);
        self.properties.sweep(&prop_reachable);

        let _rewrite: HashMap<StringHeapOffset, StringHeapOffset> = self.strings.compact(&live_strings);
        // Compaction only ever shrinks live string-heap entries to a denser
        // prefix; since our `Value`s store *offsets* the caller (the Engine,
        // which owns every live `Value`) must rewrite them using `_rewrite`.
        // The engine-level `Engine::collect_garbage` wrapper performs that walk
        // immediately after calling this method (see engine.rs).
        self.last_rewrite = _rewrite;

        if full {
            self.objects.release_unused_capacity();
            self.functions.release_unused_capacity();
            self.properties.release_unused_capacity();
        }
    }

    fn mark_value(
        &self,
        v: Value,
        obj_reachable: &mut [bool],
        func_reachable: &mut [bool],
        prop_reachable: &mut [bool],
        live_strings: &mut Vec<StringHeapOffset>,
        work_list: &mut Vec<Value>,
    ) {
        if let Some(StringRepr::Heap(offset)) = v.string_repr() {
            live_strings.push(offset);
            return;
        }
        if let Some(id) = v.as_object_id() {
            if obj_reachable[id.index()] {
                return;
            }
            obj_reachable[id.index()] = true;
            let cell = self.object(id);
            work_list.push(cell.prototype);
            match &cell.kind {
                ObjectKind::Plain | ObjectKind::RegExp { .. } => {}
                ObjectKind::Array(elements) => work_list.extend(elements.iter().copied()),
                ObjectKind::Activation { parent, this_value, arguments } => {
                    work_list.push(*this_value);
                    if let Some(p) = parent {
                        work_list.push(Value::object(*p));
                    }
                    if let Some(a) = arguments {
                        work_list.push(Value::object(*a));
                    }
                }
            }
            let mut next = cell.first_prop;
            while let Some(pid) = next {
                if prop_reachable[pid.index()] {
                    break;
                }
                prop_reachable[pid.index()] = true;
                let prop = self.property(pid);
                work_list.push(prop.name);
                work_list.push(prop.value);
                next = prop.next;
            }
            return;
        }
        if let Some(id) = v.as_function_id() {
            if func_reachable[id.index()] {
                return;
            }
            func_reachable[id.index()] = true;
            let cell = self.function(id);
            if let Some(scope) = cell.body.captured_scope() {
                work_list.push(Value::object(scope));
            }
            if let Some(proto) = cell.ctor_prototype {
                work_list.push(Value::object(proto));
            }
        }
    }

    pub(crate) fn rewrite_after_compact(&self, v: Value) -> Value {
        if let Some(StringRepr::Heap(offset)) = v.string_repr() {
            if let Some(&new_offset) = self.last_rewrite.get(&offset) {
                return Value::string_heap(new_offset);
            }
        }
        v
    }

    // --- observability (`heap_stat`, §6) --------------------------------------

    pub(crate) fn stat(&self, what: HeapStatKind) -> i64 {
        match what {
            HeapStatKind::HeapSize => (self.objects.len() + self.functions.len() + self.properties.len()) as i64,
            HeapStatKind::HeapUsed => {
                (self.objects.len() - self.objects.free_count() + self.functions.len() - self.functions.free_count()
                    + self.properties.len()
                    - self.properties.free_count()) as i64
            }
            HeapStatKind::StringHeapReserved => self.strings.reserved() as i64,
            HeapStatKind::StringHeapUsed => self.strings.used() as i64,
            HeapStatKind::ObjHeapMax => self.objects.cap as i64,
            HeapStatKind::ObjHeapFree => self.objects.free_count() as i64,
            HeapStatKind::ObjHeapCellSize => std::mem::size_of::<ObjectCell>() as i64,
            HeapStatKind::FuncHeapMax => self.functions.cap as i64,
            HeapStatKind::FuncHeapFree => self.functions.free_count() as i64,
            HeapStatKind::FuncHeapCellSize => std::mem::size_of::<FunctionCell>() as i64,
            HeapStatKind::PropHeapMax => self.properties.cap as i64,
            HeapStatKind::PropHeapFree => self.properties.free_count() as i64,
            HeapStatKind::PropHeapCellSize => std::mem::size_of::<PropertyCell>() as i64,
            HeapStatKind::FuncAstSize => self
                .functions
                .cells
                .iter()
                .flatten()
                .map(FunctionCell::ast_size)
                .sum::<usize>() as i64,
            HeapStatKind::FuncOwned => (self.functions.len() - self.functions.free_count()) as i64,
            HeapStatKind::FuncOwnedMax => self.func_owned_max as i64,
        }
    }
}

// A tiny thread-local scratch buffer backing `Heap::string_bytes` for the
// inline-string case, where there is no arena slot to borrow from. Sized for
// one inline string at a time; each call overwrites the previous contents,
// matching the documented "valid until the next allocating call" contract
// of `v7_to_string` (§4.1).
fn thread_local_scratch(s: &str) -> &'static str {
    thread_local! {
        static SCRATCH: std::cell::RefCell<String> = const { std::cell::RefCell::new(String::new()) };
    }
    SCRATCH.with(|cell| {
        let mut buf = cell.borrow_mut();
        buf.clear();
        buf.push_str(s);
        // SAFETY: the buffer is thread-local and outlives the 'static borrow for
        // as long as the thread runs; callers must treat the slice as valid only
        // until the next call into the engine, per the documented contract.
        unsafe { std::mem::transmute::<&str, &'static str>(buf.as_str()) }
    })
}

impl std::fmt::Debug for Heap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heap")
            .field("objects", &self.objects.len())
            .field("functions", &self.functions.len())
            .field("properties", &self.properties.len())
            .field("string_heap_used", &self.strings.used())
            .finish()
    }
}
