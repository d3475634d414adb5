//! The embedding surface (§4.5, §6): the `Engine` handle every host-facing
//! operation hangs off of.
//!
//! Mirrors the teacher's split between an internal `Interpreter`/`Session`
//! state struct and a thin public API wrapping it — here collapsed into one
//! `Engine` type since this crate has no snapshot/session layer to keep
//! separate from raw interpreter state.

use std::io::Write;
use std::path::Path;
use std::rc::Rc;

use crate::ast::{Ast, AstTooLarge, OffsetWidth};
use crate::exception::{ErrorKind, Exception, ParseError, RunError, RunResult, Status};
use crate::function::{CFunctionPtr, FunctionCell};
use crate::heap::{Heap, HeapCapacities, HeapStatKind, ObjectId};
use crate::io::{NoPrint, PrintWriter};
use crate::object::{ObjectCell, PropAttrs};
use crate::resource::{CallDepthGuard, InterruptFlag, DEFAULT_MAX_RECURSION_DEPTH};
use crate::tracer::{EngineTracer, GcReason, NoopTracer, TraceEvent};
use crate::value::Value;

/// The Rust analogue of `struct v7_create_opts` (§10.4): arena sizing plus an
/// optional C-stack guard base address. `Default` matches the teacher's
/// pattern of a `Default`-derived options struct with documented constants.
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub object_arena_cap: usize,
    pub function_arena_cap: usize,
    pub property_arena_cap: usize,
    pub string_heap_high_water_mark: usize,
    pub max_recursion_depth: u32,
    /// When set, `stack_base - <current frame address>` bounds the
    /// interpreter's native recursion in addition to `max_recursion_depth`
    /// (§4.1 "Resource limits", §5 "C-stack guard"). `None` disables the
    /// native-stack check and relies solely on the depth counter.
    pub stack_base: Option<usize>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        let caps = HeapCapacities::default();
        Self {
            object_arena_cap: caps.object_arena_cap,
            function_arena_cap: caps.function_arena_cap,
            property_arena_cap: caps.property_arena_cap,
            string_heap_high_water_mark: caps.string_heap_high_water_mark,
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
            stack_base: None,
        }
    }
}

impl EngineOptions {
    fn heap_capacities(&self) -> HeapCapacities {
        HeapCapacities {
            object_arena_cap: self.object_arena_cap,
            function_arena_cap: self.function_arena_cap,
            property_arena_cap: self.property_arena_cap,
            string_heap_high_water_mark: self.string_heap_high_water_mark,
        }
    }
}

/// The engine-wide mutable state every operation in §6 acts on: the managed
/// heap, the global object, the resource guards, and the pluggable
/// tracer/print-writer (§10.3).
pub struct Engine {
    pub(crate) heap: Heap,
    pub(crate) global: ObjectId,
    pub(crate) depth_guard: CallDepthGuard,
    pub(crate) interrupts: InterruptFlag,
    pub(crate) last_expr_value: Option<Value>,
    pub(crate) pending_error_kind: Option<ErrorKind>,
    ast_width: OffsetWidth,
    stack_base: Option<usize>,
    tracer: Box<dyn EngineTracer>,
    print_writer: Box<dyn PrintWriter>,
    parser_error: Option<ParseError>,
    /// Rendering of the most recent thrown value, kept alive past the
    /// `ExecException` return so `last_exception` can describe it after the
    /// v-word itself may have been reclaimed by a later GC (§7 "Stack traces").
    last_exception: Option<Exception>,
}

impl Engine {
    /// `v7_create()` (§6): default arena sizes, `NoopTracer`, no print sink.
    #[must_use]
    pub fn create() -> Self {
        Self::create_opt(EngineOptions::default())
    }

    /// `v7_create_opt()` (§6).
    #[must_use]
    pub fn create_opt(opts: EngineOptions) -> Self {
        let mut heap = Heap::new(opts.heap_capacities());
        let global = crate::namespace::create_global(&mut heap).expect("global object allocation cannot fail on a fresh heap");
        Self {
            heap,
            global,
            depth_guard: CallDepthGuard::new(opts.max_recursion_depth),
            interrupts: InterruptFlag::new(),
            last_expr_value: None,
            pending_error_kind: None,
            ast_width: OffsetWidth::Narrow,
            stack_base: opts.stack_base,
            tracer: Box::new(NoopTracer),
            print_writer: Box::new(NoPrint),
            parser_error: None,
            last_exception: None,
        }
    }

    /// `v7_destroy()` (§6). Consumes the handle; releasing the arenas, the
    /// string heap, and the global object is then ordinary `Drop`. Kept as an
    /// explicit method so the embedding surface names the same lifecycle step
    /// the spec does, even though nothing beyond `drop` is required here.
    pub fn destroy(self) {}

    /// Installs the tracer invoked at call entry/exit and GC phase boundaries
    /// (§10.3). Replaces whatever tracer was previously installed.
    pub fn set_tracer(&mut self, tracer: impl EngineTracer + 'static) {
        self.tracer = Box::new(tracer);
    }

    /// Installs the sink `print`/`println` write to (§6 "Observability").
    pub fn set_print_writer(&mut self, writer: impl PrintWriter + 'static) {
        self.print_writer = Box::new(writer);
    }

    // --- execution (§6 "Execution") ---------------------------------------

    /// `execute(engine, src, &result)`.
    pub fn execute(&mut self, src: &str) -> (Status, Value) {
        self.execute_with(src, Value::undefined())
    }

    /// `execute_with(engine, src, this, &result)`: runs `src` as a program
    /// whose top-level `this` is `this_value` instead of `undefined`.
    pub fn execute_with(&mut self, src: &str, this_value: Value) -> (Status, Value) {
        let ast = match crate::parse::parse_program(src, self.ast_width) {
            Ok(ast) => ast,
            Err(e) => {
                self.parser_error = Some(e);
                return (Status::SyntaxError, Value::undefined());
            }
        };
        self.run_parsed(&ast, this_value)
    }

    /// `execute_file(engine, path, &result)`. File I/O is a thin
    /// pass-through; the spec places `v7_exec_file`'s own buffering out of
    /// scope (§1, §10.6) so this just reads the whole file and delegates.
    pub fn execute_file(&mut self, path: &Path) -> (Status, Value) {
        match std::fs::read_to_string(path) {
            Ok(src) => self.execute(&src),
            Err(e) => {
                self.parser_error = Some(ParseError { line: 0, column: 0, message: format!("cannot read {}: {e}", path.display()) });
                (Status::SyntaxError, Value::undefined())
            }
        }
    }

    /// `parse_json(engine, src, &result)`.
    pub fn parse_json(&mut self, src: &str) -> (Status, Value) {
        match crate::json::parse_json(self, src) {
            Ok(v) => (Status::Ok, v),
            Err(msg) => {
                self.parser_error = Some(ParseError { line: 0, column: 0, message: msg });
                (Status::SyntaxError, Value::undefined())
            }
        }
    }

    /// `apply(engine, &result?, func, this, args_value)`. `args_value` must
    /// be `undefined` or an array; per §8, `apply` with `args = undefined`
    /// behaves identically to `args = []`.
    pub fn apply(&mut self, func: Value, this: Value, args_value: Value) -> (Status, Value) {
        let args: Vec<Value> = if args_value.is_undefined() {
            Vec::new()
        } else if let Some(obj) = args_value.as_object_id() {
            match &self.heap.object(obj).kind {
                crate::object::ObjectKind::Array(elements) => elements.clone(),
                _ => return (Status::InvalidArg, Value::undefined()),
            }
        } else {
            return (Status::InvalidArg, Value::undefined());
        };
        match self.call_value(func, this, &args) {
            Ok(v) => (Status::Ok, v),
            Err(e) => self.finish_err(e),
        }
    }

    /// `compile(src, binary_flag, stream)`: emits the human-readable or
    /// binary AST dump (§6 "AST binary format") without executing anything.
    pub fn compile(src: &str, binary: bool, out: &mut impl Write) -> Status {
        let ast = match crate::parse::parse_program(src, OffsetWidth::Narrow) {
            Ok(ast) => ast,
            Err(_) => return Status::SyntaxError,
        };
        let result = if binary { crate::ast_dump::write_binary(&ast, out) } else { crate::ast_dump::write_text(&ast, out) };
        match result {
            Ok(()) => Status::Ok,
            Err(AstTooLarge) => Status::AstTooLarge,
        }
    }

    fn run_parsed(&mut self, ast: &Rc<Ast>, this_value: Value) -> (Status, Value) {
        let top_scope = match crate::namespace::create_activation(&mut self.heap, Some(self.global), this_value) {
            Ok(s) => s,
            Err(_) => return (Status::ExecException, self.out_of_memory_error()),
        };
        if let Err(e) = self.hoist_top_level(ast, top_scope) {
            return self.finish_err(e);
        }
        match self.run_program(ast, top_scope) {
            Ok(v) => (Status::Ok, v),
            Err(e) => self.finish_err(e),
        }
    }

    /// Hoists top-level `var`/`function` declarations the same way a
    /// function body's are hoisted, reusing the interpreter's block-walking
    /// helper via a throwaway one-node wrapper: a program's statement list
    /// and a function's body block are hoisted identically (§4.1 "Declarations").
    fn hoist_top_level(&mut self, ast: &Rc<Ast>, scope: ObjectId) -> Result<(), RunError> {
        self.hoist_in_block(ast, ast.root(), scope)
    }

    fn finish_err(&mut self, e: RunError) -> (Status, Value) {
        match e {
            RunError::Thrown(v) => {
                let message = crate::coerce::to_string_value(&self.heap, v);
                self.last_exception = Some(Exception { message, kind: self.pending_error_kind.take() });
                (Status::ExecException, v)
            }
            RunError::Uncatchable(crate::exception::EngineFault::StackOverflow) => {
                let v = self.intern_string_pub("stack overflow: call depth exceeded");
                self.last_exception = Some(Exception { message: "stack overflow".into(), kind: None });
                (Status::StackOverflow, v)
            }
            RunError::Uncatchable(crate::exception::EngineFault::Interrupted) => {
                let v = self.intern_string_pub("execution was interrupted");
                self.last_exception = Some(Exception { message: "interrupted".into(), kind: None });
                (Status::ExecException, v)
            }
            RunError::Uncatchable(crate::exception::EngineFault::OutOfMemory) => (Status::ExecException, self.out_of_memory_error()),
        }
    }

    fn out_of_memory_error(&mut self) -> Value {
        self.last_exception = Some(Exception { message: "out of memory".into(), kind: Some(ErrorKind::InternalError) });
        self.intern_string_pub("out of memory")
    }

    fn intern_string_pub(&mut self, s: &str) -> Value {
        match Value::string_inline(s) {
            Some(v) => v,
            None => Value::string_heap(self.heap.alloc_string_heap(s)),
        }
    }

    /// The message/kind of the most recently finished `ExecException`, if
    /// any (§7 "Stack traces" — the classification the thrown `Value` itself
    /// doesn't carry).
    #[must_use]
    pub fn last_exception(&self) -> Option<&Exception> {
        self.last_exception.as_ref()
    }

    /// The parser-error buffer populated by a `SyntaxError` status (§7:
    /// "parser errors never enter the exception slot").
    #[must_use]
    pub fn get_parser_error(&self) -> Option<&ParseError> {
        self.parser_error.as_ref()
    }

    // --- value construction (§6 "Value construction") ----------------------

    #[must_use]
    pub fn create_object(&mut self) -> Value {
        let id = self.heap.alloc_object(ObjectCell::plain(Value::null())).expect("object arena exhaustion is handled by collect_garbage before this point");
        Value::object(id)
    }

    #[must_use]
    pub fn create_array(&mut self) -> Value {
        self.new_array(Vec::new()).expect("array allocation cannot fail on a freshly collected heap")
    }

    /// `create_function(fn, nargs)`: a heap-allocated `Function` value
    /// wrapping a bare host callback with a declared arity, so it can also
    /// carry a `.prototype`/`.name`/property chain like a script function.
    #[must_use]
    pub fn create_function(&mut self, f: CFunctionPtr, nargs: i32) -> Value {
        let cell = FunctionCell::host(cfunction_ptr_to_bits(f), nargs);
        let id = self.heap.alloc_function(cell).expect("function arena exhaustion is handled by collect_garbage before this point");
        Value::function(id)
    }

    /// `create_cfunction(fn)`: the bare pointer tag, no heap cell, no arity —
    /// matching the narrower `v7_cfunction_t` case (§10.6).
    #[must_use]
    pub fn create_cfunction(&self, f: CFunctionPtr) -> Value {
        Value::cfunction_ptr_bits(cfunction_ptr_to_bits(f))
    }

    /// `create_constructor(proto, fn, nargs)`: like `create_function`, but
    /// installs `proto` as the function's `.prototype`, the object `new`
    /// instances inherit from.
    #[must_use]
    pub fn create_constructor(&mut self, proto: Value, f: CFunctionPtr, nargs: i32) -> Value {
        let mut cell = FunctionCell::host(cfunction_ptr_to_bits(f), nargs);
        cell.ctor_prototype = proto.as_object_id();
        let id = self.heap.alloc_function(cell).expect("function arena exhaustion is handled by collect_garbage before this point");
        Value::function(id)
    }

    #[must_use]
    pub fn create_number(&self, d: f64) -> Value {
        Value::number(d)
    }

    #[must_use]
    pub fn create_boolean(&self, b: bool) -> Value {
        Value::boolean(b)
    }

    #[must_use]
    pub fn create_null(&self) -> Value {
        Value::null()
    }

    #[must_use]
    pub fn create_undefined(&self) -> Value {
        Value::undefined()
    }

    /// `create_string(bytes, len, copy_flag)`. `len = None` is the
    /// `usize::MAX` sentinel preserved as [`StringLen::All`] (§10.6): use the
    /// whole slice. `copy_flag = false` aliases the caller's bytes for the
    /// returned value's lifetime instead of copying into the string heap —
    /// see the safety contract below.
    ///
    /// # Safety
    /// When `copy = false`, `bytes` must remain valid and unmodified for as
    /// long as any `Value` produced by this call (or a copy of it) is live.
    #[must_use]
    pub unsafe fn create_string(&mut self, bytes: &[u8], len: StringLen, copy: bool) -> Value {
        let len = match len {
            StringLen::All => bytes.len(),
            StringLen::Exact(n) => n,
        };
        let slice = &bytes[..len];
        if !copy {
            let id = unsafe { self.heap.alloc_foreign_string(slice.as_ptr(), slice.len()) };
            return Value::string_foreign(id);
        }
        let s = std::str::from_utf8(slice).unwrap_or("\u{FFFD}");
        self.intern_string_pub(s)
    }

    /// `create_regexp(pattern, flags)`: opaque storage only (§1 Non-goals —
    /// no execution engine). `.source`/`.flags` and `typeof` work; matching
    /// does not.
    #[must_use]
    pub fn create_regexp(&mut self, pattern: &str, flags: &str) -> Value {
        crate::regexp::create(self, pattern, flags)
    }

    /// `create_foreign(ptr)`: an opaque host pointer, never dereferenced by
    /// the engine.
    ///
    /// # Safety
    /// `ptr` need not point at anything the engine understands, but the host
    /// must not rely on the engine freeing or validating it.
    #[must_use]
    pub unsafe fn create_foreign(&mut self, ptr: *mut std::ffi::c_void) -> Value {
        Value::foreign(self.heap.alloc_foreign_ptr(ptr))
    }

    // --- value inspection (§6 "Value inspection") ---------------------------

    #[must_use]
    pub fn is_array(&self, v: Value) -> bool {
        v.as_object_id().is_some_and(|id| self.heap.object(id).is_array())
    }

    #[must_use]
    pub fn is_regexp(&self, v: Value) -> bool {
        v.as_object_id().is_some_and(|id| matches!(self.heap.object(id).kind, crate::object::ObjectKind::RegExp { .. }))
    }

    #[must_use]
    pub fn is_foreign(&self, v: Value) -> bool {
        v.is_foreign()
    }

    /// `is_instanceof(obj, ctor_name|ctor_val)` (§10.6): the constructor may
    /// be named (looked up as a global) or supplied directly.
    pub fn is_instanceof(&mut self, v: Value, target: InstanceofTarget<'_>) -> RunResultPub<bool> {
        let ctor = match target {
            InstanceofTarget::Ctor(c) => c,
            InstanceofTarget::Name(name) => match crate::namespace::resolve(&self.heap, self.global, name) {
                Some(owner) => crate::object::get_property(&self.heap, owner, name).unwrap_or(Value::undefined()),
                None => return Err(Exception { message: format!("{name} is not defined"), kind: Some(ErrorKind::ReferenceError) }),
            },
        };
        match self.apply_binary_op_pub("instanceof", v, ctor) {
            Ok(result) => Ok(result.is_true()),
            Err(e) => Err(self.run_error_to_exception(e)),
        }
    }

    #[must_use]
    pub fn to_foreign(&self, v: Value) -> Option<*mut std::ffi::c_void> {
        v.as_foreign_id().map(|id| self.heap.foreign_ptr(id))
    }

    #[must_use]
    pub fn to_boolean(&self, v: Value) -> bool {
        crate::coerce::to_boolean(&self.heap, v)
    }

    #[must_use]
    pub fn to_number(&self, v: Value) -> f64 {
        crate::coerce::to_number(&self.heap, v)
    }

    #[must_use]
    pub fn to_cfunction(&self, v: Value) -> Option<CFunctionPtr> {
        v.as_cfunction_ptr_bits().map(bits_to_cfunction_ptr)
    }

    #[must_use]
    pub fn to_string_lossy(&self, v: Value) -> String {
        crate::coerce::to_string_value(&self.heap, v)
    }

    /// `to_json(v, buf, buflen)`. The caller-supplied-buffer half of the
    /// contract collapses to an owned `String` on the Rust side: there is no
    /// reason to reach for a raw buffer when the caller already owns
    /// whatever they do with the returned `String`.
    pub fn to_json(&self, v: Value) -> Result<String, Exception> {
        crate::json::to_json(self, v).map_err(|msg| Exception { message: msg, kind: Some(ErrorKind::TypeError) })
    }

    // --- property access (§6 "Property access") -----------------------------

    #[must_use]
    pub fn get(&mut self, obj: Value, name: &str) -> Value {
        match obj.as_object_id() {
            Some(id) if self.heap.object(id).is_array() && name == "length" => {
                let crate::object::ObjectKind::Array(elements) = &self.heap.object(id).kind else { unreachable!() };
                Value::number(elements.len() as f64)
            }
            Some(id) => crate::object::get_property(&self.heap, id, name).unwrap_or(Value::undefined()),
            None => Value::undefined(),
        }
    }

    pub fn set(&mut self, obj: Value, name: &str, attrs: PropAttrs, value: Value) -> Result<(), Exception> {
        let Some(id) = obj.as_object_id() else {
            return Err(Exception { message: "set() target is not an object".into(), kind: Some(ErrorKind::TypeError) });
        };
        let name_value = self.intern_string_pub(name);
        if attrs.is_empty() {
            crate::object::set_own_property(&mut self.heap, id, name_value, value).map_err(|_| self.oom_exception())
        } else {
            crate::object::define_property(&mut self.heap, id, name_value, value, attrs).map(|_| ()).map_err(|_| self.oom_exception())
        }
    }

    /// `set_method(obj, name, fn)`: installs a bare host callback as a
    /// non-enumerable own property, the common case of `set` for builtins.
    pub fn set_method(&mut self, obj: Value, name: &str, f: CFunctionPtr) -> Result<(), Exception> {
        let func = self.create_cfunction(f);
        self.set(obj, name, PropAttrs::DONT_ENUM, func)
    }

    #[must_use]
    pub fn array_length(&self, arr: Value) -> usize {
        match arr.as_object_id().map(|id| &self.heap.object(id).kind) {
            Some(crate::object::ObjectKind::Array(elements)) => elements.len(),
            _ => 0,
        }
    }

    pub fn array_set(&mut self, arr: Value, index: usize, value: Value) -> Result<(), Exception> {
        let Some(id) = arr.as_object_id() else {
            return Err(Exception { message: "array_set target is not an object".into(), kind: Some(ErrorKind::TypeError) });
        };
        let crate::object::ObjectKind::Array(elements) = &mut self.heap.object_mut(id).kind else {
            return Err(Exception { message: "array_set target is not an array".into(), kind: Some(ErrorKind::TypeError) });
        };
        if index >= elements.len() {
            elements.resize(index + 1, Value::undefined());
        }
        elements[index] = value;
        Ok(())
    }

    pub fn array_push(&mut self, arr: Value, value: Value) -> Result<(), Exception> {
        let Some(id) = arr.as_object_id() else {
            return Err(Exception { message: "array_push target is not an object".into(), kind: Some(ErrorKind::TypeError) });
        };
        let crate::object::ObjectKind::Array(elements) = &mut self.heap.object_mut(id).kind else {
            return Err(Exception { message: "array_push target is not an array".into(), kind: Some(ErrorKind::TypeError) });
        };
        elements.push(value);
        Ok(())
    }

    #[must_use]
    pub fn array_get(&self, arr: Value, index: usize) -> Value {
        match arr.as_object_id().map(|id| &self.heap.object(id).kind) {
            Some(crate::object::ObjectKind::Array(elements)) => elements.get(index).copied().unwrap_or(Value::undefined()),
            _ => Value::undefined(),
        }
    }

    /// `set_proto(obj, proto)` → old prototype. Rejects a prototype whose
    /// chain already reaches `obj` (§8 "Prototype chain traversal terminates").
    pub fn set_proto(&mut self, obj: Value, proto: Value) -> Result<Value, Exception> {
        let Some(id) = obj.as_object_id() else {
            return Err(Exception { message: "set_proto target is not an object".into(), kind: Some(ErrorKind::TypeError) });
        };
        if let Some(proto_id) = proto.as_object_id() {
            let mut cur = Some(proto_id);
            while let Some(p) = cur {
                if p == id {
                    return Err(Exception { message: "prototype chain would cycle".into(), kind: Some(ErrorKind::TypeError) });
                }
                cur = self.heap.object(p).prototype.as_object_id();
            }
        }
        let old = self.heap.object(id).prototype;
        self.heap.object_mut(id).prototype = proto;
        Ok(old)
    }

    // --- exception raising (§6 "Exception raising") -------------------------

    /// `throw(fmt, ...)`: constructs a string-valued error and throws it.
    /// Returned so host-implemented `CFunctionPtr`s can propagate it with `?`.
    pub fn throw(&mut self, message: impl Into<String>) -> RunError {
        let message = message.into();
        let v = self.intern_string_pub(&message);
        self.pending_error_kind = Some(ErrorKind::InternalError);
        RunError::Thrown(v)
    }

    /// `throw_value(v)`: rethrows an existing value without augmenting its
    /// stack trace (§7).
    pub fn throw_value(&self, v: Value) -> RunError {
        RunError::Thrown(v)
    }

    // --- root registration (§6 "Root registration") -------------------------

    /// `own(&v)`: pins `v` as a GC root until a matching [`Self::disown`].
    ///
    /// # Safety
    /// `v` must remain valid and point at a live `Value` until disowned.
    pub unsafe fn own(&mut self, v: *mut Value) {
        self.heap.own(v);
    }

    /// `disown(&v)` → `true` iff a prior `own` registered this exact address
    /// and no intervening `disown` already removed it (§8).
    pub fn disown(&mut self, v: *mut Value) -> bool {
        self.heap.disown(v)
    }

    // --- observability (§6 "Observability") ---------------------------------

    pub fn print(&mut self, v: Value) {
        let s = self.to_string_lossy(v);
        self.print_writer.print(&s);
    }

    pub fn println(&mut self, v: Value) {
        let s = self.to_string_lossy(v);
        self.print_writer.println(&s);
    }

    pub fn fprint(&self, stream: &mut impl Write, v: Value) -> std::io::Result<()> {
        write!(stream, "{}", self.to_string_lossy(v))
    }

    pub fn fprintln(&self, stream: &mut impl Write, v: Value) -> std::io::Result<()> {
        writeln!(stream, "{}", self.to_string_lossy(v))
    }

    /// `fprint_stack_trace(stream, err)`. This engine does not capture a
    /// per-frame trace today (see `DESIGN.md`); it prints the error's
    /// rendered message, matching what a trace-less build of the original
    /// source falls back to.
    pub fn fprint_stack_trace(&self, stream: &mut impl Write, err: &Exception) -> std::io::Result<()> {
        writeln!(stream, "{err}")
    }

    pub fn print_error(&self, stream: &mut impl Write, ctx: &str, err: &Exception) -> std::io::Result<()> {
        writeln!(stream, "{ctx}: {err}")
    }

    #[must_use]
    pub fn heap_stat(&self, what: HeapStatKind) -> i64 {
        self.heap.stat(what)
    }

    /// `get_global(engine)`: the stable root scope object (§4.5).
    #[must_use]
    pub fn get_global(&self) -> Value {
        Value::object(self.global)
    }

    /// `interrupt()` (§5 "Cancellation"): sets the cooperative flag the
    /// running interpreter observes at the next statement boundary or loop
    /// back-edge.
    pub fn interrupt(&self) {
        self.interrupts.request_interrupt();
    }

    /// Runs mark/sweep/compact rooted at the global object plus every
    /// `own`ed pointer, then rewrites every live `Value` this `Engine` itself
    /// holds so string-heap offsets shifted by compaction stay correct
    /// (§4.2; `Heap::collect_garbage`'s own doc comment explains why this
    /// rewrite can't happen inside `Heap` itself).
    pub fn collect_garbage(&mut self, full: bool) {
        self.tracer.trace(TraceEvent::GcStart { reason: GcReason::Explicit });
        let before = (self.heap_stat(HeapStatKind::ObjHeapFree), self.heap_stat(HeapStatKind::FuncHeapFree), self.heap_stat(HeapStatKind::PropHeapFree));
        self.heap.collect_garbage([Value::object(self.global)], full);
        self.last_expr_value = self.last_expr_value.map(|v| self.heap.rewrite_after_compact(v));
        let after = (self.heap_stat(HeapStatKind::ObjHeapFree), self.heap_stat(HeapStatKind::FuncHeapFree), self.heap_stat(HeapStatKind::PropHeapFree));
        self.tracer.trace(TraceEvent::GcEnd {
            objects_reclaimed: (after.0 - before.0).max(0) as usize,
            functions_reclaimed: (after.1 - before.1).max(0) as usize,
            properties_reclaimed: (after.2 - before.2).max(0) as usize,
        });
    }

    /// Checks the three arena caps and the string-heap high-water mark,
    /// collecting (and, on repeated exhaustion, growing the arenas) before
    /// the next allocation would otherwise fail — called from the
    /// interpreter's own allocation sites via `maybe_collect`.
    pub(crate) fn maybe_collect(&mut self) {
        if !self.heap.needs_collection() {
            return;
        }
        self.collect_garbage(false);
        if self.heap.needs_collection() {
            self.heap.grow_all_arenas();
        }
    }

    pub(crate) fn call_depth(&self) -> u32 {
        self.depth_guard.depth()
    }

    pub(crate) fn trace_call_enter(&mut self, function_name: Option<&str>) {
        let depth = self.call_depth();
        self.tracer.trace(TraceEvent::CallEnter { function_name, depth });
    }

    pub(crate) fn trace_call_exit(&mut self, function_name: Option<&str>) {
        let depth = self.call_depth();
        self.tracer.trace(TraceEvent::CallExit { function_name, depth });
    }

    pub(crate) fn trace_exception(&mut self, message: &str) {
        self.tracer.trace(TraceEvent::ExceptionThrown { message });
    }

    /// Remaining native stack headroom, if a `stack_base` was configured
    /// (§5 "C-stack guard"). Measured from the address of a local in the
    /// current frame, matching the teacher's own `remaining_stack` probe.
    pub(crate) fn stack_headroom(&self) -> Option<isize> {
        let base = self.stack_base?;
        let probe = 0u8;
        let here = std::ptr::addr_of!(probe) as usize;
        Some(base as isize - here as isize)
    }

    fn run_error_to_exception(&self, e: RunError) -> Exception {
        match e {
            RunError::Thrown(v) => Exception { message: crate::coerce::to_string_value(&self.heap, v), kind: None },
            RunError::Uncatchable(fault) => Exception { message: fault.to_string(), kind: None },
        }
    }

    fn oom_exception(&self) -> Exception {
        Exception { message: "out of memory".into(), kind: Some(ErrorKind::InternalError) }
    }

    // Narrow internal bridges used by `is_instanceof`'s public wrapper so it
    // can reuse the interpreter's own `instanceof` evaluation without
    // exposing `apply_binary_op` itself.
    fn apply_binary_op_pub(&mut self, op: &str, a: Value, b: Value) -> RunResult<Value> {
        self.apply_binary_op(op, a, b)
    }
}

/// Surfaced to host code that calls `is_instanceof` directly rather than
/// through `execute`, where a string message reads more naturally than a
/// raw thrown `Value`.
pub type RunResultPub<T> = Result<T, Exception>;

/// `v7_create_string`'s `len == usize::MAX` sentinel, preserved verbatim
/// (§10.6): `All` means "use the whole slice" since Rust strings carry their
/// own length and are never NUL-terminated.
#[derive(Debug, Clone, Copy)]
pub enum StringLen {
    All,
    Exact(usize),
}

/// `v7_is_instanceof`'s two call shapes (§10.6): a constructor named by a
/// global binding, or a constructor value the host already holds.
#[derive(Debug, Clone, Copy)]
pub enum InstanceofTarget<'a> {
    Name(&'a str),
    Ctor(Value),
}

/// Converts a typed host-function pointer to the raw bits `Value` stores.
/// Kept here, next to [`CFunctionPtr`]'s type alias declaration site, per
/// `value.rs`'s module contract — `value.rs` itself stays type-agnostic.
pub(crate) fn cfunction_ptr_to_bits(f: CFunctionPtr) -> u64 {
    f as usize as u64
}

pub(crate) fn bits_to_cfunction_ptr(bits: u64) -> CFunctionPtr {
    // SAFETY: `bits` only ever originates from `cfunction_ptr_to_bits`, which
    // round-trips a `CFunctionPtr` through its address; no other producer of
    // `Tag::CFunctionPtr`/`Tag::Function(Host)` payloads exists.
    unsafe { std::mem::transmute::<usize, CFunctionPtr>(bits as usize) }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").field("call_depth", &self.depth_guard.depth()).field("global", &self.global).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_execute_arithmetic() {
        let mut engine = Engine::create();
        let (status, result) = engine.execute("1+2*3");
        assert_eq!(status, Status::Ok);
        assert_eq!(engine.to_number(result), 7.0);
    }

    #[test]
    fn thrown_string_becomes_exec_exception() {
        let mut engine = Engine::create();
        let (status, result) = engine.execute("throw 'boom'");
        assert_eq!(status, Status::ExecException);
        assert_eq!(engine.to_string_lossy(result), "boom");
    }

    #[test]
    fn array_map_then_join_round_trips_through_the_seed_methods() {
        let mut engine = Engine::create();
        let (status, result) = engine.execute("var a=[1,2,3]; a.map(function(x){return x*x;}).join(',')");
        assert_eq!(status, Status::Ok);
        assert_eq!(engine.to_string_lossy(result), "1,4,9");
    }

    #[test]
    fn get_global_exposes_bindings_added_by_set() {
        let mut engine = Engine::create();
        let global = engine.get_global();
        let v = engine.create_number(42.0);
        engine.set(global, "answer", PropAttrs::empty(), v).unwrap();
        let (status, result) = engine.execute("answer");
        assert_eq!(status, Status::Ok);
        assert_eq!(engine.to_number(result), 42.0);
    }

    #[test]
    fn set_proto_rejects_a_cycle() {
        let mut engine = Engine::create();
        let a = engine.create_object();
        let b = engine.create_object();
        engine.set_proto(b, a).unwrap();
        assert!(engine.set_proto(a, b).is_err());
    }

    #[test]
    fn own_disown_is_stack_disciplined() {
        let mut engine = Engine::create();
        let mut v = Value::number(1.0);
        unsafe { engine.own(&mut v) };
        assert!(engine.disown(&mut v));
        assert!(!engine.disown(&mut v));
    }
}
