//! Host callback and value-construction surface (§6 "Value construction",
//! "Exception raising").

use pretty_assertions::assert_eq;
use tinyscript::{CFunctionPtr, Engine, PropAttrs, RunResult, Status, Value};

fn double(engine: &mut Engine, _this: Value, args: &[Value]) -> RunResult<Value> {
    let n = engine.to_number(args.first().copied().unwrap_or(Value::undefined()));
    Ok(engine.create_number(n * 2.0))
}

fn always_throws(engine: &mut Engine, _this: Value, _args: &[Value]) -> RunResult<Value> {
    Err(engine.throw("always_throws was called"))
}

const DOUBLE: CFunctionPtr = double;
const ALWAYS_THROWS: CFunctionPtr = always_throws;

#[test]
fn set_method_installs_a_callable_host_function() {
    let mut engine = Engine::create();
    let global = engine.get_global();
    engine.set_method(global, "double", DOUBLE).unwrap();
    let (status, result) = engine.execute("double(21)");
    assert_eq!(status, Status::Ok);
    assert_eq!(engine.to_number(result), 42.0);
}

#[test]
fn host_function_can_throw_into_script_try_catch() {
    let mut engine = Engine::create();
    let global = engine.get_global();
    engine.set_method(global, "boom", ALWAYS_THROWS).unwrap();
    let (status, result) = engine.execute("var msg; try { boom(); } catch (e) { msg = e; } msg");
    assert_eq!(status, Status::Ok);
    assert_eq!(engine.to_string_lossy(result), "always_throws was called");
}

#[test]
fn create_cfunction_produces_a_bare_callable_without_a_heap_cell() {
    let mut engine = Engine::create();
    let f = engine.create_cfunction(DOUBLE);
    assert!(engine.to_cfunction(f).is_some());
    let args = engine.create_array();
    let five = engine.create_number(5.0);
    engine.array_push(args, five).unwrap();
    let (status, result) = engine.apply(f, Value::undefined(), args);
    assert_eq!(status, Status::Ok);
    assert_eq!(engine.to_number(result), 10.0);
}

#[test]
fn create_constructor_installs_a_prototype_new_instances_inherit() {
    let mut engine = Engine::create();
    let proto = engine.create_object();
    let greet_value = engine.create_number(1.0);
    engine.set(proto, "greet", PropAttrs::empty(), greet_value).unwrap();
    fn noop(engine: &mut Engine, _this: Value, _args: &[Value]) -> RunResult<Value> {
        Ok(engine.create_undefined())
    }
    let ctor = engine.create_constructor(proto, noop, 0);
    let global = engine.get_global();
    engine.set(global, "Widget", PropAttrs::empty(), ctor).unwrap();
    let (status, result) = engine.execute("var w = new Widget(); w.greet");
    assert_eq!(status, Status::Ok);
    assert_eq!(engine.to_number(result), 1.0);
}

#[test]
fn own_disown_round_trips_a_live_root() {
    let mut engine = Engine::create();
    let mut v = engine.create_object();
    unsafe { engine.own(&mut v) };
    engine.collect_garbage(true);
    assert!(v.is_object());
    assert!(engine.disown(&mut v));
}

#[test]
fn foreign_pointer_round_trips_through_create_to_foreign() {
    let mut engine = Engine::create();
    let mut payload = 7u32;
    let ptr = std::ptr::addr_of_mut!(payload).cast::<std::ffi::c_void>();
    let v = unsafe { engine.create_foreign(ptr) };
    assert!(engine.is_foreign(v));
    assert_eq!(engine.to_foreign(v), Some(ptr));
}

#[test]
fn set_proto_returns_the_previous_prototype() {
    let mut engine = Engine::create();
    let a = engine.create_object();
    let b = engine.create_object();
    let old = engine.set_proto(a, b).unwrap();
    assert!(old.is_null());
}

#[test]
fn heap_stat_reports_nonzero_capacity() {
    let engine = Engine::create();
    let max = engine.heap_stat(tinyscript::HeapStatKind::ObjHeapMax);
    assert!(max > 0);
}
