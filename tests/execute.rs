//! End-to-end `execute`/`apply` behavior (§8 "Testable properties").

use pretty_assertions::assert_eq;
use tinyscript::{Engine, PropAttrs, Status};

#[test]
fn arithmetic_respects_precedence() {
    let mut engine = Engine::create();
    let (status, result) = engine.execute("1+2*3");
    assert_eq!(status, Status::Ok);
    assert_eq!(engine.to_number(result), 7.0);
}

#[test]
fn array_map_then_join() {
    let mut engine = Engine::create();
    let (status, result) = engine.execute("var a=[1,2,3]; a.map(function(x){return x*x;}).join(',')");
    assert_eq!(status, Status::Ok);
    assert_eq!(engine.to_string_lossy(result), "1,4,9");
}

#[test]
fn thrown_string_is_reported_as_exec_exception() {
    let mut engine = Engine::create();
    let (status, result) = engine.execute("throw 'boom'");
    assert_eq!(status, Status::ExecException);
    assert_eq!(engine.to_string_lossy(result), "boom");
}

#[test]
fn unbounded_recursion_overflows_the_call_depth_guard() {
    let mut engine = Engine::create();
    let (status, result) = engine.execute("function f(){f();} f();");
    assert_eq!(status, Status::StackOverflow);
    assert!(engine.last_exception().is_some());
    let _ = result;
}

#[test]
fn try_catch_recovers_from_a_thrown_value() {
    let mut engine = Engine::create();
    let (status, result) = engine.execute("var caught; try { throw 'x'; } catch (e) { caught = e; } caught");
    assert_eq!(status, Status::Ok);
    assert_eq!(engine.to_string_lossy(result), "x");
}

#[test]
fn for_loop_accumulates() {
    let mut engine = Engine::create();
    let (status, result) = engine.execute("var sum=0; for (var i=0;i<5;i++) { sum = sum + i; } sum");
    assert_eq!(status, Status::Ok);
    assert_eq!(engine.to_number(result), 10.0);
}

#[test]
fn object_and_member_access() {
    let mut engine = Engine::create();
    let (status, result) = engine.execute("var o = {a: 1, b: {c: 2}}; o.b.c");
    assert_eq!(status, Status::Ok);
    assert_eq!(engine.to_number(result), 2.0);
}

#[test]
fn new_constructs_an_instance_with_this_bound() {
    let mut engine = Engine::create();
    let (status, result) = engine.execute("function Point(x,y){this.x=x;this.y=y;} var p=new Point(3,4); p.x+p.y");
    assert_eq!(status, Status::Ok);
    assert_eq!(engine.to_number(result), 7.0);
}

#[test]
fn execute_with_binds_a_custom_this_value() {
    let mut engine = Engine::create();
    let this_obj = engine.create_object();
    let name_value = engine.create_number(42.0);
    engine.set(this_obj, "name", PropAttrs::empty(), name_value).unwrap();
    let (status, result) = engine.execute_with("this.name", this_obj);
    assert_eq!(status, Status::Ok);
    assert_eq!(engine.to_number(result), 42.0);
}

#[test]
fn apply_invokes_a_script_function_with_explicit_args() {
    let mut engine = Engine::create();
    let (status, _) = engine.execute("function add(a,b){return a+b;}");
    assert_eq!(status, Status::Ok);
    let global = engine.get_global();
    let add = engine.get(global, "add");
    let args = engine.create_array();
    let two = engine.create_number(2.0);
    let three = engine.create_number(3.0);
    engine.array_push(args, two).unwrap();
    engine.array_push(args, three).unwrap();
    let (status, result) = engine.apply(add, tinyscript::Value::undefined(), args);
    assert_eq!(status, Status::Ok);
    assert_eq!(engine.to_number(result), 5.0);
}

#[test]
fn apply_with_undefined_args_behaves_like_an_empty_array() {
    let mut engine = Engine::create();
    let (status, _) = engine.execute("function f(a){return a;}");
    assert_eq!(status, Status::Ok);
    let global = engine.get_global();
    let f = engine.get(global, "f");
    let (status, result) = engine.apply(f, tinyscript::Value::undefined(), tinyscript::Value::undefined());
    assert_eq!(status, Status::Ok);
    assert!(result.is_undefined());
}

#[test]
fn syntax_error_is_reported_and_recorded() {
    let mut engine = Engine::create();
    let (status, _) = engine.execute("var a = ;");
    assert_eq!(status, Status::SyntaxError);
    assert!(engine.get_parser_error().is_some());
}

