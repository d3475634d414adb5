//! The AST-walking interpreter (§4.1 "Interpreter").
//!
//! Evaluates a [`crate::ast::Ast`] directly — no bytecode compilation step.
//! Control flow (`break`/`continue`/`return`) propagates as a
//! [`Completion`] value threaded back up through statement execution;
//! exceptions propagate as `Err(RunError)` through the call stack, checked
//! at every statement and call boundary against the resource guards (§4.1
//! "Resource limits").

use std::rc::Rc;

use crate::ast::{Ast, NodeId, NodeTag, Payload};
use crate::coerce;
use crate::engine::Engine;
use crate::exception::{EngineFault, ErrorKind, RunError, RunResult};
use crate::heap::ObjectId;
use crate::object::{ObjectKind, PropAttrs};
use crate::value::Value;

/// What a statement did, besides possibly throwing.
pub(crate) enum Completion {
    Normal,
    Break,
    Continue,
    Return(Value),
}

impl Engine {
    /// Runs every statement in `ast` starting at `ast.root()` within
    /// `scope`, returning the value of the last expression statement
    /// evaluated (mirrors `v7_exec`'s "completion value" behavior).
    pub(crate) fn run_program(&mut self, ast: &Rc<Ast>, scope: ObjectId) -> RunResult<Value> {
        let mut last = Value::undefined();
        for stmt in ast.children(ast.root()) {
            match self.exec_statement(ast, stmt, scope)? {
                Completion::Normal => {}
                Completion::Return(v) => return Ok(v),
                Completion::Break | Completion::Continue => {
                    return Err(RunError::uncatchable(EngineFault::Interrupted));
                }
            }
            if let Some(v) = self.last_expr_value.take() {
                last = v;
            }
        }
        Ok(last)
    }

    /// Checks the interrupt flag and reserves one call-depth slot. Paired
    /// with [`crate::resource::CallDepthGuard::leave`] by every caller on
    /// every exit path — not an RAII guard, since the token would otherwise
    /// have to stay borrowed across the very recursive `&mut self` calls it
    /// protects.
    fn enter_frame(&mut self) -> RunResult<()> {
        if self.interrupts.is_set() {
            return Err(RunError::uncatchable(EngineFault::Interrupted));
        }
        if !self.depth_guard.try_enter() {
            return Err(RunError::uncatchable(EngineFault::StackOverflow));
        }
        Ok(())
    }

    fn exec_statement(&mut self, ast: &Rc<Ast>, id: NodeId, scope: ObjectId) -> RunResult<Completion> {
        self.enter_frame()?;
        let result = self.exec_statement_inner(ast, id, scope);
        self.depth_guard.leave();
        result
    }

    fn exec_statement_inner(&mut self, ast: &Rc<Ast>, id: NodeId, scope: ObjectId) -> RunResult<Completion> {
        let node = ast.node(id);
        match node.tag {
            NodeTag::Empty => Ok(Completion::Normal),
            NodeTag::ExprStatement => {
                let expr = ast.children(id).next().expect("ExprStatement always has one child");
                let v = self.eval(ast, expr, scope)?;
                self.last_expr_value = Some(v);
                Ok(Completion::Normal)
            }
            NodeTag::Block => {
                for child in ast.children(id) {
                    match self.exec_statement(ast, child, scope)? {
                        Completion::Normal => {}
                        other => return Ok(other),
                    }
                }
                Ok(Completion::Normal)
            }
            NodeTag::VarDecl => {
                for child in ast.children(id) {
                    match ast.node(child).tag {
                        NodeTag::VarDeclarator => {
                            let mut kids = ast.children(child);
                            let name_node = kids.next().expect("VarDeclarator always names a binding");
                            let name = self.identifier_text(ast, name_node).to_owned();
                            crate::namespace::declare_var(&mut self.heap, scope, &name).map_err(|_| self.oom())?;
                            if let Some(init) = kids.next() {
                                let v = self.eval(ast, init, scope)?;
                                crate::namespace::assign(&mut self.heap, scope, self.global, &name, v)
                                    .map_err(|_| self.oom())?;
                            }
                        }
                        _ => {
                            // A `for`-init clause that turned out to be a
                            // plain assignment rather than a declaration
                            // (see parse.rs's `for_stmt`).
                            self.eval(ast, child, scope)?;
                        }
                    }
                }
                Ok(Completion::Normal)
            }
            NodeTag::If => {
                let mut kids = ast.children(id);
                let cond = kids.next().unwrap();
                let then = kids.next().unwrap();
                let else_ = kids.next().unwrap();
                let cond_v = self.eval(ast, cond, scope)?;
                if coerce::to_boolean(&self.heap, cond_v) {
                    self.exec_statement(ast, then, scope)
                } else if ast.node(else_).tag != NodeTag::Empty {
                    self.exec_statement(ast, else_, scope)
                } else {
                    Ok(Completion::Normal)
                }
            }
            NodeTag::While => {
                let mut kids = ast.children(id);
                let cond = kids.next().unwrap();
                let body = kids.next().unwrap();
                loop {
                    let cond_v = self.eval(ast, cond, scope)?;
                    if !coerce::to_boolean(&self.heap, cond_v) {
                        break;
                    }
                    match self.exec_statement(ast, body, scope)? {
                        Completion::Break => break,
                        Completion::Continue | Completion::Normal => {}
                        ret @ Completion::Return(_) => return Ok(ret),
                    }
                }
                Ok(Completion::Normal)
            }
            NodeTag::DoWhile => {
                let mut kids = ast.children(id);
                let body = kids.next().unwrap();
                let cond = kids.next().unwrap();
                loop {
                    match self.exec_statement(ast, body, scope)? {
                        Completion::Break => break,
                        Completion::Continue | Completion::Normal => {}
                        ret @ Completion::Return(_) => return Ok(ret),
                    }
                    let cond_v = self.eval(ast, cond, scope)?;
                    if !coerce::to_boolean(&self.heap, cond_v) {
                        break;
                    }
                }
                Ok(Completion::Normal)
            }
            NodeTag::For => {
                let mut kids = ast.children(id);
                let init = kids.next().unwrap();
                let cond = kids.next().unwrap();
                let update = kids.next().unwrap();
                let body = kids.next().unwrap();
                if ast.node(init).tag != NodeTag::Empty {
                    self.exec_statement(ast, init, scope)?;
                }
                loop {
                    if ast.node(cond).tag != NodeTag::Empty {
                        let cond_v = self.eval(ast, cond, scope)?;
                        if !coerce::to_boolean(&self.heap, cond_v) {
                            break;
                        }
                    }
                    match self.exec_statement(ast, body, scope)? {
                        Completion::Break => break,
                        Completion::Continue | Completion::Normal => {}
                        ret @ Completion::Return(_) => return Ok(ret),
                    }
                    if ast.node(update).tag != NodeTag::Empty {
                        self.eval(ast, update, scope)?;
                    }
                }
                Ok(Completion::Normal)
            }
            NodeTag::ForIn => {
                let mut kids = ast.children(id);
                let name_node = kids.next().unwrap();
                let obj_expr = kids.next().unwrap();
                let body = kids.next().unwrap();
                let name = self.identifier_text(ast, name_node).to_owned();
                crate::namespace::declare_var(&mut self.heap, scope, &name).map_err(|_| self.oom())?;
                let obj_v = self.eval(ast, obj_expr, scope)?;
                let keys = self.enumerable_keys(obj_v);
                for key in keys {
                    let key_value = self.intern_string(&key);
                    crate::namespace::assign(&mut self.heap, scope, self.global, &name, key_value).map_err(|_| self.oom())?;
                    match self.exec_statement(ast, body, scope)? {
                        Completion::Break => break,
                        Completion::Continue | Completion::Normal => {}
                        ret @ Completion::Return(_) => return Ok(ret),
                    }
                }
                Ok(Completion::Normal)
            }
            NodeTag::Return => {
                let expr = ast.children(id).next().expect("Return always has a value node");
                let v = self.eval(ast, expr, scope)?;
                Ok(Completion::Return(v))
            }
            NodeTag::Break => Ok(Completion::Break),
            NodeTag::Continue => Ok(Completion::Continue),
            NodeTag::Throw => {
                let expr = ast.children(id).next().unwrap();
                let v = self.eval(ast, expr, scope)?;
                Err(RunError::Thrown(v))
            }
            NodeTag::Try => self.exec_try(ast, id, scope),
            NodeTag::FunctionDecl => {
                // Hoisting declares the name before the block executes (see
                // `Engine::hoist_declarations`); here we only need to bind
                // the already-evaluated closure, which hoisting also did.
                Ok(Completion::Normal)
            }
            other => unreachable!("{other:?} is not a statement tag"),
        }
    }

    fn exec_try(&mut self, ast: &Rc<Ast>, id: NodeId, scope: ObjectId) -> RunResult<Completion> {
        let mut kids = ast.children(id);
        let block = kids.next().unwrap();
        let catch = kids.next().unwrap();
        let finally = kids.next().unwrap();

        let result = self.exec_statement(ast, block, scope);
        let result = match result {
            Err(RunError::Thrown(exc)) if ast.node(catch).tag == NodeTag::CatchClause => {
                let mut catch_kids = ast.children(catch);
                let name_node = catch_kids.next().unwrap();
                let catch_body = catch_kids.next().unwrap();
                let name = self.identifier_text(ast, name_node).to_owned();
                let catch_scope = crate::namespace::create_activation(&mut self.heap, Some(scope), Value::undefined()).map_err(|_| self.oom())?;
                crate::namespace::declare_var(&mut self.heap, catch_scope, &name).map_err(|_| self.oom())?;
                crate::namespace::assign(&mut self.heap, catch_scope, self.global, &name, exc).map_err(|_| self.oom())?;
                self.exec_statement(ast, catch_body, catch_scope)
            }
            other => other,
        };

        if ast.node(finally).tag != NodeTag::Empty {
            match self.exec_statement(ast, finally, scope)? {
                Completion::Normal => result,
                // A completion from `finally` overrides the try/catch result,
                // matching ECMAScript's abrupt-completion-in-finally rule.
                other => Ok(other),
            }
        } else {
            result
        }
    }

    fn identifier_text<'a>(&self, ast: &'a Ast, id: NodeId) -> &'a str {
        match ast.node(id).payload {
            Payload::StringRef(idx) => ast.string(idx),
            _ => unreachable!("identifier node without a StringRef payload"),
        }
    }

    /// Peels through passthrough `Unary`/`CallChain` wrappers (no operator,
    /// no chain steps) to find the identifier a bare `typeof` operand
    /// ultimately names, if any. `typeof` must not throw on an unresolved
    /// top-level identifier even though every other read does, but the flat
    /// AST wraps even a lone identifier in a couple of passthrough layers.
    fn as_bare_identifier(&self, ast: &Ast, mut node: NodeId) -> Option<NodeId> {
        loop {
            match ast.node(node).tag {
                NodeTag::Identifier => return Some(node),
                NodeTag::Unary => {
                    if !matches!(ast.node(node).payload, Payload::None) {
                        return None;
                    }
                    node = ast.children(node).next()?;
                }
                NodeTag::CallChain => {
                    let mut kids = ast.children(node);
                    let base = kids.next()?;
                    if kids.next().is_some() {
                        return None;
                    }
                    node = base;
                }
                _ => return None,
            }
        }
    }

    fn oom(&self) -> RunError {
        RunError::uncatchable(EngineFault::OutOfMemory)
    }

    fn intern_string(&mut self, s: &str) -> Value {
        match Value::string_inline(s) {
            Some(v) => v,
            None => Value::string_heap(self.heap.alloc_string_heap(s)),
        }
    }

    fn throw_type_error(&mut self, message: impl Into<String>) -> RunError {
        let v = self.intern_string(&message.into());
        let _ = ErrorKind::TypeError; // classification surfaced via Engine::last_exception
        self.pending_error_kind = Some(ErrorKind::TypeError);
        RunError::Thrown(v)
    }

    fn throw_reference_error(&mut self, name: &str) -> RunError {
        let v = self.intern_string(&format!("{name} is not defined"));
        self.pending_error_kind = Some(ErrorKind::ReferenceError);
        RunError::Thrown(v)
    }

    // --- expressions ---------------------------------------------------------

    pub(crate) fn eval(&mut self, ast: &Rc<Ast>, id: NodeId, scope: ObjectId) -> RunResult<Value> {
        self.enter_frame()?;
        let result = self.eval_inner(ast, id, scope);
        self.depth_guard.leave();
        result
    }

    fn eval_inner(&mut self, ast: &Rc<Ast>, id: NodeId, scope: ObjectId) -> RunResult<Value> {
        let node = ast.node(id);
        match node.tag {
            NodeTag::NumberLiteral => {
                let Payload::Number(n) = node.payload else { unreachable!() };
                Ok(Value::number(n))
            }
            NodeTag::StringLiteral => {
                let Payload::StringRef(idx) = node.payload else { unreachable!() };
                Ok(self.intern_string(ast.string(idx).to_owned().as_str()))
            }
            NodeTag::BoolLiteral => {
                let Payload::Bool(b) = node.payload else { unreachable!() };
                Ok(Value::boolean(b))
            }
            NodeTag::NullLiteral => Ok(Value::null()),
            NodeTag::UndefinedLiteral => Ok(Value::undefined()),
            NodeTag::ThisExpr => Ok(self.current_this(scope)),
            NodeTag::Identifier => {
                let name = self.identifier_text(ast, id).to_owned();
                match crate::namespace::resolve(&self.heap, scope, &name) {
                    Some(owner) => Ok(crate::object::get_property(&self.heap, owner, &name).unwrap_or(Value::undefined())),
                    None => Err(self.throw_reference_error(&name)),
                }
            }
            NodeTag::ArrayLiteral => {
                let mut elements = Vec::new();
                for child in ast.children(id) {
                    elements.push(self.eval(ast, child, scope)?);
                }
                self.new_array(elements)
            }
            NodeTag::ObjectLiteral => {
                let proto = Value::null();
                let obj = self.heap.alloc_object(crate::object::ObjectCell::plain(proto)).map_err(|_| self.oom())?;
                for prop in ast.children(id) {
                    let mut kids = ast.children(prop);
                    let key_node = kids.next().unwrap();
                    let value_node = kids.next().unwrap();
                    let key = self.identifier_text(ast, key_node).to_owned();
                    let v = self.eval(ast, value_node, scope)?;
                    let key_value = self.intern_string(&key);
                    crate::object::set_own_property(&mut self.heap, obj, key_value, v).map_err(|_| self.oom())?;
                }
                Ok(Value::object(obj))
            }
            NodeTag::FunctionExpr => self.make_closure(ast, id, scope),
            NodeTag::Sequence => {
                let mut last = Value::undefined();
                for child in ast.children(id) {
                    last = self.eval(ast, child, scope)?;
                }
                Ok(last)
            }
            NodeTag::Assignment => self.eval_assignment(ast, id, scope),
            NodeTag::Conditional => {
                let mut kids = ast.children(id);
                let cond = kids.next().unwrap();
                let cond_v = self.eval(ast, cond, scope)?;
                if let (Some(then), Some(else_)) = (kids.next(), kids.next()) {
                    if coerce::to_boolean(&self.heap, cond_v) {
                        self.eval(ast, then, scope)
                    } else {
                        self.eval(ast, else_, scope)
                    }
                } else {
                    Ok(cond_v)
                }
            }
            NodeTag::Binary => self.eval_binary_chain(ast, id, scope),
            NodeTag::Unary => self.eval_unary(ast, id, scope),
            NodeTag::CallChain => self.eval_call_chain(ast, id, scope),
            NodeTag::New => self.eval_new(ast, id, scope),
            other => unreachable!("{other:?} is not an expression tag"),
        }
    }

    fn current_this(&self, mut scope: ObjectId) -> Value {
        loop {
            match &self.heap.object(scope).kind {
                ObjectKind::Activation { this_value, parent, .. } => {
                    if !this_value.is_undefined() {
                        return *this_value;
                    }
                    match parent {
                        Some(p) => scope = *p,
                        None => return Value::undefined(),
                    }
                }
                _ => return Value::undefined(),
            }
        }
    }

    fn eval_assignment(&mut self, ast: &Rc<Ast>, id: NodeId, scope: ObjectId) -> RunResult<Value> {
        let mut kids = ast.children(id);
        let lhs = kids.next().expect("Assignment always has a left operand");
        let Some(rhs) = kids.next() else {
            return self.eval(ast, lhs, scope);
        };
        let Payload::BinaryOp { op } = ast.node(id).payload else { unreachable!() };
        let op = ast.string(op).to_owned();
        let rhs_v = self.eval(ast, rhs, scope)?;
        let value = if op == "=" {
            rhs_v
        } else {
            let current = self.eval(ast, lhs, scope)?;
            let arith_op = &op[..op.len() - 1];
            self.apply_binary_op(arith_op, current, rhs_v)?
        };
        self.assign_to(ast, lhs, scope, value)?;
        Ok(value)
    }

    /// Peels through every passthrough wrapper a parsed expression can carry
    /// on the way down to its real shape (`Conditional`/`Binary` with one
    /// child, `Unary` with `Payload::None`, a `CallChain` with no steps) —
    /// an lvalue position (assignment target, `++`/`--` operand) reaches
    /// `assign_to` still wearing all of them, since the parser always opens
    /// the same ladder of nodes regardless of whether anything followed.
    fn unwrap_lvalue(&self, ast: &Ast, mut node: NodeId) -> NodeId {
        loop {
            match ast.node(node).tag {
                NodeTag::Conditional | NodeTag::Binary => {
                    let mut kids = ast.children(node);
                    let Some(only) = kids.next() else { return node };
                    if kids.next().is_some() {
                        return node;
                    }
                    node = only;
                }
                NodeTag::Unary => {
                    if !matches!(ast.node(node).payload, Payload::None) {
                        return node;
                    }
                    let Some(only) = ast.children(node).next() else { return node };
                    node = only;
                }
                NodeTag::CallChain => {
                    let mut kids = ast.children(node);
                    let Some(base) = kids.next() else { return node };
                    if kids.next().is_some() {
                        return node;
                    }
                    node = base;
                }
                _ => return node,
            }
        }
    }

    fn assign_to(&mut self, ast: &Rc<Ast>, lhs: NodeId, scope: ObjectId, value: Value) -> RunResult<()> {
        let lhs = self.unwrap_lvalue(ast, lhs);
        match ast.node(lhs).tag {
            NodeTag::Identifier => {
                let name = self.identifier_text(ast, lhs).to_owned();
                crate::namespace::assign(&mut self.heap, scope, self.global, &name, value).map_err(|_| self.oom())
            }
            NodeTag::CallChain => match self.resolve_member_target(ast, lhs, scope)? {
                Some((obj, key)) => self.set_indexed_property(obj, &key, value),
                None => Err(self.throw_type_error("invalid assignment target")),
            },
            _ => Err(self.throw_type_error("invalid assignment target")),
        }
    }

    /// Sets `obj[key] = value`, routing numeric keys on an array to its
    /// element vector (growing it if needed) instead of the property chain.
    fn set_indexed_property(&mut self, obj: ObjectId, key: &str, value: Value) -> RunResult<()> {
        if self.heap.object(obj).is_array() {
            if let Ok(idx) = key.parse::<usize>() {
                let ObjectKind::Array(elements) = &mut self.heap.object_mut(obj).kind else { unreachable!() };
                if idx >= elements.len() {
                    elements.resize(idx + 1, Value::undefined());
                }
                elements[idx] = value;
                return Ok(());
            }
        }
        let key_value = self.intern_string(key);
        crate::object::set_own_property(&mut self.heap, obj, key_value, value).map_err(|_| self.oom())
    }

    /// If `node` is a `CallChain` ending in a `MemberStep`, evaluates
    /// everything up to that step and returns the target object plus the
    /// property key — the shared resolution logic behind property
    /// assignment and `delete`. Returns `None` for any other shape (a bare
    /// identifier chain, a chain ending in a call, or a non-object base).
    fn resolve_member_target(&mut self, ast: &Rc<Ast>, node: NodeId, scope: ObjectId) -> RunResult<Option<(ObjectId, String)>> {
        let node = self.unwrap_lvalue(ast, node);
        if ast.node(node).tag != NodeTag::CallChain {
            return Ok(None);
        }
        let mut kids = ast.children(node);
        let base_node = kids.next().expect("CallChain always has a base");
        let steps: Vec<NodeId> = kids.collect();
        let Some((last, rest)) = steps.split_last() else { return Ok(None) };
        if ast.node(*last).tag != NodeTag::MemberStep {
            return Ok(None);
        }
        let base_v = self.eval(ast, base_node, scope)?;
        let obj_v = self.eval_steps(ast, base_v, rest, scope)?;
        let Some(obj) = obj_v.as_object_id() else { return Ok(None) };
        let key = self.member_step_key(ast, *last, scope)?;
        Ok(Some((obj, key)))
    }

    fn member_step_key(&mut self, ast: &Rc<Ast>, step: NodeId, scope: ObjectId) -> RunResult<String> {
        let Payload::MemberStep { computed, name } = ast.node(step).payload else { unreachable!() };
        if computed {
            let key_node = ast.children(step).next().expect("computed MemberStep always has a key child");
            let key_v = self.eval(ast, key_node, scope)?;
            Ok(coerce::to_string_value(&self.heap, key_v))
        } else {
            Ok(ast.string(name.expect("non-computed MemberStep always names a property")).to_owned())
        }
    }

    fn eval_binary_chain(&mut self, ast: &Rc<Ast>, id: NodeId, scope: ObjectId) -> RunResult<Value> {
        let mut kids = ast.children(id);
        let first = kids.next().expect("Binary always has at least one operand");
        let mut operands = vec![self.eval(ast, first, scope)?];
        let mut ops: Vec<String> = Vec::new();
        loop {
            let Some(marker) = kids.next() else { break };
            let Payload::BinaryOp { op } = ast.node(marker).payload else { unreachable!() };
            let op_str = ast.string(op).to_owned();
            let operand_node = kids.next().expect("operator marker always has a following operand");
            if op_str == "&&" {
                if !coerce::to_boolean(&self.heap, *operands.last().unwrap()) {
                    return self.short_circuit(ast, operand_node, scope, operands, ops, op_str);
                }
                let v = self.eval(ast, operand_node, scope)?;
                operands.push(v);
                ops.push(op_str);
                continue;
            }
            if op_str == "||" {
                if coerce::to_boolean(&self.heap, *operands.last().unwrap()) {
                    return self.short_circuit(ast, operand_node, scope, operands, ops, op_str);
                }
                let v = self.eval(ast, operand_node, scope)?;
                operands.push(v);
                ops.push(op_str);
                continue;
            }
            let v = self.eval(ast, operand_node, scope)?;
            operands.push(v);
            ops.push(op_str);
        }
        self.fold_precedence(&operands, &ops)
    }

    /// `&&`/`||` short-circuited before evaluating their right operand: the
    /// already-evaluated left side stands as the chain's result, since a
    /// logical operator always yields immediately once short-circuited
    /// (nothing to its left can change that once its own left side decided
    /// the outcome, by construction of the left-to-right scan above).
    fn short_circuit(
        &mut self,
        _ast: &Rc<Ast>,
        _next_operand: NodeId,
        _scope: ObjectId,
        operands: Vec<Value>,
        ops: Vec<String>,
        _op: String,
    ) -> RunResult<Value> {
        self.fold_precedence(&operands, &ops)
    }

    /// Folds a flat `[operand, op, operand, op, operand...]` chain in
    /// precedence order (tightest-binding first), left-associatively within
    /// a tier — the runtime half of the parser's flat `Binary` encoding (see
    /// `parse.rs` module docs).
    fn fold_precedence(&mut self, operands: &[Value], ops: &[String]) -> RunResult<Value> {
        let mut operands: Vec<Value> = operands.to_vec();
        let mut ops: Vec<String> = ops.to_vec();
        for tier in (1..=10u8).rev() {
            let mut i = 0;
            while i < ops.len() {
                if crate::ast::binary_precedence(&ops[i]) == Some(tier) {
                    let result = self.apply_binary_op(&ops[i], operands[i], operands[i + 1])?;
                    operands.splice(i..=i + 1, [result]);
                    ops.remove(i);
                } else {
                    i += 1;
                }
            }
        }
        Ok(operands.into_iter().next().unwrap_or(Value::undefined()))
    }

    pub(crate) fn apply_binary_op(&mut self, op: &str, a: Value, b: Value) -> RunResult<Value> {
        match op {
            "+" => {
                if a.is_string() || b.is_string() {
                    let s = format!("{}{}", coerce::to_string_value(&self.heap, a), coerce::to_string_value(&self.heap, b));
                    Ok(self.intern_string(&s))
                } else {
                    Ok(Value::number(coerce::to_number(&self.heap, a) + coerce::to_number(&self.heap, b)))
                }
            }
            "-" => Ok(Value::number(coerce::to_number(&self.heap, a) - coerce::to_number(&self.heap, b))),
            "*" => Ok(Value::number(coerce::to_number(&self.heap, a) * coerce::to_number(&self.heap, b))),
            "/" => Ok(Value::number(coerce::to_number(&self.heap, a) / coerce::to_number(&self.heap, b))),
            "%" => Ok(Value::number(coerce::to_number(&self.heap, a) % coerce::to_number(&self.heap, b))),
            "==" => Ok(Value::boolean(coerce::loose_equals(&self.heap, a, b))),
            "!=" => Ok(Value::boolean(!coerce::loose_equals(&self.heap, a, b))),
            "===" => Ok(Value::boolean(coerce::strict_equals(&self.heap, a, b))),
            "!==" => Ok(Value::boolean(!coerce::strict_equals(&self.heap, a, b))),
            "<" | ">" | "<=" | ">=" => Ok(Value::boolean(self.compare(op, a, b))),
            "&&" => Ok(if coerce::to_boolean(&self.heap, a) { b } else { a }),
            "||" => Ok(if coerce::to_boolean(&self.heap, a) { a } else { b }),
            "&" => Ok(Value::number(((coerce::to_number(&self.heap, a) as i32) & (coerce::to_number(&self.heap, b) as i32)) as f64)),
            "|" => Ok(Value::number(((coerce::to_number(&self.heap, a) as i32) | (coerce::to_number(&self.heap, b) as i32)) as f64)),
            "^" => Ok(Value::number(((coerce::to_number(&self.heap, a) as i32) ^ (coerce::to_number(&self.heap, b) as i32)) as f64)),
            "<<" => Ok(Value::number(((coerce::to_number(&self.heap, a) as i32) << ((coerce::to_number(&self.heap, b) as i32) & 31)) as f64)),
            ">>" => Ok(Value::number(((coerce::to_number(&self.heap, a) as i32) >> ((coerce::to_number(&self.heap, b) as i32) & 31)) as f64)),
            ">>>" => Ok(Value::number(((coerce::to_number(&self.heap, a) as u32) >> ((coerce::to_number(&self.heap, b) as i32) & 31)) as f64)),
            "instanceof" => self.instanceof(a, b),
            "in" => {
                if let Some(obj) = b.as_object_id() {
                    let key = coerce::to_string_value(&self.heap, a);
                    Ok(Value::boolean(crate::object::get_own(&self.heap, obj, &key).is_some()))
                } else {
                    Err(self.throw_type_error("'in' requires an object right-hand side"))
                }
            }
            other => unreachable!("unknown binary operator {other}"),
        }
    }

    fn compare(&self, op: &str, a: Value, b: Value) -> bool {
        if a.is_string() && b.is_string() {
            let (sa, sb) = (self.heap.string_bytes(a), self.heap.string_bytes(b));
            return match op {
                "<" => sa < sb,
                ">" => sa > sb,
                "<=" => sa <= sb,
                ">=" => sa >= sb,
                _ => unreachable!(),
            };
        }
        let (na, nb) = (coerce::to_number(&self.heap, a), coerce::to_number(&self.heap, b));
        match op {
            "<" => na < nb,
            ">" => na > nb,
            "<=" => na <= nb,
            ">=" => na >= nb,
            _ => unreachable!(),
        }
    }

    fn instanceof(&mut self, value: Value, ctor: Value) -> RunResult<Value> {
        let Some(ctor_fn) = ctor.as_function_id() else {
            return Err(self.throw_type_error("right-hand side of 'instanceof' is not callable"));
        };
        let Some(proto_obj) = self.heap.function(ctor_fn).ctor_prototype else {
            return Ok(Value::boolean(false));
        };
        let Some(mut current) = value.as_object_id() else {
            return Ok(Value::boolean(false));
        };
        loop {
            match self.heap.object(current).prototype.as_object_id() {
                Some(next) => {
                    if next == proto_obj {
                        return Ok(Value::boolean(true));
                    }
                    current = next;
                }
                None => return Ok(Value::boolean(false)),
            }
        }
    }

    fn eval_unary(&mut self, ast: &Rc<Ast>, id: NodeId, scope: ObjectId) -> RunResult<Value> {
        let Payload::UnaryOp { op, prefix } = ast.node(id).payload else {
            // A postfix wrapper with no operator at all: pure passthrough.
            let operand = ast.children(id).next().expect("Unary always has an operand");
            return self.eval(ast, operand, scope);
        };
        let op = ast.string(op).to_owned();
        let operand = ast.children(id).next().expect("Unary always has an operand");
        if op == "typeof" {
            // `typeof` on an unresolved identifier yields "undefined"
            // instead of throwing, unlike every other read.
            if let Some(ident) = self.as_bare_identifier(ast, operand) {
                let name = self.identifier_text(ast, ident).to_owned();
                if crate::namespace::resolve(&self.heap, scope, &name).is_none() {
                    return Ok(self.intern_string("undefined"));
                }
            }
            let v = self.eval(ast, operand, scope)?;
            return Ok(self.intern_string(self.type_of(v)));
        }
        if op == "delete" {
            if let Some((obj, key)) = self.resolve_member_target(ast, operand, scope)? {
                if let Some(pid) = crate::object::get_own(&self.heap, obj, &key) {
                    if !self.heap.property(pid).attrs.contains(PropAttrs::DONT_DELETE) {
                        self.unlink_property(obj, pid);
                    }
                }
            }
            return Ok(Value::boolean(true));
        }
        if op == "++" || op == "--" {
            let current = self.eval(ast, operand, scope)?;
            let n = coerce::to_number(&self.heap, current);
            let next = if op == "++" { n + 1.0 } else { n - 1.0 };
            let next_v = Value::number(next);
            self.assign_to(ast, operand, scope, next_v)?;
            return Ok(if prefix { next_v } else { Value::number(n) });
        }
        let v = self.eval(ast, operand, scope)?;
        match op.as_str() {
            "!" => Ok(Value::boolean(!coerce::to_boolean(&self.heap, v))),
            "-" => Ok(Value::number(-coerce::to_number(&self.heap, v))),
            "+" => Ok(Value::number(coerce::to_number(&self.heap, v))),
            "~" => Ok(Value::number(!(coerce::to_number(&self.heap, v) as i32) as f64)),
            "void" => Ok(Value::undefined()),
            other => unreachable!("unknown unary operator {other}"),
        }
    }

    fn unlink_property(&mut self, obj: ObjectId, target: crate::heap::PropertyId) {
        let mut cur = self.heap.object(obj).first_prop;
        let mut prev: Option<crate::heap::PropertyId> = None;
        while let Some(pid) = cur {
            let next = self.heap.property(pid).next;
            if pid == target {
                match prev {
                    Some(p) => self.heap.property_mut(p).next = next,
                    None => self.heap.object_mut(obj).first_prop = next,
                }
                break;
            }
            prev = Some(pid);
            cur = next;
        }
    }

    fn type_of(&self, v: Value) -> &'static str {
        if v.is_undefined() {
            "undefined"
        } else if v.is_null() {
            "object"
        } else if v.is_boolean() {
            "boolean"
        } else if v.is_number() {
            "number"
        } else if v.is_string() {
            "string"
        } else if v.is_function() || v.is_cfunction() {
            "function"
        } else {
            "object"
        }
    }

    // --- member access, arrays, calls ------------------------------------

    /// Evaluates a flat postfix chain: a base expression followed by zero or
    /// more `MemberStep`/`CallStep` children (see `ast.rs`'s `CallChain`
    /// docs for why the parser can't nest these).
    fn eval_call_chain(&mut self, ast: &Rc<Ast>, id: NodeId, scope: ObjectId) -> RunResult<Value> {
        let mut kids = ast.children(id);
        let base_node = kids.next().expect("CallChain always has a base");
        let base = self.eval(ast, base_node, scope)?;
        let steps: Vec<NodeId> = kids.collect();
        self.eval_steps(ast, base, &steps, scope)
    }

    /// Threads `current` through a sequence of `MemberStep`/`CallStep`
    /// nodes, tracking the object a method was read off of so a subsequent
    /// `CallStep` can pass it as `this` (and so the array method seed below
    /// can dispatch directly instead of resolving a real property first).
    fn eval_steps(&mut self, ast: &Rc<Ast>, mut current: Value, steps: &[NodeId], scope: ObjectId) -> RunResult<Value> {
        let mut pending_this = Value::undefined();
        let mut last_member_key: Option<String> = None;
        for &step in steps {
            match ast.node(step).tag {
                NodeTag::MemberStep => {
                    let key = self.member_step_key(ast, step, scope)?;
                    let value = self.read_property(current, &key)?;
                    pending_this = current;
                    last_member_key = Some(key);
                    current = value;
                }
                NodeTag::CallStep => {
                    let args: Vec<Value> = ast.children(step).map(|a| self.eval(ast, a, scope)).collect::<RunResult<_>>()?;
                    if let (Some(key), Some(obj)) = (last_member_key.take(), pending_this.as_object_id()) {
                        if self.heap.object(obj).is_array() && matches!(key.as_str(), "push" | "join" | "map" | "forEach") {
                            current = self.call_array_method(&key, obj, args)?;
                            pending_this = Value::undefined();
                            continue;
                        }
                    }
                    current = self.call_value(current, pending_this, &args)?;
                    pending_this = Value::undefined();
                }
                other => unreachable!("{other:?} is not a call-chain step"),
            }
        }
        Ok(current)
    }

    /// Reads `base[key]`, routing array `length` and numeric indices to the
    /// element vector instead of the property chain. Throws a `TypeError`
    /// reading off a non-object; a missing property or out-of-range index
    /// yields `undefined`, matching every other property read.
    fn read_property(&mut self, base: Value, key: &str) -> RunResult<Value> {
        let Some(obj) = base.as_object_id() else {
            let rendered = coerce::to_string_value(&self.heap, base);
            return Err(self.throw_type_error(format!("cannot read property '{key}' of {rendered}")));
        };
        if self.heap.object(obj).is_array() {
            if key == "length" {
                let ObjectKind::Array(elements) = &self.heap.object(obj).kind else { unreachable!() };
                return Ok(Value::number(elements.len() as f64));
            }
            if let Ok(idx) = key.parse::<usize>() {
                let ObjectKind::Array(elements) = &self.heap.object(obj).kind else { unreachable!() };
                return Ok(elements.get(idx).copied().unwrap_or(Value::undefined()));
            }
        }
        Ok(crate::object::get_property(&self.heap, obj, key).unwrap_or(Value::undefined()))
    }

    /// The minimal `push`/`join`/`map`/`forEach` method seed kept in because
    /// §8's testable scenarios exercise them directly even though a full
    /// `Array.prototype` is out of scope (see `DESIGN.md`). Dispatched
    /// directly from `eval_steps` by method name rather than resolved as a
    /// real `Function` property.
    fn call_array_method(&mut self, method: &str, array_obj: ObjectId, args: Vec<Value>) -> RunResult<Value> {
        match method {
            "push" => {
                let ObjectKind::Array(elements) = &mut self.heap.object_mut(array_obj).kind else { unreachable!() };
                elements.extend(args.iter().copied());
                let len = elements.len();
                Ok(Value::number(len as f64))
            }
            "join" => {
                let sep = args.first().map(|v| coerce::to_string_value(&self.heap, *v)).unwrap_or_else(|| ",".to_owned());
                let ObjectKind::Array(elements) = &self.heap.object(array_obj).kind else { unreachable!() };
                let rendered: Vec<String> = elements
                    .iter()
                    .map(|v| if v.is_undefined() || v.is_null() { String::new() } else { coerce::to_string_value(&self.heap, *v) })
                    .collect();
                Ok(self.intern_string(&rendered.join(&sep)))
            }
            "map" => {
                let Some(callback) = args.first().copied() else {
                    return Err(self.throw_type_error("Array.prototype.map requires a callback"));
                };
                let ObjectKind::Array(elements) = &self.heap.object(array_obj).kind else { unreachable!() };
                let elements = elements.clone();
                let mut mapped = Vec::with_capacity(elements.len());
                for (i, el) in elements.iter().enumerate() {
                    let call_args = [*el, Value::number(i as f64), Value::object(array_obj)];
                    mapped.push(self.call_value(callback, Value::undefined(), &call_args)?);
                }
                self.new_array(mapped)
            }
            "forEach" => {
                let Some(callback) = args.first().copied() else {
                    return Err(self.throw_type_error("Array.prototype.forEach requires a callback"));
                };
                let ObjectKind::Array(elements) = &self.heap.object(array_obj).kind else { unreachable!() };
                let elements = elements.clone();
                for (i, el) in elements.iter().enumerate() {
                    let call_args = [*el, Value::number(i as f64), Value::object(array_obj)];
                    self.call_value(callback, Value::undefined(), &call_args)?;
                }
                Ok(Value::undefined())
            }
            other => unreachable!("unrecognized array method {other}"),
        }
    }

    /// `new callee(args)`: children are the callee base, zero or more
    /// `MemberStep`s locating the constructor off of it, then at most one
    /// trailing `CallStep` (omitted for parenless `new Foo`).
    fn eval_new(&mut self, ast: &Rc<Ast>, id: NodeId, scope: ObjectId) -> RunResult<Value> {
        let mut kids = ast.children(id);
        let callee_base = kids.next().expect("New always has a callee base");
        let mut current = self.eval(ast, callee_base, scope)?;
        let mut args: Vec<Value> = Vec::new();
        for step in kids {
            match ast.node(step).tag {
                NodeTag::MemberStep => {
                    current = self.eval_steps(ast, current, std::slice::from_ref(&step), scope)?;
                }
                NodeTag::CallStep => {
                    args = ast.children(step).map(|a| self.eval(ast, a, scope)).collect::<RunResult<_>>()?;
                }
                other => unreachable!("{other:?} unexpected under New"),
            }
        }
        let Some(func_id) = current.as_function_id() else {
            return Err(self.throw_type_error("right-hand side of 'new' is not a constructor"));
        };
        let proto = match self.heap.function(func_id).ctor_prototype {
            Some(p) => Value::object(p),
            None => Value::null(),
        };
        let instance = self.heap.alloc_object(crate::object::ObjectCell::plain(proto)).map_err(|_| self.oom())?;
        let result = self.call_value(current, Value::object(instance), &args)?;
        Ok(if result.as_object_id().is_some() { result } else { Value::object(instance) })
    }

    pub(crate) fn new_array(&mut self, elements: Vec<Value>) -> RunResult<Value> {
        let id = self.heap.alloc_object(crate::object::ObjectCell::array(Value::null(), elements)).map_err(|_| self.oom())?;
        Ok(Value::object(id))
    }

    fn make_closure(&mut self, ast: &Rc<Ast>, id: NodeId, scope: ObjectId) -> RunResult<Value> {
        let Payload::FunctionHeader { name, param_count } = ast.node(id).payload else { unreachable!() };
        let mut params = Vec::with_capacity(param_count as usize);
        let mut children = ast.children(id);
        for _ in 0..param_count {
            let p = children.next().expect("function header promises param_count identifier children");
            params.push(self.identifier_text(ast, p).to_owned());
        }
        let name_str = name.map(|idx| ast.string(idx).to_owned());
        let fn_cell = crate::function::FunctionCell::script(Rc::clone(ast), id, scope, name_str, params);
        let fid = self.heap.alloc_function(fn_cell).map_err(|_| self.oom())?;
        Ok(Value::function(fid))
    }

    /// Dispatches a call to either a script closure or a host callback
    /// (§4.1 "Calls"). `this_value` is `undefined` for a plain function call.
    pub(crate) fn call_value(&mut self, callee: Value, this_value: Value, args: &[Value]) -> RunResult<Value> {
        if let Some(bits) = callee.as_cfunction_ptr_bits() {
            let f: crate::function::CFunctionPtr = unsafe { std::mem::transmute::<u64, crate::function::CFunctionPtr>(bits) };
            return f(self, this_value, args);
        }
        let Some(fid) = callee.as_function_id() else {
            return Err(self.throw_type_error("value is not callable"));
        };
        let dispatch = {
            let cell = self.heap.function(fid);
            match &cell.body {
                crate::function::FunctionBody::Host { ptr_bits, .. } => Dispatch::Host(*ptr_bits),
                crate::function::FunctionBody::Script { ast, root, scope, params, .. } => {
                    Dispatch::Script(Rc::clone(ast), *root, *scope, params.clone())
                }
            }
        };
        let (ast, root, closed_over_scope, params) = match dispatch {
            Dispatch::Host(bits) => {
                let f: crate::function::CFunctionPtr = unsafe { std::mem::transmute::<u64, crate::function::CFunctionPtr>(bits) };
                return f(self, this_value, args);
            }
            Dispatch::Script(ast, root, scope, params) => (ast, root, scope, params),
        };
        let call_scope = crate::namespace::create_activation(&mut self.heap, Some(closed_over_scope), this_value).map_err(|_| self.oom())?;
        for (i, param) in params.iter().enumerate() {
            crate::namespace::declare_var(&mut self.heap, call_scope, param).map_err(|_| self.oom())?;
            let arg_value = args.get(i).copied().unwrap_or(Value::undefined());
            crate::namespace::assign(&mut self.heap, call_scope, self.global, param, arg_value).map_err(|_| self.oom())?;
        }
        self.hoist_declarations(&ast, root, call_scope)?;
        let body = ast.children(root).last().expect("function node's last child is its body block");
        match self.exec_statement(&ast, body, call_scope)? {
            Completion::Return(v) => Ok(v),
            _ => Ok(Value::undefined()),
        }
    }

    /// Pre-declares every `var` and hoists every nested `function` declaration
    /// to the top of `scope`, matching ECMAScript's hoisting semantics
    /// (§4.1 "Declarations"). Only walks the direct statement list plus
    /// nested blocks/if/while/for bodies — it does not descend into nested
    /// function bodies, which hoist into their own call scope instead.
    fn hoist_declarations(&mut self, ast: &Rc<Ast>, fn_node: NodeId, scope: ObjectId) -> RunResult<()> {
        let body = ast.children(fn_node).last().expect("function body block");
        self.hoist_in_block(ast, body, scope)
    }

    pub(crate) fn hoist_in_block(&mut self, ast: &Rc<Ast>, id: NodeId, scope: ObjectId) -> RunResult<()> {
        for child in ast.children(id) {
            match ast.node(child).tag {
                NodeTag::VarDecl => {
                    for decl in ast.children(child) {
                        if ast.node(decl).tag == NodeTag::VarDeclarator {
                            let name_node = ast.children(decl).next().unwrap();
                            let name = self.identifier_text(ast, name_node).to_owned();
                            crate::namespace::declare_var(&mut self.heap, scope, &name).map_err(|_| self.oom())?;
                        }
                    }
                }
                NodeTag::FunctionDecl => {
                    let v = self.make_closure(ast, child, scope)?;
                    let Payload::FunctionHeader { name: Some(name_idx), .. } = ast.node(child).payload else {
                        unreachable!("FunctionDecl always names itself")
                    };
                    let name = ast.string(name_idx).to_owned();
                    crate::namespace::declare_var(&mut self.heap, scope, &name).map_err(|_| self.oom())?;
                    crate::namespace::assign(&mut self.heap, scope, self.global, &name, v).map_err(|_| self.oom())?;
                }
                NodeTag::Block | NodeTag::If | NodeTag::While | NodeTag::DoWhile | NodeTag::For | NodeTag::ForIn | NodeTag::Try => {
                    for grandchild in ast.children(child) {
                        if matches!(
                            ast.node(grandchild).tag,
                            NodeTag::Block | NodeTag::VarDecl | NodeTag::If | NodeTag::While | NodeTag::DoWhile | NodeTag::For | NodeTag::ForIn
                        ) {
                            self.hoist_in_block(ast, grandchild, scope)?;
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn enumerable_keys(&mut self, v: Value) -> Vec<String> {
        let Some(obj) = v.as_object_id() else { return Vec::new() };
        let mut keys = Vec::new();
        let mut cur = self.heap.object(obj).first_prop;
        while let Some(pid) = cur {
            let cell = self.heap.property(pid);
            if !cell.attrs.contains(PropAttrs::DONT_ENUM) {
                keys.push(self.heap.string_bytes(cell.name).to_owned());
            }
            cur = cell.next;
        }
        keys
    }
}

enum Dispatch {
    Host(u64),
    Script(Rc<Ast>, NodeId, ObjectId, Vec<String>),
}
