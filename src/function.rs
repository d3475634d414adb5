//! Function cells (§4.1 "Functions").
//!
//! A function value is either a script closure — an AST subtree plus the
//! scope it closed over — or a bare host function pointer wrapped with its
//! declared arity, matching the two `v7_create_function`/`v7_create_cfunction`
//! call shapes in the original source (§10.6).

use std::rc::Rc;

use crate::ast::{Ast, NodeId};
use crate::exception::RunResult;
use crate::heap::ObjectId;
use crate::value::Value;

/// The only shape a host callback may take: no captured state, matching
/// `v7_cfunction_t` exactly. Closures-by-capture are not supported; hosts
/// that need state stash it on the engine or behind a registered root.
pub type CFunctionPtr = fn(engine: &mut crate::engine::Engine, this: Value, args: &[Value]) -> RunResult<Value>;

#[derive(Debug)]
pub(crate) enum FunctionBody {
    Script {
        /// Shared with every other function value carved out of the same
        /// parse; keeps the subtree alive by ordinary `Rc` refcounting
        /// instead of a GC-traced edge, since function ASTs are otherwise
        /// owned by the top-level `execute` call that produced them.
        ast: Rc<Ast>,
        root: NodeId,
        scope: ObjectId,
        name: Option<String>,
        params: Vec<String>,
    },
    Host {
        ptr_bits: u64,
        arity: i32,
    },
}

impl FunctionBody {
    pub(crate) fn captured_scope(&self) -> Option<ObjectId> {
        match self {
            FunctionBody::Script { scope, .. } => Some(*scope),
            FunctionBody::Host { .. } => None,
        }
    }

    pub(crate) fn arity(&self) -> i32 {
        match self {
            FunctionBody::Script { params, .. } => params.len() as i32,
            FunctionBody::Host { arity, .. } => *arity,
        }
    }

    pub(crate) fn name(&self) -> Option<&str> {
        match self {
            FunctionBody::Script { name, .. } => name.as_deref(),
            FunctionBody::Host { .. } => None,
        }
    }
}

/// A heap-allocated function record (§4.1 "Functions").
#[derive(Debug)]
pub(crate) struct FunctionCell {
    pub(crate) body: FunctionBody,
    /// The object installed as `.prototype` when this function is used as a
    /// constructor (`new f()`); created lazily on first property access.
    pub(crate) ctor_prototype: Option<ObjectId>,
}

impl FunctionCell {
    pub(crate) fn script(ast: Rc<Ast>, root: NodeId, scope: ObjectId, name: Option<String>, params: Vec<String>) -> Self {
        Self { body: FunctionBody::Script { ast, root, scope, name, params }, ctor_prototype: None }
    }

    pub(crate) fn host(ptr_bits: u64, arity: i32) -> Self {
        Self { body: FunctionBody::Host { ptr_bits, arity }, ctor_prototype: None }
    }

    /// Estimated byte footprint of this function's backing AST, for
    /// `HeapStatKind::FuncAstSize` (§10.6). Host functions own no AST.
    pub(crate) fn ast_size(&self) -> usize {
        match &self.body {
            FunctionBody::Script { ast, .. } => ast.approx_byte_size(),
            FunctionBody::Host { .. } => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{OffsetWidth, Payload, NodeTag};

    #[test]
    fn host_function_has_zero_ast_size() {
        let cell = FunctionCell::host(0x1000, 2);
        assert_eq!(cell.ast_size(), 0);
        assert_eq!(cell.body.arity(), 2);
    }

    #[test]
    fn script_function_reports_arity_from_params() {
        let mut b = Ast::builder(OffsetWidth::Narrow);
        let root = b.leaf(NodeTag::Block, Payload::None);
        let ast = b.finish();
        let cell = FunctionCell::script(ast, root, ObjectId::from_index(0), Some("f".into()), vec!["a".into(), "b".into()]);
        assert_eq!(cell.body.arity(), 2);
        assert_eq!(cell.body.name(), Some("f"));
    }
}
