//! The recursive-descent parser (§4.1 "Parser"), built directly on the
//! one-token lookahead/pushback [`Scanner`] and emitting the flat [`Ast`]
//! via [`AstBuilder`]. Precedence climbing handles the binary/logical
//! operator ladder; everything else is one function per grammar production.
//!
//! Every expression-parsing function opens its node *before* knowing whether
//! it will be needed (e.g. `Assignment` wraps every conditional expression,
//! whether or not an assignment operator follows) and leaves it as a
//! single-child passthrough when it isn't — the interpreter treats a
//! `Payload::None` `Assignment`/`Sequence` node as "evaluate the one child".
//! This keeps the flat, append-only node table free of any need to splice
//! or renumber already-emitted subtrees.

use std::rc::Rc;

use crate::ast::{Ast, AstBuilder, AstTooLarge, NodeId, NodeTag, OffsetWidth, Payload};
use crate::exception::ParseError;
use crate::token::{Keyword, Scanner, Spanned, Token};

pub(crate) fn parse_program(src: &str, width: OffsetWidth) -> Result<Rc<Ast>, ParseError> {
    let mut p = Parser { scanner: Scanner::new(src), builder: Ast::builder(width) };
    let program = p.builder.open(NodeTag::Program, Payload::None);
    while !p.at_eof()? {
        p.statement()?;
    }
    p.close(program)?;
    Ok(p.builder.finish())
}

struct Parser<'a> {
    scanner: Scanner<'a>,
    builder: AstBuilder,
}

type PResult<T> = Result<T, ParseError>;

impl<'a> Parser<'a> {
    fn close(&mut self, id: NodeId) -> PResult<()> {
        self.builder
            .close(id)
            .map_err(|AstTooLarge| self.err("function or program body too large for the configured ast width"))
    }

    fn peek(&mut self) -> PResult<Spanned> {
        let tok = self.scanner.next_token()?;
        self.scanner.push_back(tok.clone());
        Ok(tok)
    }

    fn at_eof(&mut self) -> PResult<bool> {
        Ok(matches!(self.peek()?.token, Token::Eof))
    }

    fn next(&mut self) -> PResult<Spanned> {
        self.scanner.next_token()
    }

    fn err(&self, message: &str) -> ParseError {
        ParseError { line: 0, column: 0, message: message.to_owned() }
    }

    fn expect_punct(&mut self, p: &str) -> PResult<()> {
        let tok = self.next()?;
        match tok.token {
            Token::Punct(found) if found == p => Ok(()),
            other => Err(ParseError { line: tok.line, column: tok.column, message: format!("expected '{p}', found {other:?}") }),
        }
    }

    fn eat_punct(&mut self, p: &str) -> PResult<bool> {
        let tok = self.next()?;
        if matches!(tok.token, Token::Punct(found) if found == p) {
            Ok(true)
        } else {
            self.scanner.push_back(tok);
            Ok(false)
        }
    }

    fn eat_keyword(&mut self, k: Keyword) -> PResult<bool> {
        let tok = self.next()?;
        if matches!(&tok.token, Token::Keyword(found) if *found == k) {
            Ok(true)
        } else {
            self.scanner.push_back(tok);
            Ok(false)
        }
    }

    fn expect_identifier(&mut self) -> PResult<String> {
        let tok = self.next()?;
        match tok.token {
            Token::Identifier(name) => Ok(name),
            other => Err(ParseError { line: tok.line, column: tok.column, message: format!("expected identifier, found {other:?}") }),
        }
    }

    // Statements ------------------------------------------------------------

    fn statement(&mut self) -> PResult<()> {
        let tok = self.peek()?;
        match &tok.token {
            Token::Punct("{") => self.block(),
            Token::Punct(";") => {
                self.next()?;
                self.builder.leaf(NodeTag::Empty, Payload::None);
                Ok(())
            }
            Token::Keyword(Keyword::Var) => self.var_decl(),
            Token::Keyword(Keyword::If) => self.if_stmt(),
            Token::Keyword(Keyword::While) => self.while_stmt(),
            Token::Keyword(Keyword::Do) => self.do_while_stmt(),
            Token::Keyword(Keyword::For) => self.for_stmt(),
            Token::Keyword(Keyword::Return) => self.return_stmt(),
            Token::Keyword(Keyword::Break) => self.simple_jump(NodeTag::Break),
            Token::Keyword(Keyword::Continue) => self.simple_jump(NodeTag::Continue),
            Token::Keyword(Keyword::Throw) => self.throw_stmt(),
            Token::Keyword(Keyword::Try) => self.try_stmt(),
            Token::Keyword(Keyword::Function) => self.function_decl(),
            _ => self.expr_stmt(),
        }
    }

    fn block(&mut self) -> PResult<()> {
        self.expect_punct("{")?;
        let node = self.builder.open(NodeTag::Block, Payload::None);
        while !self.eat_punct("}")? {
            self.statement()?;
        }
        self.close(node)
    }

    fn semicolon(&mut self) -> PResult<()> {
        self.eat_punct(";")?;
        Ok(())
    }

    fn var_decl(&mut self) -> PResult<()> {
        self.next()?; // 'var'
        let node = self.builder.open(NodeTag::VarDecl, Payload::None);
        self.var_declarator_list()?;
        self.semicolon()?;
        self.close(node)
    }

    fn var_declarator_list(&mut self) -> PResult<()> {
        loop {
            let decl = self.builder.open(NodeTag::VarDeclarator, Payload::None);
            let name = self.expect_identifier()?;
            let idx = self.builder.intern(&name);
            self.builder.leaf(NodeTag::Identifier, Payload::StringRef(idx));
            if self.eat_punct("=")? {
                self.assignment_expr()?;
            }
            self.close(decl)?;
            if !self.eat_punct(",")? {
                break;
            }
        }
        Ok(())
    }

    fn if_stmt(&mut self) -> PResult<()> {
        self.next()?;
        let node = self.builder.open(NodeTag::If, Payload::None);
        self.expect_punct("(")?;
        self.expr()?;
        self.expect_punct(")")?;
        self.statement()?;
        if self.eat_keyword(Keyword::Else)? {
            self.statement()?;
        } else {
            self.builder.leaf(NodeTag::Empty, Payload::None);
        }
        self.close(node)
    }

    fn while_stmt(&mut self) -> PResult<()> {
        self.next()?;
        let node = self.builder.open(NodeTag::While, Payload::None);
        self.expect_punct("(")?;
        self.expr()?;
        self.expect_punct(")")?;
        self.statement()?;
        self.close(node)
    }

    fn do_while_stmt(&mut self) -> PResult<()> {
        self.next()?;
        let node = self.builder.open(NodeTag::DoWhile, Payload::None);
        self.statement()?;
        if !self.eat_keyword(Keyword::While)? {
            return Err(self.err("expected 'while' after 'do' body"));
        }
        self.expect_punct("(")?;
        self.expr()?;
        self.expect_punct(")")?;
        self.semicolon()?;
        self.close(node)
    }

    /// Disambiguates classic `for (init; cond; update)` from `for (x in obj)`
    /// by scanning the init clause first and checking for a following `in`.
    fn for_stmt(&mut self) -> PResult<()> {
        self.next()?;
        self.expect_punct("(")?;

        let is_var = self.eat_keyword(Keyword::Var)?;
        let lead_identifier = match self.peek()?.token {
            Token::Identifier(name) => Some(name),
            _ => None,
        };

        if let Some(name) = lead_identifier.clone() {
            self.next()?; // consume the identifier we peeked
            if self.eat_keyword(Keyword::In)? {
                let node = self.builder.open(NodeTag::ForIn, Payload::None);
                let idx = self.builder.intern(&name);
                self.builder.leaf(NodeTag::Identifier, Payload::StringRef(idx));
                self.expr()?;
                self.expect_punct(")")?;
                self.statement()?;
                return self.close(node);
            }
            // Not a for-in: build the classic for-loop's init clause ourselves,
            // since we already consumed the leading identifier.
            let node = self.builder.open(NodeTag::For, Payload::None);
            let init = self.builder.open(NodeTag::VarDecl, Payload::None);
            if is_var {
                let decl = self.builder.open(NodeTag::VarDeclarator, Payload::None);
                let idx = self.builder.intern(&name);
                self.builder.leaf(NodeTag::Identifier, Payload::StringRef(idx));
                if self.eat_punct("=")? {
                    self.assignment_expr()?;
                }
                self.close(decl)?;
                if self.eat_punct(",")? {
                    self.var_declarator_list()?;
                }
            } else {
                // Plain `for (i = 0; ...)`: reuse the Assignment node's
                // speculative-wrapper convention (see module docs) instead of
                // VarDeclarator, since there is no declaration here.
                let assign = self.builder.open(NodeTag::Assignment, Payload::None);
                let idx = self.builder.intern(&name);
                self.builder.leaf(NodeTag::Identifier, Payload::StringRef(idx));
                if self.eat_punct("=")? {
                    let op_idx = self.builder.intern("=");
                    self.assignment_expr()?;
                    self.builder.set_payload(assign, Payload::BinaryOp { op: op_idx });
                }
                self.close(assign)?;
            }
            self.close(init)?;
            self.expect_punct(";")?;
            return self.for_rest(node);
        }

        let node = self.builder.open(NodeTag::For, Payload::None);
        if self.eat_punct(";")? {
            self.builder.leaf(NodeTag::Empty, Payload::None);
        } else {
            self.expr_no_in()?;
            self.expect_punct(";")?;
        }
        self.for_rest(node)
    }

    fn for_rest(&mut self, node: NodeId) -> PResult<()> {
        if self.eat_punct(";")? {
            self.builder.leaf(NodeTag::Empty, Payload::None);
        } else {
            self.expr()?;
            self.expect_punct(";")?;
        }
        if self.eat_punct(")")? {
            self.builder.leaf(NodeTag::Empty, Payload::None);
        } else {
            self.expr()?;
            self.expect_punct(")")?;
        }
        self.statement()?;
        self.close(node)
    }

    fn return_stmt(&mut self) -> PResult<()> {
        self.next()?;
        let node = self.builder.open(NodeTag::Return, Payload::None);
        if self.eat_punct(";")? {
            self.builder.leaf(NodeTag::UndefinedLiteral, Payload::None);
        } else {
            let tok = self.peek()?;
            if matches!(tok.token, Token::Punct("}") | Token::Eof) {
                self.builder.leaf(NodeTag::UndefinedLiteral, Payload::None);
            } else {
                self.expr()?;
                self.semicolon()?;
            }
        }
        self.close(node)
    }

    fn simple_jump(&mut self, tag: NodeTag) -> PResult<()> {
        self.next()?;
        let node = self.builder.open(tag, Payload::None);
        self.semicolon()?;
        self.close(node)
    }

    fn throw_stmt(&mut self) -> PResult<()> {
        self.next()?;
        let node = self.builder.open(NodeTag::Throw, Payload::None);
        self.expr()?;
        self.semicolon()?;
        self.close(node)
    }

    fn try_stmt(&mut self) -> PResult<()> {
        self.next()?;
        let node = self.builder.open(NodeTag::Try, Payload::None);
        self.block()?;
        if self.eat_keyword(Keyword::Catch)? {
            let catch = self.builder.open(NodeTag::CatchClause, Payload::None);
            self.expect_punct("(")?;
            let name = self.expect_identifier()?;
            let idx = self.builder.intern(&name);
            self.builder.leaf(NodeTag::Identifier, Payload::StringRef(idx));
            self.expect_punct(")")?;
            self.block()?;
            self.close(catch)?;
        } else {
            self.builder.leaf(NodeTag::Empty, Payload::None);
        }
        if self.eat_keyword(Keyword::Finally)? {
            self.block()?;
        } else {
            self.builder.leaf(NodeTag::Empty, Payload::None);
        }
        self.close(node)
    }

    fn function_decl(&mut self) -> PResult<()> {
        self.next()?;
        let name = self.expect_identifier()?;
        self.function_tail(NodeTag::FunctionDecl, Some(name)).map(|_| ())
    }

    fn function_tail(&mut self, tag: NodeTag, name: Option<String>) -> PResult<NodeId> {
        let name_idx = name.as_deref().map(|n| self.builder.intern(n));
        self.expect_punct("(")?;
        let mut params = Vec::new();
        if !self.eat_punct(")")? {
            loop {
                params.push(self.expect_identifier()?);
                if !self.eat_punct(",")? {
                    break;
                }
            }
            self.expect_punct(")")?;
        }
        let node = self.builder.open(tag, Payload::FunctionHeader { name: name_idx, param_count: params.len() as u32 });
        for p in &params {
            let idx = self.builder.intern(p);
            self.builder.leaf(NodeTag::Identifier, Payload::StringRef(idx));
        }
        self.block()?;
        self.close(node)?;
        Ok(node)
    }

    fn expr_stmt(&mut self) -> PResult<()> {
        let node = self.builder.open(NodeTag::ExprStatement, Payload::None);
        self.expr()?;
        self.semicolon()?;
        self.close(node)
    }

    // Expressions -------------------------------------------------------------

    fn expr(&mut self) -> PResult<NodeId> {
        self.sequence_expr()
    }

    /// `for`-header clauses forbid a bare top-level `in` (it would be
    /// ambiguous with `for (x in y)`). The restriction only matters for a
    /// hypothetical relational `in` at the very top level of the init
    /// clause, which the grammar subset here does not otherwise produce
    /// inside an lvalue position, so this is a thin alias kept for clarity.
    fn expr_no_in(&mut self) -> PResult<NodeId> {
        self.assignment_expr()
    }

    fn sequence_expr(&mut self) -> PResult<NodeId> {
        let node = self.builder.open(NodeTag::Sequence, Payload::None);
        self.assignment_expr()?;
        while self.eat_punct(",")? {
            self.assignment_expr()?;
        }
        self.close(node)?;
        Ok(node)
    }

    const ASSIGN_OPS: &'static [&'static str] = &["=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<=", ">>="];

    fn assignment_expr(&mut self) -> PResult<NodeId> {
        let node = self.builder.open(NodeTag::Assignment, Payload::None);
        self.conditional_expr()?;
        let tok = self.next()?;
        if let Token::Punct(p) = tok.token {
            if Self::ASSIGN_OPS.contains(&p) {
                let idx = self.builder.intern(p);
                self.assignment_expr()?;
                self.builder.set_payload(node, Payload::BinaryOp { op: idx });
                self.close(node)?;
                return Ok(node);
            }
        }
        self.scanner.push_back(tok);
        self.close(node)?;
        Ok(node)
    }

    fn conditional_expr(&mut self) -> PResult<NodeId> {
        let node = self.builder.open(NodeTag::Conditional, Payload::None);
        self.binary_expr()?;
        if self.eat_punct("?")? {
            self.assignment_expr()?;
            self.expect_punct(":")?;
            self.assignment_expr()?;
        }
        self.close(node)?;
        Ok(node)
    }

    /// Parses the whole `||` .. `*` precedence ladder as one flat `Binary`
    /// node: an operand, then `(operator marker, operand)` pairs for every
    /// subsequent binary operator regardless of its precedence tier. The
    /// interpreter folds this flat sequence using
    /// [`crate::ast::binary_precedence`] at evaluation time (see the module
    /// docs at the top of this file for why the parser doesn't nest here).
    fn binary_expr(&mut self) -> PResult<NodeId> {
        let node = self.builder.open(NodeTag::Binary, Payload::None);
        self.unary_expr()?;
        loop {
            let tok = self.peek()?;
            let op = match &tok.token {
                Token::Punct(p) if crate::ast::binary_precedence(p).is_some() => *p,
                Token::Keyword(Keyword::Instanceof) => "instanceof",
                Token::Keyword(Keyword::In) => "in",
                _ => break,
            };
            self.next()?;
            let idx = self.builder.intern(op);
            self.builder.leaf(NodeTag::BinaryOpMarker, Payload::BinaryOp { op: idx });
            self.unary_expr()?;
        }
        self.close(node)?;
        Ok(node)
    }

    fn unary_expr(&mut self) -> PResult<NodeId> {
        let tok = self.peek()?;
        let prefix_op: Option<&'static str> = match &tok.token {
            Token::Punct(p @ ("!" | "-" | "+" | "~" | "++" | "--")) => Some(p),
            Token::Keyword(Keyword::Typeof) => Some("typeof"),
            Token::Keyword(Keyword::Void) => Some("void"),
            Token::Keyword(Keyword::Delete) => Some("delete"),
            _ => None,
        };
        if let Some(op) = prefix_op {
            self.next()?;
            let idx = self.builder.intern(op);
            let node = self.builder.open(NodeTag::Unary, Payload::UnaryOp { op: idx, prefix: true });
            self.unary_expr()?;
            self.close(node)?;
            return Ok(node);
        }
        self.postfix_expr()
    }

    fn postfix_expr(&mut self) -> PResult<NodeId> {
        let node = self.builder.open(NodeTag::Unary, Payload::None);
        self.call_expr()?;
        let tok = self.next()?;
        if let Token::Punct(p @ ("++" | "--")) = tok.token {
            let idx = self.builder.intern(p);
            self.builder.set_payload(node, Payload::UnaryOp { op: idx, prefix: false });
        } else {
            self.scanner.push_back(tok);
        }
        self.close(node)?;
        Ok(node)
    }

    /// Parses `new`/call/member chains: `new Foo(a).b[c](d)`.
    ///
    /// A naive version of this would close `primary_expr`'s node and then
    /// open a new `Member`/`Call` node to wrap it — but by the time we know
    /// a `.`/`[`/`(` follows, the base subtree is already closed and its
    /// position in the flat table is fixed, so it can no longer become a
    /// child of a node opened afterward. `CallChain` sidesteps this the same
    /// way `binary_expr` does: open the wrapper first, then append the base
    /// and every subsequent step as its children, flattening what would
    /// otherwise be nested member/call expressions into one chain.
    fn call_expr(&mut self) -> PResult<NodeId> {
        let chain = self.builder.open(NodeTag::CallChain, Payload::None);
        if self.eat_keyword(Keyword::New)? {
            self.new_expr()?;
        } else {
            self.primary_expr()?;
        }
        self.chain_steps()?;
        self.close(chain)?;
        Ok(chain)
    }

    /// Parses zero or more trailing `.name` / `[expr]` / `(args)` steps as
    /// children of the currently open chain node (`CallChain` or `New`).
    fn chain_steps(&mut self) -> PResult<()> {
        loop {
            if self.eat_punct(".")? {
                let step = self.builder.open(NodeTag::MemberStep, Payload::None);
                let name = self.expect_identifier()?;
                let idx = self.builder.intern(&name);
                self.builder.set_payload(step, Payload::MemberStep { computed: false, name: Some(idx) });
                self.close(step)?;
            } else if self.eat_punct("[")? {
                let step = self.builder.open(NodeTag::MemberStep, Payload::MemberStep { computed: true, name: None });
                self.expr()?;
                self.expect_punct("]")?;
                self.close(step)?;
            } else if self.eat_punct("(")? {
                let step = self.builder.open(NodeTag::CallStep, Payload::None);
                self.call_args()?;
                self.close(step)?;
            } else {
                break;
            }
        }
        Ok(())
    }

    fn call_args(&mut self) -> PResult<()> {
        if !self.eat_punct(")")? {
            loop {
                self.assignment_expr()?;
                if !self.eat_punct(",")? {
                    break;
                }
            }
            self.expect_punct(")")?;
        }
        Ok(())
    }

    /// Parses the callee of `new callee(args)`: a primary expression
    /// followed by `.`/`[` member steps only (no calls bind to `new` without
    /// an explicit paren list), then an optional single argument list.
    /// Already assumes `new` was consumed.
    fn new_expr(&mut self) -> PResult<()> {
        let node = self.builder.open(NodeTag::New, Payload::None);
        if self.eat_keyword(Keyword::New)? {
            self.new_expr()?;
        } else {
            self.primary_expr()?;
        }
        loop {
            if self.eat_punct(".")? {
                let step = self.builder.open(NodeTag::MemberStep, Payload::None);
                let name = self.expect_identifier()?;
                let idx = self.builder.intern(&name);
                self.builder.set_payload(step, Payload::MemberStep { computed: false, name: Some(idx) });
                self.close(step)?;
            } else if self.eat_punct("[")? {
                let step = self.builder.open(NodeTag::MemberStep, Payload::MemberStep { computed: true, name: None });
                self.expr()?;
                self.expect_punct("]")?;
                self.close(step)?;
            } else {
                break;
            }
        }
        if self.eat_punct("(")? {
            let step = self.builder.open(NodeTag::CallStep, Payload::None);
            self.call_args()?;
            self.close(step)?;
        }
        self.close(node)
    }

    fn primary_expr(&mut self) -> PResult<NodeId> {
        let tok = self.next()?;
        let id = match tok.token {
            Token::Number(n) => self.builder.leaf(NodeTag::NumberLiteral, Payload::Number(n)),
            Token::String(s) => {
                let idx = self.builder.intern(&s);
                self.builder.leaf(NodeTag::StringLiteral, Payload::StringRef(idx))
            }
            Token::Identifier(name) => {
                let idx = self.builder.intern(&name);
                self.builder.leaf(NodeTag::Identifier, Payload::StringRef(idx))
            }
            Token::Keyword(Keyword::True) => self.builder.leaf(NodeTag::BoolLiteral, Payload::Bool(true)),
            Token::Keyword(Keyword::False) => self.builder.leaf(NodeTag::BoolLiteral, Payload::Bool(false)),
            Token::Keyword(Keyword::Null) => self.builder.leaf(NodeTag::NullLiteral, Payload::None),
            Token::Keyword(Keyword::Undefined) => self.builder.leaf(NodeTag::UndefinedLiteral, Payload::None),
            Token::Keyword(Keyword::This) => self.builder.leaf(NodeTag::ThisExpr, Payload::None),
            Token::Keyword(Keyword::Function) => {
                let name = {
                    let peek = self.peek()?;
                    if let Token::Identifier(n) = peek.token {
                        self.next()?;
                        Some(n)
                    } else {
                        None
                    }
                };
                self.function_tail(NodeTag::FunctionExpr, name)?
            }
            Token::Punct("(") => {
                let id = self.expr()?;
                self.expect_punct(")")?;
                id
            }
            Token::Punct("[") => self.array_literal()?,
            Token::Punct("{") => self.object_literal()?,
            other => return Err(ParseError { line: tok.line, column: tok.column, message: format!("unexpected token {other:?}") }),
        };
        Ok(id)
    }

    fn array_literal(&mut self) -> PResult<NodeId> {
        let node = self.builder.open(NodeTag::ArrayLiteral, Payload::None);
        if !self.eat_punct("]")? {
            loop {
                if matches!(self.peek()?.token, Token::Punct("]")) {
                    break;
                }
                self.assignment_expr()?;
                if !self.eat_punct(",")? {
                    break;
                }
            }
            self.expect_punct("]")?;
        }
        self.close(node)?;
        Ok(node)
    }

    fn object_literal(&mut self) -> PResult<NodeId> {
        let node = self.builder.open(NodeTag::ObjectLiteral, Payload::None);
        if !self.eat_punct("}")? {
            loop {
                let prop = self.builder.open(NodeTag::ObjectProperty, Payload::None);
                let key_tok = self.next()?;
                let key = match key_tok.token {
                    Token::Identifier(s) | Token::String(s) => s,
                    Token::Number(n) => crate::coerce::number_to_string(n),
                    other => {
                        return Err(ParseError { line: key_tok.line, column: key_tok.column, message: format!("invalid object literal key {other:?}") })
                    }
                };
                let idx = self.builder.intern(&key);
                self.builder.leaf(NodeTag::Identifier, Payload::StringRef(idx));
                self.expect_punct(":")?;
                self.assignment_expr()?;
                self.close(prop)?;
                if !self.eat_punct(",")? {
                    break;
                }
            }
            self.expect_punct("}")?;
        }
        self.close(node)?;
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Rc<Ast> {
        parse_program(src, OffsetWidth::Narrow).expect("parse should succeed")
    }

    #[test]
    fn parses_var_decl_and_expression_statement() {
        let ast = parse("var x = 1; x + 2;");
        assert!(ast.node_count() > 1);
    }

    #[test]
    fn parses_function_and_call() {
        let ast = parse("function sq(x) { return x * x; } sq(4);");
        assert!(ast.node_count() > 1);
    }

    #[test]
    fn parses_member_chain_for_array_scenario() {
        let ast = parse("a.map(function(x){return x*x;}).join(',');");
        assert!(ast.node_count() > 1);
    }

    #[test]
    fn parses_for_in_and_classic_for() {
        parse("for (var i = 0; i < 10; i++) { x += i; }");
        parse("for (k in obj) { y = k; }");
    }

    #[test]
    fn rejects_unterminated_string() {
        let err = parse_program("var x = \"oops;", OffsetWidth::Narrow);
        assert!(err.is_err());
    }
}
