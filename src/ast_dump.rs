//! The `compile` binary/text AST dump (§6 "AST binary format", §10.6).
//!
//! Binary layout: `[magic u32][version u16][root_offset][node_count
//! u32][nodes...][string_count u32][strings...]`. `root_offset` is always 0
//! in this representation (the root is always the first table slot) but is
//! still emitted so a reader doesn't have to special-case it against the
//! spec's documented header shape. Each node's `subtree_size` doubles as the
//! format's child-offset table: a reader reconstructs the tree the same way
//! [`crate::ast::Ast::children`] does, by skipping `subtree_size` slots
//! rather than following an explicit list of child pointers.

use std::io::Write;

use crate::ast::{Ast, AstTooLarge, NodeTag, NodeId, OffsetWidth, Payload};

pub(crate) fn write_binary(ast: &Ast, out: &mut impl Write) -> Result<(), AstTooLarge> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&crate::ast::AST_MAGIC.to_le_bytes());
    buf.extend_from_slice(&crate::ast::AST_VERSION.to_le_bytes());
    let root_offset: u32 = 0;
    buf.extend_from_slice(&root_offset.to_le_bytes());
    buf.extend_from_slice(&(ast.node_count() as u32).to_le_bytes());
    for i in 0..ast.node_count() {
        let node = ast.node(NodeId::from_index(i));
        write_node(&mut buf, node.tag, node.payload, node.subtree_size, ast.width);
    }
    buf.extend_from_slice(&(ast.string_count() as u32).to_le_bytes());
    for i in 0..ast.string_count() {
        let s = ast.string(i as u32);
        buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
        buf.extend_from_slice(s.as_bytes());
    }
    out.write_all(&buf).expect("writing to an in-memory or already-opened stream does not fail here");
    Ok(())
}

fn write_node(buf: &mut Vec<u8>, tag: NodeTag, payload: Payload, subtree_size: u32, width: OffsetWidth) {
    buf.push(tag_byte(tag));
    match width {
        OffsetWidth::Narrow => buf.extend_from_slice(&(subtree_size as u16).to_le_bytes()),
        OffsetWidth::Wide => buf.extend_from_slice(&subtree_size.to_le_bytes()),
    }
    write_payload(buf, payload);
}

fn write_payload(buf: &mut Vec<u8>, payload: Payload) {
    match payload {
        Payload::None => buf.push(0),
        Payload::Number(n) => {
            buf.push(1);
            buf.extend_from_slice(&n.to_le_bytes());
        }
        Payload::Bool(b) => {
            buf.push(2);
            buf.push(u8::from(b));
        }
        Payload::StringRef(idx) => {
            buf.push(3);
            buf.extend_from_slice(&idx.to_le_bytes());
        }
        Payload::FunctionHeader { name, param_count } => {
            buf.push(4);
            buf.extend_from_slice(&name.unwrap_or(u32::MAX).to_le_bytes());
            buf.extend_from_slice(&param_count.to_le_bytes());
        }
        Payload::UnaryOp { op, prefix } => {
            buf.push(5);
            buf.extend_from_slice(&op.to_le_bytes());
            buf.push(u8::from(prefix));
        }
        Payload::BinaryOp { op } => {
            buf.push(6);
            buf.extend_from_slice(&op.to_le_bytes());
        }
        Payload::MemberStep { computed, name } => {
            buf.push(7);
            buf.push(u8::from(computed));
            buf.extend_from_slice(&name.unwrap_or(u32::MAX).to_le_bytes());
        }
    }
}

fn tag_byte(tag: NodeTag) -> u8 {
    // Stable only for the lifetime of a single dump/reload pair produced by
    // this build; not guaranteed across `AST_VERSION` bumps.
    tag as u8
}

/// A human-readable s-expression rendering, for `compile(src, binary=false,
/// ...)` and ad hoc debugging. Not meant to be re-parsed.
pub(crate) fn write_text(ast: &Ast, out: &mut impl Write) -> Result<(), AstTooLarge> {
    write_text_node(ast, ast.root(), 0, out).expect("writing to an in-memory or already-opened stream does not fail here");
    Ok(())
}

fn write_text_node(ast: &Ast, id: NodeId, depth: usize, out: &mut impl Write) -> std::io::Result<()> {
    let node = ast.node(id);
    write!(out, "{}", "  ".repeat(depth))?;
    write!(out, "{:?}", node.tag)?;
    match node.payload {
        Payload::None => {}
        Payload::Number(n) => write!(out, " {n}")?,
        Payload::Bool(b) => write!(out, " {b}")?,
        Payload::StringRef(idx) => write!(out, " {:?}", ast.string(idx))?,
        Payload::FunctionHeader { name, param_count } => {
            write!(out, " name={:?} params={param_count}", name.map(|n| ast.string(n)))?;
        }
        Payload::UnaryOp { op, prefix } => write!(out, " op={:?} prefix={prefix}", ast.string(op))?,
        Payload::BinaryOp { op } => write!(out, " op={:?}", ast.string(op))?,
        Payload::MemberStep { computed, name } => {
            write!(out, " computed={computed} name={:?}", name.map(|n| ast.string(n)))?;
        }
    }
    writeln!(out)?;
    for child in ast.children(id) {
        write_text_node(ast, child, depth + 1, out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_program;

    #[test]
    fn binary_dump_starts_with_the_documented_header() {
        let ast = parse_program("1+2", OffsetWidth::Narrow).unwrap();
        let mut buf = Vec::new();
        write_binary(&ast, &mut buf).unwrap();
        assert_eq!(&buf[0..4], &crate::ast::AST_MAGIC.to_le_bytes());
        assert_eq!(&buf[4..6], &crate::ast::AST_VERSION.to_le_bytes());
    }

    #[test]
    fn text_dump_lists_every_node_once() {
        let ast = parse_program("var a = 1;", OffsetWidth::Narrow).unwrap();
        let mut buf = Vec::new();
        write_text(&ast, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), ast.node_count());
    }
}
