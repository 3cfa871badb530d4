//! Helpers rewrite passes use to locate and mutate parts of a program.
use super::ast::*;

/// Statements whose mnemonic matches `mnemonic`, ignoring case.
pub fn find_mnemonic<'a>(program: &'a Program, mnemonic: &'a str) -> impl Iterator<Item = &'a Statement> + 'a {
    program.statements().filter(move |s| s.has_mnemonic(mnemonic))
}

pub fn find_mnemonic_mut<'a>(
    program: &'a mut Program,
    mnemonic: &'a str,
) -> impl Iterator<Item = &'a mut Statement> + 'a {
    program.statements_mut().filter(move |s| s.has_mnemonic(mnemonic))
}

/// The right-hand side of the first `name=value` operand of `statement`,
/// e.g. the `16f877` in `list p=16f877`.
pub fn find_assignment_operand<'a>(statement: &'a Statement, name: &str) -> Option<&'a Node> {
    statement.operands.iter().find_map(|operand| match operand {
        Node::Assign { op: AssignOp::Assign, left, right }
            if left.as_identifier().map_or(false, |n| n.eq_ignore_ascii_case(name)) =>
        {
            Some(right.as_ref())
        }
        _ => None,
    })
}

/// Where a visited node sits.
#[derive(Debug)]
pub struct WalkContext<'a> {
    /// Index of the enclosing line in the program.
    pub line: usize,
    pub label: Option<&'a str>,
    pub mnemonic: Option<&'a str>,
    /// Kinds of the enclosing nodes, outermost first.
    pub parents: &'a [NodeKind],
}

/// Visits every node of kind `kind` in `operands`, depth first. A matching
/// node is handed to `visit` and its own children are not searched, so the
/// callback is free to replace it.
pub fn walk_operands<F>(operands: &mut [Node], kind: NodeKind, line: usize, visit: &mut F)
where
    F: FnMut(&mut Node, &WalkContext),
{
    let context = WalkContext { line, label: None, mnemonic: None, parents: &[] };
    for operand in operands.iter_mut() {
        walk_node(operand, kind, &context, &mut Vec::new(), visit);
    }
}

/// [`walk_operands`] over every statement of `program`, with the
/// statement's label and mnemonic in the context.
pub fn walk_all_operands<F>(program: &mut Program, kind: NodeKind, mut visit: F)
where
    F: FnMut(&mut Node, &WalkContext),
{
    for (line, source_line) in program.lines.iter_mut().enumerate() {
        let statement = match source_line {
            SourceLine::Statement(statement) => statement,
            _ => continue,
        };
        let context = WalkContext {
            line,
            label: statement.label.as_deref(),
            mnemonic: statement.mnemonic.as_deref(),
            parents: &[],
        };
        for operand in statement.operands.iter_mut() {
            walk_node(operand, kind, &context, &mut Vec::new(), &mut visit);
        }
    }
}

fn walk_node<F>(node: &mut Node, kind: NodeKind, context: &WalkContext, parents: &mut Vec<NodeKind>, visit: &mut F)
where
    F: FnMut(&mut Node, &WalkContext),
{
    if node.kind() == kind {
        let here = WalkContext { parents: parents.as_slice(), ..*context };
        visit(node, &here);
        return;
    }

    parents.push(node.kind());
    match node {
        Node::Unary { operand, .. } | Node::Postfix { operand, .. } => walk_node(operand, kind, context, parents, visit),
        Node::Binary { left, right, .. } | Node::Assign { left, right, .. } => {
            walk_node(left, kind, context, parents, visit);
            walk_node(right, kind, context, parents, visit);
        }
        Node::Call { callee, args } => {
            walk_node(callee, kind, context, parents, visit);
            for arg in args.iter_mut() {
                walk_node(arg, kind, context, parents, visit);
            }
        }
        _ => {}
    }
    parents.pop();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::parser::parse_file;

    #[test]
    fn test_find_mnemonic() {
        let mut program = parse_file(" BCF STATUS, Z\n nop\n bcf PORTA, 1").unwrap();
        assert_eq!(find_mnemonic(&program, "bcf").count(), 2);
        assert_eq!(find_mnemonic(&program, "goto").count(), 0);

        for statement in find_mnemonic_mut(&mut program, "NOP") {
            statement.mnemonic = Some("clrwdt".to_string());
        }
        assert_eq!(find_mnemonic(&program, "clrwdt").count(), 1);
    }

    #[test]
    fn test_find_assignment_operand() {
        let program = parse_file(" list p=16f1939, r=dec").unwrap();
        let statement = find_mnemonic(&program, "list").next().unwrap();
        assert_eq!(
            find_assignment_operand(statement, "P"),
            Some(&Node::ChipId { text: "16f1939".to_string() })
        );
        assert_eq!(find_assignment_operand(statement, "r"), Some(&Node::identifier("dec")));
        assert_eq!(find_assignment_operand(statement, "x"), None);
    }

    #[test]
    fn test_walk_collects_context() {
        let mut program = parse_file("start movlw low x + 1\n#define Y z\n call f(a, -b)").unwrap();
        let mut seen = Vec::new();
        walk_all_operands(&mut program, NodeKind::Identifier, |node, context| {
            seen.push((
                node.as_identifier().unwrap_or_default().to_string(),
                context.line,
                context.label.map(str::to_string),
                context.parents.to_vec(),
            ));
        });

        assert_eq!(
            seen,
            vec![
                ("x".to_string(), 0, Some("start".to_string()), vec![NodeKind::Binary, NodeKind::Unary]),
                ("f".to_string(), 2, None, vec![NodeKind::Call]),
                ("a".to_string(), 2, None, vec![NodeKind::Call]),
                ("b".to_string(), 2, None, vec![NodeKind::Call, NodeKind::Unary]),
            ]
        );
    }

    #[test]
    fn test_walk_replaces_without_descending() {
        let mut program = parse_file(" movlw #a + #b").unwrap();
        let mut visits = 0;
        walk_all_operands(&mut program, NodeKind::Unary, |node, _| {
            visits += 1;
            if let Node::Unary { operand, .. } = node {
                *node = operand.as_ref().clone();
            }
        });
        assert_eq!(visits, 2);
        assert_eq!(program.lines[0].as_statement().unwrap().operands[0].to_string(), "a + b");
    }

    #[test]
    fn test_walk_operands_slice() {
        let mut operands = vec![Node::identifier("a"), Node::binary(BinaryOp::Add, Node::identifier("b"), Node::identifier("c"))];
        let mut names = Vec::new();
        walk_operands(&mut operands, NodeKind::Identifier, 7, &mut |node: &mut Node, context: &WalkContext| {
            assert_eq!(context.line, 7);
            names.push(node.to_string());
        });
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
