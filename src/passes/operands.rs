use super::SourceFile;
use crate::assembler::ast::{Node, NodeKind, Radix, SourceLine, UnaryOp};
use crate::assembler::query::{walk_all_operands, walk_operands, WalkContext};
use crate::assembler::Error;
use crate::config::RunContext;

/// `moviw`/`movwi` take FSR operands in a form the replacement map must not
/// touch.
const REPLACEMENT_EXEMPT: [&str; 2] = ["moviw", "movwi"];

/// Restyles every number literal in pic-as notation.
pub fn fix_numbers(file: &mut SourceFile, _context: &RunContext) -> Result<(), Error> {
    let program = match &mut file.program {
        Some(program) => program,
        None => return Ok(()),
    };

    walk_all_operands(program, NodeKind::Number, restyle_number);
    for (index, line) in program.lines.iter_mut().enumerate() {
        if let SourceLine::Define(define) = line {
            walk_operands(&mut define.operands, NodeKind::Number, index, &mut restyle_number);
        }
    }
    Ok(())
}

fn restyle_number(node: &mut Node, _: &WalkContext) {
    if let Node::Number { value, radix, literal } = node {
        *literal = match radix {
            Radix::Hexadecimal => format!("0x{:X}", value),
            Radix::Binary => format!("{:b}B", value),
            Radix::Decimal => value.to_string(),
            Radix::Octal => format!("{:o}q", value),
        };
    }
}

/// `#addr` operands lose the `#`.
pub fn fix_fixed_addresses(file: &mut SourceFile, _context: &RunContext) -> Result<(), Error> {
    if let Some(program) = &mut file.program {
        walk_all_operands(program, NodeKind::Unary, |node, _| {
            if let Node::Unary { op: UnaryOp::Pound, operand, .. } = node {
                let inner = operand.as_ref().clone();
                *node = inner;
            }
        });
    }
    Ok(())
}

pub fn replace_identifiers(file: &mut SourceFile, context: &RunContext) -> Result<(), Error> {
    let program = match &mut file.program {
        Some(program) if !context.replacement_map.is_empty() => program,
        _ => return Ok(()),
    };

    walk_all_operands(program, NodeKind::Identifier, |node, at| {
        if at.mnemonic.map_or(false, |m| REPLACEMENT_EXEMPT.iter().any(|e| m.eq_ignore_ascii_case(e))) {
            return;
        }
        if let Node::Identifier { name } = node {
            if let Some(replacement) = context.replacement(name) {
                *name = replacement.to_string();
            }
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::testing::{assert_output, run_pass};

    #[test]
    fn test_fix_numbers() {
        let output = run_pass(
            "test.asm",
            "#define SIZE 5\n movlw H'FF'\n movlw B'101'\n movlw O'101'\n movlw .14\n movlw A'a'",
            fix_numbers,
            &RunContext::new(),
        );
        assert_output(&output, "#define SIZE 0x5\nmovlw 0xFF\nmovlw 101B\nmovlw 101q\nmovlw 14\nmovlw 97");
    }

    #[test]
    fn test_fix_numbers_keeps_c_style_hex() {
        let output = run_pass("test.asm", " movlw 0xFF\n movlw 0x1f", fix_numbers, &RunContext::new());
        assert_output(&output, "movlw 0xFF\nmovlw 0x1F");
    }

    #[test]
    fn test_fix_numbers_nested() {
        let output = run_pass("test.asm", " movlw low (H'1f' + D'10')", fix_numbers, &RunContext::new());
        assert_output(&output, "movlw low (0x1F + 10)");
    }

    #[test]
    fn test_fix_fixed_addresses() {
        let output = run_pass("test.asm", " movlw #myaddr\n goto #start + 1", fix_fixed_addresses, &RunContext::new());
        assert_output(&output, "movlw myaddr\ngoto start + 1");
    }

    #[test]
    fn test_replace_identifiers() {
        let mut context = RunContext::new();
        context.add_replacements(vec![("FSR1".to_string(), "FSR1L".to_string())]);

        let output = run_pass("test.asm", " incf FSR1, f", replace_identifiers, &context);
        assert_output(&output, "incf FSR1L, f");

        let output = run_pass("test.asm", " movwi FSR1, f", replace_identifiers, &context);
        assert_output(&output, "movwi FSR1, f");
    }

    #[test]
    fn test_replace_identifiers_renames_callees() {
        let mut context = RunContext::new();
        context.add_replacements(vec![("scale".to_string(), "SCALE2".to_string())]);
        let output = run_pass("test.asm", " movlw scale(scale, 2)", replace_identifiers, &context);
        assert_output(&output, "movlw SCALE2(SCALE2, 2)");
    }
}
