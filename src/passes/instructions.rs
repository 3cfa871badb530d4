use super::SourceFile;
use crate::assembler::ast::{Node, SourceLine, Statement};
use crate::assembler::parser::parse_operand;
use crate::assembler::query::find_mnemonic_mut;
use crate::assembler::Error;
use crate::config::RunContext;

const BIT_INSTRUCTIONS: [&str; 4] = ["bcf", "bsf", "btfsc", "btfss"];

/// Maps `REG, BIT` pairs through the register map, so that
/// `btfss STATUS, Z` can become `btfss ZERO ; STATUS.Z`. Defines of the
/// form `#define NAME REG, BIT` are rewritten the same way.
pub fn fix_bit_instructions(file: &mut SourceFile, context: &RunContext) -> Result<(), Error> {
    let program = match &mut file.program {
        Some(program) => program,
        None => return Ok(()),
    };

    for line in program.lines.iter_mut() {
        match line {
            SourceLine::Statement(statement) if is_bit_instruction(statement) => {
                if let Some((register, bit, operands)) = remap(&statement.operands, context)? {
                    statement.operands = operands;
                    if statement.comment.is_none() {
                        statement.comment = Some(format!("{}.{}", register, bit));
                    }
                }
            }
            SourceLine::Define(define) => {
                if let Some((_, _, operands)) = remap(&define.operands, context)? {
                    define.operands = operands;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn is_bit_instruction(statement: &Statement) -> bool {
    BIT_INSTRUCTIONS.iter().any(|m| statement.has_mnemonic(m))
}

/// The replacement operands for a mapped `REG, BIT` pair, if any. The
/// mapped value is split on `.` into separate operands.
fn remap(operands: &[Node], context: &RunContext) -> Result<Option<(String, String, Vec<Node>)>, Error> {
    let (register, bit) = match operands {
        [reg, bit] => match (reg.as_identifier(), bit.as_identifier()) {
            (Some(reg), Some(bit)) => (reg, bit),
            _ => return Ok(None),
        },
        _ => return Ok(None),
    };

    let mapped = match context.register(register, bit) {
        Some(mapped) => mapped,
        None => return Ok(None),
    };
    debug!("mapping {}.{} to {}", register, bit, mapped);

    let operands = mapped.split('.').map(parse_operand).collect::<Result<Vec<_>, _>>()?;
    Ok(Some((register.to_string(), bit.to_string(), operands)))
}

/// `addfsr FSR1L, k` becomes `addfsr 1, k`.
pub fn fix_addfsr(file: &mut SourceFile, _context: &RunContext) -> Result<(), Error> {
    if let Some(program) = &mut file.program {
        for statement in find_mnemonic_mut(program, "addfsr") {
            let index = match statement.operands.as_slice() {
                [Node::Identifier { name }, Node::Number { .. }] => fsr_index(name),
                _ => None,
            };
            if let Some(index) = index {
                statement.operands[0] = parse_operand(&index.to_string())?;
            }
        }
    }
    Ok(())
}

/// The digit in `FSRn...`.
fn fsr_index(name: &str) -> Option<char> {
    let mut chars = name.chars();
    let prefix: String = chars.by_ref().take(3).collect();
    if !prefix.eq_ignore_ascii_case("FSR") {
        return None;
    }
    chars.next().filter(char::is_ascii_digit)
}

/// `addwfc X, X` and `subwfb X, X` become `... X, f`.
pub fn fix_addwfc(file: &mut SourceFile, _context: &RunContext) -> Result<(), Error> {
    if let Some(program) = &mut file.program {
        for mnemonic in ["addwfc", "subwfb"] {
            for statement in find_mnemonic_mut(program, mnemonic) {
                let same = match statement.operands.as_slice() {
                    [a, b] => a.as_identifier().is_some() && a.as_identifier() == b.as_identifier(),
                    _ => false,
                };
                if same {
                    statement.operands[1] = Node::identifier("f");
                }
            }
        }
    }
    Ok(())
}
