use super::SourceFile;
use crate::assembler::ast::{Node, SourceLine};
use crate::assembler::query::{find_assignment_operand, find_mnemonic};
use crate::assembler::Error;
use crate::config::RunContext;

/// pic-as expects assembly sources to end in `.s`.
pub fn rename_files(file: &mut SourceFile, _context: &RunContext) -> Result<(), Error> {
    if let Some(stem) = file.name.strip_suffix(".asm") {
        debug!("renaming {} to {}.s", file.name, stem);
        file.name = format!("{}.s", stem);
    }
    Ok(())
}

/// Rewrites `#include` lines: angle brackets become quotes, header names
/// take the casing of the real project file, and the device header named
/// by `list p=...` becomes `<xc.inc>`.
pub fn fix_includes(file: &mut SourceFile, context: &RunContext) -> Result<(), Error> {
    let program = match &mut file.program {
        Some(program) => program,
        None => return Ok(()),
    };

    let chip = find_mnemonic(program, "list")
        .next()
        .and_then(|list| find_assignment_operand(list, "p"))
        .and_then(|p| match p {
            Node::ChipId { text } => Some(text.clone()),
            Node::Number { literal, .. } => Some(literal.clone()),
            _ => None,
        });
    let device_header = chip.map(|chip| format!("\"p{}.inc\"", chip));

    for line in program.lines.iter_mut() {
        let include = match line {
            SourceLine::Pragma(p) if p.pragma.eq_ignore_ascii_case("#include") => p,
            _ => continue,
        };

        if let Some(header) = include.value.strip_prefix('<').and_then(|v| v.strip_suffix('>')) {
            include.value = format!("\"{}\"", header);
        }

        let real = header_name(&include.value)
            .and_then(|header| context.project_file(header).filter(|real| *real != header));
        if let Some(real) = real {
            include.value = format!("\"{}\"", real);
        }

        if device_header.as_deref().map_or(false, |h| h.eq_ignore_ascii_case(&include.value)) {
            include.value = "<xc.inc>".to_string();
        }
    }
    Ok(())
}

/// The file named by an include value, without its quotes or brackets.
fn header_name(value: &str) -> Option<&str> {
    value
        .strip_prefix(|c: char| c == '"' || c == '<')?
        .strip_suffix(|c: char| c == '"' || c == '>')
}
