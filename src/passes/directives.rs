use super::SourceFile;
use crate::assembler::ast::{Node, NodeKind, Pragma, SourceLine, Statement};
use crate::assembler::parser::parse_operand;
use crate::assembler::query::{find_mnemonic_mut, walk_operands, WalkContext};
use crate::assembler::Error;
use crate::config::RunContext;

/// `EXTERN a, b` becomes `GLOBAL a, b`.
pub fn fix_externs(file: &mut SourceFile, _context: &RunContext) -> Result<(), Error> {
    if let Some(program) = &mut file.program {
        for statement in find_mnemonic_mut(program, "extern") {
            statement.mnemonic = Some("GLOBAL".to_string());
        }
    }
    Ok(())
}

/// `RES n` becomes `DS n`.
pub fn fix_res(file: &mut SourceFile, _context: &RunContext) -> Result<(), Error> {
    if let Some(program) = &mut file.program {
        for statement in find_mnemonic_mut(program, "res") {
            statement.mnemonic = Some("DS".to_string());
        }
    }
    Ok(())
}

/// `__CONFIG _CONFIG1, _FOSC_HS & _WDTE_OFF` becomes
/// `config FOSC=HS, WDTE=OFF`. Identifiers without a `_FLAG_VALUE` shape,
/// such as the word selector, are dropped.
pub fn fix_configs(file: &mut SourceFile, _context: &RunContext) -> Result<(), Error> {
    let program = match &mut file.program {
        Some(program) => program,
        None => return Ok(()),
    };

    for (index, line) in program.lines.iter_mut().enumerate() {
        let statement = match line {
            SourceLine::Statement(s) if s.has_mnemonic("__CONFIG") => s,
            _ => continue,
        };

        let mut settings = Vec::new();
        walk_operands(&mut statement.operands, NodeKind::Identifier, index, &mut |node: &mut Node, _: &WalkContext| {
            if let Some(setting) = node.as_identifier().and_then(config_setting) {
                settings.push(setting);
            }
        });

        statement.mnemonic = Some("config".to_string());
        statement.operands = settings
            .iter()
            .map(|(flag, value)| parse_operand(&format!("{}={}", flag, value)))
            .collect::<Result<_, _>>()?;
    }
    Ok(())
}

/// Splits `_FOSC_HS` into `("FOSC", "HS")`.
fn config_setting(name: &str) -> Option<(String, String)> {
    let (flag, value) = name.strip_prefix('_')?.rsplit_once('_')?;
    if flag.is_empty() || value.is_empty() {
        return None;
    }
    Some((flag.to_string(), value.to_string()))
}

/// `NAME UDATA` and `NAME CODE` sections become PSECTs. A CODE section at a
/// fixed address turns into a labelled absolute PSECT followed by an `ORG`.
pub fn fix_psects(file: &mut SourceFile, _context: &RunContext) -> Result<(), Error> {
    let stem = file.stem().to_uppercase();
    let program = match &mut file.program {
        Some(program) => program,
        None => return Ok(()),
    };

    for statement in find_mnemonic_mut(program, "udata") {
        let name = statement.label.take().unwrap_or_else(|| format!("{}_UDATA", stem));
        statement.mnemonic = Some("PSECT".to_string());
        statement.operands = vec![Node::identifier(name), parse_operand("class=UDATA")?];
    }

    let mut index = 0;
    while index < program.len() {
        let statement = match program.lines[index].as_statement_mut() {
            Some(s) if s.has_mnemonic("code") => s,
            _ => {
                index += 1;
                continue;
            }
        };

        let name = statement.label.take().unwrap_or_else(|| format!("{}_CODE", stem));
        let mut operands = vec![
            Node::identifier(name.clone()),
            parse_operand("class=CODE")?,
            parse_operand("delta=2")?,
        ];

        match statement.operands.first() {
            Some(address @ Node::Number { .. }) => {
                let origin = Statement {
                    mnemonic: Some("ORG".to_string()),
                    operands: vec![address.clone()],
                    ..Statement::default()
                };
                operands.push(Node::identifier("abs"));
                let psect = Statement {
                    label: Some(name),
                    mnemonic: Some("PSECT".to_string()),
                    operands,
                    comment: statement.comment.take(),
                };
                program.splice(index, vec![SourceLine::Statement(psect), SourceLine::Statement(origin)]);
                index += 2;
            }
            _ => {
                statement.mnemonic = Some("PSECT".to_string());
                statement.operands = operands;
                index += 1;
            }
        }
    }
    Ok(())
}

/// `ifdef NAME` statements become `#ifdef NAME` pragmas, and so does the
/// first `endif` after each of them.
pub fn fix_ifdefs(file: &mut SourceFile, _context: &RunContext) -> Result<(), Error> {
    let program = match &mut file.program {
        Some(program) => program,
        None => return Ok(()),
    };

    for index in 0..program.len() {
        let (name, comment) = match &program.lines[index] {
            SourceLine::Statement(s) if s.has_mnemonic("ifdef") => match s.operands.first().and_then(Node::as_identifier) {
                Some(name) => (name.to_string(), s.comment.clone()),
                None => continue,
            },
            _ => continue,
        };
        program.lines[index] = SourceLine::Pragma(Pragma { pragma: "#ifdef".to_string(), value: name, comment });

        let endif = program.lines[index + 1..]
            .iter()
            .position(|l| l.as_statement().map_or(false, |s| s.has_mnemonic("endif")));
        if let Some(offset) = endif {
            let at = index + 1 + offset;
            let comment = program.lines[at].as_statement().and_then(|s| s.comment.clone());
            program.lines[at] = SourceLine::Pragma(Pragma { pragma: "#endif".to_string(), value: String::new(), comment });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::testing::{assert_output, run_pass};

    #[test]
    fn test_fix_externs() {
        let output = run_pass("test.asm", " EXTERN One, Two", fix_externs, &RunContext::new());
        assert_output(&output, "GLOBAL One, Two");
    }

    #[test]
    fn test_fix_res() {
        let output = run_pass("test.asm", "LABEL RES 5", fix_res, &RunContext::new());
        assert_output(&output, "LABEL: DS 5");
    }

    #[test]
    fn test_fix_configs() {
        let output = run_pass(
            "test.asm",
            "
    __CONFIG _CONFIG1, _FOSC_HS & _WDTE_OFF & _PWRTE_ON & _MCLRE_ON & _CP_ON & _CPD_OFF & _BOREN_ON & _CLKOUTEN_ON & _IESO_OFF & _FCMEN_OFF
    __CONFIG _CONFIG2, _WRT_OFF & _VCAPEN_OFF & _PLLEN_OFF & _STVREN_OFF & _BORV_19 & _LVP_OFF
            ",
            fix_configs,
            &RunContext::new(),
        );
        assert_output(
            &output,
            "
config FOSC=HS, WDTE=OFF, PWRTE=ON, MCLRE=ON, CP=ON, CPD=OFF, BOREN=ON, CLKOUTEN=ON, IESO=OFF, FCMEN=OFF
config WRT=OFF, VCAPEN=OFF, PLLEN=OFF, STVREN=OFF, BORV=19, LVP=OFF
            ",
        );
    }

    #[test]
    fn test_config_setting() {
        assert_eq!(config_setting("_FOSC_INTOSC"), Some(("FOSC".to_string(), "INTOSC".to_string())));
        assert_eq!(config_setting("_CONFIG1"), None);
        assert_eq!(config_setting("_FOO_"), None);
        assert_eq!(config_setting("PLAIN_NAME"), None);
    }

    #[test]
    fn test_fix_psects_udata() {
        let output = run_pass("test.asm", "MATH_DATA           UDATA ; 0x120", fix_psects, &RunContext::new());
        assert_output(&output, "PSECT MATH_DATA, class=UDATA ; 0x120");

        let output = run_pass("main.asm", "    udata", fix_psects, &RunContext::new());
        assert_output(&output, "PSECT MAIN_UDATA, class=UDATA");
    }

    #[test]
    fn test_fix_psects_code() {
        let output = run_pass("test.asm", "RESET_VECTOR CODE H'0000'\n goto start", fix_psects, &RunContext::new());
        assert_output(
            &output,
            "RESET_VECTOR: PSECT RESET_VECTOR, class=CODE, delta=2, abs\nORG H'0000'\ngoto start",
        );

        let output = run_pass("test.asm", "    code\n    code", fix_psects, &RunContext::new());
        assert_output(&output, "PSECT TEST_CODE, class=CODE, delta=2\nPSECT TEST_CODE, class=CODE, delta=2");
    }

    #[test]
    fn test_fix_ifdefs() {
        let output = run_pass("test.asm", "  ifdef MY_THING", fix_ifdefs, &RunContext::new());
        assert_output(&output, "#ifdef MY_THING");

        let output = run_pass("test.asm", "  ifdef MY_THING\n nop\n  endif ; done", fix_ifdefs, &RunContext::new());
        assert_output(&output, "#ifdef MY_THING\nnop\n#endif ; done");

        let output = run_pass("test.asm", "  if MY_THING\n  endif", fix_ifdefs, &RunContext::new());
        assert_output(&output, "if MY_THING\nendif");
    }
}
