//! Rewrite passes that move a parsed MPASM file towards pic-as syntax.
//!
//! Each pass is a small in-place edit of one file's program, keyed on
//! mnemonics and on the lookup tables of the [`RunContext`]. Passes run
//! strictly in [`PASSES`] order and see each other's edits. A pass that
//! splices lines re-scans the program rather than keeping indices.
use std::borrow::Cow;
use std::path::PathBuf;

use crate::assembler::ast::Program;
use crate::assembler::{parse_file, unparse_program, Error, UnparseOptions};
use crate::config::RunContext;

mod directives;
mod files;
mod instructions;
mod operands;

pub use directives::{fix_configs, fix_externs, fix_ifdefs, fix_psects, fix_res};
pub use files::{fix_includes, rename_files};
pub use instructions::{fix_addfsr, fix_addwfc, fix_bit_instructions};
pub use operands::{fix_fixed_addresses, fix_numbers, replace_identifiers};

/// One file of the project being translated.
#[derive(Clone, Debug)]
pub struct SourceFile {
    pub name: String,
    /// Directory relative to the project root.
    pub dir: PathBuf,
    /// Bytes as read from disk. Files that are never parsed are written
    /// back unchanged.
    pub content: Vec<u8>,
    /// Present once the file has been parsed.
    pub program: Option<Program>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        SourceFile { name: name.into(), dir: dir.into(), content: content.into(), program: None }
    }

    /// The name up to its first `.`.
    pub fn stem(&self) -> &str {
        self.name.split('.').next().unwrap_or_default()
    }

    pub fn has_extension(&self, extension: &str) -> bool {
        self.name
            .rsplit_once('.')
            .map_or(false, |(_, ext)| ext.eq_ignore_ascii_case(extension))
    }

    pub fn relative_path(&self) -> PathBuf {
        self.dir.join(&self.name)
    }

    /// The content as text. Invalid UTF-8 is replaced, not rejected.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }

    pub fn parse(&mut self) -> Result<(), Error> {
        self.program = Some(parse_file(&self.text())?);
        Ok(())
    }

    /// Regenerates `content` from the program, if there is one.
    pub fn unparse(&mut self, options: &UnparseOptions) {
        if let Some(program) = &self.program {
            self.content = unparse_program(program, options).into_bytes();
        }
    }
}

pub type Pass = fn(&mut SourceFile, &RunContext) -> Result<(), Error>;

/// Every pass, in the order it runs.
pub const PASSES: &[(&str, Pass)] = &[
    ("rename-files", rename_files),
    ("fix-includes", fix_includes),
    ("fix-numbers", fix_numbers),
    ("fix-externs", fix_externs),
    ("fix-configs", fix_configs),
    ("fix-psects", fix_psects),
    ("fix-res", fix_res),
    ("fix-bit-instructions", fix_bit_instructions),
    ("fix-fixed-addresses", fix_fixed_addresses),
    ("replace-identifiers", replace_identifiers),
    ("fix-addfsr", fix_addfsr),
    ("fix-ifdefs", fix_ifdefs),
    ("fix-addwfc", fix_addwfc),
];

/// Runs the whole catalog over one parsed file.
pub fn run_passes(file: &mut SourceFile, context: &RunContext) -> Result<(), Error> {
    for (name, pass) in PASSES {
        trace!("running {} on {}", name, file.name);
        pass(file, context)?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Parses `content` as `name`, runs `pass` and unparses with forced
    /// label colons.
    pub fn run_pass(name: &str, content: &str, pass: Pass, context: &RunContext) -> String {
        let mut file = SourceFile::new(name, ".", content);
        file.parse().unwrap();
        pass(&mut file, context).unwrap();
        let options = UnparseOptions { force_label_colons: true, ..UnparseOptions::default() };
        unparse_program(file.program.as_ref().unwrap(), &options)
    }

    /// Compares trimmed, non-blank lines.
    pub fn assert_output(output: &str, expected: &str) {
        let normalize = |text: &str| {
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        };
        assert_eq!(normalize(output), normalize(expected));
    }
}
