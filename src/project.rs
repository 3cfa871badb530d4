//! A directory of sources moving through the translation pipeline:
//! load, parse, rewrite, unparse, write.
//!
//! Files are independent of each other. A file that fails to parse is
//! left untouched and reported, and the remaining files carry on.
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::assembler::ast::{Pragma, SourceLine};
use crate::assembler::{Error, UnparseOptions};
use crate::config::RunContext;
use crate::passes::{self, SourceFile};

#[derive(Debug)]
pub enum ProjectError {
    Io { path: PathBuf, source: io::Error },
    Assembler { path: PathBuf, source: Error },
}

impl fmt::Display for ProjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            ProjectError::Assembler { path, source } => write!(f, "{}: {}", path.display(), source),
        }
    }
}

impl std::error::Error for ProjectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProjectError::Io { source, .. } => Some(source),
            ProjectError::Assembler { source, .. } => Some(source),
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ProjectError + '_ {
    move |source| ProjectError::Io { path: path.to_path_buf(), source }
}

#[derive(Debug, Default)]
pub struct Project {
    pub files: Vec<SourceFile>,
}

impl Project {
    pub fn new(files: Vec<SourceFile>) -> Self {
        Project { files }
    }

    /// Reads every file under `root`, recursively, as raw bytes.
    pub fn load(root: &Path) -> Result<Self, ProjectError> {
        let mut files = Vec::new();
        load_dir(root, Path::new(""), &mut files)?;
        info!("loaded {} file(s) from {}", files.len(), root.display());
        Ok(Project { files })
    }

    pub fn file_names(&self) -> Vec<String> {
        self.files.iter().map(|f| f.name.clone()).collect()
    }

    /// Parses the files whose extension is listed. Other files are carried
    /// through verbatim.
    pub fn parse(&mut self, extensions: &[String]) -> Vec<ProjectError> {
        let mut errors = Vec::new();
        for file in self.files.iter_mut() {
            if !extensions.iter().any(|ext| file.has_extension(ext)) {
                debug!("skipping {}", file.relative_path().display());
                continue;
            }
            debug!("parsing {}", file.relative_path().display());
            if let Err(source) = file.parse() {
                errors.push(ProjectError::Assembler { path: file.relative_path(), source });
            }
        }
        errors
    }

    /// Runs the pass catalog over every parsed file.
    pub fn run_passes(&mut self, context: &RunContext) -> Vec<ProjectError> {
        let mut errors = Vec::new();
        for file in self.files.iter_mut().filter(|f| f.program.is_some()) {
            let path = file.relative_path();
            if let Err(source) = passes::run_passes(file, context) {
                errors.push(ProjectError::Assembler { path, source });
            }
        }
        errors
    }

    /// Writes the context's defines to a new file at the project root and
    /// includes it from every parsed file, right after its first
    /// `#include <...>`.
    pub fn inject_defines(&mut self, context: &RunContext) -> Result<(), ProjectError> {
        if context.defines.is_empty() {
            return Ok(());
        }

        let include = SourceLine::Pragma(Pragma {
            pragma: "#include".to_string(),
            value: format!("\"{}\"", context.defines_file_name),
            comment: None,
        });

        for file in self.files.iter_mut() {
            let program = match &mut file.program {
                Some(program) => program,
                None => continue,
            };
            let position = program.lines.iter().position(|line| match line {
                SourceLine::Pragma(p) => {
                    p.pragma.eq_ignore_ascii_case("#include") && p.value.starts_with('<') && p.value.ends_with('>')
                }
                _ => false,
            });
            if let Some(position) = position {
                program.insert(position + 1, include.clone());
            }
        }

        let content = context
            .defines
            .iter()
            .map(|(name, value)| format!("#define {} {}", name, value))
            .collect::<Vec<_>>()
            .join("\n");
        let mut defines = SourceFile::new(context.defines_file_name.clone(), "", content);
        defines
            .parse()
            .map_err(|source| ProjectError::Assembler { path: defines.relative_path(), source })?;
        self.files.push(defines);
        Ok(())
    }

    /// Regenerates the content of every parsed file.
    pub fn unparse(&mut self, options: &UnparseOptions) {
        for file in self.files.iter_mut() {
            file.unparse(options);
        }
    }

    /// Writes every file below `out_dir`, keeping relative directories.
    pub fn write(&self, out_dir: &Path) -> Result<(), ProjectError> {
        for file in &self.files {
            let dir = out_dir.join(&file.dir);
            fs::create_dir_all(&dir).map_err(io_error(&dir))?;

            let path = dir.join(&file.name);
            info!("writing file {}", path.display());
            fs::write(&path, &file.content).map_err(io_error(&path))?;
        }
        Ok(())
    }
}

fn load_dir(root: &Path, relative: &Path, files: &mut Vec<SourceFile>) -> Result<(), ProjectError> {
    let dir = root.join(relative);
    let mut entries = fs::read_dir(&dir)
        .map_err(io_error(&dir))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_error(&dir))?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if path.is_dir() {
            load_dir(root, &relative.join(&name), files)?;
        } else {
            let content = fs::read(&path).map_err(io_error(&path))?;
            files.push(SourceFile::new(name, relative, content));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn extensions() -> Vec<String> {
        vec!["asm".to_string(), "inc".to_string()]
    }

    #[test]
    fn test_load_walks_subdirectories() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("main.asm"), " nop").unwrap();
        fs::write(dir.path().join("lib").join("math.inc"), " return").unwrap();

        let project = Project::load(dir.path()).unwrap();
        let mut paths: Vec<PathBuf> = project.files.iter().map(SourceFile::relative_path).collect();
        paths.sort();
        assert_eq!(paths, vec![PathBuf::from("lib/math.inc"), PathBuf::from("main.asm")]);
    }

    #[test]
    fn test_binary_files_are_carried_through() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let object = [0xffu8, 0xfe, 0x00, 0x80];
        let mut source = b" nop ; caf".to_vec();
        source.push(0xe9);
        fs::write(input.path().join("main.asm"), source).unwrap();
        fs::write(input.path().join("main.cof"), object).unwrap();

        let mut project = Project::load(input.path()).unwrap();
        assert!(project.parse(&extensions()).is_empty());
        project.unparse(&UnparseOptions::default());
        project.write(output.path()).unwrap();

        assert_eq!(fs::read(output.path().join("main.cof")).unwrap(), object);
        assert_eq!(fs::read_to_string(output.path().join("main.asm")).unwrap(), "     nop ; caf\u{FFFD}");
    }

    #[test]
    fn test_parse_respects_extensions_and_collects_errors() {
        let mut project = Project::new(vec![
            SourceFile::new("a.asm", "", " nop"),
            SourceFile::new("b.txt", "", "not ( assembly"),
            SourceFile::new("c.inc", "", " dw (1"),
        ]);
        let errors = project.parse(&extensions());

        assert!(project.files[0].program.is_some());
        assert!(project.files[1].program.is_none());
        assert!(project.files[2].program.is_none());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().starts_with("c.inc: parse error on line 1"));
    }

    #[test]
    fn test_inject_defines() {
        let mut project = Project::new(vec![SourceFile::new("main.asm", "", "#include <xc.inc>\n nop")]);
        project.parse(&extensions());

        let mut context = RunContext::new();
        context.add_defines(vec![("DEBUG".to_string(), "1".to_string())]);
        project.inject_defines(&context).unwrap();
        project.unparse(&UnparseOptions::default());

        assert_eq!(project.files.len(), 2);
        assert_eq!(project.files[0].text(), "#include <xc.inc>\n#include \"defines.inc\"\n     nop");
        assert_eq!(project.files[1].name, "defines.inc");
        assert_eq!(project.files[1].text(), "#define DEBUG 1");
    }

    #[test]
    fn test_pipeline_writes_output() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        fs::create_dir(input.path().join("src")).unwrap();
        fs::write(
            input.path().join("src").join("main.asm"),
            "    list p=16f1939\n    #include <p16f1939.inc>\nStart   movlw H'0A' ; ten\n        goto Start\n",
        )
        .unwrap();
        fs::write(input.path().join("README"), "notes").unwrap();

        let mut project = Project::load(input.path()).unwrap();
        assert!(project.parse(&extensions()).is_empty());

        let context = RunContext { files_in_project: project.file_names(), ..RunContext::default() };
        assert!(project.run_passes(&context).is_empty());
        project.unparse(&UnparseOptions { comment_marker: "//".to_string(), indent: 4, force_label_colons: true });
        project.write(output.path()).unwrap();

        let written = fs::read_to_string(output.path().join("src").join("main.s")).unwrap();
        assert_eq!(
            written,
            "       list p=16f1939\n#include <xc.inc>\n\nStart: movlw 0xA // ten\n       goto Start\n"
        );
        assert_eq!(fs::read_to_string(output.path().join("README")).unwrap(), "notes");
    }
}
