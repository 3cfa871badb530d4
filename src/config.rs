//! The per-run configuration record handed to every rewrite pass.
//!
//! A [`RunContext`] is assembled once by the front end from mapping files
//! and command-line pairs, then only ever borrowed immutably.
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

/// One `key=value` pair per line. Both sides are trimmed and neither may be
/// empty or contain another `=`.
static PAIR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*([^=\s][^=]*?)\s*=\s*([^=\s][^=]*?)\s*$").unwrap());

pub const DEFAULT_DEFINES_FILE: &str = "defines.inc";

#[derive(Clone, Debug)]
pub struct RunContext {
    /// `reg.bit` (lowercase) to its replacement, e.g. `status.z` => `ZERO`.
    pub register_map: HashMap<String, String>,
    /// Identifiers renamed verbatim.
    pub replacement_map: HashMap<String, String>,
    /// Every file name found in the input tree.
    pub files_in_project: Vec<String>,
    /// Symbols written to the generated defines file, in order.
    pub defines: Vec<(String, String)>,
    pub defines_file_name: String,
}

impl Default for RunContext {
    fn default() -> Self {
        RunContext {
            register_map: HashMap::new(),
            replacement_map: HashMap::new(),
            files_in_project: Vec::new(),
            defines: Vec::new(),
            defines_file_name: DEFAULT_DEFINES_FILE.to_string(),
        }
    }
}

impl RunContext {
    pub fn new() -> Self {
        RunContext::default()
    }

    pub fn add_register_mappings<I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (register, replacement) in pairs {
            self.register_map.insert(register.to_lowercase(), replacement);
        }
    }

    pub fn add_replacements<I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.replacement_map.extend(pairs);
    }

    /// Adds defines in order. Redefining a name replaces its value in place.
    pub fn add_defines<I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in pairs {
            match self.defines.iter_mut().find(|(n, _)| *n == name) {
                Some(existing) => existing.1 = value,
                None => self.defines.push((name, value)),
            }
        }
    }

    /// Looks up `register.bit`, ignoring case.
    pub fn register(&self, register: &str, bit: &str) -> Option<&str> {
        self.register_map
            .get(&format!("{}.{}", register, bit).to_lowercase())
            .map(String::as_str)
    }

    pub fn replacement(&self, identifier: &str) -> Option<&str> {
        self.replacement_map.get(identifier).map(String::as_str)
    }

    /// The real spelling of a project file, matched case-insensitively.
    pub fn project_file(&self, name: &str) -> Option<&str> {
        self.files_in_project
            .iter()
            .find(|f| f.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }
}

/// Parses `key=value` lines. Blank lines are ignored, malformed ones are
/// skipped with a warning.
pub fn parse_pairs(text: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match PAIR.captures(line) {
            Some(caps) => pairs.push((caps[1].to_string(), caps[2].to_string())),
            None => warn!("ignoring malformed mapping on line {}: `{}`", index + 1, line.trim()),
        }
    }
    pairs
}

#[derive(Debug)]
pub struct ConfigError {
    pub path: PathBuf,
    pub source: io::Error,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unable to read mapping file `{}`: {}", self.path.display(), self.source)
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Reads and parses a mapping file.
pub fn load_mapping_file(path: &Path) -> Result<Vec<(String, String)>, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError { path: path.to_path_buf(), source })?;
    let pairs = parse_pairs(&text);
    debug!("loaded {} mapping(s) from {}", pairs.len(), path.display());
    Ok(pairs)
}
