//! Builds the `key=value` mapping files the translator consumes, from a
//! device's legacy `.inc` header and its `.ini` register description.
//!
//! The `.ini` lists special function registers as `SFR=NAME,ADDR,BITS` and
//! their fields as `SFRFLD=NAME,ADDR,BIT,WIDTH` (addresses in hex). The
//! legacy header names the same registers and bits with `equ` statements,
//! grouped under a `; ----- REG Bits -----` comment.
use std::fmt;

use crate::assembler::ast::{Node, Program, Statement};

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Sfr {
    pub name: String,
    pub address: u64,
    pub size: u64,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SfrField {
    pub name: String,
    pub sfr_address: u64,
    pub bit: u64,
    pub size: u64,
}

#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct DeviceInfo {
    pub sfrs: Vec<Sfr>,
    pub fields: Vec<SfrField>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum MappingError {
    /// A field sits at an address no register claims.
    UnknownRegister { field: String, address: u64 },
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingError::UnknownRegister { field, address } => {
                write!(f, "unable to find a register at address 0x{:X} for field {}", address, field)
            }
        }
    }
}

impl std::error::Error for MappingError {}

/// Reads the `SFR=` and `SFRFLD=` records of a device `.ini`. Other lines
/// are ignored. Malformed records are skipped with a warning.
pub fn parse_ini(text: &str) -> DeviceInfo {
    let mut device = DeviceInfo::default();

    for (index, line) in text.lines().enumerate() {
        if let Some(record) = line.strip_prefix("SFR=") {
            match sfr(record) {
                Some(sfr) => device.sfrs.push(sfr),
                None => warn!("ignoring malformed SFR record on line {}: `{}`", index + 1, line.trim()),
            }
        } else if let Some(record) = line.strip_prefix("SFRFLD=") {
            match sfr_field(record) {
                Some(field) => device.fields.push(field),
                None => warn!("ignoring malformed SFRFLD record on line {}: `{}`", index + 1, line.trim()),
            }
        }
    }

    debug!("device has {} register(s) and {} field(s)", device.sfrs.len(), device.fields.len());
    device
}

fn sfr(record: &str) -> Option<Sfr> {
    let parts: Vec<&str> = record.split(',').map(str::trim).collect();
    match parts.as_slice() {
        [name, address, size, ..] => Some(Sfr {
            name: name.to_string(),
            address: hex(address)?,
            size: size.parse().ok()?,
        }),
        _ => None,
    }
}

fn sfr_field(record: &str) -> Option<SfrField> {
    let parts: Vec<&str> = record.split(',').map(str::trim).collect();
    match parts.as_slice() {
        [name, address, bit, size, ..] => Some(SfrField {
            name: name.to_string(),
            sfr_address: hex(address)?,
            bit: bit.parse().ok()?,
            size: size.parse().ok()?,
        }),
        _ => None,
    }
}

fn hex(text: &str) -> Option<u64> {
    let digits = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")).unwrap_or(text);
    u64::from_str_radix(digits, 16).ok()
}

/// Maps each 16-bit register to the first 8-bit register at the same
/// address, e.g. `FSR0=FSR0L`.
pub fn register_mappings(device: &DeviceInfo) -> Vec<(String, String)> {
    let mut mappings: Vec<(String, String)> = Vec::new();
    for wide in device.sfrs.iter().filter(|s| s.size == 16) {
        let narrow = device.sfrs.iter().find(|s| s.address == wide.address && s.size == 8);
        if let Some(narrow) = narrow {
            if !mappings.iter().any(|(name, _)| *name == wide.name) {
                mappings.push((wide.name.clone(), narrow.name.clone()));
            }
        }
    }
    mappings
}

/// Maps the legacy `REG.BIT` spelling of every field to its new name, e.g.
/// `STATUS.C=CARRY`. When several legacy bits share the field's position
/// the closest spelling wins. The first mapping for a key is kept.
pub fn bit_mappings(inc: &Program, device: &DeviceInfo) -> Result<Vec<(String, String)>, MappingError> {
    let mut mappings: Vec<(String, String)> = Vec::new();

    for field in &device.fields {
        if !device.sfrs.iter().any(|s| s.address == field.sfr_address) {
            return Err(MappingError::UnknownRegister { field: field.name.clone(), address: field.sfr_address });
        }

        let register = match inc.statements().find(|s| equ_value(s) == Some(field.sfr_address)) {
            Some(statement) => statement.label.as_deref().unwrap_or_default(),
            None => continue,
        };

        let candidates = bit_block(inc, register)
            .filter(|s| equ_value(s) == Some(field.bit))
            .filter_map(|s| s.label.as_deref())
            .collect::<Vec<_>>();
        let bit = match nearest(&field.name, &candidates) {
            Some(bit) => bit,
            None => continue,
        };

        let key = format!("{}.{}", register, bit);
        if !mappings.iter().any(|(k, _)| *k == key) {
            trace!("{} => {}", key, field.name);
            mappings.push((key, field.name.clone()));
        }
    }
    Ok(mappings)
}

/// The value of a labelled `NAME equ <number>` statement.
fn equ_value(statement: &Statement) -> Option<u64> {
    if statement.label.is_none() || !statement.has_mnemonic("equ") {
        return None;
    }
    match statement.operands.first() {
        Some(Node::Number { value, .. }) => Some(*value),
        _ => None,
    }
}

/// Statements between the last `REG Bits` comment and the next line that
/// holds only a comment.
fn bit_block<'a>(inc: &'a Program, register: &str) -> impl Iterator<Item = &'a Statement> + 'a {
    let marker = format!("{} Bits", register);
    let start = inc
        .lines
        .iter()
        .rposition(|line| {
            line.as_statement()
                .and_then(|s| s.comment.as_deref())
                .map_or(false, |c| c.contains(&marker))
        });

    let block = start.and_then(|start| {
        let rest = &inc.lines[start + 1..];
        let end = rest.iter().position(|line| {
            line.as_statement()
                .map_or(false, |s| s.label.is_none() && s.mnemonic.is_none() && s.comment.is_some())
        })?;
        Some(&rest[..end])
    });

    block.unwrap_or_default().iter().filter_map(|line| line.as_statement())
}

/// The candidate with the smallest edit distance to `name`. Ties go to the
/// earliest candidate.
fn nearest<'a>(name: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates.iter().copied().min_by_key(|c| levenshtein(name, c.trim()))
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=a.len()).collect();
    let mut curr = vec![0; a.len() + 1];

    for (j, cb) in b.iter().enumerate() {
        curr[0] = j + 1;
        for (i, ca) in a.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[i + 1] = (prev[i + 1] + 1).min(curr[i] + 1).min(prev[i] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[a.len()]
}
