//! Translates MPASM-dialect PIC assembly into pic-as syntax.
#[macro_use]
extern crate log;

pub mod assembler;
pub mod config;
pub mod mapping;
pub mod passes;
pub mod project;
