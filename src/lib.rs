//! The entrygen command line interface (CLI) crate.
//!
//! This crate implements the `entrygen` command line tool, which prints and
//! runs the entry trampolines generated for WebAssembly signatures.

#![deny(missing_docs)]

pub mod commands;
pub(crate) mod common;
