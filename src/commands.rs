//! The module for the entrygen CLI commands.

mod disas;
mod run;

pub use self::{disas::*, run::*};
