//! Options shared by the subcommands.

use anyhow::{Context, Result};
use clap::Parser;
use entrygen_environ::{Tunables, WasmFuncType, emscripten};
use std::path::PathBuf;

/// Selects a signature and the configuration to generate its trampoline
/// with.
#[derive(Parser, Debug)]
pub struct CommonOptions {
    /// The signature, as `params -> results` (e.g. `i32, i32 -> i32`), or an
    /// emscripten import name with `--emscripten`.
    #[arg(allow_hyphen_values = true)]
    pub signature: String,

    /// Treat the signature as an emscripten `invoke_*` import name and
    /// generate the trampoline of the function it invokes.
    #[arg(long)]
    pub emscripten: bool,

    /// TOML file with code generation settings.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl CommonOptions {
    /// Loads the settings from `--config`, or the defaults.
    pub fn tunables(&self) -> Result<Tunables> {
        let Some(path) = &self.config else {
            return Ok(Tunables::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Tunables::from_toml(&text)
            .with_context(|| format!("failed to load config file {}", path.display()))
    }

    /// Parses the signature argument.
    pub fn signature(&self) -> Result<WasmFuncType> {
        if self.emscripten {
            let invoke = emscripten::invoke_func_type(&self.signature)?;
            log::debug!("{}: host type {}, invoking {}", invoke.name, invoke.host, invoke.inner);
            return Ok(invoke.inner);
        }
        self.signature
            .parse()
            .with_context(|| format!("invalid signature `{}`", self.signature))
    }
}
