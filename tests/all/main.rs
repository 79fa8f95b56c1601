mod cli_tests;
mod entry_trampoline;
mod host_module;
mod marshaling;

use anyhow::Result;
use entrygen_codegen::{CompiledEntry, EntryTrampoline};
use entrygen_environ::{Tunables, WasmFuncType};

/// Generates the trampoline of `sig` with the default settings.
pub(crate) fn trampoline(sig: &str) -> Result<CompiledEntry> {
    let _ = env_logger::try_init();
    let sig: WasmFuncType = sig.parse()?;
    Ok(EntryTrampoline::emit(&sig, &Tunables::default())?)
}
