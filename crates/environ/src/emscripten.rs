//! Signatures of the emscripten `invoke_*` trampolines.
//!
//! Emscripten compiles C++ exception handling and `setjmp`/`longjmp` into
//! imports named `invoke_<sig>` from the `env` module, where `<sig>` encodes
//! the type of the function being invoked indirectly: the first character is
//! the result and the rest are the parameters. The host function itself takes
//! one extra leading `i32`, the table index of the function to invoke.

use crate::{SignatureError, WasmFuncType, WasmValType};

/// The module emscripten imports its runtime helpers from.
pub const ENV_MODULE: &str = "env";

/// Prefix of every invoke function name.
pub const INVOKE_PREFIX: &str = "invoke_";

/// Imported by emscripten programs to be told when memory grows.
pub const NOTIFY_MEMORY_GROWTH: &str = "emscripten_notify_memory_growth";

/// The types of one `invoke_*` function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeType {
    /// The import name, e.g. `invoke_vii`.
    pub name: String,
    /// Type of the host function: the table index followed by `inner`'s
    /// parameters.
    pub host: WasmFuncType,
    /// Type of the function invoked through the table.
    pub inner: WasmFuncType,
}

fn sig_char(name: &str, ch: char) -> Result<Option<WasmValType>, SignatureError> {
    Ok(Some(match ch {
        'v' => return Ok(None),
        'i' | 'p' => WasmValType::I32,
        'j' => WasmValType::I64,
        'f' => WasmValType::F32,
        'd' => WasmValType::F64,
        ch => {
            return Err(SignatureError::UnknownChar {
                name: name.to_string(),
                ch,
            });
        }
    }))
}

/// Parses an `invoke_*` import name.
///
/// ```text
/// invoke_viiiddiiiiii
///        ^ result: none
///         ^^^^^^^^^^^ params: i32 i32 i32 f64 f64 i32 i32 i32 i32 i32 i32
/// ```
pub fn invoke_func_type(name: &str) -> Result<InvokeType, SignatureError> {
    let sig = name
        .strip_prefix(INVOKE_PREFIX)
        .ok_or_else(|| SignatureError::NotInvoke(name.to_string()))?;
    let mut chars = sig.chars();
    let result = chars
        .next()
        .ok_or_else(|| SignatureError::NotInvoke(name.to_string()))?;
    let returns: Box<[WasmValType]> = sig_char(name, result)?.into_iter().collect();

    let mut params = Vec::with_capacity(sig.len());
    for ch in chars {
        match sig_char(name, ch)? {
            Some(ty) => params.push(ty),
            None => return Err(SignatureError::VoidParam(name.to_string())),
        }
    }

    let host_params: Box<[WasmValType]> = core::iter::once(WasmValType::I32)
        .chain(params.iter().copied())
        .collect();
    let ty = InvokeType {
        name: name.to_string(),
        host: WasmFuncType::new(host_params, returns.clone()),
        inner: WasmFuncType::new(params.into_boxed_slice(), returns),
    };
    log::trace!("{name}: host {} inner {}", ty.host, ty.inner);
    Ok(ty)
}

/// Collects the invoke functions among a module's `(module, name)` imports.
///
/// Imports from modules other than `env` and names without the `invoke_`
/// prefix are skipped; a malformed `invoke_*` name is an error.
pub fn invoke_imports<'a>(
    imports: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Result<Vec<InvokeType>, SignatureError> {
    imports
        .into_iter()
        .filter(|(module, name)| *module == ENV_MODULE && name.starts_with(INVOKE_PREFIX))
        .map(|(_, name)| invoke_func_type(name))
        .collect()
}
