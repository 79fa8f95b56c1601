//! Data structures describing a module of host-implemented exports.

use crate::{
    FuncIndex, GlobalIndex, HostFunc, MemoryIndex, PrimaryMap, TypeIndex, WASM_PAGE_SIZE,
    WasmFuncType, WasmValType,
};
use core::fmt;
use indexmap::IndexMap;
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

/// An index of an entity.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub enum EntityIndex {
    /// Function index.
    Function(FuncIndex),
    /// Memory index.
    Memory(MemoryIndex),
    /// Global index.
    Global(GlobalIndex),
}

impl EntityIndex {
    /// The kind of entity this index refers to.
    pub fn kind(&self) -> ExternKind {
        match self {
            EntityIndex::Function(_) => ExternKind::Func,
            EntityIndex::Memory(_) => ExternKind::Memory,
            EntityIndex::Global(_) => ExternKind::Global,
        }
    }
}

impl From<FuncIndex> for EntityIndex {
    fn from(idx: FuncIndex) -> EntityIndex {
        EntityIndex::Function(idx)
    }
}

impl From<MemoryIndex> for EntityIndex {
    fn from(idx: MemoryIndex) -> EntityIndex {
        EntityIndex::Memory(idx)
    }
}

impl From<GlobalIndex> for EntityIndex {
    fn from(idx: GlobalIndex) -> EntityIndex {
        EntityIndex::Global(idx)
    }
}

/// The kinds of entity a host module can export.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum ExternKind {
    /// A function.
    Func,
    /// A linear memory.
    Memory,
    /// A global.
    Global,
}

impl fmt::Display for ExternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExternKind::Func => "func",
            ExternKind::Memory => "memory",
            ExternKind::Global => "global",
        })
    }
}

/// Limits of a linear memory, in 64KiB pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryType {
    /// The minimum number of pages in the memory.
    pub min: u32,
    /// The maximum number of pages in the memory.
    pub max: u32,
}

impl MemoryType {
    /// Creates a memory type with the given limits.
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }
}

/// A global exported by a host module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Global {
    /// The Wasm type of the value stored in the global.
    pub ty: WasmValType,
    /// A flag indicating whether the value may change at runtime.
    pub mutable: bool,
    /// The initial value, in its flat array representation.
    pub init: u64,
}

/// Renders a page count in binary byte units, e.g. `64 Ki` for one page.
pub fn pages_to_unit_of_bytes(pages: u32) -> String {
    let k = u64::from(pages) * u64::from(WASM_PAGE_SIZE / 1024);
    if k < 1024 {
        return format!("{k} Ki");
    }
    let m = k / 1024;
    if m < 1024 {
        return format!("{m} Mi");
    }
    let g = m / 1024;
    if g < 1024 {
        return format!("{g} Gi");
    }
    format!("{} Ti", g / 1024)
}

fn unit(pages: &u32) -> String {
    pages_to_unit_of_bytes(*pages)
}

fn joined(names: &[String]) -> String {
    names.join(", ")
}

/// Position of a value type inside a function signature.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SigPosition {
    /// A parameter.
    Param,
    /// A result.
    Result,
}

impl fmt::Display for SigPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SigPosition::Param => "param",
            SigPosition::Result => "result",
        })
    }
}

/// Errors raised while assembling a [`HostModule`]. Any of them aborts
/// construction of the whole module.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostModuleError {
    /// A host function uses a value type the entry ABI cannot marshal.
    #[error("func[{func}] {position}[{index}] has unsupported type {ty}")]
    UnsupportedType {
        /// Export name of the function.
        func: String,
        /// Whether the type is a parameter or a result.
        position: SigPosition,
        /// Position within the parameters or results.
        index: usize,
        /// The offending type.
        ty: WasmValType,
    },
    /// More than one memory was configured.
    #[error("only one memory is allowed, but configured: {}", joined(.0))]
    TooManyMemories(Vec<String>),
    /// A memory's minimum exceeds its maximum.
    #[error(
        "memory[{name}] min {min} pages ({}) > max {max} pages ({})",
        unit(.min),
        unit(.max)
    )]
    MemoryLimits {
        /// Export name of the memory.
        name: String,
        /// The minimum, in pages.
        min: u32,
        /// The maximum, in pages.
        max: u32,
    },
    /// An export name is already taken by another export.
    #[error("{kind}[{name}] exports the same name as a {existing}")]
    DuplicateExport {
        /// Kind of the export being added.
        kind: ExternKind,
        /// The clashing name.
        name: String,
        /// Kind of the export already using the name.
        existing: ExternKind,
    },
}

/// A module of host-implemented functions, memories and globals.
///
/// Every entity is exported. Functions and globals are ordered by name, so
/// the index of an entity is its position in sorted name order.
#[derive(Debug, Clone, Default)]
pub struct HostModule {
    /// The module name, used in debug names of functions.
    pub name: String,

    /// Deduplicated function types.
    pub types: PrimaryMap<TypeIndex, WasmFuncType>,

    /// The type of each function.
    pub functions: PrimaryMap<FuncIndex, TypeIndex>,

    /// The implementation of each function.
    pub host_funcs: PrimaryMap<FuncIndex, HostFunc>,

    /// The name of each function.
    pub func_names: PrimaryMap<FuncIndex, String>,

    /// The memory, if one was configured.
    pub memories: PrimaryMap<MemoryIndex, MemoryType>,

    /// Globals, in sorted name order.
    pub globals: PrimaryMap<GlobalIndex, Global>,

    /// Exported entities.
    pub exports: IndexMap<String, EntityIndex>,
}

impl HostModule {
    /// Interns `ty`, returning the index of a structurally equal type if one
    /// is already present.
    pub fn intern_type(&mut self, ty: &WasmFuncType) -> TypeIndex {
        match self.types.iter().find(|(_, t)| *t == ty) {
            Some((idx, _)) => idx,
            None => self.types.push(ty.clone()),
        }
    }

    /// The type of the function at `index`.
    pub fn func_type(&self, index: FuncIndex) -> &WasmFuncType {
        &self.types[self.functions[index]]
    }

    /// Looks up an export by name.
    pub fn export(&self, name: &str) -> Option<EntityIndex> {
        self.exports.get(name).copied()
    }

    /// Materializes the function at `index` for calling.
    pub fn host_function(&self, index: FuncIndex) -> HostFuncInstance {
        HostFuncInstance {
            index,
            ty: self.func_type(index).clone(),
            func: self.host_funcs[index].clone(),
            debug_name: format!("{}.{}", self.name, self.func_names[index]),
        }
    }

    /// Materializes every function, in index order.
    pub fn host_functions(&self) -> impl Iterator<Item = HostFuncInstance> + '_ {
        self.functions.keys().map(|idx| self.host_function(idx))
    }
}

/// A host function of a built module, ready to be called.
#[derive(Debug, Clone)]
pub struct HostFuncInstance {
    /// The function's index in its module.
    pub index: FuncIndex,
    /// The function's deduplicated type.
    pub ty: WasmFuncType,
    /// The implementation.
    pub func: HostFunc,
    /// `<module>.<name>`, used in diagnostics.
    pub debug_name: String,
}

impl HostFuncInstance {
    /// Calls the function on a flat array.
    pub fn call(&self, slots: &mut [u64]) {
        log::trace!("calling {}", self.debug_name);
        self.func.call(slots)
    }
}
