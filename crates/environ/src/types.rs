//! WebAssembly value and function types as seen by the entry ABI.

use core::fmt;
use core::str::FromStr;
use cranelift_entity::entity_impl;
use serde_derive::{Deserialize, Serialize};

use crate::SignatureError;

/// WebAssembly value type -- equivalent of `wasmparser::ValType`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WasmValType {
    /// I32 type
    I32,
    /// I64 type
    I64,
    /// F32 type
    F32,
    /// F64 type
    F64,
    /// V128 type
    V128,
    /// Reference type
    Ref(WasmRefType),
}

impl fmt::Display for WasmValType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WasmValType::I32 => write!(f, "i32"),
            WasmValType::I64 => write!(f, "i64"),
            WasmValType::F32 => write!(f, "f32"),
            WasmValType::F64 => write!(f, "f64"),
            WasmValType::V128 => write!(f, "v128"),
            WasmValType::Ref(rt) => write!(f, "{rt}"),
        }
    }
}

impl WasmValType {
    /// Is this a reference type?
    #[inline]
    pub fn is_ref(&self) -> bool {
        matches!(self, WasmValType::Ref(_))
    }

    /// Number of bytes this value occupies in the flat parameter/result
    /// array: one 8-byte slot, or two for `v128`.
    pub fn flat_slot_size(&self) -> u32 {
        match self {
            WasmValType::V128 => 16,
            _ => 8,
        }
    }
}

impl FromStr for WasmValType {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "i32" => WasmValType::I32,
            "i64" => WasmValType::I64,
            "f32" => WasmValType::F32,
            "f64" => WasmValType::F64,
            "v128" => WasmValType::V128,
            "funcref" => WasmValType::Ref(WasmRefType::FUNCREF),
            "externref" => WasmValType::Ref(WasmRefType::EXTERNREF),
            other => return Err(SignatureError::UnknownType(other.to_string())),
        })
    }
}

/// WebAssembly reference type -- equivalent of `wasmparser`'s RefType
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WasmRefType {
    /// Whether `null` is a member of this type.
    pub nullable: bool,
    /// The heap type referenced.
    pub heap_type: WasmHeapType,
}

impl WasmRefType {
    /// `funcref`
    pub const FUNCREF: WasmRefType = WasmRefType {
        nullable: true,
        heap_type: WasmHeapType::Func,
    };
    /// `externref`
    pub const EXTERNREF: WasmRefType = WasmRefType {
        nullable: true,
        heap_type: WasmHeapType::Extern,
    };
}

impl fmt::Display for WasmRefType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.nullable, self.heap_type) {
            (true, WasmHeapType::Func) => write!(f, "funcref"),
            (true, WasmHeapType::Extern) => write!(f, "externref"),
            (false, ht) => write!(f, "(ref {ht})"),
        }
    }
}

/// WebAssembly heap type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WasmHeapType {
    /// Host references.
    Extern,
    /// Function references.
    Func,
}

impl fmt::Display for WasmHeapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WasmHeapType::Extern => write!(f, "extern"),
            WasmHeapType::Func => write!(f, "func"),
        }
    }
}

/// WebAssembly function type -- equivalent of `wasmparser`'s FuncType.
///
/// Equality is structural: two function types are the same type when their
/// parameter and result kind sequences are equal.
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct WasmFuncType {
    params: Box<[WasmValType]>,
    returns: Box<[WasmValType]>,
}

impl WasmFuncType {
    /// Creates a new function type from its parameters and results.
    #[inline]
    pub fn new(params: Box<[WasmValType]>, returns: Box<[WasmValType]>) -> Self {
        Self { params, returns }
    }

    /// Function params types.
    #[inline]
    pub fn params(&self) -> &[WasmValType] {
        &self.params
    }

    /// Returns params types.
    #[inline]
    pub fn returns(&self) -> &[WasmValType] {
        &self.returns
    }

    /// Number of 8-byte slots the flat parameter/result array needs for a
    /// call of this type: parameters and results share the array from its
    /// base, so this is the larger of the two.
    pub fn flat_array_len(&self) -> usize {
        let slots = |tys: &[WasmValType]| {
            tys.iter()
                .map(|t| (t.flat_slot_size() / 8) as usize)
                .sum::<usize>()
        };
        slots(&self.params).max(slots(&self.returns))
    }

    /// Iterates over every value type mentioned by this function type, tagged
    /// with whether it is a result and its position.
    pub fn positions(&self) -> impl Iterator<Item = (bool, usize, WasmValType)> + '_ {
        let params = self.params.iter().enumerate().map(|(i, t)| (false, i, *t));
        let returns = self.returns.iter().enumerate().map(|(i, t)| (true, i, *t));
        params.chain(returns)
    }
}

impl fmt::Display for WasmFuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(func")?;
        if !self.params.is_empty() {
            write!(f, " (param")?;
            for p in self.params.iter() {
                write!(f, " {p}")?;
            }
            write!(f, ")")?;
        }
        if !self.returns.is_empty() {
            write!(f, " (result")?;
            for r in self.returns.iter() {
                write!(f, " {r}")?;
            }
            write!(f, ")")?;
        }
        write!(f, ")")
    }
}

/// Parses the compact `params -> results` notation, e.g. `i32, i32 -> i32`.
///
/// Either side may be empty or `()`; a missing `->` means there are no
/// results.
impl FromStr for WasmFuncType {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        fn list(s: &str) -> Result<Box<[WasmValType]>, SignatureError> {
            let s = s.trim();
            let s = s
                .strip_prefix('(')
                .and_then(|s| s.strip_suffix(')'))
                .unwrap_or(s);
            if s.trim().is_empty() {
                return Ok(Box::new([]));
            }
            s.split(',').map(str::parse).collect()
        }

        let (params, returns) = match s.split_once("->") {
            Some((params, returns)) => (params, returns),
            None => (s, ""),
        };
        if returns.contains("->") {
            return Err(SignatureError::Malformed(s.to_string()));
        }
        Ok(WasmFuncType::new(list(params)?, list(returns)?))
    }
}

/// Index type of a function (imported or defined) inside the WebAssembly module.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct FuncIndex(u32);
entity_impl!(FuncIndex);

/// Index type of a type inside the WebAssembly module.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct TypeIndex(u32);
entity_impl!(TypeIndex);

/// Index type of a linear memory (imported or defined) inside the WebAssembly module.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct MemoryIndex(u32);
entity_impl!(MemoryIndex);

/// Index type of a global variable (imported or defined) inside the WebAssembly module.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct GlobalIndex(u32);
entity_impl!(GlobalIndex);
