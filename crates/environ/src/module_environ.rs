use crate::{
    EntityIndex, ExternKind, Global, HostFunc, HostModule, HostModuleError, MemoryType,
    SigPosition,
};
use std::collections::BTreeMap;

/// Collects host-implemented exports and assembles them into a
/// [`HostModule`].
///
/// Registering a second entity of the same kind under one name replaces the
/// first; names shared across kinds are rejected by [`HostModuleBuilder::build`].
#[derive(Debug, Default)]
pub struct HostModuleBuilder {
    name: String,
    funcs: BTreeMap<String, HostFunc>,
    memories: BTreeMap<String, MemoryType>,
    globals: BTreeMap<String, Global>,
}

impl HostModuleBuilder {
    /// Starts a module with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Exports a function.
    pub fn func(mut self, name: impl Into<String>, func: HostFunc) -> Self {
        self.funcs.insert(name.into(), func);
        self
    }

    /// Exports a function implemented by a typed closure.
    pub fn func_wrap<Params, Results>(
        self,
        name: impl Into<String>,
        func: impl crate::IntoHostFunc<Params, Results>,
    ) -> Self {
        self.func(name, HostFunc::wrap(func))
    }

    /// Exports a memory.
    pub fn memory(mut self, name: impl Into<String>, ty: MemoryType) -> Self {
        self.memories.insert(name.into(), ty);
        self
    }

    /// Exports a global.
    pub fn global(mut self, name: impl Into<String>, global: Global) -> Self {
        self.globals.insert(name.into(), global);
        self
    }

    /// Validates the collected exports and assembles the module.
    pub fn build(self) -> Result<HostModule, HostModuleError> {
        HostModule::new(self.name, self.funcs, self.memories, self.globals)
    }
}

impl HostModule {
    /// Assembles a module from name-keyed functions, memories and globals.
    ///
    /// Functions are added first, then the memory, then globals, so a name
    /// clash is reported against the kind added earlier.
    pub fn new(
        name: impl Into<String>,
        funcs: BTreeMap<String, HostFunc>,
        memories: BTreeMap<String, MemoryType>,
        globals: BTreeMap<String, Global>,
    ) -> Result<HostModule, HostModuleError> {
        let mut module = HostModule {
            name: name.into(),
            ..HostModule::default()
        };
        module.add_funcs(funcs)?;
        module.add_memory(memories)?;
        module.add_globals(globals)?;
        log::debug!(
            "built host module `{}`: {} funcs, {} types, {} memories, {} globals",
            module.name,
            module.functions.len(),
            module.types.len(),
            module.memories.len(),
            module.globals.len()
        );
        Ok(module)
    }

    fn add_funcs(&mut self, funcs: BTreeMap<String, HostFunc>) -> Result<(), HostModuleError> {
        for (name, func) in funcs {
            let ty = func.ty();
            for (is_result, index, ty) in ty.positions() {
                if ty.is_ref() {
                    return Err(HostModuleError::UnsupportedType {
                        func: name,
                        position: if is_result {
                            SigPosition::Result
                        } else {
                            SigPosition::Param
                        },
                        index,
                        ty,
                    });
                }
            }
            let type_index = self.intern_type(ty);
            let index = self.functions.push(type_index);
            self.host_funcs.push(func);
            self.func_names.push(name.clone());
            log::trace!("func[{name}] = {index:?} with type {type_index:?}");
            self.exports.insert(name, EntityIndex::Function(index));
        }
        Ok(())
    }

    fn add_memory(&mut self, memories: BTreeMap<String, MemoryType>) -> Result<(), HostModuleError> {
        if memories.len() > 1 {
            return Err(HostModuleError::TooManyMemories(
                memories.into_keys().collect(),
            ));
        }
        for (name, ty) in memories {
            if ty.min > ty.max {
                return Err(HostModuleError::MemoryLimits {
                    name,
                    min: ty.min,
                    max: ty.max,
                });
            }
            self.check_export_name(ExternKind::Memory, &name)?;
            let index = self.memories.push(ty);
            self.exports.insert(name, EntityIndex::Memory(index));
        }
        Ok(())
    }

    fn add_globals(&mut self, globals: BTreeMap<String, Global>) -> Result<(), HostModuleError> {
        for name in globals.keys() {
            self.check_export_name(ExternKind::Global, name)?;
        }
        for (name, global) in globals {
            let index = self.globals.push(global);
            self.exports.insert(name, EntityIndex::Global(index));
        }
        Ok(())
    }

    fn check_export_name(&self, kind: ExternKind, name: &str) -> Result<(), HostModuleError> {
        match self.exports.get(name) {
            Some(existing) => Err(HostModuleError::DuplicateExport {
                kind,
                name: name.to_string(),
                existing: existing.kind(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        EntityRef, FuncIndex, GlobalIndex, MemoryIndex, TypeIndex, WasmFuncType, WasmValType,
    };

    fn global() -> Global {
        Global {
            ty: WasmValType::I64,
            mutable: false,
            init: 42,
        }
    }

    #[test]
    fn functions_sorted_and_types_deduplicated() {
        let module = HostModuleBuilder::new("env")
            .func_wrap("sub", |a: i32, b: i32| a - b)
            .func_wrap("add", |a: i32, b: i32| a + b)
            .func_wrap("widen", |a: i32| i64::from(a))
            .build()
            .unwrap();

        assert_eq!(&module.func_names[FuncIndex::new(0)], "add");
        assert_eq!(&module.func_names[FuncIndex::new(1)], "sub");
        assert_eq!(&module.func_names[FuncIndex::new(2)], "widen");
        assert_eq!(module.types.len(), 2);
        assert_eq!(module.functions[FuncIndex::new(0)], TypeIndex::new(0));
        assert_eq!(module.functions[FuncIndex::new(1)], TypeIndex::new(0));
        assert_eq!(module.functions[FuncIndex::new(2)], TypeIndex::new(1));
        assert_eq!(
            module.export("sub"),
            Some(EntityIndex::Function(FuncIndex::new(1)))
        );

        let sub = module.host_function(FuncIndex::new(1));
        assert_eq!(sub.debug_name, "env.sub");
        let mut slots = [10, 3];
        sub.call(&mut slots);
        assert_eq!(slots[0], 7);
    }

    #[test]
    fn memory_and_globals() {
        let module = HostModuleBuilder::new("env")
            .memory("memory", MemoryType::new(1, 2))
            .global("b", global())
            .global("a", global())
            .build()
            .unwrap();
        assert_eq!(
            module.export("memory"),
            Some(EntityIndex::Memory(MemoryIndex::new(0)))
        );
        assert_eq!(
            module.export("a"),
            Some(EntityIndex::Global(GlobalIndex::new(0)))
        );
        assert_eq!(
            module.export("b"),
            Some(EntityIndex::Global(GlobalIndex::new(1)))
        );
        assert!(module.functions.is_empty());
    }

    #[test]
    fn rejects_two_memories() {
        let err = HostModuleBuilder::new("env")
            .memory("b", MemoryType::new(1, 1))
            .memory("a", MemoryType::new(1, 1))
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "only one memory is allowed, but configured: a, b"
        );
    }

    #[test]
    fn rejects_min_over_max() {
        let err = HostModuleBuilder::new("env")
            .memory("mem", MemoryType::new(2, 1))
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "memory[mem] min 2 pages (128 Ki) > max 1 pages (64 Ki)"
        );
    }

    #[test]
    fn rejects_clashing_names() {
        let err = HostModuleBuilder::new("env")
            .func_wrap("x", || {})
            .global("x", global())
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "global[x] exports the same name as a func");

        let err = HostModuleBuilder::new("env")
            .func_wrap("x", || {})
            .memory("x", MemoryType::new(0, 1))
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "memory[x] exports the same name as a func");

        let err = HostModuleBuilder::new("env")
            .memory("x", MemoryType::new(0, 1))
            .global("x", global())
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "global[x] exports the same name as a memory");
    }

    #[test]
    fn rejects_reference_types() {
        let ty: WasmFuncType = "i32, funcref".parse().unwrap();
        let err = HostModuleBuilder::new("env")
            .func("f", HostFunc::new(ty, |_| {}))
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "func[f] param[1] has unsupported type funcref"
        );
    }
}
