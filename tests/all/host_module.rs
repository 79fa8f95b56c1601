use anyhow::Result;
use entrygen_codegen::EntryTrampoline;
use entrygen_environ::emscripten;
use entrygen_environ::{
    EntityIndex, FuncIndex, Global, HostFunc, HostModuleBuilder, MemoryType, Tunables,
    WasmFuncType, WasmValType,
};

#[test]
fn trampoline_per_interned_type() -> Result<()> {
    let module = HostModuleBuilder::new("env")
        .func_wrap("add", |a: i32, b: i32| a.wrapping_add(b))
        .func_wrap("mul", |a: i32, b: i32| a.wrapping_mul(b))
        .func_wrap("scale", |a: f64, b: i64| a * b as f64)
        .func_wrap("split", |a: i64| (a as i32, (a >> 32) as i32))
        .memory("memory", MemoryType::new(1, 16))
        .global(
            "stack_pointer",
            Global {
                ty: WasmValType::I32,
                mutable: true,
                init: 0x1000,
            },
        )
        .build()?;
    assert_eq!(module.functions.len(), 4);
    assert_eq!(module.types.len(), 3);

    let tunables = Tunables::default();
    for (index, ty) in module.types.iter() {
        let entry = EntryTrampoline::emit(ty, &tunables)?;
        log::debug!("{index:?} {ty}:\n{}", entry.listing());
        assert_eq!(entry.sig.marshaled_args().len(), ty.params().len());
        assert_eq!(entry.sig.rets.len(), ty.returns().len());
        assert!(entry.sig.flat_array_size() as usize >= 8 * ty.flat_array_len());
    }
    Ok(())
}

#[test]
fn host_functions_use_flat_slots() -> Result<()> {
    let module = HostModuleBuilder::new("env")
        .func_wrap("scale", |a: f64, b: i64| a * b as f64)
        .func_wrap("split", |a: i64| (a as i32, (a >> 32) as i32))
        .build()?;

    let Some(EntityIndex::Function(split)) = module.export("split") else {
        panic!("split is not exported as a function");
    };
    assert_eq!(split, FuncIndex::from_u32(1));
    let split = module.host_function(split);
    assert_eq!(split.ty, "i64 -> i32, i32".parse()?);
    let mut slots = [0xffff_fffe_0000_0007, 0];
    split.call(&mut slots);
    assert_eq!(slots, [7, 0xffff_fffe]);

    let scale = module.host_functions().next().unwrap();
    assert_eq!(scale.debug_name, "env.scale");
    let mut slots = [1.5f64.to_bits(), 4];
    scale.call(&mut slots);
    assert_eq!(f64::from_bits(slots[0]), 6.0);
    Ok(())
}

#[test]
fn emscripten_invokes_as_host_functions() -> Result<()> {
    let imports = [
        ("env", "invoke_vii"),
        ("env", "invoke_iii"),
        ("env", "emscripten_notify_memory_growth"),
        ("wasi_snapshot_preview1", "invoke_vi"),
        ("env", "invoke_di"),
    ];
    let invokes = emscripten::invoke_imports(imports)?;
    let names: Vec<&str> = invokes.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, ["invoke_vii", "invoke_iii", "invoke_di"]);

    let mut builder = HostModuleBuilder::new(emscripten::ENV_MODULE);
    for invoke in &invokes {
        // Stand-in for a table call: results are zeroed.
        let results = invoke.host.returns().len();
        builder = builder.func(
            invoke.name.clone(),
            HostFunc::new(invoke.host.clone(), move |slots| {
                slots[..results].fill(0);
            }),
        );
    }
    let module = builder.build()?;
    assert_eq!(module.types.len(), 3);
    assert_eq!(
        module.func_type(FuncIndex::from_u32(0)),
        &"i32, i32 -> f64".parse::<WasmFuncType>()?
    );

    let tunables = Tunables::default();
    for invoke in &invokes {
        let host = EntryTrampoline::emit(&invoke.host, &tunables)?;
        let inner = EntryTrampoline::emit(&invoke.inner, &tunables)?;
        // The table index is one more marshaled argument.
        assert_eq!(
            host.sig.marshaled_args().len(),
            inner.sig.marshaled_args().len() + 1
        );
    }
    Ok(())
}

#[test]
fn malformed_invoke_names() {
    let err = emscripten::invoke_imports([("env", "invoke_vx")]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "unknown emscripten signature character `x` in `invoke_vx`"
    );
    let err = emscripten::invoke_func_type("invoke_").unwrap_err();
    assert_eq!(
        err.to_string(),
        "`invoke_` is not an emscripten invoke function name"
    );
    let err = emscripten::invoke_func_type("invoke_ivi").unwrap_err();
    assert_eq!(err.to_string(), "`v` is only valid as the result of `invoke_ivi`");
}

#[test]
fn reference_types_rejected_before_code_generation() {
    let err = HostModuleBuilder::new("env")
        .func(
            "table_get",
            HostFunc::new("i32 -> funcref".parse().unwrap(), |_| {}),
        )
        .build()
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "func[table_get] result[0] has unsupported type funcref"
    );
}
