use crate::trampoline;
use anyhow::Result;
use entrygen_codegen::isa::aarch64::inst::Inst;
use entrygen_codegen::{CodegenError, EntryTrampoline};
use entrygen_environ::{Tunables, WasmFuncType, WasmValType, emscripten};
use entrygen_interp::decode::{Op, decode};
use proptest::prelude::*;

#[test]
fn sum_listing() -> Result<()> {
    let entry = trampoline("i32, i32 -> i32")?;
    assert_eq!(
        entry.assembly(),
        [
            "mov x20, x0",
            "str x29, [x20, #16]",
            "mov x27, sp",
            "str x27, [x20, #24]",
            "str x30, [x20, #32]",
            "mov sp, x26",
            "mov x25, x19",
            "ldr w2, [x25], #8",
            "ldr w3, [x25], #8",
            "bl #28",
            "str w0, [x19], #8",
            "ldr x29, [x20, #16]",
            "ldr x27, [x20, #24]",
            "mov sp, x27",
            "ldr x30, [x20, #32]",
            "ret",
        ]
    );
    assert_eq!(entry.call_site, 36);
    assert_eq!(entry.body_offset, 64);
    Ok(())
}

#[test]
fn emscripten_invoke_viiiddiiiiii() -> Result<()> {
    let _ = env_logger::try_init();
    let invoke = emscripten::invoke_func_type("invoke_viiiddiiiiii")?;
    assert_eq!(invoke.host.params().len(), 12);
    assert_eq!(invoke.host.params()[0], WasmValType::I32);
    let entry = EntryTrampoline::emit(&invoke.inner, &Tunables::default())?;
    assert_eq!(
        entry.assembly(),
        [
            "mov x20, x0",
            "str x29, [x20, #16]",
            "mov x27, sp",
            "str x27, [x20, #24]",
            "str x30, [x20, #32]",
            "sub x26, x26, #32",
            "mov sp, x26",
            "ldr w2, [x19], #8",
            "ldr w3, [x19], #8",
            "ldr w4, [x19], #8",
            "ldr d0, [x19], #8",
            "ldr d1, [x19], #8",
            "ldr w5, [x19], #8",
            "ldr w6, [x19], #8",
            "ldr w7, [x19], #8",
            "ldr w27, [x19], #8",
            "str w27, [sp]",
            "ldr w27, [x19], #8",
            "str w27, [sp, #8]",
            "ldr w27, [x19], #8",
            "str w27, [sp, #16]",
            "bl #24",
            "ldr x29, [x20, #16]",
            "ldr x27, [x20, #24]",
            "mov sp, x27",
            "ldr x30, [x20, #32]",
            "ret",
        ]
    );
    assert_eq!(entry.call_site, 84);
    assert_eq!(entry.body_offset, 108);
    Ok(())
}

#[test]
fn configured_context_offsets() -> Result<()> {
    let tunables = Tunables::from_toml(
        "[execution_context]\n\
         original_frame_pointer = 48\n\
         original_stack_pointer = 56\n\
         host_return_address = 40000\n",
    )?;
    let entry = EntryTrampoline::emit(&"".parse()?, &tunables)?;
    let asm = entry.assembly();
    assert_eq!(asm[1], "str x29, [x20, #48]");
    assert_eq!(asm[3], "str x27, [x20, #56]");
    assert_eq!(asm[4], "movz x16, #40000");
    assert_eq!(asm[5], "str x30, [x20, x16]");
    assert_eq!(asm[asm.len() - 3], "movz x16, #40000");
    assert_eq!(asm[asm.len() - 2], "ldr x30, [x20, x16]");
    Ok(())
}

#[test]
fn errors() -> Result<()> {
    let err = EntryTrampoline::emit(&"i32 -> externref".parse()?, &Tunables::default())
        .unwrap_err();
    assert!(matches!(err, CodegenError::UnsupportedType(_)));
    assert_eq!(
        err.to_string(),
        "unsupported value type externref in entry signature"
    );

    let tunables = Tunables {
        reserved_params: 9,
        ..Tunables::default()
    };
    let err = EntryTrampoline::emit(&"".parse()?, &tunables).unwrap_err();
    assert_eq!(err, CodegenError::TooManyReservedParams(9));
    Ok(())
}

fn value_type() -> impl Strategy<Value = WasmValType> {
    prop_oneof![
        Just(WasmValType::I32),
        Just(WasmValType::I64),
        Just(WasmValType::F32),
        Just(WasmValType::F64),
        Just(WasmValType::V128),
    ]
}

fn func_type() -> impl Strategy<Value = WasmFuncType> {
    (
        prop::collection::vec(value_type(), 0..24),
        prop::collection::vec(value_type(), 0..24),
    )
        .prop_map(|(params, results)| WasmFuncType::new(params.into(), results.into()))
}

proptest! {
    #[test]
    fn call_lands_on_body(sig in func_type()) {
        let entry = EntryTrampoline::emit(&sig, &Tunables::default()).unwrap();
        let code = entry.emit();
        prop_assert_eq!(code.len() as u32, entry.body_offset);

        let at = entry.call_site as usize;
        let word = u32::from_le_bytes([code[at], code[at + 1], code[at + 2], code[at + 3]]);
        let expected = i64::from(entry.body_offset - entry.call_site);
        prop_assert_eq!(decode(word), Some(Op::Bl { offset: expected }));

        // Exactly one call, and nothing left unresolved.
        let calls = entry
            .insts
            .iter()
            .filter(|(_, inst)| matches!(inst, Inst::Call { .. } | Inst::CallPlaceholder))
            .count();
        prop_assert_eq!(calls, 1);

        // Every emitted word is one the interpreter understands.
        for chunk in code.chunks(4) {
            let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            prop_assert!(decode(word).is_some(), "{:#010x}", word);
        }
    }

    #[test]
    fn listing_matches_decoder(sig in func_type()) {
        let entry = EntryTrampoline::emit(&sig, &Tunables::default()).unwrap();
        let decoded: Vec<String> = entry
            .emit()
            .chunks(4)
            .filter_map(|c| decode(u32::from_le_bytes([c[0], c[1], c[2], c[3]])))
            .map(|op| op.to_string())
            .collect();
        prop_assert_eq!(decoded, entry.assembly());
    }
}
