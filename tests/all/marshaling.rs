use crate::trampoline;
use anyhow::Result;
use entrygen_codegen::EntryTrampoline;
use entrygen_environ::{Tunables, WasmFuncType, WasmValType};
use entrygen_interp::{CallOutcome, EntryHarness, Trap, bodies};
use proptest::prelude::*;

/// Runs `sig` (whose results must be a prefix of its parameters) with the
/// increment body.
fn increment(sig: &str, tunables: &Tunables, params: &[u64]) -> Result<CallOutcome> {
    let _ = env_logger::try_init();
    let entry = EntryTrampoline::emit(&sig.parse()?, tunables)?;
    let body = bodies::increment(&entry.sig);
    Ok(EntryHarness::new(tunables).call(&entry, &body, params)?)
}

/// The flat array `bodies::increment` leaves behind when its results are
/// `types` and it was called with `params`. Slots past the results keep
/// their parameter values, as do the upper halves of 32-bit result slots.
fn incremented(types: &[WasmValType], params: &[u64]) -> Vec<u64> {
    fn low(slot: u64, value: u32) -> u64 {
        (slot & !0xffff_ffff) | u64::from(value)
    }
    let mut flat = params.to_vec();
    let mut slot = 0;
    for ty in types {
        let p = params[slot];
        match ty {
            WasmValType::I32 => flat[slot] = low(p, (p as u32).wrapping_add(1)),
            WasmValType::I64 => flat[slot] = p.wrapping_add(1),
            WasmValType::F32 => {
                let f = f32::from_bits(p as u32);
                flat[slot] = low(p, (f + f).to_bits());
            }
            WasmValType::F64 | WasmValType::V128 => {
                let f = f64::from_bits(p);
                flat[slot] = (f + f).to_bits();
                if *ty == WasmValType::V128 {
                    flat[slot + 1] = 0;
                }
            }
            WasmValType::Ref(_) => unreachable!("references are not marshaled"),
        }
        slot += ty.flat_slot_size() as usize / 8;
    }
    flat
}

#[test]
fn sum() -> Result<()> {
    let entry = trampoline("i32, i32 -> i32")?;
    let outcome = EntryHarness::new(&Tunables::default()).call(&entry, &bodies::sum_i32(), &[3, 4])?;
    assert_eq!(outcome.flat, [7, 4]);
    Ok(())
}

#[test]
fn i32_addition_wraps() -> Result<()> {
    let entry = trampoline("i32, i32 -> i32")?;
    let outcome = EntryHarness::new(&Tunables::default()).call(
        &entry,
        &bodies::sum_i32(),
        &[u64::from(u32::MAX), 2],
    )?;
    assert_eq!(outcome.flat[0], 1);
    Ok(())
}

#[test]
fn host_state_is_restored() -> Result<()> {
    for sig in [
        "",
        "i32 -> i32",
        "f64, f64, f64, f64, f64, f64, f64, f64, f64, f64 -> f64, f64, f64, f64, f64, f64, f64, f64, f64, f64",
        "i64, i64, i64, i64, i64, i64, i64, i64 -> i64, i64, i64, i64, i64, i64, i64, i64",
    ] {
        let ty = sig.parse::<WasmFuncType>()?;
        let params = vec![0x55; ty.params().len()];
        let outcome = increment(sig, &Tunables::default(), &params)?;
        assert_eq!(outcome.flat, incremented(ty.returns(), &params), "{sig}");
        assert_eq!(outcome.exit, outcome.entry, "{sig}");
        assert_eq!(outcome.saved, outcome.entry, "{sig}");
        // The execution context pointer survives the call in x20.
        assert_eq!(outcome.state.x(20), outcome.layout.execution_context);
    }
    Ok(())
}

#[test]
fn results_written_from_array_base() -> Result<()> {
    // Three parameters and one result: the parameters are read through a
    // copy of the array pointer so the result lands in slot 0.
    let entry = trampoline("i64, i64, i64 -> i64")?;
    assert!(entry.assembly().contains(&"mov x25, x19".to_string()));
    let outcome = EntryHarness::new(&Tunables::default()).call(
        &entry,
        &bodies::increment(&entry.sig),
        &[11, 22, 33],
    )?;
    assert_eq!(outcome.flat, [12, 22, 33]);

    // Results only: nothing to copy, results still start at slot 0.
    let entry = trampoline("-> i64")?;
    assert!(!entry.assembly().contains(&"mov x25, x19".to_string()));
    Ok(())
}

#[test]
fn stack_arguments_and_results() -> Result<()> {
    let ints = ["i32"; 12].join(", ");
    let floats = ["f32"; 10].join(", ");
    let vectors = ["v128"; 3].join(", ");
    let types = format!("{ints}, {floats}, {vectors}");
    let sig = format!("{types} -> {types}");

    let mut params: Vec<u64> = (1..=12).collect();
    params.extend((1..=10).map(|i| u64::from((i as f32 * 0.5).to_bits())));
    for i in 1..=3u64 {
        params.extend([(i as f64 * 0.25).to_bits(), 0x2222_0000_0000_0000 | i]);
    }
    let outcome = increment(&sig, &Tunables::default(), &params)?;
    let ty: WasmFuncType = sig.parse()?;
    let expected = incremented(ty.returns(), &params);
    assert_eq!(expected[..3], [2, 3, 4]);
    assert_eq!(expected[12], u64::from(1.0f32.to_bits()));
    assert_eq!(expected[22..24], [0.5f64.to_bits(), 0]);
    assert_eq!(outcome.flat, expected);
    assert_eq!(outcome.exit, outcome.entry);
    Ok(())
}

#[test]
fn large_execution_context_offsets() -> Result<()> {
    let tunables = Tunables::from_toml(
        "[execution_context]\n\
         original_frame_pointer = 40000\n\
         original_stack_pointer = 40008\n\
         host_return_address = 72\n",
    )?;
    let outcome = increment("i64, f64 -> i64, f64", &tunables, &[5, 2.5f64.to_bits()])?;
    assert_eq!(outcome.flat, [6, 5.0f64.to_bits()]);
    assert_eq!(outcome.saved, outcome.entry);
    assert_eq!(outcome.exit, outcome.entry);
    Ok(())
}

#[test]
fn reserved_params_are_configurable() -> Result<()> {
    let tunables = Tunables {
        reserved_params: 0,
        ..Tunables::default()
    };
    let entry = EntryTrampoline::emit(&"i32, i32 -> i32".parse()?, &tunables)?;
    assert!(entry.assembly().contains(&"ldr w0, [x25], #8".to_string()));
    let outcome = increment("i32, i32 -> i32, i32", &tunables, &[8, 9])?;
    assert_eq!(outcome.flat, [9, 10]);
    Ok(())
}

#[test]
fn traps_surface_as_errors() -> Result<()> {
    let entry = trampoline("i32 -> i32")?;
    // An all-zero body is `udf #0`.
    let err = EntryHarness::new(&Tunables::default())
        .call(&entry, &[0; 4], &[1])
        .unwrap_err();
    assert!(matches!(err, Trap::Undecodable { word: 0, .. }), "{err}");
    Ok(())
}

fn typed_value() -> impl Strategy<Value = (WasmValType, Vec<u64>)> {
    prop_oneof![
        any::<u32>().prop_map(|v| (WasmValType::I32, vec![u64::from(v)])),
        any::<u64>().prop_map(|v| (WasmValType::I64, vec![v])),
        (-1.0e6f32..1.0e6).prop_map(|v| (WasmValType::F32, vec![u64::from(v.to_bits())])),
        (-1.0e12f64..1.0e12).prop_map(|v| (WasmValType::F64, vec![v.to_bits()])),
        ((-1.0e12f64..1.0e12), any::<u64>())
            .prop_map(|(lo, hi)| (WasmValType::V128, vec![lo.to_bits(), hi])),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn round_trip(values in prop::collection::vec(typed_value(), 0..40)) {
        let types: Vec<WasmValType> = values.iter().map(|(ty, _)| *ty).collect();
        let flat: Vec<u64> = values.iter().flat_map(|(_, slots)| slots.iter().copied()).collect();
        let expected = incremented(&types, &flat);
        let sig = WasmFuncType::new(types.clone().into(), types.into());

        let tunables = Tunables::default();
        let entry = EntryTrampoline::emit(&sig, &tunables).unwrap();
        let outcome = EntryHarness::new(&tunables)
            .call(&entry, &bodies::increment(&entry.sig), &flat)
            .unwrap();
        prop_assert_eq!(&outcome.flat, &expected);
        prop_assert_eq!(outcome.exit, outcome.entry);
        prop_assert_eq!(outcome.saved, outcome.entry);
    }
}
