//! Implementation of the `entrygen run` CLI command.

use crate::common::CommonOptions;
use anyhow::{Context, Result, bail};
use clap::Parser;
use entrygen_codegen::EntryTrampoline;
use entrygen_environ::{WasmFuncType, WasmValType};
use entrygen_interp::{EntryHarness, bodies};

/// Runs the entry trampoline of a signature in the interpreter.
///
/// The trampoline calls a function that returns its arguments, so the
/// signature's results are taken to be its parameters; a successful run
/// prints the arguments back along with the host state the trampoline
/// restored.
#[derive(Parser)]
pub struct RunCommand {
    #[command(flatten)]
    common: CommonOptions,

    /// One value per parameter: integers in decimal or `0x` hex, floats in
    /// decimal.
    #[arg(value_name = "VALUES", allow_negative_numbers = true)]
    values: Vec<String>,
}

impl RunCommand {
    /// Executes the command.
    pub fn execute(self) -> Result<()> {
        let tunables = self.common.tunables()?;
        let sig = self.common.signature()?;
        let params = sig.params();
        if params.len() != self.values.len() {
            bail!(
                "`{sig}` takes {} parameters but {} values were given",
                params.len(),
                self.values.len()
            );
        }

        let echo = WasmFuncType::new(params.into(), params.into());
        let entry = EntryTrampoline::emit(&echo, &tunables)
            .with_context(|| format!("failed to generate the entry trampoline for `{echo}`"))?;

        let mut flat = Vec::new();
        for (ty, value) in params.iter().zip(&self.values) {
            flat.extend(parse_value(*ty, value)?);
        }

        let body = bodies::echo(&entry.sig);
        let outcome = EntryHarness::new(&tunables)
            .call(&entry, &body, &flat)
            .with_context(|| format!("calling `{echo}` trapped"))?;

        let mut slots = &outcome.flat[..];
        for (i, ty) in params.iter().enumerate() {
            let n = ty.flat_slot_size() as usize / 8;
            println!("result[{i}] {ty} = {}", format_value(*ty, &slots[..n]));
            slots = &slots[n..];
        }
        println!(
            "fp {:#x}, sp {:#x}, lr {:#x} after {} instructions",
            outcome.exit.fp, outcome.exit.sp, outcome.exit.lr, outcome.steps
        );
        if outcome.exit != outcome.entry {
            bail!(
                "host state not restored: entered with {:x?}, returned with {:x?}",
                outcome.entry,
                outcome.exit
            );
        }
        Ok(())
    }
}

fn parse_int(text: &str) -> Result<i128> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = match digits.strip_prefix("0x") {
        Some(hex) => i128::from_str_radix(hex, 16),
        None => digits.parse(),
    }
    .with_context(|| format!("`{text}` is not an integer"))?;
    Ok(if negative { -magnitude } else { magnitude })
}

/// Encodes `text` as a value of type `ty` in flat array slots.
fn parse_value(ty: WasmValType, text: &str) -> Result<Vec<u64>> {
    let slots = match ty {
        WasmValType::I32 => {
            let value = parse_int(text)?;
            if !(i128::from(i32::MIN)..=i128::from(u32::MAX)).contains(&value) {
                bail!("`{text}` is out of range for i32");
            }
            vec![u64::from(value as u32)]
        }
        WasmValType::I64 => {
            let value = parse_int(text)?;
            if !(i128::from(i64::MIN)..=i128::from(u64::MAX)).contains(&value) {
                bail!("`{text}` is out of range for i64");
            }
            vec![value as u64]
        }
        WasmValType::F32 => {
            let value: f32 = text
                .parse()
                .with_context(|| format!("`{text}` is not an f32"))?;
            vec![u64::from(value.to_bits())]
        }
        WasmValType::F64 => {
            let value: f64 = text
                .parse()
                .with_context(|| format!("`{text}` is not an f64"))?;
            vec![value.to_bits()]
        }
        WasmValType::V128 => {
            let value = match text.strip_prefix("0x") {
                Some(hex) => u128::from_str_radix(hex, 16),
                None => text.parse(),
            }
            .with_context(|| format!("`{text}` is not a v128"))?;
            vec![value as u64, (value >> 64) as u64]
        }
        WasmValType::Ref(_) => bail!("cannot pass a {ty} value"),
    };
    Ok(slots)
}

/// Renders the value of type `ty` held in `slots`.
fn format_value(ty: WasmValType, slots: &[u64]) -> String {
    match ty {
        WasmValType::I32 => format!("{}", slots[0] as u32 as i32),
        WasmValType::I64 => format!("{}", slots[0] as i64),
        WasmValType::F32 => format!("{}", f32::from_bits(slots[0] as u32)),
        WasmValType::F64 => format!("{}", f64::from_bits(slots[0])),
        WasmValType::V128 => {
            format!("{:#034x}", u128::from(slots[0]) | u128::from(slots[1]) << 64)
        }
        WasmValType::Ref(_) => format!("{:#x}", slots[0]),
    }
}
