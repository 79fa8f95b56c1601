//! Implementation of the `entrygen disas` CLI command.

use crate::common::CommonOptions;
use anyhow::{Context, Result};
use clap::Parser;
use entrygen_codegen::{EntryTrampoline, MachInst};
use std::io::{IsTerminal, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Prints the entry trampoline generated for a signature.
#[derive(Parser)]
pub struct DisasCommand {
    #[command(flatten)]
    common: CommonOptions,

    /// Whether or not instruction bytes are displayed.
    #[arg(long)]
    bytes: bool,

    /// Whether or not to use color.
    #[arg(long, default_value = "auto")]
    color: ColorChoice,

    /// Show capstone's disassembly of each instruction alongside.
    #[cfg(feature = "disas")]
    #[arg(long)]
    capstone: bool,
}

impl DisasCommand {
    /// Executes the command.
    pub fn execute(self) -> Result<()> {
        let tunables = self.common.tunables()?;
        let sig = self.common.signature()?;
        let entry = EntryTrampoline::emit(&sig, &tunables)
            .with_context(|| format!("failed to generate the entry trampoline for `{sig}`"))?;
        let code = entry.emit();

        #[cfg(feature = "disas")]
        let reference = if self.capstone {
            Some(capstone_disas(&code)?)
        } else {
            None
        };

        let mut choice = self.color;
        if choice == ColorChoice::Auto && !std::io::stdout().is_terminal() {
            choice = ColorChoice::Never;
        }
        let mut stdout = StandardStream::stdout(choice);

        let mut color_address = ColorSpec::new();
        color_address.set_bold(true).set_fg(Some(Color::Yellow));
        let mut color_bytes = ColorSpec::new();
        color_bytes.set_fg(Some(Color::Magenta));
        let mut color_comment = ColorSpec::new();
        color_comment.set_fg(Some(Color::Cyan));

        stdout.set_color(&color_comment)?;
        writeln!(stdout, ";; entry trampoline for `{sig}`")?;
        writeln!(
            stdout,
            ";; call at {}, compiled function at {}",
            entry.call_site, entry.body_offset
        )?;
        stdout.reset()?;

        for (offset, _, inst) in entry.insts.iter_with_offsets() {
            let size = inst.byte_size();
            stdout.set_color(&color_address)?;
            write!(stdout, "{offset:>6}:")?;
            stdout.reset()?;

            if self.bytes {
                stdout.set_color(&color_bytes)?;
                for byte in &code[offset as usize..][..size as usize] {
                    write!(stdout, " {byte:02x}")?;
                }
                stdout.reset()?;
            }

            let text = inst.pretty_print();
            #[cfg(feature = "disas")]
            if let Some(reference) = &reference {
                write!(stdout, "  {text:<28}")?;
                let other = reference
                    .iter()
                    .find(|(at, _)| *at == u64::from(offset))
                    .map(|(_, text)| text.as_str())
                    .unwrap_or("<not decoded>");
                stdout.set_color(&color_comment)?;
                write!(stdout, ";; {other}")?;
                stdout.reset()?;
                writeln!(stdout)?;
                continue;
            }
            writeln!(stdout, "  {text}")?;
        }
        Ok(())
    }
}

/// Disassembles `code` with capstone, returning each instruction's offset
/// and text.
#[cfg(feature = "disas")]
fn capstone_disas(code: &[u8]) -> Result<Vec<(u64, String)>> {
    use capstone::prelude::*;

    let cs = capstone::Capstone::new()
        .arm64()
        .mode(capstone::arch::arm64::ArchMode::Arm)
        .build()
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let insts = cs
        .disasm_all(code, 0)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok(insts
        .iter()
        .map(|inst| {
            let text = match (inst.mnemonic(), inst.op_str()) {
                (Some(i), Some(o)) if !o.is_empty() => format!("{i} {o}"),
                (Some(i), _) => i.to_string(),
                _ => String::new(),
            };
            (inst.address(), text)
        })
        .collect())
}
