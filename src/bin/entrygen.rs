//! The `entrygen` command line tool.
//!
//! Prints and runs the AArch64 entry trampolines generated for WebAssembly
//! signatures. See `entrygen --help` for usage.

use anyhow::Result;
use clap::Parser;

/// AArch64 entry-trampoline generator
#[derive(Parser)]
#[command(
    name = "entrygen",
    version = version(),
    after_help = "Usage examples:\n\
                  \n\
                  Printing the trampoline for a signature:\n\
                  \n  \
                  entrygen disas 'i32, i32 -> i32'\n\
                  \n\
                  Printing the trampoline behind an emscripten import:\n\
                  \n  \
                  entrygen disas --emscripten invoke_viiiddiiiiii\n\
                  \n\
                  Running a trampoline in the interpreter:\n\
                  \n  \
                  entrygen run 'i64, f64' 7 2.5\n"
)]
struct Entrygen {
    #[command(subcommand)]
    subcommand: Subcommand,
}

/// If ENTRYGEN_VERSION_INFO is set, use it, otherwise use CARGO_PKG_VERSION.
fn version() -> &'static str {
    option_env!("ENTRYGEN_VERSION_INFO").unwrap_or(env!("CARGO_PKG_VERSION"))
}

#[derive(Parser)]
enum Subcommand {
    /// Prints the entry trampoline of a signature
    Disas(entrygen_cli::commands::DisasCommand),

    /// Runs the entry trampoline of a signature in the interpreter
    Run(entrygen_cli::commands::RunCommand),
}

impl Entrygen {
    /// Executes the command.
    pub fn execute(self) -> Result<()> {
        match self.subcommand {
            Subcommand::Disas(c) => c.execute(),
            Subcommand::Run(c) => c.execute(),
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    Entrygen::parse().execute()
}

#[test]
fn verify_cli() {
    use clap::CommandFactory;
    Entrygen::command().debug_assert()
}
