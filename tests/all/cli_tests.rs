use anyhow::{Result, bail};
use std::io::Write;
use std::process::{Command, Output};
use tempfile::NamedTempFile;

fn entrygen(args: &[&str]) -> Result<Output> {
    let mut me = std::env::current_exe()?;
    me.pop(); // chop off the file name
    me.pop(); // chop off `deps`
    me.push("entrygen");
    Ok(Command::new(&me).args(args).env_remove("RUST_LOG").output()?)
}

fn run_entrygen(args: &[&str]) -> Result<String> {
    let output = entrygen(args)?;
    if !output.status.success() {
        bail!(
            "Failed to execute entrygen with: {:?}\n{}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(String::from_utf8(output.stdout)?)
}

fn run_entrygen_expecting_failure(args: &[&str]) -> Result<String> {
    let output = entrygen(args)?;
    if output.status.success() {
        bail!("entrygen with {args:?} should have failed");
    }
    Ok(String::from_utf8(output.stderr)?)
}

#[test]
fn disas_sum() -> Result<()> {
    let stdout = run_entrygen(&["disas", "i32, i32 -> i32"])?;
    assert!(
        stdout.starts_with(";; entry trampoline for `(func (param i32 i32) (result i32))`\n"),
        "{stdout}"
    );
    assert!(
        stdout.contains(";; call at 36, compiled function at 64\n"),
        "{stdout}"
    );
    assert!(stdout.contains("     0:  mov x20, x0\n"), "{stdout}");
    assert!(stdout.contains("    36:  bl #28\n"), "{stdout}");
    assert!(stdout.ends_with("    60:  ret\n"), "{stdout}");
    Ok(())
}

#[test]
fn disas_bytes() -> Result<()> {
    let stdout = run_entrygen(&["disas", "--bytes", "--color", "never", "-> i64"])?;
    // orr x20, xzr, x0
    assert!(stdout.contains("     0: f4 03 00 aa  mov x20, x0\n"), "{stdout}");
    // ret
    assert!(stdout.contains(" c0 03 5f d6  ret\n"), "{stdout}");
    Ok(())
}

#[test]
fn disas_emscripten() -> Result<()> {
    let stdout = run_entrygen(&["disas", "--emscripten", "invoke_iii"])?;
    // The trampoline is generated for the function behind the invoke, without
    // the table index.
    assert!(
        stdout.starts_with(";; entry trampoline for `(func (param i32 i32) (result i32))`\n"),
        "{stdout}"
    );

    let stderr = run_entrygen_expecting_failure(&["disas", "--emscripten", "invoke_ivi"])?;
    assert!(
        stderr.contains("`v` is only valid as the result of `invoke_ivi`"),
        "{stderr}"
    );
    Ok(())
}

#[test]
fn disas_with_config() -> Result<()> {
    let mut config = NamedTempFile::new()?;
    write!(
        config,
        "reserved_params = 0\n\
         \n\
         [execution_context]\n\
         original_frame_pointer = 0\n\
         original_stack_pointer = 8\n\
         host_return_address = 40000\n"
    )?;
    let path = config.path().to_str().unwrap();
    let stdout = run_entrygen(&["disas", "--config", path, "i64 -> i64"])?;
    assert!(stdout.contains("  str x29, [x20]\n"), "{stdout}");
    assert!(stdout.contains("  movz x16, #40000\n"), "{stdout}");
    assert!(stdout.contains("  ldr x0, [x25], #8\n"), "{stdout}");

    let mut bad = NamedTempFile::new()?;
    write!(bad, "[execution_context]\noriginal_stack_pointer = 12\n")?;
    let path = bad.path().to_str().unwrap();
    let stderr = run_entrygen_expecting_failure(&["disas", "--config", path, "i64"])?;
    assert!(stderr.contains("failed to load config file"), "{stderr}");
    assert!(stderr.contains("not 8-byte aligned"), "{stderr}");
    Ok(())
}

#[test]
fn disas_rejects_reference_types() -> Result<()> {
    let stderr = run_entrygen_expecting_failure(&["disas", "externref"])?;
    assert!(
        stderr.contains("unsupported value type externref in entry signature"),
        "{stderr}"
    );
    let stderr = run_entrygen_expecting_failure(&["disas", "i32, u8"])?;
    assert!(stderr.contains("unknown value type `u8`"), "{stderr}");
    Ok(())
}

#[cfg(feature = "disas")]
#[test]
fn disas_capstone() -> Result<()> {
    let stdout = run_entrygen(&["disas", "--capstone", "f64 -> f64"])?;
    assert!(stdout.contains(";; mov x20, x0"), "{stdout}");
    assert!(stdout.contains(";; ret"), "{stdout}");
    assert!(!stdout.contains("<not decoded>"), "{stdout}");
    Ok(())
}

#[test]
fn run_echo() -> Result<()> {
    let stdout = run_entrygen(&["run", "i64, f64, i32, v128", "7", "2.5", "-3", "0x1f"])?;
    assert!(stdout.contains("result[0] i64 = 7\n"), "{stdout}");
    assert!(stdout.contains("result[1] f64 = 2.5\n"), "{stdout}");
    assert!(stdout.contains("result[2] i32 = -3\n"), "{stdout}");
    assert!(
        stdout.contains("result[3] v128 = 0x0000000000000000000000000000001f\n"),
        "{stdout}"
    );
    assert!(stdout.contains("fp 0x7ffff00d0000"), "{stdout}");
    Ok(())
}

#[test]
fn run_stack_arguments() -> Result<()> {
    let sig = ["i64"; 12].join(", ");
    let values: Vec<String> = (1..=12).map(|i| (i * 100).to_string()).collect();
    let mut args = vec!["run", sig.as_str()];
    args.extend(values.iter().map(String::as_str));
    let stdout = run_entrygen(&args)?;
    assert!(stdout.contains("result[11] i64 = 1200\n"), "{stdout}");
    Ok(())
}

#[test]
fn run_wrong_arity() -> Result<()> {
    let stderr = run_entrygen_expecting_failure(&["run", "i32, i32", "1"])?;
    assert!(stderr.contains("takes 2 parameters but 1 values were given"), "{stderr}");
    let stderr = run_entrygen_expecting_failure(&["run", "i32", "nope"])?;
    assert!(stderr.contains("`nope` is not an integer"), "{stderr}");
    Ok(())
}
