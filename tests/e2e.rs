use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use stack_vm::asm;
use stack_vm::vm::bytecode;
use tempfile::TempDir;

const BANNER: &str = concat!("stack-vm (", env!("CARGO_PKG_VERSION"), ")\n");

fn svm(dir: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_svm"))
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("failed to execute svm");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Assemble `source` and write it to `dir/name` as an encoded program.
fn write_program(dir: &Path, name: &str, source: &str) -> PathBuf {
    let words = asm::assemble(source).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, bytecode::encode(&words)).unwrap();
    path
}

fn run_program(source: &str) -> (String, String, bool) {
    let dir = TempDir::new().unwrap();
    let path = write_program(dir.path(), "prog.bin", source);
    svm(dir.path(), &["run", path.to_str().unwrap()])
}

#[test]
fn test_run_prints_banner_and_output() {
    let (stdout, stderr, success) = run_program("PUSH 'A'\nPRINT\nHALT");
    assert!(success, "stderr:\n{}", stderr);
    assert_eq!(stdout, format!("{}A", BANNER));
}

#[test]
fn test_run_subroutine() {
    let source = r#"
        CALL hi
        HALT
    hi:
        PUSH 'h'
        PRINT
        PUSH 'i'
        PRINT
        RET
    "#;
    let (stdout, stderr, success) = run_program(source);
    assert!(success, "stderr:\n{}", stderr);
    assert_eq!(stdout, format!("{}hi", BANNER));
}

#[test]
fn test_run_failure_reports_error() {
    let (stdout, stderr, success) = run_program("PUSH 'x'\nPRINT\nPOP\nHALT");
    assert!(!success);
    assert_eq!(stdout, format!("{}x", BANNER));
    assert!(
        stderr.contains("error running program: stack underflow"),
        "stderr:\n{}",
        stderr
    );
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, success) = svm(dir.path(), &["run", "does-not-exist.bin"]);
    assert!(!success);
    assert!(stderr.contains("error loading file"), "stderr:\n{}", stderr);
}

#[test]
fn test_partial_word_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.bin");
    std::fs::write(&path, [0u8, 0, 0, 0, 0]).unwrap();

    let (_, stderr, success) = svm(dir.path(), &["run", path.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("error reading program"), "stderr:\n{}", stderr);
    assert!(stderr.contains("5 bytes"), "stderr:\n{}", stderr);
}

#[test]
fn test_stack_size_flag() {
    let dir = TempDir::new().unwrap();
    let path = write_program(dir.path(), "prog.bin", "PUSH 1\nPUSH 2\nHALT");
    let file = path.to_str().unwrap();

    let (_, _, success) = svm(dir.path(), &["run", file, "--stack-size", "2"]);
    assert!(success);

    let (_, stderr, success) = svm(dir.path(), &["run", file, "--stack-size", "1"]);
    assert!(!success);
    assert!(stderr.contains("stack overflow"), "stderr:\n{}", stderr);
}

#[test]
fn test_config_file_is_discovered() {
    let dir = TempDir::new().unwrap();
    let path = write_program(dir.path(), "prog.bin", "PUSH 1\nPUSH 2\nHALT");
    std::fs::write(dir.path().join("svm.toml"), "[vm]\nstack_size = 1\n").unwrap();

    let (_, stderr, success) = svm(dir.path(), &["run", path.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("stack overflow"), "stderr:\n{}", stderr);

    // Flags win over the file.
    let (_, stderr, success) = svm(
        dir.path(),
        &["run", path.to_str().unwrap(), "--stack-size", "8"],
    );
    assert!(success, "stderr:\n{}", stderr);
}

#[test]
fn test_bad_config_file() {
    let dir = TempDir::new().unwrap();
    let path = write_program(dir.path(), "prog.bin", "HALT");
    std::fs::write(dir.path().join("svm.toml"), "[vm\n").unwrap();

    let (_, stderr, success) = svm(dir.path(), &["run", path.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("failed to parse"), "stderr:\n{}", stderr);
}

#[test]
fn test_timeout_stops_infinite_loop() {
    let dir = TempDir::new().unwrap();
    let path = write_program(dir.path(), "spin.bin", "spin:\nPUSH spin\nJMP");

    let (_, stderr, success) = svm(
        dir.path(),
        &["run", path.to_str().unwrap(), "--timeout", "1"],
    );
    assert!(!success);
    assert!(stderr.contains("timed out"), "stderr:\n{}", stderr);
}

#[test]
fn test_trace_logs_to_stderr() {
    let dir = TempDir::new().unwrap();
    let path = write_program(dir.path(), "prog.bin", "NOP\nHALT");

    let (stdout, stderr, success) = svm(dir.path(), &["run", path.to_str().unwrap(), "--trace"]);
    assert!(success, "stderr:\n{}", stderr);
    assert_eq!(stdout, BANNER);
    assert!(stderr.contains("NOP"), "stderr:\n{}", stderr);
    assert!(stderr.contains("HALT"), "stderr:\n{}", stderr);
    // Events from the binary itself are included too.
    assert!(stderr.contains("program decoded"), "stderr:\n{}", stderr);
    assert!(stderr.contains("run finished"), "stderr:\n{}", stderr);
}

#[test]
fn test_print_reaches_stdout_before_halt() {
    let dir = TempDir::new().unwrap();
    let path = write_program(
        dir.path(),
        "spin.bin",
        "PUSH 'A'\nPRINT\nspin:\nPUSH spin\nJMP",
    );

    let mut child = Command::new(env!("CARGO_BIN_EXE_svm"))
        .current_dir(dir.path())
        .env_remove("RUST_LOG")
        .args(["run", path.to_str().unwrap()])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to execute svm");

    thread::sleep(Duration::from_millis(1500));
    child.kill().unwrap();
    let output = child.wait_with_output().unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout, format!("{}A", BANNER));
}

#[test]
fn test_unallocatable_stack_size_flag() {
    let dir = TempDir::new().unwrap();
    let path = write_program(dir.path(), "prog.bin", "HALT");
    let huge = usize::MAX.to_string();

    for flag in ["--stack-size", "--return-stack-size"] {
        let (_, stderr, success) = svm(
            dir.path(),
            &["run", path.to_str().unwrap(), flag, huge.as_str()],
        );
        assert!(!success);
        assert!(
            stderr.contains("error loading program: cannot allocate a stack"),
            "stderr:\n{}",
            stderr
        );
        assert!(!stderr.contains("panicked"), "stderr:\n{}", stderr);
    }
}

#[test]
fn test_unallocatable_stack_size_in_config() {
    let dir = TempDir::new().unwrap();
    let path = write_program(dir.path(), "prog.bin", "HALT");
    std::fs::write(
        dir.path().join("svm.toml"),
        format!("[vm]\nstack_size = {}\n", i64::MAX),
    )
    .unwrap();

    let (_, stderr, success) = svm(dir.path(), &["run", path.to_str().unwrap()]);
    assert!(!success);
    assert!(
        stderr.contains("cannot allocate a stack"),
        "stderr:\n{}",
        stderr
    );
    assert!(!stderr.contains("panicked"), "stderr:\n{}", stderr);
}

#[test]
fn test_asm_then_run() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("hello.asm");
    std::fs::write(&src, "PUSH 'o'\nPRINT\nPUSH 'k'\nPRINT\nHALT\n").unwrap();

    let (_, stderr, success) = svm(
        dir.path(),
        &["asm", src.to_str().unwrap(), "-o", "hello.bin"],
    );
    assert!(success, "stderr:\n{}", stderr);

    let (stdout, stderr, success) = svm(dir.path(), &["run", "hello.bin"]);
    assert!(success, "stderr:\n{}", stderr);
    assert_eq!(stdout, format!("{}ok", BANNER));
}

#[test]
fn test_asm_default_output_path() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("prog.asm");
    std::fs::write(&src, "HALT\n").unwrap();

    let (_, stderr, success) = svm(dir.path(), &["asm", src.to_str().unwrap()]);
    assert!(success, "stderr:\n{}", stderr);
    assert_eq!(
        std::fs::read(dir.path().join("prog.bin")).unwrap(),
        vec![0, 0, 0, 0]
    );
}

#[test]
fn test_asm_error_points_at_line() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("bad.asm");
    std::fs::write(&src, "NOP\nFROB 1\nHALT\n").unwrap();

    let (_, stderr, success) = svm(dir.path(), &["asm", src.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("unknown instruction `FROB`"), "stderr:\n{}", stderr);
    assert!(stderr.contains("bad.asm:2"), "stderr:\n{}", stderr);
    assert!(!dir.path().join("bad.bin").exists());
}

#[test]
fn test_asm_rejects_empty_program() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("empty.asm");
    std::fs::write(&src, "; nothing here\n").unwrap();

    let (_, stderr, success) = svm(dir.path(), &["asm", src.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("empty program"), "stderr:\n{}", stderr);
}

#[test]
fn test_disasm_human() {
    let dir = TempDir::new().unwrap();
    let path = write_program(dir.path(), "prog.bin", "PUSH 'A'\nPRINT\nHALT");

    let (stdout, stderr, success) = svm(dir.path(), &["disasm", path.to_str().unwrap()]);
    assert!(success, "stderr:\n{}", stderr);
    assert_eq!(
        stdout,
        "    PUSH 65             ; 0000 'A'\n    PRINT               ; 0002\n    HALT                ; 0003\n"
    );
}

#[test]
fn test_disasm_json() {
    let dir = TempDir::new().unwrap();
    let path = write_program(dir.path(), "prog.bin", "NOP\n.word 99");

    let (stdout, stderr, success) = svm(
        dir.path(),
        &["disasm", path.to_str().unwrap(), "--format", "json"],
    );
    assert!(success, "stderr:\n{}", stderr);
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(
        value,
        serde_json::json!([
            { "addr": 0, "op": "NOP" },
            { "addr": 1, "op": ".word", "operand": 99 }
        ])
    );
}
