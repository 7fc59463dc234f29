use std::fs;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use pretty_assertions::assert_eq;
use tempfile::tempdir;

const FN_DO_WHILE: &str = "\
def fn_do_while():
    limit = 12
    x = 1
    y = 1
    print(x, y)
    while True:
        z = x + y
        print(z)
        x = y
        y = z
        if not y < limit:
            break
";

fn nassi(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_nassi"))
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .stdin(Stdio::null())
        .output()
        .expect("failed to run nassi")
}

fn tex_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .flatten()
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tex"))
        .collect();
    names.sort();
    names
}

#[test]
fn writes_the_default_file_name() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("prog.py"), FN_DO_WHILE).unwrap();

    let output = nassi(dir.path(), &["prog.py"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "Wrote structogram_fn_do_while.tex\n"
    );

    let tex = fs::read_to_string(dir.path().join("structogram_fn_do_while.tex")).unwrap();
    assert!(tex.starts_with("% def fn_do_while():\n"));
    assert!(tex.contains("\\until[8]{y \\textless\\  limit}"));
    assert!(tex.ends_with("% [06] 13\n"));
}

#[test]
fn unsupported_construct_writes_nothing() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("prog.py"),
        "def f():\n    total = 0\n    for i in range(3):\n        total = total + i\n",
    )
    .unwrap();

    let output = nassi(dir.path(), &["prog.py"]);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(
        String::from_utf8_lossy(&output.stderr).trim_end(),
        "ERROR: line 3: unsupported construct: for loop"
    );
    assert!(tex_files(dir.path()).is_empty());
}

#[test]
fn explicit_output_without_dry_run() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("prog.py"), FN_DO_WHILE).unwrap();

    let output = nassi(dir.path(), &["prog.py", "--no-dry-run", "-o", "loop.tex"]);
    assert!(output.status.success());
    assert_eq!(tex_files(dir.path()), vec!["loop.tex"]);

    let tex = fs::read_to_string(dir.path().join("loop.tex")).unwrap();
    assert!(tex.ends_with("% No structogram output generated (dry run disabled)\n"));
}

#[test]
fn output_name_without_tex_suffix_is_replaced() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("prog.py"), FN_DO_WHILE).unwrap();

    let output = nassi(dir.path(), &["prog.py", "-o", "loop.txt"]);
    assert!(output.status.success());
    assert_eq!(tex_files(dir.path()), vec!["structogram_fn_do_while.tex"]);
}

#[test]
fn input_answers_come_from_a_file() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("prog.py"),
        "def other():\n    pass\n\ndef ask():\n    n = int(input('n? '))\n    print(n * 2)\n",
    )
    .unwrap();
    fs::write(dir.path().join("answers.txt"), "21\n").unwrap();

    let output = nassi(
        dir.path(),
        &["prog.py", "-f", "ask", "--stdin-file", "answers.txt"],
    );
    assert!(output.status.success());
    let tex = fs::read_to_string(dir.path().join("structogram_ask.tex")).unwrap();
    assert!(tex.contains("\\assign[6]{Input(n)}"));
    assert!(tex.ends_with("% Output of structogram ask (1 lines)\n% [01] n? 42\n"));
}

#[test]
fn verbose_prints_the_report() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("prog.py"), FN_DO_WHILE).unwrap();

    let output = nassi(dir.path(), &["prog.py", "-v", "--log-level", "off"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with(&"-".repeat(60)));
    assert!(stdout.contains("Output of function/structogram fn_do_while (6 lines)\n1 1\n2\n"));
    assert!(stdout.ends_with("Wrote structogram_fn_do_while.tex\n"));
}

#[test]
fn unknown_function_is_an_error() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("prog.py"), FN_DO_WHILE).unwrap();

    let output = nassi(dir.path(), &["prog.py", "-f", "missing"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no function named `missing` found"));
}
