use argh::FromArgs;
use genfsm::cmdline::Opts;
use genfsm::driver::run;
use genfsm_ir::Config;
use genfsm_utils::{ErrorKind, FsmResult};
use std::fs;
use std::path::Path;

const COUNT: &str = "\
def count(n):
    i = 0
    while i < n:
        yield i
        i += 1
";

fn opts(args: &[&str]) -> Opts {
    Opts::from_args(&["genfsm"], args)
        .unwrap_or_else(|exit| panic!("bad arguments: {}", exit.output))
}

fn path(p: &Path) -> &str {
    p.to_str().unwrap()
}

/// Compile `src` from a file in `dir` with `args` appended.
fn compile_in(dir: &Path, src: &str, args: &[&str]) -> FsmResult<()> {
    let file = dir.join("gen.py");
    fs::write(&file, src).unwrap();
    let mut all = vec![path(&file)];
    all.extend_from_slice(args);
    run(opts(&all))
}

#[test]
fn bad_input_row_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.v");
    let tb = dir.path().join("tb.v");
    let err = compile_in(
        dir.path(),
        COUNT,
        &["-o", path(&out), "--testbench", path(&tb), "--input", "1,2"],
    )
    .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::StructuralType(_)));
    assert!(!out.exists());
    assert!(!tb.exists());
}

#[test]
fn rejected_generator_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.v");
    let dot = dir.path().join("g.dot");
    let src = "def f(n):\n    while n > 0:\n        yield n\n";
    assert!(
        compile_in(dir.path(), src, &["-o", path(&out), "--dot", path(&dot)])
            .is_err()
    );
    assert!(!out.exists());
    assert!(!dot.exists());
}

#[test]
fn every_requested_output_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.v");
    let tb = dir.path().join("tb.v");
    let json = dir.path().join("g.json");
    compile_in(
        dir.path(),
        COUNT,
        &[
            "-o",
            path(&out),
            "--testbench",
            path(&tb),
            "--json",
            path(&json),
            "--input",
            "3",
            "--random-ready",
            "-O",
            "2",
        ],
    )
    .unwrap();
    let verilog = fs::read_to_string(&out).unwrap();
    assert!(verilog.starts_with("module count("));
    assert!(verilog.contains("  input wire _ready,\n"));
    let testbench = fs::read_to_string(&tb).unwrap();
    assert!(testbench.contains("_ready = $random;"));
    assert!(testbench.contains("n = 3;"));
    assert!(fs::read_to_string(&json).unwrap().contains("\"nodes\""));
}

#[test]
fn saved_config_without_random_ready() {
    let text = r#"{
        "optimization_level": 2,
        "register_size": 8,
        "module_name": "top"
    }"#;
    let config: Config = serde_json::from_str(text).unwrap();
    assert_eq!(config.optimization_level, 2);
    assert_eq!(config.module_name.as_deref(), Some("top"));
    assert!(!config.random_ready);
    config.validate().unwrap();
}
