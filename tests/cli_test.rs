//! Exercises the CLI binary's actual file-writing path end to end, the
//! way the teacher's own binary is meant to be driven: as a subprocess,
//! not through its library internals.

use std::process::Command;

use tempfile::NamedTempFile;

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_mirai-compiler"))
}

#[test]
fn compiles_a_demo_and_writes_a_nonempty_image() {
    let out = NamedTempFile::new().unwrap();
    let status = bin()
        .args(["--output", out.path().to_str().unwrap(), "--demo", "constant-fold"])
        .status()
        .unwrap();
    assert!(status.success());

    let bytes = std::fs::read(out.path()).unwrap();
    assert!(!bytes.is_empty());
    assert_eq!(bytes.len() % 4, 0, "output is a stream of 4-byte instruction words");
}

#[test]
fn dump_ir_and_dump_asm_emit_parseable_json() {
    let out = NamedTempFile::new().unwrap();
    let output = bin()
        .args(["--output", out.path().to_str().unwrap(), "--demo", "copy-prop", "--dump-ir", "--dump-asm"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let docs: Vec<serde_json::Value> = serde_json::Deserializer::from_str(&stdout)
        .into_iter::<serde_json::Value>()
        .collect::<Result<_, _>>()
        .expect("stdout should be a stream of pretty-printed JSON documents");
    assert_eq!(docs.len(), 2, "expected one IR dump and one asm dump");
    assert!(docs[0].get("entries").is_some());
    assert!(docs[1].get("instructions").is_some());
}

#[test]
fn register_info_subcommand_reports_the_allocatable_register_count() {
    let out = NamedTempFile::new().unwrap();
    let output = bin()
        .args(["--output", out.path().to_str().unwrap(), "register-info"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("allocatable registers"));
}
