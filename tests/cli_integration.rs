// CLI integration tests: exit codes, stdout formats, and stderr JSON diagnostics.
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use serde_json::Value;

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_pbvalidate");
    Command::new(exe)
}

fn write_file(path: &Path, content: &str) {
    std::fs::write(path, content).expect("write fixture");
}

fn parse_json(output: &[u8]) -> Value {
    let text = String::from_utf8_lossy(output);
    let line = text.lines().next().expect("json line");
    serde_json::from_str(line).expect("valid json")
}

fn error_json(output: &[u8]) -> Value {
    parse_json(output)
        .get("error")
        .cloned()
        .expect("error object")
}

const POINT_PROTO: &str = r#"syntax = "proto3";
package geo;
message Point { int32 x = 1; int32 y = 2; }
"#;

#[test]
fn valid_document_exits_zero() {
    let temp = tempfile::tempdir().expect("tempdir");
    let schema = temp.path().join("point.proto");
    let doc = temp.path().join("doc.json");
    write_file(&schema, POINT_PROTO);
    write_file(&doc, r#"{"x": 1, "y": 2}"#);

    let output = cmd()
        .args(["-f", schema.to_str().unwrap(), "-m", "geo.Point"])
        .arg(&doc)
        .output()
        .expect("run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("valid:"));
    assert!(stdout.contains("geo.Point"));
}

#[test]
fn json_flag_emits_report_on_stdout() {
    let temp = tempfile::tempdir().expect("tempdir");
    let schema = temp.path().join("point.proto");
    let doc = temp.path().join("doc.json");
    write_file(&schema, POINT_PROTO);
    write_file(&doc, r#"{"x": 1}"#);

    let output = cmd()
        .args(["--json", "-f", schema.to_str().unwrap(), "-m", "geo.Point"])
        .arg(&doc)
        .output()
        .expect("run");
    assert!(output.status.success());
    let report = parse_json(&output.stdout);
    assert_eq!(report["valid"], true);
    assert_eq!(report["message"], "geo.Point");
    assert_eq!(report["files_parsed"], 1);
}

#[test]
fn unknown_field_fails_with_decode_exit_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let schema = temp.path().join("point.proto");
    let doc = temp.path().join("doc.json");
    write_file(&schema, POINT_PROTO);
    write_file(&doc, r#"{"x": 1, "z": 2}"#);

    let output = cmd()
        .args(["-f", schema.to_str().unwrap(), "-m", "geo.Point"])
        .arg(&doc)
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(7));
    let error = error_json(&output.stderr);
    assert_eq!(error["kind"], "UnknownField");
    assert_eq!(error["field"], "z");
}

#[test]
fn missing_schema_is_an_io_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let doc = temp.path().join("doc.json");
    write_file(&doc, "{}");

    let output = cmd()
        .args(["-f", "no-such.proto", "-m", "geo.Point"])
        .arg(&doc)
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(3));
    let error = error_json(&output.stderr);
    assert_eq!(error["kind"], "Io");
    assert!(error["hint"].as_str().unwrap().contains("-I"));
}

#[test]
fn schema_parse_error_reports_position() {
    let temp = tempfile::tempdir().expect("tempdir");
    let schema = temp.path().join("bad.proto");
    let doc = temp.path().join("doc.json");
    write_file(&schema, "syntax = \"proto3\";\nmessage {\n");
    write_file(&doc, "{}");

    let output = cmd()
        .args(["-f", schema.to_str().unwrap(), "-m", "M"])
        .arg(&doc)
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(4));
    let error = error_json(&output.stderr);
    assert_eq!(error["kind"], "Parse");
    assert_eq!(error["line"], 2);
    assert!(error["path"].as_str().unwrap().ends_with("bad.proto"));
}

#[test]
fn missing_import_exits_with_resolution_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let schema = temp.path().join("root.proto");
    let doc = temp.path().join("doc.json");
    write_file(
        &schema,
        "syntax = \"proto3\";\nimport \"common.proto\";\nmessage M {}\n",
    );
    write_file(&doc, "{}");

    let output = cmd()
        .args([
            "-f",
            schema.to_str().unwrap(),
            "-I",
            temp.path().to_str().unwrap(),
            "-m",
            "M",
        ])
        .arg(&doc)
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(5));
    let error = error_json(&output.stderr);
    assert_eq!(error["kind"], "ImportNotFound");
    assert!(error["message"].as_str().unwrap().contains("common.proto"));
}

#[test]
fn unknown_message_exits_with_lookup_code_and_hint() {
    let temp = tempfile::tempdir().expect("tempdir");
    let schema = temp.path().join("point.proto");
    let doc = temp.path().join("doc.json");
    write_file(&schema, POINT_PROTO);
    write_file(&doc, "{}");

    let output = cmd()
        .args(["-f", schema.to_str().unwrap(), "-m", "Point"])
        .arg(&doc)
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(6));
    let error = error_json(&output.stderr);
    assert_eq!(error["kind"], "MessageNotFound");
    assert!(error["hint"].as_str().unwrap().contains("geo.Point"));
}

#[test]
fn dash_reads_document_from_stdin() {
    let temp = tempfile::tempdir().expect("tempdir");
    let schema = temp.path().join("point.proto");
    write_file(&schema, POINT_PROTO);

    let mut child = cmd()
        .args(["-f", schema.to_str().unwrap(), "-m", "geo.Point", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(b"{\"x\": 3}")
        .expect("write stdin");
    let output = child.wait_with_output().expect("wait");
    assert!(output.status.success());
}

#[test]
fn missing_required_flag_is_a_usage_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let doc = temp.path().join("doc.json");
    write_file(&doc, "{}");

    let output = cmd().arg(&doc).output().expect("run");
    assert_eq!(output.status.code(), Some(2));
    let error = error_json(&output.stderr);
    assert_eq!(error["kind"], "Usage");
}

#[test]
fn imports_resolve_across_search_roots() {
    let temp = tempfile::tempdir().expect("tempdir");
    let vendor = temp.path().join("vendor");
    std::fs::create_dir(&vendor).expect("mkdir");
    write_file(
        &temp.path().join("order.proto"),
        r#"syntax = "proto3";
package shop;
import "money.proto";
message Order { common.Money total = 1; }
"#,
    );
    write_file(
        &vendor.join("money.proto"),
        r#"syntax = "proto3";
package common;
message Money { int64 units = 1; string currency = 2; }
"#,
    );
    let doc = temp.path().join("doc.json");
    write_file(&doc, r#"{"total": {"units": "1200", "currency": "USD"}}"#);

    let output = cmd()
        .args([
            "--json",
            "-f",
            "order.proto",
            "-I",
            temp.path().to_str().unwrap(),
            "-I",
            vendor.to_str().unwrap(),
            "-m",
            "shop.Order",
        ])
        .arg(&doc)
        .output()
        .expect("run");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let report = parse_json(&output.stdout);
    assert_eq!(report["files_parsed"], 2);
}
