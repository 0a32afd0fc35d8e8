#![cfg(all(unix, feature = "cli"))]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const SCHEMA: &str = "\
enum Mode : uint8 { Idle, Run = 2 };
struct Pair { uint8 a; uint8 b; };
struct Status { Mode mode; uint16 ticks; };
";

// Pair is message 0: [0x7E][00 02 00][crc 62 66][01 02][crc 73 13]
const PAIR_FRAME: [u8; 10] = [0x7e, 0x00, 0x02, 0x00, 0x62, 0x66, 0x01, 0x02, 0x73, 0x13];

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/gpulink-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn schema_dir(tag: &str) -> PathBuf {
    let dir = unique_temp_dir(tag);
    let schemas = dir.join("schemas");
    fs::create_dir_all(&schemas).expect("schema dir should be creatable");
    fs::write(schemas.join("link.th"), SCHEMA).expect("schema should be writable");
    dir
}

fn gpulink(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gpulink"))
        .args(["--format", "json", "--log-level", "error"])
        .args(args)
        .output()
        .expect("gpulink should run")
}

fn arg(path: &Path) -> &str {
    path.to_str().expect("temp paths are utf-8")
}

fn json_lines(output: &Output) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("stdout lines should be json"))
        .collect()
}

#[test]
fn compile_generates_both_targets() {
    let dir = schema_dir("compile");
    let out = dir.join("out");
    let output = gpulink(&["compile", arg(&dir.join("schemas")), "--output", arg(&out)]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");

    let outcomes = &json_lines(&output)[0];
    assert_eq!(outcomes[0]["target"], "cpp");
    assert_eq!(outcomes[0]["ok"], true);
    assert_eq!(outcomes[1]["target"], "python");
    assert_eq!(outcomes[1]["ok"], true);

    let header = fs::read_to_string(out.join("cpp/messages/link.hpp")).expect("header written");
    assert!(header.contains("constexpr static uint8_t id = 1;"));
    let module = fs::read_to_string(out.join("python/messages/link.py")).expect("module written");
    assert!(module.contains("class Pair(LittleEndianStructure):"));
    assert!(out.join("cpp/CMakeLists.txt").exists());
    assert!(out.join("python/messages/__init__.py").exists());

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn compile_rejects_invalid_schema() {
    let dir = unique_temp_dir("compile-invalid");
    fs::write(dir.join("bad.th"), "struct Broken { Missing field; };").expect("schema written");
    let output = gpulink(&["compile", arg(&dir), "--output", arg(&dir.join("out"))]);
    assert_eq!(output.status.code(), Some(60), "{output:?}");
    assert!(!dir.join("out").exists());

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn compile_rejects_split_bit_runs() {
    let dir = unique_temp_dir("compile-bits");
    fs::write(dir.join("bits.th"), "struct P { uint8 a : 5; uint8 b : 5; };").expect("schema written");
    let output = gpulink(&["compile", arg(&dir), "--output", arg(&dir.join("out"))]);
    assert_eq!(output.status.code(), Some(60), "{output:?}");
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid bit-field `b`"));

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn compile_reports_a_failed_target() {
    let dir = unique_temp_dir("compile-reserved");
    fs::write(dir.join("r.th"), "struct Pair { uint8 lambda; };").expect("schema written");
    let out = dir.join("out");
    let output = gpulink(&["compile", arg(&dir), "--output", arg(&out)]);
    assert_eq!(output.status.code(), Some(60), "{output:?}");

    let outcomes = &json_lines(&output)[0];
    assert_eq!(outcomes[0]["ok"], true);
    assert_eq!(outcomes[1]["ok"], false);
    assert!(out.join("cpp/messages/r.hpp").exists());
    assert!(String::from_utf8_lossy(&output.stderr).contains("python bindings failed"));

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn ids_lists_messages_in_order() {
    let dir = schema_dir("ids");
    let output = gpulink(&["ids", arg(&dir.join("schemas"))]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");

    let ids = &json_lines(&output)[0];
    assert_eq!(ids[0]["name"], "Pair");
    assert_eq!(ids[0]["id"], 0);
    assert_eq!(ids[1]["name"], "Status");
    assert_eq!(ids[1]["id"], 1);
    assert_eq!(ids.as_array().map(Vec::len), Some(2));

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn decode_reports_messages_and_dropped_frames() {
    let dir = schema_dir("decode");
    let mut capture = vec![0x00, 0x55];
    capture.extend_from_slice(&PAIR_FRAME);
    let mut corrupt = PAIR_FRAME;
    corrupt[7] ^= 0xff;
    capture.extend_from_slice(&corrupt);
    let file = dir.join("capture.bin");
    fs::write(&file, &capture).expect("capture written");

    let output = gpulink(&["decode", arg(&dir.join("schemas")), "--file", arg(&file)]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");

    let lines = json_lines(&output);
    assert_eq!(lines[0]["name"], "Pair");
    assert_eq!(lines[0]["value"], serde_json::json!({ "a": 1, "b": 2 }));
    let summary = lines.last().expect("summary line");
    assert_eq!(summary["messages"], 1);
    assert_eq!(summary["dropped"], 1);
    assert_eq!(summary["skipped_bytes"], 2);

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn decode_accepts_hex() {
    let dir = schema_dir("decode-hex");
    let output = gpulink(&[
        "decode",
        arg(&dir.join("schemas")),
        "--hex",
        "7E 00 02 00 62 66 01 02 73 13",
    ]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");
    assert_eq!(json_lines(&output)[0]["id"], 0);

    let output = gpulink(&["decode", arg(&dir.join("schemas")), "--hex", "7g"]);
    assert_eq!(output.status.code(), Some(64), "{output:?}");

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn send_writes_a_frame_to_the_device() {
    let dir = schema_dir("send");
    let device = dir.join("device");
    fs::write(&device, b"").expect("device file created");

    let output = gpulink(&[
        "send",
        arg(&device),
        arg(&dir.join("schemas")),
        "--message",
        "Pair",
        "--json",
        r#"{"a":1,"b":2}"#,
    ]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");
    assert_eq!(fs::read(&device).expect("device readable"), PAIR_FRAME);

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn send_waits_for_acknowledgement() {
    let dir = schema_dir("send-ack");
    let device = dir.join("device");
    let ack = dir.join("ack");
    fs::write(&device, b"").expect("device file created");
    fs::write(&ack, [0xac, 0x01]).expect("ack file created");

    let schemas = dir.join("schemas");
    let base = [
        "send",
        arg(&device),
        arg(&schemas),
        "--message",
        "Status",
        "--json",
        r#"{"mode":"Run","ticks":7}"#,
        "--ack-device",
        arg(&ack),
        "--ack-timeout",
        "100ms",
    ];

    let mut args = base.to_vec();
    args.extend(["--ack", "ac01"]);
    let output = gpulink(&args);
    assert_eq!(output.status.code(), Some(0), "{output:?}");

    let mut args = base.to_vec();
    args.extend(["--ack", "ac02"]);
    let output = gpulink(&args);
    assert_eq!(output.status.code(), Some(3), "{output:?}");

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn send_rejects_unknown_message() {
    let dir = schema_dir("send-unknown");
    let device = dir.join("device");
    fs::write(&device, b"").expect("device file created");

    let output = gpulink(&[
        "send",
        arg(&device),
        arg(&dir.join("schemas")),
        "--message",
        "Mode",
    ]);
    assert_eq!(output.status.code(), Some(64), "{output:?}");
    assert!(fs::read(&device).expect("device readable").is_empty());

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn listen_prints_until_the_stream_ends() {
    let dir = schema_dir("listen");
    let device = dir.join("device");
    let mut stream = PAIR_FRAME.to_vec();
    stream.extend_from_slice(&PAIR_FRAME);
    fs::write(&device, &stream).expect("device file created");

    let output = gpulink(&["listen", arg(&device), arg(&dir.join("schemas"))]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");
    assert_eq!(json_lines(&output).len(), 2);

    let output = gpulink(&["listen", arg(&device), arg(&dir.join("schemas")), "--count", "1"]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");
    assert_eq!(json_lines(&output).len(), 1);

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn version_reports_name() {
    let output = gpulink(&["version"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("gpulink "));
}
