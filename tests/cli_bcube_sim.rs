use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "ndncc-rs-{prefix}-{}-{nanos}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn write_file(dir: &PathBuf, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write temp file");
    path
}

fn run_bcube_sim(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bcube_sim"))
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("run bcube_sim")
}

fn consumer_lines(stdout: &str) -> Vec<&str> {
    stdout
        .lines()
        .filter(|line| line.starts_with("consumer "))
        .collect()
}

/// 取出 `key=value` 字段
fn field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.split_whitespace()
        .find_map(|tok| tok.strip_prefix(key)?.strip_prefix('='))
}

#[test]
fn default_scenario_writes_report_json() {
    let dir = unique_temp_dir("bcube-default");
    let out_json = dir.join("report.json");

    let output = run_bcube_sim(&[
        "--until-ms",
        "1500",
        "--report-json",
        out_json.to_str().unwrap(),
    ]);
    assert!(
        output.status.success(),
        "bcube_sim failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines = consumer_lines(&stdout);
    assert_eq!(lines.len(), 1, "stdout={stdout}");
    assert!(lines[0].starts_with("consumer S00 /prefix11 "), "{}", lines[0]);
    let data: u64 = field(lines[0], "data").unwrap().parse().unwrap();
    assert!(data > 0, "{}", lines[0]);
    assert!(stdout.lines().any(|l| l.starts_with("producer S11 /prefix11 served=")));

    let raw = fs::read_to_string(&out_json).expect("read report.json");
    let v: Value = serde_json::from_str(&raw).expect("parse report.json");
    assert_eq!(v["scenario"], "bcube-2-1-two-path");
    assert!((v["sim_time_s"].as_f64().unwrap() - 1.5).abs() < 1e-9);
    let consumers = v["consumers"].as_array().expect("consumers array");
    assert_eq!(consumers.len(), 1);
    assert_eq!(consumers[0]["totals"]["data"].as_u64(), Some(data));
    assert_eq!(v["servers"].as_array().map(Vec::len), Some(4));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn scenario_file_selects_topology_and_apps() {
    let dir = unique_temp_dir("bcube-scenario");
    let scenario = write_file(
        &dir,
        "scenario.json",
        r#"
{
    "name": "three-ary",
    "topology": { "kind": "bcube", "n": 3, "k": 1 },
    "producers": [ { "server": "S22", "prefix": "/video" } ],
    "consumers": [
        { "server": "S00", "prefix": "/video" },
        { "server": "S11", "prefix": "/video", "start_ms": 200 }
    ],
    "until_ms": 800
}
        "#,
    );
    let out_json = dir.join("report.json");

    let output = run_bcube_sim(&[
        "--scenario",
        scenario.to_str().unwrap(),
        "--report-json",
        out_json.to_str().unwrap(),
        "--no-limits",
    ]);
    assert!(
        output.status.success(),
        "bcube_sim failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(consumer_lines(&stdout).len(), 2, "stdout={stdout}");

    let v: Value =
        serde_json::from_str(&fs::read_to_string(&out_json).expect("read report.json"))
            .expect("parse report.json");
    assert_eq!(v["scenario"], "three-ary");
    assert_eq!(v["servers"].as_array().map(Vec::len), Some(9));
    for c in v["consumers"].as_array().unwrap() {
        assert!(c["totals"]["data"].as_u64().unwrap() > 0, "{c}");
    }
    // 关闭限速后接口上限为 0
    let s00 = &v["servers"][0];
    assert_eq!(s00["name"], "S00");
    assert_eq!(s00["faces"][0]["limit"].as_f64(), Some(0.0));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn unknown_server_fails_with_error() {
    let dir = unique_temp_dir("bcube-bad");
    let scenario = write_file(
        &dir,
        "scenario.json",
        r#"{ "topology": { "kind": "bcube", "n": 2, "k": 1 },
             "producers": [ { "server": "S99", "prefix": "/p" } ] }"#,
    );

    let output = run_bcube_sim(&["--scenario", scenario.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("S99"), "stderr={stderr}");

    let _ = fs::remove_dir_all(&dir);
}
