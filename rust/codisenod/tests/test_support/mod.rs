#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub const FIXTURE_CATALOG: &str = r#"{
  "fields": [
    { "name": "Lenguajes", "disciplines": [
      { "name": "Español", "contents": [
        { "id": 1, "content": "Lectura crítica", "pda": { "1": "Frag A\n\nFrag B", "2": "Frag C" } },
        { "id": 2, "content": "Oralidad", "pda": { "1": "Frag D" } }
      ]},
      { "name": "Inglés", "contents": [
        { "id": 1, "content": "Vocabulary", "pda": { "1": "Frag E" } }
      ]}
    ]},
    { "name": "Saberes y Pensamiento Científico", "disciplines": [
      { "name": "Matemáticas", "contents": [
        { "id": 1, "content": "Fracciones", "pda": { "1": "Frag F" } }
      ]}
    ]}
  ]
}"#;

pub struct Sidecar {
    pub child: Child,
    pub stdin: ChildStdin,
    pub reader: BufReader<ChildStdout>,
    seq: u64,
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn write_fixture_catalog(dir: &Path) -> PathBuf {
    let path = dir.join("catalog.json");
    std::fs::write(&path, FIXTURE_CATALOG).expect("write fixture catalog");
    path
}

pub fn spawn_sidecar_with_env(envs: &[(&str, String)]) -> Sidecar {
    let exe = env!("CARGO_BIN_EXE_codisenod");
    let mut cmd = Command::new(exe);
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    for (k, v) in envs {
        cmd.env(k, v);
    }
    let mut child = cmd.spawn().expect("spawn codisenod");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    Sidecar {
        child,
        stdin,
        reader: BufReader::new(stdout),
        seq: 0,
    }
}

/// Sidecar over the fixture catalog.
pub fn spawn_sidecar() -> (Sidecar, PathBuf) {
    let dir = temp_dir("codisenod-test");
    let catalog = write_fixture_catalog(&dir);
    let sidecar = spawn_sidecar_with_env(&[(
        "CODISENO__CATALOG__PATH",
        catalog.to_string_lossy().to_string(),
    )]);
    (sidecar, dir)
}

impl Sidecar {
    pub fn request(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.seq += 1;
        let id = self.seq.to_string();
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        writeln!(self.stdin, "{}", payload).expect("write request");
        self.stdin.flush().expect("flush request");

        let mut line = String::new();
        self.reader.read_line(&mut line).expect("read response line");
        assert!(!line.trim().is_empty(), "empty response for {}", method);
        let value: serde_json::Value =
            serde_json::from_str(line.trim()).expect("parse response json");
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn request_ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or_default()
    }

    /// Returns the error code.
    pub fn request_err(&mut self, method: &str, params: serde_json::Value) -> String {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value
            .pointer("/error/code")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string()
    }

    pub fn first_entry_id(&mut self) -> String {
        let result = self.request_ok("project.get", json!({}));
        result
            .pointer("/project/disciplines/0/id")
            .and_then(|v| v.as_str())
            .expect("first entry id")
            .to_string()
    }

    pub fn entry(&mut self, entry_id: &str) -> serde_json::Value {
        let result = self.request_ok("entry.options", json!({ "entryId": entry_id }));
        result.get("entry").cloned().expect("entry")
    }
}
