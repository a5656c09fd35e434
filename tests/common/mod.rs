#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::{TempDir, tempdir};

pub const SAMPLE: &str = "orders_sample.csv";

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// The dashboard binary with logging quietened.
pub fn dashboard() -> Command {
    let mut cmd = Command::cargo_bin("sales-dashboard").expect("binary exists");
    cmd.env("RUST_LOG", "error");
    cmd
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Writes a CSV made of `header` and `rows`, one line each.
    pub fn write_orders(&self, name: &str, header: &str, rows: &[&str]) -> PathBuf {
        let mut contents = format!("{header}\n");
        for row in rows {
            contents.push_str(row);
            contents.push('\n');
        }
        self.write(name, &contents)
    }
}
