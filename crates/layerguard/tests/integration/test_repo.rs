//! Temporary git repository helper for CLI scenarios.

#![allow(dead_code)]

use assert_cmd::cargo;
use assert_cmd::Command;
use layerguard_types::{ConfigFile, EnhancedMetadata};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestRepo {
    pub dir: TempDir,
    /// SHA of the initial commit.
    pub base_sha: String,
}

impl TestRepo {
    /// A repository whose first commit holds the starter `layerguard.toml`
    /// and a README.
    pub fn new() -> Self {
        let config = toml::to_string_pretty(&ConfigFile::starter()).expect("render starter");
        Self::with_initial_content(&[
            ("layerguard.toml", config.as_str()),
            ("README.md", "# infra\n"),
        ])
    }

    pub fn with_initial_content(files: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let path = dir.path();

        run_git(path, &["init"]);
        run_git(path, &["config", "user.email", "test@example.com"]);
        run_git(path, &["config", "user.name", "Test"]);

        for (file_path, content) in files {
            write(path, file_path, content);
        }

        run_git(path, &["add", "."]);
        run_git(path, &["commit", "-m", "initial baseline"]);
        let base_sha = run_git(path, &["rev-parse", "HEAD"]);

        Self { dir, base_sha }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_file(&self, relative_path: &str, content: &str) {
        write(self.path(), relative_path, content);
    }

    pub fn rename(&self, from: &str, to: &str) {
        if let Some(parent) = self.path().join(to).parent() {
            std::fs::create_dir_all(parent).expect("create parent dir");
        }
        run_git(self.path(), &["mv", from, to]);
    }

    /// Commit everything and return the new SHA.
    pub fn commit(&self, message: &str) -> String {
        run_git(self.path(), &["add", "-A"]);
        run_git(self.path(), &["commit", "-m", message]);
        run_git(self.path(), &["rev-parse", "HEAD"])
    }

    pub fn run_detect(&self, head_sha: &str) -> DetectResult {
        self.run_detect_with_args(head_sha, &[])
    }

    /// `layerguard detect --base <initial> --head <head_sha>` inside the repo.
    pub fn run_detect_with_args(&self, head_sha: &str, extra_args: &[&str]) -> DetectResult {
        let out_path = self.path().join("artifacts/layerguard/change-metadata.json");

        let mut cmd = Command::new(cargo::cargo_bin!("layerguard"));
        cmd.current_dir(self.path())
            .arg("detect")
            .arg("--base")
            .arg(&self.base_sha)
            .arg("--head")
            .arg(head_sha)
            .arg("--out")
            .arg(&out_path);
        for arg in extra_args {
            cmd.arg(arg);
        }

        let output = cmd.output().expect("run layerguard");

        let metadata = if out_path.exists() {
            Some(std::fs::read_to_string(&out_path).expect("read metadata"))
        } else {
            None
        };

        DetectResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            metadata,
            output_path: out_path,
        }
    }
}

#[derive(Debug)]
pub struct DetectResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub metadata: Option<String>,
    pub output_path: PathBuf,
}

impl DetectResult {
    pub fn assert_exit_code(&self, expected: i32) {
        assert_eq!(
            self.exit_code, expected,
            "expected exit {expected}, got {}\nstdout: {}\nstderr: {}",
            self.exit_code, self.stdout, self.stderr
        );
    }

    pub fn parse_metadata(&self) -> EnhancedMetadata {
        let text = self
            .metadata
            .as_ref()
            .unwrap_or_else(|| panic!("no metadata written\nstderr: {}", self.stderr));
        serde_json::from_str(text).expect("parse metadata")
    }
}

fn write(root: &Path, relative_path: &str, content: &str) {
    let full_path = root.join(relative_path);
    if let Some(parent) = full_path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dir");
    }
    std::fs::write(&full_path, content).expect("write file");
}

fn run_git(dir: &Path, args: &[&str]) -> String {
    let output = std::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}
