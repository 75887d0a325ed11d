#![allow(dead_code)]

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use tempfile::TempDir;

use sourcerack::{AppConfig, Container};

/// A throwaway Git repository driven through the real `git` binary.
pub struct GitFixture {
    dir: TempDir,
}

impl GitFixture {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        run_git(dir.path(), &["init", "--quiet", "--initial-branch=main"]);
        run_git(dir.path(), &["config", "user.email", "tests@example.com"]);
        run_git(dir.path(), &["config", "user.name", "Tests"]);
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn path_str(&self) -> String {
        self.dir.path().to_string_lossy().to_string()
    }

    pub fn write(&self, relative: &str, content: &str) {
        let target = self.dir.path().join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).expect("mkdir");
        }
        std::fs::write(target, content).expect("write fixture file");
    }

    pub fn write_bytes(&self, relative: &str, content: &[u8]) {
        let target = self.dir.path().join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).expect("mkdir");
        }
        std::fs::write(target, content).expect("write fixture file");
    }

    pub fn remove(&self, relative: &str) {
        std::fs::remove_file(self.dir.path().join(relative)).expect("remove fixture file");
    }

    pub fn commit(&self, message: &str) -> String {
        run_git(self.dir.path(), &["add", "-A"]);
        run_git(
            self.dir.path(),
            &["commit", "--quiet", "--allow-empty", "-m", message],
        );
        self.head()
    }

    pub fn head(&self) -> String {
        let output = Command::new("git")
            .arg("-C")
            .arg(self.dir.path())
            .args(["rev-parse", "HEAD"])
            .output()
            .expect("git rev-parse");
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }
}

fn run_git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .status()
        .expect("spawn git");
    assert!(status.success(), "git {:?} failed", args);
}

/// A container over a throwaway database with deterministic hash embeddings
/// and immediate GC eligibility.
pub struct TestHarness {
    pub container: Arc<Container>,
    #[allow(dead_code)]
    data_dir: TempDir,
}

pub async fn harness() -> TestHarness {
    harness_with(|_| {}).await
}

pub async fn harness_with(customize: impl FnOnce(&mut AppConfig)) -> TestHarness {
    let data_dir = TempDir::new().expect("tempdir");
    let mut config = AppConfig::default();
    config.storage.database_path = Some(data_dir.path().join("sourcerack.duckdb"));
    config.gc.retention_days = 0;
    customize(&mut config);
    let container = Container::new(config, false).await.expect("container");
    TestHarness {
        container: Arc::new(container),
        data_dir,
    }
}
