//!
//! # Test Common Utilities
//!
//! Builds a throwaway holdings tree plus a `pdsfile.json` that points at it,
//! and runs the `pdsfile` binary against that configuration.
//!
//
// // # 测试通用工具
// //
// // 在临时目录中搭建 holdings 目录树和对应的 `pdsfile.json`，
// // 并以该配置运行 `pdsfile` 二进制文件。
// //
#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::{TempDir, tempdir};

/// Represents the context for a single test.
///
/// The temporary directory is removed when the `TestContext` goes out of scope.
pub struct TestContext {
    /// Held for its Drop behavior to ensure cleanup.
    pub _temp_dir: TempDir,
    /// The single holdings root, `<tmp>/disk1/holdings`.
    pub holdings: PathBuf,
    pub config_path: PathBuf,
}

impl TestContext {
    /// Creates an empty holdings root and writes a configuration for it.
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempdir()?;
        let holdings = temp_dir.path().join("disk1").join("holdings");
        fs::create_dir_all(&holdings)?;

        let config_path = temp_dir.path().join("pdsfile.json");
        let config = serde_json::json!({
            "holdings": ["disk1/holdings"],
            "caseInsensitive": false,
        });
        fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;

        Ok(Self {
            _temp_dir: temp_dir,
            holdings,
            config_path,
        })
    }

    /// A context with two volumes, one older release and a few data files.
    ///
    /// ```text
    /// volumes/ABC_1xxx/ABC_1001/DATA/{A.IMG, A.LBL, B.IMG, C.IMG}
    /// volumes/ABC_1xxx/ABC_1002/
    /// volumes/ABC_1xxx_v1/ABC_1001/DATA/A.IMG
    /// ```
    pub fn with_sample() -> anyhow::Result<Self> {
        let ctx = Self::new()?;
        for name in ["A.IMG", "A.LBL", "B.IMG", "C.IMG"] {
            ctx.file(&format!("volumes/ABC_1xxx/ABC_1001/DATA/{}", name), "data")?;
        }
        ctx.dir("volumes/ABC_1xxx/ABC_1002")?;
        ctx.file("volumes/ABC_1xxx_v1/ABC_1001/DATA/A.IMG", "old")?;
        Ok(ctx)
    }

    pub fn dir(&self, logical: &str) -> anyhow::Result<PathBuf> {
        let path = self.holdings.join(logical);
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    pub fn file(&self, logical: &str, content: &str) -> anyhow::Result<PathBuf> {
        let path = self.holdings.join(logical);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    /// A `pdsfile` command already pointed at this context's configuration.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_pdsfile"));
        cmd.arg("--config").arg(&self.config_path);
        cmd.env_remove("PDSFILE_LOG").env_remove("RUST_LOG");
        cmd
    }

    /// Runs a command with `--json` and parses its stdout.
    pub fn json(&self, args: &[&str]) -> anyhow::Result<serde_json::Value> {
        let output = self.cmd().arg("--json").args(args).output()?;
        anyhow::ensure!(
            output.status.success(),
            "command {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        Ok(serde_json::from_slice(&output.stdout)?)
    }
}
