//! Append-only text log kept by the task poller

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::driver::common::iso_timestamp;

pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    /// Open (or create) the log file; parent directories are created
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open run log {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `[timestamp] message` and echo it to stdout
    pub fn line(&self, message: &str) {
        let line = format!("[{}] {}", iso_timestamp(), message);
        println!("{}", line);

        let written = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .and_then(|mut f| writeln!(f, "{}", line));
        if let Err(e) = written {
            log::warn!("Failed to append to {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_are_appended_with_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::open(&dir.path().join("logs/runner.log")).unwrap();
        log.line("first");
        log.line("second");

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('[') && lines[0].ends_with("] first"));
        assert!(lines[1].ends_with("] second"));
    }
}
