use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::driver::common::{artifact_stem, file_timestamp};
use crate::driver::traits::PageDriver;
use crate::report::types::TestResult;

/// Runner mode; selects the dispatcher and names artifact directories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Smart,
    Scenario,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Smart => "smart",
            RunMode::Scenario => "scenario",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "smart" => Some(RunMode::Smart),
            "scenario" | "advanced" => Some(RunMode::Scenario),
            _ => None,
        }
    }

    /// Upper bound on pages visited by the link crawl
    pub fn crawl_limit(&self) -> usize {
        match self {
            RunMode::Smart => 50,
            RunMode::Scenario => 30,
        }
    }
}

/// Where screenshots and HTML dumps of a run are written
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    pub screenshots_dir: PathBuf,
    pub html_dir: PathBuf,
}

impl ArtifactStore {
    /// `<output>/screenshots/<mode>-tests` and `<output>/html-dumps/<mode>-tests`
    pub fn new(output_dir: &Path, mode: RunMode) -> Result<Self> {
        let dir_name = format!("{}-tests", mode.as_str());
        let store = Self {
            screenshots_dir: output_dir.join("screenshots").join(&dir_name),
            html_dir: output_dir.join("html-dumps").join(&dir_name),
        };
        for dir in [&store.screenshots_dir, &store.html_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(store)
    }

    fn artifact_path(dir: &Path, name: &str, ext: &str) -> PathBuf {
        dir.join(format!("{}_{}.{}", artifact_stem(name), file_timestamp(), ext))
    }

    /// Save a full-page screenshot and record it on the result.
    /// A failed capture becomes a warning.
    pub async fn screenshot(&self, page: &dyn PageDriver, name: &str, result: &mut TestResult) {
        let path = Self::artifact_path(&self.screenshots_dir, name, "png");
        match page.screenshot(&path).await {
            Ok(()) => {
                log::debug!("Screenshot saved: {}", path.display());
                result.screenshots.push(path.display().to_string());
            }
            Err(e) => result.warn(format!("Screenshot '{}' failed: {:#}", name, e)),
        }
    }

    /// Save the current document's HTML and record it on the result
    pub async fn html_dump(&self, page: &dyn PageDriver, name: &str, result: &mut TestResult) {
        let path = Self::artifact_path(&self.html_dir, name, "html");
        let saved = match page.content().await {
            Ok(html) => std::fs::write(&path, html).map_err(anyhow::Error::from),
            Err(e) => Err(e),
        };
        match saved {
            Ok(()) => result.html_dumps.push(path.display().to_string()),
            Err(e) => result.warn(format!("HTML dump '{}' failed: {:#}", name, e)),
        }
    }

    /// Screenshot plus HTML dump
    pub async fn capture(&self, page: &dyn PageDriver, name: &str, result: &mut TestResult) {
        self.screenshot(page, name, result).await;
        self.html_dump(page, name, result).await;
    }
}
