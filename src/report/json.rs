use super::types::TestReport;
use anyhow::{Context, Result};
use std::path::Path;

/// Generate JSON report
pub fn generate(report: &TestReport, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;

    if let Some(path) = output {
        std::fs::write(path, json)?;
        println!("JSON report saved to: {}", path.display());
    } else {
        println!("{}", json);
    }

    Ok(())
}

/// Write `<mode>-test-report.json` into `dir`, returning its path
pub fn write_report(report: &TestReport, dir: &Path, mode: &str) -> Result<std::path::PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create report directory {}", dir.display()))?;
    let path = dir.join(format!("{}-test-report.json", mode));
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json)
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    Ok(path)
}

/// Read a report back from disk
pub fn read_report(path: &Path) -> Result<TestReport> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read report {}", path.display()))?;
    let report = serde_json::from_str(&content)
        .with_context(|| format!("Invalid report {}", path.display()))?;
    Ok(report)
}
