pub mod html;
pub mod issue;
pub mod json;
pub mod junit;
pub mod types;

pub use issue::{report_failures, GitHubIssueReporter, IssueTracker};
pub use types::{TestReport, TestResult};

use anyhow::Result;
use std::path::Path;

/// Render a saved JSON report in another format
pub fn generate_report(results_path: &Path, format: &str, output: Option<&Path>) -> Result<()> {
    let report = json::read_report(results_path)?;

    match format {
        "json" => json::generate(&report, output),
        "html" => html::generate(&report, output),
        "junit" => {
            let xml = junit::generate_junit_xml(&report)?;
            match output {
                Some(path) => {
                    std::fs::write(path, xml)?;
                    println!("JUnit report saved to: {}", path.display());
                }
                None => println!("{}", xml),
            }
            Ok(())
        }
        _ => anyhow::bail!("Unknown format: {}", format),
    }
}
