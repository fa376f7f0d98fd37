//! Failure reporting to an issue tracker
//!
//! A run with failed results produces exactly one issue; screenshots of the
//! failed results follow as comments with inline base64 images. Tracker
//! errors are logged and never change the outcome of the run.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::types::TestReport;
use crate::driver::common::iso_timestamp;
use crate::utils::config::{Config, GitHubConfig};

#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    #[error("Issue tracker is not configured (GITHUB_TOKEN, GITHUB_OWNER, GITHUB_REPO)")]
    NotConfigured,

    #[error("Issue tracker returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Issue tracker request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to read attachment: {0}")]
    Io(#[from] std::io::Error),
}

/// Issue payload as posted to the tracker
#[derive(Debug, Clone, Serialize)]
pub struct NewIssue {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub milestone: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreatedIssue {
    pub number: u64,
    #[serde(default)]
    pub html_url: String,
}

/// Context attached to an issue besides the report itself
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureDetails {
    pub request: Option<String>,
    pub environment: String,
    pub container: Option<String>,
    /// The test process itself failed, not an individual assertion
    pub execution_error: bool,
}

#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn create_issue(&self, issue: &NewIssue) -> Result<CreatedIssue, IssueError>;

    async fn add_comment(&self, number: u64, body: &str) -> Result<(), IssueError>;

    /// Labels, assignees and milestone applied to new issues
    fn issue_defaults(&self) -> (Vec<String>, Vec<String>, Option<u64>) {
        (Vec::new(), Vec::new(), None)
    }
}

/// GitHub REST issues client
pub struct GitHubIssueReporter {
    config: GitHubConfig,
    client: reqwest::Client,
}

impl GitHubIssueReporter {
    pub fn new(config: GitHubConfig) -> Result<Self, IssueError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("smart-tester/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { config, client })
    }

    pub fn from_config(config: &Config) -> Result<Self, IssueError> {
        let github = config.github.clone().ok_or(IssueError::NotConfigured)?;
        Self::new(github)
    }

    fn repo_url(&self, endpoint: &str) -> String {
        format!(
            "{}/repos/{}/{}{}",
            self.config.api_url, self.config.owner, self.config.repo, endpoint
        )
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> Result<reqwest::Response, IssueError> {
        let response = self
            .client
            .post(self.repo_url(endpoint))
            .bearer_auth(&self.config.token)
            .header("Accept", "application/vnd.github+json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IssueError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl IssueTracker for GitHubIssueReporter {
    async fn create_issue(&self, issue: &NewIssue) -> Result<CreatedIssue, IssueError> {
        let response = self.post("/issues", issue).await?;
        Ok(response.json::<CreatedIssue>().await?)
    }

    async fn add_comment(&self, number: u64, body: &str) -> Result<(), IssueError> {
        self.post(
            &format!("/issues/{}/comments", number),
            &serde_json::json!({ "body": body }),
        )
        .await?;
        Ok(())
    }

    fn issue_defaults(&self) -> (Vec<String>, Vec<String>, Option<u64>) {
        (
            self.config.labels.clone(),
            self.config.assignees.clone(),
            self.config.milestone,
        )
    }
}

pub fn format_issue_title(report: &TestReport) -> String {
    let failed: Vec<_> = report.failed().collect();
    match failed.as_slice() {
        [only] => format!("🚨 Test Failure: {}", only.test_name),
        _ => format!("🚨 Test Suite Failure: {} tests failed", failed.len()),
    }
}

pub fn format_issue_body(report: &TestReport, details: &FailureDetails) -> String {
    let mut body = String::from("## 🚨 Automated Test Failure Report\n\n");
    body.push_str(&format!("**Test Run:** {}\n", report.timestamp));
    body.push_str(&format!("**Environment:** {}\n\n", details.environment));

    body.push_str("### 📊 Summary\n");
    body.push_str(&format!("- **Total Tests:** {}\n", report.total_tests));
    body.push_str(&format!("- **Passed:** {} ✅\n", report.passed_tests));
    body.push_str(&format!("- **Failed:** {} ❌\n", report.failed_tests));
    body.push_str(&format!("- **Total Errors:** {}\n", report.total_errors));
    body.push_str(&format!("- **Total Warnings:** {}\n\n", report.total_warnings));

    if let Some(request) = &details.request {
        body.push_str(&format!("### 🎯 Test Request\n```\n{}\n```\n\n", request));
    }

    if details.execution_error {
        body.push_str("> The test process itself failed before producing results.\n\n");
    }

    let failed: Vec<_> = report.failed().collect();
    if !failed.is_empty() {
        body.push_str("### ❌ Failed Tests\n\n");
        for (i, test) in failed.iter().enumerate() {
            body.push_str(&format!("#### {}. {}\n", i + 1, test.test_name));
            body.push_str(&format!("**Timestamp:** {}\n\n", test.timestamp));

            if !test.errors.is_empty() {
                body.push_str("**Errors:**\n");
                for e in &test.errors {
                    body.push_str(&format!("- {}\n", e));
                }
                body.push('\n');
            }
            if !test.warnings.is_empty() {
                body.push_str("**Warnings:**\n");
                for w in &test.warnings {
                    body.push_str(&format!("- {}\n", w));
                }
                body.push('\n');
            }
            if !test.screenshots.is_empty() {
                body.push_str(&format!(
                    "**Screenshots:** {} captured\n",
                    test.screenshots.len()
                ));
            }
            if !test.html_dumps.is_empty() {
                body.push_str(&format!("**HTML Dumps:** {} captured\n", test.html_dumps.len()));
            }
            if let Some(data) = &test.data {
                let pretty = serde_json::to_string_pretty(data).unwrap_or_default();
                body.push_str(&format!("**Additional Data:**\n```json\n{}\n```\n", pretty));
            }
            body.push_str("---\n\n");
        }
    }

    let passed: Vec<_> = report.results.iter().filter(|r| r.success).collect();
    if !passed.is_empty() {
        body.push_str("### ✅ Passed Tests\n");
        for test in passed {
            body.push_str(&format!("- {}\n", test.test_name));
        }
        body.push('\n');
    }

    body.push_str("### 🔧 Environment Details\n");
    body.push_str(&format!("- **Base URL:** {}\n", details.environment));
    if let Some(container) = &details.container {
        body.push_str(&format!("- **Container:** {}\n", container));
    }
    body.push_str(&format!("- **Generated:** {}\n\n", iso_timestamp()));

    body.push_str("---\n*This issue was generated automatically by smart-tester.*\n");
    body
}

fn screenshot_comment(path: &Path) -> Result<String, IssueError> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    Ok(format!(
        "## Screenshot: {name}\n\n![{name}](data:image/png;base64,{data})",
        name = name,
        data = STANDARD.encode(bytes)
    ))
}

/// Open one issue for a report with failures and attach their screenshots.
///
/// Returns the created issue, or `None` when nothing failed or the tracker
/// rejected the issue.
pub async fn report_failures(
    tracker: &dyn IssueTracker,
    report: &TestReport,
    details: &FailureDetails,
) -> Option<CreatedIssue> {
    if report.failed_tests == 0 {
        log::debug!("No failed tests, skipping issue creation");
        return None;
    }

    let (labels, assignees, milestone) = tracker.issue_defaults();
    let issue = NewIssue {
        title: format_issue_title(report),
        body: format_issue_body(report, details),
        labels,
        assignees,
        milestone,
    };

    let created = match tracker.create_issue(&issue).await {
        Ok(created) => {
            log::info!("Created issue #{} {}", created.number, created.html_url);
            created
        }
        Err(e) => {
            log::error!("Failed to create issue: {}", e);
            return None;
        }
    };

    let screenshots: Vec<&String> = report.failed().flat_map(|r| r.screenshots.iter()).collect();
    if !screenshots.is_empty() {
        log::info!(
            "Uploading {} screenshot(s) to issue #{}",
            screenshots.len(),
            created.number
        );
    }
    for shot in screenshots {
        let path = Path::new(shot);
        if !path.exists() {
            log::warn!("Screenshot {} no longer exists, skipping", shot);
            continue;
        }
        let result = match screenshot_comment(path) {
            Ok(body) => tracker.add_comment(created.number, &body).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            log::error!("Failed to upload screenshot {}: {}", shot, e);
        }
    }

    Some(created)
}
