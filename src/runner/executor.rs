use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

use super::actions::ActionRunner;
use super::context::{ArtifactStore, RunMode};
use crate::driver::traits::PageDriver;
use crate::parser::{
    builtin_scenarios, extract_user_context, load_scenarios, parse_request, select_scenarios,
    TestScenario,
};
use crate::report::issue::{report_failures, FailureDetails, IssueTracker};
use crate::report::types::{TestReport, TestResult};
use crate::report::{html, json, junit};
use crate::utils::config::Config;

/// Per-run switches coming from the CLI
#[derive(Debug, Clone, Default)]
pub struct ExecutorOptions {
    pub mode: RunMode,
    /// YAML scenario table replacing the built-in one
    pub scenarios: Option<PathBuf>,
    /// Also write `report.html` and `junit.xml`
    pub extra_reports: bool,
}

pub struct TestExecutor<'a> {
    page: &'a dyn PageDriver,
    config: &'a Config,
    options: ExecutorOptions,
    tracker: Option<Box<dyn IssueTracker>>,
}

impl<'a> TestExecutor<'a> {
    pub fn new(page: &'a dyn PageDriver, config: &'a Config, options: ExecutorOptions) -> Self {
        Self {
            page,
            config,
            options,
            tracker: None,
        }
    }

    /// Report failed runs to this tracker
    pub fn with_tracker(mut self, tracker: Box<dyn IssueTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    fn scenario_table(&self) -> Result<Vec<TestScenario>> {
        match &self.options.scenarios {
            Some(path) => {
                log::info!("Loading scenarios from {}", path.display());
                Ok(load_scenarios(path)?)
            }
            None => Ok(builtin_scenarios()),
        }
    }

    /// Dispatch `prompt`, run every selected action and return the results
    pub async fn collect(&self, prompt: &str) -> Result<Vec<TestResult>> {
        let mode = self.options.mode;
        let artifacts = ArtifactStore::new(&self.config.output_dir, mode)?;
        let user = extract_user_context(prompt, &self.config.credentials);
        println!(
            "{} Running as {} ({})",
            "👤".to_string().blue(),
            user.username.cyan(),
            user.role.as_str()
        );

        let mut runner = ActionRunner::new(self.page, &artifacts, &self.config.base_url, mode, user)
            .with_action_timeout(self.config.action_timeout_ms);
        let mut results = Vec::new();

        match mode {
            RunMode::Smart => {
                let requests = parse_request(prompt);
                println!("{} Planned {} test(s):", "📋".to_string().blue(), requests.len());
                for request in &requests {
                    println!("  {}. {}", request.priority, request.description);
                }

                for request in requests {
                    println!("\n{} {}", "▶".cyan(), request.action.test_name().bold());
                    for result in runner.run(request.action).await {
                        log_result(&result);
                        results.push(result);
                    }
                }
            }
            RunMode::Scenario => {
                let table = self.scenario_table()?;
                let selected = select_scenarios(&table, prompt);
                println!(
                    "{} Selected scenarios: {}",
                    "📋".to_string().blue(),
                    selected
                        .iter()
                        .map(|s| s.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );

                for scenario in selected {
                    println!(
                        "\n{} {} - {}",
                        "▶".cyan(),
                        scenario.name.bold(),
                        scenario.description
                    );
                    for action in &scenario.actions {
                        for mut result in runner.run(*action).await {
                            result.scenario = Some(scenario.name.clone());
                            log_result(&result);
                            results.push(result);
                        }
                    }
                }
            }
        }

        Ok(results)
    }

    /// Run `prompt` end to end: dispatch, write reports, print the summary
    /// and report failures
    pub async fn run(&self, prompt: &str) -> Result<TestReport> {
        println!(
            "{} {} mode request: {}",
            "🧪".to_string().blue(),
            self.options.mode.as_str(),
            prompt.cyan()
        );
        let results = self.collect(prompt).await?;
        let report = TestReport::from_results(results);

        let dir = &self.config.output_dir;
        let path = json::write_report(&report, dir, self.options.mode.as_str())?;
        println!(
            "\n{} JSON report saved to: {}",
            "📄".to_string().blue(),
            path.display().to_string().cyan()
        );

        if self.options.extra_reports {
            let html_path = dir.join("report.html");
            html::generate(&report, Some(&html_path))?;
            junit::write_report(&report, dir)?;
        }

        print_summary(&report);

        if let Some(tracker) = &self.tracker {
            let details = FailureDetails {
                request: Some(prompt.to_string()),
                environment: self.config.base_url.clone(),
                container: None,
                execution_error: false,
            };
            if let Some(issue) = report_failures(tracker.as_ref(), &report, &details).await {
                println!(
                    "{} Issue #{} created: {}",
                    "🐛".to_string().yellow(),
                    issue.number,
                    issue.html_url
                );
            }
        }

        Ok(report)
    }
}

/// Print one result block
pub fn log_result(result: &TestResult) {
    let status = if result.success {
        "PASS".green().bold()
    } else {
        "FAIL".red().bold()
    };
    let duration = result
        .duration_ms
        .map(|ms| format!(" ({}ms)", ms))
        .unwrap_or_default();
    println!("  [{}] {}{}", status, result.test_name, duration.dimmed());

    for error in &result.errors {
        println!("      {} {}", "✗".red(), error);
    }
    for warning in &result.warnings {
        println!("      {} {}", "⚠".yellow(), warning);
    }
    if !result.screenshots.is_empty() {
        println!(
            "      {} {} screenshot(s)",
            "📸".to_string().dimmed(),
            result.screenshots.len()
        );
    }
}

pub fn print_summary(report: &TestReport) {
    println!("\n{}", "═".repeat(50).dimmed());
    println!("{}", "Test Summary".bold());
    println!("  Total:       {}", report.total_tests);
    println!("  Passed:      {}", report.passed_tests.to_string().green());
    if report.failed_tests > 0 {
        println!("  Failed:      {}", report.failed_tests.to_string().red());
    } else {
        println!("  Failed:      {}", report.failed_tests);
    }
    println!("  Errors:      {}", report.total_errors);
    println!("  Warnings:    {}", report.total_warnings);
    println!("  Screenshots: {}", report.total_screenshots);
    println!("  Pass rate:   {}%", report.pass_rate());
    println!("{}", "═".repeat(50).dimmed());

    if report.all_passed() {
        println!("{} All tests passed", "✅".green());
    } else {
        for failed in report.failed() {
            println!("{} {}", "❌".red(), failed.test_name);
        }
    }
}
