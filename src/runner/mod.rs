pub mod actions;
pub mod context;
pub mod executor;
pub mod explore;
pub mod poller;
pub mod session;

use anyhow::{Context, Result};
use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;

pub use context::RunMode;
pub use executor::{ExecutorOptions, TestExecutor};
pub use poller::{PollerOptions, SubprocessRunner, TaskPoller};

use crate::report::issue::GitHubIssueReporter;
use crate::report::types::TestReport;
use crate::utils::config::Config;
use crate::utils::run_log::RunLog;

/// Open a browser, run `prompt` and return the report.
///
/// The whole run is bounded by `config.test_timeout_ms`. Failures are sent to
/// the issue tracker when `report_issues` is set and GitHub is configured.
pub async fn run_prompt(
    config: &Config,
    prompt: &str,
    options: ExecutorOptions,
    report_issues: bool,
) -> Result<TestReport> {
    let page = crate::driver::open_page(config).await?;
    let mut executor = TestExecutor::new(page.as_ref(), config, options);

    if report_issues {
        match GitHubIssueReporter::from_config(config) {
            Ok(reporter) => executor = executor.with_tracker(Box::new(reporter)),
            Err(e) => log::info!("Issue reporting disabled: {}", e),
        }
    }

    let timeout = Duration::from_millis(config.test_timeout_ms);
    tokio::time::timeout(timeout, executor.run(prompt))
        .await
        .with_context(|| format!("Test run exceeded {}ms", config.test_timeout_ms))?
}

/// Poll the task endpoint until Ctrl-C (or once)
pub async fn poll_tasks(config: &Config, once: bool) -> Result<()> {
    let log = RunLog::open(&config.output_dir.join("runner.log"))?;
    let options = PollerOptions {
        endpoint: config.task_endpoint(),
        interval: Duration::from_millis(config.poll_interval_ms),
        retries: config.retries,
        once,
        queue_capacity: 32,
        environment: config.base_url.clone(),
    };

    let mut poller = TaskPoller::new(options, Arc::new(SubprocessRunner::current_exe()?), log)?;
    match GitHubIssueReporter::from_config(config) {
        Ok(reporter) => poller = poller.with_tracker(Arc::new(reporter)),
        Err(e) => log::info!("Issue reporting disabled: {}", e),
    }

    let stop = poller.stop_handle();
    ctrlc::set_handler(move || {
        println!("\n{} Stopping poller...", "⏹️ ".yellow());
        stop.store(true, std::sync::atomic::Ordering::SeqCst);
    })?;

    poller.run().await
}
