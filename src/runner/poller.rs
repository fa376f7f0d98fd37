//! Task poller
//!
//! Polls the application's task endpoint on a fixed interval and hands
//! pending prompts to a single worker through a bounded queue. The worker
//! runs one task at a time in a child process and reports failed tasks to
//! the issue tracker.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::report::issue::{report_failures, FailureDetails, IssueTracker};
use crate::report::types::{TestReport, TestResult};
use crate::utils::run_log::RunLog;

/// Container name recorded on execution failures
pub const RUNNER_CONTAINER: &str = "playwright_runner";

/// Lines of child output kept for the failure message
const OUTPUT_TAIL_LINES: usize = 20;

/// `run` exit code: the tests ran, some failed, and failures were reported
pub const EXIT_TESTS_FAILED: i32 = 1;

/// `run` exit code: the run itself could not complete
pub const EXIT_EXECUTION_ERROR: i32 = 2;

/// One task record from the task endpoint
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub prompt: String,
}

impl Task {
    pub fn is_pending(&self) -> bool {
        self.status.eq_ignore_ascii_case("pending") && !self.prompt.trim().is_empty()
    }

    /// Identity used to run each task once: the id when present, else the prompt
    pub fn key(&self) -> String {
        match &self.id {
            Some(serde_json::Value::String(id)) => format!("id:{}", id),
            Some(id) if !id.is_null() => format!("id:{}", id),
            _ => format!("prompt:{}", self.prompt),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TaskList {
    #[serde(default)]
    logs: Vec<Task>,
}

/// Result of one task execution
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
    /// Tail of the child's output
    pub output: String,
}

impl TaskOutcome {
    /// The tests ran to completion and reported their own failures
    pub fn tests_failed(&self) -> bool {
        !self.success && self.exit_code == Some(EXIT_TESTS_FAILED)
    }
}

/// Executes one prompt to completion
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, prompt: &str) -> Result<TaskOutcome>;
}

/// Runs each task as `<program> <args..> <prompt>` with `TEST_REQUEST` set
pub struct SubprocessRunner {
    program: PathBuf,
    args: Vec<String>,
}

impl SubprocessRunner {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Re-invoke this binary's `run` command
    pub fn current_exe() -> Result<Self> {
        let exe = std::env::current_exe().context("Failed to locate the smart-tester binary")?;
        Ok(Self::new(exe, vec!["run".to_string()]))
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

#[async_trait]
impl TaskRunner for SubprocessRunner {
    async fn run(&self, prompt: &str) -> Result<TaskOutcome> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(prompt)
            .env("TEST_REQUEST", prompt)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Failed to start {}", self.program.display()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        print!("{}", stdout);

        let source = if stderr.trim().is_empty() { &stdout } else { &stderr };
        Ok(TaskOutcome {
            success: output.status.success(),
            exit_code: output.status.code(),
            output: tail(source, OUTPUT_TAIL_LINES),
        })
    }
}

#[derive(Debug, Clone)]
pub struct PollerOptions {
    pub endpoint: String,
    pub interval: Duration,
    /// Extra attempts for a failed task
    pub retries: u32,
    /// Poll once, drain the queue and return
    pub once: bool,
    pub queue_capacity: usize,
    /// Recorded on failure issues (base URL of the system under test)
    pub environment: String,
}

pub struct TaskPoller {
    client: reqwest::Client,
    options: PollerOptions,
    runner: Arc<dyn TaskRunner>,
    tracker: Option<Arc<dyn IssueTracker>>,
    log: Arc<RunLog>,
    stop: Arc<AtomicBool>,
    seen: HashSet<String>,
}

impl TaskPoller {
    pub fn new(options: PollerOptions, runner: Arc<dyn TaskRunner>, log: RunLog) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            options,
            runner,
            tracker: None,
            log: Arc::new(log),
            stop: Arc::new(AtomicBool::new(false)),
            seen: HashSet::new(),
        })
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn IssueTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Setting the flag ends the poll loop after the current iteration
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub async fn fetch_tasks(&self) -> Result<Vec<Task>> {
        let response = self
            .client
            .get(&self.options.endpoint)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.options.endpoint))?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Task endpoint returned {}", status);
        }
        let list: TaskList = response.json().await.context("Invalid task list")?;
        Ok(list.logs)
    }

    /// Pending tasks not handed out before, in endpoint order. Keys of
    /// tasks that are no longer pending are forgotten.
    pub fn take_new(&mut self, tasks: Vec<Task>) -> Vec<Task> {
        let pending: Vec<Task> = tasks.into_iter().filter(|t| t.is_pending()).collect();
        let keys: HashSet<String> = pending.iter().map(Task::key).collect();
        self.seen.retain(|key| keys.contains(key));

        pending
            .into_iter()
            .filter(|t| self.seen.insert(t.key()))
            .collect()
    }

    /// Number of pending tasks remembered as already handed out
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    async fn sleep_interval(&self) {
        let step = Duration::from_millis(250);
        let mut waited = Duration::ZERO;
        while waited < self.options.interval && !self.stop.load(Ordering::SeqCst) {
            let chunk = step.min(self.options.interval - waited);
            tokio::time::sleep(chunk).await;
            waited += chunk;
        }
    }

    /// Poll until stopped (or once), then wait for the worker. After a stop
    /// request the worker drops whatever is still queued.
    pub async fn run(mut self) -> Result<()> {
        let (tx, rx) = mpsc::channel::<Task>(self.options.queue_capacity.max(1));
        let worker = tokio::spawn(work_queue(
            rx,
            Worker {
                runner: self.runner.clone(),
                tracker: self.tracker.clone(),
                log: self.log.clone(),
                stop: self.stop.clone(),
                retries: self.options.retries,
                environment: self.options.environment.clone(),
            },
        ));

        self.log.line(&format!(
            "Polling {} every {}ms",
            self.options.endpoint,
            self.options.interval.as_millis()
        ));

        while !self.stop.load(Ordering::SeqCst) {
            match self.fetch_tasks().await {
                Ok(tasks) => {
                    for task in self.take_new(tasks) {
                        if self.stop.load(Ordering::SeqCst) {
                            break;
                        }
                        self.log.line(&format!("Queued task: {}", task.prompt));
                        if tx.send(task).await.is_err() {
                            self.log.line("Task worker stopped, no longer queueing");
                            break;
                        }
                    }
                }
                Err(e) => self.log.line(&format!("Error polling for tasks: {:#}", e)),
            }

            if self.options.once {
                break;
            }
            self.sleep_interval().await;
        }

        drop(tx);
        worker.await.context("Task worker panicked")?;
        self.log.line("Poller stopped");
        Ok(())
    }
}

/// What the queue worker needs to execute tasks
pub struct Worker {
    pub runner: Arc<dyn TaskRunner>,
    pub tracker: Option<Arc<dyn IssueTracker>>,
    pub log: Arc<RunLog>,
    pub stop: Arc<AtomicBool>,
    pub retries: u32,
    pub environment: String,
}

impl Worker {
    fn stopping(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Run one task. Only execution errors are retried and reported here:
    /// a run whose tests failed has already reported its own failures.
    pub async fn execute(&self, task: &Task) -> bool {
        let attempts = self.retries + 1;
        let mut failure = String::new();

        for attempt in 1..=attempts {
            if self.stopping() {
                self.log.line(&format!("Skipping task, poller stopping: {}", task.prompt));
                return false;
            }
            self.log.line(&format!(
                "Executing task: {} (attempt {}/{})",
                task.prompt, attempt, attempts
            ));
            match self.runner.run(&task.prompt).await {
                Ok(outcome) if outcome.success => {
                    self.log.line(&format!("Task completed: {}", task.prompt));
                    return true;
                }
                Ok(outcome) if outcome.tests_failed() => {
                    self.log.line(&format!("Task completed with failing tests: {}", task.prompt));
                    return false;
                }
                Ok(outcome) => {
                    failure = match outcome.exit_code {
                        Some(code) => format!("exit code {}: {}", code, outcome.output),
                        None => format!("terminated by signal: {}", outcome.output),
                    };
                }
                Err(e) => failure = format!("{:#}", e),
            }

            if self.stopping() {
                self.log.line(&format!("Task interrupted: {} ({})", task.prompt, failure));
                return false;
            }
            self.log.line(&format!("Task failed: {} ({})", task.prompt, failure));
        }

        self.report_execution_error(task, &failure).await;
        false
    }

    async fn report_execution_error(&self, task: &Task, failure: &str) {
        let Some(tracker) = &self.tracker else {
            return;
        };
        let mut result = TestResult::new(format!("Task Execution: {}", task.prompt));
        result.error(format!("Test execution failed: {}", failure));
        let report = TestReport::from_results(vec![result.finish()]);

        let details = FailureDetails {
            request: Some(task.prompt.clone()),
            environment: self.environment.clone(),
            container: Some(RUNNER_CONTAINER.to_string()),
            execution_error: true,
        };
        match report_failures(tracker.as_ref(), &report, &details).await {
            Some(issue) => self
                .log
                .line(&format!("Reported failure as issue #{}", issue.number)),
            None => self.log.line("Failure could not be reported"),
        }
    }
}

/// Execute queued tasks one at a time; once stop is requested the rest of
/// the queue is dropped
async fn work_queue(mut rx: mpsc::Receiver<Task>, worker: Worker) {
    while let Some(task) = rx.recv().await {
        if worker.stopping() {
            rx.close();
            let mut dropped = 1;
            while rx.recv().await.is_some() {
                dropped += 1;
            }
            worker
                .log
                .line(&format!("Discarded {} queued task(s) on stop", dropped));
            break;
        }
        worker.execute(&task).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::issue::{CreatedIssue, IssueError, NewIssue};
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Mimics `smart-tester run`: prompts in `failing` end with failing
    /// tests (after filing their own issue), prompts in `crashing` cannot
    /// run at all
    #[derive(Default)]
    struct FakeRunner {
        prompts: Mutex<Vec<String>>,
        failing: Vec<&'static str>,
        crashing: Vec<&'static str>,
        tracker: Option<Arc<RecordingTracker>>,
        /// The stop flag is raised while this prompt runs, as Ctrl-C would
        interrupt_on: Option<&'static str>,
        stop: Mutex<Option<Arc<AtomicBool>>>,
    }

    #[async_trait]
    impl TaskRunner for FakeRunner {
        async fn run(&self, prompt: &str) -> Result<TaskOutcome> {
            self.prompts.lock().unwrap().push(prompt.to_string());

            if self.interrupt_on == Some(prompt) {
                if let Some(stop) = self.stop.lock().unwrap().as_ref() {
                    stop.store(true, Ordering::SeqCst);
                }
                return Ok(TaskOutcome {
                    success: false,
                    exit_code: None,
                    output: "interrupted".to_string(),
                });
            }
            if self.crashing.contains(&prompt) {
                return Ok(TaskOutcome {
                    success: false,
                    exit_code: Some(EXIT_EXECUTION_ERROR),
                    output: "browser crashed".to_string(),
                });
            }
            if self.failing.contains(&prompt) {
                if let Some(tracker) = &self.tracker {
                    let issue = NewIssue {
                        title: "🚨 Test Failure: Create Equipment Test".to_string(),
                        body: String::new(),
                        labels: Vec::new(),
                        assignees: Vec::new(),
                        milestone: None,
                    };
                    tracker.create_issue(&issue).await.unwrap();
                }
                return Ok(TaskOutcome {
                    success: false,
                    exit_code: Some(EXIT_TESTS_FAILED),
                    output: "1 test failed".to_string(),
                });
            }
            Ok(TaskOutcome {
                success: true,
                exit_code: Some(0),
                output: String::new(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingTracker {
        issues: Mutex<Vec<NewIssue>>,
    }

    #[async_trait]
    impl IssueTracker for RecordingTracker {
        async fn create_issue(&self, issue: &NewIssue) -> Result<CreatedIssue, IssueError> {
            self.issues.lock().unwrap().push(issue.clone());
            Ok(CreatedIssue {
                number: 1,
                html_url: String::new(),
            })
        }

        async fn add_comment(&self, _number: u64, _body: &str) -> Result<(), IssueError> {
            Ok(())
        }
    }

    fn task(id: Option<u64>, status: &str, prompt: &str) -> Task {
        Task {
            id: id.map(serde_json::Value::from),
            status: status.to_string(),
            prompt: prompt.to_string(),
        }
    }

    fn options(endpoint: String) -> PollerOptions {
        PollerOptions {
            endpoint,
            interval: Duration::from_millis(10),
            retries: 0,
            once: true,
            queue_capacity: 8,
            environment: "http://web:8000".to_string(),
        }
    }

    #[test]
    fn test_take_new_deduplicates() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::open(&dir.path().join("runner.log")).unwrap();
        let mut poller = TaskPoller::new(
            options("http://unused".to_string()),
            Arc::new(FakeRunner::default()),
            log,
        )
        .unwrap();

        let first = poller.take_new(vec![
            task(Some(1), "pending", "login"),
            task(Some(2), "completed", "logout"),
            task(None, "pending", "explore all links"),
            task(None, "pending", "  "),
        ]);
        assert_eq!(first.len(), 2);

        let second = poller.take_new(vec![
            task(Some(1), "pending", "login"),
            task(None, "pending", "explore all links"),
            task(Some(3), "PENDING", "login"),
        ]);
        assert_eq!(second, vec![task(Some(3), "PENDING", "login")]);
    }

    #[tokio::test]
    async fn test_single_poll_runs_pending_tasks_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/core/api/playwright-debug/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "logs": [
                    { "id": 10, "status": "pending", "prompt": "create equipment" },
                    { "id": 11, "status": "done", "prompt": "login" },
                    { "id": 12, "status": "pending", "prompt": "broken task" }
                ]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::open(&dir.path().join("runner.log")).unwrap();
        let runner = Arc::new(FakeRunner {
            crashing: vec!["broken task"],
            ..Default::default()
        });
        let tracker = Arc::new(RecordingTracker::default());
        let mut opts = options(format!("{}/core/api/playwright-debug/", server.uri()));
        opts.retries = 1;

        TaskPoller::new(opts, runner.clone(), log)
            .unwrap()
            .with_tracker(tracker.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(
            *runner.prompts.lock().unwrap(),
            vec!["create equipment", "broken task", "broken task"]
        );
        let issues = tracker.issues.lock().unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].title, "🚨 Test Failure: Task Execution: broken task");

        let content = std::fs::read_to_string(dir.path().join("runner.log")).unwrap();
        assert!(content.contains("Queued task: create equipment"));
        assert!(content.contains("Task failed: broken task (exit code 2: browser crashed)"));
    }

    #[test]
    fn test_take_new_forgets_finished_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::open(&dir.path().join("runner.log")).unwrap();
        let mut poller = TaskPoller::new(
            options("http://unused".to_string()),
            Arc::new(FakeRunner::default()),
            log,
        )
        .unwrap();

        assert_eq!(poller.take_new(vec![task(Some(1), "pending", "login")]).len(), 1);
        assert!(poller.take_new(vec![task(Some(1), "pending", "login")]).is_empty());
        assert_eq!(poller.seen_count(), 1);

        poller.take_new(vec![task(Some(1), "completed", "login")]);
        assert_eq!(poller.seen_count(), 0);
    }

    fn worker(runner: Arc<FakeRunner>, tracker: Arc<RecordingTracker>, log: RunLog) -> Worker {
        Worker {
            runner,
            tracker: Some(tracker as Arc<dyn IssueTracker>),
            log: Arc::new(log),
            stop: Arc::new(AtomicBool::new(false)),
            retries: 2,
            environment: "http://web:8000".to_string(),
        }
    }

    #[tokio::test]
    async fn test_failing_tests_file_one_issue() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::open(&dir.path().join("runner.log")).unwrap();
        let tracker = Arc::new(RecordingTracker::default());
        let runner = Arc::new(FakeRunner {
            failing: vec!["create equipment"],
            tracker: Some(tracker.clone()),
            ..Default::default()
        });

        let ok = worker(runner.clone(), tracker.clone(), log)
            .execute(&task(Some(1), "pending", "create equipment"))
            .await;

        assert!(!ok);
        assert_eq!(runner.prompts.lock().unwrap().len(), 1);
        let titles: Vec<String> = tracker
            .issues
            .lock()
            .unwrap()
            .iter()
            .map(|i| i.title.clone())
            .collect();
        assert_eq!(titles, vec!["🚨 Test Failure: Create Equipment Test"]);
    }

    #[tokio::test]
    async fn test_execution_error_is_retried_then_reported_once() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::open(&dir.path().join("runner.log")).unwrap();
        let tracker = Arc::new(RecordingTracker::default());
        let runner = Arc::new(FakeRunner {
            crashing: vec!["login"],
            ..Default::default()
        });

        let ok = worker(runner.clone(), tracker.clone(), log)
            .execute(&task(Some(1), "pending", "login"))
            .await;

        assert!(!ok);
        assert_eq!(runner.prompts.lock().unwrap().len(), 3);
        let issues = tracker.issues.lock().unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].title, "🚨 Test Failure: Task Execution: login");
    }

    #[tokio::test]
    async fn test_stop_drops_queued_tasks() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "logs": [
                    { "id": 1, "status": "pending", "prompt": "a" },
                    { "id": 2, "status": "pending", "prompt": "b" },
                    { "id": 3, "status": "pending", "prompt": "c" }
                ]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::open(&dir.path().join("runner.log")).unwrap();
        let tracker = Arc::new(RecordingTracker::default());
        let runner = Arc::new(FakeRunner {
            interrupt_on: Some("a"),
            ..Default::default()
        });
        let mut opts = options(server.uri());
        opts.retries = 2;

        let poller = TaskPoller::new(opts, runner.clone(), log)
            .unwrap()
            .with_tracker(tracker.clone());
        *runner.stop.lock().unwrap() = Some(poller.stop_handle());
        poller.run().await.unwrap();

        assert_eq!(*runner.prompts.lock().unwrap(), vec!["a"]);
        assert!(tracker.issues.lock().unwrap().is_empty());
        let content = std::fs::read_to_string(dir.path().join("runner.log")).unwrap();
        assert!(content.contains("Task interrupted: a"));
        assert!(content.contains("Poller stopped"));
    }

    #[tokio::test]
    async fn test_poll_error_is_logged_not_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::open(&dir.path().join("runner.log")).unwrap();
        let runner = Arc::new(FakeRunner::default());

        TaskPoller::new(options(server.uri()), runner.clone(), log)
            .unwrap()
            .run()
            .await
            .unwrap();

        assert!(runner.prompts.lock().unwrap().is_empty());
        let content = std::fs::read_to_string(dir.path().join("runner.log")).unwrap();
        assert!(content.contains("Error polling for tasks: Task endpoint returned 503"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_subprocess_runner_passes_prompt() {
        let ok = SubprocessRunner::new(
            "sh",
            vec![
                "-c".to_string(),
                r#"test "$TEST_REQUEST" = "$1" && echo ran "$1""#.to_string(),
                "sh".to_string(),
            ],
        );
        let outcome = ok.run("list equipment").await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.output, "ran list equipment");

        let failing = SubprocessRunner::new(
            "sh",
            vec!["-c".to_string(), "echo boom >&2; exit 3".to_string(), "sh".to_string()],
        );
        let outcome = failing.run("anything").await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(outcome.output, "boom");
    }
}
