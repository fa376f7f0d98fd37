use std::path::PathBuf;

use crate::driver::web::BrowserType;

const DEFAULT_GITHUB_API: &str = "https://api.github.com";

/// Login credentials for the system under test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

/// Issue tracker settings. Only present when token, owner and repo are all set.
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub api_url: String,
    pub token: String,
    pub owner: String,
    pub repo: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub milestone: Option<u64>,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the system under test
    pub base_url: String,

    /// Root directory for screenshots, HTML dumps, reports and the run log
    pub output_dir: PathBuf,

    /// Run the browser without a window
    pub headless: bool,

    pub browser: BrowserType,

    /// Timeout for clicks, fills and selector waits (ms)
    pub action_timeout_ms: u64,

    /// Timeout for navigations (ms)
    pub navigation_timeout_ms: u64,

    /// Upper bound for a whole `run` (ms)
    pub test_timeout_ms: u64,

    /// Fixed delay between task polls (ms)
    pub poll_interval_ms: u64,

    /// Extra attempts for a failed task subprocess
    pub retries: u32,

    /// Default (admin) account used when a request names no role
    pub credentials: Credentials,

    pub github: Option<GitHubConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4405".to_string(),
            output_dir: PathBuf::from("./output"),
            headless: false,
            browser: BrowserType::Chromium,
            action_timeout_ms: 30_000,
            navigation_timeout_ms: 60_000,
            test_timeout_ms: 180_000,
            poll_interval_ms: 10_000,
            retries: 0,
            credentials: Credentials::new("admin", "temppass123"),
            github: None,
        }
    }
}

impl Config {
    /// Build configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (used by tests)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("BASE_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(dir) = get("SMART_TESTER_OUTPUT") {
            config.output_dir = PathBuf::from(dir);
        }

        let ci = get("CI").is_some();
        config.headless = ci
            || get("HEADLESS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false);
        if ci {
            config.retries = 2;
        }

        if let Some(browser) = get("BROWSER") {
            config.browser = BrowserType::parse(&browser);
        }
        if let Some(ms) = get("TEST_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            config.test_timeout_ms = ms;
        }
        if let Some(ms) = get("POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            config.poll_interval_ms = ms;
        }

        if let (Some(user), Some(pass)) = (get("ADMIN_USERNAME"), get("ADMIN_PASSWORD")) {
            config.credentials = Credentials::new(&user, &pass);
        }

        if let (Some(token), Some(owner), Some(repo)) =
            (get("GITHUB_TOKEN"), get("GITHUB_OWNER"), get("GITHUB_REPO"))
        {
            config.github = Some(GitHubConfig {
                api_url: get("GITHUB_API_URL")
                    .unwrap_or_else(|| DEFAULT_GITHUB_API.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                token,
                owner,
                repo,
                labels: get("GITHUB_ISSUE_LABELS")
                    .map(|v| split_list(&v))
                    .unwrap_or_else(|| vec!["bug".to_string(), "automated-test".to_string()]),
                assignees: get("GITHUB_ISSUE_ASSIGNEES")
                    .map(|v| split_list(&v))
                    .unwrap_or_default(),
                milestone: get("GITHUB_ISSUE_MILESTONE").and_then(|v| v.parse().ok()),
            });
        }

        config
    }

    /// Endpoint listing natural-language test tasks
    pub fn task_endpoint(&self) -> String {
        format!("{}/core/api/playwright-debug/", self.base_url.trim_end_matches('/'))
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
