//! Page driver implementation using Playwright
//!
//! Launches one browser, one context and one page; every test action of a
//! run goes through that single page.

use anyhow::{Context, Result};
use async_trait::async_trait;
use colored::Colorize;
use playwright::api::{Browser, BrowserContext, DocumentLoadState, ElementHandle, Page, Viewport};
use playwright::Playwright;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::driver::common::resolve_url;
use crate::driver::traits::{PageDriver, PageError};
use crate::utils::config::Config;

/// Web browser type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BrowserType {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserType {
    /// Parse a browser name, falling back to Chromium
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "firefox" => BrowserType::Firefox,
            "webkit" | "safari" => BrowserType::Webkit,
            _ => BrowserType::Chromium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserType::Chromium => "chromium",
            BrowserType::Firefox => "firefox",
            BrowserType::Webkit => "webkit",
        }
    }
}

/// Web Driver configuration
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    pub browser_type: BrowserType,
    pub headless: bool,
    pub base_url: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub action_timeout_ms: u64,
    pub navigation_timeout_ms: u64,
}

impl WebDriverConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            browser_type: config.browser,
            headless: config.headless,
            base_url: config.base_url.clone(),
            viewport_width: 1280,
            viewport_height: 720,
            action_timeout_ms: config.action_timeout_ms,
            navigation_timeout_ms: config.navigation_timeout_ms,
        }
    }
}

/// Web Driver using Playwright
pub struct WebDriver {
    #[allow(dead_code)]
    playwright: Arc<Playwright>,
    #[allow(dead_code)]
    browser: Arc<Browser>,
    #[allow(dead_code)]
    context: Arc<BrowserContext>,
    page: Arc<Mutex<Page>>,
    config: WebDriverConfig,
}

impl WebDriver {
    /// Launch a browser and open a fresh page
    pub async fn new(config: WebDriverConfig) -> Result<Self> {
        let playwright = Playwright::initialize()
            .await
            .context("Failed to initialize Playwright")?;

        let browser = match config.browser_type {
            BrowserType::Chromium => launch_chromium_browser(&playwright.chromium(), &config).await?,
            BrowserType::Firefox => {
                playwright
                    .firefox()
                    .launcher()
                    .headless(config.headless)
                    .launch()
                    .await?
            }
            BrowserType::Webkit => {
                playwright
                    .webkit()
                    .launcher()
                    .headless(config.headless)
                    .launch()
                    .await?
            }
        };

        let context = browser.context_builder().build().await?;
        let page = context.new_page().await?;

        page.set_viewport_size(Viewport {
            width: config.viewport_width as i32,
            height: config.viewport_height as i32,
        })
        .await?;

        log::info!(
            "Launched {} (headless: {}) against {}",
            config.browser_type.as_str(),
            config.headless,
            config.base_url
        );

        Ok(Self {
            playwright: Arc::new(playwright),
            browser: Arc::new(browser),
            context: Arc::new(context),
            page: Arc::new(Mutex::new(page)),
            config,
        })
    }

    fn action_timeout(&self) -> f64 {
        self.config.action_timeout_ms as f64
    }

    async fn nth_handle(&self, selector: &str, index: usize) -> Result<Option<ElementHandle>> {
        let page = self.page.lock().await;
        let mut handles = page
            .query_selector_all(selector)
            .await
            .map_err(|e| PageError::classify(e.into()))?;
        if index < handles.len() {
            Ok(Some(handles.swap_remove(index)))
        } else {
            Ok(None)
        }
    }
}

#[async_trait]
impl PageDriver for WebDriver {
    fn browser_name(&self) -> &str {
        self.config.browser_type.as_str()
    }

    async fn goto(&self, url: &str) -> Result<()> {
        let full_url = resolve_url(&self.config.base_url, url);
        let page = self.page.lock().await;
        page.goto_builder(&full_url)
            .timeout(self.config.navigation_timeout_ms as f64)
            .wait_until(DocumentLoadState::NetworkIdle)
            .goto()
            .await
            .map_err(|e| {
                let err = PageError::classify(e.into());
                if PageError::is_context_lost(&err) {
                    err
                } else {
                    PageError::Navigation {
                        url: full_url.clone(),
                        message: format!("{:#}", err),
                    }
                    .into()
                }
            })?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let page = self.page.lock().await;
        let url: String = page
            .evaluate::<(), String>("() => window.location.href", ())
            .await
            .map_err(|e| PageError::classify(e.into()))?;
        Ok(url)
    }

    async fn reload(&self) -> Result<()> {
        let page = self.page.lock().await;
        page.reload_builder()
            .timeout(self.config.navigation_timeout_ms as f64)
            .wait_until(DocumentLoadState::NetworkIdle)
            .reload()
            .await
            .context("Failed to reload page")?;
        Ok(())
    }

    async fn go_back(&self) -> Result<()> {
        let page = self.page.lock().await;
        page.evaluate::<(), ()>("window.history.back()", ())
            .await
            .map_err(|e| PageError::classify(e.into()))?;
        drop(page);
        self.pause(1000).await;
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let page = self.page.lock().await;
        page.fill_builder(selector, value)
            .timeout(self.action_timeout())
            .fill()
            .await
            .map_err(|e| PageError::classify(e.into()))
            .with_context(|| format!("Failed to fill {}", selector))?;
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<()> {
        let page = self.page.lock().await;
        let js = "(el, v) => { el.value = v; el.dispatchEvent(new Event('change', { bubbles: true })); }";
        page.evaluate_on_selector::<String, ()>(selector, js, Some(value.to_string()))
            .await
            .map_err(|e| PageError::classify(e.into()))
            .with_context(|| format!("Failed to select '{}' in {}", value, selector))?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let page = self.page.lock().await;
        match page
            .click_builder(selector)
            .timeout(self.action_timeout())
            .click()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                log::debug!("Click failed for selector '{}': {:?}", selector, e);
                Err(PageError::classify(e.into()))
                    .with_context(|| format!("Failed to click {}", selector))
            }
        }
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let page = self.page.lock().await;
        let handles = page
            .query_selector_all(selector)
            .await
            .map_err(|e| PageError::classify(e.into()))?;
        Ok(handles.len())
    }

    async fn is_visible_nth(&self, selector: &str, index: usize) -> Result<bool> {
        match self.nth_handle(selector, index).await? {
            Some(el) => Ok(el.is_visible().await.map_err(|e| PageError::classify(e.into()))?),
            None => Ok(false),
        }
    }

    async fn click_nth(&self, selector: &str, index: usize) -> Result<()> {
        let el = self
            .nth_handle(selector, index)
            .await?
            .ok_or_else(|| PageError::ElementNotFound {
                selector: format!("{} [{}]", selector, index),
            })?;
        el.click_builder()
            .timeout(self.action_timeout())
            .click()
            .await
            .map_err(|e| PageError::classify(e.into()))?;
        Ok(())
    }

    async fn text_nth(&self, selector: &str, index: usize) -> Result<Option<String>> {
        match self.nth_handle(selector, index).await? {
            Some(el) => Ok(el
                .text_content()
                .await
                .map_err(|e| PageError::classify(e.into()))?),
            None => Ok(None),
        }
    }

    async fn attribute_all(&self, selector: &str, name: &str) -> Result<Vec<String>> {
        let handles = {
            let page = self.page.lock().await;
            page.query_selector_all(selector)
                .await
                .map_err(|e| PageError::classify(e.into()))?
        };
        let mut values = Vec::with_capacity(handles.len());
        for el in handles {
            // Individual handles can detach mid-scan; skip them
            if let Ok(Some(value)) = el.get_attribute(name).await {
                values.push(value);
            }
        }
        Ok(values)
    }

    async fn wait_for_visible(&self, selector: &str, timeout_ms: u64) -> Result<bool> {
        let page = self.page.lock().await;
        let result = page
            .wait_for_selector_builder(selector)
            .timeout(timeout_ms as f64)
            .wait_for_selector()
            .await;
        Ok(result.is_ok())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let page = self.page.lock().await;
        page.screenshot_builder()
            .path(PathBuf::from(path))
            .full_page(true)
            .screenshot()
            .await
            .map_err(|e| PageError::classify(e.into()))
            .with_context(|| format!("Failed to save screenshot {}", path.display()))?;
        Ok(())
    }

    async fn content(&self) -> Result<String> {
        let page = self.page.lock().await;
        let html = page
            .content()
            .await
            .map_err(|e| PageError::classify(e.into()))?;
        Ok(html)
    }
}

/// Launch a new Chromium browser, preferring an installed system browser
async fn launch_chromium_browser(
    chromium: &playwright::api::BrowserType,
    config: &WebDriverConfig,
) -> Result<Browser> {
    let mut launcher = chromium.launcher();
    launcher = launcher.headless(config.headless);

    let env_path = std::env::var("PLAYWRIGHT_CHROMIUM_EXECUTABLE_PATH")
        .ok()
        .map(PathBuf::from);

    let system_browser;
    if let Some(ref path) = env_path {
        println!("{} Using browser from env: {}", "🌐".blue(), path.display());
        launcher = launcher.executable(path);
    } else if let Some(path) = {
        system_browser = find_system_browser();
        system_browser.as_ref()
    } {
        println!(
            "{} Using discovered browser: {}",
            "🌐".blue(),
            path.display()
        );
        launcher = launcher.executable(path);
    } else {
        println!(
            "{} No browser executable found. Attempting default launch...",
            "ℹ".blue()
        );
    }

    let args: Vec<String> = [
        "--no-sandbox",
        "--disable-setuid-sandbox",
        "--disable-dev-shm-usage",
        "--disable-gpu",
        "--ignore-certificate-errors",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    launcher = launcher.args(&args);

    Ok(launcher.launch().await?)
}

fn find_system_browser() -> Option<PathBuf> {
    let common_paths = [
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
    ];

    common_paths
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .map(Path::to_path_buf)
}
