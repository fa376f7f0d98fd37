//! In-memory page used by unit tests
//!
//! Documents are keyed by path; elements are keyed by the exact selector
//! string the runner queries. Clicking an element with a navigation target
//! moves the page, which is enough to script login forms, list pages and
//! crawls without a browser.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use super::common::resolve_url;
use super::traits::{PageDriver, PageError};

#[derive(Debug, Clone, Default)]
pub struct MockElement {
    pub visible: bool,
    pub text: Option<String>,
    pub attrs: HashMap<String, String>,
    pub navigates_to: Option<String>,
}

impl MockElement {
    pub fn visible() -> Self {
        Self {
            visible: true,
            ..Default::default()
        }
    }

    pub fn hidden() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn navigates(mut self, path: &str) -> Self {
        self.navigates_to = Some(path.to_string());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockDocument {
    pub elements: HashMap<String, Vec<MockElement>>,
    pub redirect_to: Option<String>,
}

impl MockDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element(mut self, selector: &str, element: MockElement) -> Self {
        self.elements
            .entry(selector.to_string())
            .or_default()
            .push(element);
        self
    }

    pub fn redirect(mut self, path: &str) -> Self {
        self.redirect_to = Some(path.to_string());
        self
    }
}

#[derive(Default)]
struct State {
    documents: HashMap<String, MockDocument>,
    current: String,
    history: Vec<String>,
    calls: Vec<String>,
    filled: HashMap<String, String>,
    failing_gotos: HashMap<String, String>,
    fail_reload: bool,
}

pub struct ScriptedPage {
    base_url: String,
    state: Mutex<State>,
}

impl ScriptedPage {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            state: Mutex::new(State {
                current: "about:blank".to_string(),
                ..Default::default()
            }),
        }
    }

    pub fn with_document(self, path: &str, document: MockDocument) -> Self {
        self.state
            .lock()
            .unwrap()
            .documents
            .insert(path.to_string(), document);
        self
    }

    /// Make navigation to `path` fail with `message`
    pub fn fail_goto(self, path: &str, message: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_gotos
            .insert(path.to_string(), message.to_string());
        self
    }

    pub fn fail_reload(self) -> Self {
        self.state.lock().unwrap().fail_reload = true;
        self
    }

    /// Every call made against the page, in order
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn filled(&self, selector: &str) -> Option<String> {
        self.state.lock().unwrap().filled.get(selector).cloned()
    }

    fn path_of(&self, url: &str) -> String {
        let full = resolve_url(&self.base_url, url);
        match full.strip_prefix(&self.base_url) {
            Some(path) if path.is_empty() => "/".to_string(),
            Some(path) => path.to_string(),
            None => full,
        }
    }

    fn navigate(&self, state: &mut State, path: &str) {
        let mut target = path.to_string();
        // Follow at most a few redirects
        for _ in 0..5 {
            match state
                .documents
                .get(&target)
                .and_then(|d| d.redirect_to.clone())
            {
                Some(next) if next != target => target = next,
                _ => break,
            }
        }
        state.current = resolve_url(&self.base_url, &target);
        state.history.push(target);
    }

    fn current_path(&self, state: &State) -> String {
        self.path_of(&state.current)
    }

    fn element(&self, state: &State, selector: &str, index: usize) -> Option<MockElement> {
        state
            .documents
            .get(&self.current_path(state))
            .and_then(|d| d.elements.get(selector))
            .and_then(|els| els.get(index))
            .cloned()
    }

    fn matches(&self, state: &State, selector: &str) -> Vec<MockElement> {
        state
            .documents
            .get(&self.current_path(state))
            .and_then(|d| d.elements.get(selector))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl PageDriver for ScriptedPage {
    fn browser_name(&self) -> &str {
        "scripted"
    }

    async fn goto(&self, url: &str) -> Result<()> {
        let path = self.path_of(url);
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("goto {}", path));
        if let Some(message) = state.failing_gotos.get(&path).cloned() {
            return Err(anyhow!(message));
        }
        self.navigate(&mut state, &path);
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().current.clone())
    }

    async fn reload(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("reload".to_string());
        if state.fail_reload {
            return Err(anyhow!("Target page, context or browser has been closed"));
        }
        Ok(())
    }

    async fn go_back(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("back".to_string());
        state.history.pop();
        if let Some(previous) = state.history.last().cloned() {
            state.current = resolve_url(&self.base_url, &previous);
        }
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("fill {}", selector));
        if self.element(&state, selector, 0).is_none() {
            return Err(PageError::ElementNotFound {
                selector: selector.to_string(),
            }
            .into());
        }
        state.filled.insert(selector.to_string(), value.to_string());
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<()> {
        self.fill(selector, value).await
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.click_nth(selector, 0).await
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let state = self.state.lock().unwrap();
        Ok(self.matches(&state, selector).len())
    }

    async fn is_visible_nth(&self, selector: &str, index: usize) -> Result<bool> {
        let state = self.state.lock().unwrap();
        Ok(self
            .element(&state, selector, index)
            .map(|e| e.visible)
            .unwrap_or(false))
    }

    async fn click_nth(&self, selector: &str, index: usize) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("click {}", selector));
        let element = self
            .element(&state, selector, index)
            .filter(|e| e.visible)
            .ok_or_else(|| PageError::ElementNotFound {
                selector: selector.to_string(),
            })?;
        if let Some(path) = element.navigates_to {
            if let Some(message) = state.failing_gotos.get(&path).cloned() {
                return Err(anyhow!(message));
            }
            self.navigate(&mut state, &path);
        }
        Ok(())
    }

    async fn text_nth(&self, selector: &str, index: usize) -> Result<Option<String>> {
        let state = self.state.lock().unwrap();
        Ok(self.element(&state, selector, index).and_then(|e| e.text))
    }

    async fn attribute_all(&self, selector: &str, name: &str) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        Ok(self
            .matches(&state, selector)
            .into_iter()
            .filter_map(|e| e.attrs.get(name).cloned())
            .collect())
    }

    async fn wait_for_visible(&self, selector: &str, _timeout_ms: u64) -> Result<bool> {
        self.is_visible_nth(selector, 0).await
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, b"\x89PNG")?;
        self.state
            .lock()
            .unwrap()
            .calls
            .push("screenshot".to_string());
        Ok(())
    }

    async fn content(&self) -> Result<String> {
        let state = self.state.lock().unwrap();
        Ok(format!("<html><body>{}</body></html>", self.current_path(&state)))
    }

    async fn pause(&self, _ms: u64) {}
}
