//! Canned test procedures, one per [`Action`]
//!
//! Every procedure records onto a fresh `TestResult`; a result passes iff it
//! recorded no errors. Missing elements that make the procedure meaningless
//! (no Add button) are errors, missing optional elements (nothing to delete)
//! are warnings.

use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use serde_json::json;
use std::time::Instant;

use super::context::{ArtifactStore, RunMode};
use super::explore::{crawl_links, explore_elements, ERROR_MARKERS};
use super::session::{is_login_url, AuthSession};
use crate::driver::traits::PageDriver;
use crate::parser::types::{Action, Role, UserContext};
use crate::report::types::TestResult;

/// Pages that must redirect anonymous users to the login form
pub const PROTECTED_PAGES: &[&str] = &[
    "/dashboard/",
    "/equipment/",
    "/maintenance/",
    "/events/",
    "/customers/",
    "/locations/",
    "/profile/",
    "/settings/",
    "/reports/",
    "/system-health/",
];

/// Short list used by the dedicated access checks
const CORE_PAGES: &[&str] = &["/dashboard/", "/equipment/", "/maintenance/", "/events/"];

/// Pages whose interactive elements are clicked through
const ELEMENT_PAGES: &[&str] = &["/dashboard/", "/equipment/", "/maintenance/"];

const EQUIPMENT_PATH: &str = "/equipment/";
const EQUIPMENT_ADD_PATH: &str = "/equipment/add/";
const MAINTENANCE_PATH: &str = "/maintenance/";
const SETTINGS_PATH: &str = "/core/settings/";
const MISSING_PAGE_PATH: &str = "/nonexistent-page/";

pub const SUBMIT_SELECTOR: &str = r#"input[type="submit"], button[type="submit"]"#;

const ADD_EQUIPMENT_SELECTORS: &[&str] = &[
    r#"a[href*="add"]"#,
    r#"a:has-text("Add Equipment")"#,
    r#"button:has-text("Add Equipment")"#,
    ".btn-add",
    ".add-equipment",
];

const ADD_MAINTENANCE_SELECTORS: &[&str] = &[
    r#"a[href*="add"]"#,
    r#"a:has-text("Add Maintenance")"#,
    r#"button:has-text("Add Maintenance")"#,
];

const EDIT_SELECTORS: &[&str] = &[
    r#"a[href*="edit"]"#,
    r#"a:has-text("Edit")"#,
    r#"button:has-text("Edit")"#,
];

const DELETE_SELECTORS: &[&str] = &[
    r#"a[href*="delete"]"#,
    r#"button:has-text("Delete")"#,
    ".btn-delete",
    ".delete-equipment",
];

const CONFIRM_SELECTORS: &[&str] = &[
    r#"button:has-text("Confirm")"#,
    r#"button:has-text("Delete")"#,
    r#"input[type="submit"]"#,
    ".btn-confirm",
];

const SUCCESS_INDICATORS: &[&str] = &[
    ".alert-success",
    ".success",
    "text=Equipment created successfully",
    "text=Equipment added successfully",
];

const VALIDATION_MARKERS: &[&str] = &[".errorlist", ".invalid-feedback", ".is-invalid", ":invalid"];

const NOT_FOUND_MARKERS: &[&str] = &["text=404", "text=Page not found", "text=Not Found"];

const LIST_ROW_SELECTOR: &str = "table tbody tr, .list-group-item, .card";

const CLEAR_DB_BUTTON: &str = r#"button:has-text("Clear Database")"#;

/// First selector among `candidates` with a visible match
async fn first_visible_of<'s>(
    page: &dyn PageDriver,
    candidates: &[&'s str],
) -> Result<Option<&'s str>> {
    for selector in candidates {
        if page.first_visible(selector).await?.is_some() {
            return Ok(Some(*selector));
        }
    }
    Ok(None)
}

/// Runs actions against one page for one user
pub struct ActionRunner<'a> {
    page: &'a dyn PageDriver,
    artifacts: &'a ArtifactStore,
    base_url: String,
    mode: RunMode,
    user: UserContext,
    session: AuthSession,
    action_timeout_ms: u64,
    /// Name of the last equipment created in this run
    last_created: Option<String>,
}

impl<'a> ActionRunner<'a> {
    pub fn new(
        page: &'a dyn PageDriver,
        artifacts: &'a ArtifactStore,
        base_url: &str,
        mode: RunMode,
        user: UserContext,
    ) -> Self {
        Self {
            page,
            artifacts,
            base_url: base_url.trim_end_matches('/').to_string(),
            mode,
            user,
            session: AuthSession::new(),
            action_timeout_ms: 30_000,
            last_created: None,
        }
    }

    pub fn with_action_timeout(mut self, ms: u64) -> Self {
        self.action_timeout_ms = ms;
        self
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    /// Run one action. `comprehensive_test` expands into its sub-tests and
    /// yields one result per sub-test plus a summary result.
    pub async fn run(&mut self, action: Action) -> Vec<TestResult> {
        if action != Action::ComprehensiveTest {
            return vec![self.run_single(action).await];
        }

        let started = Instant::now();
        let mut results = Vec::new();
        for sub in [
            Action::TestLogin,
            Action::TestPermissions,
            Action::CreateEquipment,
            Action::DeleteEquipment,
            Action::ExploreAllLinks,
            Action::TestLogout,
        ] {
            println!("  {} {}", "↳".cyan(), sub.test_name());
            results.push(self.run_single(sub).await);
        }

        let failed: Vec<&str> = results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.test_name.as_str())
            .collect();
        let mut summary = TestResult::new(Action::ComprehensiveTest.test_name());
        if !failed.is_empty() {
            summary.warn(format!(
                "{} of {} sub-tests failed: {}",
                failed.len(),
                results.len(),
                failed.join(", ")
            ));
        }
        summary.data = Some(json!({
            "subTests": results.iter().map(|r| r.test_name.clone()).collect::<Vec<_>>(),
            "failedSubTests": failed.len(),
        }));
        summary.duration_ms = Some(started.elapsed().as_millis() as u64);
        results.push(summary.finish());
        results
    }

    /// Run one non-composite action into its own result
    pub async fn run_single(&mut self, action: Action) -> TestResult {
        let started = Instant::now();
        let name = match action {
            Action::ClearDatabase => format!("{} as {}", action.test_name(), self.user.role.as_str()),
            _ => action.test_name().to_string(),
        };
        let mut result = TestResult::new(name);
        log::info!("Running action {}", action);

        let outcome = match action {
            Action::CreateEquipment => self.create_equipment(&mut result).await,
            Action::ListEquipment => self.list_page(EQUIPMENT_PATH, "list_equipment", &mut result).await,
            Action::EditEquipment => self.edit_equipment(&mut result).await,
            Action::DeleteEquipment => self.delete_equipment(&mut result).await,
            Action::CreateMaintenance => self.create_maintenance(&mut result).await,
            Action::ListMaintenance => {
                self.list_page(MAINTENANCE_PATH, "list_maintenance", &mut result).await
            }
            Action::EditMaintenance => self.edit_maintenance(&mut result).await,
            Action::TestLogin => self.test_login(&mut result).await,
            Action::TestLogout => self.test_logout(&mut result).await,
            Action::TestSession => self.test_session(&mut result).await,
            Action::TestPermissions => self.test_permissions(&mut result).await,
            Action::TestUnauthorizedAccess => self.check_anonymous_access(CORE_PAGES, &mut result).await,
            Action::TestAuthorizedAccess => self.test_authorized_access(&mut result).await,
            Action::ExploreAllLinks => self.explore_all_links(&mut result).await,
            Action::ExplorePageElements => self.explore_page_elements(&mut result).await,
            Action::TestNavigation => self.test_navigation(&mut result).await,
            Action::TestFormValidation => self.test_form_validation(&mut result).await,
            Action::TestErrorHandling => self.test_error_handling(&mut result).await,
            Action::TestDataSave => self.test_data_save(&mut result).await,
            Action::TestDataRetrieval => self.test_data_retrieval(&mut result).await,
            Action::ClearDatabase => self.clear_database(&mut result).await,
            Action::ComprehensiveTest => Ok(()),
        };

        if let Err(e) = outcome {
            result.error(format!("{} failed: {:#}", action.test_name(), e));
            self.artifacts
                .screenshot(self.page, &format!("{}_error", action.id()), &mut result)
                .await;
        }
        result.duration_ms = Some(started.elapsed().as_millis() as u64);
        result.finish()
    }

    /// Log in as the run's user unless already done. Failure is recorded as
    /// an error and reported as `false`.
    async fn authenticate(&mut self, result: &mut TestResult) -> bool {
        match self.session.ensure(self.page, &self.user).await {
            Ok(()) => true,
            Err(e) => {
                result.error(format!("Failed to authenticate as {}: {}", self.user.username, e));
                self.artifacts.screenshot(self.page, "login_failed", result).await;
                false
            }
        }
    }

    async fn shot(&self, name: &str, result: &mut TestResult) {
        self.artifacts.screenshot(self.page, name, result).await;
    }

    async fn capture(&self, name: &str, result: &mut TestResult) {
        self.artifacts.capture(self.page, name, result).await;
    }

    async fn on_login_page(&self) -> Result<bool> {
        Ok(is_login_url(&self.page.current_url().await?))
    }

    async fn test_login(&mut self, result: &mut TestResult) -> Result<()> {
        self.shot("login_test_initial", result).await;
        if let Err(e) = self.session.login(self.page, &self.user).await {
            result.error(format!("Failed to authenticate as {}: {}", self.user.username, e));
        }
        self.capture("login_test", result).await;
        Ok(())
    }

    async fn test_logout(&mut self, result: &mut TestResult) -> Result<()> {
        self.shot("logout_test_initial", result).await;
        if let Err(e) = self.session.logout(self.page).await {
            result.error(format!("Failed to logout: {:#}", e));
            return Ok(());
        }

        self.page.goto("/dashboard/").await?;
        if !self.on_login_page().await? {
            result.warn("Dashboard still reachable after logout");
        }
        self.capture("logout_test", result).await;
        Ok(())
    }

    async fn test_session(&mut self, result: &mut TestResult) -> Result<()> {
        if !self.authenticate(result).await {
            return Ok(());
        }
        for path in ["/dashboard/", EQUIPMENT_PATH, MAINTENANCE_PATH] {
            self.page.goto(path).await?;
            if self.on_login_page().await? {
                result.error(format!("Session lost when opening {}", path));
                self.session.invalidate();
                break;
            }
        }
        if result.errors.is_empty() {
            self.page.reload().await?;
            if self.on_login_page().await? {
                result.error("Session lost after page reload");
                self.session.invalidate();
            }
        }
        self.capture("session_test", result).await;
        Ok(())
    }

    /// Visit `pages` logged out; pages that do not bounce to the login form
    /// are warnings
    async fn check_anonymous_access(&mut self, pages: &[&str], result: &mut TestResult) -> Result<()> {
        self.session.logout(self.page).await?;
        for path in pages {
            match self.page.goto(path).await {
                Ok(()) => {
                    if !self.on_login_page().await? {
                        result.warn(format!(
                            "Unauthenticated access to {} was not redirected to login",
                            path
                        ));
                    }
                    self.shot(&format!("unauthorized_{}", path), result).await;
                }
                Err(e) => result.warn(format!("Error testing {}: {:#}", path, e)),
            }
        }
        Ok(())
    }

    /// Visit `pages` logged in; pages that bounce to the login form are errors
    async fn check_authenticated_access(
        &mut self,
        pages: &[&str],
        result: &mut TestResult,
    ) -> Result<()> {
        if !self.authenticate(result).await {
            return Ok(());
        }
        for path in pages {
            match self.page.goto(path).await {
                Ok(()) => {
                    if self.on_login_page().await? {
                        result.error(format!(
                            "Authenticated access to {} was incorrectly redirected to login",
                            path
                        ));
                        self.session.invalidate();
                    }
                    self.shot(&format!("authorized_{}", path), result).await;
                }
                Err(e) => result.warn(format!("Error testing {}: {:#}", path, e)),
            }
        }
        Ok(())
    }

    async fn test_permissions(&mut self, result: &mut TestResult) -> Result<()> {
        self.check_anonymous_access(PROTECTED_PAGES, result).await?;
        self.check_authenticated_access(PROTECTED_PAGES, result).await?;
        self.capture("permission_test", result).await;
        Ok(())
    }

    async fn test_authorized_access(&mut self, result: &mut TestResult) -> Result<()> {
        self.check_authenticated_access(CORE_PAGES, result).await?;
        self.capture("test_authorized_access", result).await;
        Ok(())
    }

    /// Fill and submit the equipment form. Returns the new equipment's name
    /// when a success indicator showed up.
    async fn submit_new_equipment(&mut self, result: &mut TestResult) -> Result<Option<String>> {
        self.page.goto(EQUIPMENT_PATH).await?;
        self.shot("create_equipment_initial", result).await;

        if self.page.click_first_visible(ADD_EQUIPMENT_SELECTORS).await?.is_none() {
            result.error("Could not find Add Equipment button");
            return Ok(None);
        }
        self.shot("create_equipment_form", result).await;

        let stamp = Utc::now().timestamp_millis();
        let name = format!("Test Equipment {}", stamp);
        let fields = [
            ("name", name.clone()),
            ("manufacturer_serial", format!("SN{}", stamp)),
            ("asset_tag", format!("AT{}", stamp)),
            ("manufacturer", "Test Manufacturer".to_string()),
            ("model_number", "Test Model".to_string()),
        ];
        for (field, value) in &fields {
            self.page
                .fill(&format!(r#"input[name="{}"]"#, field), value)
                .await?;
        }
        self.page.select_option(r#"select[name="status"]"#, "active").await?;
        if let Err(e) = self.page.select_option(r#"select[name="location"]"#, "1").await {
            result.warn(format!("Could not select location: {:#}", e));
        }
        self.shot("create_equipment_filled", result).await;

        self.page.click(SUBMIT_SELECTOR).await?;
        self.page.pause(1000).await;
        self.capture("create_equipment_submitted", result).await;

        let mut data = serde_json::Map::new();
        for (field, value) in fields {
            data.insert(field.to_string(), json!(value));
        }
        data.insert("status".to_string(), json!("active"));
        result.data = Some(serde_json::Value::Object(data));

        match first_visible_of(self.page, SUCCESS_INDICATORS).await? {
            Some(indicator) => {
                log::info!("Equipment '{}' created ({})", name, indicator);
                self.last_created = Some(name.clone());
                Ok(Some(name))
            }
            None => {
                result.error("Equipment creation may have failed - no success indicator found");
                Ok(None)
            }
        }
    }

    async fn create_equipment(&mut self, result: &mut TestResult) -> Result<()> {
        if !self.authenticate(result).await {
            return Ok(());
        }
        self.submit_new_equipment(result).await?;
        Ok(())
    }

    async fn list_page(&mut self, path: &str, name: &str, result: &mut TestResult) -> Result<()> {
        if !self.authenticate(result).await {
            return Ok(());
        }
        self.page.goto(path).await?;
        if self.on_login_page().await? {
            result.error(format!("{} redirected to login", path));
            return Ok(());
        }
        let rows = self.page.count(LIST_ROW_SELECTOR).await?;
        if let Some(marker) = first_visible_of(self.page, ERROR_MARKERS).await? {
            result.warn(format!("Error marker '{}' visible on {}", marker, path));
        }
        result.data = Some(json!({ "path": path, "rows": rows }));
        self.capture(name, result).await;
        Ok(())
    }

    async fn open_edit_form(
        &mut self,
        list_path: &str,
        name: &str,
        result: &mut TestResult,
    ) -> Result<bool> {
        if !self.authenticate(result).await {
            return Ok(false);
        }
        self.page.goto(list_path).await?;
        if self.page.click_first_visible(EDIT_SELECTORS).await?.is_none() {
            result.warn(format!("No edit buttons found on {}", list_path));
            return Ok(false);
        }
        self.capture(name, result).await;
        Ok(true)
    }

    async fn edit_equipment(&mut self, result: &mut TestResult) -> Result<()> {
        if !self.open_edit_form(EQUIPMENT_PATH, "edit_equipment", result).await? {
            return Ok(());
        }

        let name_field = r#"input[name="name"]"#;
        if !self.page.is_visible(name_field).await? {
            result.warn("Edit form has no name field");
            return Ok(());
        }
        let new_name = format!("Edited Equipment {}", Utc::now().timestamp_millis());
        self.page.fill(name_field, &new_name).await?;
        self.page.click(SUBMIT_SELECTOR).await?;
        self.page.pause(1000).await;
        self.capture("edit_equipment_submitted", result).await;

        if first_visible_of(self.page, SUCCESS_INDICATORS).await?.is_none() {
            result.warn("No success indicator after saving the edit");
        }
        result.data = Some(json!({ "name": new_name }));
        Ok(())
    }

    async fn delete_equipment(&mut self, result: &mut TestResult) -> Result<()> {
        if !self.authenticate(result).await {
            return Ok(());
        }
        self.page.goto(EQUIPMENT_PATH).await?;
        self.shot("delete_equipment_initial", result).await;

        if self.page.click_first_visible(DELETE_SELECTORS).await?.is_none() {
            result.warn(
                "No delete buttons found - equipment may not exist or delete functionality not available",
            );
            return Ok(());
        }
        self.page.pause(500).await;
        self.shot("delete_equipment_confirmation", result).await;

        match self.page.click_first_visible(CONFIRM_SELECTORS).await? {
            Some(_) => self.page.pause(1000).await,
            None => result.warn("No confirmation step shown after delete"),
        }
        self.capture("delete_equipment", result).await;
        Ok(())
    }

    async fn create_maintenance(&mut self, result: &mut TestResult) -> Result<()> {
        if !self.authenticate(result).await {
            return Ok(());
        }
        self.page.goto(MAINTENANCE_PATH).await?;
        self.shot("create_maintenance_initial", result).await;

        if self
            .page
            .click_first_visible(ADD_MAINTENANCE_SELECTORS)
            .await?
            .is_none()
        {
            result.warn("No add maintenance button found");
            return Ok(());
        }
        self.capture("create_maintenance", result).await;
        Ok(())
    }

    async fn edit_maintenance(&mut self, result: &mut TestResult) -> Result<()> {
        self.open_edit_form(MAINTENANCE_PATH, "edit_maintenance", result)
            .await?;
        Ok(())
    }

    async fn explore_all_links(&mut self, result: &mut TestResult) -> Result<()> {
        let visited = crawl_links(
            self.page,
            self.artifacts,
            &self.base_url,
            self.mode.crawl_limit(),
            result,
        )
        .await;
        result.data = Some(json!({ "visitedUrls": visited }));
        self.artifacts
            .html_dump(self.page, "explore_all_links", result)
            .await;
        Ok(())
    }

    async fn explore_page_elements(&mut self, result: &mut TestResult) -> Result<()> {
        if !self.authenticate(result).await {
            return Ok(());
        }
        let mut pages = Vec::new();
        for path in ELEMENT_PAGES {
            if let Err(e) = self.page.goto(path).await {
                result.warn(format!("Could not open {}: {:#}", path, e));
                continue;
            }
            let stats = explore_elements(self.page, self.artifacts, path, result).await;
            pages.push(json!({
                "path": path,
                "elementsFound": stats.found,
                "elementsClicked": stats.clicked,
            }));
        }
        result.data = Some(json!({ "pages": pages }));
        Ok(())
    }

    async fn test_navigation(&mut self, result: &mut TestResult) -> Result<()> {
        if !self.authenticate(result).await {
            return Ok(());
        }
        let mut previous: Option<String> = None;
        for path in CORE_PAGES {
            self.page.goto(path).await?;
            if self.on_login_page().await? {
                result.error(format!("Navigation to {} redirected to login", path));
                continue;
            }
            if let Some(marker) = first_visible_of(self.page, ERROR_MARKERS).await? {
                result.warn(format!("Error marker '{}' visible on {}", marker, path));
            }
            previous = Some(self.page.current_url().await?);
        }

        // History must lead back to the page before the last one
        if CORE_PAGES.len() > 1 && previous.is_some() {
            self.page.go_back().await?;
            let back = self.page.current_url().await?;
            let expected = CORE_PAGES[CORE_PAGES.len() - 2];
            if !back.contains(expected) {
                result.warn(format!(
                    "Back navigation landed on {} instead of {}",
                    back, expected
                ));
            }
        }
        self.capture("navigation_test", result).await;
        Ok(())
    }

    async fn test_form_validation(&mut self, result: &mut TestResult) -> Result<()> {
        if !self.authenticate(result).await {
            return Ok(());
        }
        self.page.goto(EQUIPMENT_ADD_PATH).await?;
        self.shot("form_validation_initial", result).await;

        self.page.click(SUBMIT_SELECTOR).await?;
        self.page.pause(1000).await;
        self.capture("form_validation_errors", result).await;

        let url = self.page.current_url().await?;
        if !url.contains(EQUIPMENT_ADD_PATH) {
            result.error(format!("Empty equipment form was accepted (now at {})", url));
        } else if first_visible_of(self.page, VALIDATION_MARKERS).await?.is_none() {
            result.warn("Empty form was rejected without visible validation messages");
        }
        Ok(())
    }

    async fn test_error_handling(&mut self, result: &mut TestResult) -> Result<()> {
        self.page.goto(MISSING_PAGE_PATH).await?;
        self.capture("error_handling_404", result).await;
        if first_visible_of(self.page, NOT_FOUND_MARKERS).await?.is_none() {
            result.warn(format!("{} did not show a not-found page", MISSING_PAGE_PATH));
        }
        Ok(())
    }

    async fn test_data_save(&mut self, result: &mut TestResult) -> Result<()> {
        if !self.authenticate(result).await {
            return Ok(());
        }
        self.submit_new_equipment(result).await?;
        Ok(())
    }

    async fn test_data_retrieval(&mut self, result: &mut TestResult) -> Result<()> {
        if !self.authenticate(result).await {
            return Ok(());
        }
        let name = match self.last_created.clone() {
            Some(name) => name,
            None => match self.submit_new_equipment(result).await? {
                Some(name) => name,
                None => return Ok(()),
            },
        };

        self.page.goto(EQUIPMENT_PATH).await?;
        let found = self.page.is_visible(&format!("text={}", name)).await?;
        if !found {
            result.error(format!("Saved equipment '{}' not found in list", name));
        }
        result.data = Some(json!({ "name": name, "found": found }));
        self.capture("data_retrieval", result).await;
        Ok(())
    }

    async fn clear_database(&mut self, result: &mut TestResult) -> Result<()> {
        result.data = Some(json!({
            "user": self.user.username,
            "role": self.user.role.as_str(),
        }));
        if !self.authenticate(result).await {
            return Ok(());
        }

        self.page.goto(SETTINGS_PATH).await?;
        self.capture("settings_page_initial", result).await;

        let is_admin = self.user.role == Role::Admin;
        if !self.page.is_visible(CLEAR_DB_BUTTON).await? {
            result.warn("Clear Database button not visible for this user.");
            if is_admin {
                result.error("Clear Database button missing for admin");
            }
            self.shot("clear_db_button_not_visible", result).await;
            return Ok(());
        }

        self.page.click(CLEAR_DB_BUTTON).await?;
        if !self
            .page
            .wait_for_visible("#databaseClearModal", self.action_timeout_ms)
            .await?
        {
            result.error("Clear Database modal did not open");
            return Ok(());
        }
        self.capture("clear_db_modal_open", result).await;

        self.page.fill("#clearConfirmation", "CLEAR DATABASE").await?;
        self.shot("clear_db_confirmation_filled", result).await;
        self.page.click("#executeClearBtn").await?;

        if !self
            .page
            .wait_for_visible("#clearResults", self.action_timeout_ms)
            .await?
        {
            result.error("Clear Database produced no result output");
            return Ok(());
        }
        let output = self.page.text_nth("#clearOutput", 0).await?.unwrap_or_default();
        self.capture("clear_db_result", result).await;
        if let Some(data) = result.data.as_mut().and_then(|d| d.as_object_mut()) {
            data.insert("operationResult".to_string(), json!(output));
        }

        let lower = output.to_lowercase();
        if is_admin {
            if !(lower.contains("success") || lower.contains("completed")) {
                let shown = if output.is_empty() { "No output" } else { output.as_str() };
                result.error(format!(
                    "Operation did not complete successfully. Result: {}",
                    shown
                ));
            }
        } else if !(lower.contains("permission")
            || lower.contains("denied")
            || lower.contains("not allowed"))
        {
            result.error("Non-admin user was able to attempt or complete a dangerous operation!");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::testing::{MockDocument, MockElement, ScriptedPage};
    use crate::runner::session::tests::{admin, login_form};
    use crate::runner::session::LOGIN_PATH;

    const BASE: &str = "http://app.test";

    fn equipment_form() -> MockDocument {
        let mut doc = MockDocument::new();
        for field in ["name", "manufacturer_serial", "asset_tag", "manufacturer", "model_number"] {
            doc = doc.element(&format!(r#"input[name="{}"]"#, field), MockElement::visible());
        }
        doc.element(r#"select[name="status"]"#, MockElement::visible())
            .element(r#"select[name="location"]"#, MockElement::visible())
            .element(SUBMIT_SELECTOR, MockElement::visible().navigates("/equipment/created/"))
    }

    fn app() -> ScriptedPage {
        ScriptedPage::new(BASE)
            .with_document(LOGIN_PATH, login_form())
            .with_document(
                EQUIPMENT_PATH,
                MockDocument::new().element(
                    r#"a[href*="add"]"#,
                    MockElement::visible().navigates(EQUIPMENT_ADD_PATH),
                ),
            )
            .with_document(EQUIPMENT_ADD_PATH, equipment_form())
            .with_document(
                "/equipment/created/",
                MockDocument::new().element(".alert-success", MockElement::visible()),
            )
    }

    fn store(dir: &tempfile::TempDir) -> ArtifactStore {
        ArtifactStore::new(dir.path(), RunMode::Smart).unwrap()
    }

    #[tokio::test]
    async fn test_create_equipment_succeeds() {
        let page = app();
        let dir = tempfile::tempdir().unwrap();
        let artifacts = store(&dir);
        let mut runner = ActionRunner::new(&page, &artifacts, BASE, RunMode::Smart, admin());

        let result = runner.run_single(Action::CreateEquipment).await;

        assert!(result.success, "errors: {:?}", result.errors);
        assert_eq!(result.test_name, "Create Equipment Test");
        assert!(page.filled(r#"input[name="name"]"#).unwrap().starts_with("Test Equipment "));
        assert_eq!(page.filled(r#"select[name="status"]"#).as_deref(), Some("active"));
        assert_eq!(page.filled(r#"select[name="location"]"#).as_deref(), Some("1"));
        assert!(result.data.unwrap()["asset_tag"].as_str().unwrap().starts_with("AT"));
        assert!(result.duration_ms.is_some());
        assert!(runner.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_missing_add_button_is_an_error() {
        let page = ScriptedPage::new(BASE).with_document(LOGIN_PATH, login_form());
        let dir = tempfile::tempdir().unwrap();
        let artifacts = store(&dir);
        let mut runner = ActionRunner::new(&page, &artifacts, BASE, RunMode::Smart, admin());

        let result = runner.run_single(Action::CreateEquipment).await;
        assert!(!result.success);
        assert_eq!(result.errors, vec!["Could not find Add Equipment button"]);
    }

    #[tokio::test]
    async fn test_missing_delete_button_is_a_warning() {
        let page = app();
        let dir = tempfile::tempdir().unwrap();
        let artifacts = store(&dir);
        let mut runner = ActionRunner::new(&page, &artifacts, BASE, RunMode::Smart, admin());

        let result = runner.run_single(Action::DeleteEquipment).await;
        assert!(result.success);
        assert!(result.warnings[0].starts_with("No delete buttons found"));
    }

    #[tokio::test]
    async fn test_failed_login_fails_the_action_only() {
        let page = ScriptedPage::new(BASE).with_document(
            LOGIN_PATH,
            MockDocument::new()
                .element("#id_username", MockElement::visible())
                .element("#id_password", MockElement::visible()),
        );
        let dir = tempfile::tempdir().unwrap();
        let artifacts = store(&dir);
        let mut runner = ActionRunner::new(&page, &artifacts, BASE, RunMode::Smart, admin());

        let result = runner.run_single(Action::ListEquipment).await;
        assert!(!result.success);
        assert!(result.errors[0].starts_with("Failed to authenticate as admin"));

        // The runner keeps going with the next action
        let next = runner.run_single(Action::TestErrorHandling).await;
        assert!(next.success);
    }

    #[tokio::test]
    async fn test_permissions_redirects() {
        // A login form leading to /home/, and protected pages that always
        // bounce to login except /reports/
        let form = MockDocument::new()
            .element("#id_username", MockElement::visible())
            .element("#id_password", MockElement::visible())
            .element(r#"button[type="submit"]"#, MockElement::visible().navigates("/home/"));
        let mut page = ScriptedPage::new(BASE).with_document(LOGIN_PATH, form);
        for path in PROTECTED_PAGES {
            if *path != "/reports/" {
                page = page.with_document(path, MockDocument::new().redirect(LOGIN_PATH));
            }
        }
        let dir = tempfile::tempdir().unwrap();
        let artifacts = store(&dir);
        let mut runner = ActionRunner::new(&page, &artifacts, BASE, RunMode::Smart, admin());

        let result = runner.run_single(Action::TestPermissions).await;

        assert_eq!(
            result.warnings,
            vec!["Unauthenticated access to /reports/ was not redirected to login"]
        );
        assert_eq!(result.errors.len(), PROTECTED_PAGES.len() - 1);
        assert!(result.errors[0].starts_with("Authenticated access to /dashboard/"));
        assert!(!result.success);
        assert!(!runner.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_redirect_to_login_drops_session() {
        let form = MockDocument::new()
            .element("#id_username", MockElement::visible())
            .element("#id_password", MockElement::visible())
            .element(r#"button[type="submit"]"#, MockElement::visible().navigates("/home/"));
        let page = app()
            .with_document(LOGIN_PATH, form)
            .with_document("/dashboard/", MockDocument::new().redirect(LOGIN_PATH));
        let dir = tempfile::tempdir().unwrap();
        let artifacts = store(&dir);
        let mut runner = ActionRunner::new(&page, &artifacts, BASE, RunMode::Smart, admin());

        let access = runner.run_single(Action::TestAuthorizedAccess).await;
        assert!(!access.success);
        assert_eq!(
            access.errors,
            vec!["Authenticated access to /dashboard/ was incorrectly redirected to login"]
        );
        assert!(!runner.session().is_authenticated());

        // The next action logs in again instead of running logged out
        let logins = page.count_calls(&format!("goto {}", LOGIN_PATH));
        let list = runner.run_single(Action::ListEquipment).await;
        assert!(list.success, "errors: {:?}", list.errors);
        assert_eq!(page.count_calls(&format!("goto {}", LOGIN_PATH)), logins + 1);
        assert!(runner.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_clear_database_hidden_for_technician() {
        let page = ScriptedPage::new(BASE).with_document(LOGIN_PATH, login_form());
        let dir = tempfile::tempdir().unwrap();
        let artifacts = store(&dir);
        let technician = UserContext {
            username: "demo_user_2".to_string(),
            password: "demo123".to_string(),
            role: Role::Technician,
        };
        let mut runner = ActionRunner::new(&page, &artifacts, BASE, RunMode::Smart, technician);

        let result = runner.run_single(Action::ClearDatabase).await;
        assert_eq!(result.test_name, "Clear Database (Danger Zone) Test as technician");
        assert!(result.success);
        assert_eq!(result.warnings, vec!["Clear Database button not visible for this user."]);
    }

    #[tokio::test]
    async fn test_clear_database_as_admin() {
        let page = ScriptedPage::new(BASE)
            .with_document(LOGIN_PATH, login_form())
            .with_document(
                SETTINGS_PATH,
                MockDocument::new()
                    .element(CLEAR_DB_BUTTON, MockElement::visible())
                    .element("#databaseClearModal", MockElement::visible())
                    .element("#clearConfirmation", MockElement::visible())
                    .element("#executeClearBtn", MockElement::visible())
                    .element("#clearResults", MockElement::visible())
                    .element(
                        "#clearOutput",
                        MockElement::visible().text("Database cleared successfully"),
                    ),
            );
        let dir = tempfile::tempdir().unwrap();
        let artifacts = store(&dir);
        let mut runner = ActionRunner::new(&page, &artifacts, BASE, RunMode::Smart, admin());

        let result = runner.run_single(Action::ClearDatabase).await;
        assert!(result.success, "errors: {:?}", result.errors);
        assert_eq!(page.filled("#clearConfirmation").as_deref(), Some("CLEAR DATABASE"));
        assert_eq!(
            result.data.unwrap()["operationResult"],
            "Database cleared successfully"
        );
    }

    #[tokio::test]
    async fn test_comprehensive_records_each_sub_test() {
        let page = app();
        let dir = tempfile::tempdir().unwrap();
        let artifacts = store(&dir);
        let mut runner = ActionRunner::new(&page, &artifacts, BASE, RunMode::Smart, admin());

        let results = runner.run(Action::ComprehensiveTest).await;
        let names: Vec<&str> = results.iter().map(|r| r.test_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Login Test",
                "Permission Test",
                "Create Equipment Test",
                "Delete Equipment Test",
                "Explore All Links Test",
                "Logout Test",
                "Comprehensive Test",
            ]
        );
        assert!(results.last().unwrap().success);
    }

    #[tokio::test]
    async fn test_data_retrieval_after_save() {
        let page = app();
        let dir = tempfile::tempdir().unwrap();
        let artifacts = store(&dir);
        let mut runner = ActionRunner::new(&page, &artifacts, BASE, RunMode::Scenario, admin());

        let saved = runner.run_single(Action::TestDataSave).await;
        assert!(saved.success);

        // The scripted list never shows the new record
        let retrieved = runner.run_single(Action::TestDataRetrieval).await;
        assert!(!retrieved.success);
        assert!(retrieved.errors[0].starts_with("Saved equipment 'Test Equipment "));
    }
}
