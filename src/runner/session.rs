//! Authenticate-once session guard
//!
//! One guard per browser page. It remembers which user the page is logged
//! in as, so repeated actions for the same user skip the login form and a
//! different user triggers a logout first.

use crate::driver::traits::PageDriver;
use crate::parser::types::UserContext;

pub const LOGIN_PATH: &str = "/auth/login/";
pub const LOGOUT_PATH: &str = "/auth/logout/";

const USERNAME_FIELD: &str = "#id_username";
const PASSWORD_FIELD: &str = "#id_password";

/// Tried in order; the first that resolves to a visible element is clicked
pub const SUBMIT_SELECTORS: &[&str] = &[
    r#"input[type="submit"]"#,
    r#"button[type="submit"]"#,
    r#"button:has-text("Login")"#,
    "form button",
];

pub const LOGOUT_SELECTORS: &[&str] = &[
    r#"a[href*="logout"]"#,
    r#"button[onclick*="logout"]"#,
    ".logout",
    ".btn-logout",
    r#"a:has-text("Logout")"#,
    r#"button:has-text("Logout")"#,
];

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("No login submit button found")]
    NoSubmitButton,

    #[error("Login failed, still on login page: {url}")]
    StillOnLoginPage { url: String },

    #[error("Login page interaction failed: {0:#}")]
    Page(#[from] anyhow::Error),
}

/// Whether a URL is (still) the login page
pub fn is_login_url(url: &str) -> bool {
    url.contains("login")
}

#[derive(Debug, Default)]
pub struct AuthSession {
    user: Option<String>,
}

impl AuthSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// User the page is currently logged in as
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Forget the session without touching the page (e.g. after a reload
    /// landed on the login form)
    pub fn invalidate(&mut self) {
        self.user = None;
    }

    /// Make sure the page is logged in as `user`, logging in at most once
    pub async fn ensure(
        &mut self,
        page: &dyn PageDriver,
        user: &UserContext,
    ) -> Result<(), AuthError> {
        match self.user.as_deref() {
            Some(current) if current == user.username => {
                log::debug!("Already authenticated as {}", current);
                return Ok(());
            }
            Some(current) => {
                log::info!("Switching user {} -> {}", current, user.username);
                self.logout(page).await?;
            }
            None => {}
        }
        self.login(page, user).await
    }

    /// Run the login form. Not retried: a missing submit button is an error.
    pub async fn login(
        &mut self,
        page: &dyn PageDriver,
        user: &UserContext,
    ) -> Result<(), AuthError> {
        log::info!("Authenticating as {} ({})", user.username, user.role.as_str());
        page.goto(LOGIN_PATH).await?;

        let url = page.current_url().await?;
        if !is_login_url(&url) {
            log::info!("Login page redirected to {}, already authenticated", url);
            self.user = Some(user.username.clone());
            return Ok(());
        }

        page.fill(USERNAME_FIELD, &user.username).await?;
        page.fill(PASSWORD_FIELD, &user.password).await?;

        let clicked = page.click_first_visible(SUBMIT_SELECTORS).await?;
        if clicked.is_none() {
            return Err(AuthError::NoSubmitButton);
        }
        page.pause(1000).await;

        let url = page.current_url().await?;
        if is_login_url(&url) {
            return Err(AuthError::StillOnLoginPage { url });
        }

        log::info!("Authenticated as {}", user.username);
        self.user = Some(user.username.clone());
        Ok(())
    }

    /// Log out through the first visible logout control, or the logout URL
    pub async fn logout(&mut self, page: &dyn PageDriver) -> anyhow::Result<()> {
        match page.click_first_visible(LOGOUT_SELECTORS).await? {
            Some(selector) => log::debug!("Logged out via {}", selector),
            None => {
                log::debug!("No logout control visible, navigating to {}", LOGOUT_PATH);
                page.goto(LOGOUT_PATH).await?;
            }
        }
        page.pause(1000).await;
        self.user = None;
        Ok(())
    }
}
