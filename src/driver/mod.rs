pub mod common;
#[cfg(test)]
pub mod testing;
pub mod traits;
pub mod web;

use anyhow::Result;

use crate::utils::config::Config;
use traits::PageDriver;

/// Open a browser page for the configured browser
pub async fn open_page(config: &Config) -> Result<Box<dyn PageDriver>> {
    let web_config = web::WebDriverConfig::from_config(config);
    Ok(Box::new(web::WebDriver::new(web_config).await?))
}
