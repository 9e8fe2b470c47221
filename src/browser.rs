use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::fmt::Display;
use std::time::Duration;
use thirtyfour::prelude::*;
use thirtyfour::ChromiumLikeCapabilities;
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::config::{BrowserConfig, DelayRange, Pacing};
use crate::driver::{BrowserDriver, Target};
use crate::error::DriverError;

/// How often `wait_for` re-queries the page.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Per-address budget when checking whether the debug endpoint is up.
const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Flags for a browser we launch ourselves: quiet startup, nothing that
/// pops up or syncs in the background.
const LAUNCH_FLAGS: &[&str] = &[
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-background-mode",
    "--disable-extensions",
    "--disable-sync",
    "--disable-default-apps",
    "--disable-popup-blocking",
    "--disable-gpu",
];

/// A paced WebDriver session against Chrome.
pub struct ChromeSession {
    driver: WebDriver,
    pacing: Pacing,
}

impl ChromeSession {
    /// Attach to a browser already listening on the debug endpoint, or have
    /// chromedriver launch one with the configured profile.
    pub async fn connect(config: &BrowserConfig, pacing: Pacing) -> Result<Self> {
        let address = debugger_address(&config.debugger_url)?;
        let mut caps = DesiredCapabilities::chrome();

        if is_listening(&address).await {
            info!(%address, "browser already running, attaching");
            caps.add_experimental_option("debuggerAddress", address.as_str())?;
        } else {
            info!(
                %address,
                profile = %config.profile_name,
                "starting browser with remote debugging"
            );
            for arg in launch_args(config, &address)? {
                caps.add_arg(&arg)?;
            }
            if let Some(binary) = &config.binary_path {
                caps.set_binary(&binary.to_string_lossy())?;
            }
        }

        let driver = WebDriver::new(config.webdriver_url.as_str(), caps)
            .await
            .with_context(|| {
                format!(
                    "Failed to start a WebDriver session at {}. Make sure chromedriver is running.",
                    config.webdriver_url
                )
            })?;
        info!("browser connected");

        Ok(Self { driver, pacing })
    }

    async fn pause(&self, range: DelayRange) {
        let delay = range.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    async fn resolve(&self, target: &Target<WebElement>) -> WebDriverResult<WebElement> {
        match target {
            Target::Selector(css) => self.driver.find(By::Css(css.clone())).await,
            Target::Element(el) => Ok(el.clone()),
            Target::Within(parent, css) => parent.find(By::Css(css.clone())).await,
        }
    }
}

/// Errors that only mean the element is not (or no longer) on the page.
fn is_absent(e: &WebDriverError) -> bool {
    matches!(
        e,
        WebDriverError::NoSuchElement(_)
            | WebDriverError::StaleElementReference(_)
            | WebDriverError::Timeout(_)
            | WebDriverError::WebDriverTimeout(_)
    )
}

/// Fold an absent element into `None`; anything else means the browser is gone.
fn absent_as_none<T>(
    result: WebDriverResult<T>,
    target: &impl Display,
) -> Result<Option<T>, DriverError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if is_absent(&e) => {
            debug!(element = %target, error = %e, "element not found");
            Ok(None)
        }
        Err(e) => Err(DriverError::Session(e.to_string())),
    }
}

fn action_error(action: &'static str, target: &Target<WebElement>, e: WebDriverError) -> DriverError {
    DriverError::Action {
        action,
        target: target.to_string(),
        reason: e.to_string(),
    }
}

#[async_trait]
impl BrowserDriver for ChromeSession {
    type Element = WebElement;

    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        info!(%url, "goto url");
        self.driver
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        self.pause(self.pacing.navigation).await;
        Ok(())
    }

    async fn fill(&self, target: &Target<WebElement>, text: &str) -> Result<(), DriverError> {
        let el = self
            .resolve(target)
            .await
            .map_err(|e| action_error("fill", target, e))?;
        el.clear().await.map_err(|e| action_error("fill", target, e))?;
        el.send_keys(text)
            .await
            .map_err(|e| action_error("fill", target, e))?;
        self.pause(self.pacing.action).await;
        Ok(())
    }

    async fn click(&self, target: &Target<WebElement>) -> Result<(), DriverError> {
        let el = self
            .resolve(target)
            .await
            .map_err(|e| action_error("click", target, e))?;
        el.click().await.map_err(|e| action_error("click", target, e))?;
        debug!(element = %target, "clicked");
        self.pause(self.pacing.action).await;
        Ok(())
    }

    async fn read_text(
        &self,
        target: &Target<WebElement>,
    ) -> Result<Option<String>, DriverError> {
        let text = match self.resolve(target).await {
            Ok(el) => el.text().await,
            Err(e) => Err(e),
        };
        Ok(absent_as_none(text, target)?.map(|text| text.trim().to_string()))
    }

    async fn read_attribute(
        &self,
        target: &Target<WebElement>,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        let value = match self.resolve(target).await {
            Ok(el) => el.attr(name).await,
            Err(e) => Err(e),
        };
        Ok(absent_as_none(value, target)?.flatten())
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<WebElement>, DriverError> {
        self.driver
            .find_all(By::Css(selector.to_string()))
            .await
            .map_err(|e| DriverError::Session(e.to_string()))
    }

    async fn scroll_into_view(&self, target: &Target<WebElement>) -> Result<(), DriverError> {
        let el = self
            .resolve(target)
            .await
            .map_err(|e| action_error("scroll", target, e))?;
        el.scroll_into_view()
            .await
            .map_err(|e| action_error("scroll", target, e))?;
        debug!(element = %target, "scrolled into view");
        self.pause(self.pacing.action).await;
        Ok(())
    }

    async fn wait_for(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Option<WebElement>, DriverError> {
        let found = self
            .driver
            .query(By::Css(selector.to_string()))
            .wait(timeout, POLL_INTERVAL)
            .first()
            .await;
        absent_as_none(found, &selector)
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.driver
            .clone()
            .quit()
            .await
            .map_err(|e| DriverError::Session(e.to_string()))
    }
}

/// `http://127.0.0.1:9222/` -> `127.0.0.1:9222`
pub fn debugger_address(url: &str) -> Result<String> {
    let address = url
        .trim()
        .trim_start_matches("http://")
        .trim_start_matches("ws://")
        .trim_end_matches('/');
    match address.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
            Ok(address.to_string())
        }
        _ => Err(anyhow!("Invalid debug endpoint '{}', expected http://host:port", url)),
    }
}

async fn is_listening(address: &str) -> bool {
    let Ok(addrs) = tokio::net::lookup_host(address).await else {
        return false;
    };
    for addr in addrs {
        if let Ok(Ok(_)) = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)).await {
            return true;
        }
    }
    false
}

fn launch_args(config: &BrowserConfig, address: &str) -> Result<Vec<String>> {
    let port = address
        .rsplit_once(':')
        .map(|(_, port)| port)
        .ok_or_else(|| anyhow!("Debug endpoint has no port: {}", address))?;

    let mut args = vec![format!("--remote-debugging-port={}", port)];
    if let Some(dir) = &config.profile_path {
        args.push(format!("--user-data-dir={}", dir.display()));
    }
    args.push(format!("--profile-directory={}", config.profile_name));
    args.extend(LAUNCH_FLAGS.iter().map(|flag| flag.to_string()));
    Ok(args)
}
