//! Capability surface the scraper needs from a browser.
//!
//! Implementations pace themselves: every navigate, fill, click and scroll is
//! followed by a jittered pause, so callers never sleep on their own.
//!
//! Lookups separate an element that is simply not there (`Ok(None)`) from a
//! browser that can no longer be queried (`Err`).

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::DriverError;

/// What an operation acts on.
#[derive(Debug, Clone)]
pub enum Target<E> {
    /// First element on the page matching a CSS selector.
    Selector(String),
    /// An element handle obtained earlier.
    Element(E),
    /// First descendant of an element matching a CSS selector.
    Within(E, String),
}

impl<E> Target<E> {
    pub fn css(selector: impl Into<String>) -> Self {
        Target::Selector(selector.into())
    }

    pub fn within(parent: &E, selector: impl Into<String>) -> Self
    where
        E: Clone,
    {
        Target::Within(parent.clone(), selector.into())
    }
}

impl<E> fmt::Display for Target<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Selector(css) => write!(f, "`{}`", css),
            Target::Element(_) => f.write_str("element"),
            Target::Within(_, css) => write!(f, "element > `{}`", css),
        }
    }
}

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    type Element: Clone + fmt::Debug + Send + Sync;

    /// Load `url`. Failure is fatal for a session.
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    async fn fill(&self, target: &Target<Self::Element>, text: &str) -> Result<(), DriverError>;

    async fn click(&self, target: &Target<Self::Element>) -> Result<(), DriverError>;

    /// Trimmed text content, or `None` when the element is absent.
    async fn read_text(
        &self,
        target: &Target<Self::Element>,
    ) -> Result<Option<String>, DriverError>;

    async fn read_attribute(
        &self,
        target: &Target<Self::Element>,
        name: &str,
    ) -> Result<Option<String>, DriverError>;

    /// Every element currently matching `selector`. An empty page is `Ok(vec![])`;
    /// `Err` means the browser itself could not be queried.
    async fn find_all(&self, selector: &str) -> Result<Vec<Self::Element>, DriverError>;

    async fn scroll_into_view(&self, target: &Target<Self::Element>) -> Result<(), DriverError>;

    /// Poll for `selector` for up to `timeout`. `None` means it never appeared.
    async fn wait_for(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Option<Self::Element>, DriverError>;

    /// Release the browser session.
    async fn close(&self) -> Result<(), DriverError>;
}
