//! The browser capability the replay engine drives.
//!
//! [`PageDriver`] is the seam between the engine and a live page. [`EokaPage`] implements
//! it over an `eoka` page; tests implement it in memory.

mod eoka_page;
mod url_pattern;

pub use eoka_page::EokaPage;
pub use url_pattern::UrlPattern;

use crate::flow::CountOperator;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// A resolved element reference: the selector the page accepted and how many
/// elements it matched when resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
    pub selector: String,
    pub matches: u64,
}

/// Page operations used during replay.
///
/// Selectors are either CSS or the `xpath=` form produced by
/// [`SelectorSpec::query`](crate::SelectorSpec::query). Every wait returns
/// [`Error::Timeout`](crate::Error::Timeout) when its condition does not hold in time.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to `url`.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Obtain a reference for `selector`. Fails when the selector is invalid or
    /// nothing matches within `timeout`. A zero timeout checks once.
    async fn locate(&self, selector: &str, timeout: Duration) -> Result<ElementRef>;

    /// Click `click_count` times at an offset from the element's top-left corner.
    async fn click(
        &self,
        element: &ElementRef,
        offset_x: f64,
        offset_y: f64,
        click_count: u32,
        timeout: Duration,
    ) -> Result<()>;

    /// Replace the element's value.
    async fn fill(&self, element: &ElementRef, value: &str, timeout: Duration) -> Result<()>;

    /// Move the pointer over the element.
    async fn hover(&self, element: &ElementRef, timeout: Duration) -> Result<()>;

    /// Press `key` without releasing it. A held modifier applies to later keys.
    async fn key_down(&self, key: &str) -> Result<()>;

    async fn key_up(&self, key: &str) -> Result<()>;

    /// Evaluate a script in the page and return its JSON result.
    async fn evaluate(&self, script: &str) -> Result<Value>;

    async fn set_viewport(&self, width: u32, height: u32) -> Result<()>;

    /// Close the page without running unload handlers.
    async fn close(&self) -> Result<()>;

    /// Wait until `selector` matches something (and is visible, if `visible`).
    async fn wait_for_selector(&self, selector: &str, visible: bool, timeout: Duration)
        -> Result<()>;

    /// Wait until `count(selector) <operator> count` holds.
    async fn wait_for_count(
        &self,
        selector: &str,
        operator: CountOperator,
        count: u64,
        timeout: Duration,
    ) -> Result<()>;

    /// Wait until every DOM property of the first match equals the given value.
    async fn wait_for_properties(
        &self,
        selector: &str,
        properties: &BTreeMap<String, Value>,
        timeout: Duration,
    ) -> Result<()>;

    /// Wait until every attribute of the first match equals the given value.
    async fn wait_for_attributes(
        &self,
        selector: &str,
        attributes: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<()>;

    /// Wait until the first match's text content equals `text`.
    async fn wait_for_text(&self, selector: &str, text: &str, timeout: Duration) -> Result<()>;

    /// Wait until the page URL matches `pattern`.
    async fn wait_for_url(&self, pattern: &UrlPattern, timeout: Duration) -> Result<()>;

    /// Wait until `expression` evaluates truthy.
    async fn wait_for_expression(&self, expression: &str, timeout: Duration) -> Result<()>;
}
