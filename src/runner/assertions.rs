use crate::flow::{AssertedEvent, CountOperator, Step};
use crate::page::{PageDriver, UrlPattern};
use crate::{Error, Result};
use std::time::Duration;
use tracing::info;

/// Wait for each of the step's asserted events, in order.
pub async fn check(page: &dyn PageDriver, step: &Step, index: usize) -> Result<()> {
    let timeout = Duration::from_millis(step.timeout_ms);
    for event in &step.asserted_events {
        check_event(page, event, index, timeout).await.map_err(|e| {
            Error::AssertionFailed(format!("{} at step<{}>: {}", event.name(), index, e))
        })?;
    }
    Ok(())
}

async fn check_event(
    page: &dyn PageDriver,
    event: &AssertedEvent,
    index: usize,
    timeout: Duration,
) -> Result<()> {
    match event {
        AssertedEvent::ElementBoundingBox { selector } => {
            info!("assert element_bounding_box: {}", selector);
            page.wait_for_selector(selector, false, timeout).await
        }
        AssertedEvent::ElementCount { selector, count } => {
            info!("assert element_count: {} == {}", selector, count);
            page.wait_for_count(selector, CountOperator::Eq, *count, timeout)
                .await
        }
        AssertedEvent::ElementText { selector, text } => {
            info!("assert element_text: {} == '{}'", selector, text);
            page.wait_for_text(selector, text, timeout).await
        }
        AssertedEvent::Navigation { url } => {
            info!("assert navigation: {}", url);
            page.wait_for_url(&UrlPattern::new(url.as_str()), timeout)
                .await
        }
        AssertedEvent::Unsupported(kind) => {
            info!("step<{}>: unsupported asserted event type: {}", index, kind);
            Ok(())
        }
    }
}
