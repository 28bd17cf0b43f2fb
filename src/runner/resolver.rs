use super::executor::selector_not_found;
use crate::flow::Step;
use crate::page::{ElementRef, PageDriver};
use crate::Result;
use std::time::Duration;
use tracing::{debug, warn};

/// Pick the first selector candidate the page accepts.
///
/// Candidates are first checked once each, so one already on the page wins without
/// waiting on earlier ones. Only then does each candidate get the full step timeout.
/// Returns `None` for steps recorded without selectors. A step whose candidates all
/// fail (or are all of a skipped family) is a fatal error.
pub async fn resolve(
    page: &dyn PageDriver,
    step: &Step,
    index: usize,
) -> Result<Option<ElementRef>> {
    if step.selectors.is_empty() {
        return Ok(None);
    }

    let queries: Vec<String> = step
        .selectors
        .iter()
        .filter_map(|candidate| {
            let query = candidate.query();
            if query.is_none() {
                debug!(
                    "step<{}>: skipping {:?} selector '{}'",
                    index, candidate.family, candidate
                );
            }
            query
        })
        .collect();
    if queries.is_empty() {
        return Err(selector_not_found(index, step));
    }

    for selector in &queries {
        if let Ok(element) = page.locate(selector, Duration::ZERO).await {
            debug!(
                "step<{}>: using selector '{}' ({} matches)",
                index, element.selector, element.matches
            );
            return Ok(Some(element));
        }
    }

    let timeout = Duration::from_millis(step.timeout_ms);
    for selector in &queries {
        match page.locate(selector, timeout).await {
            Ok(element) => {
                debug!(
                    "step<{}>: using selector '{}' after waiting ({} matches)",
                    index, element.selector, element.matches
                );
                return Ok(Some(element));
            }
            Err(e) => {
                warn!(
                    "step<{}>: selector '{}' not usable: {}. Trying next selector...",
                    index, selector, e
                );
            }
        }
    }

    Err(selector_not_found(index, step))
}
