use super::{ElementRef, PageDriver, UrlPattern};
use crate::flow::CountOperator;
use crate::{Error, Result};
use async_trait::async_trait;
use eoka::{Browser, Page};
use eoka::cdp::{modifiers, InputDispatchKeyEventFull, KeyEventType, MouseButton, MouseEventType};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default interval between condition checks while waiting.
const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Element lookup shared by every script: CSS via `querySelectorAll`,
/// `xpath=` selectors via `document.evaluate`.
const ELEMENTS_JS: &str = r#"
    const __all = (sel) => {
        if (sel.startsWith('xpath=')) {
            const snap = document.evaluate(sel.slice(6), document, null,
                XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
            const out = [];
            for (let i = 0; i < snap.snapshotLength; i++) out.push(snap.snapshotItem(i));
            return out;
        }
        return Array.from(document.querySelectorAll(sel));
    };
    const __visible = (el) => {
        const rect = el.getBoundingClientRect();
        const style = getComputedStyle(el);
        return rect.width > 0 && rect.height > 0
            && style.visibility !== 'hidden' && style.display !== 'none';
    };
"#;

fn js_str(s: &str) -> String {
    Value::from(s).to_string()
}

fn script(body: &str) -> String {
    format!("(() => {{{}{}}})()", ELEMENTS_JS, body)
}

fn count_js(selector: &str) -> String {
    script(&format!("return __all({}).length;", js_str(selector)))
}

fn present_js(selector: &str, visible: bool) -> String {
    let check = if visible {
        "els.some(__visible)"
    } else {
        "els.length > 0"
    };
    script(&format!(
        "const els = __all({}); return {};",
        js_str(selector),
        check
    ))
}

fn compare_count_js(selector: &str, operator: CountOperator, count: u64) -> String {
    // An unrecognized operator never matches.
    if operator == CountOperator::Unknown {
        return script("return false;");
    }
    let op = match operator {
        CountOperator::Eq => "===",
        CountOperator::Ne => "!==",
        other => other.as_str(),
    };
    script(&format!(
        "return __all({}).length {} {};",
        js_str(selector),
        op,
        count
    ))
}

fn properties_js(selector: &str, properties: &BTreeMap<String, Value>) -> String {
    let want = serde_json::to_string(properties).unwrap_or_else(|_| "{}".into());
    script(&format!(
        "const el = __all({})[0]; if (!el) return false; \
         return Object.entries({}).every(([k, v]) => el[k] === v);",
        js_str(selector),
        want
    ))
}

fn attributes_js(selector: &str, attributes: &BTreeMap<String, String>) -> String {
    let want = serde_json::to_string(attributes).unwrap_or_else(|_| "{}".into());
    script(&format!(
        "const el = __all({})[0]; if (!el) return false; \
         return Object.entries({}).every(([k, v]) => el.getAttribute(k) === v);",
        js_str(selector),
        want
    ))
}

fn text_js(selector: &str, text: &str) -> String {
    script(&format!(
        "const el = __all({})[0]; return !!el && el.textContent === {};",
        js_str(selector),
        js_str(text)
    ))
}

fn expression_js(expression: &str) -> String {
    format!("(() => !!({}))()", expression)
}

/// Scroll the first match into view and return a point relative to its top-left
/// corner (or its center when no offset is given).
fn point_js(selector: &str, offset: Option<(f64, f64)>) -> String {
    let (x, y) = match offset {
        Some((ox, oy)) => (format!("r.left + {}", ox), format!("r.top + {}", oy)),
        None => ("r.left + r.width / 2".into(), "r.top + r.height / 2".into()),
    };
    script(&format!(
        "const el = __all({})[0]; if (!el) return null; \
         el.scrollIntoView({{block: 'center', inline: 'center'}}); \
         const r = el.getBoundingClientRect(); \
         return {{ x: {}, y: {} }};",
        js_str(selector),
        x,
        y
    ))
}

/// Press/release pairs for a click of `click_count`, each carrying its running count
/// so the second pair registers as a double click.
fn click_events(click_count: u32) -> Vec<(MouseEventType, i32)> {
    let count = click_count.max(1) as i32;
    (1..=count)
        .flat_map(|n| [(MouseEventType::MousePressed, n), (MouseEventType::MouseReleased, n)])
        .collect()
}

/// Text a key produces when pressed, if any.
fn key_text(key: &str) -> Option<&str> {
    match key {
        "Enter" => Some("\r"),
        _ if key.chars().count() == 1 => Some(key),
        _ => None,
    }
}

/// CDP modifier flag set while `key` is held, or 0 for other keys.
fn modifier_bit(key: &str) -> i32 {
    match key {
        "Alt" => modifiers::ALT,
        "Control" => modifiers::CTRL,
        "Meta" => modifiers::META,
        "Shift" => modifiers::SHIFT,
        _ => 0,
    }
}

/// `Input.dispatchKeyEvent` parameters. Only key-down carries text; `held` is the
/// modifier mask in effect for this event.
fn key_event(event_type: KeyEventType, key: &str, held: i32) -> InputDispatchKeyEventFull {
    let text = match event_type {
        KeyEventType::KeyDown => key_text(key).map(String::from),
        _ => None,
    };
    InputDispatchKeyEventFull {
        r#type: event_type,
        modifiers: (held != 0).then_some(held),
        unmodified_text: text.clone(),
        text,
        key: Some(key.to_string()),
        code: Some(key.to_string()),
        ..Default::default()
    }
}

/// `Emulation.setDeviceMetricsOverride` parameters for a plain resize.
fn device_metrics(width: u32, height: u32) -> Value {
    json!({
        "width": width,
        "height": height,
        "deviceScaleFactor": 0,
        "mobile": false,
    })
}

fn fill_js(selector: &str, value: &str) -> String {
    script(&format!(
        r#"const el = __all({sel})[0]; if (!el) return false;
        el.focus();
        if (el.isContentEditable) {{
            el.textContent = {val};
        }} else {{
            const desc = Object.getOwnPropertyDescriptor(Object.getPrototypeOf(el), 'value');
            if (desc && desc.set) desc.set.call(el, {val}); else el.value = {val};
        }}
        el.dispatchEvent(new Event('input', {{ bubbles: true }}));
        el.dispatchEvent(new Event('change', {{ bubbles: true }}));
        return true;"#,
        sel = js_str(selector),
        val = js_str(value)
    ))
}

/// [`PageDriver`] over an `eoka` page.
///
/// Waits are implemented by polling a page script until it returns `true` or the
/// timeout elapses.
pub struct EokaPage {
    browser: Arc<Browser>,
    page: Page,
    poll_interval_ms: u64,
    /// Modifier keys currently held down, as CDP flags.
    held_modifiers: AtomicI32,
}

impl EokaPage {
    /// Open a new tab in `browser` at `url`.
    pub async fn open(browser: Arc<Browser>, url: &str) -> Result<Self> {
        let page = browser.new_page(url).await?;
        Ok(Self::new(browser, page))
    }

    /// Wrap an already-open page of `browser`.
    pub fn new(browser: Arc<Browser>, page: Page) -> Self {
        Self {
            browser,
            page,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            held_modifiers: AtomicI32::new(0),
        }
    }

    /// Set the interval between condition checks.
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms.max(1);
        self
    }

    /// Get a reference to the underlying page.
    pub fn page(&self) -> &Page {
        &self.page
    }

    async fn poll(
        &self,
        js: &str,
        timeout: Duration,
        what: impl FnOnce() -> String,
    ) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let done: bool = self.page.evaluate(js).await?;
            if done {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout(format!(
                    "{} not met within {}ms",
                    what(),
                    timeout.as_millis()
                )));
            }
            self.page.wait(self.poll_interval_ms).await;
        }
    }

    async fn dispatch_key(&self, event: InputDispatchKeyEventFull) -> Result<()> {
        self.page.session().dispatch_key_event_full(event).await?;
        Ok(())
    }

    async fn point(
        &self,
        element: &ElementRef,
        offset: Option<(f64, f64)>,
        timeout: Duration,
    ) -> Result<(f64, f64)> {
        self.wait_for_selector(&element.selector, true, timeout)
            .await?;
        let point: Option<Value> = self
            .page
            .evaluate(&point_js(&element.selector, offset))
            .await?;
        let point = point.ok_or_else(|| {
            Error::ActionFailed(format!("element '{}' detached", element.selector))
        })?;
        Ok((
            point["x"].as_f64().unwrap_or(0.0),
            point["y"].as_f64().unwrap_or(0.0),
        ))
    }
}

#[async_trait]
impl PageDriver for EokaPage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.page.goto(url))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "navigation to {} exceeded {}ms",
                    url,
                    timeout.as_millis()
                ))
            })??;
        Ok(())
    }

    async fn locate(&self, selector: &str, timeout: Duration) -> Result<ElementRef> {
        let js = count_js(selector);
        let deadline = Instant::now() + timeout;
        loop {
            let matches: u64 = self.page.evaluate(&js).await?;
            if matches > 0 {
                return Ok(ElementRef {
                    selector: selector.to_string(),
                    matches,
                });
            }
            if Instant::now() >= deadline {
                return Err(Error::ActionFailed(format!(
                    "selector '{}' matched nothing",
                    selector
                )));
            }
            self.page.wait(self.poll_interval_ms).await;
        }
    }

    async fn click(
        &self,
        element: &ElementRef,
        offset_x: f64,
        offset_y: f64,
        click_count: u32,
        timeout: Duration,
    ) -> Result<()> {
        let (x, y) = self
            .point(element, Some((offset_x, offset_y)), timeout)
            .await?;
        debug!("Click at ({:.0}, {:.0}) x{}", x, y, click_count);
        let session = self.page.session();
        session
            .dispatch_mouse_event(MouseEventType::MouseMoved, x, y, None, None)
            .await?;
        for (event_type, count) in click_events(click_count) {
            session
                .dispatch_mouse_event(event_type, x, y, Some(MouseButton::Left), Some(count))
                .await?;
        }
        Ok(())
    }

    async fn fill(&self, element: &ElementRef, value: &str, timeout: Duration) -> Result<()> {
        self.wait_for_selector(&element.selector, true, timeout)
            .await?;
        let filled: bool = self
            .page
            .evaluate(&fill_js(&element.selector, value))
            .await?;
        if !filled {
            return Err(Error::ActionFailed(format!(
                "fill target '{}' not found",
                element.selector
            )));
        }
        Ok(())
    }

    async fn hover(&self, element: &ElementRef, timeout: Duration) -> Result<()> {
        let (x, y) = self.point(element, None, timeout).await?;
        self.page
            .session()
            .dispatch_mouse_event(MouseEventType::MouseMoved, x, y, None, None)
            .await?;
        Ok(())
    }

    async fn key_down(&self, key: &str) -> Result<()> {
        let bit = modifier_bit(key);
        let held = self.held_modifiers.fetch_or(bit, Ordering::SeqCst) | bit;
        self.dispatch_key(key_event(KeyEventType::KeyDown, key, held))
            .await
    }

    async fn key_up(&self, key: &str) -> Result<()> {
        let bit = modifier_bit(key);
        let held = self.held_modifiers.fetch_and(!bit, Ordering::SeqCst) & !bit;
        self.dispatch_key(key_event(KeyEventType::KeyUp, key, held))
            .await
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        Ok(self.page.evaluate(script).await?)
    }

    /// Resize the viewport. Device emulation stays as launched.
    async fn set_viewport(&self, width: u32, height: u32) -> Result<()> {
        self.page
            .session()
            .send::<_, Value>(
                "Emulation.setDeviceMetricsOverride",
                &device_metrics(width, height),
            )
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let target = self.page.target_id().to_string();
        self.browser.close_tab(&target).await?;
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        visible: bool,
        timeout: Duration,
    ) -> Result<()> {
        self.poll(&present_js(selector, visible), timeout, || {
            let state = if visible { "visible" } else { "attached" };
            format!("selector '{}' {}", selector, state)
        })
        .await
    }

    async fn wait_for_count(
        &self,
        selector: &str,
        operator: CountOperator,
        count: u64,
        timeout: Duration,
    ) -> Result<()> {
        self.poll(&compare_count_js(selector, operator, count), timeout, || {
            format!("count('{}') {} {}", selector, operator, count)
        })
        .await
    }

    async fn wait_for_properties(
        &self,
        selector: &str,
        properties: &BTreeMap<String, Value>,
        timeout: Duration,
    ) -> Result<()> {
        self.poll(&properties_js(selector, properties), timeout, || {
            format!("properties of '{}'", selector)
        })
        .await
    }

    async fn wait_for_attributes(
        &self,
        selector: &str,
        attributes: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<()> {
        self.poll(&attributes_js(selector, attributes), timeout, || {
            format!("attributes of '{}'", selector)
        })
        .await
    }

    async fn wait_for_text(&self, selector: &str, text: &str, timeout: Duration) -> Result<()> {
        self.poll(&text_js(selector, text), timeout, || {
            format!("text of '{}' == '{}'", selector, text)
        })
        .await
    }

    async fn wait_for_url(&self, pattern: &UrlPattern, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let url = self.page.url().await?;
            if pattern.matches(&url) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout(format!(
                    "url '{}' did not match '{}' within {}ms",
                    url,
                    pattern,
                    timeout.as_millis()
                )));
            }
            self.page.wait(self.poll_interval_ms).await;
        }
    }

    async fn wait_for_expression(&self, expression: &str, timeout: Duration) -> Result<()> {
        self.poll(&expression_js(expression), timeout, || {
            format!("expression '{}'", expression)
        })
        .await
    }
}
