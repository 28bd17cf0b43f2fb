//! # eoka-replay
//!
//! Replay user flows recorded by the Chrome DevTools recorder against a live page.
//! Selector lists are resolved with fallback, asserted events are awaited after every
//! step, and each replay reports its outcome through a [`TaskStore`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use eoka_replay::{EokaPage, Inputs, Replayer, TaskStore};
//!
//! # #[tokio::main]
//! # async fn main() -> eoka_replay::Result<()> {
//! let browser = Arc::new(eoka::Browser::launch().await?);
//! let page = EokaPage::open(browser.clone(), "about:blank").await?;
//!
//! let store = TaskStore::new();
//! let replayer = Replayer::new("flows", store.clone());
//! let inputs = Inputs::new().set("query", "rust");
//! let handle = replayer.launch("search.json", inputs, Arc::new(page)).await;
//!
//! let task = handle.wait().await?;
//! println!("{}", serde_json::to_string(&task)?);
//! # Ok(())
//! # }
//! ```

mod flow;
mod page;
mod runner;
mod settings;
mod task;

pub use flow::step::{
    ChangeAction, ClickAction, CloseAction, CustomStepAction, DoubleClickAction, HoverAction,
    InvalidAction, KeyDownAction, KeyUpAction, NavigateAction, ScrollAction, SetViewportAction,
    UnsupportedAction, WaitForElementAction, WaitForExpressionAction,
};
pub use flow::{
    preprocess, Action, AssertedEvent, CountOperator, Flow, Inputs, SelectorFamily,
    SelectorSpec, Step, DEFAULT_STEP_TIMEOUT_MS,
};
pub use page::{ElementRef, EokaPage, PageDriver, UrlPattern};
pub use runner::{ReplayHandle, Replayer, StepAction, StepContext};
pub use settings::{BrowserSettings, Settings, Viewport};
pub use task::{TaskEntry, TaskId, TaskStatus, TaskStore};

/// Result type for eoka-replay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading or replaying a flow.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("browser error: {0}")]
    Browser(#[from] eoka::Error),

    #[error("no valid selector found for this step<{step}>: {step_json}")]
    SelectorNotFound { step: usize, step_json: String },

    #[error("action failed: {0}")]
    ActionFailed(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("assertion failed: {0}")]
    AssertionFailed(String),

    #[error("task id not found: {0}")]
    TaskNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_flow() {
        let flow = Flow::parse(r#"{"title": "nothing"}"#).unwrap();
        assert_eq!(flow.title.as_deref(), Some("nothing"));
        assert!(flow.steps.is_empty());
        assert!(flow.input_schema.is_none());
    }

    #[test]
    fn test_parse_navigation_steps() {
        let json = r#"{
            "steps": [
                {"type": "setViewport", "width": 1280, "height": 720, "deviceScaleFactor": 1,
                 "isMobile": false, "hasTouch": false, "isLandscape": false},
                {"type": "navigate", "url": "https://example.test",
                 "assertedEvents": [{"type": "navigation", "url": "https://example.test/", "title": "Example"}]},
                {"type": "close"}
            ]
        }"#;
        let flow = Flow::parse(json).unwrap();
        assert_eq!(flow.steps.len(), 3);

        if let Action::SetViewport(a) = &flow.steps[0].action {
            assert_eq!(a.width, 1280);
            assert_eq!(a.height, 720);
            assert_eq!(a.is_mobile, Some(false));
        } else {
            panic!("Expected SetViewport step");
        }

        if let Action::Navigate(a) = &flow.steps[1].action {
            assert_eq!(a.url, "https://example.test");
        } else {
            panic!("Expected Navigate step");
        }
        assert_eq!(flow.steps[1].asserted_events.len(), 1);
        assert!(matches!(
            flow.steps[1].asserted_events[0],
            AssertedEvent::Navigation { .. }
        ));

        assert!(matches!(flow.steps[2].action, Action::Close(_)));
    }

    #[test]
    fn test_parse_click_step() {
        let json = r##"{
            "steps": [
                {"type": "click", "target": "main",
                 "selectors": [["aria/Submit"], ["#submit"], ["xpath///*[@id=\"submit\"]"]],
                 "offsetX": 12.5, "offsetY": 4, "timeout": 3000},
                {"type": "doubleClick", "selectors": ["#cell"]}
            ]
        }"##;
        let flow = Flow::parse(json).unwrap();
        let click = &flow.steps[0];
        assert_eq!(click.selectors.len(), 3);
        assert_eq!(click.selectors[1].raw, "#submit");
        assert_eq!(click.timeout_ms, 3000);

        if let Action::Click(a) = &click.action {
            assert_eq!(a.offset_x, 12.5);
            assert_eq!(a.offset_y, 4.0);
        } else {
            panic!("Expected Click step");
        }

        let double = &flow.steps[1];
        assert_eq!(double.timeout_ms, DEFAULT_STEP_TIMEOUT_MS);
        if let Action::DoubleClick(a) = &double.action {
            assert_eq!(a.offset_x, 0.0);
        } else {
            panic!("Expected DoubleClick step");
        }
    }

    #[test]
    fn test_zero_timeout_uses_default() {
        let flow = Flow::parse(r#"{"steps": [{"type": "keyDown", "key": "Enter", "timeout": 0}]}"#)
            .unwrap();
        assert_eq!(flow.steps[0].timeout_ms, DEFAULT_STEP_TIMEOUT_MS);
    }

    #[test]
    fn test_parse_input_steps() {
        let json = r##"{
            "steps": [
                {"type": "change", "selectors": ["#q"], "value": "rust"},
                {"type": "keyDown", "key": "Enter"},
                {"type": "keyUp", "key": "Enter"},
                {"type": "scroll", "x": 0, "y": 640},
                {"type": "hover", "selectors": [".menu"]}
            ]
        }"##;
        let flow = Flow::parse(json).unwrap();
        assert_eq!(flow.steps.len(), 5);

        if let Action::Change(a) = &flow.steps[0].action {
            assert_eq!(a.value, "rust");
        } else {
            panic!("Expected Change step");
        }
        if let Action::KeyDown(a) = &flow.steps[1].action {
            assert_eq!(a.key, "Enter");
        } else {
            panic!("Expected KeyDown step");
        }
        assert!(matches!(flow.steps[2].action, Action::KeyUp(_)));
        if let Action::Scroll(a) = &flow.steps[3].action {
            assert_eq!(a.x, 0.0);
            assert_eq!(a.y, 640.0);
        } else {
            panic!("Expected Scroll step");
        }
        assert!(matches!(flow.steps[4].action, Action::Hover(_)));
    }

    #[test]
    fn test_parse_wait_steps() {
        let json = r##"{
            "steps": [
                {"type": "waitForElement", "selectors": [".row"], "operator": ">=", "count": 2,
                 "properties": {"checked": true}, "attributes": {"data-state": "open"}},
                {"type": "waitForElement", "selectors": [".row"]},
                {"type": "waitForExpression", "expression": "window.ready === true"}
            ]
        }"##;
        let flow = Flow::parse(json).unwrap();

        if let Action::WaitForElement(a) = &flow.steps[0].action {
            assert_eq!(a.operator, CountOperator::Ge);
            assert_eq!(a.count, 2);
            assert!(a.visible);
            assert_eq!(a.properties.get("checked"), Some(&serde_json::json!(true)));
            assert_eq!(a.attributes.get("data-state").map(String::as_str), Some("open"));
        } else {
            panic!("Expected WaitForElement step");
        }

        if let Action::WaitForElement(a) = &flow.steps[1].action {
            assert_eq!(a.operator, CountOperator::Eq);
            assert_eq!(a.count, 1);
            assert!(a.properties.is_empty());
        } else {
            panic!("Expected WaitForElement step");
        }

        if let Action::WaitForExpression(a) = &flow.steps[2].action {
            assert_eq!(a.expression, "window.ready === true");
        } else {
            panic!("Expected WaitForExpression step");
        }
    }

    #[test]
    fn test_parse_unknown_kinds_are_kept() {
        let json = r#"{
            "steps": [
                {"type": "emulateNetworkConditions", "download": 1000,
                 "assertedEvents": [{"type": "screenshotMatches", "name": "home"}]},
                {"type": "customStep", "name": "login", "parameters": {"user": "alice"}}
            ]
        }"#;
        let flow = Flow::parse(json).unwrap();
        assert!(
            matches!(&flow.steps[0].action, Action::Unsupported(a) if a.kind == "emulateNetworkConditions")
        );
        assert!(
            matches!(&flow.steps[0].asserted_events[0], AssertedEvent::Unsupported(kind) if kind == "screenshotMatches")
        );
        if let Action::CustomStep(a) = &flow.steps[1].action {
            assert_eq!(a.name.as_deref(), Some("login"));
            assert_eq!(a.parameters["user"], "alice");
        } else {
            panic!("Expected CustomStep");
        }
    }

    #[test]
    fn test_parse_asserted_events() {
        let json = r##"{
            "steps": [{
                "type": "click", "selectors": ["#add"],
                "assertedEvents": [
                    {"type": "elementBoundingBox", "selector": "#cart"},
                    {"type": "elementCount", "selector": ".item", "count": 3},
                    {"type": "elementText", "selector": "#total", "text": "3 items"}
                ]
            }]
        }"##;
        let flow = Flow::parse(json).unwrap();
        let events = &flow.steps[0].asserted_events;
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], AssertedEvent::ElementBoundingBox { selector } if selector == "#cart"));
        assert!(matches!(&events[1], AssertedEvent::ElementCount { count: 3, .. }));
        assert!(matches!(&events[2], AssertedEvent::ElementText { text, .. } if text == "3 items"));
    }

    #[test]
    fn test_parse_missing_type_is_error() {
        let result = Flow::parse(r#"{"steps": [{"url": "https://example.test"}]}"#);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("type"));
    }

    #[test]
    fn test_parse_missing_required_field_deferred() {
        let flow = Flow::parse(
            r#"{"steps": [{"type": "navigate", "url": "https://example.test"}, {"type": "navigate"}]}"#,
        )
        .unwrap();
        assert_eq!(flow.steps.len(), 2);
        assert!(matches!(&flow.steps[0].action, Action::Navigate(_)));
        assert!(
            matches!(&flow.steps[1].action, Action::Invalid(a) if a.error.contains("url")),
            "{:?}",
            flow.steps[1].action
        );
    }

    #[test]
    fn test_parse_with_inputs() {
        let json = r##"{
            "input_schema": {"type": "object", "properties": {"query": {"type": "string"}}},
            "steps": [
                {"type": "navigate", "url": "https://${host}/search"},
                {"type": "change", "selectors": ["#q"], "value": "${query}"},
                {"type": "change", "selectors": ["#n"], "value": "${missing}"}
            ]
        }"##;
        let inputs = Inputs::new().set("host", "example.test").set("query", "rust");
        let flow = Flow::parse_with_inputs(json, &inputs).unwrap();
        assert!(flow.input_schema.is_some());

        if let Action::Navigate(a) = &flow.steps[0].action {
            assert_eq!(a.url, "https://example.test/search");
        } else {
            panic!("Expected Navigate step");
        }
        if let Action::Change(a) = &flow.steps[1].action {
            assert_eq!(a.value, "rust");
        } else {
            panic!("Expected Change step");
        }
        if let Action::Change(a) = &flow.steps[2].action {
            assert_eq!(a.value, "${missing}");
        } else {
            panic!("Expected Change step");
        }
    }

    #[test]
    fn test_initial_viewport() {
        let json = r#"{"steps": [
            {"type": "navigate", "url": "https://example.test"},
            {"type": "setViewport", "width": 390, "height": 844, "isMobile": true}
        ]}"#;
        let flow = Flow::parse(json).unwrap();
        assert_eq!(flow.initial_viewport(), Some((390, 844)));

        let empty = Flow::parse(r#"{"steps": []}"#).unwrap();
        assert_eq!(empty.initial_viewport(), None);
    }

    #[test]
    fn test_error_messages() {
        let err = Error::SelectorNotFound {
            step: 1,
            step_json: r##"{"type":"click"}"##.into(),
        };
        assert!(err
            .to_string()
            .starts_with("no valid selector found for this step<1>"));
        assert_eq!(
            Error::TaskNotFound("abc".into()).to_string(),
            "task id not found: abc"
        );
    }
}
