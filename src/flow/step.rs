use super::event::AssertedEvent;
use super::selector::SelectorSpec;
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Step timeout used when a step omits `timeout` (or sets it to 0).
pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 5000;

/// A single recorded step.
#[derive(Debug, Clone)]
pub struct Step {
    /// What the step does.
    pub action: Action,
    /// Selector candidates, in recorded order.
    pub selectors: Vec<SelectorSpec>,
    /// Timeout for the action and for each asserted event.
    pub timeout_ms: u64,
    /// Post-conditions awaited after the action.
    pub asserted_events: Vec<AssertedEvent>,
    /// The step as it appeared in the flow file, kept for error messages.
    pub raw: Value,
}

impl Step {
    fn from_value(raw: Value) -> Result<Self, String> {
        if !raw.is_object() {
            return Err(format!("step must be an object, got {}", raw));
        }
        let fields: StepFields = serde_json::from_value(raw.clone()).map_err(|e| e.to_string())?;
        let action = Action::from_kind(&fields.kind, raw.clone());
        Ok(Self {
            action,
            selectors: fields.selectors,
            timeout_ms: match fields.timeout {
                Some(ms) if ms > 0 => ms,
                _ => DEFAULT_STEP_TIMEOUT_MS,
            },
            asserted_events: fields.asserted_events,
            raw,
        })
    }
}

impl<'de> Deserialize<'de> for Step {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Step::from_value(raw).map_err(de::Error::custom)
    }
}

/// Fields shared by every step kind.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StepFields {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    selectors: Vec<SelectorSpec>,
    timeout: Option<u64>,
    #[serde(default)]
    asserted_events: Vec<AssertedEvent>,
}

/// The action a step performs, one variant per recorded step type.
#[derive(Debug, Clone)]
pub enum Action {
    // Navigation
    Navigate(NavigateAction),
    Close(CloseAction),
    SetViewport(SetViewportAction),

    // Pointer
    Click(ClickAction),
    DoubleClick(DoubleClickAction),
    Hover(HoverAction),
    Scroll(ScrollAction),

    // Keyboard and input
    Change(ChangeAction),
    KeyDown(KeyDownAction),
    KeyUp(KeyUpAction),

    // Waiting
    WaitForElement(WaitForElementAction),
    WaitForExpression(WaitForExpressionAction),

    // Extension point
    CustomStep(CustomStepAction),

    /// A step type this engine does not replay.
    Unsupported(UnsupportedAction),

    /// A known step type whose payload did not decode. Fails when replayed.
    Invalid(InvalidAction),
}

impl Action {
    /// Recorded type name, for logging.
    pub fn name(&self) -> &str {
        match self {
            Self::Navigate(_) => "navigate",
            Self::Close(_) => "close",
            Self::SetViewport(_) => "setViewport",
            Self::Click(_) => "click",
            Self::DoubleClick(_) => "doubleClick",
            Self::Hover(_) => "hover",
            Self::Scroll(_) => "scroll",
            Self::Change(_) => "change",
            Self::KeyDown(_) => "keyDown",
            Self::KeyUp(_) => "keyUp",
            Self::WaitForElement(_) => "waitForElement",
            Self::WaitForExpression(_) => "waitForExpression",
            Self::CustomStep(_) => "customStep",
            Self::Unsupported(a) => &a.kind,
            Self::Invalid(a) => &a.kind,
        }
    }

    fn from_kind(kind: &str, raw: Value) -> Self {
        let decoded = match kind {
            "navigate" => payload(raw).map(Action::Navigate),
            "close" => Ok(Action::Close(CloseAction)),
            "setViewport" => payload(raw).map(Action::SetViewport),
            "click" => payload(raw).map(Action::Click),
            "doubleClick" => payload(raw).map(Action::DoubleClick),
            "hover" => Ok(Action::Hover(HoverAction)),
            "scroll" => payload(raw).map(Action::Scroll),
            "change" => payload(raw).map(Action::Change),
            "keyDown" => payload(raw).map(Action::KeyDown),
            "keyUp" => payload(raw).map(Action::KeyUp),
            "waitForElement" => payload(raw).map(Action::WaitForElement),
            "waitForExpression" => payload(raw).map(Action::WaitForExpression),
            "customStep" => payload(raw).map(Action::CustomStep),
            other => Ok(Action::Unsupported(UnsupportedAction {
                kind: other.to_string(),
            })),
        };
        decoded.unwrap_or_else(|e| {
            Action::Invalid(InvalidAction {
                kind: kind.to_string(),
                error: format!("invalid {} step: {}", kind, e),
            })
        })
    }
}

fn payload<T: DeserializeOwned>(raw: Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(raw)
}

// --- Step payloads ---

#[derive(Debug, Clone, Deserialize)]
pub struct NavigateAction {
    pub url: String,
}

#[derive(Debug, Clone, Default)]
pub struct CloseAction;

/// Viewport resize. Only `width` and `height` are applied; the emulation
/// fields are carried for logging.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetViewportAction {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: Option<f64>,
    pub is_mobile: Option<bool>,
    pub has_touch: Option<bool>,
    pub is_landscape: Option<bool>,
}

/// Click position relative to the element's top-left corner.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickAction {
    #[serde(default)]
    pub offset_x: f64,
    #[serde(default)]
    pub offset_y: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoubleClickAction {
    #[serde(default)]
    pub offset_x: f64,
    #[serde(default)]
    pub offset_y: f64,
}

#[derive(Debug, Clone, Default)]
pub struct HoverAction;

#[derive(Debug, Clone, Deserialize)]
pub struct ScrollAction {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeAction {
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyDownAction {
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyUpAction {
    pub key: String,
}

fn default_count() -> u64 {
    1
}
fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaitForElementAction {
    #[serde(default)]
    pub operator: CountOperator,
    #[serde(default = "default_count")]
    pub count: u64,
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// DOM properties the first match must carry.
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
    /// Attributes the first match must carry.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaitForExpressionAction {
    pub expression: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomStepAction {
    pub name: Option<String>,
    #[serde(default)]
    pub parameters: Value,
}

/// Carries the recorded type name of a step kind that is not replayed.
#[derive(Debug, Clone)]
pub struct UnsupportedAction {
    pub kind: String,
}

/// Carries a step whose payload did not decode, with the decode error.
#[derive(Debug, Clone)]
pub struct InvalidAction {
    pub kind: String,
    pub error: String,
}

/// Comparison used by `waitForElement` between the live match count and `count`.
///
/// An unrecognized operator parses to [`CountOperator::Unknown`], which never matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountOperator {
    #[default]
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Unknown,
}

impl<'de> Deserialize<'de> for CountOperator {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let op = String::deserialize(deserializer)?;
        Ok(match op.as_str() {
            "==" => Self::Eq,
            "!=" => Self::Ne,
            ">" => Self::Gt,
            "<" => Self::Lt,
            ">=" => Self::Ge,
            "<=" => Self::Le,
            _ => Self::Unknown,
        })
    }
}

impl CountOperator {
    /// Apply the comparison `actual <op> expected`.
    pub fn compare(self, actual: u64, expected: u64) -> bool {
        match self {
            Self::Eq => actual == expected,
            Self::Ne => actual != expected,
            Self::Gt => actual > expected,
            Self::Lt => actual < expected,
            Self::Ge => actual >= expected,
            Self::Le => actual <= expected,
            Self::Unknown => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CountOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
