use serde::de;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// A post-condition recorded alongside a step.
#[derive(Debug, Clone, PartialEq)]
pub enum AssertedEvent {
    /// The element exists. The recorded box itself is not compared.
    ElementBoundingBox { selector: String },
    /// Exactly `count` elements match.
    ElementCount { selector: String, count: u64 },
    /// The first match's text content equals `text`.
    ElementText { selector: String, text: String },
    /// The page URL matches `url`.
    Navigation { url: String },
    /// An event type this engine does not check.
    Unsupported(String),
}

impl AssertedEvent {
    pub fn name(&self) -> &str {
        match self {
            Self::ElementBoundingBox { .. } => "elementBoundingBox",
            Self::ElementCount { .. } => "elementCount",
            Self::ElementText { .. } => "elementText",
            Self::Navigation { .. } => "navigation",
            Self::Unsupported(kind) => kind,
        }
    }
}

#[derive(Deserialize)]
struct EventKind {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct SelectorFields {
    selector: String,
}

#[derive(Deserialize)]
struct CountFields {
    selector: String,
    count: u64,
}

#[derive(Deserialize)]
struct TextFields {
    selector: String,
    text: String,
}

#[derive(Deserialize)]
struct NavigationFields {
    url: String,
}

impl<'de> Deserialize<'de> for AssertedEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        let EventKind { kind } =
            serde_json::from_value(raw.clone()).map_err(<D::Error as de::Error>::custom)?;
        let invalid = |e: serde_json::Error| -> D::Error {
            de::Error::custom(format!("invalid {} asserted event: {}", kind, e))
        };

        let event = match kind.as_str() {
            "elementBoundingBox" => {
                let f: SelectorFields = serde_json::from_value(raw).map_err(invalid)?;
                AssertedEvent::ElementBoundingBox { selector: f.selector }
            }
            "elementCount" => {
                let f: CountFields = serde_json::from_value(raw).map_err(invalid)?;
                AssertedEvent::ElementCount {
                    selector: f.selector,
                    count: f.count,
                }
            }
            "elementText" => {
                let f: TextFields = serde_json::from_value(raw).map_err(invalid)?;
                AssertedEvent::ElementText {
                    selector: f.selector,
                    text: f.text,
                }
            }
            "navigation" => {
                let f: NavigationFields = serde_json::from_value(raw).map_err(invalid)?;
                AssertedEvent::Navigation { url: f.url }
            }
            _ => AssertedEvent::Unsupported(kind.clone()),
        };
        Ok(event)
    }
}
