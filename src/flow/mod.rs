pub mod event;
pub mod selector;
pub mod step;
pub mod template;

pub use event::AssertedEvent;
pub use selector::{SelectorFamily, SelectorSpec};
pub use step::{Action, CountOperator, Step, DEFAULT_STEP_TIMEOUT_MS};
pub use template::{preprocess, Inputs};

use crate::Result;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

/// A recorded user flow.
#[derive(Debug, Clone, Deserialize)]
pub struct Flow {
    /// Recording title (optional).
    pub title: Option<String>,

    /// Description of the inputs the flow expects. Surfaced as-is, never validated.
    pub input_schema: Option<Value>,

    /// Steps, replayed in order.
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Flow {
    /// Load a flow from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_inputs(path, &Inputs::new())
    }

    /// Load a flow from a JSON file, substituting inputs first.
    pub fn load_with_inputs<P: AsRef<Path>>(path: P, inputs: &Inputs) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse_with_inputs(&content, inputs)
    }

    /// Parse a flow from JSON text (no inputs).
    pub fn parse(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a flow from JSON text after placeholder substitution.
    pub fn parse_with_inputs(json: &str, inputs: &Inputs) -> Result<Self> {
        Self::parse(&preprocess(json, inputs))
    }

    /// Width and height of the first `setViewport` step, if any.
    pub fn initial_viewport(&self) -> Option<(u32, u32)> {
        self.steps.iter().find_map(|step| match &step.action {
            Action::SetViewport(a) => Some((a.width, a.height)),
            _ => None,
        })
    }
}
