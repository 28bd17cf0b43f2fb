use serde::de;
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Resolution strategy implied by a recorded selector's prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorFamily {
    /// `aria/...` accessibility-tree queries.
    Aria,
    /// `pierce/...` shadow-piercing CSS.
    Pierce,
    /// `text/...` visible-text queries.
    Text,
    /// `xpath/...` XPath expressions.
    XPath,
    /// Anything else, used as a plain CSS selector.
    Css,
}

impl SelectorFamily {
    /// Whether the resolver skips candidates of this family outright.
    pub fn is_skipped(self) -> bool {
        matches!(self, Self::Aria | Self::Pierce | Self::Text)
    }
}

/// One selector candidate, classified when the flow is parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorSpec {
    pub family: SelectorFamily,
    /// The candidate exactly as recorded.
    pub raw: String,
}

impl SelectorSpec {
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let family = if raw.starts_with("aria") {
            SelectorFamily::Aria
        } else if raw.starts_with("pierce") {
            SelectorFamily::Pierce
        } else if raw.starts_with("text") {
            SelectorFamily::Text
        } else if raw.starts_with("xpath") {
            SelectorFamily::XPath
        } else {
            SelectorFamily::Css
        };
        Self { family, raw }
    }

    /// The selector string handed to the page, or `None` for skipped families.
    ///
    /// XPath candidates drop the recorded 6-character `xpath/` prefix and take the
    /// page's `xpath=` form, so `xpath//div` becomes `xpath=/div`.
    pub fn query(&self) -> Option<String> {
        match self.family {
            SelectorFamily::Aria | SelectorFamily::Pierce | SelectorFamily::Text => None,
            SelectorFamily::XPath => Some(format!("xpath={}", self.raw.get(6..).unwrap_or(""))),
            SelectorFamily::Css => Some(self.raw.clone()),
        }
    }
}

impl fmt::Display for SelectorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Recorded selectors are either a bare string or a chain whose first entry is used.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSelector {
    Single(String),
    Chain(Vec<String>),
}

impl<'de> Deserialize<'de> for SelectorSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawSelector::deserialize(deserializer)? {
            RawSelector::Single(s) => Ok(SelectorSpec::parse(s)),
            RawSelector::Chain(chain) => chain
                .into_iter()
                .next()
                .map(SelectorSpec::parse)
                .ok_or_else(|| de::Error::custom("empty selector chain")),
        }
    }
}
