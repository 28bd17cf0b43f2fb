use regex::Regex;
use std::fmt;

/// URL matcher for navigation assertions.
///
/// A pattern without wildcards must equal the URL exactly. Otherwise it is a glob:
/// `**` matches any run of characters, `*` any run without `/` and `?` one character.
#[derive(Debug, Clone)]
pub struct UrlPattern {
    source: String,
    glob: Option<Regex>,
}

impl UrlPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        let source = pattern.into();
        let glob = if source.contains(['*', '?']) {
            Regex::new(&glob_to_regex(&source)).ok()
        } else {
            None
        };
        Self { source, glob }
    }

    pub fn matches(&self, url: &str) -> bool {
        match self.glob {
            Some(ref re) => re.is_match(url),
            None => self.source == url,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::from("^");
    let mut rest = glob;
    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix("**") {
            out.push_str(".*");
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix('*') {
            out.push_str("[^/]*");
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix('?') {
            out.push('.');
            rest = tail;
        } else {
            let next = rest.find(['*', '?']).unwrap_or(rest.len());
            out.push_str(&regex::escape(&rest[..next]));
            rest = &rest[next..];
        }
    }
    out.push('$');
    out
}
