// SPDX-License-Identifier: MIT

//! Instance-identifier paths (`/module:container/list[key='v']/leaf`).
//!
//! This is deliberately not a general XPath engine — only the restricted
//! grammar §6 names: module-qualified steps, optional list-key predicates.
//! Full expression evaluation (the "XPath library") lives in `sysrepo-yang`.

use serde::{Deserialize, Serialize};

/// A single step in a parsed path: a node name plus zero or more key
/// predicates (`[leaf='value']`) for list instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub module: Option<String>,
    pub name: String,
    pub keys: Vec<(String, String)>,
}

/// A parsed instance-identifier path. Cheap to clone; the canonical string
/// form is kept alongside the parsed segments so error messages and the
/// wire format can echo back exactly what the caller sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataPath {
    raw: String,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("malformed path {0:?}: {1}")]
pub struct PathParseError(pub String, pub String);

impl DataPath {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The leading `module-name` of the first step, e.g. `"example-module"`
    /// for `/example-module:container/...`. `None` if the path has no
    /// module-qualified first step.
    pub fn module_name(&self) -> Option<&str> {
        self.segments().ok()?.first()?.module.as_deref()
    }

    /// Parse into path segments. Returns `PathParseError` for inputs that
    /// don't start with `/` or have unbalanced `[...]` predicates.
    pub fn segments(&self) -> Result<Vec<PathSegment>, PathParseError> {
        let err = |msg: &str| PathParseError(self.raw.clone(), msg.to_string());
        let body = self.raw.strip_prefix('/').ok_or_else(|| err("path must start with '/'"))?;
        if body.is_empty() {
            return Ok(Vec::new());
        }
        let mut segments = Vec::new();
        for step in split_steps(body) {
            segments.push(parse_step(&step, &self.raw)?);
        }
        Ok(segments)
    }

    /// The parent path (all but the last step), or `None` for a root step.
    pub fn parent(&self) -> Option<DataPath> {
        let segs = self.segments().ok()?;
        if segs.len() <= 1 {
            return None;
        }
        Some(rebuild(&segs[..segs.len() - 1]))
    }

    /// True if `self` is `other` or a descendant of `other`.
    pub fn starts_with(&self, other: &DataPath) -> bool {
        self.raw == other.raw || self.raw.starts_with(&format!("{}/", other.raw))
    }
}

impl std::fmt::Display for DataPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl From<&str> for DataPath {
    fn from(s: &str) -> Self {
        DataPath::new(s)
    }
}

impl From<String> for DataPath {
    fn from(s: String) -> Self {
        DataPath::new(s)
    }
}

/// Split a path body on `/` that isn't inside a `[...]` predicate (keys can
/// themselves contain literal `/` inside quotes, e.g. a file-path key).
fn split_steps(body: &str) -> Vec<String> {
    let mut steps = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    let mut in_quote: Option<char> = None;
    for ch in body.chars() {
        match (ch, in_quote) {
            ('\'', None) | ('"', None) => {
                in_quote = Some(ch);
                current.push(ch);
            }
            (c, Some(q)) if c == q => {
                in_quote = None;
                current.push(c);
            }
            ('[', None) => {
                depth += 1;
                current.push('[');
            }
            (']', None) => {
                depth -= 1;
                current.push(']');
            }
            ('/', None) if depth == 0 => {
                steps.push(std::mem::take(&mut current));
            }
            (c, _) => current.push(c),
        }
    }
    if !current.is_empty() {
        steps.push(current);
    }
    steps
}

fn parse_step(step: &str, whole: &str) -> Result<PathSegment, PathParseError> {
    let err = |msg: String| PathParseError(whole.to_string(), msg);
    let bracket = step.find('[');
    let (head, predicates) = match bracket {
        Some(i) => (&step[..i], &step[i..]),
        None => (step, ""),
    };
    let (module, name) = match head.split_once(':') {
        Some((m, n)) => (Some(m.to_string()), n.to_string()),
        None => (None, head.to_string()),
    };
    if name.is_empty() {
        return Err(err(format!("empty node name in step {step:?}")));
    }
    let mut keys = Vec::new();
    let mut rest = predicates;
    while !rest.is_empty() {
        let close = rest.find(']').ok_or_else(|| err(format!("unterminated '[' in step {step:?}")))?;
        let inner = &rest[1..close];
        let (k, v) = inner
            .split_once('=')
            .ok_or_else(|| err(format!("key predicate missing '=' in step {step:?}")))?;
        let v = v.trim_matches(|c| c == '\'' || c == '"');
        keys.push((k.to_string(), v.to_string()));
        rest = &rest[close + 1..];
    }
    Ok(PathSegment { module, name, keys })
}

fn rebuild(segs: &[PathSegment]) -> DataPath {
    let mut out = String::new();
    for seg in segs {
        out.push('/');
        if let Some(m) = &seg.module {
            out.push_str(m);
            out.push(':');
        }
        out.push_str(&seg.name);
        for (k, v) in &seg.keys {
            out.push_str(&format!("[{k}='{v}']"));
        }
    }
    DataPath::new(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_module_qualified_keyed_list_step() {
        let p = DataPath::new("/example-module:container/list[key1='k1'][key2='k2']/leaf");
        let segs = p.segments().unwrap();
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[0].module.as_deref(), Some("example-module"));
        assert_eq!(segs[0].name, "container");
        assert_eq!(segs[1].name, "list");
        assert_eq!(segs[1].keys, vec![("key1".into(), "k1".into()), ("key2".into(), "k2".into())]);
        assert_eq!(segs[2].name, "leaf");
    }

    #[test]
    fn module_name_reads_first_step() {
        let p = DataPath::new("/test-module:location/name");
        assert_eq!(p.module_name(), Some("test-module"));
    }

    #[test]
    fn parent_drops_last_step() {
        let p = DataPath::new("/test-module:location/name");
        assert_eq!(p.parent().unwrap().as_str(), "/test-module:location");
        assert!(DataPath::new("/test-module:location").parent().is_none());
    }

    #[test]
    fn rejects_paths_without_leading_slash() {
        assert!(DataPath::new("test-module:location").segments().is_err());
    }

    #[test]
    fn starts_with_is_prefix_aware_not_substring() {
        let a = DataPath::new("/m:a/b");
        assert!(a.starts_with(&DataPath::new("/m:a")));
        assert!(!DataPath::new("/m:ab").starts_with(&DataPath::new("/m:a")));
    }
}
