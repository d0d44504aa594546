//! URI template engine (spec component H).
//!
//! A template such as `example://{name}/{version:float=1.0}/{id:int?}`
//! compiles once into a sequence of literal and placeholder segments.
//! [`Template::matches`] and [`Template::extract`] consume a concrete URI
//! left-to-right against that sequence; [`Template::expand`] runs it in
//! reverse, filling placeholders from a params object.
//!
//! Placeholder grammar: `{name(:type)?(:pattern:glob)?((=default)|?)?}`.
//! `type` is one of `int`, `float`, `bool`, `string` (the default). A
//! `pattern:` glob restricts the captured text; `*` matches one or more
//! non-slash characters, every other character matches itself literally.
//! `=default` and `?` (bare-optional) are mutually exclusive.
//!
//! A placeholder captures up to the *first* occurrence of the literal text
//! that follows it (or to the end of the URI, if it's the last segment).
//! This departs from a literal "greedy" reading of the spec in favor of the
//! unambiguous choice for the common case of repeated path-separator
//! literals between sibling placeholders — see `DESIGN.md`.

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![deny(unsafe_code)]

use std::fmt;

use mcp_core::error::{McpError, McpResult};
use serde_json::{Map, Value};

/// The type a placeholder's captured text is validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderType {
    /// UTF-8 text, no further validation.
    String,
    /// Parses as `i64`.
    Int,
    /// Parses as `f64`.
    Float,
    /// `"true"` or `"false"`.
    Bool,
}

impl PlaceholderType {
    fn parse(s: &str) -> McpResult<Self> {
        match s {
            "string" => Ok(Self::String),
            "int" => Ok(Self::Int),
            "float" => Ok(Self::Float),
            "bool" => Ok(Self::Bool),
            other => Err(McpError::invalid_params(format!(
                "unknown placeholder type '{other}'"
            ))),
        }
    }

    fn validate(self, text: &str) -> bool {
        match self {
            Self::String => true,
            Self::Int => text.parse::<i64>().is_ok(),
            Self::Float => text.parse::<f64>().is_ok(),
            Self::Bool => text == "true" || text == "false",
        }
    }
}

/// One `{...}` placeholder, as parsed from the template pattern.
#[derive(Debug, Clone)]
pub struct Placeholder {
    /// Placeholder name, used as the key in `extract`'s result object.
    pub name: String,
    /// Declared type, defaulting to [`PlaceholderType::String`].
    pub ty: PlaceholderType,
    /// Optional glob restricting the captured text.
    pub pattern: Option<String>,
    /// `true` if a missing value resolves to empty rather than an error.
    pub optional: bool,
    /// Literal default substituted when the placeholder is absent from
    /// `expand`'s params (and used as the captured value on an empty match).
    pub default: Option<String>,
}

/// A literal or placeholder piece of a compiled template.
#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Placeholder(Placeholder),
}

/// A compiled URI template.
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl Template {
    /// Parse and compile a template pattern.
    ///
    /// # Errors
    /// Returns [`McpError::InvalidParams`]-kind errors on malformed
    /// placeholder grammar (unbalanced braces, unknown type, or both `=`
    /// and `?` present on the same placeholder).
    pub fn parse(pattern: impl Into<String>) -> McpResult<Self> {
        let source = pattern.into();
        let mut segments = Vec::new();
        let mut rest = source.as_str();
        while let Some(open) = rest.find('{') {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let after_open = &rest[open + 1..];
            let close = after_open
                .find('}')
                .ok_or_else(|| McpError::invalid_params("unbalanced '{' in URI template"))?;
            let inner = &after_open[..close];
            segments.push(Segment::Placeholder(parse_placeholder(inner)?));
            rest = &after_open[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }
        Ok(Self { source, segments })
    }

    /// The original pattern string this template was compiled from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// `true` if `uri` matches this template end to end.
    #[must_use]
    pub fn matches(&self, uri: &str) -> bool {
        self.extract(uri).is_some()
    }

    /// Match `uri` against this template and return the captured
    /// placeholders as a flat JSON object of strings (or `null` for an
    /// absent optional placeholder). Captures are literal substrings, not
    /// type-coerced — callers coerce at use, per spec §4.4.
    #[must_use]
    pub fn extract(&self, uri: &str) -> Option<Map<String, Value>> {
        let mut pos = 0usize;
        let mut out = Map::new();
        for (i, seg) in self.segments.iter().enumerate() {
            match seg {
                Segment::Literal(lit) => {
                    if !uri[pos..].starts_with(lit.as_str()) {
                        return None;
                    }
                    pos += lit.len();
                }
                Segment::Placeholder(ph) => {
                    let next_literal = self.segments[i + 1..].iter().find_map(|s| match s {
                        Segment::Literal(l) if !l.is_empty() => Some(l.as_str()),
                        _ => None,
                    });
                    let remaining = &uri[pos..];
                    let capture_end = match next_literal {
                        Some(lit) => remaining.find(lit)?,
                        None => remaining.len(),
                    };
                    let captured = &remaining[..capture_end];
                    if captured.is_empty() {
                        if ph.optional {
                            out.insert(ph.name.clone(), Value::Null);
                            continue;
                        }
                        if let Some(default) = &ph.default {
                            out.insert(ph.name.clone(), Value::String(default.clone()));
                            continue;
                        }
                        return None;
                    }
                    if let Some(pattern) = &ph.pattern {
                        if !glob_match(pattern, captured) {
                            return None;
                        }
                    } else if captured.contains('/') {
                        // Unpatterned placeholders stop at the next URI
                        // delimiter; a literal slash inside the capture
                        // means this template doesn't actually match.
                        return None;
                    }
                    if !ph.ty.validate(captured) {
                        return None;
                    }
                    out.insert(ph.name.clone(), Value::String(captured.to_string()));
                    pos += captured.len();
                }
            }
        }
        if pos == uri.len() { Some(out) } else { None }
    }

    /// Expand this template into a concrete URI using `params` (and each
    /// placeholder's default, where `params` omits it). No percent-encoding
    /// is applied — callers pre-encode values that need it.
    ///
    /// # Errors
    /// Returns an error if a required placeholder (no default, not
    /// optional) is missing from `params`, or a supplied value fails its
    /// placeholder's type validation.
    pub fn expand(&self, params: &Map<String, Value>) -> McpResult<String> {
        let mut out = String::new();
        for seg in &self.segments {
            match seg {
                Segment::Literal(lit) => out.push_str(lit),
                Segment::Placeholder(ph) => {
                    let resolved = match params.get(&ph.name) {
                        Some(Value::Null) | None => ph.default.clone(),
                        Some(value) => Some(stringify(value)),
                    };
                    match resolved {
                        Some(text) => {
                            if !text.is_empty() && !ph.ty.validate(&text) {
                                return Err(McpError::invalid_params(format!(
                                    "placeholder '{}' value '{text}' is not a valid {:?}",
                                    ph.name, ph.ty
                                )));
                            }
                            out.push_str(&text);
                        }
                        None => {
                            if !ph.optional {
                                return Err(McpError::invalid_params(format!(
                                    "missing required placeholder '{}'",
                                    ph.name
                                )));
                            }
                        }
                    }
                }
            }
        }
        Ok(out)
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_placeholder(inner: &str) -> McpResult<Placeholder> {
    if inner.contains('=') && inner.trim_end().ends_with('?') {
        return Err(McpError::invalid_params(
            "placeholder cannot have both a default and '?'",
        ));
    }
    let (body, optional, default) = if let Some(idx) = inner.find('=') {
        (&inner[..idx], false, Some(inner[idx + 1..].to_string()))
    } else if let Some(stripped) = inner.strip_suffix('?') {
        (stripped, true, None)
    } else {
        (inner, false, None)
    };

    let mut parts = body.split(':');
    let name = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| McpError::invalid_params("placeholder has no name"))?
        .to_string();

    let mut ty = PlaceholderType::String;
    let mut pattern = None;
    let rest: Vec<&str> = parts.collect();
    let mut i = 0;
    while i < rest.len() {
        if rest[i] == "pattern" {
            let glob = rest
                .get(i + 1)
                .ok_or_else(|| McpError::invalid_params("'pattern:' with no glob"))?;
            pattern = Some((*glob).to_string());
            i += 2;
        } else {
            ty = PlaceholderType::parse(rest[i])?;
            i += 1;
        }
    }

    Ok(Placeholder {
        name,
        ty,
        pattern,
        optional,
        default,
    })
}

/// Match `text` against a glob where `*` means "one or more non-slash
/// characters" and every other character is literal.
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == text;
    }
    let Some(first) = parts.first() else {
        return false;
    };
    if !text.starts_with(first) {
        return false;
    }
    let mut pos = first.len();
    for (i, part) in parts.iter().enumerate().skip(1) {
        let is_last = i == parts.len() - 1;
        if is_last {
            if part.is_empty() {
                return text.len() > pos && !text[pos..].contains('/');
            }
            if !text[pos..].ends_with(part) {
                return false;
            }
            let mid_end = text.len() - part.len();
            return mid_end > pos && !text[pos..mid_end].contains('/');
        }
        let search_from = pos + 1;
        if search_from > text.len() {
            return false;
        }
        match text[search_from..].find(part) {
            Some(rel) => {
                let idx = search_from + rel;
                if text[pos..idx].contains('/') {
                    return false;
                }
                pos = idx + part.len();
            }
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expand_uses_defaults_and_empty_optional() {
        let tpl = Template::parse("example://{name}/{version:float=1.0}/{id:int?}").unwrap();
        let mut params = Map::new();
        params.insert("name".to_string(), json!("t"));
        let expanded = tpl.expand(&params).unwrap();
        assert_eq!(expanded, "example://t/1.0/");
    }

    #[test]
    fn matches_a_fully_populated_uri() {
        let tpl = Template::parse("example://{name}/{version:float=1.0}/{id:int?}").unwrap();
        assert!(tpl.matches("example://t/2.5/9"));
    }

    #[test]
    fn extract_returns_literal_captures() {
        let tpl = Template::parse("example://{name}/{version:float=1.0}/{id:int?}").unwrap();
        let got = tpl.extract("example://t/2.5/9").unwrap();
        assert_eq!(got["name"], json!("t"));
        assert_eq!(got["version"], json!("2.5"));
        assert_eq!(got["id"], json!("9"));
    }

    #[test]
    fn expand_then_match_then_extract_round_trips() {
        let tpl = Template::parse("example://{name}/{version:float=1.0}/{id:int?}").unwrap();
        let mut params = Map::new();
        params.insert("name".to_string(), json!("widget"));
        params.insert("version".to_string(), json!("3.1"));
        params.insert("id".to_string(), json!("42"));
        let uri = tpl.expand(&params).unwrap();
        assert!(tpl.matches(&uri));
        let extracted = tpl.extract(&uri).unwrap();
        assert_eq!(extracted["name"], json!("widget"));
        assert_eq!(extracted["version"], json!("3.1"));
        assert_eq!(extracted["id"], json!("42"));
    }

    #[test]
    fn typed_placeholder_rejects_non_matching_capture() {
        let tpl = Template::parse("x://{n:int}").unwrap();
        assert!(!tpl.matches("x://not-a-number"));
        assert!(tpl.matches("x://42"));
    }

    #[test]
    fn missing_required_placeholder_is_an_expand_error() {
        let tpl = Template::parse("x://{required}").unwrap();
        assert!(tpl.expand(&Map::new()).is_err());
    }

    #[test]
    fn default_and_optional_suffix_are_mutually_exclusive() {
        assert!(Template::parse("x://{a=1?}").is_err());
    }

    #[test]
    fn pattern_glob_restricts_capture() {
        let tpl = Template::parse("x://{slug:pattern:item-*}").unwrap();
        assert!(tpl.matches("x://item-42"));
        assert!(!tpl.matches("x://other-42"));
    }

    #[test]
    fn unbalanced_brace_is_a_parse_error() {
        assert!(Template::parse("x://{name").is_err());
    }

    #[test]
    fn literal_only_template_matches_exactly() {
        let tpl = Template::parse("x://static/path").unwrap();
        assert!(tpl.matches("x://static/path"));
        assert!(!tpl.matches("x://static/path/extra"));
    }
}
