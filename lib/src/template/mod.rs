//! Flat `{{token}}` substitution.
//!
//! A [`Template`] is scanned once into text and token segments and then
//! rendered any number of times against a [`PageContext`]. Rendering is a
//! single pass over the segments: a substituted value is copied verbatim and
//! never rescanned, so values can't introduce new substitutions. There are no
//! conditionals, loops, or filters.

mod context;

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use memchr::memmem;
use tracing::warn;

use crate::error::{ErrorDetail, Result};
use crate::data::read_to_string;
use crate::util::has_placeholder;

pub use context::*;

/// What to do about unresolved placeholders.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Missing keys and residual `{{` in the output are errors.
    #[default]
    Strict,
    /// Missing keys are left in place and logged.
    Lenient,
}

impl Mode {
    pub fn from_strict(strict: bool) -> Mode {
        if strict { Mode::Strict } else { Mode::Lenient }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(Box<str>),
    Token(Box<str>),
}

#[derive(Debug, Clone)]
pub struct Template {
    name: Arc<str>,
    segments: Vec<Segment>,
    size_hint: usize,
}

impl Template {
    pub fn parse<N: Into<Arc<str>>>(name: N, source: &str) -> Template {
        Template {
            name: name.into(),
            segments: scan(source),
            size_hint: source.len(),
        }
    }

    pub fn load(path: &Path) -> Result<Template> {
        let source = read_to_string(path)?;
        Ok(Template::parse(path.display().to_string(), &source))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The distinct token names in the template, in order of first use.
    pub fn tokens(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.segments.iter()
            .filter_map(|segment| match segment {
                Segment::Token(name) => Some(&**name),
                Segment::Text(_) => None,
            })
            .filter(|name| seen.insert(*name))
            .collect()
    }

    /// Substitutes every token with its value from `context`.
    ///
    /// In [`Mode::Strict`], fails if the context's key set is invalid, if a
    /// token has no value, or if the output still contains `{{`.
    pub fn render(&self, context: &PageContext, mode: Mode) -> Result<String> {
        if mode == Mode::Strict {
            validate_keys(context.keys())?;
        }

        let mut output = String::with_capacity(self.size_hint + self.size_hint / 2);
        let mut missing = BTreeSet::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => output.push_str(text),
                Segment::Token(key) => match context.get(key) {
                    Some(value) => output.push_str(value),
                    None => {
                        missing.insert(key.to_string());
                        output.push_str("{{");
                        output.push_str(key);
                        output.push_str("}}");
                    }
                }
            }
        }

        if !missing.is_empty() {
            let keys: Vec<String> = missing.into_iter().collect();
            match mode {
                Mode::Strict => return Err(MissingKey { template: self.name.to_string(), keys }.into()),
                Mode::Lenient => warn!(template = %self.name, keys = ?keys, "placeholders without a value"),
            }
        }

        let residue = residual_placeholders(&output);
        if !residue.is_empty() {
            match mode {
                Mode::Strict => return Err(ResidualPlaceholders { source: self.name.to_string(), tokens: residue }.into()),
                Mode::Lenient => warn!(template = %self.name, tokens = ?residue, "rendered output contains `{{{{`"),
            }
        }

        Ok(output)
    }
}

/// Whether `name` can appear between `{{` and `}}` as a placeholder.
pub(crate) fn is_token_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['{', '}', '\n', '\r'])
}

fn scan(source: &str) -> Vec<Segment> {
    let bytes = source.as_bytes();
    let mut segments = vec![];
    let (mut text_start, mut cursor) = (0, 0);
    while let Some(i) = memmem::find(&bytes[cursor..], b"{{") {
        let open = cursor + i;
        let name_start = open + 2;
        let Some(len) = memmem::find(&bytes[name_start..], b"}}") else {
            break;
        };

        let name = &source[name_start..(name_start + len)];
        if !is_token_name(name) {
            cursor = open + 1;
            continue;
        }

        if open > text_start {
            segments.push(Segment::Text(source[text_start..open].into()));
        }

        segments.push(Segment::Token(name.into()));
        cursor = name_start + len + 2;
        text_start = cursor;
    }

    if text_start < source.len() {
        segments.push(Segment::Text(source[text_start..].into()));
    }

    segments
}

/// Every distinct `{{...}}` occurrence left in `output`, or a short excerpt
/// after an unclosed `{{`.
pub fn residual_placeholders(output: &str) -> Vec<String> {
    if !has_placeholder(output) {
        return vec![];
    }

    let bytes = output.as_bytes();
    let mut found = BTreeSet::new();
    for open in memmem::find_iter(bytes, b"{{") {
        let window = &bytes[open..bytes.len().min(open + 64)];
        let residue = match memmem::find(&window[2..], b"}}") {
            Some(len) => output[open..(open + len + 4)].to_string(),
            None => output[open..].chars().take(18).collect(),
        };

        found.insert(residue);
    }

    found.into_iter().collect()
}

/// Checks that `keys` can be substituted independently of one another.
///
/// No key may be empty or contain braces or newlines, and no key's delimited
/// form `{{key}}` may be a prefix of another's.
pub fn validate_keys<'a, I>(keys: I) -> Result<(), KeyConflict>
    where I: IntoIterator<Item = &'a str>
{
    let keys: Vec<&str> = keys.into_iter().collect();
    let mut delimited: Vec<String> = keys.iter().map(|k| format!("{{{{{k}}}}}")).collect();
    delimited.sort_unstable();
    for pair in delimited.windows(2) {
        if pair[1].starts_with(&pair[0]) {
            return Err(KeyConflict::Prefix { key: pair[0].clone(), of: pair[1].clone() });
        }
    }

    match keys.into_iter().find(|key| !is_token_name(key)) {
        Some(key) => Err(KeyConflict::Invalid(key.to_string())),
        None => Ok(()),
    }
}

/// Template tokens with no value in the page context.
#[derive(Debug)]
pub struct MissingKey {
    pub template: String,
    pub keys: Vec<String>,
}

impl fmt::Display for MissingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} template placeholder(s) have no value", self.keys.len())
    }
}

impl ErrorDetail for MissingKey {
    fn context(&self) -> Vec<(Option<String>, String)> {
        vec![
            (Some("template".into()), self.template.clone()),
            (Some("keys".into()), self.keys.join(", ")),
        ]
    }
}

/// `{{` left in rendered output.
#[derive(Debug)]
pub struct ResidualPlaceholders {
    pub source: String,
    pub tokens: Vec<String>,
}

impl fmt::Display for ResidualPlaceholders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unresolved placeholders in output")
    }
}

impl ErrorDetail for ResidualPlaceholders {
    fn context(&self) -> Vec<(Option<String>, String)> {
        vec![
            (Some("source".into()), self.source.clone()),
            (Some("tokens".into()), self.tokens.join(" ")),
        ]
    }
}

/// A page context key set that can't be substituted safely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyConflict {
    Invalid(String),
    Prefix { key: String, of: String },
}

impl fmt::Display for KeyConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyConflict::Invalid(key) => write!(f, "invalid placeholder key {key:?}"),
            KeyConflict::Prefix { key, of } => write!(f, "placeholder {key} is a prefix of {of}"),
        }
    }
}

impl ErrorDetail for KeyConflict { }

#[cfg(test)]
mod tests {
    use super::*;

    fn context(pairs: &[(&str, &str)]) -> PageContext {
        let mut context = PageContext::new();
        context.extend(Layer::Normalized, pairs.iter().copied());
        context
    }

    #[test]
    fn substitutes_every_occurrence() {
        let template = Template::parse("t", "<h1>{{ville}}</h1><p>{{ville}} ({{code_postal}})</p>");
        let output = template.render(&context(&[("ville", "Albi"), ("code_postal", "81000")]), Mode::Strict);
        assert_eq!(output.unwrap(), "<h1>Albi</h1><p>Albi (81000)</p>");
        assert_eq!(template.tokens(), ["ville", "code_postal"]);
    }

    #[test]
    fn values_are_not_rescanned() {
        let template = Template::parse("t", "{{a}}|{{b}}");
        let lenient = template.render(&context(&[("a", "{{b}}"), ("b", "B")]), Mode::Lenient).unwrap();
        assert_eq!(lenient, "{{b}}|B");

        let strict = template.render(&context(&[("a", "{{b}}"), ("b", "B")]), Mode::Strict).unwrap_err();
        assert!(strict.to_string().contains("unresolved placeholders in output"));
    }

    #[test]
    fn missing_keys_are_errors_when_strict() {
        let template = Template::parse("page.html", "{{ville}} {{telephone}} {{quartiers}}");
        let e = template.render(&context(&[("ville", "Albi")]), Mode::Strict).unwrap_err();
        let rendered = e.to_string();
        assert!(rendered.contains("2 template placeholder(s) have no value"));
        assert!(rendered.contains("keys: quartiers, telephone"));

        let output = template.render(&context(&[("ville", "Albi")]), Mode::Lenient).unwrap();
        assert_eq!(output, "Albi {{telephone}} {{quartiers}}");
    }

    #[test]
    fn scanner_ignores_non_tokens() {
        let template = Template::parse("t", "a {{{ville}}} { b } {{\nx}} {{}}");
        assert_eq!(template.tokens(), ["ville"]);

        let output = template.render(&context(&[("ville", "Albi")]), Mode::Lenient).unwrap();
        assert_eq!(output, "a {Albi} { b } {{\nx}} {{}}");
    }

    #[test]
    fn empty_values_are_substituted() {
        let template = Template::parse("t", "[{{fait_local}}]");
        assert_eq!(template.render(&context(&[("fait_local", "")]), Mode::Strict).unwrap(), "[]");
    }

    #[test]
    fn residue_is_reported() {
        assert!(residual_placeholders("<p>clean</p>").is_empty());
        assert_eq!(residual_placeholders("a {{x}} b {{x}} {{y}}"), ["{{x}}", "{{y}}"]);
        assert_eq!(residual_placeholders("tail {{unclosed"), ["{{unclosed"]);
    }

    #[test]
    fn key_sets_are_validated() {
        assert!(validate_keys(["ville", "ville_slug", "slug"]).is_ok());
        assert_eq!(
            validate_keys(["ville", "ville}}_slug"]),
            Err(KeyConflict::Prefix { key: "{{ville}}".into(), of: "{{ville}}_slug}}".into() })
        );

        assert_eq!(validate_keys(["ville", ""]), Err(KeyConflict::Invalid("".into())));
        assert_eq!(validate_keys(["{{x"]), Err(KeyConflict::Invalid("{{x".into())));

        let mut bad = PageContext::new();
        bad.insert(Layer::Record, "a}}b", "x").insert(Layer::Record, "a", "y");
        assert!(Template::parse("t", "{{a}}").render(&bad, Mode::Strict).is_err());
    }
}
