//! Program templates
//!
//! Source text for the generated programs, with `{{name}}` placeholders that
//! are resolved in a single pass when a program is constructed.

use once_cell::sync::Lazy;

pub const EXIT_CODE: &str = "exitCode";
pub const PORT: &str = "port";
pub const STATUS_CODE: &str = "statusCode";
pub const STATUS_MESSAGE: &str = "statusMessage";
pub const RAW_DELIMITER: &str = "rawDelimiter";

/// Console program: exits immediately with the configured code.
pub static CONSOLE: Lazy<Template> =
    Lazy::new(|| Template::parse("console", include_str!("console.tmpl")));

/// Web server program: answers every request with a fixed status.
pub static WEB_SERVER: Lazy<Template> =
    Lazy::new(|| Template::parse("webserver", include_str!("webserver.tmpl")));

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

/// A parsed template.
#[derive(Debug, Clone)]
pub struct Template {
    name: &'static str,
    segments: Vec<Segment<'static>>,
}

impl Template {
    pub fn parse(name: &'static str, text: &'static str) -> Self {
        Self {
            name,
            segments: tokenize(text),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Distinct placeholder names, in order of first appearance.
    pub fn placeholders(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Placeholder(name) = segment {
                if !names.contains(name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Substitute placeholders with `values`. Substituted text is never
    /// re-scanned; a placeholder with no value is emitted unchanged.
    pub fn render(&self, values: &[(&str, String)]) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    match values.iter().find(|(key, _)| key == name) {
                        Some((_, value)) => out.push_str(value),
                        None => {
                            out.push_str("{{");
                            out.push_str(name);
                            out.push_str("}}");
                        }
                    }
                }
            }
        }
        out
    }
}

/// Placeholder tokens still present in `text`.
pub fn unresolved_placeholders(text: &str) -> Vec<&str> {
    tokenize(text)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name),
            Segment::Text(_) => None,
        })
        .collect()
}

/// The `#` run that lets `text` sit inside a raw string literal: one longer
/// than the longest `"#...` sequence in `text`.
pub fn raw_delimiter(text: &str) -> String {
    let longest = text
        .split('"')
        .skip(1)
        .map(|after_quote| after_quote.chars().take_while(|&c| c == '#').count())
        .max()
        .unwrap_or(0);
    "#".repeat(longest + 1)
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn tokenize(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = text;
    let mut pending = 0;

    while let Some(open) = rest[pending..].find("{{") {
        let open = pending + open;
        let after_open = &rest[open + 2..];
        match after_open.find("}}") {
            Some(close) if is_placeholder_name(&after_open[..close]) => {
                if open > 0 {
                    segments.push(Segment::Text(&rest[..open]));
                }
                segments.push(Segment::Placeholder(&after_open[..close]));
                rest = &after_open[close + 2..];
                pending = 0;
            }
            // Not a placeholder; keep the braces as text and scan past them.
            _ => pending = open + 2,
        }
    }

    if !rest.is_empty() {
        segments.push(Segment::Text(rest));
    }
    segments
}
