//! Fills a response template from a variables document.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum RenderError {
    #[error("unclosed {{{{#each {0}}}}} block")]
    UnclosedEach(String),

    #[error("{{{{/each}}}} without a matching {{{{#each}}}}")]
    UnexpectedClose,
}

#[derive(Clone, Copy)]
struct Scope<'a> {
    root: &'a Value,
    this: Option<&'a Value>,
    index: Option<usize>,
}

impl<'a> Scope<'a> {
    fn lookup(&self, path: &str) -> Option<&'a Value> {
        let (start, rest) = match path.strip_prefix("this") {
            Some("") => return self.this,
            Some(rest) if rest.starts_with('.') => (self.this?, &rest[1..]),
            _ => (self.root, path),
        };
        rest.split('.').try_fold(start, |value, segment| match value {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    fn text(&self, expr: &str) -> String {
        match expr {
            "@index" => self.index.map(|i| i.to_string()).unwrap_or_default(),
            "@number" => self.index.map(|i| (i + 1).to_string()).unwrap_or_default(),
            path => self.lookup(path).map(value_text).unwrap_or_default(),
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join(", "),
        Value::Object(_) => value.to_string(),
    }
}

/// Renders `template` against `variables`. Unknown paths render as empty text.
pub fn render(template: &str, variables: &Value) -> Result<String, RenderError> {
    render_block(
        template,
        Scope {
            root: variables,
            this: None,
            index: None,
        },
    )
}

fn render_block(src: &str, scope: Scope<'_>) -> Result<String, RenderError> {
    let mut out = String::with_capacity(src.len());
    let mut rest = src;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            out.push_str(&rest[open..]);
            return Ok(out);
        };
        let tag = after[..close].trim();
        let tail = &after[close + 2..];

        if let Some(path) = tag.strip_prefix("#each ") {
            let path = path.trim();
            let (body, remainder) =
                split_each(tail).ok_or_else(|| RenderError::UnclosedEach(path.to_string()))?;
            let body = strip_newline(body);
            if let Some(Value::Array(items)) = scope.lookup(path) {
                for (index, item) in items.iter().enumerate() {
                    let inner = Scope {
                        root: scope.root,
                        this: Some(item),
                        index: Some(index),
                    };
                    out.push_str(&render_block(body, inner)?);
                }
            }
            rest = strip_newline(remainder);
        } else if tag == "/each" {
            return Err(RenderError::UnexpectedClose);
        } else {
            out.push_str(&scope.text(tag));
            rest = tail;
        }
    }

    out.push_str(rest);
    Ok(out)
}

/// Splits at the `{{/each}}` matching an already-consumed `{{#each}}`.
fn split_each(src: &str) -> Option<(&str, &str)> {
    let mut depth = 1usize;
    let mut pos = 0;
    while let Some(found) = src[pos..].find("{{") {
        let at = pos + found;
        let tag_end = src[at..].find("}}")? + at;
        let tag = src[at + 2..tag_end].trim();
        if tag.starts_with("#each ") {
            depth += 1;
        } else if tag == "/each" {
            depth -= 1;
            if depth == 0 {
                return Some((&src[..at], &src[tag_end + 2..]));
            }
        }
        pos = tag_end + 2;
    }
    None
}

fn strip_newline(s: &str) -> &str {
    s.strip_prefix("\r\n")
        .or_else(|| s.strip_prefix('\n'))
        .unwrap_or(s)
}
