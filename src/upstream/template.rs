// Provider URL templates with `{name}` placeholders

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// Parsed URL template.
///
/// Placeholder values are percent-encoded on render, so a prompt containing
/// `&` or `/` cannot change the shape of the provider URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    Unbalanced(usize),
    EmptyPlaceholder(usize),
    UnknownPlaceholder(String),
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::Unbalanced(pos) => write!(f, "unbalanced brace at offset {}", pos),
            TemplateError::EmptyPlaceholder(pos) => write!(f, "empty placeholder at offset {}", pos),
            TemplateError::UnknownPlaceholder(name) => {
                write!(f, "no value supplied for placeholder '{}'", name)
            }
        }
    }
}

impl std::error::Error for TemplateError {}

impl UrlTemplate {
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.char_indices();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, inner) in chars.by_ref() {
                        match inner {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(TemplateError::Unbalanced(pos)),
                            other => name.push(other),
                        }
                    }
                    if !closed {
                        return Err(TemplateError::Unbalanced(pos));
                    }
                    if name.trim().is_empty() {
                        return Err(TemplateError::EmptyPlaceholder(pos));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name.trim().to_string()));
                }
                '}' => return Err(TemplateError::Unbalanced(pos)),
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// Placeholder names in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Fill placeholders from `values`. Every placeholder must have a value.
    pub fn render(&self, values: &[(&str, &str)]) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = values
                        .iter()
                        .find(|(key, _)| key == name)
                        .map(|(_, value)| *value)
                        .ok_or_else(|| TemplateError::UnknownPlaceholder(name.clone()))?;
                    out.push_str(&urlencoding::encode(value));
                }
            }
        }
        Ok(out)
    }
}
