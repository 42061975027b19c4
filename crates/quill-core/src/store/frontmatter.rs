//! YAML front matter
//!
//! A record file is an optional `---` fenced YAML mapping followed by the
//! markdown body. Key order is preserved across parse and render.

use serde_yaml::{Mapping, Value};

const FENCE: &str = "---";

/// A parsed record file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatterDoc {
    pub header: Mapping,
    pub body: String,
}

impl FrontMatterDoc {
    pub fn new(header: Mapping, body: impl Into<String>) -> Self {
        Self {
            header,
            body: body.into(),
        }
    }

    /// Split a file into header and body
    ///
    /// Text without an opening fence, or with an opening fence that is
    /// never closed, is all body.
    pub fn parse(text: &str) -> Result<Self, serde_yaml::Error> {
        let Some((yaml, body)) = split_fenced(text) else {
            return Ok(Self::new(Mapping::new(), text));
        };

        let header = if yaml.trim().is_empty() {
            Mapping::new()
        } else {
            match serde_yaml::from_str::<Value>(yaml)? {
                Value::Mapping(mapping) => mapping,
                Value::Null => Mapping::new(),
                other => {
                    return Err(serde::de::Error::custom(format!(
                        "expected a mapping, found {}",
                        kind_name(&other)
                    )))
                }
            }
        };

        Ok(Self::new(header, body.trim_start_matches(['\r', '\n'])))
    }

    /// Header block followed by the body
    pub fn render(&self) -> Result<String, serde_yaml::Error> {
        if self.header.is_empty() {
            return Ok(self.body.clone());
        }

        let yaml = serde_yaml::to_string(&self.header)?;
        let mut out = format!("{FENCE}\n{yaml}{FENCE}\n");
        let body = self.body.trim_end();
        if !body.is_empty() {
            out.push('\n');
            out.push_str(body);
            out.push('\n');
        }
        Ok(out)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.header.get(key)
    }

    /// String value of a key; numbers and booleans are not coerced
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Set a key, keeping its position if it already exists
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.header.insert(Value::String(key.to_string()), value.into());
    }
}

fn split_fenced(text: &str) -> Option<(&str, &str)> {
    let rest = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FENCE {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
