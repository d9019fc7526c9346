//! Markdown documents with a leading YAML frontmatter block.
//!
//! A block starts when the first line is exactly `---` and ends at the next
//! line that is exactly `---`. Everything after is the body, whitespace
//! trimmed. Rather than returning "nothing" on failure, parsing yields a
//! [`Frontmatter`] variant describing what went wrong so that the validator
//! can report distinct rules and the sync can explain a skipped page.

use chrono::NaiveDate;
use serde_yaml::{Mapping, Value};

pub const DELIMITER: &str = "---";

/// Fields every page must declare.
pub const REQUIRED_FIELDS: [&str; 6] = ["title", "order", "category", "tags", "last_updated", "author"];

/// Date layout for `last_updated`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub frontmatter: Frontmatter,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frontmatter {
    /// The file does not start with a delimiter line.
    Absent,
    /// Opening delimiter without a closing one.
    Unterminated,
    /// The block is present but holds no data.
    Empty,
    /// The block is not valid YAML, or is not a mapping.
    Malformed { raw: String, error: String },
    Present(FrontmatterMap),
}

/// A parsed frontmatter mapping. Field access is lenient; use
/// [`FrontmatterMap::validate`] for the typed record.
#[derive(Debug, Clone, PartialEq)]
pub struct FrontmatterMap(pub Mapping);

/// Typed page metadata with all required fields present and well formed.
#[derive(Debug, Clone, PartialEq)]
pub struct PageMeta {
    pub title: String,
    pub order: Value,
    pub category: String,
    pub tags: Vec<String>,
    pub last_updated: NaiveDate,
    pub author: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldProblem {
    Missing(&'static str),
    BadDate(String),
}

impl Document {
    pub fn parse(text: &str) -> Self {
        let Some((raw, body)) = split_block(text) else {
            let frontmatter = if starts_with_delimiter(text) {
                Frontmatter::Unterminated
            } else {
                Frontmatter::Absent
            };
            return Document {
                frontmatter,
                body: text.trim().to_string(),
            };
        };

        if raw.trim().is_empty() {
            return Document {
                frontmatter: Frontmatter::Empty,
                body: body.trim().to_string(),
            };
        }

        let frontmatter = match serde_yaml::from_str::<Value>(raw) {
            Ok(Value::Null) => Frontmatter::Empty,
            Ok(Value::Mapping(map)) if map.is_empty() => Frontmatter::Empty,
            Ok(Value::Mapping(map)) => Frontmatter::Present(FrontmatterMap(map)),
            Ok(other) => Frontmatter::Malformed {
                raw: raw.to_string(),
                error: format!("expected a mapping, found {}", value_kind(&other)),
            },
            Err(e) => Frontmatter::Malformed {
                raw: raw.to_string(),
                error: e.to_string(),
            },
        };

        Document {
            frontmatter,
            body: body.trim().to_string(),
        }
    }

    pub fn metadata(&self) -> Option<&FrontmatterMap> {
        match &self.frontmatter {
            Frontmatter::Present(map) => Some(map),
            _ => None,
        }
    }
}

impl Frontmatter {
    /// Human readable reason why no usable metadata is available.
    pub fn problem(&self) -> Option<String> {
        match self {
            Frontmatter::Present(_) => None,
            Frontmatter::Absent => Some("Missing frontmatter section".to_string()),
            Frontmatter::Unterminated => Some("Invalid frontmatter format".to_string()),
            Frontmatter::Empty => Some("Empty frontmatter".to_string()),
            Frontmatter::Malformed { error, .. } => {
                Some(format!("Failed to parse frontmatter: {error}"))
            }
        }
    }
}

impl FrontmatterMap {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(scalar_to_string)
    }

    pub fn title(&self) -> Option<String> {
        self.string("title").filter(|t| !t.trim().is_empty())
    }

    /// Declared tags. A single scalar is treated as a one-element list.
    pub fn tags(&self) -> Vec<String> {
        match self.get("tags") {
            Some(Value::Sequence(items)) => items.iter().filter_map(scalar_to_string).collect(),
            Some(value) => scalar_to_string(value).into_iter().collect(),
            None => Vec::new(),
        }
    }

    pub fn last_updated(&self) -> Option<Result<NaiveDate, String>> {
        let raw = self.get("last_updated")?;
        let text = scalar_to_string(raw).unwrap_or_default();
        Some(NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|_| text))
    }

    /// Lists every problem with the required fields, in [`REQUIRED_FIELDS`] order.
    pub fn problems(&self) -> Vec<FieldProblem> {
        let mut problems: Vec<FieldProblem> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| !self.contains(field))
            .map(FieldProblem::Missing)
            .collect();
        if let Some(Err(raw)) = self.last_updated() {
            problems.push(FieldProblem::BadDate(raw));
        }
        problems
    }

    pub fn validate(&self) -> Result<PageMeta, Vec<FieldProblem>> {
        let problems = self.problems();
        if !problems.is_empty() {
            return Err(problems);
        }
        let last_updated = match self.last_updated() {
            Some(Ok(date)) => date,
            _ => return Err(vec![FieldProblem::Missing("last_updated")]),
        };
        Ok(PageMeta {
            title: self.string("title").unwrap_or_default(),
            order: self.get("order").cloned().unwrap_or(Value::Null),
            category: self.string("category").unwrap_or_default(),
            tags: self.tags(),
            last_updated,
            author: self.string("author").unwrap_or_default(),
        })
    }
}

fn starts_with_delimiter(text: &str) -> bool {
    text.lines().next() == Some(DELIMITER)
}

/// Splits `text` into (raw frontmatter, body) when it carries a complete block.
pub fn split_block(text: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    let mut block_start = None;
    for line in text.split_inclusive('\n') {
        let is_delimiter = line.trim_end_matches(['\n', '\r']) == DELIMITER;
        match block_start {
            None if is_delimiter => block_start = Some(offset + line.len()),
            None => return None,
            Some(start) if is_delimiter => {
                return Some((&text[start..offset], &text[offset + line.len()..]));
            }
            Some(_) => {}
        }
        offset += line.len();
    }
    None
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
