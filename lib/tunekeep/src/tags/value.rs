use serde::{Deserialize, Serialize};
use std::fmt;

/// The shape of value a tag carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Text,
    List,
    Number,
    Flag,
    Binary,
}

/// A tag's value.
///
/// A value is *significant* when [`has_value`](TagValue::has_value) holds. Records never store
/// insignificant values, so an empty string, an empty list, zero and `false` all mean "absent".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum TagValue {
    Text(String),
    List(Vec<String>),
    Number(u32),
    Flag(bool),
    Binary(Vec<u8>),
}

impl TagValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            TagValue::Text(_) => ValueKind::Text,
            TagValue::List(_) => ValueKind::List,
            TagValue::Number(_) => ValueKind::Number,
            TagValue::Flag(_) => ValueKind::Flag,
            TagValue::Binary(_) => ValueKind::Binary,
        }
    }

    pub fn has_value(&self) -> bool {
        match self {
            TagValue::Text(text) => !text.trim().is_empty(),
            TagValue::List(items) => items.iter().any(|item| !item.trim().is_empty()),
            TagValue::Number(n) => *n != 0,
            TagValue::Flag(flag) => *flag,
            TagValue::Binary(bytes) => !bytes.is_empty(),
        }
    }

    /// Equality used to deduplicate lookup candidates: text compares case-insensitively and
    /// ignoring surrounding whitespace, lists element-wise in order.
    pub fn matches(&self, other: &TagValue) -> bool {
        match (self, other) {
            (TagValue::Text(a), TagValue::Text(b)) => same_text(a, b),
            (TagValue::List(a), TagValue::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(a, b)| same_text(a, b))
            }
            (a, b) => a == b,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            TagValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            TagValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<u32> {
        match self {
            TagValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            TagValue::Flag(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            TagValue::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// The insignificant value of `kind`.
    pub fn empty(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Text => TagValue::Text(String::new()),
            ValueKind::List => TagValue::List(Vec::new()),
            ValueKind::Number => TagValue::Number(0),
            ValueKind::Flag => TagValue::Flag(false),
            ValueKind::Binary => TagValue::Binary(Vec::new()),
        }
    }
}

fn same_text(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Text(text) => f.write_str(text),
            TagValue::List(items) => f.write_str(&items.join("; ")),
            TagValue::Number(n) => write!(f, "{n}"),
            TagValue::Flag(flag) => write!(f, "{flag}"),
            TagValue::Binary(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        TagValue::Text(value.to_string())
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        TagValue::Text(value)
    }
}

impl From<Vec<String>> for TagValue {
    fn from(value: Vec<String>) -> Self {
        TagValue::List(value)
    }
}

impl From<Vec<&str>> for TagValue {
    fn from(value: Vec<&str>) -> Self {
        TagValue::List(value.into_iter().map(str::to_string).collect())
    }
}

impl From<u32> for TagValue {
    fn from(value: u32) -> Self {
        TagValue::Number(value)
    }
}

impl From<bool> for TagValue {
    fn from(value: bool) -> Self {
        TagValue::Flag(value)
    }
}

impl From<Vec<u8>> for TagValue {
    fn from(value: Vec<u8>) -> Self {
        TagValue::Binary(value)
    }
}
