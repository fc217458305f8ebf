use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;

use crate::error::{CompileError, CompileResult};

/// Compile-time constant value, rendered into templates as JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Absent value; renders as `null`.
    Null,
    /// Boolean.
    Boolean(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating-point number (must be finite to render).
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Raw bytes; rendered as a quoted base64 string.
    Binary(Vec<u8>),
    /// Instant; rendered as a quoted ISO-8601 string.
    Timestamp(DateTime<Utc>),
    /// Ordered sequence.
    List(Vec<Literal>),
    /// String-keyed entries in insertion order (records and maps).
    Map(IndexMap<String, Literal>),
}

impl Literal {
    /// Short kind name used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Literal::Null => "null",
            Literal::Boolean(_) => "boolean",
            Literal::Integer(_) => "integer",
            Literal::Float(_) => "float",
            Literal::String(_) => "string",
            Literal::Binary(_) => "binary",
            Literal::Timestamp(_) => "timestamp",
            Literal::List(_) => "list",
            Literal::Map(_) => "map",
        }
    }

    /// Reject anything the JSON encoder cannot represent.
    pub fn validate(&self) -> CompileResult<()> {
        self.validate_at("$")
    }

    fn validate_at(&self, path: &str) -> CompileResult<()> {
        match self {
            Literal::Float(value) if !value.is_finite() => {
                Err(CompileError::UnclassifiableLiteral {
                    path: path.to_string(),
                    detail: format!("non-finite number {value}"),
                })
            }
            Literal::List(items) => items
                .iter()
                .enumerate()
                .try_for_each(|(idx, item)| item.validate_at(&format!("{path}[{idx}]"))),
            Literal::Map(entries) => entries
                .iter()
                .try_for_each(|(key, value)| value.validate_at(&format!("{path}.{key}"))),
            _ => Ok(()),
        }
    }

    /// Scalar JSON text, or `None` for lists and maps.
    pub(crate) fn scalar_json(&self) -> Option<String> {
        let text = match self {
            Literal::Null => "null".to_string(),
            Literal::Boolean(flag) => flag.to_string(),
            Literal::Integer(num) => num.to_string(),
            Literal::Float(num) => serde_json::Number::from_f64(*num)
                .map(|n| n.to_string())
                .unwrap_or_else(|| "null".to_string()),
            Literal::String(text) => quote(text),
            Literal::Binary(bytes) => quote(&STANDARD.encode(bytes)),
            Literal::Timestamp(at) => quote(&at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Literal::List(_) | Literal::Map(_) => return None,
        };
        Some(text)
    }
}

pub(crate) fn quote(text: &str) -> String {
    // serde_json never fails to encode a plain string.
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{text}\""))
}

impl From<serde_json::Value> for Literal {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Literal::Null,
            Value::Bool(flag) => Literal::Boolean(flag),
            Value::Number(num) => match num.as_i64() {
                Some(int) => Literal::Integer(int),
                None => Literal::Float(num.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(text) => Literal::String(text),
            Value::Array(items) => Literal::List(items.into_iter().map(Literal::from).collect()),
            Value::Object(entries) => Literal::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Literal::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::String(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::String(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Integer(value)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Float(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Boolean(value)
    }
}

impl From<DateTime<Utc>> for Literal {
    fn from(value: DateTime<Utc>) -> Self {
        Literal::Timestamp(value)
    }
}

impl<T: Into<Literal>> From<Option<T>> for Literal {
    fn from(value: Option<T>) -> Self {
        value.map_or(Literal::Null, Into::into)
    }
}
