//! Type reference syntax used by manifests.
//!
//! `String`, `Int`, `Float`, `Boolean`, `Timestamp` and `Binary` are scalars,
//! `[T]` is a list, `{T}` a set, `<T>` a map and a trailing `?` makes a
//! reference nullable. Any other name must be a catalog record.

use crate::error::{ManifestError, ManifestResult};
use crate::shape::{Shape, TypeCatalog};

fn bad(reference: &str, detail: impl Into<String>) -> ManifestError {
    ManifestError::TypeRef {
        reference: reference.to_string(),
        detail: detail.into(),
    }
}

/// Parse `reference` against `catalog`.
pub fn parse(reference: &str, catalog: &TypeCatalog) -> ManifestResult<Shape> {
    let text = reference.trim();
    if text.is_empty() {
        return Err(bad(reference, "empty reference"));
    }
    if let Some(inner) = text.strip_suffix('?') {
        let shape = parse(inner, catalog).map_err(|_| bad(reference, "bad nullable operand"))?;
        return Ok(Shape::nullable(shape));
    }
    let wrappers: [(char, char, fn(Shape) -> Shape); 3] =
        [('[', ']', Shape::list), ('{', '}', Shape::set), ('<', '>', Shape::map)];
    for (open, close, wrap) in wrappers {
        if let Some(rest) = text.strip_prefix(open) {
            let inner = rest
                .strip_suffix(close)
                .ok_or_else(|| bad(reference, format!("missing closing `{close}`")))?;
            return parse(inner, catalog).map(wrap);
        }
    }
    let shape = match text {
        "String" => Shape::String,
        "Int" => Shape::Integer,
        "Float" => Shape::Float,
        "Boolean" => Shape::Boolean,
        "Timestamp" => Shape::Timestamp,
        "Binary" => Shape::Binary,
        name => match catalog.get(name) {
            Some(record) => Shape::Record(record.clone()),
            None => return Err(bad(reference, "unknown type")),
        },
    };
    Ok(shape)
}
