//! Typed value handles.
//!
//! A [`TypedValue`] pairs a [`Shape`] with the template [`Expr`] that produces
//! it at runtime. Operators never compute anything: they return new
//! expressions (or statements, for operations that must be executed by the
//! template) typed by the result shape. The rendered expression of any value
//! is valid on the right-hand side of a `#set`.

/// Field context roots (`$context.arguments`, `$context.source`, ...).
pub mod context;
/// Runtime type dispatch over union values.
pub mod matching;
/// Value-level operators.
pub mod ops;

pub use context::FieldContext;
pub use matching::Match;

use crate::error::{CompileError, CompileResult};
use crate::shape::Shape;
use crate::template::{Expr, Literal};

/// Value kind selected from the shape when a value is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Boolean value.
    Boolean,
    /// String value.
    String,
    /// Integer or float.
    Number,
    /// Timestamp value.
    Timestamp,
    /// Binary value.
    Binary,
    /// List value.
    List,
    /// Set value.
    Set,
    /// Map value.
    Map,
    /// Record value.
    Record,
    /// Union value.
    Union,
    /// The absent value.
    Nothing,
    /// Uninhabited value.
    Never,
}

impl Kind {
    /// Kind for a shape; `None` for shapes that are not values (functions).
    pub fn of(shape: &Shape) -> Option<Kind> {
        let kind = match shape {
            Shape::Boolean => Kind::Boolean,
            Shape::String => Kind::String,
            Shape::Integer | Shape::Float => Kind::Number,
            Shape::Timestamp => Kind::Timestamp,
            Shape::Binary => Kind::Binary,
            Shape::List(_) => Kind::List,
            Shape::Set(_) => Kind::Set,
            Shape::Map(_) => Kind::Map,
            Shape::Record(_) => Kind::Record,
            Shape::Union(_) => Kind::Union,
            Shape::Nothing => Kind::Nothing,
            Shape::Never => Kind::Never,
            Shape::Function(_) => return None,
        };
        Some(kind)
    }
}

/// A shape-tagged template expression.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    shape: Shape,
    kind: Kind,
    expr: Expr,
}

impl TypedValue {
    /// Wrap `expr` as a value of `shape`.
    pub fn of(shape: Shape, expr: Expr) -> CompileResult<Self> {
        let kind = Kind::of(&shape).ok_or_else(|| CompileError::NotAValue(shape.to_string()))?;
        Ok(Self { shape, kind, expr })
    }

    /// Reference to a template variable such as `$context.stash.var1`.
    pub fn reference(shape: Shape, name: &str) -> CompileResult<Self> {
        Self::of(shape, Expr::text(name))
    }

    /// Literal value checked structurally against `shape`.
    pub fn literal(shape: Shape, literal: impl Into<Literal>) -> CompileResult<Self> {
        let literal = literal.into();
        check_literal(&shape, &literal, "$")?;
        let expr = Expr::json(literal)?;
        Self::of(shape, expr)
    }

    /// String literal.
    pub fn string(text: impl Into<String>) -> Self {
        Self::scalar(Shape::String, Kind::String, Literal::String(text.into()))
    }

    /// Integer literal.
    pub fn integer(value: i64) -> Self {
        Self::scalar(Shape::Integer, Kind::Number, Literal::Integer(value))
    }

    /// Boolean literal.
    pub fn boolean(value: bool) -> Self {
        Self::scalar(Shape::Boolean, Kind::Boolean, Literal::Boolean(value))
    }

    /// The absent value.
    pub fn nothing() -> Self {
        Self::scalar(Shape::Nothing, Kind::Nothing, Literal::Null)
    }

    /// Current time as reported by the template runtime.
    pub fn now() -> Self {
        Self {
            shape: Shape::Timestamp,
            kind: Kind::Timestamp,
            expr: Expr::text("$util.time.nowISO8601()"),
        }
    }

    fn scalar(shape: Shape, kind: Kind, literal: Literal) -> Self {
        Self {
            shape,
            kind,
            expr: Expr::Json(literal),
        }
    }

    /// Declared shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Kind chosen at construction.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Producing expression.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Consume into the producing expression.
    pub fn into_expr(self) -> Expr {
        self.expr
    }

    /// The literal this value was built from, when it is a constant.
    pub fn as_literal(&self) -> Option<&Literal> {
        self.expr.as_literal()
    }

    /// Same expression viewed as another shape.
    pub fn retyped(&self, shape: Shape) -> CompileResult<Self> {
        Self::of(shape, self.expr.clone())
    }

    /// `$util.toJson(<value>)`.
    pub fn to_json(&self) -> Expr {
        Expr::call("$util.toJson", [self.expr.clone()])
    }

    /// JSON text for a request payload: the literal itself when constant,
    /// `$util.toJson(...)` otherwise.
    pub fn payload(&self) -> Expr {
        match self.as_literal() {
            Some(_) => self.expr.clone(),
            None => self.to_json(),
        }
    }
}

fn mismatch(path: &str, expected: &Shape, literal: &Literal) -> CompileError {
    CompileError::LiteralMismatch {
        path: path.to_string(),
        expected: expected.to_string(),
        found: literal.kind_name().to_string(),
    }
}

/// Structural check of a literal against a shape, reporting the first
/// offending path.
pub(crate) fn check_literal(shape: &Shape, literal: &Literal, path: &str) -> CompileResult<()> {
    match (shape, literal) {
        (Shape::Union(members), _) => {
            if members
                .iter()
                .any(|member| check_literal(member, literal, path).is_ok())
            {
                Ok(())
            } else {
                Err(mismatch(path, shape, literal))
            }
        }
        (Shape::Nothing, Literal::Null)
        | (Shape::String, Literal::String(_))
        | (Shape::Integer, Literal::Integer(_))
        | (Shape::Float, Literal::Float(_) | Literal::Integer(_))
        | (Shape::Boolean, Literal::Boolean(_))
        | (Shape::Timestamp, Literal::Timestamp(_))
        | (Shape::Binary, Literal::Binary(_)) => Ok(()),
        (Shape::Timestamp, Literal::String(text)) => {
            chrono::DateTime::parse_from_rfc3339(text)
                .map(|_| ())
                .map_err(|_| mismatch(path, shape, literal))
        }
        (Shape::List(item) | Shape::Set(item), Literal::List(items)) => items
            .iter()
            .enumerate()
            .try_for_each(|(idx, value)| check_literal(item, value, &format!("{path}[{idx}]"))),
        (Shape::Map(value_shape), Literal::Map(entries)) => entries.iter().try_for_each(
            |(key, value)| check_literal(value_shape, value, &format!("{path}.{key}")),
        ),
        (Shape::Record(record), Literal::Map(entries)) => {
            for (name, field) in record.fields() {
                let field_path = format!("{path}.{name}");
                match entries.get(name) {
                    Some(value) => check_literal(field, value, &field_path)?,
                    None if field.is_nullable() => {}
                    None => {
                        return Err(CompileError::LiteralMismatch {
                            path: field_path,
                            expected: field.to_string(),
                            found: "missing field".to_string(),
                        });
                    }
                }
            }
            match entries.keys().find(|key| record.field(key).is_none()) {
                Some(extra) => Err(CompileError::LiteralMismatch {
                    path: format!("{path}.{extra}"),
                    expected: "no such field".to_string(),
                    found: entries[extra.as_str()].kind_name().to_string(),
                }),
                None => Ok(()),
            }
        }
        _ => Err(mismatch(path, shape, literal)),
    }
}
