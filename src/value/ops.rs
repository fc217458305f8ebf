use super::{Kind, TypedValue};
use crate::error::{CompileError, CompileResult};
use crate::program::{StashScope, Statement};
use crate::shape::Shape;
use crate::template::{Expr, Literal};

/// Arithmetic operators; results are always stashed before reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
}

impl ArithOp {
    fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Rem => "%",
        }
    }
}

fn unsupported(op: &'static str, value: &TypedValue) -> CompileError {
    CompileError::Operator {
        op,
        shape: value.shape().to_string(),
    }
}

fn boolean(expr: Expr) -> TypedValue {
    TypedValue {
        shape: Shape::Boolean,
        kind: Kind::Boolean,
        expr,
    }
}

// Compound operands are parenthesized so operator precedence never leaks.
fn operand(value: &TypedValue) -> Expr {
    let text = value.expr().to_text();
    if text.contains(' ') && value.as_literal().is_none() {
        value.expr().parens()
    } else {
        value.expr().clone()
    }
}

impl TypedValue {
    fn require(&self, op: &'static str, kinds: &[Kind]) -> CompileResult<()> {
        if kinds.contains(&self.kind) {
            Ok(())
        } else {
            Err(unsupported(op, self))
        }
    }

    /// `self == other`.
    pub fn equals(&self, other: &TypedValue) -> TypedValue {
        boolean(Expr::binary(&operand(self), "==", &operand(other)))
    }

    /// `self != other`.
    pub fn not_equals(&self, other: &TypedValue) -> TypedValue {
        boolean(Expr::binary(&operand(self), "!=", &operand(other)))
    }

    fn compare(&self, op: &'static str, other: &TypedValue) -> CompileResult<TypedValue> {
        self.require(op, &[Kind::Number, Kind::Timestamp, Kind::String])?;
        if other.kind != self.kind {
            return Err(unsupported(op, other));
        }
        Ok(boolean(Expr::binary(&operand(self), op, &operand(other))))
    }

    /// `self > other`.
    pub fn gt(&self, other: &TypedValue) -> CompileResult<TypedValue> {
        self.compare(">", other)
    }

    /// `self >= other`.
    pub fn ge(&self, other: &TypedValue) -> CompileResult<TypedValue> {
        self.compare(">=", other)
    }

    /// `self < other`.
    pub fn lt(&self, other: &TypedValue) -> CompileResult<TypedValue> {
        self.compare("<", other)
    }

    /// `self <= other`.
    pub fn le(&self, other: &TypedValue) -> CompileResult<TypedValue> {
        self.compare("<=", other)
    }

    /// Boolean conjunction.
    pub fn and(&self, other: &TypedValue) -> CompileResult<TypedValue> {
        self.require("&&", &[Kind::Boolean])?;
        other.require("&&", &[Kind::Boolean])?;
        Ok(boolean(Expr::binary(&operand(self), "&&", &operand(other))))
    }

    /// Boolean disjunction.
    pub fn or(&self, other: &TypedValue) -> CompileResult<TypedValue> {
        self.require("||", &[Kind::Boolean])?;
        other.require("||", &[Kind::Boolean])?;
        Ok(boolean(Expr::binary(&operand(self), "||", &operand(other))))
    }

    /// Boolean negation.
    pub fn not(&self) -> CompileResult<TypedValue> {
        self.require("!", &[Kind::Boolean])?;
        Ok(boolean(Expr::concat([Expr::text("!"), operand(self)])))
    }

    /// Runtime null test.
    pub fn is_null(&self) -> TypedValue {
        boolean(Expr::call("$util.isNull", [self.expr.clone()]))
    }

    /// Upper-cased string.
    pub fn upper(&self) -> CompileResult<TypedValue> {
        self.require("toUpperCase", &[Kind::String])?;
        Ok(TypedValue {
            shape: Shape::String,
            kind: Kind::String,
            expr: self.expr.method("toUpperCase", []),
        })
    }

    /// Lower-cased string.
    pub fn lower(&self) -> CompileResult<TypedValue> {
        self.require("toLowerCase", &[Kind::String])?;
        Ok(TypedValue {
            shape: Shape::String,
            kind: Kind::String,
            expr: self.expr.method("toLowerCase", []),
        })
    }

    /// String length or collection size.
    pub fn size(&self) -> CompileResult<TypedValue> {
        let expr = match self.kind {
            Kind::String => self.expr.method("length", []),
            Kind::List | Kind::Set | Kind::Map => self.expr.method("size", []),
            _ => return Err(unsupported("size", self)),
        };
        Ok(TypedValue {
            shape: Shape::Integer,
            kind: Kind::Number,
            expr,
        })
    }

    /// Emptiness test for strings and collections.
    pub fn is_empty(&self) -> CompileResult<TypedValue> {
        self.require(
            "isEmpty",
            &[Kind::String, Kind::List, Kind::Set, Kind::Map],
        )?;
        Ok(boolean(self.expr.method("isEmpty", [])))
    }

    /// Record field (`<self>.<name>`). Nullable records yield nullable fields.
    pub fn field(&self, name: &str) -> CompileResult<TypedValue> {
        let (record, nullable) = match (&self.shape, self.shape.without_nothing()) {
            (Shape::Record(record), _) => (record.clone(), false),
            (Shape::Union(_), Some(Shape::Record(record))) => (record, true),
            _ => return Err(unsupported("field access", self)),
        };
        let field_shape = record
            .field(name)
            .cloned()
            .ok_or_else(|| CompileError::UnknownField {
                record: self.shape.to_string(),
                field: name.to_string(),
            })?;
        let shape = if nullable {
            Shape::nullable(field_shape)
        } else {
            field_shape
        };
        // Constant records stay constant field by field.
        if let Some(Literal::Map(entries)) = self.as_literal() {
            let literal = entries.get(name).cloned().unwrap_or(Literal::Null);
            return TypedValue::of(shape, Expr::Json(literal));
        }
        TypedValue::of(shape, self.expr.dot(name))
    }

    /// One value per declared record field.
    pub fn fields(&self) -> CompileResult<Vec<(String, TypedValue)>> {
        let Shape::Record(record) = &self.shape else {
            return Err(unsupported("fields", self));
        };
        record
            .fields()
            .map(|(name, _)| Ok((name.clone(), self.field(name)?)))
            .collect()
    }

    /// List element at `index`, or map entry at `key`.
    pub fn get(&self, key: &TypedValue) -> CompileResult<TypedValue> {
        match &self.shape {
            Shape::List(item) => {
                key.require("get", &[Kind::Number])?;
                TypedValue::of((**item).clone(), self.expr.method("get", [key.expr.clone()]))
            }
            Shape::Map(value) => {
                key.require("get", &[Kind::String])?;
                TypedValue::of(
                    Shape::nullable((**value).clone()),
                    self.expr.method("get", [key.expr.clone()]),
                )
            }
            _ => Err(unsupported("get", self)),
        }
    }

    /// Membership test: map keys, set and list items.
    pub fn has(&self, key: &TypedValue) -> CompileResult<TypedValue> {
        let method = match self.kind {
            Kind::Map => "containsKey",
            Kind::Set | Kind::List => "contains",
            _ => return Err(unsupported("has", self)),
        };
        Ok(boolean(self.expr.method(method, [key.expr.clone()])))
    }

    /// Append to a list or insert into a set. The mutation is a statement.
    pub fn add(&self, item: &TypedValue) -> CompileResult<Statement> {
        self.require("add", &[Kind::List, Kind::Set])?;
        Ok(quiet(self.expr.method("add", [item.expr.clone()])))
    }

    /// Insert a map entry. The mutation is a statement.
    pub fn put(&self, key: &TypedValue, value: &TypedValue) -> CompileResult<Statement> {
        self.require("put", &[Kind::Map])?;
        key.require("put", &[Kind::String])?;
        Ok(quiet(
            self.expr
                .method("put", [key.expr.clone(), value.expr.clone()]),
        ))
    }

    /// Arithmetic; the result is stashed into a fresh local before reuse.
    pub fn arith(&self, op: ArithOp, other: &TypedValue) -> CompileResult<Statement> {
        self.require(op.symbol_name(), &[Kind::Number])?;
        other.require(op.symbol_name(), &[Kind::Number])?;
        let shape = match (&self.shape, &other.shape) {
            (Shape::Integer, Shape::Integer) => Shape::Integer,
            _ => Shape::Float,
        };
        let expr = Expr::binary(&operand(self), op.symbol(), &operand(other));
        Ok(Statement::Stash {
            value: TypedValue::of(shape, expr)?,
            id: None,
            scope: Some(StashScope::Local),
        })
    }

    /// Stash statement for this value with the default scope.
    pub fn stash(&self) -> Statement {
        Statement::stash(self.clone())
    }
}

impl ArithOp {
    fn symbol_name(self) -> &'static str {
        match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Mul => "mul",
            ArithOp::Div => "div",
            ArithOp::Rem => "rem",
        }
    }
}

fn quiet(call: Expr) -> Statement {
    Statement::write([Expr::call("$util.qr", [call]), Expr::line()])
}
