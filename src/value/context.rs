use indexmap::IndexMap;
use std::sync::Arc;

use super::TypedValue;
use crate::error::{CompileError, CompileResult};
use crate::shape::{RecordShape, Shape};

/// Typed roots available to a field's resolver program.
#[derive(Debug, Clone)]
pub struct FieldContext {
    /// `$context.arguments`, typed by the field's argument list.
    pub arguments: TypedValue,
    /// `$context.source`, typed by the parent record.
    pub source: TypedValue,
    /// `$context.identity`.
    pub identity: TypedValue,
    /// Shape the field resolves to.
    pub returns: Shape,
}

impl FieldContext {
    /// Roots for `field_name` declared on `parent`.
    pub fn new(parent: &Arc<RecordShape>, field_name: &str) -> CompileResult<Self> {
        let field = parent
            .field(field_name)
            .ok_or_else(|| CompileError::UnknownField {
                record: parent.fqn().unwrap_or("<anonymous>").to_string(),
                field: field_name.to_string(),
            })?;
        let (args, returns) = match field {
            Shape::Function(function) => (function.args.clone(), function.returns.clone()),
            other => (IndexMap::new(), other.clone()),
        };
        Ok(Self {
            arguments: TypedValue::reference(
                Shape::Record(RecordShape::anonymous(args)),
                "$context.arguments",
            )?,
            source: TypedValue::reference(Shape::Record(parent.clone()), "$context.source")?,
            identity: TypedValue::reference(identity_shape(), "$context.identity")?,
            returns,
        })
    }

    /// One argument by name.
    pub fn argument(&self, name: &str) -> CompileResult<TypedValue> {
        self.arguments.field(name)
    }
}

/// Shape of `$context.identity`.
pub fn identity_shape() -> Shape {
    let mut fields = IndexMap::new();
    fields.insert("sub".to_string(), Shape::String);
    fields.insert("username".to_string(), Shape::String);
    fields.insert("sourceIp".to_string(), Shape::list(Shape::String));
    fields.insert("claims".to_string(), Shape::map(Shape::String));
    Shape::Record(RecordShape::anonymous(fields))
}
