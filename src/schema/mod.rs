//! GraphQL schema text generation.
//!
//! The walk starts at the root operation records and follows every record
//! reachable through field types, emitting each named record once. Record
//! arguments become `input` blocks. Errors are collected per type; no
//! schema text is produced when any type fails.

/// Field directives and the metadata they come from.
pub mod directive;

pub use directive::{AuthMode, FieldMetadata, SubscriptionSpec};

use indexmap::IndexMap;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::config::CompilerConfig;
use crate::error::SchemaError;
use crate::shape::{RecordShape, Shape};

/// Root operation records.
#[derive(Debug, Clone, Default)]
pub struct SchemaRoots {
    /// Query root.
    pub query: Option<Arc<RecordShape>>,
    /// Mutation root.
    pub mutation: Option<Arc<RecordShape>>,
    /// Subscription root.
    pub subscription: Option<Arc<RecordShape>>,
}

impl SchemaRoots {
    /// Non-empty roots with their operation keyword.
    fn present(&self) -> Vec<(&'static str, &Arc<RecordShape>)> {
        [
            ("query", &self.query),
            ("mutation", &self.mutation),
            ("subscription", &self.subscription),
        ]
        .into_iter()
        .filter_map(|(op, root)| root.as_ref().map(|root| (op, root)))
        .filter(|(_, root)| !root.is_empty())
        .collect()
    }
}

/// Schema writer with per-field directive lists.
#[derive(Debug)]
pub struct SchemaGenerator<'a> {
    config: &'a CompilerConfig,
    directives: HashMap<(String, String), Vec<String>>,
}

struct Walk {
    queue: VecDeque<Arc<RecordShape>>,
    inputs: IndexMap<String, String>,
}

impl<'a> SchemaGenerator<'a> {
    /// Generator without directives.
    pub fn new(config: &'a CompilerConfig) -> Self {
        Self {
            config,
            directives: HashMap::new(),
        }
    }

    /// Attach directives to `type_name.field_name`.
    pub fn add_directives(&mut self, type_name: &str, field_name: &str, directives: Vec<String>) {
        if !directives.is_empty() {
            self.directives
                .insert((type_name.to_string(), field_name.to_string()), directives);
        }
    }

    /// Render the schema reachable from `roots`.
    pub fn generate(&self, roots: &SchemaRoots) -> Result<String, Vec<SchemaError>> {
        let present = roots.present();
        if present.is_empty() {
            return Err(vec![SchemaError::NoRoots]);
        }
        let mut walk = Walk {
            queue: present.iter().map(|(_, root)| Arc::clone(*root)).collect(),
            inputs: IndexMap::new(),
        };
        let mut seen: HashSet<String> = HashSet::new();
        let mut blocks = Vec::new();
        let mut errors = Vec::new();

        while let Some(record) = walk.queue.pop_front() {
            let Some(name) = record.fqn() else {
                errors.push(SchemaError::MissingName {
                    path: "<root>".to_string(),
                });
                continue;
            };
            if !seen.insert(name.to_string()) {
                continue;
            }
            match self.type_block(name, &record, &mut walk) {
                Ok(block) => {
                    tracing::debug!(type_name = name, "emitted type");
                    blocks.push(block);
                }
                Err(mut type_errors) => errors.append(&mut type_errors),
            }
        }
        for name in walk.inputs.keys() {
            if seen.contains(name) {
                errors.push(SchemaError::NameCollision(name.clone()));
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        let mut out = String::from("schema {\n");
        for (op, root) in &present {
            if let Some(name) = root.fqn() {
                out.push_str(&format!("  {op}: {name}\n"));
            }
        }
        out.push_str("}\n");
        for block in blocks.iter().chain(walk.inputs.values()) {
            out.push('\n');
            out.push_str(block);
        }
        Ok(out)
    }

    fn type_block(
        &self,
        name: &str,
        record: &RecordShape,
        walk: &mut Walk,
    ) -> Result<String, Vec<SchemaError>> {
        let mut lines = vec![format!("type {name} {{")];
        let mut errors = Vec::new();
        for (field, shape) in record.fields() {
            let path = format!("{name}.{field}");
            let (args, returns) = match shape {
                Shape::Function(function) => (Some(&function.args), &function.returns),
                other => (None, other),
            };
            let arguments = match args {
                Some(args) if !args.is_empty() => match self.arguments(args, &path, walk) {
                    Ok(text) => text,
                    Err(error) => {
                        errors.push(error);
                        continue;
                    }
                },
                _ => String::new(),
            };
            let annotation = match self.annotation(returns, &path, walk) {
                Ok(annotation) => annotation,
                Err(error) => {
                    errors.push(error);
                    continue;
                }
            };
            let mut line = format!("  {field}{arguments}: {annotation}");
            if let Some(directives) = self.directives.get(&(name.to_string(), field.clone())) {
                for directive in directives {
                    line.push(' ');
                    line.push_str(directive);
                }
            }
            lines.push(line);
        }
        if !errors.is_empty() {
            return Err(errors);
        }
        lines.push("}\n".to_string());
        Ok(lines.join("\n"))
    }

    /// Type annotation for a field position; enqueues referenced records.
    fn annotation(&self, shape: &Shape, path: &str, walk: &mut Walk) -> Result<String, SchemaError> {
        self.render(shape, path, &mut |record: &Arc<RecordShape>, path: &str| {
            let name = record.fqn().ok_or_else(|| SchemaError::MissingName {
                path: path.to_string(),
            })?;
            walk.queue.push_back(Arc::clone(record));
            Ok(name.to_string())
        })
    }

    fn arguments(
        &self,
        args: &IndexMap<String, Shape>,
        path: &str,
        walk: &mut Walk,
    ) -> Result<String, SchemaError> {
        let mut rendered = Vec::with_capacity(args.len());
        for (arg, shape) in args {
            let arg_path = format!("{path}({arg})");
            let annotation = self.render(shape, &arg_path, &mut |record: &Arc<RecordShape>, path: &str| {
                self.input_block(record, path, walk)
            })?;
            rendered.push(format!("{arg}: {annotation}"));
        }
        Ok(format!("({})", rendered.join(", ")))
    }

    fn input_block(
        &self,
        record: &Arc<RecordShape>,
        path: &str,
        walk: &mut Walk,
    ) -> Result<String, SchemaError> {
        let name = record.fqn().ok_or_else(|| SchemaError::MissingName {
            path: path.to_string(),
        })?;
        if walk.inputs.contains_key(name) {
            return Ok(name.to_string());
        }
        let mut lines = vec![format!("input {name} {{")];
        for (member, shape) in record.fields() {
            let scalar = shape.without_nothing().filter(Shape::is_scalar).ok_or_else(|| {
                SchemaError::NonScalarInput {
                    input: name.to_string(),
                    member: member.clone(),
                }
            })?;
            let base = self.scalar_name(&scalar);
            let bang = if shape.is_nullable() { "" } else { "!" };
            lines.push(format!("  {member}: {base}{bang}"));
        }
        lines.push("}\n".to_string());
        walk.inputs.insert(name.to_string(), lines.join("\n"));
        Ok(name.to_string())
    }

    fn render(
        &self,
        shape: &Shape,
        path: &str,
        record_name: &mut dyn FnMut(&Arc<RecordShape>, &str) -> Result<String, SchemaError>,
    ) -> Result<String, SchemaError> {
        let nullable = shape.is_nullable();
        let no_type = || SchemaError::NoGraphQlType {
            path: path.to_string(),
            shape: shape.to_string(),
        };
        let inner = shape.without_nothing().ok_or_else(no_type)?;
        let base = match &inner {
            scalar if scalar.is_scalar() => self.scalar_name(scalar).to_string(),
            Shape::List(item) | Shape::Set(item) => {
                format!("[{}]", self.render(item, &format!("{path}[]"), record_name)?)
            }
            Shape::Map(_) => {
                return Err(SchemaError::MapInGraphQl {
                    path: path.to_string(),
                });
            }
            Shape::Record(record) => record_name(record, path)?,
            Shape::Union(_) => {
                return Err(SchemaError::UnnamedUnion {
                    path: path.to_string(),
                });
            }
            _ => return Err(no_type()),
        };
        Ok(if nullable { base } else { format!("{base}!") })
    }

    fn scalar_name<'s>(&'s self, scalar: &Shape) -> &'s str {
        match scalar {
            Shape::Integer => "Int",
            Shape::Float => "Float",
            Shape::Boolean => "Boolean",
            Shape::Timestamp => &self.config.timestamp_scalar,
            _ => "String",
        }
    }
}
