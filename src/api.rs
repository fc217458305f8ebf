//! Whole-API compilation: every field resolver plus the schema.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

use crate::compiler::{self, CacheSpec, CompiledResolver};
use crate::config::CompilerConfig;
use crate::error::{CompileError, FieldFailure, SchemaError};
use crate::program::BoxedProgram;
use crate::schema::{FieldMetadata, SchemaGenerator, SchemaRoots};
use crate::shape::{RecordShape, TypeCatalog};
use crate::value::FieldContext;

/// Builds a field's program from its typed context roots.
pub type ProgramFactory = Box<dyn Fn(&FieldContext) -> BoxedProgram>;

/// Resolver logic and metadata for one field.
pub struct FieldResolver {
    program: ProgramFactory,
    metadata: FieldMetadata,
}

impl FieldResolver {
    /// Resolver from a program factory.
    pub fn new<F>(metadata: FieldMetadata, program: F) -> Self
    where
        F: Fn(&FieldContext) -> BoxedProgram + 'static,
    {
        Self {
            program: Box::new(program),
            metadata,
        }
    }

    /// Field metadata.
    pub fn metadata(&self) -> &FieldMetadata {
        &self.metadata
    }
}

/// A GraphQL API: root records, the type catalog and field resolvers.
pub struct Api {
    roots: SchemaRoots,
    catalog: TypeCatalog,
    resolvers: IndexMap<(String, String), FieldResolver>,
    metadata: IndexMap<(String, String), FieldMetadata>,
    cache_overrides: HashMap<(String, String), CacheSpec>,
    config: CompilerConfig,
}

/// Output of [`Api::compile`].
#[derive(Debug)]
pub struct CompiledApi {
    /// Schema text, or every schema error found.
    pub schema: Result<String, Vec<SchemaError>>,
    /// Successfully compiled resolvers.
    pub resolvers: Vec<CompiledResolver>,
    /// Fields that failed to compile.
    pub failures: Vec<FieldFailure>,
}

impl CompiledApi {
    /// Whether every field and the schema compiled.
    pub fn is_clean(&self) -> bool {
        self.schema.is_ok() && self.failures.is_empty()
    }
}

impl Api {
    /// API over `roots`; `catalog` resolves non-root parent types.
    pub fn new(roots: SchemaRoots, catalog: TypeCatalog, config: CompilerConfig) -> Self {
        Self {
            roots,
            catalog,
            resolvers: IndexMap::new(),
            metadata: IndexMap::new(),
            cache_overrides: HashMap::new(),
            config,
        }
    }

    /// Register the resolver for `type_name.field_name`.
    pub fn resolver(
        &mut self,
        type_name: &str,
        field_name: &str,
        resolver: FieldResolver,
    ) -> &mut Self {
        self.resolvers
            .insert((type_name.to_string(), field_name.to_string()), resolver);
        self
    }

    /// Metadata for a field without a resolver; its directives still reach
    /// the schema.
    pub fn field_metadata(
        &mut self,
        type_name: &str,
        field_name: &str,
        metadata: FieldMetadata,
    ) -> &mut Self {
        self.metadata
            .insert((type_name.to_string(), field_name.to_string()), metadata);
        self
    }

    /// API-level cache hint for one field; wins over the field's own.
    pub fn cache_override(&mut self, type_name: &str, field_name: &str, spec: CacheSpec) -> &mut Self {
        self.cache_overrides
            .insert((type_name.to_string(), field_name.to_string()), spec);
        self
    }

    /// Compiler configuration.
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    fn parent(&self, type_name: &str) -> Option<&Arc<RecordShape>> {
        [&self.roots.query, &self.roots.mutation, &self.roots.subscription]
            .into_iter()
            .flatten()
            .find(|root| root.fqn() == Some(type_name))
            .or_else(|| self.catalog.get(type_name))
    }

    fn compile_one(
        &self,
        type_name: &str,
        field_name: &str,
        resolver: &FieldResolver,
    ) -> Result<CompiledResolver, FieldFailure> {
        let failure = |error: CompileError| FieldFailure {
            type_name: type_name.to_string(),
            field_name: field_name.to_string(),
            statement: 0,
            error,
        };
        let parent = self.parent(type_name).ok_or_else(|| {
            failure(CompileError::UnknownField {
                record: type_name.to_string(),
                field: field_name.to_string(),
            })
        })?;
        let context = FieldContext::new(parent, field_name).map_err(failure)?;
        compiler::compile_field(
            type_name,
            field_name,
            (resolver.program)(&context),
            &resolver.metadata,
            self.cache_overrides
                .get(&(type_name.to_string(), field_name.to_string())),
            &self.config,
        )
    }

    /// Compile every resolver and the schema.
    ///
    /// Field errors are collected and compilation continues; an invariant
    /// violation aborts the run and is returned as the error.
    pub fn compile(&self) -> Result<CompiledApi, FieldFailure> {
        let mut resolvers = Vec::with_capacity(self.resolvers.len());
        let mut failures = Vec::new();
        let mut generator = SchemaGenerator::new(&self.config);
        for ((type_name, field_name), metadata) in &self.metadata {
            if !self
                .resolvers
                .contains_key(&(type_name.clone(), field_name.clone()))
            {
                generator.add_directives(type_name, field_name, metadata.directives());
            }
        }

        for ((type_name, field_name), resolver) in &self.resolvers {
            generator.add_directives(type_name, field_name, resolver.metadata.directives());
            match self.compile_one(type_name, field_name, resolver) {
                Ok(compiled) => resolvers.push(compiled),
                Err(failure) if failure.error.is_invariant() => {
                    tracing::error!(%failure, "aborting compilation");
                    return Err(failure);
                }
                Err(failure) => failures.push(failure),
            }
        }

        let schema = generator.generate(&self.roots);
        if let Err(errors) = &schema {
            for error in errors {
                tracing::warn!(%error, "schema error");
            }
        }
        tracing::info!(
            compiled = resolvers.len(),
            failed = failures.len(),
            "compiled API"
        );
        Ok(CompiledApi {
            schema,
            resolvers,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::DataSource;
    use crate::program::{Instr, Operand, Script, returning};
    use crate::schema::AuthMode;
    use crate::shape::Shape;
    use crate::value::TypedValue;

    fn roots() -> SchemaRoots {
        let mut args = IndexMap::new();
        args.insert("id".to_string(), Shape::String);
        let mut fields = IndexMap::new();
        fields.insert("hello".to_string(), Shape::String);
        fields.insert("echo".to_string(), Shape::function(args, Shape::String));
        SchemaRoots {
            query: Some(RecordShape::named("Query", fields)),
            ..SchemaRoots::default()
        }
    }

    #[test]
    fn compiles_fields_and_schema() {
        let mut api = Api::new(roots(), TypeCatalog::new(), CompilerConfig::default());
        api.resolver(
            "Query",
            "hello",
            FieldResolver::new(FieldMetadata::default(), |_| {
                returning(Some(TypedValue::string("hi")))
            }),
        )
        .resolver(
            "Query",
            "echo",
            FieldResolver::new(FieldMetadata::default(), |cx| {
                Box::new(Script::for_field(
                    vec![
                        Instr::Call {
                            into: "r".into(),
                            data_source: DataSource::Lambda {
                                name: "echo".into(),
                            },
                            request: Operand::var("args").field("id"),
                            response: Shape::String,
                        },
                        Instr::Return(Some(Operand::var("r"))),
                    ],
                    cx,
                ))
            }),
        );
        let compiled = api.compile().unwrap();
        assert!(compiled.is_clean());
        assert_eq!(compiled.resolvers.len(), 2);
        assert!(compiled.schema.unwrap().contains("echo(id: String!): String!"));
    }

    #[test]
    fn field_errors_do_not_stop_other_fields() {
        let mut api = Api::new(roots(), TypeCatalog::new(), CompilerConfig::default());
        api.resolver(
            "Query",
            "missing",
            FieldResolver::new(FieldMetadata::default(), |_| returning(None)),
        )
        .resolver(
            "Query",
            "hello",
            FieldResolver::new(FieldMetadata::default(), |_| {
                returning(Some(TypedValue::string("hi")))
            }),
        );
        let compiled = api.compile().unwrap();
        assert_eq!(compiled.resolvers.len(), 1);
        assert_eq!(compiled.failures.len(), 1);
        assert_eq!(compiled.failures[0].field_name, "missing");
    }

    #[test]
    fn invariant_violations_abort() {
        let mut api = Api::new(roots(), TypeCatalog::new(), CompilerConfig::default());
        api.resolver(
            "Query",
            "hello",
            FieldResolver::new(FieldMetadata::default(), |cx| {
                Box::new(Script::for_field(
                    vec![Instr::Return(Some(Operand::var("undefined")))],
                    cx,
                ))
            }),
        );
        let failure = api.compile().unwrap_err();
        assert!(failure.error.is_invariant());
    }

    #[test]
    fn fields_without_resolvers_keep_their_directives() {
        let mut api = Api::new(roots(), TypeCatalog::new(), CompilerConfig::default());
        api.field_metadata(
            "Query",
            "hello",
            FieldMetadata {
                auth: vec![AuthMode::Iam],
                ..FieldMetadata::default()
            },
        );
        let compiled = api.compile().unwrap();
        assert!(compiled.resolvers.is_empty());
        assert!(compiled.schema.unwrap().contains("  hello: String! @aws_iam\n"));
    }

    #[test]
    fn an_if_without_arms_aborts() {
        let mut api = Api::new(roots(), TypeCatalog::new(), CompilerConfig::default());
        api.resolver(
            "Query",
            "hello",
            FieldResolver::new(FieldMetadata::default(), |cx| {
                Box::new(Script::for_field(
                    vec![Instr::If {
                        into: None,
                        arms: vec![],
                        otherwise: Some(vec![]),
                    }],
                    cx,
                ))
            }),
        );
        let failure = api.compile().unwrap_err();
        assert_eq!(failure.field_name, "hello");
        assert!(failure.error.is_invariant(), "{failure}");
    }
}
