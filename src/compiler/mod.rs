//! Field compilation: program driving, stage assembly and caching.
//!
//! Each field is compiled by its own [`Interpreter`] owning one
//! [`InterpreterState`]; nothing is shared between fields.

/// Cache hints and their qualified form.
pub mod cache;
/// The statement interpreter.
pub mod interpreter;
/// Stage and resolver assembly.
pub mod stage;
/// Buffered template text and id counters.
pub mod state;
/// Branch result unification.
pub mod unify;

pub use cache::{CacheSpec, CachingConfig};
pub use interpreter::Interpreter;
pub use stage::{ResolverPipeline, Stage};
pub use state::InterpreterState;

use serde::Serialize;

use crate::config::CompilerConfig;
use crate::error::FieldFailure;
use crate::program::BoxedProgram;
use crate::schema::directive::FieldMetadata;

/// Compiled output for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledResolver {
    /// Parent type name.
    pub type_name: String,
    /// Field name.
    pub field_name: String,
    /// Stages and templates.
    pub pipeline: ResolverPipeline,
    /// Schema directives for the field.
    pub directives: Vec<String>,
    /// Caching configuration, when the field is cached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caching: Option<CachingConfig>,
}

/// Compile one field's program.
///
/// `cache_override` is the API-level cache hint for this field, which wins
/// over the one in `metadata`.
pub fn compile_field(
    type_name: &str,
    field_name: &str,
    program: BoxedProgram,
    metadata: &FieldMetadata,
    cache_override: Option<&CacheSpec>,
    config: &CompilerConfig,
) -> Result<CompiledResolver, FieldFailure> {
    let span = tracing::debug_span!("compile_field", field = %format!("{type_name}.{field_name}"));
    let _guard = span.enter();

    let mut interpreter = Interpreter::new(config);
    let pipeline = interpreter.run(program).map_err(|error| {
        tracing::warn!(statement = interpreter.dispatched(), %error, "field failed to compile");
        FieldFailure {
            type_name: type_name.to_string(),
            field_name: field_name.to_string(),
            statement: interpreter.dispatched(),
            error,
        }
    })?;

    tracing::debug!(
        stages = pipeline.stages().len(),
        pipeline = pipeline.is_pipeline(),
        "field compiled"
    );
    Ok(CompiledResolver {
        type_name: type_name.to_string(),
        field_name: field_name.to_string(),
        pipeline,
        directives: metadata.directives(),
        caching: cache::caching_for(metadata.cache.as_ref(), cache_override),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompileError;
    use crate::program::{Sequence, Statement, returning};
    use crate::schema::directive::AuthMode;
    use crate::value::TypedValue;

    #[test]
    fn compiled_field_carries_metadata() {
        let metadata = FieldMetadata {
            auth: vec![AuthMode::Iam],
            cache: Some(CacheSpec {
                ttl: 30,
                keys: vec!["id".into()],
            }),
            subscribe: None,
        };
        let resolver = compile_field(
            "Query",
            "hello",
            returning(Some(TypedValue::string("hi"))),
            &metadata,
            None,
            &CompilerConfig::default(),
        )
        .unwrap();
        assert_eq!(resolver.directives, vec!["@aws_iam"]);
        assert_eq!(
            resolver.caching.unwrap().caching_keys,
            vec!["$context.arguments.id"]
        );
    }

    #[test]
    fn failures_name_the_field_and_statement() {
        let program = Sequence::boxed(
            vec![
                Statement::stash(TypedValue::integer(1)),
                Statement::Stash {
                    value: TypedValue::integer(2),
                    id: Some("not valid".into()),
                    scope: None,
                },
            ],
            None,
        );
        let failure = compile_field(
            "Query",
            "broken",
            program,
            &FieldMetadata::default(),
            None,
            &CompilerConfig::default(),
        )
        .unwrap_err();
        assert_eq!(failure.statement, 2);
        assert_eq!(
            failure.error,
            CompileError::InvalidIdentifier("not valid".into())
        );
        assert!(failure.to_string().starts_with("Query.broken (statement 2)"));
    }
}
