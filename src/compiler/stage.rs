//! Stages and resolver assembly.

use serde::Serialize;

use super::state::InterpreterState;
use crate::config::CompilerConfig;
use crate::data_source::DataSource;
use crate::template::Expr;
use crate::value::TypedValue;

/// Marker that lets a pipeline continue to its next stage.
pub const EMPTY_OBJECT: &str = "{}";

/// One data-source invocation with its request and response templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stage {
    /// Invoked data source.
    pub data_source: DataSource,
    /// Request mapping template.
    pub request_template: String,
    /// Response mapping template.
    pub response_template: String,
}

/// Compiled resolver for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolverPipeline {
    /// Single request/response pair against one data source.
    Unit(Stage),
    /// Ordered stages wrapped by a resolver-level template pair.
    Pipeline {
        /// Stages in execution order.
        stages: Vec<Stage>,
        /// Resolver-level request template.
        request_template: String,
        /// Resolver-level response template.
        response_template: String,
    },
}

impl ResolverPipeline {
    /// Stages in execution order (one for unit resolvers).
    pub fn stages(&self) -> &[Stage] {
        match self {
            ResolverPipeline::Unit(stage) => std::slice::from_ref(stage),
            ResolverPipeline::Pipeline { stages, .. } => stages,
        }
    }

    /// Whether this is a multi-stage pipeline.
    pub fn is_pipeline(&self) -> bool {
        matches!(self, ResolverPipeline::Pipeline { .. })
    }

    /// Outermost request template.
    pub fn request_template(&self) -> &str {
        match self {
            ResolverPipeline::Unit(stage) => &stage.request_template,
            ResolverPipeline::Pipeline {
                request_template, ..
            } => request_template,
        }
    }

    /// Outermost response template.
    pub fn response_template(&self) -> &str {
        match self {
            ResolverPipeline::Unit(stage) => &stage.response_template,
            ResolverPipeline::Pipeline {
                response_template, ..
            } => response_template,
        }
    }
}

/// Build the resolver from the registered stages, the text still buffered
/// after the last call and the field's final value.
pub fn assemble(
    mut stages: Vec<Stage>,
    state: &mut InterpreterState,
    result: Option<&TypedValue>,
    config: &CompilerConfig,
) -> ResolverPipeline {
    let emission = result.map_or_else(|| Expr::text(EMPTY_OBJECT), TypedValue::to_json);
    state.ensure_line();
    state.write(&emission);
    let tail = state.take_text();

    match stages.len() {
        0 => {
            let payload = result
                .filter(|value| value.as_literal().is_some())
                .map_or_else(|| Expr::text(EMPTY_OBJECT), |value| value.expr().clone());
            let request_template = DataSource::None
                .request_envelope(payload, &config.none_request_version)
                .to_text();
            tracing::debug!("assembled unit resolver against the none data source");
            ResolverPipeline::Unit(Stage {
                data_source: DataSource::None,
                request_template,
                response_template: tail,
            })
        }
        1 => {
            let mut stage = stages.remove(0);
            stage.response_template.push_str(&tail);
            tracing::debug!(data_source = stage.data_source.name(), "assembled unit resolver");
            ResolverPipeline::Unit(stage)
        }
        count => {
            for stage in &mut stages {
                stage.response_template.push_str(EMPTY_OBJECT);
            }
            tracing::debug!(stages = count, "assembled pipeline resolver");
            ResolverPipeline::Pipeline {
                stages,
                request_template: EMPTY_OBJECT.to_string(),
                response_template: tail,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Shape;

    fn stage(name: &str) -> Stage {
        Stage {
            data_source: DataSource::Lambda {
                name: name.to_string(),
            },
            request_template: "{}".to_string(),
            response_template: "#set($context.stash.result1 = $context.result)\n".to_string(),
        }
    }

    #[test]
    fn no_stages_is_a_unit_none_resolver() {
        let mut state = InterpreterState::new(2);
        let config = CompilerConfig::default();
        let value = TypedValue::string("hi");
        let resolver = assemble(Vec::new(), &mut state, Some(&value), &config);
        let ResolverPipeline::Unit(stage) = &resolver else {
            panic!("expected unit");
        };
        assert_eq!(stage.data_source, DataSource::None);
        let request: serde_json::Value = serde_json::from_str(&stage.request_template).unwrap();
        assert_eq!(
            request,
            serde_json::json!({"version": "2017-02-28", "payload": "hi"})
        );
        assert_eq!(stage.response_template, "$util.toJson(\"hi\")");
    }

    #[test]
    fn no_value_emits_empty_objects() {
        let mut state = InterpreterState::new(2);
        let resolver = assemble(Vec::new(), &mut state, None, &CompilerConfig::default());
        assert_eq!(resolver.response_template(), "{}");
        let request: serde_json::Value =
            serde_json::from_str(resolver.request_template()).unwrap();
        assert_eq!(request["payload"], serde_json::json!({}));
    }

    #[test]
    fn single_stage_folds_the_tail() {
        let mut state = InterpreterState::new(2);
        state.write(&Expr::concat([Expr::text("#set($x = 1)"), Expr::line()]));
        let value = TypedValue::reference(Shape::String, "$context.stash.result1").unwrap();
        let resolver = assemble(
            vec![stage("users")],
            &mut state,
            Some(&value),
            &CompilerConfig::default(),
        );
        assert!(!resolver.is_pipeline());
        assert_eq!(
            resolver.response_template(),
            "#set($context.stash.result1 = $context.result)\n#set($x = 1)\n$util.toJson($context.stash.result1)"
        );
    }

    #[test]
    fn multiple_stages_form_a_pipeline() {
        let mut state = InterpreterState::new(2);
        let resolver = assemble(
            vec![stage("a"), stage("b"), stage("c")],
            &mut state,
            None,
            &CompilerConfig::default(),
        );
        assert!(resolver.is_pipeline());
        assert_eq!(resolver.stages().len(), 3);
        assert_eq!(resolver.request_template(), "{}");
        for stage in resolver.stages() {
            assert!(stage.response_template.ends_with("{}"));
        }
        let json = serde_json::to_value(&resolver).unwrap();
        assert_eq!(json["kind"], "pipeline");
    }
}
