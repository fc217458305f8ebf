//! Statement interpreter: drives a field's program and renders its templates.

use super::stage::{self, ResolverPipeline, Stage};
use super::state::InterpreterState;
use super::unify::{ArmOutcome, unify};
use crate::config::CompilerConfig;
use crate::data_source::DataSource;
use crate::error::{CompileError, CompileResult};
use crate::program::{
    BoxedProgram, Branch, ElseBranch, LoopBody, Program, Statement, Step, Thrown,
};
use crate::shape::Shape;
use crate::template::Expr;
use crate::value::{Kind, TypedValue};

/// How a driven program ended.
#[derive(Debug)]
enum Flow {
    Completed(Option<TypedValue>),
    Raised,
}

impl Flow {
    fn outcome(&self) -> ArmOutcome {
        match self {
            Flow::Completed(Some(value)) => ArmOutcome::Value(value.shape().clone()),
            Flow::Completed(None) => ArmOutcome::Nothing,
            Flow::Raised => ArmOutcome::Raised,
        }
    }
}

/// Drives one field's program against a single [`InterpreterState`].
pub struct Interpreter<'a> {
    config: &'a CompilerConfig,
    state: InterpreterState,
    stages: Vec<Stage>,
    dispatched: usize,
}

impl<'a> Interpreter<'a> {
    /// Interpreter with an empty buffer.
    pub fn new(config: &'a CompilerConfig) -> Self {
        Self {
            config,
            state: InterpreterState::new(config.indent_width),
            stages: Vec::new(),
            dispatched: 0,
        }
    }

    /// Number of statements dispatched so far, nested ones included.
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    /// Drive `program` to completion and assemble the resolver.
    pub fn run(&mut self, program: BoxedProgram) -> CompileResult<ResolverPipeline> {
        let result = match self.drive(program)? {
            Flow::Completed(value) => value,
            Flow::Raised => None,
        };
        let stages = std::mem::take(&mut self.stages);
        Ok(stage::assemble(
            stages,
            &mut self.state,
            result.as_ref(),
            self.config,
        ))
    }

    fn drive(&mut self, mut program: BoxedProgram) -> CompileResult<Flow> {
        let mut input = None;
        loop {
            match program.resume(input.take()) {
                Ok(Step::Yield(statement)) => {
                    self.dispatched += 1;
                    tracing::trace!(
                        index = self.dispatched,
                        tag = statement.tag(),
                        depth = self.state.depth(),
                        "dispatching statement"
                    );
                    input = self.execute(statement)?;
                }
                Ok(Step::Complete(value)) => return Ok(Flow::Completed(value)),
                Err(Thrown::Value(value)) => {
                    self.write_failure(&value);
                    return Ok(Flow::Raised);
                }
                Err(Thrown::Error(error)) => return Err(error),
            }
        }
    }

    fn execute(&mut self, statement: Statement) -> CompileResult<Option<TypedValue>> {
        match statement {
            Statement::Write(parts) => {
                for part in &parts {
                    self.state.write(part);
                }
                Ok(None)
            }
            Statement::Stash { value, id, scope } => {
                let scope = scope.unwrap_or(self.config.default_stash_scope);
                let name = self.state.stash_name(id.as_deref(), scope)?;
                self.state.stash(&value, &name).map(Some)
            }
            Statement::Call {
                data_source,
                request,
                response,
            } => self.call(data_source, request, response).map(Some),
            Statement::ForLoop { list, body } => {
                self.for_loop(list, body)?;
                Ok(None)
            }
            Statement::If(branch) => self.branch(branch),
        }
    }

    fn call(
        &mut self,
        data_source: DataSource,
        request: TypedValue,
        response: Shape,
    ) -> CompileResult<TypedValue> {
        if self.state.depth() > 0 {
            return Err(CompileError::CallInsideBlock {
                data_source: data_source.name().to_string(),
            });
        }
        self.state.ensure_line();
        self.state.write(
            &data_source.request_envelope(request.payload(), &self.config.none_request_version),
        );
        let request_template = self.state.render_template();

        let name = format!("$context.stash.result{}", self.state.new_id("result"));
        let raw = TypedValue::reference(response, "$context.result")?;
        let result = self.state.stash(&raw, &name)?;
        let response_template = self.state.take_text();

        tracing::debug!(
            stage = self.stages.len() + 1,
            data_source = data_source.name(),
            "registered stage"
        );
        self.stages.push(Stage {
            data_source,
            request_template,
            response_template,
        });
        Ok(result)
    }

    fn for_loop(&mut self, list: TypedValue, body: LoopBody) -> CompileResult<()> {
        let item = match (list.kind(), list.shape().item()) {
            (Kind::List | Kind::Set, Some(item)) => item.clone(),
            _ => {
                return Err(CompileError::Operator {
                    op: "foreach",
                    shape: list.shape().to_string(),
                });
            }
        };
        let var = format!("$item{}", self.state.new_id("item"));
        self.state.ensure_line();
        self.state.write(&Expr::concat([
            Expr::text(format!("#foreach({var} in ")),
            list.expr().clone(),
            Expr::text(")"),
        ]));
        self.state.open_block();
        // A failure raised in the body ends that iteration's output only.
        self.drive(body(TypedValue::reference(item, &var)?))?;
        self.state.close_block();
        self.state.write(&Expr::concat([Expr::text("#end"), Expr::line()]));
        Ok(())
    }

    fn branch(&mut self, head: Branch) -> CompileResult<Option<TypedValue>> {
        let mut arms: Vec<(Option<TypedValue>, BoxedProgram)> = Vec::new();
        let mut next = Some(ElseBranch::If(Box::new(head)));
        while let Some(tail) = next {
            match tail {
                ElseBranch::If(branch) => {
                    let Branch {
                        condition,
                        then,
                        else_branch,
                    } = *branch;
                    if condition.kind() != Kind::Boolean {
                        return Err(CompileError::Operator {
                            op: "if",
                            shape: condition.shape().to_string(),
                        });
                    }
                    arms.push((Some(condition), then));
                    next = else_branch;
                }
                ElseBranch::Else(body) => {
                    arms.push((None, body));
                    next = None;
                }
            }
        }
        let exhaustive = matches!(arms.last(), Some((None, _)));

        let shared = self
            .state
            .stash_name(None, self.config.default_stash_scope)?;
        let mut outcomes = Vec::with_capacity(arms.len() + 1);
        self.state.ensure_line();
        for (idx, (condition, body)) in arms.into_iter().enumerate() {
            let header = match (idx, condition) {
                (0, Some(condition)) => Expr::concat([
                    Expr::text("#if("),
                    condition.into_expr(),
                    Expr::text(")"),
                ]),
                (_, Some(condition)) => Expr::concat([
                    Expr::text("#elseif("),
                    condition.into_expr(),
                    Expr::text(")"),
                ]),
                (0, None) => {
                    return Err(CompileError::Invariant(
                        "branch chain starts with an else arm".into(),
                    ));
                }
                (_, None) => Expr::text("#else"),
            };
            self.state.write(&header);
            self.state.open_block();
            let flow = self.drive(body)?;
            if let Flow::Completed(Some(value)) = &flow {
                self.state.stash(value, &shared)?;
            }
            self.state.close_block();
            outcomes.push(flow.outcome());
        }
        self.state.write(&Expr::concat([Expr::text("#end"), Expr::line()]));
        if !exhaustive {
            outcomes.push(ArmOutcome::Nothing);
        }

        unify(&outcomes, self.config.partial_branch_results)
            .map(|shape| TypedValue::reference(shape, &shared))
            .transpose()
    }

    fn write_failure(&mut self, value: &TypedValue) {
        let args = match value.kind() {
            Kind::String => vec![value.expr().clone()],
            Kind::Record => match (value.field("message"), value.field("errorType")) {
                (Ok(message), Ok(error_type))
                    if message.kind() == Kind::String && error_type.kind() == Kind::String =>
                {
                    vec![message.into_expr(), error_type.into_expr()]
                }
                (Ok(message), _) if message.kind() == Kind::String => vec![message.into_expr()],
                _ => vec![value.to_json()],
            },
            _ => vec![value.to_json()],
        };
        tracing::debug!(depth = self.state.depth(), "writing declared failure");
        self.state.ensure_line();
        self.state
            .write(&Expr::concat([Expr::call("$util.error", args), Expr::line()]));
    }
}
