//! Resolver programs and the statements they suspend on.
//!
//! A [`Program`] is a resumable state machine: every call to
//! [`Program::resume`] receives the value computed for the previously yielded
//! statement and either yields the next [`Statement`], completes with the
//! field's value, or throws. Statements are the only suspension points.

/// Tagged-instruction programs.
pub mod script;

pub use script::{Fragment, Instr, MatchArm, Operand, Script};

use std::fmt;

use crate::data_source::DataSource;
use crate::error::CompileError;
use crate::shape::Shape;
use crate::template::Expr;
use crate::value::TypedValue;

/// Boxed program, the currency of nested blocks.
pub type BoxedProgram = Box<dyn Program>;

/// Builds the body of a loop from the iteration variable.
pub type LoopBody = Box<dyn FnOnce(TypedValue) -> BoxedProgram>;

/// Resumable resolver logic for one field (or one nested block).
pub trait Program {
    /// Advance to the next suspension point.
    ///
    /// `input` is the value computed for the previously yielded statement,
    /// `None` on the first call and after statements that yield nothing.
    fn resume(&mut self, input: Option<TypedValue>) -> Result<Step, Thrown>;
}

/// Outcome of resuming a program.
#[derive(Debug)]
pub enum Step {
    /// Suspend on a statement.
    Yield(Statement),
    /// Finish with the resolved value, if any.
    Complete(Option<TypedValue>),
}

/// Something thrown by program code.
#[derive(Debug)]
pub enum Thrown {
    /// Declared failure: a GraphQL-level error value written to the output.
    Value(TypedValue),
    /// Any other error; aborts compilation of the field.
    Error(CompileError),
}

impl From<CompileError> for Thrown {
    fn from(error: CompileError) -> Self {
        Thrown::Error(error)
    }
}

/// Where an anonymous stash lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StashScope {
    /// `$localN`; visible only within the current template.
    Local,
    /// `$context.stash.varN`; survives stage boundaries.
    Global,
}

/// One step of resolver logic.
pub enum Statement {
    /// Append raw template text.
    Write(Vec<Expr>),
    /// Assign a value to a named variable; resumes with a reference to it.
    Stash {
        /// Value to assign.
        value: TypedValue,
        /// Caller-supplied identifier; generated when absent.
        id: Option<String>,
        /// Scope override; the compiler default applies when absent.
        scope: Option<StashScope>,
    },
    /// Invoke a data source; resumes with the typed response.
    Call {
        /// Target data source.
        data_source: DataSource,
        /// Request payload.
        request: TypedValue,
        /// Declared response shape.
        response: Shape,
    },
    /// Iterate over a list or set.
    ForLoop {
        /// Collection to iterate.
        list: TypedValue,
        /// Body, built from the iteration variable.
        body: LoopBody,
    },
    /// Conditional chain; resumes with the unified arm result.
    If(Branch),
}

impl Statement {
    /// `Write` of the given parts.
    pub fn write(parts: impl IntoIterator<Item = Expr>) -> Statement {
        Statement::Write(parts.into_iter().collect())
    }

    /// Anonymous stash with the default scope.
    pub fn stash(value: TypedValue) -> Statement {
        Statement::Stash {
            value,
            id: None,
            scope: None,
        }
    }

    /// Data-source call.
    pub fn call(data_source: DataSource, request: TypedValue, response: Shape) -> Statement {
        Statement::Call {
            data_source,
            request,
            response,
        }
    }

    /// Loop over `list`.
    pub fn for_each<F>(list: TypedValue, body: F) -> Statement
    where
        F: FnOnce(TypedValue) -> BoxedProgram + 'static,
    {
        Statement::ForLoop {
            list,
            body: Box::new(body),
        }
    }

    /// Tag name used in traces and diagnostics.
    pub fn tag(&self) -> &'static str {
        match self {
            Statement::Write(_) => "write",
            Statement::Stash { .. } => "stash",
            Statement::Call { .. } => "call",
            Statement::ForLoop { .. } => "for-loop",
            Statement::If(_) => "if",
        }
    }
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Write(parts) => f.debug_tuple("Write").field(parts).finish(),
            Statement::Stash { value, id, scope } => f
                .debug_struct("Stash")
                .field("value", value)
                .field("id", id)
                .field("scope", scope)
                .finish(),
            Statement::Call {
                data_source,
                request,
                response,
            } => f
                .debug_struct("Call")
                .field("data_source", data_source)
                .field("request", request)
                .field("response", response)
                .finish(),
            Statement::ForLoop { list, .. } => {
                f.debug_struct("ForLoop").field("list", list).finish_non_exhaustive()
            }
            Statement::If(branch) => f.debug_tuple("If").field(branch).finish(),
        }
    }
}

/// One `if` arm plus the rest of the chain.
pub struct Branch {
    /// Boolean condition.
    pub condition: TypedValue,
    /// Arm body.
    pub then: BoxedProgram,
    /// Following `elseif`/`else`, if any.
    pub else_branch: Option<ElseBranch>,
}

/// Continuation of a branch chain.
pub enum ElseBranch {
    /// `#elseif`.
    If(Box<Branch>),
    /// Terminal `#else`.
    Else(BoxedProgram),
}

impl fmt::Debug for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tail = match &self.else_branch {
            None => "end",
            Some(ElseBranch::If(_)) => "elseif",
            Some(ElseBranch::Else(_)) => "else",
        };
        f.debug_struct("Branch")
            .field("condition", &self.condition)
            .field("tail", &tail)
            .finish_non_exhaustive()
    }
}

/// Builder for `if` / `else if` / `else` chains.
pub struct IfChain {
    arms: Vec<(TypedValue, BoxedProgram)>,
}

/// Start an `if` chain.
pub fn when(condition: TypedValue, then: BoxedProgram) -> IfChain {
    IfChain {
        arms: vec![(condition, then)],
    }
}

impl IfChain {
    /// Add an `else if` arm.
    pub fn else_if(mut self, condition: TypedValue, then: BoxedProgram) -> Self {
        self.arms.push((condition, then));
        self
    }

    /// Close the chain with an `else` arm.
    pub fn otherwise(self, body: BoxedProgram) -> Statement {
        self.finish(Some(ElseBranch::Else(body)))
    }

    /// Close the chain without an `else` arm.
    pub fn end(self) -> Statement {
        self.finish(None)
    }

    fn finish(self, mut tail: Option<ElseBranch>) -> Statement {
        let mut arms = self.arms;
        // `when` seeds one arm, so the chain is never empty.
        while arms.len() > 1 {
            let Some((condition, then)) = arms.pop() else {
                break;
            };
            tail = Some(ElseBranch::If(Box::new(Branch {
                condition,
                then,
                else_branch: tail,
            })));
        }
        let (condition, then) = arms.remove(0);
        Statement::If(Branch {
            condition,
            then,
            else_branch: tail,
        })
    }
}

/// Program that completes immediately with `value`.
pub fn returning(value: Option<TypedValue>) -> BoxedProgram {
    Box::new(Sequence::new(Vec::new(), value))
}

/// Program that yields a fixed list of statements, ignores what they
/// resume with, and completes with `value`.
pub struct Sequence {
    statements: std::vec::IntoIter<Statement>,
    value: Option<TypedValue>,
}

impl Sequence {
    /// Build from statements and a final value.
    pub fn new(statements: Vec<Statement>, value: Option<TypedValue>) -> Self {
        Self {
            statements: statements.into_iter(),
            value,
        }
    }

    /// Boxed form.
    pub fn boxed(statements: Vec<Statement>, value: Option<TypedValue>) -> BoxedProgram {
        Box::new(Self::new(statements, value))
    }
}

impl Program for Sequence {
    fn resume(&mut self, _input: Option<TypedValue>) -> Result<Step, Thrown> {
        match self.statements.next() {
            Some(statement) => Ok(Step::Yield(statement)),
            None => Ok(Step::Complete(self.value.take())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn if_chain_threads_else_branches() {
        let statement = when(TypedValue::boolean(true), returning(None))
            .else_if(TypedValue::boolean(false), returning(None))
            .otherwise(returning(None));
        let Statement::If(head) = statement else {
            panic!("expected if");
        };
        let Some(ElseBranch::If(second)) = head.else_branch else {
            panic!("expected elseif");
        };
        assert_eq!(second.condition, TypedValue::boolean(false));
        assert!(matches!(second.else_branch, Some(ElseBranch::Else(_))));
    }

    #[test]
    fn single_arm_chain_has_no_tail() {
        let Statement::If(head) = when(TypedValue::boolean(true), returning(None)).end() else {
            panic!("expected if");
        };
        assert!(head.else_branch.is_none());
    }

    #[test]
    fn sequence_yields_then_completes() {
        let mut program = Sequence::new(
            vec![Statement::write([Expr::text("a")])],
            Some(TypedValue::integer(1)),
        );
        assert!(matches!(program.resume(None), Ok(Step::Yield(Statement::Write(_)))));
        match program.resume(None) {
            Ok(Step::Complete(Some(value))) => assert_eq!(value, TypedValue::integer(1)),
            other => panic!("expected completion, got {other:?}"),
        }
    }
}
