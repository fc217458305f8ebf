use std::collections::HashMap;

use super::{BoxedProgram, Program, StashScope, Statement, Step, Thrown, when};
use crate::data_source::DataSource;
use crate::error::{CompileError, CompileResult};
use crate::shape::Shape;
use crate::template::Expr;
use crate::value::ops::ArithOp;
use crate::value::{FieldContext, TypedValue};

/// Value-producing expression evaluated against the script's registers.
#[derive(Debug, Clone)]
pub enum Operand {
    /// A value known up front (usually a literal).
    Value(TypedValue),
    /// Register lookup.
    Var(String),
    /// Record field access.
    Field(Box<Operand>, String),
    /// `==`
    Eq(Box<Operand>, Box<Operand>),
    /// `!=`
    Ne(Box<Operand>, Box<Operand>),
    /// `>`
    Gt(Box<Operand>, Box<Operand>),
    /// `>=`
    Ge(Box<Operand>, Box<Operand>),
    /// `<`
    Lt(Box<Operand>, Box<Operand>),
    /// `<=`
    Le(Box<Operand>, Box<Operand>),
    /// `&&`
    And(Box<Operand>, Box<Operand>),
    /// `||`
    Or(Box<Operand>, Box<Operand>),
    /// `!`
    Not(Box<Operand>),
    /// Null test.
    IsNull(Box<Operand>),
    /// Upper-cased string.
    Upper(Box<Operand>),
    /// Lower-cased string.
    Lower(Box<Operand>),
    /// String length or collection size.
    Size(Box<Operand>),
    /// Emptiness test.
    IsEmpty(Box<Operand>),
    /// List index or map key lookup.
    Get(Box<Operand>, Box<Operand>),
    /// Map key or collection membership test.
    Has(Box<Operand>, Box<Operand>),
    /// Current timestamp.
    Now,
}

impl Operand {
    /// Register reference.
    pub fn var(name: impl Into<String>) -> Operand {
        Operand::Var(name.into())
    }

    /// Field of this operand.
    pub fn field(self, name: impl Into<String>) -> Operand {
        Operand::Field(Box::new(self), name.into())
    }

    /// Evaluate to a typed value.
    pub fn resolve(&self, registers: &HashMap<String, TypedValue>) -> CompileResult<TypedValue> {
        let pair = |left: &Operand, right: &Operand| -> CompileResult<(TypedValue, TypedValue)> {
            Ok((left.resolve(registers)?, right.resolve(registers)?))
        };
        match self {
            Operand::Value(value) => Ok(value.clone()),
            Operand::Var(name) => registers.get(name).cloned().ok_or_else(|| {
                CompileError::Invariant(format!("register `{name}` is unbound"))
            }),
            Operand::Field(inner, name) => inner.resolve(registers)?.field(name),
            Operand::Eq(l, r) => pair(l, r).map(|(l, r)| l.equals(&r)),
            Operand::Ne(l, r) => pair(l, r).map(|(l, r)| l.not_equals(&r)),
            Operand::Gt(l, r) => pair(l, r).and_then(|(l, r)| l.gt(&r)),
            Operand::Ge(l, r) => pair(l, r).and_then(|(l, r)| l.ge(&r)),
            Operand::Lt(l, r) => pair(l, r).and_then(|(l, r)| l.lt(&r)),
            Operand::Le(l, r) => pair(l, r).and_then(|(l, r)| l.le(&r)),
            Operand::And(l, r) => pair(l, r).and_then(|(l, r)| l.and(&r)),
            Operand::Or(l, r) => pair(l, r).and_then(|(l, r)| l.or(&r)),
            Operand::Not(inner) => inner.resolve(registers)?.not(),
            Operand::IsNull(inner) => Ok(inner.resolve(registers)?.is_null()),
            Operand::Upper(inner) => inner.resolve(registers)?.upper(),
            Operand::Lower(inner) => inner.resolve(registers)?.lower(),
            Operand::Size(inner) => inner.resolve(registers)?.size(),
            Operand::IsEmpty(inner) => inner.resolve(registers)?.is_empty(),
            Operand::Get(l, r) => pair(l, r).and_then(|(l, r)| l.get(&r)),
            Operand::Has(l, r) => pair(l, r).and_then(|(l, r)| l.has(&r)),
            Operand::Now => Ok(TypedValue::now()),
        }
    }
}

/// Piece of a `Write` instruction.
#[derive(Debug, Clone)]
pub enum Fragment {
    /// Raw template text.
    Text(String),
    /// The expression of a value.
    Value(Operand),
    /// Line break.
    Line,
}

/// One arm of a type dispatch.
#[derive(Debug, Clone)]
pub struct MatchArm {
    /// Union member the arm handles; ignored for the fallback arm.
    pub member: Shape,
    /// Register that receives the narrowed value.
    pub bind: String,
    /// Arm body.
    pub body: Vec<Instr>,
}

/// Script instruction. Instructions that produce a value write it to the
/// register named by `into`.
#[derive(Debug, Clone)]
pub enum Instr {
    /// Append template text.
    Write(Vec<Fragment>),
    /// Bind a register without emitting anything.
    Let {
        /// Target register.
        into: String,
        /// Bound value.
        value: Operand,
    },
    /// Stash a value into a template variable.
    Stash {
        /// Target register.
        into: String,
        /// Stashed value.
        value: Operand,
        /// Explicit variable identifier.
        id: Option<String>,
        /// Scope override.
        scope: Option<StashScope>,
    },
    /// Data-source call.
    Call {
        /// Target register for the response.
        into: String,
        /// Data source to invoke.
        data_source: DataSource,
        /// Request payload.
        request: Operand,
        /// Declared response shape.
        response: Shape,
    },
    /// Arithmetic, stashed into a local. When a data-source call follows,
    /// the configured default scope is used so later stages can read it.
    Arith {
        /// Target register.
        into: String,
        /// Operator.
        op: ArithOp,
        /// Left operand.
        left: Operand,
        /// Right operand.
        right: Operand,
    },
    /// Append to a list or set.
    Append {
        /// Collection.
        list: Operand,
        /// Appended item.
        item: Operand,
    },
    /// Insert into a map.
    Put {
        /// Map.
        map: Operand,
        /// Key.
        key: Operand,
        /// Value.
        value: Operand,
    },
    /// Loop over a list or set.
    ForEach {
        /// Collection.
        list: Operand,
        /// Register holding the current item inside the body.
        item: String,
        /// Loop body.
        body: Vec<Instr>,
    },
    /// Conditional chain.
    If {
        /// Register for the unified arm result.
        into: Option<String>,
        /// Condition and body per arm.
        arms: Vec<(Operand, Vec<Instr>)>,
        /// `else` body.
        otherwise: Option<Vec<Instr>>,
    },
    /// Type dispatch over a union value.
    Match {
        /// Register for the unified arm result.
        into: Option<String>,
        /// Union value.
        scrutinee: Operand,
        /// Arms in order.
        arms: Vec<MatchArm>,
        /// Fallback arm.
        otherwise: Option<MatchArm>,
    },
    /// Complete with a value, or with nothing.
    Return(Option<Operand>),
    /// Raise a declared failure.
    Raise(Operand),
}

/// Program interpreting a list of [`Instr`] over named registers.
pub struct Script {
    instrs: std::vec::IntoIter<Instr>,
    registers: HashMap<String, TypedValue>,
    pending: Option<String>,
    // An enclosing script still has a call to make.
    calls_ahead: bool,
}

impl Script {
    /// Script with no bound registers.
    pub fn new(instrs: Vec<Instr>) -> Self {
        Self::with_registers(instrs, HashMap::new())
    }

    /// Script for a field, with `args`, `source` and `identity` bound.
    pub fn for_field(instrs: Vec<Instr>, context: &FieldContext) -> Self {
        let mut registers = HashMap::new();
        registers.insert("args".to_string(), context.arguments.clone());
        registers.insert("source".to_string(), context.source.clone());
        registers.insert("identity".to_string(), context.identity.clone());
        Self::with_registers(instrs, registers)
    }

    fn with_registers(instrs: Vec<Instr>, registers: HashMap<String, TypedValue>) -> Self {
        Self {
            instrs: instrs.into_iter(),
            registers,
            pending: None,
            calls_ahead: false,
        }
    }

    /// Bind a register before the script starts.
    pub fn bind(mut self, name: impl Into<String>, value: TypedValue) -> Self {
        self.registers.insert(name.into(), value);
        self
    }

    fn child(&self, body: Vec<Instr>) -> Script {
        let mut child = Script::with_registers(body, self.registers.clone());
        child.calls_ahead = self.call_follows();
        child
    }

    fn call_follows(&self) -> bool {
        self.calls_ahead
            || self
                .instrs
                .as_slice()
                .iter()
                .any(|instr| matches!(instr, Instr::Call { .. }))
    }

    fn resolve(&self, operand: &Operand) -> CompileResult<TypedValue> {
        operand.resolve(&self.registers)
    }

    fn store(&mut self, input: Option<TypedValue>) {
        let Some(name) = self.pending.take() else {
            return;
        };
        match input {
            Some(value) => {
                self.registers.insert(name, value);
            }
            None => {
                self.registers.remove(&name);
            }
        }
    }

    fn branch(&self, arms: Vec<(Operand, Vec<Instr>)>, otherwise: Option<Vec<Instr>>) -> CompileResult<Statement> {
        let mut arms = arms.into_iter();
        let Some((condition, body)) = arms.next() else {
            return Err(CompileError::Invariant("if without arms".into()));
        };
        let mut chain = when(self.resolve(&condition)?, Box::new(self.child(body)));
        for (condition, body) in arms {
            chain = chain.else_if(self.resolve(&condition)?, Box::new(self.child(body)));
        }
        Ok(match otherwise {
            Some(body) => chain.otherwise(Box::new(self.child(body))),
            None => chain.end(),
        })
    }

    fn dispatch(
        &self,
        scrutinee: &Operand,
        arms: Vec<MatchArm>,
        otherwise: Option<MatchArm>,
    ) -> CompileResult<Statement> {
        let mut dispatch = self.resolve(scrutinee)?.matching()?;
        for MatchArm { member, bind, body } in arms {
            let child = self.child(body);
            dispatch = dispatch.when(member, move |value| -> BoxedProgram {
                Box::new(child.bind(bind, value))
            })?;
        }
        match otherwise {
            Some(MatchArm { bind, body, .. }) => {
                let child = self.child(body);
                dispatch.otherwise(move |value| -> BoxedProgram { Box::new(child.bind(bind, value)) })
            }
            None => dispatch.end(),
        }
    }

    fn step(&mut self, instr: Instr) -> Result<Option<Step>, Thrown> {
        let statement = match instr {
            Instr::Write(fragments) => Statement::Write(
                fragments
                    .iter()
                    .map(|fragment| match fragment {
                        Fragment::Text(text) => Ok(Expr::text(text.as_str())),
                        Fragment::Value(operand) => Ok(self.resolve(operand)?.into_expr()),
                        Fragment::Line => Ok(Expr::line()),
                    })
                    .collect::<CompileResult<Vec<_>>>()?,
            ),
            Instr::Let { into, value } => {
                let value = self.resolve(&value)?;
                self.registers.insert(into, value);
                return Ok(None);
            }
            Instr::Stash {
                into,
                value,
                id,
                scope,
            } => {
                let value = self.resolve(&value)?;
                self.pending = Some(into);
                Statement::Stash { value, id, scope }
            }
            Instr::Call {
                into,
                data_source,
                request,
                response,
            } => {
                let request = self.resolve(&request)?;
                self.pending = Some(into);
                Statement::call(data_source, request, response)
            }
            Instr::Arith {
                into,
                op,
                left,
                right,
            } => {
                let mut statement = self.resolve(&left)?.arith(op, &self.resolve(&right)?)?;
                if self.call_follows() {
                    if let Statement::Stash { scope, .. } = &mut statement {
                        *scope = None;
                    }
                }
                self.pending = Some(into);
                statement
            }
            Instr::Append { list, item } => self.resolve(&list)?.add(&self.resolve(&item)?)?,
            Instr::Put { map, key, value } => {
                self.resolve(&map)?
                    .put(&self.resolve(&key)?, &self.resolve(&value)?)?
            }
            Instr::ForEach { list, item, body } => {
                let list = self.resolve(&list)?;
                let child = self.child(body);
                Statement::for_each(list, move |value| -> BoxedProgram {
                    Box::new(child.bind(item, value))
                })
            }
            Instr::If {
                into,
                arms,
                otherwise,
            } => {
                let statement = self.branch(arms, otherwise)?;
                self.pending = into;
                statement
            }
            Instr::Match {
                into,
                scrutinee,
                arms,
                otherwise,
            } => {
                let statement = self.dispatch(&scrutinee, arms, otherwise)?;
                self.pending = into;
                statement
            }
            Instr::Return(value) => {
                let value = value.map(|operand| self.resolve(&operand)).transpose()?;
                return Ok(Some(Step::Complete(value)));
            }
            Instr::Raise(value) => return Err(Thrown::Value(self.resolve(&value)?)),
        };
        Ok(Some(Step::Yield(statement)))
    }
}

impl Program for Script {
    fn resume(&mut self, input: Option<TypedValue>) -> Result<Step, Thrown> {
        self.store(input);
        while let Some(instr) = self.instrs.next() {
            if let Some(step) = self.step(instr)? {
                return Ok(step);
            }
        }
        Ok(Step::Complete(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Literal;

    fn drain(script: &mut Script) -> Vec<&'static str> {
        let mut tags = Vec::new();
        let mut input = None;
        loop {
            match script.resume(input.take()) {
                Ok(Step::Yield(statement)) => {
                    tags.push(statement.tag());
                    if let Statement::Stash { value, .. } = statement {
                        input = Some(TypedValue::reference(value.shape().clone(), "$s").unwrap());
                    }
                }
                Ok(Step::Complete(_)) => return tags,
                Err(_) => panic!("script threw"),
            }
        }
    }

    #[test]
    fn let_binds_without_yielding() {
        let mut script = Script::new(vec![
            Instr::Let {
                into: "x".into(),
                value: Operand::Value(TypedValue::integer(1)),
            },
            Instr::Return(Some(Operand::var("x"))),
        ]);
        match script.resume(None) {
            Ok(Step::Complete(Some(value))) => assert_eq!(value, TypedValue::integer(1)),
            _ => panic!("expected completion"),
        }
    }

    #[test]
    fn stash_result_is_bound_on_resume() {
        let mut script = Script::new(vec![
            Instr::Stash {
                into: "s".into(),
                value: Operand::Value(TypedValue::string("a")),
                id: None,
                scope: None,
            },
            Instr::Return(Some(Operand::Upper(Box::new(Operand::var("s"))))),
        ]);
        assert!(matches!(script.resume(None), Ok(Step::Yield(Statement::Stash { .. }))));
        let stashed = TypedValue::reference(Shape::String, "$context.stash.var1").unwrap();
        match script.resume(Some(stashed)) {
            Ok(Step::Complete(Some(value))) => {
                assert_eq!(value.expr().to_text(), "$context.stash.var1.toUpperCase()")
            }
            _ => panic!("expected completion"),
        }
    }

    #[test]
    fn unbound_register_is_an_invariant_violation() {
        let mut script = Script::new(vec![Instr::Return(Some(Operand::var("ghost")))]);
        match script.resume(None) {
            Err(Thrown::Error(err)) => assert!(err.is_invariant()),
            _ => panic!("expected invariant error"),
        }
    }

    #[test]
    fn raise_throws_a_declared_failure() {
        let mut script = Script::new(vec![Instr::Raise(Operand::Value(TypedValue::string(
            "nope",
        )))]);
        assert!(matches!(script.resume(None), Err(Thrown::Value(_))));
    }

    #[test]
    fn nested_blocks_see_parent_registers() {
        let list = TypedValue::literal(
            Shape::list(Shape::Integer),
            Literal::from(serde_json::json!([1, 2])),
        )
        .unwrap();
        let mut script = Script::new(vec![
            Instr::Let {
                into: "acc".into(),
                value: Operand::Value(
                    TypedValue::reference(Shape::list(Shape::Integer), "$acc").unwrap(),
                ),
            },
            Instr::ForEach {
                list: Operand::Value(list),
                item: "n".into(),
                body: vec![Instr::Append {
                    list: Operand::var("acc"),
                    item: Operand::var("n"),
                }],
            },
        ]);
        let Ok(Step::Yield(Statement::ForLoop { body, .. })) = script.resume(None) else {
            panic!("expected loop");
        };
        let mut body = body(TypedValue::reference(Shape::Integer, "$item1").unwrap());
        match body.resume(None) {
            Ok(Step::Yield(Statement::Write(parts))) => {
                assert_eq!(parts[0].to_text(), "$util.qr($acc.add($item1))")
            }
            _ => panic!("expected write"),
        }
    }

    #[test]
    fn arithmetic_yields_a_local_stash() {
        let mut script = Script::new(vec![
            Instr::Arith {
                into: "sum".into(),
                op: ArithOp::Add,
                left: Operand::Value(TypedValue::integer(1)),
                right: Operand::Value(TypedValue::integer(2)),
            },
            Instr::Return(Some(Operand::var("sum"))),
        ]);
        assert_eq!(drain(&mut script), vec!["stash"]);
    }

    #[test]
    fn arithmetic_before_a_call_uses_the_default_scope() {
        let sum = || Instr::Arith {
            into: "sum".into(),
            op: ArithOp::Add,
            left: Operand::Value(TypedValue::integer(1)),
            right: Operand::Value(TypedValue::integer(2)),
        };
        let call = Instr::Call {
            into: "r".into(),
            data_source: DataSource::None,
            request: Operand::var("sum"),
            response: Shape::String,
        };
        fn scope_of(program: &mut dyn Program) -> Option<StashScope> {
            match program.resume(None) {
                Ok(Step::Yield(Statement::Stash { scope, .. })) => scope,
                _ => panic!("expected stash"),
            }
        }

        let mut script = Script::new(vec![sum(), call.clone()]);
        assert_eq!(scope_of(&mut script), None);

        let mut nested = Script::new(vec![
            Instr::If {
                into: None,
                arms: vec![(Operand::Value(TypedValue::boolean(true)), vec![sum()])],
                otherwise: None,
            },
            call,
        ]);
        let Ok(Step::Yield(Statement::If(branch))) = nested.resume(None) else {
            panic!("expected if");
        };
        let mut arm = branch.then;
        assert_eq!(scope_of(arm.as_mut()), None);
    }
}
