use super::{Kind, TypedValue};
use crate::error::{CompileError, CompileResult};
use crate::program::{self, BoxedProgram, IfChain, Statement};
use crate::shape::Shape;
use crate::template::Expr;

/// Name reported by the runtime `typeOf` primitive for values of `shape`.
///
/// Returns `None` for shapes the primitive cannot single out.
pub fn runtime_type_name(shape: &Shape) -> Option<&'static str> {
    match shape {
        Shape::String | Shape::Timestamp | Shape::Binary => Some("String"),
        Shape::Integer | Shape::Float => Some("Number"),
        Shape::Boolean => Some("Boolean"),
        Shape::List(_) | Shape::Set(_) => Some("List"),
        Shape::Record(_) | Shape::Map(_) => Some("Map"),
        Shape::Nothing => Some("Null"),
        Shape::Union(_) | Shape::Function(_) | Shape::Never => None,
    }
}

/// Builder for runtime type dispatch over a union value.
///
/// Compiles to an `#if`/`#elseif`/`#else` ladder testing
/// `$util.typeOf(...)`; arms resume with the value retyped as the member.
pub struct Match {
    scrutinee: TypedValue,
    members: Vec<Shape>,
    matched: Vec<Shape>,
    arms: Vec<(TypedValue, BoxedProgram)>,
}

impl TypedValue {
    /// Start a type dispatch over this union value.
    pub fn matching(&self) -> CompileResult<Match> {
        let Shape::Union(members) = self.shape() else {
            return Err(CompileError::Operator {
                op: "match",
                shape: self.shape().to_string(),
            });
        };
        Ok(Match {
            scrutinee: self.clone(),
            members: members.clone(),
            matched: Vec::new(),
            arms: Vec::new(),
        })
    }
}

impl Match {
    fn unmatchable(&self, member: &Shape, detail: String) -> CompileError {
        CompileError::UnmatchableMember {
            member: member.to_string(),
            union: self.scrutinee.shape().to_string(),
            detail,
        }
    }

    /// Add an arm for `member`.
    pub fn when<F>(mut self, member: Shape, handler: F) -> CompileResult<Self>
    where
        F: FnOnce(TypedValue) -> BoxedProgram,
    {
        if !self.members.contains(&member) {
            return Err(self.unmatchable(&member, "not a member of the union".into()));
        }
        if self.matched.contains(&member) {
            return Err(self.unmatchable(&member, "already matched".into()));
        }
        let Some(name) = runtime_type_name(&member) else {
            return Err(self.unmatchable(&member, "no runtime type name".into()));
        };
        if let Some(twin) = self
            .members
            .iter()
            .find(|other| **other != member && runtime_type_name(other) == Some(name))
        {
            return Err(self.unmatchable(
                &member,
                format!("shares runtime type {name} with {twin}"),
            ));
        }

        let test = Expr::call("$util.typeOf", [self.scrutinee.expr().clone()]);
        let condition = TypedValue {
            shape: Shape::Boolean,
            kind: Kind::Boolean,
            expr: Expr::binary(&test, "==", &Expr::text(format!("\"{name}\""))),
        };
        let body = handler(self.scrutinee.retyped(member.clone())?);
        self.matched.push(member);
        self.arms.push((condition, body));
        Ok(self)
    }

    /// Close with a fallback arm receiving the unmatched members.
    pub fn otherwise<F>(self, handler: F) -> CompileResult<Statement>
    where
        F: FnOnce(TypedValue) -> BoxedProgram,
    {
        let rest = Shape::union(
            self.members
                .iter()
                .filter(|member| !self.matched.contains(member))
                .cloned(),
        );
        let body = handler(self.scrutinee.retyped(rest)?);
        Ok(self.chain()?.otherwise(body))
    }

    /// Close without a fallback arm.
    pub fn end(self) -> CompileResult<Statement> {
        Ok(self.chain()?.end())
    }

    fn chain(self) -> CompileResult<IfChain> {
        let mut arms = self.arms.into_iter();
        let Some((condition, body)) = arms.next() else {
            return Err(CompileError::Invariant("match without arms".into()));
        };
        Ok(arms.fold(program::when(condition, body), |chain, (condition, body)| {
            chain.else_if(condition, body)
        }))
    }
}
