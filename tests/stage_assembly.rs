//! Stage assembly tests
//!
//! Compiles whole field programs and checks the resolver shape: unit
//! resolvers for zero or one data-source call, pipelines beyond that.

use indexmap::IndexMap;
use stagewright::compiler::compile_field;
use stagewright::program::{
    Fragment, Instr, MatchArm, Operand, Script, Sequence, returning, when,
};
use stagewright::schema::FieldMetadata;
use stagewright::template::{Expr, Literal};
use stagewright::value::ops::ArithOp;
use stagewright::{
    CompilerConfig, DataSource, RecordShape, ResolverPipeline, Shape, Statement, TypedValue,
};

fn lambda(name: &str) -> DataSource {
    DataSource::Lambda {
        name: name.to_string(),
    }
}

fn user() -> Shape {
    let mut fields = IndexMap::new();
    fields.insert("id".to_string(), Shape::String);
    fields.insert("name".to_string(), Shape::String);
    Shape::Record(RecordShape::named("User", fields))
}

fn compile(instrs: Vec<Instr>) -> ResolverPipeline {
    compile_field(
        "Query",
        "field",
        Box::new(Script::new(instrs)),
        &FieldMetadata::default(),
        None,
        &CompilerConfig::default(),
    )
    .unwrap()
    .pipeline
}

fn call(into: &str, source: &str) -> Instr {
    Instr::Call {
        into: into.to_string(),
        data_source: lambda(source),
        request: Operand::Value(TypedValue::string(into)),
        response: user(),
    }
}

#[test]
fn literal_without_calls_is_a_unit_none_resolver() {
    let resolver = compile_field(
        "Query",
        "hello",
        returning(Some(TypedValue::string("hi"))),
        &FieldMetadata::default(),
        None,
        &CompilerConfig::default(),
    )
    .unwrap()
    .pipeline;

    let ResolverPipeline::Unit(stage) = &resolver else {
        panic!("expected unit resolver, got {resolver:?}");
    };
    assert_eq!(stage.data_source, DataSource::None);
    let request: serde_json::Value = serde_json::from_str(&stage.request_template).unwrap();
    assert_eq!(request["version"], "2017-02-28");
    assert_eq!(request["payload"], "hi");
    assert_eq!(stage.response_template, "$util.toJson(\"hi\")");
}

#[test]
fn programs_without_calls_always_use_the_none_source() {
    let programs = vec![
        vec![],
        vec![Instr::Write(vec![Fragment::Text("## note".into())])],
        vec![
            Instr::Stash {
                into: "n".into(),
                value: Operand::Value(TypedValue::integer(4)),
                id: None,
                scope: None,
            },
            Instr::Return(Some(Operand::var("n"))),
        ],
    ];
    for instrs in programs {
        let resolver = compile(instrs);
        assert!(!resolver.is_pipeline());
        assert_eq!(resolver.stages()[0].data_source, DataSource::None);
    }
}

#[test]
fn one_call_returning_its_result_has_no_leftover_text() {
    let resolver = compile(vec![
        call("u", "users"),
        Instr::Return(Some(Operand::var("u"))),
    ]);
    let ResolverPipeline::Unit(stage) = resolver else {
        panic!("expected unit resolver");
    };
    assert_eq!(stage.data_source, lambda("users"));
    assert_eq!(
        stage.response_template,
        "#set($context.stash.result1 = $context.result)\n$util.toJson($context.stash.result1)"
    );
}

#[test]
fn single_stage_keeps_pre_and_post_call_text_in_order() {
    let text = |t: &str| Fragment::Text(t.to_string());
    let resolver = compile(vec![
        Instr::Write(vec![text("## before"), Fragment::Line]),
        call("u", "users"),
        Instr::Write(vec![text("## after"), Fragment::Line]),
        Instr::Return(Some(Operand::var("u").field("name"))),
    ]);
    let stage = &resolver.stages()[0];
    assert!(stage.request_template.starts_with("## before\n{"));
    assert_eq!(
        stage.response_template,
        "#set($context.stash.result1 = $context.result)\n## after\n$util.toJson($context.stash.result1.name)"
    );
}

#[test]
fn several_calls_form_a_pipeline() {
    for count in 2..5 {
        let mut instrs: Vec<Instr> = (0..count)
            .map(|idx| call(&format!("r{idx}"), &format!("source{idx}")))
            .collect();
        instrs.push(Instr::Return(Some(Operand::var(format!("r{}", count - 1)))));
        let resolver = compile(instrs);

        let ResolverPipeline::Pipeline {
            stages,
            request_template,
            response_template,
        } = &resolver
        else {
            panic!("expected pipeline");
        };
        assert_eq!(stages.len(), count);
        assert_eq!(request_template, "{}");
        for stage in stages {
            assert!(stage.response_template.ends_with("{}"));
        }
        assert_eq!(
            response_template,
            &format!("$util.toJson($context.stash.result{count})")
        );
    }
}

#[test]
fn later_calls_can_use_earlier_results() {
    let resolver = compile(vec![
        call("u", "users"),
        Instr::Call {
            into: "p".into(),
            data_source: lambda("posts"),
            request: Operand::var("u").field("id"),
            response: Shape::list(Shape::String),
        },
        Instr::Return(Some(Operand::var("p"))),
    ]);
    assert_eq!(
        resolver.stages()[1].request_template,
        "{\"version\": \"2018-05-29\", \"operation\": \"Invoke\", \"payload\": $util.toJson($context.stash.result1.id)}"
    );
}

#[test]
fn if_record_else_nothing_yields_a_nullable_record() {
    let found = TypedValue::literal(
        user(),
        Literal::from(serde_json::json!({"id": "1", "name": "Ada"})),
    )
    .unwrap();
    let flag = TypedValue::reference(Shape::Boolean, "$context.arguments.flag").unwrap();

    let seen = std::rc::Rc::new(std::cell::RefCell::new(None));
    let program = Capture {
        statement: Some(when(flag, returning(Some(found))).otherwise(returning(None))),
        seen: seen.clone(),
    };
    let resolver = compile_field(
        "Query",
        "maybe",
        Box::new(program),
        &FieldMetadata::default(),
        None,
        &CompilerConfig::default(),
    )
    .unwrap()
    .pipeline;

    let result = seen.borrow().clone().unwrap();
    assert!(result.shape().is_nullable());
    assert_eq!(result.shape().without_nothing(), Some(user()));

    let text = resolver.response_template();
    assert!(text.starts_with("#if($context.arguments.flag)\n"));
    assert!(text.contains("#else\n#end\n"));
    assert!(text.ends_with("$util.toJson($context.stash.var1)"));
}

#[test]
fn all_empty_branches_emit_no_shared_stash() {
    let flag = TypedValue::reference(Shape::Boolean, "$f").unwrap();
    let program = Sequence::boxed(
        vec![
            when(flag, Sequence::boxed(vec![Statement::write([Expr::text("## a")])], None))
                .otherwise(returning(None)),
        ],
        None,
    );
    let resolver = compile_field(
        "Query",
        "noop",
        program,
        &FieldMetadata::default(),
        None,
        &CompilerConfig::default(),
    )
    .unwrap()
    .pipeline;
    assert!(!resolver.response_template().contains("#set"));
    assert_eq!(
        resolver.response_template(),
        "#if($f)\n  ## a\n#else\n#end\n{}"
    );
}

#[test]
fn declared_failures_are_written_not_propagated() {
    let resolver = compile(vec![
        Instr::If {
            into: None,
            arms: vec![(
                Operand::Value(TypedValue::reference(Shape::Boolean, "$denied").unwrap()),
                vec![Instr::Raise(Operand::Value(TypedValue::string("denied")))],
            )],
            otherwise: None,
        },
        Instr::Return(Some(Operand::Value(TypedValue::integer(1)))),
    ]);
    assert_eq!(
        resolver.response_template(),
        "#if($denied)\n  $util.error(\"denied\")\n#end\n$util.toJson(1)"
    );
}

/// Completes with whatever the yielded statement resumed with.
struct Capture {
    statement: Option<Statement>,
    seen: std::rc::Rc<std::cell::RefCell<Option<TypedValue>>>,
}

impl stagewright::Program for Capture {
    fn resume(
        &mut self,
        input: Option<TypedValue>,
    ) -> Result<stagewright::Step, stagewright::Thrown> {
        match self.statement.take() {
            Some(statement) => Ok(stagewright::Step::Yield(statement)),
            None => {
                *self.seen.borrow_mut() = input.clone();
                Ok(stagewright::Step::Complete(input))
            }
        }
    }
}

const TYPE_LADDER: &str = "#if($util.typeOf($v) == \"String\")\n  #set($context.stash.var1 = $v)\n\
#elseif($util.typeOf($v) == \"Number\")\n  #set($context.stash.var1 = $v)\n\
#else\n#end\n$util.toJson($context.stash.var1)";

#[test]
fn union_dispatch_unifies_arm_results() {
    let members = Shape::union([Shape::String, Shape::Integer, Shape::Nothing]);
    let scrutinee = TypedValue::reference(members.clone(), "$v").unwrap();
    let statement = scrutinee
        .matching()
        .unwrap()
        .when(Shape::String, |s| returning(Some(s)))
        .unwrap()
        .when(Shape::Integer, |n| returning(Some(n)))
        .unwrap()
        .otherwise(|_| returning(None))
        .unwrap();

    let seen = std::rc::Rc::new(std::cell::RefCell::new(None));
    let resolver = compile_field(
        "Query",
        "either",
        Box::new(Capture {
            statement: Some(statement),
            seen: seen.clone(),
        }),
        &FieldMetadata::default(),
        None,
        &CompilerConfig::default(),
    )
    .unwrap()
    .pipeline;

    assert_eq!(resolver.response_template(), TYPE_LADDER);
    let result = seen.borrow().clone().unwrap();
    assert_eq!(result.shape(), &members);
    assert_eq!(result.expr().to_text(), "$context.stash.var1");
}

#[test]
fn scripted_match_renders_the_same_ladder() {
    let scrutinee = TypedValue::reference(
        Shape::union([Shape::String, Shape::Integer, Shape::Nothing]),
        "$v",
    )
    .unwrap();
    let arm = |member: Shape| MatchArm {
        member,
        bind: "x".into(),
        body: vec![Instr::Return(Some(Operand::var("x")))],
    };
    let resolver = compile(vec![
        Instr::Match {
            into: Some("r".into()),
            scrutinee: Operand::Value(scrutinee),
            arms: vec![arm(Shape::String), arm(Shape::Integer)],
            otherwise: Some(MatchArm {
                member: Shape::Never,
                bind: "rest".into(),
                body: vec![Instr::Return(None)],
            }),
        },
        Instr::Return(Some(Operand::var("r"))),
    ]);
    assert_eq!(resolver.response_template(), TYPE_LADDER);
}

#[test]
fn arithmetic_survives_into_later_stages() {
    let resolver = compile(vec![
        Instr::Arith {
            into: "sum".into(),
            op: ArithOp::Add,
            left: Operand::Value(TypedValue::integer(1)),
            right: Operand::Value(TypedValue::integer(2)),
        },
        call("u", "users"),
        Instr::Return(Some(Operand::var("sum"))),
    ]);
    let stage = &resolver.stages()[0];
    assert!(
        stage
            .request_template
            .starts_with("#set($context.stash.var1 = 1 + 2)\n"),
        "{}",
        stage.request_template
    );
    assert!(!stage.request_template.contains("$local"));
    assert!(
        stage
            .response_template
            .ends_with("$util.toJson($context.stash.var1)")
    );
}
