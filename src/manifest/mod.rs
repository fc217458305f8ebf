//! JSON manifests describing an API: types, root fields and their steps.
//!
//! A manifest is decoded with serde and lowered into an [`Api`] whose field
//! programs are [`Script`]s.

/// Type reference parser.
pub mod type_ref;

use indexmap::IndexMap;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::api::{Api, FieldResolver};
use crate::compiler::CacheSpec;
use crate::config::CompilerConfig;
use crate::data_source::DataSource;
use crate::error::{ManifestError, ManifestResult};
use crate::program::{Fragment, Instr, MatchArm, Operand, Script, StashScope};
use crate::schema::{AuthMode, FieldMetadata, SchemaRoots, SubscriptionSpec};
use crate::shape::{RecordShape, Shape, TypeCatalog};
use crate::template::Literal;
use crate::value::TypedValue;
use crate::value::ops::ArithOp;

/// Decoded manifest.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Manifest {
    /// Embedded compiler configuration.
    pub config: Option<CompilerConfig>,
    /// Named data sources referenced by `call` steps.
    pub data_sources: IndexMap<String, DataSource>,
    /// Record types: name to field type references.
    pub types: IndexMap<String, IndexMap<String, String>>,
    /// Query root fields.
    pub query: IndexMap<String, FieldSpec>,
    /// Mutation root fields.
    pub mutation: IndexMap<String, FieldSpec>,
    /// Subscription root fields.
    pub subscription: IndexMap<String, FieldSpec>,
    /// API-level cache hints.
    pub cache_overrides: Vec<CacheOverride>,
}

/// One root field.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    /// Argument name to type reference.
    #[serde(default)]
    pub args: IndexMap<String, String>,
    /// Return type reference.
    pub returns: String,
    /// Authorization modes.
    #[serde(default)]
    pub auth: Vec<AuthMode>,
    /// Cache hint.
    #[serde(default)]
    pub cache: Option<CacheSpec>,
    /// Subscription trigger.
    #[serde(default)]
    pub subscribe: Option<SubscriptionSpec>,
    /// Resolver steps; fields without steps only appear in the schema,
    /// directives included.
    #[serde(default)]
    pub steps: Option<Vec<StepSpec>>,
}

/// API-level cache hint for one field.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheOverride {
    /// Parent type.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Field name.
    pub field: String,
    /// Hint.
    #[serde(flatten)]
    pub spec: CacheSpec,
}

/// Piece of a `write` step.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartSpec {
    /// Raw text.
    Text(String),
    /// Value expression.
    Value(OperandSpec),
    /// Line break.
    Line,
}

/// Literal with an optional type reference.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LiteralSpec {
    /// JSON value.
    pub value: serde_json::Value,
    /// Type reference; inferred for scalars when absent.
    #[serde(default, rename = "type")]
    pub type_ref: Option<String>,
}

/// Operand syntax.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperandSpec {
    /// Register with an optional dotted field path (`args.id`).
    Var(String),
    /// Literal value.
    Lit(LiteralSpec),
    /// `==`
    Eq(Box<OperandSpec>, Box<OperandSpec>),
    /// `!=`
    Ne(Box<OperandSpec>, Box<OperandSpec>),
    /// `>`
    Gt(Box<OperandSpec>, Box<OperandSpec>),
    /// `>=`
    Ge(Box<OperandSpec>, Box<OperandSpec>),
    /// `<`
    Lt(Box<OperandSpec>, Box<OperandSpec>),
    /// `<=`
    Le(Box<OperandSpec>, Box<OperandSpec>),
    /// `&&`
    And(Box<OperandSpec>, Box<OperandSpec>),
    /// `||`
    Or(Box<OperandSpec>, Box<OperandSpec>),
    /// `!`
    Not(Box<OperandSpec>),
    /// Null test.
    IsNull(Box<OperandSpec>),
    /// Upper-case.
    Upper(Box<OperandSpec>),
    /// Lower-case.
    Lower(Box<OperandSpec>),
    /// Size.
    Size(Box<OperandSpec>),
    /// Emptiness.
    IsEmpty(Box<OperandSpec>),
    /// Index or key lookup.
    Get(Box<OperandSpec>, Box<OperandSpec>),
    /// Membership.
    Has(Box<OperandSpec>, Box<OperandSpec>),
    /// Current time.
    Now,
}

/// One `if` arm.
#[derive(Debug, Clone, Deserialize)]
pub struct ArmSpec {
    /// Condition.
    pub when: OperandSpec,
    /// Body.
    pub then: Vec<StepSpec>,
}

/// One `match` arm.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchArmSpec {
    /// Member type reference; absent on the fallback arm.
    #[serde(default, rename = "type")]
    pub type_ref: Option<String>,
    /// Register receiving the narrowed value.
    pub bind: String,
    /// Body.
    pub then: Vec<StepSpec>,
}

/// Step syntax, one per script instruction.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StepSpec {
    /// Append text.
    Write {
        /// Parts in order.
        parts: Vec<PartSpec>,
    },
    /// Bind a register.
    Let {
        /// Register.
        into: String,
        /// Value.
        value: OperandSpec,
    },
    /// Stash a value.
    Stash {
        /// Register.
        into: String,
        /// Value.
        value: OperandSpec,
        /// Variable identifier.
        #[serde(default)]
        id: Option<String>,
        /// Scope override.
        #[serde(default)]
        scope: Option<StashScope>,
    },
    /// Call a data source.
    Call {
        /// Register for the response.
        into: String,
        /// Data-source name.
        data_source: String,
        /// Request payload.
        request: OperandSpec,
        /// Response type reference.
        response: String,
    },
    /// Arithmetic.
    Arith {
        /// Register.
        into: String,
        /// Operator.
        op_kind: ArithOp,
        /// Left operand.
        left: OperandSpec,
        /// Right operand.
        right: OperandSpec,
    },
    /// Append to a collection.
    Append {
        /// Collection.
        list: OperandSpec,
        /// Item.
        item: OperandSpec,
    },
    /// Insert into a map.
    Put {
        /// Map.
        map: OperandSpec,
        /// Key.
        key: OperandSpec,
        /// Value.
        value: OperandSpec,
    },
    /// Loop.
    ForEach {
        /// Collection.
        list: OperandSpec,
        /// Item register.
        item: String,
        /// Body.
        body: Vec<StepSpec>,
    },
    /// Conditional chain.
    If {
        /// Register for the result.
        #[serde(default)]
        into: Option<String>,
        /// Arms.
        arms: Vec<ArmSpec>,
        /// Else body.
        #[serde(default)]
        otherwise: Option<Vec<StepSpec>>,
    },
    /// Union dispatch.
    Match {
        /// Register for the result.
        #[serde(default)]
        into: Option<String>,
        /// Union value.
        value: OperandSpec,
        /// Arms.
        arms: Vec<MatchArmSpec>,
        /// Fallback arm.
        #[serde(default)]
        otherwise: Option<MatchArmSpec>,
    },
    /// Complete.
    Return {
        /// Result.
        #[serde(default)]
        value: Option<OperandSpec>,
    },
    /// Declared failure.
    Raise {
        /// Error value.
        value: OperandSpec,
    },
}

impl Manifest {
    /// Read and decode a manifest file.
    pub fn load(path: &Path) -> ManifestResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Decode manifest JSON.
    pub fn parse(text: &str) -> ManifestResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Build the type catalog from `types`.
    pub fn catalog(&self) -> ManifestResult<TypeCatalog> {
        let mut catalog = TypeCatalog::new();
        for name in self.types.keys() {
            catalog.declare(name);
        }
        for (name, fields) in &self.types {
            let mut shapes = IndexMap::with_capacity(fields.len());
            for (field, reference) in fields {
                shapes.insert(field.clone(), type_ref::parse(reference, &catalog)?);
            }
            if let Some(record) = catalog.get(name) {
                record.define(shapes);
            }
        }
        Ok(catalog)
    }

    /// Lower into an [`Api`]. `config` wins over the embedded configuration.
    pub fn into_api(self, config: Option<CompilerConfig>) -> ManifestResult<Api> {
        let catalog = self.catalog()?;
        let config = config.or(self.config).unwrap_or_default();

        let mut roots = SchemaRoots::default();
        let mut resolvers = Vec::new();
        let mut schema_only = Vec::new();
        for (type_name, fields) in [
            ("Query", self.query),
            ("Mutation", self.mutation),
            ("Subscription", self.subscription),
        ] {
            if fields.is_empty() {
                continue;
            }
            let mut shapes = IndexMap::with_capacity(fields.len());
            for (field_name, spec) in fields {
                shapes.insert(field_name.clone(), spec.shape(&catalog)?);
                if let Some(steps) = &spec.steps {
                    let lowering = Lowering {
                        field: format!("{type_name}.{field_name}"),
                        catalog: &catalog,
                        data_sources: &self.data_sources,
                    };
                    let instrs = lowering.steps(steps)?;
                    resolvers.push((type_name, field_name, spec.metadata(), instrs));
                } else {
                    schema_only.push((type_name, field_name, spec.metadata()));
                }
            }
            let root = Some(RecordShape::named(type_name, shapes));
            match type_name {
                "Query" => roots.query = root,
                "Mutation" => roots.mutation = root,
                _ => roots.subscription = root,
            }
        }

        let mut api = Api::new(roots, catalog, config);
        for (type_name, field_name, metadata, instrs) in resolvers {
            api.resolver(
                type_name,
                &field_name,
                FieldResolver::new(metadata, move |context| {
                    Box::new(Script::for_field(instrs.clone(), context))
                }),
            );
        }
        for (type_name, field_name, metadata) in schema_only {
            api.field_metadata(type_name, &field_name, metadata);
        }
        for CacheOverride {
            type_name,
            field,
            spec,
        } in self.cache_overrides
        {
            api.cache_override(&type_name, &field, spec);
        }
        Ok(api)
    }
}

impl FieldSpec {
    fn shape(&self, catalog: &TypeCatalog) -> ManifestResult<Shape> {
        let returns = type_ref::parse(&self.returns, catalog)?;
        if self.args.is_empty() {
            return Ok(returns);
        }
        let mut args = IndexMap::with_capacity(self.args.len());
        for (name, reference) in &self.args {
            args.insert(name.clone(), type_ref::parse(reference, catalog)?);
        }
        Ok(Shape::function(args, returns))
    }

    fn metadata(&self) -> FieldMetadata {
        FieldMetadata {
            auth: self.auth.clone(),
            cache: self.cache.clone(),
            subscribe: self.subscribe.clone(),
        }
    }
}

struct Lowering<'a> {
    field: String,
    catalog: &'a TypeCatalog,
    data_sources: &'a IndexMap<String, DataSource>,
}

impl Lowering<'_> {
    fn steps(&self, steps: &[StepSpec]) -> ManifestResult<Vec<Instr>> {
        steps.iter().map(|step| self.step(step)).collect()
    }

    fn shape(&self, reference: &str) -> ManifestResult<Shape> {
        type_ref::parse(reference, self.catalog)
    }

    fn data_source(&self, name: &str) -> ManifestResult<DataSource> {
        if name == "NONE" {
            return Ok(DataSource::None);
        }
        self.data_sources
            .get(name)
            .cloned()
            .ok_or_else(|| ManifestError::UnknownDataSource(name.to_string()))
    }

    fn step(&self, step: &StepSpec) -> ManifestResult<Instr> {
        Ok(match step {
            StepSpec::Write { parts } => Instr::Write(
                parts
                    .iter()
                    .map(|part| {
                        Ok(match part {
                            PartSpec::Text(text) => Fragment::Text(text.clone()),
                            PartSpec::Value(value) => Fragment::Value(self.operand(value)?),
                            PartSpec::Line => Fragment::Line,
                        })
                    })
                    .collect::<ManifestResult<_>>()?,
            ),
            StepSpec::Let { into, value } => Instr::Let {
                into: into.clone(),
                value: self.operand(value)?,
            },
            StepSpec::Stash {
                into,
                value,
                id,
                scope,
            } => Instr::Stash {
                into: into.clone(),
                value: self.operand(value)?,
                id: id.clone(),
                scope: *scope,
            },
            StepSpec::Call {
                into,
                data_source,
                request,
                response,
            } => Instr::Call {
                into: into.clone(),
                data_source: self.data_source(data_source)?,
                request: self.operand(request)?,
                response: self.shape(response)?,
            },
            StepSpec::Arith {
                into,
                op_kind,
                left,
                right,
            } => Instr::Arith {
                into: into.clone(),
                op: *op_kind,
                left: self.operand(left)?,
                right: self.operand(right)?,
            },
            StepSpec::Append { list, item } => Instr::Append {
                list: self.operand(list)?,
                item: self.operand(item)?,
            },
            StepSpec::Put { map, key, value } => Instr::Put {
                map: self.operand(map)?,
                key: self.operand(key)?,
                value: self.operand(value)?,
            },
            StepSpec::ForEach { list, item, body } => Instr::ForEach {
                list: self.operand(list)?,
                item: item.clone(),
                body: self.steps(body)?,
            },
            StepSpec::If {
                into,
                arms,
                otherwise,
            } => Instr::If {
                into: into.clone(),
                arms: arms
                    .iter()
                    .map(|arm| Ok((self.operand(&arm.when)?, self.steps(&arm.then)?)))
                    .collect::<ManifestResult<_>>()?,
                otherwise: otherwise.as_deref().map(|body| self.steps(body)).transpose()?,
            },
            StepSpec::Match {
                into,
                value,
                arms,
                otherwise,
            } => Instr::Match {
                into: into.clone(),
                scrutinee: self.operand(value)?,
                arms: arms
                    .iter()
                    .map(|arm| self.match_arm(arm, false))
                    .collect::<ManifestResult<_>>()?,
                otherwise: otherwise
                    .as_ref()
                    .map(|arm| self.match_arm(arm, true))
                    .transpose()?,
            },
            StepSpec::Return { value } => {
                Instr::Return(value.as_ref().map(|value| self.operand(value)).transpose()?)
            }
            StepSpec::Raise { value } => Instr::Raise(self.operand(value)?),
        })
    }

    fn match_arm(&self, arm: &MatchArmSpec, fallback: bool) -> ManifestResult<MatchArm> {
        let member = match (&arm.type_ref, fallback) {
            (Some(reference), _) => self.shape(reference)?,
            (None, true) => Shape::Never,
            (None, false) => {
                return Err(ManifestError::TypeRef {
                    reference: String::new(),
                    detail: format!("{}: match arm without a type", self.field),
                });
            }
        };
        Ok(MatchArm {
            member,
            bind: arm.bind.clone(),
            body: self.steps(&arm.then)?,
        })
    }

    fn operand(&self, spec: &OperandSpec) -> ManifestResult<Operand> {
        let unary = |inner: &OperandSpec| self.operand(inner).map(Box::new);
        let pair = |l: &OperandSpec, r: &OperandSpec| -> ManifestResult<(Box<Operand>, Box<Operand>)> {
            Ok((Box::new(self.operand(l)?), Box::new(self.operand(r)?)))
        };
        Ok(match spec {
            OperandSpec::Var(path) => {
                let mut segments = path.split('.');
                let root = segments.next().unwrap_or_default();
                segments.fold(Operand::var(root), |operand, name| operand.field(name))
            }
            OperandSpec::Lit(literal) => Operand::Value(self.literal(literal)?),
            OperandSpec::Eq(l, r) => pair(l, r).map(|(l, r)| Operand::Eq(l, r))?,
            OperandSpec::Ne(l, r) => pair(l, r).map(|(l, r)| Operand::Ne(l, r))?,
            OperandSpec::Gt(l, r) => pair(l, r).map(|(l, r)| Operand::Gt(l, r))?,
            OperandSpec::Ge(l, r) => pair(l, r).map(|(l, r)| Operand::Ge(l, r))?,
            OperandSpec::Lt(l, r) => pair(l, r).map(|(l, r)| Operand::Lt(l, r))?,
            OperandSpec::Le(l, r) => pair(l, r).map(|(l, r)| Operand::Le(l, r))?,
            OperandSpec::And(l, r) => pair(l, r).map(|(l, r)| Operand::And(l, r))?,
            OperandSpec::Or(l, r) => pair(l, r).map(|(l, r)| Operand::Or(l, r))?,
            OperandSpec::Get(l, r) => pair(l, r).map(|(l, r)| Operand::Get(l, r))?,
            OperandSpec::Has(l, r) => pair(l, r).map(|(l, r)| Operand::Has(l, r))?,
            OperandSpec::Not(inner) => Operand::Not(unary(inner)?),
            OperandSpec::IsNull(inner) => Operand::IsNull(unary(inner)?),
            OperandSpec::Upper(inner) => Operand::Upper(unary(inner)?),
            OperandSpec::Lower(inner) => Operand::Lower(unary(inner)?),
            OperandSpec::Size(inner) => Operand::Size(unary(inner)?),
            OperandSpec::IsEmpty(inner) => Operand::IsEmpty(unary(inner)?),
            OperandSpec::Now => Operand::Now,
        })
    }

    fn literal(&self, spec: &LiteralSpec) -> ManifestResult<TypedValue> {
        let shape = match &spec.type_ref {
            Some(reference) => self.shape(reference)?,
            None => match &spec.value {
                serde_json::Value::Null => Shape::Nothing,
                serde_json::Value::Bool(_) => Shape::Boolean,
                serde_json::Value::String(_) => Shape::String,
                serde_json::Value::Number(n) if n.is_i64() => Shape::Integer,
                serde_json::Value::Number(_) => Shape::Float,
                other => {
                    return Err(ManifestError::TypeRef {
                        reference: other.to_string(),
                        detail: format!("{}: structured literals need a type", self.field),
                    });
                }
            },
        };
        TypedValue::literal(shape, Literal::from(spec.value.clone())).map_err(|source| {
            ManifestError::Lowering {
                field: self.field.clone(),
                source,
            }
        })
    }
}
