//! Error types for the resolver compiler
//!
//! Field compilation, schema emission and manifest loading each get their own
//! `thiserror` enum, with a result alias next to it.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Field-scoped compilation error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// A literal value did not structurally match the declared shape.
    #[error("literal mismatch at {path}: expected {expected}, found {found}")]
    LiteralMismatch {
        /// Path to the offending element (`$`, `$.field`, `$[2]`).
        path: String,
        /// Shape that was expected at that path.
        expected: String,
        /// Short description of the literal that was found instead.
        found: String,
    },

    /// A literal could not be classified as JSON (non-finite float).
    #[error("unclassifiable literal at {path}: {detail}")]
    UnclassifiableLiteral {
        /// Path to the offending element.
        path: String,
        /// What made the literal unrepresentable.
        detail: String,
    },

    /// A value-level operator was applied to a value of the wrong shape.
    #[error("operator `{op}` is not defined for {shape}")]
    Operator {
        /// Operator name.
        op: &'static str,
        /// Display form of the operand shape.
        shape: String,
    },

    /// Field access on a record that does not declare the field.
    #[error("record {record} has no field `{field}`")]
    UnknownField {
        /// Display form of the record shape.
        record: String,
        /// Requested field name.
        field: String,
    },

    /// A function shape was used where a value is required.
    #[error("{0} cannot be used as a value")]
    NotAValue(String),

    /// Caller-supplied stash names must be ASCII identifiers.
    #[error("invalid stash identifier `{0}`")]
    InvalidIdentifier(String),

    /// Data-source calls split the template; they cannot sit inside a block.
    #[error("data-source call to `{data_source}` inside a loop or branch block")]
    CallInsideBlock {
        /// Name of the data source being invoked.
        data_source: String,
    },

    /// Union dispatch on a member the runtime type test cannot single out.
    #[error("cannot match {member} within {union}: {detail}")]
    UnmatchableMember {
        /// Candidate member.
        member: String,
        /// Union being matched.
        union: String,
        /// Why the member is not distinguishable.
        detail: String,
    },

    /// Error raised by host program code that is not a declared failure.
    #[error("program fault: {0}")]
    Program(String),

    /// Contract violation by the host application (bad register, malformed chain).
    #[error("compiler invariant violated: {0}")]
    Invariant(String),
}

impl CompileError {
    /// Whether this error is a host contract violation that aborts the whole run.
    pub fn is_invariant(&self) -> bool {
        matches!(self, CompileError::Invariant(_))
    }
}

/// Convenience result alias for field compilation.
pub type CompileResult<T> = std::result::Result<T, CompileError>;

/// Compilation failure attributed to one field.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{type_name}.{field_name} (statement {statement}): {error}")]
pub struct FieldFailure {
    /// Parent type of the failing field.
    pub type_name: String,
    /// Failing field.
    pub field_name: String,
    /// Number of statements dispatched before the failure.
    pub statement: usize,
    /// Underlying error.
    pub error: CompileError,
}

/// Schema emission errors, scoped to one type or field path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Record reached from a GraphQL position without a fully-qualified name.
    #[error("record at {path} has no fully-qualified name")]
    MissingName {
        /// Field path that reached the record.
        path: String,
    },

    /// Map shapes have no GraphQL rendition.
    #[error("map type at {path} cannot appear in a GraphQL position")]
    MapInGraphQl {
        /// Field path of the map.
        path: String,
    },

    /// Input records may only carry scalar members.
    #[error("input {input} member `{member}` is not a scalar")]
    NonScalarInput {
        /// Input type name.
        input: String,
        /// Offending member.
        member: String,
    },

    /// Unions of several present members need a schema name.
    #[error("union at {path} has several members and no name")]
    UnnamedUnion {
        /// Field path of the union.
        path: String,
    },

    /// Absent/never shapes cannot stand alone in a field position.
    #[error("{path} has no GraphQL type ({shape})")]
    NoGraphQlType {
        /// Field path.
        path: String,
        /// Display form of the shape.
        shape: String,
    },

    /// The same name is used for an `input` and a `type`.
    #[error("`{0}` is emitted both as an input and as a type")]
    NameCollision(String),

    /// Every root is absent or has no fields.
    #[error("schema has no query, mutation or subscription fields")]
    NoRoots,
}

/// Manifest and configuration loading errors.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Reading the file failed.
    #[error("failed to read {path:?}: {source}")]
    Io {
        /// File being read.
        path: PathBuf,
        /// IO error.
        #[source]
        source: io::Error,
    },

    /// JSON decoding failed.
    #[error("invalid manifest JSON: {0}")]
    Decode(#[from] serde_json::Error),

    /// Type reference could not be parsed or resolved.
    #[error("bad type reference `{reference}`: {detail}")]
    TypeRef {
        /// Reference text.
        reference: String,
        /// Why it was rejected.
        detail: String,
    },

    /// A step refers to a data source that is not declared.
    #[error("unknown data source `{0}`")]
    UnknownDataSource(String),

    /// A step or literal failed to lower.
    #[error("field {field}: {source}")]
    Lowering {
        /// `Type.field` being lowered.
        field: String,
        /// Underlying error.
        #[source]
        source: CompileError,
    },
}

/// Convenience result alias for manifest operations.
pub type ManifestResult<T> = std::result::Result<T, ManifestError>;
