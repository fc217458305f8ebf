//! Structural type descriptors supplied by the host application.
//!
//! Records are reference counted and may be declared before their fields are
//! defined, which is how recursive types (`User.friends: [User]`) are built.
//! Named records compare by fully-qualified name; everything else compares
//! structurally.

use indexmap::IndexMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Type descriptor for values flowing through resolver programs.
#[derive(Debug, Clone)]
pub enum Shape {
    /// UTF-8 string.
    String,
    /// Signed integer.
    Integer,
    /// Floating-point number.
    Float,
    /// Boolean.
    Boolean,
    /// ISO-8601 timestamp.
    Timestamp,
    /// Binary blob, carried as base64 text.
    Binary,
    /// The absent value.
    Nothing,
    /// Uninhabited type; produced by an empty union.
    Never,
    /// Ordered list.
    List(Box<Shape>),
    /// Set of distinct items.
    Set(Box<Shape>),
    /// String-keyed map.
    Map(Box<Shape>),
    /// Record with named fields.
    Record(Arc<RecordShape>),
    /// Union of member shapes (never nested, never duplicated).
    Union(Vec<Shape>),
    /// Field with arguments.
    Function(Arc<FunctionShape>),
}

/// Record type: ordered named fields plus an optional fully-qualified name.
pub struct RecordShape {
    fqn: Option<String>,
    fields: OnceLock<IndexMap<String, Shape>>,
}

/// Function type: named arguments and a return shape.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionShape {
    /// Arguments in declaration order.
    pub args: IndexMap<String, Shape>,
    /// Return shape.
    pub returns: Shape,
}

impl RecordShape {
    /// Named record with the given fields.
    pub fn named(fqn: impl Into<String>, fields: IndexMap<String, Shape>) -> Arc<Self> {
        let record = Self::declare(fqn);
        let _ = record.fields.set(fields);
        record
    }

    /// Record without a fully-qualified name (usable in templates, not in schemas).
    pub fn anonymous(fields: IndexMap<String, Shape>) -> Arc<Self> {
        Arc::new(Self {
            fqn: None,
            fields: OnceLock::from(fields),
        })
    }

    /// Declare a named record whose fields are supplied later with [`RecordShape::define`].
    pub fn declare(fqn: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            fqn: Some(fqn.into()),
            fields: OnceLock::new(),
        })
    }

    /// Supply the fields of a declared record. Returns `false` if already defined.
    pub fn define(&self, fields: IndexMap<String, Shape>) -> bool {
        self.fields.set(fields).is_ok()
    }

    /// Whether the fields have been supplied.
    pub fn is_defined(&self) -> bool {
        self.fields.get().is_some()
    }

    /// Fully-qualified name, if any.
    pub fn fqn(&self) -> Option<&str> {
        self.fqn.as_deref()
    }

    /// Declared fields in order (empty while undefined).
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Shape)> {
        self.fields.get().into_iter().flat_map(|fields| fields.iter())
    }

    /// Look up one field.
    pub fn field(&self, name: &str) -> Option<&Shape> {
        self.fields.get().and_then(|fields| fields.get(name))
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.fields.get().map_or(0, IndexMap::len)
    }

    /// Whether the record declares no fields.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Fields are elided: recursive records would otherwise print forever.
impl fmt::Debug for RecordShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordShape")
            .field("fqn", &self.fqn)
            .field("fields", &self.fields().map(|(name, _)| name).collect::<Vec<_>>())
            .finish()
    }
}

impl PartialEq for RecordShape {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        match (&self.fqn, &other.fqn) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.fields.get() == other.fields.get(),
            _ => false,
        }
    }
}

impl PartialEq for Shape {
    fn eq(&self, other: &Self) -> bool {
        use Shape::*;
        match (self, other) {
            (String, String)
            | (Integer, Integer)
            | (Float, Float)
            | (Boolean, Boolean)
            | (Timestamp, Timestamp)
            | (Binary, Binary)
            | (Nothing, Nothing)
            | (Never, Never) => true,
            (List(a), List(b)) | (Set(a), Set(b)) | (Map(a), Map(b)) => a == b,
            (Record(a), Record(b)) => a == b,
            (Function(a), Function(b)) => a == b,
            // Member order is irrelevant for unions.
            (Union(a), Union(b)) => a.len() == b.len() && a.iter().all(|m| b.contains(m)),
            _ => false,
        }
    }
}

impl Shape {
    /// List of `item`.
    pub fn list(item: Shape) -> Shape {
        Shape::List(Box::new(item))
    }

    /// Set of `item`.
    pub fn set(item: Shape) -> Shape {
        Shape::Set(Box::new(item))
    }

    /// Map with `value` entries.
    pub fn map(value: Shape) -> Shape {
        Shape::Map(Box::new(value))
    }

    /// Record shape wrapper.
    pub fn record(record: Arc<RecordShape>) -> Shape {
        Shape::Record(record)
    }

    /// Function shape wrapper.
    pub fn function(args: IndexMap<String, Shape>, returns: Shape) -> Shape {
        Shape::Function(Arc::new(FunctionShape { args, returns }))
    }

    /// Normalized union: nested unions are flattened and duplicates dropped.
    /// A single surviving member is returned as-is; no members yields `Never`.
    pub fn union(members: impl IntoIterator<Item = Shape>) -> Shape {
        let mut flat: Vec<Shape> = Vec::new();
        for member in members {
            let parts = match member {
                Shape::Union(inner) => inner,
                Shape::Never => continue,
                other => vec![other],
            };
            for part in parts {
                if !flat.contains(&part) {
                    flat.push(part);
                }
            }
        }
        match flat.len() {
            0 => Shape::Never,
            1 => flat.remove(0),
            _ => Shape::Union(flat),
        }
    }

    /// `shape | Nothing`.
    pub fn nullable(shape: Shape) -> Shape {
        Shape::union([shape, Shape::Nothing])
    }

    /// Whether the absent value inhabits this shape.
    pub fn is_nullable(&self) -> bool {
        match self {
            Shape::Nothing => true,
            Shape::Union(members) => members.contains(&Shape::Nothing),
            _ => false,
        }
    }

    /// The shape with its absent member removed (`None` when nothing remains).
    pub fn without_nothing(&self) -> Option<Shape> {
        match self {
            Shape::Nothing => None,
            Shape::Union(members) => {
                let rest = Shape::union(members.iter().filter(|m| **m != Shape::Nothing).cloned());
                (rest != Shape::Never).then_some(rest)
            }
            other => Some(other.clone()),
        }
    }

    /// Whether this is a scalar kind.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Shape::String
                | Shape::Integer
                | Shape::Float
                | Shape::Boolean
                | Shape::Timestamp
                | Shape::Binary
        )
    }

    /// Item shape of a list or set.
    pub fn item(&self) -> Option<&Shape> {
        match self {
            Shape::List(item) | Shape::Set(item) => Some(item),
            _ => None,
        }
    }

    /// Record payload, if this is a record.
    pub fn as_record(&self) -> Option<&Arc<RecordShape>> {
        match self {
            Shape::Record(record) => Some(record),
            _ => None,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::String => f.write_str("String"),
            Shape::Integer => f.write_str("Int"),
            Shape::Float => f.write_str("Float"),
            Shape::Boolean => f.write_str("Boolean"),
            Shape::Timestamp => f.write_str("Timestamp"),
            Shape::Binary => f.write_str("Binary"),
            Shape::Nothing => f.write_str("Nothing"),
            Shape::Never => f.write_str("Never"),
            Shape::List(item) => write!(f, "[{item}]"),
            Shape::Set(item) => write!(f, "{{{item}}}"),
            Shape::Map(value) => write!(f, "<{value}>"),
            Shape::Record(record) => match record.fqn() {
                Some(name) => f.write_str(name),
                None => {
                    let names: Vec<&str> = record.fields().map(|(n, _)| n.as_str()).collect();
                    write!(f, "{{ {} }}", names.join(", "))
                }
            },
            Shape::Union(members) => {
                for (idx, member) in members.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{member}")?;
                }
                Ok(())
            }
            Shape::Function(function) => {
                let args: Vec<String> = function
                    .args
                    .iter()
                    .map(|(name, shape)| format!("{name}: {shape}"))
                    .collect();
                write!(f, "({}) -> {}", args.join(", "), function.returns)
            }
        }
    }
}

/// Registry of named records.
#[derive(Debug, Default, Clone)]
pub struct TypeCatalog {
    records: IndexMap<String, Arc<RecordShape>>,
}

impl TypeCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare (or fetch the existing declaration of) a named record.
    pub fn declare(&mut self, name: &str) -> Arc<RecordShape> {
        self.records
            .entry(name.to_string())
            .or_insert_with(|| RecordShape::declare(name))
            .clone()
    }

    /// Register an already built record under its fully-qualified name.
    pub fn insert(&mut self, record: Arc<RecordShape>) -> Option<Arc<RecordShape>> {
        let name = record.fqn()?.to_string();
        self.records.insert(name, record)
    }

    /// Look up a record by name.
    pub fn get(&self, name: &str) -> Option<&Arc<RecordShape>> {
        self.records.get(name)
    }

    /// Names that were declared but never defined.
    pub fn undefined(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter(|(_, record)| !record.is_defined())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Iterate over registered records.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<RecordShape>> {
        self.records.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> Arc<RecordShape> {
        let user = RecordShape::declare("User");
        let mut fields = IndexMap::new();
        fields.insert("id".to_string(), Shape::String);
        fields.insert("friends".to_string(), Shape::list(Shape::Record(user.clone())));
        assert!(user.define(fields));
        user
    }

    #[test]
    fn union_flattens_and_dedups() {
        let inner = Shape::union([Shape::String, Shape::Integer]);
        let outer = Shape::union([inner, Shape::String, Shape::Nothing]);
        match &outer {
            Shape::Union(members) => assert_eq!(members.len(), 3),
            other => panic!("expected union, got {other:?}"),
        }
        assert_eq!(Shape::union([Shape::String, Shape::String]), Shape::String);
        assert_eq!(Shape::union(Vec::new()), Shape::Never);
    }

    #[test]
    fn union_equality_ignores_member_order() {
        let a = Shape::union([Shape::String, Shape::Nothing]);
        let b = Shape::union([Shape::Nothing, Shape::String]);
        assert_eq!(a, b);
    }

    #[test]
    fn nullable_strips_back_to_base() {
        let shape = Shape::nullable(Shape::Integer);
        assert!(shape.is_nullable());
        assert_eq!(shape.without_nothing(), Some(Shape::Integer));
        assert_eq!(Shape::Nothing.without_nothing(), None);
    }

    #[test]
    fn recursive_records_compare_by_name_and_print() {
        let a = user();
        let b = RecordShape::declare("User");
        assert_eq!(Shape::Record(a.clone()), Shape::Record(b));
        let friends = a.field("friends").expect("friends field");
        assert_eq!(friends.to_string(), "[User]");
        assert!(format!("{a:?}").contains("friends"));
    }

    #[test]
    fn define_only_once() {
        let record = RecordShape::declare("Post");
        assert!(record.define(IndexMap::new()));
        assert!(!record.define(IndexMap::new()));
    }

    #[test]
    fn catalog_tracks_undefined_declarations() {
        let mut catalog = TypeCatalog::new();
        let post = catalog.declare("Post");
        catalog.declare("Comment");
        post.define(IndexMap::new());
        assert_eq!(catalog.undefined(), vec!["Comment"]);
        assert!(Arc::ptr_eq(&catalog.declare("Post"), &post));
    }
}
