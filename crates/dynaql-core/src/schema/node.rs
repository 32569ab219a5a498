//! The compiled schema tree.

use std::fmt;
use std::sync::Arc;

use dynaql_model::{AttributeKind, Value};
use indexmap::IndexMap;

use crate::callback::{ComputedDefault, Getter, Setter, Validator};
use crate::date::{self, DateFormat};

/// Kind of a scalar node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// UTF-8 string, stored as `S`.
    String,
    /// Floating point number, stored as `N`.
    Number,
    /// Big integer, stored as `N`.
    BigInt,
    /// Boolean, stored as `BOOL`.
    Boolean,
    /// Null, stored as `NULL`.
    Null,
    /// Raw bytes, stored as `B`.
    Binary,
    /// Point in time, stored as `N`.
    Date,
}

impl ScalarKind {
    /// Storage kind of values of this scalar.
    #[must_use]
    pub fn storage_kind(self) -> AttributeKind {
        match self {
            Self::String => AttributeKind::S,
            Self::Number | Self::BigInt | Self::Date => AttributeKind::N,
            Self::Boolean => AttributeKind::Bool,
            Self::Null => AttributeKind::Null,
            Self::Binary => AttributeKind::B,
        }
    }

    /// Returns `true` for kinds that may carry an index role.
    #[must_use]
    pub fn is_indexable(self) -> bool {
        matches!(
            self,
            Self::String | Self::Number | Self::BigInt | Self::Binary | Self::Date
        )
    }
}

/// Shape of a node.
#[derive(Debug, Clone)]
pub enum NodeShape {
    /// A leaf value.
    Scalar(ScalarKind),
    /// A map with declared fields.
    Object {
        /// Declared fields in declaration order.
        fields: IndexMap<String, Arc<SchemaNode>>,
        /// Keep keys that are not declared.
        allow_undeclared: bool,
    },
    /// Accepts anything (an object declared without fields).
    Any,
    /// An ordered list.
    List {
        /// Element node.
        items: Arc<SchemaNode>,
    },
    /// A set of scalars.
    Set {
        /// Member node.
        items: Arc<SchemaNode>,
    },
    /// One of several shapes.
    Union {
        /// Candidate nodes in declaration order.
        variants: Vec<Arc<SchemaNode>>,
    },
    /// An invalid path target.
    Undefined,
}

/// Default of a node.
#[derive(Debug, Clone)]
pub enum DefaultValue {
    /// Cloned into each item.
    Static(Value),
    /// Computed from the item.
    Computed(ComputedDefault),
}

/// What a declared projection keeps in an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionSpec {
    /// Every attribute.
    All,
    /// Key attributes only.
    Keys,
    /// Keys plus the listed attributes.
    Include(Vec<String>),
}

/// Read/write capacity of a global index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    /// Read capacity units.
    pub read: i64,
    /// Write capacity units.
    pub write: i64,
}

/// Membership of a field in a local secondary index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalIndexRole {
    /// Index name; defaults to the field name.
    pub index_name: Option<String>,
    /// Projection.
    pub project: Option<ProjectionSpec>,
}

/// Membership of a field in a global secondary index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalIndexRole {
    /// Index name shared by the hash and sort declarations.
    pub index_name: String,
    /// This field is the index sort key rather than its hash key.
    pub sort_key: bool,
    /// Projection, taken from the hash declaration.
    pub project: Option<ProjectionSpec>,
    /// Capacity, taken from the hash declaration.
    pub capacity: Option<Capacity>,
}

/// Index roles of a top-level field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexRoles {
    /// Table partition key.
    pub primary: bool,
    /// Table sort key.
    pub sort_key: bool,
    /// Local secondary index membership.
    pub lsi: Option<LocalIndexRole>,
    /// Global secondary index membership.
    pub gsi: Option<GlobalIndexRole>,
}

impl IndexRoles {
    /// Returns `true` if any role is set.
    #[must_use]
    pub fn any(&self) -> bool {
        self.primary || self.sort_key || self.lsi.is_some() || self.gsi.is_some()
    }
}

/// A node of the compiled schema.
#[derive(Debug, Clone)]
pub struct SchemaNode {
    /// Shape.
    pub shape: NodeShape,
    /// Absent values are a validation failure.
    pub required: bool,
    /// Default used when the value is absent.
    pub default: Option<DefaultValue>,
    /// Allowed values. Empty means unrestricted.
    pub enum_values: Vec<Value>,
    /// Lower bound: number value, binary size or date.
    pub min: Option<Value>,
    /// Upper bound: number value, binary size or date.
    pub max: Option<Value>,
    /// Minimum string length.
    pub min_length: Option<usize>,
    /// Maximum string length.
    pub max_length: Option<usize>,
    /// Trim surrounding whitespace.
    pub trim: bool,
    /// Lowercase strings.
    pub lowercase: bool,
    /// Uppercase strings.
    pub uppercase: bool,
    /// Uppercase the first character.
    pub capitalize: bool,
    /// Date storage format.
    pub format: Option<DateFormat>,
    /// Write-side transform.
    pub setter: Option<Setter>,
    /// Read-side transform.
    pub getter: Option<Getter>,
    /// Custom check.
    pub validator: Option<Validator>,
    /// Key and index roles.
    pub roles: IndexRoles,
}

impl SchemaNode {
    /// A bare node of `shape` with no modifiers.
    #[must_use]
    pub fn new(shape: NodeShape) -> Self {
        Self {
            shape,
            required: false,
            default: None,
            enum_values: Vec::new(),
            min: None,
            max: None,
            min_length: None,
            max_length: None,
            trim: false,
            lowercase: false,
            uppercase: false,
            capitalize: false,
            format: None,
            setter: None,
            getter: None,
            validator: None,
            roles: IndexRoles::default(),
        }
    }

    /// The open node returned for undeclared keys of an open object.
    #[must_use]
    pub fn any() -> Self {
        Self::new(NodeShape::Any)
    }

    /// The node returned for paths that do not exist.
    #[must_use]
    pub fn undefined() -> Self {
        Self::new(NodeShape::Undefined)
    }

    /// Short type name used in messages (`S`, `N`, `D`, `M`, `SS`, ...).
    #[must_use]
    pub fn type_name(&self) -> String {
        match &self.shape {
            NodeShape::Scalar(ScalarKind::Date) => "D".to_owned(),
            NodeShape::Scalar(kind) => kind.storage_kind().as_str().to_owned(),
            NodeShape::Object { .. } => "M".to_owned(),
            NodeShape::Any => "ANY".to_owned(),
            NodeShape::List { .. } => "L".to_owned(),
            NodeShape::Set { items } => format!("{}S", items.type_name()),
            NodeShape::Union { variants } => variants
                .iter()
                .map(|v| v.type_name())
                .collect::<Vec<_>>()
                .join(" | "),
            NodeShape::Undefined => "undefined".to_owned(),
        }
    }

    /// Storage kind of values of this node. `None` for dates (matched by
    /// parsing), `ANY`, unions and the undefined node.
    #[must_use]
    pub fn storage_kind(&self) -> Option<AttributeKind> {
        match &self.shape {
            NodeShape::Scalar(ScalarKind::Date) => None,
            NodeShape::Scalar(kind) => Some(kind.storage_kind()),
            NodeShape::Object { .. } => Some(AttributeKind::M),
            NodeShape::List { .. } => Some(AttributeKind::L),
            NodeShape::Set { items } => match items.storage_kind() {
                Some(AttributeKind::S) => Some(AttributeKind::Ss),
                Some(AttributeKind::B) => Some(AttributeKind::Bs),
                _ => Some(AttributeKind::Ns),
            },
            NodeShape::Any | NodeShape::Union { .. } | NodeShape::Undefined => None,
        }
    }

    /// Returns `true` if `value` has this node's kind. Date nodes accept any
    /// value that parses as a date.
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        if self.is_date() {
            return self.timestamp(value).is_some();
        }
        match (self.storage_kind(), value.kind()) {
            (Some(expected), Some(actual)) => expected == actual,
            _ => false,
        }
    }

    /// Milliseconds for `value` under this node's date format.
    #[must_use]
    pub fn timestamp(&self, value: &Value) -> Option<i64> {
        date::timestamp(self.date_format(), value)
    }

    /// Date format, defaulting to milliseconds.
    #[must_use]
    pub fn date_format(&self) -> DateFormat {
        self.format.unwrap_or_default()
    }

    /// Stored form of a date value; other values are returned unchanged.
    #[must_use]
    pub fn to_storage(&self, value: &Value) -> Value {
        if self.is_date() {
            if let Some(stored) = date::to_storage_value(self.date_format(), value) {
                return stored;
            }
        }
        value.clone()
    }

    /// Returns `true` for date scalars.
    #[must_use]
    pub fn is_date(&self) -> bool {
        matches!(self.shape, NodeShape::Scalar(ScalarKind::Date))
    }

    /// Returns `true` for `ANY` nodes.
    #[must_use]
    pub fn is_any(&self) -> bool {
        matches!(self.shape, NodeShape::Any)
    }

    /// Returns `true` for the undefined node.
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self.shape, NodeShape::Undefined)
    }

    /// Returns `true` if this node cannot contain other values.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        matches!(self.shape, NodeShape::Scalar(_))
    }

    /// Object fields, if this is an object.
    #[must_use]
    pub fn fields(&self) -> Option<&IndexMap<String, Arc<SchemaNode>>> {
        match &self.shape {
            NodeShape::Object { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// Declared field `name` of an object.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Arc<SchemaNode>> {
        self.fields().and_then(|f| f.get(name))
    }

    /// Whether undeclared keys are kept. `ANY` nodes keep everything.
    #[must_use]
    pub fn allows_undeclared(&self) -> bool {
        match &self.shape {
            NodeShape::Object {
                allow_undeclared, ..
            } => *allow_undeclared,
            NodeShape::Any => true,
            _ => false,
        }
    }

    /// List or set element node.
    #[must_use]
    pub fn items(&self) -> Option<&Arc<SchemaNode>> {
        match &self.shape {
            NodeShape::List { items } | NodeShape::Set { items } => Some(items),
            _ => None,
        }
    }

    /// Union variants.
    #[must_use]
    pub fn variants(&self) -> Option<&[Arc<SchemaNode>]> {
        match &self.shape {
            NodeShape::Union { variants } => Some(variants),
            _ => None,
        }
    }

    /// Returns `true` if an enum is declared.
    #[must_use]
    pub fn has_enum(&self) -> bool {
        !self.enum_values.is_empty()
    }
}

impl fmt::Display for SchemaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_name())
    }
}
