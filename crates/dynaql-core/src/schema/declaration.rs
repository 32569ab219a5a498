//! Declarative schema surface.
//!
//! A schema is declared as an ordered map of field name to [`FieldDecl`]. A
//! declaration is either a bare type tag (which makes the field required), a
//! tag with modifiers, or a list of declarations meaning a union.
//!
//! ```
//! use dynaql_core::schema::{FieldDecl, SchemaDecl};
//!
//! let decl = SchemaDecl::new()
//!     .field("id", FieldDecl::string().primary_index())
//!     .field("age", FieldDecl::number().min(0).max(130))
//!     .field("tags", FieldDecl::set(FieldDecl::string()))
//!     .field("name", FieldDecl::string());
//! assert_eq!(decl.len(), 4);
//! ```

use std::fmt;
use std::str::FromStr;

use dynaql_model::Value;
use indexmap::IndexMap;

use crate::callback::{ComputedDefault, Getter, Setter, Validator};
use crate::date::DateFormat;
use crate::error::MapperError;
use crate::schema::node::{
    Capacity, DefaultValue, GlobalIndexRole, LocalIndexRole, ProjectionSpec,
};

// ---------------------------------------------------------------------------
// Type tags
// ---------------------------------------------------------------------------

/// Closed set of declarable types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// `String`, `S`.
    String,
    /// `Number`, `N`.
    Number,
    /// `BigInt`, `bigint`.
    BigInt,
    /// `Boolean`, `BOOL`.
    Boolean,
    /// `Buffer`, `Binary`, `B`.
    Binary,
    /// `Date`, `D`.
    Date,
    /// `Object`, `M`.
    Object,
    /// `ANY`.
    Any,
    /// `Array`, `L`.
    Array,
    /// `Set`.
    Set,
    /// `null`, `Null`, `NULL`.
    Null,
}

/// Accepted names, in lookup order.
const TYPE_NAMES: &[(&str, TypeTag)] = &[
    ("String", TypeTag::String),
    ("S", TypeTag::String),
    ("Number", TypeTag::Number),
    ("N", TypeTag::Number),
    ("BigInt", TypeTag::BigInt),
    ("bigint", TypeTag::BigInt),
    ("Boolean", TypeTag::Boolean),
    ("BOOL", TypeTag::Boolean),
    ("Buffer", TypeTag::Binary),
    ("Binary", TypeTag::Binary),
    ("B", TypeTag::Binary),
    ("Date", TypeTag::Date),
    ("D", TypeTag::Date),
    ("Object", TypeTag::Object),
    ("M", TypeTag::Object),
    ("ANY", TypeTag::Any),
    ("Array", TypeTag::Array),
    ("L", TypeTag::Array),
    ("Set", TypeTag::Set),
    ("null", TypeTag::Null),
    ("Null", TypeTag::Null),
    ("NULL", TypeTag::Null),
];

impl TypeTag {
    /// Resolve a declared type name.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for names outside the closed table.
    pub fn parse(name: &str) -> Result<Self, MapperError> {
        TYPE_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, tag)| *tag)
            .ok_or_else(|| MapperError::configuration(format!("Unknown type '{name}'")))
    }

    /// Canonical name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Number => "Number",
            Self::BigInt => "BigInt",
            Self::Boolean => "Boolean",
            Self::Binary => "Binary",
            Self::Date => "Date",
            Self::Object => "Object",
            Self::Any => "ANY",
            Self::Array => "Array",
            Self::Set => "Set",
            Self::Null => "Null",
        }
    }

    /// Storage descriptor used by `attribute_type` conditions. Dates are
    /// stored as numbers; sets and `ANY` have no single descriptor.
    #[must_use]
    pub fn storage_name(&self) -> Option<&'static str> {
        match self {
            Self::String => Some("S"),
            Self::Number | Self::BigInt | Self::Date => Some("N"),
            Self::Boolean => Some("BOOL"),
            Self::Binary => Some("B"),
            Self::Object => Some("M"),
            Self::Array => Some("L"),
            Self::Null => Some("NULL"),
            Self::Any | Self::Set => None,
        }
    }
}

impl FromStr for TypeTag {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Field declarations
// ---------------------------------------------------------------------------

/// Declared type of a field with modifiers.
#[derive(Debug, Clone)]
pub enum DeclType {
    /// A single type.
    Tag(TypeTag),
    /// One of several declarations.
    Union(Vec<FieldDecl>),
}

/// A field declaration with modifiers.
#[derive(Debug, Clone)]
pub struct FieldOptions {
    /// Declared type.
    pub ty: DeclType,
    /// Absent values fail validation.
    pub required: bool,
    /// Value filled in when absent.
    pub default: Option<DefaultValue>,
    /// Allowed values.
    pub enum_values: Vec<Value>,
    /// Lower bound of numbers and dates.
    pub min: Option<Value>,
    /// Upper bound of numbers and dates.
    pub max: Option<Value>,
    /// Minimum length of strings and binaries.
    pub min_length: Option<usize>,
    /// Maximum length of strings and binaries.
    pub max_length: Option<usize>,
    /// Trim strings before writing.
    pub trim: bool,
    /// Lowercase strings before writing.
    pub lowercase: bool,
    /// Uppercase strings before writing.
    pub uppercase: bool,
    /// Capitalize the first character before writing.
    pub capitalize: bool,
    /// Date storage format.
    pub format: Option<DateFormat>,
    /// Object fields. `None` declares an open object.
    pub fields: Option<IndexMap<String, FieldDecl>>,
    /// Keep keys the object does not declare.
    pub allow_undeclared: bool,
    /// List or set element declaration.
    pub items: Option<Box<FieldDecl>>,
    /// Runs before writing.
    pub setter: Option<Setter>,
    /// Runs after reading.
    pub getter: Option<Getter>,
    /// Runs in the last validation phase.
    pub validator: Option<Validator>,
    /// The table partition key.
    pub primary_index: bool,
    /// The table sort key.
    pub sort_key: bool,
    /// Sort key of a local secondary index.
    pub lsi: Option<LocalIndexRole>,
    /// Key of a global secondary index.
    pub gsi: Option<GlobalIndexRole>,
}

impl FieldOptions {
    /// Options of type `ty` with nothing else set.
    #[must_use]
    pub fn new(ty: DeclType) -> Self {
        Self {
            ty,
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
            fields: None,
            allow_undeclared: false,
            items: None,
            setter: None,
            getter: None,
            validator: None,
            primary_index: false,
            sort_key: false,
            lsi: None,
            gsi: None,
        }
    }
}

/// One field declaration.
#[derive(Debug, Clone)]
pub enum FieldDecl {
    /// A bare type tag. Bare tags are required.
    Tag(TypeTag),
    /// A type with modifiers.
    Field(Box<FieldOptions>),
    /// A bare union of declarations.
    Union(Vec<FieldDecl>),
}

macro_rules! tag_constructors {
    ($($(#[$meta:meta])* $fn_name:ident => $tag:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[must_use]
            pub fn $fn_name() -> Self {
                Self::Tag(TypeTag::$tag)
            }
        )*
    };
}

impl FieldDecl {
    tag_constructors! {
        /// Bare `String`.
        string => String,
        /// Bare `Number`.
        number => Number,
        /// Bare `BigInt`.
        bigint => BigInt,
        /// Bare `Boolean`.
        boolean => Boolean,
        /// Bare `Binary`.
        binary => Binary,
        /// Bare `Date`.
        date => Date,
        /// Bare `ANY`.
        any => Any,
        /// Bare `Null`.
        null => Null,
    }

    /// An object with declared fields.
    pub fn object<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldDecl)>,
        K: Into<String>,
    {
        let mut options = FieldOptions::new(DeclType::Tag(TypeTag::Object));
        options.fields = Some(fields.into_iter().map(|(k, v)| (k.into(), v)).collect());
        Self::Field(Box::new(options))
    }

    /// A list of `items`.
    #[must_use]
    pub fn list(items: FieldDecl) -> Self {
        let mut options = FieldOptions::new(DeclType::Tag(TypeTag::Array));
        options.items = Some(Box::new(items));
        Self::Field(Box::new(options))
    }

    /// A set of `items`.
    #[must_use]
    pub fn set(items: FieldDecl) -> Self {
        let mut options = FieldOptions::new(DeclType::Tag(TypeTag::Set));
        options.items = Some(Box::new(items));
        Self::Field(Box::new(options))
    }

    /// A union of `variants`.
    pub fn union(variants: impl IntoIterator<Item = FieldDecl>) -> Self {
        Self::Union(variants.into_iter().collect())
    }

    /// Modifiers of this declaration; bare tags and unions gain an empty set.
    #[must_use]
    pub fn into_options(self) -> FieldOptions {
        match self {
            Self::Tag(tag) => FieldOptions::new(DeclType::Tag(tag)),
            Self::Field(options) => *options,
            Self::Union(variants) => FieldOptions::new(DeclType::Union(variants)),
        }
    }

    fn with(self, f: impl FnOnce(&mut FieldOptions)) -> Self {
        let mut options = self.into_options();
        f(&mut options);
        Self::Field(Box::new(options))
    }

    /// Mark the field required.
    #[must_use]
    pub fn required(self) -> Self {
        self.with(|o| o.required = true)
    }

    /// Static default, cloned into every item.
    #[must_use]
    pub fn default_value(self, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.with(|o| o.default = Some(DefaultValue::Static(value)))
    }

    /// Default computed from the item.
    #[must_use]
    pub fn default_with(self, f: ComputedDefault) -> Self {
        self.with(|o| o.default = Some(DefaultValue::Computed(f)))
    }

    /// Allowed values.
    #[must_use]
    pub fn enum_values<I, T>(self, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.with(|o| o.enum_values = values)
    }

    /// Lower bound (number, binary size or date).
    #[must_use]
    pub fn min(self, min: impl Into<Value>) -> Self {
        let min = min.into();
        self.with(|o| o.min = Some(min))
    }

    /// Upper bound (number, binary size or date).
    #[must_use]
    pub fn max(self, max: impl Into<Value>) -> Self {
        let max = max.into();
        self.with(|o| o.max = Some(max))
    }

    /// Minimum string length.
    #[must_use]
    pub fn min_length(self, len: usize) -> Self {
        self.with(|o| o.min_length = Some(len))
    }

    /// Maximum string length.
    #[must_use]
    pub fn max_length(self, len: usize) -> Self {
        self.with(|o| o.max_length = Some(len))
    }

    /// Trim strings before writing.
    #[must_use]
    pub fn trim(self) -> Self {
        self.with(|o| o.trim = true)
    }

    /// Lowercase strings before writing.
    #[must_use]
    pub fn lowercase(self) -> Self {
        self.with(|o| o.lowercase = true)
    }

    /// Uppercase strings before writing.
    #[must_use]
    pub fn uppercase(self) -> Self {
        self.with(|o| o.uppercase = true)
    }

    /// Capitalize the first character before writing.
    #[must_use]
    pub fn capitalize(self) -> Self {
        self.with(|o| o.capitalize = true)
    }

    /// Date storage format.
    #[must_use]
    pub fn format(self, format: DateFormat) -> Self {
        self.with(|o| o.format = Some(format))
    }

    /// Keep keys that are not declared.
    #[must_use]
    pub fn allow_undeclared(self) -> Self {
        self.with(|o| o.allow_undeclared = true)
    }

    /// Run `setter` before writing.
    #[must_use]
    pub fn setter(self, setter: Setter) -> Self {
        self.with(|o| o.setter = Some(setter))
    }

    /// Run `getter` after reading.
    #[must_use]
    pub fn getter(self, getter: Getter) -> Self {
        self.with(|o| o.getter = Some(getter))
    }

    /// Check values with `validator` in the last validation phase.
    #[must_use]
    pub fn validator(self, validator: Validator) -> Self {
        self.with(|o| o.validator = Some(validator))
    }

    /// Make the field the table partition key.
    #[must_use]
    pub fn primary_index(self) -> Self {
        self.with(|o| o.primary_index = true)
    }

    /// Make the field the table sort key.
    #[must_use]
    pub fn sort_key(self) -> Self {
        self.with(|o| o.sort_key = true)
    }

    /// Use the field as sort key of a local secondary index.
    #[must_use]
    pub fn lsi(self, role: LocalIndexRole) -> Self {
        self.with(|o| o.lsi = Some(role))
    }

    /// Use the field as hash (or sort) key of a global secondary index.
    #[must_use]
    pub fn gsi(self, role: GlobalIndexRole) -> Self {
        self.with(|o| o.gsi = Some(role))
    }

    /// Parse a JSON declaration: a type name, an array (union) or an object
    /// with a `type` member and modifiers.
    ///
    /// # Errors
    ///
    /// Fails on unknown type names and malformed modifiers.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, MapperError> {
        use serde_json::Value as Json;

        match json {
            Json::String(name) => Ok(Self::Tag(TypeTag::parse(name)?)),
            Json::Null => Ok(Self::Tag(TypeTag::Null)),
            Json::Array(variants) => Ok(Self::Union(
                variants.iter().map(Self::from_json).collect::<Result<_, _>>()?,
            )),
            Json::Object(obj) => {
                let ty = match obj.get("type") {
                    Some(Json::Array(variants)) => DeclType::Union(
                        variants.iter().map(Self::from_json).collect::<Result<_, _>>()?,
                    ),
                    Some(Json::String(name)) => DeclType::Tag(TypeTag::parse(name)?),
                    Some(Json::Null) => DeclType::Tag(TypeTag::Null),
                    Some(other) => {
                        return Err(MapperError::configuration(format!("Unknown type '{other}'")));
                    }
                    None => {
                        return Err(MapperError::configuration(format!(
                            "Field declaration must have a 'type': {json}"
                        )));
                    }
                };
                options_from_json(ty, obj).map(|o| Self::Field(Box::new(o)))
            }
            other => Err(MapperError::configuration(format!("Unknown type '{other}'"))),
        }
    }
}

impl From<TypeTag> for FieldDecl {
    fn from(tag: TypeTag) -> Self {
        Self::Tag(tag)
    }
}

fn options_from_json(
    ty: DeclType,
    obj: &serde_json::Map<String, serde_json::Value>,
) -> Result<FieldOptions, MapperError> {
    let mut o = FieldOptions::new(ty);

    o.required = json_bool(obj, "required");
    o.trim = json_bool(obj, "trim");
    o.lowercase = json_bool(obj, "lowercase");
    o.uppercase = json_bool(obj, "uppercase");
    o.capitalize = json_bool(obj, "capitalize");
    o.allow_undeclared = json_bool(obj, "allowUndeclared");
    o.primary_index = json_bool(obj, "primaryIndex");
    o.sort_key = json_bool(obj, "sortKey");

    o.default = obj.get("default").map(|v| DefaultValue::Static(Value::from(v.clone())));
    o.min = obj.get("min").map(|v| Value::from(v.clone()));
    o.max = obj.get("max").map(|v| Value::from(v.clone()));
    o.min_length = json_usize(obj, "minLength")?;
    o.max_length = json_usize(obj, "maxLength")?;

    if let Some(values) = obj.get("enum") {
        let Some(values) = values.as_array() else {
            return Err(MapperError::configuration("'enum' must be an array"));
        };
        o.enum_values = values.iter().cloned().map(Value::from).collect();
    }
    if let Some(format) = obj.get("format") {
        o.format = Some(
            format
                .as_str()
                .and_then(DateFormat::from_name)
                .ok_or_else(|| MapperError::configuration(format!("Unknown date format {format}")))?,
        );
    }
    if let Some(fields) = obj.get("fields") {
        let Some(fields) = fields.as_object() else {
            return Err(MapperError::configuration("'fields' must be an object"));
        };
        o.fields = Some(
            fields
                .iter()
                .map(|(k, v)| FieldDecl::from_json(v).map(|d| (k.clone(), d)))
                .collect::<Result<_, _>>()?,
        );
    }
    if let Some(items) = obj.get("items") {
        o.items = Some(Box::new(FieldDecl::from_json(items)?));
    }
    if let Some(lsi) = obj.get("LSI") {
        o.lsi = Some(LocalIndexRole {
            index_name: lsi.get("indexName").and_then(|v| v.as_str()).map(str::to_owned),
            project: projection_from_json(lsi.get("project"))?,
        });
    }
    if let Some(gsi) = obj.get("GSI") {
        let Some(index_name) = gsi.get("indexName").and_then(|v| v.as_str()) else {
            return Err(MapperError::configuration("'GSI' must have an 'indexName'"));
        };
        let capacity = gsi.get("capacity").map(|c| Capacity {
            read: c.get("read").and_then(serde_json::Value::as_i64).unwrap_or(1),
            write: c.get("write").and_then(serde_json::Value::as_i64).unwrap_or(1),
        });
        o.gsi = Some(GlobalIndexRole {
            index_name: index_name.to_owned(),
            sort_key: gsi
                .get("sortKey")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false),
            project: projection_from_json(gsi.get("project"))?,
            capacity,
        });
    }

    Ok(o)
}

fn json_bool(obj: &serde_json::Map<String, serde_json::Value>, key: &str) -> bool {
    obj.get(key).and_then(serde_json::Value::as_bool).unwrap_or(false)
}

fn json_usize(
    obj: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Result<Option<usize>, MapperError> {
    obj.get(key)
        .map(|v| {
            v.as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| MapperError::configuration(format!("'{key}' must be a positive integer")))
        })
        .transpose()
}

fn projection_from_json(
    project: Option<&serde_json::Value>,
) -> Result<Option<ProjectionSpec>, MapperError> {
    use serde_json::Value as Json;

    match project {
        None | Some(Json::Null) => Ok(None),
        Some(Json::String(s)) if s == "ALL" => Ok(Some(ProjectionSpec::All)),
        Some(Json::String(s)) if s == "KEYS" => Ok(Some(ProjectionSpec::Keys)),
        Some(Json::Array(names)) => Ok(Some(ProjectionSpec::Include(
            names
                .iter()
                .map(|n| {
                    n.as_str().map(str::to_owned).ok_or_else(|| {
                        MapperError::configuration("projected attribute names must be strings")
                    })
                })
                .collect::<Result<_, _>>()?,
        ))),
        Some(other) => Err(MapperError::configuration(format!(
            "Invalid projection {other}. Expected 'ALL', 'KEYS' or a list of attribute names"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Schema declarations
// ---------------------------------------------------------------------------

/// Ordered map of top-level field declarations.
#[derive(Debug, Clone, Default)]
pub struct SchemaDecl(IndexMap<String, FieldDecl>);

impl SchemaDecl {
    /// An empty declaration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, decl: FieldDecl) -> Self {
        self.0.insert(name.into(), decl);
        self
    }

    /// Parse a JSON object of field declarations.
    ///
    /// # Errors
    ///
    /// Fails when `json` is not an object or a field fails to parse.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, MapperError> {
        let Some(obj) = json.as_object() else {
            return Err(MapperError::configuration("Schema declaration must be an object"));
        };
        obj.iter()
            .map(|(k, v)| FieldDecl::from_json(v).map(|d| (k.clone(), d)))
            .collect::<Result<IndexMap<_, _>, _>>()
            .map(Self)
    }

    /// Number of top-level fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no field is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldDecl)> {
        self.0.iter()
    }
}

impl<K: Into<String>> FromIterator<(K, FieldDecl)> for SchemaDecl {
    fn from_iter<I: IntoIterator<Item = (K, FieldDecl)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
