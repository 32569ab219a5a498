//! Compiles declarations into the schema tree and its key/index metadata.

use std::sync::Arc;

use dynaql_model::types::{
    AttributeDefinition, GlobalSecondaryIndex, KeySchemaElement, LocalSecondaryIndex, Projection,
    ProjectionType, ProvisionedThroughput, ScalarAttributeType,
};
use indexmap::IndexMap;
use tracing::debug;

use crate::error::MapperError;
use crate::schema::declaration::{DeclType, FieldDecl, FieldOptions, SchemaDecl, TypeTag};
use crate::schema::node::{IndexRoles, NodeShape, ProjectionSpec, ScalarKind, SchemaNode};

/// Output of [`compile`].
#[derive(Debug)]
pub(crate) struct Compiled {
    /// Root object node.
    pub root: SchemaNode,
    /// Partition key attribute.
    pub primary_key: String,
    /// Sort key attribute, if any.
    pub sort_key: Option<String>,
    /// Key schema of the table.
    pub key_schema: Vec<KeySchemaElement>,
    /// Types of key and index attributes.
    pub attribute_definitions: Vec<AttributeDefinition>,
    /// Local secondary indexes.
    pub local_indexes: Vec<LocalSecondaryIndex>,
    /// Global secondary indexes.
    pub global_indexes: Vec<GlobalSecondaryIndex>,
}

/// Compile a schema declaration.
pub(crate) fn compile(decl: &SchemaDecl) -> Result<Compiled, MapperError> {
    let mut fields = IndexMap::with_capacity(decl.len());
    for (name, field) in decl.iter() {
        fields.insert(name.clone(), compile_field(field, name, true)?);
    }

    let mut keys = KeyCollector::default();
    for (name, node) in &mut fields {
        if node.roles.any() {
            keys.collect(name, node)?;
        }
    }
    let compiled = keys.finish()?;

    let mut root = SchemaNode::new(NodeShape::Object {
        fields: fields.into_iter().map(|(k, v)| (k, Arc::new(v))).collect(),
        allow_undeclared: false,
    });
    root.required = true;

    debug!(
        primary_key = %compiled.primary_key,
        sort_key = ?compiled.sort_key,
        lsi = compiled.local_indexes.len(),
        gsi = compiled.global_indexes.len(),
        "compiled schema"
    );

    Ok(Compiled { root, ..compiled })
}

fn compile_field(decl: &FieldDecl, path: &str, top_level: bool) -> Result<SchemaNode, MapperError> {
    match decl {
        FieldDecl::Tag(tag) => {
            let mut node = compile_tag(*tag, None, path)?;
            node.required = true;
            if *tag == TypeTag::Object {
                node.shape = NodeShape::Object {
                    fields: IndexMap::new(),
                    allow_undeclared: true,
                };
            }
            Ok(node)
        }
        FieldDecl::Union(variants) => compile_union(variants, path),
        FieldDecl::Field(options) => compile_options(options, path, top_level),
    }
}

fn compile_options(
    options: &FieldOptions,
    path: &str,
    top_level: bool,
) -> Result<SchemaNode, MapperError> {
    let mut node = match &options.ty {
        DeclType::Union(variants) => compile_union(variants, path)?,
        DeclType::Tag(TypeTag::Object) => match &options.fields {
            Some(fields) => {
                let mut compiled = IndexMap::with_capacity(fields.len());
                for (name, child) in fields {
                    let child_path = format!("{path}.{name}");
                    compiled.insert(name.clone(), Arc::new(compile_field(child, &child_path, false)?));
                }
                SchemaNode::new(NodeShape::Object {
                    fields: compiled,
                    allow_undeclared: options.allow_undeclared,
                })
            }
            None => SchemaNode::any(),
        },
        DeclType::Tag(tag) => compile_tag(*tag, options.items.as_deref(), path)?,
    };

    node.required = options.required;
    node.default.clone_from(&options.default);
    node.enum_values.clone_from(&options.enum_values);
    node.min.clone_from(&options.min);
    node.max.clone_from(&options.max);
    node.min_length = options.min_length;
    node.max_length = options.max_length;
    node.trim = options.trim;
    node.lowercase = options.lowercase;
    node.uppercase = options.uppercase;
    node.capitalize = options.capitalize;
    node.format = options.format;
    node.setter.clone_from(&options.setter);
    node.getter.clone_from(&options.getter);
    node.validator.clone_from(&options.validator);
    node.roles = IndexRoles {
        primary: options.primary_index,
        sort_key: options.sort_key,
        lsi: options.lsi.clone(),
        gsi: options.gsi.clone(),
    };

    if node.roles.any() {
        if !top_level {
            return Err(MapperError::configuration(format!(
                "'{path}' can not be used as a key or index. Only top-level fields can."
            )));
        }
        let indexable = matches!(node.shape, NodeShape::Scalar(kind) if kind.is_indexable());
        if !indexable {
            return Err(MapperError::configuration(format!(
                "'{path}' of type {} can not be used as a key or index. \
                 Allowed types: String, Number, BigInt, Binary, Date",
                node.type_name()
            )));
        }
    }

    Ok(node)
}

fn compile_tag(tag: TypeTag, items: Option<&FieldDecl>, path: &str) -> Result<SchemaNode, MapperError> {
    let shape = match tag {
        TypeTag::String => NodeShape::Scalar(ScalarKind::String),
        TypeTag::Number => NodeShape::Scalar(ScalarKind::Number),
        TypeTag::BigInt => NodeShape::Scalar(ScalarKind::BigInt),
        TypeTag::Boolean => NodeShape::Scalar(ScalarKind::Boolean),
        TypeTag::Binary => NodeShape::Scalar(ScalarKind::Binary),
        TypeTag::Date => NodeShape::Scalar(ScalarKind::Date),
        TypeTag::Null => NodeShape::Scalar(ScalarKind::Null),
        TypeTag::Object | TypeTag::Any => NodeShape::Any,
        TypeTag::Array => {
            let mut items = match items {
                Some(items) => compile_field(items, &format!("{path}[#]"), false)?,
                None => SchemaNode::any(),
            };
            items.required = false;
            NodeShape::List {
                items: Arc::new(items),
            }
        }
        TypeTag::Set => {
            let Some(items) = items else {
                return Err(MapperError::configuration(format!(
                    "'{path}': 'Set' type must provide 'items' type"
                )));
            };
            let items = compile_field(items, &format!("{path}[#]"), false)?;
            let allowed = matches!(
                items.shape,
                NodeShape::Scalar(
                    ScalarKind::String | ScalarKind::Number | ScalarKind::BigInt | ScalarKind::Binary
                )
            );
            if !allowed {
                return Err(MapperError::configuration(format!(
                    "Invalid 'Set' 'items' type '{}' at '{path}'\nMust be String | Number | BigInt | Binary",
                    items.type_name()
                )));
            }
            NodeShape::Set {
                items: Arc::new(items),
            }
        }
    };
    Ok(SchemaNode::new(shape))
}

/// Union variants never inherit `required` from a bare tag.
fn compile_union(variants: &[FieldDecl], path: &str) -> Result<SchemaNode, MapperError> {
    if variants.is_empty() {
        return Err(MapperError::configuration(format!(
            "'{path}': a union must declare at least one type"
        )));
    }
    let mut compiled = Vec::with_capacity(variants.len());
    for variant in variants {
        let mut node = compile_field(variant, path, false)?;
        if matches!(variant, FieldDecl::Tag(_)) {
            node.required = false;
        }
        compiled.push(Arc::new(node));
    }
    Ok(SchemaNode::new(NodeShape::Union { variants: compiled }))
}

// ---------------------------------------------------------------------------
// Keys and indexes
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct GlobalIndexBuilder {
    name: String,
    hash: Option<String>,
    range: Option<String>,
    projection: Projection,
    throughput: Option<ProvisionedThroughput>,
}

#[derive(Debug, Default)]
struct KeyCollector {
    primary_key: Option<String>,
    sort_key: Option<String>,
    attribute_definitions: Vec<AttributeDefinition>,
    local_indexes: Vec<(String, String, Projection)>,
    global_indexes: Vec<GlobalIndexBuilder>,
}

impl KeyCollector {
    fn collect(&mut self, name: &str, node: &mut SchemaNode) -> Result<(), MapperError> {
        let NodeShape::Scalar(kind) = node.shape else {
            return Ok(());
        };
        let attribute_type = match kind {
            ScalarKind::String => ScalarAttributeType::S,
            ScalarKind::Binary => ScalarAttributeType::B,
            _ => ScalarAttributeType::N,
        };
        let roles = node.roles.clone();

        if roles.primary {
            if let Some(existing) = &self.primary_key {
                return Err(MapperError::configuration(format!(
                    "primaryIndex can not be used on field '{name}'. It is already set on field '{existing}'"
                )));
            }
            node.required = true;
            self.primary_key = Some(name.to_owned());
        }
        if roles.sort_key {
            if let Some(existing) = &self.sort_key {
                return Err(MapperError::configuration(format!(
                    "sortKey can not be used on field '{name}'. It is already set on field '{existing}'"
                )));
            }
            node.required = true;
            self.sort_key = Some(name.to_owned());
        }
        if let Some(lsi) = &roles.lsi {
            let index_name = lsi.index_name.clone().unwrap_or_else(|| name.to_owned());
            self.check_index_name(&index_name)?;
            self.local_indexes
                .push((index_name, name.to_owned(), projection(lsi.project.as_ref())));
        }
        if let Some(gsi) = &roles.gsi {
            let position = self
                .global_indexes
                .iter()
                .position(|g| g.name == gsi.index_name);
            let builder = if let Some(i) = position {
                &mut self.global_indexes[i]
            } else {
                self.check_index_name(&gsi.index_name)?;
                self.global_indexes.push(GlobalIndexBuilder {
                    name: gsi.index_name.clone(),
                    ..GlobalIndexBuilder::default()
                });
                let last = self.global_indexes.len() - 1;
                &mut self.global_indexes[last]
            };
            let slot = if gsi.sort_key {
                &mut builder.range
            } else {
                builder.projection = projection(gsi.project.as_ref());
                builder.throughput = gsi.capacity.map(|c| ProvisionedThroughput {
                    read_capacity_units: c.read,
                    write_capacity_units: c.write,
                });
                &mut builder.hash
            };
            if let Some(existing) = slot {
                return Err(MapperError::configuration(format!(
                    "GSI '{}' can not use field '{name}' as {} key. It is already set on field '{existing}'",
                    gsi.index_name,
                    if gsi.sort_key { "sort" } else { "hash" }
                )));
            }
            *slot = Some(name.to_owned());
        }

        if !self
            .attribute_definitions
            .iter()
            .any(|d| d.attribute_name == name)
        {
            self.attribute_definitions.push(AttributeDefinition {
                attribute_name: name.to_owned(),
                attribute_type,
            });
        }
        Ok(())
    }

    fn check_index_name(&self, index_name: &str) -> Result<(), MapperError> {
        let taken = self.local_indexes.iter().any(|(n, _, _)| n == index_name)
            || self.global_indexes.iter().any(|g| g.name == index_name);
        if taken {
            return Err(MapperError::configuration(format!(
                "Index name '{index_name}' is already used"
            )));
        }
        Ok(())
    }

    fn finish(self) -> Result<Compiled, MapperError> {
        let Some(primary_key) = self.primary_key else {
            return Err(MapperError::configuration("primaryIndex is missing in your Schema"));
        };

        let mut key_schema = vec![KeySchemaElement::hash(&primary_key)];
        if let Some(sort_key) = &self.sort_key {
            key_schema.push(KeySchemaElement::range(sort_key));
        }

        let local_indexes = self
            .local_indexes
            .into_iter()
            .map(|(index_name, field, projection)| LocalSecondaryIndex {
                index_name,
                key_schema: vec![
                    KeySchemaElement::hash(&primary_key),
                    KeySchemaElement::range(field),
                ],
                projection,
            })
            .collect();

        let global_indexes = self
            .global_indexes
            .into_iter()
            .map(|g| {
                let Some(hash) = g.hash else {
                    return Err(MapperError::configuration(format!(
                        "GSI '{}' has a sort key but no hash key",
                        g.name
                    )));
                };
                let mut key_schema = vec![KeySchemaElement::hash(hash)];
                if let Some(range) = g.range {
                    key_schema.push(KeySchemaElement::range(range));
                }
                Ok(GlobalSecondaryIndex {
                    index_name: g.name,
                    key_schema,
                    projection: g.projection,
                    provisioned_throughput: g.throughput,
                })
            })
            .collect::<Result<_, _>>()?;

        Ok(Compiled {
            root: SchemaNode::any(),
            primary_key,
            sort_key: self.sort_key,
            key_schema,
            attribute_definitions: self.attribute_definitions,
            local_indexes,
            global_indexes,
        })
    }
}

fn projection(spec: Option<&ProjectionSpec>) -> Projection {
    match spec {
        None => Projection::default(),
        Some(ProjectionSpec::All) => Projection {
            projection_type: Some(ProjectionType::All),
            non_key_attributes: Vec::new(),
        },
        Some(ProjectionSpec::Keys) => Projection {
            projection_type: Some(ProjectionType::KeysOnly),
            non_key_attributes: Vec::new(),
        },
        Some(ProjectionSpec::Include(names)) => Projection {
            projection_type: Some(ProjectionType::Include),
            non_key_attributes: names.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use dynaql_model::types::KeyType;

    use super::*;
    use crate::schema::node::{Capacity, GlobalIndexRole, LocalIndexRole};

    fn decl() -> SchemaDecl {
        SchemaDecl::new()
            .field("id", FieldDecl::string().primary_index())
            .field("createdAt", FieldDecl::date().sort_key())
            .field(
                "rank",
                FieldDecl::number().gsi(GlobalIndexRole {
                    index_name: "byTeam".into(),
                    sort_key: true,
                    project: None,
                    capacity: None,
                }),
            )
            .field(
                "team",
                FieldDecl::string().gsi(GlobalIndexRole {
                    index_name: "byTeam".into(),
                    sort_key: false,
                    project: Some(ProjectionSpec::Include(vec!["name".into()])),
                    capacity: Some(Capacity { read: 4, write: 2 }),
                }),
            )
            .field(
                "score",
                FieldDecl::number().lsi(LocalIndexRole {
                    index_name: None,
                    project: Some(ProjectionSpec::Keys),
                }),
            )
            .field("name", FieldDecl::string())
            .field("tags", FieldDecl::list(FieldDecl::string()))
    }

    #[test]
    fn test_should_compile_keys_and_indexes() {
        let compiled = compile(&decl()).unwrap();
        assert_eq!(compiled.primary_key, "id");
        assert_eq!(compiled.sort_key.as_deref(), Some("createdAt"));
        assert_eq!(compiled.key_schema[0].key_type, KeyType::Hash);
        assert_eq!(compiled.key_schema[1].attribute_name, "createdAt");

        let created = compiled
            .attribute_definitions
            .iter()
            .find(|d| d.attribute_name == "createdAt")
            .unwrap();
        assert_eq!(created.attribute_type, ScalarAttributeType::N);

        let gsi = &compiled.global_indexes[0];
        assert_eq!(gsi.index_name, "byTeam");
        assert_eq!(gsi.key_schema[0].attribute_name, "team");
        assert_eq!(gsi.key_schema[1].attribute_name, "rank");
        assert_eq!(gsi.projection.non_key_attributes, vec!["name".to_owned()]);
        assert_eq!(gsi.provisioned_throughput.unwrap().read_capacity_units, 4);

        let lsi = &compiled.local_indexes[0];
        assert_eq!(lsi.index_name, "score");
        assert_eq!(lsi.key_schema[0].attribute_name, "id");
        assert_eq!(lsi.projection.projection_type, Some(ProjectionType::KeysOnly));
    }

    #[test]
    fn test_should_force_key_fields_required_and_list_items_optional() {
        let compiled = compile(&decl()).unwrap();
        let fields = compiled.root.fields().unwrap();
        assert!(fields["id"].required);
        assert!(fields["createdAt"].required);
        assert!(!fields["rank"].required);
        assert!(fields["name"].required);
        assert!(!fields["tags"].items().unwrap().required);
    }

    #[test]
    fn test_should_require_exactly_one_primary_key() {
        let err = compile(&SchemaDecl::new().field("a", FieldDecl::string())).unwrap_err();
        assert_eq!(err.to_string(), "primaryIndex is missing in your Schema");

        let err = compile(
            &SchemaDecl::new()
                .field("a", FieldDecl::string().primary_index())
                .field("b", FieldDecl::string().primary_index()),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "primaryIndex can not be used on field 'b'. It is already set on field 'a'"
        );
    }

    #[test]
    fn test_should_reject_invalid_sets_and_index_types() {
        let bad_set = SchemaDecl::new()
            .field("id", FieldDecl::string().primary_index())
            .field("dates", FieldDecl::set(FieldDecl::date()));
        assert!(matches!(compile(&bad_set), Err(MapperError::Configuration(_))));

        let bad_key = SchemaDecl::new().field("id", FieldDecl::boolean().primary_index());
        assert!(compile(&bad_key).is_err());

        let duplicate = SchemaDecl::new()
            .field("id", FieldDecl::string().primary_index())
            .field("a", FieldDecl::string().lsi(LocalIndexRole {
                index_name: Some("idx".into()),
                project: None,
            }))
            .field("b", FieldDecl::string().lsi(LocalIndexRole {
                index_name: Some("idx".into()),
                project: None,
            }));
        assert_eq!(
            compile(&duplicate).unwrap_err().to_string(),
            "Index name 'idx' is already used"
        );
    }

    #[test]
    fn test_should_compile_open_objects_and_unions() {
        let compiled = compile(
            &SchemaDecl::new()
                .field("id", FieldDecl::string().primary_index())
                .field("meta", FieldDecl::object(Vec::<(String, FieldDecl)>::new()))
                .field("data", FieldDecl::Tag(TypeTag::Object))
                .field("value", FieldDecl::union([FieldDecl::string(), FieldDecl::number()])),
        )
        .unwrap();
        let fields = compiled.root.fields().unwrap();
        assert!(fields["meta"].fields().unwrap().is_empty());
        assert!(fields["data"].allows_undeclared());
        assert!(fields["data"].required);
        let variants = fields["value"].variants().unwrap();
        assert_eq!(variants.len(), 2);
        assert!(!variants[0].required);
        assert!(!fields["value"].required);
    }
}
