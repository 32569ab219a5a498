//! Declarations compiled from JSON and the table definitions they produce.

#[cfg(test)]
mod tests {
    use dynaql_core::{Schema, ValidationKind, Value, WriteOptions};
    use dynaql_model::types::{KeyType, ScalarAttributeType};
    use serde_json::json;

    use crate::{orders_declaration, orders_model};

    #[test]
    fn test_should_define_table_from_declaration() {
        let (model, _) = orders_model();
        let definition = model.table_definition();

        assert_eq!(definition.table_name, model.table());
        let keys: Vec<_> = definition
            .key_schema
            .iter()
            .map(|k| (k.attribute_name.as_str(), k.key_type))
            .collect();
        assert_eq!(keys, vec![("customer", KeyType::Hash), ("orderId", KeyType::Range)]);
        assert!(definition
            .attribute_definitions
            .iter()
            .any(|d| d.attribute_name == "status" && d.attribute_type == ScalarAttributeType::S));
        assert_eq!(definition.global_secondary_indexes.len(), 1);
        assert_eq!(definition.global_secondary_indexes[0].index_name, "byStatus");
    }

    #[test]
    fn test_should_reject_set_without_items() {
        let mut declaration = orders_declaration();
        declaration["tags"] = json!({"type": "Set"});
        let err = Schema::from_json(&declaration).unwrap_err();
        assert!(err.to_string().contains("'Set' type must provide 'items' type"));
    }

    #[tokio::test]
    async fn test_should_store_string_sets() -> anyhow::Result<()> {
        let (model, transport) = orders_model();
        let mut item = Value::from(json!({"customer": "c1", "orderId": 1}));
        if let Some(map) = item.as_map_mut() {
            map.insert(
                "tags".to_owned(),
                Value::Set(vec![Value::from("gift"), Value::from("gift"), Value::from("rush")]),
            );
        }

        let put = model.put(item, None, &WriteOptions::default()).await?;
        assert_eq!(put.item.get("tags").as_set().map(<[Value]>::len), Some(2));
        let stored = transport.items(model.table());
        assert!(matches!(
            stored[0].get("tags"),
            Some(dynaql_model::AttributeValue::Ss(tags)) if tags.len() == 2
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_should_report_each_validation_phase() {
        let (model, _) = orders_model();

        let err = model
            .put(Value::from(json!({"customer": "c1"})), None, &WriteOptions::default())
            .await
            .unwrap_err();
        let validation = err.as_validation().expect("validation error");
        assert_eq!(validation.kind, ValidationKind::MissingKey);
        assert!(validation.get("orderId").is_some());

        let err = model
            .put(
                Value::from(json!({"customer": "c1", "orderId": 1, "total": -5})),
                None,
                &WriteOptions::default(),
            )
            .await
            .unwrap_err();
        let validation = err.as_validation().expect("validation error");
        assert_eq!(validation.kind, ValidationKind::InvalidRange);
        assert!(validation.get("total").is_some());
    }
}
