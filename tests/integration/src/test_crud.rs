//! Single-item writes and reads.

#[cfg(test)]
mod tests {
    use dynaql_core::{MapperError, ReadOptions, Selection, Value, WriteOptions};
    use dynaql_model::types::ReturnValue;
    use dynaql_model::{StoreErrorCode, StoreOperation};
    use serde_json::json;

    use crate::orders_model;

    fn order(customer: &str, order_id: i32) -> Value {
        Value::from(json!({
            "customer": customer,
            "orderId": order_id,
            "total": 10,
            "note": "  Fragile  ",
        }))
    }

    fn key(customer: &str, order_id: i32) -> Value {
        Value::from(json!({"customer": customer, "orderId": order_id}))
    }

    fn store_code(err: MapperError) -> StoreErrorCode {
        match err {
            MapperError::Store(e) => e.code,
            other => panic!("expected a store error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_should_put_and_get_item() -> anyhow::Result<()> {
        let (model, transport) = orders_model();

        let put = model.put(order("c1", 1), None, &WriteOptions::default()).await?;
        assert_eq!(put.item.get("status"), &Value::from("open"));
        assert_eq!(put.item.get("note"), &Value::from("fragile"));

        let got = model.get(&key("c1", 1), &ReadOptions::default()).await?;
        let item = got.item.ok_or_else(|| anyhow::anyhow!("order c1/1 not found"))?;
        assert_eq!(item.get("total"), &Value::from(10));
        assert_eq!(item.get("status"), &Value::from("open"));

        assert_eq!(
            transport.operations(),
            vec![StoreOperation::PutItem, StoreOperation::GetItem]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_should_project_get() -> anyhow::Result<()> {
        let (model, _) = orders_model();
        model.put(order("c1", 1), None, &WriteOptions::default()).await?;

        let options = ReadOptions::builder().select(Selection::paths(["total"])).build();
        let item = model
            .get(&key("c1", 1), &options)
            .await?
            .item
            .ok_or_else(|| anyhow::anyhow!("order c1/1 not found"))?;
        assert_eq!(item.get("total"), &Value::from(10));
        assert!(item.get("note").is_undefined());
        Ok(())
    }

    #[tokio::test]
    async fn test_should_return_none_for_missing_item() -> anyhow::Result<()> {
        let (model, _) = orders_model();
        let got = model.get(&key("nobody", 1), &ReadOptions::default()).await?;
        assert!(got.item.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_should_refuse_put_over_existing_item() -> anyhow::Result<()> {
        let (model, transport) = orders_model();
        let absent = Value::from(json!({"customer": {"$exists": false}}));

        model.put(order("c1", 1), Some(&absent), &WriteOptions::default()).await?;
        let err = model
            .put(order("c1", 1), Some(&absent), &WriteOptions::default())
            .await
            .unwrap_err();
        assert_eq!(store_code(err), StoreErrorCode::ConditionalCheckFailedException);
        assert_eq!(transport.items(model.table()).len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_should_update_with_condition() -> anyhow::Result<()> {
        let (model, _) = orders_model();
        model.put(order("c1", 1), None, &WriteOptions::default()).await?;

        let result = model
            .update(
                &Value::from(json!({"customer": "c1", "orderId": 1, "status": "open"})),
                &Value::from(json!({"total": {"$incr": 5}, "status": "shipped"})),
                &WriteOptions::builder().return_values(ReturnValue::AllNew).build(),
            )
            .await?;
        let attributes = result
            .attributes
            .ok_or_else(|| anyhow::anyhow!("update returned no attributes"))?;
        assert_eq!(attributes.get("total"), &Value::from(15));
        assert_eq!(attributes.get("status"), &Value::from("shipped"));

        // The order is no longer open.
        let err = model
            .update(
                &Value::from(json!({"customer": "c1", "orderId": 1, "status": "open"})),
                &Value::from(json!({"total": {"$incr": 5}})),
                &WriteOptions::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(store_code(err), StoreErrorCode::ConditionalCheckFailedException);
        Ok(())
    }

    #[tokio::test]
    async fn test_should_remove_attributes_on_update() -> anyhow::Result<()> {
        let (model, _) = orders_model();
        model.put(order("c1", 1), None, &WriteOptions::default()).await?;

        model
            .update(&key("c1", 1), &Value::from(json!({"$remove": ["note"]})), &WriteOptions::default())
            .await?;
        let item = model
            .get(&key("c1", 1), &ReadOptions::default())
            .await?
            .item
            .ok_or_else(|| anyhow::anyhow!("order c1/1 not found"))?;
        assert!(item.get("note").is_undefined());
        assert_eq!(item.get("total"), &Value::from(10));
        Ok(())
    }

    #[tokio::test]
    async fn test_should_delete_and_return_old_item() -> anyhow::Result<()> {
        let (model, transport) = orders_model();
        model.put(order("c1", 1), None, &WriteOptions::default()).await?;

        let deleted = model
            .delete(
                &key("c1", 1),
                &WriteOptions::builder().return_values(ReturnValue::AllOld).build(),
            )
            .await?;
        let old = deleted
            .attributes
            .ok_or_else(|| anyhow::anyhow!("delete returned no attributes"))?;
        assert_eq!(old.get("note"), &Value::from("fragile"));
        assert!(transport.items(model.table()).is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_should_reject_invalid_item_before_sending() {
        let (model, transport) = orders_model();
        let err = model
            .put(
                Value::from(json!({"customer": "c1", "orderId": 1, "status": "lost"})),
                None,
                &WriteOptions::default(),
            )
            .await
            .unwrap_err();
        let validation = err.as_validation().expect("validation error");
        assert!(validation.get("status").is_some());
        assert!(transport.operations().is_empty());
    }
}
