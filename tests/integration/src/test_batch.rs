//! Batch reads and writes.

#[cfg(test)]
mod tests {
    use dynaql_core::{ReadOptions, Selection, Value, WriteOptions};
    use dynaql_model::StoreOperation;
    use serde_json::json;

    use crate::orders_model;

    fn order(order_id: i32) -> Value {
        Value::from(json!({"customer": "c1", "orderId": order_id, "total": order_id}))
    }

    fn key(order_id: i32) -> Value {
        Value::from(json!({"customer": "c1", "orderId": order_id}))
    }

    #[tokio::test]
    async fn test_should_batch_put_get_and_delete() -> anyhow::Result<()> {
        let (model, transport) = orders_model();

        let written = model
            .batch_put(vec![order(1), order(2), order(3)], &WriteOptions::default())
            .await?;
        assert_eq!(written.items.len(), 3);
        assert!(written.unprocessed.is_empty());

        let read = model
            .batch_get(
                &[key(1), key(3), key(9)],
                &ReadOptions::builder().select(Selection::paths(["orderId"])).build(),
            )
            .await?;
        assert_eq!(read.items.len(), 2);
        assert!(read.items.iter().all(|item| item.get("total").is_undefined()));

        model.batch_delete(&[key(1), key(2)], &WriteOptions::default()).await?;
        assert_eq!(transport.items(model.table()).len(), 1);
        assert_eq!(
            transport.operations(),
            vec![
                StoreOperation::BatchWriteItem,
                StoreOperation::BatchGetItem,
                StoreOperation::BatchWriteItem,
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_should_mix_puts_and_deletes() -> anyhow::Result<()> {
        let (model, transport) = orders_model();
        model.batch_put(vec![order(1)], &WriteOptions::default()).await?;

        model
            .batch_write(vec![order(2)], &[key(1)], &WriteOptions::default())
            .await?;
        let items = transport.items(model.table());
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0].get("orderId"),
            Some(&dynaql_model::AttributeValue::N("2".to_owned()))
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_should_not_send_batch_with_invalid_item() {
        let (model, transport) = orders_model();
        let err = model
            .batch_put(
                vec![order(1), Value::from(json!({"customer": "c1", "orderId": 2, "total": -1}))],
                &WriteOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(err.as_validation().is_some());
        assert!(transport.operations().is_empty());
    }
}
