//! Transactional reads and writes.

#[cfg(test)]
mod tests {
    use dynaql_core::model::{
        ConditionCheckRequest, TransactDelete, TransactOptions, TransactPut, TransactUpdate,
        TransactWrite,
    };
    use dynaql_core::{MapperError, ReadOptions, Value, WriteOptions};
    use dynaql_model::StoreErrorCode;
    use serde_json::json;

    use crate::orders_model;

    fn order(order_id: i32) -> Value {
        Value::from(json!({"customer": "c1", "orderId": order_id, "total": 10}))
    }

    fn key(order_id: i32) -> Value {
        Value::from(json!({"customer": "c1", "orderId": order_id}))
    }

    #[tokio::test]
    async fn test_should_commit_every_member() -> anyhow::Result<()> {
        let (model, transport) = orders_model();
        model.put(order(1), None, &WriteOptions::default()).await?;
        model.put(order(2), None, &WriteOptions::default()).await?;

        model
            .transact_write(
                TransactWrite {
                    check: vec![ConditionCheckRequest::builder()
                        .condition(Value::from(json!({"customer": "c1", "orderId": 1, "status": "open"})))
                        .build()],
                    put: vec![TransactPut::builder().item(order(3)).build()],
                    delete: vec![TransactDelete::builder().filter(key(2)).build()],
                    update: vec![TransactUpdate::builder()
                        .filter(key(1))
                        .set(Value::from(json!({"status": "shipped"})))
                        .build()],
                },
                &TransactOptions::builder().client_request_token("token-1").build(),
            )
            .await?;

        let ids: Vec<String> = transport
            .items(model.table())
            .iter()
            .filter_map(|item| match item.get("orderId") {
                Some(dynaql_model::AttributeValue::N(n)) => Some(n.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec!["1", "3"]);

        let shipped = model
            .get(&key(1), &ReadOptions::default())
            .await?
            .item
            .ok_or_else(|| anyhow::anyhow!("order 1 not found"))?;
        assert_eq!(shipped.get("status"), &Value::from("shipped"));
        Ok(())
    }

    #[tokio::test]
    async fn test_should_cancel_on_failed_check() -> anyhow::Result<()> {
        let (model, transport) = orders_model();
        model.put(order(1), None, &WriteOptions::default()).await?;

        let err = model
            .transact_write(
                TransactWrite {
                    put: vec![TransactPut::builder().item(order(9)).build()],
                    ..Default::default()
                },
                &TransactOptions::builder()
                    .checks(vec![ConditionCheckRequest::builder()
                        .condition(Value::from(json!({"customer": "c1", "orderId": 1, "status": "shipped"})))
                        .build()])
                    .build(),
            )
            .await
            .unwrap_err();

        let MapperError::Store(err) = err else {
            panic!("expected a store error, got {err}");
        };
        assert_eq!(err.code, StoreErrorCode::TransactionCanceledException);
        assert_eq!(err.cancellation_reasons.len(), 2);
        assert_eq!(
            err.cancellation_reasons[0].code.as_deref(),
            Some("ConditionalCheckFailed")
        );
        assert_eq!(transport.items(model.table()).len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_should_transact_get_with_own_projection() -> anyhow::Result<()> {
        let (model, _) = orders_model();
        model.put(order(1), None, &WriteOptions::default()).await?;
        model.put(order(2), None, &WriteOptions::default()).await?;

        let result = model
            .transact_get(
                &[
                    key(1),
                    Value::from(json!({"$key": {"customer": "c1", "orderId": 2}, "$select": ["total"]})),
                    key(7),
                ],
                &ReadOptions::default(),
            )
            .await?;
        assert_eq!(result.items.len(), 2);
        assert_eq!(result.items[0].get("status"), &Value::from("open"));
        assert!(result.items[1].get("status").is_undefined());
        assert_eq!(result.items[1].get("total"), &Value::from(10));
        Ok(())
    }
}
