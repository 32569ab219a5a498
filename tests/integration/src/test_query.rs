//! Queries, index queries and scans.

#[cfg(test)]
mod tests {
    use dynaql_core::{Model, ReadOptions, Selection, Value, WriteOptions};
    use serde_json::json;

    use crate::orders_model;

    async fn seed(model: &Model) -> anyhow::Result<()> {
        for id in 1..=5 {
            model
                .put(
                    Value::from(json!({"customer": "c1", "orderId": id, "total": id * 10})),
                    None,
                    &WriteOptions::default(),
                )
                .await?;
        }
        model
            .put(
                Value::from(json!({"customer": "c2", "orderId": 1, "total": 10})),
                None,
                &WriteOptions::default(),
            )
            .await?;
        Ok(())
    }

    fn order_ids(items: &[Value]) -> Vec<f64> {
        items.iter().filter_map(|i| i.get("orderId").as_f64()).collect()
    }

    #[tokio::test]
    async fn test_should_query_by_key_and_filter() -> anyhow::Result<()> {
        let (model, _) = orders_model();
        seed(&model).await?;

        let page = model
            .query(
                &Value::from(json!({"customer": "c1", "orderId": {"$gte": 2}, "total": {"$lt": 50}})),
                &ReadOptions::default(),
            )
            .await?;
        assert_eq!(order_ids(&page.items), vec![2.0, 3.0, 4.0]);
        assert_eq!(page.scanned_count, 4);
        assert!(page.last_evaluated_key.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_should_page_through_query() -> anyhow::Result<()> {
        let (model, _) = orders_model();
        seed(&model).await?;
        let filter = Value::from(json!({"customer": "c1", "orderId": {"$gte": 2}}));

        let first = model
            .query(&filter, &ReadOptions::builder().limit(2).build())
            .await?;
        assert_eq!(order_ids(&first.items), vec![2.0, 3.0]);
        let start = first
            .last_evaluated_key
            .ok_or_else(|| anyhow::anyhow!("first page must be truncated"))?;

        let second = model
            .query(
                &filter,
                &ReadOptions::builder().limit(2).exclusive_start_key(start).build(),
            )
            .await?;
        assert_eq!(order_ids(&second.items), vec![4.0, 5.0]);
        assert!(second.last_evaluated_key.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_should_query_backwards_and_count() -> anyhow::Result<()> {
        let (model, _) = orders_model();
        seed(&model).await?;
        let filter = Value::from(json!({"customer": "c1"}));

        let backwards = model
            .query(&filter, &ReadOptions::builder().scan_index_forward(false).build())
            .await?;
        assert_eq!(order_ids(&backwards.items).first(), Some(&5.0));

        let counted = model
            .query(&filter, &ReadOptions::builder().select(Selection::Count).build())
            .await?;
        assert_eq!(counted.count, 5);
        assert!(counted.items.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_should_query_global_index() -> anyhow::Result<()> {
        let (model, _) = orders_model();
        seed(&model).await?;
        model
            .update(
                &Value::from(json!({"customer": "c1", "orderId": 3})),
                &Value::from(json!({"status": "shipped"})),
                &WriteOptions::default(),
            )
            .await?;

        let page = model
            .using("byStatus")?
            .query(&Value::from(json!({"status": "shipped"})), &ReadOptions::default())
            .await?;
        assert_eq!(order_ids(&page.items), vec![3.0]);
        Ok(())
    }

    #[tokio::test]
    async fn test_should_scan_with_filter() -> anyhow::Result<()> {
        let (model, _) = orders_model();
        seed(&model).await?;

        let page = model
            .scan(&Value::from(json!({"total": {"$lt": 30}})), &ReadOptions::default())
            .await?;
        assert_eq!(page.count, 3);
        assert_eq!(page.scanned_count, 6);
        Ok(())
    }
}
