//! A [`Transport`] that keeps tables in process memory.
//!
//! Expression support covers what the scenarios send: comparisons joined by
//! `AND`, `attribute_exists`, `attribute_not_exists` and `begins_with` in
//! conditions, plus `SET` (plain or `+`/`-` on numbers) and `REMOVE` of
//! top-level attributes in updates. Anything else is answered with a
//! `ValidationException`.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use dynaql_core::{Model, StoreRequest, StoreResponse, Transport};
use dynaql_model::input::{
    BatchGetItemInput, BatchWriteItemInput, DeleteItemInput, GetItemInput, PutItemInput,
    QueryInput, ScanInput, TransactGetItemsInput, TransactWriteItemsInput, UpdateItemInput,
};
use dynaql_model::output::{
    BatchGetItemOutput, BatchWriteItemOutput, DeleteItemOutput, GetItemOutput, ItemResponse,
    PutItemOutput, QueryOutput, ScanOutput, TransactGetItemsOutput, TransactWriteItemsOutput,
    UpdateItemOutput,
};
use dynaql_model::types::{CancellationReason, ReturnValue, Select, TransactWriteItem};
use dynaql_model::{AttributeValue, Item, StoreError, StoreErrorCode, StoreOperation};
use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::debug;

type Tables = HashMap<String, Table>;

#[derive(Debug, Default)]
struct Table {
    key: Vec<String>,
    items: Vec<Item>,
}

impl Table {
    fn key_of(&self, item: &Item) -> Result<Item, StoreError> {
        self.key
            .iter()
            .map(|name| {
                item.get(name)
                    .map(|v| (name.clone(), v.clone()))
                    .ok_or_else(|| StoreError::validation(format!("missing key attribute {name}")))
            })
            .collect()
    }

    fn position(&self, key: &Item) -> Option<usize> {
        self.items
            .iter()
            .position(|item| self.key.iter().all(|k| item.get(k) == key.get(k)))
    }

    fn find(&self, key: &Item) -> Option<&Item> {
        self.position(key).map(|i| &self.items[i])
    }

    fn upsert(&mut self, item: Item) -> Result<Option<Item>, StoreError> {
        let key = self.key_of(&item)?;
        match self.position(&key) {
            Some(i) => Ok(Some(std::mem::replace(&mut self.items[i], item))),
            None => {
                self.items.push(item);
                Ok(None)
            }
        }
    }

    fn remove(&mut self, key: &Item) -> Option<Item> {
        self.position(key).map(|i| self.items.remove(i))
    }
}

/// In-memory store. Tables must be created from their model before use.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    tables: Mutex<Tables>,
    operations: Mutex<Vec<StoreOperation>>,
}

impl MemoryTransport {
    /// Create the table of `model`, keyed by its partition and sort keys.
    pub fn create_table(&self, model: &Model) {
        let schema = model.schema();
        let key = std::iter::once(schema.primary_key())
            .chain(schema.sort_key())
            .map(str::to_owned)
            .collect();
        self.tables.lock().insert(
            model.table().to_owned(),
            Table {
                key,
                items: Vec::new(),
            },
        );
    }

    /// Raw items of `table` in insertion order.
    #[must_use]
    pub fn items(&self, table: &str) -> Vec<Item> {
        self.tables
            .lock()
            .get(table)
            .map(|t| t.items.clone())
            .unwrap_or_default()
    }

    /// Operations received so far.
    #[must_use]
    pub fn operations(&self) -> Vec<StoreOperation> {
        self.operations.lock().clone()
    }

    fn execute(&self, request: StoreRequest) -> Result<StoreResponse, StoreError> {
        let mut tables = self.tables.lock();
        match request {
            StoreRequest::PutItem(input) => put_item(&mut tables, input).map(Into::into),
            StoreRequest::GetItem(input) => get_item(&tables, &input).map(Into::into),
            StoreRequest::UpdateItem(input) => update_item(&mut tables, input).map(Into::into),
            StoreRequest::DeleteItem(input) => delete_item(&mut tables, &input).map(Into::into),
            StoreRequest::Query(input) => query(&tables, &input).map(Into::into),
            StoreRequest::Scan(input) => scan(&tables, &input).map(Into::into),
            StoreRequest::BatchGetItem(input) => batch_get(&tables, input).map(Into::into),
            StoreRequest::BatchWriteItem(input) => batch_write(&mut tables, input).map(Into::into),
            StoreRequest::TransactGetItems(input) => transact_get(&tables, input).map(Into::into),
            StoreRequest::TransactWriteItems(input) => {
                transact_write(&mut tables, input).map(Into::into)
            }
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, request: StoreRequest) -> Result<StoreResponse, StoreError> {
        let operation = request.operation();
        debug!(%operation, "memory store request");
        self.operations.lock().push(operation);
        self.execute(request)
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

fn table<'t>(tables: &'t Tables, name: &str) -> Result<&'t Table, StoreError> {
    tables.get(name).ok_or_else(|| not_found(name))
}

fn table_mut<'t>(tables: &'t mut Tables, name: &str) -> Result<&'t mut Table, StoreError> {
    tables.get_mut(name).ok_or_else(|| not_found(name))
}

fn not_found(name: &str) -> StoreError {
    StoreError::with_message(
        StoreErrorCode::ResourceNotFoundException,
        format!("Requested resource not found: Table: {name} not found"),
    )
}

fn put_item(tables: &mut Tables, input: PutItemInput) -> Result<PutItemOutput, StoreError> {
    let table = table_mut(tables, &input.table_name)?;
    let key = table.key_of(&input.item)?;
    let expression = Expression::new(
        &input.expression_attribute_names,
        &input.expression_attribute_values,
    );
    if !expression.matches(input.condition_expression.as_deref(), table.find(&key))? {
        return Err(StoreError::conditional_check_failed("The conditional request failed"));
    }
    let old = table.upsert(input.item)?;
    Ok(PutItemOutput {
        attributes: returned(input.return_values, old, None),
        ..Default::default()
    })
}

fn get_item(tables: &Tables, input: &GetItemInput) -> Result<GetItemOutput, StoreError> {
    let table = table(tables, &input.table_name)?;
    Ok(GetItemOutput {
        item: table.find(&input.key).map(|item| {
            project(
                item,
                input.projection_expression.as_deref(),
                &input.expression_attribute_names,
            )
        }),
        ..Default::default()
    })
}

fn update_item(tables: &mut Tables, input: UpdateItemInput) -> Result<UpdateItemOutput, StoreError> {
    let table = table_mut(tables, &input.table_name)?;
    let expression = Expression::new(
        &input.expression_attribute_names,
        &input.expression_attribute_values,
    );
    let old = table.find(&input.key).cloned();
    if !expression.matches(input.condition_expression.as_deref(), old.as_ref())? {
        return Err(StoreError::conditional_check_failed("The conditional request failed"));
    }

    let mut item = old.clone().unwrap_or_else(|| input.key.clone());
    if let Some(update) = input.update_expression.as_deref() {
        expression.update(update, &mut item)?;
    }
    table.upsert(item.clone())?;
    Ok(UpdateItemOutput {
        attributes: returned(input.return_values, old, Some(item)),
        ..Default::default()
    })
}

fn delete_item(tables: &mut Tables, input: &DeleteItemInput) -> Result<DeleteItemOutput, StoreError> {
    let table = table_mut(tables, &input.table_name)?;
    let expression = Expression::new(
        &input.expression_attribute_names,
        &input.expression_attribute_values,
    );
    if !expression.matches(input.condition_expression.as_deref(), table.find(&input.key))? {
        return Err(StoreError::conditional_check_failed("The conditional request failed"));
    }
    let old = table.remove(&input.key);
    Ok(DeleteItemOutput {
        attributes: returned(input.return_values, old, None),
        ..Default::default()
    })
}

fn returned(return_values: Option<ReturnValue>, old: Option<Item>, new: Option<Item>) -> Item {
    match return_values {
        Some(ReturnValue::AllOld) => old.unwrap_or_default(),
        Some(ReturnValue::AllNew) => new.unwrap_or_default(),
        _ => Item::default(),
    }
}

struct Page {
    items: Vec<Item>,
    count: i32,
    scanned_count: i32,
    last_evaluated_key: Item,
}

struct PageRequest<'a> {
    filter: Option<&'a str>,
    projection: Option<&'a str>,
    limit: Option<i32>,
    start: &'a Item,
    select: Option<Select>,
}

fn query(tables: &Tables, input: &QueryInput) -> Result<QueryOutput, StoreError> {
    let table = table(tables, &input.table_name)?;
    let expression = Expression::new(
        &input.expression_attribute_names,
        &input.expression_attribute_values,
    );
    let key_condition = input
        .key_condition_expression
        .as_deref()
        .ok_or_else(|| StoreError::validation("Query requires a KeyConditionExpression"))?;

    let mut candidates = Vec::new();
    for item in &table.items {
        if expression.matches(Some(key_condition), Some(item))? {
            candidates.push(item);
        }
    }
    if input.scan_index_forward == Some(false) {
        candidates.reverse();
    }

    let page = expression.page(
        table,
        candidates,
        &PageRequest {
            filter: input.filter_expression.as_deref(),
            projection: input.projection_expression.as_deref(),
            limit: input.limit,
            start: &input.exclusive_start_key,
            select: input.select,
        },
    )?;
    Ok(QueryOutput {
        items: page.items,
        count: page.count,
        scanned_count: page.scanned_count,
        last_evaluated_key: page.last_evaluated_key,
        ..Default::default()
    })
}

fn scan(tables: &Tables, input: &ScanInput) -> Result<ScanOutput, StoreError> {
    let table = table(tables, &input.table_name)?;
    let expression = Expression::new(
        &input.expression_attribute_names,
        &input.expression_attribute_values,
    );
    let page = expression.page(
        table,
        table.items.iter().collect(),
        &PageRequest {
            filter: input.filter_expression.as_deref(),
            projection: input.projection_expression.as_deref(),
            limit: input.limit,
            start: &input.exclusive_start_key,
            select: input.select,
        },
    )?;
    Ok(ScanOutput {
        items: page.items,
        count: page.count,
        scanned_count: page.scanned_count,
        last_evaluated_key: page.last_evaluated_key,
        ..Default::default()
    })
}

fn batch_get(tables: &Tables, input: BatchGetItemInput) -> Result<BatchGetItemOutput, StoreError> {
    let mut output = BatchGetItemOutput::default();
    for (name, request) in input.request_items {
        let table = table(tables, &name)?;
        let items = request
            .keys
            .iter()
            .filter_map(|key| table.find(key))
            .map(|item| {
                project(
                    item,
                    request.projection_expression.as_deref(),
                    &request.expression_attribute_names,
                )
            })
            .collect();
        output.responses.insert(name, items);
    }
    Ok(output)
}

fn batch_write(
    tables: &mut Tables,
    input: BatchWriteItemInput,
) -> Result<BatchWriteItemOutput, StoreError> {
    for (name, requests) in input.request_items {
        let table = table_mut(tables, &name)?;
        for request in requests {
            if let Some(put) = request.put_request {
                table.upsert(put.item)?;
            }
            if let Some(delete) = request.delete_request {
                table.remove(&delete.key);
            }
        }
    }
    Ok(BatchWriteItemOutput::default())
}

fn transact_get(
    tables: &Tables,
    input: TransactGetItemsInput,
) -> Result<TransactGetItemsOutput, StoreError> {
    let responses = input
        .transact_items
        .iter()
        .map(|member| {
            let get = &member.get;
            let table = table(tables, &get.table_name)?;
            Ok(ItemResponse {
                item: table.find(&get.key).map(|item| {
                    project(
                        item,
                        get.projection_expression.as_deref(),
                        &get.expression_attribute_names,
                    )
                }),
            })
        })
        .collect::<Result<_, StoreError>>()?;
    Ok(TransactGetItemsOutput {
        responses,
        ..Default::default()
    })
}

fn transact_write(
    tables: &mut Tables,
    input: TransactWriteItemsInput,
) -> Result<TransactWriteItemsOutput, StoreError> {
    let mut reasons = Vec::with_capacity(input.transact_items.len());
    for member in &input.transact_items {
        reasons.push(if member_holds(tables, member)? {
            CancellationReason {
                code: Some("None".to_owned()),
                ..Default::default()
            }
        } else {
            CancellationReason {
                code: Some("ConditionalCheckFailed".to_owned()),
                message: Some("The conditional request failed".to_owned()),
                ..Default::default()
            }
        });
    }
    if reasons.iter().any(|r| r.message.is_some()) {
        let codes = reasons
            .iter()
            .filter_map(|r| r.code.as_deref())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(StoreError::with_message(
            StoreErrorCode::TransactionCanceledException,
            format!("Transaction cancelled, please refer cancellation reasons for specific reasons [{codes}]"),
        )
        .with_cancellation_reasons(reasons));
    }

    for member in input.transact_items {
        if let Some(put) = member.put {
            put_item(tables, put)?;
        }
        if let Some(delete) = member.delete {
            delete_item(tables, &delete)?;
        }
        if let Some(update) = member.update {
            update_item(tables, update)?;
        }
    }
    Ok(TransactWriteItemsOutput::default())
}

fn member_holds(tables: &Tables, member: &TransactWriteItem) -> Result<bool, StoreError> {
    let (name, key, condition, names, values) = if let Some(check) = &member.condition_check {
        (
            &check.table_name,
            check.key.clone(),
            check.condition_expression.as_deref(),
            &check.expression_attribute_names,
            &check.expression_attribute_values,
        )
    } else if let Some(put) = &member.put {
        let key = table(tables, &put.table_name)?.key_of(&put.item)?;
        (
            &put.table_name,
            key,
            put.condition_expression.as_deref(),
            &put.expression_attribute_names,
            &put.expression_attribute_values,
        )
    } else if let Some(delete) = &member.delete {
        (
            &delete.table_name,
            delete.key.clone(),
            delete.condition_expression.as_deref(),
            &delete.expression_attribute_names,
            &delete.expression_attribute_values,
        )
    } else if let Some(update) = &member.update {
        (
            &update.table_name,
            update.key.clone(),
            update.condition_expression.as_deref(),
            &update.expression_attribute_names,
            &update.expression_attribute_values,
        )
    } else {
        return Err(StoreError::validation("empty transaction member"));
    };
    let table = table(tables, name)?;
    Expression::new(names, values).matches(condition, table.find(&key))
}

fn project(item: &Item, projection: Option<&str>, names: &IndexMap<String, String>) -> Item {
    let Some(projection) = projection else {
        return item.clone();
    };
    let keep: Vec<&str> = projection
        .split(", ")
        .filter_map(|path| {
            let head = path.split(['.', '[']).next()?;
            names.get(head).map(String::as_str)
        })
        .collect();
    item.iter()
        .filter(|(name, _)| keep.contains(&name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

struct Expression<'a> {
    names: &'a IndexMap<String, String>,
    values: &'a IndexMap<String, AttributeValue>,
}

impl<'a> Expression<'a> {
    fn new(
        names: &'a IndexMap<String, String>,
        values: &'a IndexMap<String, AttributeValue>,
    ) -> Self {
        Self { names, values }
    }

    fn name(&self, token: &str) -> Result<&'a str, StoreError> {
        self.names
            .get(token)
            .map(String::as_str)
            .ok_or_else(|| StoreError::validation(format!("undefined attribute name {token}")))
    }

    fn value(&self, token: &str) -> Result<&'a AttributeValue, StoreError> {
        self.values
            .get(token)
            .ok_or_else(|| StoreError::validation(format!("undefined attribute value {token}")))
    }

    fn attribute<'i>(&self, token: &str, item: Option<&'i Item>) -> Result<Option<&'i AttributeValue>, StoreError> {
        let name = self.name(token)?;
        Ok(item.and_then(|item| item.get(name)))
    }

    fn matches(&self, expr: Option<&str>, item: Option<&Item>) -> Result<bool, StoreError> {
        let Some(expr) = expr else {
            return Ok(true);
        };
        for term in terms(expr) {
            if !self.term(term, item)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn term(&self, term: &str, item: Option<&Item>) -> Result<bool, StoreError> {
        if let Some(path) = call(term, "attribute_exists") {
            return Ok(self.attribute(path, item)?.is_some());
        }
        if let Some(path) = call(term, "attribute_not_exists") {
            return Ok(self.attribute(path, item)?.is_none());
        }
        if let Some(args) = call(term, "begins_with") {
            let (path, prefix) = args.split_once(", ").ok_or_else(|| unsupported(term))?;
            return Ok(matches!(
                (self.attribute(path, item)?, self.value(prefix)?),
                (Some(AttributeValue::S(s)), AttributeValue::S(p)) if s.starts_with(p.as_str())
            ));
        }

        let tokens: Vec<&str> = term.split_whitespace().collect();
        let [path, op, value] = tokens.as_slice() else {
            return Err(unsupported(term));
        };
        let right = self.value(value)?;
        let Some(left) = self.attribute(path, item)? else {
            return Ok(false);
        };
        let ordering = compare(left, right);
        Ok(match *op {
            "=" => ordering == Some(Ordering::Equal),
            "<>" => ordering != Some(Ordering::Equal),
            "<" => ordering == Some(Ordering::Less),
            "<=" => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            ">" => ordering == Some(Ordering::Greater),
            ">=" => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            _ => return Err(unsupported(term)),
        })
    }

    fn update(&self, expr: &str, item: &mut Item) -> Result<(), StoreError> {
        for (keyword, body) in clauses(expr) {
            match keyword {
                "SET" => {
                    for action in body.split(", ") {
                        let tokens: Vec<&str> = action.split_whitespace().collect();
                        let (name, value) = match tokens.as_slice() {
                            [path, "=", value] => (self.name(path)?, self.value(value)?.clone()),
                            [path, "=", source, op @ ("+" | "-"), value] if source == path => {
                                let name = self.name(path)?;
                                let current = item
                                    .get(name)
                                    .ok_or_else(|| StoreError::validation(format!("{name} is not set")))?;
                                (name, arithmetic(current, self.value(value)?, *op == "-")?)
                            }
                            _ => return Err(unsupported(action)),
                        };
                        item.insert(name.to_owned(), value);
                    }
                }
                "REMOVE" => {
                    for path in body.split(", ") {
                        item.shift_remove(self.name(path.trim())?);
                    }
                }
                _ => return Err(unsupported(expr)),
            }
        }
        Ok(())
    }

    fn page(&self, table: &Table, candidates: Vec<&Item>, request: &PageRequest<'_>) -> Result<Page, StoreError> {
        let skip = if request.start.is_empty() {
            0
        } else {
            candidates
                .iter()
                .position(|item| table.key.iter().all(|k| item.get(k) == request.start.get(k)))
                .map_or(0, |p| p + 1)
        };
        let limit = request
            .limit
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(usize::MAX);
        let remaining = &candidates[skip.min(candidates.len())..];
        let scanned = &remaining[..remaining.len().min(limit)];
        let last_evaluated_key = match scanned.last() {
            Some(last) if remaining.len() > scanned.len() => table.key_of(last)?,
            _ => Item::default(),
        };

        let mut items = Vec::new();
        for &item in scanned {
            if self.matches(request.filter, Some(item))? {
                items.push(project(item, request.projection, self.names));
            }
        }
        let count = i32::try_from(items.len()).unwrap_or(i32::MAX);
        if request.select == Some(Select::Count) {
            items.clear();
        }
        Ok(Page {
            items,
            count,
            scanned_count: i32::try_from(scanned.len()).unwrap_or(i32::MAX),
            last_evaluated_key,
        })
    }
}

fn terms(expr: &str) -> Vec<&str> {
    match expr.strip_prefix('(').and_then(|e| e.strip_suffix(')')) {
        Some(inner) if expr.contains(") AND (") => inner.split(") AND (").collect(),
        _ => vec![expr],
    }
}

fn clauses(expr: &str) -> Vec<(&str, &str)> {
    const KEYWORDS: [&str; 4] = [" SET ", " REMOVE ", " ADD ", " DELETE "];

    let mut out = Vec::new();
    let mut rest = expr.trim();
    while let Some((keyword, body)) = rest.split_once(' ') {
        let end = KEYWORDS
            .iter()
            .filter_map(|k| body.find(k))
            .min()
            .unwrap_or(body.len());
        out.push((keyword, body[..end].trim()));
        rest = body[end..].trim();
    }
    out
}

fn call<'t>(term: &'t str, function: &str) -> Option<&'t str> {
    term.strip_prefix(function)?.strip_prefix('(')?.strip_suffix(')')
}

fn compare(left: &AttributeValue, right: &AttributeValue) -> Option<Ordering> {
    match (left, right) {
        (AttributeValue::S(a), AttributeValue::S(b)) => Some(a.cmp(b)),
        (AttributeValue::N(a), AttributeValue::N(b)) => {
            a.parse::<f64>().ok()?.partial_cmp(&b.parse::<f64>().ok()?)
        }
        _ => (left == right).then_some(Ordering::Equal),
    }
}

fn arithmetic(
    left: &AttributeValue,
    right: &AttributeValue,
    subtract: bool,
) -> Result<AttributeValue, StoreError> {
    let (AttributeValue::N(a), AttributeValue::N(b)) = (left, right) else {
        return Err(StoreError::validation("An operand in the update expression has an incorrect data type"));
    };
    let parse = |n: &str| {
        n.parse::<f64>()
            .map_err(|_| StoreError::validation(format!("invalid number {n}")))
    };
    let (a, b) = (parse(a)?, parse(b)?);
    Ok(AttributeValue::N(if subtract { a - b } else { a + b }.to_string()))
}

fn unsupported(expr: &str) -> StoreError {
    StoreError::validation(format!("memory store cannot evaluate: {expr}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_split_update_clauses() {
        assert_eq!(
            clauses("SET #n0 = :v1, #n2 = #n2 + :v3 REMOVE #n4"),
            vec![("SET", "#n0 = :v1, #n2 = #n2 + :v3"), ("REMOVE", "#n4")]
        );
    }

    #[test]
    fn test_should_split_and_terms() {
        assert_eq!(terms("(#n0 = :v1) AND (#n2 > :v3)"), vec!["#n0 = :v1", "#n2 > :v3"]);
        assert_eq!(terms("attribute_not_exists(#n0)"), vec!["attribute_not_exists(#n0)"]);
    }

    #[test]
    fn test_should_compare_numbers_numerically() {
        let ordering = compare(
            &AttributeValue::N("10".to_owned()),
            &AttributeValue::N("9".to_owned()),
        );
        assert_eq!(ordering, Some(Ordering::Greater));
    }
}
