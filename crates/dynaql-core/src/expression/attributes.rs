//! Name and value substitution for one compiled request.
//!
//! Names get `#n{ctr}` tokens and values `:v{ctr}` tokens from one shared
//! counter, so tokens never collide and always increase. A repeated field
//! name reuses its token. Primitive values (`S`, `N`, `BOOL`, `NULL`) are
//! deduplicated by kind and payload; composite values always get a fresh
//! token.

use std::collections::HashMap;

use dynaql_model::marshall::{MarshallError, marshall};
use dynaql_model::{AttributeValue, MarshallOptions, Value};
use indexmap::IndexMap;

use crate::error::MapperError;
use crate::expression::ast::{AttributePath, PathElement};

/// Substitution allocator scoped to one request.
#[derive(Debug, Clone, Default)]
pub struct ExpressionAttributes {
    names: IndexMap<String, String>,
    values: IndexMap<String, AttributeValue>,
    name_tokens: HashMap<String, String>,
    value_tokens: HashMap<String, String>,
    counter: usize,
    options: MarshallOptions,
}

impl ExpressionAttributes {
    /// An empty allocator.
    #[must_use]
    pub fn new(options: MarshallOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Substitute every name element of `path`; indices stay inline.
    pub fn add_name(&mut self, path: &AttributePath) -> String {
        let mut escaped = String::new();
        for element in &path.elements {
            match element {
                PathElement::Attribute(name) => {
                    if !escaped.is_empty() {
                        escaped.push('.');
                    }
                    let token = self.attribute_name(name);
                    escaped.push_str(&token);
                }
                PathElement::Index(i) => escaped.push_str(&format!("[{i}]")),
            }
        }
        escaped
    }

    /// Marshall `value` and substitute it.
    ///
    /// # Errors
    ///
    /// Fails when `value` is undefined or can not be marshalled.
    pub fn add_value(&mut self, value: &Value) -> Result<String, MapperError> {
        let av = marshall(value, self.options)?.ok_or(MarshallError::Undefined)?;
        Ok(self.add_attribute_value(av))
    }

    /// Substitute an already marshalled value.
    pub fn add_attribute_value(&mut self, av: AttributeValue) -> String {
        let dedup_key = av.dedup_key();
        if let Some(token) = dedup_key.as_ref().and_then(|k| self.value_tokens.get(k)) {
            return token.clone();
        }

        let token = format!(":v{}", self.next());
        self.values.insert(token.clone(), av);
        if let Some(key) = dedup_key {
            self.value_tokens.insert(key, token.clone());
        }
        token
    }

    fn attribute_name(&mut self, name: &str) -> String {
        if let Some(token) = self.name_tokens.get(name) {
            return token.clone();
        }
        let token = format!("#n{}", self.next());
        self.name_tokens.insert(name.to_owned(), token.clone());
        self.names.insert(token.clone(), name.to_owned());
        token
    }

    fn next(&mut self) -> usize {
        let n = self.counter;
        self.counter += 1;
        n
    }

    /// Token to name.
    #[must_use]
    pub fn names(&self) -> &IndexMap<String, String> {
        &self.names
    }

    /// Token to wire value.
    #[must_use]
    pub fn values(&self) -> &IndexMap<String, AttributeValue> {
        &self.values
    }

    /// Returns `true` if nothing was substituted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.values.is_empty()
    }

    /// Take the substitution maps.
    #[must_use]
    pub fn into_parts(self) -> (IndexMap<String, String>, IndexMap<String, AttributeValue>) {
        (self.names, self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_share_one_counter_between_names_and_values() {
        let mut attrs = ExpressionAttributes::new(MarshallOptions::default());
        assert_eq!(attrs.add_name(&AttributePath::field("id")), "#n0");
        assert_eq!(attrs.add_value(&Value::from("x")).unwrap(), ":v1");
        assert_eq!(attrs.names()["#n0"], "id");
        assert_eq!(attrs.values()[":v1"], AttributeValue::S("x".into()));
    }

    #[test]
    fn test_should_reuse_tokens_for_repeated_names_and_primitives() {
        let mut attrs = ExpressionAttributes::new(MarshallOptions::default());
        let path = AttributePath::parse("a.b[3].a").unwrap();
        assert_eq!(attrs.add_name(&path), "#n0.#n1[3].#n0");
        assert_eq!(attrs.add_value(&Value::from(5)).unwrap(), ":v2");
        assert_eq!(attrs.add_value(&Value::from(5)).unwrap(), ":v2");
        assert_eq!(attrs.add_value(&Value::from("5")).unwrap(), ":v3");
    }

    #[test]
    fn test_should_not_dedup_composite_values() {
        let mut attrs = ExpressionAttributes::new(MarshallOptions::default());
        let list = Value::List(vec![Value::from(1)]);
        assert_eq!(attrs.add_value(&list).unwrap(), ":v0");
        assert_eq!(attrs.add_value(&list).unwrap(), ":v1");
        assert_eq!(attrs.values().len(), 2);
    }

    #[test]
    fn test_should_reject_undefined_value() {
        let mut attrs = ExpressionAttributes::new(MarshallOptions::default());
        assert!(matches!(
            attrs.add_value(&Value::Undefined),
            Err(MapperError::Marshall(MarshallError::Undefined))
        ));
        assert!(attrs.is_empty());
    }
}
