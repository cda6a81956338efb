//! Schema validation.
//!
//! Configuration is checked against its [`Schema`] before any API call, so
//! mistakes come back as diagnostics pointing at an attribute path.
//!
//! # Example
//!
//! ```
//! use lightdash_provider::schema::{Attribute, Schema};
//! use lightdash_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute("is_private", Attribute::optional_bool());
//!
//! let diagnostics = validate(&schema, &json!({"name": "Marketing", "is_private": true}));
//! assert!(diagnostics.is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": "Marketing", "is_private": "yes"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute.as_deref(), Some("is_private"));
//! ```

use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value};

use crate::schema::{AttributeType, Diagnostic, Schema};

/// Validate a configuration object against a schema.
///
/// - Required attributes must be present and non-null.
/// - Computed-only attributes are ignored; the provider owns them.
/// - Types are checked recursively, and set elements must be unique.
/// - Attributes the schema does not declare are rejected.
/// - A null configuration is valid (nothing is configured yet).
///
/// Diagnostics come back in attribute-name order.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut validator = Validator::default();
    match value {
        Value::Null => {}
        Value::Object(config) => validator.config(schema, config),
        other => validator.push(
            Diagnostic::error("Expected object").with_detail(format!("Got {}", kind(other))),
        ),
    }
    validator.diagnostics
}

/// [`validate`], as a `Result`.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Whether [`validate`] finds nothing.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

/// Type-check one value under `path`, appending to `diagnostics`.
///
/// Used for function arguments, which have a type but no enclosing schema.
pub fn validate_value(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let mut validator = Validator::default();
    validator.value(attr_type, value, path);
    diagnostics.append(&mut validator.diagnostics);
}

#[derive(Default)]
struct Validator {
    diagnostics: Vec<Diagnostic>,
}

impl Validator {
    fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    fn config(&mut self, schema: &Schema, config: &Map<String, Value>) {
        for (name, attr) in &schema.attributes {
            if !attr.is_configurable() {
                continue;
            }
            match config.get(name).filter(|v| !v.is_null()) {
                Some(value) => self.value(&attr.attr_type, value, name),
                None if attr.is_required() => self.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", name))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(name.as_str()),
                ),
                None => {}
            }
        }

        let mut unknown: Vec<&String> = config
            .keys()
            .filter(|key| !schema.attributes.contains_key(key.as_str()))
            .collect();
        unknown.sort();
        for key in unknown {
            self.push(
                Diagnostic::error(format!("Unsupported argument '{}'", key))
                    .with_detail("An argument with this name is not expected here")
                    .with_attribute(key.as_str()),
            );
        }
    }

    fn value(&mut self, attr_type: &AttributeType, value: &Value, path: &str) {
        let matches = match (attr_type, value) {
            (AttributeType::Dynamic, _) => true,
            (AttributeType::String, Value::String(_)) => true,
            (AttributeType::Bool, Value::Bool(_)) => true,
            (AttributeType::Int64, value) => is_int64(value),
            (AttributeType::List(element_type), Value::Array(items)) => {
                self.elements(element_type, items, path);
                true
            }
            (AttributeType::Set(element_type), Value::Array(items)) => {
                self.elements(element_type, items, path);
                self.unique(items, path);
                true
            }
            (AttributeType::Map(value_type), Value::Object(entries)) => {
                for (key, entry) in entries {
                    self.value(value_type, entry, &format!("{}.{}", path, key));
                }
                true
            }
            (AttributeType::Object(fields), Value::Object(entries)) => {
                self.object(fields, entries, path);
                true
            }
            _ => false,
        };

        if !matches {
            self.push(
                Diagnostic::error(format!("Invalid type for attribute '{}'", path))
                    .with_detail(format!("Expected {}, got {}", attr_type.name(), kind(value)))
                    .with_attribute(path),
            );
        }
    }

    fn elements(&mut self, element_type: &AttributeType, items: &[Value], path: &str) {
        for (index, item) in items.iter().enumerate() {
            self.value(element_type, item, &format!("{}.{}", path, index));
        }
    }

    fn unique(&mut self, items: &[Value], path: &str) {
        let mut seen = HashSet::new();
        for item in items {
            if !seen.insert(item.to_string()) {
                self.push(
                    Diagnostic::error(format!("Duplicate set element in '{}'", path))
                        .with_detail(format!("{} is listed more than once", item))
                        .with_attribute(path),
                );
            }
        }
    }

    // Object fields are all optional; only present, non-null fields are checked.
    fn object(
        &mut self,
        fields: &BTreeMap<String, AttributeType>,
        entries: &Map<String, Value>,
        path: &str,
    ) {
        for (name, field_type) in fields {
            if let Some(value) = entries.get(name).filter(|v| !v.is_null()) {
                self.value(field_type, value, &format!("{}.{}", path, name));
            }
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    let Value::Number(n) = value else {
        return false;
    };
    n.is_i64()
        || n.as_f64()
            .is_some_and(|f| f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64)
}
