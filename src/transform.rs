//! The pure transform engine behind TRANSFORM nodes.
//!
//! Three sub-modes selected by the config's `type` key: MAPPING renames
//! fields through a rule table, FILTER keeps/drops fields by name,
//! CALCULATION adds computed fields from expressions. All three operate
//! uniformly on a single record or element-wise on a list of records;
//! non-record list elements and scalar inputs pass through unchanged.

use serde_json::{Map, Value};

use crate::error::{NodeError, NodeResult};
use crate::evaluator::expression::evaluate_expression;

/// Apply a transform config to the current parameters.
pub fn apply_transform(config: &Value, parameters: &Value) -> NodeResult<Value> {
    let transform_type = config
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("MAPPING");

    match transform_type {
        "MAPPING" => {
            let rules = mapping_rules(config)?;
            map_records(parameters, |record| Ok(apply_mapping(&rules, record)))
        }
        "FILTER" => {
            let include = field_list(config, "includeFields")?;
            let exclude = field_list(config, "excludeFields")?;
            map_records(parameters, |record| {
                Ok(apply_filter(include.as_deref(), exclude.as_deref(), record))
            })
        }
        "CALCULATION" => {
            let rules = calculation_rules(config)?;
            map_records(parameters, |record| apply_calculation(&rules, record))
        }
        other => Err(NodeError::UnsupportedType(format!(
            "transform type: {other}"
        ))),
    }
}

/// Apply `f` to a record, or element-wise over a list. Non-record list
/// elements and scalar inputs pass through unchanged.
fn map_records(
    parameters: &Value,
    mut f: impl FnMut(&Map<String, Value>) -> NodeResult<Map<String, Value>>,
) -> NodeResult<Value> {
    match parameters {
        Value::Object(record) => Ok(Value::Object(f(record)?)),
        Value::Array(items) => {
            let mut result = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Object(record) => result.push(Value::Object(f(record)?)),
                    other => result.push(other.clone()),
                }
            }
            Ok(Value::Array(result))
        }
        other => Ok(other.clone()),
    }
}

/// Source-key → target-key rename table from `rules`.
fn mapping_rules(config: &Value) -> NodeResult<Vec<(String, String)>> {
    let rules = config
        .get("rules")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            NodeError::ValidationError("MAPPING transform requires a 'rules' object".to_string())
        })?;

    rules
        .iter()
        .map(|(source, target)| match target.as_str() {
            Some(target) => Ok((source.clone(), target.to_string())),
            None => Err(NodeError::ValidationError(format!(
                "MAPPING rule for '{source}' must be a string target key"
            ))),
        })
        .collect()
}

fn apply_mapping(rules: &[(String, String)], record: &Map<String, Value>) -> Map<String, Value> {
    let mut result = Map::new();
    for (source, target) in rules {
        if let Some(value) = record.get(source) {
            result.insert(target.clone(), value.clone());
        }
    }
    result
}

fn field_list(config: &Value, key: &str) -> NodeResult<Option<Vec<String>>> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    NodeError::ValidationError(format!("'{key}' entries must be strings"))
                })
            })
            .collect::<NodeResult<Vec<_>>>()
            .map(Some),
        Some(_) => Err(NodeError::ValidationError(format!(
            "'{key}' must be an array of field names"
        ))),
    }
}

/// Include first (absent include keeps everything), then exclude; exclude
/// wins for fields named in both lists.
fn apply_filter(
    include: Option<&[String]>,
    exclude: Option<&[String]>,
    record: &Map<String, Value>,
) -> Map<String, Value> {
    let mut result = Map::new();
    match include {
        Some(fields) => {
            for field in fields {
                if let Some(value) = record.get(field) {
                    result.insert(field.clone(), value.clone());
                }
            }
        }
        None => result.extend(record.iter().map(|(k, v)| (k.clone(), v.clone()))),
    }
    if let Some(fields) = exclude {
        for field in fields {
            result.remove(field);
        }
    }
    result
}

/// Target-field → expression table from `rules`; each rule object carries
/// an `expression` string.
fn calculation_rules(config: &Value) -> NodeResult<Vec<(String, String)>> {
    let rules = config
        .get("rules")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            NodeError::ValidationError(
                "CALCULATION transform requires a 'rules' object".to_string(),
            )
        })?;

    rules
        .iter()
        .map(|(target, rule)| {
            let expression = rule
                .get("expression")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    NodeError::ValidationError(format!(
                        "CALCULATION rule for '{target}' requires an 'expression' string"
                    ))
                })?;
            Ok((target.clone(), expression.to_string()))
        })
        .collect()
}

/// Existing fields are preserved; calculated fields are added alongside
/// them, overwriting on name collision.
fn apply_calculation(
    rules: &[(String, String)],
    record: &Map<String, Value>,
) -> NodeResult<Map<String, Value>> {
    let mut result = record.clone();
    for (target, expression) in rules {
        let value = evaluate_expression(expression, record)?;
        result.insert(target.clone(), value);
    }
    Ok(result)
}
