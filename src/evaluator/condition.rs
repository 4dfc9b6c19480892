//! Condition evaluation for CONDITIONAL nodes.
//!
//! A condition config is a JSON object whose `type` key selects the variant
//! (default SIMPLE). COMPOSITE recurses back into [`evaluate_condition`], so
//! conditions form arbitrarily nested boolean trees. SIMPLE, RANGE and REGEX
//! degrade to a value-only comparison when the current parameters are not
//! map-shaped.

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{NodeError, NodeResult};
use crate::evaluator::expression::evaluate_expression;
use crate::evaluator::operators::{
    contains, ends_with, starts_with, value_to_f64, value_to_string, values_equal,
};

/// Evaluate a condition config against the current parameters.
pub fn evaluate_condition(config: &Value, parameters: &Value) -> NodeResult<bool> {
    let condition_type = config
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("SIMPLE");

    match condition_type {
        "COMPLEX" => evaluate_complex(config, parameters),
        "RANGE" => evaluate_range(config, parameters),
        "REGEX" => evaluate_regex(config, parameters),
        "SCRIPT" => evaluate_script(config, parameters),
        "COMPOSITE" => evaluate_composite(config, parameters),
        "SIMPLE" => evaluate_simple(config, parameters),
        other => Err(NodeError::UnsupportedType(format!(
            "condition type: {other}"
        ))),
    }
}

/// SIMPLE: field existence plus an operator against a configured value.
/// Missing field or null value is false. For non-map parameters the field
/// lookup is skipped and the parameter itself is compared.
fn evaluate_simple(config: &Value, parameters: &Value) -> NodeResult<bool> {
    let expected = config.get("value").unwrap_or(&Value::Null);

    let Some(map) = parameters.as_object() else {
        return evaluate_simple_value(config, parameters, expected);
    };

    let field = required_str(config, "field", "SIMPLE condition")?;
    let operator = config
        .get("operator")
        .and_then(Value::as_str)
        .unwrap_or("EXISTS");

    let Some(actual) = map.get(field) else {
        return Ok(false);
    };
    if actual.is_null() {
        return Ok(false);
    }

    Ok(match operator {
        "EQUALS" => values_equal(actual, expected),
        "NOT_EQUALS" => !values_equal(actual, expected),
        "CONTAINS" => contains(actual, expected),
        "STARTS_WITH" => starts_with(actual, expected),
        "ENDS_WITH" => ends_with(actual, expected),
        // Any other operator string behaves as EXISTS; the field is
        // already known to be present and non-null here.
        _ => true,
    })
}

/// Value-only degradation of SIMPLE: the operator defaults to EQUALS and
/// EXISTS (or any unknown operator) is false, since there is no field whose
/// presence could satisfy it.
fn evaluate_simple_value(config: &Value, parameter: &Value, expected: &Value) -> NodeResult<bool> {
    if parameter.is_null() {
        return Ok(false);
    }

    let operator = config
        .get("operator")
        .and_then(Value::as_str)
        .unwrap_or("EQUALS");

    Ok(match operator {
        "EQUALS" => values_equal(parameter, expected),
        "NOT_EQUALS" => !values_equal(parameter, expected),
        "CONTAINS" => contains(parameter, expected),
        "STARTS_WITH" => starts_with(parameter, expected),
        "ENDS_WITH" => ends_with(parameter, expected),
        _ => false,
    })
}

/// RANGE: numeric comparison against optional min/max bounds, each
/// independently inclusive or exclusive (default inclusive). A non-numeric
/// field value or bound is false; an absent bound leaves that side
/// unconstrained.
fn evaluate_range(config: &Value, parameters: &Value) -> NodeResult<bool> {
    let value = match parameters.as_object() {
        Some(map) => {
            let field = required_str(config, "field", "RANGE condition")?;
            match map.get(field) {
                Some(v) if !v.is_null() => v.clone(),
                _ => return Ok(false),
            }
        }
        None => parameters.clone(),
    };

    let Some(number) = value_to_f64(&value) else {
        return Ok(false);
    };

    let include_min = config
        .get("includeMin")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    let include_max = config
        .get("includeMax")
        .and_then(Value::as_bool)
        .unwrap_or(true);

    if let Some(min) = config.get("min").filter(|v| !v.is_null()) {
        let Some(min) = value_to_f64(min) else {
            return Ok(false);
        };
        if include_min && number < min || !include_min && number <= min {
            return Ok(false);
        }
    }

    if let Some(max) = config.get("max").filter(|v| !v.is_null()) {
        let Some(max) = value_to_f64(max) else {
            return Ok(false);
        };
        if include_max && number > max || !include_max && number >= max {
            return Ok(false);
        }
    }

    Ok(true)
}

/// REGEX: full-string match of the field's string form against the pattern.
fn evaluate_regex(config: &Value, parameters: &Value) -> NodeResult<bool> {
    let pattern = required_str(config, "pattern", "REGEX condition")?;

    let value = match parameters.as_object() {
        Some(map) => {
            let field = required_str(config, "field", "REGEX condition")?;
            match map.get(field) {
                Some(v) if !v.is_null() => v.clone(),
                _ => return Ok(false),
            }
        }
        None => {
            if parameters.is_null() {
                return Ok(false);
            }
            parameters.clone()
        }
    };

    // Anchored like Java's String.matches: the whole string must match.
    let regex = Regex::new(&format!("^(?:{pattern})$"))
        .map_err(|e| NodeError::ConditionError(format!("invalid regex pattern: {e}")))?;

    Ok(regex.is_match(&value_to_string(&value)))
}

/// SCRIPT: evaluate an expression with the record's fields bound as
/// variables; a non-map input binds the single variable `value`.
fn evaluate_script(config: &Value, parameters: &Value) -> NodeResult<bool> {
    let script = required_str(config, "script", "SCRIPT condition")?;

    let bindings: Map<String, Value> = match parameters.as_object() {
        Some(map) => map.clone(),
        None => {
            let mut map = Map::new();
            map.insert("value".to_string(), parameters.clone());
            map
        }
    };

    match evaluate_expression(script, &bindings)? {
        Value::Bool(result) => Ok(result),
        other => Err(NodeError::ExpressionError(format!(
            "script condition must evaluate to a boolean, got {other}"
        ))),
    }
}

/// COMPLEX: a flat list of SIMPLE-style sub-conditions under one logic op.
fn evaluate_complex(config: &Value, parameters: &Value) -> NodeResult<bool> {
    let logic = config
        .get("logic")
        .and_then(Value::as_str)
        .unwrap_or("AND");
    combine(config.get("conditions"), logic, |condition| {
        evaluate_simple(condition, parameters)
    })
}

/// COMPOSITE: like COMPLEX, but each sub-condition may be any variant,
/// including another COMPOSITE.
fn evaluate_composite(config: &Value, parameters: &Value) -> NodeResult<bool> {
    let operator = config
        .get("operator")
        .and_then(Value::as_str)
        .unwrap_or("AND");
    combine(config.get("conditions"), operator, |condition| {
        evaluate_condition(condition, parameters)
    })
}

/// Short-circuiting AND/OR over a condition list: AND stops at the first
/// false, OR at the first true. An empty or absent list is false.
fn combine(
    conditions: Option<&Value>,
    logic: &str,
    mut evaluate: impl FnMut(&Value) -> NodeResult<bool>,
) -> NodeResult<bool> {
    let Some(conditions) = conditions.and_then(Value::as_array) else {
        return Ok(false);
    };
    if conditions.is_empty() {
        return Ok(false);
    }

    let is_or = logic.eq_ignore_ascii_case("OR");
    for condition in conditions {
        let result = evaluate(condition)?;
        if is_or && result {
            return Ok(true);
        }
        if !is_or && !result {
            return Ok(false);
        }
    }
    Ok(!is_or)
}

fn required_str<'a>(config: &'a Value, key: &str, what: &str) -> NodeResult<&'a str> {
    config.get(key).and_then(Value::as_str).ok_or_else(|| {
        NodeError::ValidationError(format!("{what} requires a string '{key}'"))
    })
}
