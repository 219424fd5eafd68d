//! Conditional-edge routing.
//!
//! Resolves Open Question 2 in spec.md §9 (conditional routing semantics are
//! implicit in the original source) by codifying pruning-by-condition:
//!
//! - A `Conditional` node's output names its active outgoing edges directly:
//!   `{"active_edges": ["<to-node-id>", ...]}`. Edges whose `to` is absent
//!   are pruned.
//! - Edges carrying a `condition` string that are *not* sourced from a
//!   `Conditional` node are evaluated by a minimal comparison expression
//!   engine against the run's envelope — enough for the `x>0`/`x<=0` shape
//!   in spec.md Scenario S5, without pulling in a general expression crate.

use serde_json::Value;

/// Extract the `active_edges` list from a `Conditional` node's output, if
/// the output has that shape.
pub fn active_edges(node_output: &Value) -> Option<Vec<String>> {
    node_output
        .get("active_edges")?
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_owned))
        .collect()
}

/// Evaluate a condition string (`lhs OP rhs`) against the node input
/// envelope (`{workflow: {variables}, nodes: {...}, trigger: {...}}`).
///
/// Supported operators: `==`, `!=`, `<`, `<=`, `>`, `>=`. Both sides may be a
/// numeric/string/bool literal or a bare identifier resolved against the
/// envelope. Returns `true` if the expression cannot be parsed — the edge
/// fails open rather than silently pruning a node on a malformed condition
/// (which the validator would already have flagged, not the engine).
pub fn evaluate(condition: &str, envelope: &Value) -> bool {
    for op in ["==", "!=", "<=", ">=", "<", ">"] {
        if let Some((lhs, rhs)) = condition.split_once(op) {
            let lhs = resolve_operand(lhs.trim(), envelope);
            let rhs = resolve_operand(rhs.trim(), envelope);
            return compare(op, &lhs, &rhs);
        }
    }
    true
}

fn resolve_operand(token: &str, envelope: &Value) -> Value {
    if let Ok(n) = token.parse::<f64>() {
        return Value::from(n);
    }
    if token == "true" || token == "false" {
        return Value::from(token == "true");
    }
    if let Some(stripped) = token.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        return Value::from(stripped);
    }

    resolve_identifier(token, envelope).unwrap_or(Value::Null)
}

/// Look up a bare identifier: trigger data first, then workflow variables,
/// then any node's output — the shallow, permissive search spec.md's
/// scenario (`x>0` against delivered trigger data `{x: 5}`) requires.
fn resolve_identifier(name: &str, envelope: &Value) -> Option<Value> {
    if let Some(v) = dotted_lookup(envelope, name) {
        return Some(v);
    }
    if let Some(v) = envelope.get("trigger").and_then(|t| t.get(name)) {
        return Some(v.clone());
    }
    if let Some(v) = envelope
        .get("workflow")
        .and_then(|w| w.get("variables"))
        .and_then(|vars| vars.get(name))
    {
        return Some(v.clone());
    }
    if let Some(nodes) = envelope.get("nodes").and_then(Value::as_object) {
        for output in nodes.values() {
            if let Some(v) = output.get(name) {
                return Some(v.clone());
            }
        }
    }
    None
}

/// Resolve a dotted path (`nodes.a.field`) directly against the envelope.
fn dotted_lookup(envelope: &Value, path: &str) -> Option<Value> {
    if !path.contains('.') {
        return None;
    }
    let mut current = envelope;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current.clone())
}

fn compare(op: &str, lhs: &Value, rhs: &Value) -> bool {
    if let (Some(l), Some(r)) = (lhs.as_f64(), rhs.as_f64()) {
        return match op {
            "==" => l == r,
            "!=" => l != r,
            "<" => l < r,
            "<=" => l <= r,
            ">" => l > r,
            ">=" => l >= r,
            _ => false,
        };
    }

    match op {
        "==" => lhs == rhs,
        "!=" => lhs != rhs,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn active_edges_extracts_string_list() {
        let output = json!({"active_edges": ["l", "r"]});
        assert_eq!(active_edges(&output), Some(vec!["l".to_string(), "r".to_string()]));
    }

    #[test]
    fn active_edges_returns_none_without_the_key() {
        assert_eq!(active_edges(&json!({"other": 1})), None);
    }

    #[test]
    fn scenario_s5_condition_shapes_evaluate_correctly() {
        let envelope = json!({"workflow": {"variables": {}}, "nodes": {}, "trigger": {"x": 5}});
        assert!(evaluate("x>0", &envelope));
        assert!(!evaluate("x<=0", &envelope));
    }

    #[test]
    fn negative_trigger_value_takes_the_other_branch() {
        let envelope = json!({"workflow": {"variables": {}}, "nodes": {}, "trigger": {"x": -3}});
        assert!(!evaluate("x>0", &envelope));
        assert!(evaluate("x<=0", &envelope));
    }

    #[test]
    fn string_equality_condition() {
        let envelope = json!({"workflow": {"variables": {"env": "prod"}}, "nodes": {}, "trigger": {}});
        assert!(evaluate("env==\"prod\"", &envelope));
    }
}
