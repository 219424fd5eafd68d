//! DAG validation — run this before persisting or re-activating a workflow.
//!
//! Produces a `ValidationResult` rather than a bare `Result`: a definition
//! with any `errors` is non-valid, but `warnings`/`infos` are advisory and
//! never block acceptance (structural → per-node → per-edge → acyclicity →
//! flow health → performance advisories, in that fixed pass order, so the
//! same input always produces the same ordered output).

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::dag;
use crate::models::{Edge, NodeDefinition, WorkflowDefinition};

/// The result of validating a workflow definition.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub infos: Vec<String>,
}

impl ValidationResult {
    fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn info(&mut self, msg: impl Into<String>) {
        self.infos.push(msg.into());
    }

    fn finish(mut self) -> Self {
        self.valid = self.errors.is_empty();
        self
    }
}

/// The known node-type names the validator recognizes without warning.
/// `RegisterNodeType` (see `nodes::NodeRegistry::register`) extends this set
/// at runtime; this is only the built-in seed.
pub fn core_known_types() -> HashSet<String> {
    [
        "ScheduleTrigger",
        "FormTrigger",
        "WebhookTrigger",
        "EmailTrigger",
        "DataMapper",
        "Calculator",
        "Aggregator",
        "Conditional",
        "Loop",
        "Wait",
        "DatabaseWrite",
        "APICall",
        "ERPExport",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Mandatory config keys for the known types spec.md assigns one to.
/// Types absent from this map (`EmailTrigger`, `Aggregator`, `Wait`) validate
/// under the generic per-node rules only.
fn required_config_keys(node_type: &str) -> Option<&'static [&'static str]> {
    match node_type {
        "FormTrigger" => Some(&["form_id"]),
        "WebhookTrigger" => Some(&["endpoint_path"]),
        "DataMapper" => Some(&["input_schema", "output_schema", "mapping_rules"]),
        "Calculator" => Some(&["formula", "input_fields", "output_field"]),
        "Conditional" => Some(&["conditions"]),
        "Loop" => Some(&["items_source", "iteration_body"]),
        "DatabaseWrite" => Some(&["connection", "table", "operation"]),
        "APICall" => Some(&["endpoint", "method"]),
        "ERPExport" => Some(&["system_type", "connection_details", "mapping"]),
        _ => None,
    }
}

/// `ScheduleTrigger` accepts either of two equivalent keys for its cron
/// schedule; every other type's keys are matched literally.
fn has_config_key(config: &Value, key: &str) -> bool {
    config.get(key).is_some()
}

fn check_type_specific_config(node: &NodeDefinition, result: &mut ValidationResult) {
    if node.node_type == "ScheduleTrigger" {
        if !has_config_key(&node.config, "cron") && !has_config_key(&node.config, "cron_expression") {
            result.error(format!(
                "node '{}' of type 'ScheduleTrigger' requires config key 'cron' or 'cron_expression'",
                node.id
            ));
        }
        return;
    }

    if let Some(keys) = required_config_keys(&node.node_type) {
        for key in keys {
            if !has_config_key(&node.config, key) {
                result.error(format!(
                    "node '{}' of type '{}' missing required config key '{}'",
                    node.id, node.node_type, key
                ));
            }
        }
    }
}

/// Validate a workflow definition and return the ordered `ValidationResult`.
pub fn validate(definition: &WorkflowDefinition, known_types: &HashSet<String>) -> ValidationResult {
    let mut result = ValidationResult::default();

    // -----------------------------------------------------------------
    // 1. Structural
    // -----------------------------------------------------------------
    if definition.nodes.is_empty() {
        result.error("workflow must contain at least one node");
        return result.finish();
    }

    // -----------------------------------------------------------------
    // 2. Per-node
    // -----------------------------------------------------------------
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for node in &definition.nodes {
        if node.id.trim().is_empty() {
            result.error("node id must be a non-empty string");
        } else if !seen_ids.insert(node.id.as_str()) {
            result.error(format!("duplicate node id '{}'", node.id));
        }

        if node.node_type.trim().is_empty() {
            result.error(format!("node '{}' has an empty type", node.id));
        } else if !known_types.contains(node.node_type.as_str()) {
            result.warning(format!("unknown node type '{}'", node.node_type));
        }

        if !node.config.is_object() && !node.config.is_null() {
            result.error(format!(
                "node '{}' config must be an object, got {}",
                node.id,
                value_kind(&node.config)
            ));
        }

        // -------------------------------------------------------------
        // 3. Type-specific config
        // -------------------------------------------------------------
        if known_types.contains(node.node_type.as_str()) {
            check_type_specific_config(node, &mut result);
        }
    }

    let node_ids: HashSet<&str> = definition.nodes.iter().map(|n| n.id.as_str()).collect();

    // -----------------------------------------------------------------
    // 4. Per-edge
    // -----------------------------------------------------------------
    for edge in &definition.edges {
        if !node_ids.contains(edge.from.as_str()) {
            result.error(format!("edge references unknown node '{}'", edge.from));
        }
        if !node_ids.contains(edge.to.as_str()) {
            result.error(format!("edge references unknown node '{}'", edge.to));
        }
        if edge.from == edge.to {
            result.error(format!("self-loop on node '{}' is not allowed", edge.from));
        }
        match edge.condition.as_deref() {
            Some("") => result.warning(format!(
                "edge '{}' -> '{}' has an empty condition string",
                edge.from, edge.to
            )),
            _ => {}
        }
    }

    // -----------------------------------------------------------------
    // 5. Acyclicity — short-circuits flow health + performance advisories
    // -----------------------------------------------------------------
    if dag::has_cycle(&definition.nodes, &definition.edges) {
        result.error("cycle detected");
        return result.finish();
    }

    // Edge endpoint errors above mean flow-health analysis below can't
    // assume every edge resolves; restrict it to edges with valid endpoints.
    let valid_edges: Vec<&Edge> = definition
        .edges
        .iter()
        .filter(|e| node_ids.contains(e.from.as_str()) && node_ids.contains(e.to.as_str()))
        .collect();

    check_flow_health(definition, &valid_edges, &mut result);
    check_performance_advisories(definition, &valid_edges, &mut result);

    result.finish()
}

fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// 6. Flow health
// ---------------------------------------------------------------------------

fn check_flow_health(definition: &WorkflowDefinition, edges: &[&Edge], result: &mut ValidationResult) {
    let mut has_incoming: HashSet<&str> = HashSet::new();
    let mut has_outgoing: HashSet<&str> = HashSet::new();
    for edge in edges {
        has_outgoing.insert(edge.from.as_str());
        has_incoming.insert(edge.to.as_str());
    }

    let start_nodes: Vec<&str> = definition
        .nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| !has_incoming.contains(id))
        .collect();

    if start_nodes.is_empty() {
        result.error("workflow has no start node (every node has an incoming edge)");
    } else if start_nodes.len() > 1 {
        result.warning(format!(
            "workflow has {} start nodes: {:?}",
            start_nodes.len(),
            start_nodes
        ));
    }

    let end_nodes: Vec<&str> = definition
        .nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| !has_outgoing.contains(id))
        .collect();

    if end_nodes.is_empty() {
        result.warning("workflow has no end node (every node has an outgoing edge)");
    }

    if definition.nodes.len() > 1 {
        for node in &definition.nodes {
            let isolated = !has_incoming.contains(node.id.as_str()) && !has_outgoing.contains(node.id.as_str());
            if isolated {
                result.error(format!(
                    "node '{}' is isolated (no incoming or outgoing edges) in a multi-node graph",
                    node.id
                ));
            }
        }
    }

    let start_set: HashSet<&str> = start_nodes.into_iter().collect();
    for node in &definition.nodes {
        if node.node_type.ends_with("Trigger") && !start_set.contains(node.id.as_str()) {
            result.warning(format!(
                "node '{}' of type '{}' ends in 'Trigger' but is not a start node",
                node.id, node.node_type
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// 7. Performance advisories
// ---------------------------------------------------------------------------

fn check_performance_advisories(definition: &WorkflowDefinition, edges: &[&Edge], result: &mut ValidationResult) {
    if definition.nodes.len() > 100 {
        result.warning(format!(
            "workflow has {} nodes, exceeding the 100-node advisory threshold",
            definition.nodes.len()
        ));
    }

    let mut fan_out: HashMap<&str, usize> = HashMap::new();
    let mut fan_in: HashMap<&str, usize> = HashMap::new();
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in edges {
        *fan_out.entry(edge.from.as_str()).or_insert(0) += 1;
        *fan_in.entry(edge.to.as_str()).or_insert(0) += 1;
        adjacency.entry(edge.from.as_str()).or_default().push(edge.to.as_str());
    }

    for node in &definition.nodes {
        if fan_out.get(node.id.as_str()).copied().unwrap_or(0) > 10 {
            result.warning(format!("node '{}' has fan-out > 10", node.id));
        }
        if fan_in.get(node.id.as_str()).copied().unwrap_or(0) > 5 {
            result.info(format!("node '{}' has fan-in > 5", node.id));
        }
    }

    if max_depth(definition, &adjacency) > 20 {
        result.warning("workflow DAG depth exceeds 20");
    }

    let has_error_handling = definition.nodes.iter().any(|n| {
        n.config
            .as_object()
            .map(|c| {
                c.contains_key("error_handling") || c.contains_key("on_error") || c.contains_key("retry_policy")
            })
            .unwrap_or(false)
    });
    if !has_error_handling {
        result.info("no error-handling configuration present anywhere in the workflow");
    }
}

fn max_depth(definition: &WorkflowDefinition, adjacency: &HashMap<&str, Vec<&str>>) -> usize {
    let mut incoming: HashMap<&str, usize> = HashMap::new();
    for node in &definition.nodes {
        incoming.entry(node.id.as_str()).or_insert(0);
    }
    for targets in adjacency.values() {
        for &to in targets {
            *incoming.entry(to).or_insert(0) += 1;
        }
    }

    let mut depth: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = incoming
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(&id, _)| id)
        .collect();
    let mut remaining = incoming.clone();
    let mut frontier = order.clone();

    for &id in &order {
        depth.insert(id, 1);
    }

    while let Some(node) = frontier.pop() {
        let d = *depth.get(node).unwrap_or(&1);
        if let Some(children) = adjacency.get(node) {
            for &child in children {
                let entry = remaining.entry(child).or_insert(0);
                *entry = entry.saturating_sub(1);
                let child_depth = depth.entry(child).or_insert(0);
                *child_depth = (*child_depth).max(d + 1);
                if *entry == 0 {
                    frontier.push(child);
                    order.push(child);
                }
            }
        }
    }

    depth.values().copied().max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(id: &str, node_type: &str, config: Value) -> NodeDefinition {
        NodeDefinition {
            id: id.into(),
            node_type: node_type.into(),
            config,
            position: None,
        }
    }

    fn edge(from: &str, to: &str) -> Edge {
        Edge {
            from: from.into(),
            to: to.into(),
            condition: None,
        }
    }

    #[test]
    fn empty_workflow_is_invalid() {
        let def = WorkflowDefinition::default();
        let result = validate(&def, &core_known_types());
        assert!(!result.valid);
    }

    #[test]
    fn happy_path_linear_workflow_is_valid() {
        let def = WorkflowDefinition {
            nodes: vec![
                node("a", "ScheduleTrigger", json!({"cron": "* * * * *"})),
                node(
                    "b",
                    "DataMapper",
                    json!({"input_schema": {}, "output_schema": {}, "mapping_rules": {}}),
                ),
                node(
                    "c",
                    "DatabaseWrite",
                    json!({"connection": "c", "table": "t", "operation": "insert"}),
                ),
            ],
            edges: vec![edge("a", "b"), edge("b", "c")],
        };
        let result = validate(&def, &core_known_types());
        assert!(result.valid, "errors: {:?}", result.errors);
    }

    #[test]
    fn cycle_is_the_only_error_reported() {
        let def = WorkflowDefinition {
            nodes: vec![
                node("a", "ScheduleTrigger", json!({"cron": "* * * * *"})),
                node("b", "Wait", json!({})),
            ],
            edges: vec![edge("a", "b"), edge("b", "a")],
        };
        let result = validate(&def, &core_known_types());
        assert!(!result.valid);
        assert_eq!(result.errors, vec!["cycle detected".to_string()]);
    }

    #[test]
    fn unknown_type_is_a_warning_not_an_error() {
        let def = WorkflowDefinition {
            nodes: vec![node("x", "MyCustomTransform", json!({}))],
            edges: vec![],
        };
        let result = validate(&def, &core_known_types());
        assert!(result.valid);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("unknown node type 'MyCustomTransform'")));
    }

    #[test]
    fn self_loop_is_rejected() {
        let def = WorkflowDefinition {
            nodes: vec![node("a", "Wait", json!({}))],
            edges: vec![edge("a", "a")],
        };
        let result = validate(&def, &core_known_types());
        assert!(!result.valid);
    }

    #[test]
    fn missing_required_config_key_is_an_error() {
        let def = WorkflowDefinition {
            nodes: vec![node("a", "APICall", json!({"endpoint": "https://x"}))],
            edges: vec![],
        };
        let result = validate(&def, &core_known_types());
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("'method'")));
    }

    #[test]
    fn isolated_node_in_multi_node_graph_is_an_error() {
        let def = WorkflowDefinition {
            nodes: vec![
                node("a", "ScheduleTrigger", json!({"cron": "* * * * *"})),
                node("b", "Wait", json!({})),
                node("isolated", "Wait", json!({})),
            ],
            edges: vec![edge("a", "b")],
        };
        let result = validate(&def, &core_known_types());
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("isolated")));
    }

    #[test]
    fn validation_is_idempotent() {
        let def = WorkflowDefinition {
            nodes: vec![
                node("a", "FormTrigger", json!({"form_id": "f"})),
                node("b", "Conditional", json!({"conditions": "x>0"})),
            ],
            edges: vec![edge("a", "b")],
        };
        let first = validate(&def, &core_known_types());
        let second = validate(&def, &core_known_types());
        assert_eq!(first.errors, second.errors);
        assert_eq!(first.warnings, second.warnings);
        assert_eq!(first.infos, second.infos);
    }
}
