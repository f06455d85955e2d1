//! Graph nodes and edges.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GraphResult;
use crate::id::{EdgeId, NodeId};
use crate::params::{NodeKind, NodeParams, RAW_INPUT_PARAMETER, SetOutcome};
use crate::result::ResultPayload;

/// A node of the program graph.
///
/// Fragment fields are written through [`ProgramGraph`](crate::ProgramGraph)
/// so that `updated_at` advances on every write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Stable node identifier.
    pub id: NodeId,

    /// Label shown in the editor; also the section lookup key.
    pub display_name: String,

    /// Sub-classification within the kind (e.g. "Estimator").
    #[serde(default)]
    pub category: String,

    /// Typed parameters; the variant determines the node kind.
    pub params: NodeParams,

    /// Kind-agnostic parameters outside the typed schema.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,

    /// Code this node contributes to its section.
    #[serde(default)]
    pub primary_fragment: Option<String>,

    /// Code inside the section's nested input region.
    #[serde(default)]
    pub raw_input_fragment: Option<String>,

    /// Logical time of the last fragment write.
    #[serde(default)]
    pub updated_at: u64,

    /// Last execution result routed to this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<ResultPayload>,
}

/// What a parameter assignment did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterChange {
    /// The stored value changed.
    pub changed: bool,
    /// The parameter shapes the node's code, so its code must be regenerated.
    pub affects_fragment: bool,
    /// The change targets the raw-input slot.
    pub raw_input: bool,
}

impl Node {
    /// Create a node with default parameters for `kind`.
    pub fn new(id: impl Into<NodeId>, kind: NodeKind, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            category: String::new(),
            params: NodeParams::default_for(kind),
            metadata: BTreeMap::new(),
            primary_fragment: None,
            raw_input_fragment: None,
            updated_at: 0,
            output: None,
        }
    }

    /// Set the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Replace the parameters. The kind follows the parameter variant.
    pub fn with_params(mut self, params: NodeParams) -> Self {
        self.params = params;
        self
    }

    /// The node kind.
    pub fn kind(&self) -> NodeKind {
        self.params.kind()
    }

    /// Current value of a parameter, typed or metadata.
    pub fn parameter(&self, name: &str) -> Option<Value> {
        if name == RAW_INPUT_PARAMETER {
            return self.raw_input_fragment.clone().map(Value::String);
        }
        self.params
            .get(name)
            .or_else(|| self.metadata.get(name).cloned())
    }

    /// Record a parameter change.
    ///
    /// Typed parameters are validated and stored; they affect the fragment
    /// even when the value is unchanged. Unknown names land in `metadata`
    /// and never affect the fragment. The raw-input slot is not stored here:
    /// its new code comes back from code generation.
    pub fn set_parameter(&mut self, name: &str, value: &Value) -> GraphResult<ParameterChange> {
        if name == RAW_INPUT_PARAMETER {
            return Ok(ParameterChange {
                changed: true,
                affects_fragment: true,
                raw_input: true,
            });
        }

        let change = match self.params.set(name, value)? {
            SetOutcome::Changed => ParameterChange {
                changed: true,
                affects_fragment: true,
                raw_input: false,
            },
            SetOutcome::Unchanged => ParameterChange {
                changed: false,
                affects_fragment: true,
                raw_input: false,
            },
            SetOutcome::NotInSchema => {
                let changed = self.metadata.get(name) != Some(value);
                self.metadata.insert(name.to_string(), value.clone());
                ParameterChange {
                    changed,
                    affects_fragment: false,
                    raw_input: false,
                }
            }
        };
        Ok(change)
    }
}

/// A directed edge between two nodes. Structural only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Edge identifier.
    pub id: EdgeId,
    /// Upstream node.
    pub source: NodeId,
    /// Downstream node.
    pub target: NodeId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_parameter_affects_fragment() {
        let mut node = Node::new("t", NodeKind::Transpile, "Transpiler");
        let change = node.set_parameter("optimization_level", &json!(3)).unwrap();
        assert!(change.changed && change.affects_fragment && !change.raw_input);
        assert_eq!(node.parameter("optimization_level"), Some(json!(3)));

        let again = node.set_parameter("optimization_level", &json!(3)).unwrap();
        assert!(!again.changed && again.affects_fragment);
    }

    #[test]
    fn test_unknown_parameter_goes_to_metadata() {
        let mut node = Node::new("c", NodeKind::Circuit, "Bell");
        let change = node.set_parameter("notes", &json!("try 3 qubits")).unwrap();
        assert!(change.changed);
        assert!(!change.affects_fragment);
        assert_eq!(node.metadata.get("notes"), Some(&json!("try 3 qubits")));
        assert_eq!(node.parameter("notes"), Some(json!("try 3 qubits")));
    }

    #[test]
    fn test_raw_input_slot() {
        let mut node = Node::new("c", NodeKind::Circuit, "Bell");
        let change = node.set_parameter(RAW_INPUT_PARAMETER, &json!("make it GHZ")).unwrap();
        assert!(change.raw_input && change.affects_fragment);
        assert!(node.metadata.is_empty());
        assert_eq!(node.parameter(RAW_INPUT_PARAMETER), None);
    }

    #[test]
    fn test_invalid_value_leaves_node_untouched() {
        let mut node = Node::new("e", NodeKind::Execute, "Sampler");
        let before = node.clone();
        assert!(node.set_parameter("shots", &json!("many")).is_err());
        assert_eq!(node, before);
    }

    #[test]
    fn test_serde_camel_case() {
        let node = Node::new("c", NodeKind::Circuit, "Bell").with_category("Circuit");
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["displayName"], json!("Bell"));
        assert_eq!(json["params"]["kind"], json!("circuit"));
        assert!(json.get("output").is_none());
        let back: Node = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }
}
