//! Node kinds and their typed parameters.

use qstudio_source::StepRole;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GraphError, GraphResult};
use crate::result::ResultKind;

/// Parameter name of the raw user-input slot.
///
/// Valid on every kind. Changing it rewrites the node's raw-input fragment
/// rather than its primary fragment.
pub const RAW_INPUT_PARAMETER: &str = "input_python";

/// The kind of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Builds the circuit (problem mapping).
    Circuit,
    /// Transpiles/optimizes the circuit for a backend.
    Transpile,
    /// Runs a primitive on a backend.
    Execute,
    /// Turns results into text, graph or plot output.
    PostProcess,
}

impl NodeKind {
    /// All kinds in pipeline order.
    pub const ALL: [NodeKind; 4] = [
        NodeKind::Circuit,
        NodeKind::Transpile,
        NodeKind::Execute,
        NodeKind::PostProcess,
    ];

    /// Wire name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Circuit => "circuit",
            NodeKind::Transpile => "transpile",
            NodeKind::Execute => "execute",
            NodeKind::PostProcess => "post_process",
        }
    }

    /// Parse a kind from its wire name. Accepts `postprocess` and `-` too.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "circuit" => Some(NodeKind::Circuit),
            "transpile" => Some(NodeKind::Transpile),
            "execute" => Some(NodeKind::Execute),
            "post_process" | "postprocess" => Some(NodeKind::PostProcess),
            _ => None,
        }
    }

    /// The step role sections owned by this kind carry.
    pub fn role(self) -> StepRole {
        match self {
            NodeKind::Circuit => StepRole::Mapping,
            NodeKind::Transpile => StepRole::Optimization,
            NodeKind::Execute => StepRole::Execution,
            NodeKind::PostProcess => StepRole::PostProcessing,
        }
    }

    /// The kind owning sections of `role`.
    ///
    /// Configuration sections belong to no node. Sections of unknown role
    /// are treated as circuit-building code.
    pub fn from_role(role: StepRole) -> Option<Self> {
        match role {
            StepRole::Config => None,
            StepRole::Mapping | StepRole::Unknown => Some(NodeKind::Circuit),
            StepRole::Optimization => Some(NodeKind::Transpile),
            StepRole::Execution => Some(NodeKind::Execute),
            StepRole::PostProcessing => Some(NodeKind::PostProcess),
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime primitive used by an execute node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    /// Expectation values of observables.
    #[default]
    Estimator,
    /// Bitstring samples.
    Sampler,
}

impl Primitive {
    /// Guess the primitive from a label or category ("ESTIMATOR", "Sampler run").
    pub fn infer(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        if lower.contains("sampler") {
            Some(Primitive::Sampler)
        } else if lower.contains("estimator") {
            Some(Primitive::Estimator)
        } else {
            None
        }
    }

    /// Display name, as used for node categories.
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Estimator => "Estimator",
            Primitive::Sampler => "Sampler",
        }
    }
}

/// Circuit-building parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitParams {
    /// Number of qubits.
    pub num_qubits: u32,
    /// Repetitions of the entangling layer.
    pub reps: u32,
}

impl Default for CircuitParams {
    fn default() -> Self {
        Self {
            num_qubits: 2,
            reps: 1,
        }
    }
}

/// Transpiler parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranspileParams {
    /// Preset pass manager level (0..=3).
    pub optimization_level: u8,
}

impl Default for TranspileParams {
    fn default() -> Self {
        Self {
            optimization_level: 1,
        }
    }
}

/// Execution parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecuteParams {
    /// Primitive to run.
    pub primitive: Primitive,
    /// Shots per circuit.
    pub shots: u32,
    /// Error mitigation level (0..=2).
    pub resilience_level: u8,
}

impl Default for ExecuteParams {
    fn default() -> Self {
        Self {
            primitive: Primitive::Estimator,
            shots: 1024,
            resilience_level: 0,
        }
    }
}

/// Post-processing parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PostProcessParams {
    /// Output rendering.
    pub output: ResultKind,
}

/// Typed parameters, one variant per node kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeParams {
    Circuit(CircuitParams),
    Transpile(TranspileParams),
    Execute(ExecuteParams),
    PostProcess(PostProcessParams),
}

/// Result of assigning a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The stored value changed.
    Changed,
    /// The value was already set.
    Unchanged,
    /// The name is not part of this kind's schema.
    NotInSchema,
}

impl NodeParams {
    /// Default parameters for `kind`.
    pub fn default_for(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Circuit => NodeParams::Circuit(CircuitParams::default()),
            NodeKind::Transpile => NodeParams::Transpile(TranspileParams::default()),
            NodeKind::Execute => NodeParams::Execute(ExecuteParams::default()),
            NodeKind::PostProcess => NodeParams::PostProcess(PostProcessParams::default()),
        }
    }

    /// The kind these parameters belong to.
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeParams::Circuit(_) => NodeKind::Circuit,
            NodeParams::Transpile(_) => NodeKind::Transpile,
            NodeParams::Execute(_) => NodeKind::Execute,
            NodeParams::PostProcess(_) => NodeKind::PostProcess,
        }
    }

    /// Schema parameter names for this kind.
    pub fn names(&self) -> &'static [&'static str] {
        match self {
            NodeParams::Circuit(_) => &["num_qubits", "reps"],
            NodeParams::Transpile(_) => &["optimization_level"],
            NodeParams::Execute(_) => &["primitive", "shots", "resilience_level"],
            NodeParams::PostProcess(_) => &["output"],
        }
    }

    /// Current value of a schema parameter.
    pub fn get(&self, name: &str) -> Option<Value> {
        let value = match (self, name) {
            (NodeParams::Circuit(p), "num_qubits") => Value::from(p.num_qubits),
            (NodeParams::Circuit(p), "reps") => Value::from(p.reps),
            (NodeParams::Transpile(p), "optimization_level") => Value::from(p.optimization_level),
            (NodeParams::Execute(p), "primitive") => Value::from(p.primitive.name().to_lowercase()),
            (NodeParams::Execute(p), "shots") => Value::from(p.shots),
            (NodeParams::Execute(p), "resilience_level") => Value::from(p.resilience_level),
            (NodeParams::PostProcess(p), "output") => Value::from(p.output.as_str()),
            _ => return None,
        };
        Some(value)
    }

    /// Assign a schema parameter from a JSON value.
    ///
    /// Numbers may arrive as JSON numbers or numeric strings.
    pub fn set(&mut self, name: &str, value: &Value) -> GraphResult<SetOutcome> {
        let kind = self.kind();
        let invalid = |reason: &str| GraphError::InvalidParameter {
            kind,
            name: name.to_string(),
            reason: reason.to_string(),
        };

        let outcome = match (self, name) {
            (NodeParams::Circuit(p), "num_qubits") => {
                let n = bounded(value, 1, u64::from(u32::MAX))
                    .ok_or_else(|| invalid("expected a positive integer"))?;
                assign(&mut p.num_qubits, n as u32)
            }
            (NodeParams::Circuit(p), "reps") => {
                let n = bounded(value, 1, u64::from(u32::MAX))
                    .ok_or_else(|| invalid("expected a positive integer"))?;
                assign(&mut p.reps, n as u32)
            }
            (NodeParams::Transpile(p), "optimization_level") => {
                let n = bounded(value, 0, 3).ok_or_else(|| invalid("must be between 0 and 3"))?;
                assign(&mut p.optimization_level, n as u8)
            }
            (NodeParams::Execute(p), "primitive") => {
                let primitive = value
                    .as_str()
                    .and_then(|s| match s.trim().to_lowercase().as_str() {
                        "estimator" => Some(Primitive::Estimator),
                        "sampler" => Some(Primitive::Sampler),
                        _ => None,
                    })
                    .ok_or_else(|| invalid("expected 'estimator' or 'sampler'"))?;
                assign(&mut p.primitive, primitive)
            }
            (NodeParams::Execute(p), "shots") => {
                let n = bounded(value, 1, u64::from(u32::MAX))
                    .ok_or_else(|| invalid("expected a positive integer"))?;
                assign(&mut p.shots, n as u32)
            }
            (NodeParams::Execute(p), "resilience_level") => {
                let n = bounded(value, 0, 2).ok_or_else(|| invalid("must be between 0 and 2"))?;
                assign(&mut p.resilience_level, n as u8)
            }
            (NodeParams::PostProcess(p), "output") => {
                let output = value
                    .as_str()
                    .and_then(|s| ResultKind::parse(&s.trim().to_lowercase()))
                    .ok_or_else(|| invalid("expected 'text', 'graph' or 'plot'"))?;
                assign(&mut p.output, output)
            }
            _ => SetOutcome::NotInSchema,
        };
        Ok(outcome)
    }
}

fn assign<T: PartialEq>(slot: &mut T, value: T) -> SetOutcome {
    if *slot == value {
        SetOutcome::Unchanged
    } else {
        *slot = value;
        SetOutcome::Changed
    }
}

/// Read an unsigned integer in `min..=max` from a number or numeric string.
fn bounded(value: &Value, min: u64, max: u64) -> Option<u64> {
    let n = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    (min..=max).contains(&n).then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_role_mapping() {
        for kind in NodeKind::ALL {
            assert_eq!(NodeKind::from_role(kind.role()), Some(kind));
        }
        assert_eq!(NodeKind::from_role(StepRole::Config), None);
        assert_eq!(NodeKind::from_role(StepRole::Unknown), Some(NodeKind::Circuit));
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(NodeKind::parse("post-process"), Some(NodeKind::PostProcess));
        assert_eq!(NodeKind::parse("PostProcess"), Some(NodeKind::PostProcess));
        assert_eq!(NodeKind::parse("Execute"), Some(NodeKind::Execute));
        assert_eq!(NodeKind::parse("measure"), None);
    }

    #[test]
    fn test_set_accepts_numeric_strings() {
        let mut params = NodeParams::default_for(NodeKind::Transpile);
        assert_eq!(params.set("optimization_level", &json!("3")).unwrap(), SetOutcome::Changed);
        assert_eq!(params.set("optimization_level", &json!(3)).unwrap(), SetOutcome::Unchanged);
        assert_eq!(params.get("optimization_level"), Some(json!(3)));
    }

    #[test]
    fn test_set_rejects_out_of_range() {
        let mut params = NodeParams::default_for(NodeKind::Transpile);
        let err = params.set("optimization_level", &json!(4)).unwrap_err();
        assert!(matches!(err, GraphError::InvalidParameter { .. }));

        let mut params = NodeParams::default_for(NodeKind::Execute);
        assert!(params.set("shots", &json!(0)).is_err());
        assert!(params.set("resilience_level", &json!(-1)).is_err());
        assert!(params.set("primitive", &json!("annealer")).is_err());
        assert_eq!(params, NodeParams::default_for(NodeKind::Execute));
    }

    #[test]
    fn test_unknown_name_is_not_in_schema() {
        let mut params = NodeParams::default_for(NodeKind::Circuit);
        assert_eq!(params.set("color", &json!("red")).unwrap(), SetOutcome::NotInSchema);
        // Names from another kind's schema are unknown here.
        assert_eq!(params.set("shots", &json!(10)).unwrap(), SetOutcome::NotInSchema);
        assert_eq!(params.get("shots"), None);
    }

    #[test]
    fn test_execute_primitive_case_insensitive() {
        let mut params = NodeParams::default_for(NodeKind::Execute);
        assert_eq!(params.set("primitive", &json!("Sampler")).unwrap(), SetOutcome::Changed);
        assert_eq!(params.get("primitive"), Some(json!("sampler")));
    }

    #[test]
    fn test_tagged_serialization() {
        let params = NodeParams::default_for(NodeKind::PostProcess);
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json, json!({"kind": "post_process", "output": "text"}));

        let parsed: NodeParams =
            serde_json::from_value(json!({"kind": "execute", "primitive": "sampler"})).unwrap();
        assert_eq!(
            parsed,
            NodeParams::Execute(ExecuteParams {
                primitive: Primitive::Sampler,
                ..ExecuteParams::default()
            })
        );
    }

    #[test]
    fn test_primitive_inference() {
        assert_eq!(Primitive::infer("ESTIMATOR"), Some(Primitive::Estimator));
        assert_eq!(Primitive::infer("Run Sampler"), Some(Primitive::Sampler));
        assert_eq!(Primitive::infer("Transpiler"), None);
    }
}
