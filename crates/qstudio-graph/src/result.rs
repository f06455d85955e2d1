//! Execution result payloads displayed by post-processing nodes.

use serde::{Deserialize, Serialize};

/// How a post-processing node renders its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    /// Plain text.
    #[default]
    Text,
    /// Graph data (nodes/edges or bitstring counts).
    Graph,
    /// Plot data (series or histogram).
    Plot,
}

impl ResultKind {
    /// Parse the wire name (`text`, `graph`, `plot`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "graph" => Some(Self::Graph),
            "plot" => Some(Self::Plot),
            _ => None,
        }
    }

    /// The wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Graph => "graph",
            Self::Plot => "plot",
        }
    }
}

impl std::fmt::Display for ResultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed result extracted from program output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    /// Rendering kind.
    #[serde(rename = "type")]
    pub kind: ResultKind,
    /// Arbitrary JSON content.
    pub content: serde_json::Value,
}

impl ResultPayload {
    /// A plain-text payload.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: ResultKind::Text,
            content: serde_json::Value::String(content.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let payload: ResultPayload =
            serde_json::from_str(r#"{"type": "plot", "content": [1, 2, 3]}"#).unwrap();
        assert_eq!(payload.kind, ResultKind::Plot);
        assert_eq!(payload.content, serde_json::json!([1, 2, 3]));

        let json = serde_json::to_value(ResultPayload::text("42")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "text", "content": "42"}));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        assert!(serde_json::from_str::<ResultPayload>(r#"{"type": "table", "content": 1}"#).is_err());
        assert_eq!(ResultKind::parse("graph"), Some(ResultKind::Graph));
        assert_eq!(ResultKind::parse("Graph"), None);
    }
}
