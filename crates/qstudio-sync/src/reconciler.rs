//! Rebuilding the program source from node fragments.

use qstudio_graph::{NodeId, ProgramGraph, SectionBinding};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::prelude::Prelude;
use crate::splicer::{SectionTarget, Splicer, TextualSplicer};

/// Which fragment slot a substitution targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    /// The node's section body.
    Primary,
    /// The interior of the section's input region.
    RawInput,
}

/// Why a substitution did not happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The captured baseline is blank, so there is nothing to search for.
    EmptyBaseline,
    /// The baseline no longer occurs in the text.
    BaselineNotFound,
    /// The node's section or its input markers could not be found.
    InputRegionNotFound,
}

/// A substitution left out of one rebuild pass.
///
/// Nothing is lost: the node keeps its fragment and the next rebuild tries
/// again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedSubstitution {
    pub node_id: NodeId,
    pub slot: Slot,
    pub reason: SkipReason,
}

/// Output of one rebuild pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rebuild {
    /// The rebuilt source.
    pub text: String,
    /// Substitutions that could not be applied.
    pub skipped: Vec<SkippedSubstitution>,
}

/// Stitches current node fragments into a loaded document.
#[derive(Debug)]
pub struct Reconciler {
    splicer: Box<dyn Splicer>,
}

impl Reconciler {
    /// Create a reconciler on top of a custom splicing backend.
    pub fn new(splicer: impl Splicer + 'static) -> Self {
        Self {
            splicer: Box::new(splicer),
        }
    }

    /// Rebuild `document` from the graph's current fragments.
    ///
    /// Primary fragments replace the first occurrence of their baseline,
    /// raw-input fragments replace the interior of their section's input
    /// region, and the prelude (if any) goes last. The result depends only
    /// on the arguments.
    #[instrument(skip_all, fields(nodes = graph.len(), baselines = baselines.len()))]
    pub fn rebuild(
        &self,
        document: &str,
        graph: &ProgramGraph,
        baselines: &[SectionBinding],
        prelude: Option<&Prelude>,
    ) -> Rebuild {
        let mut text = document.to_string();
        let mut skipped = Vec::new();

        for binding in baselines {
            let Some(node) = graph.node(&binding.node_id) else {
                continue;
            };
            let Some(current) = node.primary_fragment.as_deref() else {
                continue;
            };
            if current == binding.primary {
                continue;
            }
            if binding.primary.trim().is_empty() {
                skipped.push(skip(&binding.node_id, Slot::Primary, SkipReason::EmptyBaseline));
                continue;
            }
            match self.splicer.replace_fragment(&text, &binding.primary, current) {
                Some(next) => {
                    debug!(node = %binding.node_id, "Spliced primary fragment");
                    text = next;
                }
                None => {
                    warn!(node = %binding.node_id, "Baseline fragment not found, skipping");
                    skipped.push(skip(&binding.node_id, Slot::Primary, SkipReason::BaselineNotFound));
                }
            }
        }

        for node in graph.nodes() {
            let Some(input) = node.raw_input_fragment.as_deref() else {
                continue;
            };
            if input.is_empty() {
                continue;
            }
            let binding = baselines.iter().find(|b| b.node_id == node.id);
            if binding.is_some_and(|b| b.raw_input.as_deref() == Some(input)) {
                continue;
            }

            let target = SectionTarget {
                index: binding.map(|b| b.section_index),
                section_name: binding.map(|b| b.section_name.as_str()),
                display_name: &node.display_name,
            };
            match self.splicer.replace_input(&text, &target, input) {
                Some(next) => {
                    debug!(node = %node.id, "Spliced raw input");
                    text = next;
                }
                None => {
                    warn!(node = %node.id, "Input region not found, skipping");
                    skipped.push(skip(&node.id, Slot::RawInput, SkipReason::InputRegionNotFound));
                }
            }
        }

        if let Some(prelude) = prelude {
            text = prelude.apply(&text);
        }

        Rebuild { text, skipped }
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(TextualSplicer)
    }
}

fn skip(node_id: &NodeId, slot: Slot, reason: SkipReason) -> SkippedSubstitution {
    SkippedSubstitution {
        node_id: node_id.clone(),
        slot,
        reason,
    }
}

/// Rebuild with the default textual splicer.
pub fn rebuild(
    document: &str,
    graph: &ProgramGraph,
    baselines: &[SectionBinding],
    prelude: Option<&Prelude>,
) -> Rebuild {
    Reconciler::default().rebuild(document, graph, baselines, prelude)
}
