//! One editing session: graph, loaded document and the derived source.
//!
//! Every mutation runs exactly one rebuild followed by a pending-update
//! check. Code-generation round trips are split in two halves so the
//! oracle call can run outside the session:
//! [`EditorSession::begin_parameter_change`] hands out a
//! [`ParameterTicket`] and [`EditorSession::complete_parameter_change`]
//! applies the answer, unless the session moved on in the meantime.

use qstudio_graph::{
    EdgeId, Node, NodeId, NodeKind, ParameterChange, ProgramGraph, ResultPayload, SectionBinding,
    Template, TemplateId, compose, generate,
};
use qstudio_oracle::{
    BackendCredentials, CodegenRequest, ExecutionRequest, ExecutionResponse, OracleResult,
};
use qstudio_source::{Highlight, HighlightQuery, HighlightResolver, ParsedSource, parse};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dedup::{InFlightGuard, InFlightKey, RequestDeduplicator};
use crate::error::SyncResult;
use crate::pending::{PendingState, PendingTracker};
use crate::prelude::Prelude;
use crate::reconciler::{Rebuild, Reconciler, SkippedSubstitution};

/// A loaded template document.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Source text as loaded.
    pub raw_text: String,
    /// Template it came from.
    pub template_id: TemplateId,
    /// Sections of `raw_text`.
    pub parsed: ParsedSource,
}

/// First half of a parameter change.
#[derive(Debug)]
pub enum ParameterOutcome {
    /// Stored without code generation.
    Applied(ParameterChange),
    /// The same request is already in flight; nothing was done.
    Duplicate,
    /// Code generation is needed: send the ticket's request to the oracle.
    Dispatch(ParameterTicket),
}

/// How a parameter change ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterUpdate {
    /// Stored without code generation.
    Applied(ParameterChange),
    /// Dropped because the same request was in flight.
    Duplicate,
    /// New code was written; `pending` until it shows up in the source.
    Regenerated { pending: bool },
    /// The answer arrived after the node or template went away.
    Stale,
}

/// An outstanding code-generation request.
///
/// Holds the in-flight key: dropping the ticket, whether after completion,
/// on timeout or on failure, lets an identical request through again.
#[derive(Debug)]
pub struct ParameterTicket {
    request: CodegenRequest,
    raw_input: bool,
    epoch: u64,
    _guard: InFlightGuard,
}

impl ParameterTicket {
    /// The request to send.
    pub fn request(&self) -> &CodegenRequest {
        &self.request
    }

    /// The node being edited.
    pub fn node_id(&self) -> &NodeId {
        &self.request.node_id
    }
}

/// What an execution produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    /// Program output, newlines normalized.
    pub output: String,
    /// Typed result printed by the program.
    pub result: Option<ResultPayload>,
    /// Node that received the result.
    pub routed_to: Option<NodeId>,
}

/// Editing session state. Single writer; see [`SessionHandle`](crate::SessionHandle)
/// for shared use.
#[derive(Debug)]
pub struct EditorSession {
    id: String,
    graph: ProgramGraph,
    document: Option<SourceDocument>,
    baselines: Vec<SectionBinding>,
    pending: PendingTracker,
    in_flight: RequestDeduplicator,
    prelude: Option<Prelude>,
    epoch: u64,
    source: String,
    skipped: Vec<SkippedSubstitution>,
    highlighter: HighlightResolver,
    reconciler: Reconciler,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorSession {
    /// Empty session in composer mode.
    pub fn new() -> Self {
        Self::with_reconciler(Reconciler::default())
    }

    /// Empty session using a custom reconciler.
    pub fn with_reconciler(reconciler: Reconciler) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            graph: ProgramGraph::new(),
            document: None,
            baselines: Vec::new(),
            pending: PendingTracker::new(),
            in_flight: RequestDeduplicator::new(),
            prelude: None,
            epoch: 0,
            source: String::new(),
            skipped: Vec::new(),
            highlighter: HighlightResolver::new(),
            reconciler,
        }
    }

    /// Session identifier sent along with oracle requests.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The graph.
    pub fn graph(&self) -> &ProgramGraph {
        &self.graph
    }

    /// The loaded document, if any.
    pub fn document(&self) -> Option<&SourceDocument> {
        self.document.as_ref()
    }

    /// Load-time bindings of the current template.
    pub fn baselines(&self) -> &[SectionBinding] {
        &self.baselines
    }

    /// The current program source.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Substitutions the last rebuild could not apply.
    pub fn skipped(&self) -> &[SkippedSubstitution] {
        &self.skipped
    }

    /// The configured prelude.
    pub fn prelude(&self) -> Option<&Prelude> {
        self.prelude.as_ref()
    }

    // ------------------------------------------------------------------
    // Document lifecycle
    // ------------------------------------------------------------------

    /// Replace the graph with a template's nodes and load its source.
    ///
    /// All pending updates are discarded and responses to requests issued
    /// before the load are ignored.
    pub fn load_template(&mut self, template: &Template) -> SyncResult<()> {
        let instantiated = template.instantiate()?;
        self.graph = instantiated.graph;
        self.baselines = instantiated.bindings;
        self.document = Some(SourceDocument {
            raw_text: template.source.clone(),
            template_id: template.id.clone(),
            parsed: parse(&template.source),
        });
        self.reset_epoch();
        info!(
            session = %self.id,
            template = %template.id,
            nodes = self.graph.len(),
            "Loaded template"
        );
        self.rebuild();
        Ok(())
    }

    /// Drop the template and start an empty graph in composer mode.
    pub fn clear_template(&mut self) {
        self.graph.clear();
        self.baselines.clear();
        self.document = None;
        self.reset_epoch();
        debug!(session = %self.id, "Cleared template");
        self.rebuild();
    }

    fn reset_epoch(&mut self) {
        self.epoch += 1;
        self.pending.clear();
        self.highlighter.invalidate();
    }

    /// Set or remove the backend configuration prelude.
    pub fn set_prelude(&mut self, prelude: Option<Prelude>) {
        self.prelude = prelude;
        self.rebuild();
    }

    // ------------------------------------------------------------------
    // Graph mutations
    // ------------------------------------------------------------------

    /// Add a node.
    pub fn add_node(&mut self, node: Node) -> SyncResult<()> {
        self.graph.add_node(node)?;
        self.rebuild();
        Ok(())
    }

    /// Remove a node, its edges, binding and pending update.
    pub fn remove_node(&mut self, id: &NodeId) -> SyncResult<Node> {
        let node = self.graph.remove_node(id)?;
        self.pending.discard(id);
        self.baselines.retain(|b| &b.node_id != id);
        self.rebuild();
        Ok(node)
    }

    /// Connect two nodes.
    pub fn connect(&mut self, source: &NodeId, target: &NodeId) -> SyncResult<EdgeId> {
        let edge = self.graph.connect(source, target)?;
        self.rebuild();
        Ok(edge)
    }

    /// Remove an edge.
    pub fn disconnect(&mut self, edge: &EdgeId) -> SyncResult<()> {
        self.graph.disconnect(edge)?;
        self.rebuild();
        Ok(())
    }

    /// Overwrite a node's primary fragment directly.
    pub fn set_primary_fragment(&mut self, id: &NodeId, code: impl Into<String>) -> SyncResult<()> {
        self.graph.set_primary_fragment(id, Some(code.into()))?;
        self.rebuild();
        Ok(())
    }

    /// Overwrite a node's raw-input fragment directly.
    pub fn set_raw_input(&mut self, id: &NodeId, code: impl Into<String>) -> SyncResult<()> {
        self.graph.set_raw_input_fragment(id, Some(code.into()))?;
        self.rebuild();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Parameter changes
    // ------------------------------------------------------------------

    /// Start a parameter change.
    ///
    /// Fails on an unknown node or invalid value. A request identical to
    /// one in flight comes back as [`ParameterOutcome::Duplicate`].
    pub fn begin_parameter_change(
        &mut self,
        node_id: &NodeId,
        name: &str,
        value: Value,
    ) -> SyncResult<ParameterOutcome> {
        if !self.graph.contains(node_id) {
            return Err(qstudio_graph::GraphError::NodeNotFound(node_id.clone()).into());
        }
        let Some(guard) = self
            .in_flight
            .acquire(InFlightKey::new(node_id, name, &value))
        else {
            return Ok(ParameterOutcome::Duplicate);
        };

        let change = self.graph.set_parameter(node_id, name, &value)?;
        if change.changed {
            self.rebuild();
        }
        if !change.affects_fragment {
            return Ok(ParameterOutcome::Applied(change));
        }

        let node = self
            .graph
            .node(node_id)
            .ok_or_else(|| qstudio_graph::GraphError::NodeNotFound(node_id.clone()))?;
        let current_code = if change.raw_input {
            node.raw_input_fragment.clone().unwrap_or_default()
        } else {
            node.primary_fragment
                .clone()
                .unwrap_or_else(|| generate(&self.graph, node))
        };

        let request = CodegenRequest {
            node_id: node_id.clone(),
            node_type: node.kind(),
            current_code,
            parameter_name: name.to_string(),
            new_value: value,
            node_label: node.display_name.clone(),
            session_id: self.id.clone(),
        };
        debug!(node = %node_id, parameter = name, "Dispatching code generation");
        Ok(ParameterOutcome::Dispatch(ParameterTicket {
            request,
            raw_input: change.raw_input,
            epoch: self.epoch,
            _guard: guard,
        }))
    }

    /// Apply the oracle's answer to a ticket.
    ///
    /// A failed call leaves the graph untouched and is returned as an
    /// error. An answer for a node or template that is gone is dropped.
    pub fn complete_parameter_change(
        &mut self,
        ticket: ParameterTicket,
        result: OracleResult<String>,
    ) -> SyncResult<ParameterUpdate> {
        let node_id = ticket.node_id().clone();
        if ticket.epoch != self.epoch || !self.graph.contains(&node_id) {
            warn!(node = %node_id, "Discarding stale code generation response");
            return Ok(ParameterUpdate::Stale);
        }
        let code = result?;

        if ticket.raw_input {
            self.graph
                .set_raw_input_fragment(&node_id, Some(code.clone()))?;
        } else {
            self.graph.set_primary_fragment(&node_id, Some(code.clone()))?;
        }
        if self.pending.promise(&node_id, code) == Some(PendingState::Superseded) {
            debug!(node = %node_id, "Earlier update superseded");
        }
        self.rebuild();

        Ok(ParameterUpdate::Regenerated {
            pending: self.pending.is_pending(&node_id),
        })
    }

    /// Whether the node should show as updating.
    pub fn is_updating(&self, id: &NodeId) -> bool {
        self.pending.is_pending(id) || self.in_flight.is_node_in_flight(id)
    }

    /// Nodes whose generated code is not yet visible.
    pub fn pending_nodes(&self) -> Vec<NodeId> {
        self.pending.pending_nodes()
    }

    // ------------------------------------------------------------------
    // Queries and execution
    // ------------------------------------------------------------------

    /// Lines of the current source owned by a node.
    pub fn highlight(&mut self, id: &NodeId) -> Option<Highlight> {
        let node = self.graph.node(id)?;
        let mut query = HighlightQuery::label(&node.display_name).with_role(node.kind().role());
        if !node.category.is_empty() {
            query = query.with_category(&node.category);
        }
        self.highlighter.resolve(&query, &self.source)
    }

    /// Build the request that runs the current source.
    ///
    /// Without credentials the program is pointed at the local simulator.
    pub fn begin_execution(&self, credentials: Option<&BackendCredentials>) -> ExecutionRequest {
        let prelude = Prelude::for_credentials(credentials);
        let request = ExecutionRequest::new(prelude.prepare_for_execution(&self.source));
        match credentials {
            Some(creds) => request.with_credentials(creds),
            None => request,
        }
    }

    /// Route an execution's result to the first post-processing node.
    pub fn complete_execution(&mut self, response: &ExecutionResponse) -> SyncResult<ExecutionReport> {
        let result = response.result();
        let mut routed_to = None;

        if let Some(payload) = &result {
            let target = self.graph.topological_order().into_iter().find(|id| {
                self.graph
                    .node(id)
                    .is_some_and(|n| n.kind() == NodeKind::PostProcess)
            });
            match target {
                Some(id) => {
                    self.graph.set_output(&id, payload.clone())?;
                    debug!(node = %id, kind = payload.kind.as_str(), "Routed execution result");
                    routed_to = Some(id);
                }
                None => debug!("No post-processing node for execution result"),
            }
        }

        Ok(ExecutionReport {
            output: response.text(),
            result,
            routed_to,
        })
    }

    fn rebuild(&mut self) {
        let Rebuild { text, skipped } = match &self.document {
            Some(doc) => self.reconciler.rebuild(
                &doc.raw_text,
                &self.graph,
                &self.baselines,
                self.prelude.as_ref(),
            ),
            None => {
                let composed = compose(&self.graph);
                Rebuild {
                    text: match &self.prelude {
                        Some(prelude) => prelude.apply(&composed),
                        None => composed,
                    },
                    skipped: Vec::new(),
                }
            }
        };
        self.source = text;
        self.skipped = skipped;

        let still_pending = self.pending.resolve(&self.source);
        debug!(
            session = %self.id,
            bytes = self.source.len(),
            skipped = self.skipped.len(),
            pending = still_pending.len(),
            "Rebuilt source"
        );
    }
}
