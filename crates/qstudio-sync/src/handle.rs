//! Shared access to an [`EditorSession`] from many tasks.
//!
//! The session lives on its own task and processes one operation at a
//! time from an mpsc queue. Oracle calls run on the caller's task, between
//! two queued operations, so a slow service never blocks the session.

use std::sync::Arc;
use std::time::Duration;

use qstudio_graph::NodeId;
use qstudio_oracle::{BackendCredentials, CodegenOracle, ExecutionOracle, OracleError};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument, warn};

use crate::error::{SyncError, SyncResult};
use crate::session::{EditorSession, ExecutionReport, ParameterOutcome, ParameterUpdate};

/// Default code-generation timeout.
pub const DEFAULT_CODEGEN_TIMEOUT: Duration = Duration::from_secs(60);

const QUEUE_CAPACITY: usize = 64;

type Job = Box<dyn FnOnce(&mut EditorSession) + Send>;

/// Cloneable handle to a session task.
#[derive(Clone)]
pub struct SessionHandle {
    jobs: mpsc::Sender<Job>,
    codegen: Arc<dyn CodegenOracle>,
    timeout: Duration,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("timeout", &self.timeout)
            .field("closed", &self.jobs.is_closed())
            .finish_non_exhaustive()
    }
}

impl SessionHandle {
    /// Move `session` onto a new task. Must be called inside a tokio runtime.
    pub fn spawn(
        session: EditorSession,
        codegen: Arc<dyn CodegenOracle>,
        timeout: Duration,
    ) -> Self {
        let (jobs, mut queue) = mpsc::channel::<Job>(QUEUE_CAPACITY);
        tokio::spawn(async move {
            let mut session = session;
            while let Some(job) = queue.recv().await {
                job(&mut session);
            }
            debug!(session = %session.id(), "Session task stopped");
        });
        Self {
            jobs,
            codegen,
            timeout,
        }
    }

    /// Run `f` on the session and wait for its result.
    pub async fn with_session<F, R>(&self, f: F) -> SyncResult<R>
    where
        F: FnOnce(&mut EditorSession) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let job: Job = Box::new(move |session| {
            let _ = reply.send(f(session));
        });
        self.jobs
            .send(job)
            .await
            .map_err(|_| SyncError::SessionClosed)?;
        response.await.map_err(|_| SyncError::SessionClosed)
    }

    /// Change a parameter, regenerating the node's code if needed.
    ///
    /// A request identical to one in flight returns
    /// [`ParameterUpdate::Duplicate`] without calling the oracle. A call
    /// that outlives the timeout fails with [`OracleError::Timeout`] and
    /// frees the request key.
    #[instrument(skip(self, name, value), fields(node = %node_id))]
    pub async fn request_parameter_change(
        &self,
        node_id: NodeId,
        name: impl Into<String>,
        value: Value,
    ) -> SyncResult<ParameterUpdate> {
        let name = name.into();
        let outcome = self
            .with_session(move |s| s.begin_parameter_change(&node_id, &name, value))
            .await??;

        let ticket = match outcome {
            ParameterOutcome::Applied(change) => return Ok(ParameterUpdate::Applied(change)),
            ParameterOutcome::Duplicate => return Ok(ParameterUpdate::Duplicate),
            ParameterOutcome::Dispatch(ticket) => ticket,
        };

        let result = match tokio::time::timeout(self.timeout, self.codegen.generate(ticket.request()))
            .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout = ?self.timeout, "Code generation timed out");
                Err(OracleError::Timeout(self.timeout))
            }
        };

        self.with_session(move |s| s.complete_parameter_change(ticket, result))
            .await?
    }

    /// Run the current source and route its result.
    #[instrument(skip_all)]
    pub async fn run(
        &self,
        oracle: &dyn ExecutionOracle,
        credentials: Option<BackendCredentials>,
    ) -> SyncResult<ExecutionReport> {
        let request = self
            .with_session(move |s| s.begin_execution(credentials.as_ref()))
            .await?;
        let response = oracle.execute(&request).await?;
        self.with_session(move |s| s.complete_execution(&response))
            .await?
    }

    /// Current program source.
    pub async fn source(&self) -> SyncResult<String> {
        self.with_session(|s| s.source().to_string()).await
    }

    /// Whether the node should show as updating.
    pub async fn is_updating(&self, node_id: NodeId) -> SyncResult<bool> {
        self.with_session(move |s| s.is_updating(&node_id)).await
    }
}
