//! Keeps a program graph and its source text in step.
//!
//! A loaded template gives every node a section of the source. Whenever the
//! graph changes, the [`Reconciler`] rebuilds the source from the document
//! as loaded, substituting each node's current fragment for the text it
//! owned at load time and leaving everything else byte-for-byte intact.
//! Graphs without a template are composed from scratch instead.
//!
//! Fragments produced by the code-generation service arrive asynchronously.
//! The [`PendingTracker`] keeps a node marked as updating until its new code
//! is actually visible in the rebuilt source, and the
//! [`RequestDeduplicator`] makes sure the same edit is only in flight once.
//!
//! # Example
//!
//! ```rust
//! use qstudio_graph::Template;
//! use qstudio_sync::EditorSession;
//!
//! let source = "## STEP 1 : Map\nmol = build()\n## STEP 2 : Execute\njob = run(mol)\n";
//! let mut session = EditorSession::new();
//! session.load_template(&Template::from_source("demo", source)).unwrap();
//!
//! session.set_primary_fragment(&"map".into(), "mol = build(basis='sto3g')\n").unwrap();
//! assert!(session.source().ends_with("## STEP 2 : Execute\njob = run(mol)\n"));
//! ```

pub mod dedup;
pub mod error;
mod handle;
pub mod pending;
pub mod prelude;
pub mod reconciler;
mod session;
pub mod splicer;

pub use dedup::{InFlightGuard, InFlightKey, RequestDeduplicator};
pub use error::{SyncError, SyncResult};
pub use handle::{DEFAULT_CODEGEN_TIMEOUT, SessionHandle};
pub use pending::{PendingState, PendingTracker};
pub use prelude::Prelude;
pub use reconciler::{Rebuild, Reconciler, SkipReason, SkippedSubstitution, Slot, rebuild};
pub use session::{
    EditorSession, ExecutionReport, ParameterOutcome, ParameterTicket, ParameterUpdate,
    SourceDocument,
};
pub use splicer::{SectionTarget, Splicer, TextualSplicer};
