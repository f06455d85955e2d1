//! Clients for the services qstudio talks to.
//!
//! Two external services are involved, both modeled as traits so the
//! editing engine can be driven by real HTTP clients or by in-process fakes:
//!
//! - [`CodegenOracle`]: regenerates a node's code after a parameter change.
//! - [`ExecutionOracle`]: runs a whole program and returns its output.
//!
//! Program output carries its typed result on a `RESULT: <json>` line;
//! [`extract_result`] pulls it out.

mod client;
pub mod codegen;
pub mod error;
pub mod execution;
pub mod extract;

pub use client::EndpointConfig;
pub use codegen::{CodegenOracle, CodegenRequest, CodegenResponse, HttpCodegenOracle};
pub use error::{OracleError, OracleResult};
pub use execution::{
    BackendCredentials, DEFAULT_CHANNEL, ExecutionOracle, ExecutionRequest, ExecutionResponse,
    HttpExecutionOracle,
};
pub use extract::{RESULT_PREFIX, extract_code, extract_result, normalize_output};
