//! CLI command implementations.

pub mod common;
pub mod compose;
pub mod edit;
pub mod generate;
pub mod highlight;
pub mod run;
pub mod sections;
pub mod version;
