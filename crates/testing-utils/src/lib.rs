//! # Analysis Testing Utils
//!
//! Shared testing utilities for the analysis platform workspace.
//!
//! - **Mock collaborators**: catalog, IO and executor managers that record calls
//! - **Builders**: jobs and tool manifests with sensible defaults
//! - **Helpers**: filesystem fixtures and polling
//!
//! Add this crate as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! analysis-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
