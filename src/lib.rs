//! Quality analytics over tour survey data.
//!
//! Responses are narrowed once with a [`FilterSpec`], and the same subset
//! then feeds issue clustering, destination trends and the impact views.
//! Every read is a pure function of an [`EntityStore`] snapshot; the only
//! write is appending corrective actions.

pub mod backlog;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod impact;
pub mod issues;
pub mod loader;
pub mod models;
pub mod report;
pub mod store;
pub mod trend;

#[cfg(test)]
mod testing;

pub use config::EngineConfig;
pub use engine::QualityEngine;
pub use error::{EngineError, EngineResult, EntityKind, FieldError};
pub use filter::{DateRange, FilterSpec};
pub use impact::{ActionFilter, CorrectiveActionInput};
pub use issues::{IssueClusters, IssueScope, ScopeKey};
pub use store::{Dataset, EntityStore};
pub use trend::Period;
