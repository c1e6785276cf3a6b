//! Tenure - git authorship competence mining
//!
//! Walks a repository's commit history, attributes lines of each file
//! to the authors who most recently changed them, and derives a
//! per-(file, author) comprehension competence score for consumption by
//! code-browsing tooling.

pub mod cli;
pub mod company;
pub mod config;
pub mod engine;
pub mod git;
pub mod models;
pub mod persist;
pub mod registry;
pub mod similarity;

pub use config::{ConfigError, EngineConfig, StridePolicy};
pub use engine::{CompetenceEngine, RunStats};
pub use persist::{JsonLinesGateway, MemoryGateway, PersistenceGateway};
pub use registry::{FileRegistry, WorkdirRegistry};
