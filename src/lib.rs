//! # SourceRack
//!
//! Commit-scoped code intelligence over Git repositories: content-addressed
//! code chunks with embeddings for semantic search, and a relational
//! structure index (symbols, usages, imports, endpoints) for structural and
//! impact queries.
//!
//! ## Architecture
//!
//! The crate is organized following Domain-Driven Design principles:
//!
//! - `domain`: Core models, content addressing, and the error taxonomy
//! - `application`: Ports plus the indexing orchestrator, usage linker,
//!   garbage collector, and query engine use cases
//! - `connector`: External integrations (Git CLI, tree-sitter, DuckDB,
//!   Qdrant, embedding providers, configuration, MCP server)

pub mod application;
pub mod cli;
pub mod connector;
pub mod domain;

// Re-export commonly used types
pub use application::*;
pub use connector::*;
pub use domain::*;
