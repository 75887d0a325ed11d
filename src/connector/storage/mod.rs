pub mod duckdb;
mod qdrant;

pub use duckdb::{DuckdbMetadataStore, DuckdbStructureIndex, DuckdbVectorStore};
pub use qdrant::QdrantVectorStore;
