pub mod config;
pub mod container;
pub mod embedding;
pub mod git;
pub mod mcp;
pub mod parser;
pub mod storage;

pub use config::AppConfig;
pub use container::Container;
pub use embedding::{HashEmbedding, RemoteEmbedding};
pub use git::GitCliView;
pub use mcp::SourceRackMcpServer;
pub use parser::{
    ChunkLimits, EndpointRegistry, ExtractorRegistry, LanguageRegistry, TreeSitterChunker,
};
pub use storage::{
    DuckdbMetadataStore, DuckdbStructureIndex, DuckdbVectorStore, QdrantVectorStore,
};
