mod chunker;
pub mod endpoints;
pub mod extract;
mod registry;

pub use chunker::{ChunkLimits, TreeSitterChunker};
pub use endpoints::EndpointRegistry;
pub use extract::ExtractorRegistry;
pub use registry::{GrammarTier, LanguageRegistry};
