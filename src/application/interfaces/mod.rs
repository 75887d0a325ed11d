mod embedding_service;
mod git_view;
mod metadata_store;
mod parser_services;
mod structure_index;
mod vector_repository;

pub use embedding_service::*;
pub use git_view::*;
pub use metadata_store::*;
pub use parser_services::*;
pub use structure_index::*;
pub use vector_repository::*;
