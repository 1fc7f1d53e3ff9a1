// Embeddings, the disease/symptom vector index, and semantic retrieval

pub mod document_processor;
pub mod embedder;
pub mod retriever;
pub mod vector_search;

pub use document_processor::*;
pub use embedder::*;
pub use retriever::Retriever;
pub use vector_search::*;
