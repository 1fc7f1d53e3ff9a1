// Medbot - medical question router: decider, retrieval/research tools, answer synthesis, safety guard

pub mod config;
pub mod db;
pub mod models;
pub mod types;
pub mod agents;
pub mod llm;
pub mod search;    // SerpAPI (Google Scholar and Light) and PubMed E-utilities
pub mod embeddings;
pub mod tools;
pub mod routes;
pub mod middleware;
pub mod utils;

// Re-exports for convenience
pub use agents::{ChatState, MedicalPipeline};
pub use config::Config;
pub use models::AppState;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
