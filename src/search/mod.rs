//! Search Module
//!
//! External literature and web search backing the research tools:
//! - PubMed via NCBI E-utilities
//! - Google Scholar (primary) and Google Light (secondary) via SerpAPI

pub mod pubmed;
pub mod serpapi;

pub use pubmed::{PubMedArticle, PubMedClient};
pub use serpapi::{CombinedSearchResults, LightResult, ScholarResult, SearchError, SerpApiClient};
