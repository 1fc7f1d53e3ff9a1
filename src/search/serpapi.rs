//! SerpAPI Client
//!
//! Provides search functionality using SerpAPI for:
//! - Google Scholar: peer-reviewed papers backing the research tool
//! - Google Light: quick general web search backing the websearch tool
//!
//! ## Search Strategy
//!
//! 1. **Google Scholar (Primary)** for research questions
//! 2. **Google Light (Secondary)** when Scholar fails or is thin, restricted
//!    to reliable medical and scientific domains

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serpapi_search_rust::serp_api_search::SerpApiSearch;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Scholar hit count below which Google Light is also queried
const MIN_SCHOLAR_RESULTS: usize = 3;

/// Errors that can occur during search operations
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("SerpAPI key not configured")]
    NoApiKey,

    #[error("Search request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse search results: {0}")]
    ParseError(String),

    #[error("No results found for query")]
    NoResults,

    #[error("Search engine not enabled: {0}")]
    EngineDisabled(String),
}

/// Result from a Google Scholar search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScholarResult {
    pub title: String,
    pub authors: Option<String>,
    pub year: Option<i32>,
    pub snippet: String,
    pub link: Option<String>,
    pub citations: Option<i32>,
    pub doi: Option<String>,
    pub publication: Option<String>,
}

impl ScholarResult {
    /// Render as a single tool result
    pub fn to_result_text(&self) -> String {
        let mut source = String::from("Source: Google Scholar");
        match (&self.publication, self.year) {
            (Some(publication), Some(year)) => source.push_str(&format!(" ({}, {})", publication, year)),
            (Some(publication), None) => source.push_str(&format!(" ({})", publication)),
            (None, Some(year)) => source.push_str(&format!(" ({})", year)),
            (None, None) => {}
        }
        if let Some(citations) = self.citations {
            source.push_str(&format!(", cited by {}", citations));
        }

        let link = match (&self.doi, &self.link) {
            (Some(doi), _) => format!("https://doi.org/{}", doi),
            (None, Some(link)) => link.clone(),
            (None, None) => String::new(),
        };

        format!(
            "**{}**\n{}\nAuthors: {}\nLink: {}\n\n{}\n",
            self.title,
            source,
            self.authors.as_deref().unwrap_or("Unknown"),
            link,
            self.snippet
        )
    }
}

/// Result from a Google Light search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightResult {
    pub title: String,
    pub snippet: String,
    pub link: String,
    /// Source domain
    pub source: Option<String>,
    pub date: Option<String>,
}

impl LightResult {
    /// Render as a single tool result
    pub fn to_result_text(&self) -> String {
        let source = self.source.as_deref().unwrap_or("web");
        let source_line = match &self.date {
            Some(date) => format!("Source: {} ({})", source, date),
            None => format!("Source: {}", source),
        };
        format!("**{}**\n{}\nLink: {}\n\n{}\n", self.title, source_line, self.link, self.snippet)
    }
}

/// Combined search results from both engines
#[derive(Debug, Clone, Default)]
pub struct CombinedSearchResults {
    pub scholar_results: Vec<ScholarResult>,
    pub light_results: Vec<LightResult>,
    pub scholar_success: bool,
    pub light_success: bool,
    pub errors: Vec<String>,
}

impl CombinedSearchResults {
    pub fn is_empty(&self) -> bool {
        self.scholar_results.is_empty() && self.light_results.is_empty()
    }

    /// `NoResults` is a successful search with zero hits
    fn record_scholar(&mut self, outcome: Result<Vec<ScholarResult>, SearchError>) {
        match outcome {
            Ok(results) => {
                self.scholar_results = results;
                self.scholar_success = true;
            }
            Err(SearchError::NoResults) => {
                info!("Scholar search found nothing");
                self.scholar_success = true;
            }
            Err(e) => {
                warn!(error = %e, "Scholar search failed");
                self.errors.push(format!("Scholar: {}", e));
            }
        }
    }

    /// Keeps reliable sources only
    fn record_light(&mut self, outcome: Result<Vec<LightResult>, SearchError>) {
        match outcome {
            Ok(results) => {
                self.light_results = results
                    .into_iter()
                    .filter(|r| is_reliable_source(&r.link))
                    .collect();
                self.light_success = true;
                info!(count = self.light_results.len(), "Light search successful");
            }
            Err(SearchError::NoResults) => {
                info!("Light search found nothing");
                self.light_success = true;
            }
            Err(e) => {
                warn!(error = %e, "Light search failed");
                self.errors.push(format!("Light: {}", e));
            }
        }
    }
}

/// SerpAPI client for medical and scientific search
#[derive(Debug, Clone)]
pub struct SerpApiClient {
    api_key: String,
    scholar_enabled: bool,
    light_enabled: bool,
    max_results: usize,
}

impl SerpApiClient {
    /// Configure client from config; `None` when no key is set
    pub fn from_config(config: &crate::config::SearchConfig) -> Option<Self> {
        if config.serpapi_key.trim().is_empty() {
            return None;
        }

        Some(Self {
            api_key: config.serpapi_key.clone(),
            scholar_enabled: config.scholar_enabled,
            light_enabled: config.light_enabled,
            max_results: config.max_results,
        })
    }

    async fn fetch_organic(&self, params: HashMap<String, String>) -> Result<Vec<Value>, SearchError> {
        let search = SerpApiSearch::google(params, self.api_key.clone());

        let results = search
            .json()
            .await
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        let organic_results = results
            .get("organic_results")
            .cloned()
            .ok_or(SearchError::NoResults)?;

        match organic_results {
            Value::Array(items) if items.is_empty() => Err(SearchError::NoResults),
            Value::Array(items) => Ok(items),
            _ => Err(SearchError::ParseError("Expected array of results".to_string())),
        }
    }

    /// Search Google Scholar for academic papers
    pub async fn search_scholar(&self, query: &str) -> Result<Vec<ScholarResult>, SearchError> {
        if !self.scholar_enabled {
            return Err(SearchError::EngineDisabled("Google Scholar".to_string()));
        }

        info!(query = %query, "Searching Google Scholar via SerpAPI");

        let mut params = HashMap::<String, String>::new();
        params.insert("engine".to_string(), "google_scholar".to_string());
        params.insert("q".to_string(), query.to_string());
        params.insert("hl".to_string(), "en".to_string());
        params.insert("num".to_string(), self.max_results.to_string());

        let organic = self.fetch_organic(params).await?;
        debug!("Raw Scholar response received");

        let scholar_results = parse_scholar_results(&organic, self.max_results);
        info!(count = scholar_results.len(), "Google Scholar search completed");
        Ok(scholar_results)
    }

    /// Search Google Light for quick web results
    pub async fn search_light(&self, query: &str) -> Result<Vec<LightResult>, SearchError> {
        if !self.light_enabled {
            return Err(SearchError::EngineDisabled("Google Light".to_string()));
        }

        info!(query = %query, "Searching Google Light via SerpAPI");

        let mut params = HashMap::<String, String>::new();
        params.insert("engine".to_string(), "google_light".to_string());
        params.insert("q".to_string(), query.to_string());
        params.insert("hl".to_string(), "en".to_string());
        params.insert("gl".to_string(), "us".to_string());
        params.insert("num".to_string(), self.max_results.to_string());

        let organic = self.fetch_organic(params).await?;
        debug!("Raw Light response received");

        let light_results = parse_light_results(&organic, self.max_results);
        info!(count = light_results.len(), "Google Light search completed");
        Ok(light_results)
    }

    /// Scholar first; Light (reliable sources only) when Scholar is
    /// disabled, failed, or returned few results
    pub async fn search_combined(&self, query: &str) -> CombinedSearchResults {
        let mut combined = CombinedSearchResults::default();

        if self.scholar_enabled {
            combined.record_scholar(self.search_scholar(query).await);
        }

        if self.light_enabled && needs_light_fallback(self.scholar_enabled, &combined) {
            let scientific_query = format!("{} research study scientific", query);

            combined.record_light(self.search_light(&scientific_query).await);
        }

        combined
    }
}

fn needs_light_fallback(scholar_enabled: bool, combined: &CombinedSearchResults) -> bool {
    !scholar_enabled
        || !combined.scholar_success
        || combined.scholar_results.len() < MIN_SCHOLAR_RESULTS
}

fn str_field(result: &Value, key: &str) -> Option<String> {
    result.get(key).and_then(|v| v.as_str()).map(String::from)
}

/// Parse SerpAPI Scholar `organic_results`
pub fn parse_scholar_results(organic: &[Value], max: usize) -> Vec<ScholarResult> {
    let latest_year = chrono::Utc::now().year() + 1;

    organic
        .iter()
        .take(max)
        .map(|result| {
            let title = str_field(result, "title").unwrap_or_else(|| "Untitled".to_string());
            let snippet = str_field(result, "snippet").unwrap_or_default();
            let link = str_field(result, "link");

            // Summary is usually "Authors - Journal, Year - publisher"
            let summary = result
                .get("publication_info")
                .and_then(|p| p.get("summary"))
                .and_then(|v| v.as_str());

            let authors = summary.map(|s| s.split(" - ").next().unwrap_or(s).trim().to_string());

            let year = summary.and_then(|s| {
                s.split(|c: char| !c.is_ascii_digit())
                    .filter(|part| part.len() == 4)
                    .filter_map(|y| y.parse::<i32>().ok())
                    .find(|&y| (1900..=latest_year).contains(&y))
            });

            let publication = summary.and_then(|s| {
                let parts: Vec<&str> = s.split(" - ").collect();
                if parts.len() > 1 {
                    Some(parts[1..].join(" - "))
                } else {
                    None
                }
            });

            let citations = result
                .get("inline_links")
                .and_then(|links| links.get("cited_by"))
                .and_then(|cited| cited.get("total"))
                .and_then(|v| v.as_i64())
                .map(|n| n as i32);

            let doi = link
                .as_deref()
                .and_then(extract_doi)
                .or_else(|| extract_doi(&snippet));

            ScholarResult {
                title,
                authors,
                year,
                snippet,
                link,
                citations,
                doi,
                publication,
            }
        })
        .collect()
}

/// Parse SerpAPI Google Light `organic_results`
pub fn parse_light_results(organic: &[Value], max: usize) -> Vec<LightResult> {
    organic
        .iter()
        .take(max)
        .map(|result| {
            let title = str_field(result, "title").unwrap_or_else(|| "Untitled".to_string());
            let snippet = str_field(result, "snippet").unwrap_or_default();
            let link = str_field(result, "link").unwrap_or_default();
            let source = str_field(result, "source")
                .or_else(|| link.split('/').nth(2).filter(|d| !d.is_empty()).map(String::from));
            let date = str_field(result, "date");

            LightResult {
                title,
                snippet,
                link,
                source,
                date,
            }
        })
        .collect()
}

/// Extract DOI from a string (URL or text)
fn extract_doi(text: &str) -> Option<String> {
    // DOI pattern: 10.xxxx/xxxxx
    let doi_patterns = ["doi.org/", "doi:", "DOI:", "DOI "];

    for pattern in doi_patterns {
        if let Some(pos) = text.find(pattern) {
            let doi_part: String = text[pos + pattern.len()..]
                .trim_start()
                .chars()
                .take_while(|c| !c.is_whitespace() && *c != '"' && *c != '>' && *c != '<')
                .collect();
            if doi_part.starts_with("10.") {
                return Some(doi_part);
            }
        }
    }

    if let Some(pos) = text.find("10.") {
        let doi_part: String = text[pos..]
            .chars()
            .take_while(|c| c.is_alphanumeric() || matches!(c, '.' | '/' | '-' | '_'))
            .collect();
        if doi_part.len() > 7 && doi_part.contains('/') {
            return Some(doi_part);
        }
    }

    None
}

/// Check if a URL is from a reliable medical or scientific source
pub fn is_reliable_source(url: &str) -> bool {
    let reliable_domains = [
        // Literature
        "pubmed.ncbi.nlm.nih.gov",
        "ncbi.nlm.nih.gov",
        "nature.com",
        "science.org",
        "sciencedirect.com",
        "springer.com",
        "wiley.com",
        "cell.com",
        "plos.org",
        "frontiersin.org",
        "biomedcentral.com",
        "medrxiv.org",
        "biorxiv.org",
        "bmj.com",
        "thelancet.com",
        "nejm.org",
        "jamanetwork.com",
        "cochranelibrary.com",
        // Clinical references
        "mayoclinic.org",
        "clevelandclinic.org",
        "medlineplus.gov",
        "nhs.uk",
        "who.int",
        // Academic and government
        ".edu",
        ".ac.uk",
        ".gov",
        "wikipedia.org",
    ];

    let url_lower = url.to_lowercase();
    reliable_domains.iter().any(|domain| url_lower.contains(domain))
}
