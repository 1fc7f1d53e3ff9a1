//! PubMed Client
//!
//! Searches PubMed through the NCBI E-utilities in two sequential calls:
//!
//! 1. `esearch.fcgi` (JSON) resolves the query to a list of PMIDs
//! 2. `efetch.fcgi` (XML) returns the article records for those PMIDs
//!
//! NCBI allows 3 requests per second without an API key and 10 with one;
//! the client paces itself accordingly.

use crate::config::PubMedConfig;
use crate::types::{AppError, AppResult};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use quick_xml::events::{BytesText, Event};
use quick_xml::Reader;
use reqwest::Client;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, info};

const REQUESTS_PER_SECOND: u32 = 3;
const REQUESTS_PER_SECOND_WITH_KEY: u32 = 10;

/// One parsed `PubmedArticle`
#[derive(Debug, Clone, PartialEq)]
pub struct PubMedArticle {
    pub pmid: String,
    pub title: String,
    pub abstract_text: String,
    pub journal: String,
    pub year: String,
}

impl PubMedArticle {
    pub fn link(&self) -> String {
        if self.pmid.is_empty() {
            String::new()
        } else {
            format!("https://pubmed.ncbi.nlm.nih.gov/{}/", self.pmid)
        }
    }

    /// Render as a single tool result, truncating the abstract to `max_chars`
    pub fn to_result_text(&self, max_chars: usize) -> String {
        format!(
            "**{}**\nSource: PubMed ({}, {})\nLink: {}\n\nAbstract: {}\n",
            self.title,
            self.journal,
            self.year,
            self.link(),
            truncate_chars(&self.abstract_text, max_chars)
        )
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

#[derive(Deserialize)]
struct ESearchResponse {
    #[serde(default)]
    esearchresult: ESearchResult,
}

#[derive(Deserialize, Default)]
struct ESearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

/// NCBI E-utilities quota for the given key
pub fn requests_per_second(api_key: Option<&str>) -> u32 {
    match api_key {
        Some(key) if !key.trim().is_empty() => REQUESTS_PER_SECOND_WITH_KEY,
        _ => REQUESTS_PER_SECOND,
    }
}

pub struct PubMedClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    retmax: u32,
    limiter: DefaultDirectRateLimiter,
}

impl PubMedClient {
    pub fn new(config: &PubMedConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        let per_second = requests_per_second(config.api_key.as_deref());
        let quota = Quota::per_second(NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN));

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            retmax: config.retmax,
            limiter: RateLimiter::direct(quota),
        }
    }

    /// Wait for a free slot in the NCBI quota
    async fn pace(&self) {
        self.limiter.until_ready().await;
    }

    fn with_api_key(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    /// Step 1: PMIDs matching the query
    pub async fn search_ids(&self, query: &str) -> AppResult<Vec<String>> {
        let url = format!("{}/esearch.fcgi", self.base_url);
        let params = self.with_api_key(vec![
            ("db", "pubmed".to_string()),
            ("term", query.to_string()),
            ("retmax", self.retmax.to_string()),
            ("retmode", "json".to_string()),
        ]);

        self.pace().await;
        let response: ESearchResponse = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(count = response.esearchresult.idlist.len(), "PubMed esearch completed");
        Ok(response.esearchresult.idlist)
    }

    /// Step 2: article records for the given PMIDs
    pub async fn fetch_articles(&self, ids: &[String]) -> AppResult<Vec<PubMedArticle>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/efetch.fcgi", self.base_url);
        let params = self.with_api_key(vec![
            ("db", "pubmed".to_string()),
            ("id", ids.join(",")),
            ("retmode", "xml".to_string()),
        ]);

        self.pace().await;
        let body = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_efetch_xml(&body)
    }

    /// Search and fetch in one go; an empty list means no papers matched
    pub async fn search(&self, query: &str) -> AppResult<Vec<PubMedArticle>> {
        info!(query = %query, "Searching PubMed");
        let ids = self.search_ids(query).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let articles = self.fetch_articles(&ids).await?;
        info!(count = articles.len(), "PubMed search completed");
        Ok(articles)
    }
}

/// Element being captured while walking an article
#[derive(Clone, Copy, PartialEq)]
enum Capture {
    Title,
    Abstract,
    Journal,
    Year,
    Pmid,
}

#[derive(Default)]
struct ArticleBuilder {
    pmid: Option<String>,
    title: Option<String>,
    abstract_parts: Vec<String>,
    journal: Option<String>,
    year: Option<String>,
}

impl ArticleBuilder {
    fn finish(self) -> PubMedArticle {
        let abstract_text = self
            .abstract_parts
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        PubMedArticle {
            pmid: self.pmid.unwrap_or_default(),
            title: self.title.unwrap_or_else(|| "No Title".to_string()),
            abstract_text: if abstract_text.is_empty() {
                "No abstract available.".to_string()
            } else {
                abstract_text
            },
            journal: self.journal.unwrap_or_else(|| "Unknown Journal".to_string()),
            year: self.year.unwrap_or_else(|| "Unknown Year".to_string()),
        }
    }
}

fn text_of(e: &BytesText<'_>) -> String {
    e.unescape()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| String::from_utf8_lossy(e).into_owned())
}

/// Parse an efetch `PubmedArticleSet` document.
///
/// Per article: the first `ArticleTitle`, every `AbstractText` (inline markup
/// included), `Journal/Title`, `PubDate/Year` and the first `PMID`. Only the
/// first occurrence of each single-valued field is kept.
pub fn parse_efetch_xml(xml: &str) -> AppResult<Vec<PubMedArticle>> {
    let mut reader = Reader::from_str(xml);
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut articles = Vec::new();
    let mut current: Option<ArticleBuilder> = None;
    // (what, depth of the captured element, accumulated text)
    let mut capture: Option<(Capture, usize, String)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name().as_ref().to_vec();
                let parent = path.last().cloned();
                path.push(name);
                let depth = path.len();

                if path.last().map(Vec::as_slice) == Some(b"PubmedArticle".as_slice()) {
                    current = Some(ArticleBuilder::default());
                    continue;
                }
                let (Some(article), None) = (current.as_ref(), capture.as_ref()) else {
                    continue;
                };

                let what = match (e.name().as_ref(), parent.as_deref()) {
                    (b"ArticleTitle", _) if article.title.is_none() => Some(Capture::Title),
                    (b"AbstractText", _) => Some(Capture::Abstract),
                    (b"Title", Some(b"Journal")) if article.journal.is_none() => Some(Capture::Journal),
                    (b"Year", Some(b"PubDate")) if article.year.is_none() => Some(Capture::Year),
                    (b"PMID", _) if article.pmid.is_none() => Some(Capture::Pmid),
                    _ => None,
                };
                if let Some(what) = what {
                    capture = Some((what, depth, String::new()));
                }
            }
            Ok(Event::End(_)) => {
                let depth = path.len();
                let closed = path.pop();

                if matches!(&capture, Some((_, d, _)) if *d == depth) {
                    if let (Some((what, _, text)), Some(article)) = (capture.take(), current.as_mut()) {
                        match what {
                            Capture::Title => article.title = Some(text),
                            Capture::Abstract => article.abstract_parts.push(text),
                            Capture::Journal => article.journal = Some(text),
                            Capture::Year => article.year = Some(text),
                            Capture::Pmid => article.pmid = Some(text),
                        }
                    }
                }

                if closed.as_deref() == Some(b"PubmedArticle".as_slice()) {
                    if let Some(article) = current.take() {
                        articles.push(article.finish());
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if let Some((_, _, text)) = capture.as_mut() {
                    text.push_str(&text_of(&e));
                }
            }
            Ok(Event::CData(e)) => {
                if let Some((_, _, text)) = capture.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(AppError::PubMed(format!(
                    "Invalid efetch XML at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
    }

    Ok(articles)
}
