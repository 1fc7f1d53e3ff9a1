use anyhow::Result;
use serde::Deserialize;
use std::env;

pub const DEFAULT_ROUTER_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_PRIMARY_MODEL: &str = "llama-3.1-70b-versatile";
pub const DEFAULT_FALLBACK_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_PUBMED_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/chat_history.db?mode=rwc";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: LLMConfig,
    pub search: SearchConfig,
    pub pubmed: PubMedConfig,
    pub rag: RagConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub provider: String,
    pub groq_api_key: String,
    pub openai_api_key: String,
    /// Overrides the provider's default endpoint (OpenAI-compatible proxies, tests).
    pub api_base: Option<String>,
    pub router_model: String,
    pub primary_model: String,
    pub fallback_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl LLMConfig {
    /// API key for the configured provider, if one is set
    pub fn active_api_key(&self) -> Option<String> {
        let key = match self.provider.as_str() {
            "openai" => &self.openai_api_key,
            _ => &self.groq_api_key,
        };
        if key.trim().is_empty() {
            None
        } else {
            Some(key.clone())
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub serpapi_key: String,
    pub scholar_enabled: bool,
    pub light_enabled: bool,
    pub max_results: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PubMedConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub retmax: u32,
    pub timeout_secs: u64,
    pub abstract_max_chars: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RagConfig {
    pub dataset_path: String,
    pub index_path: String,
    pub top_k: usize,
    pub embedding_provider: String,
    pub embedding_url: String,
    pub embedding_model: String,
    pub embedding_batch_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub log_dir: Option<String>,
    pub filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: 8000,
                host: "0.0.0.0".to_string(),
                cors_allowed_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ],
            },
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: 5,
            },
            llm: LLMConfig {
                provider: "groq".to_string(),
                groq_api_key: String::new(),
                openai_api_key: String::new(),
                api_base: None,
                router_model: DEFAULT_ROUTER_MODEL.to_string(),
                primary_model: DEFAULT_PRIMARY_MODEL.to_string(),
                fallback_model: DEFAULT_FALLBACK_MODEL.to_string(),
                temperature: 0.3,
                max_tokens: 2048,
            },
            search: SearchConfig {
                serpapi_key: String::new(),
                scholar_enabled: true,
                light_enabled: true,
                max_results: 5,
            },
            pubmed: PubMedConfig {
                api_key: None,
                base_url: DEFAULT_PUBMED_BASE.to_string(),
                retmax: 5,
                timeout_secs: 10,
                abstract_max_chars: 400,
            },
            rag: RagConfig {
                dataset_path: "data/disease_symptoms.csv".to_string(),
                index_path: "data/medical_index.json".to_string(),
                top_k: 3,
                embedding_provider: "tei".to_string(),
                embedding_url: "http://localhost:8081".to_string(),
                embedding_model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
                embedding_batch_size: 32,
            },
            logging: LoggingConfig {
                log_dir: None,
                filter: "medbot=debug,tower_http=debug".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Ok(Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .unwrap_or_else(|_| defaults.server.port.to_string())
                    .parse()?,
                host: env::var("HOST").unwrap_or(defaults.server.host),
                cors_allowed_origins: match env::var("ALLOWED_ORIGINS") {
                    Ok(origins) => origins
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect(),
                    Err(_) => defaults.server.cors_allowed_origins,
                },
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or(defaults.database.url),
                max_connections: env::var("DB_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| defaults.database.max_connections.to_string())
                    .parse()?,
            },
            llm: LLMConfig {
                provider: env::var("LLM_PROVIDER")
                    .map(|p| p.trim().to_ascii_lowercase())
                    .unwrap_or(defaults.llm.provider),
                groq_api_key: env::var("GROQ_API_KEY").unwrap_or_default(),
                openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
                api_base: env::var("LLM_API_BASE").ok().filter(|s| !s.trim().is_empty()),
                router_model: env::var("ROUTER_LLM_MODEL").unwrap_or(defaults.llm.router_model),
                primary_model: env::var("SYNTH_LLM_MODEL").unwrap_or(defaults.llm.primary_model),
                fallback_model: env::var("SYNTH_FALLBACK_MODEL")
                    .unwrap_or(defaults.llm.fallback_model),
                temperature: env::var("SYNTH_TEMPERATURE")
                    .unwrap_or_else(|_| defaults.llm.temperature.to_string())
                    .parse()?,
                max_tokens: env::var("SYNTH_MAX_TOKENS")
                    .unwrap_or_else(|_| defaults.llm.max_tokens.to_string())
                    .parse()?,
            },
            search: SearchConfig {
                serpapi_key: env::var("SERPAPI_API_KEY").unwrap_or_default(),
                scholar_enabled: env::var("SCHOLAR_ENABLED")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()?,
                light_enabled: env::var("LIGHT_ENABLED")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()?,
                max_results: env::var("SEARCH_MAX_RESULTS")
                    .unwrap_or_else(|_| defaults.search.max_results.to_string())
                    .parse()?,
            },
            pubmed: PubMedConfig {
                api_key: env::var("PUBMED_API_KEY").ok().filter(|s| !s.trim().is_empty()),
                base_url: env::var("PUBMED_BASE_URL").unwrap_or(defaults.pubmed.base_url),
                retmax: env::var("PUBMED_RETMAX")
                    .unwrap_or_else(|_| defaults.pubmed.retmax.to_string())
                    .parse()?,
                timeout_secs: env::var("PUBMED_TIMEOUT_SECS")
                    .unwrap_or_else(|_| defaults.pubmed.timeout_secs.to_string())
                    .parse()?,
                abstract_max_chars: defaults.pubmed.abstract_max_chars,
            },
            rag: RagConfig {
                dataset_path: env::var("RAG_DATASET_PATH").unwrap_or(defaults.rag.dataset_path),
                index_path: env::var("RAG_INDEX_PATH").unwrap_or(defaults.rag.index_path),
                top_k: env::var("RAG_TOP_K")
                    .unwrap_or_else(|_| defaults.rag.top_k.to_string())
                    .parse()?,
                embedding_provider: env::var("EMBEDDING_PROVIDER")
                    .unwrap_or(defaults.rag.embedding_provider),
                embedding_url: env::var("EMBEDDING_URL").unwrap_or(defaults.rag.embedding_url),
                embedding_model: env::var("EMBEDDING_MODEL")
                    .unwrap_or(defaults.rag.embedding_model),
                embedding_batch_size: env::var("EMBEDDING_BATCH_SIZE")
                    .unwrap_or_else(|_| defaults.rag.embedding_batch_size.to_string())
                    .parse()?,
            },
            logging: LoggingConfig {
                log_dir: env::var("LOG_DIR").ok().filter(|s| !s.trim().is_empty()),
                filter: defaults.logging.filter,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_synthesizer_setup() {
        let config = Config::default();
        assert_eq!(config.llm.primary_model, "llama-3.1-70b-versatile");
        assert_eq!(config.llm.fallback_model, "llama-3.1-8b-instant");
        assert!((config.llm.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.pubmed.retmax, 5);
        assert_eq!(config.pubmed.timeout_secs, 10);
        assert_eq!(config.rag.top_k, 3);
    }

    #[test]
    fn test_active_api_key() {
        let mut llm = Config::default().llm;
        assert_eq!(llm.active_api_key(), None);

        llm.groq_api_key = "gsk-test".to_string();
        assert_eq!(llm.active_api_key(), Some("gsk-test".to_string()));

        llm.provider = "openai".to_string();
        assert_eq!(llm.active_api_key(), None);
        llm.openai_api_key = "   ".to_string();
        assert_eq!(llm.active_api_key(), None);
    }
}
