//! Runtime configuration.
//!
//! Built once at startup from environment variables (after `.env` is loaded)
//! and passed down explicitly. No other module reads the process environment.

use serde::Deserialize;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::application::{
    AssistantSettings, ChainSettings, GreetingPolicy, RetrieverConfig, SearchStrategy,
};
use crate::domain::{DomainError, Result, SourceType};

const DEFAULT_PROMPTS: &str = include_str!("../../config/prompts.yaml");

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub config: Config,
    pub prompts: PromptsConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let config = Config::from_lookup(|key| std::env::var(key).ok())?;
        let prompts = PromptsConfig::load(config.prompts_path.as_deref())?;
        Ok(Self { config, prompts })
    }

    pub fn retriever_config(&self) -> RetrieverConfig {
        let rag = &self.config.rag;
        RetrieverConfig {
            top_k: rag.top_k,
            fetch_k: rag.fetch_k,
            min_score: rag.min_score,
            strategy: rag.strategy,
        }
    }

    pub fn chain_settings(&self) -> ChainSettings {
        let chain = &self.prompts.chain;
        let greeting = self.config.rag.greeting_shortcut.then(|| GreetingPolicy {
            triggers: self.prompts.greeting.triggers.clone(),
            reply: self.prompts.greeting.reply.clone(),
        });

        ChainSettings {
            system_prompt: chain.system.trim().to_string(),
            answer_template: chain.answer.clone(),
            condense_template: chain.condense.clone(),
            no_context: chain.no_context.clone(),
            no_history: chain.no_history.clone(),
            greeting,
            condense_question: self.config.rag.condense_question,
            timeout: Duration::from_secs(self.config.llm.timeout_seconds),
        }
    }

    pub fn assistant_settings(&self) -> AssistantSettings {
        AssistantSettings {
            source_folder: self.config.documents.folder.clone(),
            source_type: self.config.documents.source_type,
            db_name: self.config.index.db_name.clone(),
            rebuild_index: self.config.index.rebuild,
            chunk_size: self.config.chunking.size,
            chunk_overlap: self.config.chunking.overlap,
            retriever: self.retriever_config(),
            chain: self.chain_settings(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: AppMode,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub documents: DocumentsConfig,
    pub chunking: ChunkingConfig,
    pub rag: RagConfig,
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub auth: AuthConfig,
    pub log_format: LogFormat,
    pub prompts_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub dimension: usize,
    pub batch_size: usize,
}

#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub db_name: String,
    pub dir: PathBuf,
    pub backend: VectorBackend,
    pub qdrant_url: String,
    pub rebuild: bool,
}

#[derive(Debug, Clone)]
pub struct DocumentsConfig {
    pub source_type: SourceType,
    pub folder: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub size: usize,
    pub overlap: usize,
}

#[derive(Debug, Clone)]
pub struct RagConfig {
    pub top_k: usize,
    pub fetch_k: usize,
    pub min_score: f32,
    pub strategy: SearchStrategy,
    pub greeting_shortcut: bool,
    pub condense_question: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub api_key: Option<String>,
}

impl Config {
    /// Resolves every setting through `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let source_type = match vars.get("DOC_SOURCE") {
            Some(raw) => raw.parse::<SourceType>()?,
            None => SourceType::Pdf,
        };
        let folder = vars
            .get("DOC_FOLDER")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(source_type.default_folder()));

        let strategy_name = vars
            .string("RETRIEVER_STRATEGY", "similarity")
            .to_ascii_lowercase();
        let strategy = match strategy_name.as_str() {
            "similarity" => SearchStrategy::Similarity,
            "mmr" => SearchStrategy::Mmr {
                lambda: vars.parse("RETRIEVER_MMR_LAMBDA", 0.5)?,
            },
            other => {
                return Err(DomainError::validation(format!(
                    "RETRIEVER_STRATEGY: unknown strategy '{other}'"
                )))
            }
        };

        let config = Self {
            mode: vars.parse("APP_MODE", AppMode::Api)?,
            llm: LlmConfig {
                provider: vars.parse("LLM_PROVIDER", LlmProvider::Ollama)?,
                model: vars.string("MODEL", "llama3.2"),
                timeout_seconds: vars.parse("LLM_TIMEOUT_SECONDS", 120)?,
            },
            embedding: EmbeddingConfig {
                provider: vars.parse("EMBEDDING_PROVIDER", EmbeddingProvider::Ollama)?,
                model: vars.string("EMBEDDING_MODEL", "nomic-embed-text"),
                dimension: vars.parse("EMBEDDING_DIMENSION", 768)?,
                batch_size: vars.parse("EMBEDDING_BATCH_SIZE", 64)?,
            },
            index: IndexConfig {
                db_name: vars.string("DB_NAME", "vector_db"),
                dir: PathBuf::from(vars.string("INDEX_DIR", ".")),
                backend: vars.parse("VECTOR_STORE", VectorBackend::Local)?,
                qdrant_url: vars.string("QDRANT_URL", "http://localhost:6334"),
                rebuild: vars.flag("REBUILD_INDEX", false)?,
            },
            documents: DocumentsConfig {
                source_type,
                folder,
            },
            chunking: ChunkingConfig {
                size: vars.parse("CHUNK_SIZE", 1000)?,
                overlap: vars.parse("CHUNK_OVERLAP", 200)?,
            },
            rag: RagConfig {
                top_k: vars.parse("RETRIEVER_TOP_K", 20)?,
                fetch_k: vars.parse("RETRIEVER_FETCH_K", 40)?,
                min_score: vars.parse("RETRIEVER_MIN_SCORE", 0.2)?,
                strategy,
                greeting_shortcut: vars.flag("GREETING_SHORTCUT", false)?,
                condense_question: vars.flag("CONDENSE_QUESTION", true)?,
            },
            server: ServerConfig {
                host: vars.string("SERVER_HOST", "0.0.0.0"),
                port: vars.parse("SERVER_PORT", 8000)?,
            },
            cors: CorsConfig {
                allowed_origins: vars
                    .string("CORS_ALLOWED_ORIGINS", "*")
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from)
                    .collect(),
            },
            auth: AuthConfig {
                api_key: vars.get("API_KEY"),
            },
            log_format: vars.parse("LOG_FORMAT", LogFormat::Pretty)?,
            prompts_path: vars.get("PROMPTS_PATH").map(PathBuf::from),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.chunking.size == 0 || self.chunking.overlap >= self.chunking.size {
            return Err(DomainError::validation(
                "CHUNK_OVERLAP must be smaller than a non-zero CHUNK_SIZE",
            ));
        }
        if self.rag.top_k == 0 {
            return Err(DomainError::validation("RETRIEVER_TOP_K must be at least 1"));
        }
        if let SearchStrategy::Mmr { lambda } = self.rag.strategy {
            if !(0.0..=1.0).contains(&lambda) {
                return Err(DomainError::validation(format!(
                    "RETRIEVER_MMR_LAMBDA must be between 0 and 1, got {lambda}"
                )));
            }
        }
        if self.embedding.batch_size == 0 {
            return Err(DomainError::validation("EMBEDDING_BATCH_SIZE must be at least 1"));
        }
        if self.index.db_name.contains(['/', '\\']) {
            return Err(DomainError::validation("DB_NAME must not contain path separators"));
        }
        Ok(())
    }
}

struct Vars<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Vars<'_> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(key) {
            Some(raw) => raw
                .parse::<T>()
                .map_err(|e| DomainError::validation(format!("{key}: {e}"))),
            None => Ok(default),
        }
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key).map(|v| v.to_ascii_lowercase()) {
            None => Ok(default),
            Some(v) => match v.as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(DomainError::validation(format!("{key}: expected a boolean, got '{v}'"))),
            },
        }
    }
}

macro_rules! str_enum {
    ($name:ident { $($variant:ident => [$($text:literal),+]),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant),+
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.to_ascii_lowercase().as_str() {
                    $($($text)|+ => Ok(Self::$variant),)+
                    other => Err(format!("unknown value '{other}'")),
                }
            }
        }
    };
}

str_enum!(AppMode { Api => ["api"], Chat => ["chat", "cli"] });
str_enum!(LlmProvider {
    OpenAi => ["openai"],
    Anthropic => ["anthropic"],
    Gemini => ["gemini"],
    Ollama => ["ollama"],
});
str_enum!(EmbeddingProvider {
    OpenAi => ["openai"],
    Gemini => ["gemini"],
    Ollama => ["ollama"],
    Hashing => ["hashing"],
});
str_enum!(VectorBackend { Local => ["local"], Qdrant => ["qdrant"] });
str_enum!(LogFormat { Pretty => ["pretty", "text"], Json => ["json"] });

#[derive(Debug, Clone, Deserialize)]
pub struct PromptsConfig {
    pub chain: ChainPromptsConfig,
    pub greeting: GreetingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainPromptsConfig {
    pub system: String,
    pub answer: String,
    pub condense: String,
    pub no_context: String,
    pub no_history: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GreetingConfig {
    pub triggers: Vec<String>,
    pub reply: String,
}

impl PromptsConfig {
    /// The templates shipped in `config/prompts.yaml`.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(DEFAULT_PROMPTS)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let prompts: Self = serde_yaml::from_str(yaml)
            .map_err(|e| DomainError::validation(format!("invalid prompts file: {e}")))?;

        for placeholder in ["{context}", "{history}", "{question}"] {
            if !prompts.chain.answer.contains(placeholder) {
                return Err(DomainError::validation(format!(
                    "answer template is missing {placeholder}"
                )));
            }
        }
        Ok(prompts)
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let yaml = std::fs::read_to_string(path).map_err(|e| {
                    DomainError::not_found(format!("prompts file {}: {e}", path.display()))
                })?;
                Self::from_yaml(&yaml)
            }
            None => Self::builtin(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.mode, AppMode::Api);
        assert_eq!(config.llm.model, "llama3.2");
        assert_eq!(config.index.db_name, "vector_db");
        assert_eq!(config.documents.source_type, SourceType::Pdf);
        assert_eq!(config.documents.folder, PathBuf::from("data/confluence/pdfs"));
        assert_eq!(config.chunking.size, 1000);
        assert_eq!(config.chunking.overlap, 200);
        assert!(!config.rag.greeting_shortcut);
        assert_eq!(config.rag.strategy, SearchStrategy::Similarity);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.cors.allowed_origins, vec!["*".to_string()]);
        assert!(config.auth.api_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("APP_MODE", "chat"),
            ("MODEL", "gpt-4o-mini"),
            ("LLM_PROVIDER", "OpenAI"),
            ("EMBEDDING_MODEL", "text-embedding-3-small"),
            ("DB_NAME", "wiki_index"),
            ("DOC_SOURCE", "md"),
            ("GREETING_SHORTCUT", "yes"),
            ("RETRIEVER_STRATEGY", "mmr"),
            ("RETRIEVER_MMR_LAMBDA", "0.7"),
            ("CORS_ALLOWED_ORIGINS", "https://a.example, https://b.example"),
            ("API_KEY", "secret"),
        ])
        .unwrap();

        assert_eq!(config.mode, AppMode::Chat);
        assert_eq!(config.llm.provider, LlmProvider::OpenAi);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.index.db_name, "wiki_index");
        assert_eq!(config.documents.source_type, SourceType::Markdown);
        assert_eq!(config.documents.folder, PathBuf::from("data/confluence/markdown"));
        assert!(config.rag.greeting_shortcut);
        assert_eq!(config.rag.strategy, SearchStrategy::Mmr { lambda: 0.7 });
        assert_eq!(config.cors.allowed_origins.len(), 2);
        assert_eq!(config.auth.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = config_from(&[("MODEL", "  "), ("DOC_FOLDER", "")]).unwrap();
        assert_eq!(config.llm.model, "llama3.2");
        assert_eq!(config.documents.folder, PathBuf::from("data/confluence/pdfs"));
    }

    #[test]
    fn test_unsupported_source_type_rejected_at_parse_time() {
        let err = config_from(&[("DOC_SOURCE", "docx")]).unwrap_err();
        assert!(matches!(err, DomainError::UnsupportedSourceType(_)));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config_from(&[("CHUNK_SIZE", "abc")]),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            config_from(&[("CHUNK_SIZE", "100"), ("CHUNK_OVERLAP", "100")]),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            config_from(&[("REBUILD_INDEX", "maybe")]),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            config_from(&[("APP_MODE", "gui")]),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            config_from(&[("DB_NAME", "../escape")]),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_mmr_lambda_out_of_range() {
        for lambda in ["-0.1", "1.5", "NaN"] {
            let err = config_from(&[("RETRIEVER_STRATEGY", "mmr"), ("RETRIEVER_MMR_LAMBDA", lambda)])
                .unwrap_err();
            assert!(err.to_string().contains("RETRIEVER_MMR_LAMBDA"), "{lambda}: {err}");
        }

        let config =
            config_from(&[("RETRIEVER_STRATEGY", "mmr"), ("RETRIEVER_MMR_LAMBDA", "1")]).unwrap();
        assert_eq!(config.rag.strategy, SearchStrategy::Mmr { lambda: 1.0 });
    }

    #[test]
    fn test_builtin_prompts() {
        let prompts = PromptsConfig::builtin().unwrap();
        assert!(prompts.chain.answer.contains("{context}"));
        assert!(prompts.chain.condense.contains("{history}"));
        assert_eq!(prompts.greeting.triggers, vec!["hi", "hello"]);
    }

    #[test]
    fn test_prompts_missing_placeholder() {
        let yaml = r#"
chain:
  system: "s"
  answer: "only {question}"
  condense: "c"
  no_context: "n"
  no_history: "h"
greeting:
  triggers: []
  reply: "r"
"#;
        assert!(matches!(
            PromptsConfig::from_yaml(yaml),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_greeting_policy_follows_flag() {
        let prompts = PromptsConfig::builtin().unwrap();
        let off = AppConfig {
            config: config_from(&[]).unwrap(),
            prompts: prompts.clone(),
        };
        assert!(off.chain_settings().greeting.is_none());

        let on = AppConfig {
            config: config_from(&[("GREETING_SHORTCUT", "true")]).unwrap(),
            prompts,
        };
        let greeting = on.chain_settings().greeting.unwrap();
        assert_eq!(greeting.reply, "Hi, I am Workspace Assistant. How can I help you?");
    }
}
