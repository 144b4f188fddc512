//! Test doubles shared by the unit tests.

use async_trait::async_trait;
use futures::stream;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, Stream};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::application::ChainSettings;
use crate::domain::ports::{EmbeddingService, LlmService, TextStream};
use crate::domain::{Document, DocumentMetadata, DomainError, Embedding, SourceType};
use crate::infrastructure::{AppConfig, Config, PromptsConfig};

#[derive(Debug, Clone)]
pub struct LlmCall {
    pub system: String,
    pub prompt: String,
}

type Responder = dyn Fn(&str) -> Result<String, DomainError> + Send + Sync;

/// Answers from a closure over the prompt and records every call.
pub struct ScriptedLlm {
    responder: Box<Responder>,
    calls: Mutex<Vec<LlmCall>>,
}

impl ScriptedLlm {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&str) -> Result<String, DomainError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Replies `answer #n` for the n-th call.
    pub fn counting() -> Arc<Self> {
        let counter = std::sync::atomic::AtomicUsize::new(0);
        Self::new(move |_| {
            let n = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            Ok(format!("answer #{n}"))
        })
    }

    pub fn failing() -> Arc<Self> {
        Self::new(|_| Err(DomainError::upstream("model service unreachable")))
    }

    pub fn calls(&self) -> Vec<LlmCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.calls.lock().unwrap().last().map(|c| c.prompt.clone())
    }

    fn respond(&self, system: &str, prompt: &str) -> Result<String, DomainError> {
        self.calls.lock().unwrap().push(LlmCall {
            system: system.to_string(),
            prompt: prompt.to_string(),
        });
        (self.responder)(prompt)
    }
}

#[async_trait]
impl LlmService for ScriptedLlm {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, DomainError> {
        self.respond(system, prompt)
    }

    /// Streams the answer word by word.
    async fn complete_stream(&self, system: &str, prompt: &str) -> Result<TextStream, DomainError> {
        let answer = self.respond(system, prompt)?;
        let fragments: Vec<Result<String, DomainError>> = answer
            .split_inclusive(' ')
            .map(|word| Ok(word.to_string()))
            .collect();
        Ok(Box::pin(stream::iter(fragments)))
    }
}

/// One dimension per vocabulary word, valued by its count in the text.
pub struct KeywordEmbedding {
    vocabulary: Vec<String>,
    model: String,
}

impl KeywordEmbedding {
    pub fn new(words: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            vocabulary: words.iter().map(|w| w.to_lowercase()).collect(),
            model: "keyword-test".to_string(),
        })
    }

    fn vector(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f32; self.vocabulary.len()];
        for token in text.split(|c: char| !c.is_alphanumeric()) {
            let token = token.to_lowercase();
            if let Some(i) = self.vocabulary.iter().position(|w| *w == token) {
                vector[i] += 1.0;
            }
        }
        Embedding::new(vector)
    }
}

#[async_trait]
impl EmbeddingService for KeywordEmbedding {
    async fn embed(&self, text: &str) -> Result<Embedding, DomainError> {
        Ok(self.vector(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.vocabulary.len()
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Built-in prompts with default settings and question condensing off.
pub fn chain_settings() -> ChainSettings {
    let config = AppConfig {
        config: Config::from_lookup(|_| None).unwrap(),
        prompts: PromptsConfig::builtin().unwrap(),
    };
    let mut settings = config.chain_settings();
    settings.condense_question = false;
    settings
}

/// Writes `docs/hr.md` under `dir` and returns a config over it with offline
/// hashing embeddings. `extra` overrides or adds environment variables.
pub fn markdown_workspace(dir: &Path, extra: &[(&str, &str)]) -> AppConfig {
    let docs = dir.join("docs");
    std::fs::create_dir_all(&docs).unwrap();
    std::fs::write(docs.join("hr.md"), "# HR\n\nVacation policy: 25 days per year.").unwrap();

    let mut vars: HashMap<String, String> = HashMap::from([
        ("DOC_SOURCE".to_string(), "md".to_string()),
        ("DOC_FOLDER".to_string(), docs.display().to_string()),
        ("INDEX_DIR".to_string(), dir.join("indexes").display().to_string()),
        ("EMBEDDING_PROVIDER".to_string(), "hashing".to_string()),
        ("EMBEDDING_DIMENSION".to_string(), "64".to_string()),
        ("CONDENSE_QUESTION".to_string(), "false".to_string()),
    ]);
    for (key, value) in extra {
        vars.insert(key.to_string(), value.to_string());
    }

    AppConfig {
        config: Config::from_lookup(|key| vars.get(key).cloned()).unwrap(),
        prompts: PromptsConfig::builtin().unwrap(),
    }
}

pub fn markdown_doc(source: &str, content: &str) -> Document {
    Document::new(content, DocumentMetadata::new(source, SourceType::Markdown))
}

/// Writes a minimal PDF with one text line per page.
pub fn write_pdf(path: &Path, pages: &[&str]) {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => pages.len() as i64,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}
