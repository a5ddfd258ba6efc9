//! Deterministic providers and fixtures shared by the integration tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use docqa_rag::config::{ModelConfig, RagConfig};
use docqa_rag::error::{Error, Result};
use docqa_rag::providers::{CompletionProvider, EmbeddingProvider};
use docqa_rag::retrieval::SnapshotStore;
use docqa_rag::{RagSession, SourceDocument};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, Stream};
use parking_lot::Mutex;

pub const FAKE_MODEL: &str = "fake-embed";
pub const FAKE_DIMENSIONS: usize = 256;

/// Bag-of-words embedder: each lowercase word bumps one hashed bucket
#[derive(Default)]
pub struct HashingEmbedder {
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl HashingEmbedder {
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// FNV-1a, stable across runs and platforms
fn bucket(word: &str) -> usize {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in word.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    // Bucket 0 is reserved for the bias term
    1 + (hash % (FAKE_DIMENSIONS as u64 - 1)) as usize
}

pub fn embed_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; FAKE_DIMENSIONS];
    vector[0] = 0.1;
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        vector[bucket(&word.to_lowercase())] += 1.0;
    }
    vector
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::embedding("quota exceeded"));
        }
        Ok(embed_words(text))
    }

    fn dimensions(&self) -> usize {
        FAKE_DIMENSIONS
    }

    fn model(&self) -> &str {
        FAKE_MODEL
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

/// Completion fake that records prompts and answers with a fixed reply
#[derive(Default)]
pub struct ScriptedLlm {
    fail: AtomicBool,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().last().cloned()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedLlm {
    async fn complete(&self, prompt: &str, model: &ModelConfig) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::synthesis("HTTP 503 from completion endpoint"));
        }
        Ok(format!("Answer from {} [1]", model.model_name))
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::synthesis("HTTP 401 from models endpoint"));
        }
        Ok(vec!["gpt-4o".to_string(), "gpt-4o-mini".to_string()])
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.fail.load(Ordering::SeqCst))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Session parts wired to one snapshot directory
pub struct Harness {
    pub config: RagConfig,
    pub embedder: Arc<HashingEmbedder>,
    pub llm: Arc<ScriptedLlm>,
}

impl Harness {
    pub fn new(index_dir: &Path) -> Self {
        let mut config = RagConfig::default();
        config.index.storage_path = index_dir.to_path_buf();
        config.embeddings.model = FAKE_MODEL.to_string();
        config.embeddings.dimensions = FAKE_DIMENSIONS;
        config.embeddings.batch_size = 4;
        config.processing.parallel_documents = 2;

        Self {
            config,
            embedder: Arc::new(HashingEmbedder::default()),
            llm: Arc::new(ScriptedLlm::default()),
        }
    }

    pub fn store(&self) -> SnapshotStore {
        SnapshotStore::new(self.config.index.storage_path.clone())
    }

    pub fn session(&self) -> RagSession {
        RagSession::new(
            &self.config,
            self.embedder.clone(),
            self.llm.clone(),
            self.store(),
        )
        .expect("valid session config")
    }
}

pub fn text_doc(name: &str, text: &str) -> SourceDocument {
    SourceDocument::new(name, text.as_bytes().to_vec())
}

/// Build an uncompressed PDF with one page per entry; empty entries become blank pages
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let operations = if text.is_empty() {
            Vec::new()
        } else {
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ]
        };
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}
