mod app;

use std::sync::{Arc, RwLock};

use crate::app::AppLocal;
use crate::classify::{ClassifyError, Classifier, LabelScores};
use crate::config::Config;
use crate::semantic::{Embedder, EmbeddingError, ModelResources};
use crate::storage::{BackendMemory, KvStore};

const KEYWORDS: [&str; 3] = ["rust", "news", "pasta"];

/// One dimension per keyword plus one for everything else.
pub struct KeywordEmbedder;

impl Embedder for KeywordEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let text = text.to_lowercase();
        let mut vector = KEYWORDS
            .iter()
            .map(|keyword| text.matches(keyword).count() as f32)
            .collect::<Vec<_>>();

        let other = if vector.iter().all(|v| *v == 0.0) { 1.0 } else { 0.0 };
        vector.push(other);
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        KEYWORDS.len() + 1
    }
}

pub struct KeywordClassifier;

impl Classifier for KeywordClassifier {
    fn classify(&self, text: &str, labels: &[String]) -> Result<LabelScores, ClassifyError> {
        if labels.is_empty() {
            return Err(ClassifyError::NoLabels);
        }

        let text = text.to_lowercase();
        let scores = if text.contains("rust") {
            LabelScores::from_pairs([("TECH", 0.9), ("NEWS", 0.1)])
        } else if text.contains("news") {
            LabelScores::from_pairs([("NEWS", 0.8), ("TECH", 0.2)])
        } else if text.contains("pasta") {
            LabelScores::from_pairs([("FOOD", 0.7), ("NEWS", 0.3)])
        } else {
            LabelScores::from_pairs([("OTHER", 1.0)])
        };
        Ok(scores)
    }
}

pub struct FailingClassifier;

impl Classifier for FailingClassifier {
    fn classify(&self, _text: &str, _labels: &[String]) -> Result<LabelScores, ClassifyError> {
        Err(ClassifyError::InvalidResponse("model offline".to_string()))
    }
}

pub fn stub_resources() -> Arc<ModelResources> {
    Arc::new(ModelResources::with_collaborators(
        Some(Arc::new(KeywordEmbedder)),
        Arc::new(KeywordClassifier),
    ))
}

/// An app over an in-memory store; the store handle is returned for
/// inspecting persisted values directly.
pub fn create_app_with(resources: Arc<ModelResources>) -> (AppLocal, Arc<dyn KvStore>) {
    let kv: Arc<dyn KvStore> = Arc::new(BackendMemory::new());
    let config = Arc::new(RwLock::new(Config::default()));

    let app = AppLocal::new(config, kv.clone(), resources).expect("failed to create app");
    (app, kv)
}

pub fn create_app() -> (AppLocal, Arc<dyn KvStore>) {
    create_app_with(stub_resources())
}

pub fn now_ms() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64
}
