use std::sync::{Arc, Mutex};

use crate::semantic::{cosine_similarity, Embedder};

use super::{ClassifyError, Classifier, LabelScores};

/// Zero-shot classifier over sentence embeddings.
///
/// Labels are embedded once per vocabulary and cached; a text is scored by
/// a temperature softmax over its cosine similarity to every label.
pub struct EmbeddingClassifier {
    embedder: Arc<dyn Embedder>,
    temperature: f32,
    top_n: usize,
    /// (vocabulary, label embeddings) of the last classification
    label_cache: Mutex<Option<(Vec<String>, Vec<Vec<f32>>)>>,
}

impl EmbeddingClassifier {
    pub fn new(embedder: Arc<dyn Embedder>, temperature: f32, top_n: usize) -> Self {
        Self {
            embedder,
            temperature,
            top_n,
            label_cache: Mutex::new(None),
        }
    }

    fn label_embeddings(&self, labels: &[String]) -> Result<Vec<Vec<f32>>, ClassifyError> {
        let mut cache = self
            .label_cache
            .lock()
            .map_err(|e| ClassifyError::NotConfigured(format!("Lock poisoned: {}", e)))?;

        if let Some((vocabulary, embeddings)) = cache.as_ref() {
            if vocabulary.as_slice() == labels {
                return Ok(embeddings.clone());
            }
        }

        log::debug!("embedding {} candidate labels", labels.len());
        let prompts = labels
            .iter()
            .map(|label| label.replace('_', " ").to_lowercase())
            .collect::<Vec<_>>();
        let embeddings = self.embedder.embed_batch(&prompts)?;

        *cache = Some((labels.to_vec(), embeddings.clone()));
        Ok(embeddings)
    }
}

/// Softmax of `values / temperature`.
fn softmax(values: &[f32], temperature: f32) -> Vec<f32> {
    let temperature = temperature.max(f32::EPSILON);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps = values
        .iter()
        .map(|v| ((v - max) / temperature).exp())
        .collect::<Vec<_>>();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

impl Classifier for EmbeddingClassifier {
    fn classify(&self, text: &str, labels: &[String]) -> Result<LabelScores, ClassifyError> {
        if labels.is_empty() {
            return Err(ClassifyError::NoLabels);
        }

        let label_embeddings = self.label_embeddings(labels)?;
        let text_embedding = self.embedder.embed(text)?;

        let similarities = label_embeddings
            .iter()
            .map(|label| cosine_similarity(&text_embedding, label))
            .collect::<Vec<_>>();
        let probabilities = softmax(&similarities, self.temperature);

        let mut ranked = labels
            .iter()
            .cloned()
            .zip(probabilities)
            .collect::<Vec<_>>();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        Ok(LabelScores::from_pairs(ranked).truncate(self.top_n))
    }
}
