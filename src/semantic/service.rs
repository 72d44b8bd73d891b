//! Model resources shared by every entry point.
//!
//! The embedding model and the classifier are built at most once, on first
//! use, and then handed out as shared handles. Concurrent first callers
//! block on the same initialization instead of loading the model twice.

use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::classify::{ClassifyError, Classifier, EmbeddingClassifier, RemoteClassifier};
use crate::config::{ClassifierConfig, ClassifierKind, SemanticSearchConfig};
use crate::semantic::embeddings::{Embedder, EmbeddingError, EmbeddingModel};

pub struct ModelResources {
    semantic: SemanticSearchConfig,
    classifier_config: ClassifierConfig,
    base_path: PathBuf,
    embedder: OnceCell<Arc<dyn Embedder>>,
    classifier: OnceCell<Arc<dyn Classifier>>,
}

impl ModelResources {
    /// Nothing is loaded until `embedder()` or `classifier()` is called.
    pub fn new(
        semantic: SemanticSearchConfig,
        classifier_config: ClassifierConfig,
        base_path: PathBuf,
    ) -> Self {
        Self {
            semantic,
            classifier_config,
            base_path,
            embedder: OnceCell::new(),
            classifier: OnceCell::new(),
        }
    }

    /// Resources with ready-made collaborators, used by tests and callers
    /// that bring their own models.
    pub fn with_collaborators(
        embedder: Option<Arc<dyn Embedder>>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        let semantic = SemanticSearchConfig {
            enabled: embedder.is_some(),
            ..Default::default()
        };

        let embedder_cell = OnceCell::new();
        if let Some(embedder) = embedder {
            let _ = embedder_cell.set(embedder);
        }

        let classifier_cell = OnceCell::new();
        let _ = classifier_cell.set(classifier);

        Self {
            semantic,
            classifier_config: ClassifierConfig::default(),
            base_path: PathBuf::new(),
            embedder: embedder_cell,
            classifier: classifier_cell,
        }
    }

    pub fn default_threshold(&self) -> f32 {
        self.semantic.default_threshold
    }

    pub fn embedder(&self) -> Result<Arc<dyn Embedder>, EmbeddingError> {
        if !self.semantic.enabled {
            return Err(EmbeddingError::Disabled);
        }

        self.embedder
            .get_or_try_init(|| {
                log::info!("loading embedding model {}", self.semantic.model);
                let model = EmbeddingModel::new(&self.semantic.model, self.base_path.clone())?;
                log::info!(
                    "embedding model {} ready ({} dimensions)",
                    model.name(),
                    model.dimensions()
                );
                Ok(Arc::new(model) as Arc<dyn Embedder>)
            })
            .cloned()
    }

    pub fn classifier(&self) -> Result<Arc<dyn Classifier>, ClassifyError> {
        self.classifier
            .get_or_try_init(|| {
                let cfg = &self.classifier_config;
                match cfg.kind {
                    ClassifierKind::Remote => {
                        let endpoint = cfg.endpoint.as_deref().ok_or_else(|| {
                            ClassifyError::NotConfigured("classifier.endpoint is not set".into())
                        })?;
                        log::info!("using remote classifier at {endpoint}");
                        let classifier =
                            RemoteClassifier::new(endpoint, cfg.token.clone(), cfg.top_n)?;
                        Ok(Arc::new(classifier) as Arc<dyn Classifier>)
                    }
                    ClassifierKind::Embedding => {
                        let embedder = self.embedder()?;
                        let classifier =
                            EmbeddingClassifier::new(embedder, cfg.temperature, cfg.top_n);
                        Ok(Arc::new(classifier) as Arc<dyn Classifier>)
                    }
                }
            })
            .cloned()
    }

    /// Embeds `text`, or `None` when embeddings are disabled or failed.
    /// Failures are logged and never abort the caller.
    pub fn try_embed(&self, text: &str) -> Option<Vec<f32>> {
        let embedder = match self.embedder() {
            Ok(embedder) => embedder,
            Err(EmbeddingError::Disabled) => return None,
            Err(err) => {
                log::warn!("embedding model unavailable: {err}");
                return None;
            }
        };

        match embedder.embed(text) {
            Ok(embedding) => Some(embedding),
            Err(err) => {
                log::warn!("failed to embed {text:?}: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::LabelScores;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedClassifier;

    impl Classifier for FixedClassifier {
        fn classify(&self, _text: &str, _labels: &[String]) -> Result<LabelScores, ClassifyError> {
            Ok(LabelScores::from_pairs([("TECH", 1.0)]))
        }
    }

    struct CountingEmbedder(AtomicUsize);

    impl Embedder for CountingEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1.0, 0.0])
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    #[test]
    fn test_disabled_embeddings() {
        let resources = ModelResources::new(
            SemanticSearchConfig {
                enabled: false,
                ..Default::default()
            },
            ClassifierConfig::default(),
            PathBuf::from("/nonexistent"),
        );

        assert!(matches!(resources.embedder(), Err(EmbeddingError::Disabled)));
        assert!(resources.try_embed("anything").is_none());
        // the embedding classifier needs the embedder
        assert!(resources.classifier().is_err());
    }

    #[test]
    fn test_remote_without_endpoint() {
        let resources = ModelResources::new(
            SemanticSearchConfig::default(),
            ClassifierConfig {
                kind: ClassifierKind::Remote,
                ..Default::default()
            },
            PathBuf::from("/nonexistent"),
        );

        assert!(matches!(
            resources.classifier(),
            Err(ClassifyError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_collaborators_are_shared() {
        let embedder = Arc::new(CountingEmbedder(AtomicUsize::new(0)));
        let resources =
            ModelResources::with_collaborators(Some(embedder.clone()), Arc::new(FixedClassifier));

        assert_eq!(resources.try_embed("a"), Some(vec![1.0, 0.0]));
        assert_eq!(resources.try_embed("b"), Some(vec![1.0, 0.0]));
        assert_eq!(embedder.0.load(Ordering::SeqCst), 2);

        let first = resources.classifier().unwrap();
        let second = resources.classifier().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
