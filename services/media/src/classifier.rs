//! Mood classification strategies
//!
//! Every strategy answers with a label from the label set it is handed.
//! None of them look at pixels except [`ModelStrategy`], which defers to an
//! [`ImageModel`] and maps its class index onto the label set.

use async_trait::async_trait;
use common::mood::{LabelSet, MoodLabel};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use std::sync::Mutex;
use tracing::debug;

use crate::error::ClassificationError;
use crate::models::ImageFrame;

/// Maps a normalized frame to one label of a label set
#[async_trait]
pub trait MoodClassifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn classify(
        &self,
        frame: &ImageFrame,
        labels: &LabelSet,
    ) -> Result<MoodLabel, ClassificationError>;
}

/// Always answers the same label
#[derive(Debug, Clone)]
pub struct FixedStrategy {
    label: String,
}

impl FixedStrategy {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

#[async_trait]
impl MoodClassifier for FixedStrategy {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn classify(
        &self,
        _frame: &ImageFrame,
        labels: &LabelSet,
    ) -> Result<MoodLabel, ClassificationError> {
        if labels.is_empty() {
            return Err(ClassificationError::EmptyLabelSet);
        }
        labels
            .resolve(&self.label)
            .cloned()
            .ok_or_else(|| ClassificationError::LabelNotInSet(self.label.clone()))
    }
}

/// Picks a label uniformly at random
pub struct UniformRandomStrategy {
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl UniformRandomStrategy {
    /// Entropy-seeded generator
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Reproducible sequence of picks
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn with_rng<R: RngCore + Send + 'static>(rng: R) -> Self {
        Self {
            rng: Mutex::new(Box::new(rng)),
        }
    }

    pub fn choose(&self, labels: &LabelSet) -> Result<MoodLabel, ClassificationError> {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        labels
            .labels()
            .choose(&mut *rng)
            .cloned()
            .ok_or(ClassificationError::EmptyLabelSet)
    }
}

impl Default for UniformRandomStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MoodClassifier for UniformRandomStrategy {
    fn name(&self) -> &'static str {
        "random"
    }

    async fn classify(
        &self,
        _frame: &ImageFrame,
        labels: &LabelSet,
    ) -> Result<MoodLabel, ClassificationError> {
        self.choose(labels)
    }
}

/// Image classification model producing a top class index
pub trait ImageModel: Send + Sync {
    fn top_class(&self, frame: &ImageFrame) -> Result<usize, ClassificationError>;
}

/// Classifier backed by an [`ImageModel`]
///
/// `index_labels[i]` names the mood for class `i`. Classes without a name, or
/// whose name is missing from the label set, are answered by the fallback.
pub struct ModelStrategy<M> {
    model: M,
    index_labels: Vec<String>,
    fallback: Box<dyn MoodClassifier>,
}

impl<M: ImageModel> ModelStrategy<M> {
    pub fn new(model: M, index_labels: Vec<String>) -> Self {
        Self {
            model,
            index_labels,
            fallback: Box::new(UniformRandomStrategy::new()),
        }
    }

    pub fn with_fallback(mut self, fallback: Box<dyn MoodClassifier>) -> Self {
        self.fallback = fallback;
        self
    }
}

#[async_trait]
impl<M: ImageModel> MoodClassifier for ModelStrategy<M> {
    fn name(&self) -> &'static str {
        "model"
    }

    async fn classify(
        &self,
        frame: &ImageFrame,
        labels: &LabelSet,
    ) -> Result<MoodLabel, ClassificationError> {
        if labels.is_empty() {
            return Err(ClassificationError::EmptyLabelSet);
        }

        let class = self.model.top_class(frame)?;
        let mapped = self
            .index_labels
            .get(class)
            .and_then(|raw| labels.resolve(raw));

        match mapped {
            Some(label) => Ok(label.clone()),
            None => {
                debug!(
                    "Class {} has no label in the set, using {} fallback",
                    class,
                    self.fallback.name()
                );
                self.fallback.classify(frame, labels).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::collections::HashMap;

    fn frame() -> ImageFrame {
        ImageFrame::new(RgbImage::new(4, 4), None)
    }

    struct FakeModel(Result<usize, String>);

    impl ImageModel for FakeModel {
        fn top_class(&self, _frame: &ImageFrame) -> Result<usize, ClassificationError> {
            self.0.clone().map_err(ClassificationError::Model)
        }
    }

    #[tokio::test]
    async fn test_fixed_strategy_uses_set_spelling() {
        let labels = LabelSet::excited_variant();
        let mood = FixedStrategy::new("happy").classify(&frame(), &labels).await.unwrap();
        assert_eq!(mood.as_str(), "Happy");
    }

    #[tokio::test]
    async fn test_fixed_strategy_outside_set() {
        let err = FixedStrategy::new("excited")
            .classify(&frame(), &LabelSet::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ClassificationError::LabelNotInSet(label) if label == "excited"));
    }

    #[test]
    fn test_seeded_strategy_is_reproducible() {
        let labels = LabelSet::default();
        let a = UniformRandomStrategy::seeded(9);
        let b = UniformRandomStrategy::seeded(9);
        for _ in 0..20 {
            assert_eq!(a.choose(&labels).unwrap(), b.choose(&labels).unwrap());
        }
    }

    #[test]
    fn test_uniform_strategy_distribution() {
        let labels = LabelSet::default();
        let strategy = UniformRandomStrategy::seeded(2024);
        let trials = 10_000;

        let mut counts: HashMap<MoodLabel, usize> = HashMap::new();
        for _ in 0..trials {
            *counts.entry(strategy.choose(&labels).unwrap()).or_default() += 1;
        }

        let expected = 1.0 / labels.len() as f64;
        assert_eq!(counts.len(), labels.len());
        for (label, count) in counts {
            let share = count as f64 / trials as f64;
            assert!(
                (share - expected).abs() < 0.02,
                "{} drawn with frequency {}",
                label,
                share
            );
        }
    }

    #[tokio::test]
    async fn test_model_strategy_maps_class_index() {
        let strategy = ModelStrategy::new(
            FakeModel(Ok(2)),
            vec!["happy".into(), "sad".into(), "relaxed".into()],
        );
        let mood = strategy.classify(&frame(), &LabelSet::default()).await.unwrap();
        assert_eq!(mood.as_str(), "relaxed");
    }

    #[tokio::test]
    async fn test_model_strategy_falls_back_for_unmapped_class() {
        let strategy = ModelStrategy::new(FakeModel(Ok(7)), vec!["happy".into()])
            .with_fallback(Box::new(FixedStrategy::new("anxious")));
        let mood = strategy.classify(&frame(), &LabelSet::default()).await.unwrap();
        assert_eq!(mood.as_str(), "anxious");

        let strategy = ModelStrategy::new(FakeModel(Ok(0)), vec!["excited".into()])
            .with_fallback(Box::new(FixedStrategy::new("sad")));
        let mood = strategy.classify(&frame(), &LabelSet::default()).await.unwrap();
        assert_eq!(mood.as_str(), "sad");
    }

    #[tokio::test]
    async fn test_model_failure_is_a_classification_error() {
        let strategy = ModelStrategy::new(FakeModel(Err("weights missing".into())), vec![]);
        let err = strategy.classify(&frame(), &LabelSet::default()).await.unwrap_err();
        assert!(matches!(err, ClassificationError::Model(_)));
    }
}
