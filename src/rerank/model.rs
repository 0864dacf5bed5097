use crate::embedding::{Reranker, RerankerError};

/// Scores formatted prompts; implemented by [`Reranker`] and test doubles.
pub trait RelevanceModel: Send + Sync {
    /// One probability in `[0, 1]` per prompt, in input order.
    fn score(&self, prompts: &[String]) -> Result<Vec<f32>, RerankerError>;

    /// Identifier reported in rerank responses.
    fn model_id(&self) -> &str;

    /// Tokens consumed by scoring `prompts`, for usage reporting.
    fn count_tokens(&self, prompts: &[String]) -> usize {
        prompts.iter().map(|p| p.split_whitespace().count()).sum()
    }
}

impl RelevanceModel for Reranker {
    fn score(&self, prompts: &[String]) -> Result<Vec<f32>, RerankerError> {
        Reranker::score(self, prompts)
    }

    fn model_id(&self) -> &str {
        Reranker::model_id(self)
    }

    fn count_tokens(&self, prompts: &[String]) -> usize {
        Reranker::count_tokens(self, prompts)
    }
}

#[cfg(any(test, feature = "mock"))]
pub use mock::MockRelevanceModel;

#[cfg(any(test, feature = "mock"))]
mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Debug, Clone)]
    enum Behavior {
        Fixed(Vec<f32>),
        Constant(f32),
        Fail(String),
        Panic(String),
    }

    /// Scripted [`RelevanceModel`] for tests.
    #[derive(Debug)]
    pub struct MockRelevanceModel {
        model_id: String,
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl MockRelevanceModel {
        /// Returns `scores` truncated to the prompt count (short vectors stay short).
        pub fn with_scores(scores: Vec<f32>) -> Self {
            Self::build(Behavior::Fixed(scores))
        }

        /// Scores every prompt the same.
        pub fn constant(score: f32) -> Self {
            Self::build(Behavior::Constant(score))
        }

        /// Fails every call with an inference error.
        pub fn failing<S: Into<String>>(reason: S) -> Self {
            Self::build(Behavior::Fail(reason.into()))
        }

        /// Panics inside every call, the way a crashing kernel would.
        pub fn panicking<S: Into<String>>(reason: S) -> Self {
            Self::build(Behavior::Panic(reason.into()))
        }

        pub fn with_model_id<S: Into<String>>(mut self, model_id: S) -> Self {
            self.model_id = model_id.into();
            self
        }

        /// Number of `score` calls so far.
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn build(behavior: Behavior) -> Self {
            Self {
                model_id: "mock-reranker".to_string(),
                behavior,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl RelevanceModel for MockRelevanceModel {
        fn score(&self, prompts: &[String]) -> Result<Vec<f32>, RerankerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Fixed(scores) => {
                    Ok(scores.iter().copied().take(prompts.len()).collect())
                }
                Behavior::Constant(score) => Ok(vec![*score; prompts.len()]),
                Behavior::Fail(reason) => Err(RerankerError::InferenceFailed {
                    reason: reason.clone(),
                }),
                Behavior::Panic(reason) => panic!("{reason}"),
            }
        }

        fn model_id(&self) -> &str {
            &self.model_id
        }
    }
}
