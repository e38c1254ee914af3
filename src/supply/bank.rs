//! Built-in question bank
//!
//! Serves questions from a fixed list held in memory, for play without a
//! generator. The bank ignores the topic.

use tracing::debug;

use crate::question::Question;

use super::{GenerationFailure, QuestionSupply, SupplyRequest, take_valid};

const GENERAL_KNOWLEDGE: &str = include_str!("general_knowledge.json");

/// How the bank orders what it serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    /// The order the questions were written in
    #[default]
    AsWritten,
    /// A fresh random order on every request
    Shuffled,
    /// A reproducible random order
    Seeded(u64),
}

/// A supplier backed by a fixed list of questions
#[derive(Debug, Clone)]
pub struct StaticBank {
    questions: Vec<Question>,
    order: Order,
}

impl StaticBank {
    /// Creates a bank over the given questions
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions,
            order: Order::AsWritten,
        }
    }

    /// The built-in general knowledge bank of ten questions
    ///
    /// # Panics
    ///
    /// Panics if the embedded question list is not valid JSON, which a test
    /// guards against.
    pub fn general_knowledge() -> Self {
        Self::new(serde_json::from_str(GENERAL_KNOWLEDGE).expect("embedded bank is valid JSON"))
    }

    /// Sets how questions are ordered
    #[must_use]
    pub fn with_order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    /// Number of questions in the bank
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Whether the bank holds no questions
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    fn pick(&self, count: usize) -> Result<Vec<Question>, GenerationFailure> {
        let mut questions = self.questions.clone();
        match self.order {
            Order::AsWritten => {}
            Order::Shuffled => fastrand::Rng::new().shuffle(&mut questions),
            Order::Seeded(seed) => fastrand::Rng::with_seed(seed).shuffle(&mut questions),
        }
        take_valid(questions, count)
    }
}

impl QuestionSupply for StaticBank {
    async fn supply(&self, request: &SupplyRequest) -> Result<Vec<Question>, GenerationFailure> {
        request.check()?;
        let questions = self.pick(request.count())?;
        debug!(count = questions.len(), "questions served from the static bank");
        Ok(questions)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use garde::Validate;

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    #[test]
    fn test_general_knowledge_is_valid() {
        let bank = StaticBank::general_knowledge();
        assert_eq!(bank.len(), 10);
        assert!(bank.questions.iter().all(|q| q.validate().is_ok()));
    }

    #[test]
    fn test_supply_as_written() {
        let bank = StaticBank::general_knowledge();
        let request = SupplyRequest::new("anything", 3).unwrap();
        let questions = block_on(bank.supply(&request)).unwrap();
        assert_eq!(questions.len(), 3);
        assert_eq!(questions[0].text(), "What is the capital of France?");
    }

    #[test]
    fn test_supply_seeded_is_reproducible() {
        let request = SupplyRequest::new("anything", 10).unwrap();
        let first = block_on(
            StaticBank::general_knowledge()
                .with_order(Order::Seeded(7))
                .supply(&request),
        )
        .unwrap();
        let second = block_on(
            StaticBank::general_knowledge()
                .with_order(Order::Seeded(7))
                .supply(&request),
        )
        .unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 10);
    }

    #[test]
    fn test_supply_more_than_bank() {
        let request = SupplyRequest::new("anything", 15).unwrap();
        assert_eq!(
            block_on(StaticBank::general_knowledge().supply(&request)),
            Err(GenerationFailure::InsufficientQuestions {
                requested: 15,
                received: 10
            })
        );
    }

    #[test]
    fn test_empty_bank() {
        let bank = StaticBank::new(vec![]);
        assert!(bank.is_empty());
        let request = SupplyRequest::new("anything", 1).unwrap();
        assert!(block_on(bank.supply(&request)).is_err());
    }
}
