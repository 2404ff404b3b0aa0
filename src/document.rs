//! Per-document sampler state.
//!
//! A document owns its token ids, one topic assignment per token, the
//! per-token weights (weighted schemes only), and its own topic-count
//! vector. Token ids at or beyond the effective vocabulary size are
//! out-of-vocabulary: they keep their position in `words` and `topics`
//! but contribute to no counts anywhere.

use serde::{Deserialize, Serialize};

use crate::counts::TopicWeight;

/// One document's tokens, assignments and counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DocState<W> {
    /// Position of the document in its corpus (0 for held-out documents).
    pub id: usize,
    /// Token ids; may contain out-of-vocabulary ids.
    pub words: Vec<u32>,
    /// Topic assignment per token. OOV positions are left at 0 and never
    /// read or updated.
    pub topics: Vec<u32>,
    /// Per-token weights; empty in the unweighted scheme.
    pub weights: Vec<f32>,
    /// Weighted topic counts over this document's in-vocab tokens, length `K`.
    pub by_topic: Vec<W>,
}

impl<W: TopicWeight> DocState<W> {
    pub fn new(id: usize, words: Vec<u32>, n_topics: usize) -> Self {
        let n = words.len();
        let weights = if W::WEIGHTED { vec![1.0; n] } else { Vec::new() };
        Self {
            id,
            words,
            topics: vec![0; n],
            weights,
            by_topic: vec![W::ZERO; n_topics],
        }
    }

    /// Count increment this token contributes (1 when unweighted).
    pub fn token_weight(&self, pos: usize) -> W {
        if self.weights.is_empty() {
            W::from_weight(1.0)
        } else {
            W::from_weight(self.weights[pos])
        }
    }

    /// Total token weight, the normalizer for the document-topic
    /// distribution: the token count when unweighted, the weight sum
    /// otherwise.
    pub fn sum_word_weight(&self) -> f32 {
        if self.weights.is_empty() {
            self.words.len() as f32
        } else {
            self.weights.iter().sum()
        }
    }

    /// Zeroes the count vector and resets weights to 1, ready for a fresh
    /// initialization pass.
    pub fn reset(&mut self) {
        for c in &mut self.by_topic {
            *c = W::ZERO;
        }
        for w in &mut self.weights {
            *w = 1.0;
        }
    }

    /// Rebuilds `by_topic` from the existing assignments, leaving the
    /// assignments and weights untouched. Used when a collaborator restores
    /// a model whose assignments survived but whose counts did not.
    pub fn refresh_counts(&mut self, vocab_size: usize) {
        for c in &mut self.by_topic {
            *c = W::ZERO;
        }
        for pos in 0..self.words.len() {
            if (self.words[pos] as usize) < vocab_size {
                let w = self.token_weight(pos);
                self.by_topic[self.topics[pos] as usize] += w;
            }
        }
    }
}
