//! Sufficient statistics for the collapsed sampler.
//!
//! The two weighting families use different count representations:
//! integer counts for plain LDA (exact, never clamped) and float counts
//! for the weighted schemes (clamped at zero when replicas are merged).
//! [`TopicWeight`] carries that split; everything downstream is generic
//! over it and monomorphizes to the two concrete shapes.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Count representation used by a weighting family.
pub(crate) trait TopicWeight:
    Copy
    + Default
    + PartialOrd
    + Add<Output = Self>
    + Sub<Output = Self>
    + AddAssign
    + SubAssign
    + Send
    + Sync
    + std::fmt::Debug
    + 'static
{
    /// True for float counts, which are clamped at merge.
    const WEIGHTED: bool;
    /// Additive identity.
    const ZERO: Self;

    /// Converts a per-token weight into a count increment.
    fn from_weight(w: f32) -> Self;
    /// Widens the count for probability and likelihood math.
    fn to_f32(self) -> f32;
    /// False only for float counts that went non-finite.
    fn is_finite_count(self) -> bool;
}

impl TopicWeight for i32 {
    const WEIGHTED: bool = false;
    const ZERO: Self = 0;

    fn from_weight(_w: f32) -> Self {
        1
    }

    fn to_f32(self) -> f32 {
        self as f32
    }

    fn is_finite_count(self) -> bool {
        true
    }
}

impl TopicWeight for f32 {
    const WEIGHTED: bool = true;
    const ZERO: Self = 0.0;

    fn from_weight(w: f32) -> Self {
        w
    }

    fn to_f32(self) -> f32 {
        self
    }

    fn is_finite_count(self) -> bool {
        self.is_finite()
    }
}

/// Topic totals and the topic-word count matrix.
///
/// The matrix is stored word-major (`[v * K + k]`) so the per-token
/// proposal walks one contiguous column per vocabulary id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TopicCounts<W> {
    n_topics: usize,
    vocab_size: usize,
    /// Weighted assignment total per topic, length `K`.
    by_topic: Vec<W>,
    /// Weighted assignments per (word, topic), length `V * K`.
    by_topic_word: Vec<W>,
}

impl<W: TopicWeight> TopicCounts<W> {
    pub fn zeros(n_topics: usize, vocab_size: usize) -> Self {
        Self {
            n_topics,
            vocab_size,
            by_topic: vec![W::ZERO; n_topics],
            by_topic_word: vec![W::ZERO; vocab_size * n_topics],
        }
    }

    pub fn n_topics(&self) -> usize {
        self.n_topics
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn topic(&self, k: usize) -> W {
        self.by_topic[k]
    }

    /// Per-topic counts for one vocabulary id, contiguous.
    pub fn word_col(&self, v: usize) -> &[W] {
        let start = v * self.n_topics;
        &self.by_topic_word[start..start + self.n_topics]
    }

    pub fn add(&mut self, k: usize, v: usize, w: W) {
        self.by_topic[k] += w;
        self.by_topic_word[v * self.n_topics + k] += w;
    }

    pub fn sub(&mut self, k: usize, v: usize, w: W) {
        self.by_topic[k] -= w;
        self.by_topic_word[v * self.n_topics + k] -= w;
    }

    /// Adds `local - base` elementwise, the net delta a worker produced
    /// on its replica during a round.
    pub fn accumulate_delta(&mut self, local: &Self, base: &Self) {
        for ((g, &l), &b) in self
            .by_topic
            .iter_mut()
            .zip(local.by_topic.iter())
            .zip(base.by_topic.iter())
        {
            *g += l - b;
        }
        for ((g, &l), &b) in self
            .by_topic_word
            .iter_mut()
            .zip(local.by_topic_word.iter())
            .zip(base.by_topic_word.iter())
        {
            *g += l - b;
        }
    }

    /// Clamps every count at zero (weighted merge policy).
    pub fn clamp_at_zero(&mut self) {
        for c in self.by_topic.iter_mut().chain(self.by_topic_word.iter_mut()) {
            if *c < W::ZERO {
                *c = W::ZERO;
            }
        }
    }

    /// First negative entry, as `(topic, word)` with `word` absent for the
    /// topic-totals vector.
    pub fn first_negative(&self) -> Option<(usize, Option<usize>)> {
        if let Some(k) = self.by_topic.iter().position(|&c| c < W::ZERO) {
            return Some((k, None));
        }
        self.by_topic_word
            .iter()
            .position(|&c| c < W::ZERO)
            .map(|idx| (idx % self.n_topics, Some(idx / self.n_topics)))
    }

    /// First non-finite entry, same addressing as [`Self::first_negative`].
    pub fn first_non_finite(&self) -> Option<(usize, Option<usize>)> {
        if let Some(k) = self.by_topic.iter().position(|&c| !c.is_finite_count()) {
            return Some((k, None));
        }
        self.by_topic_word
            .iter()
            .position(|&c| !c.is_finite_count())
            .map(|idx| (idx % self.n_topics, Some(idx / self.n_topics)))
    }
}
