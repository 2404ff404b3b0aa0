//! Collapsed Gibbs resampling and the model's extension seams.
//!
//! [`SamplerHooks`] is the set of behaviors a topic-model variant may
//! override: proposal construction, token initialization, replica
//! merging and hyperparameter optimization. [`CollapsedLda`] keeps every
//! default, which implements plain LDA; extensions supply a different
//! hook implementation and reuse the round machinery unchanged.

use rand::Rng;

use crate::counts::{TopicCounts, TopicWeight};
use crate::document::DocState;
use crate::error::{Result, TemarioError};
use crate::math;
use crate::weights::{ppmi_weight, TermWeight};

/// Overridable behaviors of the collapsed sampler.
///
/// Every method has a default implementing standard LDA, so a variant
/// only overrides the seams it changes.
pub(crate) trait SamplerHooks<W: TopicWeight>: Sync {
    /// Fills `buf` with the unnormalized cumulative proposal over topics
    /// for vocabulary id `word` and returns the total mass.
    ///
    /// `p(k) ∝ (n_dk + alpha_k) * (n_kw + eta) / (n_k + V*eta)`, prefix
    /// summed in place.
    fn build_proposal(
        &self,
        doc: &DocState<W>,
        counts: &TopicCounts<W>,
        word: usize,
        alphas: &[f32],
        eta: f32,
        buf: &mut [f32],
    ) -> f32 {
        let v_eta = counts.vocab_size() as f32 * eta;
        let col = counts.word_col(word);
        for (k, out) in buf.iter_mut().enumerate() {
            *out = (doc.by_topic[k].to_f32() + alphas[k]) * (col[k].to_f32() + eta)
                / (counts.topic(k).to_f32() + v_eta);
        }
        math::prefix_sum_in_place(buf);
        buf[buf.len() - 1]
    }

    /// Draws the initial topic for the in-vocab token at `pos` and adds
    /// its weight to the document and state counts.
    fn init_document_token<R: Rng + ?Sized>(
        &self,
        doc: &mut DocState<W>,
        counts: &mut TopicCounts<W>,
        pos: usize,
        rng: &mut R,
    ) {
        let z = rng.random_range(0..doc.by_topic.len());
        doc.topics[pos] = z as u32;
        let w = doc.token_weight(pos);
        doc.by_topic[z] += w;
        counts.add(z, doc.words[pos] as usize, w);
    }

    /// Reduces worker replicas into a new global state and refills every
    /// replica with the result.
    ///
    /// The reduction is `L_0 + Σ_{i>=1} (L_i − G)` elementwise; weighted
    /// counts are clamped at zero afterwards, integer counts must already
    /// be non-negative.
    fn merge_locals(
        &self,
        global: &mut TopicCounts<W>,
        locals: &mut [TopicCounts<W>],
        round: usize,
    ) -> Result<()> {
        let base = global.clone();
        global.clone_from(&locals[0]);
        for local in &locals[1..] {
            global.accumulate_delta(local, &base);
        }

        if W::WEIGHTED {
            global.clamp_at_zero();
        } else if let Some((topic, word)) = global.first_negative() {
            return Err(TemarioError::NegativeCount { round, topic, word });
        }
        if let Some((topic, word)) = global.first_non_finite() {
            return Err(TemarioError::NumericalInstability {
                round,
                doc: None,
                position: None,
                details: match word {
                    Some(w) => format!("non-finite count for topic {topic}, word {w} after merge"),
                    None => format!("non-finite total for topic {topic} after merge"),
                },
            });
        }

        for local in locals.iter_mut() {
            local.clone_from(global);
        }
        Ok(())
    }

    /// Ten fixed-point iterations of the Minka estimator for the
    /// asymmetric document-topic Dirichlet, floored at 1e-5.
    fn optimize_params(&self, docs: &[DocState<W>], alphas: &mut [f32]) {
        const FIXED_POINT_ITERS: usize = 10;
        const ALPHA_FLOOR: f32 = 1e-5;

        for _ in 0..FIXED_POINT_ITERS {
            let alpha_sum = f64::from(alphas.iter().sum::<f32>());
            let d_alpha_sum = math::digamma(alpha_sum);
            let denom: f64 = docs
                .iter()
                .map(|d| math::digamma(f64::from(d.sum_word_weight()) + alpha_sum) - d_alpha_sum)
                .sum();
            if denom <= 0.0 {
                return;
            }
            for k in 0..alphas.len() {
                let alpha_k = f64::from(alphas[k]);
                let d_alpha = math::digamma(alpha_k);
                let nom: f64 = docs
                    .iter()
                    .map(|d| math::digamma(f64::from(d.by_topic[k].to_f32()) + alpha_k) - d_alpha)
                    .sum();
                alphas[k] = ((alpha_k * nom / denom) as f32).max(ALPHA_FLOOR);
            }
        }
    }
}

/// The base hook set: standard collapsed-Gibbs LDA.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CollapsedLda;

impl<W: TopicWeight> SamplerHooks<W> for CollapsedLda {}

/// Initializes a freshly built or reused document: computes per-token
/// weights for the active scheme and draws a uniform topic for every
/// in-vocab token, updating `counts` as it goes.
pub(crate) fn init_document<W, H, R>(
    hooks: &H,
    doc: &mut DocState<W>,
    counts: &mut TopicCounts<W>,
    term_weight: TermWeight,
    vocab_weights: &[f32],
    rng: &mut R,
) where
    W: TopicWeight,
    H: SamplerHooks<W>,
    R: Rng + ?Sized,
{
    doc.reset();
    let v_limit = counts.vocab_size() as u32;

    match term_weight {
        TermWeight::One => {}
        TermWeight::Idf => {
            for pos in 0..doc.words.len() {
                let w = doc.words[pos];
                if w < v_limit {
                    doc.weights[pos] = vocab_weights[w as usize];
                }
            }
        }
        TermWeight::Pmi => {
            let mut tf = vec![0u32; counts.vocab_size()];
            for &w in &doc.words {
                if w < v_limit {
                    tf[w as usize] += 1;
                }
            }
            let len = doc.words.len();
            for pos in 0..doc.words.len() {
                let w = doc.words[pos];
                if w < v_limit {
                    doc.weights[pos] = ppmi_weight(tf[w as usize], vocab_weights[w as usize], len);
                }
            }
        }
    }

    for pos in 0..doc.words.len() {
        if doc.words[pos] < v_limit {
            hooks.init_document_token(doc, counts, pos, rng);
        }
    }
}

/// Resamples every in-vocab token of one document against `counts`.
///
/// Per token: remove the current assignment's weight, build the
/// categorical proposal, draw the new topic from the cumulative array
/// (smallest index on ties), and add the weight back under the new topic.
#[allow(clippy::too_many_arguments)]
pub(crate) fn sample_document<W, H, R>(
    hooks: &H,
    doc: &mut DocState<W>,
    counts: &mut TopicCounts<W>,
    alphas: &[f32],
    eta: f32,
    buf: &mut [f32],
    rng: &mut R,
    round: usize,
) -> Result<()>
where
    W: TopicWeight,
    H: SamplerHooks<W>,
    R: Rng + ?Sized,
{
    let v_limit = counts.vocab_size() as u32;
    for pos in 0..doc.words.len() {
        let word = doc.words[pos];
        if word >= v_limit {
            continue;
        }
        let w = doc.token_weight(pos);
        let old = doc.topics[pos] as usize;
        doc.by_topic[old] -= w;
        counts.sub(old, word as usize, w);

        let total = hooks.build_proposal(doc, counts, word as usize, alphas, eta, buf);
        if !total.is_finite() {
            return Err(TemarioError::NumericalInstability {
                round,
                doc: Some(doc.id),
                position: Some(pos),
                details: format!("proposal total is {total}"),
            });
        }

        let z = math::sample_discrete_cdf(buf, rng);
        doc.topics[pos] = z as u32;
        doc.by_topic[z] += w;
        counts.add(z, word as usize, w);
    }
    Ok(())
}
