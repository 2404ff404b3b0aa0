//! Model log-likelihood, for diagnostics and held-out scoring.
//!
//! Two parts, summed: the document part integrates out the per-document
//! topic proportions against the asymmetric `alphas`, the topic-word part
//! integrates out the per-topic word distributions against `eta`. Counts
//! are single-precision; accumulation happens in `f64`.

use crate::counts::{TopicCounts, TopicWeight};
use crate::document::DocState;
use crate::math::lgamma;

/// Document part: `Σ_d [lgamma(Σα) − lgamma(swc_d + Σα)
/// + Σ_k (lgamma(n_dk + α_k) − lgamma(α_k))]`.
pub(crate) fn ll_docs<'a, W, I>(docs: I, alphas: &[f32]) -> f64
where
    W: TopicWeight,
    I: IntoIterator<Item = &'a DocState<W>>,
{
    let alpha_sum: f64 = alphas.iter().map(|&a| f64::from(a)).sum();
    let lg_alpha_sum = lgamma(alpha_sum);
    let lg_alphas: Vec<f64> = alphas.iter().map(|&a| lgamma(f64::from(a))).collect();

    let mut ll = 0.0;
    for doc in docs {
        ll += lg_alpha_sum - lgamma(f64::from(doc.sum_word_weight()) + alpha_sum);
        for (k, &lg_alpha) in lg_alphas.iter().enumerate() {
            ll += lgamma(f64::from(doc.by_topic[k].to_f32()) + f64::from(alphas[k])) - lg_alpha;
        }
    }
    ll
}

/// Topic-word part: `K·lgamma(Vη) + Σ_k [−lgamma(n_k + Vη)
/// + Σ_{v: n_kv ≠ 0} (lgamma(n_kv + η) − lgamma(η))]`.
pub(crate) fn ll_topic_word<W: TopicWeight>(counts: &TopicCounts<W>, eta: f32) -> f64 {
    let n_topics = counts.n_topics();
    let vocab = counts.vocab_size();
    if vocab == 0 {
        return 0.0;
    }
    let eta = f64::from(eta);
    let v_eta = vocab as f64 * eta;
    let lg_eta = lgamma(eta);

    let mut ll = lgamma(v_eta) * n_topics as f64;
    for k in 0..n_topics {
        ll -= lgamma(f64::from(counts.topic(k).to_f32()) + v_eta);
    }
    for v in 0..vocab {
        for &n in counts.word_col(v) {
            let n = f64::from(n.to_f32());
            if n != 0.0 {
                ll += lgamma(n + eta) - lg_eta;
            }
        }
    }
    ll
}
