//! Held-out document scoring against a frozen model.
//!
//! Both modes clone the frozen sufficient statistics and never write to
//! them. Joint mode initializes all held-out documents into one shared
//! temporary state and runs full shard-and-merge rounds over them,
//! reporting a single likelihood. Independent mode scores every document
//! in isolation against its own private clone, one rayon task each.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::counts::{TopicCounts, TopicWeight};
use crate::document::DocState;
use crate::error::{Result, TemarioError};
use crate::likelihood::{ll_docs, ll_topic_word};
use crate::sampler::{init_document, sample_document, SamplerHooks};
use crate::trainer::{effective_workers, run_round};
use crate::weights::TermWeight;

/// Joint mode: one temporary state shared by all held-out documents,
/// `max_iter` shard-and-merge rounds, one likelihood for the whole set:
/// `(LL_tw(tmp) − LL_tw(frozen)) + LL_docs(held_out)`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn infer_joint<W, H>(
    hooks: &H,
    frozen: &TopicCounts<W>,
    vocab_weights: &[f32],
    term_weight: TermWeight,
    docs: &mut [&mut DocState<W>],
    alphas: &[f32],
    eta: f32,
    max_iter: usize,
    workers: usize,
    seed: u64,
) -> Result<Vec<f64>>
where
    W: TopicWeight,
    H: SamplerHooks<W>,
{
    let workers = effective_workers(workers);
    let mut rng = StdRng::seed_from_u64(seed);

    let mut tmp = frozen.clone();
    for doc in docs.iter_mut() {
        init_document(hooks, &mut **doc, &mut tmp, term_weight, vocab_weights, &mut rng);
    }

    let mut locals = vec![tmp.clone(); workers];
    let mut rngs: Vec<StdRng> = (0..workers)
        .map(|_| StdRng::seed_from_u64(rng.random()))
        .collect();
    for iter in 0..max_iter {
        run_round(hooks, docs, &mut tmp, &mut locals, &mut rngs, alphas, eta, iter)?;
    }

    let ll = ll_topic_word(&tmp, eta) - ll_topic_word(frozen, eta)
        + ll_docs(docs.iter().map(|d| &**d), alphas);
    Ok(vec![ll])
}

/// Independent mode: every document gets a private clone of the frozen
/// state, `max_iter` sampling passes, and its own likelihood delta.
#[allow(clippy::too_many_arguments)]
pub(crate) fn infer_independent<W, H>(
    hooks: &H,
    frozen: &TopicCounts<W>,
    vocab_weights: &[f32],
    term_weight: TermWeight,
    docs: &mut [&mut DocState<W>],
    alphas: &[f32],
    eta: f32,
    max_iter: usize,
    workers: usize,
    seed: u64,
) -> Result<Vec<f64>>
where
    W: TopicWeight,
    H: SamplerHooks<W>,
{
    let workers = effective_workers(workers);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| TemarioError::WorkerFailure {
            round: 0,
            message: e.to_string(),
        })?;

    let mut rng = StdRng::seed_from_u64(seed);
    let seeds: Vec<u64> = (0..docs.len()).map(|_| rng.random()).collect();
    let base_ll = ll_topic_word(frozen, eta);
    let n_topics = alphas.len();

    pool.install(|| {
        docs.par_iter_mut()
            .zip(seeds.par_iter())
            .map(|(doc, &doc_seed)| -> Result<f64> {
                let doc: &mut DocState<W> = doc;
                let mut rng = StdRng::seed_from_u64(doc_seed);
                let mut tmp = frozen.clone();
                init_document(hooks, doc, &mut tmp, term_weight, vocab_weights, &mut rng);
                let mut buf = vec![0.0f32; n_topics];
                for iter in 0..max_iter {
                    sample_document(hooks, doc, &mut tmp, alphas, eta, &mut buf, &mut rng, iter)?;
                }
                Ok(ll_topic_word(&tmp, eta) - base_ll + ll_docs(std::iter::once(&*doc), alphas))
            })
            .collect()
    })
}
